//! # Langtrends Common Library
//!
//! Shared code for the langtrends tools including:
//! - Error types
//! - Configuration loading
//! - Calendar-month utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
