//! Test Helper Utilities
//!
//! Shared utilities for testing langtrends-data

#![allow(dead_code)]

pub mod fixtures;
pub mod providers;

pub use fixtures::{
    language_names, metadata_for, test_populator, write_scores, ymd, TestEnv,
};
pub use providers::{RateProvider, StaticCatalog};
