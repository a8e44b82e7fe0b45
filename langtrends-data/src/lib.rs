//! langtrends-data library interface
//!
//! Builds and maintains the monthly popularity score data set: language
//! catalog, full score history and the condensed front-end series.

pub mod data_populator;
pub mod models;
pub mod services;
pub mod store;

pub use data_populator::{DataError, DataPopulator};
pub use store::DataStore;
