//! Core loader types and utilities

pub mod types;
pub mod error;
pub mod logging;
pub mod config;

pub use types::*;
pub use error::Error;
pub use config::{DeliveryOrder, LoaderConfig};
