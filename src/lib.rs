pub mod config;
pub mod domain;
pub mod error;
pub mod optimizer;
pub mod provider;
pub mod report;
pub mod telemetry;

pub use error::{OptimizerError, Result};
