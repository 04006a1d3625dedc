pub mod aggregation;
pub mod client;
pub mod config;
pub mod error;
pub mod execution;
pub mod experiment;
pub mod ingest;
pub mod metrics;
pub mod partition;
pub mod predict;
pub mod session;

pub use error::{FederatedErr, Result};
