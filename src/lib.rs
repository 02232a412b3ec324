pub mod catalog;
pub mod cli;
pub mod config;
pub mod dimension;
pub mod error;
pub mod executor;
pub mod query;
pub mod server;
pub mod service;
pub mod shape;

pub use config::DbConfig;
pub use error::{MetricError, Result};
pub use service::MetricService;
pub use shape::MetricResult;
