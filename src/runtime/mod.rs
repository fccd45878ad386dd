//! Runtime module - configuration and logging for the binary

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError};
pub use logging::init_logging;
