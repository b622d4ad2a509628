//! Ambient stack shared by every engine subsystem: errors, logging, configuration.

pub mod config;
pub mod error;
pub mod logging;

pub use config::BankConfig;
pub use error::{BankError, Result};
pub use logging::{initialize_default_logging, initialize_logging, LoggingConfig};
