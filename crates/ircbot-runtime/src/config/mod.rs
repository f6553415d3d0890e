//! Configuration module for the ircbot runtime.
//!
//! Layered loading (defaults, file, environment, overrides) through figment,
//! plus validation of the merged result.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use schema::{BotConfig, IrcConfig, LogFormat, LogOutput, LoggingConfig, StorageConfig};
pub use validation::validate_config;
