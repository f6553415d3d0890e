//! # ircbot runtime
//!
//! Turns a configuration into a running bot:
//!
//! - **Configuration**: figment-layered loading and validation ([`config`])
//! - **Logging**: tracing-subscriber setup driven by the configuration ([`logging`])
//! - **Control**: terminate / flush events from OS signals ([`control`])
//! - **Runtime**: context construction and the connection loop ([`BotRuntime`])

pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{BotConfig, ConfigError, ConfigLoader, ConfigResult};
pub use control::{ControlEvent, ControlReceiver, ControlSender, control_channel};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{BotRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;
