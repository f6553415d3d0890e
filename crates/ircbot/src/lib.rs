//! # ircbot
//!
//! A bot framework for line-oriented IRC servers, built as a stack of
//! capability layers over a single session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   lines   ┌────────┐  commands  ┌──────────────────────────────┐
//! │  Connection  │──────────▶│ Router │───────────▶│ your layer                   │
//! │ (transport)  │◀──────────│ (Bot)  │  content   │ Caching ─ Options ─ Admin ─  │
//! └──────────────┘  outbound └────────┘───────────▶│ Commands ─ Base              │
//!                                                   └──────────────────────────────┘
//! ```
//!
//! - **Transport**: TCP connection, line codec, outbound writer task
//! - **Router**: keep-alives, renames, `<nick>: <command> [<argument>]` addressing
//! - **Layers**: each one may add commands, options, help and greeting lines,
//!   or override what the layers below do
//! - **Runtime**: configuration, logging, signals and the read loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ircbot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BotRuntime::builder().build()?;
//!     let handler = ServiceBuilder::new()
//!         .layer(runtime.cache_layer())
//!         .layer(OptionsLayer::new())
//!         .layer(runtime.admin_layer())
//!         .layer(CommandsLayer::new())
//!         .service(Base);
//!     runtime.run(handler).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use ircbot_core as core;
pub use ircbot_framework as framework;
pub use ircbot_runtime as runtime;
pub use ircbot_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use ircbot::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use ircbot_runtime::{BotConfig, BotRuntime, ControlEvent};

    // Layer composition
    pub use async_trait::async_trait;
    pub use tower::ServiceBuilder;
    pub use tower_layer::Layer;

    // Handler chain
    pub use ircbot_framework::{
        AdminLayer, Base, Bot, BotContext, CacheLayer, CacheSettings, CommandCall, CommandTable,
        CommandsLayer, Dispatch, Handler, HelpSink, OptionsLayer, Tier,
    };

    // Options, replies and persistence
    pub use ircbot_framework::{
        FileStore, OpReport, OptionRegistry, OptionSpec, OptionType, errmsg, okmsg,
    };

    // Cache and fetchers
    pub use ircbot_framework::{CacheKey, Fetcher, Fetchers, Lookup, cache_fetch};
}
