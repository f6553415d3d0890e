//! Bot orchestration: configuration to context, and the connection loop.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ircbot_runtime::BotRuntime;
//!
//! let runtime = BotRuntime::builder()
//!     .config_file("batty.toml")
//!     .build()?;
//!
//! let handler = ServiceBuilder::new()
//!     .layer(runtime.cache_layer())
//!     .layer(OptionsLayer::new())
//!     .layer(runtime.admin_layer())
//!     .layer(CommandsLayer::new())
//!     .service(Base);
//!
//! runtime.run(handler).await?;
//! ```

use std::path::Path;

use ircbot_core::{Outbound, Session};
use ircbot_framework::{AdminLayer, Bot, BotContext, CacheLayer, FileStore, Handler};
use ircbot_transport::Connection;
use tracing::{error, info, warn};

use crate::config::{BotConfig, ConfigLoader, ConfigResult};
use crate::control::{ControlEvent, ControlReceiver, control_channel, subscribe_signals};
use crate::error::RuntimeResult;
use crate::logging;

/// Runs one bot against one server.
#[derive(Debug, Clone)]
pub struct BotRuntime {
    config: BotConfig,
}

impl BotRuntime {
    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration and
    /// initializes logging from it.
    pub fn from_config(config: BotConfig) -> Self {
        logging::init_from_config(&config.logging);
        info!(
            server = %config.irc.server,
            port = config.irc.port,
            nick = %config.irc.nick,
            log_level = %config.logging.level,
            log_format = %config.logging.format,
            "Runtime initialized from configuration"
        );
        Self { config }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// A fresh context: session identity from `irc`, file store rooted at
    /// `storage.data_dir`, default options file.
    pub fn context(&self) -> BotContext {
        let irc = &self.config.irc;
        let session =
            Session::new(&irc.server, irc.port, &irc.nick).with_greeting(irc.greeting);
        let store = self
            .config
            .data_dir()
            .map_or_else(FileStore::disabled, FileStore::new);
        BotContext::new(session)
            .with_store(store)
            .with_options_file(self.config.options_file_name())
    }

    /// Admin layer seeded with `irc.admins`.
    pub fn admin_layer(&self) -> AdminLayer {
        AdminLayer::new(self.config.irc.admins.iter().cloned())
    }

    /// Cache layer configured from the `cache` section.
    pub fn cache_layer(&self) -> CacheLayer {
        CacheLayer::new(self.config.cache.clone())
    }

    /// Wraps `handler` in a bot and runs its startup hooks.
    pub async fn build<H: Handler>(&self, handler: H) -> Bot<H> {
        let mut bot = Bot::new(handler, self.context());
        bot.start().await;
        bot
    }

    /// Builds the bot and serves it until the server closes the connection,
    /// with OS signals as control events.
    pub async fn run<H: Handler>(&self, handler: H) -> RuntimeResult<()> {
        let mut bot = self.build(handler).await;
        let (events, control) = control_channel();
        let signals = subscribe_signals(events)?;
        let result = self.serve(&mut bot, control).await;
        signals.abort();
        result
    }

    /// Connects, registers, joins the configured channels and processes
    /// inbound lines one at a time until the stream ends.
    ///
    /// Control events are handled between lines. The first
    /// [`ControlEvent::Terminate`] quits and keeps reading until the server
    /// hangs up; a second one drops the connection. On the way out every
    /// layer is flushed and queued lines are written.
    pub async fn serve<H: Handler>(
        &self,
        bot: &mut Bot<H>,
        mut control: ControlReceiver,
    ) -> RuntimeResult<()> {
        let (outbound, lines) = Outbound::channel();
        bot.context_mut().session_mut().set_outbound(outbound);

        let session = bot.context().session();
        let connected = Connection::connect(session.server(), session.port(), lines).await;
        let mut conn = match connected {
            Ok(conn) => conn,
            Err(e) => {
                bot.context_mut()
                    .session_mut()
                    .set_outbound(Outbound::disconnected());
                return Err(e.into());
            }
        };

        bot.register();
        for channel in &self.config.irc.channels {
            bot.join(channel);
        }

        let mut control_open = true;
        let mut quitting = false;
        loop {
            tokio::select! {
                biased;

                event = control.recv(), if control_open => match event {
                    Some(ControlEvent::Terminate) if quitting => {
                        warn!("Terminate requested again, closing connection");
                        break;
                    }
                    Some(ControlEvent::Terminate) => {
                        info!("Quitting");
                        quitting = true;
                        bot.quit();
                    }
                    Some(ControlEvent::Flush) => {
                        info!("Flushing");
                        bot.flush().await;
                    }
                    None => control_open = false,
                },

                line = conn.next_line() => match line {
                    Some(Ok(line)) => bot.handle_line(&line).await,
                    Some(Err(e)) => {
                        error!(peer = conn.peer(), error = %e, "Read failed");
                        break;
                    }
                    None => {
                        info!(peer = conn.peer(), "Server closed the connection");
                        break;
                    }
                },
            }
        }

        bot.flush().await;
        bot.context_mut()
            .session_mut()
            .set_outbound(Outbound::disconnected());
        conn.finish().await;
        Ok(())
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a `BotRuntime` with custom configuration.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration file if one is given, else searches for one.
    pub fn maybe_config_file<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        self.config_loader = self.config_loader.maybe_file(path);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Overrides one configuration key, e.g. `("irc.nick", "batty")`.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> ConfigResult<BotRuntime> {
        let config = self.config_loader.load()?;
        Ok(BotRuntime::from_config(config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_config() {
        let mut config = BotConfig::default();
        config.irc.nick = "batty".to_string();
        config.irc.greeting = false;
        config.storage.data_dir = Some("/var/lib/batty".into());
        config.options_file = Some("batty.options.yaml".to_string());

        let runtime = BotRuntime::from_config(config);
        let ctx = runtime.context();
        assert_eq!(ctx.nick(), "batty");
        assert!(!ctx.session().greeting());
        assert!(ctx.session().channels().is_empty());
        assert_eq!(ctx.store().base_dir(), Some(Path::new("/var/lib/batty")));
        assert_eq!(ctx.options_file(), Some("batty.options.yaml"));
    }

    #[test]
    fn test_context_without_data_dir() {
        let runtime = BotRuntime::from_config(BotConfig::default());
        assert!(runtime.context().store().base_dir().is_none());
    }
}
