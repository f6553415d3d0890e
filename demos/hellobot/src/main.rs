//! Hello Bot
//!
//! The smallest useful bot: a single layer on top of [`Base`] that answers
//! every addressed message with `Hello, <nick>!`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package hellobot -- --server irc.example.net --nick hellobot --channel '#test'
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ircbot::prelude::*;
use tracing::debug;

// ============================================================================
// Hello layer
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct HelloLayer;

impl<S> Layer<S> for HelloLayer {
    type Service = Hello<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Hello { inner }
    }
}

struct Hello<S> {
    inner: S,
}

#[async_trait]
impl<S: Handler> Handler for Hello<S> {
    fn next(&self) -> Option<&dyn Handler> {
        Some(&self.inner)
    }

    async fn dispatch(
        &self,
        _root: &dyn Handler,
        ctx: &mut BotContext,
        call: &CommandCall,
        tier: Tier,
    ) -> Dispatch {
        if tier != Tier::Plain {
            return Dispatch::NotFound;
        }
        debug!(channel = %call.channel, sender = %call.sender, "greeting");
        ctx.say_to(&call.channel, format!("Hello, {}!", call.sender));
        Dispatch::Done
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (default: search for ircbot.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    server: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    nick: Option<String>,

    /// Channel to join; repeatable
    #[arg(long = "channel")]
    channels: Vec<String>,
}

impl Args {
    fn runtime(self) -> Result<BotRuntime> {
        let mut builder = BotRuntime::builder().maybe_config_file(self.config);
        if let Some(server) = self.server {
            builder = builder.set("irc.server", server);
        }
        if let Some(port) = self.port {
            builder = builder.set("irc.port", port);
        }
        if let Some(nick) = self.nick {
            builder = builder.set("irc.nick", nick);
        }
        if !self.channels.is_empty() {
            builder = builder.set("irc.channels", self.channels);
        }
        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let runtime = Args::parse().runtime()?;
    let handler = ServiceBuilder::new().layer(HelloLayer).service(Base);
    runtime.run(handler).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ircbot_core::{Outbound, Session};

    #[tokio::test]
    async fn test_hello_to_every_command() {
        let (outbound, mut rx) = Outbound::channel();
        let session = Session::new("irc.example.net", 6667, "hellobot").with_outbound(outbound);
        let handler = ServiceBuilder::new().layer(HelloLayer).service(Base);
        let mut bot = Bot::new(handler, BotContext::new(session));

        bot.handle_message("#test", "alice", "hellobot: anything at all")
            .await;
        bot.handle_message("#test", "bob", "hellobot, help").await;
        bot.handle_message("#test", "carol", "not for the bot").await;

        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #test :Hello, alice!");
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #test :Hello, bob!");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from([
            "hellobot",
            "--server",
            "irc.example.net",
            "--channel",
            "#a",
            "--channel",
            "#b",
        ]);
        assert_eq!(args.server.as_deref(), Some("irc.example.net"));
        assert_eq!(args.channels, ["#a", "#b"]);
        assert!(args.config.is_none());
    }
}
