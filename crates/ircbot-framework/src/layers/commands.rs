//! The base command layer: `help` and the unknown-command fallback.

use async_trait::async_trait;
use tower_layer::Layer;

use crate::command::{CommandCall, CommandTable};
use crate::context::BotContext;
use crate::handler::{Dispatch, Handler, Tier};
use crate::help::HelpSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Help,
}

/// Adds `help` and turns unroutable plain commands into `fallback`.
#[derive(Debug, Clone)]
pub struct CommandsLayer {
    fallback: Dispatch,
}

impl CommandsLayer {
    /// Unknown commands get the "I don't understand" reply.
    pub fn new() -> Self {
        Self {
            fallback: Dispatch::Unknown,
        }
    }

    /// Result for plain commands no layer knows.
    pub fn fallback(mut self, fallback: Dispatch) -> Self {
        self.fallback = fallback;
        self
    }
}

impl Default for CommandsLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CommandsLayer {
    type Service = Commands<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Commands {
            inner,
            fallback: self.fallback.clone(),
            table: CommandTable::new().with("help", Command::Help),
        }
    }
}

pub struct Commands<S> {
    inner: S,
    fallback: Dispatch,
    table: CommandTable<Command>,
}

/// Collects help from the whole chain and says it to `channel`.
pub fn say_help(root: &dyn Handler, ctx: &BotContext, channel: &str) {
    let mut help = HelpSink::new();
    root.help(ctx, channel, &mut help);
    for line in help.render(ctx.nick()) {
        ctx.say_to(channel, line);
    }
}

#[async_trait]
impl<S: Handler> Handler for Commands<S> {
    fn next(&self) -> Option<&dyn Handler> {
        Some(&self.inner)
    }

    async fn dispatch(
        &self,
        root: &dyn Handler,
        ctx: &mut BotContext,
        call: &CommandCall,
        tier: Tier,
    ) -> Dispatch {
        if tier == Tier::Plain
            && let Some(Command::Help) = self.table.lookup(&call.command)
        {
            say_help(root, ctx, &call.channel);
            return Dispatch::Done;
        }
        match self.inner.dispatch(root, ctx, call, tier).await {
            Dispatch::NotFound if tier == Tier::Plain => self.fallback.clone(),
            outcome => outcome,
        }
    }

    fn help(&self, ctx: &BotContext, channel: &str, help: &mut HelpSink) {
        self.inner.help(ctx, channel, help);
        help.command("help", "-- this message");
    }

    fn greet(&self, ctx: &BotContext, channel: &str) {
        self.inner.greet(ctx, channel);
        ctx.say_to(
            channel,
            format!("Type \"{}: help\" to know more.", ctx.nick()),
        );
    }
}
