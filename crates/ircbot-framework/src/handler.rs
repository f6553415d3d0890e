//! The layered handler chain.
//!
//! A bot is a stack of [`Handler`]s, outermost first, ending in [`Base`].
//! Every layer points at the one below through [`Handler::next`]; the
//! provided methods forward there, so a layer only overrides the hooks it
//! extends and calls `next` before or after its own logic.
//!
//! Layers are built with tower's [`Layer`](tower_layer::Layer) and composed
//! with tower's `ServiceBuilder`:
//!
//! ```rust,ignore
//! let handler = ServiceBuilder::new()
//!     .layer(CacheLayer::new(settings))
//!     .layer(OptionsLayer::new())
//!     .layer(AdminLayer::new(admins))
//!     .layer(CommandsLayer::new())
//!     .service(Base);
//! ```
//!
//! Commands are looked up in two tiers. The router first asks the whole
//! chain for a [`Tier::Privileged`] route (only when the addressing channel
//! is an admin), then for a [`Tier::Plain`] one. A privileged command is
//! therefore never shadowed by a plain one of the same name, and is
//! invisible to everybody else.

use async_trait::async_trait;

use crate::command::CommandCall;
use crate::context::BotContext;
use crate::help::HelpSink;
use crate::options::OptionRegistry;

/// Result of dispatching a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// No layer knows the command in the asked tier.
    NotFound,
    /// Continue with passive handling of the original text.
    Pass,
    /// Continue with passive handling of this text instead.
    Replace(String),
    /// Reply "I don't understand command ...".
    Unknown,
    /// Handled; stop.
    Done,
}

/// Command lookup tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Admin-only commands.
    Privileged,
    /// Commands anyone may use.
    Plain,
}

#[async_trait]
pub trait Handler: Send + Sync {
    /// The layer below, `None` for the base.
    fn next(&self) -> Option<&dyn Handler>;

    /// Declares options. Layers call `next` first, then append their own.
    fn make_options(&self, options: &mut OptionRegistry) {
        if let Some(next) = self.next() {
            next.make_options(options);
        }
    }

    /// Installs layer state into the context. Runs once, before connecting.
    fn init(&self, ctx: &mut BotContext) {
        if let Some(next) = self.next() {
            next.init(ctx);
        }
    }

    /// Startup work needing I/O, e.g. loading persisted state.
    async fn start(&self, ctx: &mut BotContext) {
        if let Some(next) = self.next() {
            next.start(ctx).await;
        }
    }

    /// Whether `identity` (a channel or private peer) has admin rights.
    fn is_admin(&self, ctx: &BotContext, identity: &str) -> bool {
        self.next().is_some_and(|next| next.is_admin(ctx, identity))
    }

    /// Runs `call` if this layer (or one below) has a route for it in `tier`.
    ///
    /// `root` is the outermost handler, for commands that need the whole
    /// chain (help aggregation, greeting a freshly joined channel).
    async fn dispatch(
        &self,
        root: &dyn Handler,
        ctx: &mut BotContext,
        call: &CommandCall,
        tier: Tier,
    ) -> Dispatch {
        match self.next() {
            Some(next) => next.dispatch(root, ctx, call, tier).await,
            None => Dispatch::NotFound,
        }
    }

    /// Contributes help entries for `channel`. Layers call `next` first.
    fn help(&self, ctx: &BotContext, channel: &str, help: &mut HelpSink) {
        if let Some(next) = self.next() {
            next.help(ctx, channel, help);
        }
    }

    /// Extended greeting for a freshly joined channel.
    fn greet(&self, ctx: &BotContext, channel: &str) {
        if let Some(next) = self.next() {
            next.greet(ctx, channel);
        }
    }

    /// Passive handling of message content.
    async fn react(&self, ctx: &mut BotContext, channel: &str, sender: &str, content: &str) {
        if let Some(next) = self.next() {
            next.react(ctx, channel, sender, content).await;
        }
    }

    /// Persists state on request and at shutdown.
    async fn flush(&self, ctx: &mut BotContext) {
        if let Some(next) = self.next() {
            next.flush(ctx).await;
        }
    }
}

/// Bottom of every chain: knows no commands and ignores passive content.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base;

impl Handler for Base {
    fn next(&self) -> Option<&dyn Handler> {
        None
    }
}

/// Joins `channel` and, with greeting enabled, greets it through `root`.
///
/// Returns `false` if the channel was already joined.
pub fn join_channel(root: &dyn Handler, ctx: &mut BotContext, channel: &str) -> bool {
    if !ctx.session_mut().join(channel) {
        return false;
    }
    if ctx.session().greeting() {
        root.greet(ctx, channel);
    }
    true
}
