//! Message routing.
//!
//! [`Bot`] pairs a handler chain with its [`BotContext`] and processes inbound
//! lines one at a time: keep-alives and renames are handled directly, messages
//! addressed to the bot (`<nick>: <command> [<argument>]`) are dispatched, and
//! whatever content survives goes to the passive [`Handler::react`] hook.

use ircbot_core::Inbound;
use tracing::{debug, trace};

use crate::command::CommandCall;
use crate::context::BotContext;
use crate::handler::{Dispatch, Handler, Tier, join_channel};
use crate::reply::errmsg;

/// Splits `text` into command word and argument if it starts with `nick`
/// (case-insensitively) followed by `:`, `,` or whitespace.
pub fn parse_addressed<'a>(nick: &str, text: &'a str) -> Option<(&'a str, Option<&'a str>)> {
    let text = text.trim_start();
    let head = text.get(..nick.len())?;
    if nick.is_empty() || !head.eq_ignore_ascii_case(nick) {
        return None;
    }
    let rest = &text[nick.len()..];
    let separator = rest.chars().next()?;
    if !(separator == ':' || separator == ',' || separator.is_whitespace()) {
        return None;
    }
    let rest = rest[separator.len_utf8()..].trim_start();
    let (command, argument) = match rest.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (rest, ""),
    };
    if command.is_empty() {
        return None;
    }
    Some((command, Some(argument).filter(|a| !a.is_empty())))
}

pub struct Bot<H> {
    handler: H,
    ctx: BotContext,
}

impl<H: Handler> Bot<H> {
    /// Declares the chain's options and installs its state.
    pub fn new(handler: H, mut ctx: BotContext) -> Self {
        handler.make_options(ctx.options_mut());
        handler.init(&mut ctx);
        Self { handler, ctx }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut BotContext {
        &mut self.ctx
    }

    /// Runs the chain's startup hook (e.g. loading the cache file).
    pub async fn start(&mut self) {
        self.handler.start(&mut self.ctx).await;
    }

    /// Sends the identity registration lines.
    pub fn register(&self) {
        self.ctx.session().register();
    }

    pub fn join(&mut self, channel: &str) -> bool {
        join_channel(&self.handler, &mut self.ctx, channel)
    }

    pub fn part(&mut self, channel: &str) -> bool {
        self.ctx.session_mut().part(channel)
    }

    /// Parts every channel and ends the session.
    pub fn quit(&mut self) {
        self.ctx.session_mut().quit();
    }

    /// Runs every layer's flush hook.
    pub async fn flush(&mut self) {
        self.handler.flush(&mut self.ctx).await;
    }

    /// Processes one inbound line.
    pub async fn handle_line(&mut self, line: &str) {
        match self.ctx.session().classify(line) {
            Inbound::Ping(token) => self.ctx.session().pong(token),
            Inbound::NickChanged(nick) => self.ctx.session_mut().set_nick(nick),
            Inbound::Message {
                channel,
                sender,
                text,
            } => self.handle_message(channel, sender, text).await,
            Inbound::Other => trace!("ignored line"),
        }
    }

    /// Routes a message from `sender` on `channel`.
    pub async fn handle_message(&mut self, channel: &str, sender: &str, text: &str) {
        let mut content = text.to_string();

        if let Some((command, argument)) = parse_addressed(self.ctx.nick(), text) {
            let call = CommandCall::new(channel, sender, command, argument);
            debug!(channel, sender, command = %call.command, "command");
            match self.dispatch(&call).await {
                Dispatch::Pass => {}
                Dispatch::Replace(replacement) => content = replacement,
                Dispatch::Unknown => {
                    self.ctx.say_to(
                        channel,
                        errmsg(sender, format!("I don't understand command {}", call.command)),
                    );
                    return;
                }
                Dispatch::Done | Dispatch::NotFound => return,
            }
        }

        self.handler
            .react(&mut self.ctx, channel, sender, &content)
            .await;
    }

    /// Looks `call` up in the privileged tier (admin channels only), then
    /// in the plain tier. Never returns [`Dispatch::NotFound`].
    pub async fn dispatch(&mut self, call: &CommandCall) -> Dispatch {
        if self.handler.is_admin(&self.ctx, &call.channel) {
            let outcome = self
                .handler
                .dispatch(&self.handler, &mut self.ctx, call, Tier::Privileged)
                .await;
            if outcome != Dispatch::NotFound {
                return outcome;
            }
        }
        match self
            .handler
            .dispatch(&self.handler, &mut self.ctx, call, Tier::Plain)
            .await
        {
            Dispatch::NotFound => Dispatch::Unknown,
            outcome => outcome,
        }
    }
}
