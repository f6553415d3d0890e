//! The wire-level session: identity, joined channels and the outbound queue.
//!
//! A [`Session`] never touches the socket itself. Lines are pushed onto an
//! [`Outbound`] queue which the transport drains, so the session stays usable
//! (and testable) before a connection exists.

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::wire::{self, Inbound};

// =============================================================================
// Outbound queue
// =============================================================================

/// Sending half of the outbound line queue.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl Outbound {
    /// Creates a connected queue and returns its receiving half.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A queue that discards everything sent to it.
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Queues one raw line (without line terminator).
    pub fn send(&self, line: impl Into<String>) {
        let line = line.into();
        debug!(target: "ircbot::wire", "> {line}");
        match &self.tx {
            Some(tx) if tx.send(line).is_ok() => {}
            _ => trace!("outbound queue is not connected, line dropped"),
        }
    }

    /// Returns `true` if a receiver is still listening.
    pub fn is_connected(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl Default for Outbound {
    fn default() -> Self {
        Self::disconnected()
    }
}

// =============================================================================
// Session
// =============================================================================

/// Identity and channel membership of the bot on one server.
#[derive(Debug)]
pub struct Session {
    server: String,
    port: u16,
    nick: String,
    greeting: bool,
    channels: Vec<String>,
    outbound: Outbound,
}

impl Session {
    pub fn new(server: impl Into<String>, port: u16, nick: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port,
            nick: nick.into(),
            greeting: true,
            channels: Vec::new(),
            outbound: Outbound::disconnected(),
        }
    }

    /// Sets whether joining a channel triggers the extended greeting.
    pub fn with_greeting(mut self, greeting: bool) -> Self {
        self.greeting = greeting;
        self
    }

    pub fn with_outbound(mut self, outbound: Outbound) -> Self {
        self.outbound = outbound;
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn greeting(&self) -> bool {
        self.greeting
    }

    pub fn set_greeting(&mut self, greeting: bool) {
        self.greeting = greeting;
    }

    /// Joined channels and private peers, in join order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn is_joined(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c == channel)
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Replaces the outbound queue, e.g. once a connection is established.
    pub fn set_outbound(&mut self, outbound: Outbound) {
        self.outbound = outbound;
    }

    /// Classifies an inbound line against the current nick and channels.
    pub fn classify<'a>(&self, line: &'a str) -> Inbound<'a> {
        Inbound::classify(line, &self.nick, &self.channels)
    }

    // ─── Outbound primitives ───

    /// Sends a raw line.
    pub fn say(&self, line: impl Into<String>) {
        self.outbound.send(line);
    }

    /// Emits the two identity-registration lines.
    pub fn register(&self) {
        self.say(wire::nick_line(&self.nick));
        self.say(wire::user_line(&self.nick));
    }

    /// Sends one `PRIVMSG` line to `channel`.
    pub fn say_to(&self, channel: &str, text: impl AsRef<str>) {
        self.say(wire::privmsg_line(channel, text.as_ref()));
    }

    /// Sends several fragments as one comma-joined `PRIVMSG` line.
    pub fn say_fragments<I, S>(&self, channel: &str, fragments: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let text = fragments
            .into_iter()
            .map(|f| f.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.say_to(channel, text);
    }

    pub fn pong(&self, token: &str) {
        self.say(wire::pong_line(token));
    }

    /// Asks the server for a new nick. The local nick changes only once the
    /// server confirms.
    pub fn request_nick(&self, nick: &str) {
        self.say(wire::nick_line(nick));
    }

    /// Applies a server-confirmed rename.
    pub fn set_nick(&mut self, nick: impl Into<String>) {
        let nick = nick.into();
        info!(old = %self.nick, new = %nick, "nick changed");
        self.nick = nick;
    }

    // ─── Membership ───

    /// Joins `channel`: `JOIN` for broadcast channels, then the scripted
    /// action. Returns `false` if the channel was already joined.
    ///
    /// The extended greeting is up to the caller, see [`Session::greeting`].
    pub fn join(&mut self, channel: &str) -> bool {
        if self.is_joined(channel) {
            return false;
        }
        if wire::is_broadcast(channel) {
            self.say(wire::join_line(channel));
        }
        self.say_to(channel, wire::action(wire::JOIN_ACTION));
        self.channels.push(channel.to_string());
        info!(channel, "joined");
        true
    }

    /// Leaves `channel`. Returns `false` if it was not joined.
    pub fn part(&mut self, channel: &str) -> bool {
        let Some(pos) = self.channels.iter().position(|c| c == channel) else {
            return false;
        };
        if wire::is_broadcast(channel) {
            self.say(wire::part_line(channel));
        }
        self.channels.remove(pos);
        info!(channel, "parted");
        true
    }

    /// Parts every channel, then ends the session.
    pub fn quit(&mut self) {
        for channel in self.channels.clone() {
            self.part(&channel);
        }
        self.say(wire::quit_line());
    }
}
