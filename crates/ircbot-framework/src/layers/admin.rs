//! Admin gating.
//!
//! Privilege is keyed by the channel or private peer a command was sent to,
//! not by the nick speaking: anyone talking in an admin channel may run
//! admin commands there.

use async_trait::async_trait;
use serde_json::json;
use tower_layer::Layer;
use tracing::info;

use crate::command::{CommandCall, CommandTable};
use crate::context::BotContext;
use crate::handler::{Dispatch, Handler, Tier, join_channel};
use crate::help::HelpSink;
use crate::options::{OptionRegistry, OptionSpec};
use crate::reply::{errmsg, okmsg};

/// Channels and peers with admin rights, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminSet {
    admins: Vec<String>,
}

impl AdminSet {
    pub fn new(admins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut set = Self::default();
        for admin in admins {
            set.add(admin);
        }
        set
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.admins.iter().any(|a| a == identity)
    }

    /// Returns `false` if already present.
    pub fn add(&mut self, identity: impl Into<String>) -> bool {
        let identity = identity.into();
        if self.contains(&identity) {
            return false;
        }
        self.admins.push(identity);
        true
    }

    /// Returns `false` if not present.
    pub fn remove(&mut self, identity: &str) -> bool {
        let before = self.admins.len();
        self.admins.retain(|a| a != identity);
        self.admins.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.admins.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Admins,
    AddAdmin,
    RemoveAdmin,
    Channels,
    Join,
    Part,
    Nick,
    Quit,
}

#[derive(Debug, Clone, Default)]
pub struct AdminLayer {
    admins: Vec<String>,
}

impl AdminLayer {
    /// `admins` is the initial admin set.
    pub fn new(admins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S> Layer<S> for AdminLayer {
    type Service = Admin<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Admin {
            inner,
            initial: self.admins.clone(),
            table: CommandTable::new()
                .with("admins", Command::Admins)
                .with("add-admin", Command::AddAdmin)
                .with("remove-admin", Command::RemoveAdmin)
                .with("channels", Command::Channels)
                .with("join", Command::Join)
                .with("part", Command::Part)
                .with("nick", Command::Nick)
                .with("quit", Command::Quit),
        }
    }
}

pub struct Admin<S> {
    inner: S,
    initial: Vec<String>,
    table: CommandTable<Command>,
}

/// Reply pattern shared by the mutating admin commands: complain about a
/// missing argument, run `action` if `allowed`, otherwise report `refused`.
struct Guarded<'a> {
    kind: &'a str,
    allowed: bool,
    done: String,
    refused: String,
}

impl Guarded<'_> {
    fn run(self, ctx: &mut BotContext, call: &CommandCall, action: impl FnOnce(&mut BotContext)) {
        let reply = if call.arg().is_none() {
            errmsg(&call.sender, format!("no {} is given", self.kind))
        } else if self.allowed {
            action(ctx);
            okmsg(self.done)
        } else {
            errmsg(&call.sender, self.refused)
        };
        ctx.say_to(&call.channel, reply);
    }
}

fn admins(ctx: &BotContext) -> impl Iterator<Item = &str> {
    ctx.state::<AdminSet>().into_iter().flat_map(AdminSet::iter)
}

impl<S> Admin<S> {
    fn run(&self, root: &dyn Handler, ctx: &mut BotContext, call: &CommandCall, command: Command) {
        let arg = call.arg().unwrap_or_default().to_string();
        let is_admin = ctx
            .state::<AdminSet>()
            .is_some_and(|set| set.contains(&arg));
        let joined = ctx.session().is_joined(&arg);

        match command {
            Command::Admins => {
                let list = admins(ctx).collect::<Vec<_>>().join(", ");
                ctx.say_to(&call.channel, okmsg(format!("admins: {list}")));
            }
            Command::AddAdmin => Guarded {
                kind: "name",
                allowed: !is_admin,
                done: format!("made {arg} an admin"),
                refused: format!("{arg} is already an admin"),
            }
            .run(ctx, call, |ctx| {
                info!(admin = %arg, "admin added");
                ctx.state_mut::<AdminSet>().add(arg.clone());
            }),
            Command::RemoveAdmin => Guarded {
                kind: "name",
                allowed: is_admin,
                done: format!("{arg} is not an admin anymore"),
                refused: format!("{arg} is not an admin"),
            }
            .run(ctx, call, |ctx| {
                info!(admin = %arg, "admin removed");
                ctx.state_mut::<AdminSet>().remove(&arg);
            }),
            Command::Channels => {
                let list = ctx.session().channels().join(", ");
                ctx.say_to(&call.channel, okmsg(format!("channels: {list}")));
            }
            Command::Join => Guarded {
                kind: "channel",
                allowed: !joined,
                done: format!("joined {arg}"),
                refused: format!("already in {arg}"),
            }
            .run(ctx, call, |ctx| {
                join_channel(root, ctx, &arg);
            }),
            Command::Part => Guarded {
                kind: "channel",
                allowed: joined,
                done: format!("parted from {arg}"),
                refused: format!("not in {arg}"),
            }
            .run(ctx, call, |ctx| {
                ctx.session_mut().part(&arg);
            }),
            Command::Nick => match call.arg() {
                None => ctx.say_to(&call.channel, errmsg(&call.sender, "no nick is given")),
                Some(nick) => {
                    ctx.say_to(
                        &call.channel,
                        okmsg(format!(
                            "attempting to change nick from {} to {nick}...",
                            ctx.nick()
                        )),
                    );
                    ctx.session().request_nick(nick);
                }
            },
            Command::Quit => {
                ctx.say_to(&call.channel, okmsg("quitting..."));
                ctx.session_mut().quit();
            }
        }
    }
}

#[async_trait]
impl<S: Handler> Handler for Admin<S> {
    fn next(&self) -> Option<&dyn Handler> {
        Some(&self.inner)
    }

    fn make_options(&self, options: &mut OptionRegistry) {
        self.inner.make_options(options);
        options.declare(OptionSpec::read_only("admins", |ctx| {
            json!(admins(ctx).collect::<Vec<_>>())
        }));
    }

    fn init(&self, ctx: &mut BotContext) {
        self.inner.init(ctx);
        ctx.set_state(AdminSet::new(self.initial.iter().cloned()));
    }

    fn is_admin(&self, ctx: &BotContext, identity: &str) -> bool {
        ctx.state::<AdminSet>()
            .is_some_and(|set| set.contains(identity))
    }

    async fn dispatch(
        &self,
        root: &dyn Handler,
        ctx: &mut BotContext,
        call: &CommandCall,
        tier: Tier,
    ) -> Dispatch {
        if tier == Tier::Privileged
            && let Some(command) = self.table.lookup(&call.command)
        {
            self.run(root, ctx, call, command);
            return Dispatch::Done;
        }
        self.inner.dispatch(root, ctx, call, tier).await
    }

    fn help(&self, ctx: &BotContext, channel: &str, help: &mut HelpSink) {
        self.inner.help(ctx, channel, help);
        if !self.is_admin(ctx, channel) {
            return;
        }
        help.info("Admin commands: {")
            .command("admins", "-- show list of admins")
            .command("add-admin", "<name>")
            .command("remove-admin", "<name>")
            .command("channels", "-- show channels joined")
            .command("join", "<chan>")
            .command("part", "<chan>")
            .command("nick", "<nick> -- try to change nick to <nick>")
            .command("quit", "")
            .info("}");
    }
}
