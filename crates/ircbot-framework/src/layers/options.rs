//! Admin commands over the option registry.

use async_trait::async_trait;
use serde_json::{Value, json};
use tower_layer::Layer;

use crate::command::{CommandCall, CommandTable};
use crate::context::BotContext;
use crate::handler::{Dispatch, Handler, Tier};
use crate::help::HelpSink;
use crate::options::{
    OptionRegistry, OptionSpec, OptionType, list_options, load_options, save_options, set_option,
};
use crate::reply::{errmsg, okmsg};
use crate::storage::is_plain_file_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Options,
    SetOption,
    LoadOptions,
    SaveOptions,
}

/// Declares the session options and adds `options`, `set-option`,
/// `load-options` and `save-options` for admins.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsLayer;

impl OptionsLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for OptionsLayer {
    type Service = Options<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Options {
            inner,
            table: CommandTable::new()
                .with("options", Command::Options)
                .with("set-option", Command::SetOption)
                .with("load-options", Command::LoadOptions)
                .with("save-options", Command::SaveOptions),
        }
    }
}

pub struct Options<S> {
    inner: S,
    table: CommandTable<Command>,
}

/// Splits a `set-option` argument into name and JSON value. A missing value
/// means `null`; an unparsable one is returned as `Err` with its text.
pub fn parse_set_argument(arg: &str) -> (&str, Result<Value, &str>) {
    let (name, value) = match arg.find(|c: char| c == ':' || c.is_whitespace()) {
        Some(at) => {
            let sep_len = arg[at..].chars().next().map_or(1, char::len_utf8);
            (&arg[..at], arg[at + sep_len..].trim_start())
        }
        None => (arg, ""),
    };
    if value.is_empty() {
        return (name, Ok(Value::Null));
    }
    (name, serde_json::from_str(value).map_err(|_| value))
}

async fn run(ctx: &mut BotContext, call: &CommandCall, command: Command) {
    let channel = call.channel.as_str();
    let nick = call.sender.as_str();

    match command {
        Command::Options => match list_options(ctx, call.arg()) {
            Ok(listed) => {
                ctx.say_to(channel, okmsg("options {"));
                for (name, value) in listed {
                    ctx.say_to(channel, format!("{name}: {value}"));
                }
                ctx.say_to(channel, "}");
            }
            Err(e) => ctx.say_to(channel, errmsg(nick, format!("bad pattern: {e}"))),
        },
        Command::SetOption => {
            let Some(arg) = call.arg() else {
                ctx.say_to(channel, errmsg(nick, "no option is given"));
                return;
            };
            let (name, value) = parse_set_argument(arg);
            let reply = match value {
                Ok(value) => set_option(ctx, name, value).reply(nick),
                Err(text) => errmsg(nick, format!("can't parse value {text:?}")),
            };
            ctx.say_to(channel, reply);
        }
        Command::LoadOptions | Command::SaveOptions => {
            if call.arg().is_some_and(|f| !is_plain_file_name(f)) {
                ctx.say_to(channel, errmsg(nick, "name of target file can't contain '/'"));
                return;
            }
            let report = if command == Command::LoadOptions {
                load_options(ctx, call.arg()).await
            } else {
                save_options(ctx, call.arg()).await
            };
            ctx.say_to(channel, report.reply(nick));
        }
    }
}

#[async_trait]
impl<S: Handler> Handler for Options<S> {
    fn next(&self) -> Option<&dyn Handler> {
        Some(&self.inner)
    }

    fn make_options(&self, options: &mut OptionRegistry) {
        self.inner.make_options(options);
        options
            .declare(OptionSpec::new(
                "greeting",
                &[OptionType::Bool],
                |ctx| json!(ctx.session().greeting()),
                |ctx, value| {
                    let greeting = value.as_bool().unwrap_or_default();
                    ctx.session_mut().set_greeting(greeting);
                },
            ))
            .declare(OptionSpec::read_only("server", |ctx| {
                json!(ctx.session().server())
            }))
            .declare(OptionSpec::read_only("port", |ctx| {
                json!(ctx.session().port())
            }))
            .declare(OptionSpec::read_only("nick", |ctx| json!(ctx.nick())))
            .declare(OptionSpec::read_only("channels", |ctx| {
                json!(ctx.session().channels())
            }));
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
            run(ctx, call, command).await;
            return Dispatch::Done;
        }
        self.inner.dispatch(root, ctx, call, tier).await
    }

    fn help(&self, ctx: &BotContext, channel: &str, help: &mut HelpSink) {
        self.inner.help(ctx, channel, help);
        if !self.is_admin(ctx, channel) {
            return;
        }
        help.command(
            "options",
            "[<pattern>] -- show options (matching <pattern> if given)",
        )
        .command("set-option", "<option> [<value>] -- set/unset <option>")
        .command(
            "load-options",
            "[<file>] -- load options from <file> or default location",
        )
        .command(
            "save-options",
            "[<file>] -- save options to <file> or default location",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_argument() {
        assert_eq!(parse_set_argument("cache_expiry 24"), ("cache_expiry", Ok(json!(24))));
        assert_eq!(parse_set_argument("hush:  30"), ("hush", Ok(json!(30))));
        assert_eq!(parse_set_argument("cache_file"), ("cache_file", Ok(Value::Null)));
        assert_eq!(
            parse_set_argument(r#"gerrit_alt ["review.example.org"]"#),
            ("gerrit_alt", Ok(json!(["review.example.org"])))
        );
        assert_eq!(parse_set_argument("greeting yes"), ("greeting", Err("yes")));
    }
}
