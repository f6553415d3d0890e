//! The Bugzilla/Gerrit layer.
//!
//! Sits on top of the standard stack and relies on the cache layer below it
//! for lookups. Unaddressed content is scanned for references, which are
//! fetched through the cache and announced unless the same reference was
//! announced within the hush window.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use ircbot::framework::Clock;
use ircbot::framework::layers::cache::cache_mut;
use ircbot::prelude::*;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::fetch::{ApiKey, BUG_NOT_FOUND, bugzilla_url};
use crate::refs::{BUGZILLA, BUGZILLA_TOKENS, GERRIT, GERRIT_TOKENS, RefScanner, service_for_token};
use crate::settings::{BattySettings, host_list};

/// Prefix of bugs announced as part of a Gerrit change.
const COMMIT_BUG_DECOR: &str = "`-> ";

/// Layer state kept in the context.
#[derive(Debug, Clone)]
pub struct BattyState {
    /// Seconds; `None` announces every time.
    pub hush: Option<i64>,
    pub bugzilla_host: String,
    pub bugzilla_alt: Vec<String>,
    pub gerrit_host: String,
    pub gerrit_alt: Vec<String>,
    pub gerrit_user: Option<String>,
    pub gerrit_port: u16,
    pub api_key: ApiKey,
    pub scanner: RefScanner,
    /// Last announcement per reference. Never persisted.
    pub access_log: HashMap<CacheKey, DateTime<Utc>>,
}

impl BattyState {
    /// Recompiles the scanner after a host list changed. A failure keeps
    /// the previous one.
    fn rescan(&mut self) {
        let scanner = RefScanner::new(
            &host_list(&self.bugzilla_host, &self.bugzilla_alt),
            &host_list(&self.gerrit_host, &self.gerrit_alt),
        );
        match scanner {
            Ok(scanner) => self.scanner = scanner,
            Err(e) => warn!(error = %e, "keeping previous reference patterns"),
        }
    }

    fn is_hushed(&self, key: &CacheKey, now: DateTime<Utc>) -> bool {
        let Some(hush) = self.hush else {
            return false;
        };
        self.access_log.get(key).is_some_and(|last| {
            Duration::try_seconds(hush)
                .and_then(|window| last.checked_add_signed(window))
                .is_none_or(|until| until > now)
        })
    }
}

fn batty(ctx: &BotContext) -> Option<&BattyState> {
    ctx.state::<BattyState>()
}

fn batty_mut(ctx: &mut BotContext) -> Option<&mut BattyState> {
    ctx.get_state_mut::<BattyState>()
}

/// Records an announcement of `key` now, unless it is hushed. Returns
/// whether to announce.
fn note_access(ctx: &mut BotContext, key: &CacheKey) -> bool {
    let now = cache_mut(ctx).clock().now();
    let Some(state) = batty_mut(ctx) else {
        return true;
    };
    if state.is_hushed(key, now) {
        debug!(key = %key, "hushed");
        return false;
    }
    state.access_log.insert(key.clone(), now);
    true
}

fn change_field<'a>(change: &'a Lookup, name: &str) -> Option<&'a str> {
    change.value()?.get(name)?.as_str()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Longest accepted hush window (one year).
const MAX_HUSH_SECONDS: i64 = 365 * 24 * 60 * 60;

fn reject_huge_hush(value: &Value) -> Result<(), String> {
    match value.as_i64() {
        Some(seconds) if seconds > MAX_HUSH_SECONDS => {
            Err(format!("hush can't exceed {MAX_HUSH_SECONDS} seconds"))
        }
        _ => Ok(()),
    }
}

fn reject_non_strings(value: &Value) -> Result<(), String> {
    match value.as_array() {
        Some(items) if items.iter().all(Value::is_string) => Ok(()),
        _ => Err("host list must contain strings only".to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Forget,
    Refetch,
    ShowCache,
}

// =============================================================================
// Layer
// =============================================================================

#[derive(Debug, Clone)]
pub struct BattyLayer {
    settings: BattySettings,
    fetchers: Fetchers,
    api_key: ApiKey,
    scanner: RefScanner,
    prefetch: Vec<String>,
}

impl BattyLayer {
    pub fn new(settings: BattySettings, fetchers: Fetchers) -> Result<Self, regex::Error> {
        let scanner = RefScanner::new(&settings.bugzilla_hosts(), &settings.gerrit_hosts())?;
        Ok(Self {
            settings,
            fetchers,
            api_key: ApiKey::default(),
            scanner,
            prefetch: Vec::new(),
        })
    }

    /// Shares `api_key` with the Bugzilla fetcher, so the option reaches it.
    pub fn with_api_key(mut self, api_key: ApiKey) -> Self {
        self.api_key = api_key;
        self
    }

    /// References (`bz:1`, `gerrit:2`...) to fetch into the cache at startup.
    pub fn with_prefetch(mut self, refs: Vec<String>) -> Self {
        self.prefetch = refs;
        self
    }
}

impl<S> Layer<S> for BattyLayer {
    type Service = Batty<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Batty {
            inner,
            layer: self.clone(),
            plain: CommandTable::new()
                .with("forget", Command::Forget)
                .with("refetch", Command::Refetch)
                .with("show-cache", Command::ShowCache),
        }
    }
}

pub struct Batty<S> {
    inner: S,
    layer: BattyLayer,
    plain: CommandTable<Command>,
}

impl<S: Handler> Batty<S> {
    /// Fetches and announces bug `id`, prefixed with `decor`.
    async fn announce_bug(&self, ctx: &mut BotContext, channel: &str, id: &str, decor: &str) {
        let key = CacheKey::new(BUGZILLA, id);
        let info = cache_fetch(ctx, &self.layer.fetchers, key.clone()).await;
        if !note_access(ctx, &key) {
            return;
        }
        let host = batty(ctx).map_or("", |s| s.bugzilla_host.as_str());
        let url = format!("{decor}{}", bugzilla_url(host, id));
        let title = info.value().and_then(Value::as_str).unwrap_or(BUG_NOT_FOUND);
        ctx.session().say_fragments(channel, [url.as_str(), title]);
    }

    /// Fetches and announces change `id`. Returns the bugs its commit message
    /// references, already announced.
    async fn announce_change(
        &self,
        ctx: &mut BotContext,
        channel: &str,
        scanner: &RefScanner,
        id: &str,
    ) -> Vec<String> {
        let key = CacheKey::new(GERRIT, id);
        let info = cache_fetch(ctx, &self.layer.fetchers, key.clone()).await;
        if !note_access(ctx, &key) {
            return Vec::new();
        }

        let (Some(url), Some(subject)) = (change_field(&info, "url"), change_field(&info, "subject"))
        else {
            let host = batty(ctx).map_or("", |s| s.gerrit_host.as_str());
            ctx.say_to(channel, format!("{host}: change {id} not found"));
            return Vec::new();
        };
        ctx.session().say_fragments(channel, [url, subject]);

        let message = change_field(&info, "commitMessage").unwrap_or_default();
        let bugs = scanner.bugs_in_commit_message(message);
        for bug in &bugs {
            self.announce_bug(ctx, channel, bug, COMMIT_BUG_DECOR).await;
        }
        bugs
    }

    async fn prefetch(&self, ctx: &mut BotContext) {
        let total = self.layer.prefetch.len();
        for (i, item) in self.layer.prefetch.iter().enumerate() {
            let Some((token, id)) = item.split_once(':') else {
                warn!(item = %item, "malformed prefetch item");
                continue;
            };
            let Some(service) = service_for_token(token.trim()) else {
                warn!(item = %item, "unknown service in prefetch item");
                continue;
            };
            info!(item = %item, progress = format!("{}/{total}", i + 1), "pre-fetching");
            let key = CacheKey::new(service, id.trim());
            let value = cache_fetch(ctx, &self.layer.fetchers, key).await;
            if service != GERRIT {
                continue;
            }
            let message = change_field(&value, "commitMessage").unwrap_or_default();
            for bug in self.layer.scanner.bugs_in_commit_message(message) {
                debug!(change = %id, bug = %bug, "pre-fetching referenced bug");
                cache_fetch(ctx, &self.layer.fetchers, CacheKey::new(BUGZILLA, bug)).await;
            }
        }
    }

    /// Runs `command`; `None` hands the call to the layers below.
    fn run(&self, ctx: &mut BotContext, call: &CommandCall, command: Command) -> Option<Dispatch> {
        let channel = call.channel.as_str();
        let keys = batty(ctx)
            .map(|s| s.scanner.keys(call.arg().unwrap_or_default()))
            .unwrap_or_default();

        match command {
            Command::Forget => {
                cache_mut(ctx).clear();
                if let Some(state) = batty_mut(ctx) {
                    state.access_log.clear();
                }
                ctx.say_to(channel, okmsg("I forgot everything!"));
                Some(Dispatch::Done)
            }
            Command::Refetch => {
                if keys.is_empty() {
                    ctx.say_to(channel, errmsg(&call.sender, "nothing to refetch"));
                    return Some(Dispatch::Done);
                }
                for key in &keys {
                    cache_mut(ctx).delete(key);
                    if let Some(state) = batty_mut(ctx) {
                        state.access_log.remove(key);
                    }
                }
                let refs: Vec<String> = keys.iter().map(CacheKey::to_string).collect();
                Some(Dispatch::Replace(refs.join(" ")))
            }
            Command::ShowCache if keys.is_empty() => None,
            Command::ShowCache => {
                let cache = cache_mut(ctx);
                let records: BTreeMap<_, _> = keys
                    .iter()
                    .filter_map(|key| cache.record(key).map(|r| (key.clone(), r.clone())))
                    .collect();
                ctx.say_to(channel, okmsg("cached items: {"));
                if !records.is_empty() {
                    match serde_yaml::to_string(&records) {
                        Ok(yaml) => {
                            for line in yaml.lines() {
                                ctx.say_to(channel, line);
                            }
                        }
                        Err(e) => warn!(error = %e, "failed to render cache records"),
                    }
                }
                ctx.say_to(channel, "}");
                Some(Dispatch::Done)
            }
        }
    }
}

#[async_trait]
impl<S: Handler> Handler for Batty<S> {
    fn next(&self) -> Option<&dyn Handler> {
        Some(&self.inner)
    }

    fn make_options(&self, options: &mut OptionRegistry) {
        self.inner.make_options(options);
        options
            .declare(
                OptionSpec::new(
                    "hush",
                    &[OptionType::Integer, OptionType::Null],
                    |ctx| json!(batty(ctx).and_then(|s| s.hush)),
                    |ctx, value| {
                        if let Some(state) = batty_mut(ctx) {
                            state.hush = value.as_i64().filter(|h| *h > 0);
                        }
                    },
                )
                .check(reject_huge_hush),
            )
            .declare(
                OptionSpec::new(
                    "bugzilla_alt",
                    &[OptionType::List],
                    |ctx| json!(batty(ctx).map(|s| &s.bugzilla_alt)),
                    |ctx, value| {
                        if let Some(state) = batty_mut(ctx) {
                            state.bugzilla_alt = string_list(&value);
                            state.rescan();
                        }
                    },
                )
                .check(reject_non_strings),
            )
            .declare(
                OptionSpec::new(
                    "gerrit_alt",
                    &[OptionType::List],
                    |ctx| json!(batty(ctx).map(|s| &s.gerrit_alt)),
                    |ctx, value| {
                        if let Some(state) = batty_mut(ctx) {
                            state.gerrit_alt = string_list(&value);
                            state.rescan();
                        }
                    },
                )
                .check(reject_non_strings),
            )
            .declare(
                OptionSpec::new(
                    "bugzilla_api_key",
                    &[OptionType::String, OptionType::Null],
                    |ctx| json!(batty(ctx).and_then(|s| s.api_key.read().clone())),
                    |ctx, value| {
                        if let Some(state) = batty(ctx) {
                            *state.api_key.write() = value.as_str().map(str::to_string);
                        }
                    },
                )
                .hidden(),
            )
            .declare(OptionSpec::read_only("bugzilla_url", |ctx| {
                json!(batty(ctx).map(|s| &s.bugzilla_host))
            }))
            .declare(OptionSpec::read_only("gerrit_url", |ctx| {
                json!(batty(ctx).map(|s| &s.gerrit_host))
            }))
            .declare(OptionSpec::read_only("gerrit_user", |ctx| {
                json!(batty(ctx).and_then(|s| s.gerrit_user.as_ref()))
            }))
            .declare(OptionSpec::read_only("gerrit_port", |ctx| {
                json!(batty(ctx).map(|s| s.gerrit_port))
            }));
    }

    fn init(&self, ctx: &mut BotContext) {
        self.inner.init(ctx);
        let settings = &self.layer.settings;
        *self.layer.api_key.write() = settings.bugzilla_api_key.clone();
        ctx.set_state(BattyState {
            hush: settings.hush.filter(|h| *h > 0),
            bugzilla_host: settings.bugzilla_host().to_string(),
            bugzilla_alt: settings.bugzilla_alt.clone(),
            gerrit_host: settings.gerrit_host().to_string(),
            gerrit_alt: settings.gerrit_alt.clone(),
            gerrit_user: settings.gerrit_user.clone(),
            gerrit_port: settings.gerrit_port,
            api_key: self.layer.api_key.clone(),
            scanner: self.layer.scanner.clone(),
            access_log: HashMap::new(),
        });
    }

    async fn start(&self, ctx: &mut BotContext) {
        self.inner.start(ctx).await;
        if !self.layer.prefetch.is_empty() {
            self.prefetch(ctx).await;
        }
    }

    async fn dispatch(
        &self,
        root: &dyn Handler,
        ctx: &mut BotContext,
        call: &CommandCall,
        tier: Tier,
    ) -> Dispatch {
        if tier == Tier::Plain
            && let Some(command) = self.plain.lookup(&call.command)
            && let Some(outcome) = self.run(ctx, call, command)
        {
            return outcome;
        }
        self.inner.dispatch(root, ctx, call, tier).await
    }

    fn help(&self, ctx: &BotContext, channel: &str, help: &mut HelpSink) {
        let nick = ctx.nick();
        let (bz, gerrit) = batty(ctx).map_or(("", ""), |s| {
            (s.bugzilla_host.as_str(), s.gerrit_host.as_str())
        });
        help.info(format!(
            "This is {nick} bot on the mission to resolve Bugzilla and Gerrit references."
        ))
        .info(" ")
        .info("Syntax:")
        .info(format!("\"{} <bug-id>\" for Bugzilla", BUGZILLA_TOKENS.join("|")))
        .info(format!("\"{} <change-id>\" for Gerrit.", GERRIT_TOKENS.join("|")))
        .info("Case does not matter and a colon separator is also accepted,")
        .info("So \"BZ:23432\" and \"Gerrit: 42355\" are fine too.")
        .info(format!("URLs like {bz}/23432 and {gerrit}/42355 are understood,"))
        .info(format!("and also variants like {bz}/show_bug.cgi?id=23432 and"))
        .info(format!("{gerrit}/#/c/42355."))
        .info(" ")
        .info("Besides the following commands are taken:");

        self.inner.help(ctx, channel, help);

        help.command("refetch", "<bugzilla or gerrit ref>... -- refetch refs")
            .command("show-cache", "[<ref>...] -- shows cached entries")
            .command("forget", "-- empty the cache")
            .suppress("drop-cache");
    }

    fn greet(&self, ctx: &BotContext, channel: &str) {
        let (bz, gerrit) = batty(ctx).map_or(("", ""), |s| {
            (s.bugzilla_host.as_str(), s.gerrit_host.as_str())
        });
        for line in [
            "Whenever I see references to Bugzilla bugs or Gerrit changes, like...".to_string(),
            "... BZ 36734, gerrit:531232 ...".to_string(),
            "... or URLs like...".to_string(),
            format!(" {bz}/36734, {gerrit}/531232 ..."),
            " ".to_string(),
            "... I TELL IT LIKE IT IS!".to_string(),
            " ".to_string(),
        ] {
            ctx.say_to(channel, line);
        }
        self.inner.greet(ctx, channel);
    }

    async fn react(&self, ctx: &mut BotContext, channel: &str, sender: &str, content: &str) {
        self.inner.react(ctx, channel, sender, content).await;
        let Some(scanner) = batty(ctx).map(|s| s.scanner.clone()) else {
            return;
        };

        let mut bugs = scanner.bugs(content);
        for change in scanner.changes(content) {
            let announced = self.announce_change(ctx, channel, &scanner, &change).await;
            bugs.retain(|bug| !announced.contains(bug));
        }
        for bug in &bugs {
            self.announce_bug(ctx, channel, bug, "").await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ircbot::framework::ManualClock;
    use ircbot::framework::layers::{Admin, Caching, Commands, Options};
    use ircbot_core::{Outbound, Session};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    /// Counts lookups and answers from a fixed table.
    struct Stub {
        service: &'static str,
        calls: Arc<AtomicUsize>,
        answers: HashMap<&'static str, Value>,
    }

    #[async_trait]
    impl Fetcher for Stub {
        fn service(&self) -> &str {
            self.service
        }

        async fn fetch(&self, id: &str) -> Lookup {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answers.get(id) {
                Some(value) => Lookup::Found(value.clone()),
                None => Lookup::NotFound,
            }
        }
    }

    type Stack = Batty<Caching<Options<Admin<Commands<Base>>>>>;

    struct Harness {
        bot: Bot<Stack>,
        rx: UnboundedReceiver<String>,
        clock: ManualClock,
        bug_calls: Arc<AtomicUsize>,
        change_calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new(hush: Option<i64>) -> Self {
            let bug_calls = Arc::new(AtomicUsize::new(0));
            let change_calls = Arc::new(AtomicUsize::new(0));
            let fetchers = Fetchers::new()
                .with(Stub {
                    service: BUGZILLA,
                    calls: bug_calls.clone(),
                    answers: HashMap::from([
                        ("36734", json!("Bug 36734 – Frobnicator fails")),
                        ("7", json!("Bug 7 – Crash on start")),
                    ]),
                })
                .with(Stub {
                    service: GERRIT,
                    calls: change_calls.clone(),
                    answers: HashMap::from([(
                        "531232",
                        json!({
                            "url": "https://review.example.org/531232",
                            "subject": "Fix frobnicator",
                            "commitMessage": "Fix frobnicator\n\nBZ: 36734\n",
                        }),
                    )]),
                });
            let settings = BattySettings {
                bugzilla_url: "https://bugzilla.example.org".to_string(),
                gerrit_url: "https://review.example.org".to_string(),
                hush,
                ..BattySettings::default()
            };

            let clock = ManualClock::default();
            let handler = ServiceBuilder::new()
                .layer(BattyLayer::new(settings, fetchers).unwrap())
                .layer(
                    CacheLayer::new(CacheSettings {
                        expiry_hours: Some(168),
                        ..CacheSettings::default()
                    })
                    .with_clock(Arc::new(clock.clone())),
                )
                .layer(OptionsLayer::new())
                .layer(AdminLayer::new(["#ops".to_string()]))
                .layer(CommandsLayer::new())
                .service(Base);

            let (outbound, rx) = Outbound::channel();
            let session = Session::new("irc.example.net", 6667, "batty").with_outbound(outbound);
            let mut bot = Bot::new(handler, BotContext::new(session));
            bot.context_mut().session_mut().join("#dev");
            bot.context_mut().session_mut().join("#ops");
            let mut harness = Self {
                bot,
                rx,
                clock,
                bug_calls,
                change_calls,
            };
            harness.drain();
            harness
        }

        fn drain(&mut self) -> Vec<String> {
            let mut lines = Vec::new();
            while let Ok(line) = self.rx.try_recv() {
                lines.push(line);
            }
            lines
        }

        async fn say(&mut self, channel: &str, sender: &str, text: &str) -> Vec<String> {
            self.bot.handle_message(channel, sender, text).await;
            self.drain()
        }
    }

    #[tokio::test]
    async fn test_bug_reference_hushed_within_window() {
        let mut h = Harness::new(Some(600));
        let announcement =
            ["PRIVMSG #dev :https://bugzilla.example.org/36734, Bug 36734 – Frobnicator fails"];

        assert_eq!(h.say("#dev", "alice", "see bug:36734").await, announcement);
        assert_eq!(h.bug_calls.load(Ordering::SeqCst), 1);

        h.clock.advance(Duration::seconds(599));
        assert!(h.say("#dev", "bob", "see bug:36734").await.is_empty());

        h.clock.advance(Duration::seconds(1));
        assert_eq!(h.say("#dev", "bob", "bug 36734 again").await, announcement);
        assert_eq!(h.bug_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hush_window_out_of_range() {
        let mut h = Harness::new(Some(600));
        assert_eq!(
            h.say("#ops", "alice", "batty: set-option hush 9223372036854775807").await,
            ["PRIVMSG #ops :Hey alice, hush can't exceed 31536000 seconds."]
        );
        assert_eq!(h.bot.context().state::<BattyState>().unwrap().hush, Some(600));

        // Configured windows skip the option check.
        if let Some(state) = h.bot.context_mut().get_state_mut::<BattyState>() {
            state.hush = Some(i64::MAX);
        }
        assert_eq!(h.say("#dev", "alice", "bz 7").await.len(), 1);
        assert!(h.say("#dev", "alice", "bz 7").await.is_empty());
        h.clock.advance(Duration::days(100_000));
        assert!(h.say("#dev", "alice", "bz 7").await.is_empty());
    }

    #[tokio::test]
    async fn test_without_hush_every_mention_is_announced() {
        let mut h = Harness::new(None);
        h.say("#dev", "alice", "bz 7").await;
        assert_eq!(h.say("#dev", "alice", "bz 7").await.len(), 1);
    }

    #[tokio::test]
    async fn test_change_with_commit_message_bug() {
        let mut h = Harness::new(Some(600));
        let lines = h
            .say("#dev", "alice", "gerrit 531232 fixes bz:36734 and bz 404")
            .await;
        assert_eq!(
            lines,
            [
                "PRIVMSG #dev :https://review.example.org/531232, Fix frobnicator",
                "PRIVMSG #dev :`-> https://bugzilla.example.org/36734, Bug 36734 – Frobnicator fails",
                "PRIVMSG #dev :https://bugzilla.example.org/404, Bug not found :(",
            ]
        );
        assert_eq!(h.change_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.bug_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_change() {
        let mut h = Harness::new(None);
        assert_eq!(
            h.say("#dev", "alice", "review.example.org/#/c/99").await,
            ["PRIVMSG #dev :review.example.org: change 99 not found"]
        );
    }

    #[tokio::test]
    async fn test_refetch_replaces_content() {
        let mut h = Harness::new(Some(600));
        h.say("#dev", "alice", "bz 7").await;
        assert!(h.say("#dev", "alice", "bz 7").await.is_empty());

        let lines = h.say("#dev", "alice", "batty: refetch bz 7").await;
        assert_eq!(lines, ["PRIVMSG #dev :https://bugzilla.example.org/7, Bug 7 – Crash on start"]);
        assert_eq!(h.bug_calls.load(Ordering::SeqCst), 2);

        assert_eq!(
            h.say("#dev", "alice", "batty: refetch nothing here").await,
            ["PRIVMSG #dev :Hey alice, nothing to refetch."]
        );
    }

    #[tokio::test]
    async fn test_forget() {
        let mut h = Harness::new(Some(600));
        h.say("#dev", "alice", "bz 7").await;
        assert_eq!(
            h.say("#dev", "alice", "batty: forget").await,
            ["PRIVMSG #dev :OK, I forgot everything!"]
        );
        assert_eq!(h.say("#dev", "alice", "bz 7").await.len(), 1);
        assert_eq!(h.bug_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_show_cache_with_refs() {
        let mut h = Harness::new(None);
        h.say("#dev", "alice", "bz 7").await;

        let lines = h.say("#dev", "alice", "batty: show-cache bz 7 bz 8").await;
        assert_eq!(lines.first().unwrap(), "PRIVMSG #dev :OK, cached items: {");
        assert_eq!(lines.last().unwrap(), "PRIVMSG #dev :}");
        assert!(lines.iter().any(|l| l.contains("bugzilla:7")));
        assert!(lines.iter().any(|l| l.contains("Crash on start")));
        assert!(!lines.iter().any(|l| l.contains("bugzilla:8")));

        let listing = h.say("#dev", "alice", "batty: show-cache").await;
        assert_eq!(
            listing,
            [
                "PRIVMSG #dev :OK, cached entries: {",
                "PRIVMSG #dev :bugzilla:7",
                "PRIVMSG #dev :}",
            ]
        );
    }

    #[tokio::test]
    async fn test_options() {
        let mut h = Harness::new(None);
        assert_eq!(
            h.say("#ops", "alice", "batty: set-option hush 60").await,
            ["PRIVMSG #ops :OK, option hush set to 60."]
        );
        assert_eq!(
            h.say("#ops", "alice", "batty: set-option gerrit_url \"x\"").await,
            ["PRIVMSG #ops :Hey alice, option gerrit_url is read-only."]
        );
        assert_eq!(
            h.say("#ops", "alice", "batty: set-option bugzilla_alt [1]").await,
            ["PRIVMSG #ops :Hey alice, host list must contain strings only."]
        );

        h.say("#ops", "alice", "batty: set-option bugzilla_alt [\"bz.example.com\"]")
            .await;
        assert_eq!(
            h.say("#dev", "alice", "look at bz.example.com/7").await,
            ["PRIVMSG #dev :https://bugzilla.example.org/7, Bug 7 – Crash on start"]
        );

        h.say("#ops", "alice", "batty: set-option bugzilla_api_key \"secret\"")
            .await;
        let listing = h.say("#ops", "alice", "batty: options api_key").await;
        assert!(listing.iter().any(|l| l.contains("********")));
        assert!(!listing.iter().any(|l| l.contains("secret")));
        let state = h.bot.context().state::<BattyState>().unwrap();
        assert_eq!(state.api_key.read().as_deref(), Some("secret"));
        assert_eq!(state.hush, Some(60));
    }

    #[tokio::test]
    async fn test_help_replaces_drop_cache() {
        let mut h = Harness::new(None);
        let lines = h.say("#ops", "alice", "batty: help").await;
        assert_eq!(
            lines[0],
            "PRIVMSG #ops :This is batty bot on the mission to resolve Bugzilla and Gerrit references."
        );
        assert!(lines.contains(&"PRIVMSG #ops :batty: forget -- empty the cache".to_string()));
        assert!(lines.contains(
            &"PRIVMSG #ops :batty: show-cache [<ref>...] -- shows cached entries".to_string()
        ));
        assert!(!lines.iter().any(|l| l.contains("drop-cache")));
        assert!(lines.iter().any(|l| l.contains("save-cache")));
    }

    #[tokio::test]
    async fn test_greeting() {
        let mut h = Harness::new(None);
        h.bot.join("#new");
        let lines = h.drain();
        assert_eq!(lines[0], "JOIN #new");
        assert!(lines.contains(
            &"PRIVMSG #new : bugzilla.example.org/36734, review.example.org/531232 ...".to_string()
        ));
        assert_eq!(
            lines.last().unwrap(),
            "PRIVMSG #new :Type \"batty: help\" to know more."
        );
    }

    #[tokio::test]
    async fn test_prefetch_at_start() {
        let h = Harness::new(None);
        let layer = BattyLayer::new(
            BattySettings {
                bugzilla_url: "bugzilla.example.org".to_string(),
                gerrit_url: "review.example.org".to_string(),
                ..BattySettings::default()
            },
            h.bot.handler().layer.fetchers.clone(),
        )
        .unwrap()
        .with_prefetch(vec!["gerrit:531232".to_string(), "bz:7".to_string(), "jira:1".to_string()]);
        let handler = ServiceBuilder::new()
            .layer(layer)
            .layer(CacheLayer::new(CacheSettings::default()))
            .service(Base);
        let mut bot = Bot::new(handler, BotContext::new(Session::new("s", 6667, "batty")));
        bot.start().await;

        let mut keys: Vec<String> = cache_mut(bot.context_mut())
            .keys()
            .map(CacheKey::to_string)
            .collect();
        keys.sort();
        assert_eq!(keys, ["bugzilla:36734", "bugzilla:7", "gerrit:531232"]);
        assert_eq!(h.change_calls.load(Ordering::SeqCst), 1);
    }
}
