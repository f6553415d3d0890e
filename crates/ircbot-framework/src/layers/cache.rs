//! Cache commands, options and persistence.
//!
//! The [`Cache`] itself lives in the context as part of [`CacheState`], so
//! domain layers above reach it through [`cache_mut`] / [`cache_fetch`].
//!
//! [`cache_fetch`]: crate::fetch::cache_fetch

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_layer::Layer;
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheKey, CacheRecord, Clock, MAX_EXPIRY_HOURS, SystemClock};
use crate::command::{CommandCall, CommandTable};
use crate::context::BotContext;
use crate::handler::{Dispatch, Handler, Tier};
use crate::help::HelpSink;
use crate::options::{OptionRegistry, OptionSpec, OptionType};
use crate::reply::{OpReport, errmsg, okmsg};
use crate::storage::is_plain_file_name;

/// Keys per line in the `show-cache` listing.
pub const DEFAULT_GROUP_SIZE: usize = 18;

/// Cache configuration.
///
/// ```toml
/// [cache]
/// expiry_hours = 168
/// file = "batty.cache.yaml"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Hours a record stays valid. Absent, zero or negative: forever.
    pub expiry_hours: Option<i64>,
    /// File under the data directory the cache is loaded from and saved to.
    pub file: Option<String>,
    pub show_group_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            expiry_hours: None,
            file: None,
            show_group_size: DEFAULT_GROUP_SIZE,
        }
    }
}

/// Cache layer state kept in the context.
#[derive(Debug, Clone)]
pub struct CacheState {
    pub cache: Cache,
    pub file: Option<String>,
    pub group_size: usize,
}

impl Default for CacheState {
    fn default() -> Self {
        Self {
            cache: Cache::default(),
            file: None,
            group_size: DEFAULT_GROUP_SIZE,
        }
    }
}

pub fn cache_mut(ctx: &mut BotContext) -> &mut Cache {
    &mut ctx.state_mut::<CacheState>().cache
}

pub fn cache_file(ctx: &BotContext) -> Option<&str> {
    ctx.state::<CacheState>().and_then(|s| s.file.as_deref())
}

fn cache_target(ctx: &BotContext, file: Option<&str>) -> Result<String, OpReport> {
    file.or(cache_file(ctx))
        .map(str::to_string)
        .ok_or_else(|| OpReport::failed("no cache file specified"))
}

/// Purges, then writes the cache to `file` (or the configured cache file).
pub async fn save_cache(ctx: &mut BotContext, file: Option<&str>) -> OpReport {
    let file = match cache_target(ctx, file) {
        Ok(file) => file,
        Err(report) => return report,
    };
    cache_mut(ctx).purge();
    let empty = BTreeMap::new();
    let records = ctx
        .state::<CacheState>()
        .map_or(&empty, |s| s.cache.records());
    match ctx.store().save(records, &file).await {
        Ok(_) => OpReport::ok(format!("saved cache to {file}")),
        Err(e) => OpReport::failed(format!("error: failed to save cache to {file}: {e}")),
    }
}

/// Purges, then merges the records stored in `file` (or the configured cache
/// file) into the cache.
pub async fn load_cache(ctx: &mut BotContext, file: Option<&str>) -> OpReport {
    let file = match cache_target(ctx, file) {
        Ok(file) => file,
        Err(report) => return report,
    };
    cache_mut(ctx).purge();
    match ctx
        .store()
        .load::<BTreeMap<CacheKey, CacheRecord>>(&file)
        .await
    {
        Ok(records) => {
            let count = records.len();
            cache_mut(ctx).merge(records);
            info!(file = %file, records = count, "cache loaded");
            OpReport::ok(format!("loaded cache from {file}"))
        }
        Err(e) => OpReport::failed(format!("error: failed to load cache from {file}: {e}")),
    }
}

/// Purges, then groups the remaining keys into listing lines. Every line
/// but the last ends in an ellipsis.
pub fn cache_listing(ctx: &mut BotContext) -> Vec<String> {
    let state = ctx.state_mut::<CacheState>();
    state.cache.purge();
    let keys: Vec<String> = state.cache.keys().map(CacheKey::to_string).collect();
    let groups: Vec<&[String]> = keys.chunks(state.group_size.max(1)).collect();
    let last = groups.len().saturating_sub(1);
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let mut line = group.join(", ");
            if i < last {
                line.push_str(", ...");
            }
            line
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    ShowCache,
    DropCache,
    LoadCache,
    SaveCache,
}

#[derive(Debug, Clone)]
pub struct CacheLayer {
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
}

impl CacheLayer {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    /// Uses `clock` for expiry decisions instead of the system time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = Caching<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Caching {
            inner,
            settings: self.settings.clone(),
            clock: self.clock.clone(),
            plain: CommandTable::new().with("show-cache", Command::ShowCache),
            privileged: CommandTable::new()
                .with("drop-cache", Command::DropCache)
                .with("load-cache", Command::LoadCache)
                .with("save-cache", Command::SaveCache),
        }
    }
}

pub struct Caching<S> {
    inner: S,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    plain: CommandTable<Command>,
    privileged: CommandTable<Command>,
}

fn reject_cache_file(value: &Value) -> Result<(), String> {
    match value.as_str() {
        Some(file) if file.contains('/') => Err("cache file can't contain '/'".to_string()),
        _ => Ok(()),
    }
}

fn reject_huge_expiry(value: &Value) -> Result<(), String> {
    match value.as_i64() {
        Some(hours) if hours > MAX_EXPIRY_HOURS => {
            Err(format!("cache expiry can't exceed {MAX_EXPIRY_HOURS} hours"))
        }
        _ => Ok(()),
    }
}

async fn run(ctx: &mut BotContext, call: &CommandCall, command: Command) {
    let channel = call.channel.as_str();
    let nick = call.sender.as_str();

    match command {
        Command::ShowCache => {
            let lines = cache_listing(ctx);
            ctx.say_to(channel, okmsg("cached entries: {"));
            for line in lines {
                ctx.say_to(channel, line);
            }
            ctx.say_to(channel, "}");
        }
        Command::DropCache => {
            cache_mut(ctx).clear();
            ctx.say_to(channel, okmsg("dropped cache"));
        }
        Command::LoadCache | Command::SaveCache => {
            if call.arg().is_some_and(|f| f.contains('/')) {
                ctx.say_to(channel, errmsg(nick, "name of target file can't contain '/'"));
                return;
            }
            let report = if command == Command::LoadCache {
                load_cache(ctx, call.arg()).await
            } else {
                save_cache(ctx, call.arg()).await
            };
            ctx.say_to(channel, report.reply(nick));
        }
    }
}

#[async_trait]
impl<S: Handler> Handler for Caching<S> {
    fn next(&self) -> Option<&dyn Handler> {
        Some(&self.inner)
    }

    fn make_options(&self, options: &mut OptionRegistry) {
        self.inner.make_options(options);
        options
            .declare(
                OptionSpec::new(
                    "cache_expiry",
                    &[OptionType::Integer, OptionType::Null],
                    |ctx| json!(ctx.state::<CacheState>().and_then(|s| s.cache.expiry_hours())),
                    |ctx, value| cache_mut(ctx).set_expiry_hours(value.as_i64()),
                )
                .check(reject_huge_expiry),
            )
            .declare(
                OptionSpec::new(
                    "cache_file",
                    &[OptionType::String, OptionType::Null],
                    |ctx| json!(cache_file(ctx)),
                    |ctx, value| {
                        ctx.state_mut::<CacheState>().file = value.as_str().map(str::to_string);
                    },
                )
                .check(reject_cache_file),
            );
    }

    fn init(&self, ctx: &mut BotContext) {
        self.inner.init(ctx);
        let mut cache = Cache::new(self.clock.clone());
        cache.set_expiry_hours(self.settings.expiry_hours);
        let file = self
            .settings
            .file
            .clone()
            .filter(|f| is_plain_file_name(f));
        if file.is_none() && self.settings.file.is_some() {
            warn!(file = ?self.settings.file, "ignoring unusable cache file name");
        }
        ctx.set_state(CacheState {
            cache,
            file,
            group_size: self.settings.show_group_size.max(1),
        });
    }

    async fn start(&self, ctx: &mut BotContext) {
        self.inner.start(ctx).await;
        if cache_file(ctx).is_none() {
            return;
        }
        let report = load_cache(ctx, None).await;
        if !report.ok {
            warn!("{}", report.message);
        }
    }

    async fn dispatch(
        &self,
        root: &dyn Handler,
        ctx: &mut BotContext,
        call: &CommandCall,
        tier: Tier,
    ) -> Dispatch {
        let table = match tier {
            Tier::Privileged => &self.privileged,
            Tier::Plain => &self.plain,
        };
        if let Some(command) = table.lookup(&call.command) {
            run(ctx, call, command).await;
            return Dispatch::Done;
        }
        self.inner.dispatch(root, ctx, call, tier).await
    }

    fn help(&self, ctx: &BotContext, channel: &str, help: &mut HelpSink) {
        self.inner.help(ctx, channel, help);
        help.command("show-cache", "-- list cache keys");
        if !self.is_admin(ctx, channel) {
            return;
        }
        help.command("drop-cache", "")
            .command(
                "load-cache",
                "[<file>] -- loads cache from <file> or default location",
            )
            .command(
                "save-cache",
                "[<file>] -- saves cache to <file> or default location",
            );
    }

    async fn flush(&self, ctx: &mut BotContext) {
        self.inner.flush(ctx).await;
        if cache_file(ctx).is_none() {
            debug!("no cache file, nothing to flush");
            return;
        }
        let report = save_cache(ctx, None).await;
        if report.ok {
            info!("{}", report.message);
        } else {
            warn!("{}", report.message);
        }
    }
}
