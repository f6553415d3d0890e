//! Batty
//!
//! Watches channels for references to Bugzilla bugs and Gerrit changes and
//! tells what they are about:
//!
//! ```text
//! <alice> the build broke again, see bug 36734
//! <batty> https://bugzilla.example.org/36734, Bug 36734 – Frobnicator fails
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package batty -- --config batty.toml --channel '#dev'
//! cargo run --package batty -- --config batty.toml prefetch-gen < irc.log
//! ```
//!
//! Configuration: the common `irc`, `storage`, `cache` and `logging` sections
//! plus `[plugins.batty]` (see [`BattySettings`]).

mod bot;
mod fetch;
mod prefetch;
mod refs;
mod settings;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use ircbot::prelude::*;
use ircbot::runtime::ConfigLoader;
use tracing::{info, warn};

use crate::bot::BattyLayer;
use crate::fetch::{ApiKey, BugzillaFetcher, GerritFetcher};
use crate::refs::RefScanner;
use crate::settings::BattySettings;

const PLUGIN: &str = "batty";

#[derive(Debug, Parser)]
#[command(name = "batty", version, about)]
struct Cli {
    /// Configuration file (default: search for ircbot.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a log on stdin and print the references it mentions as a
    /// prefetch list
    PrefetchGen,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    #[arg(long)]
    server: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long)]
    nick: Option<String>,

    /// Channel to join; repeatable
    #[arg(long = "channel")]
    channels: Vec<String>,

    #[arg(long)]
    bugzilla_url: Option<String>,

    #[arg(long)]
    gerrit_url: Option<String>,

    #[arg(long)]
    gerrit_user: Option<String>,

    /// Seconds during which a reference is not announced again
    #[arg(long)]
    hush: Option<i64>,

    /// Cache file under the data directory
    #[arg(long)]
    cache_file: Option<String>,

    /// Hours a cached lookup stays valid
    #[arg(long)]
    cache_expiry: Option<i64>,

    /// References to fetch at startup, e.g. bz:36734,gerrit:531232
    #[arg(long, value_delimiter = ',')]
    cache_prefetch: Vec<String>,

    /// Shell command printing further references to fetch at startup
    #[arg(long)]
    cache_prefetch_gen: Option<String>,

    /// File to write the process id to while running
    #[arg(long)]
    pid_file: Option<PathBuf>,
}

impl RunArgs {
    fn runtime(&self, config: Option<&Path>) -> Result<BotRuntime> {
        let mut builder = BotRuntime::builder().maybe_config_file(config);
        let overrides = [
            ("irc.server", self.server.clone()),
            ("irc.nick", self.nick.clone()),
            ("cache.file", self.cache_file.clone()),
            ("plugins.batty.bugzilla_url", self.bugzilla_url.clone()),
            ("plugins.batty.gerrit_url", self.gerrit_url.clone()),
            ("plugins.batty.gerrit_user", self.gerrit_user.clone()),
        ];
        for (key, value) in overrides {
            if let Some(value) = value {
                builder = builder.set(key, value);
            }
        }
        if let Some(port) = self.port {
            builder = builder.set("irc.port", port);
        }
        if let Some(hush) = self.hush {
            builder = builder.set("plugins.batty.hush", hush);
        }
        if let Some(hours) = self.cache_expiry {
            builder = builder.set("cache.expiry_hours", hours);
        }
        if !self.channels.is_empty() {
            builder = builder.set("irc.channels", self.channels.clone());
        }
        Ok(builder.build()?)
    }

    async fn prefetch_list(&self) -> Result<Vec<String>> {
        let mut items = self.cache_prefetch.clone();
        if let Some(command) = &self.cache_prefetch_gen {
            items.extend(prefetch::generate(command).await?);
        }
        Ok(items)
    }
}

/// Removes the PID file when dropped.
struct PidFile(PathBuf);

impl PidFile {
    async fn create(path: PathBuf) -> Result<Self> {
        tokio::fs::write(&path, format!("{}\n", std::process::id()))
            .await
            .with_context(|| format!("failed to write PID file {}", path.display()))?;
        Ok(Self(path))
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            warn!(path = %self.0.display(), error = %e, "failed to remove PID file");
        }
    }
}

fn settings(config: &BotConfig) -> Result<BattySettings> {
    let settings: BattySettings = config.plugin(PLUGIN)?;
    let missing = settings.missing();
    if !missing.is_empty() {
        bail!("missing plugins.{PLUGIN} settings: {}", missing.join(", "));
    }
    Ok(settings)
}

fn fetchers(settings: &BattySettings, api_key: ApiKey) -> Result<Fetchers> {
    let bugzilla = BugzillaFetcher::new(settings.bugzilla_host(), api_key)
        .context("failed to set up the HTTP client")?;
    let gerrit = GerritFetcher::new(
        settings.gerrit_host(),
        settings.gerrit_user.clone(),
        settings.gerrit_port,
    );
    Ok(Fetchers::new().with(bugzilla).with(gerrit))
}

async fn run(config: Option<PathBuf>, args: RunArgs) -> Result<()> {
    let runtime = args.runtime(config.as_deref())?;
    if runtime.config().irc.channels.is_empty() {
        bail!("no channel specified");
    }
    let settings = settings(runtime.config())?;
    let prefetch = args.prefetch_list().await?;

    let _pid_file = match args.pid_file {
        Some(path) => Some(PidFile::create(path).await?),
        None => None,
    };

    let api_key = ApiKey::default();
    let batty = BattyLayer::new(settings.clone(), fetchers(&settings, api_key.clone())?)?
        .with_api_key(api_key)
        .with_prefetch(prefetch);
    let handler = ServiceBuilder::new()
        .layer(batty)
        .layer(runtime.cache_layer())
        .layer(OptionsLayer::new())
        .layer(runtime.admin_layer())
        .layer(CommandsLayer::new())
        .service(Base);

    info!(
        bugzilla = settings.bugzilla_host(),
        gerrit = settings.gerrit_host(),
        "starting batty"
    );
    runtime.run(handler).await?;
    Ok(())
}

fn prefetch_gen(config: Option<PathBuf>) -> Result<()> {
    let config = ConfigLoader::new()
        .with_current_dir()
        .maybe_file(config)
        .load()?;
    let settings = settings(&config)?;
    let scanner = RefScanner::new(&settings.bugzilla_hosts(), &settings.gerrit_hosts())?;

    let mut log = String::new();
    std::io::stdin()
        .read_to_string(&mut log)
        .context("failed to read log from stdin")?;
    println!("{}", prefetch::list_from_log(&scanner, &log));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::PrefetchGen) => prefetch_gen(cli.config),
        None => run(cli.config, cli.run).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli() {
        let cli = Cli::parse_from([
            "batty",
            "--channel",
            "#dev",
            "--cache-prefetch",
            "bz:1,gerrit:2",
            "--cache-prefetch",
            "bz:3",
            "--hush",
            "600",
            "-p",
            "6697",
        ]);
        assert!(cli.command.is_none());
        assert_eq!(cli.run.channels, ["#dev"]);
        assert_eq!(cli.run.cache_prefetch, ["bz:1", "gerrit:2", "bz:3"]);
        assert_eq!(cli.run.hush, Some(600));
        assert_eq!(cli.run.port, Some(6697));
    }

    #[test]
    fn test_prefetch_gen_subcommand() {
        let cli = Cli::parse_from(["batty", "prefetch-gen", "--config", "batty.toml"]);
        assert!(matches!(cli.command, Some(Command::PrefetchGen)));
        assert_eq!(cli.config.as_deref(), Some(Path::new("batty.toml")));
    }

    #[test]
    fn test_settings_from_config() {
        let err = settings(&BotConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing plugins.batty settings: bugzilla_url, gerrit_url"
        );

        let config = ConfigLoader::new()
            .without_env()
            .set("plugins.batty.bugzilla_url", "https://bugzilla.example.org")
            .set("plugins.batty.gerrit_url", "review.example.org")
            .set("plugins.batty.hush", 600)
            .load()
            .unwrap();
        let settings = settings(&config).unwrap();
        assert_eq!(settings.bugzilla_host(), "bugzilla.example.org");
        assert_eq!(settings.hush, Some(600));
        assert_eq!(settings.gerrit_port, 29418);
    }

    #[tokio::test]
    async fn test_pid_file_removed_on_drop() {
        let path = std::env::temp_dir().join(format!("batty-test-{}.pid", std::process::id()));
        let pid_file = PidFile::create(path.clone()).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
        drop(pid_file);
        assert!(!path.exists());
    }
}
