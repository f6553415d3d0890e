//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use figment::value::Value;
use ircbot_framework::CacheSettings;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
///
/// ```toml
/// options_file = "batty.options.yaml"
///
/// [irc]
/// server = "irc.example.net"
/// nick = "batty"
/// channels = ["#dev"]
/// admins = ["#dev-ops"]
///
/// [storage]
/// data_dir = "/var/lib/batty"
///
/// [plugins.batty]
/// bugzilla_url = "https://bugzilla.example.org"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub irc: IrcConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cache: CacheSettings,

    /// Default file for `save-options` / `load-options`.
    #[serde(default)]
    pub options_file: Option<String>,

    /// Raw per-plugin sections, deserialized on demand.
    #[serde(default)]
    pub plugins: BTreeMap<String, Value>,

    /// The configuration file this was loaded from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl BotConfig {
    /// Deserializes the `plugins.<name>` section, or returns `T::default()`
    /// when there is none.
    pub fn plugin<T: DeserializeOwned + Default>(&self, name: &str) -> ConfigResult<T> {
        let Some(value) = self.plugins.get(name) else {
            debug!(plugin = name, "No plugin settings found, using defaults");
            return Ok(T::default());
        };
        value.deserialize().map_err(|e| ConfigError::InvalidPlugin {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// The explicit options file, or `<config-stem>.options.yaml` when a
    /// configuration file was loaded.
    pub fn options_file_name(&self) -> Option<String> {
        self.options_file.clone().or_else(|| {
            let stem = self.source.as_deref()?.file_stem()?.to_str()?;
            Some(format!("{stem}.options.yaml"))
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.storage.data_dir.as_deref()
    }
}

// =============================================================================
// IRC
// =============================================================================

/// Server, identity and initial channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrcConfig {
    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_nick")]
    pub nick: String,

    /// Send the extended greeting after joining a channel.
    #[serde(default = "default_greeting")]
    pub greeting: bool,

    /// Channels (or private peers) joined after registration.
    #[serde(default)]
    pub channels: Vec<String>,

    /// Channels and peers with admin rights.
    #[serde(default)]
    pub admins: Vec<String>,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            nick: default_nick(),
            greeting: default_greeting(),
            channels: Vec::new(),
            admins: Vec::new(),
        }
    }
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_nick() -> String {
    "ircbot".to_string()
}

fn default_greeting() -> bool {
    true
}

/// File persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for saved files. Absent: file operations are disabled.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

// =============================================================================
// Logging
// =============================================================================

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Destination of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Logging configuration.
///
/// ```toml
/// [logging]
/// level = "debug"
/// format = "full"
///
/// [logging.filters]
/// "ircbot::wire" = "trace"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level: trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used with `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `ircbot_framework = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            filters: BTreeMap::new(),
            thread_ids: false,
            file_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compact => "compact",
            Self::Full => "full",
            Self::Pretty => "pretty",
            #[cfg(feature = "json-log")]
            Self::Json => "json",
        };
        f.write_str(name)
    }
}
