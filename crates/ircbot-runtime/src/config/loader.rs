//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`ircbot.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`ircbot.yaml`, `ircbot.yml`, etc.)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Config file (explicit, or the first one found in the search paths)
//! 3. Environment variables (`IRCBOT_*`)
//! 4. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `IRCBOT_` prefix with `__` as separator:
//!
//! - `IRCBOT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `IRCBOT_IRC__NICK=batty` → `irc.nick = "batty"`
//! - `IRCBOT_PLUGINS__BATTY__HUSH=60` → `plugins.batty.hush = 60`
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .file("batty.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::BotConfig;

#[cfg(feature = "toml-config")]
const TOML_NAMES: &[&str] = &["ircbot.toml", "config.toml"];
#[cfg(feature = "yaml-config")]
const YAML_NAMES: &[&str] = &["ircbot.yaml", "ircbot.yml", "config.yaml", "config.yml"];

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides, merged last.
    overrides: Figment,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds the user's `ircbot` config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("ircbot")),
            None => self,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration file if one is given.
    pub fn maybe_file<P: AsRef<Path>>(self, path: Option<P>) -> Self {
        match path {
            Some(path) => self.file(path),
            None => self,
        }
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a configuration fragment on top of every other source.
    ///
    /// ```rust,ignore
    /// let config = ConfigLoader::new()
    ///     .set("irc.nick", "batty")
    ///     .set("irc.channels", vec!["#dev"])
    ///     .load()?;
    /// ```
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<BotConfig> {
        let (figment, source) = self.build_figment()?;

        let mut config: BotConfig = figment.extract()?;
        config.source = source;
        super::validate_config(&config)?;

        debug!(
            source = ?config.source,
            logging_level = %config.logging.level,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(self) -> ConfigResult<(Figment, Option<PathBuf>)> {
        let mut figment = Figment::from(Serialized::defaults(BotConfig::default()));

        let source = match &self.config_file {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                figment = Self::merge_config_file(figment, path)?;
                Some(path.clone())
            }
            Some(path) => return Err(ConfigError::FileNotFound(path.clone())),
            None => {
                let found = self.find_config_file();
                match &found {
                    Some(path) => {
                        info!(path = %path.display(), "Loading configuration file");
                        figment = Self::merge_config_file(figment, path)?;
                    }
                    None => warn!("No configuration file found, using defaults"),
                }
                found
            }
        };

        if self.load_env {
            trace!("Loading environment variables with IRCBOT_ prefix");
            figment = figment.merge(Env::prefixed("IRCBOT_").split("__"));
        }

        Ok((figment.merge(self.overrides), source))
    }

    /// Merges a single config file into the figment, dispatching on file extension.
    ///
    /// Only extensions enabled via feature flags are accepted.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ircbot"));
        }
        paths
    }

    /// First existing file of an enabled format, searching path by path.
    fn find_config_file(&self) -> Option<PathBuf> {
        #[allow(unused_mut)]
        let mut names: Vec<&str> = Vec::new();
        #[cfg(feature = "toml-config")]
        names.extend_from_slice(TOML_NAMES);
        #[cfg(feature = "yaml-config")]
        names.extend_from_slice(YAML_NAMES);

        self.resolve_search_paths()
            .iter()
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .find(|path| path.exists())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_dir_loader(dir: &tempfile::TempDir) -> ConfigLoader {
        ConfigLoader::new().search_path(dir.path()).without_env()
    }

    #[test]
    fn test_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = empty_dir_loader(&dir).load().unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.irc.port, 6667);
        assert!(config.irc.greeting);
        assert!(config.source.is_none());
        assert_eq!(config.options_file_name(), None);
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new()
            .file("/nonexistent/ircbot.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = empty_dir_loader(&dir)
            .set("irc.nick", "batty")
            .set("irc.channels", vec!["#dev"])
            .set("cache.expiry_hours", 24)
            .load()
            .unwrap();

        assert_eq!(config.irc.nick, "batty");
        assert_eq!(config.irc.channels, ["#dev"]);
        assert_eq!(config.cache.expiry_hours, Some(24));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = empty_dir_loader(&dir).set("irc.port", 0).load();
        assert!(matches!(result, Err(ConfigError::InvalidPort(0))));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_and_plugin_section() {
        #[derive(Debug, Default, serde::Deserialize, PartialEq)]
        struct Greeter {
            #[serde(default)]
            greeting: String,
        }

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ircbot.toml"),
            r##"
[irc]
server = "irc.example.net"
channels = ["#dev", "#ops"]

[cache]
file = "bot.cache.yaml"

[plugins.greeter]
greeting = "hi"
"##,
        )
        .unwrap();

        let config = empty_dir_loader(&dir).load().unwrap();
        assert_eq!(config.irc.server, "irc.example.net");
        assert_eq!(config.irc.channels, ["#dev", "#ops"]);
        assert_eq!(config.cache.file.as_deref(), Some("bot.cache.yaml"));
        assert_eq!(
            config.options_file_name().as_deref(),
            Some("ircbot.options.yaml")
        );

        let greeter: Greeter = config.plugin("greeter").unwrap();
        assert_eq!(greeter.greeting, "hi");
        let absent: Greeter = config.plugin("absent").unwrap();
        assert_eq!(absent, Greeter::default());
    }
}
