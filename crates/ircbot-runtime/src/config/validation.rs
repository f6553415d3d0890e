//! Configuration validation utilities.

use ircbot_framework::storage::is_plain_file_name;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, IrcConfig, LoggingConfig};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
pub fn validate_config(config: &BotConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_irc_config(&config.irc)?;
    validate_file_name("cache.file", config.cache.file.as_deref())?;
    validate_file_name("options_file", config.options_file.as_deref())?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    let check = |level: &str| VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str());
    if !check(&logging.level) {
        return Err(ConfigError::validation(format!(
            "Invalid log level: {}. Valid values are: {:?}",
            logging.level, VALID_LOG_LEVELS
        )));
    }
    if let Some((target, level)) = logging.filters.iter().find(|(_, level)| !check(level)) {
        return Err(ConfigError::validation(format!(
            "Invalid log level for {target}: {level}"
        )));
    }
    Ok(())
}

fn validate_irc_config(irc: &IrcConfig) -> ConfigResult<()> {
    if irc.server.is_empty() {
        return Err(ConfigError::missing_field("irc.server"));
    }
    if irc.port == 0 {
        return Err(ConfigError::InvalidPort(irc.port));
    }
    if irc.nick.is_empty() {
        return Err(ConfigError::missing_field("irc.nick"));
    }
    if irc.nick.contains(char::is_whitespace) {
        return Err(ConfigError::validation("Nick cannot contain whitespace"));
    }
    if let Some(channel) = irc
        .channels
        .iter()
        .chain(&irc.admins)
        .find(|c| c.is_empty() || c.contains(char::is_whitespace))
    {
        return Err(ConfigError::validation(format!(
            "Invalid channel or peer name: {channel:?}"
        )));
    }
    Ok(())
}

fn validate_file_name(field: &str, name: Option<&str>) -> ConfigResult<()> {
    match name {
        Some(name) if !is_plain_file_name(name) => Err(ConfigError::validation(format!(
            "{field} must be a plain file name, got {name:?}"
        ))),
        _ => Ok(()),
    }
}
