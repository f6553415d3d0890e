//! IRC line parsing and formatting.
//!
//! Only the handful of shapes the bot cares about are recognized: keep-alive
//! probes, renames of the bot's own nick, and `PRIVMSG`s either to a joined
//! broadcast channel or to the bot itself from a joined private peer.
//! Everything else classifies as [`Inbound::Other`] and is ignored.

/// Farewell sent along with every `PART`.
pub const PART_MESSAGE: &str = "Daisy, Daisy, give me your answer do";

/// Scripted action sent to every channel on join.
pub const JOIN_ACTION: &str = "is here to help";

/// Returns `true` for broadcast-style channel identifiers (`#name`).
///
/// Anything else is a private peer, addressed by its nick.
pub fn is_broadcast(channel: &str) -> bool {
    channel.starts_with('#')
}

// =============================================================================
// Raw line
// =============================================================================

/// A line split into prefix, command and parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine<'a> {
    /// Source prefix without the leading `:`.
    pub prefix: Option<&'a str>,
    /// Command or numeric.
    pub command: &'a str,
    /// Middle parameters followed by the trailing one, if any.
    pub params: Vec<&'a str>,
}

impl<'a> RawLine<'a> {
    /// Splits a line. Returns `None` for lines without a command.
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, tail) = stripped.split_once(' ')?;
                rest = tail;
                Some(prefix)
            }
            None => None,
        };

        rest = rest.trim_start_matches(' ');
        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, tail)) => (command, tail),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing);
                break;
            }
            match rest.split_once(' ') {
                Some((param, tail)) => {
                    params.push(param);
                    rest = tail;
                }
                None => {
                    params.push(rest);
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nick part of a `nick!user@host` prefix.
    ///
    /// Server prefixes carry no `!` and yield `None`.
    pub fn source_nick(&self) -> Option<&'a str> {
        self.prefix
            .and_then(|p| p.split_once('!'))
            .map(|(nick, _)| nick)
    }
}

// =============================================================================
// Inbound classification
// =============================================================================

/// What an inbound line means to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Keep-alive probe carrying the token to echo back.
    Ping(&'a str),
    /// The server renamed the bot.
    NickChanged(&'a str),
    /// A message the bot should process.
    ///
    /// For private peers `channel` and `sender` are the same nick.
    Message {
        channel: &'a str,
        sender: &'a str,
        text: &'a str,
    },
    /// Anything else.
    Other,
}

impl<'a> Inbound<'a> {
    /// Classifies `line` against the bot's current nick and joined channels.
    pub fn classify(line: &'a str, nick: &str, joined: &[String]) -> Self {
        let Some(raw) = RawLine::parse(line) else {
            return Self::Other;
        };
        let is_joined = |c: &str| joined.iter().any(|j| j == c);

        match raw.command {
            "PING" => Self::Ping(raw.params.first().copied().unwrap_or_default()),
            "NICK" => match (raw.source_nick(), raw.params.first().copied()) {
                (Some(source), Some(new_nick)) if source == nick => {
                    Self::NickChanged(new_nick.trim_end())
                }
                _ => Self::Other,
            },
            "PRIVMSG" => {
                let (Some(sender), &[target, text]) = (raw.source_nick(), raw.params.as_slice())
                else {
                    return Self::Other;
                };
                if is_broadcast(target) {
                    if is_joined(target) {
                        return Self::Message {
                            channel: target,
                            sender,
                            text,
                        };
                    }
                } else if target == nick && is_joined(sender) {
                    return Self::Message {
                        channel: sender,
                        sender,
                        text,
                    };
                }
                Self::Other
            }
            _ => Self::Other,
        }
    }
}

// =============================================================================
// Outbound formatting
// =============================================================================

pub fn nick_line(nick: &str) -> String {
    format!("NICK {nick}")
}

pub fn user_line(nick: &str) -> String {
    format!("USER ircbot 0 * {nick}")
}

pub fn join_line(channel: &str) -> String {
    format!("JOIN {channel}")
}

pub fn part_line(channel: &str) -> String {
    format!("PART {channel} :{PART_MESSAGE}")
}

pub fn privmsg_line(target: &str, text: &str) -> String {
    format!("PRIVMSG {target} :{text}")
}

pub fn pong_line(token: &str) -> String {
    format!("PONG {token}")
}

pub fn quit_line() -> String {
    "QUIT".to_string()
}

/// Wraps `text` as a CTCP `ACTION`.
pub fn action(text: &str) -> String {
    format!("\x01ACTION {text}\x01")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined() -> Vec<String> {
        vec!["#chan".to_string(), "alice".to_string()]
    }

    #[test]
    fn test_parse_full_line() {
        let raw = RawLine::parse(":bob!~b@host PRIVMSG #chan :hello there\r\n").unwrap();
        assert_eq!(raw.prefix, Some("bob!~b@host"));
        assert_eq!(raw.command, "PRIVMSG");
        assert_eq!(raw.params, vec!["#chan", "hello there"]);
        assert_eq!(raw.source_nick(), Some("bob"));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(RawLine::parse("").is_none());
        assert!(RawLine::parse(":prefix-only").is_none());
    }

    #[test]
    fn test_classify_ping() {
        assert_eq!(
            Inbound::classify("PING :irc.example.net", "bot", &joined()),
            Inbound::Ping("irc.example.net")
        );
    }

    #[test]
    fn test_classify_own_rename_only() {
        assert_eq!(
            Inbound::classify(":bot!x@y NICK :bot_", "bot", &joined()),
            Inbound::NickChanged("bot_")
        );
        assert_eq!(
            Inbound::classify(":eve!x@y NICK :bot", "bot", &joined()),
            Inbound::Other
        );
    }

    #[test]
    fn test_classify_channel_message() {
        assert_eq!(
            Inbound::classify(":bob!x@y PRIVMSG #chan :bot: help", "bot", &joined()),
            Inbound::Message {
                channel: "#chan",
                sender: "bob",
                text: "bot: help"
            }
        );
        // not joined
        assert_eq!(
            Inbound::classify(":bob!x@y PRIVMSG #other :hi", "bot", &joined()),
            Inbound::Other
        );
    }

    #[test]
    fn test_classify_private_message_requires_joined_peer() {
        assert_eq!(
            Inbound::classify(":alice!x@y PRIVMSG bot :options", "bot", &joined()),
            Inbound::Message {
                channel: "alice",
                sender: "alice",
                text: "options"
            }
        );
        assert_eq!(
            Inbound::classify(":mallory!x@y PRIVMSG bot :options", "bot", &joined()),
            Inbound::Other
        );
    }

    #[test]
    fn test_classify_server_notice_is_other() {
        assert_eq!(
            Inbound::classify(":irc.example.net 001 bot :Welcome", "bot", &joined()),
            Inbound::Other
        );
    }

    #[test]
    fn test_outbound_formats() {
        assert_eq!(user_line("bot"), "USER ircbot 0 * bot");
        assert_eq!(
            part_line("#chan"),
            "PART #chan :Daisy, Daisy, give me your answer do"
        );
        assert_eq!(action(JOIN_ACTION), "\x01ACTION is here to help\x01");
    }
}
