//! Help aggregation.
//!
//! Every layer contributes [`HelpEntry`] values to a [`HelpSink`] after its
//! inner layers did, so later (outer) layers can override or hide what the
//! inner ones registered. Rendering collapses the sequence:
//!
//! - informational lines are kept verbatim, in order;
//! - a command keeps the position of its first registration and the last
//!   non-empty usage text given for it;
//! - [`HelpEntry::Suppress`] drops the command and its position, a later
//!   registration brings it back at the new position.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelpEntry {
    /// Free text line.
    Info(String),
    /// Command name with usage text. An empty usage shows the bare command.
    Command { name: String, usage: String },
    /// Hide a command registered earlier.
    Suppress(String),
}

#[derive(Debug, Default, Clone)]
pub struct HelpSink {
    entries: Vec<HelpEntry>,
}

enum Line {
    Info(String),
    Command(String),
}

impl HelpSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, text: impl Into<String>) -> &mut Self {
        self.entries.push(HelpEntry::Info(text.into()));
        self
    }

    pub fn command(&mut self, name: impl Into<String>, usage: impl Into<String>) -> &mut Self {
        self.entries.push(HelpEntry::Command {
            name: name.into(),
            usage: usage.into(),
        });
        self
    }

    pub fn suppress(&mut self, name: impl Into<String>) -> &mut Self {
        self.entries.push(HelpEntry::Suppress(name.into()));
        self
    }

    pub fn entries(&self) -> &[HelpEntry] {
        &self.entries
    }

    /// Collapses the collected entries into reply lines for a bot called `nick`.
    pub fn render(&self, nick: &str) -> Vec<String> {
        let mut lines: Vec<Line> = Vec::new();
        let mut usages: HashMap<&str, &str> = HashMap::new();

        for entry in &self.entries {
            match entry {
                HelpEntry::Info(text) => lines.push(Line::Info(text.clone())),
                HelpEntry::Command { name, usage } => match usages.get(name.as_str()) {
                    None => {
                        usages.insert(name.as_str(), usage.as_str());
                        lines.push(Line::Command(name.clone()));
                    }
                    Some(_) if !usage.is_empty() => {
                        usages.insert(name.as_str(), usage.as_str());
                    }
                    Some(_) => {}
                },
                HelpEntry::Suppress(name) => {
                    if usages.remove(name.as_str()).is_some() {
                        lines.retain(|l| !matches!(l, Line::Command(n) if n == name));
                    }
                }
            }
        }

        lines
            .into_iter()
            .filter_map(|line| match line {
                Line::Info(text) => Some(text),
                Line::Command(name) => usages
                    .get(name.as_str())
                    .map(|usage| format!("{nick}: {name} {usage}").trim_end().to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_info_and_commands() {
        let mut help = HelpSink::new();
        help.info("Admin commands: {")
            .command("quit", "")
            .command("join", "<chan>")
            .info("}");
        assert_eq!(
            help.render("bot"),
            vec!["Admin commands: {", "bot: quit", "bot: join <chan>", "}"]
        );
    }

    #[test]
    fn test_last_non_empty_usage_wins_in_first_position() {
        let mut help = HelpSink::new();
        help.command("show-cache", "-- list cache keys")
            .command("help", "-- this message")
            .command("show-cache", "[<ref>...] -- shows cached entries")
            .command("show-cache", "");
        assert_eq!(
            help.render("bot"),
            vec![
                "bot: show-cache [<ref>...] -- shows cached entries",
                "bot: help -- this message",
            ]
        );
    }

    #[test]
    fn test_suppress_then_restore() {
        let mut help = HelpSink::new();
        help.command("drop-cache", "").command("help", "-- this message");
        help.suppress("drop-cache");
        assert_eq!(help.render("bot"), vec!["bot: help -- this message"]);

        help.command("drop-cache", "-- empty the cache");
        assert_eq!(
            help.render("bot"),
            vec!["bot: help -- this message", "bot: drop-cache -- empty the cache"]
        );
    }

    #[test]
    fn test_suppress_unknown_is_noop() {
        let mut help = HelpSink::new();
        help.suppress("nothing").info("x");
        assert_eq!(help.render("bot"), vec!["x"]);
    }
}
