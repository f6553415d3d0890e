//! Command calls and name-to-handler tables.

use std::fmt;

/// Canonical form of a command word: lowercase, `_` folded to `-`.
pub fn normalize_command(word: &str) -> String {
    word.to_lowercase().replace('_', "-")
}

/// An addressed message, split into command word and argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCall {
    /// Channel or private peer the message arrived on.
    pub channel: String,
    /// Nick of the speaker.
    pub sender: String,
    /// Normalized command word.
    pub command: String,
    /// Trimmed remainder, `None` if empty.
    pub argument: Option<String>,
}

impl CommandCall {
    pub fn new(
        channel: impl Into<String>,
        sender: impl Into<String>,
        command: &str,
        argument: Option<&str>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender: sender.into(),
            command: normalize_command(command),
            argument: argument
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
        }
    }

    pub fn arg(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

impl fmt::Display for CommandCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(arg) => write!(f, "{} {}", self.command, arg),
            None => f.write_str(&self.command),
        }
    }
}

/// Explicit mapping from command names to a layer's command enum.
///
/// Each layer builds one at construction; a missing name simply yields
/// `None` and the layer delegates to the next one.
#[derive(Debug, Clone)]
pub struct CommandTable<C> {
    entries: Vec<(&'static str, C)>,
}

impl<C: Copy> CommandTable<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `name` (already in canonical form).
    pub fn with(mut self, name: &'static str, command: C) -> Self {
        self.entries.push((name, command));
        self
    }

    pub fn lookup(&self, name: &str) -> Option<C> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }
}

impl<C: Copy> Default for CommandTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_command("Set_Option"), "set-option");
        assert_eq!(normalize_command("show-cache"), "show-cache");
    }

    #[test]
    fn test_call_drops_empty_argument() {
        let call = CommandCall::new("#c", "bob", "HELP", Some("   "));
        assert_eq!(call.command, "help");
        assert_eq!(call.arg(), None);
    }

    #[test]
    fn test_table_lookup() {
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Cmd {
            A,
            B,
        }
        let table = CommandTable::new().with("a", Cmd::A).with("b", Cmd::B);
        assert_eq!(table.lookup("b"), Some(Cmd::B));
        assert_eq!(table.lookup("c"), None);
        assert_eq!(table.names().collect::<Vec<_>>(), ["a", "b"]);
    }
}
