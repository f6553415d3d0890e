//! Reply formatting for command results.

/// Appends a full stop to messages ending in a letter or digit.
fn terminate(msg: &str) -> &'static str {
    match msg.chars().last() {
        Some(c) if c.is_alphanumeric() => ".",
        _ => "",
    }
}

/// Success reply: `OK, <msg>`.
pub fn okmsg(msg: impl AsRef<str>) -> String {
    let msg = msg.as_ref();
    format!("OK, {msg}{}", terminate(msg))
}

/// Failure reply addressed to `nick`: `Hey <nick>, <msg>`.
pub fn errmsg(nick: &str, msg: impl AsRef<str>) -> String {
    let msg = msg.as_ref();
    format!("Hey {nick}, {msg}{}", terminate(msg))
}

/// Outcome of a resource operation (file load/save, option update).
///
/// These never fail hard; the command layer turns them into a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpReport {
    pub ok: bool,
    pub message: String,
}

impl OpReport {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    /// Renders the report as a reply to `nick`.
    pub fn reply(&self, nick: &str) -> String {
        if self.ok {
            okmsg(&self.message)
        } else {
            errmsg(nick, &self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_stop_only_after_alphanumerics() {
        assert_eq!(okmsg("dropped cache"), "OK, dropped cache.");
        assert_eq!(okmsg("quitting..."), "OK, quitting...");
        assert_eq!(okmsg("options {"), "OK, options {");
        assert_eq!(errmsg("bob", "not in #x"), "Hey bob, not in #x.");
        assert_eq!(
            okmsg("option cache_expiry set to 24"),
            "OK, option cache_expiry set to 24."
        );
    }

    #[test]
    fn test_report_reply() {
        assert_eq!(OpReport::ok("saved").reply("bob"), "OK, saved.");
        assert_eq!(OpReport::failed("nope").reply("bob"), "Hey bob, nope.");
    }
}
