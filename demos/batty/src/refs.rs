//! Recognizing Bugzilla and Gerrit references in free text.
//!
//! A reference is either a token followed by an id (`bz 36734`,
//! `Gerrit: 531232`) or a URL under one of the configured hosts
//! (`bugzilla.example.org/show_bug.cgi?id=36734`,
//! `review.example.org/#/c/531232`). Matching is case-insensitive.

use regex::Regex;

use ircbot::prelude::CacheKey;

pub const BUGZILLA: &str = "bugzilla";
pub const GERRIT: &str = "gerrit";

pub const BUGZILLA_TOKENS: [&str; 3] = ["bz", "bug", "bugzilla"];
pub const GERRIT_TOKENS: [&str; 3] = ["change", "review", "gerrit"];

/// Service tag for a reference token, e.g. `bz` → `bugzilla`.
pub fn service_for_token(token: &str) -> Option<&'static str> {
    let token = token.to_ascii_lowercase();
    if BUGZILLA_TOKENS.contains(&token.as_str()) {
        Some(BUGZILLA)
    } else if GERRIT_TOKENS.contains(&token.as_str()) {
        Some(GERRIT)
    } else {
        None
    }
}

/// Body of a reference pattern, with the id as the only capture group.
fn reference_pattern(hosts: &[String], tokens: &[&str], path: &str, id: &str) -> String {
    let hosts: Vec<String> = hosts
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .map(regex::escape)
        .collect();
    let by_token = format!(r"(?:\A|\s)(?:{})[:\s]\s*", tokens.join("|"));
    let prefix = if hosts.is_empty() {
        by_token
    } else {
        format!("(?:(?:{})/(?:{path})?|{by_token})", hosts.join("|"))
    };
    format!("{prefix}({id})")
}

#[derive(Debug, Clone)]
struct Pattern {
    anywhere: Regex,
    whole_line: Regex,
}

impl Pattern {
    fn new(body: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            anywhere: Regex::new(&format!("(?i){body}"))?,
            whole_line: Regex::new(&format!(r"(?i)\A\s*(?:{body})\s*\z"))?,
        })
    }

    /// Ids in order of first appearance, without repetitions.
    fn scan(&self, text: &str) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for caps in self.anywhere.captures_iter(text) {
            let id = &caps[1];
            if !ids.iter().any(|known| known == id) {
                ids.push(id.to_string());
            }
        }
        ids
    }
}

/// Compiled reference patterns for one set of hosts.
#[derive(Debug, Clone)]
pub struct RefScanner {
    bugzilla: Pattern,
    gerrit: Pattern,
}

impl RefScanner {
    /// Builds the patterns. Hosts are given without scheme; empty ones are
    /// skipped.
    pub fn new(bugzilla_hosts: &[String], gerrit_hosts: &[String]) -> Result<Self, regex::Error> {
        Ok(Self {
            bugzilla: Pattern::new(&reference_pattern(
                bugzilla_hosts,
                &BUGZILLA_TOKENS,
                r"show_bug\.cgi\?id=",
                r"\d+",
            ))?,
            gerrit: Pattern::new(&reference_pattern(
                gerrit_hosts,
                &GERRIT_TOKENS,
                "#/c/",
                r"\d+|I?[0-9a-f]{6,}",
            ))?,
        })
    }

    pub fn bugs(&self, text: &str) -> Vec<String> {
        self.bugzilla.scan(text)
    }

    pub fn changes(&self, text: &str) -> Vec<String> {
        self.gerrit.scan(text)
    }

    /// Bugs referenced on lines of their own, as Gerrit commit messages
    /// carry them.
    pub fn bugs_in_commit_message(&self, message: &str) -> Vec<String> {
        let mut bugs: Vec<String> = Vec::new();
        for line in message.lines() {
            if let Some(caps) = self.bugzilla.whole_line.captures(line) {
                let id = caps[1].to_string();
                if !bugs.contains(&id) {
                    bugs.push(id);
                }
            }
        }
        bugs
    }

    /// All references in `text` as cache keys, Bugzilla first.
    pub fn keys(&self, text: &str) -> Vec<CacheKey> {
        let bugs = self.bugs(text).into_iter().map(|id| CacheKey::new(BUGZILLA, id));
        let changes = self
            .changes(text)
            .into_iter()
            .map(|id| CacheKey::new(GERRIT, id));
        bugs.chain(changes).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> RefScanner {
        RefScanner::new(
            &["bugzilla.example.org".to_string(), "bz.example.com".to_string()],
            &["review.example.org".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_bug_tokens() {
        let s = scanner();
        assert_eq!(s.bugs("see bug:36734"), ["36734"]);
        assert_eq!(s.bugs("BZ 1, Bugzilla:  2 and bz:1 again"), ["1", "2"]);
        assert!(s.bugs("debug:36734").is_empty());
        assert!(s.bugs("bug#36734").is_empty());
    }

    #[test]
    fn test_bug_urls() {
        let s = scanner();
        assert_eq!(
            s.bugs("https://bugzilla.example.org/show_bug.cgi?id=11 and bz.example.com/12"),
            ["11", "12"]
        );
        assert!(s.bugs("bugzillaXexample.org/13").is_empty());
    }

    #[test]
    fn test_change_refs() {
        let s = scanner();
        assert_eq!(
            s.changes("gerrit: 531232, review.example.org/#/c/42 and change I0123abcd"),
            ["531232", "42", "I0123abcd"]
        );
        assert!(s.changes("change abc").is_empty());
    }

    #[test]
    fn test_commit_message_bugs() {
        let s = scanner();
        let message = "Fix the frobnicator\n\nIt was broken, see bug 7.\n  BZ: 36734  \nbug 8\n";
        assert_eq!(s.bugs_in_commit_message(message), ["36734", "8"]);
    }

    #[test]
    fn test_without_hosts() {
        let s = RefScanner::new(&[String::new()], &[]).unwrap();
        assert_eq!(s.bugs("bz 5 and /6"), ["5"]);
        assert_eq!(
            s.keys("bz 5 gerrit 77"),
            [CacheKey::new(BUGZILLA, "5"), CacheKey::new(GERRIT, "77")]
        );
    }

    #[test]
    fn test_service_for_token() {
        assert_eq!(service_for_token("BZ"), Some(BUGZILLA));
        assert_eq!(service_for_token("review"), Some(GERRIT));
        assert_eq!(service_for_token("jira"), None);
    }
}
