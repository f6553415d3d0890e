//! The `[plugins.batty]` configuration section.

use serde::{Deserialize, Serialize};

/// Bugzilla and Gerrit endpoints plus announcement tuning.
///
/// ```toml
/// [plugins.batty]
/// bugzilla_url = "https://bugzilla.example.org"
/// gerrit_url = "https://review.example.org"
/// gerrit_user = "batty"
/// hush = 600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattySettings {
    pub bugzilla_url: String,
    /// Further Bugzilla hosts whose URLs are recognized.
    pub bugzilla_alt: Vec<String>,
    /// Enables lookups through the REST API instead of page scraping.
    pub bugzilla_api_key: Option<String>,
    pub gerrit_url: String,
    /// Further Gerrit hosts whose URLs are recognized.
    pub gerrit_alt: Vec<String>,
    /// Ssh user for `gerrit query`.
    pub gerrit_user: Option<String>,
    pub gerrit_port: u16,
    /// Seconds during which a reference is not announced again.
    pub hush: Option<i64>,
}

impl Default for BattySettings {
    fn default() -> Self {
        Self {
            bugzilla_url: String::new(),
            bugzilla_alt: Vec::new(),
            bugzilla_api_key: None,
            gerrit_url: String::new(),
            gerrit_alt: Vec::new(),
            gerrit_user: None,
            gerrit_port: 29418,
            hush: None,
        }
    }
}

impl BattySettings {
    pub fn bugzilla_host(&self) -> &str {
        strip_scheme(&self.bugzilla_url)
    }

    pub fn gerrit_host(&self) -> &str {
        strip_scheme(&self.gerrit_url)
    }

    /// The Bugzilla host followed by the alternates, without schemes.
    pub fn bugzilla_hosts(&self) -> Vec<String> {
        host_list(self.bugzilla_host(), &self.bugzilla_alt)
    }

    pub fn gerrit_hosts(&self) -> Vec<String> {
        host_list(self.gerrit_host(), &self.gerrit_alt)
    }

    /// Missing mandatory settings, by name.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bugzilla_host().is_empty() {
            missing.push("bugzilla_url");
        }
        if self.gerrit_host().is_empty() {
            missing.push("gerrit_url");
        }
        missing
    }
}

pub fn host_list(main: &str, alternates: &[String]) -> Vec<String> {
    std::iter::once(main)
        .chain(alternates.iter().map(|h| strip_scheme(h)))
        .map(str::to_string)
        .collect()
}

/// `https://host/path` → `host/path`.
pub fn strip_scheme(url: &str) -> &str {
    let url = url.trim().trim_end_matches('/');
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosts() {
        let settings = BattySettings {
            bugzilla_url: "https://bugzilla.example.org/".to_string(),
            gerrit_url: "review.example.org".to_string(),
            ..BattySettings::default()
        };
        assert_eq!(settings.bugzilla_host(), "bugzilla.example.org");
        assert_eq!(settings.gerrit_host(), "review.example.org");
        assert!(settings.missing().is_empty());
        assert_eq!(settings.bugzilla_hosts(), ["bugzilla.example.org"]);

        let settings = BattySettings {
            gerrit_alt: vec!["http://gerrit.example.com".to_string()],
            ..settings
        };
        assert_eq!(settings.gerrit_hosts(), ["review.example.org", "gerrit.example.com"]);
        assert_eq!(BattySettings::default().missing(), ["bugzilla_url", "gerrit_url"]);
    }
}
