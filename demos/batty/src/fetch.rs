//! Bugzilla and Gerrit fetchers.
//!
//! Both degrade every failure (network, timeout, unexpected payload) to
//! [`Lookup::NotFound`]; the error is logged and the negative result cached
//! like any other.

use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use ircbot::prelude::*;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::refs::{BUGZILLA, GERRIT};

/// Announced in place of the title of a bug that could not be fetched.
pub const BUG_NOT_FOUND: &str = "Bug not found :(";

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Fields a Gerrit change record must carry.
const CHANGE_FIELDS: [&str; 3] = ["url", "subject", "commitMessage"];

static TITLE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok());

/// Shared, runtime-settable Bugzilla API key.
pub type ApiKey = Arc<RwLock<Option<String>>>;

// =============================================================================
// Bugzilla
// =============================================================================

pub fn bugzilla_url(host: &str, id: &str) -> String {
    format!("https://{host}/{id}")
}

/// Decodes the entities Bugzilla puts in page titles.
pub fn unescape_html(text: &str) -> String {
    text.replace("&ndash;", "–")
        .replace("&mdash;", "—")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// The unescaped, whitespace-collapsed `<title>` of an HTML page.
pub fn page_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.as_ref()?.captures(html)?.get(1)?.as_str();
    let title = unescape_html(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!title.is_empty()).then_some(title)
}

/// Title from a `/rest/bug/<id>` response, styled like the HTML one.
pub fn rest_title(id: &str, body: &Value) -> Option<String> {
    let summary = body.get("bugs")?.get(0)?.get("summary")?.as_str()?;
    Some(format!("Bug {id} – {summary}"))
}

pub struct BugzillaFetcher {
    client: reqwest::Client,
    host: String,
    api_key: ApiKey,
}

impl BugzillaFetcher {
    pub fn new(host: impl Into<String>, api_key: ApiKey) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("batty/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            host: host.into(),
            api_key,
        })
    }

    async fn scrape(&self, id: &str) -> reqwest::Result<Option<String>> {
        let html = self
            .client
            .get(bugzilla_url(&self.host, id))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(page_title(&html))
    }

    async fn query(&self, id: &str, key: &str) -> reqwest::Result<Option<String>> {
        let body: Value = self
            .client
            .get(format!("https://{}/rest/bug/{id}", self.host))
            .header("X-BUGZILLA-API-KEY", key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rest_title(id, &body))
    }
}

#[async_trait]
impl Fetcher for BugzillaFetcher {
    fn service(&self) -> &str {
        BUGZILLA
    }

    async fn fetch(&self, id: &str) -> Lookup {
        let key = self.api_key.read().clone();
        let result = match key {
            Some(key) => self.query(id, &key).await,
            None => self.scrape(id).await,
        };
        match result {
            Ok(Some(title)) => {
                debug!(bug = id, title = %title, "fetched bug");
                Lookup::Found(json!(title))
            }
            Ok(None) => {
                debug!(bug = id, "no title for bug");
                Lookup::NotFound
            }
            Err(e) => {
                warn!(bug = id, error = %e, "bug fetch failed");
                Lookup::NotFound
            }
        }
    }
}

// =============================================================================
// Gerrit
// =============================================================================

/// The first record of a `gerrit query --format=json` stream, reduced to
/// the fields the bot announces. `None` unless all of them are strings.
pub fn parse_query_output(output: &str) -> Option<Value> {
    let first = serde_json::Deserializer::from_str(output)
        .into_iter::<Value>()
        .next()?
        .ok()?;
    let mut change = Map::new();
    for field in CHANGE_FIELDS {
        let value = first.get(field)?.as_str()?;
        change.insert(field.to_string(), json!(value));
    }
    Some(Value::Object(change))
}

pub struct GerritFetcher {
    host: String,
    user: Option<String>,
    port: u16,
}

impl GerritFetcher {
    pub fn new(host: impl Into<String>, user: Option<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            user,
            port,
        }
    }

    /// `ssh` arguments for querying `change`.
    pub fn ssh_args(&self, change: &str) -> Vec<String> {
        let target = match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        };
        [
            target.as_str(),
            "-p",
            &self.port.to_string(),
            "gerrit",
            "query",
            "--format=json",
            "--patch-sets",
            change,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    async fn query(&self, change: &str) -> Result<String, String> {
        let child = tokio::process::Command::new("ssh")
            .args(self.ssh_args(change))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn ssh: {e}"))?;

        let output = tokio::time::timeout(
            Duration::from_secs(FETCH_TIMEOUT_SECS),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| format!("timed out after {FETCH_TIMEOUT_SECS}s"))?
        .map_err(|e| e.to_string())?;

        if !output.status.success() {
            return Err(format!(
                "ssh exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Fetcher for GerritFetcher {
    fn service(&self) -> &str {
        GERRIT
    }

    async fn fetch(&self, id: &str) -> Lookup {
        match self.query(id).await {
            Ok(output) => match parse_query_output(&output) {
                Some(change) => Lookup::Found(change),
                None => {
                    debug!(change = id, "change not found");
                    Lookup::NotFound
                }
            },
            Err(e) => {
                warn!(change = id, error = %e, "gerrit query failed");
                Lookup::NotFound
            }
        }
    }
}
