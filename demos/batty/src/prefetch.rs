//! Startup prefetch lists.
//!
//! A prefetch list is a comma-separated sequence of `<token>:<id>` items,
//! e.g. `bz:36734,gerrit:531232`. It can be given directly, produced by a
//! shell command, or generated from a log by `batty prefetch-gen`.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::refs::RefScanner;

/// Splits a prefetch list into its items.
pub fn parse_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runs `command` through the shell and parses its output as a prefetch
/// list.
pub async fn generate(command: &str) -> Result<Vec<String>> {
    info!(command, "generating prefetch list");
    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .await
        .with_context(|| format!("failed to run {command:?}"))?;
    if !output.status.success() {
        bail!("{command:?} exited with {}", output.status);
    }
    Ok(parse_list(&String::from_utf8_lossy(&output.stdout)))
}

/// The references mentioned in `log`, as a prefetch list.
pub fn list_from_log(scanner: &RefScanner, log: &str) -> String {
    let bugs = scanner.bugs(log).into_iter().map(|id| format!("bz:{id}"));
    let changes = scanner
        .changes(log)
        .into_iter()
        .map(|id| format!("gerrit:{id}"));
    bugs.chain(changes).collect::<Vec<_>>().join(",")
}
