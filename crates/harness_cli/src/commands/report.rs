//! Print the last rendered report.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use console::style;
use harness_core::{REPORT_JSON_FILE, REPORT_TEXT_FILE};
use std::path::Path;

pub fn run(dir: &Path, json: bool) -> Result<()> {
    let file = if json {
        REPORT_JSON_FILE
    } else {
        REPORT_TEXT_FILE
    };
    let path = dir.join(file);
    if !path.exists() {
        anyhow::bail!(
            "No report in {}. Reports are written when a session finishes.",
            dir.display()
        );
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if !json {
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let written: DateTime<Local> = modified.into();
        println!(
            "{}",
            style(format!("Written {}", written.format("%Y-%m-%d %H:%M:%S"))).dim()
        );
    }
    print!("{}", content);

    Ok(())
}
