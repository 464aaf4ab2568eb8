//! Reset a run directory.

use super::open_store;
use anyhow::{Context, Result};
use console::style;
use harness_core::{REPORT_JSON_FILE, REPORT_TEXT_FILE};
use std::path::Path;

/// Empties the store and removes rendered reports. `session.toml` is kept.
pub fn run(dir: &Path) -> Result<()> {
    let (_lock, store) = open_store(dir)?;
    store.clear().context("Failed to clear store")?;
    store.close();

    for file in [REPORT_TEXT_FILE, REPORT_JSON_FILE] {
        let path = dir.join(file);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }

    println!(
        "{} Cleared {}",
        style("✓").green(),
        style(dir.display()).cyan()
    );
    Ok(())
}
