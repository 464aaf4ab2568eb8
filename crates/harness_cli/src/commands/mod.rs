//! CLI commands.

pub mod clear;
pub mod init;
pub mod report;
pub mod show;

use anyhow::{Context, Result};
use harness_core::{ArtifactStore, HarnessError, RunDirLock};
use std::path::Path;

/// Locks `dir` and opens its store.
///
/// The lock is returned so it outlives the store.
pub(crate) fn open_store(dir: &Path) -> Result<(RunDirLock, ArtifactStore)> {
    if !dir.join(harness_core::STORE_FILE).exists() {
        anyhow::bail!(
            "No session store in {}. Run a session there first.",
            dir.display()
        );
    }
    let lock = RunDirLock::acquire(dir).map_err(with_suggestion)?;
    let store = ArtifactStore::open(dir)
        .map_err(with_suggestion)
        .with_context(|| format!("Failed to open store in {}", dir.display()))?;
    tracing::debug!(dir = %dir.display(), "Opened run directory");
    Ok((lock, store))
}

/// Appends the recovery suggestion, if any, to the error message.
pub(crate) fn with_suggestion(e: HarnessError) -> anyhow::Error {
    match e.recovery_suggestion() {
        Some(hint) => anyhow::anyhow!("{}\n  hint: {}", e, hint),
        None => anyhow::Error::new(e),
    }
}
