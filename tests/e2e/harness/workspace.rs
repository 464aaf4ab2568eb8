//! Throwaway run directories for scenarios.
//!
//! Each scenario gets its own directory under the system temp dir, seeded
//! from `tests/fixtures/<name>` and removed when the [`RunDir`] is dropped.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A run directory owned by one scenario
pub struct RunDir {
    root: TempDir,
}

impl RunDir {
    /// Directory with no files at all
    pub fn blank() -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("harness-run-")
            .tempdir()
            .context("Failed to create run directory")?;
        Ok(Self { root })
    }

    /// Directory holding a copy of the named fixture
    pub fn seeded(fixture: &str) -> Result<Self> {
        let source = fixture_root(fixture);
        if !source.is_dir() {
            bail!("No fixture named {} at {}", fixture, source.display());
        }
        let run_dir = Self::blank()?;
        seed(&source, run_dir.path())
            .with_context(|| format!("Failed to seed run directory from {}", fixture))?;
        Ok(run_dir)
    }

    /// Root of the run directory
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Writes `content` at `relative`, creating parent directories
    pub fn put(&self, relative: &str, content: &[u8]) -> Result<()> {
        let target = self.path().join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content).with_context(|| format!("Failed to write {}", relative))
    }

    /// True if `relative` exists in the run directory
    pub fn has(&self, relative: &str) -> bool {
        self.path().join(relative).exists()
    }
}

fn fixture_root(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

/// Copies the tree under `from` into `into`, depth first.
fn seed(from: &Path, into: &Path) -> Result<()> {
    let mut pending = vec![(from.to_path_buf(), into.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        fs::create_dir_all(&dst)?;
        for entry in fs::read_dir(&src)? {
            let entry = entry?;
            let target = dst.join(entry.file_name());
            if entry.file_type()?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                fs::copy(entry.path(), &target)?;
            }
        }
    }
    Ok(())
}
