//! Exclusive lock on a run directory.
//!
//! The LOCK file holds the PID of the owning process. A LOCK left by a process
//! that has exited, or one without a readable PID, is reclaimed.

use crate::error::{HarnessError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// File name of the lock inside a run directory.
pub const LOCK_FILE: &str = "LOCK";

/// Stale locks removed before giving up on a contended directory.
const MAX_RECLAIMS: u32 = 3;

/// RAII guard for a run-directory lock.
///
/// The file lock is released and the LOCK file removed on drop.
#[derive(Debug)]
pub struct RunDirLock {
    file: Option<File>,
    path: PathBuf,
}

/// Owner recorded in an existing LOCK file.
#[derive(Debug, PartialEq, Eq)]
enum Holder {
    Running(u32),
    Exited(u32),
    Unparseable,
    Vanished,
}

impl RunDirLock {
    /// Acquires the lock for `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns `RunDirLocked` if a live process holds it, and `RunDirBusy`
    /// if the LOCK file keeps reappearing or cannot be locked.
    pub fn acquire(work_dir: &Path) -> Result<Self> {
        fs::create_dir_all(work_dir)?;
        let path = work_dir.join(LOCK_FILE);

        for _ in 0..MAX_RECLAIMS {
            if let Some(lock) = Self::create(&path)? {
                return Ok(lock);
            }
            match Holder::inspect(&path)? {
                Holder::Running(pid) => return Err(HarnessError::RunDirLocked { pid }),
                Holder::Exited(pid) => {
                    warn!(pid, path = %path.display(), "Reclaiming lock of exited process");
                    remove_if_present(&path)?;
                }
                Holder::Unparseable => {
                    warn!(path = %path.display(), "Reclaiming lock without a PID");
                    remove_if_present(&path)?;
                }
                Holder::Vanished => {}
            }
        }
        Err(HarnessError::RunDirBusy)
    }

    /// Path of the LOCK file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates and claims the LOCK file; `None` if it already exists.
    fn create(path: &Path) -> Result<Option<Self>> {
        let file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // From here on, dropping the guard removes the file again.
        let lock = Self {
            file: Some(file),
            path: path.to_path_buf(),
        };
        lock.claim()?;
        Ok(Some(lock))
    }

    /// Records our PID and takes the exclusive file lock.
    fn claim(&self) -> Result<()> {
        let Some(mut file) = self.file.as_ref() else {
            return Err(HarnessError::RunDirBusy);
        };
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;
        file.try_lock_exclusive()
            .map_err(|_| HarnessError::RunDirBusy)
    }
}

impl Drop for RunDirLock {
    fn drop(&mut self) {
        drop(self.file.take());
        if let Err(e) = remove_if_present(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}

impl Holder {
    fn inspect(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::Vanished),
            Err(_) => return Err(HarnessError::RunDirBusy),
        };
        Ok(match content.trim().parse::<u32>() {
            Ok(pid) if pid_is_running(pid) => Self::Running(pid),
            Ok(pid) => Self::Exited(pid),
            Err(_) => Self::Unparseable,
        })
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// A zombie still has a /proc entry, so look for its stat file.
#[cfg(target_os = "linux")]
fn pid_is_running(pid: u32) -> bool {
    Path::new("/proc")
        .join(pid.to_string())
        .join("stat")
        .exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn pid_is_running(pid: u32) -> bool {
    match std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stderr(std::process::Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn pid_is_running(_pid: u32) -> bool {
    true
}
