//! Readiness probing for a single file.
//!
//! # Design
//! - A probe never fails for ordinary filesystem conditions: a missing or
//!   unreadable file is reported as `exists = false` or `unlocked = false`.
//! - "Unlocked" means an exclusive handle could be taken on a regular file
//!   that has content.
//! - The trait seam lets the gate run against scripted probes in tests.

use std::fs;
use std::io;
use std::path::Path;

use tracing::trace;

use crate::error::FsOpsResult;

/// Snapshot of a file's observable readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    /// The path could be stat'd.
    pub exists: bool,
    /// Size in bytes at probe time; zero when the file does not exist.
    pub size: u64,
    /// An exclusive handle was obtained and the file was non-empty.
    pub unlocked: bool,
}

impl ProbeReport {
    /// Report for a path that could not be stat'd.
    #[must_use]
    pub const fn missing() -> Self {
        Self {
            exists: false,
            size: 0,
            unlocked: false,
        }
    }
}

/// Answers whether a file currently looks stable and accessible.
pub trait ReadinessProbe: Send + Sync {
    /// Probe `path` once.
    ///
    /// # Errors
    ///
    /// Implementations may surface unexpected failures; the gate logs them and
    /// counts the attempt as not ready.
    fn probe(&self, path: &Path) -> FsOpsResult<ProbeReport>;
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReadinessProbe;

impl ReadinessProbe for FsReadinessProbe {
    fn probe(&self, path: &Path) -> FsOpsResult<ProbeReport> {
        let Ok(metadata) = fs::metadata(path) else {
            return Ok(ProbeReport::missing());
        };
        if !metadata.is_file() {
            return Ok(ProbeReport {
                exists: true,
                size: metadata.len(),
                unlocked: false,
            });
        }
        let unlocked = match open_exclusive(path) {
            Ok(length) => length > 0,
            Err(err) => {
                trace!(path = %path.display(), error = %err, "exclusive open refused");
                false
            }
        };
        Ok(ProbeReport {
            exists: true,
            size: metadata.len(),
            unlocked,
        })
    }
}

/// Open `path` for exclusive read and return the length seen through the handle.
#[cfg(unix)]
fn open_exclusive(path: &Path) -> io::Result<u64> {
    use nix::fcntl::{Flock, FlockArg};

    let file = fs::File::open(path)?;
    let locked = Flock::lock(file, FlockArg::LockExclusiveNonblock)
        .map_err(|(_, errno)| io::Error::from(errno))?;
    let length = locked.metadata()?.len();
    drop(locked);
    Ok(length)
}

#[cfg(windows)]
fn open_exclusive(path: &Path) -> io::Result<u64> {
    use std::os::windows::fs::OpenOptionsExt;

    let file = fs::OpenOptions::new().read(true).share_mode(0).open(path)?;
    Ok(file.metadata()?.len())
}

#[cfg(not(any(unix, windows)))]
fn open_exclusive(path: &Path) -> io::Result<u64> {
    Ok(fs::File::open(path)?.metadata()?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reports_not_existing() -> Result<()> {
        let temp = TempDir::new()?;
        let report = FsReadinessProbe.probe(&temp.path().join("absent.txt"))?;
        assert_eq!(report, ProbeReport::missing());
        Ok(())
    }

    #[test]
    fn readable_file_with_content_is_unlocked() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("a.txt");
        fs::write(&path, b"hello")?;
        let report = FsReadinessProbe.probe(&path)?;
        assert_eq!(
            report,
            ProbeReport {
                exists: true,
                size: 5,
                unlocked: true
            }
        );
        Ok(())
    }

    #[test]
    fn empty_file_is_never_unlocked() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("empty.txt");
        fs::write(&path, b"")?;
        let report = FsReadinessProbe.probe(&path)?;
        assert!(report.exists);
        assert_eq!(report.size, 0);
        assert!(!report.unlocked);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn exclusively_locked_file_is_not_unlocked() -> Result<()> {
        use mirrorwatch_test_support::fixtures::ExclusiveLock;

        let temp = TempDir::new()?;
        let path = temp.path().join("locked.txt");
        fs::write(&path, b"busy")?;
        let lock = ExclusiveLock::acquire(&path)?;
        let report = FsReadinessProbe.probe(&path)?;
        assert!(report.exists);
        assert!(!report.unlocked);
        drop(lock);
        assert!(FsReadinessProbe.probe(&path)?.unlocked);
        Ok(())
    }

    #[test]
    fn directories_exist_but_are_not_unlocked() -> Result<()> {
        let temp = TempDir::new()?;
        let report = FsReadinessProbe.probe(temp.path())?;
        assert!(report.exists);
        assert!(!report.unlocked);
        Ok(())
    }
}
