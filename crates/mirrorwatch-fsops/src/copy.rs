//! Copy engine mirroring a ready file into its destination.
//!
//! # Design
//! - Existing destinations are overwritten, unless the destination is the
//!   source file itself (same path or same inode); that copy is refused.
//! - Progress copies stream fixed-size chunks and report `0.0`, one fraction
//!   per chunk, then finish on exactly `1.0`. A zero-length source reports a
//!   single `1.0`.
//! - Failures are terminal for the change event: they are returned as
//!   [`CopyOutcome::Failure`] and appended to the error log, never retried here.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use mirrorwatch_config::{DEFAULT_CHUNK_SIZE, WatchTuning};
use tracing::{error, info, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::error_log::ErrorLog;

/// Result of one copy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The destination now holds the source bytes.
    Success {
        /// File that was written.
        destination: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// The copy failed; the reason carries the underlying error text.
    Failure {
        /// Human-readable failure reason.
        reason: String,
    },
}

impl CopyOutcome {
    /// Whether the copy succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Progress update emitted by a progress-reporting copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopyProgress {
    /// Completion in `[0.0, 1.0]`.
    pub fraction: f64,
    /// Bytes written so far.
    pub bytes_copied: u64,
    /// Source size observed when the copy started.
    pub bytes_total: u64,
}

/// Destination path for `source` inside `output_dir`, keeping the base name.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidInput`] when `source` has no file name.
pub fn destination_for(source: &Path, output_dir: &Path) -> FsOpsResult<PathBuf> {
    let name = source.file_name().ok_or_else(|| FsOpsError::InvalidInput {
        field: "source",
        reason: "missing file name",
        value: Some(source.display().to_string()),
    })?;
    Ok(output_dir.join(name))
}

/// Performs source-to-destination transfers.
#[derive(Debug, Clone)]
pub struct CopyEngine {
    chunk_size: usize,
    error_log: Option<ErrorLog>,
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl CopyEngine {
    /// Engine with the given chunk size and no error log. A zero chunk size
    /// falls back to the default.
    #[must_use]
    pub const fn new(chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            chunk_size,
            error_log: None,
        }
    }

    /// Engine configured from validated tuning values.
    #[must_use]
    pub const fn from_tuning(tuning: &WatchTuning) -> Self {
        Self::new(tuning.chunk_size)
    }

    /// Record failures in `log`.
    #[must_use]
    pub fn with_error_log(mut self, log: ErrorLog) -> Self {
        self.error_log = Some(log);
        self
    }

    /// Configured chunk size in bytes.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Copy without progress reporting.
    pub fn copy(&self, source: &Path, destination: &Path) -> CopyOutcome {
        self.copy_with_progress(source, destination, false, |_| {})
    }

    /// Copy `source` over `destination`, calling `on_progress` per chunk when
    /// `report_progress` is set.
    pub fn copy_with_progress<F>(
        &self,
        source: &Path,
        destination: &Path,
        report_progress: bool,
        on_progress: F,
    ) -> CopyOutcome
    where
        F: FnMut(CopyProgress),
    {
        let result = if is_same_file(source, destination) {
            Err(FsOpsError::InvalidInput {
                field: "destination",
                reason: "destination is the source file",
                value: Some(destination.display().to_string()),
            })
        } else if report_progress {
            self.chunked_copy(source, destination, on_progress)
        } else {
            fs::copy(source, destination)
                .map_err(|err| FsOpsError::io("copy.whole_file", destination, err))
        };

        match result {
            Ok(bytes) => {
                info!(
                    source = %source.display(),
                    destination = %destination.display(),
                    bytes,
                    "file mirrored"
                );
                CopyOutcome::Success {
                    destination: destination.to_path_buf(),
                    bytes,
                }
            }
            Err(err) => {
                let reason = err.detail();
                error!(
                    source = %source.display(),
                    destination = %destination.display(),
                    error = %err,
                    detail = %reason,
                    "copy failed"
                );
                self.record_failure(source, &reason);
                CopyOutcome::Failure { reason }
            }
        }
    }

    fn chunked_copy<F>(
        &self,
        source: &Path,
        destination: &Path,
        mut on_progress: F,
    ) -> FsOpsResult<u64>
    where
        F: FnMut(CopyProgress),
    {
        let mut reader =
            File::open(source).map_err(|err| FsOpsError::io("copy.open_source", source, err))?;
        let total = reader
            .metadata()
            .map_err(|err| FsOpsError::io("copy.stat_source", source, err))?
            .len();
        let mut writer = File::create(destination)
            .map_err(|err| FsOpsError::io("copy.create_destination", destination, err))?;

        let progress = |bytes_copied: u64, fraction: f64| CopyProgress {
            fraction,
            bytes_copied,
            bytes_total: total,
        };
        if total > 0 {
            on_progress(progress(0, 0.0));
        }

        let mut buffer = vec![0_u8; self.chunk_size];
        let mut copied: u64 = 0;
        let mut last_fraction = 0.0;
        loop {
            let read = reader
                .read(&mut buffer)
                .map_err(|err| FsOpsError::io("copy.read", source, err))?;
            if read == 0 {
                break;
            }
            writer
                .write_all(&buffer[..read])
                .map_err(|err| FsOpsError::io("copy.write", destination, err))?;
            copied = copied.saturating_add(read as u64);
            last_fraction = progress_fraction(copied, total);
            on_progress(progress(copied, last_fraction));
        }
        writer
            .flush()
            .map_err(|err| FsOpsError::io("copy.flush", destination, err))?;

        // Empty sources and sources that shrank mid-copy still finish on 1.0.
        if last_fraction < 1.0 {
            on_progress(progress(copied, 1.0));
        }
        Ok(copied)
    }

    fn record_failure(&self, source: &Path, reason: &str) {
        let Some(log) = &self.error_log else {
            return;
        };
        let detail = format!("copy of {} failed: {reason}", source.display());
        if let Err(err) = log.append(&detail) {
            warn!(
                path = %log.path().display(),
                error = %err,
                detail = %err.detail(),
                "failed to append to error log"
            );
        }
    }
}

fn is_same_file(source: &Path, destination: &Path) -> bool {
    if source == destination {
        return true;
    }
    let (Ok(src), Ok(dst)) = (fs::metadata(source), fs::metadata(destination)) else {
        return false;
    };
    same_identity(source, &src, destination, &dst)
}

#[cfg(unix)]
fn same_identity(_: &Path, src: &fs::Metadata, _: &Path, dst: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    src.dev() == dst.dev() && src.ino() == dst.ino()
}

#[cfg(not(unix))]
fn same_identity(source: &Path, _: &fs::Metadata, destination: &Path, _: &fs::Metadata) -> bool {
    matches!(
        (fs::canonicalize(source), fs::canonicalize(destination)),
        (Ok(a), Ok(b)) if a == b
    )
}

#[allow(clippy::cast_precision_loss)]
fn progress_fraction(copied: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (copied as f64 / total as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn collect_progress(
        engine: &CopyEngine,
        source: &Path,
        destination: &Path,
    ) -> (CopyOutcome, Vec<CopyProgress>) {
        let mut updates = Vec::new();
        let outcome = engine.copy_with_progress(source, destination, true, |p| updates.push(p));
        (outcome, updates)
    }

    #[test]
    fn plain_copy_is_byte_identical_and_overwrites() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("a.txt");
        let destination = temp.path().join("out.txt");
        fs::write(&source, b"hello world")?;
        fs::write(&destination, b"stale contents that are longer")?;

        let outcome = CopyEngine::default().copy(&source, &destination);
        assert_eq!(
            outcome,
            CopyOutcome::Success {
                destination: destination.clone(),
                bytes: 11
            }
        );
        assert_eq!(fs::read(&destination)?, b"hello world");
        Ok(())
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_one() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("big.bin");
        let destination = temp.path().join("copy.bin");
        let payload: Vec<u8> = b"0123456789abcdef"
            .iter()
            .copied()
            .cycle()
            .take(10_000)
            .collect();
        fs::write(&source, &payload)?;

        let (outcome, updates) = collect_progress(&CopyEngine::new(1024), &source, &destination);
        assert!(outcome.is_success());
        assert_eq!(fs::read(&destination)?, payload);

        assert_eq!(updates.first().map(|p| p.fraction), Some(0.0));
        assert_eq!(updates.last().map(|p| p.fraction), Some(1.0));
        assert_eq!(updates.len(), 1 + 10);
        assert!(updates.windows(2).all(|w| w[0].fraction <= w[1].fraction));
        assert!(updates.iter().all(|p| (0.0..=1.0).contains(&p.fraction)));
        assert!(updates.iter().all(|p| p.bytes_total == 10_000));
        Ok(())
    }

    #[test]
    fn zero_length_source_reports_single_completion() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("empty.txt");
        let destination = temp.path().join("empty-copy.txt");
        fs::write(&source, b"")?;

        let (outcome, updates) = collect_progress(&CopyEngine::default(), &source, &destination);
        assert!(outcome.is_success());
        assert_eq!(updates.len(), 1);
        assert_eq!(updates.first().map(|p| p.fraction), Some(1.0));
        assert_eq!(fs::read(&destination)?.len(), 0);
        Ok(())
    }

    #[test]
    fn single_chunk_file_reports_start_and_end() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("a.txt");
        fs::write(&source, b"hello")?;
        let (_, updates) =
            collect_progress(&CopyEngine::default(), &source, &temp.path().join("b.txt"));
        let fractions: Vec<f64> = updates.iter().map(|p| p.fraction).collect();
        assert_eq!(fractions, vec![0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn failure_is_reported_and_logged() -> Result<()> {
        let temp = TempDir::new()?;
        let log = ErrorLog::new(temp.path().join("errors.log"));
        let engine = CopyEngine::default().with_error_log(log.clone());
        let missing = temp.path().join("missing.txt");

        let outcome = engine.copy(&missing, &temp.path().join("dest.txt"));
        let CopyOutcome::Failure { reason } = outcome else {
            anyhow::bail!("expected failure outcome");
        };
        assert!(reason.contains("copy.whole_file"));

        let (progress_outcome, updates) =
            collect_progress(&engine, &missing, &temp.path().join("dest.txt"));
        assert!(!progress_outcome.is_success());
        assert!(updates.is_empty());

        let logged = fs::read_to_string(log.path())?;
        assert_eq!(logged.lines().count(), 2);
        assert!(logged.lines().all(|line| line.contains("missing.txt")));
        Ok(())
    }

    #[test]
    fn copy_onto_itself_is_refused_and_source_kept() -> Result<()> {
        let temp = TempDir::new()?;
        let log = ErrorLog::new(temp.path().join("errors.log"));
        let engine = CopyEngine::new(4).with_error_log(log.clone());
        let source = temp.path().join("a.txt");
        fs::write(&source, b"hello")?;

        let outcome = engine.copy(&source, &source);
        let CopyOutcome::Failure { reason } = outcome else {
            anyhow::bail!("expected failure outcome");
        };
        assert!(reason.contains("destination is the source file"));

        let spelled = temp.path().join(".").join("a.txt");
        let (progress_outcome, updates) = collect_progress(&engine, &source, &spelled);
        assert!(!progress_outcome.is_success());
        assert!(updates.is_empty());

        assert_eq!(fs::read(&source)?, b"hello");
        assert_eq!(fs::read_to_string(log.path())?.lines().count(), 2);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn hard_link_destination_is_refused() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("a.txt");
        let link = temp.path().join("b.txt");
        fs::write(&source, b"hello")?;
        fs::hard_link(&source, &link)?;

        let (outcome, _) = collect_progress(&CopyEngine::new(4), &source, &link);
        assert!(!outcome.is_success());
        assert_eq!(fs::read(&source)?, b"hello");
        Ok(())
    }

    #[test]
    fn destination_keeps_base_name() -> Result<()> {
        let dest = destination_for(Path::new("/data/in/report.csv"), Path::new("/backup"))?;
        assert_eq!(dest, PathBuf::from("/backup/report.csv"));
        assert!(destination_for(Path::new("/"), Path::new("/backup")).is_err());
        Ok(())
    }

    #[test]
    fn zero_chunk_size_falls_back_to_default() {
        assert_eq!(CopyEngine::new(0).chunk_size(), DEFAULT_CHUNK_SIZE);
    }
}
