//! Append-only plaintext log of copy failures.
//!
//! Each record is a single line, `<RFC 3339 UTC timestamp>: <detail>`, written
//! with one `write_all` while holding a process-wide lock.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{FsOpsError, FsOpsResult};

static APPEND_LOCK: Mutex<()> = Mutex::new(());

/// Handle to the durable error log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Log writing to `path`; the file and its directory are created lazily.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the directory or file cannot be opened
    /// or written.
    pub fn append(&self, detail: &str) -> FsOpsResult<()> {
        self.append_at(Utc::now(), detail)
    }

    fn append_at(&self, timestamp: DateTime<Utc>, detail: &str) -> FsOpsResult<()> {
        let record = format_record(timestamp, detail);
        let _guard = APPEND_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| FsOpsError::io("error_log.create_dir", parent, source))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| FsOpsError::io("error_log.open", &self.path, source))?;
        file.write_all(record.as_bytes())
            .map_err(|source| FsOpsError::io("error_log.write", &self.path, source))
    }
}

fn format_record(timestamp: DateTime<Utc>, detail: &str) -> String {
    let single_line = detail.replace(['\r', '\n'], " ");
    format!(
        "{}: {single_line}\n",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn records_are_timestamped_single_lines() -> Result<()> {
        let temp = TempDir::new()?;
        let log = ErrorLog::new(temp.path().join("logs").join("errors.log"));
        let at = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("valid timestamp"))?;

        log.append_at(at, "copy failed\nsecond line")?;
        log.append_at(at, "again")?;

        let contents = fs::read_to_string(log.path())?;
        assert_eq!(
            contents,
            "2024-05-01T12:30:00.000Z: copy failed second line\n2024-05-01T12:30:00.000Z: again\n"
        );
        Ok(())
    }

    #[test]
    fn concurrent_appends_do_not_interleave() -> Result<()> {
        let temp = TempDir::new()?;
        let log = Arc::new(ErrorLog::new(temp.path().join("errors.log")));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let log = Arc::clone(&log);
                thread::spawn(move || -> FsOpsResult<()> {
                    for line in 0..25 {
                        log.append(&format!("worker {worker} line {line}"))?;
                    }
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("append worker panicked"))??;
        }

        let contents = fs::read_to_string(log.path())?;
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 200);
        assert!(lines.iter().all(|line| line.contains(": worker ")));
        Ok(())
    }
}
