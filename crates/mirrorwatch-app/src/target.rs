//! Watch target: the input file and output directory pair.
//!
//! # Design
//! - Setup checks run once, before subscribing; a failure aborts the session.
//! - Paths are canonicalised during setup so notification paths compare cleanly.
//! - An output directory that would place the mirror on the input itself is
//!   rejected, since the copy would truncate the watched file.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use mirrorwatch_fsops::destination_for;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const WRITE_PROBE_PREFIX: &str = ".mirrorwatch-write-probe-";

/// Input file and output directory monitored by one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    input_file: PathBuf,
    output_dir: PathBuf,
}

impl WatchTarget {
    /// Describe a target without touching the filesystem.
    #[must_use]
    pub fn new(input_file: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_file: input_file.into(),
            output_dir: output_dir.into(),
        }
    }

    /// File being watched.
    #[must_use]
    pub fn input_file(&self) -> &Path {
        &self.input_file
    }

    /// Directory receiving the mirrored copy.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name of the watched input.
    #[must_use]
    pub fn file_name(&self) -> Option<&OsStr> {
        self.input_file.file_name()
    }

    /// Directory whose notifications are subscribed to.
    #[must_use]
    pub fn watch_dir(&self) -> &Path {
        match self.input_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Mirror location of the input inside the output directory.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::FsOps`] when the input path has no file name.
    pub fn destination(&self) -> AppResult<PathBuf> {
        destination_for(&self.input_file, &self.output_dir)
            .map_err(|err| AppError::fsops("target.destination", err))
    }

    /// Validate the target and return it with canonical paths.
    ///
    /// The input must be an existing regular file. The output directory is
    /// created when absent and must accept a throwaway marker file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InputMissing`], [`AppError::InputNotFile`],
    /// [`AppError::OutputIsInput`], or [`AppError::Setup`].
    pub fn prepare(&self) -> AppResult<Self> {
        let metadata = match fs::metadata(&self.input_file) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::InputMissing {
                    path: self.input_file.clone(),
                });
            }
            Err(err) => return Err(AppError::setup("target.stat_input", &self.input_file, err)),
        };
        if !metadata.is_file() {
            return Err(AppError::InputNotFile {
                path: self.input_file.clone(),
            });
        }

        fs::create_dir_all(&self.output_dir)
            .map_err(|err| AppError::setup("target.create_output", &self.output_dir, err))?;
        probe_writable(&self.output_dir)?;

        let input_file = fs::canonicalize(&self.input_file)
            .map_err(|err| AppError::setup("target.canonicalize_input", &self.input_file, err))?;
        let output_dir = fs::canonicalize(&self.output_dir)
            .map_err(|err| AppError::setup("target.canonicalize_output", &self.output_dir, err))?;
        let prepared = Self {
            input_file,
            output_dir,
        };
        if prepared.destination()? == prepared.input_file {
            return Err(AppError::OutputIsInput {
                path: prepared.input_file,
            });
        }
        Ok(prepared)
    }
}

fn probe_writable(dir: &Path) -> AppResult<()> {
    let marker = dir.join(format!("{WRITE_PROBE_PREFIX}{}", Uuid::new_v4().simple()));
    fs::write(&marker, b"")
        .map_err(|err| AppError::setup("target.write_probe", &marker, err))?;
    fs::remove_file(&marker)
        .map_err(|err| AppError::setup("target.remove_probe", &marker, err))?;
    debug!(dir = %dir.display(), "output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use mirrorwatch_test_support::fixtures::WatchWorkspace;

    #[test]
    fn prepare_creates_missing_output_directory() -> Result<()> {
        let workspace = WatchWorkspace::new("a.txt", b"hello")?;
        let output = workspace.root().join("fresh").join("nested");
        let prepared = WatchTarget::new(workspace.input(), &output).prepare()?;
        assert!(output.is_dir());
        assert!(prepared.input_file().is_absolute());
        assert_eq!(prepared.file_name(), Some(OsStr::new("a.txt")));
        assert_eq!(prepared.destination()?, prepared.output_dir().join("a.txt"));
        assert_eq!(fs::read_dir(&output)?.count(), 0);
        Ok(())
    }

    #[test]
    fn prepare_rejects_missing_input() -> Result<()> {
        let workspace = WatchWorkspace::new("a.txt", b"hello")?;
        let err = WatchTarget::new(workspace.root().join("nope.txt"), workspace.output_dir())
            .prepare()
            .err();
        assert!(matches!(err, Some(AppError::InputMissing { .. })));
        Ok(())
    }

    #[test]
    fn prepare_rejects_directory_input() -> Result<()> {
        let workspace = WatchWorkspace::new("a.txt", b"hello")?;
        let err = WatchTarget::new(workspace.output_dir(), workspace.root().join("out2"))
            .prepare()
            .err();
        assert!(matches!(err, Some(AppError::InputNotFile { .. })));
        Ok(())
    }

    #[test]
    fn output_path_occupied_by_file_is_setup_error() -> Result<()> {
        let workspace = WatchWorkspace::new("a.txt", b"hello")?;
        let blocker = workspace.root().join("blocker");
        fs::write(&blocker, b"not a dir")?;
        let err = WatchTarget::new(workspace.input(), &blocker).prepare().err();
        assert!(matches!(
            err,
            Some(AppError::Setup {
                operation: "target.create_output",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn output_in_input_directory_is_rejected() -> Result<()> {
        let workspace = WatchWorkspace::new("a.txt", b"hello")?;
        let input_dir = workspace.root().join("input");
        let err = WatchTarget::new(workspace.input(), &input_dir).prepare().err();
        assert!(matches!(err, Some(AppError::OutputIsInput { .. })));
        assert!(err.as_ref().is_some_and(AppError::is_setup));
        assert_eq!(fs::read(workspace.input())?, b"hello");

        // A differently spelled path to the same directory is caught too.
        let dotted = input_dir.join("..").join("input");
        let err = WatchTarget::new(workspace.input(), dotted).prepare().err();
        assert!(matches!(err, Some(AppError::OutputIsInput { .. })));
        Ok(())
    }

    #[test]
    fn watch_dir_defaults_to_current_directory() {
        assert_eq!(WatchTarget::new("a.txt", "out").watch_dir(), Path::new("."));
        assert_eq!(
            WatchTarget::new("/data/a.txt", "out").watch_dir(),
            Path::new("/data")
        );
    }
}
