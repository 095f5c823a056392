//! Test fixtures for watched files and output directories.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

/// Temporary directory holding one input file and an output directory.
#[derive(Debug)]
pub struct WatchWorkspace {
    root: TempDir,
    input: PathBuf,
    output_dir: PathBuf,
}

impl WatchWorkspace {
    /// Create `input/<file_name>` with `contents` and an empty `output/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory or files cannot be created.
    pub fn new(file_name: &str, contents: &[u8]) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("mirrorwatch-")
            .tempdir()
            .context("create temp workspace")?;
        let input_dir = root.path().join("input");
        let output_dir = root.path().join("output");
        fs::create_dir_all(&input_dir).context("create input dir")?;
        fs::create_dir_all(&output_dir).context("create output dir")?;
        let input = input_dir.join(file_name);
        fs::write(&input, contents).context("write input file")?;
        Ok(Self {
            root,
            input,
            output_dir,
        })
    }

    /// Workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Watched input file.
    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Expected mirror location of the input file.
    #[must_use]
    pub fn destination(&self) -> PathBuf {
        self.input
            .file_name()
            .map_or_else(|| self.output_dir.clone(), |name| self.output_dir.join(name))
    }
}

/// Append `bytes` to the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or written.
pub fn append_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("open {} for append", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("append to {}", path.display()))
}

/// Background writer that keeps appending to a file at a fixed interval.
#[derive(Debug)]
pub struct GrowingWriter {
    handle: JoinHandle<Result<()>>,
}

impl GrowingWriter {
    /// Append `chunk` to `path` `count` times, sleeping `interval` between writes.
    #[must_use]
    pub fn start(path: PathBuf, chunk: Vec<u8>, interval: Duration, count: usize) -> Self {
        let handle = thread::spawn(move || {
            for _ in 0..count {
                append_bytes(&path, &chunk)?;
                thread::sleep(interval);
            }
            Ok(())
        });
        Self { handle }
    }

    /// Wait for the writer to finish.
    ///
    /// # Errors
    ///
    /// Returns the writer's error or an error if its thread panicked.
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| anyhow!("growing writer panicked"))?
    }
}

/// Holds an exclusive advisory lock on a file until dropped.
#[cfg(unix)]
pub struct ExclusiveLock {
    _lock: nix::fcntl::Flock<fs::File>,
}

#[cfg(unix)]
impl ExclusiveLock {
    /// Take a non-blocking exclusive `flock` on `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is already locked.
    pub fn acquire(path: &Path) -> Result<Self> {
        use nix::fcntl::{Flock, FlockArg};

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open {} for locking", path.display()))?;
        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|(_, errno)| anyhow!("flock {} failed: {errno}", path.display()))?;
        Ok(Self { _lock: lock })
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` elapses.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}
