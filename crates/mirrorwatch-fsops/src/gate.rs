//! Change-ready gate: bounded polling until a file is stable.
//!
//! # Design
//! - A file is ready once two consecutive probes observe the same size and the
//!   second probe also obtained an exclusive handle.
//! - Every attempt, including a missing file or a probe error, consumes one of
//!   the bounded attempts and is followed by the retry delay.
//! - The gate blocks the calling thread; async callers run it on the blocking pool.

use std::path::Path;
use std::thread;
use std::time::Duration;

use mirrorwatch_config::WatchTuning;
use tracing::{debug, warn};

use crate::probe::{FsReadinessProbe, ReadinessProbe};

/// Verdict of a gate invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyResult {
    /// The file was stable and exclusively openable.
    Ready {
        /// Attempts consumed, including the successful one.
        attempts: u32,
    },
    /// All attempts were exhausted without a stable observation.
    TimedOut {
        /// Attempts consumed.
        attempts: u32,
    },
}

impl ReadyResult {
    /// Whether the gate declared the file ready.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Attempts consumed by the invocation.
    #[must_use]
    pub const fn attempts(self) -> u32 {
        match self {
            Self::Ready { attempts } | Self::TimedOut { attempts } => attempts,
        }
    }
}

/// One probe observation within a gate invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessAttempt {
    /// One-based attempt number.
    pub attempt_index: u32,
    /// Size seen by the probe; `None` when the file was missing or the probe failed.
    pub observed_size: Option<u64>,
    /// Whether an exclusive handle was obtained.
    pub is_unlocked: bool,
}

/// Polls a [`ReadinessProbe`] until a file is stable or attempts run out.
#[derive(Debug, Clone)]
pub struct ChangeReadyGate<P = FsReadinessProbe> {
    probe: P,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ChangeReadyGate<FsReadinessProbe> {
    /// Gate over the real filesystem using the supplied tuning.
    #[must_use]
    pub const fn filesystem(tuning: &WatchTuning) -> Self {
        Self::from_tuning(FsReadinessProbe, tuning)
    }
}

impl<P: ReadinessProbe> ChangeReadyGate<P> {
    /// Build a gate with explicit limits.
    #[must_use]
    pub const fn new(probe: P, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            probe,
            max_attempts,
            retry_delay,
        }
    }

    /// Build a gate from validated tuning values.
    #[must_use]
    pub const fn from_tuning(probe: P, tuning: &WatchTuning) -> Self {
        Self::new(probe, tuning.max_attempts, tuning.retry_delay)
    }

    /// Maximum number of probes per invocation.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Block until `path` is ready or the attempts are exhausted.
    pub fn wait_until_ready(&self, path: &Path) -> ReadyResult {
        self.wait_until_ready_observed(path, |_| {})
    }

    /// Like [`Self::wait_until_ready`], reporting each attempt to `observe`.
    pub fn wait_until_ready_observed<F>(&self, path: &Path, mut observe: F) -> ReadyResult
    where
        F: FnMut(&ReadinessAttempt),
    {
        let mut last_size: Option<u64> = None;

        for attempt_index in 1..=self.max_attempts {
            match self.probe.probe(path) {
                Ok(report) if report.exists => {
                    let attempt = ReadinessAttempt {
                        attempt_index,
                        observed_size: Some(report.size),
                        is_unlocked: report.unlocked,
                    };
                    debug!(
                        path = %path.display(),
                        attempt = attempt_index,
                        size = report.size,
                        unlocked = report.unlocked,
                        "readiness probe"
                    );
                    observe(&attempt);
                    if last_size == Some(report.size) && report.unlocked {
                        return ReadyResult::Ready {
                            attempts: attempt_index,
                        };
                    }
                    last_size = Some(report.size);
                }
                Ok(_) => {
                    debug!(path = %path.display(), attempt = attempt_index, "file not present");
                    observe(&ReadinessAttempt {
                        attempt_index,
                        observed_size: None,
                        is_unlocked: false,
                    });
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        attempt = attempt_index,
                        error = %err,
                        detail = %err.detail(),
                        "readiness probe failed; retrying"
                    );
                    observe(&ReadinessAttempt {
                        attempt_index,
                        observed_size: None,
                        is_unlocked: false,
                    });
                }
            }
            thread::sleep(self.retry_delay);
        }

        ReadyResult::TimedOut {
            attempts: self.max_attempts,
        }
    }
}
