#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Readiness gating and copying for a single watched file.
//!
//! Layout: `probe.rs` (readiness prober), `gate.rs` (bounded stability
//! polling), `copy.rs` (copy engine with progress), `error_log.rs`
//! (append-only failure log), `error.rs` (`FsOpsError`).

pub mod copy;
pub mod error;
pub mod error_log;
pub mod gate;
pub mod probe;

pub use copy::{CopyEngine, CopyOutcome, CopyProgress, destination_for};
pub use error::{FsOpsError, FsOpsResult};
pub use error_log::ErrorLog;
pub use gate::{ChangeReadyGate, ReadinessAttempt, ReadyResult};
pub use probe::{FsReadinessProbe, ProbeReport, ReadinessProbe};
