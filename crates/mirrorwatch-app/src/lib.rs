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
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Mirrorwatch session wiring: target validation, watch sessions, and process context.
//!
//! Layout: `target.rs` (setup checks), `controller.rs` (subscription and worker queue),
//! `bootstrap.rs` (shared services and settings edits).

/// Process-wide services and settings edits.
pub mod bootstrap;
/// Watch controller and sessions.
pub mod controller;
/// Error types for application wiring.
pub mod error;
/// Input file and output directory pair.
pub mod target;

pub use bootstrap::{AppContext, run_until};
pub use controller::{SessionState, WatchController, WatchSession};
pub use error::{AppError, AppResult};
pub use target::WatchTarget;
