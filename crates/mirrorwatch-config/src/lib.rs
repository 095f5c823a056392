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

//! File-backed settings and watch tuning for mirrorwatch.
//!
//! Layout: `model.rs` (settings document, saved paths, tuning), `validate.rs`
//! (validation/parsing helpers), `store.rs` (`SettingsStore` + path discovery),
//! `defaults.rs` (default values and environment variable names).

pub mod defaults;
pub mod error;
pub mod model;
pub mod store;
mod validate;

pub use defaults::{
    CONFIG_DIR_ENV, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, ERROR_LOG_ENV,
};
pub use error::{ConfigError, ConfigResult};
pub use model::{SettingField, Settings, WatchTuning, WatchedPath};
pub use store::{SettingsStore, resolve_error_log_path};
