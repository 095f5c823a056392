//! Context propagation helpers for application and session spans.
//!
//! # Design
//! - Provides an application-level span guard so top-level spans carry mode/build info.
//! - Builds per-session spans so every log line of a watch cycle names its session.

use std::path::Path;

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
#[derive(Debug)]
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    /// Enter the application-level tracing span for the lifetime of the guard.
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Record the current application mode on the active span.
pub fn record_app_mode(mode: &str) {
    Span::current().record("mode", tracing::field::display(mode));
}

/// Span wrapping everything a single watch session does.
#[must_use]
pub fn session_span(session_id: &str, input: &Path) -> Span {
    tracing::info_span!(
        "watch_session",
        session_id = %session_id,
        input = %input.display(),
        state = tracing::field::Empty
    )
}

/// Record the session state machine position on a session span.
pub fn record_session_state(span: &Span, state: &str) {
    span.record("state", tracing::field::display(state));
}
