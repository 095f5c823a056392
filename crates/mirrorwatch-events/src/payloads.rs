//! Event payload types emitted by watch sessions.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier assigned to each event emitted on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed events surfaced to presentation layers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A session validated its target and subscribed to change notifications.
    WatchingStarted {
        /// Session that started watching.
        session_id: Uuid,
        /// File being watched.
        input_path: String,
        /// Directory receiving the mirrored copy.
        output_dir: String,
    },
    /// The watched file reported a content or size change.
    ChangeDetected {
        /// Session that observed the change.
        session_id: Uuid,
        /// Path reported by the notification source.
        path: String,
    },
    /// Intermediate progress while copying the watched file.
    CopyProgress {
        /// Session performing the copy.
        session_id: Uuid,
        /// Fraction of the source copied so far, within `0.0..=1.0`.
        fraction: f64,
        /// Bytes written to the destination so far.
        bytes_copied: u64,
        /// Source length sampled when the copy started.
        bytes_total: u64,
    },
    /// The watched file was mirrored successfully.
    CopySucceeded {
        /// Session that performed the copy.
        session_id: Uuid,
        /// Destination file that now holds the mirrored bytes.
        destination: String,
    },
    /// Copying the watched file failed; the event is not retried.
    CopyFailed {
        /// Session that attempted the copy.
        session_id: Uuid,
        /// Underlying error text.
        reason: String,
    },
    /// The file never became ready within the retry window; the change was skipped.
    ReadyTimeout {
        /// Session that gave up waiting.
        session_id: Uuid,
        /// Path that never stabilised.
        path: String,
        /// Number of probes performed before giving up.
        attempts: u32,
    },
    /// A session unsubscribed and will not dispatch further changes.
    WatchingStopped {
        /// Session that stopped.
        session_id: Uuid,
    },
    /// Persisted settings were updated.
    SettingsChanged {
        /// Description of the applied change.
        description: String,
    },
}

impl Event {
    /// Machine-friendly discriminator for renderers and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WatchingStarted { .. } => "watching_started",
            Self::ChangeDetected { .. } => "change_detected",
            Self::CopyProgress { .. } => "copy_progress",
            Self::CopySucceeded { .. } => "copy_succeeded",
            Self::CopyFailed { .. } => "copy_failed",
            Self::ReadyTimeout { .. } => "ready_timeout",
            Self::WatchingStopped { .. } => "watching_stopped",
            Self::SettingsChanged { .. } => "settings_changed",
        }
    }

    /// Session the event belongs to, when it is session-scoped.
    #[must_use]
    pub const fn session_id(&self) -> Option<Uuid> {
        match self {
            Self::WatchingStarted { session_id, .. }
            | Self::ChangeDetected { session_id, .. }
            | Self::CopyProgress { session_id, .. }
            | Self::CopySucceeded { session_id, .. }
            | Self::CopyFailed { session_id, .. }
            | Self::ReadyTimeout { session_id, .. }
            | Self::WatchingStopped { session_id } => Some(*session_id),
            Self::SettingsChanged { .. } => None,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}
