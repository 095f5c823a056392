//! Watch controller: one change subscription and one worker per target.
//!
//! # Design
//! - The notification callback only enqueues; a single worker task per session
//!   drains the queue in arrival order, so cycles never interleave.
//! - Gate and copy run on the blocking pool; the worker awaits each cycle
//!   before taking the next notice.
//! - Stopping drops the subscription and signals the worker. An in-flight cycle
//!   completes but no queued notice is dispatched afterwards.
//! - `WatchingStopped` is the last event of a session. Worker events are
//!   published under the state lock and dropped once the state is `Stopped`.
//! - Copy progress is published only when the whole percentage advances, so a
//!   large copy stays well inside the bus capacity.
//! - Only setup failures surface as errors; everything after start is
//!   reported as events.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use mirrorwatch_config::WatchTuning;
use mirrorwatch_events::{Event, EventBus};
use mirrorwatch_fsops::{ChangeReadyGate, CopyEngine, CopyOutcome, ErrorLog, ReadyResult};
use mirrorwatch_telemetry::{Metrics, record_session_state, session_span};
use notify::event::{EventKind, MetadataKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::{self, JoinHandle};
use tracing::{Instrument, Span, debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::target::WatchTarget;

/// Position of a session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Target validated, not yet subscribed.
    Idle,
    /// Subscribed and waiting for changes.
    Watching,
    /// Waiting for the file to become ready.
    Probing,
    /// Copying the file to its destination.
    Copying,
    /// Unsubscribed; terminal.
    Stopped,
}

impl SessionState {
    /// Lowercase label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Watching => "watching",
            Self::Probing => "probing",
            Self::Copying => "copying",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChangeNotice {
    path: PathBuf,
}

/// Publishes events and counts them.
#[derive(Debug, Clone)]
struct EventSink {
    events: EventBus,
    metrics: Metrics,
}

impl EventSink {
    fn emit(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        self.events.publish(event);
    }
}

/// Builds watch sessions sharing one event bus and metrics registry.
#[derive(Debug, Clone)]
pub struct WatchController {
    sink: EventSink,
    tuning: WatchTuning,
    report_progress: bool,
    error_log: Option<ErrorLog>,
}

impl WatchController {
    /// Controller publishing to `events` and counting into `metrics`.
    /// Progress reporting is on by default.
    #[must_use]
    pub const fn new(events: EventBus, metrics: Metrics, tuning: WatchTuning) -> Self {
        Self {
            sink: EventSink { events, metrics },
            tuning,
            report_progress: true,
            error_log: None,
        }
    }

    /// Toggle copy progress events.
    #[must_use]
    pub const fn with_progress(mut self, report_progress: bool) -> Self {
        self.report_progress = report_progress;
        self
    }

    /// Append copy failures to `log`.
    #[must_use]
    pub fn with_error_log(mut self, log: ErrorLog) -> Self {
        self.error_log = Some(log);
        self
    }

    /// Bus that sessions publish to.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.sink.events
    }

    /// Validate `target`, subscribe to its changes, and start the worker.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a setup error when the target is invalid, or
    /// [`AppError::Subscribe`] when change notifications cannot be registered.
    pub fn start(&self, target: &WatchTarget) -> AppResult<WatchSession> {
        let mut session = self.open_session(target)?;
        let watcher = subscribe(&session.target, session.notices.clone())?;
        session.watcher = Some(watcher);
        session.mark_watching();
        Ok(session)
    }

    fn open_session(&self, target: &WatchTarget) -> AppResult<WatchSession> {
        let target = target.prepare()?;
        let destination = target.destination()?;
        let id = Uuid::new_v4();
        let span = session_span(&id.to_string(), target.input_file());
        let state = Arc::new(Mutex::new(SessionState::Idle));
        record_session_state(&span, SessionState::Idle.as_str());

        let mut engine = CopyEngine::from_tuning(&self.tuning);
        if let Some(log) = &self.error_log {
            engine = engine.with_error_log(log.clone());
        }
        let worker = SessionWorker {
            session_id: id,
            input: target.input_file().to_path_buf(),
            destination,
            gate: Arc::new(ChangeReadyGate::filesystem(&self.tuning)),
            engine: Arc::new(engine),
            report_progress: self.report_progress,
            sink: self.sink.clone(),
            state: Arc::clone(&state),
            span: span.clone(),
        };

        let (notices, queue) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(queue, shutdown_rx).instrument(span.clone()));

        Ok(WatchSession {
            id,
            target,
            state,
            span,
            notices,
            shutdown,
            worker: Some(handle),
            watcher: None,
            sink: self.sink.clone(),
        })
    }
}

/// A running watch over one target.
///
/// Dropping the session unsubscribes and signals the worker without waiting,
/// so results of an in-flight cycle are never published. Call
/// [`WatchSession::stop`] to wait for them.
pub struct WatchSession {
    id: Uuid,
    target: WatchTarget,
    state: Arc<Mutex<SessionState>>,
    span: Span,
    notices: mpsc::UnboundedSender<ChangeNotice>,
    shutdown: watch::Sender<bool>,
    worker: Option<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
    sink: EventSink,
}

impl fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSession")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    /// Session identifier carried on every event.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Validated target with canonical paths.
    #[must_use]
    pub const fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unsubscribe, let an in-flight cycle finish, and mark the session stopped.
    /// Calling it again is a no-op.
    pub async fn stop(&mut self) {
        self.watcher.take();
        // Err only means the worker already exited.
        let _ = self.shutdown.send(true);
        if let Some(worker) = self.worker.take()
            && let Err(err) = worker.await
        {
            warn!(session_id = %self.id, error = %err, "session worker join failed");
        }
        self.finish();
    }

    fn mark_watching(&self) {
        transition(&self.state, &self.span, SessionState::Watching);
        self.sink.metrics.session_started();
        self.sink.emit(Event::WatchingStarted {
            session_id: self.id,
            input_path: self.target.input_file().display().to_string(),
            output_dir: self.target.output_dir().display().to_string(),
        });
        info!(
            session_id = %self.id,
            input = %self.target.input_file().display(),
            output = %self.target.output_dir().display(),
            "watching started"
        );
    }

    fn finish(&self) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, SessionState::Stopped);
        if previous == SessionState::Stopped {
            return;
        }
        record_session_state(&self.span, SessionState::Stopped.as_str());
        // Sessions that never reached Watching announced nothing.
        if previous == SessionState::Idle {
            return;
        }
        self.sink.metrics.session_stopped();
        self.sink
            .emit(Event::WatchingStopped { session_id: self.id });
        drop(guard);
        info!(session_id = %self.id, "watching stopped");
    }

    #[cfg(test)]
    fn inject(&self, path: PathBuf) -> bool {
        self.notices.send(ChangeNotice { path }).is_ok()
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.watcher.take();
        // Err only means the worker already exited.
        let _ = self.shutdown.send(true);
        self.finish();
    }
}

/// Publish a worker event unless the session has already announced its stop.
fn emit_while_live(state: &Mutex<SessionState>, sink: &EventSink, event: Event) {
    let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    if *guard == SessionState::Stopped {
        debug!(kind = event.kind(), "session stopped; event dropped");
        return;
    }
    sink.emit(event);
    drop(guard);
}

/// Whole percent of a progress fraction; `100` only for a finished copy.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_percent(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).floor() as u8
}

fn transition(state: &Mutex<SessionState>, span: &Span, next: SessionState) {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    if *guard == SessionState::Stopped {
        return;
    }
    *guard = next;
    record_session_state(span, next.as_str());
}

struct SessionWorker {
    session_id: Uuid,
    input: PathBuf,
    destination: PathBuf,
    gate: Arc<ChangeReadyGate>,
    engine: Arc<CopyEngine>,
    report_progress: bool,
    sink: EventSink,
    state: Arc<Mutex<SessionState>>,
    span: Span,
}

impl SessionWorker {
    async fn run(
        self,
        mut queue: mpsc::UnboundedReceiver<ChangeNotice>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let notice = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                notice = queue.recv() => match notice {
                    Some(notice) => notice,
                    None => break,
                },
            };
            self.handle(&notice).await;
        }
        debug!(session_id = %self.session_id, "session worker exiting");
    }

    async fn handle(&self, notice: &ChangeNotice) {
        self.set_state(SessionState::Probing);
        self.sink.metrics.inc_change_event();
        info!(path = %notice.path.display(), "change detected");
        self.emit(Event::ChangeDetected {
            session_id: self.session_id,
            path: notice.path.display().to_string(),
        });

        if self.await_ready().await {
            self.set_state(SessionState::Copying);
            self.copy().await;
        }
        self.set_state(SessionState::Watching);
    }

    async fn await_ready(&self) -> bool {
        let gate = Arc::clone(&self.gate);
        let input = self.input.clone();
        let span = Span::current();
        let verdict = task::spawn_blocking(move || {
            let _entered = span.enter();
            gate.wait_until_ready(&input)
        })
        .await;

        match verdict {
            Ok(ReadyResult::Ready { attempts }) => {
                debug!(attempts, "file ready");
                true
            }
            Ok(ReadyResult::TimedOut { attempts }) => {
                warn!(
                    path = %self.input.display(),
                    attempts,
                    "file never became ready; skipping change"
                );
                self.sink.metrics.inc_ready_timeout();
                self.emit(Event::ReadyTimeout {
                    session_id: self.session_id,
                    path: self.input.display().to_string(),
                    attempts,
                });
                false
            }
            Err(err) => {
                error!(error = %err, "readiness task failed");
                self.report_failure(format!("readiness check aborted: {err}"));
                false
            }
        }
    }

    async fn copy(&self) {
        let engine = Arc::clone(&self.engine);
        let input = self.input.clone();
        let destination = self.destination.clone();
        let report_progress = self.report_progress;
        let sink = self.sink.clone();
        let state = Arc::clone(&self.state);
        let session_id = self.session_id;
        let span = Span::current();

        let outcome = task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut last_percent = None;
            engine.copy_with_progress(&input, &destination, report_progress, |progress| {
                let percent = whole_percent(progress.fraction);
                if last_percent == Some(percent) {
                    return;
                }
                last_percent = Some(percent);
                emit_while_live(
                    &state,
                    &sink,
                    Event::CopyProgress {
                        session_id,
                        fraction: progress.fraction,
                        bytes_copied: progress.bytes_copied,
                        bytes_total: progress.bytes_total,
                    },
                );
            })
        })
        .await;

        match outcome {
            Ok(CopyOutcome::Success { destination, bytes }) => {
                self.sink.metrics.record_copy_succeeded(bytes);
                self.emit(Event::CopySucceeded {
                    session_id: self.session_id,
                    destination: destination.display().to_string(),
                });
            }
            Ok(CopyOutcome::Failure { reason }) => self.report_failure(reason),
            Err(err) => {
                error!(error = %err, "copy task failed");
                self.report_failure(format!("copy aborted: {err}"));
            }
        }
    }

    fn report_failure(&self, reason: String) {
        self.sink.metrics.record_copy_failed();
        self.emit(Event::CopyFailed {
            session_id: self.session_id,
            reason,
        });
    }

    fn emit(&self, event: Event) {
        emit_while_live(&self.state, &self.sink, event);
    }

    fn set_state(&self, next: SessionState) {
        transition(&self.state, &self.span, next);
    }
}

fn subscribe(
    target: &WatchTarget,
    notices: mpsc::UnboundedSender<ChangeNotice>,
) -> AppResult<RecommendedWatcher> {
    let file_name: OsString = target.file_name().map(OsString::from).unwrap_or_default();
    let handler = move |result: notify::Result<notify::Event>| match result {
        Ok(event) => {
            if !is_content_change(event.kind) {
                return;
            }
            let Some(path) = event
                .paths
                .iter()
                .find(|path| path.file_name() == Some(file_name.as_os_str()))
            else {
                return;
            };
            if notices
                .send(ChangeNotice { path: path.clone() })
                .is_err()
            {
                debug!("session closed; dropping change notification");
            }
        }
        Err(err) => warn!(error = %err, "change notification error"),
    };

    let watch_dir = target.watch_dir().to_path_buf();
    let mut watcher = RecommendedWatcher::new(handler, notify::Config::default()).map_err(
        |source| AppError::Subscribe {
            path: watch_dir.clone(),
            source,
        },
    )?;
    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|source| AppError::Subscribe {
            path: watch_dir.clone(),
            source,
        })?;
    debug!(dir = %watch_dir.display(), "subscribed to change notifications");
    Ok(watcher)
}

/// Content or size changes, including the file being recreated or renamed into place.
const fn is_content_change(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(
                ModifyKind::Any
                    | ModifyKind::Data(_)
                    | ModifyKind::Metadata(MetadataKind::Any | MetadataKind::WriteTime)
                    | ModifyKind::Name(RenameMode::To | RenameMode::Both)
            )
    )
}
