use std::fs;
use std::time::Duration;

use anyhow::{Result, anyhow};
use mirrorwatch_app::{AppContext, SessionState, WatchTarget};
use mirrorwatch_config::{SettingsStore, WatchTuning};
use mirrorwatch_events::{Event, EventStream};
use mirrorwatch_fsops::ErrorLog;
use mirrorwatch_test_support::fixtures::{WatchWorkspace, append_bytes, wait_until};
use tempfile::TempDir;

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

fn context(temp: &TempDir) -> Result<AppContext> {
    Ok(AppContext::new(
        SettingsStore::at(temp.path().join("settings.json")),
        ErrorLog::new(temp.path().join("errors.log")),
    )?)
}

async fn wait_for(stream: &mut EventStream, kind: &str) -> Result<Vec<Event>> {
    let mut seen = Vec::new();
    loop {
        let envelope = tokio::time::timeout(EVENT_TIMEOUT, stream.next())
            .await
            .map_err(|_| anyhow!("timed out waiting for {kind}"))?
            .ok_or_else(|| anyhow!("event stream closed"))?;
        let done = envelope.event.kind() == kind;
        seen.push(envelope.event);
        if done {
            return Ok(seen);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn appended_file_is_mirrored_byte_for_byte() -> Result<()> {
    let temp = TempDir::new()?;
    let ctx = context(&temp)?;
    let workspace = WatchWorkspace::new("a.txt", b"hello")?;
    let tuning = WatchTuning::new(20, Duration::from_millis(50), 4)?;
    let mut stream = ctx.events().subscribe(None);

    let mut session = ctx
        .controller(tuning, true)
        .start(&WatchTarget::new(workspace.input(), workspace.output_dir()))?;
    wait_for(&mut stream, "watching_started").await?;

    append_bytes(workspace.input(), b"HELLO")?;
    let events = wait_for(&mut stream, "copy_succeeded").await?;
    assert!(events.iter().any(|e| e.kind() == "change_detected"));

    let destination = workspace.destination();
    let mirrored = tokio::task::spawn_blocking(move || {
        wait_until(EVENT_TIMEOUT, || {
            fs::read(&destination).is_ok_and(|bytes| bytes == b"helloHELLO")
        })
    })
    .await?;
    assert!(mirrored, "destination never matched the source");

    session.stop().await;
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(ctx.metrics().snapshot().copies_succeeded_total >= 1);
    assert_eq!(ctx.metrics().snapshot().ready_timeouts_total, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_session_ignores_later_writes() -> Result<()> {
    let temp = TempDir::new()?;
    let ctx = context(&temp)?;
    let workspace = WatchWorkspace::new("b.txt", b"first")?;
    let tuning = WatchTuning::new(5, Duration::from_millis(20), 1024)?;

    let mut session = ctx
        .controller(tuning, false)
        .start(&WatchTarget::new(workspace.input(), workspace.output_dir()))?;
    session.stop().await;
    let mut stream = ctx.events().subscribe(ctx.events().last_event_id());

    append_bytes(workspace.input(), b" second")?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(stream.try_next().is_none());
    assert!(!workspace.destination().exists());
    Ok(())
}

#[tokio::test]
async fn missing_input_never_starts() -> Result<()> {
    let temp = TempDir::new()?;
    let ctx = context(&temp)?;
    let err = ctx
        .controller(WatchTuning::default(), true)
        .start(&WatchTarget::new(
            temp.path().join("absent.txt"),
            temp.path().join("out"),
        ))
        .err()
        .ok_or_else(|| anyhow!("start should fail"))?;
    assert!(err.is_setup());
    assert!(ctx.events().last_event_id().is_none());
    assert_eq!(ctx.metrics().snapshot().active_sessions, 0);
    Ok(())
}
