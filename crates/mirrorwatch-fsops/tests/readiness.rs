use std::fs;
use std::time::Duration;

use anyhow::Result;
use mirrorwatch_config::WatchTuning;
use mirrorwatch_fsops::{ChangeReadyGate, CopyEngine, ReadyResult};
use mirrorwatch_test_support::fixtures::{GrowingWriter, WatchWorkspace};

#[test]
fn growing_file_times_out_then_settles_and_copies() -> Result<()> {
    let workspace = WatchWorkspace::new("grow.log", b"hello")?;
    let tuning = WatchTuning::new(8, Duration::from_millis(25), 4)?;
    let gate = ChangeReadyGate::filesystem(&tuning);

    let writer = GrowingWriter::start(
        workspace.input().to_path_buf(),
        b"x".to_vec(),
        Duration::from_millis(2),
        500,
    );
    let while_growing = gate.wait_until_ready(workspace.input());
    writer.join()?;
    assert_eq!(while_growing, ReadyResult::TimedOut { attempts: 8 });

    let settled = gate.wait_until_ready(workspace.input());
    assert!(settled.is_ready());

    let destination = workspace.destination();
    let outcome = CopyEngine::from_tuning(&tuning).copy(workspace.input(), &destination);
    assert!(outcome.is_success());
    assert_eq!(fs::read(&destination)?, fs::read(workspace.input())?);
    assert_eq!(fs::metadata(&destination)?.len(), 505);
    Ok(())
}

#[test]
fn short_growth_settles_to_final_content() -> Result<()> {
    let workspace = WatchWorkspace::new("a.txt", b"hello")?;
    let tuning = WatchTuning::new(20, Duration::from_millis(30), 1024)?;

    GrowingWriter::start(
        workspace.input().to_path_buf(),
        b"HELLO".to_vec(),
        Duration::from_millis(1),
        1,
    )
    .join()?;
    let result = ChangeReadyGate::filesystem(&tuning).wait_until_ready(workspace.input());
    assert_eq!(result, ReadyResult::Ready { attempts: 2 });

    let outcome = CopyEngine::from_tuning(&tuning).copy(workspace.input(), &workspace.destination());
    assert!(outcome.is_success());
    assert_eq!(fs::read(workspace.destination())?, b"helloHELLO");
    Ok(())
}
