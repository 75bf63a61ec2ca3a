//! Engine runner driven on the real clock.

use chrono::NaiveDate;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

use lightcycle::backend::testing::RecordingSink;
use lightcycle::clock::ManualClock;
use lightcycle::config::TemperatureConfig;
use lightcycle::engine::{EngineSnapshot, StateChange, TemperatureEngine};
use lightcycle::runtime::{EngineHandle, EngineRunner};

fn spawn_night_engine(sink: &RecordingSink) -> (EngineHandle, thread::JoinHandle<()>) {
    let clock = ManualClock::new(
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap(),
    );
    let config = TemperatureConfig::builder()
        .night_temp(2700)
        .preview_duration_secs(1)
        .build()
        .unwrap();
    let engine = TemperatureEngine::new(config, Box::new(clock), Box::new(sink.clone()));
    let (runner, handle) = EngineRunner::new(engine);
    let thread = runner.spawn().unwrap();
    (handle, thread)
}

fn wait_for(
    handle: &EngineHandle,
    timeout: Duration,
    predicate: impl Fn(&EngineSnapshot) -> bool,
) -> EngineSnapshot {
    let deadline = Instant::now() + timeout;
    loop {
        let snapshot = handle.snapshot().unwrap();
        if predicate(&snapshot) || Instant::now() > deadline {
            return snapshot;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn wait_for_change(
    changes: &Receiver<StateChange>,
    timeout: Duration,
    wanted: &StateChange,
) -> bool {
    let deadline = Instant::now() + timeout;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match changes.recv_timeout(remaining) {
            Ok(change) if &change == wanted => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

#[test]
fn test_disable_for_reenables_after_duration() {
    let sink = RecordingSink::new();
    let (handle, thread) = spawn_night_engine(&sink);

    handle.disable_for(Duration::from_millis(100)).unwrap();
    assert!(!handle.snapshot().unwrap().is_enabled);

    let snapshot = wait_for(&handle, Duration::from_secs(5), |s| s.is_enabled);
    assert!(snapshot.is_enabled);
    assert_eq!(snapshot.temperature, 2700);
    assert_eq!(snapshot.reenable_at, None);

    handle.shutdown().unwrap();
    thread.join().unwrap();
}

#[test]
fn test_second_disable_replaces_first() {
    let sink = RecordingSink::new();
    let (handle, thread) = spawn_night_engine(&sink);

    handle.disable_for(Duration::from_millis(100)).unwrap();
    handle.disable_for(Duration::from_secs(60)).unwrap();

    thread::sleep(Duration::from_millis(400));
    let snapshot = handle.snapshot().unwrap();
    assert!(!snapshot.is_enabled);
    assert!(snapshot.reenable_at.is_some());

    // Explicit enable cancels the pending re-enable
    handle.set_enabled(true).unwrap();
    let snapshot = handle.snapshot().unwrap();
    assert!(snapshot.is_enabled);
    assert_eq!(snapshot.reenable_at, None);

    handle.shutdown().unwrap();
    thread.join().unwrap();
}

#[test]
fn test_preview_sweep_runs_once_without_touching_sink() {
    let sink = RecordingSink::new();
    let (handle, thread) = spawn_night_engine(&sink);
    let changes = handle.subscribe().unwrap();

    handle.start_preview().unwrap();
    assert!(wait_for_change(
        &changes,
        Duration::from_secs(1),
        &StateChange::CyclePreview(true)
    ));
    assert!(wait_for_change(
        &changes,
        Duration::from_secs(5),
        &StateChange::CyclePreview(false)
    ));

    let snapshot = handle.snapshot().unwrap();
    assert!(!snapshot.is_preview_mode_enabled);
    assert_eq!(snapshot.status_text, "Temp: 2700K");

    // Only real-time values ever reached the display
    assert!(sink.applied().iter().all(|&kelvin| kelvin == 2700));

    handle.shutdown().unwrap();
    thread.join().unwrap();
}

#[test]
fn test_dropping_every_handle_stops_runner() {
    let sink = RecordingSink::new();
    let (handle, thread) = spawn_night_engine(&sink);

    drop(handle);
    thread.join().unwrap();
    assert_eq!(sink.reset_count(), 1);
}
