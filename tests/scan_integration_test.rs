//! Integration tests for the scan workflow
//!
//! These tests drive a full scan through the public `SoundHunter` facade:
//! - Timed acceptance on a virtual clock
//! - Notification queue contents and ordering
//! - Mid-scan stop from another thread, including right after spawning
//! - Result persistence and reload
//! - Event source faults ending a scan early

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::executor::block_on;
use futures::StreamExt;
use sound_hunter::config::SourceConfig;
use sound_hunter::scan::SourceFactory;
use sound_hunter::source::{EventSource, SourceFrame};
use sound_hunter::{
    AppConfig, ManualClock, Notification, ScanEndReason, ScanError, SensitivityLevel, SoundHunter,
};
use tempfile::tempdir;

fn test_config(seed: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.scan.seed = Some(seed);
    config.storage.persist = false;
    config
}

fn virtual_hunter(config: AppConfig) -> SoundHunter {
    SoundHunter::with_clock(config, Arc::new(ManualClock::new()))
}

/// A 30 s scan at the default sensitivity accepts exactly three events,
/// ten seconds apart, and reports them in acceptance order.
#[test]
fn test_thirty_second_scan_end_to_end() {
    let hunter = virtual_hunter(test_config(21));
    let mut rx = hunter.take_notifications().unwrap();

    let summary = hunter.start_scan(30).unwrap();

    let notifications: Vec<Notification> = rx
        .drain()
        .into_iter()
        .filter(|n| !matches!(n, Notification::Anomaly { .. }))
        .collect();

    let detections: Vec<_> = notifications
        .iter()
        .filter_map(|n| match n {
            Notification::Detection(event) => Some(event.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(summary.detections, 3);
    assert_eq!(summary.end_reason, ScanEndReason::Completed);
    assert_eq!(detections.len(), 3);
    assert_eq!(detections[1].timestamp_ms - detections[0].timestamp_ms, 10_000);
    assert_eq!(detections[2].timestamp_ms - detections[1].timestamp_ms, 10_000);
    assert!(detections
        .iter()
        .all(|e| e.sensitivity == SensitivityLevel::default()));

    let loudest = detections
        .iter()
        .map(|e| e.db_level)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(summary.max_db, Some(loudest));

    match notifications.last() {
        Some(Notification::Summary(last)) => assert_eq!(last, &summary),
        other => panic!("expected summary last, got {:?}", other),
    }
}

/// Detection levels scale with sensitivity: every event at level 10 lies in
/// [65, 75) dB on a 60 dB baseline.
#[test]
fn test_high_sensitivity_raises_levels() {
    let hunter = virtual_hunter(test_config(3));
    assert!(hunter.set_sensitivity(10));

    hunter.start_scan(300).unwrap();

    let state = hunter.session().snapshot().unwrap();
    assert_eq!(state.results_log.len(), 30);
    assert!(state
        .results_log
        .iter()
        .all(|e| e.db_level >= 65.0 && e.db_level < 75.0));
}

/// Same seed, same results.
#[test]
fn test_seeded_scans_are_reproducible() {
    let first = virtual_hunter(test_config(99));
    let second = virtual_hunter(test_config(99));

    first.start_scan(60).unwrap();
    second.start_scan(60).unwrap();

    let a = first.session().snapshot().unwrap().results_log;
    let b = second.session().snapshot().unwrap().results_log;
    let levels = |events: &[sound_hunter::DetectionEvent]| {
        events
            .iter()
            .map(|e| (e.db_level, e.distance_m, e.confidence))
            .collect::<Vec<_>>()
    };
    assert_eq!(levels(&a), levels(&b));
}

/// Stopping from another thread ends a real-time scan promptly, and no
/// detection arrives after the summary.
#[test]
fn test_stop_from_another_thread() {
    let mut config = test_config(5);
    config.scan.tick_interval_ms = 20;
    let hunter = SoundHunter::new(config);
    let rx = hunter.take_notifications().unwrap();

    let handle = hunter.spawn_scan(120);
    let deadline = Instant::now() + Duration::from_secs(2);
    while !hunter.is_scanning() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    std::thread::sleep(Duration::from_millis(60));

    let stop_requested = Instant::now();
    hunter.stop_scan();
    hunter.stop_scan();
    let summary = handle.join().unwrap().unwrap();

    assert!(stop_requested.elapsed() < Duration::from_millis(500));
    assert_eq!(summary.end_reason, ScanEndReason::Stopped);
    assert!(!hunter.is_scanning());

    drop(hunter);
    let received: Vec<Notification> = block_on(rx.into_stream().collect());
    let summary_at = received
        .iter()
        .position(|n| matches!(n, Notification::Summary(_)))
        .unwrap();
    assert!(received[summary_at + 1..]
        .iter()
        .all(|n| !n.is_detection()));
}

/// A stop issued the moment a spawned scan is requested still ends it.
#[test]
fn test_stop_immediately_after_spawn() {
    let mut config = test_config(6);
    config.scan.tick_interval_ms = 20;
    let hunter = SoundHunter::new(config);
    let mut rx = hunter.take_notifications().unwrap();

    let handle = hunter.spawn_scan(1);
    hunter.stop_scan();
    let summary = handle.join().unwrap().unwrap();

    assert_eq!(summary.end_reason, ScanEndReason::Stopped);
    assert_eq!(summary.detections, 0);
    assert!(!hunter.is_scanning());
    assert!(rx.drain().iter().all(|n| !n.is_detection()));
}

/// Saved records reload with the same summary and events.
#[test]
fn test_scan_results_persisted() {
    let tmp = tempdir().unwrap();
    let mut config = test_config(8);
    config.storage.persist = true;
    config.storage.results_dir = tmp.path().join("SoundHunter_Results");

    let hunter = virtual_hunter(config);
    let first = hunter.start_scan(20).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    hunter.start_scan(10).unwrap();

    let store = hunter.store().unwrap();
    let files = store.list().unwrap();
    assert_eq!(files.len(), 2);

    let record = store.load(&files[0]).unwrap();
    assert_eq!(record.summary, first);
    assert_eq!(record.events.len(), 2);
    assert!(record.events[0].timestamp_ms >= record.started_at_ms);
}

struct UnpluggedSource;

impl EventSource for UnpluggedSource {
    fn next_frame(&mut self, _level: SensitivityLevel) -> Result<SourceFrame, ScanError> {
        Err(ScanError::EventSourceFault {
            reason: "sensor unplugged".to_string(),
        })
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_millis(1)
    }
}

/// A failing source ends the scan early instead of hanging or panicking.
#[test]
fn test_source_fault_surfaces_in_summary() {
    let mut config = test_config(1);
    config.scan.tick_interval_ms = 5;
    let factory: SourceFactory =
        Box::new(|_: &SourceConfig| Box::new(UnpluggedSource) as Box<dyn EventSource>);
    let hunter = SoundHunter::with_source_factory(
        config,
        Arc::new(sound_hunter::SystemClock::default()),
        factory,
    );
    let mut rx = hunter.take_notifications().unwrap();

    let summary = hunter.start_scan(10).unwrap();

    assert_eq!(summary.end_reason, ScanEndReason::SourceFault);
    let last = rx.drain().pop().unwrap();
    assert!(last.to_string().contains("Ended early: event source fault"));
}
