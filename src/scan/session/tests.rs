use super::*;
use crate::clock::ManualClock;
use crate::notify::NullSink;
use crate::source::SourceFrame;
use std::time::Instant;

/// Collects notifications for later inspection
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Notification>>,
}

impl Recorder {
    fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    fn detections(&self) -> Vec<DetectionEvent> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|n| match n {
                Notification::Detection(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for Recorder {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

struct FailingSource;

impl EventSource for FailingSource {
    fn next_frame(&mut self, _level: SensitivityLevel) -> Result<SourceFrame, ScanError> {
        Err(ScanError::EventSourceFault {
            reason: "generator fault".to_string(),
        })
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_millis(1)
    }
}

fn config_with_seed(seed: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.scan.seed = Some(seed);
    config
}

fn manual_session(config: &AppConfig) -> ScanSession {
    ScanSession::new(config, Arc::new(TelemetryCollector::default()))
        .with_clock(Arc::new(ManualClock::new()))
}

fn realtime_session(tick_ms: u64) -> ScanSession {
    let mut config = config_with_seed(1);
    config.scan.tick_interval_ms = tick_ms;
    config.source.frame_interval_ms = 5;
    ScanSession::new(&config, Arc::new(TelemetryCollector::default()))
}

fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_new_session_is_idle() {
    let session = manual_session(&AppConfig::default());
    assert!(!session.is_scanning());
    assert_eq!(session.sensitivity().get(), 5);
    assert_eq!(session.snapshot().unwrap(), ScanSessionState::new());
}

#[test]
fn test_invalid_default_sensitivity_falls_back() {
    let mut config = AppConfig::default();
    config.default_sensitivity = 42;
    let session = manual_session(&config);
    assert_eq!(session.sensitivity(), SensitivityLevel::default());
}

#[test]
fn test_set_sensitivity_accepts_valid_levels() {
    let session = manual_session(&AppConfig::default());

    assert!(session.set_sensitivity(8));
    assert_eq!(session.sensitivity().get(), 8);
    assert_eq!(session.parameters().threshold, 0.2);
    assert_eq!(session.parameters().min_db, 15.0);

    let params = session.try_set_sensitivity(1).unwrap();
    assert_eq!(params.threshold, 0.9);
}

#[test]
fn test_set_sensitivity_rejects_out_of_range_without_change() {
    let session = manual_session(&AppConfig::default());
    session.set_sensitivity(3);
    let before = session.parameters();

    for level in [0, 11, -1, 100] {
        assert!(!session.set_sensitivity(level));
        assert_eq!(session.parameters(), before);
        assert_eq!(session.sensitivity().get(), 3);
    }
    assert_eq!(
        session.try_set_sensitivity(11),
        Err(ScanError::InvalidSensitivityLevel { level: 11 })
    );
}

#[test]
fn test_thirty_second_scan_accepts_three_events() {
    let session = manual_session(&config_with_seed(5));
    let recorder = Recorder::default();

    let summary = session.start_scan(30, &recorder).unwrap();

    assert_eq!(summary.detections, 3);
    assert_eq!(summary.end_reason, ScanEndReason::Completed);
    assert_eq!(summary.elapsed_ms, 30_000);

    let events = recorder.detections();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.sensitivity.get() == 5));

    let offsets: Vec<u64> = events
        .iter()
        .map(|e| e.timestamp_ms - events[0].timestamp_ms)
        .collect();
    assert_eq!(offsets, vec![0, 10_000, 20_000]);
    assert!(!session.is_scanning());
}

#[test]
fn test_notification_order() {
    let session = manual_session(&config_with_seed(5));
    let recorder = Recorder::default();

    session.start_scan(30, &recorder).unwrap();

    let seen: Vec<Notification> = recorder
        .take()
        .into_iter()
        .filter(|n| !matches!(n, Notification::Anomaly { .. }))
        .collect();
    assert_eq!(seen.len(), 5);
    assert!(matches!(
        seen[0],
        Notification::ScanStarted { duration_secs: 30, sensitivity: 5, .. }
    ));
    assert!(seen[1..4].iter().all(Notification::is_detection));
    match &seen[4] {
        Notification::Summary(summary) => assert_eq!(summary.detections, 3),
        other => panic!("expected summary, got {:?}", other),
    }
}

#[test]
fn test_maxima_match_results_log() {
    for seed in 0..20 {
        let session = manual_session(&config_with_seed(seed));
        let summary = session.start_scan(600, &NullSink).unwrap();
        let state = session.snapshot().unwrap();

        assert_eq!(state.results_log.len(), 60);
        assert_eq!(summary.detections, 60);

        let max = state
            .results_log
            .iter()
            .map(|e| e.db_level)
            .fold(f64::NEG_INFINITY, f64::max);
        let first_at_max = state
            .results_log
            .iter()
            .find(|e| e.db_level == max)
            .unwrap();

        assert_eq!(state.max_db, max);
        assert_eq!(summary.max_db, Some(max));
        assert_eq!(state.best_distance, first_at_max.distance_m);
        assert_eq!(summary.best_distance, first_at_max.distance_m);
    }
}

#[test]
fn test_scan_resets_state_before_first_acceptance() {
    let session = Arc::new(manual_session(&config_with_seed(9)));
    session.start_scan(30, &NullSink).unwrap();
    assert_eq!(session.snapshot().unwrap().results_log.len(), 3);

    let observer = Arc::clone(&session);
    let at_start = Mutex::new(None);
    session
        .start_scan(30, &|n: Notification| {
            if matches!(n, Notification::ScanStarted { .. }) {
                *at_start.lock().unwrap() = Some(observer.snapshot().unwrap());
            }
        })
        .unwrap();

    let at_start = at_start.into_inner().unwrap().unwrap();
    assert_eq!(at_start.max_db, f64::NEG_INFINITY);
    assert_eq!(at_start.best_distance, 0.0);
    assert!(at_start.results_log.is_empty());
    assert_eq!(session.snapshot().unwrap().results_log.len(), 3);
}

#[test]
fn test_zero_duration_accepts_nothing() {
    let session = manual_session(&config_with_seed(2));
    let summary = session.start_scan(0, &NullSink).unwrap();

    assert_eq!(summary.detections, 0);
    assert_eq!(summary.max_db, None);
    assert_eq!(summary.best_distance, 0.0);
    assert_eq!(summary.end_reason, ScanEndReason::Completed);
}

#[test]
fn test_stop_during_scan_prevents_further_events() {
    let session = Arc::new(manual_session(&config_with_seed(3)));
    let stopper = Arc::clone(&session);

    let summary = session
        .start_scan(60, &|n: Notification| {
            if n.is_detection() {
                stopper.stop_scan();
            }
        })
        .unwrap();

    assert_eq!(summary.end_reason, ScanEndReason::Stopped);
    assert_eq!(summary.detections, 1);
    assert_eq!(session.snapshot().unwrap().results_log.len(), 1);
    assert!(summary.elapsed_ms <= 1_000);
    assert!(!session.is_scanning());
}

#[test]
fn test_stop_is_idempotent() {
    let session = manual_session(&AppConfig::default());
    let before = session.snapshot().unwrap();

    session.stop_scan();
    session.stop_scan();

    assert!(!session.is_scanning());
    assert_eq!(session.snapshot().unwrap(), before);
}

#[test]
fn test_stop_between_reserve_and_run_is_honoured() {
    let session = manual_session(&config_with_seed(3));
    let recorder = Recorder::default();

    let reservation = session.reserve().unwrap();
    assert!(session.is_scanning());
    session.stop_scan();
    let report = session.run_reserved(reservation, 60, &recorder).unwrap();

    assert_eq!(report.summary.end_reason, ScanEndReason::Stopped);
    assert_eq!(report.summary.detections, 0);
    assert_eq!(report.summary.elapsed_ms, 0);
    assert!(recorder.detections().is_empty());
    assert!(!session.is_scanning());

    // A stop aimed at the previous scan does not leak into the next one.
    let summary = session.start_scan(10, &NullSink).unwrap();
    assert_eq!(summary.end_reason, ScanEndReason::Completed);
}

#[test]
fn test_unused_reservation_releases_slot() {
    let session = manual_session(&AppConfig::default());

    let reservation = session.reserve().unwrap();
    assert_eq!(
        session.reserve().err(),
        Some(ScanError::ConcurrentScanRejected)
    );
    drop(reservation);

    assert!(!session.is_scanning());
    assert!(session.start_scan(10, &NullSink).is_ok());
}

#[test]
fn test_report_events_survive_next_scan() {
    let session = manual_session(&config_with_seed(12));

    let reservation = session.reserve().unwrap();
    let report = session.run_reserved(reservation, 30, &NullSink).unwrap();
    session.start_scan(10, &NullSink).unwrap();

    assert_eq!(report.summary.detections, 3);
    assert_eq!(report.events.len(), 3);
    assert_eq!(session.snapshot().unwrap().results_log.len(), 1);
    let peak = report
        .events
        .iter()
        .map(|e| e.db_level)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(report.summary.max_db, Some(peak));
}

#[test]
fn test_sensitivity_change_applies_to_later_events() {
    let session = Arc::new(manual_session(&config_with_seed(4)));
    let changer = Arc::clone(&session);
    let recorder = Recorder::default();

    session
        .start_scan(30, &|n: Notification| {
            if n.is_detection() {
                changer.set_sensitivity(9);
            }
            recorder.notify(n);
        })
        .unwrap();

    let levels: Vec<u8> = recorder
        .detections()
        .iter()
        .map(|e| e.sensitivity.get())
        .collect();
    assert_eq!(levels, vec![5, 9, 9]);
}

#[test]
fn test_overlapping_scan_rejected() {
    let session = Arc::new(manual_session(&config_with_seed(6)));
    let inner = Arc::clone(&session);
    let nested = Mutex::new(None);

    let summary = session
        .start_scan(30, &|n: Notification| {
            if matches!(n, Notification::ScanStarted { .. }) {
                *nested.lock().unwrap() = Some(inner.start_scan(10, &NullSink));
            }
        })
        .unwrap();

    assert_eq!(
        nested.into_inner().unwrap(),
        Some(Err(ScanError::ConcurrentScanRejected))
    );
    assert_eq!(summary.detections, 3);

    // The session is reusable once the first scan has finished.
    assert!(session.start_scan(10, &NullSink).is_ok());
}

#[test]
fn test_source_fault_ends_scan_early() {
    let mut config = config_with_seed(8);
    config.scan.tick_interval_ms = 5;
    let telemetry = Arc::new(TelemetryCollector::default());
    let session = ScanSession::new(&config, Arc::clone(&telemetry)).with_source_factory(
        Box::new(|_config: &SourceConfig| Box::new(FailingSource) as Box<dyn EventSource>),
    );

    let started = Instant::now();
    let summary = session.start_scan(5, &NullSink).unwrap();

    assert_eq!(summary.end_reason, ScanEndReason::SourceFault);
    assert!(summary.detections <= 1);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!session.is_scanning());
    assert!(telemetry
        .snapshot()
        .recent
        .iter()
        .any(|e| matches!(e, MetricEvent::Error { code: 3002, .. })));
}

#[test]
fn test_realtime_stop_within_one_tick() {
    let session = Arc::new(realtime_session(20));
    let worker = Arc::clone(&session);

    let handle = std::thread::spawn(move || worker.start_scan(60, &NullSink));
    assert!(wait_until(|| session.is_scanning()));

    std::thread::sleep(Duration::from_millis(50));
    let stop_requested = Instant::now();
    session.stop_scan();
    let summary = handle.join().unwrap().unwrap();

    assert!(stop_requested.elapsed() < Duration::from_millis(500));
    assert_eq!(summary.end_reason, ScanEndReason::Stopped);
    assert_eq!(summary.detections, 1);
}

#[test]
fn test_realtime_scan_forwards_source_anomalies() {
    let session = Arc::new(realtime_session(10));
    let worker = Arc::clone(&session);
    let recorder = Arc::new(Recorder::default());
    let sink = Arc::clone(&recorder);

    let handle = std::thread::spawn(move || worker.start_scan(60, &*sink));
    assert!(wait_until(|| recorder
        .seen
        .lock()
        .unwrap()
        .iter()
        .any(|n| matches!(n, Notification::Anomaly { frame_index: 0, .. }))));

    session.stop_scan();
    let summary = handle.join().unwrap().unwrap();
    assert!(summary.frames_observed >= 1);
    assert!(summary.anomalies_observed >= 1);
}
