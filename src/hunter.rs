//! SoundHunter: the facade front-ends talk to.
//!
//! Owns one [`ScanSession`], one [`CalibrationRoutine`], the telemetry
//! collector, the notification queue and, when persistence is enabled, the
//! result store. Every blocking operation has a `spawn_*` twin that runs it
//! on a worker thread so the caller can keep draining notifications.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::calibration::{CalibrationConstant, CalibrationRoutine};
use crate::clock::{unix_time_ms, Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::{log_scan_error, CalibrationError, ScanError};
use crate::notify::{NotificationHub, NotificationReceiver, NotificationSender};
use crate::scan::{ScanReport, ScanReservation, ScanSession, ScanSummary, SourceFactory};
use crate::sensitivity::{DetectionParameters, SensitivityLevel};
use crate::storage::{JsonResultStore, ScanRecord};
use crate::telemetry::TelemetryCollector;

pub struct SoundHunter {
    config: AppConfig,
    session: Arc<ScanSession>,
    calibration: Arc<CalibrationRoutine>,
    telemetry: Arc<TelemetryCollector>,
    notifications: NotificationHub,
    store: Option<Arc<JsonResultStore>>,
}

impl SoundHunter {
    /// Create a hunter running on the system clock
    pub fn new(config: AppConfig) -> Self {
        Self::build(config, Arc::new(SystemClock::default()), None)
    }

    /// Create a hunter whose scan and calibration loops use `clock`
    ///
    /// The synthetic source keeps pacing itself on the system clock.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, None)
    }

    /// Create a hunter that builds each scan's event source with `factory`
    pub fn with_source_factory(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        factory: SourceFactory,
    ) -> Self {
        Self::build(config, clock, Some(factory))
    }

    /// A results directory that cannot be opened is logged and persistence
    /// is turned off.
    fn build(config: AppConfig, clock: Arc<dyn Clock>, factory: Option<SourceFactory>) -> Self {
        let telemetry = Arc::new(TelemetryCollector::default());

        let mut session =
            ScanSession::new(&config, Arc::clone(&telemetry)).with_clock(Arc::clone(&clock));
        if let Some(factory) = factory {
            session = session.with_source_factory(factory);
        }
        let calibration = CalibrationRoutine::new(
            config.calibration.clone(),
            CalibrationConstant::default(),
            Arc::clone(&telemetry),
        )
        .with_clock(clock)
        .with_seed(config.scan.seed);

        let store = if config.storage.persist {
            match JsonResultStore::open(&config.storage.results_dir) {
                Ok(store) => Some(Arc::new(store)),
                Err(err) => {
                    log_scan_error(&err, "SoundHunter::open_store");
                    telemetry.record_error(&err, "open_store");
                    None
                }
            }
        } else {
            None
        };

        log::info!(
            "[SoundHunter] Ready (sensitivity {}, persistence {})",
            session.sensitivity(),
            if store.is_some() { "on" } else { "off" }
        );

        Self {
            config,
            session: Arc::new(session),
            calibration: Arc::new(calibration),
            telemetry,
            notifications: NotificationHub::default(),
            store,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ========================================================================
    // SENSITIVITY
    // ========================================================================

    /// Set the sensitivity level
    ///
    /// # Returns
    /// `false` (and no change) for levels outside 1-10
    pub fn set_sensitivity(&self, level: i64) -> bool {
        self.session.set_sensitivity(level)
    }

    pub fn sensitivity(&self) -> SensitivityLevel {
        self.session.sensitivity()
    }

    pub fn parameters(&self) -> DetectionParameters {
        self.session.parameters()
    }

    // ========================================================================
    // SCANNING
    // ========================================================================

    pub fn is_scanning(&self) -> bool {
        self.session.is_scanning()
    }

    /// Run a scan on the calling thread, then persist it
    ///
    /// Notifications go to the queue returned by [`take_notifications`].
    /// A failed save is logged and recorded in telemetry; the summary is
    /// returned regardless.
    ///
    /// [`take_notifications`]: SoundHunter::take_notifications
    pub fn start_scan(&self, duration_secs: u64) -> Result<ScanSummary, ScanError> {
        let reservation = self.session.reserve()?;
        run_scan(
            &self.session,
            reservation,
            self.store.as_deref(),
            &self.telemetry,
            &self.notifications.sender(),
            duration_secs,
        )
    }

    /// Run a scan on a dedicated worker thread
    ///
    /// The scan is reserved before this returns: `is_scanning` is already
    /// `true`, and a `stop_scan` issued straight afterwards ends the scan
    /// with `ScanEndReason::Stopped` even if the worker has not started yet.
    /// A rejected reservation is reported through the handle.
    pub fn spawn_scan(&self, duration_secs: u64) -> JoinHandle<Result<ScanSummary, ScanError>> {
        let reservation = self.session.reserve();
        let session = Arc::clone(&self.session);
        let store = self.store.clone();
        let telemetry = Arc::clone(&self.telemetry);
        let sink = self.notifications.sender();

        std::thread::spawn(move || {
            run_scan(
                &session,
                reservation?,
                store.as_deref(),
                &telemetry,
                &sink,
                duration_secs,
            )
        })
    }

    /// Ask the running scan to stop. Safe to call at any time.
    pub fn stop_scan(&self) {
        self.session.stop_scan();
    }

    pub fn session(&self) -> &Arc<ScanSession> {
        &self.session
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    /// Run the calibration sequence on the calling thread
    pub fn calibrate(&self) -> Result<f64, CalibrationError> {
        self.calibration.calibrate(&self.notifications.sender())
    }

    /// Run the calibration sequence on a dedicated worker thread
    pub fn spawn_calibration(&self) -> JoinHandle<Result<f64, CalibrationError>> {
        let calibration = Arc::clone(&self.calibration);
        let sink = self.notifications.sender();
        std::thread::spawn(move || calibration.calibrate(&sink))
    }

    pub fn calibration_constant(&self) -> Result<f64, CalibrationError> {
        self.calibration.constant().get()
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_running()
    }

    // ========================================================================
    // CHANNELS
    // ========================================================================

    /// Take the single notification consumer
    ///
    /// # Returns
    /// `None` after the first call
    pub fn take_notifications(&self) -> Option<NotificationReceiver> {
        self.notifications.take_receiver()
    }

    /// Extra producer handle, e.g. for a front-end's own status lines
    pub fn notification_sender(&self) -> NotificationSender {
        self.notifications.sender()
    }

    /// Notifications discarded because the queue was full
    pub fn dropped_notifications(&self) -> u64 {
        self.notifications.dropped()
    }

    pub fn telemetry(&self) -> &Arc<TelemetryCollector> {
        &self.telemetry
    }

    pub fn store(&self) -> Option<&JsonResultStore> {
        self.store.as_deref()
    }
}

/// Persists the events frozen in the scan's own report, never a later read
/// of the session state.
fn run_scan(
    session: &ScanSession,
    reservation: ScanReservation,
    store: Option<&JsonResultStore>,
    telemetry: &TelemetryCollector,
    sink: &NotificationSender,
    duration_secs: u64,
) -> Result<ScanSummary, ScanError> {
    let started_at_ms = unix_time_ms();
    let ScanReport { summary, events } =
        session.run_reserved(reservation, duration_secs, sink)?;

    if let Some(store) = store {
        let record = ScanRecord {
            started_at_ms,
            duration_secs,
            summary: summary.clone(),
            events,
        };
        if let Err(err) = store.save(&record) {
            log_scan_error(&err, "persist_scan");
            telemetry.record_error(&err, "persist_scan");
        }
    }

    Ok(summary)
}
