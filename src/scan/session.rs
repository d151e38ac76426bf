//! ScanSession: the scan lifecycle state machine.
//!
//! `Idle -> Scanning -> Idle`, re-entrant. `start_scan` blocks its caller for
//! the length of the scan, so front-ends run it on a worker thread and keep
//! their own thread for draining notifications. `stop_scan` may be called
//! from any thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cancel::CancellationToken;
use crate::clock::{unix_time_ms, Clock, SystemClock};
use crate::config::{AppConfig, ScanConfig, SourceConfig};
use crate::error::{log_scan_error, ScanError};
use crate::notify::{Notification, ProgressSink};
use crate::scan::event::DetectionEvent;
use crate::scan::state::{ScanEndReason, ScanReport, ScanSessionState, ScanSummary};
use crate::sensitivity::{DetectionParameters, SensitivityCell, SensitivityLevel};
use crate::source::{
    spawn_source, EventSource, SourceHandle, SourceMessage, SourceRunnerContext,
    SyntheticEventSource,
};
use crate::telemetry::{MetricEvent, TelemetryCollector};

/// Builds the event source for each new scan
pub type SourceFactory = Box<dyn Fn(&SourceConfig) -> Box<dyn EventSource> + Send + Sync>;

/// Source counters accumulated by the acceptance loop
#[derive(Debug, Default)]
struct SourceCounters {
    frames: u64,
    anomalies: u64,
}

/// Claim on a session's single scan slot
///
/// Taken synchronously before a scan runs, so `is_scanning` is already set
/// and `stop_scan` already reaches the scan's token while a worker thread is
/// still starting up. Dropping it cancels the token and frees the slot.
pub(crate) struct ScanReservation {
    running: Arc<AtomicBool>,
    is_scanning: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Drop for ScanReservation {
    fn drop(&mut self) {
        self.token.cancel();
        self.is_scanning.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Scan state machine
///
/// # Concurrency
/// - `is_scanning` is the flag front-ends observe; `stop_scan` clears it.
/// - `running` is held by a `ScanReservation` from `reserve` until the loop
///   has fully wound down, and is what rejects overlapping scans.
/// - `state` is written only by the acceptance loop.
pub struct ScanSession {
    config: ScanConfig,
    source_config: SourceConfig,
    sensitivity: SensitivityCell,
    is_scanning: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    token: Mutex<Option<CancellationToken>>,
    state: Mutex<ScanSessionState>,
    clock: Arc<dyn Clock>,
    source_clock: Arc<dyn Clock>,
    source_factory: SourceFactory,
    telemetry: Arc<TelemetryCollector>,
}

impl ScanSession {
    /// Create an idle session from the application config
    ///
    /// An invalid `default_sensitivity` is logged and replaced by level 5.
    pub fn new(config: &AppConfig, telemetry: Arc<TelemetryCollector>) -> Self {
        let level = SensitivityLevel::new(config.default_sensitivity as i64).unwrap_or_else(|err| {
            log_scan_error(&err, "ScanSession::new");
            SensitivityLevel::default()
        });

        Self {
            config: config.scan.clone(),
            source_config: config.source.clone(),
            sensitivity: SensitivityCell::new(level),
            is_scanning: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            token: Mutex::new(None),
            state: Mutex::new(ScanSessionState::new()),
            clock: Arc::new(SystemClock::default()),
            source_clock: Arc::new(SystemClock::default()),
            source_factory: Box::new(|config: &SourceConfig| {
                Box::new(SyntheticEventSource::new(config.clone())) as Box<dyn EventSource>
            }),
            telemetry,
        }
    }

    /// Replace the clock driving the acceptance loop
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the clock pacing the source thread
    pub fn with_source_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.source_clock = clock;
        self
    }

    /// Replace the event source built for each scan
    pub fn with_source_factory(mut self, factory: SourceFactory) -> Self {
        self.source_factory = factory;
        self
    }

    // ========================================================================
    // SENSITIVITY
    // ========================================================================

    /// Set the sensitivity level
    ///
    /// # Returns
    /// `true` if `level` was within 1-10 and applied; `false` otherwise, with
    /// no state change
    pub fn set_sensitivity(&self, level: i64) -> bool {
        self.try_set_sensitivity(level).is_ok()
    }

    /// Set the sensitivity level, returning the derived parameters
    ///
    /// # Errors
    /// `ScanError::InvalidSensitivityLevel` for levels outside 1-10
    pub fn try_set_sensitivity(&self, level: i64) -> Result<DetectionParameters, ScanError> {
        let level = SensitivityLevel::new(level).inspect_err(|err| {
            log_scan_error(err, "set_sensitivity");
            self.telemetry.record_error(err, "set_sensitivity");
        })?;

        self.sensitivity.set(level);
        log::info!("[ScanSession] Sensitivity set to {}", level);
        self.telemetry.publish(MetricEvent::SensitivityChanged {
            level: level.get(),
        });
        Ok(level.parameters())
    }

    pub fn sensitivity(&self) -> SensitivityLevel {
        self.sensitivity.get()
    }

    pub fn parameters(&self) -> DetectionParameters {
        self.sensitivity.get().parameters()
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    pub fn is_scanning(&self) -> bool {
        self.is_scanning.load(Ordering::SeqCst)
    }

    /// Clone of the current (or last) scan state
    pub fn snapshot(&self) -> Result<ScanSessionState, ScanError> {
        Ok(self.lock_state()?.clone())
    }

    /// Run a scan, blocking until it completes, is stopped, or its source faults
    ///
    /// # Arguments
    /// * `duration_secs` - Scan length in seconds
    /// * `sink` - Receives `scan_started`, `detection`, `anomaly` and `summary`
    ///   notifications on the calling thread
    ///
    /// # Errors
    /// - `ConcurrentScanRejected` if a scan is already running on this session
    /// - `StatePoisoned` if the state mutex is poisoned
    ///
    /// A source fault is not an error: the scan ends early and its summary
    /// reports `ScanEndReason::SourceFault`.
    pub fn start_scan(
        &self,
        duration_secs: u64,
        sink: &dyn ProgressSink,
    ) -> Result<ScanSummary, ScanError> {
        let reservation = self.reserve()?;
        self.run_reserved(reservation, duration_secs, sink)
            .map(|report| report.summary)
    }

    /// Claim the scan slot and arm a fresh cancellation token
    ///
    /// # Errors
    /// `ConcurrentScanRejected` if a scan is already reserved or running
    pub(crate) fn reserve(&self) -> Result<ScanReservation, ScanError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let err = ScanError::ConcurrentScanRejected;
            log_scan_error(&err, "start_scan");
            self.telemetry.record_error(&err, "start_scan");
            return Err(err);
        }

        let token = CancellationToken::new();
        self.store_token(Some(token.clone()));
        self.is_scanning.store(true, Ordering::SeqCst);

        Ok(ScanReservation {
            running: Arc::clone(&self.running),
            is_scanning: Arc::clone(&self.is_scanning),
            token,
        })
    }

    /// Run a reserved scan to completion
    ///
    /// A stop requested between `reserve` and this call ends the scan on
    /// its first tick with `ScanEndReason::Stopped`. The returned events are
    /// copied out before the slot is released, so a scan started right
    /// afterwards cannot replace them.
    pub(crate) fn run_reserved(
        &self,
        reservation: ScanReservation,
        duration_secs: u64,
        sink: &dyn ProgressSink,
    ) -> Result<ScanReport, ScanError> {
        let token = reservation.token.clone();
        *self.lock_state()? = ScanSessionState::new();

        let level = self.sensitivity.get();
        let parameters = level.parameters();
        log::info!(
            "[ScanSession] Starting scan for {} s at sensitivity {}",
            duration_secs,
            level
        );
        self.telemetry.publish(MetricEvent::ScanStarted {
            duration_secs,
            sensitivity: level.get(),
        });
        sink.notify(Notification::ScanStarted {
            duration_secs,
            sensitivity: level.get(),
            parameters,
        });

        let started = self.clock.now();
        let mut counters = SourceCounters::default();
        let outcome = match self.spawn_source(&token) {
            Ok(mut source) => {
                let outcome = self.run_acceptance_loop(
                    duration_secs,
                    &token,
                    &mut source,
                    &mut counters,
                    sink,
                );
                token.cancel();
                source.join();
                outcome
            }
            Err(err) => {
                self.report_fault(&err);
                Ok(ScanEndReason::SourceFault)
            }
        };

        self.is_scanning.store(false, Ordering::SeqCst);
        token.cancel();
        self.store_token(None);

        let end_reason = outcome?;
        let elapsed = self.clock.now().saturating_duration_since(started);
        let (summary, events) = {
            let state = self.lock_state()?;
            let summary = ScanSummary {
                detections: state.detections(),
                max_db: state.peak_db(),
                best_distance: state.best_distance,
                end_reason,
                elapsed_ms: elapsed.as_millis() as u64,
                frames_observed: counters.frames,
                anomalies_observed: counters.anomalies,
                sensitivity: level,
                parameters,
            };
            (summary, state.results_log.clone())
        };

        log::info!(
            "[ScanSession] Scan finished ({:?}): {} detections, max {:?} dB, distance {:.1} m",
            summary.end_reason,
            summary.detections,
            summary.max_db,
            summary.best_distance
        );
        self.telemetry.publish(MetricEvent::ScanFinished {
            detections: summary.detections,
            reason: summary.end_reason,
        });
        sink.notify(Notification::Summary(summary.clone()));

        drop(reservation);
        Ok(ScanReport { summary, events })
    }

    /// Request the running scan to stop
    ///
    /// Idempotent: calling it while idle, or twice in a row, does nothing
    /// further. The loop and the source exit within one tick interval.
    pub fn stop_scan(&self) {
        let was_scanning = self.is_scanning.swap(false, Ordering::SeqCst);
        let guard = self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(token) = guard.as_ref() {
            token.cancel();
        }
        drop(guard);
        if was_scanning {
            log::info!("[ScanSession] Stop requested");
        }
    }

    // ========================================================================
    // ACCEPTANCE LOOP
    // ========================================================================

    fn spawn_source(&self, token: &CancellationToken) -> Result<SourceHandle, ScanError> {
        spawn_source(SourceRunnerContext {
            source: (self.source_factory)(&self.source_config),
            sensitivity: self.sensitivity.clone(),
            token: token.clone(),
            clock: Arc::clone(&self.source_clock),
            telemetry: Arc::clone(&self.telemetry),
            queue_capacity: self.source_config.queue_capacity,
        })
    }

    fn run_acceptance_loop(
        &self,
        duration_secs: u64,
        token: &CancellationToken,
        source: &mut SourceHandle,
        counters: &mut SourceCounters,
        sink: &dyn ProgressSink,
    ) -> Result<ScanEndReason, ScanError> {
        let duration = Duration::from_secs(duration_secs);
        let period = self.config.detection_period_secs.max(1);
        let tick = self.config.tick_interval();
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let started = self.clock.now();
        let wall_start_ms = unix_time_ms();
        let mut last_second: Option<u64> = None;

        loop {
            if token.is_cancelled() {
                return Ok(ScanEndReason::Stopped);
            }
            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= duration {
                return Ok(ScanEndReason::Completed);
            }

            if let Err(err) = self.pump_source(source, token, counters, sink) {
                self.report_fault(&err);
                return Ok(ScanEndReason::SourceFault);
            }

            // Each whole second is considered once, however many ticks land in it.
            let second = elapsed.as_secs();
            if last_second != Some(second) {
                last_second = Some(second);
                if second % period == 0 && !token.is_cancelled() {
                    let event = DetectionEvent::synthesize(
                        &mut rng,
                        self.config.baseline_db,
                        self.sensitivity.get(),
                        wall_start_ms + elapsed.as_millis() as u64,
                    );
                    self.accept(event, sink)?;
                }
            }

            self.clock.sleep(tick);
        }
    }

    /// Drain source output, forwarding anomalies and surfacing faults
    fn pump_source(
        &self,
        source: &mut SourceHandle,
        token: &CancellationToken,
        counters: &mut SourceCounters,
        sink: &dyn ProgressSink,
    ) -> Result<(), ScanError> {
        for message in source.drain() {
            match message {
                SourceMessage::Frame(report) => {
                    counters.frames += 1;
                    if let Some(anomaly) = report.anomaly {
                        counters.anomalies += 1;
                        sink.notify(Notification::Anomaly {
                            frame_index: report.index,
                            strength: anomaly.strength,
                        });
                    }
                }
                SourceMessage::Fault(reason) => {
                    return Err(ScanError::EventSourceFault { reason });
                }
            }
        }

        if source.is_abandoned() && !token.is_cancelled() {
            return Err(ScanError::EventSourceFault {
                reason: "event source stopped unexpectedly".to_string(),
            });
        }
        Ok(())
    }

    fn accept(&self, event: DetectionEvent, sink: &dyn ProgressSink) -> Result<(), ScanError> {
        {
            let mut state = self.lock_state()?;
            state.record(event.clone());
        }

        log::info!(
            "[ScanSession] Screech detected: {:.1} dB, {:.1} m, confidence {:.2}",
            event.db_level,
            event.distance_m,
            event.confidence
        );
        self.telemetry.publish(MetricEvent::DetectionAccepted {
            db_level: event.db_level,
            distance_m: event.distance_m,
        });
        sink.notify(Notification::Detection(event));
        Ok(())
    }

    // ========================================================================
    // HELPER METHODS
    // ========================================================================

    fn report_fault(&self, err: &ScanError) {
        log_scan_error(err, "scan_loop");
        self.telemetry.record_error(err, "scan_loop");
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ScanSessionState>, ScanError> {
        self.state.lock().map_err(|_| ScanError::StatePoisoned)
    }

    fn store_token(&self, token: Option<CancellationToken>) {
        *self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }
}

#[cfg(test)]
mod tests;
