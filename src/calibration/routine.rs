// CalibrationRoutine - timed calibration sequence
//
// The routine walks through a fixed number of timed steps, reporting progress
// after each, then perturbs the calibration constant around its baseline:
// 1. Step 1..N: wait `step_duration`, emit "step i/N"
// 2. Compute baseline + U(-max_offset, max_offset)
// 3. Store it and emit the final progress carrying the value

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::calibration::progress::CalibrationProgress;
use crate::calibration::state::CalibrationConstant;
use crate::clock::{Clock, SystemClock};
use crate::config::CalibrationConfig;
use crate::error::{log_calibration_error, CalibrationError};
use crate::notify::{Notification, ProgressSink};
use crate::telemetry::{MetricEvent, TelemetryCollector};

/// Runs calibrations against a shared [`CalibrationConstant`]
pub struct CalibrationRoutine {
    config: CalibrationConfig,
    constant: CalibrationConstant,
    clock: Arc<dyn Clock>,
    telemetry: Arc<TelemetryCollector>,
    seed: Option<u64>,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag however `calibrate` exits
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CalibrationRoutine {
    pub fn new(
        config: CalibrationConfig,
        constant: CalibrationConstant,
        telemetry: Arc<TelemetryCollector>,
    ) -> Self {
        Self {
            config,
            constant,
            clock: Arc::new(SystemClock::default()),
            telemetry,
            seed: None,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Replace the clock used for step timing
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Draw offsets from a fixed seed instead of OS entropy
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn constant(&self) -> &CalibrationConstant {
        &self.constant
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Run the full calibration sequence, blocking for `steps * step_duration`
    ///
    /// # Returns
    /// * `Ok(f64)` - The newly stored calibration constant
    /// * `Err(CalibrationError)` - Another calibration is running on this
    ///   routine, or the constant's lock is poisoned
    pub fn calibrate(&self, sink: &dyn ProgressSink) -> Result<f64, CalibrationError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let err = CalibrationError::AlreadyInProgress;
            log_calibration_error(&err, "calibrate");
            return Err(err);
        }
        let _guard = RunGuard(&self.in_progress);

        log::info!("[CalibrationRoutine] Calibrating... keep the environment quiet");

        let total_steps = self.config.steps;
        for step in 1..=total_steps {
            self.clock.sleep(self.config.step_duration());
            log::debug!("[CalibrationRoutine] Step {}/{}", step, total_steps);
            sink.notify(Notification::Calibration(CalibrationProgress::step(
                step,
                total_steps,
            )));
        }

        let constant = self.draw_constant();
        self.constant.set(constant).inspect_err(|err| {
            log_calibration_error(err, "calibrate");
            self.telemetry.record_error(err, "calibrate");
        })?;

        log::info!(
            "[CalibrationRoutine] Calibration complete, constant: {:.2}",
            constant
        );
        self.telemetry
            .publish(MetricEvent::CalibrationFinished { constant });
        sink.notify(Notification::Calibration(CalibrationProgress::finished(
            total_steps,
            constant,
        )));

        Ok(constant)
    }

    fn draw_constant(&self) -> f64 {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let max_offset = self.config.max_offset.abs();
        if max_offset == 0.0 {
            return self.config.baseline;
        }
        self.config.baseline + rng.gen_range(-max_offset..=max_offset)
    }
}
