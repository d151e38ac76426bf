// ScanSessionState - running aggregates of one scan
//
// Reset at the start of every scan, mutated only by the acceptance loop, and
// frozen into a ScanSummary when the loop ends.

use serde::{Deserialize, Serialize};

use crate::scan::event::DetectionEvent;
use crate::sensitivity::{DetectionParameters, SensitivityLevel};

/// Aggregates owned by the acceptance loop
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSessionState {
    /// Loudest accepted level; negative infinity until the first acceptance
    pub max_db: f64,
    /// Distance of the first event that reached `max_db`
    pub best_distance: f64,
    /// Accepted events in acceptance order
    pub results_log: Vec<DetectionEvent>,
}

impl ScanSessionState {
    pub fn new() -> Self {
        Self {
            max_db: f64::NEG_INFINITY,
            best_distance: 0.0,
            results_log: Vec::new(),
        }
    }

    /// Append an accepted event and update the maxima.
    ///
    /// Only a strictly greater level moves `max_db`/`best_distance`, so the
    /// first event to reach the maximum keeps its distance.
    ///
    /// # Returns
    /// `true` if the event set a new maximum
    pub fn record(&mut self, event: DetectionEvent) -> bool {
        let is_new_max = event.db_level > self.max_db;
        if is_new_max {
            self.max_db = event.db_level;
            self.best_distance = event.distance_m;
        }
        self.results_log.push(event);
        is_new_max
    }

    pub fn detections(&self) -> usize {
        self.results_log.len()
    }

    /// `max_db` if at least one event was accepted
    pub fn peak_db(&self) -> Option<f64> {
        self.max_db.is_finite().then_some(self.max_db)
    }
}

impl Default for ScanSessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the acceptance loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanEndReason {
    /// The requested duration elapsed
    Completed,
    /// `stop_scan` was called
    Stopped,
    /// The event source failed and the scan ended early
    SourceFault,
}

/// Frozen result of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub detections: usize,
    /// Loudest accepted level, `None` when nothing was accepted
    pub max_db: Option<f64>,
    pub best_distance: f64,
    pub end_reason: ScanEndReason,
    /// Virtual or wall time the loop ran for
    pub elapsed_ms: u64,
    /// Frames received from the event source
    pub frames_observed: u64,
    /// Injected anomalies received from the event source
    pub anomalies_observed: u64,
    /// Sensitivity when the scan started
    pub sensitivity: SensitivityLevel,
    pub parameters: DetectionParameters,
}

/// Summary of one scan together with the events it accepted
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub summary: ScanSummary,
    /// Accepted events in acceptance order
    pub events: Vec<DetectionEvent>,
}
