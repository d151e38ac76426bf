//! Telemetry event types describing scan and calibration activity.

use serde::{Deserialize, Serialize};

use crate::scan::ScanEndReason;

/// Metric events covering the scan lifecycle, source activity and errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    ScanStarted {
        duration_secs: u64,
        sensitivity: u8,
    },
    DetectionAccepted {
        db_level: f64,
        distance_m: f64,
    },
    AnomalyInjected {
        frame_index: u64,
        strength: f32,
    },
    ScanFinished {
        detections: usize,
        reason: ScanEndReason,
    },
    SensitivityChanged {
        level: u8,
    },
    CalibrationFinished {
        constant: f64,
    },
    Error {
        code: i32,
        context: String,
    },
}
