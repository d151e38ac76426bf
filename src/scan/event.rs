//! Accepted detection events.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::sensitivity::SensitivityLevel;

/// Half-width of the uniform jitter around the baseline level (dB)
const DB_JITTER: f64 = 5.0;
/// Range of synthetic distances (metres)
const DISTANCE_RANGE_M: std::ops::Range<f64> = 0.1..5.0;
/// Centre and half-width of the synthetic confidence
const CONFIDENCE_CENTRE: f64 = 0.7;
const CONFIDENCE_JITTER: f64 = 0.2;

/// A single accepted synthetic measurement.
///
/// `confidence` is nominally within [0.5, 0.9]. It is not clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Wall-clock capture time (UNIX ms)
    pub timestamp_ms: u64,
    pub db_level: f64,
    pub distance_m: f64,
    pub confidence: f64,
    /// Sensitivity in effect when the event was captured
    pub sensitivity: SensitivityLevel,
}

impl DetectionEvent {
    /// Draw a synthetic detection.
    ///
    /// `db_level = baseline_db + U(-5, 5) + level`,
    /// `distance_m = U(0.1, 5.0)`, `confidence = 0.7 + U(-0.2, 0.2)`.
    pub fn synthesize<R: Rng + ?Sized>(
        rng: &mut R,
        baseline_db: f64,
        level: SensitivityLevel,
        timestamp_ms: u64,
    ) -> Self {
        let db_level = baseline_db + rng.gen_range(-DB_JITTER..DB_JITTER) + level.get() as f64;
        let distance_m = rng.gen_range(DISTANCE_RANGE_M);
        let confidence =
            CONFIDENCE_CENTRE + rng.gen_range(-CONFIDENCE_JITTER..CONFIDENCE_JITTER);

        Self {
            timestamp_ms,
            db_level,
            distance_m,
            confidence,
            sensitivity: level,
        }
    }
}
