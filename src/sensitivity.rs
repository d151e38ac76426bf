//! Sensitivity levels and the detection parameters derived from them.
//!
//! The mapping is a fixed ten-entry table: as sensitivity rises the
//! detection threshold drops and the minimum decibel floor climbs.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Lowest accepted sensitivity level
pub const MIN_LEVEL: u8 = 1;
/// Highest accepted sensitivity level
pub const MAX_LEVEL: u8 = 10;
/// Level used when nothing else is configured
pub const DEFAULT_LEVEL: u8 = 5;

/// (threshold, min_db) indexed by `level - 1`
const SENSITIVITY_TABLE: [(f64, f64); 10] = [
    (0.9, -20.0),
    (0.8, -15.0),
    (0.7, -10.0),
    (0.6, -5.0),
    (0.5, 0.0),
    (0.4, 5.0),
    (0.3, 10.0),
    (0.2, 15.0),
    (0.1, 20.0),
    (0.05, 25.0),
];

/// Sensitivity level, always within 1-10
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct SensitivityLevel(u8);

impl SensitivityLevel {
    /// Validate a raw level
    ///
    /// # Errors
    /// `ScanError::InvalidSensitivityLevel` when `level` is outside 1-10
    pub fn new(level: i64) -> Result<Self, ScanError> {
        if (MIN_LEVEL as i64..=MAX_LEVEL as i64).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(ScanError::InvalidSensitivityLevel { level })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All levels in ascending order, for pickers and table dumps
    pub fn all() -> impl Iterator<Item = SensitivityLevel> {
        (MIN_LEVEL..=MAX_LEVEL).map(SensitivityLevel)
    }

    /// Detection parameters for this level
    pub fn parameters(self) -> DetectionParameters {
        parameters_for(self)
    }
}

impl Default for SensitivityLevel {
    fn default() -> Self {
        Self(DEFAULT_LEVEL)
    }
}

impl TryFrom<i64> for SensitivityLevel {
    type Error = ScanError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<SensitivityLevel> for u8 {
    fn from(level: SensitivityLevel) -> Self {
        level.0
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, MAX_LEVEL)
    }
}

/// Detection threshold and decibel floor for one sensitivity level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParameters {
    pub threshold: f64,
    pub min_db: f64,
}

/// Look up the detection parameters for a level
pub fn parameters_for(level: SensitivityLevel) -> DetectionParameters {
    let (threshold, min_db) = SENSITIVITY_TABLE[(level.0 - MIN_LEVEL) as usize];
    DetectionParameters { threshold, min_db }
}

/// Shared, lock-free holder of the current sensitivity level.
///
/// The scan loop and the source thread both read the level on every tick,
/// so it lives in an atomic rather than behind the session's state mutex.
#[derive(Debug, Clone)]
pub struct SensitivityCell {
    level: Arc<AtomicU8>,
}

impl SensitivityCell {
    pub fn new(level: SensitivityLevel) -> Self {
        Self {
            level: Arc::new(AtomicU8::new(level.get())),
        }
    }

    pub fn get(&self) -> SensitivityLevel {
        SensitivityLevel(self.level.load(Ordering::Acquire))
    }

    pub fn set(&self, level: SensitivityLevel) {
        self.level.store(level.get(), Ordering::Release);
    }
}

impl Default for SensitivityCell {
    fn default() -> Self {
        Self::new(SensitivityLevel::default())
    }
}
