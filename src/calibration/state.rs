// CalibrationConstant - process-wide baseline used for level normalization
//
// Created once at startup and handed to whoever needs it. Only the
// calibration routine writes it; a real detector would read it to normalize
// measured levels.

use std::sync::{Arc, RwLock};

use crate::error::CalibrationError;

/// Baseline value before any calibration has run
pub const DEFAULT_CALIBRATION_CONSTANT: f64 = 60.0;

/// Shared handle to the calibration constant
#[derive(Debug, Clone)]
pub struct CalibrationConstant {
    value: Arc<RwLock<f64>>,
}

impl CalibrationConstant {
    pub fn new(value: f64) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// Read the current constant
    ///
    /// # Errors
    /// `CalibrationError::StatePoisoned` if a writer panicked
    pub fn get(&self) -> Result<f64, CalibrationError> {
        Ok(*self.value.read()?)
    }

    pub(crate) fn set(&self, value: f64) -> Result<(), CalibrationError> {
        *self.value.write()? = value;
        Ok(())
    }
}

impl Default for CalibrationConstant {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_CONSTANT)
    }
}
