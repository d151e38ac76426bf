// Failures of the timed calibration sequence and the shared baseline it writes

use crate::error::ErrorCode;
use std::fmt;
use std::sync::PoisonError;

/// Stable codes for [`CalibrationError`], continuing after the scan range
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// `calibrate` called while an earlier sequence is still stepping
    pub const ALREADY_IN_PROGRESS: i32 = 4001;

    /// The baseline constant is unreadable because a writer panicked
    pub const STATE_POISONED: i32 = 4002;
}

/// Emit one `error!` line for a rejected or failed calibration
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    log::error!(
        "[CalibrationRoutine] {} failed: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// A sequence is already running on this routine; the new request is
    /// dropped and the running one continues untouched
    AlreadyInProgress,

    /// The shared constant lost its lock to a panic, so neither the old
    /// value nor a new one can be trusted
    StatePoisoned,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            Self::AlreadyInProgress => CalibrationErrorCodes::ALREADY_IN_PROGRESS,
            Self::StatePoisoned => CalibrationErrorCodes::STATE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::AlreadyInProgress => {
                "Calibration already in progress; wait for the current sequence".to_string()
            }
            Self::StatePoisoned => {
                "Calibration constant unavailable: its lock was poisoned".to_string()
            }
        }
    }
}

impl<T> From<PoisonError<T>> for CalibrationError {
    fn from(_: PoisonError<T>) -> Self {
        Self::StatePoisoned
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
