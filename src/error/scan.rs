// Scan error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Scan error code constants
///
/// Single source of truth for the numeric codes surfaced to front-ends and
/// telemetry.
///
/// Error code range: 3001-3005
pub struct ScanErrorCodes {}

impl ScanErrorCodes {
    /// Sensitivity level outside 1-10
    pub const INVALID_SENSITIVITY_LEVEL: i32 = 3001;

    /// Event source failed while producing frames
    pub const EVENT_SOURCE_FAULT: i32 = 3002;

    /// A scan is already running on this session
    pub const CONCURRENT_SCAN_REJECTED: i32 = 3003;

    /// Scan state mutex was poisoned
    pub const STATE_POISONED: i32 = 3004;

    /// Scan results could not be stored
    pub const STORAGE_FAILED: i32 = 3005;
}

/// Log a scan error with structured context
///
/// Fields logged:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_scan_error(err: &ScanError, context: &str) {
    error!(
        "Scan error in {}: code={}, component=ScanSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Scan-related errors
///
/// These errors cover sensitivity changes, the scan lifecycle, the event
/// source feeding a scan, and storage of finished scans.
///
/// Error code ranges: 3001-3005
#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Sensitivity level is outside the accepted 1-10 range
    InvalidSensitivityLevel { level: i64 },

    /// The event source reported an internal fault or vanished mid-scan
    EventSourceFault { reason: String },

    /// A scan is already running on this session
    ConcurrentScanRejected,

    /// Scan state mutex was poisoned
    StatePoisoned,

    /// Writing or reading stored scan results failed
    StorageFailed { reason: String },
}

impl ErrorCode for ScanError {
    fn code(&self) -> i32 {
        match self {
            ScanError::InvalidSensitivityLevel { .. } => ScanErrorCodes::INVALID_SENSITIVITY_LEVEL,
            ScanError::EventSourceFault { .. } => ScanErrorCodes::EVENT_SOURCE_FAULT,
            ScanError::ConcurrentScanRejected => ScanErrorCodes::CONCURRENT_SCAN_REJECTED,
            ScanError::StatePoisoned => ScanErrorCodes::STATE_POISONED,
            ScanError::StorageFailed { .. } => ScanErrorCodes::STORAGE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            ScanError::InvalidSensitivityLevel { level } => {
                format!("Sensitivity must be between 1 and 10 (got {})", level)
            }
            ScanError::EventSourceFault { reason } => {
                format!("Event source fault: {}", reason)
            }
            ScanError::ConcurrentScanRejected => {
                "Scan already running. Call stop_scan() first.".to_string()
            }
            ScanError::StatePoisoned => "Scan state lock poisoned".to_string(),
            ScanError::StorageFailed { reason } => {
                format!("Failed to store scan results: {}", reason)
            }
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScanError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ScanError {}

/// Storage failures surface as `StorageFailed`
impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::StorageFailed {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::StorageFailed {
            reason: err.to_string(),
        }
    }
}
