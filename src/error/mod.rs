// Error types for the sound hunter core
//
// This module defines custom error types for scan and calibration operations,
// providing structured error handling with stable numeric codes that front-ends
// can match on without parsing messages.

mod calibration;
mod scan;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use scan::{log_scan_error, ScanError, ScanErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent reporting across the
/// CLI, telemetry, and any future front-end.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
