// Sound Hunter Core - simulated acoustic anomaly scanner
// Synthetic event source, timed acceptance loop, calibration and result storage

// Module declarations
pub mod calibration;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod hunter;
pub mod notify;
pub mod scan;
pub mod sensitivity;
pub mod source;
pub mod storage;
pub mod telemetry;

// Re-exports for convenience
pub use calibration::{CalibrationConstant, CalibrationProgress, CalibrationRoutine};
pub use cancel::CancellationToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{CalibrationError, ErrorCode, ScanError};
pub use hunter::SoundHunter;
pub use notify::{Notification, NotificationReceiver, ProgressSink};
pub use scan::{DetectionEvent, ScanEndReason, ScanSession, ScanSummary};
pub use sensitivity::{DetectionParameters, SensitivityLevel};
pub use storage::{JsonResultStore, ScanRecord};
pub use telemetry::{MetricEvent, TelemetryCollector};
