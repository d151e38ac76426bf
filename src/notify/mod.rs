//! Structured progress notifications and their delivery.
//!
//! Background loops never touch presentation state. They hand
//! [`Notification`]s to a [`ProgressSink`]; front-ends format them through
//! `Display` or inspect the fields directly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationProgress;
use crate::scan::{DetectionEvent, ScanEndReason, ScanSummary};
use crate::sensitivity::DetectionParameters;

pub mod hub;

pub use hub::{NotificationHub, NotificationReceiver, NotificationSender};

/// One progress message emitted by a scan or a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    ScanStarted {
        duration_secs: u64,
        sensitivity: u8,
        parameters: DetectionParameters,
    },
    Detection(DetectionEvent),
    Anomaly {
        frame_index: u64,
        strength: f32,
    },
    Summary(ScanSummary),
    Calibration(CalibrationProgress),
}

impl Notification {
    pub fn is_detection(&self) -> bool {
        matches!(self, Notification::Detection(_))
    }

    pub fn is_calibration(&self) -> bool {
        matches!(self, Notification::Calibration(_))
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::ScanStarted {
                duration_secs,
                sensitivity,
                ..
            } => write!(
                f,
                "Scan started ({} s, sensitivity {}/10)...",
                duration_secs, sensitivity
            ),
            Notification::Detection(event) => write!(
                f,
                "Screech detected! {:.1} dB, {:.1} m, confidence: {:.2}",
                event.db_level, event.distance_m, event.confidence
            ),
            Notification::Anomaly { strength, .. } => {
                write!(f, "Synthetic screech generated (strength: {:.2})", strength)
            }
            Notification::Summary(summary) => {
                writeln!(f, "Scan finished. Screeches: {}", summary.detections)?;
                match summary.max_db {
                    Some(max_db) => writeln!(f, "Max level: {:.1} dB", max_db)?,
                    None => writeln!(f, "Max level: -inf dB")?,
                }
                write!(f, "Distance: {:.1} m", summary.best_distance)?;
                if summary.end_reason == ScanEndReason::SourceFault {
                    write!(f, "\nEnded early: event source fault")?;
                }
                Ok(())
            }
            Notification::Calibration(progress) => match progress.constant {
                Some(constant) => write!(f, "Calibration complete! Constant: {:.2}", constant),
                None => write!(
                    f,
                    "Calibrating... {}/{}",
                    progress.step, progress.total_steps
                ),
            },
        }
    }
}

/// Receiver side of progress reporting.
///
/// Implemented by [`NotificationSender`] for queue hand-off and by any
/// `Fn(Notification)` closure, which keeps tests free of channels.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<F> ProgressSink for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Sink that discards everything
pub struct NullSink;

impl ProgressSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}
