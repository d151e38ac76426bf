//! Event sources feeding a scan.
//!
//! A source produces one [`SourceFrame`] per tick on its own thread. The
//! scan loop never sees raw samples. The runner condenses each frame into a
//! [`FrameReport`] and hands it over a lock-free ring, so a real spectral
//! analyzer can replace [`SyntheticEventSource`] without touching
//! `ScanSession`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::sensitivity::SensitivityLevel;

pub mod runner;
pub mod synthetic;

pub use runner::{spawn_source, SourceHandle, SourceRunnerContext};
pub use synthetic::SyntheticEventSource;

/// Elevated-amplitude burst deliberately mixed into a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InjectedAnomaly {
    /// Amplitude of the primary tone
    pub strength: f32,
    /// Primary and secondary tones (Hz)
    pub frequencies: [f32; 2],
}

/// One block of samples produced by a source
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub index: u64,
    pub samples: Vec<f32>,
    pub anomaly: Option<InjectedAnomaly>,
}

impl SourceFrame {
    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .fold(0.0_f32, |acc, sample| acc.max(sample.abs()))
    }
}

/// Condensed view of a frame sent to the scan loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub index: u64,
    pub peak: f32,
    pub anomaly: Option<InjectedAnomaly>,
}

impl From<&SourceFrame> for FrameReport {
    fn from(frame: &SourceFrame) -> Self {
        Self {
            index: frame.index,
            peak: frame.peak(),
            anomaly: frame.anomaly,
        }
    }
}

/// Message crossing the ring from the source thread to the scan loop
#[derive(Debug, Clone, PartialEq)]
pub enum SourceMessage {
    Frame(FrameReport),
    Fault(String),
}

/// Trait implemented by anything that can feed a scan.
///
/// Implementations only generate data; acceptance decisions stay with the
/// scan loop.
pub trait EventSource: Send {
    /// Produce the next frame at the given sensitivity
    ///
    /// # Errors
    /// `ScanError::EventSourceFault` ends the runner and the scan it feeds
    fn next_frame(&mut self, level: SensitivityLevel) -> Result<SourceFrame, ScanError>;

    /// Wall-clock time between frames
    fn frame_interval(&self) -> Duration;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn next_frame(&mut self, level: SensitivityLevel) -> Result<SourceFrame, ScanError> {
        (**self).next_frame(level)
    }

    fn frame_interval(&self) -> Duration {
        (**self).frame_interval()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_report_condenses_peak() {
        let frame = SourceFrame {
            index: 4,
            samples: vec![0.1, -0.7, 0.3],
            anomaly: None,
        };
        let report = FrameReport::from(&frame);
        assert_eq!(report.index, 4);
        assert!((report.peak - 0.7).abs() < f32::EPSILON);
        assert!(report.anomaly.is_none());
    }

    #[test]
    fn test_empty_frame_peak_is_zero() {
        let frame = SourceFrame {
            index: 0,
            samples: Vec::new(),
            anomaly: None,
        };
        assert_eq!(frame.peak(), 0.0);
    }
}
