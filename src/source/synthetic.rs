//! Synthetic event source - decorative signal generation
//!
//! Produces mains-hum style background noise and, every Nth frame, mixes in
//! a two-tone burst standing in for a screech. Nothing downstream analyses
//! the samples yet; they exist so a future analyzer has something to chew on.

use std::f32::consts::PI;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SourceConfig;
use crate::error::ScanError;
use crate::sensitivity::SensitivityLevel;

use super::{EventSource, InjectedAnomaly, SourceFrame};

/// Length of one synthesized frame in seconds
const FRAME_SPAN_SECS: f32 = 0.1;
/// Amplitude of the secondary anomaly tone
const SECONDARY_TONE_AMPLITUDE: f32 = 0.2;

/// Background components as (frequency Hz, amplitude)
const BACKGROUND_TONES: [(f32, f32); 2] = [(60.0, 0.05), (120.0, 0.03)];
/// Amplitude of the white noise floor
const NOISE_AMPLITUDE: f32 = 0.02;

/// Anomaly strength for a sensitivity level: 0.3 + 0.07 * level
pub fn anomaly_strength(level: SensitivityLevel) -> f32 {
    0.3 + level.get() as f32 * 0.07
}

/// Infinite synthetic frame generator
pub struct SyntheticEventSource {
    config: SourceConfig,
    rng: StdRng,
    next_index: u64,
}

impl SyntheticEventSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
            next_index: 0,
        }
    }

    /// Deterministic noise for tests and reproducible runs
    pub fn with_seed(config: SourceConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            next_index: 0,
        }
    }

    fn is_anomaly_frame(&self, index: u64) -> bool {
        self.config.anomaly_every > 0 && index.is_multiple_of(self.config.anomaly_every)
    }

    fn synthesize(&mut self, anomaly: Option<&InjectedAnomaly>) -> Vec<f32> {
        let len = self.config.chunk_size;
        let step = if len > 1 {
            FRAME_SPAN_SECS / (len - 1) as f32
        } else {
            0.0
        };

        (0..len)
            .map(|i| {
                let t = i as f32 * step;
                let mut sample: f32 = BACKGROUND_TONES
                    .iter()
                    .map(|&(freq, amp)| amp * (2.0 * PI * freq * t).sin())
                    .sum();
                sample += NOISE_AMPLITUDE * self.rng.gen_range(-1.0..1.0);

                if let Some(anomaly) = anomaly {
                    let [primary, secondary] = anomaly.frequencies;
                    sample += anomaly.strength * (2.0 * PI * primary * t).sin()
                        + SECONDARY_TONE_AMPLITUDE * (2.0 * PI * secondary * t).sin();
                }
                sample
            })
            .collect()
    }
}

impl EventSource for SyntheticEventSource {
    fn next_frame(&mut self, level: SensitivityLevel) -> Result<SourceFrame, ScanError> {
        let index = self.next_index;
        self.next_index += 1;

        let anomaly = self.is_anomaly_frame(index).then(|| InjectedAnomaly {
            strength: anomaly_strength(level),
            frequencies: self.config.target_frequencies,
        });
        let samples = self.synthesize(anomaly.as_ref());

        Ok(SourceFrame {
            index,
            samples,
            anomaly,
        })
    }

    fn frame_interval(&self) -> Duration {
        self.config.frame_interval()
    }
}
