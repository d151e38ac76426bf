//! Configuration management for scan, source, and calibration tuning
//!
//! This module provides runtime configuration loading from JSON files so the
//! scan cadence, synthetic source shape, and calibration timing can be
//! adjusted without recompilation. Every section falls back to defaults that
//! reproduce the reference cadence.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the JSON config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/sound_hunter.json";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub source: SourceConfig,
    pub calibration: CalibrationConfig,
    pub storage: StorageConfig,
    /// Sensitivity applied at startup (1-10)
    pub default_sensitivity: u8,
}

/// Acceptance loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Scan length used when a front-end does not pass one
    pub default_duration_secs: u64,
    /// Sleep between acceptance loop iterations
    pub tick_interval_ms: u64,
    /// A detection is synthesized when whole elapsed seconds are a multiple of this
    pub detection_period_secs: u64,
    /// Level around which synthetic detections are drawn (dB)
    pub baseline_db: f64,
    /// Fixed RNG seed for reproducible scans; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: 60,
            tick_interval_ms: 1000,
            detection_period_secs: 10,
            baseline_db: 60.0,
            seed: None,
        }
    }
}

impl ScanConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Synthetic event source parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Samples per synthesized frame
    pub chunk_size: usize,
    /// Wall-clock time between frames
    pub frame_interval_ms: u64,
    /// An anomaly is injected into every Nth frame, starting with frame 0
    pub anomaly_every: u64,
    /// Primary and secondary anomaly tones (Hz)
    pub target_frequencies: [f32; 2],
    /// Capacity of the ring between the source thread and the scan loop
    pub queue_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            frame_interval_ms: 50,
            anomaly_every: 50,
            target_frequencies: [2500.0, 3500.0],
            queue_capacity: 64,
        }
    }
}

impl SourceConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Calibration routine parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Number of timed calibration steps
    pub steps: u8,
    /// Duration of each step
    pub step_duration_ms: u64,
    /// Baseline calibration constant
    pub baseline: f64,
    /// Maximum absolute offset applied to the baseline
    pub max_offset: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            steps: 3,
            step_duration_ms: 1000,
            baseline: 60.0,
            max_offset: 2.0,
        }
    }
}

impl CalibrationConfig {
    pub fn step_duration(&self) -> Duration {
        Duration::from_millis(self.step_duration_ms)
    }
}

/// Scan result storage parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory receiving one JSON file per finished scan
    pub results_dir: PathBuf,
    /// Whether finished scans are written at all
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("SoundHunter_Results"),
            persist: true,
        }
    }
}

impl Default for AppConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            source: SourceConfig::default(),
            calibration: CalibrationConfig::default(),
            storage: StorageConfig::default(),
            default_sensitivity: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults when the file is missing or
    /// holds invalid JSON. Both fallbacks are logged.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }
}
