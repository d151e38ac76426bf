// Progress tracking for the calibration routine
//
// One progress value is emitted after each timed step, and one final value
// carries the newly computed constant.

/// Progress information for the current calibration step
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationProgress {
    /// Steps completed so far (1-based)
    pub step: u8,
    /// Total timed steps in the routine
    pub total_steps: u8,
    /// New calibration constant, present only on the final message
    pub constant: Option<f64>,
}

impl CalibrationProgress {
    /// Progress after a completed step
    pub fn step(step: u8, total_steps: u8) -> Self {
        Self {
            step,
            total_steps,
            constant: None,
        }
    }

    /// Final progress message carrying the new constant
    pub fn finished(total_steps: u8, constant: f64) -> Self {
        Self {
            step: total_steps,
            total_steps,
            constant: Some(constant),
        }
    }

    /// Check if the routine has produced its constant
    pub fn is_complete(&self) -> bool {
        self.constant.is_some()
    }

    /// Get progress percentage (0-100)
    pub fn percentage(&self) -> u8 {
        if self.total_steps == 0 {
            return 0;
        }
        ((self.step as f32 / self.total_steps as f32) * 100.0) as u8
    }
}
