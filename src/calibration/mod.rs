// Calibration module - timed calibration routine and the shared constant
//
// This module provides three components:
// 1. CalibrationConstant: process-wide baseline shared through a cheap handle
// 2. CalibrationRoutine: the timed step sequence that perturbs the constant
// 3. CalibrationProgress: per-step progress payloads
//
// The calibration workflow:
// 1. Create a CalibrationRoutine around the shared constant
// 2. Call calibrate() off the presentation thread
// 3. Receive one progress message per step plus a final one with the value

pub mod progress;
pub mod routine;
pub mod state;

pub use progress::CalibrationProgress;
pub use routine::CalibrationRoutine;
pub use state::{CalibrationConstant, DEFAULT_CALIBRATION_CONSTANT};
