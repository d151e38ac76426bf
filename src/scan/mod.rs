// Scan module - scan lifecycle, accepted detections, and per-scan aggregates
//
// This module provides three main components:
// 1. ScanSession: the Idle -> Scanning -> Idle state machine
// 2. DetectionEvent: one accepted synthetic measurement
// 3. ScanSessionState / ScanSummary: running maxima and the frozen result

pub mod event;
pub mod session;
pub mod state;

pub use event::DetectionEvent;
pub(crate) use session::ScanReservation;
pub use session::{ScanSession, SourceFactory};
pub use state::{ScanEndReason, ScanReport, ScanSessionState, ScanSummary};
