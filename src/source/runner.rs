//! Source runner thread.
//!
//! Ticks an [`EventSource`] at its frame interval on a dedicated thread and
//! pushes condensed reports into an SPSC ring the scan loop drains.

use std::sync::Arc;
use std::thread::JoinHandle;

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::error::{ErrorCode, ScanError};
use crate::sensitivity::SensitivityCell;
use crate::telemetry::{MetricEvent, TelemetryCollector};

use super::{EventSource, FrameReport, SourceMessage};

/// Everything a runner needs, bundled so the session can wire it in one place.
pub struct SourceRunnerContext {
    pub source: Box<dyn EventSource>,
    pub sensitivity: SensitivityCell,
    pub token: CancellationToken,
    pub clock: Arc<dyn Clock>,
    pub telemetry: Arc<TelemetryCollector>,
    pub queue_capacity: usize,
}

/// Scan-side handle to a running source
pub struct SourceHandle {
    consumer: Consumer<SourceMessage>,
    thread: Option<JoinHandle<()>>,
}

impl SourceHandle {
    /// Pop everything the source has produced so far
    pub fn drain(&mut self) -> Vec<SourceMessage> {
        std::iter::from_fn(|| self.consumer.pop().ok()).collect()
    }

    /// True once the runner thread has exited and dropped its producer
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }

    /// Wait for the runner thread to exit. The caller must cancel first.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[SourceRunner] Source thread panicked");
            }
        }
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.join();
    }
}

/// Start a source on its own thread
///
/// # Errors
/// `ScanError::EventSourceFault` if the OS refuses to spawn the thread
pub fn spawn_source(ctx: SourceRunnerContext) -> Result<SourceHandle, ScanError> {
    let (producer, consumer) = RingBuffer::new(ctx.queue_capacity.max(1));

    let thread = std::thread::Builder::new()
        .name("sound-hunter-source".to_string())
        .spawn(move || run(ctx, producer))
        .map_err(|err| ScanError::EventSourceFault {
            reason: format!("failed to spawn source thread: {}", err),
        })?;

    Ok(SourceHandle {
        consumer,
        thread: Some(thread),
    })
}

fn run(mut ctx: SourceRunnerContext, mut producer: Producer<SourceMessage>) {
    tracing::debug!("[SourceRunner] Started");
    let interval = ctx.source.frame_interval();

    while !ctx.token.is_cancelled() {
        let level = ctx.sensitivity.get();
        match ctx.source.next_frame(level) {
            Ok(frame) => {
                if let Some(anomaly) = frame.anomaly {
                    tracing::info!(
                        "[SourceRunner] Synthetic screech generated (strength: {:.2})",
                        anomaly.strength
                    );
                    ctx.telemetry.publish(MetricEvent::AnomalyInjected {
                        frame_index: frame.index,
                        strength: anomaly.strength,
                    });
                }

                if let Err(PushError::Full(_)) =
                    producer.push(SourceMessage::Frame(FrameReport::from(&frame)))
                {
                    tracing::warn!(
                        "[SourceRunner] Queue full, dropping frame {}",
                        frame.index
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    "[SourceRunner] Source failed: code={}, message={}",
                    err.code(),
                    err.message()
                );
                let reason = match err {
                    ScanError::EventSourceFault { reason } => reason,
                    other => other.message(),
                };
                // If the ring is full the dropped producer still reads as a fault downstream.
                let _ = producer.push(SourceMessage::Fault(reason));
                break;
            }
        }

        ctx.clock.sleep(interval);
    }

    tracing::debug!("[SourceRunner] Stopped");
}
