// NotificationHub: bounded hand-off between background loops and the
// single-threaded presentation consumer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{Notification, ProgressSink};

/// Owns the notification queue.
///
/// Any number of [`NotificationSender`]s may feed the queue; exactly one
/// [`NotificationReceiver`] can be taken out of the hub, so delivery
/// happens on a single context.
///
/// # Notes
/// - Sending never blocks a scan loop. When the queue is full the message
///   is dropped, logged, and counted.
/// - Messages sent before anyone takes the receiver stay queued up to the
///   capacity.
pub struct NotificationHub {
    tx: mpsc::Sender<Notification>,
    rx: Mutex<Option<mpsc::Receiver<Notification>>>,
    dropped: Arc<AtomicU64>,
}

impl NotificationHub {
    /// Create a hub whose queue holds at most `capacity` undelivered messages
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Producer handle for scan and calibration loops
    pub fn sender(&self) -> NotificationSender {
        NotificationSender {
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Take the single consumer handle
    ///
    /// # Returns
    /// `None` if the receiver was already taken
    pub fn take_receiver(&self) -> Option<NotificationReceiver> {
        self.rx
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
            .map(|rx| NotificationReceiver { rx })
    }

    /// Number of notifications dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Cloneable producer side of the notification queue
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::Sender<Notification>,
    dropped: Arc<AtomicU64>,
}

impl ProgressSink for NotificationSender {
    fn notify(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "[NotificationHub] Queue full, dropping notification: {}",
                    dropped
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("[NotificationHub] Receiver dropped, notification discarded");
            }
        }
    }
}

/// Consumer side of the notification queue
pub struct NotificationReceiver {
    rx: mpsc::Receiver<Notification>,
}

impl NotificationReceiver {
    /// Wait for the next notification from an async context
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Wait for the next notification from a plain thread
    pub fn blocking_recv(&mut self) -> Option<Notification> {
        self.rx.blocking_recv()
    }

    /// Non-blocking poll
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<Notification> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Consume the receiver as a stream
    pub fn into_stream(self) -> impl Stream<Item = Notification> {
        ReceiverStream::new(self.rx)
    }
}
