//! Bounded buffer between event producers and the batch writer.

use std::{
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use flotsam_core::event::NewEvent;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{Error, Result};

/// What [`EventBuffer::submit`] does when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
  /// Fail immediately with [`Error::CapacityExceeded`]. The default:
  /// producers observing a live feed must not stall behind a slow store.
  Reject,
  /// Wait up to `timeout` for space, then fail.
  Block { timeout: Duration },
}

/// Create a buffer of `capacity` events and its single consumer handle.
pub fn channel(capacity: usize, policy: Backpressure) -> (EventBuffer, EventReceiver) {
  let (tx, rx) = mpsc::channel(capacity);
  let buffer = EventBuffer { tx, policy, dropped: Arc::new(AtomicU64::new(0)) };
  (buffer, EventReceiver { rx })
}

/// Producer handle. Cheap to clone; all clones share the dropped counter.
#[derive(Clone)]
pub struct EventBuffer {
  tx:      mpsc::Sender<NewEvent>,
  policy:  Backpressure,
  dropped: Arc<AtomicU64>,
}

impl EventBuffer {
  /// Hand one event to the writer, applying the backpressure policy.
  /// Events refused here increment the dropped counter.
  pub async fn submit(&self, event: NewEvent) -> Result<()> {
    match self.policy {
      Backpressure::Reject => match self.tx.try_send(event) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
          self.dropped.fetch_add(1, Ordering::Relaxed);
          Err(Error::CapacityExceeded)
        }
        Err(TrySendError::Closed(_)) => Err(Error::BufferClosed),
      },
      Backpressure::Block { timeout } => {
        match tokio::time::timeout(timeout, self.tx.send(event)).await {
          Ok(Ok(())) => Ok(()),
          Ok(Err(_)) => Err(Error::BufferClosed),
          Err(_) => {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            Err(Error::CapacityExceeded)
          }
        }
      }
    }
  }

  /// Events refused at submission since the buffer was created.
  pub fn dropped(&self) -> u64 {
    self.dropped.load(Ordering::Relaxed)
  }
}

/// Consumer handle held by the batch writer.
pub struct EventReceiver {
  rx: mpsc::Receiver<NewEvent>,
}

impl EventReceiver {
  /// `None` once every producer handle has been dropped and the buffer
  /// has drained.
  pub async fn recv(&mut self) -> Option<NewEvent> {
    self.rx.recv().await
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn event(n: u32) -> NewEvent {
    NewEvent {
      source_id:     "probe-a".into(),
      observed_at:   Utc::now(),
      subject_token: format!("s{n}"),
      content_text:  format!("query {n}"),
    }
  }

  #[tokio::test]
  async fn reject_policy_drops_overflow() {
    let (buffer, mut rx) = channel(2, Backpressure::Reject);

    buffer.submit(event(1)).await.unwrap();
    buffer.submit(event(2)).await.unwrap();
    let err = buffer.submit(event(3)).await.unwrap_err();

    assert!(matches!(err, Error::CapacityExceeded));
    assert_eq!(buffer.dropped(), 1);

    // The two accepted events are intact.
    assert_eq!(rx.recv().await.unwrap().subject_token, "s1");
    assert_eq!(rx.recv().await.unwrap().subject_token, "s2");
  }

  #[tokio::test]
  async fn block_policy_waits_for_space() {
    let (buffer, mut rx) =
      channel(1, Backpressure::Block { timeout: Duration::from_secs(5) });

    buffer.submit(event(1)).await.unwrap();
    let pending = tokio::spawn({
      let buffer = buffer.clone();
      async move { buffer.submit(event(2)).await }
    });

    // Draining one slot unblocks the pending submit.
    assert_eq!(rx.recv().await.unwrap().subject_token, "s1");
    pending.await.unwrap().unwrap();
    assert_eq!(buffer.dropped(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn block_policy_times_out() {
    let (buffer, _rx) =
      channel(1, Backpressure::Block { timeout: Duration::from_millis(100) });

    buffer.submit(event(1)).await.unwrap();
    let err = buffer.submit(event(2)).await.unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded));
    assert_eq!(buffer.dropped(), 1);
  }

  #[tokio::test]
  async fn submit_after_close_fails() {
    let (buffer, rx) = channel(2, Backpressure::Reject);
    drop(rx);
    let err = buffer.submit(event(1)).await.unwrap_err();
    assert!(matches!(err, Error::BufferClosed));
    // Closure is not a drop.
    assert_eq!(buffer.dropped(), 0);
  }
}
