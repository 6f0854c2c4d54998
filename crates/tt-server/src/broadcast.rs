//! One-to-many fan-out of events to dynamically registered listeners.
//!
//! Every [`Listener`] owns a bounded buffer. Fan-out never waits on a slow
//! listener: when its buffer is full the oldest pending event is overwritten,
//! and the listener logs how many events it lost the next time it reads.
//!
//! Publishing normally goes through a [`Publisher`], which queues events for a
//! single processing task spawned by [`Broadcaster::start`]. That task is the
//! only thing that fans out, so listeners see events in publish order.
//! [`Publisher::publish`] returns once its event has been fanned out, so a
//! listener registered after that never sees it.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest per-listener buffer; bigger requests are clamped to it.
pub const MAX_CAPACITY: usize = 1 << 16;

/// Returned by [`Publisher::publish`] once the broadcaster has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("broadcaster has shut down")]
pub struct PublisherClosed;

// ─── Broadcaster ─────────────────────────────────────────────────────────────

/// Registry of listeners. Cloning shares the same registry.
pub struct Broadcaster<T> {
  inner: Arc<Inner<T>>,
}

struct Inner<T> {
  listeners: RwLock<Vec<Slot<T>>>,
  capacity:  usize,
  next_id:   AtomicU64,
  shutdown:  CancellationToken,
}

struct Slot<T> {
  id: u64,
  tx: broadcast::Sender<T>,
}

impl<T> Clone for Broadcaster<T> {
  fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<T> Inner<T> {
  fn remove(&self, id: u64) -> bool {
    let mut listeners = self.listeners.write();
    match listeners.iter().position(|slot| slot.id == id) {
      Some(index) => {
        listeners.swap_remove(index);
        true
      }
      None => false,
    }
  }
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
  /// Create a broadcaster whose listeners each buffer up to `capacity`
  /// undelivered events (rounded up to a power of two, between 1 and
  /// [`MAX_CAPACITY`]).
  pub fn new(capacity: usize) -> Self {
    if capacity > MAX_CAPACITY {
      warn!(capacity, max = MAX_CAPACITY, "listener buffer too large; clamping");
    }
    Self {
      inner: Arc::new(Inner {
        listeners: RwLock::new(Vec::new()),
        capacity:  capacity.clamp(1, MAX_CAPACITY),
        next_id:   AtomicU64::new(1),
        shutdown:  CancellationToken::new(),
      }),
    }
  }

  /// Register a new listener. It receives only events published after this
  /// call; there is no replay.
  ///
  /// After [`shutdown`](Self::shutdown) the returned listener is already
  /// closed.
  pub fn register(&self) -> Listener<T> {
    let (tx, rx) = broadcast::channel(self.inner.capacity);
    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

    // Checked under the lock: `shutdown` cancels before it clears the list,
    // so a slot pushed here is either cleared by it or never pushed.
    let mut listeners = self.inner.listeners.write();
    if self.inner.shutdown.is_cancelled() {
      drop(tx);
    } else {
      listeners.push(Slot { id, tx });
      debug!(listener = id, "registered listener");
    }
    drop(listeners);

    Listener { id, rx, inner: Arc::clone(&self.inner) }
  }

  /// Unregister `listener` and close its delivery channel. Equivalent to
  /// dropping it.
  pub fn unregister(&self, listener: Listener<T>) { drop(listener); }

  /// Deliver `event` to every listener registered right now, returning how
  /// many that was. Never blocks.
  pub fn broadcast(&self, event: T) -> usize {
    let listeners = self.inner.listeners.read();
    for slot in listeners.iter() {
      // Only fails when the receiver is mid-drop; its slot goes away next.
      let _ = slot.tx.send(event.clone());
    }
    listeners.len()
  }

  pub fn listener_count(&self) -> usize { self.inner.listeners.read().len() }

  /// Spawn the processing task and return a handle for publishing events.
  ///
  /// `queue` bounds the number of events waiting to be fanned out.
  pub fn start(&self, queue: usize) -> Publisher<T> {
    let (tx, mut rx) = mpsc::channel::<(T, oneshot::Sender<()>)>(queue.max(1));
    let broadcaster = self.clone();
    let shutdown = self.inner.shutdown.clone();

    tokio::spawn(async move {
      loop {
        tokio::select! {
          () = shutdown.cancelled() => break,
          next = rx.recv() => match next {
            Some((event, delivered)) => {
              broadcaster.broadcast(event);
              let _ = delivered.send(());
            }
            None => break,
          },
        }
      }
      debug!("broadcast processor stopped");
    });

    Publisher { tx, shutdown: self.inner.shutdown.clone() }
  }

  /// Stop the processing task, refuse further publishes and close every
  /// listener. Listeners still drain events already in their buffers.
  pub fn shutdown(&self) {
    self.inner.shutdown.cancel();
    let closed = {
      let mut listeners = self.inner.listeners.write();
      let n = listeners.len();
      listeners.clear();
      n
    };
    info!(closed, "broadcaster shut down");
  }
}

// ─── Listener ────────────────────────────────────────────────────────────────

/// The receiving end of one registration. Unregisters itself on drop.
pub struct Listener<T> {
  id:    u64,
  rx:    broadcast::Receiver<T>,
  inner: Arc<Inner<T>>,
}

impl<T: Clone> Listener<T> {
  /// Wait for the next event. `None` once the listener has been closed and
  /// its buffer is drained.
  pub async fn recv(&mut self) -> Option<T> {
    loop {
      match self.rx.recv().await {
        Ok(event) => return Some(event),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          warn!(listener = self.id, skipped, "listener fell behind; oldest events dropped");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }
}

impl<T> Drop for Listener<T> {
  fn drop(&mut self) {
    if self.inner.remove(self.id) {
      debug!(listener = self.id, "unregistered listener");
    }
  }
}

// ─── Publisher ───────────────────────────────────────────────────────────────

/// Cloneable handle that hands events to the processing task.
pub struct Publisher<T> {
  tx:       mpsc::Sender<(T, oneshot::Sender<()>)>,
  shutdown: CancellationToken,
}

impl<T> Clone for Publisher<T> {
  fn clone(&self) -> Self {
    Self { tx: self.tx.clone(), shutdown: self.shutdown.clone() }
  }
}

impl<T> Publisher<T> {
  /// Deliver `event` to every listener registered when the processing task
  /// reaches it. Returns after the fan-out, so listeners registered later
  /// never receive it. Fails if the broadcaster shuts down first.
  pub async fn publish(&self, event: T) -> Result<(), PublisherClosed> {
    if self.shutdown.is_cancelled() {
      return Err(PublisherClosed);
    }
    let (delivered, fanned_out) = oneshot::channel();
    self.tx.send((event, delivered)).await.map_err(|_| PublisherClosed)?;
    fanned_out.await.map_err(|_| PublisherClosed)
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use tokio::time::timeout;

  use super::*;

  async fn next<T: Clone>(listener: &mut Listener<T>) -> Option<T> {
    timeout(Duration::from_secs(5), listener.recv())
      .await
      .expect("listener timed out")
  }

  #[tokio::test]
  async fn every_listener_gets_each_event() {
    let broadcaster = Broadcaster::new(8);
    let mut a = broadcaster.register();
    let mut b = broadcaster.register();

    assert_eq!(broadcaster.broadcast("hello"), 2);
    assert_eq!(next(&mut a).await, Some("hello"));
    assert_eq!(next(&mut b).await, Some("hello"));
  }

  #[tokio::test]
  async fn published_events_arrive_in_order() {
    let broadcaster = Broadcaster::new(8);
    let mut listener = broadcaster.register();
    let publisher = broadcaster.start(4);

    for n in 1..=5 {
      publisher.publish(n).await.unwrap();
    }
    for n in 1..=5 {
      assert_eq!(next(&mut listener).await, Some(n));
    }
  }

  #[tokio::test]
  async fn listener_registered_after_publish_misses_it() {
    let broadcaster = Broadcaster::new(8);
    let mut early = broadcaster.register();
    let publisher = broadcaster.start(4);

    publisher.publish(42).await.unwrap();
    let mut late = broadcaster.register();
    publisher.publish(43).await.unwrap();

    assert_eq!(next(&mut early).await, Some(42));
    assert_eq!(next(&mut early).await, Some(43));
    assert_eq!(next(&mut late).await, Some(43));
  }

  #[tokio::test]
  async fn oversized_capacity_is_clamped() {
    let broadcaster = Broadcaster::new(usize::MAX);
    let mut listener = broadcaster.register();
    broadcaster.broadcast(1);
    assert_eq!(next(&mut listener).await, Some(1));

    let broadcaster = Broadcaster::new(0);
    let mut listener = broadcaster.register();
    broadcaster.broadcast(2);
    assert_eq!(next(&mut listener).await, Some(2));
  }

  #[tokio::test]
  async fn unregistered_listener_is_skipped() {
    let broadcaster = Broadcaster::new(8);
    let a = broadcaster.register();
    let mut b = broadcaster.register();
    let mut c = broadcaster.register();
    assert_eq!(broadcaster.listener_count(), 3);

    broadcaster.unregister(a);
    assert_eq!(broadcaster.listener_count(), 2);
    assert_eq!(broadcaster.broadcast(7), 2);
    assert_eq!(next(&mut b).await, Some(7));
    assert_eq!(next(&mut c).await, Some(7));

    drop(c);
    assert_eq!(broadcaster.listener_count(), 1);
  }

  #[tokio::test]
  async fn late_listener_gets_no_replay() {
    let broadcaster = Broadcaster::new(8);
    let mut early = broadcaster.register();
    broadcaster.broadcast(1);

    let mut late = broadcaster.register();
    broadcaster.broadcast(2);

    assert_eq!(next(&mut early).await, Some(1));
    assert_eq!(next(&mut early).await, Some(2));
    assert_eq!(next(&mut late).await, Some(2));
  }

  #[tokio::test]
  async fn full_buffer_drops_oldest_without_blocking() {
    let broadcaster = Broadcaster::new(2);
    let mut slow = broadcaster.register();
    let mut fast = broadcaster.register();

    broadcaster.broadcast(1);
    assert_eq!(next(&mut fast).await, Some(1));
    broadcaster.broadcast(2);
    broadcaster.broadcast(3);

    assert_eq!(next(&mut slow).await, Some(2));
    assert_eq!(next(&mut slow).await, Some(3));
    assert_eq!(next(&mut fast).await, Some(2));
    assert_eq!(next(&mut fast).await, Some(3));
  }

  #[tokio::test]
  async fn shutdown_closes_listeners_and_publishers() {
    let broadcaster = Broadcaster::new(8);
    let mut listener = broadcaster.register();
    let publisher = broadcaster.start(4);

    broadcaster.broadcast("buffered");
    broadcaster.shutdown();

    assert_eq!(broadcaster.listener_count(), 0);
    assert_eq!(next(&mut listener).await, Some("buffered"));
    assert_eq!(next(&mut listener).await, None);
    assert_eq!(publisher.publish("late").await, Err(PublisherClosed));

    let mut after = broadcaster.register();
    assert_eq!(next(&mut after).await, None);
    assert_eq!(broadcaster.listener_count(), 0);
  }
}
