//! FIFO job queue with bounded-wait dequeue.
//!
//! A thin wrapper over a flume channel: unbounded by default, optionally
//! capacity-bounded. Cloning shares the underlying channel, which is how the
//! worker pool hands one queue to many workers.

use std::time::Duration;

/// Multi-producer, multi-consumer FIFO.
pub struct JobQueue<T> {
    tx: flume::Sender<T>,
    rx: flume::Receiver<T>,
    bounded: bool,
}

impl<T> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            bounded: self.bounded,
        }
    }
}

impl<T> JobQueue<T> {
    /// A queue with the given capacity; zero means unbounded.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = if capacity == 0 {
            flume::unbounded()
        } else {
            flume::bounded(capacity)
        };
        Self {
            tx,
            rx,
            bounded: capacity > 0,
        }
    }

    /// Enqueues without blocking; hands the item back when a bounded queue is
    /// full.
    pub fn push(&self, item: T) -> Result<(), T> {
        if self.bounded {
            self.tx.try_send(item).map_err(|err| err.into_inner())
        } else {
            self.tx.send(item).map_err(|err| err.into_inner())
        }
    }

    /// Dequeues, waiting at most `wait` for an item to arrive.
    pub fn pop_timeout(&self, wait: Duration) -> Option<T> {
        self.rx.recv_timeout(wait).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
