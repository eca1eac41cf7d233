//! Data-plane queues.
//!
//! `InputQueue` carries work items from the controller to the worker and
//! applies the configured overflow policy so `submit` never deadlocks the
//! controller against a busy worker. `ResultQueue` carries results back and
//! may be shared by several workers.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use tracing::debug;

use crate::config::OverflowPolicy;
use crate::error::{Error, Result};
use crate::model::ResultItem;
use crate::telemetry::metrics;

/// Outcome of one bounded dequeue attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeue<T> {
    Item(T),
    /// Nothing arrived within the timeout.
    Empty,
    /// No more items will ever arrive.
    Closed,
}

/// Anything the run loop can pull work from with a bounded wait.
pub trait WorkSource<T>: Send {
    fn get(&mut self, timeout: Duration) -> Dequeue<T>;

    /// Items ready right now. Bounds the drain at shutdown; a source that
    /// cannot tell reports none and hands over no leftovers.
    fn pending(&self) -> usize {
        0
    }
}

impl<T: Send> WorkSource<T> for Receiver<T> {
    fn get(&mut self, timeout: Duration) -> Dequeue<T> {
        match self.recv_timeout(timeout) {
            Ok(item) => Dequeue::Item(item),
            Err(RecvTimeoutError::Timeout) => Dequeue::Empty,
            Err(RecvTimeoutError::Disconnected) => Dequeue::Closed,
        }
    }

    fn pending(&self) -> usize {
        self.len()
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// FIFO work queue with a submit-side overflow policy.
pub struct InputQueue<T> {
    tx: Sender<T>,
    // Kept on the controller side so drop-oldest can evict.
    rx: Receiver<T>,
    capacity: Option<usize>,
    overflow: OverflowPolicy,
}

impl<T> Clone for InputQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
            overflow: self.overflow,
        }
    }
}

impl<T: Send> InputQueue<T> {
    pub fn new(capacity: Option<usize>, overflow: OverflowPolicy) -> Self {
        let (tx, rx) = match capacity {
            Some(cap) => crossbeam_channel::bounded(cap),
            None => crossbeam_channel::unbounded(),
        };
        Self {
            tx,
            rx,
            capacity,
            overflow,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None, OverflowPolicy::default())
    }

    /// Enqueue an item without blocking indefinitely.
    ///
    /// Returns the item displaced to make room, if the queue is bounded,
    /// full, and uses `DropOldest`. Fails with `QueueFull` if the `Block`
    /// policy's timeout expires first.
    pub fn submit(&self, item: T) -> Result<Option<T>> {
        if self.capacity.is_none() {
            self.tx
                .send(item)
                .map_err(|_| Error::Disconnected("input queue"))?;
            return Ok(None);
        }

        match self.overflow {
            OverflowPolicy::DropOldest => {
                let mut item = item;
                let mut displaced = None;
                loop {
                    match self.tx.try_send(item) {
                        Ok(()) => return Ok(displaced),
                        Err(TrySendError::Full(back)) => {
                            item = back;
                            // The worker may have taken one in the meantime;
                            // then the retry simply succeeds.
                            if let Ok(oldest) = self.rx.try_recv() {
                                debug!("input queue full, displacing oldest item");
                                metrics::queue_displaced().add(1, &[]);
                                displaced = Some(oldest);
                            }
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            return Err(Error::Disconnected("input queue"));
                        }
                    }
                }
            }
            OverflowPolicy::Block { block_timeout_ms } => {
                match self
                    .tx
                    .send_timeout(item, Duration::from_millis(block_timeout_ms))
                {
                    Ok(()) => Ok(None),
                    Err(SendTimeoutError::Timeout(_)) => Err(Error::QueueFull),
                    Err(SendTimeoutError::Disconnected(_)) => {
                        Err(Error::Disconnected("input queue"))
                    }
                }
            }
        }
    }

    /// Number of items waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// The consumer end handed to the run loop.
    pub(crate) fn receiver(&self) -> Receiver<T> {
        self.rx.clone()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Unbounded result queue. Clone it to share one queue between workers;
/// every result carries its producer so the consumer can demultiplex.
pub struct ResultQueue<R> {
    tx: Sender<ResultItem<R>>,
    rx: Receiver<ResultItem<R>>,
}

impl<R> Clone for ResultQueue<R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<R> Default for ResultQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ResultQueue<R> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Everything available right now. Never blocks; call again on the next
    /// tick of the consumer's own event loop.
    pub fn poll(&self) -> crossbeam_channel::TryIter<'_, ResultItem<R>> {
        self.rx.try_iter()
    }

    /// Wait up to `timeout` for the next result.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ResultItem<R>> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn sender(&self) -> Sender<ResultItem<R>> {
        self.tx.clone()
    }
}

