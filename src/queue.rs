//! Bounded, byte-accounted SDU queue shared between the upper-layer thread (`push`) and the MAC
//! thread (`pop`/`front_bytes`).
//!
//! Grounded on the teacher's `tcp/stream.rs` `Read`/`Write` implementations: `lock`, check the
//! predicate, `Condvar::wait_while`, recheck, act. Count and byte total live behind the same
//! mutex so a caller can never observe one updated without the other.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::Error;

struct Inner {
    items: VecDeque<Vec<u8>>,
    bytes_pending: usize,
    capacity: usize,
    closed: bool,
}

/// A bounded FIFO of SDU byte buffers with blocking and non-blocking push/pop.
pub struct SduQueue {
    inner: Mutex<Inner>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl std::fmt::Debug for SduQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("SduQueue")
            .field("len", &inner.items.len())
            .field("bytes_pending", &inner.bytes_pending)
            .field("capacity", &inner.capacity)
            .finish()
    }
}

impl SduQueue {
    pub fn new(capacity: usize) -> Self {
        SduQueue {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                bytes_pending: 0,
                capacity,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Blocking push. Suspends the caller while the queue is full, waking on any `pop`. Returns
    /// `QueueFull` only if the queue was closed (by `stop()`) while waiting, in which case the
    /// SDU was not enqueued.
    pub fn push(&self, sdu: Vec<u8>) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.items.len() >= inner.capacity {
            inner = self
                .not_full
                .wait_while(inner, |inner| {
                    inner.items.len() >= inner.capacity && !inner.closed
                })
                .unwrap();
        }
        if inner.closed {
            return Err(Error::QueueFull {
                capacity: inner.capacity,
            });
        }
        inner.bytes_pending += sdu.len();
        inner.items.push_back(sdu);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking push; fails immediately with `QueueFull` rather than suspending.
    pub fn try_push(&self, sdu: Vec<u8>) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed || inner.items.len() >= inner.capacity {
            return Err(Error::QueueFull {
                capacity: inner.capacity,
            });
        }
        inner.bytes_pending += sdu.len();
        inner.items.push_back(sdu);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocking pop; suspends the caller until an SDU is available or the queue is closed.
    pub fn pop(&self) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.items.is_empty() {
            inner = self
                .not_empty
                .wait_while(inner, |inner| inner.items.is_empty() && !inner.closed)
                .unwrap();
        }
        let item = inner.items.pop_front();
        if let Some(item) = &item {
            inner.bytes_pending = inner.bytes_pending.saturating_sub(item.len());
        }
        drop(inner);
        self.not_full.notify_one();
        item
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        let item = inner.items.pop_front();
        if let Some(item) = &item {
            inner.bytes_pending = inner.bytes_pending.saturating_sub(item.len());
        }
        drop(inner);
        self.not_full.notify_one();
        item
    }

    /// Push an SDU back onto the front of the queue. Used by the Tx engine's read-grant path to
    /// return an SDU it popped but could not fit into the current PDU, bypassing the capacity
    /// check since the byte was already accounted for when it was originally enqueued.
    pub fn push_front(&self, sdu: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.bytes_pending += sdu.len();
        inner.items.push_front(sdu);
        drop(inner);
        self.not_empty.notify_one();
    }

    /// Size of the head element without dequeuing it, used by the Tx engine to check whether a
    /// MAC grant can fit the next SDU.
    pub fn front_bytes(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.items.front().map(Vec::len).unwrap_or(0)
    }

    pub fn bytes_pending(&self) -> usize {
        self.inner.lock().unwrap().bytes_pending
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all queued SDUs and zero the byte counter; recovery from corruption.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.items.clear();
        inner.bytes_pending = 0;
        drop(inner);
        self.not_full.notify_all();
    }

    /// Wake every blocked writer so it returns without enqueuing, per the `stop()` cancellation
    /// contract (§5): subsequent `push` calls fail fast instead of blocking.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        drop(inner);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn push_pop_preserves_order_and_bytes() {
        let q = SduQueue::new(4);
        q.push(vec![0u8; 10]).unwrap();
        q.push(vec![0u8; 20]).unwrap();
        assert_eq!(q.bytes_pending(), 30);
        assert_eq!(q.pop().unwrap().len(), 10);
        assert_eq!(q.bytes_pending(), 20);
        assert_eq!(q.pop().unwrap().len(), 20);
        assert_eq!(q.bytes_pending(), 0);
    }

    #[test]
    fn try_push_fails_when_full() {
        let q = SduQueue::new(1);
        q.try_push(vec![1]).unwrap();
        assert!(matches!(
            q.try_push(vec![2]),
            Err(Error::QueueFull { capacity: 1 })
        ));
    }

    #[test]
    fn try_pop_on_empty_returns_none() {
        let q = SduQueue::new(4);
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn blocking_push_wakes_on_pop() {
        let q = Arc::new(SduQueue::new(1));
        q.push(vec![1]).unwrap();

        let q2 = q.clone();
        let writer = thread::spawn(move || {
            q2.push(vec![2, 2]).unwrap();
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.pop().unwrap(), vec![1]);
        writer.join().unwrap();
        assert_eq!(q.pop().unwrap(), vec![2, 2]);
    }

    #[test]
    fn close_wakes_blocked_writer_with_error() {
        let q = Arc::new(SduQueue::new(1));
        q.push(vec![1]).unwrap();

        let q2 = q.clone();
        let writer = thread::spawn(move || q2.push(vec![2, 2]));

        thread::sleep(Duration::from_millis(20));
        q.close();
        assert!(writer.join().unwrap().is_err());
    }

    #[test]
    fn reset_clears_items_and_bytes() {
        let q = SduQueue::new(4);
        q.push(vec![0u8; 5]).unwrap();
        q.reset();
        assert_eq!(q.bytes_pending(), 0);
        assert_eq!(q.len(), 0);
    }
}
