//! Bounded, condvar-backed ring buffer implementing the `send_data`
//! backpressure contract used by the capture loop (C5).
//!
//! Grounded in the same `parking_lot`-guarded shared-state idiom `neli`
//! uses for its router's dispatch table (`router/synchronous.rs`): a
//! `Mutex`-protected `VecDeque` plus a `Condvar` pair for "has space" and
//! "has data", generalized here from a request/response map to a bounded
//! producer/consumer queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Outcome of a single [`RingBuffer::send_data`] attempt. The rejected
/// variants hand the item back so a caller can retry without cloning.
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome<T> {
    /// Accepted.
    Sent,
    /// No space; caller should park and retry with the returned item.
    WouldBlock(T),
    /// The consumer side is gone; stop producing.
    Closed(T),
}

struct Shared<T> {
    queue: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

/// A bounded SPSC-oriented ring buffer (multiple producers are safe, but
/// this crate only ever has one: the capture thread).
pub struct RingBuffer<T> {
    shared: Mutex<Shared<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(RingBuffer {
            shared: Mutex::new(Shared { queue: VecDeque::with_capacity(capacity), capacity, closed: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    /// Attempt to enqueue `item` without blocking.
    pub fn send_data(&self, item: T) -> SendOutcome<T> {
        let mut guard = self.shared.lock();
        if guard.closed {
            return SendOutcome::Closed(item);
        }
        if guard.queue.len() >= guard.capacity {
            return SendOutcome::WouldBlock(item);
        }
        guard.queue.push_back(item);
        self.not_empty.notify_one();
        SendOutcome::Sent
    }

    /// Park the calling thread until there is space, or until `timeout`
    /// elapses (whichever first). The capture loop's retry uses this
    /// instead of busy-looping on [`SendOutcome::WouldBlock`].
    pub fn wait_for_space(&self, timeout: Duration) {
        let mut guard = self.shared.lock();
        if guard.closed || guard.queue.len() < guard.capacity {
            return;
        }
        self.not_full.wait_for(&mut guard, timeout);
    }

    /// Block until an item is available or the buffer is closed with an
    /// empty queue, then remove and return it.
    pub fn recv(&self) -> Option<T> {
        let mut guard = self.shared.lock();
        loop {
            if let Some(item) = guard.queue.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            self.not_empty.wait(&mut guard);
        }
    }

    /// Mark the buffer closed; wakes any parked producer/consumer.
    pub fn close(&self) {
        let mut guard = self.shared.lock();
        guard.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_up_to_capacity_then_would_block() {
        let rb = RingBuffer::new(2);
        assert_eq!(rb.send_data(1), SendOutcome::Sent);
        assert_eq!(rb.send_data(2), SendOutcome::Sent);
        assert_eq!(rb.send_data(3), SendOutcome::WouldBlock(3));
    }

    #[test]
    fn draining_frees_a_slot() {
        let rb = RingBuffer::new(1);
        assert_eq!(rb.send_data(1), SendOutcome::Sent);
        assert_eq!(rb.send_data(2), SendOutcome::WouldBlock(2));
        assert_eq!(rb.recv(), Some(1));
        assert_eq!(rb.send_data(2), SendOutcome::Sent);
    }

    #[test]
    fn closed_buffer_rejects_sends() {
        let rb = RingBuffer::new(4);
        rb.close();
        assert_eq!(rb.send_data(1), SendOutcome::Closed(1));
    }

    #[test]
    fn closed_empty_buffer_recv_returns_none() {
        let rb: Arc<RingBuffer<i32>> = RingBuffer::new(4);
        rb.close();
        assert_eq!(rb.recv(), None);
    }

    #[test]
    fn delivers_frame_exactly_once_after_backpressure() {
        let rb = RingBuffer::new(1);
        assert_eq!(rb.send_data("a"), SendOutcome::Sent);
        // Simulate three WouldBlock retries before the consumer drains;
        // the item must survive every retry, not just the final attempt.
        assert_eq!(rb.send_data("b"), SendOutcome::WouldBlock("b"));
        assert_eq!(rb.send_data("b"), SendOutcome::WouldBlock("b"));
        assert_eq!(rb.send_data("b"), SendOutcome::WouldBlock("b"));
        assert_eq!(rb.recv(), Some("a"));
        assert_eq!(rb.send_data("b"), SendOutcome::Sent);
        assert_eq!(rb.recv(), Some("b"));
    }
}
