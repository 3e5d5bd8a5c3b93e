//! Monotonic position counters.
//!
//! These model shared memory-mapped counters; external processes may
//! observe them, so they are backed by `AtomicBuffer` at a fixed offset
//! rather than a bare `AtomicI64`, the same way `aeron-rs`'s ring buffer
//! trailer keeps its head/tail counters as offsets into a shared buffer
//! (`concurrent::ringbuffer::buffer_descriptor::{HEAD_POSITION_OFFSET,
//! TAIL_POSITION_OFFSET}`).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::concurrent::AtomicBuffer;
use crate::util::IndexT;

/// A single 64-bit monotonic counter with ordered/volatile access and a
/// wait-free "propose if greater" update. Every counter in the image
/// (`hwm_position`, `rebuild_position`, each subscriber position,
/// `clean_position`, `last_status_message_position`,
/// `new_status_message_position`) is one of these.
pub struct Position<A: AtomicBuffer> {
    buffer: A,
    offset: IndexT,
    closed: bool,
}

impl<A: AtomicBuffer> Position<A> {
    /// Wrap a counter at `offset` within `buffer`, initializing it to `initial`.
    pub fn new(mut buffer: A, offset: IndexT, initial: i64) -> Self {
        // UNWRAP: caller is responsible for providing a buffer with room for
        // an i64 at `offset`; this is a construction-time contract, not a
        // hot-path fallible operation.
        buffer.put_i64(offset, initial).unwrap();
        Position {
            buffer,
            offset,
            closed: false,
        }
    }

    /// Plain (unordered) read of the current value.
    pub fn get(&self) -> i64 {
        // UNWRAP: offset was bounds-checked at construction.
        self.buffer.get_i64(self.offset).unwrap()
    }

    /// Volatile (acquire) read of the current value.
    pub fn get_volatile(&self) -> i64 {
        self.buffer.get_i64_volatile(self.offset).unwrap()
    }

    /// Ordered (release) store of a new value. The caller is the counter's
    /// sole writer; no compare-and-swap is needed.
    pub fn set_ordered(&mut self, value: i64) {
        self.buffer.put_i64_ordered(self.offset, value).unwrap();
    }

    /// Ordered store of `value` iff it is greater than the current value.
    /// Returns whether the value advanced.
    pub fn propose_max_ordered(&mut self, value: i64) -> bool {
        if value > self.get_volatile() {
            self.set_ordered(value);
            true
        } else {
            false
        }
    }

    /// Mark the counter closed. Idempotent; further reads/writes after close
    /// are a caller error but are not guarded on the hot path (the conductor
    /// reaper is the only caller, and it calls `close` at most once per image).
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// An in-memory counter, used standalone (each counter gets its own small
/// backing buffer) rather than packed into a shared counters file. Production
/// assembly wiring the image into a counters-manager-backed process can
/// supply `Position<MmapMut>`-equivalent buffers instead; the image itself is
/// generic over `A: AtomicBuffer` and does not care which.
pub fn standalone(initial: i64) -> Position<Vec<u8>> {
    Position::new(vec![0u8; 8], 0, initial)
}

/// A read-only view of a subscriber's position, as held by the image's
/// copy-on-write subscriber array.
pub trait ReadablePosition: Send + Sync {
    /// Volatile read of the subscriber's current position.
    fn get_volatile(&self) -> i64;
}

/// A subscriber's own position counter. Genuinely shared across threads
/// (the subscriber's consumer thread writes it; the conductor reads it), so
/// unlike `Position<A>` this is backed by a real `AtomicI64` rather than a
/// volatile buffer read/write.
#[derive(Clone)]
pub struct SubscriberCounter {
    inner: Arc<AtomicI64>,
}

impl SubscriberCounter {
    /// Create a new subscriber counter at `initial`.
    pub fn new(initial: i64) -> Self {
        SubscriberCounter {
            inner: Arc::new(AtomicI64::new(initial)),
        }
    }

    /// Subscriber-side: advance this subscriber's read position.
    pub fn set_ordered(&self, value: i64) {
        self.inner.store(value, Ordering::SeqCst);
    }

    /// A cloneable handle the image can hold in its subscriber array without
    /// granting write access.
    pub fn handle(&self) -> SubscriberHandle {
        SubscriberHandle {
            inner: self.inner.clone(),
        }
    }
}

/// Read-only handle to a `SubscriberCounter`, held by the image.
#[derive(Clone)]
pub struct SubscriberHandle {
    inner: Arc<AtomicI64>,
}

impl ReadablePosition for SubscriberHandle {
    fn get_volatile(&self) -> i64 {
        self.inner.load(Ordering::SeqCst)
    }
}

impl SubscriberHandle {
    /// Whether `self` and `other` refer to the same underlying counter,
    /// used by the subscriber-positions array to find an entry to remove.
    pub fn same_counter(&self, other: &SubscriberHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::standalone;

    #[test]
    fn propose_max_advances_only_forward() {
        let mut pos = standalone(10);
        assert!(!pos.propose_max_ordered(5));
        assert_eq!(pos.get(), 10);

        assert!(pos.propose_max_ordered(20));
        assert_eq!(pos.get_volatile(), 20);

        assert!(!pos.propose_max_ordered(20));
    }

    #[test]
    fn close_is_idempotent() {
        let mut pos = standalone(0);
        assert!(!pos.is_closed());
        pos.close();
        pos.close();
        assert!(pos.is_closed());
    }

    #[test]
    fn subscriber_handle_observes_owner_writes() {
        use super::{ReadablePosition, SubscriberCounter};

        let counter = SubscriberCounter::new(0);
        let handle = counter.handle();
        assert_eq!(handle.get_volatile(), 0);

        counter.set_ordered(4096);
        assert_eq!(handle.get_volatile(), 4096);
    }
}
