//! Lock-free conductor→receiver gap handoff.
//!
//! A seqlock with a version tail only: the conductor is the sole writer and
//! never blocks on the receiver; the receiver detects a torn read by
//! comparing the completion counter it read against the start counter read
//! afterwards, and simply retries on its next call if they disagree.

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

use crate::util::IndexT;

/// Gap descriptor passed from the conductor's loss scan to the receiver's
/// NAK dispatch.
pub struct LossChangeHandoff {
    begin_loss_change: AtomicI64,
    end_loss_change: AtomicI64,
    loss_term_id: AtomicI32,
    loss_term_offset: AtomicI32,
    loss_length: AtomicI32,
}

impl Default for LossChangeHandoff {
    fn default() -> Self {
        LossChangeHandoff {
            begin_loss_change: AtomicI64::new(-1),
            end_loss_change: AtomicI64::new(-1),
            loss_term_id: AtomicI32::new(0),
            loss_term_offset: AtomicI32::new(0),
            loss_length: AtomicI32::new(0),
        }
    }
}

impl LossChangeHandoff {
    /// Create a quiescent handoff (`begin == end == -1`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Conductor-side: publish a newly discovered gap. Called from
    /// `onLossDetected`.
    pub fn publish(&self, term_id: i32, term_offset: IndexT, length: IndexT) {
        let n = self.begin_loss_change.load(Ordering::SeqCst) + 1;
        self.begin_loss_change.store(n, Ordering::SeqCst);

        self.loss_term_id.store(term_id, Ordering::SeqCst);
        self.loss_term_offset.store(term_offset, Ordering::SeqCst);
        self.loss_length.store(length, Ordering::SeqCst);

        self.end_loss_change.store(n, Ordering::SeqCst);
    }

    /// Receiver-side: if a gap has been published since `last_seen`, and the
    /// snapshot taken of it is internally consistent (no concurrent
    /// `publish` tore it), return `Some((change_number, term_id,
    /// term_offset, length))`. Otherwise (nothing new, or a publish raced
    /// the read) returns `None`; the next call retries.
    pub fn poll(&self, last_seen: i64) -> Option<(i64, i32, IndexT, IndexT)> {
        let change = self.end_loss_change.load(Ordering::SeqCst);
        if change == last_seen {
            return None;
        }

        let term_id = self.loss_term_id.load(Ordering::SeqCst);
        let term_offset = self.loss_term_offset.load(Ordering::SeqCst);
        let length = self.loss_length.load(Ordering::SeqCst);

        std::sync::atomic::fence(Ordering::Acquire);

        if self.begin_loss_change.load(Ordering::SeqCst) == change {
            Some((change, term_id, term_offset, length))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiescent_handoff_has_matching_begin_and_end() {
        let handoff = LossChangeHandoff::new();
        assert_eq!(handoff.poll(-1), None);
    }

    #[test]
    fn publish_then_poll_returns_the_descriptor_once() {
        let handoff = LossChangeHandoff::new();
        handoff.publish(7, 4096, 512);

        let (change, term_id, term_offset, length) = handoff.poll(-1).unwrap();
        assert_eq!(term_id, 7);
        assert_eq!(term_offset, 4096);
        assert_eq!(length, 512);

        assert_eq!(handoff.poll(change), None, "no new publish since last_seen");
    }

    #[test]
    fn a_second_publish_is_observed_as_a_new_change() {
        let handoff = LossChangeHandoff::new();
        handoff.publish(7, 0, 32);
        let (change, ..) = handoff.poll(-1).unwrap();

        handoff.publish(7, 64, 32);
        let (change2, _, term_offset, _) = handoff.poll(change).unwrap();
        assert_eq!(term_offset, 64);
        assert!(change2 > change);
    }
}
