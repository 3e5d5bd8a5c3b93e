//! The conductor thread's operations: rebuild tracking, buffer hygiene,
//! subscriber management, and lifecycle transitions.

use std::sync::atomic::Ordering;

use crate::channel_endpoint::ChannelEndpoint;
use crate::concurrent::loss_detector::LossDetector;
use crate::concurrent::position::{ReadablePosition, SubscriberHandle};
use crate::concurrent::term_buffers::{self, RawLog};
use crate::concurrent::AtomicBuffer;

use super::{PublicationImage, Status};

impl<A, L, E, D> PublicationImage<A, L, E, D>
where
    A: AtomicBuffer,
    L: RawLog<A>,
    E: ChannelEndpoint,
    D: LossDetector<A>,
{
    /// `None` if no subscriber is attached; otherwise `(min, max)` of every
    /// subscriber's volatile position.
    fn fold_subscriber_positions(&self) -> Option<(i64, i64)> {
        let mut positions = self.subscriber_positions.iter().map(|s| s.get_volatile());
        let first = positions.next()?;
        Some(positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    /// Drive the loss detector and advance `rebuild_position`.
    pub fn track_rebuild(&mut self, now_ns: i64) -> i32 {
        let (min_sub, max_sub) = self
            .fold_subscriber_positions()
            .unwrap_or_else(|| (self.rebuild_position.get(), self.rebuild_position.get()));

        let gain = self.current_gain as i64;
        if min_sub > self.new_status_message_position.get_volatile() + gain {
            self.new_status_message_position.set_ordered(min_sub);
            let term_length = self.raw_log.term_length() as i64;
            self.clean_buffer_to(min_sub - term_length);
        }

        let rebuild_pos = self.rebuild_position.get().max(max_sub);
        let hwm_pos = self.hwm_position.get_volatile();

        let term_index = term_buffers::index_by_position(rebuild_pos, self.position_bits_to_shift);

        // `loss_change` and `raw_log` are disjoint fields: the gap handler
        // below only ever touches the former, the scan only the latter, so
        // holding a shared borrow of each at once is sound.
        let loss_change = &self.loss_change;
        let term_buffer = self.raw_log.term_buffer(term_index);
        let mut gap_handler = |term_id: i32, term_offset: crate::util::IndexT, length: crate::util::IndexT| {
            loss_change.publish(term_id, term_offset, length);
        };

        let outcome = self.loss_detector.scan(
            term_buffer,
            rebuild_pos,
            hwm_pos,
            now_ns,
            self.term_length_mask,
            self.position_bits_to_shift,
            self.initial_term_id,
            &mut gap_handler,
        );

        let term_start =
            rebuild_pos - term_buffers::compute_term_offset_from_position(rebuild_pos, self.term_length_mask) as i64;
        let new_rebuild_position = term_start + outcome.new_offset as i64;
        self.rebuild_position.propose_max_ordered(new_rebuild_position);

        outcome.work_count
    }

    /// Zero the trailing region up to `min(target, end-of-current-term)`,
    /// bounding the work done per call so steady-state zeroing is cheap per
    /// tick. Called from `track_rebuild`, repeatedly across ticks, until
    /// `clean_position` reaches `target`.
    fn clean_buffer_to(&mut self, target: i64) {
        let clean_position = self.conductor_hot.clean_position;
        if clean_position >= target {
            return;
        }

        let term_length = self.raw_log.term_length() as i64;
        let term_index = term_buffers::index_by_position(clean_position, self.position_bits_to_shift);
        let term_offset = term_buffers::compute_term_offset_from_position(clean_position, self.term_length_mask);
        let bytes_to_zero = (target - clean_position).min(term_length - term_offset as i64);
        if bytes_to_zero <= 0 {
            return;
        }

        let term_buffer = self.raw_log.term_buffer_mut(term_index);
        // UNWRAP: the range just computed is within [0, term_length) by
        // construction.
        term_buffer
            .set_memory(term_offset, bytes_to_zero as usize, 0)
            .unwrap();

        self.conductor_hot.clean_position = clean_position + bytes_to_zero;
    }

    /// Drive INACTIVE→LINGER and LINGER→end-of-life transitions. INIT→ACTIVE
    /// and ACTIVE→INACTIVE are receiver-driven and happen in
    /// `insert_packet`/`if_active_go_inactive`.
    pub fn on_time_event(&mut self, now_ns: i64) {
        let timed_out =
            now_ns - self.time_of_last_status_change() > self.image_liveness_timeout_ns as i64;

        match self.status() {
            Status::Inactive => {
                if self.is_drained() || timed_out {
                    self.transition_to(Status::Linger, now_ns);
                }
            }
            Status::Linger => {
                if timed_out {
                    self.reached_end_of_life.store(true, Ordering::SeqCst);
                }
            }
            Status::Init | Status::Active => {}
        }
    }

    /// Whether every subscriber has consumed up to `rebuild_position`. An
    /// image with no subscribers is vacuously drained.
    pub fn is_drained(&self) -> bool {
        match self.fold_subscriber_positions() {
            None => true,
            Some((min_sub, _)) => min_sub >= self.rebuild_position.get(),
        }
    }

    /// Attach a new subscriber. The subscriber array is replaced wholesale
    /// with a fresh copy carrying the addition, rather than mutated in
    /// place, so a concurrent reader never observes a partially updated array.
    pub fn add_subscriber(&mut self, position: SubscriberHandle) {
        let mut updated = Vec::with_capacity(self.subscriber_positions.len() + 1);
        updated.extend(self.subscriber_positions.iter().cloned());
        updated.push(position);
        self.subscriber_positions = updated;
    }

    /// Detach a subscriber previously added with `add_subscriber`, again by
    /// swapping in a freshly built array rather than mutating in place.
    pub fn remove_subscriber(&mut self, position: &SubscriberHandle) {
        self.subscriber_positions = self
            .subscriber_positions
            .iter()
            .filter(|p| !p.same_counter(position))
            .cloned()
            .collect();
    }

    /// Detach from dispatch and release every resource. Safe to call
    /// exactly once, after `has_reached_end_of_life()` is true.
    pub fn delete(&mut self) {
        self.channel_endpoint.remove_publication_image();
        self.hwm_position.close();
        self.rebuild_position.close();
        self.new_status_message_position.close();
        self.raw_log.close();
        log::debug!("image {} deleted", self.correlation_id);
    }
}
