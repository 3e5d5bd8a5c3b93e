//! The receiver thread's operations: packet insertion, status-message
//! emission, NAK dispatch, and liveness.

use crate::channel_endpoint::ChannelEndpoint;
use crate::concurrent::loss_detector::LossDetector;
use crate::concurrent::term_buffers::{self, RawLog};
use crate::concurrent::term_rebuilder;
use crate::concurrent::AtomicBuffer;
use crate::control_protocol::{NakFlyweight, StatusMessageFlyweight};
use crate::util::IndexT;

use super::{PublicationImage, Status};

impl<A, L, E, D> PublicationImage<A, L, E, D>
where
    A: AtomicBuffer,
    L: RawLog<A>,
    E: ChannelEndpoint,
    D: LossDetector<A>,
{
    /// Reassemble one received datagram. Always returns `length`; acceptance
    /// is observable only through counters and position advance.
    pub fn insert_packet(
        &mut self,
        term_id: i32,
        term_offset: IndexT,
        src: &[u8],
        length: IndexT,
        now_ns: i64,
    ) -> IndexT {
        let packet_position = term_buffers::compute_position(
            term_id,
            term_offset,
            self.position_bits_to_shift,
            self.initial_term_id,
        );
        let heartbeat = term_rebuilder::is_heartbeat(src, length);
        let proposed_position = if heartbeat {
            packet_position
        } else {
            packet_position + length as i64
        };

        let window_position = self.receiver_hot.last_status_message_position;

        if packet_position < window_position {
            self.counters.incr_flow_control_under_runs();
            return length;
        }

        if proposed_position > window_position + self.current_window_length as i64 {
            self.counters.incr_flow_control_over_runs();
            return length;
        }

        if heartbeat {
            self.counters.incr_heartbeats_received();
        } else {
            let term_index = term_buffers::index_by_position(packet_position, self.position_bits_to_shift);
            let term_buffer = self.raw_log.term_buffer_mut(term_index);
            // UNWRAP: term_offset/length within a term are a caller contract
            // (the channel dispatch layer never hands the image a frame that
            // doesn't fit its own term), not a hot-path fallible condition.
            term_rebuilder::insert(term_buffer, term_offset, src, length).unwrap();
        }

        self.receiver_hot.last_packet_timestamp = now_ns;
        self.hwm_position.propose_max_ordered(proposed_position);

        if self.status() == Status::Init {
            self.transition_to(Status::Active, now_ns);
        }

        length
    }

    /// Send a status message if the advertised position has moved or the
    /// keepalive timeout has elapsed.
    pub fn send_pending_status_message(&mut self, now_ns: i64, sm_timeout_ns: i64) -> i32 {
        if self.status() != Status::Active {
            return 0;
        }

        let sm_pos = self.new_status_message_position.get_volatile();
        let due_for_keepalive =
            now_ns > self.receiver_hot.last_status_message_timestamp + sm_timeout_ns;

        if sm_pos == self.receiver_hot.last_status_message_position && !due_for_keepalive {
            return 0;
        }

        let term_id = term_buffers::compute_term_id_from_position(
            sm_pos,
            self.position_bits_to_shift,
            self.initial_term_id,
        );
        let term_offset = term_buffers::compute_term_offset_from_position(sm_pos, self.term_length_mask);

        // UNWRAP: a freshly allocated 64-byte buffer always has room for a
        // status message defn.
        let frame = StatusMessageFlyweight::write(
            vec![0u8; 64],
            self.session_id,
            self.stream_id,
            term_id,
            term_offset,
            self.current_window_length,
        )
        .unwrap();

        let length = frame.length() as usize;
        self.channel_endpoint
            .send_status_message(self.control_address, &frame.buffer()[..length]);

        self.receiver_hot.last_status_message_timestamp = now_ns;
        self.receiver_hot.last_status_message_position = sm_pos;
        self.counters.incr_status_messages_sent();
        1
    }

    /// Poll the loss-change handoff and, if a fresh gap descriptor is
    /// waiting, send a NAK.
    pub fn process_pending_loss(&mut self) -> i32 {
        match self.loss_change.poll(self.last_change_number) {
            None => 0,
            Some((change, term_id, term_offset, length)) => {
                // UNWRAP: see send_pending_status_message.
                let frame = NakFlyweight::write(
                    vec![0u8; 64],
                    self.session_id,
                    self.stream_id,
                    term_id,
                    term_offset,
                    length,
                )
                .unwrap();

                let frame_length = frame.length() as usize;
                self.channel_endpoint
                    .send_nak_message(self.control_address, &frame.buffer()[..frame_length]);

                self.last_change_number = change;
                self.counters.incr_nak_messages_sent();
                1
            }
        }
    }

    /// Whether a packet has arrived within the liveness timeout.
    pub fn check_for_activity(&self, now_ns: i64) -> bool {
        now_ns - self.receiver_hot.last_packet_timestamp <= self.image_liveness_timeout_ns as i64
    }

    /// If currently ACTIVE, transition to INACTIVE. No-op otherwise.
    pub fn if_active_go_inactive(&mut self, now_ns: i64) {
        if self.status() == Status::Active {
            self.transition_to(Status::Inactive, now_ns);
        }
    }

    /// Reserved hook for round-trip-time measurement. Open question (a):
    /// behavior is undefined upstream; left as a no-op rather than guessed.
    pub fn on_rtt_measurement(&mut self, _rtt_ns: i64, _now_ns: i64) {}
}
