//! Gap detection over a term buffer.
//!
//! Scanning the contiguous-frame prefix and deciding when a gap is "real"
//! (persisted past a feedback delay, worth a NAK) is the loss-detector
//! feedback-delay policy, an external collaborator. `LossDetector` is the
//! trait boundary; `GapScanner` is a reasonable default so the crate is
//! testable end to end without wiring in an outside implementation.

use crate::concurrent::term_buffers::{
    compute_term_id_from_position, compute_term_offset_from_position, index_by_position,
};
use crate::concurrent::term_rebuilder::FRAME_ALIGNMENT;
use crate::concurrent::AtomicBuffer;
use crate::util::bit::align;
use crate::util::IndexT;

/// Result of one scan: the new rebuild offset within the term, and how much
/// work (frames walked, gaps noted) was done.
#[derive(Debug, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Offset, within the scanned term, of the new contiguous-prefix boundary.
    pub new_offset: IndexT,
    /// Amount of work performed this scan (frames/gaps observed).
    pub work_count: i32,
}

/// A gap discovery callback: `(term_id, term_offset, length)`.
pub type GapHandler<'a> = dyn FnMut(i32, IndexT, IndexT) + 'a;

/// Scans a term buffer for the contiguous-frame prefix starting at
/// `rebuild_pos`, reporting gaps through a handler once they've persisted
/// past the implementation's feedback delay.
pub trait LossDetector<A: AtomicBuffer> {
    /// Scan `term_buffer` from `rebuild_pos` towards `hwm_pos`. Invokes
    /// `gap_handler` when an actionable gap is first observed or re-observed.
    #[allow(clippy::too_many_arguments)]
    fn scan(
        &mut self,
        term_buffer: &A,
        rebuild_pos: i64,
        hwm_pos: i64,
        now_ns: i64,
        term_length_mask: u64,
        position_bits_to_shift: u32,
        initial_term_id: i32,
        gap_handler: &mut GapHandler,
    ) -> ScanOutcome;
}

struct ActiveGap {
    term_id: i32,
    term_offset: IndexT,
    length: IndexT,
    next_notify_at: i64,
}

/// Default `LossDetector`: walks frame-length headers the way `aeron-rs`'s
/// ring buffer walks record-length headers, treating a zero frame-length
/// word as an unwritten (lost) slot. A gap is reported once it has
/// persisted for `nak_delay_ns`, and again every `nak_delay_ns` while it
/// persists, modeling retry-until-repaired NAK behavior.
pub struct GapScanner {
    nak_delay_ns: i64,
    active_gap: Option<ActiveGap>,
}

impl GapScanner {
    /// Create a scanner that waits `nak_delay_ns` after first observing a
    /// gap before reporting it (and again on each re-observation after the
    /// gap persists another `nak_delay_ns`).
    pub fn new(nak_delay_ns: i64) -> Self {
        GapScanner {
            nak_delay_ns,
            active_gap: None,
        }
    }

    fn note_gap(
        &mut self,
        term_id: i32,
        term_offset: IndexT,
        length: IndexT,
        now_ns: i64,
        gap_handler: &mut GapHandler,
    ) {
        let matches = self
            .active_gap
            .as_ref()
            .is_some_and(|g| g.term_id == term_id && g.term_offset == term_offset && g.length == length);

        if !matches {
            self.active_gap = Some(ActiveGap {
                term_id,
                term_offset,
                length,
                next_notify_at: now_ns + self.nak_delay_ns,
            });
            return;
        }

        let gap = self.active_gap.as_mut().unwrap();
        if now_ns >= gap.next_notify_at {
            gap_handler(term_id, term_offset, length);
            gap.next_notify_at = now_ns + self.nak_delay_ns;
        }
    }
}

impl<A: AtomicBuffer> LossDetector<A> for GapScanner {
    fn scan(
        &mut self,
        term_buffer: &A,
        rebuild_pos: i64,
        hwm_pos: i64,
        now_ns: i64,
        term_length_mask: u64,
        position_bits_to_shift: u32,
        initial_term_id: i32,
        gap_handler: &mut GapHandler,
    ) -> ScanOutcome {
        let term_length = (term_length_mask + 1) as IndexT;
        let start_offset = compute_term_offset_from_position(rebuild_pos, term_length_mask);

        if rebuild_pos >= hwm_pos {
            self.active_gap = None;
            return ScanOutcome {
                new_offset: start_offset,
                work_count: 0,
            };
        }

        let term_id = compute_term_id_from_position(rebuild_pos, position_bits_to_shift, initial_term_id);
        let hwm_term_offset = if index_by_position(hwm_pos, position_bits_to_shift)
            == index_by_position(rebuild_pos, position_bits_to_shift)
        {
            compute_term_offset_from_position(hwm_pos, term_length_mask)
        } else {
            term_length
        };

        let mut offset = start_offset;
        let mut work_count = 0;

        while offset < hwm_term_offset {
            let frame_length = term_buffer.get_i32_volatile(offset).unwrap_or(0);
            if frame_length == 0 {
                let gap_start = offset;
                let mut probe = offset + FRAME_ALIGNMENT;
                while probe < hwm_term_offset
                    && term_buffer.get_i32_volatile(probe).unwrap_or(0) == 0
                {
                    probe += FRAME_ALIGNMENT;
                }
                let gap_length = probe - gap_start;
                work_count += 1;
                self.note_gap(term_id, gap_start, gap_length, now_ns, gap_handler);
                break;
            }

            offset += align(frame_length as usize, FRAME_ALIGNMENT as usize) as IndexT;
            work_count += 1;
        }

        ScanOutcome {
            new_offset: offset,
            work_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrent::term_rebuilder::HEADER_LENGTH;

    fn write_frame(term: &mut Vec<u8>, offset: IndexT, length: IndexT) {
        term.put_i32_ordered(offset, length).unwrap();
    }

    #[test]
    fn contiguous_frames_advance_without_reporting_a_gap() {
        let mut term = vec![0u8; 4096];
        write_frame(&mut term, 0, HEADER_LENGTH);
        write_frame(&mut term, HEADER_LENGTH, HEADER_LENGTH);

        let mut scanner = GapScanner::new(1_000_000);
        let mut fired = false;
        let outcome = scanner.scan(
            &term,
            0,
            (2 * HEADER_LENGTH) as i64,
            0,
            4095,
            12,
            7,
            &mut |_, _, _| fired = true,
        );

        assert_eq!(outcome.new_offset, 2 * HEADER_LENGTH);
        assert!(!fired);
    }

    #[test]
    fn gap_is_reported_only_after_the_delay_elapses() {
        let term = vec![0u8; 4096];
        // Frame at offset 0 is missing; hwm is past it.
        let mut scanner = GapScanner::new(100);
        let mut fire_count = 0;

        let outcome = scanner.scan(&term, 0, 256, 0, 4095, 12, 7, &mut |_, _, _| fire_count += 1);
        assert_eq!(outcome.new_offset, 0);
        assert_eq!(fire_count, 0, "first observation only arms the delay");

        let outcome = scanner.scan(&term, 0, 256, 100, 4095, 12, 7, &mut |_, _, _| fire_count += 1);
        assert_eq!(outcome.new_offset, 0);
        assert_eq!(fire_count, 1, "gap persisted past the delay");

        let outcome = scanner.scan(&term, 0, 256, 150, 4095, 12, 7, &mut |_, _, _| fire_count += 1);
        assert_eq!(outcome.new_offset, 0);
        assert_eq!(fire_count, 1, "retry delay has not elapsed yet");
        let _ = term;
    }
}
