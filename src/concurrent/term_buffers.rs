//! The term buffer trio and stream-position encoding.
//!
//! A monotonic stream position maps to `(term index, term offset)` the same
//! way Aeron's own log buffers do: `termIndex = (pos >> shift) mod 3`,
//! `termOffset = pos & mask`. The three buffers themselves are an external collaborator
//! (the "raw log provider", normally mmap-backed); this module only defines
//! the `RawLog` trait boundary plus an in-memory implementation for tests.

use crate::concurrent::AtomicBuffer;
use crate::util::bit::is_power_of_two;
use crate::util::{ImageError, IndexT, Result};

/// Number of term buffers making up the rotating log.
pub const TERM_COUNT: usize = 3;

/// Compute the 64-bit stream position for `(term_id, term_offset)`.
pub fn compute_position(
    term_id: i32,
    term_offset: IndexT,
    position_bits_to_shift: u32,
    initial_term_id: i32,
) -> i64 {
    let term_count = (term_id - initial_term_id) as i64;
    (term_count << position_bits_to_shift) + term_offset as i64
}

/// Recover the term id that a stream position falls within.
pub fn compute_term_id_from_position(
    position: i64,
    position_bits_to_shift: u32,
    initial_term_id: i32,
) -> i32 {
    ((position >> position_bits_to_shift) as i32).wrapping_add(initial_term_id)
}

/// Recover the offset within a term that a stream position falls at.
pub fn compute_term_offset_from_position(position: i64, term_length_mask: u64) -> IndexT {
    (position & term_length_mask as i64) as IndexT
}

/// Index, modulo the term count, of the buffer a stream position falls in.
pub fn index_by_position(position: i64, position_bits_to_shift: u32) -> usize {
    ((position >> position_bits_to_shift) as usize) % TERM_COUNT
}

/// Index, modulo the term count, of the buffer a given term id occupies,
/// relative to the stream's initial term.
pub fn index_by_term(initial_term_id: i32, term_id: i32) -> usize {
    ((term_id - initial_term_id) as usize) % TERM_COUNT
}

/// `log2(term_length)`; the amount a stream position is shifted to recover
/// a term id.
pub fn position_bits_to_shift(term_length: IndexT) -> Result<u32> {
    if !is_power_of_two(term_length) {
        return Err(ImageError::IllegalArgument);
    }
    Ok((term_length as u32).trailing_zeros())
}

/// Raw log provider: the trio of term buffers backing one publication image.
/// Normally memory-mapped files shared with the sender; out of spec scope to
/// implement here, so this trait is the boundary and `InMemoryRawLog` is
/// provided for tests.
pub trait RawLog<B: AtomicBuffer> {
    /// Shared access to the term buffer at `index` (0..TERM_COUNT).
    fn term_buffer(&self, index: usize) -> &B;

    /// Exclusive access to the term buffer at `index`, for writes.
    fn term_buffer_mut(&mut self, index: usize) -> &mut B;

    /// Length, in bytes, of a single term buffer. Always a power of two.
    fn term_length(&self) -> IndexT;

    /// Release the underlying mapping. Safe to call at most once.
    fn close(&mut self);
}

/// A `Vec<u8>`-backed `RawLog`, used by tests and anywhere a memory-mapped
/// log isn't available.
pub struct InMemoryRawLog {
    buffers: [Vec<u8>; TERM_COUNT],
    term_length: IndexT,
    closed: bool,
}

impl InMemoryRawLog {
    /// Allocate a fresh trio of zeroed term buffers of `term_length` bytes.
    pub fn new(term_length: IndexT) -> Result<Self> {
        if !is_power_of_two(term_length) {
            return Err(ImageError::IllegalArgument);
        }
        Ok(InMemoryRawLog {
            buffers: [
                vec![0u8; term_length as usize],
                vec![0u8; term_length as usize],
                vec![0u8; term_length as usize],
            ],
            term_length,
            closed: false,
        })
    }
}

impl RawLog<Vec<u8>> for InMemoryRawLog {
    fn term_buffer(&self, index: usize) -> &Vec<u8> {
        &self.buffers[index]
    }

    fn term_buffer_mut(&mut self, index: usize) -> &mut Vec<u8> {
        &mut self.buffers[index]
    }

    fn term_length(&self) -> IndexT {
        self.term_length
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

impl InMemoryRawLog {
    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_position() {
        let shift = position_bits_to_shift(65536).unwrap();
        assert_eq!(shift, 16);

        let pos = compute_position(7, 1024, shift, 7);
        assert_eq!(pos, 1024);

        assert_eq!(compute_term_id_from_position(pos, shift, 7), 7);
        assert_eq!(
            compute_term_offset_from_position(pos, (65536i64 - 1) as u64),
            1024
        );
    }

    #[test]
    fn term_index_wraps_every_three_terms() {
        let shift = position_bits_to_shift(65536).unwrap();
        assert_eq!(index_by_term(7, 7), 0);
        assert_eq!(index_by_term(7, 8), 1);
        assert_eq!(index_by_term(7, 9), 2);
        assert_eq!(index_by_term(7, 10), 0);

        let pos_term_10 = compute_position(10, 0, shift, 7);
        assert_eq!(index_by_position(pos_term_10, shift), 0);
    }

    #[test]
    fn rejects_non_power_of_two_term_length() {
        assert!(InMemoryRawLog::new(100).is_err());
        assert!(InMemoryRawLog::new(65536).is_ok());
    }
}
