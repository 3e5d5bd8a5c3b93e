//! Writing received frames into a term buffer, and heartbeat detection.
//!
//! A term buffer distinguishes a written frame from unwritten (zeroed)
//! memory by the frame-length field at its start being non-zero. The
//! rebuilder therefore writes the frame body first, and publishes the
//! length field last with release-ordered semantics; a reader who observes
//! `hwmPosition` past a frame is guaranteed to see the frame's full payload.

use crate::concurrent::AtomicBuffer;
use crate::util::{IndexT, Result};

/// Length, in bytes, of a frame header. The frame-length field occupies the
/// first four bytes of it.
pub const HEADER_LENGTH: IndexT = 32;

/// Frames are aligned to this boundary within a term.
pub const FRAME_ALIGNMENT: IndexT = 32;

/// A received frame is a heartbeat (a zero-length data frame that
/// advertises position without payload) iff its wire length equals the
/// header length and its frame-length field reads zero.
pub fn is_heartbeat(src: &[u8], length: IndexT) -> bool {
    length == HEADER_LENGTH && src.len() >= 4 && src[0..4] == [0, 0, 0, 0]
}

/// Write a received frame into a term buffer at `term_offset`.
///
/// Writes everything past the frame-length field first, then commits the
/// length field itself with an ordered (release) store, so a thread
/// observing `hwm_position` advance past this frame also observes a
/// complete, consistent payload.
pub fn insert<A: AtomicBuffer>(
    term_buffer: &mut A,
    term_offset: IndexT,
    src: &[u8],
    length: IndexT,
) -> Result<()> {
    if length > 4 {
        term_buffer.put_slice(term_offset + 4, src, 4, length - 4)?;
    }

    let frame_length = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    term_buffer.put_i32_ordered(term_offset, frame_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_has_header_length_and_zero_frame_length() {
        let mut frame = vec![0u8; HEADER_LENGTH as usize];
        assert!(is_heartbeat(&frame, HEADER_LENGTH));

        frame[0] = 1;
        assert!(!is_heartbeat(&frame, HEADER_LENGTH));
    }

    #[test]
    fn data_frame_is_never_a_heartbeat() {
        let frame = vec![0u8; (HEADER_LENGTH + FRAME_ALIGNMENT) as usize];
        assert!(!is_heartbeat(&frame, HEADER_LENGTH + FRAME_ALIGNMENT));
    }

    #[test]
    fn insert_writes_payload_before_publishing_length() {
        let mut term = vec![0u8; 256];
        let length = HEADER_LENGTH + 8;
        let mut frame = vec![0u8; length as usize];
        frame[0..4].copy_from_slice(&length.to_le_bytes());
        frame[HEADER_LENGTH as usize..].copy_from_slice(&[7u8; 8]);

        insert(&mut term, 0, &frame, length).unwrap();

        assert_eq!(term.get_i32_volatile(0).unwrap(), length);
        assert_eq!(&term[HEADER_LENGTH as usize..length as usize], &[7u8; 8]);
    }
}
