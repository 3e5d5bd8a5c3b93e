//! Wire flyweights for the transport's Status Message, NAK, and Data frame
//! headers.
//!
//! Wire-codec flyweights are an external collaborator, but Status Message
//! and NAK frames must be byte-exact on the wire, and heartbeat detection
//! reads the frame-length field directly. This module provides just enough
//! of the flyweight pattern `aeron-rs` uses for its driver command messages
//! (`command::flyweight::Flyweight`,
//! `command::publication_message::PublicationMessageDefn`) to build and
//! read those three frame types over an `AtomicBuffer`.

use std::marker::PhantomData;
use std::mem::size_of;

use crate::concurrent::term_rebuilder::HEADER_LENGTH;
use crate::concurrent::AtomicBuffer;
use crate::util::{IndexT, Result};

/// Frame type code occupying the Data Header's type field.
pub const HDR_TYPE_DATA: i16 = 1;
/// Frame type code for NAK frames.
pub const HDR_TYPE_NAK: i16 = 2;
/// Frame type code for Status Message frames.
pub const HDR_TYPE_SM: i16 = 3;

/// Flyweight holder: a buffer plus the offset within it that field accesses
/// are relative to.
pub struct Flyweight<A, S>
where
    A: AtomicBuffer,
{
    buffer: A,
    base_offset: IndexT,
    _phantom: PhantomData<S>,
}

impl<A, S> Flyweight<A, S>
where
    A: AtomicBuffer,
    S: Sized,
{
    /// Overlay a new flyweight on `buffer` at `offset`, bounds-checking that
    /// there's room for `S`.
    pub fn new(buffer: A, offset: IndexT) -> Result<Self> {
        buffer.overlay::<S>(offset)?;
        Ok(Flyweight {
            buffer,
            base_offset: offset,
            _phantom: PhantomData,
        })
    }

    fn get_struct(&self) -> &S {
        // UNWRAP: bounds check performed at construction.
        self.buffer.overlay::<S>(self.base_offset).unwrap()
    }

    fn get_struct_mut(&mut self) -> &mut S {
        // UNWRAP: bounds check performed at construction.
        self.buffer.overlay_mut::<S>(self.base_offset).unwrap()
    }

    /// Borrow the underlying buffer, e.g. to hand the encoded frame to a
    /// channel endpoint.
    pub fn buffer(&self) -> &A {
        &self.buffer
    }
}

/// Data frame header:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Frame Length                          |
/// +---------------+-----------------------------------------------+
/// | Ver |  Flags  |               Type                            |
/// +---------------+-----------------------------------------------+
/// |                        Term Offset                            |
/// +---------------------------------------------------------------+
/// |                         Session ID                            |
/// +---------------------------------------------------------------+
/// |                          Stream ID                             |
/// +---------------------------------------------------------------+
/// |                          Term ID                               |
/// +---------------------------------------------------------------+
/// |                      Reserved Value                            |
/// |                                                                 |
/// +-----------------------------------------------------------------+
/// ```
#[repr(C, packed(4))]
pub struct DataHeaderDefn {
    frame_length: i32,
    version: i8,
    flags: i8,
    type_code: i16,
    term_offset: i32,
    session_id: i32,
    stream_id: i32,
    term_id: i32,
    reserved_value: i64,
}

const _: () = assert!(size_of::<DataHeaderDefn>() == HEADER_LENGTH as usize);

/// Flyweight over a received (or to-be-sent) data frame header.
pub type DataHeaderFlyweight<A> = Flyweight<A, DataHeaderDefn>;

impl<A> Flyweight<A, DataHeaderDefn>
where
    A: AtomicBuffer,
{
    /// Frame length, including header. Zero for a heartbeat sentinel.
    pub fn frame_length(&self) -> i32 {
        self.get_struct().frame_length
    }

    /// The term offset this frame was sent at.
    pub fn term_offset(&self) -> i32 {
        self.get_struct().term_offset
    }

    /// The term id this frame belongs to.
    pub fn term_id(&self) -> i32 {
        self.get_struct().term_id
    }
}

/// Status Message frame:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Frame Length                          |
/// +---------------+-----------------------------------------------+
/// | Ver |  Flags  |               Type                            |
/// +---------------+-----------------------------------------------+
/// |                         Session ID                            |
/// +---------------------------------------------------------------+
/// |                          Stream ID                             |
/// +---------------------------------------------------------------+
/// |                  Consumption Term ID                           |
/// +---------------------------------------------------------------+
/// |                Consumption Term Offset                         |
/// +---------------------------------------------------------------+
/// |                  Receiver Window Length                        |
/// +---------------------------------------------------------------+
/// |                        Receiver ID                             |
/// |                                                                 |
/// +-----------------------------------------------------------------+
/// ```
#[repr(C, packed(4))]
pub struct StatusMessageDefn {
    frame_length: i32,
    version: i8,
    flags: i8,
    type_code: i16,
    session_id: i32,
    stream_id: i32,
    consumption_term_id: i32,
    consumption_term_offset: i32,
    receiver_window_length: i32,
    receiver_id: i64,
}

/// Flyweight over a Status Message frame.
pub type StatusMessageFlyweight<A> = Flyweight<A, StatusMessageDefn>;

impl<A> Flyweight<A, StatusMessageDefn>
where
    A: AtomicBuffer,
{
    /// Construct a Status Message at the start of `buffer`.
    pub fn write(
        buffer: A,
        session_id: i32,
        stream_id: i32,
        term_id: i32,
        term_offset: i32,
        receiver_window_length: i32,
    ) -> Result<Self> {
        let mut flyweight = Self::new(buffer, 0)?;
        let defn = flyweight.get_struct_mut();
        defn.frame_length = size_of::<StatusMessageDefn>() as i32;
        defn.version = 0;
        defn.flags = 0;
        defn.type_code = HDR_TYPE_SM;
        defn.session_id = session_id;
        defn.stream_id = stream_id;
        defn.consumption_term_id = term_id;
        defn.consumption_term_offset = term_offset;
        defn.receiver_window_length = receiver_window_length;
        defn.receiver_id = 0;
        Ok(flyweight)
    }

    /// Total length of the encoded frame.
    pub fn length(&self) -> IndexT {
        size_of::<StatusMessageDefn>() as IndexT
    }

    /// The receiver window length advertised by this frame.
    pub fn receiver_window_length(&self) -> i32 {
        self.get_struct().receiver_window_length
    }

    /// The consumption position's term offset advertised by this frame.
    pub fn consumption_term_offset(&self) -> i32 {
        self.get_struct().consumption_term_offset
    }
}

/// NAK frame:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Frame Length                          |
/// +---------------+-----------------------------------------------+
/// | Ver |  Flags  |               Type                            |
/// +---------------+-----------------------------------------------+
/// |                         Session ID                            |
/// +---------------------------------------------------------------+
/// |                          Stream ID                             |
/// +---------------------------------------------------------------+
/// |                          Term ID                               |
/// +---------------------------------------------------------------+
/// |                        Term Offset                             |
/// +---------------------------------------------------------------+
/// |                           Length                                |
/// +-----------------------------------------------------------------+
/// ```
#[repr(C, packed(4))]
pub struct NakDefn {
    frame_length: i32,
    version: i8,
    flags: i8,
    type_code: i16,
    session_id: i32,
    stream_id: i32,
    term_id: i32,
    term_offset: i32,
    length: i32,
}

/// Flyweight over a NAK frame.
pub type NakFlyweight<A> = Flyweight<A, NakDefn>;

impl<A> Flyweight<A, NakDefn>
where
    A: AtomicBuffer,
{
    /// Construct a NAK requesting retransmission of `[term_offset, term_offset + length)`.
    pub fn write(
        buffer: A,
        session_id: i32,
        stream_id: i32,
        term_id: i32,
        term_offset: i32,
        length: i32,
    ) -> Result<Self> {
        let mut flyweight = Self::new(buffer, 0)?;
        let defn = flyweight.get_struct_mut();
        defn.frame_length = size_of::<NakDefn>() as i32;
        defn.version = 0;
        defn.flags = 0;
        defn.type_code = HDR_TYPE_NAK;
        defn.session_id = session_id;
        defn.stream_id = stream_id;
        defn.term_id = term_id;
        defn.term_offset = term_offset;
        defn.length = length;
        Ok(flyweight)
    }

    /// Total length of the encoded frame.
    pub fn length(&self) -> IndexT {
        size_of::<NakDefn>() as IndexT
    }

    /// The term offset a retransmission is being requested for.
    pub fn term_offset(&self) -> i32 {
        self.get_struct().term_offset
    }

    /// The length of the retransmission request.
    pub fn nak_length(&self) -> i32 {
        self.get_struct().length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_round_trips_fields() {
        let sm = StatusMessageFlyweight::write(vec![0u8; 64], 5, 9, 7, 4096, 32768).unwrap();
        assert_eq!(sm.consumption_term_offset(), 4096);
        assert_eq!(sm.receiver_window_length(), 32768);
        assert_eq!(sm.length(), size_of::<StatusMessageDefn>() as IndexT);
    }

    #[test]
    fn nak_round_trips_fields() {
        let nak = NakFlyweight::write(vec![0u8; 64], 5, 9, 7, 4096, 512).unwrap();
        assert_eq!(nak.term_offset(), 4096);
        assert_eq!(nak.nak_length(), 512);
    }
}
