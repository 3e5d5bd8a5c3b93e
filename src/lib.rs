//! Receiver-side publication image for an unreliable unicast/multicast
//! transport: reassembles an ordered byte-stream from unreliable datagrams,
//! tracks flow-control windows across local subscribers, detects and
//! requests retransmission of lost ranges, and manages the image lifecycle
//! from first packet to garbage collection.
#![deny(missing_docs)]

#[cfg(target_endian = "big")]
compile_error!("the image's position encoding assumes little-endian atomics");

pub mod channel_endpoint;
pub mod concurrent;
pub mod config;
pub mod control_protocol;
pub mod counters;
pub mod image;
pub mod testing;
pub mod util;
