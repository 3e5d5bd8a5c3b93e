//! Image construction configuration.
//!
//! Grounded on `aeron-rs::context::Context`'s constant-backed `Default` impl
//! (`DEFAULT_MEDIA_DRIVER_TIMEOUT_MS`, `DEFAULT_RESOURCE_LINGER_MS`); this
//! crate has no outer surface for a CLI or config file, so no extra crate is
//! pulled in beyond a plain struct.

use crate::util::IndexT;

/// Default window ceiling, in bytes, used when a channel doesn't configure
/// its own.
pub const DEFAULT_WINDOW_LENGTH: IndexT = 128 * 1024;

/// Default time an image may go without a packet before it's considered
/// inactive, and the grace period held in LINGER before reaping.
pub const DEFAULT_IMAGE_LIVENESS_TIMEOUT_NS: u64 = 10_000_000_000;

/// Default delay between first observing a gap and issuing a NAK for it,
/// and between repeat NAKs for a gap that persists.
pub const DEFAULT_NAK_DELAY_NS: i64 = 1_000_000;

/// Configuration used to construct a `PublicationImage`.
#[derive(Debug, Clone, Copy)]
pub struct ImageConfig {
    /// Length, in bytes, of each of the three term buffers. Must be a
    /// positive power of two.
    pub term_length: IndexT,
    /// Ceiling on the advertised flow-control window; the effective window
    /// is also clamped to half the term length.
    pub initial_window_length: IndexT,
    /// Nanoseconds of silence after which an ACTIVE image is considered
    /// INACTIVE, and after which INACTIVE/LINGER transition further.
    pub image_liveness_timeout_ns: u64,
    /// Delay the loss detector's default `GapScanner` waits before (and
    /// between) NAKs for a persisting gap.
    pub nak_delay_ns: i64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        ImageConfig {
            term_length: 16 * 1024 * 1024,
            initial_window_length: DEFAULT_WINDOW_LENGTH,
            image_liveness_timeout_ns: DEFAULT_IMAGE_LIVENESS_TIMEOUT_NS,
            nak_delay_ns: DEFAULT_NAK_DELAY_NS,
        }
    }
}
