//! The receiver-side publication image: a reassembly state machine shared
//! by three concurrent actors (receiver, conductor, subscribers) over a
//! single term-buffer trio.
//!
//! The split across `image::{mod, receiver, conductor}` mirrors the actor
//! split itself: `mod.rs` owns construction and the fields every actor
//! touches, `receiver.rs` is the receiver thread's impl block, `conductor.rs`
//! is the conductor thread's.

mod conductor;
mod receiver;

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};

use crate::channel_endpoint::ChannelEndpoint;
use crate::concurrent::flow_control::FlowControlWindow;
use crate::concurrent::loss_change::LossChangeHandoff;
use crate::concurrent::loss_detector::LossDetector;
use crate::concurrent::position::Position;
use crate::concurrent::term_buffers::{self, RawLog};
use crate::concurrent::AtomicBuffer;
use crate::config::ImageConfig;
use crate::counters::ImageCounters;
use crate::util::{ImageError, IndexT, Result};

/// The image's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Constructed, not yet promoted by a valid frame.
    Init = 0,
    /// Receiving and reassembling normally.
    Active = 1,
    /// No packet within the liveness timeout; draining towards LINGER.
    Inactive = 2,
    /// Terminal grace period before reaping.
    Linger = 3,
}

impl Status {
    fn from_u8(value: u8) -> Status {
        match value {
            0 => Status::Init,
            1 => Status::Active,
            2 => Status::Inactive,
            _ => Status::Linger,
        }
    }
}

/// Fields written only by the receiver thread, isolated on their own
/// cacheline so a conductor write to `ConductorHot` never evicts them.
struct ReceiverHot {
    last_packet_timestamp: i64,
    last_status_message_timestamp: i64,
    last_status_message_position: i64,
}

/// Fields written only by the conductor thread.
struct ConductorHot {
    clean_position: i64,
}

/// Receiver-side publication image. Generic over the term-buffer storage
/// (`A`), the raw log provider (`L`), the channel endpoint (`E`), and the
/// loss detector (`D`) so the core reassembly logic has no dependency on
/// sockets, mmap, or a particular loss policy.
pub struct PublicationImage<A, L, E, D>
where
    A: AtomicBuffer,
    L: RawLog<A>,
    E: ChannelEndpoint,
    D: LossDetector<A>,
{
    correlation_id: u64,
    session_id: i32,
    stream_id: i32,
    initial_term_id: i32,
    position_bits_to_shift: u32,
    term_length_mask: u64,
    current_window_length: IndexT,
    current_gain: IndexT,
    image_liveness_timeout_ns: u64,
    control_address: SocketAddr,
    source_address: SocketAddr,

    channel_endpoint: E,
    raw_log: L,
    loss_detector: D,

    hwm_position: Position<Vec<u8>>,
    rebuild_position: Position<Vec<u8>>,

    receiver_hot: crate::util::CachePadded<ReceiverHot>,
    conductor_hot: crate::util::CachePadded<ConductorHot>,
    new_status_message_position: crate::util::CachePadded<Position<Vec<u8>>>,
    loss_change: crate::util::CachePadded<LossChangeHandoff>,

    /// Receiver-local; not shared, so it needs no padding of its own.
    last_change_number: i64,

    status: AtomicU8,
    time_of_last_status_change: AtomicI64,
    reached_end_of_life: AtomicBool,

    subscriber_positions: Vec<crate::concurrent::position::SubscriberHandle>,

    counters: ImageCounters,

    /// `A` is the term-buffer storage type shared by `L: RawLog<A>` and
    /// `D: LossDetector<A>`; it never appears in a field directly, so this
    /// marker ties it to the struct for the borrow checker.
    _term_buffer_storage: PhantomData<fn() -> A>,
}

impl<A, L, E, D> PublicationImage<A, L, E, D>
where
    A: AtomicBuffer,
    L: RawLog<A>,
    E: ChannelEndpoint,
    D: LossDetector<A>,
{
    /// Construct an image in `INIT` at `(initial_term_id, initial_term_offset)`.
    ///
    /// Validates that the raw log's term length is a positive power of two
    /// and that `config.initial_window_length` is positive; both are
    /// construction-time contract preconditions, checked here rather than
    /// left as undefined arithmetic.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        correlation_id: u64,
        session_id: i32,
        stream_id: i32,
        initial_term_id: i32,
        initial_term_offset: IndexT,
        control_address: SocketAddr,
        source_address: SocketAddr,
        config: &ImageConfig,
        raw_log: L,
        channel_endpoint: E,
        loss_detector: D,
        now_ns: i64,
    ) -> Result<Self> {
        let term_length = raw_log.term_length();
        let position_bits_to_shift = term_buffers::position_bits_to_shift(term_length)?;

        if config.initial_window_length <= 0 {
            log::warn!(
                "image {} rejected: non-positive initial window length {}",
                correlation_id,
                config.initial_window_length
            );
            return Err(ImageError::IllegalArgument);
        }

        let term_length_mask = (term_length as u64) - 1;
        let window = FlowControlWindow::new(term_length, config.initial_window_length);

        let initial_position = term_buffers::compute_position(
            initial_term_id,
            initial_term_offset,
            position_bits_to_shift,
            initial_term_id,
        );

        // Open question (c): preserved exactly so the first status message,
        // sent before the conductor's first `track_rebuild`, advertises
        // `initial_position - gain - 1`.
        let new_sm_initial = initial_position - window.gain as i64 - 1;

        log::debug!(
            "image {} constructed: session={} stream={} term={} initial_position={}",
            correlation_id,
            session_id,
            stream_id,
            initial_term_id,
            initial_position
        );

        Ok(PublicationImage {
            correlation_id,
            session_id,
            stream_id,
            initial_term_id,
            position_bits_to_shift,
            term_length_mask,
            current_window_length: window.length,
            current_gain: window.gain,
            image_liveness_timeout_ns: config.image_liveness_timeout_ns,
            control_address,
            source_address,
            channel_endpoint,
            raw_log,
            loss_detector,
            hwm_position: Position::new(vec![0u8; 8], 0, initial_position),
            rebuild_position: Position::new(vec![0u8; 8], 0, initial_position),
            receiver_hot: crate::util::CachePadded::new(ReceiverHot {
                last_packet_timestamp: now_ns,
                last_status_message_timestamp: now_ns,
                last_status_message_position: initial_position,
            }),
            conductor_hot: crate::util::CachePadded::new(ConductorHot {
                clean_position: initial_position,
            }),
            new_status_message_position: crate::util::CachePadded::new(Position::new(
                vec![0u8; 8],
                0,
                new_sm_initial,
            )),
            loss_change: crate::util::CachePadded::new(LossChangeHandoff::new()),
            last_change_number: -1,
            status: AtomicU8::new(Status::Init as u8),
            time_of_last_status_change: AtomicI64::new(now_ns),
            reached_end_of_life: AtomicBool::new(false),
            subscriber_positions: Vec::new(),
            counters: ImageCounters::new(),
            _term_buffer_storage: PhantomData,
        })
    }

    fn transition_to(&self, new: Status, now_ns: i64) {
        self.status.store(new as u8, Ordering::SeqCst);
        self.time_of_last_status_change.store(now_ns, Ordering::SeqCst);
        log::debug!("image {} -> {:?}", self.correlation_id, new);
    }

    /// Current lifecycle state.
    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Force a transition. Exposed to the conductor as an explicit
    /// `status(new)` setter; in-band transitions (INIT→ACTIVE,
    /// ACTIVE→INACTIVE, INACTIVE→LINGER) happen automatically from
    /// `insert_packet`, `if_active_go_inactive`, and `on_time_event`.
    pub fn set_status(&mut self, new: Status, now_ns: i64) {
        self.transition_to(new, now_ns);
    }

    /// Nanosecond timestamp of the most recent state transition.
    pub fn time_of_last_status_change(&self) -> i64 {
        self.time_of_last_status_change.load(Ordering::SeqCst)
    }

    /// Open question (b): the source's `timeOfLastStateChange(time)` setter
    /// deliberately does nothing; preserved as a documented no-op rather
    /// than guessed at.
    pub fn set_time_of_last_state_change(&self, _now_ns: i64) {}

    /// Correlation id this image was registered under.
    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    /// Publisher session id.
    pub fn session_id(&self) -> i32 {
        self.session_id
    }

    /// Stream id within the channel.
    pub fn stream_id(&self) -> i32 {
        self.stream_id
    }

    /// Address status messages and NAKs are sent to.
    pub fn control_address(&self) -> SocketAddr {
        self.control_address
    }

    /// Address data frames are received from.
    pub fn source_address(&self) -> SocketAddr {
        self.source_address
    }

    /// The advertised flow-control window length.
    pub fn current_window_length(&self) -> IndexT {
        self.current_window_length
    }

    /// The hysteresis gain derived from the window length.
    pub fn current_gain(&self) -> IndexT {
        self.current_gain
    }

    /// The contiguous reconstructed prefix, as last advanced by the
    /// conductor's `track_rebuild`.
    pub fn rebuild_position(&self) -> i64 {
        self.rebuild_position.get()
    }

    /// The highest position at which a frame start has been observed.
    pub fn hwm_position(&self) -> i64 {
        self.hwm_position.get_volatile()
    }

    /// Number of subscribers currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_positions.len()
    }

    /// Per-image counters (heartbeats, status messages, NAKs, over/under-runs).
    pub fn counters(&self) -> &ImageCounters {
        &self.counters
    }

    /// Whether the conductor's reaper may now destroy this image.
    pub fn has_reached_end_of_life(&self) -> bool {
        self.reached_end_of_life.load(Ordering::SeqCst)
    }

    /// The channel this image's endpoint was created from, for diagnostics.
    pub fn original_uri_string(&self) -> &str {
        self.channel_endpoint.original_uri_string()
    }
}
