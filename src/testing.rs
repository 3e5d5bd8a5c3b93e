//! Test-only collaborator implementations, used by this crate's own unit
//! tests and by integration tests under `tests/`.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use crate::channel_endpoint::ChannelEndpoint;

#[derive(Default)]
struct Recorded {
    status_messages: Vec<(SocketAddr, Vec<u8>)>,
    naks: Vec<(SocketAddr, Vec<u8>)>,
    removed: bool,
}

/// A cloneable handle onto what a `MockChannelEndpoint` has recorded.
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Rc<RefCell<Recorded>>,
}

impl Recorder {
    /// Number of status messages sent so far.
    pub fn status_message_count(&self) -> usize {
        self.inner.borrow().status_messages.len()
    }

    /// Number of NAKs sent so far.
    pub fn nak_count(&self) -> usize {
        self.inner.borrow().naks.len()
    }

    /// Whether `remove_publication_image` has been called.
    pub fn was_removed(&self) -> bool {
        self.inner.borrow().removed
    }
}

/// A `ChannelEndpoint` that records every send instead of touching the
/// network, so tests can assert on what an image tried to say.
pub struct MockChannelEndpoint {
    recorded: Rc<RefCell<Recorded>>,
    original_uri: String,
}

impl MockChannelEndpoint {
    /// Create a new recording endpoint for `original_uri`.
    pub fn new(original_uri: impl Into<String>) -> Self {
        MockChannelEndpoint {
            recorded: Rc::new(RefCell::new(Recorded::default())),
            original_uri: original_uri.into(),
        }
    }

    /// A cloneable handle to inspect what this endpoint has recorded.
    pub fn recorder(&self) -> Recorder {
        Recorder {
            inner: self.recorded.clone(),
        }
    }
}

impl ChannelEndpoint for MockChannelEndpoint {
    fn send_status_message(&self, addr: SocketAddr, frame: &[u8]) {
        self.recorded.borrow_mut().status_messages.push((addr, frame.to_vec()));
    }

    fn send_nak_message(&self, addr: SocketAddr, frame: &[u8]) {
        self.recorded.borrow_mut().naks.push((addr, frame.to_vec()));
    }

    fn remove_publication_image(&self) {
        self.recorded.borrow_mut().removed = true;
    }

    fn original_uri_string(&self) -> &str {
        &self.original_uri
    }
}
