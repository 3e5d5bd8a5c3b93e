//! The UDP channel endpoint collaborator.
//!
//! Sending status messages and NAKs, and detaching from receive dispatch,
//! are owned by the receive-dispatch layer, not the image. The image only
//! ever calls through this trait, the same way `aeron-rs::driver_proxy::DriverProxy`
//! is generic over its ring-buffer collaborator rather than owning a concrete
//! transport.

use std::net::{SocketAddr, UdpSocket};

/// Everything the image needs from its owning channel endpoint.
pub trait ChannelEndpoint {
    /// Send a Status Message frame to `addr`.
    fn send_status_message(&self, addr: SocketAddr, frame: &[u8]);

    /// Send a NAK frame to `addr`.
    fn send_nak_message(&self, addr: SocketAddr, frame: &[u8]);

    /// Detach this image from the receive-dispatch fan-out; called once,
    /// from the conductor, when the image reaches end-of-life.
    fn remove_publication_image(&self);

    /// The channel URI this endpoint was created from, for diagnostics.
    fn original_uri_string(&self) -> &str;
}

/// A `ChannelEndpoint` backed by a real `UdpSocket`.
///
/// Send failures are swallowed: downstream collaborators' failures are
/// either swallowed or reported via their own channels, and the image
/// takes no recovery action.
pub struct UdpChannelEndpoint {
    socket: UdpSocket,
    original_uri: String,
}

impl UdpChannelEndpoint {
    /// Wrap an already-bound socket for use as a channel endpoint.
    pub fn new(socket: UdpSocket, original_uri: String) -> Self {
        UdpChannelEndpoint {
            socket,
            original_uri,
        }
    }
}

impl ChannelEndpoint for UdpChannelEndpoint {
    fn send_status_message(&self, addr: SocketAddr, frame: &[u8]) {
        if let Err(err) = self.socket.send_to(frame, addr) {
            log::debug!("send_status_message to {} failed: {}", addr, err);
        }
    }

    fn send_nak_message(&self, addr: SocketAddr, frame: &[u8]) {
        if let Err(err) = self.socket.send_to(frame, addr) {
            log::debug!("send_nak_message to {} failed: {}", addr, err);
        }
    }

    fn remove_publication_image(&self) {
        log::debug!("removing publication image for {}", self.original_uri);
    }

    fn original_uri_string(&self) -> &str {
        &self.original_uri
    }
}
