//! Flow-control window sizing.
//!
//! The hook for an actual congestion-control policy is deliberately out of
//! scope and stays inert here; this module only derives the advertised
//! receiver window and its hysteresis gain from the term length and a
//! configured ceiling.

use crate::util::IndexT;

/// Derived receiver flow-control window: a length, advertised to the
/// sender, and a gain constant governing status-message hysteresis
/// (`length / 4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControlWindow {
    /// `min(term_length / 2, configured_window)`.
    pub length: IndexT,
    /// `length / 4`.
    pub gain: IndexT,
}

impl FlowControlWindow {
    /// Derive a window from a term length and the configured window ceiling.
    pub fn new(term_length: IndexT, configured_window: IndexT) -> Self {
        let length = (term_length / 2).min(configured_window);
        FlowControlWindow {
            length,
            gain: length / 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_clamped_to_half_the_term() {
        let window = FlowControlWindow::new(65536, 32768);
        assert_eq!(window.length, 32768);
        assert_eq!(window.gain, 8192);
    }

    #[test]
    fn configured_window_can_be_the_binding_constraint() {
        let window = FlowControlWindow::new(65536, 1024);
        assert_eq!(window.length, 1024);
        assert_eq!(window.gain, 256);
    }
}
