//! Per-image counters.
//!
//! A system-wide counter registry is an external collaborator; this crate
//! keeps the counters its scenario tests need to observe (drops, NAKs,
//! heartbeats, status messages) local to the image rather than wiring up a
//! shared registry.

use std::sync::atomic::{AtomicI64, Ordering};

/// Counters incremented on the receiver thread as packets are processed.
#[derive(Default)]
pub struct ImageCounters {
    heartbeats_received: AtomicI64,
    status_messages_sent: AtomicI64,
    nak_messages_sent: AtomicI64,
    flow_control_under_runs: AtomicI64,
    flow_control_over_runs: AtomicI64,
}

impl ImageCounters {
    /// Zeroed counters for a newly constructed image.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr_heartbeats_received(&self) {
        self.heartbeats_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_status_messages_sent(&self) {
        self.status_messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_nak_messages_sent(&self) {
        self.nak_messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_flow_control_under_runs(&self) {
        self.flow_control_under_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_flow_control_over_runs(&self) {
        self.flow_control_over_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Heartbeats accepted since construction.
    pub fn heartbeats_received(&self) -> i64 {
        self.heartbeats_received.load(Ordering::Relaxed)
    }

    /// Status messages sent since construction.
    pub fn status_messages_sent(&self) -> i64 {
        self.status_messages_sent.load(Ordering::Relaxed)
    }

    /// NAKs sent since construction.
    pub fn nak_messages_sent(&self) -> i64 {
        self.nak_messages_sent.load(Ordering::Relaxed)
    }

    /// Packets dropped for arriving below the flow-control window.
    pub fn flow_control_under_runs(&self) -> i64 {
        self.flow_control_under_runs.load(Ordering::Relaxed)
    }

    /// Packets dropped for arriving above the flow-control window.
    pub fn flow_control_over_runs(&self) -> i64 {
        self.flow_control_over_runs.load(Ordering::Relaxed)
    }
}
