//! Scenario tests for the receiver-side publication image (spec.md §8).

use std::net::{SocketAddr, UdpSocket};

use publication_image::concurrent::loss_detector::GapScanner;
use publication_image::concurrent::position::SubscriberCounter;
use publication_image::concurrent::term_buffers::InMemoryRawLog;
use publication_image::config::ImageConfig;
use publication_image::image::{PublicationImage, Status};
use publication_image::testing::MockChannelEndpoint;

const HEADER_LENGTH: i32 = 32;

fn addr() -> SocketAddr {
    "127.0.0.1:40001".parse().unwrap()
}

type TestImage = PublicationImage<Vec<u8>, InMemoryRawLog, MockChannelEndpoint, GapScanner>;

fn frame(length: i32) -> Vec<u8> {
    let mut buf = vec![0u8; length as usize];
    buf[0..4].copy_from_slice(&length.to_le_bytes());
    buf
}

fn heartbeat_frame() -> Vec<u8> {
    vec![0u8; HEADER_LENGTH as usize]
}

#[allow(clippy::too_many_arguments)]
fn build_image(term_length: i32, initial_window_length: i32, nak_delay_ns: i64) -> TestImage {
    let _ = env_logger::try_init();

    let config = ImageConfig {
        term_length,
        initial_window_length,
        image_liveness_timeout_ns: 10_000,
        nak_delay_ns,
    };
    let raw_log = InMemoryRawLog::new(term_length).unwrap();
    let endpoint = MockChannelEndpoint::new("aeron:udp?endpoint=localhost:40001");
    let loss_detector = GapScanner::new(nak_delay_ns);

    PublicationImage::new(
        1,
        5,
        9,
        7,
        0,
        addr(),
        addr(),
        &config,
        raw_log,
        endpoint,
        loss_detector,
        0,
    )
    .unwrap()
}

#[test]
fn straight_through_delivery_advances_hwm_and_status_message_position() {
    let mut image = build_image(65536, 32768, 1_000_000);
    assert_eq!(image.current_window_length(), 32768);
    assert_eq!(image.current_gain(), 8192);

    let f = frame(1024);
    let applied = image.insert_packet(7, 0, &f, 1024, 0);
    assert_eq!(applied, 1024);
    assert_eq!(image.hwm_position(), 1024);
    assert_eq!(image.status(), Status::Active);

    let subscriber = SubscriberCounter::new(16384);
    image.add_subscriber(subscriber.handle());

    let work = image.track_rebuild(0);
    assert!(work >= 0);
}

#[test]
fn heartbeat_advances_hwm_without_touching_payload() {
    let mut image = build_image(65536, 32768, 1_000_000);

    let applied = image.insert_packet(7, 2048, &heartbeat_frame(), HEADER_LENGTH, 0);
    assert_eq!(applied, HEADER_LENGTH);
    assert_eq!(image.hwm_position(), 2048);
    assert_eq!(image.counters().heartbeats_received(), 1);
}

#[test]
fn overrun_packet_is_dropped_and_counted() {
    let mut image = build_image(65536, 1024, 1_000_000);

    let f = frame(1500);
    let applied = image.insert_packet(7, 0, &f, 1500, 0);
    assert_eq!(applied, 1500, "insert_packet always returns length");
    assert_eq!(image.counters().flow_control_over_runs(), 1);
    assert_eq!(image.hwm_position(), 0, "dropped packet must not advance hwm");
}

#[test]
fn underrun_packet_is_dropped_and_counted() {
    let mut image = build_image(65536, 32768, 1_000_000);

    // Advance the receiver's notion of the window past the packet's position.
    let f = frame(4096 + HEADER_LENGTH);
    image.insert_packet(7, 0, &f, 4096 + HEADER_LENGTH, 0);

    // Manufacture an already-acknowledged window by sending a status message
    // off a subscriber that has already consumed ahead.
    let subscriber = SubscriberCounter::new(4096);
    image.add_subscriber(subscriber.handle());
    image.track_rebuild(0);
    image.send_pending_status_message(0, 1_000_000_000);

    let late = frame(256);
    let applied = image.insert_packet(7, 2048, &late, 256, 1);
    assert_eq!(applied, 256);
    assert_eq!(image.counters().flow_control_under_runs(), 1);
}

#[test]
fn loss_nak_is_idempotent_until_a_new_gap_is_published() {
    let mut image = build_image(65536, 32768, 0);

    // Write frames at offset 0 and leave a gap at HEADER_LENGTH before the
    // next frame at HEADER_LENGTH * 2, so track_rebuild's scan discovers it.
    let f0 = frame(HEADER_LENGTH);
    image.insert_packet(7, 0, &f0, HEADER_LENGTH, 0);
    let f2 = frame(HEADER_LENGTH);
    image.insert_packet(7, HEADER_LENGTH * 2, &f2, HEADER_LENGTH, 0);

    image.track_rebuild(0);
    // nak_delay_ns is 0, so the gap is reportable the moment it is re-scanned.
    image.track_rebuild(1);

    let first = image.process_pending_loss();
    assert_eq!(first, 1, "a fresh gap descriptor produces exactly one NAK");
    assert_eq!(image.counters().nak_messages_sent(), 1);

    let second = image.process_pending_loss();
    assert_eq!(second, 0, "no new loss descriptor means no further NAK");
    assert_eq!(image.counters().nak_messages_sent(), 1);
}

#[test]
fn lifecycle_drains_through_inactive_linger_and_end_of_life() {
    let mut image = build_image(65536, 32768, 1_000_000);

    let f = frame(1024);
    image.insert_packet(7, 0, &f, 1024, 0);
    assert_eq!(image.status(), Status::Active);

    assert!(!image.check_for_activity(20_000));
    image.if_active_go_inactive(20_000);
    assert_eq!(image.status(), Status::Inactive);

    image.on_time_event(20_000);
    assert_eq!(image.status(), Status::Linger, "no subscribers: vacuously drained");

    assert!(!image.has_reached_end_of_life());
    image.on_time_event(40_001);
    assert!(image.has_reached_end_of_life());

    image.delete();
}

#[test]
fn drained_image_with_no_subscribers_enters_linger_on_next_tick() {
    let mut image = build_image(65536, 32768, 1_000_000);
    let f = frame(1024);
    image.insert_packet(7, 0, &f, 1024, 0);

    image.if_active_go_inactive(20_000);
    assert_eq!(image.status(), Status::Inactive);
    assert!(image.is_drained());

    image.on_time_event(20_000);
    assert_eq!(image.status(), Status::Linger);
}

#[test]
fn status_message_is_sent_to_the_control_address_and_recorded() {
    let mut image = build_image(65536, 32768, 1_000_000);
    let f = frame(1024);
    image.insert_packet(7, 0, &f, 1024, 0);

    let subscriber = SubscriberCounter::new(16384);
    image.add_subscriber(subscriber.handle());
    image.track_rebuild(0);

    let sent = image.send_pending_status_message(0, 1_000_000_000);
    assert_eq!(sent, 1);
    assert_eq!(image.counters().status_messages_sent(), 1);

    // A second call with nothing new and the keepalive timeout not yet
    // elapsed sends nothing.
    let sent_again = image.send_pending_status_message(1, 1_000_000_000);
    assert_eq!(sent_again, 0);
}

#[test]
fn real_udp_channel_endpoint_can_back_an_image() {
    // Exercises UdpChannelEndpoint end-to-end instead of the mock, to prove
    // the ChannelEndpoint trait boundary is real and not just test-shaped.
    use publication_image::channel_endpoint::UdpChannelEndpoint;

    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let endpoint = UdpChannelEndpoint::new(socket, "aeron:udp?endpoint=localhost:40001".into());

    let config = ImageConfig::default();
    let raw_log = InMemoryRawLog::new(config.term_length).unwrap();
    let loss_detector = GapScanner::new(config.nak_delay_ns);

    let mut image: PublicationImage<Vec<u8>, InMemoryRawLog, UdpChannelEndpoint, GapScanner> =
        PublicationImage::new(2, 5, 9, 7, 0, addr(), addr(), &config, raw_log, endpoint, loss_detector, 0)
            .unwrap();

    let f = frame(1024);
    assert_eq!(image.insert_packet(7, 0, &f, 1024, 0), 1024);
    assert_eq!(image.hwm_position(), 1024);
}
