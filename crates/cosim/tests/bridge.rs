//! Two bridged devices connected back to back through the loopback fabric.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;
use cosim::{
    DeviceId, Host, HostError, LinkEndpointConfig, LinkError, LinkEvent, LoopbackChannel, LoopbackFabric,
    MacAddress, NetDevice, NodeId, OutgoingFrame, PacketType, ReceivedFrame, RecordingSink,
    SimConfig, SimTime, SyncMode, TracePoint, ether_type,
};
use cosim_channel::ChannelError;
use test_case::test_case;

const AA: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0, 0xaa]);
const BB: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0, 0xbb]);
const PATH: &str = "/tmp/cosim-bridge-test";

fn ns(n: u64) -> SimTime {
    SimTime::from_nanos(n)
}

type Inbox = Rc<RefCell<Vec<ReceivedFrame>>>;

struct Segment {
    host: Host<LoopbackChannel>,
    trace: Arc<RecordingSink>,
    a: DeviceId,
    b: DeviceId,
    inbox_a: Inbox,
    inbox_b: Inbox,
}

fn link(mode: SyncMode) -> LinkEndpointConfig {
    LinkEndpointConfig::default()
        .with_channel_path(PATH)
        .with_sync_mode(mode)
}

fn attach(
    host: &mut Host<LoopbackChannel>,
    fabric: &Arc<LoopbackFabric>,
    node: u32,
    address: MacAddress,
) -> (DeviceId, Inbox) {
    let id = host.add_device(NodeId::new(node), address, fabric.channel());
    let inbox = Inbox::default();
    let sink = inbox.clone();
    host.device_mut(id)
        .unwrap()
        .set_receive_callback(Box::new(move |frame| sink.borrow_mut().push(frame.clone())));
    (id, inbox)
}

fn segment_with(capacity: usize, config: &LinkEndpointConfig) -> Segment {
    let fabric = LoopbackFabric::new(capacity);
    let trace = Arc::new(RecordingSink::new());
    let mut host = Host::new(SimConfig::default()).with_trace_sink(trace.clone());

    let (a, inbox_a) = attach(&mut host, &fabric, 0, AA);
    let (b, inbox_b) = attach(&mut host, &fabric, 1, BB);
    host.start_device(a, config.clone()).unwrap();
    host.start_device(b, config.clone()).unwrap();

    Segment {
        host,
        trace,
        a,
        b,
        inbox_a,
        inbox_b,
    }
}

fn segment(mode: SyncMode) -> Segment {
    segment_with(1024, &link(mode))
}

fn frame(payload: &'static [u8], destination: MacAddress) -> OutgoingFrame {
    OutgoingFrame::new(Bytes::from_static(payload), destination, ether_type::IPV4)
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn frame_crosses_the_link() {
    let mut s = segment(SyncMode::Synchronized);
    s.host.schedule_send(s.a, ns(1_000), frame(b"P", BB)).unwrap();

    s.host.run_until(ns(5_000)).unwrap();

    let inbox = s.inbox_b.borrow();
    assert_eq!(inbox.len(), 1);
    let received = &inbox[0];
    assert_eq!(received.time, ns(1_500));
    assert_eq!(received.source, AA);
    assert_eq!(received.destination, BB);
    assert_eq!(received.protocol, ether_type::IPV4);
    assert_eq!(received.packet_type, PacketType::Host);
    assert_eq!(&received.payload[..], b"P");

    assert!(s.inbox_a.borrow().is_empty());
    assert_eq!(s.host.device(s.a).unwrap().stats().frames_sent, 1);
    assert_eq!(s.host.device(s.b).unwrap().stats().frames_received, 1);
}

#[test]
fn trace_points_fire_on_both_sides() {
    let mut s = segment(SyncMode::Synchronized);
    s.host.schedule_send(s.a, ns(100), frame(b"hello", BB)).unwrap();
    s.host.run_until(ns(2_000)).unwrap();

    let records = s.trace.records();
    let points: Vec<(TracePoint, &str)> = records
        .iter()
        .map(|r| (r.point, r.context.as_str()))
        .collect();
    assert_eq!(
        points,
        vec![
            (TracePoint::RxFromNetwork, "node/0/device/0"),
            (TracePoint::TxToAdapter, "node/0/device/0"),
            (TracePoint::RxFromAdapter, "node/1/device/0"),
            (TracePoint::TxToNetwork, "node/1/device/0"),
        ]
    );
    assert_eq!(records[0].frame.len(), 5);
    assert_eq!(records[1].frame.len(), 5 + cosim::HEADER_LEN);
}

#[test]
fn replies_flow_back() {
    let mut s = segment(SyncMode::Synchronized);
    s.host.schedule_send(s.a, ns(100), frame(b"ping", BB)).unwrap();
    s.host.schedule_send(s.b, ns(100), frame(b"pong", AA)).unwrap();

    s.host.run_until(ns(1_000)).unwrap();

    assert_eq!(&s.inbox_b.borrow()[0].payload[..], b"ping");
    assert_eq!(&s.inbox_a.borrow()[0].payload[..], b"pong");
    assert_eq!(s.inbox_a.borrow()[0].time, ns(600));
    assert_eq!(s.inbox_b.borrow()[0].time, ns(600));
}

#[test]
fn broadcast_reaches_consumer() {
    let mut s = segment(SyncMode::Synchronized);
    s.host
        .schedule_send(s.a, ns(0), frame(b"who-has", MacAddress::BROADCAST))
        .unwrap();
    s.host.run_until(ns(1_000)).unwrap();

    assert_eq!(s.inbox_b.borrow()[0].packet_type, PacketType::Broadcast);
}

#[test]
fn other_host_reaches_only_promiscuous_observer() {
    let mut s = segment(SyncMode::Synchronized);
    let observed = Inbox::default();
    {
        let sink = observed.clone();
        s.host
            .device_mut(s.b)
            .unwrap()
            .set_promisc_receive_callback(Box::new(move |frame| {
                sink.borrow_mut().push(frame.clone());
            }));
    }

    s.host
        .schedule_send(s.a, ns(0), frame(b"not-yours", MacAddress::local(42)))
        .unwrap();
    s.host.run_until(ns(1_000)).unwrap();

    assert!(s.inbox_b.borrow().is_empty());
    assert_eq!(observed.borrow().len(), 1);
    assert_eq!(observed.borrow()[0].packet_type, PacketType::OtherHost);
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn synchronized_delivery_is_exactly_one_latency_later() {
    let mut s = segment(SyncMode::Synchronized);
    let sends = [0, 130, 500, 501, 2_222, 9_999];
    for t in sends {
        s.host.schedule_send(s.a, ns(t), frame(b"t", BB)).unwrap();
    }

    s.host.run_until(ns(20_000)).unwrap();

    let times: Vec<SimTime> = s.inbox_b.borrow().iter().map(|r| r.time).collect();
    let expected: Vec<SimTime> = sends.iter().map(|&t| ns(t + 500)).collect();
    assert_eq!(times, expected);
}

#[test]
fn simultaneous_sends_are_all_delivered_in_order() {
    let mut s = segment(SyncMode::Synchronized);
    for payload in [&b"1"[..], b"2", b"3"] {
        s.host
            .schedule_send(
                s.a,
                ns(700),
                OutgoingFrame::new(Bytes::from_static(payload), BB, ether_type::IPV4),
            )
            .unwrap();
    }
    s.host.run_until(ns(2_000)).unwrap();

    let payloads: Vec<Bytes> = s.inbox_b.borrow().iter().map(|r| r.payload.clone()).collect();
    assert_eq!(payloads, vec![&b"1"[..], b"2", b"3"]);
    assert!(s.inbox_b.borrow().iter().all(|r| r.time == ns(1_200)));
}

#[test]
fn unsynchronized_delivery_lands_on_a_poll() {
    let mut s = segment(SyncMode::Unsynchronized);
    s.host.schedule_send(s.a, ns(1_050), frame(b"P", BB)).unwrap();

    s.host.run_until(ns(5_000)).unwrap();

    let inbox = s.inbox_b.borrow();
    assert_eq!(inbox.len(), 1);
    // Polls fire every 100ns; the first one after the send picks it up.
    assert_eq!(inbox[0].time, ns(1_100));
}

#[test]
fn zero_latency_simultaneous_sends_in_both_directions() {
    let config = LinkEndpointConfig {
        link_latency_ns: 0,
        ..link(SyncMode::Unsynchronized)
    };
    let mut s = segment_with(1024, &config);
    for payload in [&b"1"[..], b"2", b"3"] {
        s.host
            .schedule_send(
                s.a,
                ns(1_000),
                OutgoingFrame::new(Bytes::from_static(payload), BB, ether_type::IPV4),
            )
            .unwrap();
        s.host
            .schedule_send(
                s.b,
                ns(1_000),
                OutgoingFrame::new(Bytes::from_static(payload), AA, ether_type::IPV4),
            )
            .unwrap();
    }

    s.host.run_until(ns(3_000)).unwrap();

    for inbox in [&s.inbox_a, &s.inbox_b] {
        let inbox = inbox.borrow();
        let payloads: Vec<Bytes> = inbox.iter().map(|r| r.payload.clone()).collect();
        assert_eq!(payloads, vec![&b"1"[..], b"2", b"3"]);
        // Sends run before the poll sharing their instant.
        assert!(inbox.iter().all(|r| r.time == ns(1_000)));
    }
    assert_eq!(s.host.device(s.a).unwrap().stats().frames_received, 3);
    assert_eq!(s.host.device(s.b).unwrap().stats().frames_received, 3);
}

#[test]
fn long_synchronized_run_never_stalls() {
    let mut s = segment(SyncMode::Synchronized);
    for i in 0..200u64 {
        let from = if i % 2 == 0 { s.a } else { s.b };
        let to = if i % 2 == 0 { BB } else { AA };
        s.host.schedule_send(from, ns(i * 377), frame(b"x", to)).unwrap();
    }

    let summary = s.host.run_until(SimTime::from_micros(200)).unwrap();

    assert_eq!(summary.final_time, SimTime::from_micros(200));
    assert_eq!(s.inbox_a.borrow().len(), 100);
    assert_eq!(s.inbox_b.borrow().len(), 100);
}

#[test_case(200, 500 ; "heartbeat faster than latency")]
#[test_case(500, 500 ; "heartbeat equal to latency")]
#[test_case(1, 1 ; "one nanosecond link")]
fn lockstep_holds_for_valid_intervals(sync_interval_ns: u64, link_latency_ns: u64) {
    let config = LinkEndpointConfig {
        sync_interval_ns,
        link_latency_ns,
        ..link(SyncMode::Synchronized)
    };
    let mut s = segment_with(1024, &config);
    s.host.schedule_send(s.a, ns(10), frame(b"x", BB)).unwrap();

    s.host.run_until(ns(3_000)).unwrap();

    assert_eq!(s.inbox_b.borrow()[0].time, ns(10 + link_latency_ns));
}

// ============================================================================
// Backpressure
// ============================================================================

#[test]
fn burst_beyond_capacity_is_dropped_not_queued() {
    let mut s = segment_with(4, &link(SyncMode::Synchronized));
    for _ in 0..10 {
        s.host.schedule_send(s.a, ns(1_000), frame(b"burst", BB)).unwrap();
    }

    s.host.run_until(ns(5_000)).unwrap();

    // Two heartbeats are in flight at 1000ns, leaving room for two frames.
    let stats = s.host.device(s.a).unwrap().stats();
    assert_eq!(stats.frames_sent, 2);
    assert_eq!(stats.send_backpressure, 8);
    assert_eq!(s.inbox_b.borrow().len(), 2);
    assert_eq!(s.trace.count(TracePoint::Drop), 8);
}

// ============================================================================
// Setup and teardown failures
// ============================================================================

#[test]
fn mismatched_sync_modes_fail_to_connect() {
    let fabric = LoopbackFabric::new(8);
    let mut host = Host::new(SimConfig::default());
    let (a, _) = attach(&mut host, &fabric, 0, AA);
    let (b, _) = attach(&mut host, &fabric, 1, BB);

    host.start_device(a, link(SyncMode::Synchronized)).unwrap();
    let err = host
        .start_device(b, link(SyncMode::Unsynchronized))
        .unwrap_err();

    assert!(matches!(
        err,
        HostError::Link {
            source: LinkError::Connect {
                source: ChannelError::SyncModeMismatch { .. },
                ..
            },
            ..
        }
    ));
}

#[test]
fn third_device_on_a_link_is_rejected() {
    let fabric = LoopbackFabric::new(8);
    let mut host = Host::new(SimConfig::default());
    let (a, _) = attach(&mut host, &fabric, 0, AA);
    let (b, _) = attach(&mut host, &fabric, 1, BB);
    let (c, _) = attach(&mut host, &fabric, 2, MacAddress::local(3));

    host.start_device(a, link(SyncMode::Synchronized)).unwrap();
    host.start_device(b, link(SyncMode::Synchronized)).unwrap();
    let err = host.start_device(c, link(SyncMode::Synchronized)).unwrap_err();

    assert!(matches!(
        err,
        HostError::Link {
            source: LinkError::Connect {
                source: ChannelError::PeerCountMismatch { .. },
                ..
            },
            ..
        }
    ));
}

#[test]
fn silent_peer_stalls_synchronized_device() {
    let fabric = LoopbackFabric::new(8);
    let mut host = Host::new(SimConfig::default());
    let (a, _) = attach(&mut host, &fabric, 0, AA);
    host.start_device(a, link(SyncMode::Synchronized)).unwrap();

    let err = host.run_until(ns(1_000)).unwrap_err();

    match err {
        HostError::Link { device, source } => {
            assert_eq!(device, a);
            assert!(matches!(
                source,
                LinkError::Channel(ChannelError::WouldStall { .. })
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn peer_stop_is_fatal() {
    let mut s = segment(SyncMode::Synchronized);
    s.host.schedule_send(s.a, ns(100), frame(b"last words", BB)).unwrap();
    s.host.run_until(ns(700)).unwrap();
    s.host.stop_device(s.a).unwrap();

    let err = s.host.run_until(ns(10_000)).unwrap_err();

    assert!(matches!(
        err,
        HostError::Link {
            source: LinkError::Channel(ChannelError::Disconnected { .. }),
            ..
        }
    ));
    assert_eq!(s.inbox_b.borrow().len(), 1);
    assert_eq!(s.host.now(), ns(1_000));
}

#[test]
fn frame_deferred_across_receiver_stop_is_discarded() {
    let mut s = segment(SyncMode::Synchronized);
    s.host.schedule_send(s.a, ns(1_000), frame(b"late", BB)).unwrap();

    let deferred = |host: &Host<LoopbackChannel>| {
        host.simulation()
            .events()
            .iter()
            .any(|task| matches!(task.event, LinkEvent::Receive(_)))
    };
    while !deferred(&s.host) {
        assert!(s.host.step_until(ns(1_500)).unwrap(), "frame never arrived");
    }
    s.host.stop_device(s.b).unwrap();

    s.host.run_until(ns(1_800)).unwrap();

    assert!(s.inbox_b.borrow().is_empty());
    assert_eq!(s.host.device(s.b).unwrap().stats().frames_received, 1);
}

#[test]
fn stop_all_leaves_no_pending_events() {
    let mut s = segment(SyncMode::Synchronized);
    s.host.run_until(ns(3_000)).unwrap();
    s.host.stop_all();

    assert!(s.host.simulation().events().is_empty());
    assert!(s.host.devices().all(|d| d.adapter().poll_timer().is_none()));
}
