//! Encoded frames travelling through the router and both backends.

use std::cell::RefCell;
use std::net::UdpSocket;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use trex::error::TransportError;
use trex::protocol::{Encoder, Heartbeat, Hello, Message, MsgType, StationType, decode};
use trex::transport::radio::{INBOX_DEPTH, PeerRadioBackend, SimRadio};
use trex::transport::{Router, Transport, TransportConfig, TransportKind};

const MAC: [u8; 6] = [0x24, 0x6F, 0x28, 0x01, 0x02, 0x03];

fn radio() -> PeerRadioBackend<SimRadio> {
    let mut backend = PeerRadioBackend::new(SimRadio::new());
    backend
        .init(&TransportConfig::default())
        .expect("sim radio init");
    backend
}

fn collect(backend: &mut impl Transport) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    backend.poll(&mut |f: &[u8]| frames.push(f.to_vec()));
    frames
}

#[test]
fn hello_goes_out_on_broadcast_peer() {
    let mut backend = radio();
    let mut enc = Encoder::new(3);
    let hello = Hello::for_station(StationType::Drop, 3, 6, MAC);
    let frame = enc.encode(&hello.into()).unwrap();

    backend.broadcast(&frame).unwrap();

    let sent = &backend.driver().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, [0xFF; 6]);
    let (hdr, msg) = decode(&sent[0].1).unwrap();
    assert_eq!(hdr.msg_type, MsgType::Hello);
    assert_eq!(hdr.src_station_id, 3);
    assert_eq!(msg, Message::Hello(hello));
}

#[test]
fn received_frames_decode_in_arrival_order() {
    let mut backend = radio();
    let mut hub = Encoder::new(0);
    for uptime_ms in [10, 20, 30] {
        let frame = hub.encode(&Heartbeat { uptime_ms }.into()).unwrap();
        backend.driver_mut().inject(&frame);
    }

    let decoded: Vec<_> = collect(&mut backend)
        .iter()
        .map(|f| decode(f).unwrap())
        .collect();
    let seqs: Vec<_> = decoded.iter().map(|(h, _)| h.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    assert_eq!(decoded[2].1, Message::Heartbeat(Heartbeat { uptime_ms: 30 }));
}

#[test]
fn full_inbox_drops_and_counts() {
    let mut backend = radio();
    for i in 0..=INBOX_DEPTH {
        backend.driver_mut().inject(&[i as u8; 4]);
    }
    assert_eq!(collect(&mut backend).len(), INBOX_DEPTH);
    assert_eq!(backend.stats().rx_dropped, 1);

    // Space frees up once drained.
    backend.driver_mut().inject(&[1]);
    assert_eq!(collect(&mut backend), vec![vec![1]]);
}

#[test]
fn send_status_is_counted() {
    let mut backend = radio();
    backend.broadcast(&[1, 2, 3]).unwrap();
    backend.driver().complete_send(true);
    backend.driver().complete_send(false);
    let stats = backend.stats();
    assert_eq!((stats.tx_ok, stats.tx_failed), (1, 1));
}

#[test]
fn router_rejects_before_init() {
    let mut router = Router::new(Box::new(PeerRadioBackend::new(SimRadio::new())));
    assert_eq!(router.broadcast(&[1]), Err(TransportError::NotInitialized));
    assert_eq!(router.send_to_server(&[1]), Err(TransportError::NotInitialized));
}

#[test]
fn router_passes_backend_errors_through() {
    let mut router = Router::new(Box::new(radio()));
    assert_eq!(router.broadcast(&[]), Err(TransportError::EmptyPayload));
    assert_eq!(router.send_to_server(&[0; 251]), Err(TransportError::TooLarge));
    assert_eq!(router.send_to_server(&[0; 250]), Ok(()));
}

#[test]
fn channel_lock_failure_fails_init() {
    let mut sim = SimRadio::new();
    sim.fail_lock = true;
    let mut backend = PeerRadioBackend::new(sim);
    assert_eq!(
        backend.init(&TransportConfig::default()),
        Err(TransportError::InitFailed)
    );
    assert_eq!(backend.broadcast(&[1]), Err(TransportError::NotInitialized));
}

// ── IP broadcast over loopback ────────────────────────────────

fn free_udp_port() -> u16 {
    let scratch = UdpSocket::bind("127.0.0.1:0").expect("scratch bind");
    scratch.local_addr().expect("scratch addr").port()
}

#[test]
fn udp_router_loops_frame_back_to_handler() {
    let config = TransportConfig {
        kind: TransportKind::IpBroadcast,
        udp_port: free_udp_port(),
        broadcast_ip: [127, 0, 0, 1],
        ..TransportConfig::default()
    };
    let mut router = Router::from_config(&config);
    assert_eq!(router.backend_name(), "udp-broadcast");

    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    router.set_handler(move |f| {
        if let Ok(decoded) = decode(f) {
            sink.borrow_mut().push(decoded);
        }
    });
    router.init(&config).expect("udp init");

    let mut enc = Encoder::new(9);
    let frame = enc.encode(&Heartbeat { uptime_ms: 1_234 }.into()).unwrap();
    router.broadcast(&frame).unwrap();

    for _ in 0..100 {
        router.poll();
        if !received.borrow().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    let got = received.borrow();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].0.src_station_id, 9);
    assert_eq!(got[0].1, Message::Heartbeat(Heartbeat { uptime_ms: 1_234 }));
}
