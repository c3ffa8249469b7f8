//! Maintenance controller: trigger timing, network bring-up, discovery,
//! listeners and the steady-state loop, all against mock ports.

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;

use trex::app::events::{MaintEvent, RebootReason, ServiceKind};
use trex::app::ports::{ConnectivityError, DiscoveryError, UpdateEvent, UploadEvent};
use trex::config::MaintConfig;
use trex::error::InitError;
use trex::fsm::StateId;

use crate::mocks::{Harness, NetCall, sta_config};

fn upload_config() -> MaintConfig {
    MaintConfig {
        enable_upload: true,
        ..sta_config()
    }
}

// ── Trigger ───────────────────────────────────────────────────

#[test]
fn trigger_must_be_held_for_hold_time() {
    let mut h = Harness::new(sta_config());

    assert!(!h.ctl.check_entry(0, true, &mut h.sink));
    assert_eq!(h.ctl.state(), StateId::Triggering);

    assert!(!h.ctl.check_entry(1_499, true, &mut h.sink));
    assert_eq!(h.ctl.state(), StateId::Triggering);
    assert!(h.net.borrow().calls.is_empty(), "no bring-up before Active");

    assert!(h.ctl.check_entry(1_500, true, &mut h.sink));
    assert!(h.ctl.is_active());
    assert_eq!(
        &h.sink.events[..3],
        &[
            MaintEvent::StateChanged {
                from: StateId::Dormant,
                to: StateId::Triggering
            },
            MaintEvent::StateChanged {
                from: StateId::Triggering,
                to: StateId::Active
            },
            MaintEvent::Entering,
        ]
    );
}

#[test]
fn early_release_restarts_the_hold() {
    let mut h = Harness::new(sta_config());

    h.ctl.check_entry(0, true, &mut h.sink);
    h.ctl.check_entry(800, false, &mut h.sink);
    assert_eq!(h.ctl.state(), StateId::Dormant);

    // New press at 2000: 1000 ms later is not enough.
    h.ctl.check_entry(2_000, true, &mut h.sink);
    assert!(!h.ctl.check_entry(3_000, true, &mut h.sink));
    assert!(h.ctl.check_entry(3_500, true, &mut h.sink));
    assert_eq!(h.sink.count(|e| *e == MaintEvent::Entering), 1);
}

#[test]
fn released_trigger_stays_dormant() {
    let mut h = Harness::new(sta_config());
    for t in (0..10_000).step_by(100) {
        assert!(!h.ctl.check_entry(t, false, &mut h.sink));
    }
    assert_eq!(h.ctl.state(), StateId::Dormant);
    assert!(h.sink.events.is_empty());
}

#[test]
fn hold_survives_clock_wrap() {
    let mut h = Harness::new(sta_config());
    let start = u32::MAX - 500;
    h.ctl.check_entry(start, true, &mut h.sink);
    assert!(!h.ctl.check_entry(start.wrapping_add(1_000), true, &mut h.sink));
    assert!(h.ctl.check_entry(start.wrapping_add(1_500), true, &mut h.sink));
}

#[test]
fn active_is_sticky() {
    let mut h = Harness::new(sta_config());
    h.enter();
    let seen = h.sink.events.len();

    assert!(h.ctl.check_entry(10, false, &mut h.sink));
    h.enter();
    assert_eq!(h.sink.events.len(), seen, "no second bring-up");
    assert_eq!(h.sink.count(|e| *e == MaintEvent::Ready), 1);
}

#[test]
fn poll_is_inert_until_active() {
    let mut h = Harness::new(sta_config());
    h.console.borrow_mut().connect();
    h.poll(0);
    h.poll(10_000);
    assert_eq!(h.update.borrow().polls, 0);
    assert!(h.beacon.borrow().sent.is_empty());
    assert!(!h.ctl.has_console_client());
}

// ── Network bring-up ──────────────────────────────────────────

#[test]
fn station_success_runs_full_bring_up() {
    let mut h = Harness::new(sta_config());
    h.enter();

    assert_eq!(
        h.sink.events,
        vec![
            MaintEvent::StateChanged {
                from: StateId::Dormant,
                to: StateId::Active
            },
            MaintEvent::Entering,
            MaintEvent::StationConnected {
                ip: Ipv4Addr::new(10, 0, 0, 7)
            },
            MaintEvent::DiscoveryStarted { records: 3 },
            MaintEvent::ServiceStarted {
                kind: ServiceKind::Update,
                port: 3232
            },
            MaintEvent::ServiceStarted {
                kind: ServiceKind::Console,
                port: 23
            },
            MaintEvent::ServiceStarted {
                kind: ServiceKind::Beacon,
                port: 32458
            },
            MaintEvent::BeaconSent,
            MaintEvent::Ready,
        ]
    );
    assert_eq!(h.update.borrow().port, Some(3232));
    assert_eq!(h.console.borrow().port, Some(23));
}

#[test]
fn power_save_disabled_before_association() {
    let mut h = Harness::new(sta_config());
    h.enter();
    assert_eq!(
        h.net.borrow().calls,
        vec![
            NetCall::PowerSave(false),
            NetCall::Connect {
                ssid: "workshop".into(),
                hostname: "trex".into(),
                timeout_ms: 8_000,
            },
        ]
    );
}

#[test]
fn power_save_left_alone_when_configured() {
    let config = MaintConfig {
        disable_power_save: false,
        ..sta_config()
    };
    let mut h = Harness::new(config);
    h.enter();
    assert!(
        !h.net
            .borrow()
            .calls
            .iter()
            .any(|c| matches!(c, NetCall::PowerSave(_)))
    );
}

#[test]
fn station_failure_falls_back_to_access_point() {
    let mut h = Harness::with_net(sta_config(), |n| n.sta_fails = true);
    h.enter();

    assert!(
        h.sink
            .events
            .contains(&MaintEvent::StationFailed(ConnectivityError::Timeout))
    );
    assert!(h.sink.events.contains(&MaintEvent::AccessPointStarted {
        ssid: "trex-CAFE".into(),
        ip: Ipv4Addr::new(192, 168, 4, 1),
    }));
    assert_eq!(
        h.net.borrow().calls.last(),
        Some(&NetCall::SoftAp {
            ssid: "trex-CAFE".into(),
            channel: 6,
        })
    );
    assert_eq!(h.sink.count(|e| *e == MaintEvent::NetworkUnavailable), 0);
}

#[test]
fn no_credentials_goes_straight_to_access_point() {
    let mut h = Harness::new(MaintConfig::default());
    h.enter();
    let calls = h.net.borrow().calls.clone();
    assert!(!calls.iter().any(|c| matches!(c, NetCall::Connect { .. })));
    assert!(calls.iter().any(|c| matches!(c, NetCall::SoftAp { .. })));
    assert_eq!(
        h.sink
            .count(|e| matches!(e, MaintEvent::StationFailed(_) | MaintEvent::StationConnected { .. })),
        0
    );
}

#[test]
fn no_fallback_means_no_access_point() {
    let config = MaintConfig {
        ap_fallback: false,
        ..sta_config()
    };
    let mut h = Harness::with_net(config, |n| n.sta_fails = true);
    h.enter();
    assert!(
        !h.net
            .borrow()
            .calls
            .iter()
            .any(|c| matches!(c, NetCall::SoftAp { .. }))
    );
    assert_eq!(h.sink.count(|e| *e == MaintEvent::NetworkUnavailable), 1);
}

#[test]
fn services_start_even_without_network() {
    let mut h = Harness::with_net(sta_config(), |n| {
        n.sta_fails = true;
        n.ap_fails = true;
    });
    h.enter();

    assert!(
        h.sink
            .events
            .contains(&MaintEvent::AccessPointFailed(ConnectivityError::ApStartFailed))
    );
    let unavailable = h.sink.position(|e| *e == MaintEvent::NetworkUnavailable);
    let console = h.sink.position(|e| {
        matches!(
            e,
            MaintEvent::ServiceStarted {
                kind: ServiceKind::Console,
                ..
            }
        )
    });
    assert!(unavailable.is_some() && console.is_some());
    assert!(unavailable < console);
    assert_eq!(h.sink.events.last(), Some(&MaintEvent::Ready));
}

// ── Discovery ─────────────────────────────────────────────────

#[test]
fn discovery_advertises_host_and_services() {
    let mut h = Harness::new(sta_config());
    h.enter();

    let d = h.discovery.borrow();
    assert_eq!(d.hostname.as_deref(), Some("trex"));
    let services: Vec<_> = d.records.iter().map(|r| (r.service, r.proto, r.port)).collect();
    assert_eq!(
        services,
        vec![
            ("_telnet", "_tcp", 23),
            ("_trexota", "_tcp", 3232),
            ("_trex", "_udp", 32458),
        ]
    );
}

#[test]
fn discovery_includes_http_when_upload_is_live() {
    let mut h = Harness::with_upload(upload_config(), &[]);
    h.enter();
    assert_eq!(h.discovery.borrow().records.len(), 4);
    assert!(h.sink.events.contains(&MaintEvent::DiscoveryStarted { records: 4 }));
}

#[test]
fn discovery_failure_is_not_fatal() {
    let mut h = Harness::new(sta_config());
    h.discovery.borrow_mut().fail_start = true;
    h.enter();

    assert!(
        h.sink
            .events
            .contains(&MaintEvent::DiscoveryFailed(DiscoveryError::StartFailed))
    );
    assert!(h.discovery.borrow().records.is_empty());
    assert_eq!(h.console.borrow().port, Some(23));
    assert_eq!(h.sink.events.last(), Some(&MaintEvent::Ready));
}

// ── Beacon ────────────────────────────────────────────────────

#[test]
fn beacon_sent_on_entry_then_every_interval() {
    let mut h = Harness::new(sta_config());
    h.enter();
    assert_eq!(h.beacon.borrow().port, Some(32458));
    assert_eq!(h.beacon.borrow().sent.len(), 1);

    h.poll(4_999);
    assert_eq!(h.beacon.borrow().sent.len(), 1);
    h.poll(5_000);
    assert_eq!(h.beacon.borrow().sent.len(), 2);
    h.poll(9_999);
    assert_eq!(h.beacon.borrow().sent.len(), 2);
    h.poll(10_000);
    assert_eq!(h.beacon.borrow().sent.len(), 3);
}

#[test]
fn beacon_record_describes_station() {
    let mut h = Harness::new(sta_config());
    h.enter();
    assert_eq!(
        h.beacon.borrow().sent[0],
        "{\"host\":\"trex\",\"ip\":\"10.0.0.7\",\"type\":\"loot\",\"id\":1,\"mode\":\"maint\",\"rssi\":-55}\n"
    );
}

#[test]
fn beacon_disabled_sends_nothing() {
    let config = MaintConfig {
        enable_beacon: false,
        ..sta_config()
    };
    let mut h = Harness::new(config);
    h.enter();
    h.poll(60_000);
    assert_eq!(h.beacon.borrow().port, None);
    assert!(h.beacon.borrow().sent.is_empty());
    assert_eq!(h.sink.count(|e| *e == MaintEvent::BeaconSent), 0);
}

// ── Firmware update ───────────────────────────────────────────

#[test]
fn completed_update_reboots() {
    let mut h = Harness::new(sta_config());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    h.ctl.on_update_event(move |e| log.borrow_mut().push(e.clone()));
    h.enter();

    {
        let mut u = h.update.borrow_mut();
        u.pending.push_back(UpdateEvent::Started { size: 1_000 });
        u.pending.push_back(UpdateEvent::Progress {
            received: 500,
            total: 1_000,
        });
        u.pending.push_back(UpdateEvent::Completed);
    }

    h.poll(1);
    h.poll(2);
    assert_eq!(h.system.borrow().restarts, 0);
    h.poll(3);

    assert_eq!(seen.borrow().len(), 3);
    assert!(
        h.sink
            .events
            .contains(&MaintEvent::Rebooting(RebootReason::UpdateComplete))
    );
    assert_eq!(h.system.borrow().delays, vec![200]);
    assert_eq!(h.system.borrow().restarts, 1);
}

#[test]
fn update_listener_failure_is_reported_and_skipped() {
    let mut h = Harness::new(sta_config());
    h.update.borrow_mut().fail_begin = true;
    h.enter();

    assert!(h.sink.events.contains(&MaintEvent::ServiceFailed {
        kind: ServiceKind::Update,
        error: InitError::Listener("update"),
    }));
    h.poll(1);
    assert_eq!(h.update.borrow().polls, 0);
    assert_eq!(h.sink.events.last(), Some(&MaintEvent::Ready));
}

// ── Console sessions ──────────────────────────────────────────

#[test]
fn new_client_displaces_previous() {
    let mut h = Harness::new(sta_config());
    h.enter();

    let first = h.connect_client(1);
    assert!(h.ctl.has_console_client());
    assert!(first.borrow().output.starts_with("\r\n[TREX] telnet ready."));

    let second = h.connect_client(2);
    assert!(first.borrow().closed);
    assert!(!second.borrow().closed);
    assert!(second.borrow().output.starts_with("\r\n[TREX] telnet ready."));
    assert_eq!(h.sink.count(|e| *e == MaintEvent::ConsoleDisplaced), 1);
    assert_eq!(h.sink.count(|e| *e == MaintEvent::ConsoleConnected), 2);
}

#[test]
fn disconnected_client_is_dropped() {
    let mut h = Harness::new(sta_config());
    h.enter();
    let session = h.connect_client(1);
    session.borrow_mut().dropped = true;
    h.poll(2);
    assert!(!h.ctl.has_console_client());

    // A later client is not counted as a displacement.
    h.connect_client(3);
    assert_eq!(h.sink.count(|e| *e == MaintEvent::ConsoleDisplaced), 0);
}

#[test]
fn print_mirrors_to_connected_client() {
    let mut h = Harness::new(sta_config());
    h.ctl.print("nobody listening\r\n");
    h.enter();
    let session = h.connect_client(1);
    session.borrow_mut().output.clear();

    h.ctl.print("score 12\r\n");
    assert_eq!(session.borrow().output, "score 12\r\n");
}

// ── Upload ────────────────────────────────────────────────────

#[test]
fn upload_listener_starts_only_when_enabled() {
    let mut off = Harness::with_upload(sta_config(), &[]);
    off.enter();
    assert_eq!(off.upload.borrow().port, None);

    let mut on = Harness::with_upload(upload_config(), &[]);
    on.enter();
    assert_eq!(on.upload.borrow().port, Some(80));
    assert!(on.sink.events.contains(&MaintEvent::ServiceStarted {
        kind: ServiceKind::Upload,
        port: 80,
    }));
}

#[test]
fn upload_enabled_without_service_is_skipped() {
    let mut h = Harness::new(upload_config());
    h.enter();
    assert_eq!(
        h.sink.count(|e| matches!(
            e,
            MaintEvent::ServiceStarted {
                kind: ServiceKind::Upload,
                ..
            }
        )),
        0
    );
    assert!(h.sink.events.contains(&MaintEvent::DiscoveryStarted { records: 3 }));
}

#[test]
fn upload_events_reach_handler_and_sink() {
    let mut h = Harness::with_upload(upload_config(), &[]);
    let stored = Rc::new(RefCell::new(0u64));
    let total = Rc::clone(&stored);
    h.ctl.on_upload_event(move |e| {
        if let UploadEvent::Stored { bytes, .. } = e {
            *total.borrow_mut() += bytes;
        }
    });
    h.enter();

    let event = UploadEvent::Stored {
        path: "/asset.bin".into(),
        bytes: 512,
    };
    h.upload.borrow_mut().pending.push_back(event.clone());
    h.poll(1);

    assert_eq!(*stored.borrow(), 512);
    assert!(h.sink.events.contains(&MaintEvent::Upload(event)));
}
