//! TREX station firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  WifiAdapter   MdnsAdapter   OtaListener   TelnetServer      │
//! │  UdpBeacon     EspUpload     SystemAdapter NvsAdapter        │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ───────────────────    │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │   MaintController (trigger FSM + service loop)         │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  Router ── ESP-NOW (game) / UDP broadcast (maintenance)      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Game mode: announce with HELLO, heartbeat once a second, log every
//! decoded frame, watch the trigger. Once the trigger has been held the
//! controller takes over the loop until the station reboots.

#![deny(unused_must_use)]

use anyhow::Result;
use log::{debug, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, PinDriver, Pull};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use trex::adapters::beacon::UdpBeacon;
use trex::adapters::device_id;
use trex::adapters::fs::StdFs;
use trex::adapters::log_sink::LogEventSink;
use trex::adapters::mdns::MdnsAdapter;
use trex::adapters::nvs::NvsAdapter;
use trex::adapters::ota_listener::OtaListener;
use trex::adapters::system::SystemAdapter;
use trex::adapters::telnet::TelnetServer;
use trex::adapters::time::Clock;
use trex::adapters::upload::EspUpload;
use trex::adapters::wifi::WifiAdapter;
use trex::app::ports::{ConfigPort, ConsoleSession, FilesystemPort, UploadPort};
use trex::app::service::{MaintController, MaintPorts};
use trex::config::StationConfig;
use trex::drivers::button::TriggerButton;
use trex::protocol::{self, Encoder, Heartbeat, Hello, Message};
use trex::transport::{Router, TransportConfig};

const HEARTBEAT_INTERVAL_MS: u32 = 1_000;
const LOOP_DELAY_MS: u32 = 5;

fn log_frame(frame: &[u8]) {
    match protocol::decode(frame) {
        Ok((hdr, msg)) => debug!(
            "rx {:?} from station {} seq {}: {:?}",
            hdr.msg_type, hdr.src_station_id, hdr.seq, msg
        ),
        Err(e) => debug!("rx dropped ({} bytes): {}", frame.len(), e),
    }
}

fn start_router(config: &TransportConfig) -> Router {
    let mut router = Router::from_config(config);
    router.set_handler(log_frame);
    if let Err(e) = router.init(config) {
        warn!("Transport init failed: {}", e);
    }
    router
}

fn send(router: &mut Router, encoder: &mut Encoder, msg: Message) {
    match encoder.encode(&msg) {
        Ok(frame) => {
            if let Err(e) = router.broadcast(&frame) {
                debug!("tx {:?} failed: {}", msg.msg_type(), e);
            }
        }
        Err(e) => warn!("encode {:?} failed: {}", msg.msg_type(), e),
    }
}

fn upload_service() -> Option<Box<dyn UploadPort>> {
    match StdFs::mount_spiffs(c"/spiffs") {
        Ok(fs) => {
            let limit = fs.total_bytes();
            Some(Box::new(EspUpload::new(fs, limit)))
        }
        Err(e) => {
            warn!("SPIFFS unavailable ({}), upload disabled", e);
            None
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("TREX station v{}", env!("CARGO_PKG_VERSION"));

    trex::ota::check_rollback();

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let station = match NvsAdapter::new().and_then(|nvs| nvs.load()) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            StationConfig::default()
        }
    };
    let maint = station.maint.clone();
    let mac = device_id::read_mac();
    info!(
        "Station {} id={} mac={}",
        maint.station_type.label(),
        maint.station_id,
        device_id::mac_string(&mac)
    );

    // ── 3. Wi-Fi driver, started unassociated for ESP-NOW ─────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_part = EspDefaultNvsPartition::take().ok();
    let driver = EspWifi::new(peripherals.modem, sysloop.clone(), nvs_part)?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(driver, sysloop)?);
    if let Err(e) = wifi.start_radio() {
        warn!("Radio start failed: {}", e);
    }

    // ── 4. Game transport + announcement ──────────────────────
    let mut router = start_router(&station.transport);
    let mut encoder = Encoder::new(maint.station_id);
    let hello = Hello::for_station(
        maint.station_type,
        maint.station_id,
        station.transport.wifi_channel,
        mac,
    );
    send(&mut router, &mut encoder, hello.into());

    // ── 5. Maintenance controller ─────────────────────────────
    let upload = if maint.enable_upload {
        upload_service()
    } else {
        None
    };
    let ports = MaintPorts {
        network: Box::new(wifi),
        discovery: Box::new(MdnsAdapter::new()),
        update: Box::new(OtaListener::new()),
        console: Box::new(TelnetServer::new()),
        beacon: Box::new(UdpBeacon::new()),
        system: Box::new(SystemAdapter::new()),
        upload,
    };
    let mut controller = MaintController::new(maint.clone(), ports);
    controller.set_command_handler(|line: &str, out: &mut dyn ConsoleSession| {
        if !line.eq_ignore_ascii_case("ver") {
            return false;
        }
        out.write_str(&format!("trex {}\r\n", env!("CARGO_PKG_VERSION")));
        true
    });

    // SAFETY: the trigger pin is not claimed by any other driver.
    let mut pin = PinDriver::input(unsafe { AnyIOPin::new(i32::from(maint.button_pin)) })?;
    pin.set_pull(Pull::Up)?;
    let mut button = TriggerButton::new(pin);
    let clock = Clock::new();
    let mut sink = LogEventSink::new();
    let mut last_heartbeat = clock.now_ms();

    info!("Entering game loop");

    // ── 6. Game loop ──────────────────────────────────────────
    loop {
        let now = clock.now_ms();
        if controller.check_entry(now, button.is_pressed(), &mut sink) {
            break;
        }

        router.poll();
        if now.wrapping_sub(last_heartbeat) >= HEARTBEAT_INTERVAL_MS {
            last_heartbeat = now;
            send(&mut router, &mut encoder, Heartbeat { uptime_ms: now }.into());
        }
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }

    // ── 7. Maintenance loop (until reboot) ────────────────────
    // The peer radio cannot share the interface with an associated
    // station, so station traffic moves to IP broadcast.
    let ip_config = TransportConfig {
        udp_port: station.transport.udp_port,
        broadcast_ip: station.transport.broadcast_ip,
        ..TransportConfig::for_mode(true)
    };
    let mut router = start_router(&ip_config);

    loop {
        let now = clock.now_ms();
        controller.poll(now, &mut sink);
        router.poll();
        if now.wrapping_sub(last_heartbeat) >= HEARTBEAT_INTERVAL_MS {
            last_heartbeat = now;
            send(&mut router, &mut encoder, Heartbeat { uptime_ms: now }.into());
        }
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}
