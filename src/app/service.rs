//! Maintenance controller, the hexagonal core.
//!
//! [`MaintController`] owns the trigger FSM and every maintenance port. It
//! exposes a hardware-agnostic API: the firmware samples the trigger into
//! [`check_entry`](MaintController::check_entry) from its game loop and,
//! once that returns `true`, hands the loop over to
//! [`poll`](MaintController::poll).
//!
//! ```text
//!  trigger ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!              │     MaintController      │
//!   Ports  ◀──▶│  FSM · bring-up · loop   │
//!              └──────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::config::MaintConfig;
use crate::error::{ConsoleError, InitError};
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};

use super::beacon::{BeaconRecord, BeaconSchedule};
use super::console::{self, ConsoleEnv, ConsoleOutcome};
use super::events::{MaintEvent, RebootReason, ServiceKind};
use super::ports::{
    BeaconPort, CommandHandler, ConsoleServer, ConsoleSession, DiscoveryPort, EventSink,
    FilesystemPort, NetworkPort, ServiceRecord, SystemPort, UpdateEvent, UpdatePort, UploadEvent,
    UploadPort,
};

/// Pause between the reboot reply and the restart so the reply drains.
const REBOOT_DELAY_MS: u32 = 200;

/// Every outside capability the controller drives.
pub struct MaintPorts {
    pub network: Box<dyn NetworkPort>,
    pub discovery: Box<dyn DiscoveryPort>,
    pub update: Box<dyn UpdatePort>,
    pub console: Box<dyn ConsoleServer>,
    pub beacon: Box<dyn BeaconPort>,
    pub system: Box<dyn SystemPort>,
    /// Only started when `enable_upload` is set.
    pub upload: Option<Box<dyn UploadPort>>,
}

/// Which listeners came up during bring-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Live {
    update: bool,
    console: bool,
    beacon: bool,
    upload: bool,
}

type UpdateHandler = Box<dyn FnMut(&UpdateEvent)>;
type UploadHandler = Box<dyn FnMut(&UploadEvent)>;

/// Access-point SSID: `<host>-<low 16 bits of the factory MAC in hex>`.
pub fn ap_ssid(host: &str, mac: [u8; 6]) -> String {
    format!("{}-{:X}", host, u16::from_le_bytes([mac[0], mac[1]]))
}

/// Discovery records advertised for `config`.
pub fn service_records(config: &MaintConfig, with_upload: bool) -> Vec<ServiceRecord> {
    let mut records = vec![
        ServiceRecord::new("_telnet", "_tcp", config.console_port),
        ServiceRecord::new("_trexota", "_tcp", config.ota_port),
        ServiceRecord::new("_trex", "_udp", config.beacon_port)
            .with_txt("type", config.station_type.label())
            .with_txt("id", config.station_id.to_string())
            .with_txt("mode", "maint"),
    ];
    if with_upload {
        records.push(ServiceRecord::new("_http", "_tcp", config.upload_port));
    }
    records
}

pub struct MaintController {
    config: MaintConfig,
    fsm: Fsm,
    ctx: FsmContext,
    ports: MaintPorts,
    live: Live,
    session: Option<Box<dyn ConsoleSession>>,
    beacon: BeaconSchedule,
    update_handler: Option<UpdateHandler>,
    upload_handler: Option<UploadHandler>,
    command_handler: Option<Box<dyn CommandHandler>>,
}

impl MaintController {
    /// Build a Dormant controller. Nothing touches the network until
    /// maintenance mode is entered.
    pub fn new(config: MaintConfig, ports: MaintPorts) -> Self {
        let mut ctx = FsmContext::new(config.hold_ms);
        let mut fsm = Fsm::new(build_state_table(), StateId::Dormant);
        fsm.start(&mut ctx);
        let beacon = BeaconSchedule::new(config.beacon_interval_ms);

        Self {
            config,
            fsm,
            ctx,
            ports,
            live: Live::default(),
            session: None,
            beacon,
            update_handler: None,
            upload_handler: None,
            command_handler: None,
        }
    }

    // ── Handler registration ──────────────────────────────────

    pub fn on_update_event(&mut self, handler: impl FnMut(&UpdateEvent) + 'static) {
        self.update_handler = Some(Box::new(handler));
    }

    pub fn on_upload_event(&mut self, handler: impl FnMut(&UploadEvent) + 'static) {
        self.upload_handler = Some(Box::new(handler));
    }

    /// Console lines the built-ins don't claim go here before `?`.
    pub fn set_command_handler(&mut self, handler: impl CommandHandler + 'static) {
        self.command_handler = Some(Box::new(handler));
    }

    // ── Entry ─────────────────────────────────────────────────

    /// Sample the trigger. Returns `true` once maintenance mode is active;
    /// game logic should pause while it does.
    pub fn check_entry(&mut self, now_ms: u32, asserted: bool, sink: &mut impl EventSink) -> bool {
        if self.is_active() {
            return true;
        }

        self.ctx.now_ms = now_ms;
        self.ctx.trigger_asserted = asserted;
        let prev = self.fsm.current_state();
        if let Some(to) = self.fsm.tick(&mut self.ctx) {
            sink.emit(&MaintEvent::StateChanged { from: prev, to });
        }

        self.run_bring_up_if_requested(now_ms, sink);
        self.is_active()
    }

    /// Enter maintenance mode unconditionally (boot-time entry).
    pub fn enter(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        let prev = self.fsm.current_state();
        if prev == StateId::Active {
            return;
        }
        self.ctx.now_ms = now_ms;
        self.fsm.force_transition(StateId::Active, &mut self.ctx);
        sink.emit(&MaintEvent::StateChanged {
            from: prev,
            to: StateId::Active,
        });
        self.run_bring_up_if_requested(now_ms, sink);
    }

    fn run_bring_up_if_requested(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        if !self.ctx.bring_up_requested {
            return;
        }
        self.ctx.bring_up_requested = false;
        self.bring_up(now_ms, sink);
    }

    // ── Bring-up ──────────────────────────────────────────────

    fn bring_up(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        info!("[Maint] entering maintenance mode");
        sink.emit(&MaintEvent::Entering);

        self.bring_up_network(sink);
        self.start_discovery(sink);

        let cfg = &self.config;
        self.live.update = started(
            ServiceKind::Update,
            cfg.ota_port,
            self.ports.update.begin(cfg.ota_port),
            sink,
        );
        self.live.console = started(
            ServiceKind::Console,
            cfg.console_port,
            self.ports.console.begin(cfg.console_port),
            sink,
        );

        if cfg.enable_beacon {
            self.live.beacon = started(
                ServiceKind::Beacon,
                cfg.beacon_port,
                self.ports.beacon.begin(cfg.beacon_port),
                sink,
            );
            if self.live.beacon {
                self.send_beacon(now_ms, sink);
            }
        }

        let cfg = &self.config;
        if cfg.enable_upload {
            match self.ports.upload.as_mut() {
                Some(upload) => {
                    self.live.upload = started(
                        ServiceKind::Upload,
                        cfg.upload_port,
                        upload.begin(cfg.upload_port),
                        sink,
                    );
                }
                None => warn!("[Maint] upload enabled but no upload service provided"),
            }
        }

        info!(
            "[Maint] console: {}.local:{}",
            self.config.host, self.config.console_port
        );
        sink.emit(&MaintEvent::Ready);
    }

    fn bring_up_network(&mut self, sink: &mut impl EventSink) {
        let cfg = &self.config;
        let net = &mut self.ports.network;

        if cfg.disable_power_save {
            net.set_power_save(false);
        }

        let mut online = false;
        if !cfg.ssid.is_empty() {
            match net.connect_sta(&cfg.ssid, &cfg.pass, &cfg.host, cfg.sta_timeout_ms) {
                Ok(ip) => {
                    info!("[Maint] STA ip: {}", ip);
                    sink.emit(&MaintEvent::StationConnected { ip });
                    online = true;
                }
                Err(e) => {
                    warn!("[Maint] STA association failed: {}", e);
                    sink.emit(&MaintEvent::StationFailed(e));
                }
            }
        }

        if !online && cfg.ap_fallback {
            let ssid = ap_ssid(&cfg.host, self.ports.system.factory_mac());
            match net.start_soft_ap(&ssid, &cfg.ap_pass, cfg.ap_channel) {
                Ok(ip) => {
                    info!("[Maint] SoftAP: {}  ip: {}", ssid, ip);
                    sink.emit(&MaintEvent::AccessPointStarted { ssid, ip });
                    online = true;
                }
                Err(e) => {
                    warn!("[Maint] SoftAP failed: {}", e);
                    sink.emit(&MaintEvent::AccessPointFailed(e));
                }
            }
        }

        if !online {
            warn!("[Maint] no network; services start anyway");
            sink.emit(&MaintEvent::NetworkUnavailable);
        }
    }

    fn start_discovery(&mut self, sink: &mut impl EventSink) {
        let discovery = &mut self.ports.discovery;
        if let Err(e) = discovery.start(&self.config.host) {
            warn!("[Maint] mDNS failed: {}", e);
            sink.emit(&MaintEvent::DiscoveryFailed(e));
            return;
        }

        let with_upload = self.config.enable_upload && self.ports.upload.is_some();
        let mut records = 0;
        for record in service_records(&self.config, with_upload) {
            match discovery.add_service(&record) {
                Ok(()) => records += 1,
                Err(e) => warn!("[Maint] {}.{} not advertised: {}", record.service, record.proto, e),
            }
        }
        sink.emit(&MaintEvent::DiscoveryStarted { records });
    }

    // ── Steady state ──────────────────────────────────────────

    /// One pass of the maintenance loop. No-op until Active.
    pub fn poll(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        if !self.is_active() {
            return;
        }

        self.poll_update(sink);
        self.accept_console(sink);
        self.serve_console_line(sink);

        if self.live.beacon && self.beacon.due(now_ms) {
            self.send_beacon(now_ms, sink);
        }

        self.poll_upload(sink);
    }

    fn poll_update(&mut self, sink: &mut impl EventSink) {
        if !self.live.update {
            return;
        }
        let Some(event) = self.ports.update.poll() else {
            return;
        };

        match &event {
            UpdateEvent::Started { size } => info!("[OTA] start ({} bytes)", size),
            UpdateEvent::Progress { received, total } if *total > 0 => {
                debug!("[OTA] {}%", u64::from(*received) * 100 / u64::from(*total));
            }
            UpdateEvent::Progress { .. } => {}
            UpdateEvent::Completed => info!("[OTA] end"),
            UpdateEvent::Failed(e) => warn!("[OTA] err: {}", e),
        }
        if let Some(handler) = self.update_handler.as_mut() {
            handler(&event);
        }
        let completed = event == UpdateEvent::Completed;
        sink.emit(&MaintEvent::Update(event));

        if completed {
            self.reboot(RebootReason::UpdateComplete, sink);
        }
    }

    fn accept_console(&mut self, sink: &mut impl EventSink) {
        if self.session.as_ref().is_some_and(|s| !s.is_connected()) {
            self.session = None;
        }
        if !self.live.console {
            return;
        }
        let Some(mut incoming) = self.ports.console.accept() else {
            return;
        };

        if let Some(mut old) = self.session.take() {
            old.close();
            info!("[Maint] console client displaced");
            sink.emit(&MaintEvent::ConsoleDisplaced);
        }
        incoming.write_str(&console::greeting(self.live.upload));
        sink.emit(&MaintEvent::ConsoleConnected);
        self.session = Some(incoming);
    }

    fn serve_console_line(&mut self, sink: &mut impl EventSink) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let Some(line) = session.read_line() else {
            self.session = Some(session);
            return;
        };
        let line = line.trim();
        sink.emit(&MaintEvent::ConsoleCommand {
            line: line.to_string(),
        });

        let fs: Option<&mut dyn FilesystemPort> = match self.ports.upload.as_mut() {
            Some(upload) if self.live.upload => Some(upload.fs()),
            _ => None,
        };
        let external: Option<&mut dyn CommandHandler> = match self.command_handler.as_mut() {
            Some(handler) => Some(handler.as_mut()),
            None => None,
        };
        let env = ConsoleEnv {
            config: &self.config,
            network: self.ports.network.as_ref(),
            system: self.ports.system.as_ref(),
            fs,
            external,
        };

        let outcome = console::execute(line, env, session.as_mut());
        match outcome {
            Ok(ConsoleOutcome::Done) => {}
            Ok(ConsoleOutcome::Formatted) => {
                info!("[Maint] filesystem formatted");
                sink.emit(&MaintEvent::FilesystemFormatted);
            }
            Ok(ConsoleOutcome::Reboot) => {
                session.write_str("Rebooting...\r\n");
                self.session = Some(session);
                self.reboot(RebootReason::ConsoleCommand, sink);
                return;
            }
            Err(ConsoleError::Unrecognized) => session.write_str("?\r\n"),
        }
        self.session = Some(session);
    }

    fn send_beacon(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        self.beacon.mark(now_ms);
        let net = &self.ports.network;
        let record = BeaconRecord::new(&self.config, net.ip(), net.rssi());
        let line = match record.to_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("[Maint] beacon encode failed: {}", e);
                return;
            }
        };
        match self.ports.beacon.send(&line) {
            Ok(()) => sink.emit(&MaintEvent::BeaconSent),
            Err(e) => debug!("[Maint] beacon send failed: {}", e),
        }
    }

    fn poll_upload(&mut self, sink: &mut impl EventSink) {
        if !self.live.upload {
            return;
        }
        let Some(event) = self.ports.upload.as_mut().and_then(|u| u.poll()) else {
            return;
        };
        match &event {
            UploadEvent::Stored { path, bytes } => info!("[Maint] stored {} ({} bytes)", path, bytes),
            UploadEvent::Rejected(e) => warn!("[Maint] upload rejected: {}", e),
        }
        if let Some(handler) = self.upload_handler.as_mut() {
            handler(&event);
        }
        sink.emit(&MaintEvent::Upload(event));
    }

    fn reboot(&mut self, reason: RebootReason, sink: &mut impl EventSink) {
        info!("[Maint] rebooting ({:?})", reason);
        sink.emit(&MaintEvent::Rebooting(reason));
        self.ports.system.delay_ms(REBOOT_DELAY_MS);
        self.ports.system.restart();
    }

    // ── Console mirror ────────────────────────────────────────

    /// Mirror `text` to the connected console client, if any.
    pub fn print(&mut self, text: &str) {
        if let Some(session) = self.session.as_mut().filter(|s| s.is_connected()) {
            session.write_str(text);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn is_active(&self) -> bool {
        self.fsm.current_state() == StateId::Active
    }

    pub fn config(&self) -> &MaintConfig {
        &self.config
    }

    pub fn has_console_client(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_connected())
    }
}

/// Log and report a listener start. Returns whether it is live.
fn started(
    kind: ServiceKind,
    port: u16,
    result: Result<(), InitError>,
    sink: &mut impl EventSink,
) -> bool {
    match result {
        Ok(()) => {
            info!("[Maint] {} listening on {}", kind.name(), port);
            sink.emit(&MaintEvent::ServiceStarted { kind, port });
            true
        }
        Err(error) => {
            warn!("[Maint] {} failed to start: {}", kind.name(), error);
            sink.emit(&MaintEvent::ServiceFailed { kind, error });
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ap_ssid_uses_low_mac_bits() {
        assert_eq!(ap_ssid("trex", [0xFE, 0xCA, 0, 0, 0, 0]), "trex-CAFE");
        assert_eq!(ap_ssid("trex", [0x0A, 0x00, 1, 2, 3, 4]), "trex-A");
    }

    #[test]
    fn discovery_records_follow_config() {
        let config = MaintConfig::default();
        let records = service_records(&config, false);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].port, 23);
        assert_eq!((records[1].service, records[1].port), ("_trexota", 3232));

        let trex = &records[2];
        assert_eq!((trex.service, trex.proto, trex.port), ("_trex", "_udp", 32458));
        assert_eq!(
            trex.txt,
            vec![
                ("type", "loot".to_string()),
                ("id", "1".to_string()),
                ("mode", "maint".to_string()),
            ]
        );

        let with_http = service_records(&config, true);
        assert_eq!(with_http.last().map(|r| r.service), Some("_http"));
    }
}
