//! Mock adapters for integration tests.
//!
//! Every mock shares its state through an `Rc<RefCell<..>>` handle so the
//! test keeps a view into it after the mock is boxed into `MaintPorts`.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::io::Read;
use std::net::Ipv4Addr;
use std::rc::Rc;

use trex::app::events::MaintEvent;
use trex::app::ports::{
    BeaconPort, ConnectivityError, ConsoleServer, ConsoleSession, DiscoveryError, DiscoveryPort,
    EventSink, FilesystemPort, FsEntry, FsError, NetMode, NetworkPort, ServiceRecord, SystemPort,
    UpdateEvent, UpdatePort, UploadEvent, UploadPort,
};
use trex::app::service::{MaintController, MaintPorts};
use trex::config::MaintConfig;
use trex::error::{InitError, TransportError};

pub type Shared<T> = Rc<RefCell<T>>;

fn shared<T: Default>() -> Shared<T> {
    Rc::new(RefCell::new(T::default()))
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    pub events: Vec<MaintEvent>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&MaintEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn position(&self, pred: impl Fn(&MaintEvent) -> bool) -> Option<usize> {
        self.events.iter().position(pred)
    }
}

impl EventSink for Recorder {
    fn emit(&mut self, event: &MaintEvent) {
        self.events.push(event.clone());
    }
}

// ── Network ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum NetCall {
    PowerSave(bool),
    Connect { ssid: String, hostname: String, timeout_ms: u32 },
    SoftAp { ssid: String, channel: u8 },
}

#[derive(Default)]
pub struct NetState {
    pub calls: Vec<NetCall>,
    pub sta_fails: bool,
    pub ap_fails: bool,
    pub mode: Option<NetMode>,
}

pub struct MockNet(pub Shared<NetState>);

impl NetworkPort for MockNet {
    fn set_power_save(&mut self, enabled: bool) {
        self.0.borrow_mut().calls.push(NetCall::PowerSave(enabled));
    }

    fn connect_sta(
        &mut self,
        ssid: &str,
        _pass: &str,
        hostname: &str,
        timeout_ms: u32,
    ) -> Result<Ipv4Addr, ConnectivityError> {
        let mut s = self.0.borrow_mut();
        s.calls.push(NetCall::Connect {
            ssid: ssid.into(),
            hostname: hostname.into(),
            timeout_ms,
        });
        if s.sta_fails {
            return Err(ConnectivityError::Timeout);
        }
        s.mode = Some(NetMode::Station);
        Ok(Ipv4Addr::new(10, 0, 0, 7))
    }

    fn start_soft_ap(
        &mut self,
        ssid: &str,
        _pass: &str,
        channel: u8,
    ) -> Result<Ipv4Addr, ConnectivityError> {
        let mut s = self.0.borrow_mut();
        s.calls.push(NetCall::SoftAp {
            ssid: ssid.into(),
            channel,
        });
        if s.ap_fails {
            return Err(ConnectivityError::ApStartFailed);
        }
        s.mode = Some(NetMode::AccessPoint);
        Ok(Ipv4Addr::new(192, 168, 4, 1))
    }

    fn mode(&self) -> NetMode {
        self.0.borrow().mode.unwrap_or(NetMode::Off)
    }

    fn ip(&self) -> Ipv4Addr {
        match self.mode() {
            NetMode::Station => Ipv4Addr::new(10, 0, 0, 7),
            NetMode::AccessPoint => Ipv4Addr::new(192, 168, 4, 1),
            NetMode::Off => Ipv4Addr::UNSPECIFIED,
        }
    }

    fn rssi(&self) -> i32 {
        if self.mode() == NetMode::Station { -55 } else { 0 }
    }
}

// ── Discovery ─────────────────────────────────────────────────

#[derive(Default)]
pub struct DiscoveryState {
    pub hostname: Option<String>,
    pub records: Vec<ServiceRecord>,
    pub fail_start: bool,
}

pub struct MockDiscovery(pub Shared<DiscoveryState>);

impl DiscoveryPort for MockDiscovery {
    fn start(&mut self, hostname: &str) -> Result<(), DiscoveryError> {
        let mut s = self.0.borrow_mut();
        if s.fail_start {
            return Err(DiscoveryError::StartFailed);
        }
        s.hostname = Some(hostname.into());
        Ok(())
    }

    fn add_service(&mut self, record: &ServiceRecord) -> Result<(), DiscoveryError> {
        self.0.borrow_mut().records.push(record.clone());
        Ok(())
    }
}

// ── Firmware update ───────────────────────────────────────────

#[derive(Default)]
pub struct UpdateState {
    pub port: Option<u16>,
    pub fail_begin: bool,
    pub pending: VecDeque<UpdateEvent>,
    pub polls: u32,
}

pub struct MockUpdate(pub Shared<UpdateState>);

impl UpdatePort for MockUpdate {
    fn begin(&mut self, port: u16) -> Result<(), InitError> {
        let mut s = self.0.borrow_mut();
        if s.fail_begin {
            return Err(InitError::Listener("update"));
        }
        s.port = Some(port);
        Ok(())
    }

    fn poll(&mut self) -> Option<UpdateEvent> {
        let mut s = self.0.borrow_mut();
        s.polls += 1;
        s.pending.pop_front()
    }
}

// ── Console ───────────────────────────────────────────────────

#[derive(Default)]
pub struct SessionState {
    pub input: VecDeque<String>,
    pub output: String,
    pub closed: bool,
    pub dropped: bool,
}

impl SessionState {
    pub fn type_line(&mut self, line: &str) {
        self.input.push_back(line.into());
    }
}

pub struct MockSession(pub Shared<SessionState>);

impl ConsoleSession for MockSession {
    fn read_line(&mut self) -> Option<String> {
        self.0.borrow_mut().input.pop_front()
    }

    fn write_str(&mut self, text: &str) {
        let mut s = self.0.borrow_mut();
        if !s.closed && !s.dropped {
            s.output.push_str(text);
        }
    }

    fn is_connected(&self) -> bool {
        let s = self.0.borrow();
        !s.closed && !s.dropped
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed = true;
    }
}

#[derive(Default)]
pub struct ConsoleState {
    pub port: Option<u16>,
    pub waiting: VecDeque<Shared<SessionState>>,
}

impl ConsoleState {
    /// Queue a client for the next `accept` and return its handle.
    pub fn connect(&mut self) -> Shared<SessionState> {
        let session = shared::<SessionState>();
        self.waiting.push_back(session.clone());
        session
    }
}

pub struct MockConsole(pub Shared<ConsoleState>);

impl ConsoleServer for MockConsole {
    fn begin(&mut self, port: u16) -> Result<(), InitError> {
        self.0.borrow_mut().port = Some(port);
        Ok(())
    }

    fn accept(&mut self) -> Option<Box<dyn ConsoleSession>> {
        let session = self.0.borrow_mut().waiting.pop_front()?;
        Some(Box::new(MockSession(session)))
    }
}

// ── Beacon ────────────────────────────────────────────────────

#[derive(Default)]
pub struct BeaconState {
    pub port: Option<u16>,
    pub sent: Vec<String>,
}

pub struct MockBeacon(pub Shared<BeaconState>);

impl BeaconPort for MockBeacon {
    fn begin(&mut self, port: u16) -> Result<(), InitError> {
        self.0.borrow_mut().port = Some(port);
        Ok(())
    }

    fn send(&mut self, record: &str) -> Result<(), TransportError> {
        let mut s = self.0.borrow_mut();
        if s.port.is_none() {
            return Err(TransportError::NotInitialized);
        }
        s.sent.push(record.into());
        Ok(())
    }
}

// ── System ────────────────────────────────────────────────────

#[derive(Default)]
pub struct SystemState {
    pub restarts: u32,
    pub delays: Vec<u32>,
}

pub struct MockSystem(pub Shared<SystemState>);

impl SystemPort for MockSystem {
    fn free_heap(&self) -> u32 {
        123_456
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().delays.push(ms);
    }

    fn restart(&mut self) {
        self.0.borrow_mut().restarts += 1;
    }

    fn factory_mac(&self) -> [u8; 6] {
        [0xFE, 0xCA, 0x01, 0x02, 0x03, 0x04]
    }
}

// ── Upload + filesystem ───────────────────────────────────────

#[derive(Default)]
pub struct MemFs {
    pub files: BTreeMap<String, Vec<u8>>,
    pub capacity: u64,
}

impl FilesystemPort for MemFs {
    fn total_bytes(&self) -> u64 {
        self.capacity
    }

    fn used_bytes(&self) -> u64 {
        self.files.values().map(|d| d.len() as u64).sum()
    }

    fn list(&self) -> Result<Vec<FsEntry>, FsError> {
        Ok(self
            .files
            .iter()
            .map(|(p, d)| FsEntry {
                path: p.clone(),
                size: d.len() as u64,
            })
            .collect())
    }

    fn stat(&self, path: &str) -> Result<FsEntry, FsError> {
        self.files
            .get(path)
            .map(|d| FsEntry {
                path: path.into(),
                size: d.len() as u64,
            })
            .ok_or(FsError::NotFound)
    }

    fn remove(&mut self, path: &str) -> Result<(), FsError> {
        self.files.remove(path).map(|_| ()).ok_or(FsError::NotFound)
    }

    fn write_from(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, FsError> {
        let mut data = Vec::new();
        source
            .read_to_end(&mut data)
            .map_err(|_| FsError::SourceFailed)?;
        let len = data.len() as u64;
        self.files.insert(path.into(), data);
        Ok(len)
    }

    fn format(&mut self) -> Result<(), FsError> {
        self.files.clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct UploadState {
    pub port: Option<u16>,
    pub pending: VecDeque<UploadEvent>,
}

pub struct MockUpload {
    pub state: Shared<UploadState>,
    pub fs: MemFs,
}

impl UploadPort for MockUpload {
    fn begin(&mut self, port: u16) -> Result<(), InitError> {
        self.state.borrow_mut().port = Some(port);
        Ok(())
    }

    fn poll(&mut self) -> Option<UploadEvent> {
        self.state.borrow_mut().pending.pop_front()
    }

    fn fs(&mut self) -> &mut dyn FilesystemPort {
        &mut self.fs
    }
}

// ── Harness ───────────────────────────────────────────────────

/// A controller wired to mocks, plus handles into every mock.
pub struct Harness {
    pub ctl: MaintController,
    pub sink: Recorder,
    pub net: Shared<NetState>,
    pub discovery: Shared<DiscoveryState>,
    pub update: Shared<UpdateState>,
    pub console: Shared<ConsoleState>,
    pub beacon: Shared<BeaconState>,
    pub system: Shared<SystemState>,
    pub upload: Shared<UploadState>,
}

impl Harness {
    pub fn new(config: MaintConfig) -> Self {
        Self::build(config, None, |_| {})
    }

    /// Harness with an upload service whose filesystem holds `files`.
    pub fn with_upload(config: MaintConfig, files: &[(&str, &[u8])]) -> Self {
        let fs = MemFs {
            files: files
                .iter()
                .map(|(p, d)| ((*p).to_string(), d.to_vec()))
                .collect(),
            capacity: 4096,
        };
        Self::build(config, Some(fs), |_| {})
    }

    /// Harness whose network mock is prepared by `net` before wiring.
    pub fn with_net(config: MaintConfig, net: impl FnOnce(&mut NetState)) -> Self {
        Self::build(config, None, net)
    }

    fn build(config: MaintConfig, fs: Option<MemFs>, prep: impl FnOnce(&mut NetState)) -> Self {
        let net = shared::<NetState>();
        prep(&mut net.borrow_mut());
        let discovery = shared();
        let update = shared();
        let console = shared();
        let beacon = shared();
        let system = shared();
        let upload = shared();

        let ports = MaintPorts {
            network: Box::new(MockNet(net.clone())),
            discovery: Box::new(MockDiscovery(Rc::clone(&discovery))),
            update: Box::new(MockUpdate(Rc::clone(&update))),
            console: Box::new(MockConsole(Rc::clone(&console))),
            beacon: Box::new(MockBeacon(Rc::clone(&beacon))),
            system: Box::new(MockSystem(Rc::clone(&system))),
            upload: fs.map(|fs| {
                Box::new(MockUpload {
                    state: Rc::clone(&upload),
                    fs,
                }) as Box<dyn UploadPort>
            }),
        };

        Self {
            ctl: MaintController::new(config, ports),
            sink: Recorder::new(),
            net,
            discovery,
            update,
            console,
            beacon,
            system,
            upload,
        }
    }

    pub fn enter(&mut self) {
        self.ctl.enter(0, &mut self.sink);
    }

    pub fn poll(&mut self, now_ms: u32) {
        self.ctl.poll(now_ms, &mut self.sink);
    }

    /// Connect a console client and let the controller accept it.
    pub fn connect_client(&mut self, now_ms: u32) -> Shared<SessionState> {
        let session = self.console.borrow_mut().connect();
        self.poll(now_ms);
        session
    }

    /// Type `line` on `session`, run one poll, return what was written.
    pub fn run_line(&mut self, session: &Shared<SessionState>, line: &str) -> String {
        session.borrow_mut().output.clear();
        session.borrow_mut().type_line(line);
        self.poll(0);
        session.borrow().output.clone()
    }
}

/// Config with station credentials, the default AP fallback and beacon.
pub fn sta_config() -> MaintConfig {
    MaintConfig::default()
        .with_credentials("workshop", "hunter2hunter2")
        .unwrap()
}
