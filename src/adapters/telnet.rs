//! Telnet console adapter.
//!
//! Implements [`ConsoleServer`] / [`ConsoleSession`] over plain TCP. The
//! listener and every client socket are non-blocking; `read_line` drains
//! whatever arrived and returns one complete line at a time. Reply bytes
//! the socket cannot take yet wait in an outbox and go out on later
//! writes and reads.
//!
//! Telnet option negotiation (`IAC` sequences) and non-printable bytes are
//! discarded so `nc` and real telnet clients behave the same.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

use log::{debug, info, warn};

use crate::app::ports::{ConsoleServer, ConsoleSession};
use crate::error::InitError;

/// Longest line kept; the rest of an overlong line is dropped.
const MAX_LINE_LEN: usize = 256;

/// Unsent reply bytes tolerated before the client counts as gone.
const MAX_PENDING: usize = 8 * 1024;

/// Telnet "interpret as command" escape.
const IAC: u8 = 0xFF;
/// Option negotiation verbs (WILL, WONT, DO, DONT) carry one option byte.
const NEGOTIATE: core::ops::RangeInclusive<u8> = 0xFB..=0xFE;
/// Subnegotiation begin / end.
const SB: u8 = 0xFA;
const SE: u8 = 0xF0;

// ───────────────────────────────────────────────────────────────
// Line decoder
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Escape {
    #[default]
    None,
    Command,
    Option,
    Sub,
    SubIac,
}

/// Byte-at-a-time telnet line assembler.
#[derive(Debug, Default)]
pub struct LineDecoder {
    current: Vec<u8>,
    ready: std::collections::VecDeque<String>,
    escape: Escape,
    overflow: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push_byte(b);
        }
    }

    pub fn next_line(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    fn push_byte(&mut self, b: u8) {
        self.escape = match (self.escape, b) {
            (Escape::None, IAC) => Escape::Command,
            (Escape::None, _) => {
                self.accept(b);
                Escape::None
            }
            // Escaped 0xFF is data, but never printable here.
            (Escape::Command, IAC) => Escape::None,
            (Escape::Command, SB) => Escape::Sub,
            (Escape::Command, v) if NEGOTIATE.contains(&v) => Escape::Option,
            (Escape::Command, _) | (Escape::Option, _) => Escape::None,
            (Escape::Sub, IAC) => Escape::SubIac,
            (Escape::Sub, _) => Escape::Sub,
            (Escape::SubIac, SE) => Escape::None,
            (Escape::SubIac, _) => Escape::Sub,
        };
    }

    fn accept(&mut self, b: u8) {
        match b {
            b'\n' => {
                let line = String::from_utf8_lossy(&self.current).into_owned();
                self.current.clear();
                self.overflow = false;
                self.ready.push_back(line);
            }
            b' '..=b'~' | b'\t' => {
                if self.current.len() < MAX_LINE_LEN {
                    self.current.push(b);
                } else if !self.overflow {
                    self.overflow = true;
                    debug!("telnet: line truncated at {} bytes", MAX_LINE_LEN);
                }
            }
            // '\r', NUL and other control bytes.
            _ => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Outbox
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Outbox {
    pending: Vec<u8>,
}

impl Outbox {
    /// Queue `bytes`; false once the backlog would pass [`MAX_PENDING`].
    fn queue(&mut self, bytes: &[u8]) -> bool {
        if self.pending.len() + bytes.len() > MAX_PENDING {
            return false;
        }
        self.pending.extend_from_slice(bytes);
        true
    }

    /// Write as much as `w` takes without blocking.
    fn flush(&mut self, w: &mut impl Write) -> io::Result<()> {
        let mut sent = 0;
        let result = loop {
            if sent == self.pending.len() {
                break Ok(());
            }
            match w.write(&self.pending[sent..]) {
                Ok(0) => break Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => sent += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        self.pending.drain(..sent);
        result
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// Session
// ───────────────────────────────────────────────────────────────

pub struct TelnetSession {
    stream: TcpStream,
    decoder: LineDecoder,
    outbox: Outbox,
    connected: bool,
}

impl TelnetSession {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            decoder: LineDecoder::new(),
            outbox: Outbox::default(),
            connected: true,
        }
    }

    fn flush_outbox(&mut self) {
        if let Err(e) = self.outbox.flush(&mut self.stream) {
            debug!("telnet: write failed: {}", e);
            self.connected = false;
        }
    }

    fn fill(&mut self) {
        let mut buf = [0u8; 128];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    self.connected = false;
                    return;
                }
                Ok(n) => self.decoder.push(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => {
                    self.connected = false;
                    return;
                }
            }
        }
    }
}

impl ConsoleSession for TelnetSession {
    fn read_line(&mut self) -> Option<String> {
        if self.connected && !self.outbox.is_empty() {
            self.flush_outbox();
        }
        if let Some(line) = self.decoder.next_line() {
            return Some(line);
        }
        if self.connected {
            self.fill();
        }
        self.decoder.next_line()
    }

    fn write_str(&mut self, text: &str) {
        if !self.connected {
            return;
        }
        if !self.outbox.queue(text.as_bytes()) {
            debug!("telnet: client not reading, dropping it");
            self.connected = false;
            return;
        }
        self.flush_outbox();
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        if self.connected {
            self.flush_outbox();
            let _ = self.stream.shutdown(std::net::Shutdown::Both);
            self.connected = false;
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Server
// ───────────────────────────────────────────────────────────────

pub struct TelnetServer {
    listener: Option<TcpListener>,
}

impl TelnetServer {
    pub fn new() -> Self {
        Self { listener: None }
    }

    pub fn local_port(&self) -> Option<u16> {
        self.listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
            .map(|a| a.port())
    }
}

impl Default for TelnetServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleServer for TelnetServer {
    fn begin(&mut self, port: u16) -> Result<(), InitError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|_| InitError::Listener("console"))?;
        listener
            .set_nonblocking(true)
            .map_err(|_| InitError::Listener("console"))?;
        self.listener = Some(listener);
        Ok(())
    }

    fn accept(&mut self) -> Option<Box<dyn ConsoleSession>> {
        let listener = self.listener.as_ref()?;
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!("telnet: set_nonblocking failed: {}", e);
                    return None;
                }
                let _ = stream.set_nodelay(true);
                info!("telnet: client {}", peer);
                Some(Box::new(TelnetSession::new(stream)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("telnet: accept failed: {}", e);
                None
            }
        }
    }
}
