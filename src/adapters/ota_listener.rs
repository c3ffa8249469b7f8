//! Firmware-update listener.
//!
//! Implements [`UpdatePort`] as a single-client, non-blocking TCP server
//! feeding [`OtaManager`].
//!
//! ## Wire exchange
//!
//! ```text
//!  client: TREXOTA <size> <sha256-hex>\n
//!  device: OK\n
//!  client: <size bytes of image>
//!  device: DONE\n            (digest verified, partition bootable)
//!      or  ERR <reason>\n
//! ```
//!
//! Each [`poll`](UpdatePort::poll) advances the session by at most one step
//! and reports at most one [`UpdateEvent`]. lwIP exposes BSD sockets, so
//! `std::net` serves both the device and host builds.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

use log::{info, warn};

use crate::app::ports::{UpdateEvent, UpdatePort};
use crate::error::InitError;
use crate::ota::{OtaError, OtaManager, parse_sha256_hex};

/// Request line keyword.
const MAGIC: &str = "TREXOTA";

/// Longest accepted request line.
const MAX_REQUEST_LEN: usize = 128;

/// Socket read size while streaming the image.
const CHUNK_LEN: usize = 1460;

/// Reads drained per poll before yielding back to the loop.
const CHUNKS_PER_POLL: usize = 16;

/// Parse `TREXOTA <size> <sha256-hex>`.
pub fn parse_request(line: &str) -> Result<(u32, [u8; 32]), OtaError> {
    let mut parts = line.split_ascii_whitespace();
    if parts.next() != Some(MAGIC) {
        return Err(OtaError::BadRequest);
    }
    let size = parts
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or(OtaError::BadRequest)?;
    let sha = parts
        .next()
        .ok_or(OtaError::BadRequest)
        .and_then(|h| parse_sha256_hex(h).ok_or(OtaError::InvalidSha))?;
    if parts.next().is_some() {
        return Err(OtaError::BadRequest);
    }
    Ok((size, sha))
}

enum Session {
    Idle,
    Request {
        stream: TcpStream,
        line: Vec<u8>,
    },
    Receiving {
        stream: TcpStream,
        size: u32,
        received: u32,
    },
}

pub struct OtaListener {
    listener: Option<TcpListener>,
    session: Session,
    ota: OtaManager,
}

impl OtaListener {
    pub fn new() -> Self {
        Self {
            listener: None,
            session: Session::Idle,
            ota: OtaManager::new(),
        }
    }

    /// Bound port, once listening. Useful when started on port 0.
    pub fn local_port(&self) -> Option<u16> {
        self.listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
            .map(|a| a.port())
    }

    fn accept(&mut self) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };
        match listener.accept() {
            Ok((stream, peer)) => {
                if stream.set_nonblocking(true).is_err() {
                    return;
                }
                let _ = stream.set_nodelay(true);
                info!("[OTA] client {}", peer);
                self.session = Session::Request {
                    stream,
                    line: Vec::with_capacity(MAX_REQUEST_LEN),
                };
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("[OTA] accept failed: {}", e),
        }
    }

    /// Read the request line. `None` while incomplete.
    fn read_request(
        stream: &mut TcpStream,
        line: &mut Vec<u8>,
    ) -> Option<Result<String, OtaError>> {
        let mut byte = [0u8; 1];
        loop {
            match stream.read(&mut byte) {
                Ok(0) => return Some(Err(OtaError::ConnectionLost)),
                Ok(_) if byte[0] == b'\n' => {
                    let text = String::from_utf8_lossy(line).trim().to_string();
                    return Some(Ok(text));
                }
                Ok(_) if line.len() >= MAX_REQUEST_LEN => {
                    return Some(Err(OtaError::BadRequest));
                }
                Ok(_) => line.push(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return None,
                Err(_) => return Some(Err(OtaError::ConnectionLost)),
            }
        }
    }

    fn fail(&mut self, mut stream: TcpStream, error: OtaError) -> Option<UpdateEvent> {
        let _ = writeln!(stream, "ERR {}", error);
        self.ota.abort();
        self.session = Session::Idle;
        Some(UpdateEvent::Failed(error))
    }

    fn step_request(&mut self, mut stream: TcpStream, mut line: Vec<u8>) -> Option<UpdateEvent> {
        let request = match Self::read_request(&mut stream, &mut line) {
            None => {
                self.session = Session::Request { stream, line };
                return None;
            }
            Some(Ok(request)) => request,
            Some(Err(OtaError::ConnectionLost)) => {
                self.session = Session::Idle;
                return None;
            }
            Some(Err(e)) => return self.fail(stream, e),
        };

        let (size, sha) = match parse_request(&request) {
            Ok(parsed) => parsed,
            Err(e) => return self.fail(stream, e),
        };
        if let Err(e) = self.ota.begin(size, sha) {
            return self.fail(stream, e);
        }
        if stream.write_all(b"OK\n").is_err() {
            self.ota.abort();
            self.session = Session::Idle;
            return Some(UpdateEvent::Failed(OtaError::ConnectionLost));
        }

        self.session = Session::Receiving {
            stream,
            size,
            received: 0,
        };
        Some(UpdateEvent::Started { size })
    }

    fn step_receive(
        &mut self,
        mut stream: TcpStream,
        size: u32,
        mut received: u32,
    ) -> Option<UpdateEvent> {
        let mut buf = [0u8; CHUNK_LEN];
        let mut progressed = false;

        for _ in 0..CHUNKS_PER_POLL {
            let want = (size - received).min(CHUNK_LEN as u32) as usize;
            if want == 0 {
                break;
            }
            match stream.read(&mut buf[..want]) {
                Ok(0) => return self.fail(stream, OtaError::ConnectionLost),
                Ok(n) => match self.ota.write_chunk(received, &buf[..n]) {
                    Ok(total) => {
                        received = total;
                        progressed = true;
                    }
                    Err(e) => return self.fail(stream, e),
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(_) => return self.fail(stream, OtaError::ConnectionLost),
            }
        }

        if received == size {
            return match self.ota.finalize() {
                Ok(()) => {
                    let _ = stream.write_all(b"DONE\n");
                    let _ = stream.flush();
                    self.session = Session::Idle;
                    Some(UpdateEvent::Completed)
                }
                Err(e) => self.fail(stream, e),
            };
        }

        self.session = Session::Receiving {
            stream,
            size,
            received,
        };
        progressed.then_some(UpdateEvent::Progress {
            received,
            total: size,
        })
    }
}

impl Default for OtaListener {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdatePort for OtaListener {
    fn begin(&mut self, port: u16) -> Result<(), InitError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|_| InitError::Listener("update"))?;
        listener
            .set_nonblocking(true)
            .map_err(|_| InitError::Listener("update"))?;
        self.listener = Some(listener);
        Ok(())
    }

    fn poll(&mut self) -> Option<UpdateEvent> {
        match core::mem::replace(&mut self.session, Session::Idle) {
            Session::Idle => {
                self.accept();
                None
            }
            Session::Request { stream, line } => self.step_request(stream, line),
            Session::Receiving {
                stream,
                size,
                received,
            } => self.step_receive(stream, size, received),
        }
    }
}
