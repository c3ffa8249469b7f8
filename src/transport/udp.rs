//! IP-broadcast backend.
//!
//! Binds one well-known datagram port, sends every frame to the subnet
//! broadcast address and reads at most one datagram per [`Transport::poll`].
//! Used while the station is on Wi-Fi (maintenance mode) and on host
//! builds.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use log::{debug, info, warn};

use super::{Transport, TransportConfig};
use crate::error::TransportError;

/// Receive buffer; larger datagrams are truncated by the socket.
pub const RX_BUF_LEN: usize = 512;

/// Minimal datagram socket surface, so tests can substitute an in-memory
/// socket.
pub trait DatagramSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddrV4) -> io::Result<usize>;

    /// Non-blocking receive; `WouldBlock` when nothing is pending.
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

impl DatagramSocket for UdpSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddrV4) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv_from(buf).map(|(n, _)| n)
    }
}

/// Bind `0.0.0.0:port` non-blocking with broadcast enabled.
pub fn bind_broadcast(port: u16) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Socket factory invoked by `init` with the configured port.
pub type Binder<S> = Box<dyn FnMut(u16) -> io::Result<S>>;

pub struct UdpBroadcastBackend<S: DatagramSocket = UdpSocket> {
    bind: Binder<S>,
    socket: Option<S>,
    target: SocketAddrV4,
    rx_buf: [u8; RX_BUF_LEN],
}

impl UdpBroadcastBackend<UdpSocket> {
    pub fn new() -> Self {
        Self::with_binder(Box::new(bind_broadcast))
    }
}

impl Default for UdpBroadcastBackend<UdpSocket> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DatagramSocket> UdpBroadcastBackend<S> {
    pub fn with_binder(bind: Binder<S>) -> Self {
        Self {
            bind,
            socket: None,
            target: SocketAddrV4::new(Ipv4Addr::BROADCAST, super::DEFAULT_UDP_PORT),
            rx_buf: [0; RX_BUF_LEN],
        }
    }

    /// Bound socket, once `init` succeeded.
    pub fn socket(&self) -> Option<&S> {
        self.socket.as_ref()
    }

    pub fn target(&self) -> SocketAddrV4 {
        self.target
    }

    fn send_frame(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if data.is_empty() {
            return Err(TransportError::EmptyPayload);
        }
        let socket = self.socket.as_ref().ok_or(TransportError::NotInitialized)?;
        if data.len() > RX_BUF_LEN {
            return Err(TransportError::TooLarge);
        }
        match socket.send_to(data, self.target) {
            Ok(n) if n == data.len() => Ok(()),
            Ok(n) => {
                debug!("[UDP] short write {}/{}", n, data.len());
                Err(TransportError::SendFailed)
            }
            Err(e) => {
                debug!("[UDP] send failed: {}", e);
                Err(TransportError::SendFailed)
            }
        }
    }
}

impl<S: DatagramSocket> Transport for UdpBroadcastBackend<S> {
    fn name(&self) -> &'static str {
        "udp-broadcast"
    }

    fn init(&mut self, config: &TransportConfig) -> Result<(), TransportError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = (self.bind)(config.udp_port).map_err(|e| {
            warn!("[UDP] bind :{} failed: {}", config.udp_port, e);
            TransportError::InitFailed
        })?;
        self.target = SocketAddrV4::new(Ipv4Addr::from(config.broadcast_ip), config.udp_port);
        self.socket = Some(socket);
        info!("[UDP] listening on :{}, sending to {}", config.udp_port, self.target);
        Ok(())
    }

    fn send_to_server(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.send_frame(data)
    }

    fn broadcast(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.send_frame(data)
    }

    fn poll(&mut self, handler: &mut dyn FnMut(&[u8])) {
        let Some(socket) = self.socket.as_ref() else {
            return;
        };
        match socket.recv(&mut self.rx_buf) {
            Ok(0) => {}
            Ok(n) => handler(&self.rx_buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => debug!("[UDP] recv error: {}", e),
        }
    }
}
