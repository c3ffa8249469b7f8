//! UDP telemetry beacon.
//!
//! Implements [`BeaconPort`]: every record goes out as one datagram to the
//! limited broadcast address on the beacon port.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use log::info;

use crate::app::ports::BeaconPort;
use crate::error::{InitError, TransportError};
use crate::transport::udp::{DatagramSocket, bind_broadcast};

pub struct UdpBeacon {
    socket: Option<UdpSocket>,
    target_ip: Ipv4Addr,
    target: SocketAddrV4,
}

impl UdpBeacon {
    /// Beacon aimed at `255.255.255.255`.
    pub fn new() -> Self {
        Self::with_target(Ipv4Addr::BROADCAST)
    }

    /// Beacon aimed at a fixed address instead of broadcast.
    pub fn with_target(ip: Ipv4Addr) -> Self {
        Self {
            socket: None,
            target_ip: ip,
            target: SocketAddrV4::new(ip, 0),
        }
    }

    pub fn target(&self) -> SocketAddrV4 {
        self.target
    }
}

impl Default for UdpBeacon {
    fn default() -> Self {
        Self::new()
    }
}

impl BeaconPort for UdpBeacon {
    fn begin(&mut self, port: u16) -> Result<(), InitError> {
        // Ephemeral source port; listeners only care about the destination.
        let socket = bind_broadcast(0).map_err(|_| InitError::Listener("beacon"))?;
        self.target = SocketAddrV4::new(self.target_ip, port);
        self.socket = Some(socket);
        info!("beacon: -> {}", self.target);
        Ok(())
    }

    fn send(&mut self, record: &str) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotInitialized)?;
        if record.is_empty() {
            return Err(TransportError::EmptyPayload);
        }
        match DatagramSocket::send_to(socket, record.as_bytes(), self.target) {
            Ok(n) if n == record.len() => Ok(()),
            _ => Err(TransportError::SendFailed),
        }
    }
}
