//! TREX station wire protocol.
//!
//! Every frame is an 8-byte header followed by exactly `payload_len` bytes
//! whose shape is fixed by the message type:
//!
//! ```text
//! ┌─────────┬──────┬─────────────┬───────┬──────────────┬──────────┐
//! │ version │ type │ src_station │ flags │ payload_len  │ seq      │
//! │ u8      │ u8   │ u8          │ u8    │ u16 LE       │ u16 LE   │
//! └─────────┴──────┴─────────────┴───────┴──────────────┴──────────┘
//! ```
//!
//! **Byte order:** every multi-byte integer in the header and in every
//! payload is little-endian. Fields are packed in declaration order with no
//! padding. All stations in a fleet must agree on this bit-for-bit.
//!
//! The catalog below is the single source of truth mapping a [`MsgType`] to
//! its payload struct; [`Message`] carries one decoded payload.

mod codec;
pub mod payload;
mod uid;

pub use codec::{Encoder, Frame, decode};
pub use payload::{
    ConfigUpdate, DropRequest, DropResult, GameOver, Heartbeat, Hello, HoldEnd, LootHoldAck,
    LootHoldStart, LootHoldStop, LootTick, ScoreUpdate, StateTick, StationUpdate, WirePayload,
};
pub use uid::TrexUid;

use crate::error::ProtocolError;
use payload::{WireReader, WireWriter};
use serde::{Deserialize, Serialize};

/// Protocol revision carried in every header. Frames with any other value are
/// rejected.
pub const PROTO_VERSION: u8 = 1;

/// Encoded header size in bytes.
pub const HEADER_LEN: usize = 8;

/// Largest frame any backend is asked to carry (peer-radio payload ceiling).
pub const MAX_FRAME_LEN: usize = 250;

/// `CONFIG_UPDATE.target_station` value addressing every station.
pub const ALL_STATIONS: u8 = 0xFF;

/// Firmware version advertised in HELLO, taken from the crate version.
pub const FW_MAJOR: u8 = parse_u8(env!("CARGO_PKG_VERSION_MAJOR"));
pub const FW_MINOR: u8 = parse_u8(env!("CARGO_PKG_VERSION_MINOR"));

const fn parse_u8(s: &str) -> u8 {
    let bytes = s.as_bytes();
    let mut value: u8 = 0;
    let mut i = 0;
    while i < bytes.len() {
        value = value.wrapping_mul(10).wrapping_add(bytes[i] - b'0');
        i += 1;
    }
    value
}

// ───────────────────────────────────────────────────────────────
// Station and light enums
// ───────────────────────────────────────────────────────────────

/// Role of a physical station in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StationType {
    Hub = 0,
    Loot = 1,
    Drop = 2,
}

impl StationType {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Hub),
            1 => Some(Self::Loot),
            2 => Some(Self::Drop),
            _ => None,
        }
    }

    /// Short label used on the console, in the beacon and in mDNS TXT records.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hub => "trex",
            Self::Loot => "loot",
            Self::Drop => "drop",
        }
    }
}

/// Label for a raw station-type byte; `"unk"` for values outside the enum.
pub const fn station_label(raw: u8) -> &'static str {
    match StationType::from_u8(raw) {
        Some(t) => t.label(),
        None => "unk",
    }
}

/// Hub light phase. The core carries it as a raw byte in [`StateTick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LightState {
    Green = 0,
    Red = 1,
}

impl LightState {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Green),
            1 => Some(Self::Red),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Message catalog
// ───────────────────────────────────────────────────────────────

macro_rules! message_catalog {
    ($( $(#[$meta:meta])* $variant:ident = $code:literal => $payload:ty ),+ $(,)?) => {
        /// Message type byte in the header.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum MsgType {
            $( $(#[$meta])* $variant = $code, )+
        }

        impl MsgType {
            /// Every catalog entry, in wire-value order.
            pub const ALL: &'static [MsgType] = &[$( MsgType::$variant, )+];

            pub const fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $( $code => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Exact encoded payload size for this type.
            pub const fn payload_len(self) -> usize {
                match self {
                    $( Self::$variant => <$payload as WirePayload>::LEN, )+
                }
            }
        }

        /// One decoded (or to-be-encoded) payload, tagged by its type.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Message {
            $( $variant($payload), )+
        }

        impl Message {
            pub const fn msg_type(&self) -> MsgType {
                match self {
                    $( Self::$variant(_) => MsgType::$variant, )+
                }
            }

            pub(crate) fn write_payload(&self, w: &mut WireWriter<'_>) {
                match self {
                    $( Self::$variant(p) => p.write(w), )+
                }
            }

            pub(crate) fn read_payload(
                ty: MsgType,
                r: &mut WireReader<'_>,
            ) -> Result<Self, ProtocolError> {
                match ty {
                    $( MsgType::$variant => Ok(Self::$variant(<$payload as WirePayload>::read(r)?)), )+
                }
            }
        }

        $(
            impl From<$payload> for Message {
                fn from(p: $payload) -> Self {
                    Self::$variant(p)
                }
            }
        )+
    };
}

message_catalog! {
    /// Station announces itself after transport init.
    Hello = 1 => Hello,
    Heartbeat = 2 => Heartbeat,
    /// Hub light phase and time left in it.
    StateTick = 10 => StateTick,
    GameOver = 11 => GameOver,
    ScoreUpdate = 12 => ScoreUpdate,
    StationUpdate = 13 => StationUpdate,
    LootHoldStart = 20 => LootHoldStart,
    LootHoldAck = 21 => LootHoldAck,
    LootTick = 22 => LootTick,
    LootHoldStop = 23 => LootHoldStop,
    HoldEnd = 24 => HoldEnd,
    DropRequest = 30 => DropRequest,
    DropResult = 31 => DropResult,
    ConfigUpdate = 40 => ConfigUpdate,
}

// ───────────────────────────────────────────────────────────────
// Header
// ───────────────────────────────────────────────────────────────

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u8,
    pub msg_type: MsgType,
    pub src_station_id: u8,
    /// Reserved; always zero on send, ignored on receive.
    pub flags: u8,
    pub payload_len: u16,
    pub seq: u16,
}

impl MessageHeader {
    pub(crate) fn write(&self, w: &mut WireWriter<'_>) {
        w.put(&[self.version, self.msg_type as u8, self.src_station_id, self.flags]);
        w.put(&self.payload_len.to_le_bytes());
        w.put(&self.seq.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_wire_values() {
        assert_eq!(MsgType::Hello as u8, 1);
        assert_eq!(MsgType::Heartbeat as u8, 2);
        assert_eq!(MsgType::StateTick as u8, 10);
        assert_eq!(MsgType::LootHoldStart as u8, 20);
        assert_eq!(MsgType::HoldEnd as u8, 24);
        assert_eq!(MsgType::DropRequest as u8, 30);
        assert_eq!(MsgType::ConfigUpdate as u8, 40);
        assert_eq!(MsgType::ALL.len(), 14);
    }

    #[test]
    fn from_u8_round_trips_every_entry() {
        for &ty in MsgType::ALL {
            assert_eq!(MsgType::from_u8(ty as u8), Some(ty));
        }
        assert_eq!(MsgType::from_u8(0), None);
        assert_eq!(MsgType::from_u8(3), None);
        assert_eq!(MsgType::from_u8(255), None);
    }

    #[test]
    fn payload_sizes_match_layout() {
        assert_eq!(MsgType::Hello.payload_len(), 11);
        assert_eq!(MsgType::Heartbeat.payload_len(), 4);
        assert_eq!(MsgType::StateTick.payload_len(), 5);
        assert_eq!(MsgType::GameOver.payload_len(), 1);
        assert_eq!(MsgType::ScoreUpdate.payload_len(), 4);
        assert_eq!(MsgType::StationUpdate.payload_len(), 5);
        assert_eq!(MsgType::LootHoldStart.payload_len(), 16);
        assert_eq!(MsgType::LootHoldAck.payload_len(), 13);
        assert_eq!(MsgType::LootTick.payload_len(), 7);
        assert_eq!(MsgType::LootHoldStop.payload_len(), 4);
        assert_eq!(MsgType::HoldEnd.payload_len(), 5);
        assert_eq!(MsgType::DropRequest.payload_len(), 12);
        assert_eq!(MsgType::DropResult.payload_len(), 6);
        assert_eq!(MsgType::ConfigUpdate.payload_len(), 6);
    }

    #[test]
    fn every_payload_fits_a_radio_frame() {
        for &ty in MsgType::ALL {
            assert!(HEADER_LEN + ty.payload_len() <= MAX_FRAME_LEN);
        }
    }

    #[test]
    fn station_labels() {
        assert_eq!(StationType::Hub.label(), "trex");
        assert_eq!(station_label(1), "loot");
        assert_eq!(station_label(2), "drop");
        assert_eq!(station_label(9), "unk");
    }

    #[test]
    fn firmware_version_follows_crate_version() {
        assert_eq!(FW_MAJOR, 0);
        assert_eq!(FW_MINOR, 5);
    }

    #[test]
    fn light_state_from_u8() {
        assert_eq!(LightState::from_u8(0), Some(LightState::Green));
        assert_eq!(LightState::from_u8(1), Some(LightState::Red));
        assert_eq!(LightState::from_u8(2), None);
    }
}
