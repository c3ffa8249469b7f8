//! Fixed-layout payload records and the little-endian field codec.
//!
//! Each record is a flat list of fixed-width fields; its encoded size is the
//! sum of the field sizes, known at compile time as [`WirePayload::LEN`].
//! Enumerated values (station type, light state, reasons) travel as raw `u8`
//! so the core never rejects a value game logic may add later.

use crate::error::ProtocolError;

use super::uid::{TrexUid, UID_CAPACITY};
use super::{FW_MAJOR, FW_MINOR, StationType};

// ───────────────────────────────────────────────────────────────
// Cursor types
// ───────────────────────────────────────────────────────────────

/// Sequential writer over a buffer already sized by the caller.
pub struct WireWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WireWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Sequential reader; running out of bytes is [`ProtocolError::Truncated`].
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos.checked_add(n).ok_or(ProtocolError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(ProtocolError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

// ───────────────────────────────────────────────────────────────
// Field and record traits
// ───────────────────────────────────────────────────────────────

/// A fixed-width field inside a payload record.
pub trait WireField: Sized {
    const SIZE: usize;
    fn put(&self, w: &mut WireWriter<'_>);
    fn take(r: &mut WireReader<'_>) -> Result<Self, ProtocolError>;
}

impl WireField for u8 {
    const SIZE: usize = 1;
    fn put(&self, w: &mut WireWriter<'_>) {
        w.put(&[*self]);
    }
    fn take(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(r.array::<1>()?[0])
    }
}

impl WireField for u16 {
    const SIZE: usize = 2;
    fn put(&self, w: &mut WireWriter<'_>) {
        w.put(&self.to_le_bytes());
    }
    fn take(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self::from_le_bytes(r.array()?))
    }
}

impl WireField for u32 {
    const SIZE: usize = 4;
    fn put(&self, w: &mut WireWriter<'_>) {
        w.put(&self.to_le_bytes());
    }
    fn take(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self::from_le_bytes(r.array()?))
    }
}

impl WireField for [u8; 6] {
    const SIZE: usize = 6;
    fn put(&self, w: &mut WireWriter<'_>) {
        w.put(self);
    }
    fn take(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        r.array()
    }
}

/// `len: u8` followed by the padded 10-byte field.
impl WireField for TrexUid {
    const SIZE: usize = 1 + UID_CAPACITY;
    fn put(&self, w: &mut WireWriter<'_>) {
        w.put(&[self.wire_len()]);
        w.put(self.raw());
    }
    fn take(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let len = u8::take(r)?;
        TrexUid::from_wire(len, r.array()?)
    }
}

/// A complete payload record with a compile-time encoded size.
pub trait WirePayload: Sized {
    const LEN: usize;
    fn write(&self, w: &mut WireWriter<'_>);
    fn read(r: &mut WireReader<'_>) -> Result<Self, ProtocolError>;
}

macro_rules! wire_payload {
    ($(#[$meta:meta])* $name:ident { $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )+
        }

        impl WirePayload for $name {
            const LEN: usize = 0 $( + <$ty as WireField>::SIZE )+;

            fn write(&self, w: &mut WireWriter<'_>) {
                $( self.$field.put(w); )+
            }

            fn read(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
                Ok(Self {
                    $( $field: <$ty as WireField>::take(r)?, )+
                })
            }
        }
    };
}

// ───────────────────────────────────────────────────────────────
// Records
// ───────────────────────────────────────────────────────────────

wire_payload! {
    /// Station announcement.
    Hello {
        /// [`StationType`] as a raw byte.
        station_type: u8,
        station_id: u8,
        fw_major: u8,
        fw_minor: u8,
        wifi_channel: u8,
        mac: [u8; 6],
    }
}

impl Hello {
    /// Announcement for this firmware build.
    pub fn for_station(station_type: StationType, station_id: u8, wifi_channel: u8, mac: [u8; 6]) -> Self {
        Self {
            station_type: station_type as u8,
            station_id,
            fw_major: FW_MAJOR,
            fw_minor: FW_MINOR,
            wifi_channel,
            mac,
        }
    }
}

wire_payload! {
    Heartbeat {
        uptime_ms: u32,
    }
}

wire_payload! {
    StateTick {
        /// [`super::LightState`] as a raw byte.
        state: u8,
        ms_left: u32,
    }
}

wire_payload! {
    GameOver {
        reason: u8,
    }
}

wire_payload! {
    ScoreUpdate {
        team_score: u32,
    }
}

wire_payload! {
    StationUpdate {
        station_id: u8,
        inventory: u16,
        capacity: u16,
    }
}

wire_payload! {
    /// Player started holding at a loot station; `hold_id` is random per attempt.
    LootHoldStart {
        hold_id: u32,
        uid: TrexUid,
        station_id: u8,
    }
}

wire_payload! {
    LootHoldAck {
        hold_id: u32,
        accepted: u8,
        rate_hz: u8,
        max_carry: u8,
        carried: u8,
        inventory: u16,
        capacity: u16,
        deny_reason: u8,
    }
}

wire_payload! {
    LootTick {
        hold_id: u32,
        carried: u8,
        inventory: u16,
    }
}

wire_payload! {
    LootHoldStop {
        hold_id: u32,
    }
}

wire_payload! {
    HoldEnd {
        hold_id: u32,
        reason: u8,
    }
}

wire_payload! {
    DropRequest {
        uid: TrexUid,
        reader_index: u8,
    }
}

wire_payload! {
    DropResult {
        dropped: u16,
        team_score: u32,
    }
}

wire_payload! {
    /// Runtime tunable pushed by the hub. `target_station` of
    /// [`super::ALL_STATIONS`] addresses every station; keys are owned by
    /// game logic.
    ConfigUpdate {
        target_station: u8,
        key: u8,
        value: u32,
    }
}
