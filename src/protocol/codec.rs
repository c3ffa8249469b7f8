//! Frame encoder and validating decoder.

use crate::error::ProtocolError;

use super::payload::{WireReader, WireWriter};
use super::{HEADER_LEN, MAX_FRAME_LEN, Message, MessageHeader, MsgType, PROTO_VERSION};

/// One encoded frame, sized for the smallest backend ceiling.
pub type Frame = heapless::Vec<u8, MAX_FRAME_LEN>;

/// Per-sender encoder holding the station id and the sequence counter.
///
/// The counter starts at zero, advances by one on every successful encode
/// and wraps at 16 bits.
#[derive(Debug, Clone)]
pub struct Encoder {
    src_station_id: u8,
    next_seq: u16,
}

impl Encoder {
    pub fn new(src_station_id: u8) -> Self {
        Self {
            src_station_id,
            next_seq: 0,
        }
    }

    /// Start from an arbitrary sequence number (tests, warm restarts).
    pub fn with_seq(src_station_id: u8, next_seq: u16) -> Self {
        Self {
            src_station_id,
            next_seq,
        }
    }

    pub fn next_seq(&self) -> u16 {
        self.next_seq
    }

    pub fn src_station_id(&self) -> u8 {
        self.src_station_id
    }

    /// Encode `msg` into a fresh [`Frame`].
    pub fn encode(&mut self, msg: &Message) -> Result<Frame, ProtocolError> {
        let mut frame = Frame::new();
        frame
            .resize_default(HEADER_LEN + msg.msg_type().payload_len())
            .map_err(|()| ProtocolError::FrameTooLarge)?;
        let n = self.encode_into(msg, &mut frame)?;
        frame.truncate(n);
        Ok(frame)
    }

    /// Encode `msg` into `out`, returning the number of bytes written.
    ///
    /// A buffer that is too small consumes no sequence number.
    pub fn encode_into(&mut self, msg: &Message, out: &mut [u8]) -> Result<usize, ProtocolError> {
        let ty = msg.msg_type();
        let payload_len = ty.payload_len();
        let total = HEADER_LEN + payload_len;
        if total > out.len() {
            return Err(ProtocolError::FrameTooLarge);
        }

        let header = MessageHeader {
            version: PROTO_VERSION,
            msg_type: ty,
            src_station_id: self.src_station_id,
            flags: 0,
            payload_len: payload_len as u16,
            seq: self.next_seq,
        };

        let mut w = WireWriter::new(&mut out[..total]);
        header.write(&mut w);
        msg.write_payload(&mut w);
        debug_assert_eq!(w.position(), total);

        self.next_seq = self.next_seq.wrapping_add(1);
        Ok(total)
    }
}

/// Validate and decode one frame.
///
/// Checks run in a fixed order so a frame with several defects always
/// reports the first: truncation, version, declared length, known type,
/// payload shape, then field contents.
pub fn decode(bytes: &[u8]) -> Result<(MessageHeader, Message), ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated);
    }

    let version = bytes[0];
    if version != PROTO_VERSION {
        return Err(ProtocolError::VersionMismatch { found: version });
    }

    let raw_type = bytes[1];
    let src_station_id = bytes[2];
    let flags = bytes[3];
    let payload_len = u16::from_le_bytes([bytes[4], bytes[5]]);
    let seq = u16::from_le_bytes([bytes[6], bytes[7]]);

    let body = &bytes[HEADER_LEN..];
    if payload_len as usize != body.len() {
        return Err(ProtocolError::LengthMismatch {
            declared: payload_len,
            actual: body.len(),
        });
    }

    let msg_type = MsgType::from_u8(raw_type).ok_or(ProtocolError::UnknownType(raw_type))?;
    let expected = msg_type.payload_len();
    if expected != body.len() {
        return Err(ProtocolError::ShapeMismatch {
            expected,
            actual: body.len(),
        });
    }

    let mut r = WireReader::new(body);
    let msg = Message::read_payload(msg_type, &mut r)?;

    let header = MessageHeader {
        version,
        msg_type,
        src_station_id,
        flags,
        payload_len,
        seq,
    };
    Ok((header, msg))
}
