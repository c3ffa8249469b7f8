//! Unified error types for the TREX station firmware.
//!
//! Every subsystem error is a small `Copy` enum with a `Display` impl and a
//! `From` conversion into [`Error`], so the main loop can log and continue
//! without allocating.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible core operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A frame could not be encoded or decoded.
    Protocol(ProtocolError),
    /// A transport backend refused or failed a call.
    Transport(TransportError),
    /// A console line named no known command.
    Console(ConsoleError),
    /// A hard dependency could not be brought up.
    Init(InitError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Console(e) => write!(f, "console: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// Reasons a frame is rejected by the codec.
///
/// Receivers drop the frame and log; none of these is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than a header.
    Truncated,
    /// Header version differs from [`crate::protocol::PROTO_VERSION`].
    VersionMismatch { found: u8 },
    /// `payload_len` disagrees with the number of bytes after the header.
    LengthMismatch { declared: u16, actual: usize },
    /// Message type is not in the catalog.
    UnknownType(u8),
    /// Payload size does not match the catalog entry for its type.
    ShapeMismatch { expected: usize, actual: usize },
    /// A UID field has an illegal length or non-zero padding.
    MalformedUid,
    /// Encoded frame does not fit the output buffer.
    FrameTooLarge,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "frame shorter than header"),
            Self::VersionMismatch { found } => write!(f, "unsupported version {found}"),
            Self::LengthMismatch { declared, actual } => {
                write!(f, "payload length {declared} declared, {actual} present")
            }
            Self::UnknownType(t) => write!(f, "unknown message type {t}"),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "payload is {actual} bytes, type needs {expected}")
            }
            Self::MalformedUid => write!(f, "malformed UID"),
            Self::FrameTooLarge => write!(f, "frame too large"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// `send`/`broadcast` called before a successful `init`.
    NotInitialized,
    /// Zero-length payload; the send primitive is never invoked.
    EmptyPayload,
    /// Payload exceeds the backend's frame ceiling.
    TooLarge,
    /// Backend could not start (channel lock, stack init, socket bind).
    InitFailed,
    /// The underlying send primitive reported failure or a short write.
    SendFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "transport not initialised"),
            Self::EmptyPayload => write!(f, "empty payload"),
            Self::TooLarge => write!(f, "payload too large"),
            Self::InitFailed => write!(f, "transport init failed"),
            Self::SendFailed => write!(f, "send failed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Console errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleError {
    /// Neither a built-in nor the external handler accepted the line.
    Unrecognized,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized => write!(f, "unrecognized command"),
        }
    }
}

impl From<ConsoleError> for Error {
    fn from(e: ConsoleError) -> Self {
        Self::Console(e)
    }
}

// ---------------------------------------------------------------------------
// Init errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    Radio,
    Network,
    Listener(&'static str),
    Storage,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio => write!(f, "radio stack"),
            Self::Network => write!(f, "network stack"),
            Self::Listener(name) => write!(f, "{name} listener"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Self::Init(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
