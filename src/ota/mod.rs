//! Firmware image writer, backed by the `esp-ota` crate.
//!
//! Flow: begin(size, sha256) → N × write_chunk → finalize → restart
//!
//! Every chunk is fed into a running SHA-256; `finalize` refuses to mark
//! the partition bootable unless the digest matches the one announced at
//! `begin`.

use core::fmt;
use hmac_sha256::Hash;
use log::{info, warn};

const MAX_FIRMWARE_SIZE: u32 = 4 * 1024 * 1024; // 4 MB

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    AlreadyInProgress,
    InvalidSize,
    InvalidSha,
    BeginFailed,
    WriteFailed,
    DigestMismatch,
    VerifyFailed,
    BootSetFailed,
    IncompleteTransfer,
    NotReceiving,
    NonSequential,
    Overflow,
    /// Client vanished mid-transfer.
    ConnectionLost,
    /// Malformed request line.
    BadRequest,
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInProgress => write!(f, "update already in progress"),
            Self::InvalidSize => write!(f, "image size out of range (max 4 MB)"),
            Self::InvalidSha => write!(f, "SHA-256 must be 64 hex digits"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::DigestMismatch => write!(f, "SHA-256 mismatch"),
            Self::VerifyFailed => write!(f, "image verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::IncompleteTransfer => write!(f, "finalize before all bytes written"),
            Self::NotReceiving => write!(f, "no update in progress"),
            Self::NonSequential => write!(f, "chunk offset does not match expected offset"),
            Self::Overflow => write!(f, "chunk would exceed declared size"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::BadRequest => write!(f, "bad request"),
        }
    }
}

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    Receiving {
        expected_size: u32,
        bytes_written: u32,
    },
    ReadyToReboot,
    Failed,
}

/// Decode 64 hex digits into a digest.
pub fn parse_sha256_hex(hex: &str) -> Option<[u8; 32]> {
    let bytes = hex.as_bytes();
    if bytes.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out[i] = (hi * 16 + lo) as u8;
    }
    Some(out)
}

// ── Manager ───────────────────────────────────────────────────

/// OTA partition writer.
///
/// On ESP-IDF targets, writes through `esp-ota`. On simulation targets only
/// the digest is computed.
pub struct OtaManager {
    state: OtaState,
    expected_sha256: [u8; 32],
    hasher: Hash,
    #[cfg(target_os = "espidf")]
    ota_update: Option<esp_ota::OtaUpdate>,
}

impl OtaManager {
    pub fn new() -> Self {
        Self {
            state: OtaState::Idle,
            expected_sha256: [0u8; 32],
            hasher: Hash::new(),
            #[cfg(target_os = "espidf")]
            ota_update: None,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    /// Open the inactive partition for an image of `firmware_size` bytes.
    pub fn begin(&mut self, firmware_size: u32, sha256: [u8; 32]) -> Result<(), OtaError> {
        if matches!(self.state, OtaState::Receiving { .. }) {
            return Err(OtaError::AlreadyInProgress);
        }
        if firmware_size == 0 || firmware_size > MAX_FIRMWARE_SIZE {
            return Err(OtaError::InvalidSize);
        }

        self.expected_sha256 = sha256;
        self.hasher = Hash::new();

        #[cfg(target_os = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                OtaError::BeginFailed
            })?;
            self.ota_update = Some(update);
        }

        self.state = OtaState::Receiving {
            expected_size: firmware_size,
            bytes_written: 0,
        };
        info!("[OTA] begin ({} bytes)", firmware_size);
        Ok(())
    }

    /// Write a chunk at the given byte offset. Returns total bytes written.
    pub fn write_chunk(&mut self, offset: u32, data: &[u8]) -> Result<u32, OtaError> {
        let OtaState::Receiving {
            expected_size,
            bytes_written,
        } = self.state
        else {
            return Err(OtaError::NotReceiving);
        };

        if offset != bytes_written {
            return Err(OtaError::NonSequential);
        }
        if bytes_written as usize + data.len() > expected_size as usize {
            return Err(OtaError::Overflow);
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.ota_update.as_mut() else {
                return Err(OtaError::NotReceiving);
            };
            if let Err(e) = update.write(data) {
                warn!("esp-ota write failed: {:?}", e);
                self.abort();
                return Err(OtaError::WriteFailed);
            }
        }

        self.hasher.update(data);
        let new_written = bytes_written + data.len() as u32;
        self.state = OtaState::Receiving {
            expected_size,
            bytes_written: new_written,
        };
        Ok(new_written)
    }

    /// Verify the digest, finalize the image and mark it bootable.
    pub fn finalize(&mut self) -> Result<(), OtaError> {
        match self.state {
            OtaState::Receiving {
                expected_size,
                bytes_written,
            } if bytes_written == expected_size => {}
            OtaState::Receiving { .. } => return Err(OtaError::IncompleteTransfer),
            _ => return Err(OtaError::NotReceiving),
        }

        let digest = core::mem::replace(&mut self.hasher, Hash::new()).finalize();
        if digest != self.expected_sha256 {
            warn!("[OTA] digest mismatch, discarding image");
            self.abort();
            self.state = OtaState::Failed;
            return Err(OtaError::DigestMismatch);
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.ota_update.take() else {
                self.state = OtaState::Failed;
                return Err(OtaError::NotReceiving);
            };
            let mut completed = update.finalize().map_err(|e| {
                warn!("esp-ota finalize failed: {:?}", e);
                self.state = OtaState::Failed;
                OtaError::VerifyFailed
            })?;
            completed.set_as_boot_partition().map_err(|e| {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                self.state = OtaState::Failed;
                OtaError::BootSetFailed
            })?;
        }

        self.state = OtaState::ReadyToReboot;
        info!("[OTA] image verified, ready to reboot");
        Ok(())
    }

    /// Drop the current session; resets to Idle.
    pub fn abort(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            // esp-ota aborts automatically when OtaUpdate is dropped
            self.ota_update.take();
        }
        if matches!(self.state, OtaState::Receiving { .. }) {
            warn!("[OTA] aborted");
        }
        self.state = OtaState::Idle;
    }
}

impl Default for OtaManager {
    fn default() -> Self {
        Self::new()
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image valid so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("[OTA] firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("[OTA] mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    info!("[OTA] rollback check (simulation): skipped");
}

// ── Tests ─────────────────────────────────────────────────────
