//! Frame validator: decides whether a received buffer may be forwarded.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. At least [`HEADER_SIZE`] bytes.
//! 2. Magic byte equals [`FRAME_MAGIC`].
//! 3. Declared length equals `buffer.len() - HEADER_SIZE`.
//! 4. If the sensitive option is set, the checksum verifies.
//!
//! The buffer is treated as exactly one frame: trailing bytes from a second
//! frame, or a frame split across reads, fail the length check.

use thiserror::Error;

use crate::protocol::checksum::frame_checksum;
use crate::protocol::frame::{FrameHeader, FRAME_MAGIC, HEADER_SIZE};

/// Reasons a buffer is rejected as a frame.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Fewer bytes than a frame header.
    #[error("frame too short: need at least 8 bytes, got {available}")]
    TooShort { available: usize },

    /// The first byte is not the CTP magic.
    #[error("bad magic byte: 0x{0:02X}")]
    BadMagic(u8),

    /// The length field disagrees with the number of payload bytes received.
    #[error("length mismatch: header says {declared}, received {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// A sensitive frame whose checksum field does not match its contents.
    #[error("bad checksum: frame carries 0x{expected:04X}, computed 0x{computed:04X}")]
    BadChecksum { expected: u16, computed: u16 },
}

impl ValidationError {
    /// Short machine-friendly name of the failure, used as a log field.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::TooShort { .. } => "too_short",
            ValidationError::BadMagic(_) => "bad_magic",
            ValidationError::LengthMismatch { .. } => "length_mismatch",
            ValidationError::BadChecksum { .. } => "bad_checksum",
        }
    }
}

/// Validates `buffer` as exactly one CTP frame.
///
/// Non-sensitive frames are accepted whatever their checksum field holds.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
///
/// # Examples
///
/// ```rust
/// use ctp_core::{validate, ValidationError};
///
/// let frame = [0xCC, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, b'h', b'e', b'l', b'l', b'o'];
/// assert!(validate(&frame).is_ok());
///
/// let mut bad = frame;
/// bad[0] = 0xCD;
/// assert_eq!(validate(&bad), Err(ValidationError::BadMagic(0xCD)));
/// ```
pub fn validate(buffer: &[u8]) -> Result<(), ValidationError> {
    let header = FrameHeader::parse(buffer).ok_or(ValidationError::TooShort {
        available: buffer.len(),
    })?;

    if header.magic != FRAME_MAGIC {
        return Err(ValidationError::BadMagic(header.magic));
    }

    let declared = usize::from(header.length);
    let actual = buffer.len() - HEADER_SIZE;
    if declared != actual {
        return Err(ValidationError::LengthMismatch { declared, actual });
    }

    if !header.options.is_sensitive() {
        return Ok(());
    }

    let computed = frame_checksum(buffer);
    if header.checksum != computed {
        return Err(ValidationError::BadChecksum {
            expected: header.checksum,
            computed,
        });
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
