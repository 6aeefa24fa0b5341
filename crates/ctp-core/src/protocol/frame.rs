//! CTP frame layout: header constants, option flags, and the frame encoder.
//!
//! Wire format:
//! ```text
//! [magic:1][options:1][length:2][checksum:2][reserved:2][payload:N]
//! ```
//! Total header size: 8 bytes. All multi-byte integers are big-endian.

use thiserror::Error;

use crate::protocol::checksum::frame_checksum;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Magic byte every frame must start with.
pub const FRAME_MAGIC: u8 = 0xCC;

/// Total size of the frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Largest frame that can be encoded (header + maximum payload).
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Byte offset of the big-endian checksum field within the header.
pub const CHECKSUM_OFFSET: usize = 4;

/// Value substituted for the checksum field while the checksum is computed.
pub const CHECKSUM_SENTINEL: u16 = 0xCCCC;

// ── Option flags ──────────────────────────────────────────────────────────────

/// The `options` byte of a frame header.
///
/// Only [`FrameOptions::SENSITIVE`] carries meaning; other bits are forwarded
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameOptions(pub u8);

impl FrameOptions {
    /// The frame's checksum must verify before it is forwarded.
    pub const SENSITIVE: u8 = 0x40;

    /// Options with no flags set.
    pub const fn none() -> Self {
        Self(0)
    }

    /// Options with only the sensitive flag set.
    pub const fn sensitive() -> Self {
        Self(Self::SENSITIVE)
    }

    /// Returns `true` if the sensitive bit is set.
    pub const fn is_sensitive(self) -> bool {
        self.0 & Self::SENSITIVE != 0
    }
}

// ── Header view ───────────────────────────────────────────────────────────────

/// Typed view over the 8-byte frame header.
///
/// Parsing performs no validation beyond the length check; use
/// [`crate::validate`] to decide whether a frame may be forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u8,
    pub options: FrameOptions,
    /// Declared payload length.
    pub length: u16,
    /// Checksum as received (numeric value of the big-endian field).
    pub checksum: u16,
    pub reserved: u16,
}

impl FrameHeader {
    /// Parses the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Returns `None` if fewer than 8 bytes are available.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            magic: bytes[0],
            options: FrameOptions(bytes[1]),
            length: u16::from_be_bytes([bytes[2], bytes[3]]),
            checksum: u16::from_be_bytes([bytes[4], bytes[5]]),
            reserved: u16::from_be_bytes([bytes[6], bytes[7]]),
        })
    }
}

// ── Encoder ───────────────────────────────────────────────────────────────────

/// Errors that can occur while building a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The payload does not fit in the 16-bit length field.
    #[error("payload too large: {size} bytes exceeds the maximum of {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Encodes `payload` into a complete frame with the given options.
///
/// When `options` has the sensitive bit set, the checksum field is filled in
/// so that the frame passes validation; otherwise it is left as zero. The
/// reserved field is always zero.
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] if `payload` is longer than
/// [`MAX_PAYLOAD_SIZE`].
///
/// # Examples
///
/// ```rust
/// use ctp_core::{encode_frame, validate, FrameOptions};
///
/// let frame = encode_frame(FrameOptions::sensitive(), b"hello").unwrap();
/// assert_eq!(frame.len(), 13);
/// assert!(validate(&frame).is_ok());
/// ```
pub fn encode_frame(options: FrameOptions, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(FRAME_MAGIC);
    buf.push(options.0);
    buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    buf.extend_from_slice(&[0x00, 0x00]); // checksum, filled in below
    buf.extend_from_slice(&[0x00, 0x00]); // reserved
    buf.extend_from_slice(payload);

    if options.is_sensitive() {
        let checksum = frame_checksum(&buf);
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&checksum.to_be_bytes());
    }

    Ok(buf)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain_frame_layout() {
        // Arrange / Act
        let frame = encode_frame(FrameOptions::none(), b"hello").unwrap();

        // Assert
        assert_eq!(
            frame,
            vec![0xCC, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn test_encode_sensitive_frame_sets_checksum_field() {
        let frame = encode_frame(FrameOptions::sensitive(), b"hello").unwrap();
        let header = FrameHeader::parse(&frame).unwrap();

        assert!(header.options.is_sensitive());
        assert_eq!(header.checksum, frame_checksum(&frame));
    }

    #[test]
    fn test_encode_empty_payload_is_header_only() {
        let frame = encode_frame(FrameOptions::none(), &[]).unwrap();
        assert_eq!(frame.len(), HEADER_SIZE);
        assert_eq!(FrameHeader::parse(&frame).unwrap().length, 0);
    }

    #[test]
    fn test_encode_max_payload_succeeds() {
        let payload = vec![0xAB; MAX_PAYLOAD_SIZE];
        let frame = encode_frame(FrameOptions::sensitive(), &payload).unwrap();
        assert_eq!(frame.len(), MAX_FRAME_SIZE);
    }

    #[test]
    fn test_encode_oversized_payload_fails() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let result = encode_frame(FrameOptions::none(), &payload);
        assert_eq!(
            result,
            Err(FrameError::PayloadTooLarge {
                size: MAX_PAYLOAD_SIZE + 1,
                max: MAX_PAYLOAD_SIZE,
            })
        );
    }

    #[test]
    fn test_header_parse_reads_big_endian_fields() {
        let bytes = [0xCC, 0x41, 0x01, 0x02, 0xAB, 0xCD, 0x12, 0x34];
        let header = FrameHeader::parse(&bytes).unwrap();

        assert_eq!(header.magic, 0xCC);
        assert_eq!(header.options, FrameOptions(0x41));
        assert!(header.options.is_sensitive());
        assert_eq!(header.length, 0x0102);
        assert_eq!(header.checksum, 0xABCD);
        assert_eq!(header.reserved, 0x1234);
    }

    #[test]
    fn test_header_parse_short_buffer_returns_none() {
        assert_eq!(FrameHeader::parse(&[0xCC; 7]), None);
    }

    #[test]
    fn test_options_other_bits_are_not_sensitive() {
        assert!(!FrameOptions(0xBF).is_sensitive());
        assert!(FrameOptions(0xFF).is_sensitive());
    }
}
