//! Internet checksum (RFC 1071) as used by sensitive CTP frames.
//!
//! # How the checksum works
//!
//! The frame is read as a sequence of 16-bit big-endian words (a trailing odd
//! byte is padded with a zero low byte).  Words are added into a 32-bit
//! accumulator; whenever the sum exceeds `0xFFFF` the carry is folded back in
//! with `sum = (sum & 0xFFFF) + 1`.  A single step is enough because adding one
//! 16-bit word to a folded sum can carry at most 1.  The checksum is the
//! bitwise complement of the low 16 bits.
//!
//! For a frame, the checksum field itself is replaced by
//! [`CHECKSUM_SENTINEL`] while summing, so the value stored in the field never
//! influences the result.

use crate::protocol::frame::{CHECKSUM_OFFSET, CHECKSUM_SENTINEL};

/// Computes the Internet checksum over `bytes`.
///
/// # Examples
///
/// ```rust
/// use ctp_core::internet_checksum;
///
/// // RFC 1071 §3 example data.
/// let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
/// assert_eq!(internet_checksum(&data), 0x220D);
/// ```
pub fn internet_checksum(bytes: &[u8]) -> u16 {
    fold_words(bytes.chunks(2).map(word_from_chunk))
}

/// Computes the checksum of a complete frame with the checksum field replaced
/// by [`CHECKSUM_SENTINEL`].
///
/// `frame` is not modified.  Frames shorter than the checksum field are
/// summed as-is.
pub fn frame_checksum(frame: &[u8]) -> u16 {
    let sentinel_word = CHECKSUM_OFFSET / 2;
    let has_field = frame.len() >= CHECKSUM_OFFSET + 2;

    fold_words(frame.chunks(2).enumerate().map(|(index, chunk)| {
        if has_field && index == sentinel_word {
            CHECKSUM_SENTINEL
        } else {
            word_from_chunk(chunk)
        }
    }))
}

fn word_from_chunk(chunk: &[u8]) -> u16 {
    match *chunk {
        [hi, lo] => u16::from_be_bytes([hi, lo]),
        [hi] => u16::from_be_bytes([hi, 0x00]),
        _ => 0,
    }
}

fn fold_words(words: impl Iterator<Item = u16>) -> u16 {
    let mut sum: u32 = 0;
    for word in words {
        sum += u32::from(word);
        if sum > 0xFFFF {
            sum = (sum & 0xFFFF) + 1;
        }
    }
    !(sum as u16)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
