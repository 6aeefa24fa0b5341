//! # ctp-core
//!
//! Shared library for the CTP relay containing the frame layout, the Internet
//! checksum, and the frame validator.
//!
//! It has zero dependencies on OS APIs or network sockets: everything here is
//! a pure function over a byte slice, so the relay, test producers, and
//! benchmarks all agree on what a valid frame is.
//!
//! # Wire format overview
//!
//! A CTP frame is an 8-byte header followed by an opaque payload:
//!
//! ```text
//! [magic:1][options:1][length:2][checksum:2][reserved:2][payload:length]
//! ```
//!
//! - **`magic`** must be `0xCC`.
//! - **`options`** bit `0x40` marks the frame *sensitive*: its checksum field
//!   must verify before the frame is forwarded.
//! - **`length`** is the payload size and must match what was actually
//!   received.
//!
//! All multi-byte integers are big-endian.

pub mod protocol;

pub use protocol::checksum::{frame_checksum, internet_checksum};
pub use protocol::frame::{
    encode_frame, FrameError, FrameHeader, FrameOptions, FRAME_MAGIC, HEADER_SIZE, MAX_FRAME_SIZE,
    MAX_PAYLOAD_SIZE,
};
pub use protocol::validator::{validate, ValidationError};
