//! Protocol module containing the frame layout, checksum, and validator.

pub mod checksum;
pub mod frame;
pub mod validator;

pub use checksum::{frame_checksum, internet_checksum};
pub use frame::*;
pub use validator::{validate, ValidationError};
