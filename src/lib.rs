//! Server-side websocket opening handshake and text frame codec.
//!
//! Everything here is a pure function over byte buffers: socket handling,
//! buffering across reads and connection bookkeeping belong to the caller.
//!
//! ```
//! let frame = ws_helper::encode_with_key(b"Hello", Some([0x37, 0xfa, 0x21, 0x3d])).unwrap();
//! let msg = ws_helper::decode(&frame, true).unwrap();
//! assert_eq!(msg.as_text(), Ok("Hello"));
//! ```
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod consts;
#[cfg_attr(not(feature = "http"), allow(dead_code))]
mod crypto;
mod error;
mod framer;
#[cfg(feature = "http")]
mod handshake;
mod structs;

pub use error::FrameError;
#[cfg(feature = "http")]
pub use error::HandshakeError;
#[cfg(any(feature = "getrandom02", feature = "getrandom03"))]
pub use framer::encode;
pub use framer::{
    apply_mask, decode, decode_header, decode_in_place, encode_into, encode_with,
    encode_with_key, encoded_len, header_len_hint,
};
#[cfg(feature = "http")]
pub use handshake::{accept_key, compute_accept_key, find_websocket_key, http_response, negotiate};
pub use structs::{DecodedMessage, FrameHeader};

/// Source of random bytes used for masking keys
pub trait RngProvider {
    fn random_buf(buf: &mut [u8]) -> Result<(), FrameError>;
}

#[cfg(feature = "getrandom03")]
pub struct GetRandom03;

#[cfg(feature = "getrandom03")]
impl RngProvider for GetRandom03 {
    fn random_buf(buf: &mut [u8]) -> Result<(), FrameError> {
        getrandom03::fill(buf).map_err(|_| FrameError::RandomSource)
    }
}

#[cfg(feature = "getrandom02")]
pub struct GetRandom02;

#[cfg(feature = "getrandom02")]
impl RngProvider for GetRandom02 {
    fn random_buf(buf: &mut [u8]) -> Result<(), FrameError> {
        getrandom02::getrandom(buf).map_err(|_| FrameError::RandomSource)
    }
}

#[cfg(feature = "getrandom03")]
pub type DefaultRng = GetRandom03;

#[cfg(all(feature = "getrandom02", not(feature = "getrandom03")))]
pub type DefaultRng = GetRandom02;
