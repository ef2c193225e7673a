use crate::consts::OPCODE_TEXT;
use alloc::vec::Vec;

/// Parsed websocket frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: u8,
    pub masked: bool,
    pub masking_key: Option<[u8; 4]>,
    pub payload_len: u64,

    /// Header size in bytes (extended length and masking key included)
    pub header_len: usize,
}

impl FrameHeader {
    /// Length of the whole frame on the wire (header + payload).
    ///
    /// Always fits in usize for headers returned by [`crate::decode_header`].
    pub fn frame_len(&self) -> usize {
        self.header_len + self.payload_len as usize
    }
}

/// Logical message decoded from a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub fin: bool,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl DecodedMessage {
    pub fn is_text(&self) -> bool {
        self.opcode == OPCODE_TEXT
    }

    pub fn as_text(&self) -> Result<&str, core::str::Utf8Error> {
        core::str::from_utf8(&self.payload)
    }
}
