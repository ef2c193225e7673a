use crate::crypto::Base64Pad;

/// Guid that is concatenated with Sec-WebSocket-Key header (by server)
pub const WS_KEY_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Output size of sha1 digest (in bytes)
pub const SHA1_DIGEST_LEN: usize = 20;

/// Output size of Sec-WebSocket-Accept (in base64 form)
pub const WS_ACCEPT_B64_LEN: usize = Base64Pad::encode_len(SHA1_DIGEST_LEN);

/// Max headers parsed from upgrade request
pub const MAX_REQUEST_HEADERS: usize = 32;

pub const OPCODE_CONTINUATION: u8 = 0x0;
pub const OPCODE_TEXT: u8 = 0x1;
pub const OPCODE_BINARY: u8 = 0x2;
pub const OPCODE_CLOSE: u8 = 0x8;

// byte 0
pub const FIN_BIT: u8 = 0b10000000;
pub const RSV1_BIT: u8 = 0b01000000;
pub const RSV2_BIT: u8 = 0b00100000;
pub const RSV3_BIT: u8 = 0b00010000;
pub const OPCODE_MASK: u8 = 0b00001111;

// byte 1
pub const MASK_BIT: u8 = 0b10000000;
pub const PAYLOAD_LEN_MASK: u8 = 0b01111111;

/// Largest payload length that fits directly in the 7-bit field
pub const MAX_INLINE_PAYLOAD_LEN: usize = 125;

/// 7-bit length marker for 16-bit extended payload length
pub const PAYLOAD_LEN_16: u8 = 126;

/// 7-bit length marker for 64-bit extended payload length
pub const PAYLOAD_LEN_64: u8 = 127;

pub const U16_MAX: usize = u16::MAX as usize;

pub const MASKING_KEY_LEN: usize = 4;
