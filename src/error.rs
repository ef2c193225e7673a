use thiserror::Error;

/// Errors returned while decoding or encoding websocket frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Less than the fixed part of the header is available (wait for more bytes)
    #[error("frame header too short")]
    HeaderTooShort,

    /// Mask bit set, but the 4 masking key bytes are missing
    #[error("masked frame without masking key")]
    MissingMaskKey,

    /// Declared payload length exceeds available bytes (wait for more bytes)
    #[error("frame payload truncated")]
    TruncatedFrame,

    /// Declared payload length cannot be represented on this platform
    #[error("frame payload too large")]
    PayloadTooLarge,

    /// Frame is not masked, but caller requires masked frames (client -> server)
    #[error("unmasked frame where masking is required")]
    UnmaskedFrame,

    /// Output buffer cannot hold the encoded frame
    #[error("output buffer too small ({needed} bytes needed)")]
    BufferTooSmall { needed: usize },

    /// Random source failed while generating masking key
    #[error("random source failure")]
    RandomSource,
}

impl FrameError {
    /// True if the error can go away once more bytes of the stream arrive
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameError::HeaderTooShort | FrameError::TruncatedFrame)
    }
}

/// Errors returned while negotiating the opening handshake
#[cfg(feature = "http")]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// No (or empty) `Sec-WebSocket-Key` header in the request
    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,

    /// Request headers not terminated by an empty line
    #[error("http request incomplete")]
    Incomplete,

    /// Request is not valid HTTP/1.x
    #[error("invalid http request: {0}")]
    InvalidRequest(httparse::Error),
}
