//! Opening handshake, server side (RFC 6455 section 4.2).
//!
//! Request:
//!
//! ```http
//! GET /chat HTTP/1.1
//! Host: server.example.com
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! Sec-WebSocket-Version: 13
//! ```
//!
//! Response:
//!
//! ```http
//! HTTP/1.1 101 Switching Protocols
//! Upgrade: websocket
//! Sec-WebSocket-Version: 13
//! Connection: Upgrade
//! Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=
//! ```

use crate::{
    consts::{MAX_REQUEST_HEADERS, WS_ACCEPT_B64_LEN, WS_KEY_GUID},
    crypto::{sha1, Base64Pad},
    HandshakeError,
};
use alloc::{string::String, vec::Vec};
use httparse::Header;

/// Compute Sec-WebSocket-Accept value (base64 of sha1(key + guid))
pub fn accept_key(client_key: &[u8]) -> [u8; WS_ACCEPT_B64_LEN] {
    let digest = sha1(&[client_key, WS_KEY_GUID.as_bytes()]);

    let mut out = [0; WS_ACCEPT_B64_LEN];
    // output sized by encode_len, cannot be short
    let written = Base64Pad::encode_slice(&digest, &mut out);
    debug_assert_eq!(written, Some(WS_ACCEPT_B64_LEN));
    out
}

/// String variant of [`accept_key`]
///
/// ```
/// let accept = ws_helper::compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(client_key: &str) -> String {
    let digest = sha1(&[client_key.as_bytes(), WS_KEY_GUID.as_bytes()]);
    Base64Pad::encode(&digest)
}

/// Find (trimmed) `Sec-WebSocket-Key` value in raw http request.
///
/// Header name is matched case-insensitively.
pub fn find_websocket_key(raw_request: &[u8]) -> Result<&[u8], HandshakeError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_REQUEST_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    let status = req
        .parse(raw_request)
        .map_err(HandshakeError::InvalidRequest)?;

    if status.is_partial() {
        return Err(HandshakeError::Incomplete);
    }

    req.headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case("Sec-WebSocket-Key"))
        .map(|header| header.value.trim_ascii())
        .filter(|key| !key.is_empty())
        .ok_or(HandshakeError::MissingKey)
}

/// Build `101 Switching Protocols` response for raw upgrade request
pub fn negotiate(raw_request: &[u8]) -> Result<Vec<u8>, HandshakeError> {
    let key = find_websocket_key(raw_request)?;
    let accept = accept_key(key);

    let headers = [
        Header {
            name: "Upgrade",
            value: b"websocket",
        },
        Header {
            name: "Sec-WebSocket-Version",
            value: b"13",
        },
        Header {
            name: "Connection",
            value: b"Upgrade",
        },
        Header {
            name: "Sec-WebSocket-Accept",
            value: &accept,
        },
    ];

    Ok(http_response(101, "Switching Protocols", &headers))
}

/// Serialize HTTP/1.1 response head (status line, headers, empty line)
pub fn http_response(status_code: u16, status_text: &str, headers: &[Header]) -> Vec<u8> {
    let mut itoa = itoa::Buffer::new();
    let status_code = itoa.format(status_code);

    let mut resp = Vec::with_capacity(64);
    resp.extend_from_slice(b"HTTP/1.1 ");
    resp.extend_from_slice(status_code.as_bytes());
    resp.push(b' ');
    resp.extend_from_slice(status_text.as_bytes());
    resp.extend_from_slice(b"\r\n");

    for header in headers {
        resp.extend_from_slice(header.name.as_bytes());
        resp.extend_from_slice(b": ");
        resp.extend_from_slice(header.value);
        resp.extend_from_slice(b"\r\n");
    }

    resp.extend_from_slice(b"\r\n");
    resp
}
