// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Minimal Kafka wire codec for the discovery exchange.
//!
//! Only the three non-flexible request versions discovery needs are covered:
//!
//! | API | key | version |
//! |-----|-----|---------|
//! | `Metadata` | 3 | 1 |
//! | `SaslHandshake` | 17 | 1 |
//! | `SaslAuthenticate` | 36 | 0 |
//!
//! Requests use header v1 (`api_key`, `api_version`, `correlation_id`, `client_id`),
//! responses header v0 (`correlation_id`). All integers are big-endian and every
//! frame is prefixed with its `i32` length.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const API_KEY_METADATA: i16 = 3;
pub const API_KEY_SASL_HANDSHAKE: i16 = 17;
pub const API_KEY_SASL_AUTHENTICATE: i16 = 36;

pub const METADATA_VERSION: i16 = 1;
pub const SASL_HANDSHAKE_VERSION: i16 = 1;
pub const SASL_AUTHENTICATE_VERSION: i16 = 0;

/// Kafka error code: no error
pub const ERROR_NONE: i16 = 0;
/// Kafka error code: `UNSUPPORTED_SASL_MECHANISM`
pub const ERROR_UNSUPPORTED_SASL_MECHANISM: i16 = 33;
/// Kafka error code: `ILLEGAL_SASL_STATE`
pub const ERROR_ILLEGAL_SASL_STATE: i16 = 34;
/// Kafka error code: `SASL_AUTHENTICATION_FAILED`
pub const ERROR_SASL_AUTHENTICATION_FAILED: i16 = 58;

/// Decoding failure for a response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated response while reading {field}")]
    Truncated { field: &'static str },

    #[error("invalid length {len} for {field}")]
    InvalidLength { field: &'static str, len: i64 },

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("correlation id mismatch: sent {expected}, received {actual}")]
    CorrelationMismatch { expected: i32, actual: i32 },
}

/// Request header v1.
#[derive(Debug, Clone, Copy)]
pub struct RequestHeader<'a> {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: &'a str,
}

/// Encode a full request frame: length prefix, header, then `body`.
#[must_use]
pub fn encode_request(header: &RequestHeader<'_>, body: &[u8]) -> BytesMut {
    let mut payload = BytesMut::with_capacity(10 + header.client_id.len() + body.len());
    payload.put_i16(header.api_key);
    payload.put_i16(header.api_version);
    payload.put_i32(header.correlation_id);
    put_string(&mut payload, header.client_id);
    payload.put_slice(body);

    let mut frame = BytesMut::with_capacity(4 + payload.len());
    // Frames are bounded well below i32::MAX by construction
    frame.put_i32(payload.len() as i32);
    frame.put_slice(&payload);
    frame
}

/// `SaslHandshake` v1 request body.
#[must_use]
pub fn sasl_handshake_body(mechanism: &str) -> BytesMut {
    let mut buf = BytesMut::new();
    put_string(&mut buf, mechanism);
    buf
}

/// `SaslAuthenticate` v0 request body.
#[must_use]
pub fn sasl_authenticate_body(auth_bytes: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4 + auth_bytes.len());
    buf.put_i32(auth_bytes.len() as i32);
    buf.put_slice(auth_bytes);
    buf
}

/// `Metadata` v1 request body asking for brokers only.
///
/// An empty (not null) topic array means "no topics" from v1 onwards.
#[must_use]
pub fn metadata_body() -> BytesMut {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_i32(0);
    buf
}

fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_i16(value.len() as i16);
    buf.put_slice(value.as_bytes());
}

/// Split a response frame (without its length prefix) into correlation id and body.
///
/// # Errors
///
/// Returns [`WireError::CorrelationMismatch`] if the frame answers another request.
pub fn split_response(mut frame: Bytes, expected: i32) -> Result<Bytes, WireError> {
    let actual = read_i32(&mut frame, "correlation_id")?;
    if actual != expected {
        return Err(WireError::CorrelationMismatch { expected, actual });
    }
    Ok(frame)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslHandshakeResponse {
    pub error_code: i16,
    pub mechanisms: Vec<String>,
}

impl SaslHandshakeResponse {
    /// Decode a `SaslHandshake` v1 response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is truncated or malformed.
    pub fn decode(mut body: Bytes) -> Result<Self, WireError> {
        let error_code = read_i16(&mut body, "error_code")?;
        let count = read_array_len(&mut body, "mechanisms")?;
        let mut mechanisms = Vec::with_capacity(count);
        for _ in 0..count {
            mechanisms.push(read_string(&mut body, "mechanism")?);
        }
        Ok(Self {
            error_code,
            mechanisms,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslAuthenticateResponse {
    pub error_code: i16,
    pub error_message: Option<String>,
    pub auth_bytes: Bytes,
}

impl SaslAuthenticateResponse {
    /// Decode a `SaslAuthenticate` v0 response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is truncated or malformed.
    pub fn decode(mut body: Bytes) -> Result<Self, WireError> {
        let error_code = read_i16(&mut body, "error_code")?;
        let error_message = read_nullable_string(&mut body, "error_message")?;
        let auth_bytes = read_bytes(&mut body, "auth_bytes")?;
        Ok(Self {
            error_code,
            error_message,
            auth_bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBroker {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
    pub rack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponse {
    pub brokers: Vec<MetadataBroker>,
    pub controller_id: i32,
}

impl MetadataResponse {
    /// Decode the broker section of a `Metadata` v1 response body.
    ///
    /// The topic section is not read; discovery asks for no topics.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is truncated or malformed.
    pub fn decode(mut body: Bytes) -> Result<Self, WireError> {
        let count = read_array_len(&mut body, "brokers")?;
        let mut brokers = Vec::with_capacity(count);
        for _ in 0..count {
            brokers.push(MetadataBroker {
                node_id: read_i32(&mut body, "node_id")?,
                host: read_string(&mut body, "host")?,
                port: read_i32(&mut body, "port")?,
                rack: read_nullable_string(&mut body, "rack")?,
            });
        }
        let controller_id = read_i32(&mut body, "controller_id")?;
        Ok(Self {
            brokers,
            controller_id,
        })
    }
}

fn read_i16(buf: &mut Bytes, field: &'static str) -> Result<i16, WireError> {
    if buf.remaining() < 2 {
        return Err(WireError::Truncated { field });
    }
    Ok(buf.get_i16())
}

fn read_i32(buf: &mut Bytes, field: &'static str) -> Result<i32, WireError> {
    if buf.remaining() < 4 {
        return Err(WireError::Truncated { field });
    }
    Ok(buf.get_i32())
}

fn read_array_len(buf: &mut Bytes, field: &'static str) -> Result<usize, WireError> {
    let len = read_i32(buf, field)?;
    // Null arrays only appear in requests; treat one here as empty
    if len == -1 {
        return Ok(0);
    }
    // Every element takes at least two bytes, which bounds allocations
    if len < 0 || (len as usize) > buf.remaining() / 2 {
        return Err(WireError::InvalidLength {
            field,
            len: i64::from(len),
        });
    }
    Ok(len as usize)
}

fn read_nullable_string(buf: &mut Bytes, field: &'static str) -> Result<Option<String>, WireError> {
    let len = read_i16(buf, field)?;
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(WireError::InvalidLength {
            field,
            len: i64::from(len),
        });
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(WireError::Truncated { field });
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec())
        .map(Some)
        .map_err(|_| WireError::InvalidUtf8 { field })
}

fn read_string(buf: &mut Bytes, field: &'static str) -> Result<String, WireError> {
    read_nullable_string(buf, field)?.ok_or(WireError::InvalidLength { field, len: -1 })
}

fn read_bytes(buf: &mut Bytes, field: &'static str) -> Result<Bytes, WireError> {
    let len = read_i32(buf, field)?;
    if len == -1 {
        return Ok(Bytes::new());
    }
    if len < 0 {
        return Err(WireError::InvalidLength {
            field,
            len: i64::from(len),
        });
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(WireError::Truncated { field });
    }
    Ok(buf.split_to(len))
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod wire_tests;
