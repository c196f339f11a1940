//! Entry Frame Module
//!
//! Binary framing of a cache entry: header, type tag, MessagePack payload.

use std::time::Duration;

use bytes::{Buf, BufMut};
use thiserror::Error;

/// First byte of every encoded entry
pub const FRAME_MAGIC: u8 = 0xCA;

/// Current frame layout version
pub const FRAME_VERSION: u8 = 1;

/// magic + version + ttl + tag length
pub const HEADER_LEN: usize = 1 + 1 + 8 + 2;

// == Entry ==
/// A decoded cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    /// Lifetime the entry was written with, used to re-arm sliding expiration
    pub ttl: Duration,
    /// The application value
    pub value: T,
}

// == Errors ==
/// A value could not be encoded.
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("type not registered: {0}")]
    Unregistered(&'static str),

    #[error("type tag exceeds {} bytes", u16::MAX)]
    TagTooLong,

    #[error("payload: {0}")]
    Payload(#[from] rmp_serde::encode::Error),
}

/// Stored bytes could not be decoded.
#[derive(Error, Debug)]
pub enum DecodingError {
    #[error("entry is truncated")]
    Truncated,

    #[error("entry does not start with the frame marker")]
    BadMagic,

    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u8),

    #[error("type tag is not valid UTF-8")]
    InvalidTag,

    #[error("type not registered: {0}")]
    UnknownType(String),

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("payload: {0}")]
    Payload(#[from] rmp_serde::decode::Error),

    #[error("{0} unexpected bytes after the payload")]
    TrailingBytes(usize),
}

// == Header ==
/// Writes the frame header and type tag into `buf`.
pub(crate) fn write_header(
    buf: &mut Vec<u8>,
    ttl: Duration,
    tag: &str,
) -> Result<(), EncodingError> {
    let tag_len = u16::try_from(tag.len()).map_err(|_| EncodingError::TagTooLong)?;
    let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

    buf.reserve(HEADER_LEN + tag.len());
    buf.put_u8(FRAME_MAGIC);
    buf.put_u8(FRAME_VERSION);
    buf.put_u64(ttl_ms);
    buf.put_u16(tag_len);
    buf.put_slice(tag.as_bytes());
    Ok(())
}

/// Parsed frame header borrowing from the input bytes.
#[derive(Debug)]
pub(crate) struct Header<'a> {
    pub ttl: Duration,
    pub tag: &'a str,
    pub payload: &'a [u8],
}

/// Splits `bytes` into header fields and the payload.
pub(crate) fn read_header(bytes: &[u8]) -> Result<Header<'_>, DecodingError> {
    let mut cursor = bytes;
    if cursor.remaining() < HEADER_LEN {
        return Err(DecodingError::Truncated);
    }

    if cursor.get_u8() != FRAME_MAGIC {
        return Err(DecodingError::BadMagic);
    }
    let version = cursor.get_u8();
    if version != FRAME_VERSION {
        return Err(DecodingError::UnsupportedVersion(version));
    }
    let ttl = Duration::from_millis(cursor.get_u64());
    let tag_len = cursor.get_u16() as usize;

    if cursor.remaining() < tag_len {
        return Err(DecodingError::Truncated);
    }
    let (tag, payload) = cursor.split_at(tag_len);
    let tag = std::str::from_utf8(tag).map_err(|_| DecodingError::InvalidTag)?;
    if payload.is_empty() {
        return Err(DecodingError::Truncated);
    }

    Ok(Header { ttl, tag, payload })
}
