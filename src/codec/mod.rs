//! Codec Module
//!
//! Converts `(ttl, value)` pairs into opaque byte strings and back.

mod buffer;
mod entry;
mod registry;


use std::any::{type_name, TypeId};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// Re-export public types
pub use buffer::{BufferPool, PooledBuffer};
pub use entry::{DecodingError, EncodingError, Entry, FRAME_MAGIC, FRAME_VERSION};
pub use registry::TypeRegistry;

use entry::{read_header, write_header};

// == Entry Codec ==
/// Encodes entries for registered value types, drawing scratch buffers from a pool.
#[derive(Debug, Default)]
pub struct EntryCodec {
    registry: TypeRegistry,
    buffers: BufferPool,
}

impl EntryCodec {
    // == Constructor ==
    pub fn new(registry: TypeRegistry, buffers: BufferPool) -> Self {
        Self { registry, buffers }
    }

    /// The type registry consulted on both encode and decode.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The pool encode buffers are drawn from.
    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    // == Encode ==
    /// Encodes `(ttl, value)` into a pooled buffer.
    ///
    /// The buffer returns to the pool when the guard drops, so callers should
    /// hand the bytes to the store and let it go right after.
    pub fn encode<T>(&self, ttl: Duration, value: &T) -> Result<PooledBuffer<'_>, EncodingError>
    where
        T: Serialize + 'static,
    {
        let mut buf = self.buffers.acquire();
        self.encode_into(ttl, value, &mut buf)?;
        Ok(buf)
    }

    /// Appends the encoded entry to `buf`.
    pub fn encode_into<T>(
        &self,
        ttl: Duration,
        value: &T,
        buf: &mut Vec<u8>,
    ) -> Result<(), EncodingError>
    where
        T: Serialize + 'static,
    {
        let tag = self
            .registry
            .tag_of::<T>()
            .ok_or(EncodingError::Unregistered(type_name::<T>()))?;

        let start = buf.len();
        if let Err(e) = write_entry(buf, ttl, &tag, value) {
            buf.truncate(start);
            return Err(e);
        }
        Ok(())
    }

    // == Decode ==
    /// Decodes an entry whose value must be of type `T`.
    pub fn decode<T>(&self, bytes: &[u8]) -> Result<Entry<T>, DecodingError>
    where
        T: DeserializeOwned + 'static,
    {
        let header = read_header(bytes)?;

        let found = self
            .registry
            .type_of(header.tag)
            .ok_or_else(|| DecodingError::UnknownType(header.tag.to_string()))?;
        if found != TypeId::of::<T>() {
            let expected = self
                .registry
                .tag_of::<T>()
                .unwrap_or_else(|| type_name::<T>().to_string());
            return Err(DecodingError::TypeMismatch {
                expected,
                found: header.tag.to_string(),
            });
        }

        let value = decode_payload(header.payload)?;
        Ok(Entry {
            ttl: header.ttl,
            value,
        })
    }
}

/// Decodes exactly one MessagePack value; leftover bytes are a malformed frame.
fn decode_payload<T>(payload: &[u8]) -> Result<T, DecodingError>
where
    T: DeserializeOwned,
{
    let mut remaining = payload;
    let value = {
        let mut de = rmp_serde::Deserializer::new(&mut remaining);
        Deserialize::deserialize(&mut de)?
    };
    if !remaining.is_empty() {
        return Err(DecodingError::TrailingBytes(remaining.len()));
    }
    Ok(value)
}

fn write_entry<T>(buf: &mut Vec<u8>, ttl: Duration, tag: &str, value: &T) -> Result<(), EncodingError>
where
    T: Serialize,
{
    write_header(buf, ttl, tag)?;
    rmp_serde::encode::write_named(buf, value)?;
    Ok(())
}
