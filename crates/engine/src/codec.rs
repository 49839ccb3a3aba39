//! Envelope compression codec.
//!
//! Every stored event envelope passes through an [`EnvelopeCodec`] on its
//! way into and out of the `e` attribute. Rows written by other clients of
//! the same table are gzip streams, so [`GzipCodec`] is the codec the engine
//! uses; [`IdentityCodec`] exists for tests that want to inspect raw JSON.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ordo_core::{Error, Result};
use std::io::{Read, Write};

/// Envelope codec trait.
///
/// # Thread Safety
///
/// Codecs must be `Send + Sync`; one instance is shared by every append and
/// read.
pub trait EnvelopeCodec: Send + Sync {
    /// Encode bytes for storage.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decode stored bytes.
    ///
    /// Returns [`Error::Codec`] if the data is not in this codec's format.
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Codec identifier, used in error messages.
    fn codec_id(&self) -> &str;
}

/// gzip (RFC 1952) codec
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    level: Compression,
}

impl GzipCodec {
    /// Codec with an explicit compression level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl EnvelopeCodec for GzipCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), self.level);
        encoder
            .write_all(data)
            .map_err(|e| Error::Codec(format!("gzip encode: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| Error::Codec(format!("gzip encode: {}", e)))
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 4);
        GzDecoder::new(data).read_to_end(&mut out).map_err(|e| {
            Error::Codec(format!(
                "{} decode of {} bytes failed: {}",
                self.codec_id(),
                data.len(),
                e
            ))
        })?;
        Ok(out)
    }

    fn codec_id(&self) -> &str {
        "gzip"
    }
}

/// Pass-through codec
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl EnvelopeCodec for IdentityCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn codec_id(&self) -> &str {
        "identity"
    }
}
