use flate2::{Compression, write::GzEncoder};
use std::io::Write;

/// gzip member header (10 bytes) and trailer (CRC32 + ISIZE, 8 bytes).
const GZIP_FRAMING_BYTES: usize = 18;

/// Compresses batch payloads and predicts how large they can get.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>>;

    /// Upper bound on `compress(data).len()` for any input of `len` bytes.
    ///
    /// The planner accepts records without compressing while this bound
    /// stays under the request ceiling, so it must never underestimate.
    fn compressed_len_bound(&self, len: usize) -> usize;

    /// Value for the `Content-Encoding` header, `None` for identity.
    fn content_encoding(&self) -> Option<&'static str>;
}

#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    pub fn new(level: Compression) -> Self {
        Self { level }
    }

    pub fn fast() -> Self {
        Self::new(Compression::fast())
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 4), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn compressed_len_bound(&self, len: usize) -> usize {
        // zlib's deflateBound for incompressible input (stored blocks).
        len + (len >> 12) + (len >> 14) + (len >> 25) + 13 + GZIP_FRAMING_BYTES
    }

    fn content_encoding(&self) -> Option<&'static str> {
        Some("gzip")
    }
}
