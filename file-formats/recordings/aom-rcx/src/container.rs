//! Recording envelope: magic, declared size, zlib body and trailing footer.
//!
//! ```text
//! offset 0   4 bytes  "l33t"
//! offset 4   u32      uncompressed body size
//! offset 8   ...      zlib stream
//! ...        ...      footer (every byte after the end of the zlib stream)
//! ```

use crate::cursor::ByteReader;
use crate::cursor::WireRead;
use crate::error::{Error, Result};
use crate::footer::Footer;
use flate2::Compression;
use flate2::bufread::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Envelope magic
pub const RECORDING_MAGIC: [u8; 4] = *b"l33t";

/// Size of the magic plus declared-size prefix
pub const ENVELOPE_HEADER_SIZE: usize = 8;

/// Upper bound on the buffer reserved up front from the declared size
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// A decoded envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Decompressed body
    pub body: Vec<u8>,
    /// Bytes following the compressed stream, verbatim
    pub footer: Vec<u8>,
    /// Length of the compressed stream in the source file
    pub compressed_len: usize,
}

impl Container {
    /// Validate the envelope and decompress the body
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(raw);
        let magic = reader.take(4)?;
        if magic != RECORDING_MAGIC {
            return Err(Error::format(
                0,
                format!(
                    "bad magic {:02x?}, expected {:02x?}",
                    magic, RECORDING_MAGIC
                ),
            ));
        }
        let declared = reader.read_u32()? as usize;
        let compressed = reader.rest();

        let mut decoder = ZlibDecoder::new(compressed);
        let mut body = Vec::with_capacity(declared.min(MAX_PREALLOCATION));
        (&mut decoder)
            .take(declared as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|e| {
                log::debug!("Zlib decompression failed: {e}");
                Error::corruption(format!("zlib stream: {e}"))
            })?;

        if body.len() != declared {
            return Err(Error::corruption(format!(
                "declared body size {declared}, decompressed {}{}",
                body.len(),
                if body.len() > declared { "+" } else { "" }
            )));
        }

        let compressed_len = decoder.total_in() as usize;
        let footer = compressed[compressed_len..].to_vec();
        log::debug!(
            "Decoded envelope: {} compressed -> {} body bytes, {} footer bytes",
            compressed_len,
            body.len(),
            footer.len()
        );

        Ok(Self {
            body,
            footer,
            compressed_len,
        })
    }

    /// Offset in the source file where the compressed body ended
    pub fn compressed_end(&self) -> usize {
        ENVELOPE_HEADER_SIZE + self.compressed_len
    }

    /// Parse the footer carried by this envelope
    pub fn parse_footer(&self) -> Result<Footer> {
        Footer::parse(&self.footer, self.compressed_end())
    }
}

/// Compress `body` and emit a complete file with `footer` appended verbatim
pub fn encode(body: &[u8], footer: &[u8]) -> Result<Vec<u8>> {
    let (mut out, _) = encode_envelope(body)?;
    out.extend_from_slice(footer);
    Ok(out)
}

/// Compress `body`, point the footer locator at the end of the new
/// compressed stream and emit a complete file
pub fn encode_with_footer(body: &[u8], footer: &mut Footer) -> Result<Vec<u8>> {
    let (mut out, compressed_end) = encode_envelope(body)?;
    footer.locator = u32::try_from(compressed_end)
        .map_err(|_| Error::encode(format!("footer locator {compressed_end} exceeds u32")))?;
    out.extend_from_slice(&footer.to_bytes());
    Ok(out)
}

fn encode_envelope(body: &[u8]) -> Result<(Vec<u8>, usize)> {
    let declared = u32::try_from(body.len())
        .map_err(|_| Error::encode(format!("body size {} exceeds u32", body.len())))?;

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder.write_all(body)?;
    let compressed = encoder.finish()?;

    let mut out = Vec::with_capacity(ENVELOPE_HEADER_SIZE + compressed.len() + 256);
    out.extend_from_slice(&RECORDING_MAGIC);
    out.extend_from_slice(&declared.to_le_bytes());
    out.extend_from_slice(&compressed);
    let compressed_end = out.len();
    log::debug!(
        "Encoded envelope: {} body -> {} compressed bytes",
        body.len(),
        compressed.len()
    );
    Ok((out, compressed_end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_round_trip_preserves_footer() {
        let body = b"body bytes ".repeat(300);
        let footer = b"anything at all".to_vec();

        let raw = encode(&body, &footer).unwrap();
        assert_eq!(&raw[..4], b"l33t");
        assert_eq!(&raw[4..8], &(body.len() as u32).to_le_bytes());

        let decoded = Container::decode(&raw).unwrap();
        assert_eq!(decoded.body, body);
        assert_eq!(decoded.footer, footer);
        assert_eq!(decoded.compressed_end(), raw.len() - footer.len());
    }

    #[test]
    fn test_bad_magic() {
        let mut raw = encode(b"x", b"").unwrap();
        raw[0] = b'L';
        let err = Container::decode(&raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_declared_size_mismatch() {
        let mut raw = encode(&[7u8; 64], b"").unwrap();
        raw[4..8].copy_from_slice(&63u32.to_le_bytes());
        assert_eq!(
            Container::decode(&raw).unwrap_err().kind(),
            ErrorKind::Corruption
        );

        raw[4..8].copy_from_slice(&65u32.to_le_bytes());
        assert_eq!(
            Container::decode(&raw).unwrap_err().kind(),
            ErrorKind::Corruption
        );
    }

    #[test]
    fn test_garbage_stream_is_corruption() {
        let mut raw = b"l33t".to_vec();
        raw.extend_from_slice(&16u32.to_le_bytes());
        raw.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x11]);
        assert_eq!(
            Container::decode(&raw).unwrap_err().kind(),
            ErrorKind::Corruption
        );
    }

    #[test]
    fn test_truncated_envelope_header() {
        assert_eq!(
            Container::decode(b"l33t\x01").unwrap_err().kind(),
            ErrorKind::Bounds
        );
    }
}
