//! Chunked "file section" framing for blobs embedded in the body.
//!
//! Wire layout: `u32 total_size` followed by `(u32 block_size, block bytes)`
//! pairs until `total_size` bytes have been delivered. Readers honour
//! whatever block size they encounter; writers split at [`SECTION_BLOCK_SIZE`].

use crate::cursor::{ByteWriter, WireRead};
use crate::error::{Error, Result};

/// Block size used when writing sections
pub const SECTION_BLOCK_SIZE: usize = 1024;

/// Read a complete section, reassembling its blocks
pub fn read_section<R: WireRead>(reader: &mut R) -> Result<Vec<u8>> {
    let start = reader.position();
    let total = reader.read_u32()? as usize;
    if total > reader.remaining() {
        return Err(Error::Bounds {
            offset: start,
            requested: total,
            available: reader.remaining(),
        });
    }

    let mut data = Vec::with_capacity(total);
    let mut left = total;
    while left > 0 {
        let block_offset = reader.position();
        let block_size = reader.read_u32()? as usize;
        if block_size == 0 {
            return Err(Error::format(
                block_offset,
                format!("zero block size with {left} of {total} section bytes outstanding"),
            ));
        }
        let chunk = block_size.min(left);
        data.extend_from_slice(reader.take(chunk)?);
        left -= chunk;
    }

    log::trace!(
        "Read {} byte section at 0x{:x} ({} framed bytes)",
        total,
        start,
        reader.position() - start
    );
    Ok(data)
}

/// Write `data` as a section split into [`SECTION_BLOCK_SIZE`] blocks
pub fn write_section(writer: &mut ByteWriter, data: &[u8]) -> Result<()> {
    writer.write_count(data.len(), "section byte")?;
    for block in data.chunks(SECTION_BLOCK_SIZE) {
        writer.write_u32(block.len() as u32);
        writer.write_bytes(block);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ByteReader;
    use crate::error::ErrorKind;

    fn framed(data: &[u8]) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        write_section(&mut writer, data).unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_empty_section_has_no_block_header() {
        let bytes = framed(&[]);
        assert_eq!(bytes, vec![0, 0, 0, 0]);

        let mut reader = ByteReader::new(&bytes);
        assert!(read_section(&mut reader).unwrap().is_empty());
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_multi_block_layout() {
        let data: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let bytes = framed(&data);

        // total + three block headers
        assert_eq!(bytes.len(), 4 + 3 * 4 + data.len());
        assert_eq!(&bytes[4..8], &1024u32.to_le_bytes());
        assert_eq!(&bytes[4 + 4 + 1024..4 + 8 + 1024], &1024u32.to_le_bytes());
        assert_eq!(&bytes[4 + 8 + 2048..4 + 12 + 2048], &452u32.to_le_bytes());

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(read_section(&mut reader).unwrap(), data);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_reader_honours_foreign_block_sizes() {
        let mut writer = ByteWriter::new();
        writer.write_u32(5);
        writer.write_u32(2);
        writer.write_bytes(b"ab");
        writer.write_u32(3);
        writer.write_bytes(b"cde");
        writer.write_u8(0x99);
        let bytes = writer.into_inner();

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(read_section(&mut reader).unwrap(), b"abcde");
        assert_eq!(reader.read_u8().unwrap(), 0x99);
    }

    #[test]
    fn test_zero_block_size_is_fatal() {
        let mut writer = ByteWriter::new();
        writer.write_u32(4);
        writer.write_u32(0);
        writer.write_bytes(&[0; 8]);
        let bytes = writer.into_inner();

        let err = read_section(&mut ByteReader::new(&bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("offset 0x4"));
    }

    #[test]
    fn test_truncated_section_is_bounds_error() {
        let mut writer = ByteWriter::new();
        writer.write_u32(10);
        writer.write_u32(10);
        writer.write_bytes(b"short");
        let bytes = writer.into_inner();

        let err = read_section(&mut ByteReader::new(&bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }
}
