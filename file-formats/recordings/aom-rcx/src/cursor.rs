//! Positioned little-endian readers and writers over in-memory buffers.
//!
//! Every decoder in this crate is written against [`WireRead`], so the same
//! code drives both plain decoding ([`ByteReader`]) and byte-exact echoing
//! ([`EchoReader`]), where each consumed byte range is also appended to an
//! output buffer. Reads never return partial data: a read that would run past
//! the end of the buffer fails with [`Error::Bounds`] and leaves the position
//! unchanged.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Source of little-endian wire primitives
pub trait WireRead {
    /// Current byte offset into the underlying buffer
    fn position(&self) -> usize;

    /// Bytes left before the end of the buffer
    fn remaining(&self) -> usize;

    /// Consume exactly `n` bytes
    fn take(&mut self, n: usize) -> Result<&[u8]>;

    /// Advance past `n` bytes
    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Read one unsigned byte
    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian u16
    fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    /// Read a little-endian u32
    fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Read a little-endian i32
    fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    /// Read `n` raw bytes into an owned buffer
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    /// Read a u32 count and convert it to a length.
    ///
    /// Counts that cannot possibly be satisfied by the bytes left in the
    /// buffer (assuming `min_item_size` bytes per item) fail early with a
    /// bounds error instead of attempting a huge allocation.
    fn read_count(&mut self, min_item_size: usize) -> Result<usize> {
        let offset = self.position();
        let count = self.read_u32()? as usize;
        let needed = count.saturating_mul(min_item_size);
        if needed > self.remaining() {
            return Err(Error::Bounds {
                offset,
                requested: needed,
                available: self.remaining(),
            });
        }
        Ok(count)
    }
}

/// Read cursor over a borrowed byte buffer
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Consume `n` bytes, returning a slice that borrows the buffer itself
    pub fn slice(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(Error::Bounds {
                offset: self.pos,
                requested: n,
                available,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    /// Everything from the current position to the end of the buffer
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// The whole underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Whether the cursor has reached the end of the buffer
    pub fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }
}

impl WireRead for ByteReader<'_> {
    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.slice(n)
    }
}

/// Append-only little-endian writer over a growable buffer
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with reserved capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append one byte
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a little-endian u16
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a little-endian u32
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a little-endian i32
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Append a length as a u32 count
    pub fn write_count(&mut self, len: usize, what: &str) -> Result<()> {
        let count = u32::try_from(len)
            .map_err(|_| Error::encode(format!("{what} count {len} exceeds u32")))?;
        self.write_u32(count);
        Ok(())
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The bytes written so far
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning its buffer
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Reader that copies every consumed byte range to a companion writer.
///
/// Reads that must not be reproduced verbatim go through [`Self::input_mut`];
/// bytes that do not exist in the input go through [`Self::output_mut`].
/// Input and output positions are independent.
#[derive(Debug)]
pub struct EchoReader<'a> {
    input: ByteReader<'a>,
    output: ByteWriter,
}

impl<'a> EchoReader<'a> {
    /// Create an echoing reader at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            input: ByteReader::new(data),
            output: ByteWriter::with_capacity(data.len() + 1024),
        }
    }

    /// Input cursor for reads that are not echoed
    pub fn input_mut(&mut self) -> &mut ByteReader<'a> {
        &mut self.input
    }

    /// Output buffer for injected bytes
    pub fn output_mut(&mut self) -> &mut ByteWriter {
        &mut self.output
    }

    /// Bytes emitted so far
    pub fn output(&self) -> &ByteWriter {
        &self.output
    }

    /// Echo everything left in the input without decoding it
    pub fn copy_remaining(&mut self) -> usize {
        let rest = self.input.rest();
        self.output.write_bytes(rest);
        self.input.pos = self.input.data.len();
        rest.len()
    }

    /// Finish echoing and return the output buffer
    pub fn into_output(self) -> Vec<u8> {
        self.output.into_inner()
    }
}

impl WireRead for EchoReader<'_> {
    fn position(&self) -> usize {
        self.input.pos
    }

    fn remaining(&self) -> usize {
        self.input.remaining()
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let bytes = self.input.slice(n)?;
        self.output.write_bytes(bytes);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_primitive_reads() {
        let data = [
            0x7f, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xff, 0xff, 0xff, 0xff,
        ];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x7f);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x12345678);
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_out_of_bounds_read_keeps_position() {
        let data = [1, 2, 3];
        let mut reader = ByteReader::new(&data);
        reader.skip(1).unwrap();

        let err = reader.read_u32().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
        match err {
            Error::Bounds {
                offset,
                requested,
                available,
            } => {
                assert_eq!(offset, 1);
                assert_eq!(requested, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.read_u16().unwrap(), 0x0302);
    }

    #[test]
    fn test_read_count_rejects_impossible_lengths() {
        let mut data = 0x4000_0000u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0; 8]);
        let mut reader = ByteReader::new(&data);

        let err = reader.read_count(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_writer_mirrors_reader() {
        let mut writer = ByteWriter::new();
        writer.write_u8(9);
        writer.write_u16(0xbeef);
        writer.write_u32(0xdead_beef);
        writer.write_i32(-2);
        writer.write_bytes(b"xyz");

        let bytes = writer.into_inner();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 9);
        assert_eq!(reader.read_u16().unwrap(), 0xbeef);
        assert_eq!(reader.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.read_bytes(3).unwrap(), b"xyz");
    }

    #[test]
    fn test_echo_reader_copies_consumed_bytes_only() {
        let data = [1, 0, 0, 0, 2, 3, 4, 5];
        let mut echo = EchoReader::new(&data);

        assert_eq!(echo.read_u32().unwrap(), 1);
        // Quiet read: consumed but not reproduced
        assert_eq!(echo.input_mut().read_u8().unwrap(), 2);
        echo.output_mut().write_u8(0xaa);
        assert_eq!(echo.read_u8().unwrap(), 3);
        assert_eq!(echo.copy_remaining(), 2);

        assert_eq!(echo.into_output(), vec![1, 0, 0, 0, 0xaa, 3, 4, 5]);
    }
}
