use std::io;
use std::io::{Read, Write};

use crate::error::Error;

/// Sequential little endian field access into a fixed size header record.
///
/// Callers size the record for every field they read; reading past the end
/// is a programming error and panics.
pub struct LittleEndianReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> LittleEndianReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut field = [0; N];
        field.copy_from_slice(&self.bytes[self.position..self.position + N]);
        self.position += N;
        field
    }

    pub fn read_u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub fn read_u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    pub fn read_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub fn read_i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    pub fn skip(&mut self, count: usize) {
        self.position += count;
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

/// Builds a little endian record in memory before it is written out.
#[derive(Default)]
pub struct LittleEndianWriter {
    buffer: Vec<u8>,
}

impl LittleEndianWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Appends `count` zero bytes.
    pub fn pad(&mut self, count: usize) -> &mut Self {
        self.buffer.resize(self.buffer.len() + count, 0);
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Fills `buffer` completely, naming `what` in the error.
pub fn read_exact<R: Read>(reader: &mut R, buffer: &mut [u8], what: &'static str) -> crate::Result<()> {
    reader
        .read_exact(buffer)
        .map_err(|e| Error::FailedToRead(what, e))
}

/// Reads at most `len` bytes. The buffer grows only as far as the stream
/// supplies data.
pub fn read_up_to<R: Read>(reader: R, len: usize) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.take(len as u64).read_to_end(&mut data)?;
    Ok(data)
}

pub fn write_all<W: Write>(writer: &mut W, bytes: &[u8], what: &'static str) -> crate::Result<()> {
    writer
        .write_all(bytes)
        .map_err(|e| Error::FailedToWrite(what, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_little_endian_fields() {
        let bytes = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFE, 0xFF, 0xFF, 0xFF];
        let mut reader = LittleEndianReader::new(&bytes);
        assert_eq!(reader.read_u8(), 1);
        assert_eq!(reader.read_u16(), 0x1234);
        assert_eq!(reader.read_u32(), 0x12345678);
        assert_eq!(reader.read_i32(), -2);
        assert_eq!(reader.position(), bytes.len());
    }

    #[test]
    fn writes_little_endian_fields() {
        let mut writer = LittleEndianWriter::default();
        writer
            .write_u16(0x4D42)
            .write_i32(-1)
            .pad(2)
            .write_bytes(b"ab");
        assert_eq!(
            writer.into_inner(),
            [0x42, 0x4D, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, b'a', b'b']
        );
    }

    #[test]
    fn read_up_to_stops_at_end_of_stream() {
        let mut cursor = Cursor::new(vec![1, 2, 3]);
        assert_eq!(read_up_to(&mut cursor, 2).unwrap(), [1, 2]);
        assert_eq!(read_up_to(&mut cursor, usize::MAX).unwrap(), [3]);
        assert!(read_up_to(&mut cursor, 5).unwrap().is_empty());
    }

    #[test]
    fn read_exact_reports_what_was_missing() {
        let mut cursor = Cursor::new(vec![1]);
        let mut buffer = [0; 2];
        let result = read_exact(&mut cursor, &mut buffer, "header");
        assert!(matches!(result, Err(Error::FailedToRead("header", _))));
    }
}
