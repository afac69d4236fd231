//! Structured file I/O for binary index data.
//!
//! Every structured file carries a trailing crc32 of its full content. The
//! writer appends the checksum on close; the reader recomputes it while
//! reading and verifies it with [`StructReader::verify_checksum`]. A mismatch
//! means the file is corrupt and the caller must fail, not skip.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, XiphosError};
use crate::storage::{StorageInput, StorageOutput};

/// Number of trailing bytes reserved for the checksum.
const CHECKSUM_LEN: u64 = 4;

/// A structured file writer for binary data.
pub struct StructWriter<W: StorageOutput> {
    writer: W,
    hasher: crc32fast::Hasher,
    position: u64,
}

impl<W: StorageOutput> StructWriter<W> {
    /// Create a new structured file writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: crc32fast::Hasher::new(),
            position: 0,
        }
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.update_checksum(&[value]);
        self.position += 1;
        Ok(())
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.update_checksum(&value.to_le_bytes());
        self.position += 4;
        Ok(())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.update_checksum(&value.to_le_bytes());
        self.position += 8;
        Ok(())
    }

    /// Write a f64 value (little-endian).
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.writer.write_f64::<LittleEndian>(value)?;
        self.update_checksum(&value.to_le_bytes());
        self.position += 8;
        Ok(())
    }

    /// Write a variable-length integer (7 bits per byte, continuation bit).
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; 10];
        let mut len = 0;
        let mut val = value;
        loop {
            let mut byte = (val & 0x7F) as u8;
            val >>= 7;
            if val != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if val == 0 {
                break;
            }
        }
        self.writer.write_all(&buf[..len])?;
        self.update_checksum(&buf[..len]);
        self.position += len as u64;
        Ok(())
    }

    /// Write a string with length prefix.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write raw bytes with length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_varint(value.len() as u64)?;
        self.writer.write_all(value)?;
        self.update_checksum(value);
        self.position += value.len() as u64;
        Ok(())
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Update checksum with new data.
    fn update_checksum(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Append the trailing checksum, then flush, sync, and close the writer.
    pub fn close(mut self) -> Result<()> {
        let checksum = self.hasher.finalize();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush_and_sync()?;
        self.writer.close()?;
        Ok(())
    }
}

/// A structured file reader for binary data.
pub struct StructReader<R: StorageInput> {
    reader: R,
    name: String,
    hasher: crc32fast::Hasher,
    position: u64,
    content_len: u64,
}

impl<R: StorageInput> StructReader<R> {
    /// Create a new structured file reader.
    ///
    /// `name` is used in corruption errors.
    pub fn new(reader: R, name: &str) -> Result<Self> {
        let file_size = reader.size()?;
        if file_size < CHECKSUM_LEN {
            return Err(XiphosError::corrupt(
                name,
                format!("file too short ({file_size} bytes)"),
            ));
        }
        Ok(StructReader {
            reader,
            name: name.to_string(),
            hasher: crc32fast::Hasher::new(),
            position: 0,
            content_len: file_size - CHECKSUM_LEN,
        })
    }

    /// Bytes of content remaining before the trailing checksum.
    pub fn remaining(&self) -> u64 {
        self.content_len.saturating_sub(self.position)
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.check_bounds(1)?;
        let value = self.reader.read_u8()?;
        self.hasher.update(&[value]);
        self.position += 1;
        Ok(value)
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        self.check_bounds(4)?;
        let value = self.reader.read_u32::<LittleEndian>()?;
        self.hasher.update(&value.to_le_bytes());
        self.position += 4;
        Ok(value)
    }

    /// Read a u64 value (little-endian).
    pub fn read_u64(&mut self) -> Result<u64> {
        self.check_bounds(8)?;
        let value = self.reader.read_u64::<LittleEndian>()?;
        self.hasher.update(&value.to_le_bytes());
        self.position += 8;
        Ok(value)
    }

    /// Read a f64 value (little-endian).
    pub fn read_f64(&mut self) -> Result<f64> {
        self.check_bounds(8)?;
        let value = self.reader.read_f64::<LittleEndian>()?;
        self.hasher.update(&value.to_le_bytes());
        self.position += 8;
        Ok(value)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            self.check_bounds(1)?;
            let byte = self.reader.read_u8()?;
            self.hasher.update(&[byte]);
            self.position += 1;

            if shift >= 64 {
                return Err(XiphosError::corrupt(&self.name, "varint overflow"));
            }
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Read a string with length prefix.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| XiphosError::corrupt(&self.name, format!("invalid UTF-8: {e}")))
    }

    /// Read bytes with length prefix.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let length = self.read_varint()? as usize;
        self.check_bounds(length as u64)?;
        let mut bytes = vec![0u8; length];
        self.reader.read_exact(&mut bytes)?;
        self.hasher.update(&bytes);
        self.position += length as u64;
        Ok(bytes)
    }

    /// Verify the trailing checksum against everything read so far.
    ///
    /// Must be called after the caller has consumed the full content; a
    /// mismatch or leftover content is reported as corruption.
    pub fn verify_checksum(mut self) -> Result<()> {
        if self.position != self.content_len {
            return Err(XiphosError::corrupt(
                &self.name,
                format!(
                    "unread content: {} of {} bytes consumed",
                    self.position, self.content_len
                ),
            ));
        }
        let expected = self.reader.read_u32::<LittleEndian>()?;
        let actual = self.hasher.finalize();
        if expected != actual {
            return Err(XiphosError::corrupt(
                &self.name,
                format!("checksum mismatch: expected {expected:#010x}, got {actual:#010x}"),
            ));
        }
        Ok(())
    }

    fn check_bounds(&self, len: u64) -> Result<()> {
        if self.position + len > self.content_len {
            return Err(XiphosError::corrupt(
                &self.name,
                "read past end of content",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::storage::memory::MemoryStorage;

    fn roundtrip_storage() -> MemoryStorage {
        MemoryStorage::new()
    }

    #[test]
    fn test_roundtrip_primitives() {
        let storage = roundtrip_storage();
        let output = storage.create_output("test.bin").unwrap();
        let mut writer = StructWriter::new(output);
        writer.write_u8(7).unwrap();
        writer.write_u32(1234).unwrap();
        writer.write_u64(u64::MAX).unwrap();
        writer.write_f64(90.5).unwrap();
        writer.write_varint(300).unwrap();
        writer.write_string("bookName:java").unwrap();
        writer.close().unwrap();

        let input = storage.open_input("test.bin").unwrap();
        let mut reader = StructReader::new(input, "test.bin").unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u32().unwrap(), 1234);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX);
        assert_eq!(reader.read_f64().unwrap(), 90.5);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.read_string().unwrap(), "bookName:java");
        reader.verify_checksum().unwrap();
    }

    #[test]
    fn test_varint_boundaries() {
        let storage = roundtrip_storage();
        let output = storage.create_output("varint.bin").unwrap();
        let mut writer = StructWriter::new(output);
        for value in [0u64, 127, 128, 16383, 16384, u64::MAX] {
            writer.write_varint(value).unwrap();
        }
        writer.close().unwrap();

        let input = storage.open_input("varint.bin").unwrap();
        let mut reader = StructReader::new(input, "varint.bin").unwrap();
        for expected in [0u64, 127, 128, 16383, 16384, u64::MAX] {
            assert_eq!(reader.read_varint().unwrap(), expected);
        }
        reader.verify_checksum().unwrap();
    }

    #[test]
    fn test_corruption_detected() {
        let storage = roundtrip_storage();
        let output = storage.create_output("data.bin").unwrap();
        let mut writer = StructWriter::new(output);
        writer.write_string("intact").unwrap();
        writer.close().unwrap();

        // Flip a content byte.
        let mut input = storage.open_input("data.bin").unwrap();
        let mut raw = Vec::new();
        std::io::Read::read_to_end(&mut input, &mut raw).unwrap();
        raw[1] ^= 0xFF;
        let mut output = storage.create_output("data.bin").unwrap();
        std::io::Write::write_all(&mut output, &raw).unwrap();
        output.close().unwrap();

        let input = storage.open_input("data.bin").unwrap();
        let mut reader = StructReader::new(input, "data.bin").unwrap();
        let _ = reader.read_string();
        assert!(matches!(
            reader.verify_checksum(),
            Err(XiphosError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_truncated_file_detected() {
        let storage = roundtrip_storage();
        let mut output = storage.create_output("short.bin").unwrap();
        std::io::Write::write_all(&mut output, &[1, 2]).unwrap();
        output.close().unwrap();

        let input = storage.open_input("short.bin").unwrap();
        assert!(StructReader::new(input, "short.bin").is_err());
    }
}
