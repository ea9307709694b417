//! Byte-stream abstraction for reading index files.
//!
//! All dictionary decoding goes through the [`IndexInput`] trait, which
//! provides big-endian fixed-width integers, LEB128 variable-length integers,
//! random access and CRC32 checksumming. Two implementations are provided:
//! an owned in-memory buffer and a memory-mapped file.

use std::fs::File;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;

use crate::error::{CrocusError, Result};

/// A positioned, random-access byte stream over an index file.
pub trait IndexInput: Send + Sync {
    /// Total length of the stream in bytes.
    fn len(&self) -> u64;

    /// Current read position.
    fn position(&self) -> u64;

    /// Move the read position to an absolute offset.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Read `buf.len()` bytes, advancing the position.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    /// CRC32 of the byte range `[0, end)`, independent of the position.
    fn checksum_to(&self, end: u64) -> Result<u32>;

    /// Whether the stream is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a single byte.
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a big-endian u32.
    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(BigEndian::read_u32(&buf))
    }

    /// Read a big-endian u64.
    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(BigEndian::read_u64(&buf))
    }

    /// Read a LEB128 variable-length integer, at most 32 bits wide.
    fn read_vint(&mut self) -> Result<u32> {
        let v = self.read_vlong()?;
        u32::try_from(v).map_err(|_| CrocusError::corrupt("vint exceeds 32 bits"))
    }

    /// Read a LEB128 variable-length integer, at most 64 bits wide.
    fn read_vlong(&mut self) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0;
        loop {
            if shift >= 64 {
                return Err(CrocusError::corrupt("vlong overflow"));
            }
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Read a length-prefixed byte string (vint length, then bytes).
    fn read_byte_string(&mut self) -> Result<Vec<u8>> {
        let len = u64::from(self.read_vint()?);
        // check before allocating; the length is untrusted
        if len > self.len() - self.position() {
            return Err(CrocusError::corrupt(format!(
                "byte string length {len} exceeds remaining input"
            )));
        }
        let mut buf = vec![0u8; len as usize];
        self.read_bytes(&mut buf)?;
        Ok(buf)
    }
}

/// [`IndexInput`] over an owned in-memory byte buffer.
#[derive(Debug)]
pub struct BytesInput {
    data: Vec<u8>,
    pos: u64,
}

impl BytesInput {
    /// Create an input over the given bytes, positioned at the start.
    pub fn new(data: Vec<u8>) -> Self {
        BytesInput { data, pos: 0 }
    }

    /// Borrow the underlying bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl IndexInput for BytesInput {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len() {
            return Err(CrocusError::corrupt(format!(
                "seek past end of input: {pos} > {}",
                self.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(CrocusError::corrupt(format!(
                "read past end of input: {end} > {}",
                self.data.len()
            )));
        }
        buf.copy_from_slice(&self.data[start..end]);
        self.pos = end as u64;
        Ok(())
    }

    fn checksum_to(&self, end: u64) -> Result<u32> {
        if end > self.len() {
            return Err(CrocusError::corrupt("checksum range past end of input"));
        }
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.data[..end as usize]);
        Ok(hasher.finalize())
    }
}

/// [`IndexInput`] over a memory-mapped file.
pub struct MmapInput {
    map: Mmap,
    pos: u64,
}

impl MmapInput {
    /// Map the file at `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the file is never truncated
        // by this crate while the map is alive.
        let map = unsafe { Mmap::map(&file)? };
        Ok(MmapInput { map, pos: 0 })
    }
}

impl IndexInput for MmapInput {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len() {
            return Err(CrocusError::corrupt(format!(
                "seek past end of input: {pos} > {}",
                self.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > self.map.len() {
            return Err(CrocusError::corrupt(format!(
                "read past end of input: {end} > {}",
                self.map.len()
            )));
        }
        buf.copy_from_slice(&self.map[start..end]);
        self.pos = end as u64;
        Ok(())
    }

    fn checksum_to(&self, end: u64) -> Result<u32> {
        if end > self.len() {
            return Err(CrocusError::corrupt("checksum range past end of input"));
        }
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.map[..end as usize]);
        Ok(hasher.finalize())
    }
}

/// Encode a LEB128 variable-length integer.
pub fn write_vlong(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Encode a vint (same wire format as vlong).
pub fn write_vint(out: &mut Vec<u8>, value: u32) {
    write_vlong(out, value as u64);
}

/// Encode a length-prefixed byte string.
pub fn write_byte_string(out: &mut Vec<u8>, bytes: &[u8]) {
    write_vint(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlong_round_trip() {
        let values = [0u64, 1, 127, 128, 255, 16383, 16384, u64::MAX];
        for &v in &values {
            let mut buf = Vec::new();
            write_vlong(&mut buf, v);
            let mut input = BytesInput::new(buf);
            assert_eq!(input.read_vlong().unwrap(), v);
            assert_eq!(input.position(), input.len());
        }
    }

    #[test]
    fn test_truncated_vlong() {
        let mut input = BytesInput::new(vec![0x80]);
        assert!(matches!(
            input.read_vlong(),
            Err(CrocusError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_vlong_overflow() {
        let mut input = BytesInput::new(vec![0xFF; 11]);
        assert!(matches!(
            input.read_vlong(),
            Err(CrocusError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_vint_rejects_wide_values() {
        let mut buf = Vec::new();
        write_vlong(&mut buf, u64::from(u32::MAX) + 1);
        let mut input = BytesInput::new(buf);
        assert!(input.read_vint().is_err());
    }

    #[test]
    fn test_fixed_width_reads() {
        let mut data = Vec::new();
        data.extend_from_slice(&0xDEADBEEFu32.to_be_bytes());
        data.extend_from_slice(&0x0123_4567_89AB_CDEFu64.to_be_bytes());
        let mut input = BytesInput::new(data);
        assert_eq!(input.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(input.read_u64().unwrap(), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_seek_and_read_past_end() {
        let mut input = BytesInput::new(vec![1, 2, 3]);
        assert!(input.seek(3).is_ok());
        assert!(input.seek(4).is_err());
        input.seek(2).unwrap();
        let mut buf = [0u8; 2];
        assert!(input.read_bytes(&mut buf).is_err());
    }

    #[test]
    fn test_byte_string_round_trip() {
        let mut buf = Vec::new();
        write_byte_string(&mut buf, b"hello");
        write_byte_string(&mut buf, b"");
        let mut input = BytesInput::new(buf);
        assert_eq!(input.read_byte_string().unwrap(), b"hello");
        assert_eq!(input.read_byte_string().unwrap(), b"");
    }

    #[test]
    fn test_byte_string_length_beyond_input() {
        let mut buf = Vec::new();
        write_vint(&mut buf, u32::MAX);
        let mut input = BytesInput::new(buf);
        assert!(matches!(
            input.read_byte_string(),
            Err(CrocusError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_checksum_matches_crc32() {
        let data = b"crocus dictionary".to_vec();
        let expected = crc32fast::hash(&data);
        let input = BytesInput::new(data);
        assert_eq!(input.checksum_to(input.len()).unwrap(), expected);
    }
}
