//! Versioned header and checksum footer helpers.
//!
//! Every dictionary file starts with a magic number, a codec name and a
//! format version, and (from [`VERSION_CHECKSUM`] on) ends with a fixed-size
//! footer carrying a whole-file CRC32.

use crate::error::{CrocusError, Result};
use crate::input::{IndexInput, write_vint};

/// Magic number opening every index file.
pub const CODEC_MAGIC: u32 = 0x3FD7_6C17;

/// Magic number opening the checksum footer.
pub const FOOTER_MAGIC: u32 = !CODEC_MAGIC;

/// Checksum algorithm id for CRC32, the only one defined.
const CHECKSUM_ALGORITHM_CRC32: u32 = 0;

/// Footer size: magic (4) + algorithm (4) + checksum (8).
pub const FOOTER_LENGTH: u64 = 16;

/// Verify the file header and return the version found.
///
/// The header is: [`CODEC_MAGIC`], vint-length-prefixed codec name, u32
/// version. The version must fall within `[min_version, max_version]`.
pub fn check_header(
    input: &mut dyn IndexInput,
    codec_name: &str,
    min_version: u32,
    max_version: u32,
) -> Result<u32> {
    let magic = input.read_u32()?;
    if magic != CODEC_MAGIC {
        return Err(CrocusError::corrupt(format!(
            "codec magic mismatch: expected {CODEC_MAGIC:#x}, got {magic:#x}"
        )));
    }
    let name = input.read_byte_string()?;
    if name != codec_name.as_bytes() {
        return Err(CrocusError::corrupt(format!(
            "codec name mismatch: expected {codec_name:?}, got {:?}",
            String::from_utf8_lossy(&name)
        )));
    }
    let version = input.read_u32()?;
    if version < min_version || version > max_version {
        return Err(CrocusError::corrupt(format!(
            "unsupported {codec_name} version {version}, expected {min_version}..={max_version}"
        )));
    }
    Ok(version)
}

/// Verify the checksum footer at the end of the file.
///
/// The footer covers every byte before its checksum field. The read position
/// is left unchanged.
pub fn check_footer(input: &mut dyn IndexInput) -> Result<()> {
    let len = input.len();
    if len < FOOTER_LENGTH {
        return Err(CrocusError::corrupt(format!(
            "file too short for checksum footer: {len} bytes"
        )));
    }
    let saved = input.position();
    input.seek(len - FOOTER_LENGTH)?;
    let magic = input.read_u32()?;
    if magic != FOOTER_MAGIC {
        input.seek(saved)?;
        return Err(CrocusError::corrupt(format!(
            "footer magic mismatch: expected {FOOTER_MAGIC:#x}, got {magic:#x}"
        )));
    }
    let algorithm = input.read_u32()?;
    if algorithm != CHECKSUM_ALGORITHM_CRC32 {
        input.seek(saved)?;
        return Err(CrocusError::corrupt(format!(
            "unknown checksum algorithm: {algorithm}"
        )));
    }
    let stored = input.read_u64()?;
    let actual = u64::from(input.checksum_to(len - 8)?);
    input.seek(saved)?;
    if stored != actual {
        return Err(CrocusError::corrupt(format!(
            "checksum mismatch: stored {stored:#x}, actual {actual:#x}"
        )));
    }
    Ok(())
}

/// Append a file header to `out`.
pub fn write_header(out: &mut Vec<u8>, codec_name: &str, version: u32) {
    out.extend_from_slice(&CODEC_MAGIC.to_be_bytes());
    write_vint(out, codec_name.len() as u32);
    out.extend_from_slice(codec_name.as_bytes());
    out.extend_from_slice(&version.to_be_bytes());
}

/// Append a checksum footer to `out`, covering everything written so far
/// plus the footer's own magic and algorithm fields.
pub fn write_footer(out: &mut Vec<u8>) {
    out.extend_from_slice(&FOOTER_MAGIC.to_be_bytes());
    out.extend_from_slice(&CHECKSUM_ALGORITHM_CRC32.to_be_bytes());
    let checksum = u64::from(crc32fast::hash(out));
    out.extend_from_slice(&checksum.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::BytesInput;

    #[test]
    fn test_header_round_trip() {
        let mut buf = Vec::new();
        write_header(&mut buf, "TestCodec", 3);
        let mut input = BytesInput::new(buf);
        let version = check_header(&mut input, "TestCodec", 1, 5).unwrap();
        assert_eq!(version, 3);
    }

    #[test]
    fn test_header_name_mismatch() {
        let mut buf = Vec::new();
        write_header(&mut buf, "TestCodec", 3);
        let mut input = BytesInput::new(buf);
        assert!(check_header(&mut input, "OtherCodec", 1, 5).is_err());
    }

    #[test]
    fn test_header_version_out_of_range() {
        let mut buf = Vec::new();
        write_header(&mut buf, "TestCodec", 9);
        let mut input = BytesInput::new(buf);
        assert!(check_header(&mut input, "TestCodec", 1, 5).is_err());
    }

    #[test]
    fn test_footer_round_trip() {
        let mut buf = b"payload".to_vec();
        write_footer(&mut buf);
        let mut input = BytesInput::new(buf);
        check_footer(&mut input).unwrap();
        assert_eq!(input.position(), 0);
    }

    #[test]
    fn test_footer_detects_flipped_bit() {
        let mut buf = b"payload".to_vec();
        write_footer(&mut buf);
        buf[0] ^= 0x01;
        let mut input = BytesInput::new(buf);
        assert!(matches!(
            check_footer(&mut input),
            Err(CrocusError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_footer_too_short() {
        let mut input = BytesInput::new(vec![0; 8]);
        assert!(check_footer(&mut input).is_err());
    }
}
