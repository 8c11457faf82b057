//! Length-prefixed compressed data blocks.
//!
//! ```text
//! u32  raw_size          size after inflating
//! u32  comp_size         size of the stream that follows
//! [u8; comp_size]        zlib stream
//! ```

use crate::errors::{Result, TileError};
use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use std::io::{self, Read};

pub const BLOCK_HEADER_SIZE: usize = 8;

/// Inflate primitive used by [`read_compressed_block_with`].
///
/// Implementations return exactly `raw_size` bytes or an error; they must
/// not hand back a short or oversized buffer.
pub trait Inflate {
    fn inflate(&self, src: &[u8], raw_size: usize) -> io::Result<Vec<u8>>;
}

/// zlib-wrapped deflate, the encoding used by tile files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zlib;

impl Inflate for Zlib {
    fn inflate(&self, src: &[u8], raw_size: usize) -> io::Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(src).take(raw_size as u64 + 1);
        let mut out = Vec::with_capacity(raw_size);
        decoder.read_to_end(&mut out)?;

        if out.len() > raw_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stream inflates past declared size {}", raw_size),
            ));
        }
        if out.len() < raw_size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("inflated {} bytes, declared {}", out.len(), raw_size),
            ));
        }
        Ok(out)
    }
}

/// Declared sizes of a block, as read from its 8-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub raw_size: u32,
    pub compressed_size: u32,
}

impl BlockHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < BLOCK_HEADER_SIZE {
            return Err(TileError::truncated(
                "compressed block header",
                BLOCK_HEADER_SIZE,
                bytes.len(),
            ));
        }
        Ok(Self {
            raw_size: LittleEndian::read_u32(&bytes[0..4]),
            compressed_size: LittleEndian::read_u32(&bytes[4..8]),
        })
    }

    /// Bytes occupied by header plus stream.
    pub fn span(&self) -> usize {
        BLOCK_HEADER_SIZE + self.compressed_size as usize
    }
}

/// Read and inflate the block at `*cursor` with zlib.
pub fn read_compressed_block(data: &[u8], cursor: &mut usize) -> Result<Vec<u8>> {
    read_compressed_block_with(&Zlib, data, cursor)
}

/// Read the block at `*cursor` and inflate it with `inflater`.
///
/// Once the header is readable the cursor moves past the whole block, even
/// when inflating fails, so a caller can skip a corrupt block and carry on.
pub fn read_compressed_block_with<I>(inflater: &I, data: &[u8], cursor: &mut usize) -> Result<Vec<u8>>
where
    I: Inflate + ?Sized,
{
    let start = *cursor;
    let rest = data.get(start..).unwrap_or_default();
    let header = BlockHeader::from_bytes(rest)?;
    *cursor = start.saturating_add(header.span());

    let stream = rest
        .get(BLOCK_HEADER_SIZE..header.span())
        .ok_or_else(|| TileError::truncated("compressed block", header.span(), rest.len()))?;

    let raw_size = header.raw_size as usize;
    inflater.inflate(stream, raw_size).map_err(|e| {
        log::error!(
            "Cannot uncompress data at offset {}: {} ({} -> {} bytes)",
            start,
            e,
            stream.len(),
            raw_size
        );
        TileError::Decompression {
            raw_size,
            compressed_size: stream.len(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(raw: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        encoder.finish().unwrap()
    }

    fn block(raw_size: u32, stream: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&raw_size.to_le_bytes());
        buf.extend_from_slice(&(stream.len() as u32).to_le_bytes());
        buf.extend_from_slice(stream);
        buf
    }

    #[test]
    fn reads_block_and_advances() {
        let raw: Vec<u8> = (0..200u32).map(|i| (i % 7) as u8).collect();
        let stream = zlib(&raw);
        let mut data = vec![0xAA; 3];
        data.extend(block(raw.len() as u32, &stream));
        data.extend_from_slice(b"tail");

        let mut cursor = 3;
        let out = read_compressed_block(&data, &mut cursor).unwrap();
        assert_eq!(out, raw);
        assert_eq!(cursor, 3 + 8 + stream.len());
        assert_eq!(&data[cursor..], b"tail");
    }

    #[test]
    fn corrupt_stream_still_advances_cursor() {
        let garbage = [0x13u8; 16];
        let data = block(64, &garbage);

        let mut cursor = 0;
        let err = read_compressed_block(&data, &mut cursor).unwrap_err();
        assert!(err.is_decompression());
        assert_eq!(cursor, data.len());
    }

    #[test]
    fn declared_size_too_large_is_decompression_error() {
        let raw = vec![5u8; 40];
        let data = block(41, &zlib(&raw));

        let mut cursor = 0;
        let err = read_compressed_block(&data, &mut cursor).unwrap_err();
        assert!(err.is_decompression());
        assert_eq!(cursor, data.len());
    }

    #[test]
    fn declared_size_too_small_is_decompression_error() {
        let raw = vec![5u8; 40];
        let data = block(39, &zlib(&raw));

        let mut cursor = 0;
        let err = read_compressed_block(&data, &mut cursor).unwrap_err();
        match err {
            TileError::Decompression {
                raw_size,
                compressed_size,
                ..
            } => {
                assert_eq!(raw_size, 39);
                assert_eq!(compressed_size, data.len() - 8);
            }
            other => panic!("Expected Decompression, got {:?}", other),
        }
    }

    #[test]
    fn empty_block() {
        let data = block(0, &zlib(&[]));
        let mut cursor = 0;
        let out = read_compressed_block(&data, &mut cursor).unwrap();
        assert!(out.is_empty());
        assert_eq!(cursor, data.len());
    }

    #[test]
    fn truncated_header_leaves_cursor() {
        let data = [1u8, 0, 0, 0, 2, 0];
        let mut cursor = 0;
        let err = read_compressed_block(&data, &mut cursor).unwrap_err();
        assert!(err.is_format());
        assert_eq!(cursor, 0);
    }

    #[test]
    fn stream_past_buffer_is_format_error() {
        let mut data = block(10, &[0u8; 4]);
        data.truncate(10);
        let mut cursor = 0;
        let err = read_compressed_block(&data, &mut cursor).unwrap_err();
        assert!(err.is_format());
        assert_eq!(cursor, 12);
    }

    #[test]
    fn custom_inflater_is_used() {
        struct Stored;
        impl Inflate for Stored {
            fn inflate(&self, src: &[u8], raw_size: usize) -> io::Result<Vec<u8>> {
                assert_eq!(src.len(), raw_size);
                Ok(src.to_vec())
            }
        }

        let data = block(3, b"abc");
        let mut cursor = 0;
        let out = read_compressed_block_with(&Stored, &data, &mut cursor).unwrap();
        assert_eq!(out, b"abc");
    }
}
