//! The chunked container that wraps every tile file.
//!
//! ```text
//! "EPHE"                magic
//! u32  version          FILE_VERSION
//! chunk*                until the end of the buffer, no slack
//!
//! chunk:
//!   [u8; 4]  type       ASCII tag, not NUL terminated
//!   u32      len
//!   [u8; len] payload
//!   u32      checksum   CRC-32 of the payload
//! ```
//!
//! The container knows nothing about payloads; the caller recognises chunk
//! types and decodes them with [`tile`](crate::tile), [`block`](crate::block)
//! and [`table`](crate::table).

use crate::errors::{FormatError, Result, TileError};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

pub const EPHE_MAGIC: &[u8; 4] = b"EPHE";
pub const FILE_VERSION: u32 = 2;
pub const FILE_HEADER_SIZE: usize = 8;

/// Type tag and length in front of the payload.
pub const CHUNK_HEADER_SIZE: usize = 8;
/// Header plus trailing checksum.
pub const CHUNK_OVERHEAD: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    /// Check each chunk's trailing CRC-32 against its payload.
    pub verify_checksums: bool,
}

impl LoadOptions {
    pub fn strict() -> Self {
        Self {
            verify_checksums: true,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const fn new(tag: &[u8; 4]) -> Self {
        Self(*tag)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl PartialEq<[u8; 4]> for ChunkType {
    fn eq(&self, other: &[u8; 4]) -> bool {
        &self.0 == other
    }
}

impl PartialEq<&[u8; 4]> for ChunkType {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkType({:?})", self.to_string())
    }
}

/// One chunk, borrowing its payload from the container buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: ChunkType,
    pub payload: &'a [u8],
    /// Stored checksum field. Only compared when checksums are verified.
    pub checksum: u32,
    /// Offset of the chunk's type tag within the container.
    pub offset: usize,
}

impl<'a> Chunk<'a> {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn computed_checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.payload);
        hasher.finalize()
    }

    pub fn checksum_matches(&self) -> bool {
        self.computed_checksum() == self.checksum
    }
}

/// Validate the file header and return the container version.
pub fn read_file_header(data: &[u8]) -> Result<u32> {
    if data.len() < FILE_HEADER_SIZE {
        return Err(TileError::truncated(
            "file header",
            FILE_HEADER_SIZE,
            data.len(),
        ));
    }

    let magic = &data[0..4];
    if magic != EPHE_MAGIC {
        let mut actual = [0u8; 4];
        actual.copy_from_slice(magic);
        return Err(FormatError::BadMagic { actual }.into());
    }

    let version = LittleEndian::read_u32(&data[4..8]);
    if version != FILE_VERSION {
        return Err(FormatError::UnsupportedVersion {
            expected: FILE_VERSION,
            actual: version,
        }
        .into());
    }

    Ok(version)
}

/// Validate the file header and iterate over the chunks that follow.
pub fn chunks(data: &[u8], options: LoadOptions) -> Result<Chunks<'_>> {
    read_file_header(data)?;
    Ok(Chunks {
        data,
        offset: FILE_HEADER_SIZE,
        options,
        failed: false,
    })
}

/// Walk every chunk of `data`, handing each one to `callback`.
///
/// Fails on a bad header or on any framing error; chunks before the error
/// have already been delivered.
pub fn load<F>(data: &[u8], callback: F) -> Result<()>
where
    F: FnMut(Chunk<'_>),
{
    load_with(data, LoadOptions::default(), callback)
}

pub fn load_with<F>(data: &[u8], options: LoadOptions, mut callback: F) -> Result<()>
where
    F: FnMut(Chunk<'_>),
{
    for chunk in chunks(data, options)? {
        callback(chunk?);
    }
    Ok(())
}

/// Iterator over the chunks of a container. Yields at most one error, then
/// stops.
pub struct Chunks<'a> {
    data: &'a [u8],
    offset: usize,
    options: LoadOptions,
    failed: bool,
}

impl<'a> Chunks<'a> {
    fn read_chunk(&self) -> Result<Chunk<'a>> {
        let offset = self.offset;
        let rest = &self.data[offset..];
        if rest.len() < CHUNK_HEADER_SIZE {
            return Err(TileError::truncated(
                "chunk header",
                CHUNK_HEADER_SIZE,
                rest.len(),
            ));
        }

        let mut tag = [0u8; 4];
        tag.copy_from_slice(&rest[0..4]);
        let kind = ChunkType(tag);
        let len = LittleEndian::read_u32(&rest[4..8]);

        let end = (len as usize)
            .checked_add(CHUNK_OVERHEAD)
            .filter(|&end| end <= rest.len())
            .ok_or_else(|| FormatError::ChunkOverrun {
                kind: kind.to_string(),
                offset,
                len,
                remaining: rest.len(),
            })?;

        let payload = &rest[CHUNK_HEADER_SIZE..end - 4];
        let checksum = LittleEndian::read_u32(&rest[end - 4..end]);
        let chunk = Chunk {
            kind,
            payload,
            checksum,
            offset,
        };

        if self.options.verify_checksums && !chunk.checksum_matches() {
            return Err(FormatError::ChecksumMismatch {
                kind: kind.to_string(),
                stored: checksum,
                computed: chunk.computed_checksum(),
            }
            .into());
        }

        Ok(chunk)
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset == self.data.len() {
            return None;
        }

        match self.read_chunk() {
            Ok(chunk) => {
                self.offset += CHUNK_OVERHEAD + chunk.len();
                Some(Ok(chunk))
            }
            Err(e) => {
                log::error!("Bad chunk framing at offset {}: {}", self.offset, e);
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_bytes(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        let mut buf = Vec::new();
        buf.extend_from_slice(kind);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&hasher.finalize().to_le_bytes());
        buf
    }

    fn container(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"EPHE");
        buf.extend_from_slice(&FILE_VERSION.to_le_bytes());
        for (kind, payload) in chunks {
            buf.extend(chunk_bytes(kind, payload));
        }
        buf
    }

    fn collect(data: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
        let mut seen = Vec::new();
        load(data, |chunk| {
            seen.push((chunk.kind.to_string(), chunk.payload.to_vec()));
        })?;
        Ok(seen)
    }

    #[test]
    fn walks_all_chunks_in_order() {
        let data = container(&[(b"STAR", &b"abc"[..]), (b"DSO ", &b""[..]), (b"JSON", &b"{}"[..])]);
        let seen = collect(&data).unwrap();
        assert_eq!(
            seen,
            vec![
                ("STAR".to_string(), b"abc".to_vec()),
                ("DSO ".to_string(), Vec::new()),
                ("JSON".to_string(), b"{}".to_vec()),
            ]
        );
    }

    #[test]
    fn chunk_lengths_partition_container() {
        let data = container(&[(b"STAR", &[1u8; 17][..]), (b"GAIA", &[2u8; 300][..])]);
        let total: usize = chunks(&data, LoadOptions::default())
            .unwrap()
            .map(|c| CHUNK_OVERHEAD + c.unwrap().len())
            .sum();
        assert_eq!(total, data.len() - FILE_HEADER_SIZE);
    }

    #[test]
    fn empty_container_is_valid() {
        let data = container(&[]);
        assert!(collect(&data).unwrap().is_empty());
    }

    #[test]
    fn extra_byte_is_format_error() {
        let mut data = container(&[(b"STAR", &b"payload"[..])]);
        data.push(0);
        let err = collect(&data).unwrap_err();
        assert!(matches!(
            err,
            TileError::Format(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn missing_byte_is_format_error() {
        let mut data = container(&[(b"STAR", &b"payload"[..])]);
        data.pop();
        let err = collect(&data).unwrap_err();
        assert!(matches!(
            err,
            TileError::Format(FormatError::ChunkOverrun { .. })
        ));
    }

    #[test]
    fn overrun_is_caught_before_callback() {
        let mut data = container(&[(b"STAR", &b"ok"[..]), (b"GAIA", &b"1234"[..])]);
        let len_at = data.len() - 4 - 4 - 4;
        data[len_at..len_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let mut kinds = Vec::new();
        let err = load(&data, |chunk| kinds.push(chunk.kind.to_string())).unwrap_err();
        assert!(err.is_format());
        assert_eq!(kinds, vec!["STAR".to_string()]);
    }

    #[test]
    fn bad_magic() {
        let mut data = container(&[]);
        data[0..4].copy_from_slice(b"FITS");
        let err = collect(&data).unwrap_err();
        assert!(matches!(
            err,
            TileError::Format(FormatError::BadMagic { actual }) if &actual == b"FITS"
        ));
    }

    #[test]
    fn bad_version() {
        let mut data = container(&[]);
        data[4..8].copy_from_slice(&3u32.to_le_bytes());
        let err = collect(&data).unwrap_err();
        assert!(matches!(
            err,
            TileError::Format(FormatError::UnsupportedVersion {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn too_short_for_header() {
        assert!(collect(b"EPH").unwrap_err().is_format());
        assert!(collect(b"EPHE\x02\0\0").unwrap_err().is_format());
    }

    #[test]
    fn checksums_ignored_by_default() {
        let mut data = container(&[(b"STAR", &b"abc"[..])]);
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert_eq!(collect(&data).unwrap().len(), 1);
    }

    #[test]
    fn strict_mode_rejects_bad_checksum() {
        let good = container(&[(b"STAR", &b"abc"[..])]);
        assert!(load_with(&good, LoadOptions::strict(), |_| {}).is_ok());

        let mut bad = good.clone();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let err = load_with(&bad, LoadOptions::strict(), |_| {}).unwrap_err();
        assert!(matches!(
            err,
            TileError::Format(FormatError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn iterator_stops_after_error() {
        let mut data = container(&[(b"STAR", &b"abc"[..])]);
        data.extend_from_slice(&[1, 2, 3]);
        let items: Vec<_> = chunks(&data, LoadOptions::default()).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn chunk_offsets() {
        let data = container(&[(b"STAR", &b"abc"[..]), (b"GAIA", &b""[..])]);
        let offsets: Vec<usize> = chunks(&data, LoadOptions::default())
            .unwrap()
            .map(|c| c.unwrap().offset)
            .collect();
        assert_eq!(offsets, vec![8, 8 + 12 + 3]);
    }

    #[test]
    fn chunk_type_comparisons() {
        let kind = ChunkType::new(b"STAR");
        assert_eq!(kind, *b"STAR");
        assert_eq!(kind, b"STAR");
        assert_eq!(kind.as_str(), Some("STAR"));
        assert_eq!(format!("{:?}", kind), "ChunkType(\"STAR\")");
    }
}
