//! Memory-mapped access to tile files on disk.

use crate::container::{self, Chunk, Chunks, LoadOptions};
use crate::errors::Result;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A tile file mapped into memory.
///
/// Chunks returned by [`TileFile::chunks`] borrow from the map, so no
/// payload is copied until a compressed block is inflated.
pub struct TileFile {
    mmap: Mmap,
    version: u32,
}

impl TileFile {
    /// Open and memory-map a tile file, validating its magic and version.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, or if the
    /// header is not a supported EPHE header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // The map is read-only and lives as long as `TileFile`; the file must
        // not be truncated by another process while it is open.
        let mmap = unsafe { Mmap::map(&file)? };
        let version = container::read_file_header(&mmap)?;
        Ok(Self { mmap, version })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn chunks(&self, options: LoadOptions) -> Result<Chunks<'_>> {
        container::chunks(&self.mmap, options)
    }

    pub fn load<F>(&self, options: LoadOptions, callback: F) -> Result<()>
    where
        F: FnMut(Chunk<'_>),
    {
        container::load_with(&self.mmap, options, callback)
    }
}
