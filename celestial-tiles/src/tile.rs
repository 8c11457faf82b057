//! Tile headers and the NUNIQ HEALPix index.
//!
//! A NUNIQ value packs a HEALPix order and a nested pixel index into one
//! integer: `nuniq = 4 * 4^order + pixel`. Every order owns the half-open
//! range `[4 * 4^order, 16 * 4^order)`, so the order is recovered from the
//! position of the highest set bit.

use crate::errors::{FormatError, Result, TileError};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

pub const TILE_HEADER_SIZE: usize = 12;

/// Highest order whose NUNIQ values fit in a `u64`.
pub const MAX_ORDER: u32 = 29;

/// A HEALPix tile: subdivision level and nested pixel index at that level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    pub order: u32,
    pub pixel: u64,
}

impl TileIndex {
    pub fn new(order: u32, pixel: u64) -> Option<Self> {
        if order > MAX_ORDER || pixel >= npix(order) {
            return None;
        }
        Some(Self { order, pixel })
    }

    /// Decode a NUNIQ value. Returns `None` for values below 4, which
    /// encode no tile.
    pub fn from_nuniq(nuniq: u64) -> Option<Self> {
        if nuniq < 4 {
            return None;
        }
        let order = (nuniq / 4).ilog2() / 2;
        let pixel = nuniq - (4u64 << (2 * order));
        Some(Self { order, pixel })
    }

    pub fn nuniq(&self) -> u64 {
        (4u64 << (2 * self.order)) + self.pixel
    }

    /// HEALPix nside at this order.
    pub fn nside(&self) -> u64 {
        1u64 << self.order
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Norder{}/Npix{}", self.order, self.pixel)
    }
}

/// Number of pixels at `order`: `12 * 4^order`.
pub fn npix(order: u32) -> u64 {
    12u64 << (2 * order)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHeader {
    pub version: u32,
    pub index: TileIndex,
}

/// Read a tile header at `*cursor` and advance the cursor by 12.
pub fn read_tile_header(data: &[u8], cursor: &mut usize) -> Result<TileHeader> {
    let bytes = data
        .get(*cursor..)
        .and_then(|rest| rest.get(..TILE_HEADER_SIZE))
        .ok_or_else(|| {
            TileError::truncated(
                "tile header",
                TILE_HEADER_SIZE,
                data.len().saturating_sub(*cursor),
            )
        })?;

    let version = LittleEndian::read_u32(&bytes[0..4]);
    let nuniq = LittleEndian::read_u64(&bytes[4..12]);
    let index = TileIndex::from_nuniq(nuniq).ok_or(FormatError::InvalidNuniq(nuniq))?;

    *cursor += TILE_HEADER_SIZE;
    Ok(TileHeader { version, index })
}
