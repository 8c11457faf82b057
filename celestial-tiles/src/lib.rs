//! Decoder for EPHE star-tile files.
//!
//! An EPHE file is a flat sequence of typed chunks. Star and deep-sky chunks
//! hold a HEALPix tile header followed by a zlib-compressed row table, whose
//! schema is either implied by the caller (legacy tables) or stored in the
//! data itself (explicit tables). Rows are decoded into typed fields, and
//! float columns can be converted between angle and time units on read.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`container`] | File header, chunk walking ([`load`], [`chunks`]), optional checksum checks |
//! | [`file`] | [`TileFile`], a memory-mapped file handle |
//! | [`tile`] | [`TileHeader`] and the NUNIQ-encoded [`TileIndex`] |
//! | [`block`] | [`read_compressed_block`] and the [`Inflate`] seam |
//! | [`shuffle`] | Byte-plane shuffle and unshuffle of fixed-size records |
//! | [`table`] | Column schemas and [`resolve_table`] for legacy and explicit tables |
//! | [`row`] | [`read_row`] and [`FieldValue`] |
//! | [`units`] | [`Unit`] bitmasks and [`convert`] |
//! | [`errors`] | [`TileError`] and its format, decompression and schema variants |
//!
//! # Quick Start
//!
//! ```ignore
//! use celestial_tiles::{
//!     read_compressed_block, read_row, read_tile_header, resolve_table, ColumnSpec,
//!     ColumnType, TileFile, LoadOptions, Unit,
//! };
//!
//! let file = TileFile::open("stars.eph")?;
//! for chunk in file.chunks(LoadOptions::default())? {
//!     let chunk = chunk?;
//!     if chunk.kind != *b"STAR" {
//!         continue;
//!     }
//!     let mut cursor = 0;
//!     let header = read_tile_header(chunk.payload, &mut cursor)?;
//!     let mut table = read_compressed_block(chunk.payload, &mut cursor)?;
//!
//!     let columns = [
//!         ColumnSpec::new("ra", ColumnType::Float32).with_unit(Unit::RAD),
//!         ColumnSpec::new("dec", ColumnType::Float32).with_unit(Unit::RAD),
//!     ];
//!     let mut row_cursor = 0;
//!     let layout = resolve_table(header.version, &mut table, &mut row_cursor, 0, &columns)?;
//!     for row in layout.rows(&table, row_cursor) {
//!         let row = row?;
//!         println!("{} {:?}", header.index, row);
//!     }
//! }
//! ```
//!
//! # Features
//!
//! - **`cli`**: builds the `tile-inspect` binary for dumping chunk lists,
//!   tile headers and table contents from the command line.

pub mod block;
pub mod container;
pub mod errors;
pub mod file;
pub mod row;
pub mod shuffle;
pub mod table;
pub mod tile;
pub mod units;

pub use block::{read_compressed_block, read_compressed_block_with, Inflate, Zlib};
pub use container::{chunks, load, load_with, Chunk, ChunkType, Chunks, LoadOptions};
pub use errors::{FormatError, Result, SchemaError, TileError};
pub use file::TileFile;
pub use row::{read_row, FieldValue, Rows};
pub use table::{
    read_column_entries, resolve_table, ColumnEntry, ColumnSpec, ColumnType, TableEncoding,
    TableHeader, TableLayout,
};
pub use tile::{read_tile_header, TileHeader, TileIndex};
pub use units::{convert, Unit};
