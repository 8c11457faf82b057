//! Error types for tile file decoding.
//!
//! | Variant | Scope | Effect on a container walk |
//! |---------|-------|----------------------------|
//! | [`Format`](TileError::Format) | magic, version, chunk framing, truncation | aborts the walk |
//! | [`Decompression`](TileError::Decompression) | one compressed block | block unusable, walk may continue |
//! | [`Schema`](TileError::Schema) | one table | table unusable |
//! | [`Io`](TileError::Io) | opening or mapping a file | nothing was decoded |

use thiserror::Error;

/// Framing and layout errors. Fatal to the whole decode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid file magic: expected \"EPHE\", got {actual:?}")]
    BadMagic { actual: [u8; 4] },

    #[error("Unsupported file version: expected {expected}, got {actual}")]
    UnsupportedVersion { expected: u32, actual: u32 },

    #[error("Truncated {what}: need {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Chunk '{kind}' at offset {offset} declares {len} payload bytes, only {remaining} bytes remain")]
    ChunkOverrun {
        kind: String,
        offset: usize,
        len: u32,
        remaining: usize,
    },

    #[error("Chunk '{kind}' checksum mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    ChecksumMismatch {
        kind: String,
        stored: u32,
        computed: u32,
    },

    #[error("Invalid NUNIQ tile index: {0}")]
    InvalidNuniq(u64),
}

/// A table's on-disk layout does not satisfy the caller's expected columns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Cannot find column {column}")]
    MissingColumn { column: String },

    #[error("Wrong type for column {column}: expected '{expected}', found '{found}'")]
    TypeMismatch {
        column: String,
        expected: char,
        found: char,
    },

    #[error("Column {column} has no size and its type has no default size")]
    UnsizedColumn { column: String },

    #[error("Column {column} spans bytes {offset}..{end}, beyond the {row_size}-byte row")]
    ColumnOutOfRow {
        column: String,
        offset: usize,
        end: usize,
        row_size: usize,
    },

    #[error("Table declares a zero row size")]
    ZeroRowSize,

    #[error("Unknown column type tag {0:?}")]
    UnknownType(char),
}

impl SchemaError {
    /// Name of the column the error is about, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::MissingColumn { column }
            | Self::TypeMismatch { column, .. }
            | Self::UnsizedColumn { column }
            | Self::ColumnOutOfRow { column, .. } => Some(column),
            Self::ZeroRowSize | Self::UnknownType(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TileError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Cannot uncompress data ({compressed_size} bytes -> {raw_size} bytes): {reason}")]
    Decompression {
        raw_size: usize,
        compressed_size: usize,
        reason: String,
    },

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TileError {
    pub(crate) fn truncated(what: &'static str, needed: usize, available: usize) -> Self {
        Self::Format(FormatError::Truncated {
            what,
            needed,
            available,
        })
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    pub fn is_decompression(&self) -> bool {
        matches!(self, Self::Decompression { .. })
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

pub type Result<T> = std::result::Result<T, TileError>;
