//! Row tables and their column layout.
//!
//! Tables come in two encodings, chosen by the table version the caller
//! passes in (not the container version):
//!
//! - **Legacy** (`version < 3`): bare rows, no header. The caller supplies
//!   the row size; columns are packed in the order the caller lists them.
//!   Rows are always byte-shuffled, except for 104-byte rows, which were
//!   never shuffled when those files were written.
//! - **Explicit** (`version >= 3`): a header describing every stored column,
//!   followed by the rows.
//!
//! ```text
//! u32  flags             bit 0: rows are byte-shuffled
//! u32  row_size
//! u32  n_col
//! u32  n_row
//! n_col × {
//!     [u8; 4]  name      NUL padded
//!     [u8; 4]  type      'i', 'f', 'Q' or 's' in the first byte
//!     u32      unit      unit code of the stored values
//!     u32      offset    start of the field within a row
//!     u32      size      field size in bytes
//! }
//! n_row × row_size bytes of row data
//! ```
//!
//! Stored columns are matched by name against the columns the caller
//! expects. Extra stored columns are ignored; a missing or differently
//! typed one is a [`SchemaError`].

use crate::errors::{FormatError, Result, SchemaError, TileError};
use crate::shuffle::unshuffle;
use crate::units::Unit;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::hash::{Hash, Hasher};

pub const TABLE_HEADER_SIZE: usize = 16;
pub const COLUMN_ENTRY_SIZE: usize = 20;

/// Header flag: row data is byte-shuffled.
pub const FLAG_SHUFFLED: u32 = 1 << 0;

/// Legacy row size that was written without shuffling.
pub const LEGACY_UNSHUFFLED_ROW_SIZE: usize = 104;

/// First table version with an on-disk column header.
pub const EXPLICIT_TABLE_VERSION: u32 = 3;

/// Four-byte column identifier.
///
/// Compares like `strncmp(a, b, 4)`: bytes after the first NUL are ignored.
#[derive(Clone, Copy)]
pub struct ColumnName([u8; 4]);

impl ColumnName {
    /// # Panics
    /// If `name` is longer than four bytes.
    pub fn new(name: &str) -> Self {
        assert!(name.len() <= 4, "column name {:?} longer than 4 bytes", name);
        let mut bytes = [0u8; 4];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(4);
        &self.0[..end]
    }
}

impl PartialEq for ColumnName {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ColumnName {}

impl Hash for ColumnName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnName({:?})", self.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `'i'`: little-endian i32.
    Int32,
    /// `'f'`: little-endian f32, read back as f64 in the requested unit.
    Float32,
    /// `'Q'`: little-endian u64.
    UInt64,
    /// `'s'`: fixed-size byte string.
    Bytes,
}

impl ColumnType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'i' => Some(Self::Int32),
            b'f' => Some(Self::Float32),
            b'Q' => Some(Self::UInt64),
            b's' => Some(Self::Bytes),
            _ => None,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::Int32 => b'i',
            Self::Float32 => b'f',
            Self::UInt64 => b'Q',
            Self::Bytes => b's',
        }
    }

    /// Size implied by the type. Byte strings have none.
    pub fn default_size(&self) -> Option<usize> {
        match self {
            Self::Int32 | Self::Float32 => Some(4),
            Self::UInt64 => Some(8),
            Self::Bytes => None,
        }
    }
}

/// A column the caller expects to find in a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: ColumnName,
    pub ty: ColumnType,
    /// Unit float values are returned in. [`Unit::NONE`] keeps the stored unit.
    pub unit: Unit,
    /// Field size for legacy tables. Required for byte strings.
    pub size: Option<usize>,
}

impl ColumnSpec {
    pub fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: ColumnName::new(name),
            ty,
            unit: Unit::NONE,
            size: None,
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

/// A column located within a table's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub name: ColumnName,
    pub ty: ColumnType,
    /// Unit requested by the caller.
    pub unit: Unit,
    /// Unit the values are stored in.
    pub src_unit: Unit,
    pub offset: usize,
    pub size: usize,
}

impl ResolvedColumn {
    /// Bytes the row reader takes from each row for this column.
    pub fn read_len(&self) -> usize {
        self.ty.default_size().unwrap_or(self.size)
    }

    fn check_fits(&self, row_size: usize) -> std::result::Result<(), SchemaError> {
        let end = self.offset.saturating_add(self.read_len());
        if end > row_size {
            return Err(SchemaError::ColumnOutOfRow {
                column: self.name.to_string(),
                offset: self.offset,
                end,
                row_size,
            });
        }
        Ok(())
    }
}

/// Resolved layout of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub encoding: TableEncoding,
    pub row_size: usize,
    pub row_count: usize,
    /// One entry per expected column, in the caller's order.
    pub columns: Vec<ResolvedColumn>,
}

impl TableLayout {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = ColumnName::new(name);
        self.columns.iter().position(|c| c.name == name)
    }

    /// Bytes of row data the layout covers.
    pub fn data_len(&self) -> usize {
        self.row_size * self.row_count
    }
}

/// Decoded 16-byte header of an explicit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub flags: u32,
    pub row_size: u32,
    pub column_count: u32,
    pub row_count: u32,
}

impl TableHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TABLE_HEADER_SIZE {
            return Err(TileError::truncated(
                "table header",
                TABLE_HEADER_SIZE,
                bytes.len(),
            ));
        }
        Ok(Self {
            flags: LittleEndian::read_u32(&bytes[0..4]),
            row_size: LittleEndian::read_u32(&bytes[4..8]),
            column_count: LittleEndian::read_u32(&bytes[8..12]),
            row_count: LittleEndian::read_u32(&bytes[12..16]),
        })
    }

    pub fn is_shuffled(&self) -> bool {
        self.flags & FLAG_SHUFFLED != 0
    }

    /// Size of the header plus column table, i.e. where the rows start.
    pub fn rows_offset(&self) -> usize {
        TABLE_HEADER_SIZE + self.column_count as usize * COLUMN_ENTRY_SIZE
    }
}

/// One stored column description of an explicit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnEntry {
    pub name: ColumnName,
    pub tag: u8,
    pub unit: Unit,
    pub offset: u32,
    pub size: u32,
}

impl ColumnEntry {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut name = [0u8; 4];
        name.copy_from_slice(&bytes[0..4]);
        Self {
            name: ColumnName::from_bytes(name),
            tag: bytes[4],
            unit: Unit(LittleEndian::read_u32(&bytes[8..12])),
            offset: LittleEndian::read_u32(&bytes[12..16]),
            size: LittleEndian::read_u32(&bytes[16..20]),
        }
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        ColumnType::from_tag(self.tag)
    }

    /// An expected-column spec that matches this entry and keeps its unit.
    pub fn to_spec(&self) -> std::result::Result<ColumnSpec, SchemaError> {
        let ty = self
            .column_type()
            .ok_or(SchemaError::UnknownType(self.tag as char))?;
        Ok(ColumnSpec {
            name: self.name,
            ty,
            unit: Unit::NONE,
            size: Some(self.size as usize),
        })
    }
}

/// Read the header and column table of an explicit table without
/// resolving it against anything.
pub fn read_column_entries(data: &[u8]) -> Result<(TableHeader, Vec<ColumnEntry>)> {
    let header = TableHeader::from_bytes(data)?;
    let table_end = TABLE_HEADER_SIZE
        .checked_add((header.column_count as usize).saturating_mul(COLUMN_ENTRY_SIZE))
        .unwrap_or(usize::MAX);
    let table = data
        .get(TABLE_HEADER_SIZE..table_end)
        .ok_or_else(|| TileError::truncated("column table", table_end, data.len()))?;

    let entries = table
        .chunks_exact(COLUMN_ENTRY_SIZE)
        .map(ColumnEntry::from_bytes)
        .collect();
    Ok((header, entries))
}

/// How a table's layout is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEncoding {
    Legacy,
    Explicit,
}

impl TableEncoding {
    pub fn from_version(version: u32) -> Self {
        if version < EXPLICIT_TABLE_VERSION {
            Self::Legacy
        } else {
            Self::Explicit
        }
    }

    /// Resolve `columns` against the table in `data` and unshuffle its rows
    /// in place. `row_size` is only used by the legacy encoding.
    pub fn resolve(
        self,
        data: &mut [u8],
        cursor: &mut usize,
        row_size: usize,
        columns: &[ColumnSpec],
    ) -> Result<TableLayout> {
        assert_eq!(*cursor, 0, "tables must be resolved from the start of their block");
        match self {
            Self::Legacy => resolve_legacy(data, row_size, columns),
            Self::Explicit => resolve_explicit(data, cursor, columns),
        }
    }
}

/// Resolve the table at the start of `data`, written with table format
/// `version`.
///
/// On success the rows are in natural order and `*cursor` points at the
/// first row. `data` must be the whole decompressed table block and
/// `*cursor` must be 0.
pub fn resolve_table(
    version: u32,
    data: &mut [u8],
    cursor: &mut usize,
    row_size: usize,
    columns: &[ColumnSpec],
) -> Result<TableLayout> {
    TableEncoding::from_version(version).resolve(data, cursor, row_size, columns)
}

fn resolve_legacy(data: &mut [u8], row_size: usize, specs: &[ColumnSpec]) -> Result<TableLayout> {
    if row_size == 0 {
        return Err(SchemaError::ZeroRowSize.into());
    }

    let mut start = 0;
    let mut columns = Vec::with_capacity(specs.len());
    for spec in specs {
        let size = spec.size.or(spec.ty.default_size()).ok_or_else(|| {
            SchemaError::UnsizedColumn {
                column: spec.name.to_string(),
            }
        })?;
        let column = ResolvedColumn {
            name: spec.name,
            ty: spec.ty,
            unit: spec.unit,
            src_unit: spec.unit,
            offset: start,
            size,
        };
        column.check_fits(row_size)?;
        columns.push(column);
        start += size;
    }

    let row_count = data.len() / row_size;
    if row_size == LEGACY_UNSHUFFLED_ROW_SIZE {
        log::trace!("legacy {}-byte rows are stored unshuffled", row_size);
    } else {
        unshuffle(data, row_count, row_size);
    }

    Ok(TableLayout {
        encoding: TableEncoding::Legacy,
        row_size,
        row_count,
        columns,
    })
}

fn resolve_explicit(data: &mut [u8], cursor: &mut usize, specs: &[ColumnSpec]) -> Result<TableLayout> {
    let (header, entries) = read_column_entries(data)?;
    let row_size = header.row_size as usize;

    let mut slots: Vec<Option<ResolvedColumn>> = vec![None; specs.len()];
    for entry in &entries {
        let Some(j) = specs.iter().position(|spec| spec.name == entry.name) else {
            log::trace!("skipping stored column {}", entry.name);
            continue;
        };
        let spec = &specs[j];
        if entry.tag != spec.ty.tag() {
            log::error!("Wrong type for column {}", spec.name);
            return Err(SchemaError::TypeMismatch {
                column: spec.name.to_string(),
                expected: spec.ty.tag() as char,
                found: entry.tag as char,
            }
            .into());
        }
        // A later stored duplicate of the same name replaces the earlier one.
        slots[j] = Some(ResolvedColumn {
            name: spec.name,
            ty: spec.ty,
            unit: spec.unit,
            src_unit: entry.unit,
            offset: entry.offset as usize,
            size: entry.size as usize,
        });
    }

    let mut columns = Vec::with_capacity(specs.len());
    for (spec, slot) in specs.iter().zip(slots) {
        let Some(column) = slot else {
            log::error!("Cannot find column {}", spec.name);
            return Err(SchemaError::MissingColumn {
                column: spec.name.to_string(),
            }
            .into());
        };
        column.check_fits(row_size)?;
        columns.push(column);
    }

    let rows_offset = header.rows_offset();
    let row_count = header.row_count as usize;
    let rows_len = row_size.checked_mul(row_count).unwrap_or(usize::MAX);
    let available = data.len() - rows_offset;
    if rows_len > available {
        return Err(FormatError::Truncated {
            what: "table rows",
            needed: rows_len,
            available,
        }
        .into());
    }

    if header.is_shuffled() {
        unshuffle(&mut data[rows_offset..], row_count, row_size);
    }

    *cursor += rows_offset;
    Ok(TableLayout {
        encoding: TableEncoding::Explicit,
        row_size,
        row_count,
        columns,
    })
}
