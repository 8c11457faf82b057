//! Typed reads of table rows.

use crate::errors::{Result, TileError};
use crate::table::{ColumnType, ResolvedColumn, TableLayout};
use crate::units;
use byteorder::{ByteOrder, LittleEndian};

/// One decoded field. Byte strings borrow from the table data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Int32(i32),
    /// Stored as f32, widened and converted to the requested unit.
    Float(f64),
    UInt64(u64),
    Bytes(&'a [u8]),
}

impl<'a> FieldValue<'a> {
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Self::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::UInt64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match *self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Byte string up to its first NUL, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&'a str> {
        let bytes = self.as_bytes()?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        std::str::from_utf8(&bytes[..end]).ok()
    }
}

/// Read the row at `*cursor` and advance the cursor by one row.
///
/// Returns one value per column of `layout`, in column order.
pub fn read_row<'a>(
    data: &'a [u8],
    cursor: &mut usize,
    layout: &TableLayout,
) -> Result<Vec<FieldValue<'a>>> {
    let row = row_bytes(data, *cursor, layout.row_size)?;
    let values = layout
        .columns
        .iter()
        .map(|column| read_field(row, column))
        .collect();
    *cursor += layout.row_size;
    Ok(values)
}

fn row_bytes(data: &[u8], start: usize, row_size: usize) -> Result<&[u8]> {
    data.get(start..)
        .and_then(|rest| rest.get(..row_size))
        .ok_or_else(|| TileError::truncated("table row", row_size, data.len().saturating_sub(start)))
}

// Offsets were checked against the row size when the layout was resolved.
fn read_field<'a>(row: &'a [u8], column: &ResolvedColumn) -> FieldValue<'a> {
    let bytes = &row[column.offset..column.offset + column.read_len()];
    match column.ty {
        ColumnType::Int32 => FieldValue::Int32(LittleEndian::read_i32(bytes)),
        ColumnType::Float32 => {
            let stored = LittleEndian::read_f32(bytes) as f64;
            FieldValue::Float(units::convert(column.src_unit, column.unit, stored))
        }
        ColumnType::UInt64 => FieldValue::UInt64(LittleEndian::read_u64(bytes)),
        ColumnType::Bytes => FieldValue::Bytes(bytes),
    }
}

impl TableLayout {
    /// Iterate over all rows, starting at byte `start` of `data`
    /// (the cursor value returned by [`resolve_table`](crate::table::resolve_table)).
    pub fn rows<'a, 'l>(&'l self, data: &'a [u8], start: usize) -> Rows<'a, 'l> {
        Rows {
            data,
            layout: self,
            cursor: start,
            remaining: self.row_count,
        }
    }
}

/// Iterator over the rows of a resolved table. Stops after the first error.
pub struct Rows<'a, 'l> {
    data: &'a [u8],
    layout: &'l TableLayout,
    cursor: usize,
    remaining: usize,
}

impl<'a, 'l> Iterator for Rows<'a, 'l> {
    type Item = Result<Vec<FieldValue<'a>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let result = read_row(self.data, &mut self.cursor, self.layout);
        self.remaining = if result.is_ok() { self.remaining - 1 } else { 0 };
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{resolve_table, ColumnName, ColumnSpec, TableEncoding};
    use crate::units::Unit;

    fn column(name: &str, ty: ColumnType, offset: usize, size: usize) -> ResolvedColumn {
        ResolvedColumn {
            name: ColumnName::new(name),
            ty,
            unit: Unit::NONE,
            src_unit: Unit::NONE,
            offset,
            size,
        }
    }

    fn layout(row_size: usize, row_count: usize, columns: Vec<ResolvedColumn>) -> TableLayout {
        TableLayout {
            encoding: TableEncoding::Explicit,
            row_size,
            row_count,
            columns,
        }
    }

    #[test]
    fn reads_every_type() {
        let mut row = Vec::new();
        row.extend_from_slice(&(-7i32).to_le_bytes());
        row.extend_from_slice(&2.5f32.to_le_bytes());
        row.extend_from_slice(&u64::MAX.to_le_bytes());
        row.extend_from_slice(b"HD1\0");

        let layout = layout(
            20,
            1,
            vec![
                column("hd", ColumnType::Int32, 0, 4),
                column("vmag", ColumnType::Float32, 4, 4),
                column("gaia", ColumnType::UInt64, 8, 8),
                column("name", ColumnType::Bytes, 16, 4),
            ],
        );

        let mut cursor = 0;
        let values = read_row(&row, &mut cursor, &layout).unwrap();
        assert_eq!(cursor, 20);
        assert_eq!(values[0].as_i32(), Some(-7));
        assert_eq!(values[1].as_f64(), Some(2.5));
        assert_eq!(values[2].as_u64(), Some(u64::MAX));
        assert_eq!(values[3].as_bytes(), Some(&b"HD1\0"[..]));
        assert_eq!(values[3].as_str(), Some("HD1"));
        assert_eq!(values[0].as_f64(), None);
    }

    #[test]
    fn converts_float_units() {
        let row = 90.0f32.to_le_bytes();
        let mut col = column("ra", ColumnType::Float32, 0, 4);
        col.src_unit = Unit::DEG;
        col.unit = Unit::RAD;
        let layout = layout(4, 1, vec![col]);

        let mut cursor = 0;
        let values = read_row(&row, &mut cursor, &layout).unwrap();
        let ra = values[0].as_f64().unwrap();
        assert!((ra - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn row_past_end_is_error() {
        let data = [0u8; 10];
        let layout = layout(8, 2, vec![column("a", ColumnType::Int32, 0, 4)]);
        let mut cursor = 4;
        let err = read_row(&data, &mut cursor, &layout).unwrap_err();
        assert!(err.is_format());
        assert_eq!(cursor, 4);
    }

    #[test]
    fn ra_dec_without_conversion() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        for (name, offset) in [(b"ra\0\0", 0u32), (b"dec\0", 4)] {
            data.extend_from_slice(name);
            data.extend_from_slice(b"f\0\0\0");
            data.extend_from_slice(&1u32.to_le_bytes());
            data.extend_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(&4u32.to_le_bytes());
        }
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&2.0f32.to_le_bytes());

        let specs = [
            ColumnSpec::new("ra", ColumnType::Float32),
            ColumnSpec::new("dec", ColumnType::Float32),
        ];
        let mut cursor = 0;
        let layout = resolve_table(3, &mut data, &mut cursor, 0, &specs).unwrap();
        let values = read_row(&data, &mut cursor, &layout).unwrap();
        assert_eq!(values, vec![FieldValue::Float(1.0), FieldValue::Float(2.0)]);
        assert_eq!(cursor, data.len());
    }

    #[test]
    fn rows_iterates_row_count() {
        let mut data = vec![0xEE; 3];
        for i in 0..4i32 {
            data.extend_from_slice(&i.to_le_bytes());
        }
        let layout = layout(4, 4, vec![column("n", ColumnType::Int32, 0, 4)]);

        let ids: Vec<i32> = layout
            .rows(&data, 3)
            .map(|row| row.unwrap()[0].as_i32().unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn rows_stops_after_error() {
        let data = [0u8; 6];
        let layout = layout(4, 3, vec![column("n", ColumnType::Int32, 0, 4)]);
        let results: Vec<_> = layout.rows(&data, 0).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
