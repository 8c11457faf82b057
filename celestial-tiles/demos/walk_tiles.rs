//! Builds a small tile file in memory, then walks it and prints every star.
//!
//! Run with `cargo run --example walk_tiles [path]` to decode a file on disk
//! instead.

use celestial_tiles::shuffle::shuffle;
use celestial_tiles::table::FLAG_SHUFFLED;
use celestial_tiles::{
    load, read_compressed_block, read_row, read_tile_header, resolve_table, ColumnSpec,
    ColumnType, TileFile, TileIndex, Unit,
};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let columns = [
        ColumnSpec::new("ra", ColumnType::Float32).with_unit(Unit::RAD),
        ColumnSpec::new("dec", ColumnType::Float32).with_unit(Unit::RAD),
        ColumnSpec::new("vmag", ColumnType::Float32),
    ];

    let handle = |payload: &[u8]| -> celestial_tiles::Result<()> {
        let mut cursor = 0;
        let header = read_tile_header(payload, &mut cursor)?;
        let mut table = read_compressed_block(payload, &mut cursor)?;

        let mut row_cursor = 0;
        let layout = resolve_table(header.version, &mut table, &mut row_cursor, 0, &columns)?;
        println!("{}: {} stars", header.index, layout.row_count);
        for _ in 0..layout.row_count {
            let row = read_row(&table, &mut row_cursor, &layout)?;
            println!(
                "  ra {:.6} rad  dec {:+.6} rad  vmag {:.2}",
                row[0].as_f64().unwrap_or(f64::NAN),
                row[1].as_f64().unwrap_or(f64::NAN),
                row[2].as_f64().unwrap_or(f64::NAN),
            );
        }
        Ok(())
    };

    let mut failures = Vec::new();
    if let Some(path) = std::env::args().nth(1) {
        let file = TileFile::open(path)?;
        file.load(Default::default(), |chunk| {
            if chunk.kind == *b"STAR" {
                if let Err(e) = handle(chunk.payload) {
                    failures.push(e);
                }
            }
        })?;
    } else {
        let data = demo_file()?;
        load(&data, |chunk| {
            if chunk.kind == *b"STAR" {
                if let Err(e) = handle(chunk.payload) {
                    failures.push(e);
                }
            }
        })?;
    }

    for e in failures {
        eprintln!("skipped tile: {}", e);
    }
    Ok(())
}

fn demo_file() -> std::io::Result<Vec<u8>> {
    let stars: [(f32, f32, f32); 3] = [(10.684, 41.269, 3.44), (83.822, -5.391, 4.0), (101.287, -16.716, -1.46)];

    let row_size = 12usize;
    let mut rows = Vec::new();
    for (ra, dec, vmag) in stars {
        rows.extend_from_slice(&ra.to_le_bytes());
        rows.extend_from_slice(&dec.to_le_bytes());
        rows.extend_from_slice(&vmag.to_le_bytes());
    }
    shuffle(&mut rows, stars.len(), row_size);

    let mut table = Vec::new();
    for v in [FLAG_SHUFFLED, row_size as u32, 3, stars.len() as u32] {
        table.extend_from_slice(&v.to_le_bytes());
    }
    for (name, unit, offset) in [(b"ra\0\0", Unit::DEG, 0u32), (b"dec\0", Unit::DEG, 4), (b"vmag", Unit::NONE, 8)] {
        table.extend_from_slice(name);
        table.extend_from_slice(b"f\0\0\0");
        table.extend_from_slice(&unit.bits().to_le_bytes());
        table.extend_from_slice(&offset.to_le_bytes());
        table.extend_from_slice(&4u32.to_le_bytes());
    }
    table.extend_from_slice(&rows);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&table)?;
    let compressed = encoder.finish()?;

    let tile = TileIndex::new(1, 17).expect("valid tile");
    let mut payload = Vec::new();
    payload.extend_from_slice(&3u32.to_le_bytes());
    payload.extend_from_slice(&tile.nuniq().to_le_bytes());
    payload.extend_from_slice(&(table.len() as u32).to_le_bytes());
    payload.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    payload.extend_from_slice(&compressed);

    let mut file = Vec::new();
    file.extend_from_slice(b"EPHE");
    file.extend_from_slice(&2u32.to_le_bytes());
    file.extend_from_slice(b"STAR");
    file.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    file.extend_from_slice(&payload);
    file.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(file)
}
