use anyhow::Context;
use celestial_tiles::table::{read_column_entries, ColumnEntry, EXPLICIT_TABLE_VERSION};
use celestial_tiles::{
    read_compressed_block, read_tile_header, resolve_table, Chunk, ColumnSpec, FieldValue,
    LoadOptions, TileFile,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tile-inspect")]
#[command(about = "Inspect EPHE star-tile files")]
struct Cli {
    /// Path to the tile file
    file: PathBuf,

    /// Verify chunk checksums while walking the file
    #[arg(long, global = true)]
    strict: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the file header and list every chunk
    Info,
    /// Decode the tiles stored in chunks of one type
    Tile {
        /// Chunk type to decode
        #[arg(long, default_value = "STAR")]
        kind: String,
        /// Rows to print per tile
        #[arg(long, default_value = "5")]
        rows: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let file = TileFile::open(&cli.file)
        .with_context(|| format!("opening {}", cli.file.display()))?;
    let options = if cli.strict {
        LoadOptions::strict()
    } else {
        LoadOptions::default()
    };

    match cli.command {
        Commands::Info => info(&file, options),
        Commands::Tile { kind, rows } => tiles(&file, options, &kind, rows),
    }
}

fn info(file: &TileFile, options: LoadOptions) -> anyhow::Result<()> {
    println!("Version: {}", file.version());
    println!("File size: {} bytes", file.len());
    println!();
    println!("{:>10}  {:<4}  {:>10}  {:>10}", "offset", "type", "length", "checksum");

    let mut count = 0;
    for chunk in file.chunks(options)? {
        let chunk = chunk?;
        println!(
            "{:>10}  {:<4}  {:>10}  {:#010x}",
            chunk.offset,
            chunk.kind,
            chunk.len(),
            chunk.checksum
        );
        count += 1;
    }
    println!();
    println!("{} chunks", count);
    Ok(())
}

fn tiles(file: &TileFile, options: LoadOptions, kind: &str, max_rows: usize) -> anyhow::Result<()> {
    let kind = kind.as_bytes();
    anyhow::ensure!(kind.len() == 4, "chunk type must be exactly 4 bytes");

    for chunk in file.chunks(options)? {
        let chunk = chunk?;
        if chunk.kind.as_bytes() != kind {
            continue;
        }
        if let Err(e) = print_tile(&chunk, max_rows) {
            log::warn!("Skipping {} chunk at offset {}: {:#}", chunk.kind, chunk.offset, e);
        }
    }
    Ok(())
}

fn print_tile(chunk: &Chunk<'_>, max_rows: usize) -> anyhow::Result<()> {
    let mut cursor = 0;
    let header = read_tile_header(chunk.payload, &mut cursor)?;
    let mut table = read_compressed_block(chunk.payload, &mut cursor)?;

    println!(
        "{} (nuniq {}, table version {}, {} bytes inflated)",
        header.index,
        header.index.nuniq(),
        header.version,
        table.len()
    );

    if header.version < EXPLICIT_TABLE_VERSION {
        println!("  legacy table: schema is not stored in the file");
        return Ok(());
    }

    let (table_header, entries) = read_column_entries(&table)?;
    println!(
        "  {} rows of {} bytes, {}",
        table_header.row_count,
        table_header.row_size,
        if table_header.is_shuffled() { "shuffled" } else { "unshuffled" }
    );
    for entry in &entries {
        print_entry(entry);
    }

    let specs = entries
        .iter()
        .map(ColumnEntry::to_spec)
        .collect::<Result<Vec<ColumnSpec>, _>>()?;
    let mut row_cursor = 0;
    let layout = resolve_table(header.version, &mut table, &mut row_cursor, 0, &specs)?;

    for row in layout.rows(&table, row_cursor).take(max_rows) {
        let fields: Vec<String> = row?.iter().map(format_field).collect();
        println!("  {}", fields.join("  "));
    }
    Ok(())
}

fn print_entry(entry: &ColumnEntry) {
    println!(
        "  column {:<4}  type {}  unit {:<6}  offset {:>3}  size {:>3}",
        entry.name.to_string(),
        entry.tag as char,
        entry.unit.to_string(),
        entry.offset,
        entry.size
    );
}

fn format_field(value: &FieldValue<'_>) -> String {
    match value {
        FieldValue::Int32(v) => v.to_string(),
        FieldValue::Float(v) => format!("{:.6}", v),
        FieldValue::UInt64(v) => v.to_string(),
        FieldValue::Bytes(_) => match value.as_str() {
            Some(s) => format!("{:?}", s),
            None => "<binary>".to_string(),
        },
    }
}
