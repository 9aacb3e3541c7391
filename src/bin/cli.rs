//! sparsekv CLI
//!
//! Command-line interface for a local sparsekv data directory.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sparsekv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// sparsekv CLI
#[derive(Parser, Debug)]
#[command(name = "sparsekv-cli")]
#[command(about = "CLI for the sparsekv embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./sparsekv_data")]
    data_dir: String,

    /// MemTable size limit in bytes before flush
    #[arg(short, long, default_value = "150")]
    memtable_limit: usize,

    /// Sparse index block size in bytes
    #[arg(short, long, default_value = "10")]
    block_size: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Merge all segments into one
    Compact,

    /// Print segment statistics
    Stats,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,sparsekv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Short-lived process: compaction only runs when asked for
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .memtable_size_limit(args.memtable_limit)
        .block_size(args.block_size)
        .disable_background_compaction()
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let status = match run(&engine, args.command) {
        Ok(status) => status,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    };

    // Buffered writes only reach disk on close
    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
        return ExitCode::FAILURE;
    }

    status
}

fn run(engine: &Engine, command: Commands) -> sparsekv::Result<ExitCode> {
    match command {
        Commands::Get { key } => match engine.get(key.as_bytes())? {
            Some(value) => {
                println!("{}", String::from_utf8_lossy(&value));
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("key not found: {}", key);
                Ok(ExitCode::from(2))
            }
        },
        Commands::Set { key, value } => {
            engine.set(key.as_bytes(), value.as_bytes())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Compact => {
            match engine.compact()? {
                Some(stats) => println!(
                    "merged {} segment(s) into id {}: {} entries, {} bytes reclaimed",
                    stats.input_ids.len(),
                    stats.output_id,
                    stats.entries_written,
                    stats.bytes_reclaimed()
                ),
                None => println!("nothing to compact"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Stats => {
            for segment in engine.storage().list_segments(true) {
                println!(
                    "{:<16} {:>10} bytes {:>6} anchors",
                    segment.name(),
                    segment.file_size(),
                    segment.index().len()
                );
            }
            println!("segments: {}", engine.segment_count());
            Ok(ExitCode::SUCCESS)
        }
    }
}
