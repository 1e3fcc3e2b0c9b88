//! SnapKV CLI
//!
//! Inspect and edit a snapshot file from the command line.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use snapkv::{Config, Engine, Mode};
use tracing_subscriber::{fmt, EnvFilter};

/// SnapKV CLI
#[derive(Parser, Debug)]
#[command(name = "snapkv")]
#[command(about = "Inspect and edit a SnapKV snapshot file")]
#[command(version)]
struct Args {
    /// Snapshot file
    #[arg(short, long, default_value = "./snapkv.db")]
    file: String,

    /// Log persistence activity verbosely
    #[arg(short, long)]
    debug: bool,

    /// Write the snapshot in place instead of write-then-rename
    #[arg(long)]
    in_place: bool,

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

    /// Create a record
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Replace the value if the key already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a record
    ///
    /// Deleting the last record leaves the snapshot file as it was: an
    /// empty store is never written.
    Del {
        /// The key to delete
        key: String,
    },

    /// List all keys
    Keys,

    /// Print every record as `key<TAB>value`
    Dump,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,snapkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .snapshot_path(&args.file)
        .mode(if args.debug { Mode::Debug } else { Mode::Normal })
        .atomic_writes(!args.in_place)
        .build();

    let engine = match Engine::initialize(config) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", args.file, e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&engine, args.command);

    // Final flush happens here
    if let Err(e) = engine.shutdown() {
        tracing::error!("Failed to save {}: {}", args.file, e);
        return ExitCode::FAILURE;
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(engine: &Engine, command: Commands) -> snapkv::Result<()> {
    match command {
        Commands::Get { key } => {
            println!("{}", engine.read(&key)?);
        }
        Commands::Set {
            key,
            value,
            overwrite,
        } => {
            if overwrite && engine.contains(&key) {
                engine.update(&key, value)?;
            } else {
                engine.create(key, value)?;
            }
        }
        Commands::Del { key } => {
            engine.delete(&key)?;
        }
        Commands::Keys => {
            let mut keys = engine.keys();
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
        }
        Commands::Dump => {
            let mut records: Vec<_> = engine.all().into_iter().collect();
            records.sort();
            for (key, value) in records {
                println!("{}\t{}", key, value);
            }
        }
    }
    Ok(())
}
