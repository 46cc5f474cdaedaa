//! MosaicLayer CLI - Command-line interface
//!
//! Ingests frame manifests into the configured mosaic and inspects or
//! exports its tiles.

mod commands;
mod error;
mod manifest;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{export, info, ingest, init};

#[derive(Parser)]
#[command(name = "mosaiclayer")]
#[command(version, about = "Incremental tile mosaicking of geo-referenced imagery", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.mosaiclayer/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Mosaic every frame listed in a manifest, in file order
    Ingest {
        /// Manifest with one [frame.<name>] section per frame
        manifest: PathBuf,
    },

    /// Show the pyramid and per-level tile counts
    Info,

    /// Write one tile to a PNG file
    Export {
        /// Pyramid level number
        #[arg(long)]
        zoom: u8,

        /// Tile column
        #[arg(long)]
        col: u32,

        /// Tile row
        #[arg(long)]
        row: u32,

        /// Composite the foreground over the background instead of
        /// returning whichever has the tile
        #[arg(long)]
        render: bool,

        /// Output PNG path
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init { force } => init::run(config, force),
        Commands::Ingest { manifest } => ingest::run(config, &manifest),
        Commands::Info => info::run(config),
        Commands::Export {
            zoom,
            col,
            row,
            render,
            output,
        } => export::run(
            config,
            export::ExportArgs {
                zoom,
                col,
                row,
                render,
                output,
            },
        ),
    };

    if let Err(e) = result {
        e.exit();
    }
}
