//! Command-line interface for assemread.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **load**: Decode assembly/alignment inputs chunk by chunk and print what was read
//! - **formats**: List the registered input formats
//!
//! ## Usage
//!
//! ```text
//! # Probe the format and print every chunk
//! assemread load sample.sam
//!
//! # Pin the format and keep only matching contigs
//! assemread load assembly.maf --input-format maf --id 'contig_1*'
//!
//! # Fetch a region through the BAM index, as JSON
//! assemread load sample.bam --region chr1:10000-20000 --format json
//!
//! # Read every input listed in a file
//! assemread load @inputs.list
//! ```

use clap::{Parser, Subcommand};

pub mod formats;
pub mod load;

#[derive(Parser)]
#[command(name = "assemread")]
#[command(version)]
#[command(about = "Staged reader for SAM, BAM and MIRA assembly files")]
#[command(
    long_about = "assemread decodes alignment and assembly files incrementally.\n\nThe input format is probed when not declared, records are read in bounded chunks, and contigs can be filtered by name with wildcard patterns."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load an input and print its contigs and reads
    Load(load::LoadArgs),

    /// List supported input formats
    Formats,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
