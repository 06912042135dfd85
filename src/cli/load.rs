use std::io::{self, BufWriter, Write};

use clap::Args;

use crate::cli::OutputFormat;
use crate::core::assembly::Assembly;
use crate::core::read::Read;
use crate::core::types::Region;
use crate::loader::facade::{Loader, LoaderConfig};
use crate::loader::registry::FormatRegistry;
use crate::loader::state::ChunkSizes;

#[derive(Args)]
pub struct LoadArgs {
    /// Input query: a path, '-' for stdin, FORMAT::PATH, PATH:ID, or @LISTFILE
    #[arg(required = true)]
    pub input: String,

    /// Input format (probed by default; see `assemread formats`)
    #[arg(long)]
    pub input_format: Option<String>,

    /// Keep only contigs whose name matches this wildcard pattern (repeatable)
    #[arg(long = "id")]
    pub ids: Vec<String>,

    /// Match --id patterns case-insensitively
    #[arg(long)]
    pub ignore_case: bool,

    /// Records per chunk (defaults: 1 for SAM and BAM, 300 for MAF)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub chunk_size: Option<u32>,

    /// Region to fetch through the BAM index (NAME:START-END)
    #[arg(long)]
    pub region: Option<Region>,

    /// Read BAM files sequentially even when an index is present
    #[arg(long)]
    pub no_index: bool,

    /// Print contigs only, not reads
    #[arg(long)]
    pub contigs_only: bool,
}

#[derive(Debug, Default)]
struct Totals {
    chunks: u64,
    contigs: u64,
    reads: u64,
}

/// Execute load subcommand
///
/// # Errors
///
/// Returns an error if the query cannot be resolved, names an unknown format, or no
/// data could be loaded from any input.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: LoadArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let registry = FormatRegistry::standard();
    let query = match &args.input_format {
        Some(name) => {
            if registry.find(name).is_none() {
                anyhow::bail!("Unknown input format '{name}' (see `assemread formats`)");
            }
            format!("{name}::{}", args.input)
        }
        None => args.input.clone(),
    };

    let config = LoaderConfig {
        chunks: args
            .chunk_size
            .map_or_else(ChunkSizes::default, |n| ChunkSizes::uniform(n as usize)),
        region: args.region.clone(),
        use_index: !args.no_index,
        ids: args.ids.clone(),
        ignore_case: args.ignore_case,
    };

    let mut loader = Loader::open_with(&query, config, registry)?;
    let mut assembly = Assembly::new();
    let mut totals = Totals::default();
    let mut printed_contigs: Vec<String> = Vec::new();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if matches!(format, OutputFormat::Tsv) {
        writeln!(out, "record\tname\tlength_or_reference\tposition\tstrand\tcigar")?;
    }

    while loader.load_next(&mut assembly) {
        if assembly.is_empty() {
            continue;
        }
        totals.chunks += 1;
        totals.reads += assembly.reads().len() as u64;

        let names: Vec<String> = assembly.contigs().iter().map(|c| c.name.clone()).collect();
        let new_contigs = names != printed_contigs;
        if new_contigs {
            totals.contigs += names.len() as u64;
        }

        match format {
            OutputFormat::Text => print_text_chunk(&mut out, &assembly, new_contigs, args.contigs_only)?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut out, &assembly)?;
                writeln!(out)?;
            }
            OutputFormat::Tsv => print_tsv_chunk(&mut out, &assembly, new_contigs, args.contigs_only)?,
        }
        printed_contigs = names;
    }
    out.flush()?;
    loader.close();

    if verbose {
        eprintln!(
            "Loaded {} contigs and {} reads in {} chunks",
            totals.contigs, totals.reads, totals.chunks
        );
    }

    if totals.chunks == 0 {
        anyhow::bail!("No data could be loaded from '{}'", args.input);
    }
    Ok(())
}

fn strand(read: &Read) -> char {
    if read.reversed {
        '-'
    } else {
        '+'
    }
}

fn position(read: &Read) -> String {
    read.position().map_or_else(|| "*".to_string(), |p| p.to_string())
}

fn print_text_chunk(out: &mut impl Write, assembly: &Assembly, new_contigs: bool, contigs_only: bool) -> io::Result<()> {
    if new_contigs {
        if let Some(filename) = &assembly.format.filename {
            writeln!(out, "# {} ({})", filename, assembly.format.name)?;
        }
        for contig in assembly.contigs() {
            writeln!(out, "Contig {} ({} bp)", contig.name, contig.length)?;
        }
    }
    if contigs_only {
        return Ok(());
    }
    for read in assembly.reads() {
        writeln!(
            out,
            "  {} {}:{} {} {}",
            read.name,
            assembly.reference_name(read).unwrap_or("*"),
            position(read),
            strand(read),
            if read.cigar.is_empty() { "*" } else { read.cigar.as_str() },
        )?;
    }
    Ok(())
}

fn print_tsv_chunk(out: &mut impl Write, assembly: &Assembly, new_contigs: bool, contigs_only: bool) -> io::Result<()> {
    if new_contigs {
        for contig in assembly.contigs() {
            writeln!(out, "contig\t{}\t{}\t\t\t", contig.name, contig.length)?;
        }
    }
    if contigs_only {
        return Ok(());
    }
    for read in assembly.reads() {
        writeln!(
            out,
            "read\t{}\t{}\t{}\t{}\t{}",
            read.name,
            assembly.reference_name(read).unwrap_or("*"),
            position(read),
            strand(read),
            read.cigar,
        )?;
    }
    Ok(())
}
