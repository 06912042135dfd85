//! # assemread
//!
//! A staged reader for alignment and assembly files.
//!
//! Sequencing pipelines hand over reads in several container formats: SAM text,
//! its BGZF-compressed binary sibling BAM, and the MIRA assembly format (MAF), which
//! groups reads under the contigs they were assembled into. `assemread` reads all
//! three into one [`Assembly`] model, a chunk at a time, so that large inputs never
//! have to fit in memory.
//!
//! ## Features
//!
//! - **Format probing**: Tries each registered decoder in turn when the format is not declared
//! - **Chunked loading**: Each call decodes a bounded number of records
//! - **Query filtering**: Keeps only contigs whose names match wildcard patterns
//! - **Indexed regions**: Fetches BAM records for one region through a `.bai` index
//! - **Multi-input queries**: `@list` files, `format::path` and `path:id` selectors
//!
//! ## Example
//!
//! ```rust,no_run
//! use assemread::{Assembly, Loader, LoaderConfig};
//!
//! let config = LoaderConfig {
//!     ids: vec!["contig_1*".to_string()],
//!     ..LoaderConfig::default()
//! };
//! let mut loader = Loader::open("maf::assembly.maf", config).unwrap();
//! let mut assembly = Assembly::new();
//!
//! while loader.load_next(&mut assembly) {
//!     for read in assembly.reads() {
//!         println!("{} at {:?}", read.name, read.position());
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: The assembly model: contigs, reads, tags and header metadata
//! - [`parsing`]: Line and block readers plus the SAM, BAM and MAF decoders
//! - [`loader`]: Format registry, probe engine and the chunked loader facade
//! - [`query`]: Input query resolution and identifier matching
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod core;
pub mod loader;
pub mod parsing;
pub mod query;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::assembly::Assembly;
pub use core::contig::Contig;
pub use core::read::Read;
pub use core::tag::Tag;
pub use core::types::*;
pub use loader::engine::{Outcome, ProbeEngine};
pub use loader::facade::{Loader, LoaderConfig};
pub use loader::registry::FormatRegistry;
pub use query::matcher::{Query, QueryField};
