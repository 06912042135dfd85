//! Core data types for staged assembly reading.
//!
//! - [`Assembly`]: the aggregate a loader fills, owning contigs, reads and format metadata
//! - [`Contig`]: a named reference or consensus sequence
//! - [`Read`]: one alignment record
//! - [`Tag`], [`TagType`]: typed key/value annotations
//! - [`HeaderInfo`]: SAM-style `@HD`/`@RG`/`@PG`/`@CO` metadata
//! - [`FormatKind`], [`Region`], [`SortOrder`]: shared enums and value types
//!
//! ## Positions
//!
//! All positions are 1-based. A read's decoded position is stored on `x1` when it
//! lies on the forward strand and on `y1` when it is reverse-complemented:
//!
//! | Source | Forward | Reverse |
//! |--------|---------|---------|
//! | SAM/BAM | `x1 = POS` | `y1 = POS` |
//! | MAF `AT` | `x1 < y1` | `x1 < y1`, `reversed` set |
//!
//! [`Assembly`]: assembly::Assembly
//! [`Contig`]: contig::Contig
//! [`Read`]: read::Read
//! [`Tag`]: tag::Tag
//! [`TagType`]: tag::TagType
//! [`HeaderInfo`]: header::HeaderInfo
//! [`FormatKind`]: types::FormatKind
//! [`Region`]: types::Region
//! [`SortOrder`]: types::SortOrder

pub mod assembly;
pub mod contig;
pub mod header;
pub mod read;
pub mod tag;
pub mod types;
