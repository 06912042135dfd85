//! Format decoders and the low-level readers they share.
//!
//! Text formats read lines through [`cursor::LineCursor`], which keeps consumed lines
//! while a format is being probed so each candidate decoder sees the same input.
//! Binary formats read through a persistent [`bgzf::BlockStream`] instead.
//!
//! | Module | Format | Unit per call |
//! |--------|--------|---------------|
//! | [`sam`] | SAM text | header block, then N alignment lines |
//! | [`bam`] | BAM (BGZF) | header, then N records (or one indexed region fetch) |
//! | [`maf`] | MIRA assembly format | first contig header, then up to N reads of one contig |
//!
//! Each decoder exposes `decode(state, assembly) -> Outcome`, dispatched by
//! [`FormatKind`](crate::core::types::FormatKind).

pub mod bai;
pub mod bam;
pub mod bgzf;
pub mod binary;
pub mod cursor;
pub mod maf;
pub mod sam;

/// Log why a stream does not decode as a format. A declared format gets a warning,
/// a format tried while probing only debug output.
macro_rules! rejected {
    ($state:expr, $($arg:tt)+) => {
        if $state.pinned.is_some() {
            tracing::warn!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}
pub(crate) use rejected;
