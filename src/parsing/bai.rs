//! BAI index loading and region fetch.
//!
//! Only the parts needed to find where a region starts are kept: the binning index
//! (bin id to chunk list) and the 16 kbp linear index. A fetch seeks to the smallest
//! candidate chunk start and then reads records sequentially until they pass the region.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read as _};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::assembly::Assembly;
use crate::core::read::Read;
use crate::parsing::bam::{self, BamError};
use crate::parsing::bgzf::{BlockStream, VirtualOffset};
use crate::utils::validation::check_contig_limit;

pub const BAI_MAGIC: [u8; 4] = *b"BAI\x01";

/// Pseudo-bin holding mapped/unmapped counts rather than chunks
const SUMMARY_BIN: u32 = 37450;

/// Linear index window width (2^14)
const LINEAR_SHIFT: u32 = 14;

/// Largest coordinate the binning scheme covers
const MAX_POSITION: u64 = (1 << 29) - 1;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Input is not a BAI index")]
    BadMagic,

    #[error("Corrupt BAI index: {0}")]
    Corrupt(String),
}

/// A `[start, end)` range of virtual offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: VirtualOffset,
    pub end: VirtualOffset,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    bins: HashMap<u32, Vec<Chunk>>,
    intervals: Vec<VirtualOffset>,
}

#[derive(Debug, Clone, Default)]
pub struct BamIndex {
    references: Vec<ReferenceIndex>,
}

impl BamIndex {
    /// # Errors
    ///
    /// Returns `IndexError::BadMagic` for non-BAI input, `IndexError::Corrupt` for
    /// negative counts, or `IndexError::Io` if the data ends early.
    pub fn from_reader(mut reader: impl io::Read) -> Result<Self, IndexError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != BAI_MAGIC {
            return Err(IndexError::BadMagic);
        }

        let n_ref = read_count(&mut reader, "references")?;
        if let Some(msg) = check_contig_limit(n_ref.saturating_sub(1)) {
            return Err(IndexError::Corrupt(msg));
        }

        let mut references = Vec::with_capacity(n_ref);
        for _ in 0..n_ref {
            let mut reference = ReferenceIndex::default();

            let n_bin = read_count(&mut reader, "bins")?;
            for _ in 0..n_bin {
                let bin_id = reader.read_u32::<LittleEndian>()?;
                let n_chunk = read_count(&mut reader, "chunks")?;
                let mut chunks = Vec::with_capacity(n_chunk.min(1024));
                for _ in 0..n_chunk {
                    let start = VirtualOffset::from_raw(reader.read_u64::<LittleEndian>()?);
                    let end = VirtualOffset::from_raw(reader.read_u64::<LittleEndian>()?);
                    chunks.push(Chunk { start, end });
                }
                if bin_id != SUMMARY_BIN {
                    reference.bins.insert(bin_id, chunks);
                }
            }

            let n_intv = read_count(&mut reader, "intervals")?;
            for _ in 0..n_intv {
                reference
                    .intervals
                    .push(VirtualOffset::from_raw(reader.read_u64::<LittleEndian>()?));
            }
            references.push(reference);
        }

        Ok(Self { references })
    }

    /// # Errors
    ///
    /// Returns an `IndexError` if the file cannot be opened or parsed.
    pub fn from_path(path: &Path) -> Result<Self, IndexError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Look for `<file>.bai` or `<stem>.bai` next to a BAM file.
    ///
    /// A missing index returns `None` quietly; an unreadable one is warned about.
    #[must_use]
    pub fn load_for(bam_path: &Path) -> Option<Self> {
        let mut candidates = vec![PathBuf::from(format!("{}.bai", bam_path.display()))];
        if bam_path.extension().is_some_and(|ext| ext == "bam") {
            candidates.push(bam_path.with_extension("bai"));
        }

        let path = candidates.into_iter().find(|p| p.is_file())?;
        match Self::from_path(&path) {
            Ok(index) => {
                debug!(index = %path.display(), "Loaded BAM index");
                Some(index)
            }
            Err(e) => {
                warn!(index = %path.display(), error = %e, "Ignoring unreadable BAM index");
                None
            }
        }
    }

    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Smallest virtual offset at which a record overlapping `[start, end]` (1-based,
    /// inclusive) can begin, or `None` if the index lists no such chunk.
    #[must_use]
    pub fn region_start(&self, ref_id: usize, start: u64, end: u64) -> Option<VirtualOffset> {
        let reference = self.references.get(ref_id)?;
        let beg = start.saturating_sub(1).min(MAX_POSITION);
        let end = end.clamp(beg + 1, MAX_POSITION + 1);

        let linear_min = reference
            .intervals
            .get((beg >> LINEAR_SHIFT) as usize)
            .or_else(|| reference.intervals.last())
            .copied()
            .unwrap_or(VirtualOffset::MIN);

        region_to_bins(beg, end)
            .into_iter()
            .filter_map(|bin| reference.bins.get(&bin))
            .flatten()
            .filter(|chunk| chunk.end > linear_min)
            .map(|chunk| chunk.start.max(linear_min))
            .min()
    }
}

fn read_count(reader: &mut impl io::Read, what: &str) -> Result<usize, IndexError> {
    let n = reader.read_i32::<LittleEndian>()?;
    usize::try_from(n).map_err(|_| IndexError::Corrupt(format!("negative number of {what}: {n}")))
}

/// Bins that may hold records overlapping the 0-based half-open range `[beg, end)`
#[must_use]
pub fn region_to_bins(beg: u64, end: u64) -> Vec<u32> {
    let end = end.saturating_sub(1).max(beg);
    let mut bins = vec![0];
    for (shift, offset) in [(26u32, 1u64), (23, 9), (20, 73), (17, 585), (14, 4681)] {
        for bin in (offset + (beg >> shift))..=(offset + (end >> shift)) {
            bins.push(bin as u32);
        }
    }
    bins
}

/// Push every record overlapping `[start, end]` on `ref_id` through `visitor`.
///
/// Returns the number of records visited.
///
/// # Errors
///
/// Returns a `BamError` if the file cannot be reopened at the chunk offset, or if a
/// record read along the way is truncated or corrupt.
pub fn fetch<F>(
    path: &Path,
    index: &BamIndex,
    ref_id: usize,
    start: u64,
    end: u64,
    assembly: &mut Assembly,
    mut visitor: F,
) -> Result<u64, BamError>
where
    F: FnMut(&mut Assembly, Read),
{
    let Some(offset) = index.region_start(ref_id, start, end) else {
        debug!(ref_id, start, end, "Index lists no chunks for region");
        return Ok(0);
    };

    let mut stream = BlockStream::open_at(path, offset)?;
    let contig_count = assembly.contigs().len();
    let mut buf = Vec::new();
    let mut visited = 0;

    while let Some(len) = bam::read_record(&mut stream, &mut buf)? {
        let read = bam::decode_record(&buf[..len], contig_count)?;
        let Some(reference) = read.reference else {
            break;
        };
        if reference < ref_id {
            continue;
        }
        if reference > ref_id {
            break;
        }
        let Some(position) = read.position() else {
            break;
        };
        if position > end {
            break;
        }
        if position + read.reference_span().max(1) > start {
            visitor(assembly, read);
            visited += 1;
        }
    }

    Ok(visited)
}
