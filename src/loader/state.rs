use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::core::assembly::Assembly;
use crate::core::types::{FormatKind, Region};
use crate::parsing::bgzf::BlockStream;
use crate::parsing::cursor::{CursorError, LineCursor};
use crate::parsing::maf::MafState;
use crate::query::matcher::Query;

/// Records decoded per call once a stream's header has been read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSizes {
    pub sam: usize,
    pub bam: usize,
    pub maf: usize,
}

impl Default for ChunkSizes {
    fn default() -> Self {
        Self {
            sam: 1,
            bam: 1,
            maf: 300,
        }
    }
}

impl ChunkSizes {
    /// The same size for every format
    #[must_use]
    pub fn uniform(size: usize) -> Self {
        Self {
            sam: size,
            bam: size,
            maf: size,
        }
    }
}

/// Everything the engine and decoders track for one open input
pub struct StreamState {
    pub(crate) cursor: LineCursor,
    pub(crate) path: Option<PathBuf>,
    pub(crate) query: Query,
    pub(crate) chunks: ChunkSizes,
    pub(crate) region: Option<Region>,
    pub(crate) use_index: bool,
    pub(crate) pinned: Option<FormatKind>,

    pub(crate) header_done: bool,
    pub(crate) records: u64,
    pub(crate) exhausted: bool,

    /// Scratch line reused by text decoders
    pub(crate) line: String,
    /// Scratch buffer reused by the binary decoder
    pub(crate) record_buf: Vec<u8>,
    pub(crate) binary: Option<BlockStream>,
    pub(crate) binary_mode: bool,
    pub(crate) maf: MafState,

    pub(crate) attempts: Vec<FormatKind>,
}

impl StreamState {
    pub fn new(cursor: LineCursor, path: Option<PathBuf>) -> Self {
        Self {
            cursor,
            path,
            query: Query::new(),
            chunks: ChunkSizes::default(),
            region: None,
            use_index: true,
            pinned: None,
            header_done: false,
            records: 0,
            exhausted: false,
            line: String::new(),
            record_buf: Vec::new(),
            binary: None,
            binary_mode: false,
            maf: MafState::default(),
            attempts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_chunks(mut self, chunks: ChunkSizes) -> Self {
        self.chunks = chunks;
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: Option<Region>) -> Self {
        self.region = region;
        self
    }

    #[must_use]
    pub fn with_index(mut self, use_index: bool) -> Self {
        self.use_index = use_index;
        self
    }

    /// Pin a format up front; `FormatKind::Unknown` leaves the stream to be probed
    #[must_use]
    pub fn with_format(mut self, format: FormatKind) -> Self {
        self.pinned = (format != FormatKind::Unknown).then_some(format);
        self
    }

    #[must_use]
    pub fn pinned(&self) -> Option<FormatKind> {
        self.pinned
    }

    /// Formats tried on this stream, in order, one entry per decode attempt
    #[must_use]
    pub fn attempts(&self) -> &[FormatKind] {
        &self.attempts
    }

    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    #[must_use]
    pub fn header_done(&self) -> bool {
        self.header_done
    }

    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Rewind the line cursor and forget everything a failed attempt decoded
    ///
    /// # Errors
    ///
    /// Returns `CursorError::OutOfBuffer` if the offset is no longer buffered.
    pub fn rewind(&mut self, offset: u64) -> Result<(), CursorError> {
        self.cursor.seek(offset)?;
        self.header_done = false;
        self.records = 0;
        self.exhausted = false;
        self.binary = None;
        self.binary_mode = false;
        self.maf.reset();
        Ok(())
    }

    /// Whether another decode call can produce data. Trailing blank lines do not count.
    pub fn has_more(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        if self.binary_mode {
            return match self.binary.as_mut().map(BlockStream::at_end) {
                Some(Ok(at_end)) => !at_end,
                // Let the decoder report the corrupt block
                Some(Err(_)) => true,
                None => false,
            };
        }
        match self.cursor.skip_blank_lines() {
            Ok(more) => more,
            Err(e) => {
                warn!(error = %e, "Cannot read input");
                false
            }
        }
    }

    /// Drop the unit the query rejected so the next attempt starts past it.
    ///
    /// SAM and BAM units are whole streams (the header decides the match), so the
    /// stream is marked exhausted. MAF skips to the end of the current contig.
    pub fn discard_unit(&mut self, kind: FormatKind, assembly: &mut Assembly) {
        assembly.clear();
        match kind {
            FormatKind::Maf => {
                let skip = self.maf.in_contig();
                self.maf.reset();
                self.maf.skip_contig = skip;
            }
            _ => {
                self.exhausted = true;
                self.binary = None;
            }
        }
    }
}
