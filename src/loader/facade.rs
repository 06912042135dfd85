use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{self, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::assembly::{Assembly, FormatInfo};
use crate::core::types::Region;
use crate::loader::engine::ProbeEngine;
use crate::loader::registry::FormatRegistry;
use crate::loader::state::{ChunkSizes, StreamState};
use crate::parsing::cursor::LineCursor;
use crate::query::matcher::{Query, QueryField};
use crate::query::resolve::{resolve, InputSource, ResolvedInput, QueryError};

#[derive(Error, Debug)]
pub enum OpenError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Cannot open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Query names no inputs")]
    NoInputs,
}

/// Loader settings shared by every input of one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub chunks: ChunkSizes,
    /// Region fetched through the BAM index instead of reading sequentially
    pub region: Option<Region>,
    /// Load `<file>.bai` when a region is set
    pub use_index: bool,
    /// Identifier patterns every input is filtered by
    pub ids: Vec<String>,
    pub ignore_case: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunks: ChunkSizes::default(),
            region: None,
            use_index: true,
            ids: Vec::new(),
            ignore_case: false,
        }
    }
}

/// Chunk-at-a-time reader over every input a query names
///
/// ```rust,no_run
/// use assemread::{Assembly, Loader, LoaderConfig};
///
/// let mut loader = Loader::open("reads.sam", LoaderConfig::default()).unwrap();
/// let mut assembly = Assembly::new();
/// while loader.load_next(&mut assembly) {
///     println!("{} contigs, {} reads", assembly.contigs().len(), assembly.reads().len());
/// }
/// ```
pub struct Loader {
    engine: ProbeEngine,
    config: LoaderConfig,
    pending: VecDeque<ResolvedInput>,
    current: Option<StreamState>,
    count: u64,
    loading: bool,
    returned: bool,
}

impl Loader {
    /// Resolve `query` and open its first input
    ///
    /// # Errors
    ///
    /// Returns `OpenError::Query` if the query does not resolve, `OpenError::NoInputs`
    /// if it resolves to nothing, or `OpenError::Io` if the first input cannot be opened.
    pub fn open(query: &str, config: LoaderConfig) -> Result<Self, OpenError> {
        Self::open_with(query, config, FormatRegistry::standard())
    }

    /// Like [`open`](Self::open), probing with a caller-supplied registry
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_with(query: &str, config: LoaderConfig, registry: FormatRegistry) -> Result<Self, OpenError> {
        let mut pending: VecDeque<ResolvedInput> = resolve(query, &registry)?.into();
        let first = pending.pop_front().ok_or(OpenError::NoInputs)?;

        let mut loader = Self {
            engine: ProbeEngine::new(registry),
            config,
            pending,
            current: None,
            count: 0,
            loading: false,
            returned: false,
        };
        loader.current = Some(loader.open_input(first)?);
        Ok(loader)
    }

    fn open_input(&self, input: ResolvedInput) -> Result<StreamState, OpenError> {
        let cursor = match &input.source {
            InputSource::Stdin => LineCursor::new(BufReader::new(io::stdin())),
            InputSource::File(path) => LineCursor::from_path(path).map_err(|source| OpenError::Io {
                path: path.display().to_string(),
                source,
            })?,
        };

        let case_sensitive = !self.config.ignore_case;
        let mut query = Query::new();
        for id in self.config.ids.iter().chain(input.id.as_ref()) {
            query.add_field(QueryField::id(id.clone(), case_sensitive));
        }

        debug!(input = %input.source, format = %input.format, "Opened input");
        Ok(StreamState::new(cursor, input.source.path().map(Path::to_path_buf))
            .with_query(query)
            .with_chunks(self.config.chunks)
            .with_region(self.config.region.clone())
            .with_index(self.config.use_index)
            .with_format(input.format))
    }

    /// Move to the next input that opens, resetting the assembly for it
    fn advance(&mut self, assembly: &mut Assembly) {
        self.current = None;
        while let Some(input) = self.pending.pop_front() {
            let source = input.source.to_string();
            match self.open_input(input) {
                Ok(state) => {
                    assembly.clear();
                    assembly.format = FormatInfo {
                        filename: Some(source),
                        ..FormatInfo::default()
                    };
                    self.current = Some(state);
                    return;
                }
                Err(e) => warn!(input = %source, error = %e, "Skipping input"),
            }
        }
    }

    fn current_name(&self) -> String {
        self.current
            .as_ref()
            .and_then(StreamState::path)
            .map_or_else(|| "-".to_string(), |p| p.display().to_string())
    }

    /// Load the next chunk into `assembly`.
    ///
    /// The first call hands back the assembly untouched apart from its source name.
    /// Later calls decode the header, then chunks of records, moving through the
    /// query's inputs in order. Returns `false` once every input is exhausted or has
    /// failed; the reason for a failure is logged.
    pub fn load_next(&mut self, assembly: &mut Assembly) -> bool {
        self.count += 1;
        self.returned = false;

        if self.count == 1 {
            self.loading = self.current.is_some();
            assembly.format.filename = Some(self.current_name());
            self.returned = self.loading;
            return self.loading;
        }

        loop {
            let Some(state) = self.current.as_mut() else {
                self.loading = false;
                assembly.clear_reads();
                return false;
            };

            if state.header_done() && !state.has_more() {
                debug!(records = state.records(), "Input exhausted");
                self.advance(assembly);
                continue;
            }

            assembly.clear_reads();
            if self.engine.load(state, assembly) {
                self.returned = true;
                return true;
            }

            warn!(input = %self.current_name(), "No further data loaded from input");
            self.advance(assembly);
        }
    }

    /// Release the current input and drop any not yet opened
    pub fn close(&mut self) {
        self.current = None;
        self.pending.clear();
        self.loading = false;
    }

    /// Number of `load_next` calls so far
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether the last `load_next` call handed data back
    #[must_use]
    pub fn returned(&self) -> bool {
        self.returned
    }

    /// State of the input currently being read
    #[must_use]
    pub fn current(&self) -> Option<&StreamState> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn registry(&self) -> &FormatRegistry {
        self.engine.registry()
    }
}
