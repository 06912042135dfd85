//! Turning a query string into concrete inputs.
//!
//! Accepted forms:
//!
//! - `path` reads a file and probes its format
//! - `-` reads standard input
//! - `fmt::path` pins the format by registry name (`unknown::path` probes)
//! - `path:id` reads `path` and keeps only data whose identifier matches `id`
//! - `@listfile` reads one query per line (`#` starts a comment), nesting allowed
//!
//! A prefix before `@` (`fmt::@listfile`) applies to every listed entry that does not
//! name its own format.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::types::FormatKind;
use crate::loader::registry::FormatRegistry;
use crate::utils::validation::MAX_LIST_DEPTH;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Empty query")]
    Empty,

    #[error("Unknown input format: {0}")]
    UnknownFormat(String),

    #[error("Cannot read list file {path}: {source}")]
    ListFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("List files nested more than {0} levels deep")]
    TooDeep(usize),

    #[error("Database entries are not supported: {0}")]
    Database(String),

    #[error("Input file not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Stdin => None,
            Self::File(path) => Some(path),
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => write!(f, "-"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One resolved input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    /// Pinned format, or `FormatKind::Unknown` to probe
    pub format: FormatKind,
    pub source: InputSource,
    /// Identifier constraint from a `path:id` query
    pub id: Option<String>,
}

/// Resolve a query string into the inputs it names, in order
///
/// # Errors
///
/// Returns `QueryError` if the query is empty, names an unknown format, refers to a
/// missing file or an unreadable list file, nests list files too deeply, or names a
/// database entry.
pub fn resolve(query: &str, registry: &FormatRegistry) -> Result<Vec<ResolvedInput>, QueryError> {
    let mut inputs = Vec::new();
    resolve_into(query, registry, FormatKind::Unknown, 0, &mut inputs)?;
    Ok(inputs)
}

fn resolve_into(
    query: &str,
    registry: &FormatRegistry,
    inherited: FormatKind,
    depth: usize,
    inputs: &mut Vec<ResolvedInput>,
) -> Result<(), QueryError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(QueryError::Empty);
    }

    let (format, entry) = match query.split_once("::") {
        Some((name, entry)) => {
            let descriptor = registry
                .find(name)
                .ok_or_else(|| QueryError::UnknownFormat(name.to_string()))?;
            (descriptor.kind, entry)
        }
        None => (inherited, query),
    };

    if let Some(list) = entry.strip_prefix('@') {
        if depth >= MAX_LIST_DEPTH {
            return Err(QueryError::TooDeep(MAX_LIST_DEPTH));
        }
        let text = fs::read_to_string(list).map_err(|source| QueryError::ListFile {
            path: list.to_string(),
            source,
        })?;
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            resolve_into(line, registry, format, depth + 1, inputs)?;
        }
        return Ok(());
    }

    let (source, id) = resolve_entry(entry)?;
    inputs.push(ResolvedInput { format, source, id });
    Ok(())
}

fn resolve_entry(entry: &str) -> Result<(InputSource, Option<String>), QueryError> {
    if entry == "-" {
        return Ok((InputSource::Stdin, None));
    }
    if Path::new(entry).is_file() {
        return Ok((InputSource::File(PathBuf::from(entry)), None));
    }

    if let Some((path, id)) = entry.rsplit_once(':') {
        if !id.is_empty() && Path::new(path).is_file() {
            return Ok((InputSource::File(PathBuf::from(path)), Some(id.to_string())));
        }
        if !path.is_empty() && !path.contains(['/', '\\', '.']) {
            return Err(QueryError::Database(entry.to_string()));
        }
    }
    Err(QueryError::NotFound(entry.to_string()))
}
