//! The aggregate a loader populates: a contig table plus the reads of the current chunk.
//!
//! Contigs are kept both as an ordered list and as a name lookup table; every mutation
//! goes through [`Assembly`] so the two always agree in membership. Reads are
//! append-only within a chunk and are wiped between chunks, while contigs usually
//! survive until the stream ends.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::core::contig::Contig;
use crate::core::header::HeaderInfo;
use crate::core::read::Read;
use crate::core::types::FormatKind;
use crate::utils::validation::check_contig_limit;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Duplicate contig name: {0}")]
    DuplicateContig(String),

    #[error("{0}")]
    TooManyContigs(String),
}

/// Where the assembly's data came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    /// Resolved format, once the stream has been pinned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FormatKind>,

    /// Registry name of the resolved format
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Ontology term identifying the format
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ontology: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Database tag, for inputs reached through a named database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Assembly {
    pub format: FormatInfo,
    #[serde(skip_serializing_if = "HeaderInfo::is_empty")]
    pub header: HeaderInfo,
    contigs: Vec<Contig>,
    #[serde(skip)]
    contig_lookup: HashMap<String, usize>,
    reads: Vec<Read>,
}

impl Assembly {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    #[must_use]
    pub fn reads(&self) -> &[Read] {
        &self.reads
    }

    #[must_use]
    pub fn contig_index(&self, name: &str) -> Option<usize> {
        self.contig_lookup.get(name).copied()
    }

    #[must_use]
    pub fn contig(&self, index: usize) -> Option<&Contig> {
        self.contigs.get(index)
    }

    pub fn contig_mut(&mut self, index: usize) -> Option<&mut Contig> {
        self.contigs.get_mut(index)
    }

    /// Name of the contig a read is placed on
    #[must_use]
    pub fn reference_name(&self, read: &Read) -> Option<&str> {
        read.reference
            .and_then(|i| self.contigs.get(i))
            .map(|c| c.name.as_str())
    }

    /// Append a contig, returning its index
    ///
    /// # Errors
    ///
    /// Returns `AssemblyError::DuplicateContig` if the name is already present, or
    /// `AssemblyError::TooManyContigs` if the table is full.
    pub fn add_contig(&mut self, contig: Contig) -> Result<usize, AssemblyError> {
        if self.contig_lookup.contains_key(&contig.name) {
            return Err(AssemblyError::DuplicateContig(contig.name));
        }
        if let Some(msg) = check_contig_limit(self.contigs.len()) {
            return Err(AssemblyError::TooManyContigs(msg));
        }

        let index = self.contigs.len();
        self.contig_lookup.insert(contig.name.clone(), index);
        self.contigs.push(contig);
        Ok(index)
    }

    /// Remove and return every contig, leaving the table empty
    pub fn take_contigs(&mut self) -> Vec<Contig> {
        self.contig_lookup.clear();
        std::mem::take(&mut self.contigs)
    }

    /// Append a decoded read and bump its contig's read count
    pub fn push_read(&mut self, read: Read) {
        if let Some(contig) = read.reference.and_then(|i| self.contigs.get_mut(i)) {
            contig.read_count += 1;
        }
        self.reads.push(read);
    }

    pub fn clear_reads(&mut self) {
        self.reads.clear();
    }

    pub fn clear_contigs(&mut self) {
        self.contigs.clear();
        self.contig_lookup.clear();
    }

    /// Wipe everything decoded from the stream; format metadata is kept
    pub fn clear(&mut self) {
        self.clear_reads();
        self.clear_contigs();
        self.header = HeaderInfo::default();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty() && self.reads.is_empty()
    }
}
