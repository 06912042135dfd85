use serde::{Deserialize, Serialize};

use crate::core::tag::Tag;

/// A named reference sequence (or assembled consensus) that reads align against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contig {
    /// Sequence name (SN in SAM, CO in MAF); unique within an assembly
    pub name: String,

    /// Sequence length (LN in SAM, LC in MAF)
    pub length: u64,

    /// Consensus sequence, when the format carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<String>,

    /// Consensus quality string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_quality: Option<String>,

    /// Extra header fields (`@SQ` M5/AS/UR/..., MAF `CT` lines) in encounter order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,

    /// Number of reads decoded against this contig so far
    #[serde(default)]
    pub read_count: u64,
}

impl Contig {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
            consensus: None,
            consensus_quality: None,
            tags: Vec::new(),
            read_count: 0,
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// First tag with the given name
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }
}
