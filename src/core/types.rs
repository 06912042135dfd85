use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Concrete input format a stream has been resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Wildcard entry: probe every triable format
    Unknown,
    /// BGZF-compressed binary alignment map
    Bam,
    /// MIRA assembly format
    Maf,
    /// Sequence alignment/map text
    Sam,
}

impl FormatKind {
    /// Canonical registry name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Bam => "bam",
            Self::Maf => "maf",
            Self::Sam => "sam",
        }
    }

    /// Whether the format is read through the decompressing block stream
    #[must_use]
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Bam)
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Sort order declared by a SAM `@HD` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Unknown,
    Unsorted,
    QueryName,
    Coordinate,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        match s {
            "unsorted" => Self::Unsorted,
            "queryname" => Self::QueryName,
            "coordinate" => Self::Coordinate,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Unsorted => write!(f, "unsorted"),
            Self::QueryName => write!(f, "queryname"),
            Self::Coordinate => write!(f, "coordinate"),
        }
    }
}

/// A 1-based, inclusive genomic interval on a named contig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub contig: String,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    #[error("Region must look like NAME:START-END, got '{0}'")]
    Malformed(String),
    #[error("Region start {start} is after end {end}")]
    Inverted { start: u64, end: u64 },
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RegionError::Malformed(s.to_string());
        let (contig, range) = s.rsplit_once(':').ok_or_else(malformed)?;
        let (start, end) = range.split_once('-').ok_or_else(malformed)?;
        let start: u64 = start.replace(',', "").parse().map_err(|_| malformed())?;
        let end: u64 = end.replace(',', "").parse().map_err(|_| malformed())?;
        if contig.is_empty() || start == 0 {
            return Err(malformed());
        }
        if start > end {
            return Err(RegionError::Inverted { start, end });
        }
        Ok(Self {
            contig: contig.to_string(),
            start,
            end,
        })
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}
