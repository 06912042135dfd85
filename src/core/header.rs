use serde::{Deserialize, Serialize};

use crate::core::tag::Tag;
use crate::core::types::SortOrder;

/// An `@RG` or `@PG` header line: its ID plus every other field as a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl HeaderRecord {
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

/// Stream-level header metadata that is not part of the contig table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    /// Format version (`@HD VN`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Declared sort order (`@HD SO`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_groups: Vec<HeaderRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub programs: Vec<HeaderRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
}

impl HeaderInfo {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.version.is_none()
            && self.sort_order.is_none()
            && self.read_groups.is_empty()
            && self.programs.is_empty()
            && self.comments.is_empty()
    }

    #[must_use]
    pub fn read_group(&self, id: &str) -> Option<&HeaderRecord> {
        self.read_groups.iter().find(|rg| rg.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_info_empty() {
        let mut header = HeaderInfo::default();
        assert!(header.is_empty());

        header.comments.push("made by hand".to_string());
        assert!(!header.is_empty());
    }

    #[test]
    fn test_read_group_lookup() {
        let header = HeaderInfo {
            read_groups: vec![HeaderRecord {
                id: "rg1".to_string(),
                tags: vec![Tag::new("SM", 'Z', "NA12878")],
            }],
            ..HeaderInfo::default()
        };

        let rg = header.read_group("rg1").unwrap();
        assert_eq!(rg.tag("SM"), Some("NA12878"));
        assert!(header.read_group("rg2").is_none());
    }
}
