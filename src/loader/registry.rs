use serde::Serialize;

use crate::core::assembly::Assembly;
use crate::core::types::FormatKind;
use crate::loader::engine::Outcome;
use crate::loader::state::StreamState;
use crate::parsing::{bam, maf, sam};

/// A registered input format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub kind: FormatKind,
    pub name: &'static str,
    /// EDAM ontology term
    pub ontology: &'static str,
    pub description: &'static str,
    /// Alternative name for a format listed elsewhere in the table
    pub alias: bool,
    /// Attempted when the caller does not declare a format
    pub try_auto: bool,
    /// Read through the block stream rather than the line cursor
    pub binary: bool,
}

impl FormatDescriptor {
    #[must_use]
    pub fn summary(&self) -> FormatSummary {
        FormatSummary {
            name: self.name.to_string(),
            triable: self.try_auto,
            binary: self.binary,
            description: self.description.to_string(),
        }
    }
}

/// Serialisable registry row for format listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatSummary {
    pub name: String,
    pub triable: bool,
    pub binary: bool,
    pub description: String,
}

/// Ordered format table; probing walks it front to back
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<FormatDescriptor>,
}

impl FormatRegistry {
    #[must_use]
    pub fn new(formats: Vec<FormatDescriptor>) -> Self {
        Self { formats }
    }

    /// The built-in table. BAM comes first so its magic check runs before any text
    /// decoder looks at compressed bytes.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            FormatDescriptor {
                kind: FormatKind::Unknown,
                name: "unknown",
                ontology: "",
                description: "Unknown format, probe every triable format",
                alias: false,
                try_auto: false,
                binary: false,
            },
            FormatDescriptor {
                kind: FormatKind::Bam,
                name: "bam",
                ontology: "format_2572",
                description: "Binary sequence alignment/map (BGZF compressed)",
                alias: false,
                try_auto: true,
                binary: true,
            },
            FormatDescriptor {
                kind: FormatKind::Maf,
                name: "maf",
                ontology: "format_1915",
                description: "MIRA assembly format",
                alias: false,
                try_auto: true,
                binary: false,
            },
            FormatDescriptor {
                kind: FormatKind::Sam,
                name: "sam",
                ontology: "format_2573",
                description: "Sequence alignment/map text",
                alias: false,
                try_auto: true,
                binary: false,
            },
            FormatDescriptor {
                kind: FormatKind::Maf,
                name: "mira",
                ontology: "format_1915",
                description: "Alias for maf",
                alias: true,
                try_auto: false,
                binary: false,
            },
        ])
    }

    #[must_use]
    pub fn formats(&self) -> &[FormatDescriptor] {
        &self.formats
    }

    /// Look up a format by name, ignoring case
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&FormatDescriptor> {
        self.formats
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Primary (non-alias) entry for a format kind
    #[must_use]
    pub fn descriptor(&self, kind: FormatKind) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| f.kind == kind && !f.alias)
    }

    /// Entries tried during auto-probing, in table order
    pub fn triable(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.formats.iter().filter(|f| f.try_auto)
    }

    #[must_use]
    pub fn list_formats(&self) -> Vec<FormatSummary> {
        self.formats.iter().map(FormatDescriptor::summary).collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Run one decode attempt of `kind` against the stream
pub fn decode(kind: FormatKind, state: &mut StreamState, assembly: &mut Assembly) -> Outcome {
    match kind {
        FormatKind::Bam => bam::decode(state, assembly),
        FormatKind::Maf => maf::decode(state, assembly),
        FormatKind::Sam => sam::decode(state, assembly),
        FormatKind::Unknown => Outcome::Fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_probe_order() {
        let registry = FormatRegistry::standard();
        let order: Vec<FormatKind> = registry.triable().map(|f| f.kind).collect();
        assert_eq!(order, vec![FormatKind::Bam, FormatKind::Maf, FormatKind::Sam]);
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let registry = FormatRegistry::standard();
        assert_eq!(registry.find("SAM").unwrap().kind, FormatKind::Sam);
        assert_eq!(registry.find("mira").unwrap().kind, FormatKind::Maf);
        assert!(registry.find("mira").unwrap().alias);
        assert!(registry.find("cram").is_none());
    }

    #[test]
    fn test_descriptor_skips_aliases() {
        let registry = FormatRegistry::standard();
        assert_eq!(registry.descriptor(FormatKind::Maf).unwrap().name, "maf");
        assert!(registry.descriptor(FormatKind::Bam).unwrap().binary);
    }

    #[test]
    fn test_list_formats() {
        let formats = FormatRegistry::standard().list_formats();
        assert_eq!(formats.len(), 5);
        assert_eq!(formats[0].name, "unknown");
        assert!(!formats[0].triable);
        assert!(formats[1].binary);

        let json = serde_json::to_string(&formats[3]).unwrap();
        assert!(json.contains("\"name\":\"sam\""));
        assert!(json.contains("\"triable\":true"));
    }
}
