use serde::{Deserialize, Serialize};

/// Primitive value type of an alignment tag, keyed by its one-letter code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    /// `Z`: printable string
    String,
    /// `H`: hex-encoded byte array
    Hex,
    /// `A`: single printable character
    Char,
    /// `c`
    Int8,
    /// `C`
    UInt8,
    /// `s`
    Int16,
    /// `S`
    UInt16,
    /// `i`
    Int32,
    /// `I`
    UInt32,
    /// `f`
    Float,
    /// `d`
    Double,
}

impl TagType {
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'Z' => Some(Self::String),
            b'H' => Some(Self::Hex),
            b'A' => Some(Self::Char),
            b'c' => Some(Self::Int8),
            b'C' => Some(Self::UInt8),
            b's' => Some(Self::Int16),
            b'S' => Some(Self::UInt16),
            b'i' => Some(Self::Int32),
            b'I' => Some(Self::UInt32),
            b'f' => Some(Self::Float),
            b'd' => Some(Self::Double),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::String => 'Z',
            Self::Hex => 'H',
            Self::Char => 'A',
            Self::Int8 => 'c',
            Self::UInt8 => 'C',
            Self::Int16 => 's',
            Self::UInt16 => 'S',
            Self::Int32 => 'i',
            Self::UInt32 => 'I',
            Self::Float => 'f',
            Self::Double => 'd',
        }
    }

    /// Payload width in the binary encoding; `None` for null-terminated strings
    #[must_use]
    pub fn width(self) -> Option<usize> {
        match self {
            Self::String | Self::Hex => None,
            Self::Char | Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float => Some(4),
            Self::Double => Some(8),
        }
    }
}

/// A typed key/value annotation attached to a read or contig
///
/// Values are kept in their SAM text rendering regardless of the source encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    /// One-letter type code (`Z`, `i`, `f`, ...)
    pub kind: char,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, kind: char, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
        }
    }

    /// Parse a SAM optional field (`NM:i:1`)
    #[must_use]
    pub fn parse_sam(field: &str) -> Option<Self> {
        let mut parts = field.splitn(3, ':');
        let name = parts.next()?;
        let kind = parts.next()?;
        let value = parts.next()?;

        let mut kind_chars = kind.chars();
        let kind = kind_chars.next()?;
        if kind_chars.next().is_some() || !crate::utils::validation::is_valid_tag_name(name) {
            return None;
        }
        Some(Self::new(name, kind, value))
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.kind, self.value)
    }
}
