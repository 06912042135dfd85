use serde::{Deserialize, Serialize};

use crate::core::tag::Tag;

/// SAM/BAM flag bits
pub mod flags {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const MATE_REVERSE: u16 = 0x20;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
    pub const SUPPLEMENTARY: u16 = 0x800;
}

/// A single alignment record
///
/// The decoded position lands on `x1` for forward reads and on `y1` for reads on the
/// reverse strand. MAF placements carry both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Read {
    pub name: String,

    /// 1-based 5' (leftmost) position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x1: Option<u64>,

    /// 1-based 3' position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y1: Option<u64>,

    pub reversed: bool,

    /// Index into the assembly's contig table; `None` when unplaced
    pub reference: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mate_reference: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mate_position: Option<u64>,

    pub template_length: i64,
    pub mapping_quality: u8,

    /// BAI bin, carried through from the binary encoding
    pub bin: u16,

    pub flags: u16,
    pub cigar: String,
    pub sequence: String,
    pub quality: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl Read {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Store a 1-based position on the coordinate matching the read's strand
    pub fn set_position(&mut self, position: u64) {
        if self.reversed {
            self.y1 = Some(position);
        } else {
            self.x1 = Some(position);
        }
    }

    /// The decoded position, whichever end it was stored on
    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.x1.or(self.y1)
    }

    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        self.flags & flags::UNMAPPED != 0
    }

    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    /// Number of reference bases covered by the CIGAR (M, D, N, =, X)
    #[must_use]
    pub fn reference_span(&self) -> u64 {
        let mut span = 0;
        let mut length: u64 = 0;
        for c in self.cigar.chars() {
            if let Some(digit) = c.to_digit(10) {
                length = length.saturating_mul(10).saturating_add(u64::from(digit));
                continue;
            }
            if matches!(c, 'M' | 'D' | 'N' | '=' | 'X') {
                span += length;
            }
            length = 0;
        }
        span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_position_by_strand() {
        let mut forward = Read::new("r1");
        forward.set_position(101);
        assert_eq!(forward.x1, Some(101));
        assert_eq!(forward.y1, None);

        let mut reverse = Read::new("r2");
        reverse.reversed = true;
        reverse.set_position(100);
        assert_eq!(reverse.x1, None);
        assert_eq!(reverse.y1, Some(100));
        assert_eq!(reverse.position(), Some(100));
    }

    #[test]
    fn test_reference_span() {
        let mut read = Read::new("r1");
        read.cigar = "5S10M2I3M1D4N2=1X7H".to_string();
        assert_eq!(read.reference_span(), 10 + 3 + 1 + 4 + 2 + 1);

        read.cigar = "*".to_string();
        assert_eq!(read.reference_span(), 0);
    }

    #[test]
    fn test_unmapped_flag() {
        let mut read = Read::new("r1");
        assert!(!read.is_unmapped());
        read.flags = flags::UNMAPPED | flags::PAIRED;
        assert!(read.is_unmapped());
    }
}
