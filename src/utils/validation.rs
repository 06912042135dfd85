//! Limits applied to untrusted input, and small field validators shared by the decoders.
//!
//! Every cap here guards an allocation sized by a number read from the input itself.

/// Largest contig table an assembly will hold
pub const MAX_CONTIGS: usize = 100_000;

/// Largest binary alignment record accepted, in bytes
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Deepest chain of `@listfile` indirections followed when resolving a query
pub const MAX_LIST_DEPTH: usize = 8;

/// Lowercase an `M5` checksum, or `None` if it is not 32 hex digits.
///
/// ```
/// use assemread::utils::validation::normalize_md5;
///
/// assert_eq!(
///     normalize_md5("6AEF897C3D6FF0C78AFF06AC189178DD").as_deref(),
///     Some("6aef897c3d6ff0c78aff06ac189178dd")
/// );
/// assert_eq!(normalize_md5("6aef897c"), None);
/// ```
#[must_use]
pub fn normalize_md5(s: &str) -> Option<String> {
    (s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit())).then(|| s.to_ascii_lowercase())
}

/// A SAM tag name is one letter followed by one letter or digit
#[must_use]
pub fn is_valid_tag_name(name: &str) -> bool {
    matches!(name.as_bytes(), [first, second] if first.is_ascii_alphabetic() && second.is_ascii_alphanumeric())
}

/// Message explaining why one more contig cannot be added to a table of `count`
#[must_use]
pub fn check_contig_limit(count: usize) -> Option<String> {
    (count >= MAX_CONTIGS).then(|| format!("Contig table is full: {count} contigs, limit is {MAX_CONTIGS}"))
}

/// Message explaining why a declared binary `block_size` will not be read
#[must_use]
pub fn check_record_size(block_size: i32) -> Option<String> {
    match usize::try_from(block_size) {
        Err(_) => Some(format!("Negative record size: {block_size}")),
        Ok(size) if size > MAX_RECORD_SIZE => Some(format!(
            "Record size {size} exceeds maximum of {MAX_RECORD_SIZE}"
        )),
        Ok(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_md5() {
        assert_eq!(
            normalize_md5("AABBCCDD11223344556677889900AABB").as_deref(),
            Some("aabbccdd11223344556677889900aabb")
        );
        assert_eq!(normalize_md5(""), None);
        assert_eq!(normalize_md5("6aef897c3d6ff0c78aff06ac189178dg"), None);
    }

    #[test]
    fn test_tag_names() {
        assert!(is_valid_tag_name("NM"));
        assert!(is_valid_tag_name("X0"));
        assert!(!is_valid_tag_name("0X"));
        assert!(!is_valid_tag_name("N"));
        assert!(!is_valid_tag_name("NMX"));
    }

    #[test]
    fn test_limits() {
        assert!(check_contig_limit(MAX_CONTIGS - 1).is_none());
        assert!(check_contig_limit(MAX_CONTIGS).is_some());

        assert!(check_record_size(32).is_none());
        assert!(check_record_size(-1).is_some());
        assert!(check_record_size(i32::MAX).is_some());
    }
}
