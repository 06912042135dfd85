use serde::{Deserialize, Serialize};

use crate::core::assembly::Assembly;

/// Field name of identifier constraints, the only kind evaluated against assemblies
pub const ID_FIELD: &str = "id";

/// One field/pattern constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryField {
    pub field: String,
    /// Wildcard pattern (`*` any run, `?` any single character)
    pub pattern: String,
    pub case_sensitive: bool,
}

impl QueryField {
    pub fn new(field: impl Into<String>, pattern: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            field: field.into(),
            pattern: pattern.into(),
            case_sensitive,
        }
    }

    pub fn id(pattern: impl Into<String>, case_sensitive: bool) -> Self {
        Self::new(ID_FIELD, pattern, case_sensitive)
    }

    #[must_use]
    pub fn is_id(&self) -> bool {
        self.field == ID_FIELD
    }
}

/// The constraints attached to one input, plus whether they are already satisfied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    fields: Vec<QueryField>,
    done: bool,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(mut self, field: QueryField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add_field(&mut self, field: QueryField) {
        self.fields.push(field);
    }

    #[must_use]
    pub fn fields(&self) -> &[QueryField] {
        &self.fields
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Record that positional access already selected the data, disabling filtering
    pub fn mark_done(&mut self) {
        self.done = true;
    }
}

/// Decide whether a candidate with the given identifiers is accepted.
///
/// Only `id` constraints are evaluated. A candidate is rejected only when at least one
/// `id` constraint exists and none of them matches any identifier.
pub fn matches<'a, I>(query: &Query, ids: I) -> bool
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    if query.fields.is_empty() || query.done {
        return true;
    }

    let mut evaluated = false;
    for field in query.fields.iter().filter(|f| f.is_id()) {
        evaluated = true;
        if ids
            .clone()
            .into_iter()
            .any(|id| wildcard_match(&field.pattern, id, field.case_sensitive))
        {
            return true;
        }
    }
    !evaluated
}

/// Match an assembly by its contig names
#[must_use]
pub fn matches_assembly(query: &Query, assembly: &Assembly) -> bool {
    matches(query, assembly.contigs().iter().map(|c| c.name.as_str()))
}

/// Glob-style match where `*` matches any run of characters and `?` exactly one
#[must_use]
pub fn wildcard_match(pattern: &str, text: &str, case_sensitive: bool) -> bool {
    let fold = |s: &str| -> Vec<char> {
        if case_sensitive {
            s.chars().collect()
        } else {
            s.chars().flat_map(char::to_lowercase).collect()
        }
    };
    let pattern = fold(pattern);
    let text = fold(text);

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it is currently absorbing up to
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, absorbed)) = backtrack {
            p = star + 1;
            t = absorbed + 1;
            backtrack = Some((star, t));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
