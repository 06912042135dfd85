//! The probe engine: picks a decoder for a stream and keeps driving it.
//!
//! A stream without a pinned format is offered to every triable registry entry in
//! order, rewinding the line cursor between attempts. The first entry that decodes a
//! unit the query accepts is pinned, and every later call goes straight to it. Both
//! cases run through [`ProbeEngine::run`]; a pinned stream is just a one-entry
//! candidate list that may not be rewound.
//!
//! | Outcome | Probing | Pinned |
//! |---------|---------|--------|
//! | `Ok` | pin, succeed | succeed |
//! | `NoMatch` / `Empty` | rewind, next candidate | discard unit, retry while data remains |
//! | `Fail` | rewind, next candidate | fail |
//! | `BadType` | fail | fail |
//! | `Eof` | fail | fail, report records read |

use tracing::{debug, error, warn};

use crate::core::assembly::Assembly;
use crate::core::types::FormatKind;
use crate::loader::registry::{self, FormatRegistry};
use crate::loader::state::StreamState;
use crate::query::matcher::matches_assembly;

/// Result of one decode attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Decoded and accepted by the query
    Ok,
    /// Decoded, but the query rejected it
    NoMatch,
    /// The input is a different kind of data altogether
    BadType,
    /// The input does not parse as this format
    Fail,
    /// No data left to decode
    Eof,
    /// Decoded a unit with no content
    Empty,
}

pub struct ProbeEngine {
    registry: FormatRegistry,
}

impl ProbeEngine {
    #[must_use]
    pub fn new(registry: FormatRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Decode the next unit of `state` into `assembly`.
    ///
    /// Returns `false` when nothing more can be loaded from this stream; the reason is
    /// reported through the log. On `false` the assembly holds no partial data.
    pub fn load(&self, state: &mut StreamState, assembly: &mut Assembly) -> bool {
        match state.pinned {
            Some(kind) => {
                // A pinned stream is never rewound past the line just read
                stop_buffering(kind, state);
                self.run(&[kind], false, state, assembly)
            }
            None => {
                let candidates: Vec<FormatKind> = self.registry.triable().map(|f| f.kind).collect();
                self.run(&candidates, true, state, assembly)
            }
        }
    }

    fn run(&self, candidates: &[FormatKind], probing: bool, state: &mut StreamState, assembly: &mut Assembly) -> bool {
        for &kind in candidates {
            let start = state.cursor.position();

            match self.attempt(kind, state, assembly) {
                Outcome::Ok => {
                    self.commit(kind, state, assembly);
                    return true;
                }
                Outcome::BadType => {
                    assembly.clear();
                    error!(format = %kind, "Input holds a different kind of data, giving up");
                    return false;
                }
                Outcome::Eof => {
                    assembly.clear();
                    if !probing {
                        error!(
                            format = %kind,
                            records = state.records,
                            "Premature end of file after {} records",
                            state.records
                        );
                    }
                    return false;
                }
                Outcome::Fail if !probing => {
                    assembly.clear();
                    return false;
                }
                outcome @ (Outcome::NoMatch | Outcome::Empty) if !probing => {
                    if outcome == Outcome::Empty {
                        warn!(format = %kind, records = state.records, "Empty record, skipping");
                    }
                    return self.retry(kind, state, assembly);
                }
                outcome => {
                    if outcome == Outcome::Empty {
                        warn!(format = %kind, "Empty record while probing");
                    }
                    assembly.clear();
                    if let Err(e) = state.rewind(start) {
                        error!(error = %e, "Cannot rewind input for the next format");
                        return false;
                    }
                }
            }
        }

        error!(
            tried = candidates.len(),
            "Input does not match any known format"
        );
        false
    }

    /// Keep decoding the pinned format past rejected or empty units
    fn retry(&self, kind: FormatKind, state: &mut StreamState, assembly: &mut Assembly) -> bool {
        loop {
            state.discard_unit(kind, assembly);
            if !state.has_more() {
                debug!(format = %kind, "No remaining data matched the query");
                return false;
            }

            match self.attempt(kind, state, assembly) {
                Outcome::Ok => {
                    self.commit(kind, state, assembly);
                    return true;
                }
                Outcome::NoMatch => {}
                Outcome::Empty => warn!(format = %kind, records = state.records, "Empty record, skipping"),
                Outcome::Eof => {
                    assembly.clear();
                    error!(
                        format = %kind,
                        records = state.records,
                        "Premature end of file after {} records",
                        state.records
                    );
                    return false;
                }
                Outcome::Fail | Outcome::BadType => {
                    assembly.clear();
                    return false;
                }
            }
        }
    }

    fn attempt(&self, kind: FormatKind, state: &mut StreamState, assembly: &mut Assembly) -> Outcome {
        state.attempts.push(kind);
        let outcome = registry::decode(kind, state, assembly);
        debug!(format = %kind, ?outcome, "Decode attempt");

        if outcome == Outcome::Ok && !matches_assembly(&state.query, assembly) {
            return Outcome::NoMatch;
        }
        outcome
    }

    fn commit(&self, kind: FormatKind, state: &mut StreamState, assembly: &mut Assembly) {
        if state.pinned.is_none() {
            debug!(format = %kind, "Input format resolved");
            state.pinned = Some(kind);
        }
        stop_buffering(kind, state);
        if let Some(descriptor) = self.registry.descriptor(kind) {
            assembly.format.kind = Some(kind);
            assembly.format.name = descriptor.name.to_string();
            assembly.format.ontology = descriptor.ontology.to_string();
        }
    }
}

fn stop_buffering(kind: FormatKind, state: &mut StreamState) {
    if !kind.is_binary() && state.cursor.is_buffered() {
        state.cursor.mark_unbuffered();
    }
}

impl Default for ProbeEngine {
    fn default() -> Self {
        Self::new(FormatRegistry::standard())
    }
}
