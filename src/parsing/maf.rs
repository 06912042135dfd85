//! MIRA assembly format (MAF) decoding.
//!
//! MAF is line oriented: every line starts with a two-letter code.
//!
//! ```text
//! CO  contig name              NR  number of reads       LC  contig length
//! CS  consensus sequence       CQ  consensus quality     CT  contig tag
//! \\  start of read block      //  end of read block     EC  end of contig
//! RD  read name                RS  read sequence         RQ  read quality
//! TN  template name            DI  direction (F/R)       ER  end of read
//! AT  x1 y1 x2 y2              placement of the read that just ended
//! ```
//!
//! A read is complete at `ER`, but it is only placed once its `AT` line arrives, so
//! it is held as pending in between. A chunk never spans two contigs: the decoder
//! stops before a `CO` once anything was decoded in the current call.

use thiserror::Error;
use tracing::warn;

use crate::core::assembly::{Assembly, AssemblyError};
use crate::core::contig::Contig;
use crate::core::read::Read;
use crate::core::tag::Tag;
use crate::loader::engine::Outcome;
use crate::loader::state::StreamState;
use crate::parsing::rejected;

#[derive(Error, Debug)]
pub enum MafError {
    #[error("Invalid number '{value}' on {code} line")]
    InvalidNumber { code: String, value: String },

    #[error("Invalid AT line '{0}': expected four positions")]
    InvalidPlacement(String),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Decoder position within the MAF grammar, carried across chunk calls
#[derive(Debug, Default)]
pub struct MafState {
    in_contig: bool,
    contig: Option<usize>,
    declared_reads: Option<u64>,
    current: Option<Read>,
    pending: Option<Read>,
    /// Discard lines up to the next `EC`
    pub skip_contig: bool,
}

impl MafState {
    #[must_use]
    pub fn in_contig(&self) -> bool {
        self.in_contig
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

enum Event {
    Nothing,
    ReadsPlaced(u64),
    ReadBlockOpened,
    ContigEnded { empty: bool, placed: u64 },
}

fn split_code(line: &str) -> (&str, &str) {
    match (line.get(..2), line.get(2..)) {
        (Some(code), Some(rest)) => (code, rest.trim_start()),
        _ => (line, ""),
    }
}

fn parse_number(code: &str, value: &str) -> Result<u64, MafError> {
    value.trim().parse().map_err(|_| MafError::InvalidNumber {
        code: code.to_string(),
        value: value.to_string(),
    })
}

/// Push the pending read without a placement, if there is one
fn flush_pending(maf: &mut MafState, assembly: &mut Assembly) -> u64 {
    match maf.pending.take() {
        Some(read) => {
            warn!(read = %read.name, "Read has no AT line, keeping it unplaced");
            assembly.push_read(read);
            1
        }
        None => 0,
    }
}

fn start_contig(maf: &mut MafState, assembly: &mut Assembly, name: &str) -> Result<u64, MafError> {
    let mut flushed = 0;
    if maf.in_contig {
        flushed = flush_pending(maf, assembly);
        warn!("Contig not closed with EC before the next CO");
    }
    maf.reset();
    assembly.clear_contigs();

    let index = assembly.add_contig(Contig::new(name.trim(), 0))?;
    maf.in_contig = true;
    maf.contig = Some(index);
    Ok(flushed)
}

fn place_read(maf: &mut MafState, assembly: &mut Assembly, value: &str) -> Result<u64, MafError> {
    let positions: Vec<u64> = value
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| MafError::InvalidPlacement(value.to_string()))?;
    if positions.len() != 4 {
        return Err(MafError::InvalidPlacement(value.to_string()));
    }

    let Some(mut read) = maf.pending.take() else {
        warn!(placement = %value, "AT line without a preceding read, ignoring");
        return Ok(0);
    };
    let (x1, y1) = (positions[0], positions[1]);
    read.reversed = x1 > y1;
    read.x1 = Some(x1.min(y1));
    read.y1 = Some(x1.max(y1));
    assembly.push_read(read);
    Ok(1)
}

fn end_contig(maf: &mut MafState, assembly: &mut Assembly) -> Event {
    let mut placed = flush_pending(maf, assembly);
    if let Some(read) = maf.current.take() {
        warn!(read = %read.name, "Read not closed with ER before EC");
        assembly.push_read(read);
        placed += 1;
    }
    maf.in_contig = false;

    let Some(contig) = maf.contig.and_then(|i| assembly.contig_mut(i)) else {
        return Event::ReadsPlaced(placed);
    };
    if contig.length == 0 {
        if let Some(consensus) = &contig.consensus {
            contig.length = consensus.len() as u64;
        }
    }
    if let Some(declared) = maf.declared_reads {
        if declared != contig.read_count {
            warn!(
                contig = %contig.name,
                declared,
                found = contig.read_count,
                "NR line disagrees with the number of reads"
            );
        }
    }

    Event::ContigEnded {
        empty: contig.read_count == 0 && contig.consensus.is_none(),
        placed,
    }
}

fn apply_line(maf: &mut MafState, assembly: &mut Assembly, code: &str, value: &str) -> Result<Event, MafError> {
    match code {
        "RD" => {
            let mut placed = flush_pending(maf, assembly);
            if let Some(read) = maf.current.take() {
                warn!(read = %read.name, "Read not closed with ER before the next RD");
                maf.pending = Some(read);
                placed += flush_pending(maf, assembly);
            }
            let mut read = Read::new(value.trim());
            read.reference = maf.contig;
            maf.current = Some(read);
            return Ok(Event::ReadsPlaced(placed));
        }
        "ER" => {
            let placed = flush_pending(maf, assembly);
            maf.pending = maf.current.take();
            return Ok(Event::ReadsPlaced(placed));
        }
        "AT" => return place_read(maf, assembly, value).map(Event::ReadsPlaced),
        "EC" => return Ok(end_contig(maf, assembly)),
        _ => {}
    }

    if let Some(read) = maf.current.as_mut() {
        match code {
            "RS" => read.sequence = value.to_string(),
            "RQ" => read.quality = value.to_string(),
            _ => read.tags.push(Tag::new(code, 'Z', value)),
        }
        return Ok(Event::Nothing);
    }

    match code {
        "\\\\" => return Ok(Event::ReadBlockOpened),
        "//" => return Ok(Event::ReadsPlaced(flush_pending(maf, assembly))),
        "NR" => {
            maf.declared_reads = Some(parse_number(code, value)?);
            return Ok(Event::Nothing);
        }
        _ => {}
    }

    let length = if code == "LC" { Some(parse_number(code, value)?) } else { None };
    if let Some(contig) = maf.contig.and_then(|i| assembly.contig_mut(i)) {
        match code {
            "LC" => contig.length = length.unwrap_or_default(),
            "CS" => contig.consensus = Some(value.to_string()),
            "CQ" => contig.consensus_quality = Some(value.to_string()),
            _ => contig.tags.push(Tag::new(code, 'Z', value)),
        }
    }
    Ok(Event::Nothing)
}

/// Decode the next unit of a MAF stream: the first contig's header on the first call,
/// then up to the configured number of reads per call, never crossing a contig
/// boundary.
pub fn decode(state: &mut StreamState, assembly: &mut Assembly) -> Outcome {
    let header_phase = !state.header_done;
    let outcome = run(state, assembly, header_phase);
    if header_phase && matches!(outcome, Outcome::Ok | Outcome::Empty) {
        state.header_done = true;
    }
    outcome
}

fn run(state: &mut StreamState, assembly: &mut Assembly, header_phase: bool) -> Outcome {
    let limit = state.chunks.maf.max(1) as u64;
    let mut decoded = 0;
    let mut consumed = false;
    let mut started = false;

    while decoded < limit {
        let position = state.cursor.position();
        match state.cursor.read_line(&mut state.line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!(error = %e, "Cannot read MAF input");
                return Outcome::Fail;
            }
        }
        if state.line.trim().is_empty() {
            continue;
        }
        consumed = true;
        let (code, value) = split_code(state.line.trim_end());

        if state.maf.skip_contig {
            if code == "EC" {
                state.maf.skip_contig = false;
                state.maf.in_contig = false;
            }
            continue;
        }

        if code == "CO" {
            if started {
                if let Err(e) = state.cursor.seek(position) {
                    warn!(error = %e, "Cannot rewind to contig start");
                    return Outcome::Fail;
                }
                return Outcome::Ok;
            }
            match start_contig(&mut state.maf, assembly, value) {
                Ok(flushed) => state.records += flushed,
                Err(e) => {
                    warn!(error = %e, "Cannot start MAF contig");
                    return Outcome::Fail;
                }
            }
            started = true;
            continue;
        }

        if !state.maf.in_contig {
            if header_phase {
                rejected!(state, code, "MAF input must start with a CO line");
                return Outcome::Fail;
            }
            warn!(code, "Line outside any contig, skipping");
            continue;
        }
        started = true;

        match apply_line(&mut state.maf, assembly, code, value) {
            Ok(Event::Nothing) => {}
            Ok(Event::ReadsPlaced(n)) => {
                decoded += n;
                state.records += n;
            }
            Ok(Event::ReadBlockOpened) => {
                if header_phase {
                    return Outcome::Ok;
                }
            }
            Ok(Event::ContigEnded { empty, placed }) => {
                state.records += placed;
                return if empty { Outcome::Empty } else { Outcome::Ok };
            }
            Err(e) => {
                if header_phase {
                    rejected!(state, error = %e, "Not a MAF stream");
                } else {
                    warn!(error = %e, "Invalid MAF line");
                }
                return Outcome::Fail;
            }
        }
    }

    if decoded >= limit {
        return Outcome::Ok;
    }

    let flushed = flush_pending(&mut state.maf, assembly);
    state.records += flushed;
    if state.maf.in_contig {
        warn!("MAF input ends inside a contig");
        state.maf.in_contig = false;
    }

    match (consumed, started || !header_phase) {
        (true, true) => Outcome::Ok,
        _ => Outcome::Eof,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_code() {
        assert_eq!(split_code("CO\tcontig1"), ("CO", "contig1"));
        assert_eq!(split_code("AT 1 50 1 50"), ("AT", "1 50 1 50"));
        assert_eq!(split_code("\\\\"), ("\\\\", ""));
        assert_eq!(split_code("E"), ("E", ""));
    }

    #[test]
    fn test_place_reversed_read() {
        let mut maf = MafState::default();
        let mut assembly = Assembly::new();
        start_contig(&mut maf, &mut assembly, "c1").unwrap();

        apply_line(&mut maf, &mut assembly, "RD", "r1").unwrap();
        apply_line(&mut maf, &mut assembly, "RS", "ACGT").unwrap();
        apply_line(&mut maf, &mut assembly, "TN", "tmpl").unwrap();
        apply_line(&mut maf, &mut assembly, "ER", "").unwrap();
        assert!(assembly.reads().is_empty());

        apply_line(&mut maf, &mut assembly, "AT", "40 10 1 31").unwrap();
        let read = &assembly.reads()[0];
        assert_eq!(read.name, "r1");
        assert!(read.reversed);
        assert_eq!(read.x1, Some(10));
        assert_eq!(read.y1, Some(40));
        assert_eq!(read.reference, Some(0));
        assert_eq!(read.sequence, "ACGT");
        assert_eq!(read.tag("TN").unwrap().value, "tmpl");
        assert_eq!(assembly.contigs()[0].read_count, 1);
    }

    #[test]
    fn test_contig_lines() {
        let mut maf = MafState::default();
        let mut assembly = Assembly::new();
        start_contig(&mut maf, &mut assembly, "c1").unwrap();

        apply_line(&mut maf, &mut assembly, "CS", "ACGTT").unwrap();
        apply_line(&mut maf, &mut assembly, "CQ", "IIIII").unwrap();
        apply_line(&mut maf, &mut assembly, "CT", "COMM 1 5 note").unwrap();
        let event = apply_line(&mut maf, &mut assembly, "EC", "").unwrap();

        assert!(matches!(event, Event::ContigEnded { empty: false, .. }));
        let contig = &assembly.contigs()[0];
        assert_eq!(contig.length, 5);
        assert_eq!(contig.consensus_quality.as_deref(), Some("IIIII"));
        assert_eq!(contig.tag("CT").unwrap().value, "COMM 1 5 note");
    }

    #[test]
    fn test_empty_contig() {
        let mut maf = MafState::default();
        let mut assembly = Assembly::new();
        start_contig(&mut maf, &mut assembly, "c1").unwrap();
        let event = apply_line(&mut maf, &mut assembly, "EC", "").unwrap();
        assert!(matches!(event, Event::ContigEnded { empty: true, .. }));
    }

    #[test]
    fn test_invalid_lines() {
        let mut maf = MafState::default();
        let mut assembly = Assembly::new();
        start_contig(&mut maf, &mut assembly, "c1").unwrap();

        assert!(apply_line(&mut maf, &mut assembly, "NR", "many").is_err());
        assert!(apply_line(&mut maf, &mut assembly, "LC", "-1").is_err());
        apply_line(&mut maf, &mut assembly, "RD", "r1").unwrap();
        apply_line(&mut maf, &mut assembly, "ER", "").unwrap();
        assert!(apply_line(&mut maf, &mut assembly, "AT", "1 2 3").is_err());
    }

    #[test]
    fn test_new_contig_replaces_previous() {
        let mut maf = MafState::default();
        let mut assembly = Assembly::new();
        start_contig(&mut maf, &mut assembly, "c1").unwrap();
        apply_line(&mut maf, &mut assembly, "EC", "").unwrap();
        start_contig(&mut maf, &mut assembly, "c2").unwrap();

        assert_eq!(assembly.contigs().len(), 1);
        assert_eq!(assembly.contigs()[0].name, "c2");
        assert!(maf.in_contig());
    }
}
