use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::core::assembly::{Assembly, AssemblyError};
use crate::core::contig::Contig;
use crate::core::header::HeaderRecord;
use crate::core::read::{flags, Read};
use crate::core::tag::Tag;
use crate::core::types::SortOrder;
use crate::loader::engine::Outcome;
use crate::loader::state::StreamState;
use crate::parsing::rejected;
use crate::utils::validation::normalize_md5;

/// Mandatory columns in an alignment line
pub const MANDATORY_COLUMNS: usize = 11;

#[derive(Error, Debug)]
pub enum SamError {
    #[error("Invalid SAM header line: {0}")]
    InvalidHeader(String),

    #[error("Invalid SAM alignment line: {0}")]
    InvalidAlignment(String),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Apply one `@XX` header line to the assembly.
///
/// `@SQ` adds a contig (a repeated name is warned about and skipped), `@HD`, `@RG`,
/// `@PG` and `@CO` fill [`HeaderInfo`](crate::core::header::HeaderInfo). Unknown
/// two-letter record types are ignored with a warning.
///
/// # Errors
///
/// Returns `SamError::InvalidHeader` if the line is not a header line, a field lacks a
/// `TAG:` prefix, or `@SQ` is missing SN/LN. Returns `SamError::Assembly` if the contig
/// table is full.
pub fn apply_header_line(line: &str, assembly: &mut Assembly) -> Result<(), SamError> {
    let mut columns = line.split('\t');
    let record_type = columns.next().unwrap_or_default();
    if !is_header_record_type(record_type) {
        return Err(SamError::InvalidHeader(format!(
            "expected @XX record type, found '{record_type}'"
        )));
    }

    if record_type == "@CO" {
        let comment = line.strip_prefix("@CO").unwrap_or_default();
        assembly
            .header
            .comments
            .push(comment.trim_start_matches('\t').to_string());
        return Ok(());
    }

    let mut fields = Vec::new();
    for column in columns.filter(|c| !c.is_empty()) {
        let (tag, value) = column
            .split_once(':')
            .filter(|(tag, _)| tag.len() == 2)
            .ok_or_else(|| SamError::InvalidHeader(format!("malformed field '{column}' in {record_type}")))?;
        fields.push((tag, value));
    }

    match record_type {
        "@HD" => {
            for (tag, value) in fields {
                match tag {
                    "VN" => assembly.header.version = Some(value.to_string()),
                    "SO" => assembly.header.sort_order = Some(SortOrder::parse(value)),
                    _ => {}
                }
            }
        }
        "@SQ" => apply_sequence_line(&fields, assembly)?,
        "@RG" => {
            let record = header_record(record_type, &fields)?;
            assembly.header.read_groups.push(record);
        }
        "@PG" => {
            let record = header_record(record_type, &fields)?;
            assembly.header.programs.push(record);
        }
        _ => warn!(record_type, "Unknown SAM header record type, ignoring"),
    }
    Ok(())
}

fn is_header_record_type(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 3 && bytes[0] == b'@' && bytes[1..].iter().all(u8::is_ascii_alphabetic)
}

fn apply_sequence_line(fields: &[(&str, &str)], assembly: &mut Assembly) -> Result<(), SamError> {
    let name = fields
        .iter()
        .find(|(tag, _)| *tag == "SN")
        .map(|(_, value)| *value)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| SamError::InvalidHeader("@SQ line without SN".to_string()))?;
    let length = fields
        .iter()
        .find(|(tag, _)| *tag == "LN")
        .and_then(|(_, value)| value.parse::<u64>().ok())
        .ok_or_else(|| SamError::InvalidHeader(format!("@SQ {name} has no valid LN")))?;

    let mut contig = Contig::new(name, length);
    for (tag, value) in fields {
        match *tag {
            "SN" | "LN" => {}
            "M5" => match normalize_md5(value) {
                Some(md5) => contig.tags.push(Tag::new("M5", 'Z', md5)),
                None => warn!(
                    contig = %name,
                    md5 = %value,
                    "Invalid MD5 checksum format, ignoring"
                ),
            },
            _ => contig.tags.push(Tag::new(*tag, 'Z', *value)),
        }
    }

    match assembly.add_contig(contig) {
        Ok(_) => Ok(()),
        Err(AssemblyError::DuplicateContig(name)) => {
            warn!(contig = %name, "Duplicate @SQ line, keeping the first");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn header_record(record_type: &str, fields: &[(&str, &str)]) -> Result<HeaderRecord, SamError> {
    let id = fields
        .iter()
        .find(|(tag, _)| *tag == "ID")
        .map(|(_, value)| (*value).to_string())
        .ok_or_else(|| SamError::InvalidHeader(format!("{record_type} line without ID")))?;
    let tags = fields
        .iter()
        .filter(|(tag, _)| *tag != "ID")
        .map(|(tag, value)| Tag::new(*tag, 'Z', *value))
        .collect();
    Ok(HeaderRecord { id, tags })
}

fn parse_column<T: FromStr>(value: &str, column: &str) -> Result<T, SamError> {
    value
        .parse()
        .map_err(|_| SamError::InvalidAlignment(format!("invalid {column} '{value}'")))
}

fn resolve_reference(name: &str, assembly: &Assembly, read_name: &str) -> Option<usize> {
    if name == "*" {
        return None;
    }
    let index = assembly.contig_index(name);
    if index.is_none() {
        warn!(read = %read_name, reference = %name, "Reference not in header, treating as unplaced");
    }
    index
}

/// Parse one tab-separated alignment line against the assembly's contig table.
///
/// `RNEXT` of `=` resolves to the read's own reference. Malformed optional fields are
/// warned about and dropped.
///
/// # Errors
///
/// Returns `SamError::InvalidAlignment` if fewer than 11 columns are present or a
/// numeric column does not parse.
pub fn parse_alignment(line: &str, assembly: &Assembly) -> Result<Read, SamError> {
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < MANDATORY_COLUMNS {
        return Err(SamError::InvalidAlignment(format!(
            "expected at least {MANDATORY_COLUMNS} columns, found {}",
            columns.len()
        )));
    }

    let mut read = Read::new(columns[0]);
    read.flags = parse_column(columns[1], "FLAG")?;
    read.reversed = read.flags & flags::REVERSE != 0;
    read.reference = resolve_reference(columns[2], assembly, &read.name);

    let position: u64 = parse_column(columns[3], "POS")?;
    if position > 0 {
        read.set_position(position);
    }
    read.mapping_quality = parse_column(columns[4], "MAPQ")?;
    read.cigar = columns[5].to_string();

    read.mate_reference = match columns[6] {
        // Same reference as the read itself, not the number of contigs seen so far
        "=" => read.reference,
        name => resolve_reference(name, assembly, &read.name),
    };
    let mate_position: u64 = parse_column(columns[7], "PNEXT")?;
    read.mate_position = (mate_position > 0).then_some(mate_position);
    read.template_length = parse_column(columns[8], "TLEN")?;
    read.sequence = columns[9].to_string();
    read.quality = columns[10].to_string();

    for field in &columns[MANDATORY_COLUMNS..] {
        match Tag::parse_sam(field) {
            Some(tag) => read.tags.push(tag),
            None => warn!(read = %read.name, field = %field, "Malformed optional field, skipping"),
        }
    }

    Ok(read)
}

/// Lines that identify a feature file rather than an alignment file
fn is_feature_file(line: &str) -> bool {
    line.starts_with("##gff-version") || line.starts_with("##fileformat=VCF")
}

/// Decode the next unit of a SAM stream: the header block on the first call, then up
/// to the configured number of alignment lines per call.
pub fn decode(state: &mut StreamState, assembly: &mut Assembly) -> Outcome {
    if state.header_done {
        decode_records(state, assembly)
    } else {
        decode_header(state, assembly)
    }
}

fn decode_header(state: &mut StreamState, assembly: &mut Assembly) -> Outcome {
    let mut header_lines = 0;
    let mut seen_lines = false;

    loop {
        let position = state.cursor.position();
        match state.cursor.read_line(&mut state.line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!(error = %e, "Cannot read SAM input");
                return Outcome::Fail;
            }
        }
        if state.line.trim().is_empty() {
            continue;
        }
        seen_lines = true;

        if is_feature_file(&state.line) {
            debug!("Input is a feature file, not an alignment file");
            return Outcome::BadType;
        }

        if !state.line.starts_with('@') {
            if header_lines == 0 {
                if let Err(e) = parse_alignment(&state.line, assembly) {
                    rejected!(state, error = %e, "Not a SAM stream");
                    return Outcome::Fail;
                }
            }
            if let Err(e) = state.cursor.seek(position) {
                warn!(error = %e, "Cannot rewind to first alignment line");
                return Outcome::Fail;
            }
            break;
        }

        if let Err(e) = apply_header_line(&state.line, assembly) {
            rejected!(state, error = %e, "Not a SAM header");
            return Outcome::Fail;
        }
        header_lines += 1;
    }

    if !seen_lines {
        return Outcome::Eof;
    }

    debug!(
        header_lines,
        contigs = assembly.contigs().len(),
        "Read SAM header"
    );
    state.header_done = true;
    Outcome::Ok
}

fn decode_records(state: &mut StreamState, assembly: &mut Assembly) -> Outcome {
    let limit = state.chunks.sam.max(1);
    let mut decoded = 0;

    while decoded < limit {
        match state.cursor.read_line(&mut state.line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!(records = state.records, error = %e, "Cannot read SAM input");
                return Outcome::Fail;
            }
        }
        if state.line.trim().is_empty() {
            continue;
        }
        if state.line.starts_with('@') {
            warn!(line = %state.line, "Header line inside alignment section, skipping");
            continue;
        }

        match parse_alignment(&state.line, assembly) {
            Ok(read) => {
                assembly.push_read(read);
                state.records += 1;
                decoded += 1;
            }
            Err(e) => {
                warn!(record = state.records + 1, error = %e, "Malformed alignment line");
                return Outcome::Fail;
            }
        }
    }

    if decoded > 0 {
        Outcome::Ok
    } else {
        Outcome::Eof
    }
}
