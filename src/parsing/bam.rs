//! BAM header and alignment record decoding.
//!
//! ```text
//! BAM record (little-endian, after the int32 block_size):
//! - refID       int32   reference index, -1 when unmapped
//! - pos         int32   0-based leftmost position
//! - bin_mq_nl   uint32  bin << 16 | MAPQ << 8 | l_read_name
//! - flag_nc     uint32  FLAG << 16 | n_cigar_op
//! - l_seq       int32   sequence length in bases
//! - next_refID  int32
//! - next_pos    int32   0-based
//! - tlen        int32
//! - read_name   char[l_read_name], NUL-terminated
//! - cigar       uint32[n_cigar_op], op_len << 4 | op
//! - seq         uint8[(l_seq + 1) / 2], two bases per byte, high nibble first
//! - qual        char[l_seq], 0xFF in the first byte when absent
//! - tags        until block_size is reached
//! ```
//!
//! Fields follow each other with no separators, so every width has to be honoured
//! exactly; the [`BinaryCursor`] bounds-checks each step.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{self, Read as _};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::core::assembly::Assembly;
use crate::core::contig::Contig;
use crate::core::read::{flags, Read};
use crate::core::tag::{Tag, TagType};
use crate::loader::engine::Outcome;
use crate::loader::state::StreamState;
use crate::parsing::bai::{self, BamIndex};
use crate::parsing::bgzf::BlockStream;
use crate::parsing::binary::{BinaryCursor, BinaryError};
use crate::parsing::rejected;
use crate::parsing::sam;
use crate::utils::validation::{check_contig_limit, check_record_size};

pub const BAM_MAGIC: [u8; 4] = *b"BAM\x01";

/// CIGAR operation characters indexed by the low 4 bits of a packed operation
pub const CIGAR_OPS: [u8; 9] = *b"MIDNSHP=X";

/// Bases indexed by a 4-bit sequence nibble
pub const SEQ_BASES: [u8; 16] = *b"=ACMGRSVTWYHKDBN";

/// First quality byte marking a read with no quality data
pub const MISSING_QUALITY: u8 = 0xFF;

/// Quality string stored for reads without quality data
pub const QUALITY_PLACEHOLDER: &str = "*";

#[derive(Error, Debug)]
pub enum BamError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Input is not in BAM format")]
    BadMagic,

    #[error("Truncated file: needed {needed} bytes, stream returned {got}")]
    Truncated { needed: usize, got: usize },

    #[error("Corrupt BAM data: {0}")]
    Corrupt(String),

    #[error("Corrupt BAM record: {0}")]
    Binary(#[from] BinaryError),
}

#[derive(Error, Debug, PartialEq, Eq)]
enum TagError {
    #[error("unknown tag type '{code}' for tag {name}")]
    UnknownType { name: String, code: char },

    #[error(transparent)]
    Binary(#[from] BinaryError),
}

/// Raw BAM header: the SAM header text plus the binary reference list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BamHeader {
    pub text: String,
    pub references: Vec<(String, u64)>,
}

/// Read the header from the start of a decompressed BAM stream
///
/// # Errors
///
/// Returns `BamError::BadMagic` if the stream does not start with `BAM\1`,
/// `BamError::Corrupt` for negative lengths, or `BamError::Io` if the stream ends early.
pub fn read_header(stream: &mut BlockStream) -> Result<BamHeader, BamError> {
    let mut magic = [0u8; 4];
    if stream.read_fully(&mut magic)? < magic.len() || magic != BAM_MAGIC {
        return Err(BamError::BadMagic);
    }

    let l_text = usize::try_from(stream.read_i32::<LittleEndian>()?)
        .map_err(|_| BamError::Corrupt("negative header text length".to_string()))?;
    let mut text = vec![0u8; l_text];
    stream.read_exact(&mut text)?;
    let text = String::from_utf8_lossy(&text)
        .trim_end_matches('\0')
        .to_string();

    let n_ref = usize::try_from(stream.read_i32::<LittleEndian>()?)
        .map_err(|_| BamError::Corrupt("negative number of references".to_string()))?;

    let mut references = Vec::new();
    for _ in 0..n_ref {
        if let Some(msg) = check_contig_limit(references.len()) {
            return Err(BamError::Corrupt(msg));
        }

        let l_name = usize::try_from(stream.read_i32::<LittleEndian>()?)
            .ok()
            .filter(|&l| l > 0)
            .ok_or_else(|| BamError::Corrupt("non-positive reference name length".to_string()))?;
        let mut name = vec![0u8; l_name];
        stream.read_exact(&mut name)?;
        let name = String::from_utf8_lossy(&name)
            .trim_end_matches('\0')
            .to_string();

        let l_ref = u64::try_from(stream.read_i32::<LittleEndian>()?)
            .map_err(|_| BamError::Corrupt(format!("negative length for reference {name}")))?;
        references.push((name, l_ref));
    }

    Ok(BamHeader { text, references })
}

/// Read one length-prefixed record into `buf`.
///
/// Returns `Ok(None)` at a clean end of stream and the record length otherwise.
///
/// # Errors
///
/// Returns `BamError::Truncated` when the stream ends inside a record, and
/// `BamError::Corrupt` for an impossible block size.
pub fn read_record(stream: &mut BlockStream, buf: &mut Vec<u8>) -> Result<Option<usize>, BamError> {
    let mut size = [0u8; 4];
    let got = stream.read_fully(&mut size)?;
    if got == 0 {
        return Ok(None);
    }
    if got < size.len() {
        return Err(BamError::Truncated {
            needed: size.len(),
            got,
        });
    }

    let block_size = i32::from_le_bytes(size);
    if let Some(msg) = check_record_size(block_size) {
        return Err(BamError::Corrupt(msg));
    }
    let len = usize::try_from(block_size)
        .map_err(|_| BamError::Corrupt(format!("Negative record size: {block_size}")))?;

    buf.resize(len, 0);
    let got = stream.read_fully(buf)?;
    if got < len {
        return Err(BamError::Truncated { needed: len, got });
    }
    Ok(Some(len))
}

/// Decode one record body (everything after `block_size`).
///
/// `contig_count` is the size of the contig table the reference indices point into.
/// An unknown tag type stops tag decoding with a warning; the read is still returned.
///
/// # Errors
///
/// Returns `BamError::Binary` if a fixed field or the name, CIGAR, sequence or quality
/// block overruns the record, or `BamError::Corrupt` for negative lengths.
pub fn decode_record(data: &[u8], contig_count: usize) -> Result<Read, BamError> {
    let mut cursor = BinaryCursor::new(data);

    let ref_id = cursor.read_i32()?;
    let pos = cursor.read_i32()?;
    let bin_mq_nl = cursor.read_u32()?;
    let flag_nc = cursor.read_u32()?;
    let seq_len = usize::try_from(cursor.read_i32()?)
        .map_err(|_| BamError::Corrupt("negative sequence length".to_string()))?;
    let next_ref_id = cursor.read_i32()?;
    let next_pos = cursor.read_i32()?;
    let tlen = cursor.read_i32()?;

    let bin = (bin_mq_nl >> 16) as u16;
    let mapq = ((bin_mq_nl >> 8) & 0xFF) as u8;
    let name_len = (bin_mq_nl & 0xFF) as usize;
    let flag = (flag_nc >> 16) as u16;
    let n_cigar = (flag_nc & 0xFFFF) as usize;

    if name_len == 0 {
        return Err(BamError::Corrupt("read name length is zero".to_string()));
    }
    let name_bytes = cursor.read_bytes(name_len)?;
    let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_len);

    let mut read = Read::new(String::from_utf8_lossy(&name_bytes[..name_end]));
    read.flags = flag;
    read.reversed = flag & flags::REVERSE != 0;
    read.mapping_quality = mapq;
    read.bin = bin;
    read.reference = resolve_reference(ref_id, contig_count, &read.name);
    if let Ok(pos) = u64::try_from(pos) {
        read.set_position(pos + 1);
    }
    read.mate_reference = resolve_reference(next_ref_id, contig_count, &read.name);
    read.mate_position = u64::try_from(next_pos).ok().map(|p| p + 1);
    read.template_length = i64::from(tlen);

    read.cigar = decode_cigar(&mut cursor, n_cigar)?;
    read.sequence = decode_sequence(&mut cursor, seq_len)?;
    read.quality = decode_quality(&mut cursor, seq_len)?;
    read.tags = decode_tags(&mut cursor, &read.name);

    Ok(read)
}

fn resolve_reference(id: i32, contig_count: usize, read_name: &str) -> Option<usize> {
    let index = usize::try_from(id).ok()?;
    if index < contig_count {
        Some(index)
    } else {
        warn!(
            read = %read_name,
            reference = id,
            contigs = contig_count,
            "Reference index outside the contig table, treating as unplaced"
        );
        None
    }
}

/// Decode `n_ops` packed CIGAR operations into `<length><op>` text
///
/// # Errors
///
/// Returns `BinaryError::Overrun` if the record holds fewer than `4 * n_ops` bytes.
pub fn decode_cigar(cursor: &mut BinaryCursor<'_>, n_ops: usize) -> Result<String, BinaryError> {
    let mut cigar = String::with_capacity(n_ops * 3);
    for _ in 0..n_ops {
        let packed = cursor.read_u32()?;
        let length = packed >> 4;
        let op = CIGAR_OPS
            .get((packed & 0xF) as usize)
            .map_or('?', |&c| char::from(c));
        if op == '?' {
            warn!(code = packed & 0xF, "Unknown CIGAR operation code");
        }
        cigar.push_str(&length.to_string());
        cigar.push(op);
    }
    Ok(cigar)
}

/// Decode `length` bases packed two per byte, high nibble first
///
/// # Errors
///
/// Returns `BinaryError::Overrun` if fewer than `ceil(length / 2)` bytes remain.
pub fn decode_sequence(cursor: &mut BinaryCursor<'_>, length: usize) -> Result<String, BinaryError> {
    let packed = cursor.read_bytes(length.div_ceil(2))?;
    let mut sequence = String::with_capacity(length);
    for i in 0..length {
        let byte = packed[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        sequence.push(char::from(SEQ_BASES[nibble as usize]));
    }
    Ok(sequence)
}

/// Decode `length` Phred scores as printable (+33) characters.
///
/// A leading 0xFF marks the whole read as quality-less: all `length` bytes are still
/// consumed and the placeholder is stored instead.
///
/// # Errors
///
/// Returns `BinaryError::Overrun` if fewer than `length` bytes remain.
pub fn decode_quality(cursor: &mut BinaryCursor<'_>, length: usize) -> Result<String, BinaryError> {
    let raw = cursor.read_bytes(length)?;
    if raw.first() == Some(&MISSING_QUALITY) {
        return Ok(QUALITY_PLACEHOLDER.to_string());
    }
    Ok(raw
        .iter()
        .map(|&q| char::from(q.saturating_add(33)))
        .collect())
}

/// Decode the tag stream filling the rest of the record.
///
/// Decoding stops at the first unknown type code or truncated payload, since the
/// width of everything after it is no longer known.
pub fn decode_tags(cursor: &mut BinaryCursor<'_>, read_name: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    while !cursor.is_empty() {
        match decode_tag(cursor) {
            Ok(tag) => tags.push(tag),
            Err(TagError::UnknownType { name, code }) => {
                warn!(
                    read = %read_name,
                    tag = %name,
                    code = %code,
                    "Unknown tag type, skipping remaining tags"
                );
                break;
            }
            Err(TagError::Binary(e)) => {
                warn!(read = %read_name, error = %e, "Truncated tag data, skipping remaining tags");
                break;
            }
        }
    }
    tags
}

fn decode_tag(cursor: &mut BinaryCursor<'_>) -> Result<Tag, TagError> {
    let name = String::from_utf8_lossy(cursor.read_bytes(2)?).into_owned();
    let code = cursor.read_u8()?;
    let kind = TagType::from_code(code).ok_or_else(|| TagError::UnknownType {
        name: name.clone(),
        code: char::from(code),
    })?;

    let value = match kind {
        TagType::String | TagType::Hex => String::from_utf8_lossy(cursor.read_cstr()?).into_owned(),
        TagType::Char => char::from(cursor.read_u8()?).to_string(),
        TagType::Int8 => cursor.read_i8()?.to_string(),
        TagType::UInt8 => cursor.read_u8()?.to_string(),
        TagType::Int16 => cursor.read_i16()?.to_string(),
        TagType::UInt16 => cursor.read_u16()?.to_string(),
        TagType::Int32 => cursor.read_i32()?.to_string(),
        TagType::UInt32 => cursor.read_u32()?.to_string(),
        TagType::Float => cursor.read_f32()?.to_string(),
        TagType::Double => cursor.read_f64()?.to_string(),
    };
    Ok(Tag::new(name, kind.code(), value))
}

/// Load header text and the binary reference list into the assembly.
///
/// The binary list is authoritative for order and length because record reference
/// indices point into it; `@SQ` lines only contribute their extra tags.
fn apply_header(header: &BamHeader, assembly: &mut Assembly) -> Result<(), BamError> {
    for line in header.text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
        sam::apply_header_line(line, assembly).map_err(|e| BamError::Corrupt(e.to_string()))?;
    }

    let mut from_text: HashMap<String, Contig> = assembly
        .take_contigs()
        .into_iter()
        .map(|c| (c.name.clone(), c))
        .collect();

    for (name, length) in &header.references {
        let mut contig = from_text
            .remove(name)
            .unwrap_or_else(|| Contig::new(name.clone(), *length));
        if contig.length != *length {
            warn!(
                contig = %name,
                text_length = contig.length,
                binary_length = length,
                "Header text and reference list disagree on length, using reference list"
            );
            contig.length = *length;
        }
        assembly
            .add_contig(contig)
            .map_err(|e| BamError::Corrupt(e.to_string()))?;
    }

    if !from_text.is_empty() {
        warn!(
            count = from_text.len(),
            "@SQ lines without a binary reference entry were ignored"
        );
    }
    Ok(())
}

/// Decode the next unit of a BAM stream: the header on the first call, then up to
/// the configured number of records per call.
pub fn decode(state: &mut StreamState, assembly: &mut Assembly) -> Outcome {
    if state.header_done {
        decode_records(state, assembly)
    } else {
        decode_header(state, assembly)
    }
}

fn decode_header(state: &mut StreamState, assembly: &mut Assembly) -> Outcome {
    let Some(path) = state.path.clone() else {
        rejected!(state, "BAM input needs a file path, not a pipe");
        return Outcome::Fail;
    };

    let mut stream = match BlockStream::open(&path) {
        Ok(stream) => stream,
        Err(e) => {
            rejected!(state, error = %e, "Cannot open block stream");
            return Outcome::Fail;
        }
    };
    let header = match read_header(&mut stream) {
        Ok(header) => header,
        Err(e) => {
            rejected!(state, error = %e, "Not a BAM stream");
            return Outcome::Fail;
        }
    };
    if let Err(e) = apply_header(&header, assembly) {
        warn!(error = %e, "Invalid BAM header");
        return Outcome::Fail;
    }

    state.header_done = true;
    state.binary_mode = true;

    if let Some(outcome) = fetch_indexed(state, &path, assembly) {
        return outcome;
    }
    state.binary = Some(stream);
    Outcome::Ok
}

/// Bulk-load a region through the index, bypassing sequential chunking.
///
/// Returns `None` when the sequential path should be used instead.
fn fetch_indexed(state: &mut StreamState, path: &Path, assembly: &mut Assembly) -> Option<Outcome> {
    let region = state.region.clone()?;
    if !state.use_index {
        return None;
    }
    let Some(index) = BamIndex::load_for(path) else {
        warn!(region = %region, "No BAM index found, reading sequentially and ignoring region");
        return None;
    };

    state.query.mark_done();
    state.exhausted = true;

    let Some(ref_id) = assembly.contig_index(&region.contig) else {
        warn!(contig = %region.contig, "Region contig is not in the header, nothing to fetch");
        return Some(Outcome::Ok);
    };

    match bai::fetch(
        path,
        &index,
        ref_id,
        region.start,
        region.end,
        assembly,
        |assembly, read| assembly.push_read(read),
    ) {
        Ok(count) => {
            debug!(region = %region, records = count, "Fetched region through index");
            state.records += count;
            Some(Outcome::Ok)
        }
        Err(e) => {
            error!(error = %e, "Truncated file during indexed fetch");
            Some(Outcome::Fail)
        }
    }
}

fn decode_records(state: &mut StreamState, assembly: &mut Assembly) -> Outcome {
    let limit = state.chunks.bam.max(1);
    let mut decoded = 0;

    while decoded < limit {
        let Some(stream) = state.binary.as_mut() else {
            break;
        };
        match read_record(stream, &mut state.record_buf) {
            Ok(Some(len)) => match decode_record(&state.record_buf[..len], assembly.contigs().len()) {
                Ok(read) => {
                    assembly.push_read(read);
                    state.records += 1;
                    decoded += 1;
                }
                Err(e) => return corrupt(state, &e),
            },
            Ok(None) => {
                debug!(records = state.records, "No more binary records, closing stream");
                state.binary = None;
            }
            Err(e) => return corrupt(state, &e),
        }
    }

    if decoded == 0 {
        Outcome::Eof
    } else {
        Outcome::Ok
    }
}

fn corrupt(state: &mut StreamState, e: &BamError) -> Outcome {
    error!(records = state.records, error = %e, "Truncated file, binary stream is no longer readable");
    state.binary = None;
    state.exhausted = true;
    Outcome::Fail
}
