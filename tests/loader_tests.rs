//! End-to-end loader tests
//!
//! These drive [`Loader`] over real files on disk: probing, chunking, query
//! filtering, indexed BAM fetches and multi-input list files.

use std::io::Write;
use std::path::{Path, PathBuf};

use assemread::loader::registry::FormatDescriptor;
use assemread::loader::state::ChunkSizes;
use assemread::{Assembly, FormatKind, FormatRegistry, Loader, LoaderConfig, Region};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

const SAM: &str = "@HD\tVN:1.6\tSO:coordinate\n\
@SQ\tSN:chr1\tLN:1000\n\
@SQ\tSN:chr2\tLN:500\n\
r1\t0\tchr1\t101\t60\t5M\t*\t0\t0\tACGTA\tIIIII\n\
r2\t16\tchr2\t7\t60\t3M\t=\t20\t0\tGGC\tIII\n";

const MAF: &str = "CO\tc1\nLC\t10\n\\\\\n\
RD\tr1\nRS\tACGT\nER\nAT\t1 4 1 4\n\
RD\tr2\nRS\tACGT\nER\nAT\t8 5 1 4\n\
RD\tr3\nRS\tACGTA\nER\nAT\t2 6 1 5\n\
//\nEC\n\
CO\tc2\nCS\tACGTACGT\n\\\\\n\
RD\tr4\nRS\tACG\nER\nAT\t1 3 1 3\n\
//\nEC\n";

fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(data).unwrap();
    path
}

fn query(path: &Path) -> String {
    path.display().to_string()
}

/// Drain a loader, returning every non-empty chunk it hands back
fn chunks(loader: &mut Loader) -> Vec<Assembly> {
    let mut assembly = Assembly::new();
    let mut out = Vec::new();
    while loader.load_next(&mut assembly) {
        if !assembly.is_empty() {
            out.push(assembly.clone());
        }
    }
    out
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn bam_header(references: &[(&str, i32)]) -> Vec<u8> {
    let text = "@HD\tVN:1.6\tSO:coordinate\n";
    let mut data = b"BAM\x01".to_vec();
    data.extend_from_slice(&(text.len() as i32).to_le_bytes());
    data.extend_from_slice(text.as_bytes());
    data.extend_from_slice(&(references.len() as i32).to_le_bytes());
    for (name, length) in references {
        data.extend_from_slice(&(name.len() as i32 + 1).to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        data.push(0);
        data.extend_from_slice(&length.to_le_bytes());
    }
    data
}

/// One length-prefixed BAM record with a `<n>M` CIGAR and an all-A sequence
fn bam_record(ref_id: i32, pos: i32, flag: u16, name: &str, matched: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&ref_id.to_le_bytes());
    body.extend_from_slice(&pos.to_le_bytes());
    let bin_mq_nl: u32 = (4681 << 16) | (60 << 8) | (name.len() as u32 + 1);
    body.extend_from_slice(&bin_mq_nl.to_le_bytes());
    let flag_nc: u32 = (u32::from(flag) << 16) | 1;
    body.extend_from_slice(&flag_nc.to_le_bytes());
    body.extend_from_slice(&(matched as i32).to_le_bytes());
    body.extend_from_slice(&(-1i32).to_le_bytes());
    body.extend_from_slice(&(-1i32).to_le_bytes());
    body.extend_from_slice(&0i32.to_le_bytes());
    body.extend_from_slice(name.as_bytes());
    body.push(0);
    body.extend_from_slice(&(matched << 4).to_le_bytes());
    body.extend(std::iter::repeat(0x11).take((matched as usize).div_ceil(2)));
    body.extend(std::iter::repeat(30).take(matched as usize));

    let mut record = (body.len() as i32).to_le_bytes().to_vec();
    record.extend(body);
    record
}

/// BAM file with the header in one block and all records in a second one.
///
/// Returns the path and the compressed offsets where each block starts.
fn write_bam(dir: &TempDir, name: &str, records: &[Vec<u8>]) -> (PathBuf, u64, u64) {
    let header = gzip(&bam_header(&[("chr1", 1000), ("chr2", 500)]));
    let body = gzip(&records.concat());
    let records_start = header.len() as u64;
    let end = records_start + body.len() as u64;

    let mut data = header;
    data.extend(body);
    data.extend(gzip(b""));
    (write_file(dir, name, &data), records_start, end)
}

fn bai(chunk_start: u64, chunk_end: u64) -> Vec<u8> {
    let start = chunk_start << 16;
    let end = chunk_end << 16;
    let mut data = b"BAI\x01".to_vec();
    data.extend_from_slice(&2i32.to_le_bytes());
    // chr1: one bin, one interval
    data.extend_from_slice(&1i32.to_le_bytes());
    data.extend_from_slice(&4681u32.to_le_bytes());
    data.extend_from_slice(&1i32.to_le_bytes());
    data.extend_from_slice(&start.to_le_bytes());
    data.extend_from_slice(&end.to_le_bytes());
    data.extend_from_slice(&1i32.to_le_bytes());
    data.extend_from_slice(&start.to_le_bytes());
    // chr2: nothing indexed
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    data
}

#[test]
fn test_sam_loads_header_then_records() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sample.sam", SAM.as_bytes());
    let mut loader = Loader::open(&query(&path), LoaderConfig::default()).unwrap();
    let mut assembly = Assembly::new();

    // First call hands back an empty assembly named after the input
    assert!(loader.load_next(&mut assembly));
    assert!(assembly.is_empty());
    assert_eq!(assembly.format.filename.as_deref(), Some(query(&path).as_str()));

    assert!(loader.load_next(&mut assembly));
    assert_eq!(assembly.format.name, "sam");
    assert_eq!(assembly.contigs().len(), 2);
    assert_eq!(assembly.contigs()[0].name, "chr1");
    assert_eq!(assembly.contigs()[0].length, 1000);
    assert_eq!(assembly.header.version.as_deref(), Some("1.6"));
    assert!(assembly.reads().is_empty());

    assert!(loader.load_next(&mut assembly));
    assert_eq!(assembly.reads().len(), 1);
    let read = &assembly.reads()[0];
    assert_eq!(read.name, "r1");
    assert_eq!(read.x1, Some(101));
    assert_eq!(read.cigar, "5M");
    assert_eq!(read.reference, Some(0));

    assert!(loader.load_next(&mut assembly));
    let read = &assembly.reads()[0];
    assert_eq!(read.name, "r2");
    assert!(read.reversed);
    assert_eq!(read.y1, Some(7));
    assert_eq!(read.x1, None);
    assert_eq!(read.mate_reference, Some(1));

    assert!(!loader.load_next(&mut assembly));
    assert!(!loader.is_loading());
    assert_eq!(loader.count(), 5);
}

#[test]
fn test_sam_trailing_blank_lines_add_no_chunks() {
    let dir = TempDir::new().unwrap();
    let text = format!("{SAM}\n\n  \n");
    let path = write_file(&dir, "blank_tail.sam", text.as_bytes());
    let mut loader = Loader::open(&query(&path), LoaderConfig::default()).unwrap();
    let mut assembly = Assembly::new();

    let mut loaded = 0;
    while loader.load_next(&mut assembly) {
        loaded += 1;
        if loaded > 2 {
            assert_eq!(assembly.reads().len(), 1);
        }
    }
    // Name, header, then one chunk per alignment line
    assert_eq!(loaded, 4);
}

#[test]
fn test_sam_probe_order() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sample.sam", SAM.as_bytes());
    let mut loader = Loader::open(&query(&path), LoaderConfig::default()).unwrap();
    let mut assembly = Assembly::new();

    assert!(loader.load_next(&mut assembly));
    assert!(loader.load_next(&mut assembly));
    let state = loader.current().unwrap();
    assert_eq!(state.pinned(), Some(FormatKind::Sam));
    assert_eq!(state.attempts(), &[FormatKind::Bam, FormatKind::Maf, FormatKind::Sam]);
}

#[test]
fn test_custom_registry_order() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sample.sam", SAM.as_bytes());
    let descriptor = |kind: FormatKind| FormatDescriptor {
        kind,
        name: kind.name(),
        ontology: "",
        description: "",
        alias: false,
        try_auto: true,
        binary: kind.is_binary(),
    };
    let registry = FormatRegistry::new(vec![descriptor(FormatKind::Sam), descriptor(FormatKind::Maf)]);
    let mut loader = Loader::open_with(&query(&path), LoaderConfig::default(), registry).unwrap();
    let mut assembly = Assembly::new();

    assert!(loader.load_next(&mut assembly));
    assert!(loader.load_next(&mut assembly));
    assert_eq!(loader.current().unwrap().attempts(), &[FormatKind::Sam]);
}

#[test]
fn test_garbage_input_loads_nothing() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "garbage.txt", b"this is not\nany known format\n");
    let mut loader = Loader::open(&query(&path), LoaderConfig::default()).unwrap();
    let mut assembly = Assembly::new();

    assert!(loader.load_next(&mut assembly));
    assert!(!loader.load_next(&mut assembly));
    assert!(assembly.is_empty());
    assert!(!loader.returned());
}

#[test]
fn test_missing_input_is_an_open_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.sam");
    assert!(Loader::open(&query(&missing), LoaderConfig::default()).is_err());
    assert!(Loader::open("nosuchformat::whatever.sam", LoaderConfig::default()).is_err());
}

#[test]
fn test_query_id_selects_input() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sample.sam", SAM.as_bytes());

    let mut loader = Loader::open(&format!("{}:chr2", query(&path)), LoaderConfig::default()).unwrap();
    let loaded = chunks(&mut loader);
    assert_eq!(loaded.len(), 3);

    let mut loader = Loader::open(&format!("{}:chrX", query(&path)), LoaderConfig::default()).unwrap();
    assert!(chunks(&mut loader).is_empty());
}

#[test]
fn test_maf_chunks_never_span_contigs() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "assembly.maf", MAF.as_bytes());
    let config = LoaderConfig {
        chunks: ChunkSizes {
            maf: 2,
            ..ChunkSizes::default()
        },
        ..LoaderConfig::default()
    };
    let mut loader = Loader::open(&query(&path), config).unwrap();
    let loaded = chunks(&mut loader);

    let summary: Vec<(String, Vec<String>)> = loaded
        .iter()
        .map(|a| {
            (
                a.contigs()[0].name.clone(),
                a.reads().iter().map(|r| r.name.clone()).collect(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("c1".to_string(), vec![]),
            ("c1".to_string(), vec!["r1".to_string(), "r2".to_string()]),
            ("c1".to_string(), vec!["r3".to_string()]),
            ("c2".to_string(), vec!["r4".to_string()]),
        ]
    );

    assert_eq!(loaded[0].format.name, "maf");
    assert_eq!(loaded[0].contigs()[0].length, 10);
    let r2 = &loaded[1].reads()[1];
    assert!(r2.reversed);
    assert_eq!((r2.x1, r2.y1), (Some(5), Some(8)));
    assert_eq!(loaded[3].contigs()[0].length, 8);
}

#[test]
fn test_maf_id_filter_skips_contigs() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "assembly.maf", MAF.as_bytes());
    let config = LoaderConfig {
        ids: vec!["C2".to_string()],
        ignore_case: true,
        ..LoaderConfig::default()
    };
    let mut loader = Loader::open(&format!("maf::{}", query(&path)), config).unwrap();
    let loaded = chunks(&mut loader);

    assert!(!loaded.is_empty());
    assert!(loaded.iter().all(|a| a.contigs()[0].name == "c2"));
    let reads: Vec<&str> = loaded
        .iter()
        .flat_map(|a| a.reads())
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(reads, vec!["r4"]);
}

#[test]
fn test_bam_sequential_read() {
    let dir = TempDir::new().unwrap();
    let records = vec![
        bam_record(0, 9, 0, "fwd", 5),
        bam_record(0, 99, 0x10, "rev", 4),
        bam_record(-1, -1, 0x4, "unplaced", 3),
    ];
    let (path, _, _) = write_bam(&dir, "sample.bam", &records);
    let mut loader = Loader::open(&query(&path), LoaderConfig::default()).unwrap();
    let loaded = chunks(&mut loader);

    assert_eq!(loaded.len(), 4);
    let header = &loaded[0];
    assert_eq!(header.format.name, "bam");
    assert_eq!(header.contigs().len(), 2);
    assert_eq!(header.contigs()[1].name, "chr2");
    assert_eq!(header.contigs()[1].length, 500);

    let fwd = &loaded[1].reads()[0];
    assert_eq!(fwd.x1, Some(10));
    assert_eq!(fwd.cigar, "5M");
    assert_eq!(fwd.sequence, "AAAAA");

    let rev = &loaded[2].reads()[0];
    assert!(rev.reversed);
    assert_eq!(rev.y1, Some(100));
    assert_eq!(rev.x1, None);

    let unplaced = &loaded[3].reads()[0];
    assert_eq!(unplaced.reference, None);
    assert_eq!(unplaced.position(), None);
}

#[test]
fn test_bam_region_through_index() {
    let dir = TempDir::new().unwrap();
    let records = vec![
        bam_record(0, 9, 0, "near", 5),
        bam_record(0, 50, 0, "inside", 5),
        bam_record(0, 500, 0, "far", 5),
        bam_record(1, 0, 0, "other", 5),
    ];
    let (path, start, end) = write_bam(&dir, "sample.bam", &records);
    write_file(&dir, "sample.bam.bai", &bai(start, end));

    let config = LoaderConfig {
        region: Some("chr1:12-100".parse::<Region>().unwrap()),
        ..LoaderConfig::default()
    };
    let mut loader = Loader::open(&query(&path), config).unwrap();
    let loaded = chunks(&mut loader);

    assert_eq!(loaded.len(), 1);
    let names: Vec<&str> = loaded[0].reads().iter().map(|r| r.name.as_str()).collect();
    // "near" covers 10-14, overlapping the region start
    assert_eq!(names, vec!["near", "inside"]);
    assert_eq!(loaded[0].contigs()[0].read_count, 2);
}

#[test]
fn test_bam_region_without_index_reads_everything() {
    let dir = TempDir::new().unwrap();
    let records = vec![bam_record(0, 9, 0, "a", 5), bam_record(0, 500, 0, "b", 5)];
    let (path, _, _) = write_bam(&dir, "sample.bam", &records);

    let config = LoaderConfig {
        region: Some("chr1:1-100".parse::<Region>().unwrap()),
        ..LoaderConfig::default()
    };
    let mut loader = Loader::open(&query(&path), config).unwrap();
    let reads: Vec<String> = chunks(&mut loader)
        .iter()
        .flat_map(|a| a.reads().iter().map(|r| r.name.clone()).collect::<Vec<_>>())
        .collect();
    assert_eq!(reads, vec!["a", "b"]);
}

#[test]
fn test_truncated_bam_stops_loading() {
    let dir = TempDir::new().unwrap();
    let mut record = bam_record(0, 9, 0, "cut", 5);
    record.truncate(record.len() - 4);
    let (path, _, _) = write_bam(&dir, "sample.bam", &[bam_record(0, 1, 0, "whole", 5), record]);

    let mut loader = Loader::open(&query(&path), LoaderConfig::default()).unwrap();
    let loaded = chunks(&mut loader);
    let reads: Vec<&str> = loaded
        .iter()
        .flat_map(|a| a.reads())
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(reads, vec!["whole"]);
}

#[test]
fn test_list_file_loads_each_input() {
    let dir = TempDir::new().unwrap();
    let sam = write_file(&dir, "sample.sam", SAM.as_bytes());
    let maf = write_file(&dir, "assembly.maf", MAF.as_bytes());
    let missing = dir.path().join("gone.sam");
    let list = write_file(
        &dir,
        "inputs.list",
        format!("# inputs\n{}\n\n{}\n", query(&sam), query(&maf)).as_bytes(),
    );

    let mut loader = Loader::open(&format!("@{}", query(&list)), LoaderConfig::default()).unwrap();
    let loaded = chunks(&mut loader);
    let formats: Vec<&str> = loaded.iter().map(|a| a.format.name.as_str()).collect();
    assert_eq!(formats.iter().filter(|f| **f == "sam").count(), 3);
    assert!(formats.iter().skip(3).all(|f| *f == "maf"));
    assert_eq!(loaded.last().unwrap().format.filename.as_deref(), Some(query(&maf).as_str()));

    std::fs::write(&list, format!("{}\n{}\n", query(&sam), query(&missing))).unwrap();
    assert!(Loader::open(&format!("@{}", query(&list)), LoaderConfig::default()).is_err());
}
