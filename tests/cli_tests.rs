//! Command-line tests for the `assemread` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const SAM: &str = "@HD\tVN:1.6\n\
@SQ\tSN:chr1\tLN:1000\n\
r1\t0\tchr1\t101\t60\t5M\t*\t0\t0\tACGTA\tIIIII\n\
r2\t16\tchr1\t200\t60\t4M\t*\t0\t0\tACGT\tIIII\n";

fn sam_file() -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".sam").unwrap();
    file.write_all(SAM.as_bytes()).unwrap();
    file
}

fn assemread() -> Command {
    Command::cargo_bin("assemread").unwrap()
}

#[test]
fn test_formats_lists_registry() {
    assemread()
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("sam"))
        .stdout(predicate::str::contains("bam"))
        .stdout(predicate::str::contains("maf"));
}

#[test]
fn test_formats_json() {
    let output = assemread().args(["--format", "json", "formats"]).output().unwrap();
    assert!(output.status.success());

    let formats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = formats
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert!(names.contains(&"sam"));
    assert!(names.contains(&"maf"));
}

#[test]
fn test_load_sam_text() {
    let file = sam_file();
    assemread()
        .arg("load")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Contig chr1 (1000 bp)"))
        .stdout(predicate::str::contains("r1 chr1:101 + 5M"))
        .stdout(predicate::str::contains("r2 chr1:200 - 4M"));
}

#[test]
fn test_load_sam_json_chunks() {
    let file = sam_file();
    let output = assemread()
        .args(["--format", "json", "load"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let chunks: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    // Header, then one read per chunk
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0]["format"]["name"], "sam");
    assert_eq!(chunks[1]["reads"][0]["name"], "r1");
    assert_eq!(chunks[2]["reads"][0]["name"], "r2");
}

#[test]
fn test_load_tsv_contigs_only() {
    let file = sam_file();
    assemread()
        .args(["--format", "tsv", "load", "--contigs-only"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("record\tname"))
        .stdout(predicate::str::contains("contig\tchr1\t1000"))
        .stdout(predicate::str::contains("read\t").not());
}

#[test]
fn test_load_with_non_matching_id_fails() {
    let file = sam_file();
    assemread()
        .args(["load", "--id", "chrZ"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No data could be loaded"));
}

#[test]
fn test_load_unknown_input_format() {
    let file = sam_file();
    assemread()
        .args(["load", "--input-format", "cram"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown input format 'cram'"));
}

#[test]
fn test_load_garbage_fails() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"not an alignment\nor an assembly\n").unwrap();
    assemread().arg("load").arg(file.path()).assert().failure();
}

#[test]
fn test_load_missing_file() {
    assemread()
        .args(["load", "/nonexistent/reads.sam"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_invalid_region_is_rejected() {
    let file = sam_file();
    assemread()
        .args(["load", "--region", "chr1:200-100"])
        .arg(file.path())
        .assert()
        .failure();
}
