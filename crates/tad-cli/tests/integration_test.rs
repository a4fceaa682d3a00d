//! Integration tests for the TAD CLI binary.
//!
//! Builds `.tad` files with the `tad_format` library, runs the `tad` binary
//! on them, and checks both the printed output and the files it writes.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use tad_format::{Array, ElementType, TadStream};

// ──────────────────────── helpers ────────────────────────

/// The 2x2 uint8 grid with a UNIT tag.
fn grid() -> Array {
    let mut array = Array::from_data([2, 2], 1, ElementType::Uint8, vec![10, 20, 30, 40]).unwrap();
    array.global_tags_mut().set("UNIT", "meters").unwrap();
    array
}

/// A small RGB image with per-component and per-dimension tags.
fn image(fill: u8) -> Array {
    let mut array = Array::from_data([4, 3], 3, ElementType::Uint8, vec![fill; 36]).unwrap();
    array.global_tags_mut().set("FILL", fill.to_string()).unwrap();
    array.component_tags_mut(0).set("INTERPRETATION", "RED").unwrap();
    array.dimension_tags_mut(1).set("INTERPRETATION", "Y").unwrap();
    array
}

fn write_tad(path: &Path, arrays: &[Array]) {
    let mut stream = TadStream::create(path).unwrap();
    for array in arrays {
        stream.write_array(array).unwrap();
    }
    stream.close().unwrap();
}

fn read_tad(path: &Path) -> Vec<Array> {
    let mut stream = TadStream::open(path).unwrap();
    let mut arrays = Vec::new();
    while stream.has_more().unwrap() {
        arrays.push(stream.read_next().unwrap());
    }
    arrays
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Get a `Command` for the `tad` CLI binary.
#[allow(deprecated)]
fn tad_cmd() -> Command {
    Command::cargo_bin("tad").expect("Failed to find `tad` binary")
}

// ──────────────────────── tests ─────────────────────────

#[test]
fn test_info_human_readable() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("grid.tad");
    write_tad(&path, &[grid(), image(7)]);

    tad_cmd()
        .args(["info", arg(&path)])
        .assert()
        .success()
        .stdout(predicate::str::contains("array 0: 1 x uint8, size 2x2 (4 bytes)"))
        .stdout(predicate::str::contains("  global:\n    UNIT=meters\n"))
        .stdout(predicate::str::contains("array 1: 3 x uint8, size 4x3 (36 bytes)"))
        .stdout(predicate::str::contains("  dimension 1:\n    INTERPRETATION=Y\n"))
        .stdout(predicate::str::contains("  component 0:\n    INTERPRETATION=RED\n"));
}

#[test]
fn test_info_json() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("grid.tad");
    write_tad(&path, &[grid()]);

    let output = tad_cmd()
        .args(["info", arg(&path), "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&stdout).expect("info --json is valid JSON");

    let arrays = doc["arrays"].as_array().unwrap();
    assert_eq!(arrays.len(), 1);
    assert_eq!(arrays[0]["element_type"], "uint8");
    assert_eq!(arrays[0]["component_count"], 1);
    assert_eq!(arrays[0]["dimensions"], serde_json::json!([2, 2]));
    assert_eq!(arrays[0]["data_size"], 4);
    assert_eq!(arrays[0]["global_tags"]["UNIT"], "meters");
}

#[test]
fn test_info_statistics() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("grid.tad");
    let mut data = Vec::new();
    for v in [1.5f32, f32::NAN, -2.5, 8.0] {
        data.extend_from_slice(&v.to_ne_bytes());
    }
    let floats = Array::from_data([2], 2, ElementType::Float32, data).unwrap();
    write_tad(&path, &[grid(), floats]);

    tad_cmd()
        .args(["info", "--statistics", arg(&path)])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "  component 0: min=10 max=40 mean=25 var=166.667 dev=12.9099\n",
        ))
        .stdout(predicate::str::contains(
            "  component 0: min=-2.5 max=1.5 mean=-0.5 var=8 dev=2.82843\n",
        ))
        .stdout(predicate::str::contains(
            "  component 1: min=8 max=8 mean=8 var=0 dev=0\n",
        ));

    let output = tad_cmd()
        .args(["info", arg(&path), "--json", "-s"])
        .assert()
        .success();
    let doc: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    let stats = &doc["arrays"][0]["statistics"][0];
    assert_eq!(stats["min"], 10.0);
    assert_eq!(stats["max"], 40.0);
    assert_eq!(stats["finite_count"], 4);

    tad_cmd()
        .args(["info", arg(&path)])
        .assert()
        .success()
        .stdout(predicate::str::contains("min=").not());
}

#[test]
fn test_convert_copies_all_arrays() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tad");
    let out = tmp.path().join("out.tad");
    write_tad(&input, &[grid(), image(5)]);

    tad_cmd()
        .args(["convert", arg(&input), arg(&out)])
        .assert()
        .success();
    assert_eq!(read_tad(&out), vec![grid(), image(5)]);

    let raw = tmp.path().join("out.raw");
    tad_cmd()
        .args(["convert", arg(&input), arg(&raw)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no backend for format 'raw'"));

    tad_cmd()
        .args(["-O", "tad", "convert", arg(&input), arg(&raw)])
        .assert()
        .success();
    assert_eq!(read_tad(&raw), vec![grid(), image(5)]);
}

#[test]
fn test_output_that_is_an_input_is_rejected() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let input = tmp.path().join("a.tad");
    write_tad(&input, &[grid(), image(1)]);

    for args in [
        vec!["cat", "a.tad", "-o", "./a.tad"],
        vec!["extract", "a.tad", "-n", "0", "-o", "./a.tad"],
        vec!["tag", "./a.tad", "-o", "a.tad", "--set", "K=v"],
        vec!["convert", "a.tad", "./a.tad"],
    ] {
        tad_cmd()
            .current_dir(tmp.path())
            .args(&args)
            .assert()
            .failure()
            .stderr(predicate::str::contains("is also"));
    }
    assert_eq!(read_tad(&input), vec![grid(), image(1)]);
}

#[test]
fn test_count() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("three.tad");
    write_tad(&path, &[image(1), image(2), image(3)]);

    tad_cmd()
        .args(["count", arg(&path)])
        .assert()
        .success()
        .stdout("3\n");
}

#[test]
fn test_count_unknown_for_corrupt_file() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("corrupt.tad");
    write_tad(&path, &[image(1), image(2)]);
    let mut bytes = std::fs::read(&path).unwrap();
    let len = bytes.len();
    bytes.truncate(len - 5);
    std::fs::write(&path, &bytes).unwrap();

    tad_cmd()
        .args(["count", arg(&path)])
        .assert()
        .success()
        .stdout("unknown\n");
}

#[test]
fn test_cat_and_append() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let a = tmp.path().join("a.tad");
    let b = tmp.path().join("b.tad");
    let out = tmp.path().join("out.tad");
    write_tad(&a, &[image(1), image(2)]);
    write_tad(&b, &[grid()]);

    tad_cmd()
        .args(["cat", arg(&a), arg(&b), "-o", arg(&out)])
        .assert()
        .success();
    assert_eq!(read_tad(&out), vec![image(1), image(2), grid()]);

    tad_cmd()
        .args(["cat", arg(&b), "-o", arg(&out), "--append"])
        .assert()
        .success();
    assert_eq!(read_tad(&out), vec![image(1), image(2), grid(), grid()]);
}

#[test]
fn test_extract() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tad");
    let out = tmp.path().join("one.tad");
    write_tad(&input, &[image(1), grid(), image(3)]);

    tad_cmd()
        .args(["extract", arg(&input), "--index", "1", "-o", arg(&out)])
        .assert()
        .success();
    assert_eq!(read_tad(&out), vec![grid()]);

    tad_cmd()
        .args(["extract", arg(&input), "--index", "3", "-o", arg(&out)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_tag_set_and_unset() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tad");
    let out = tmp.path().join("tagged.tad");
    write_tad(&input, &[grid(), image(2)]);

    tad_cmd()
        .args([
            "tag",
            arg(&input),
            "-o",
            arg(&out),
            "--index",
            "0",
            "--set",
            "UNIT=feet",
            "--set",
            "SOURCE=survey",
            "--unset",
            "MISSING",
        ])
        .assert()
        .success();

    let arrays = read_tad(&out);
    assert_eq!(arrays.len(), 2);
    assert_eq!(arrays[0].global_tags().get("UNIT"), Some("feet"));
    assert_eq!(arrays[0].global_tags().get("SOURCE"), Some("survey"));
    assert_eq!(arrays[0].data(), grid().data());
    assert_eq!(arrays[1], image(2));

    tad_cmd()
        .args(["tag", arg(&out), "-o", arg(&input), "--unset", "FILL"])
        .assert()
        .success();
    let arrays = read_tad(&input);
    assert!(!arrays[1].global_tags().contains("FILL"));
}

#[test]
fn test_tag_index_out_of_range_writes_nothing() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tad");
    let out = tmp.path().join("out.tad");
    write_tad(&input, &[grid(), image(2)]);

    tad_cmd()
        .args(["tag", arg(&input), "-o", arg(&out), "--index", "5", "--set", "K=v"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
    assert!(!out.exists());
}

#[test]
fn test_tag_index_out_of_range_in_uncountable_file() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tad");
    let out = tmp.path().join("out.tad");
    write_tad(&input, &[grid()]);
    // A lone magic byte after the record makes the count unknown while the
    // first array stays readable.
    let mut bytes = std::fs::read(&input).unwrap();
    bytes.push(b'T');
    std::fs::write(&input, &bytes).unwrap();

    tad_cmd()
        .args(["tag", arg(&input), "-o", arg(&out), "--index", "5", "--set", "K=v"])
        .assert()
        .failure();
    assert!(!out.exists());
}

#[test]
fn test_tag_rejects_bad_assignment() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tad");
    write_tad(&input, &[grid()]);

    tad_cmd()
        .args([
            "tag",
            arg(&input),
            "-o",
            arg(&tmp.path().join("out.tad")),
            "--set",
            "NOEQUALS",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected KEY=VALUE"));
}

#[test]
fn test_input_format_override() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("grid.dat");
    write_tad(&path, &[grid()]);

    tad_cmd()
        .args(["count", arg(&path)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no backend for format 'dat'"));

    tad_cmd()
        .args(["--input-format", "tad", "count", arg(&path)])
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn test_missing_file_fails() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    tad_cmd()
        .args(["info", arg(&tmp.path().join("nope.tad"))])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read"));
}
