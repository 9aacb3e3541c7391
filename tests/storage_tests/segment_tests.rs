//! Tests for the segment file format
//!
//! These tests verify:
//! - Segment creation and the exact on-disk line format
//! - Sparse index anchors (one per crossed block boundary)
//! - Bounded lookups via the sparse index
//! - Iterator over all records
//! - Corruption and ordering checks

use std::fs;
use std::path::Path;

use sparsekv::storage::segment::{SegmentBuilder, SegmentKind};
use sparsekv::storage::{Anchor, Segment};
use sparsekv::SparseKvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn build_segment(dir: &Path, id: u64, block_size: u64, entries: &[(&str, &str)]) -> Segment {
    let mut builder = SegmentBuilder::new(dir, SegmentKind::Regular, id, block_size).unwrap();
    for (key, value) in entries {
        builder.add(key.as_bytes(), value.as_bytes()).unwrap();
    }
    builder.finish().unwrap()
}

/// Create a segment with numbered entries
fn build_numbered_segment(dir: &Path, count: usize, block_size: u64) -> Segment {
    let mut builder = SegmentBuilder::new(dir, SegmentKind::Regular, 1, block_size).unwrap();
    // Keys must be added in sorted order
    for i in 0..count {
        let key = format!("key{:05}", i); // Zero-padded for lexicographic order
        let value = format!("value{}", i);
        builder.add(key.as_bytes(), value.as_bytes()).unwrap();
    }
    builder.finish().unwrap()
}

const FRUIT: &[(&str, &str)] = &[("apple", "1"), ("banana", "2"), ("cherry", "3"), ("date", "4")];

// =============================================================================
// SegmentBuilder Tests
// =============================================================================

#[test]
fn test_builder_writes_line_format() {
    let temp = TempDir::new().unwrap();

    let segment = build_segment(temp.path(), 1, 10, FRUIT);

    assert_eq!(segment.path(), temp.path().join("seg_1"));
    assert_eq!(
        fs::read_to_string(segment.path()).unwrap(),
        "apple 1\nbanana 2\ncherry 3\ndate 4\n"
    );
    assert_eq!(segment.file_size(), 33);
}

#[test]
fn test_builder_anchors_block_boundaries() {
    let temp = TempDir::new().unwrap();

    let segment = build_segment(temp.path(), 1, 10, FRUIT);

    // apple@0 and banana@8 share block 0; cherry@17 opens block 1; date@26 block 2
    assert_eq!(
        segment.index().anchors(),
        &[Anchor::new("cherry", 17), Anchor::new("date", 26)]
    );
    assert_eq!(
        fs::read_to_string(segment.index_path()).unwrap(),
        "cherry 17\ndate 26\n"
    );
    assert_eq!(segment.index_path(), temp.path().join("indx_seg_1"));
}

#[test]
fn test_builder_small_segment_has_empty_index() {
    let temp = TempDir::new().unwrap();

    let segment = build_segment(temp.path(), 1, 1024, FRUIT);

    assert!(segment.index().is_empty());
    assert!(segment.index_path().exists());
    assert_eq!(segment.get(b"date").unwrap(), b"4");
}

#[test]
fn test_builder_leaves_no_temp_files() {
    let temp = TempDir::new().unwrap();

    build_segment(temp.path(), 3, 10, FRUIT);

    let mut names: Vec<String> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["indx_seg_3", "seg_3"]);
}

#[test]
fn test_builder_compacted_naming() {
    let temp = TempDir::new().unwrap();

    let mut builder = SegmentBuilder::new(temp.path(), SegmentKind::Compacted, 9, 10).unwrap();
    builder.add(b"k", b"v").unwrap();
    let segment = builder.finish().unwrap();

    assert_eq!(segment.name(), "compacted_9");
    assert!(temp.path().join("compacted_9").exists());
    assert!(temp.path().join("indx_compacted_9").exists());
}

#[test]
fn test_builder_rejects_unsorted_keys() {
    let temp = TempDir::new().unwrap();

    let mut builder = SegmentBuilder::new(temp.path(), SegmentKind::Regular, 1, 10).unwrap();
    builder.add(b"banana", b"2").unwrap();

    let result = builder.add(b"apple", b"1");
    assert!(matches!(result, Err(SparseKvError::Storage(_))));
}

#[test]
fn test_builder_rejects_duplicate_keys() {
    let temp = TempDir::new().unwrap();

    let mut builder = SegmentBuilder::new(temp.path(), SegmentKind::Regular, 1, 10).unwrap();
    builder.add(b"apple", b"1").unwrap();

    assert!(builder.add(b"apple", b"2").is_err());
}

#[test]
fn test_builder_rejects_separators() {
    let temp = TempDir::new().unwrap();

    let mut builder = SegmentBuilder::new(temp.path(), SegmentKind::Regular, 1, 10).unwrap();

    assert!(matches!(
        builder.add(b"two words", b"v"),
        Err(SparseKvError::InvalidKey(_))
    ));
    assert!(matches!(
        builder.add(b"key", b"line\nbreak"),
        Err(SparseKvError::InvalidValue(_))
    ));
}

#[test]
fn test_builder_empty_segment_fails() {
    let temp = TempDir::new().unwrap();

    let builder = SegmentBuilder::new(temp.path(), SegmentKind::Regular, 1, 10).unwrap();

    assert!(matches!(builder.finish(), Err(SparseKvError::Storage(_))));
    assert!(!temp.path().join("seg_1").exists());
}

#[test]
fn test_builder_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    build_segment(temp.path(), 1, 10, FRUIT);

    let result = SegmentBuilder::new(temp.path(), SegmentKind::Regular, 1, 10);
    assert!(matches!(result, Err(SparseKvError::Storage(_))));
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_get_every_key() {
    let temp = TempDir::new().unwrap();
    let segment = build_numbered_segment(temp.path(), 200, 64);

    assert!(segment.index().len() > 10);

    for i in 0..200 {
        let key = format!("key{:05}", i);
        let expected = format!("value{}", i);
        assert_eq!(segment.get(key.as_bytes()).unwrap(), expected.as_bytes());
    }
}

#[test]
fn test_get_missing_keys() {
    let temp = TempDir::new().unwrap();
    let segment = build_numbered_segment(temp.path(), 50, 32);

    for key in ["aaa", "key00010x", "key99999", "zzz"] {
        let result = segment.get(key.as_bytes());
        assert!(matches!(result, Err(SparseKvError::KeyNotFound)), "{}", key);
    }
}

#[test]
fn test_bracket_matches_written_layout() {
    let temp = TempDir::new().unwrap();

    // abc@0 (7 bytes), bar@7 (9 bytes), foo@16 (14 bytes) → 30 bytes
    let segment = build_segment(
        temp.path(),
        1,
        7,
        &[("abc", "12"), ("bar", "1234"), ("foo", "123456789")],
    );

    assert_eq!(
        segment.index().anchors(),
        &[Anchor::new("bar", 7), Anchor::new("foo", 16)]
    );
    assert_eq!(segment.file_size(), 30);

    assert_eq!(segment.index().bracket(b"baz", 30), (7, 16));
    assert_eq!(segment.index().bracket(b"zzz", 30), (16, 30));
    assert_eq!(segment.index().bracket(b"aaa", 30), (0, 7));

    assert_eq!(segment.get(b"abc").unwrap(), b"12");
    assert_eq!(segment.get(b"bar").unwrap(), b"1234");
    assert_eq!(segment.get(b"foo").unwrap(), b"123456789");
}

#[test]
fn test_read_range_only_scans_its_range() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 1, 10, FRUIT);

    // date lives at offset 26, outside [0, 17)
    assert!(matches!(
        segment.read_range(0, 17, b"date"),
        Err(SparseKvError::KeyNotFound)
    ));
    assert_eq!(segment.read_range(17, 33, b"date").unwrap(), b"4");
}

#[test]
fn test_values_with_spaces() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(
        temp.path(),
        1,
        10,
        &[("addr", "#23 clown drive california"), ("nums", "986 423 124")],
    );

    assert_eq!(segment.get(b"addr").unwrap(), b"#23 clown drive california");
    assert_eq!(segment.get(b"nums").unwrap(), b"986 423 124");
}

// =============================================================================
// Open / Iterator Tests
// =============================================================================

#[test]
fn test_open_existing_segment() {
    let temp = TempDir::new().unwrap();
    let written = build_segment(temp.path(), 4, 10, FRUIT);

    let opened = Segment::open(temp.path(), SegmentKind::Regular, 4).unwrap();

    assert_eq!(opened.id(), 4);
    assert_eq!(opened.file_size(), written.file_size());
    assert_eq!(opened.index(), written.index());
    assert_eq!(opened.get(b"banana").unwrap(), b"2");
}

#[test]
fn test_open_without_index_is_corrupt() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 1, 10, FRUIT);
    fs::remove_file(segment.index_path()).unwrap();

    let result = Segment::open(temp.path(), SegmentKind::Regular, 1);
    assert!(matches!(result, Err(SparseKvError::Corrupt { .. })));
}

#[test]
fn test_open_with_anchor_past_end_is_corrupt() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 1, 10, FRUIT);
    fs::write(segment.index_path(), "cherry 17\ndate 400\n").unwrap();

    let result = Segment::open(temp.path(), SegmentKind::Regular, 1);
    assert!(matches!(result, Err(SparseKvError::Corrupt { .. })));
}

#[test]
fn test_malformed_record_is_corrupt() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("seg_1"), "apple 1\nbroken\ncherry 3\n").unwrap();
    fs::write(temp.path().join("indx_seg_1"), "").unwrap();

    let segment = Segment::open(temp.path(), SegmentKind::Regular, 1).unwrap();

    assert_eq!(segment.get(b"apple").unwrap(), b"1");
    assert!(matches!(
        segment.get(b"cherry"),
        Err(SparseKvError::Corrupt { .. })
    ));
}

#[test]
fn test_iterator_yields_all_records_in_order() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 1, 10, FRUIT);

    let entries: Vec<(Vec<u8>, Vec<u8>)> = segment.iter().unwrap().map(|e| e.unwrap()).collect();

    let expected: Vec<(Vec<u8>, Vec<u8>)> = FRUIT
        .iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
        .collect();
    assert_eq!(entries, expected);
}

#[test]
fn test_iterator_stops_at_truncated_record() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("seg_1"), "apple 1\nbanana 2").unwrap();
    fs::write(temp.path().join("indx_seg_1"), "").unwrap();

    let segment = Segment::open(temp.path(), SegmentKind::Regular, 1).unwrap();
    let results: Vec<_> = segment.iter().unwrap().collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(SparseKvError::Corrupt { .. })));
}
