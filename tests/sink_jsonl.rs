//! Black-box coverage of the JSONL sink and output-path derivation rules.

use puzzle_miner::analysis::Record;
use puzzle_miner::sink::derive_sink_paths;
use std::path::Path;

#[test]
fn file_like_output_root_derives_sibling_files() {
    let pair = derive_sink_paths(Path::new("/data/run.jsonl"), false, 1_700_000_000_000);
    assert_eq!(pair.puzzles.path(), Path::new("/data/run.puzzles.jsonl"));
    assert_eq!(pair.non_puzzles.path(), Path::new("/data/run.nonpuzzles.jsonl"));
}

#[test]
fn directory_output_root_gets_timestamped_variant_files() {
    let pair = derive_sink_paths(Path::new("/data/runs"), true, 42);
    assert_eq!(pair.puzzles.path(), Path::new("/data/runs/chess960-42.puzzles.jsonl"));
    assert_eq!(
        pair.non_puzzles.path(),
        Path::new("/data/runs/chess960-42.nonpuzzles.jsonl")
    );
}

#[test]
fn ensure_then_append_produces_tailable_empty_and_populated_files() {
    let dir = tempfile::tempdir().unwrap();
    let pair = derive_sink_paths(&dir.path().join("out.jsonl"), false, 1);
    pair.ensure().unwrap();

    // Empty file exists before any wave flushes, so tailing tools never
    // race against file creation.
    assert!(pair.puzzles.path().exists());
    assert_eq!(std::fs::read_to_string(pair.puzzles.path()).unwrap(), "");

    let records = vec![
        Record::new("pos1".into(), None),
        Record::new("pos2".into(), Some("pos1".into())),
    ];
    pair.puzzles.append(&records).unwrap();

    let text = std::fs::read_to_string(pair.puzzles.path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        let back: Record = serde_json::from_str(line).unwrap();
        assert!(back.position == "pos1" || back.position == "pos2");
    }

    // A second append is additive, never overwriting (append-only sink).
    pair.puzzles.append(&[Record::new("pos3".into(), None)]).unwrap();
    let text = std::fs::read_to_string(pair.puzzles.path()).unwrap();
    assert_eq!(text.lines().count(), 3);
}
