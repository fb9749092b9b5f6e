//! Append-only JSONL output sink and the output-path derivation rules.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::analysis::Record;
use crate::error::Result;

/// One append-only output file. `ensure` creates parent directories and
/// touches the file if absent; `append` writes one JSON object per line.
///
/// Single-writer discipline: the frontier scheduler is the only caller,
/// so the process never has two appenders racing on the same path.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: PathBuf) -> JsonlSink {
        JsonlSink { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create parent directories and touch the file if it does not exist,
    /// so downstream tooling can tail empty files before the first wave
    /// flushes.
    pub fn ensure(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }

    /// Append one JSON object per line, each terminated with `\n`.
    pub fn append(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())?;
        Ok(())
    }
}

/// The two sinks a mining run writes to: puzzles and non-puzzles.
pub struct SinkPair {
    pub puzzles: JsonlSink,
    pub non_puzzles: JsonlSink,
}

impl SinkPair {
    pub fn ensure(&self) -> Result<()> {
        self.puzzles.ensure()?;
        self.non_puzzles.ensure()?;
        Ok(())
    }
}

/// Derive the puzzle/non-puzzle sink paths from an `--output` root: a
/// `.json`/`.jsonl` path gets sibling `<stem>.puzzles.jsonl` /
/// `<stem>.nonpuzzles.jsonl` files; anything else is treated as a
/// directory and gets timestamped `<variant>-<unix-millis>.*.jsonl` names.
pub fn derive_sink_paths(root: &Path, chess960: bool, unix_millis: u64) -> SinkPair {
    let is_file_like = matches!(
        root.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonl")
    );

    if is_file_like {
        let parent = root.parent().unwrap_or_else(|| Path::new("."));
        let stem = root.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        SinkPair {
            puzzles: JsonlSink::new(parent.join(format!("{stem}.puzzles.jsonl"))),
            non_puzzles: JsonlSink::new(parent.join(format!("{stem}.nonpuzzles.jsonl"))),
        }
    } else {
        let variant = if chess960 { "chess960" } else { "standard" };
        SinkPair {
            puzzles: JsonlSink::new(root.join(format!("{variant}-{unix_millis}.puzzles.jsonl"))),
            non_puzzles: JsonlSink::new(root.join(format!("{variant}-{unix_millis}.nonpuzzles.jsonl"))),
        }
    }
}
