//! Protocol descriptor: static configuration describing
//! how to spawn and talk to one engine binary. Loaded from a TOML file
//! rather than reflected over at runtime, so a new engine only needs a
//! descriptor, never a code change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Declarative grammar fragment describing how to pull depth/nodes/score/
/// bound/pv/multipv out of one info line. Kept data-only: the session
/// (`crate::engine::session`) interprets it, this type just carries it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InfoGrammar {
    #[serde(default = "default_depth_key")]
    pub depth_key: String,
    #[serde(default = "default_nodes_key")]
    pub nodes_key: String,
    #[serde(default = "default_score_key")]
    pub score_key: String,
    #[serde(default = "default_multipv_key")]
    pub multipv_key: String,
    #[serde(default = "default_pv_key")]
    pub pv_key: String,
}

fn default_depth_key() -> String {
    "depth".to_string()
}
fn default_nodes_key() -> String {
    "nodes".to_string()
}
fn default_score_key() -> String {
    "score".to_string()
}
fn default_multipv_key() -> String {
    "multipv".to_string()
}
fn default_pv_key() -> String {
    "pv".to_string()
}

/// Immutable configuration value consumed at session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDescriptor {
    pub path: PathBuf,
    #[serde(default)]
    pub init: Vec<String>,
    pub ready_marker: String,
    #[serde(default)]
    pub option_set: HashMap<String, String>,
    pub go_command: String,
    pub stop_command: String,
    pub quit_command: String,
    #[serde(default = "default_info_prefix")]
    pub info_prefix: String,
    #[serde(default = "default_bestmove_prefix")]
    pub bestmove_prefix: String,
    #[serde(default)]
    pub info_grammar: InfoGrammar,
}

fn default_info_prefix() -> String {
    "info".to_string()
}
fn default_bestmove_prefix() -> String {
    "bestmove".to_string()
}

impl ProtocolDescriptor {
    /// Parse a descriptor from TOML text.
    pub fn from_toml(text: &str) -> Result<ProtocolDescriptor> {
        let descriptor: ProtocolDescriptor = toml::from_str(text)?;
        Ok(descriptor)
    }

    /// Load a descriptor from a file on disk.
    pub fn load(path: &Path) -> Result<ProtocolDescriptor> {
        let text = std::fs::read_to_string(path)?;
        ProtocolDescriptor::from_toml(&text)
    }

    /// Check mandatory fields are non-empty and that `path` resolves to an
    /// executable. Reported but never aborts the process by itself; callers
    /// decide.
    pub fn validate(&self) -> Result<()> {
        if self.ready_marker.is_empty() {
            return Err(Error::MissingDescriptorField("readyMarker"));
        }
        if self.go_command.is_empty() {
            return Err(Error::MissingDescriptorField("goCommand"));
        }
        if self.stop_command.is_empty() {
            return Err(Error::MissingDescriptorField("stopCommand"));
        }
        if self.quit_command.is_empty() {
            return Err(Error::MissingDescriptorField("quitCommand"));
        }
        let resolved = self.resolve_path();
        let is_executable = resolved.is_file() && is_executable(&resolved);
        if !is_executable {
            return Err(Error::DescriptorNotExecutable(resolved));
        }
        Ok(())
    }

    /// Resolve `path` against `PATH` when it has no directory component;
    /// an absolute or multi-component path is returned unchanged.
    pub fn resolve_path(&self) -> PathBuf {
        if self.path.components().count() > 1 || self.path.is_absolute() {
            return self.path.clone();
        }
        if let Ok(path_var) = std::env::var("PATH") {
            for dir in std::env::split_paths(&path_var) {
                let candidate = dir.join(&self.path);
                if candidate.is_file() {
                    return candidate;
                }
            }
        }
        self.path.clone()
    }

    /// Instantiate `goCommand`'s `{nodes}`/`{movetime_ms}` placeholders.
    pub fn render_go(&self, nodes: u64, movetime_ms: u64) -> String {
        self.go_command
            .replace("{nodes}", &nodes.to_string())
            .replace("{movetime_ms}", &movetime_ms.to_string())
    }

    /// One line per configured option, ready to send after the handshake.
    pub fn render_option_set(&self) -> Vec<String> {
        self.option_set
            .iter()
            .map(|(name, value)| format!("setoption name {name} value {value}"))
            .collect()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SAMPLE: &str = r#"
        path = "/usr/bin/true"
        init = ["uci"]
        readyMarker = "uciok"
        goCommand = "go nodes {nodes} movetime {movetime_ms}"
        stopCommand = "stop"
        quitCommand = "quit"

        [optionSet]
        Threads = "1"
    "#;

    #[test]
    fn parses_required_fields() {
        let d = ProtocolDescriptor::from_toml(SAMPLE).unwrap();
        assert_eq!(d.ready_marker, "uciok");
        assert_eq!(d.option_set.get("Threads").map(String::as_str), Some("1"));
    }

    #[test]
    fn render_go_substitutes_placeholders() {
        let d = ProtocolDescriptor::from_toml(SAMPLE).unwrap();
        assert_eq!(d.render_go(100_000, 2000), "go nodes 100000 movetime 2000");
    }

    #[test]
    fn validate_rejects_missing_ready_marker() {
        let toml = SAMPLE.replace("uciok", "");
        let d = ProtocolDescriptor::from_toml(&toml).unwrap();
        assert!(d.validate().is_err());
    }

    #[test]
    fn validate_flags_nonexecutable_path() {
        let toml = SAMPLE.replace("/usr/bin/true", "/nonexistent/engine-binary");
        let d = ProtocolDescriptor::from_toml(&toml).unwrap();
        assert_matches!(d.validate(), Err(Error::DescriptorNotExecutable(_)));
    }
}
