//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! of the canvas core:
//! - No sleep() calls
//! - No network I/O and no async runtime
//! - File system access only in the configuration module
//!
//! These tests are designed to catch violations early in the development cycle.
//! The helpers below are shared by the test files in `tests/`.

use std::path::{Path, PathBuf};

/// A forbidden pattern found in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the pattern
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Root of the workspace, derived from this package's manifest dir
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Production source directory of the canvas core
#[must_use]
pub fn core_src() -> PathBuf {
    workspace_root().join("canvas/core/src")
}

/// Scan every `.rs` file under `dir` for lines containing any of `patterns`
///
/// Comment lines are ignored, and scanning of a file stops at its
/// `#[cfg(test)]` module. `allow` decides per file whether it is exempt.
pub fn scan<F>(dir: &Path, patterns: &[&str], allow: F) -> Vec<Violation>
where
    F: Fn(&Path) -> bool,
{
    let mut violations = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("rs") || allow(path) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("#[cfg(test)]") {
                break;
            }
            if trimmed.starts_with("//") {
                continue;
            }
            let code = line.split("//").next().unwrap_or(line);
            if patterns.iter().any(|p| code.contains(p)) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    text: line.trim().to_string(),
                });
            }
        }
    }

    violations
}
