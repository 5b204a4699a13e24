//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code (wait on I/O instead)
//! - No process-wide mutable state (every panel owns its own state machine)
//! - No unwrap()/expect() in the core library's production code
//!
//! The helpers below locate the workspace's source trees and strip comments
//! and test modules so the scans only see production code.

use std::fs;
use std::path::{Path, PathBuf};

/// Source trees of production crates, relative to the workspace root
pub const PRODUCTION_TREES: &[&str] = &["ragchat/core/src", "ragchat/cli/src"];

/// The core library's source tree
pub const CORE_TREE: &str = "ragchat/core/src";

/// A forbidden pattern found in production code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File the pattern was found in
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

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// All `.rs` files below `tree` (relative to the workspace root)
#[must_use]
pub fn rust_files(tree: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(tree);
    if !path.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Production lines of a source file: `(line_number, code)` pairs
///
/// Everything from the first `#[cfg(test)]` on is treated as test code, and
/// comment-only lines and trailing `//` comments are dropped.
#[must_use]
pub fn production_lines(content: &str) -> Vec<(usize, String)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .filter_map(|(idx, line)| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("//") {
                return None;
            }
            let code = line.split("//").next().unwrap_or(line);
            Some((idx + 1, code.to_string()))
        })
        .collect()
}

/// Scan every file of `trees` for lines matching `is_violation`
#[must_use]
pub fn scan<F>(trees: &[&str], is_violation: F) -> Vec<Violation>
where
    F: Fn(&str) -> bool,
{
    let mut violations = Vec::new();
    for tree in trees {
        for path in rust_files(tree) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for (line, code) in production_lines(&content) {
                if is_violation(&code) {
                    violations.push(Violation {
                        path: path.clone(),
                        line,
                        text: code.trim().to_string(),
                    });
                }
            }
        }
    }
    violations
}

/// Panic with a readable report if `violations` is not empty
pub fn assert_clean(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) of: {rule}\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = "fn a() {}\n// x.unwrap()\nlet y = 1; // z.unwrap()\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(source);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].0, 3);
        assert!(!lines[1].1.contains("unwrap"));
    }

    #[test]
    fn test_workspace_trees_exist() {
        assert!(!rust_files(CORE_TREE).is_empty());
    }
}
