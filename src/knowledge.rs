//! Knowledge source loading
//!
//! The business documents are plain text injected verbatim into the system
//! prompt. Nothing here parses or indexes them.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Read every existing file in `paths` into one context string
///
/// Each file is prefixed with `[file name]`. Missing files are skipped; a
/// file that exists but cannot be read contributes an error marker so the
/// gap is visible in the prompt.
pub fn load_knowledge<P: AsRef<Path>>(paths: &[P]) -> String {
    let mut parts = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Knowledge file not found, skipping");
            continue;
        }

        let label = display_name(path);
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), bytes = text.len(), "Loaded knowledge file");
                parts.push(format!("[{}]\n{}", label, text.trim()));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read knowledge file");
                parts.push(format!("[{}] <error reading file: {}>", label, e));
            }
        }
    }

    parts.join("\n\n").trim().to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_knowledge_joins_files() {
        let dir = tempfile::tempdir().unwrap();
        let summary = dir.path().join("business_summary.txt");
        let about = dir.path().join("about.md");
        std::fs::write(&summary, "We build KNN models for SMBs.\n").unwrap();
        std::fs::write(&about, "Founded in Beirut.").unwrap();

        let text = load_knowledge(&[summary, dir.path().join("missing.txt"), about]);
        assert_eq!(
            text,
            "[business_summary.txt]\nWe build KNN models for SMBs.\n\n[about.md]\nFounded in Beirut."
        );
    }

    #[test]
    fn test_unreadable_file_leaves_marker() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists but cannot be read as a string
        let text = load_knowledge(&[dir.path().to_path_buf()]);
        assert!(text.contains("<error reading file:"));
    }

    #[test]
    fn test_no_files_is_empty() {
        let paths: Vec<PathBuf> = Vec::new();
        assert_eq!(load_knowledge(&paths), "");
    }
}
