//! Directory structure store (`file_structure.json`).
//!
//! A [`DirectoryNode`] maps each entry name to `null` for a file or to a
//! nested node for a subdirectory. The top-level node stands for the
//! ingestion root.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

use crate::classify::{to_slash_path, Classifier};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryNode {
    entries: BTreeMap<String, Option<DirectoryNode>>,
}

impl DirectoryNode {
    pub fn entries(&self) -> &BTreeMap<String, Option<DirectoryNode>> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a tree from `/`-separated file paths. Intermediate segments
    /// become directories; the last segment becomes a file.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = DirectoryNode::default();
        for path in paths {
            let segments: Vec<&str> = path.as_ref().split('/').filter(|s| !s.is_empty()).collect();
            let Some((file, dirs)) = segments.split_last() else {
                continue;
            };
            let node = root.ensure_dir(dirs);
            node.entries.entry((*file).to_string()).or_insert(None);
        }
        root
    }

    /// Resolve the node for a `/`-separated directory path. The empty path
    /// is the root itself. Returns `None` if any segment is missing or is a
    /// file.
    pub fn lookup(&self, dir: &str) -> Option<&DirectoryNode> {
        dir.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.entries.get(segment)?.as_ref())
    }

    fn ensure_dir(&mut self, segments: &[&str]) -> &mut DirectoryNode {
        let mut node = self;
        for segment in segments {
            let slot = node
                .entries
                .entry((*segment).to_string())
                .or_insert_with(|| Some(DirectoryNode::default()));
            // A path component seen earlier as a file is promoted to a directory.
            node = slot.get_or_insert_with(DirectoryNode::default);
        }
        node
    }
}

/// Walk a local tree into a [`DirectoryNode`], pruning the classifier's
/// excluded directories.
pub fn scan_structure(root: &Path, classifier: &Classifier) -> Result<DirectoryNode> {
    if !root.is_dir() {
        bail!("Structure root does not exist or is not a directory: {}", root.display());
    }

    let mut tree = DirectoryNode::default();
    let walker = WalkDir::new(root).min_depth(1).into_iter().filter_entry(|e| {
        !e.file_type().is_dir()
            || !e
                .file_name()
                .to_str()
                .is_some_and(|name| classifier.is_excluded_directory(name))
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping entry during structure scan");
                continue;
            }
        };

        let rel = to_slash_path(entry.path().strip_prefix(root).unwrap_or(entry.path()));
        let segments: Vec<&str> = rel.split('/').collect();
        if entry.file_type().is_dir() {
            tree.ensure_dir(&segments);
        } else if let Some((file, dirs)) = segments.split_last() {
            tree.ensure_dir(dirs)
                .entries
                .entry((*file).to_string())
                .or_insert(None);
        }
    }

    Ok(tree)
}

pub fn save_structure(tree: &DirectoryNode, path: &Path) -> Result<()> {
    crate::persist::write_json(path, tree)
}

pub fn load_structure(path: &Path) -> Result<DirectoryNode> {
    crate::persist::read_json(path)
        .with_context(|| format!("Failed to load structure store: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use tempfile::TempDir;

    fn classifier() -> Classifier {
        Classifier::new(&ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn scan_builds_nested_tree() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src/util")).unwrap();
        std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
        std::fs::write(tmp.path().join("src/main.py"), "").unwrap();
        std::fs::write(tmp.path().join("src/util/io.py"), "").unwrap();
        std::fs::write(tmp.path().join("README.md"), "").unwrap();

        let tree = scan_structure(tmp.path(), &classifier()).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "README.md": null,
                "empty": {},
                "src": { "main.py": null, "util": { "io.py": null } }
            })
        );
    }

    #[test]
    fn scan_prunes_excluded_directories() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".git/objects")).unwrap();
        std::fs::write(tmp.path().join(".git/HEAD"), "ref").unwrap();
        std::fs::write(tmp.path().join("a.py"), "").unwrap();

        let tree = scan_structure(tmp.path(), &classifier()).unwrap();
        assert!(tree.entries().contains_key("a.py"));
        assert!(!tree.entries().contains_key(".git"));
    }

    #[test]
    fn lookup_walks_segments() {
        let tree = DirectoryNode::from_paths(["src/util/io.py", "src/main.py", "top.py"]);

        assert_eq!(tree.lookup("").unwrap(), &tree);
        let src = tree.lookup("src").unwrap();
        assert!(src.entries().contains_key("main.py"));
        assert!(tree.lookup("src/util").unwrap().entries().contains_key("io.py"));
        assert!(tree.lookup("src/missing").is_none());
        // files are not directories
        assert!(tree.lookup("top.py").is_none());
    }

    #[test]
    fn save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file_structure.json");
        let tree = DirectoryNode::from_paths(["a/b.rs", "c.rs"]);

        save_structure(&tree, &path).unwrap();
        assert_eq!(load_structure(&path).unwrap(), tree);
    }
}
