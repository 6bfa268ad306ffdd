//! Per-file metadata store (`file_metadata.json`).
//!
//! Maps a file path, in the same relative `/`-separated form used by
//! [`SourceFile::path`](crate::models::SourceFile), to its size and last
//! modification time. Lookups of unknown paths return `None`; the context
//! assembler renders that as an empty object.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

use crate::classify::{to_slash_path, Classifier};
use crate::connector_s3::S3Object;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore {
    entries: BTreeMap<String, FileMetadata>,
}

impl MetadataStore {
    pub fn get(&self, path: &str) -> Option<&FileMetadata> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, metadata: FileMetadata) {
        self.entries.insert(path.into(), metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the store from an object listing. Keys are used verbatim.
    pub fn from_objects(objects: &[S3Object]) -> Self {
        let entries = objects
            .iter()
            .map(|obj| {
                (
                    obj.key.clone(),
                    FileMetadata {
                        size: obj.size,
                        last_modified: obj.last_modified,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

/// Walk a local tree and record size and mtime for every file outside the
/// classifier's excluded directories. Entries that cannot be stat'ed are
/// logged and left out.
pub fn scan_metadata(root: &Path, classifier: &Classifier) -> Result<MetadataStore> {
    if !root.is_dir() {
        bail!("Metadata root does not exist or is not a directory: {}", root.display());
    }

    let mut store = MetadataStore::default();
    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        e.depth() == 0
            || !e.file_type().is_dir()
            || !e
                .file_name()
                .to_str()
                .is_some_and(|name| classifier.is_excluded_directory(name))
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping entry during metadata scan");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = to_slash_path(entry.path().strip_prefix(root).unwrap_or(entry.path()));
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %rel, error = %e, "failed to read file metadata");
                continue;
            }
        };
        let last_modified = match meta.modified() {
            Ok(mtime) => DateTime::<Utc>::from(mtime),
            Err(e) => {
                warn!(path = %rel, error = %e, "modification time unavailable");
                continue;
            }
        };

        store.insert(
            rel,
            FileMetadata {
                size: meta.len(),
                last_modified,
            },
        );
    }

    Ok(store)
}

pub fn save_metadata(store: &MetadataStore, path: &Path) -> Result<()> {
    crate::persist::write_json(path, store)
}

pub fn load_metadata(path: &Path) -> Result<MetadataStore> {
    crate::persist::read_json(path)
        .with_context(|| format!("Failed to load metadata store: {}", path.display()))
}
