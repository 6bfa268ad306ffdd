//! Per-chunk context assembly.
//!
//! Pairs a chunk with its file's metadata and the directory node that
//! contains the file. Missing entries serialize as `{}` so prompt text stays
//! well-formed.

use crate::metadata::{FileMetadata, MetadataStore};
use crate::models::Chunk;
use crate::structure::DirectoryNode;

const EMPTY_OBJECT: &str = "{}";

/// Read-only lookup stores shared by every generation job.
#[derive(Debug, Clone, Default)]
pub struct ContextStores {
    pub metadata: MetadataStore,
    pub structure: DirectoryNode,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkContext<'a> {
    pub metadata: Option<&'a FileMetadata>,
    pub directory: Option<&'a DirectoryNode>,
}

impl ContextStores {
    pub fn new(metadata: MetadataStore, structure: DirectoryNode) -> Self {
        Self { metadata, structure }
    }

    pub fn assemble(&self, chunk: &Chunk) -> ChunkContext<'_> {
        ChunkContext {
            metadata: self.metadata.get(&chunk.path),
            directory: self.structure.lookup(parent_dir(&chunk.path)),
        }
    }
}

impl ChunkContext<'_> {
    pub fn metadata_json(&self) -> String {
        render(self.metadata)
    }

    pub fn directory_json(&self) -> String {
        render(self.directory)
    }
}

fn render<T: serde::Serialize>(value: Option<&T>) -> String {
    value
        .and_then(|v| serde_json::to_string_pretty(v).ok())
        .unwrap_or_else(|| EMPTY_OBJECT.to_string())
}

/// `"src/util/io.py"` -> `"src/util"`, `"top.py"` -> `""`.
fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}
