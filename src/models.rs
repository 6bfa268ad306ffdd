//! Core data models used throughout code-scribe.
//!
//! These types represent the source files, chunks, and documentation
//! artifacts that flow through the ingestion and synthesis pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A file accepted by the classifier.
///
/// `path` is relative to the ingestion root and `/`-separated (for object
/// storage sources it is the object key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Label identifying a file's programming language.
///
/// Serialized as the bare label string; the sentinel serializes as
/// `"Unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LanguageLabel {
    Known(String),
    Unknown,
}

const UNKNOWN_LABEL: &str = "Unknown";

impl LanguageLabel {
    pub fn known(name: impl Into<String>) -> Self {
        LanguageLabel::Known(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            LanguageLabel::Known(name) => name,
            LanguageLabel::Unknown => UNKNOWN_LABEL,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, LanguageLabel::Unknown)
    }
}

impl From<String> for LanguageLabel {
    fn from(value: String) -> Self {
        if value == UNKNOWN_LABEL {
            LanguageLabel::Unknown
        } else {
            LanguageLabel::Known(value)
        }
    }
}

impl From<LanguageLabel> for String {
    fn from(value: LanguageLabel) -> Self {
        match value {
            LanguageLabel::Known(name) => name,
            LanguageLabel::Unknown => UNKNOWN_LABEL.to_string(),
        }
    }
}

impl fmt::Display for LanguageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural elements recognized in one file by one language's extractor.
///
/// A `None` field means the extractor has no rule for that element kind
/// (Go has no classes, only Python has docstrings). `Some(vec![])` means
/// the rule ran and found nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSet {
    pub functions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<String>>,
    pub comments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstrings: Option<Vec<String>>,
}

/// A bounded slice of a file's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub path: String,
    pub language: LanguageLabel,
    pub content: String,
    pub sequence_index: usize,
}

impl Chunk {
    pub fn id(&self) -> ChunkId {
        ChunkId {
            path: self.path.clone(),
            sequence_index: self.sequence_index,
        }
    }
}

/// Identity of a chunk, preserved in artifacts and failure records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub path: String,
    pub sequence_index: usize,
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path, self.sequence_index)
    }
}

/// Which generation step produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Per-chunk detailed documentation.
    Detailed,
    /// Per-chunk short summary (hierarchical mode only).
    Summary,
    /// Fold of all chunk summaries.
    CombinedSummary,
    /// Combined summary merged with every detailed document.
    Combined,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Detailed => "detailed",
            ArtifactKind::Summary => "summary",
            ArtifactKind::CombinedSummary => "combined_summary",
            ArtifactKind::Combined => "combined",
        }
    }
}

/// Generated documentation text.
///
/// Chunk-level artifacts carry the originating chunk; corpus-level ones
/// (`CombinedSummary`, `Combined`) have `chunk: None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationArtifact {
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<ChunkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageLabel>,
    pub text: String,
}

/// A generation step that failed definitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<ChunkId>,
    pub attempts: u32,
    pub cause: String,
}
