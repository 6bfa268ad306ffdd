//! Source-file classification.
//!
//! Decides whether a file is "code" using three independent families of
//! checks, any one of which rejects the file:
//!
//! | Check | Rejects when |
//! |-------|--------------|
//! | extension | the extension is in the non-code set (case-insensitive) |
//! | directory | any path segment equals a non-code directory name |
//! | glob | the relative path matches a configured exclude glob |
//! | content | bytes are not UTF-8, or the first line starts with `#!` / `<?xml` |
//!
//! Directory names match whole segments only: `venvx/app.py` is kept even
//! though `venv` is excluded.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::config::ClassifierConfig;
use crate::models::SourceFile;

/// Extensions of compiled artifacts, binaries, and logs.
pub const NON_CODE_EXTENSIONS: &[&str] = &[
    ".pyc", ".pyo", ".exe", ".dll", ".so", ".dylib", ".bin", ".dat", ".log",
];

/// Directory names whose contents are never documented.
///
/// `_pycache_` is kept alongside `__pycache__` for configs written against
/// the older name.
pub const NON_CODE_DIRECTORIES: &[&str] = &[
    "venv",
    "node_modules",
    "__pycache__",
    "_pycache_",
    ".git",
    ".idea",
];

/// Why a file was left out of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ExcludedExtension,
    ExcludedDirectory,
    ExcludedGlob,
    Shebang,
    XmlProlog,
    NotUtf8,
    Unreadable,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::ExcludedExtension => "excluded_extension",
            SkipReason::ExcludedDirectory => "excluded_directory",
            SkipReason::ExcludedGlob => "excluded_glob",
            SkipReason::Shebang => "shebang",
            SkipReason::XmlProlog => "xml_prolog",
            SkipReason::NotUtf8 => "not_utf8",
            SkipReason::Unreadable => "unreadable",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A file the classifier rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

pub struct Classifier {
    extensions: HashSet<String>,
    directories: HashSet<String>,
    exclude_globs: GlobSet,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let extensions = NON_CODE_EXTENSIONS
            .iter()
            .map(|e| e.to_string())
            .chain(config.extra_extensions.iter().map(|e| normalize_extension(e)))
            .map(|e| e.to_ascii_lowercase())
            .collect();

        let directories = NON_CODE_DIRECTORIES
            .iter()
            .map(|d| d.to_string())
            .chain(config.extra_directories.iter().cloned())
            .collect();

        Ok(Self {
            extensions,
            directories,
            exclude_globs: build_globset(&config.exclude_globs)?,
        })
    }

    /// Whether a directory name is in the excluded set.
    pub fn is_excluded_directory(&self, name: &str) -> bool {
        self.directories.contains(name)
    }

    /// Path-only checks. `relative_path` is `/`-separated and relative to
    /// the ingestion root.
    pub fn check_path(&self, relative_path: &str) -> Option<SkipReason> {
        if let Some(ext) = Path::new(relative_path).extension() {
            let ext = format!(".{}", ext.to_string_lossy().to_ascii_lowercase());
            if self.extensions.contains(&ext) {
                return Some(SkipReason::ExcludedExtension);
            }
        }

        if relative_path
            .split('/')
            .any(|segment| self.directories.contains(segment))
        {
            return Some(SkipReason::ExcludedDirectory);
        }

        if self.exclude_globs.is_match(relative_path) {
            return Some(SkipReason::ExcludedGlob);
        }

        None
    }

    /// Run the content sniff and decode raw bytes into a [`SourceFile`].
    pub fn classify_bytes(
        &self,
        relative_path: &str,
        bytes: Vec<u8>,
    ) -> std::result::Result<SourceFile, SkipReason> {
        let content = String::from_utf8(bytes).map_err(|_| SkipReason::NotUtf8)?;
        if let Some(reason) = sniff_content(&content) {
            return Err(reason);
        }
        Ok(SourceFile::new(relative_path, content))
    }
}

/// Reject scripts and XML documents by their first line.
pub fn sniff_content(content: &str) -> Option<SkipReason> {
    let first_line = content.lines().next().unwrap_or("").trim();
    if first_line.starts_with("#!") {
        Some(SkipReason::Shebang)
    } else if first_line.starts_with("<?xml") {
        Some(SkipReason::XmlProlog)
    } else {
        None
    }
}

/// Join a relative path's components with `/` regardless of platform.
pub fn to_slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_extension(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
