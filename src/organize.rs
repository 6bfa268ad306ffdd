//! Corpus organization.
//!
//! Groups classified files by detected language. Snapshots are JSON maps of
//! `label -> [[path, content], ...]`.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::language::LanguageDetector;
use crate::models::{LanguageLabel, SourceFile};

/// Files grouped by language label. Groups are ordered by label; files keep
/// their input order within a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizedCorpus {
    groups: BTreeMap<LanguageLabel, Vec<SourceFile>>,
}

impl OrganizedCorpus {
    pub fn groups(&self) -> impl Iterator<Item = (&LanguageLabel, &[SourceFile])> {
        self.groups.iter().map(|(label, files)| (label, files.as_slice()))
    }

    pub fn files(&self, label: &LanguageLabel) -> &[SourceFile] {
        self.groups.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn file_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn language_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn push(&mut self, label: LanguageLabel, file: SourceFile) {
        self.groups.entry(label).or_default().push(file);
    }
}

/// Detect each file's language and group the files by it.
pub fn organize_files(files: Vec<SourceFile>, detector: &LanguageDetector) -> OrganizedCorpus {
    let mut corpus = OrganizedCorpus::default();
    for file in files {
        let label = detector.detect(&file.path, &file.content);
        corpus.push(label, file);
    }
    corpus
}

pub fn save_corpus(corpus: &OrganizedCorpus, path: &Path) -> Result<()> {
    let snapshot: BTreeMap<&LanguageLabel, Vec<(&str, &str)>> = corpus
        .groups
        .iter()
        .map(|(label, files)| {
            let pairs = files
                .iter()
                .map(|f| (f.path.as_str(), f.content.as_str()))
                .collect();
            (label, pairs)
        })
        .collect();

    crate::persist::write_json(path, &snapshot)
}

pub fn load_corpus(path: &Path) -> Result<OrganizedCorpus> {
    let snapshot: BTreeMap<LanguageLabel, Vec<(String, String)>> = crate::persist::read_json(path)
        .with_context(|| format!("Failed to load corpus snapshot: {}", path.display()))?;

    let groups = snapshot
        .into_iter()
        .map(|(label, pairs)| {
            let files = pairs
                .into_iter()
                .map(|(path, content)| SourceFile { path, content })
                .collect();
            (label, files)
        })
        .collect();

    Ok(OrganizedCorpus { groups })
}
