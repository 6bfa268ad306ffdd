//! Run report.
//!
//! Counts of what a run ingested, skipped, chunked and generated, printed at
//! the end of `scribe document` and embedded in the documentation output.
//! Every generation failure is listed with its chunk and cause.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::classify::SkippedFile;
use crate::models::{ChunkId, GenerationFailure, LanguageLabel};
use crate::organize::OrganizedCorpus;
use crate::synthesize::SynthesisOutput;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub files_ingested: usize,
    /// Skipped file counts keyed by reason label.
    pub skipped: BTreeMap<String, usize>,
    /// File counts per detected language.
    pub languages: BTreeMap<String, usize>,
    /// Files whose language has no element extractor, per language.
    pub no_extractor: BTreeMap<String, usize>,
    pub chunks: usize,
    pub artifacts: usize,
    pub failures: usize,
}

impl RunReport {
    pub fn new(corpus: &OrganizedCorpus, skipped: &[SkippedFile]) -> Self {
        let mut report = RunReport {
            files_ingested: corpus.file_count(),
            ..RunReport::default()
        };
        for file in skipped {
            *report.skipped.entry(file.reason.label().to_string()).or_default() += 1;
        }
        for (label, files) in corpus.groups() {
            report.languages.insert(label.to_string(), files.len());
        }
        report
    }

    pub fn record_no_extractor(&mut self, label: &LanguageLabel) {
        *self.no_extractor.entry(label.to_string()).or_default() += 1;
    }

    pub fn record_synthesis(&mut self, output: &SynthesisOutput) {
        self.artifacts = output.artifacts.len();
        self.failures = output.failures.len();
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn print(&self) {
        println!("  files ingested: {}", self.files_ingested);
        println!("  files skipped: {}", self.skipped_total());
        for (reason, count) in &self.skipped {
            println!("    {:<22} {:>6}", reason, count);
        }
        println!("  languages: {}", self.languages.len());
        for (label, count) in &self.languages {
            println!("    {:<22} {:>6}", label, count);
        }
        if !self.no_extractor.is_empty() {
            println!("  no element extractor:");
            for (label, count) in &self.no_extractor {
                println!("    {:<22} {:>6}", label, count);
            }
        }
        println!("  chunks: {}", self.chunks);
        println!("  artifacts: {}", self.artifacts);
        println!("  failures: {}", self.failures);
    }
}

/// `kind  path#index (or corpus)  attempts  cause` for one failed step.
pub fn failure_line(failure: &GenerationFailure) -> String {
    let target = failure
        .chunk
        .as_ref()
        .map(ChunkId::to_string)
        .unwrap_or_else(|| "corpus".to_string());
    format!(
        "{:<16} {} after {} attempt(s): {}",
        failure.kind.label(),
        target,
        failure.attempts,
        failure.cause
    )
}

pub fn print_failures(failures: &[GenerationFailure]) {
    for failure in failures {
        println!("    {}", failure_line(failure));
    }
}

/// Final status line. A run with failures is never reported as `ok`.
pub fn completion_status(cancelled: bool, failures: usize) -> String {
    match (cancelled, failures) {
        (true, 0) => "cancelled".to_string(),
        (true, n) => format!("cancelled with {} generation failures", n),
        (false, 0) => "ok".to_string(),
        (false, n) => format!("completed with {} generation failures", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::SkipReason;
    use crate::language::LanguageDetector;
    use crate::models::{ArtifactKind, SourceFile};
    use crate::organize::organize_files;

    #[test]
    fn counts_skips_and_languages() {
        let corpus = organize_files(
            vec![
                SourceFile::new("a.py", "x = 1\n"),
                SourceFile::new("b.py", "y = 2\n"),
                SourceFile::new("main.go", "package main\n"),
            ],
            &LanguageDetector::new(),
        );
        let skipped = vec![
            SkippedFile {
                path: "a.pyc".into(),
                reason: SkipReason::ExcludedExtension,
            },
            SkippedFile {
                path: "venv/b.py".into(),
                reason: SkipReason::ExcludedDirectory,
            },
            SkippedFile {
                path: "c.md".into(),
                reason: SkipReason::ExcludedExtension,
            },
        ];

        let mut report = RunReport::new(&corpus, &skipped);
        report.record_no_extractor(&LanguageLabel::Unknown);
        report.record_no_extractor(&LanguageLabel::Unknown);

        assert_eq!(report.files_ingested, 3);
        assert_eq!(report.skipped_total(), 3);
        assert_eq!(report.skipped[SkipReason::ExcludedExtension.label()], 2);
        assert_eq!(report.languages["Python"], 2);
        assert_eq!(report.languages["Go"], 1);
        assert_eq!(report.no_extractor["Unknown"], 2);
    }

    #[test]
    fn failure_lines_name_chunk_and_cause() {
        let chunk_failure = GenerationFailure {
            kind: ArtifactKind::Detailed,
            chunk: Some(ChunkId {
                path: "src/big.py".into(),
                sequence_index: 3,
            }),
            attempts: 3,
            cause: "service returned HTTP 503: busy".into(),
        };
        let line = failure_line(&chunk_failure);
        assert!(line.starts_with("detailed"));
        assert!(line.contains("src/big.py#3 after 3 attempt(s): service returned HTTP 503: busy"));

        let corpus_failure = GenerationFailure {
            kind: ArtifactKind::CombinedSummary,
            chunk: None,
            attempts: 0,
            cause: "no chunk summaries to combine".into(),
        };
        assert!(failure_line(&corpus_failure).contains("corpus after 0 attempt(s)"));
    }

    #[test]
    fn partial_runs_are_not_ok() {
        assert_eq!(completion_status(false, 0), "ok");
        assert_eq!(completion_status(false, 2), "completed with 2 generation failures");
        assert_eq!(completion_status(true, 0), "cancelled");
        assert_eq!(completion_status(true, 1), "cancelled with 1 generation failures");
    }
}
