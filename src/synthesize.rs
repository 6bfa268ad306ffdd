//! Documentation synthesis.
//!
//! Turns chunks into documentation artifacts by calling a [`Generator`].
//!
//! # Stages
//!
//! 1. **Map**: one detailed-documentation job per chunk, plus one summary
//!    job per chunk in hierarchical mode. Jobs run concurrently, at most
//!    `max_concurrency` at a time, and each is retried per the
//!    [`RetryPolicy`].
//! 2. **Barrier**: the reduce stage starts only after every map job has
//!    succeeded or failed.
//! 3. **Reduce** (hierarchical only): successful summaries, in chunk order,
//!    are folded into one combined summary, which is then merged with every
//!    successful detailed document into one combined artifact.
//!
//! A failing job never aborts the run; it becomes a [`GenerationFailure`].

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::GenerationConfig;
use crate::context::{ChunkContext, ContextStores};
use crate::generation::{generate_with_retry, Generator, RetryFailure, RetryPolicy};
use crate::models::{ArtifactKind, Chunk, DocumentationArtifact, GenerationFailure};
use crate::progress::{ProgressEvent, ProgressReporter};

#[derive(Debug, Clone, Copy)]
pub struct SynthesisOptions {
    pub hierarchical: bool,
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
}

impl SynthesisOptions {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            hierarchical: config.hierarchical,
            max_concurrency: config.max_concurrency.max(1),
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// Everything a run produced. Chunk-level entries are ordered by chunk, then
/// by kind; corpus-level entries follow.
#[derive(Debug, Default, Serialize)]
pub struct SynthesisOutput {
    pub artifacts: Vec<DocumentationArtifact>,
    pub failures: Vec<GenerationFailure>,
}

pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    options: SynthesisOptions,
}

struct Job {
    chunk: usize,
    kind: ArtifactKind,
    prompt: String,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>, options: SynthesisOptions) -> Self {
        Self { generator, options }
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    pub async fn run(
        &self,
        chunks: &[Chunk],
        stores: &ContextStores,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> SynthesisOutput {
        let mut output = SynthesisOutput::default();

        let jobs = self.plan_jobs(chunks, stores);
        let total = jobs.len() as u64;
        info!(
            chunks = chunks.len(),
            jobs = total,
            hierarchical = self.options.hierarchical,
            "generating documentation"
        );

        let generator = self.generator.as_ref();
        let policy = &self.options.retry;
        let mut settled: Vec<(Job, Result<String, RetryFailure>)> =
            stream::iter(jobs)
                .map(|job| async move {
                    let result = generate_with_retry(generator, &job.prompt, policy, cancel).await;
                    (job, result)
                })
                .buffer_unordered(self.options.max_concurrency)
                .enumerate()
                .map(|(i, settled)| {
                    progress.report(ProgressEvent::Generating {
                        stage: "chunks".to_string(),
                        n: i as u64 + 1,
                        total,
                    });
                    settled
                })
                .collect()
                .await;

        settled.sort_by_key(|(job, _)| (job.chunk, job.kind));
        for (job, result) in settled {
            let chunk = &chunks[job.chunk];
            match result {
                Ok(text) => output.artifacts.push(DocumentationArtifact {
                    kind: job.kind,
                    chunk: Some(chunk.id()),
                    language: Some(chunk.language.clone()),
                    text,
                }),
                Err(failure) => {
                    warn!(chunk = %chunk.id(), kind = job.kind.label(), cause = %failure.error, "chunk generation failed");
                    output.failures.push(GenerationFailure {
                        kind: job.kind,
                        chunk: Some(chunk.id()),
                        attempts: failure.attempts,
                        cause: failure.error.to_string(),
                    });
                }
            }
        }

        if self.options.hierarchical {
            self.reduce(&mut output, cancel, progress).await;
        }

        output
    }

    fn plan_jobs(&self, chunks: &[Chunk], stores: &ContextStores) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(chunks.len() * 2);
        for (i, chunk) in chunks.iter().enumerate() {
            let ctx = stores.assemble(chunk);
            jobs.push(Job {
                chunk: i,
                kind: ArtifactKind::Detailed,
                prompt: detailed_prompt(chunk, &ctx),
            });
            if self.options.hierarchical {
                jobs.push(Job {
                    chunk: i,
                    kind: ArtifactKind::Summary,
                    prompt: summary_prompt(chunk, &ctx),
                });
            }
        }
        jobs
    }

    async fn reduce(
        &self,
        output: &mut SynthesisOutput,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) {
        let summaries = texts_of(&output.artifacts, ArtifactKind::Summary);
        if summaries.is_empty() {
            output.failures.push(GenerationFailure {
                kind: ArtifactKind::CombinedSummary,
                chunk: None,
                attempts: 0,
                cause: "no chunk summaries available".to_string(),
            });
            return;
        }

        let prompt = combined_summary_prompt(&summaries);
        let Some(high_level) = self
            .corpus_step(output, ArtifactKind::CombinedSummary, &prompt, cancel, progress)
            .await
        else {
            return;
        };

        let detailed = texts_of(&output.artifacts, ArtifactKind::Detailed);
        let prompt = combine_prompt(&high_level, &detailed);
        self.corpus_step(output, ArtifactKind::Combined, &prompt, cancel, progress)
            .await;
    }

    /// Run one corpus-level request, recording its artifact or failure.
    async fn corpus_step(
        &self,
        output: &mut SynthesisOutput,
        kind: ArtifactKind,
        prompt: &str,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Option<String> {
        let result =
            generate_with_retry(self.generator.as_ref(), prompt, &self.options.retry, cancel).await;
        progress.report(ProgressEvent::Generating {
            stage: kind.label().to_string(),
            n: 1,
            total: 1,
        });

        match result {
            Ok(text) => {
                output.artifacts.push(DocumentationArtifact {
                    kind,
                    chunk: None,
                    language: None,
                    text: text.clone(),
                });
                Some(text)
            }
            Err(failure) => {
                warn!(kind = kind.label(), cause = %failure.error, "corpus generation step failed");
                output.failures.push(GenerationFailure {
                    kind,
                    chunk: None,
                    attempts: failure.attempts,
                    cause: failure.error.to_string(),
                });
                None
            }
        }
    }
}

fn texts_of(artifacts: &[DocumentationArtifact], kind: ArtifactKind) -> Vec<&str> {
    artifacts
        .iter()
        .filter(|a| a.kind == kind)
        .map(|a| a.text.as_str())
        .collect()
}

fn chunk_prompt(instruction: &str, chunk: &Chunk, ctx: &ChunkContext<'_>) -> String {
    format!(
        "{} the following {} code chunk:\n\n{}\n\nFile Metadata: {}\nDirectory Structure: {}\n",
        instruction,
        chunk.language,
        chunk.content,
        ctx.metadata_json(),
        ctx.directory_json()
    )
}

pub fn detailed_prompt(chunk: &Chunk, ctx: &ChunkContext<'_>) -> String {
    chunk_prompt("Generate detailed documentation for", chunk, ctx)
}

pub fn summary_prompt(chunk: &Chunk, ctx: &ChunkContext<'_>) -> String {
    chunk_prompt("Summarize", chunk, ctx)
}

pub fn combined_summary_prompt(summaries: &[&str]) -> String {
    format!(
        "Generate a high-level summary for the following code summaries:\n\n{}",
        summaries.join("\n\n")
    )
}

pub fn combine_prompt(high_level: &str, detailed: &[&str]) -> String {
    format!(
        "Combine the following high-level summary with the detailed documentation:\n\nHigh-level summary:\n{}\n\nDetailed documentation:\n{}",
        high_level,
        detailed.join("\n\n")
    )
}
