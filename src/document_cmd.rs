//! `scribe document`: the full pipeline from source to documentation.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chunk::collect_chunks;
use crate::classify::Classifier;
use crate::config::Config;
use crate::context::ContextStores;
use crate::generation::create_generator;
use crate::ingest::{self, extract_corpus};
use crate::language::LanguageDetector;
use crate::metadata::{self, MetadataStore};
use crate::models::{DocumentationArtifact, ElementSet, GenerationFailure};
use crate::organize;
use crate::progress::ProgressMode;
use crate::report::{self, RunReport};
use crate::structure::{self, DirectoryNode};
use crate::synthesize::{SynthesisOptions, Synthesizer};

pub const DEFAULT_DOCUMENTATION_FILE: &str = "documentation.json";

/// Shape of the documentation output file.
#[derive(Debug, Serialize)]
pub struct DocumentationOutput<'a> {
    pub model: &'a str,
    pub hierarchical: bool,
    pub artifacts: &'a [DocumentationArtifact],
    pub failures: &'a [GenerationFailure],
    pub elements: &'a BTreeMap<String, ElementSet>,
    pub report: &'a RunReport,
}

/// Flags of `scribe document`.
#[derive(Debug, Clone, Copy)]
pub struct DocumentOptions {
    pub hierarchical: bool,
    pub dry_run: bool,
    /// Reuse the `[output] corpus` snapshot instead of ingesting the source.
    pub from_snapshot: bool,
    pub progress: ProgressMode,
}

pub async fn run_document(config: &Config, opts: DocumentOptions) -> Result<()> {
    let reporter = opts.progress.reporter();
    let classifier = Classifier::new(&config.classifier)?;

    let (corpus, skipped, local_root) = if opts.from_snapshot {
        let path = config
            .output
            .corpus
            .as_deref()
            .context("--from-snapshot needs `[output] corpus` in the config")?;
        let corpus = organize::load_corpus(path)?;
        info!(path = %path.display(), files = corpus.file_count(), "reusing corpus snapshot");
        (corpus, Vec::new(), None)
    } else {
        let ingestion = ingest::ingest(config, &classifier, reporter.as_ref()).await?;
        let corpus = organize::organize_files(ingestion.files, &LanguageDetector::new());
        if let Some(path) = &config.output.corpus {
            organize::save_corpus(&corpus, path)?;
        }
        (corpus, ingestion.skipped, ingestion.local_root)
    };
    if corpus.is_empty() {
        warn!(source = %config.source.location(), "no source files to document");
    }

    let mut report = RunReport::new(&corpus, &skipped);
    let (elements, unsupported) = extract_corpus(&corpus);
    for (_, label) in &unsupported {
        report.record_no_extractor(label);
    }

    let chunks = collect_chunks(&corpus, config.chunking.size());
    report.chunks = chunks.len();

    let mut options = SynthesisOptions::from_config(&config.generation);
    options.hierarchical |= opts.hierarchical;

    if opts.dry_run {
        let per_chunk = if options.hierarchical { 2 } else { 1 };
        println!("document {} (dry-run)", config.source.location());
        report.print();
        println!("  generation requests: {}", chunks.len() * per_chunk);
        return Ok(());
    }

    let stores = load_stores(config, &classifier, local_root.as_deref()).await;
    if !config.generation.is_enabled() {
        warn!("generation provider is disabled, every request will be recorded as a failure");
    }
    let generator = create_generator(&config.generation)?;
    let synthesizer = Synthesizer::new(generator, options);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight requests");
            on_interrupt.cancel();
        }
    });

    let output = synthesizer
        .run(&chunks, &stores, &cancel, reporter.as_ref())
        .await;
    report.record_synthesis(&output);

    let doc = DocumentationOutput {
        model: synthesizer.model_name(),
        hierarchical: options.hierarchical,
        artifacts: &output.artifacts,
        failures: &output.failures,
        elements: &elements,
        report: &report,
    };
    let path = config
        .output
        .documentation
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENTATION_FILE));
    crate::persist::write_json(&path, &doc)?;

    println!("document {}", config.source.location());
    report.print();
    report::print_failures(&output.failures);
    println!("  written: {}", path.display());
    println!(
        "{}",
        report::completion_status(cancel.is_cancelled(), output.failures.len())
    );
    Ok(())
}

/// Metadata and structure for context assembly. Persisted stores are
/// preferred; otherwise they are built from the ingested tree or the object
/// listing. Failures degrade to empty stores.
async fn load_stores(
    config: &Config,
    classifier: &Classifier,
    local_root: Option<&Path>,
) -> ContextStores {
    let metadata = match config.output.metadata.as_deref().filter(|p| p.is_file()) {
        Some(path) => metadata::load_metadata(path),
        None => match local_root {
            Some(root) => metadata::scan_metadata(root, classifier),
            None => ingest::build_metadata(config, classifier).await,
        },
    };
    let metadata = metadata.unwrap_or_else(|e| {
        warn!(error = %e, "file metadata unavailable, using empty context");
        MetadataStore::default()
    });

    let structure = match config.output.structure.as_deref().filter(|p| p.is_file()) {
        Some(path) => structure::load_structure(path),
        None => match local_root {
            Some(root) => structure::scan_structure(root, classifier),
            None => ingest::build_structure(config, classifier).await,
        },
    };
    let structure = structure.unwrap_or_else(|e| {
        warn!(error = %e, "directory structure unavailable, using empty context");
        DirectoryNode::default()
    });

    info!(
        metadata = metadata.len(),
        top_level = structure.entries().len(),
        "context stores ready"
    );
    ContextStores::new(metadata, structure)
}
