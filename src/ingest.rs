//! Ingestion orchestration and the inspection commands.
//!
//! [`ingest`] dispatches to the configured source connector and returns the
//! classified files. The `organize`, `metadata`, `structure` and `analyze`
//! commands are thin drivers over it.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::classify::{Classifier, SkippedFile};
use crate::config::{Config, SourceConfig};
use crate::connector_fs;
use crate::connector_git;
use crate::connector_s3;
use crate::elements::extract_elements;
use crate::language::LanguageDetector;
use crate::metadata::{self, MetadataStore};
use crate::models::{ElementSet, LanguageLabel, SourceFile};
use crate::organize::{self, OrganizedCorpus};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::structure::{self, DirectoryNode};

pub const DEFAULT_METADATA_FILE: &str = "file_metadata.json";
pub const DEFAULT_STRUCTURE_FILE: &str = "file_structure.json";

/// Result of scanning a source.
#[derive(Debug, Default)]
pub struct Ingestion {
    /// Accepted source files, sorted by path.
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedFile>,
    /// Local directory the files were read from; `None` for object storage.
    pub local_root: Option<PathBuf>,
}

/// Scan the configured source and classify every file in it.
pub async fn ingest(
    config: &Config,
    classifier: &Classifier,
    progress: &dyn ProgressReporter,
) -> Result<Ingestion> {
    progress.report(ProgressEvent::Discovering {
        source: format!("{}:{}", config.source.kind(), config.source.location()),
    });

    let ingestion = match &config.source {
        SourceConfig::Filesystem(fs) => {
            connector_fs::scan_directory(&fs.root, fs.follow_symlinks, classifier)?
        }
        SourceConfig::Git(git) => connector_git::scan_git(git, classifier)?,
        SourceConfig::S3(s3) => connector_s3::scan_s3(s3, classifier).await?,
    };

    info!(
        source = config.source.kind(),
        files = ingestion.files.len(),
        skipped = ingestion.skipped.len(),
        "ingestion complete"
    );
    Ok(ingestion)
}

/// Build the metadata store for the configured source.
pub async fn build_metadata(config: &Config, classifier: &Classifier) -> Result<MetadataStore> {
    match local_tree(config)? {
        Some(root) => metadata::scan_metadata(&root, classifier),
        None => match &config.source {
            SourceConfig::S3(s3) => {
                let objects = connector_s3::list_bucket(s3).await?;
                Ok(MetadataStore::from_objects(&objects))
            }
            _ => Ok(MetadataStore::default()),
        },
    }
}

/// Build the directory structure store for the configured source.
pub async fn build_structure(config: &Config, classifier: &Classifier) -> Result<DirectoryNode> {
    match local_tree(config)? {
        Some(root) => structure::scan_structure(&root, classifier),
        None => match &config.source {
            SourceConfig::S3(s3) => {
                let objects = connector_s3::list_bucket(s3).await?;
                Ok(DirectoryNode::from_paths(objects.iter().map(|o| o.key.as_str())))
            }
            _ => Ok(DirectoryNode::default()),
        },
    }
}

/// The local directory backing the source, checking out git sources first.
fn local_tree(config: &Config) -> Result<Option<PathBuf>> {
    match &config.source {
        SourceConfig::Filesystem(fs) => Ok(Some(fs.root.clone())),
        SourceConfig::Git(git) => {
            connector_git::prepare_checkout(git)?;
            Ok(Some(git.staging_dir.clone()))
        }
        SourceConfig::S3(_) => Ok(None),
    }
}

pub async fn run_organize(config: &Config, progress: &dyn ProgressReporter) -> Result<()> {
    let classifier = Classifier::new(&config.classifier)?;
    let ingestion = ingest(config, &classifier, progress).await?;
    let corpus = organize::organize_files(ingestion.files, &LanguageDetector::new());

    println!("organize {}", config.source.location());
    println!("  files: {}", corpus.file_count());
    println!("  skipped: {}", ingestion.skipped.len());
    println!("  languages: {}", corpus.language_count());
    for (label, files) in corpus.groups() {
        println!("    {:<22} {:>6}", label, files.len());
    }

    if let Some(path) = &config.output.corpus {
        organize::save_corpus(&corpus, path)?;
        println!("  snapshot: {}", path.display());
    }
    println!("ok");
    Ok(())
}

pub async fn run_metadata(config: &Config) -> Result<()> {
    let classifier = Classifier::new(&config.classifier)?;
    let store = build_metadata(config, &classifier).await?;
    let path = output_path(&config.output.metadata, DEFAULT_METADATA_FILE);
    metadata::save_metadata(&store, &path)?;

    println!("metadata {}", config.source.location());
    println!("  files: {}", store.len());
    println!("  written: {}", path.display());
    Ok(())
}

pub async fn run_structure(config: &Config) -> Result<()> {
    let classifier = Classifier::new(&config.classifier)?;
    let tree = build_structure(config, &classifier).await?;
    let path = output_path(&config.output.structure, DEFAULT_STRUCTURE_FILE);
    structure::save_structure(&tree, &path)?;

    println!("structure {}", config.source.location());
    println!("  top-level entries: {}", tree.entries().len());
    println!("  written: {}", path.display());
    Ok(())
}

/// Print extracted elements as JSON: for one file if `file` is given,
/// otherwise for every ingested file with a registered extractor.
pub async fn run_analyze(
    config: Option<&Config>,
    file: Option<&Path>,
    language: Option<&str>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let detector = LanguageDetector::new();

    let json = match file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let label = match language {
                Some(name) => LanguageLabel::from(name.to_string()),
                None => detector.detect(&path.to_string_lossy(), &content),
            };
            let elements = extract_elements(&label, &content)?;
            serde_json::json!({
                "path": path.display().to_string(),
                "language": label,
                "elements": elements,
            })
        }
        None => {
            let config = config.context("analyze without a FILE needs a readable config")?;
            let classifier = Classifier::new(&config.classifier)?;
            let ingestion = ingest(config, &classifier, progress).await?;
            let corpus = organize::organize_files(ingestion.files, &detector);
            let (elements, _) = extract_corpus(&corpus);
            serde_json::to_value(elements)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Run the element extractor over every file of the corpus. Files whose
/// language has no extractor are returned separately with their label.
pub fn extract_corpus(
    corpus: &OrganizedCorpus,
) -> (BTreeMap<String, ElementSet>, Vec<(String, LanguageLabel)>) {
    let mut elements = BTreeMap::new();
    let mut unsupported = Vec::new();

    for (label, files) in corpus.groups() {
        for file in files {
            match extract_elements(label, &file.content) {
                Ok(set) => {
                    elements.insert(file.path.clone(), set);
                }
                Err(e) => {
                    warn!(path = %file.path, error = %e, "no element extraction");
                    unsupported.push((file.path.clone(), label.clone()));
                }
            }
        }
    }

    (elements, unsupported)
}

fn output_path(configured: &Option<PathBuf>, default_name: &str) -> PathBuf {
    configured
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::progress::NoProgress;
    use tempfile::TempDir;

    fn fs_config(root: &Path) -> Config {
        parse_config(&format!(
            "[source]\nkind = \"filesystem\"\nroot = {:?}\n\n[generation]\nprovider = \"disabled\"\n",
            root.to_string_lossy()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn ingest_filesystem_source() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.py"), "def f():\n    pass\n").unwrap();
        std::fs::write(tmp.path().join("a.pyc"), "junk").unwrap();

        let config = fs_config(tmp.path());
        let classifier = Classifier::new(&config.classifier).unwrap();
        let ingestion = ingest(&config, &classifier, &NoProgress).await.unwrap();

        assert_eq!(ingestion.files.len(), 1);
        assert_eq!(ingestion.files[0].path, "a.py");
        assert_eq!(ingestion.skipped.len(), 1);
        assert_eq!(ingestion.local_root.as_deref(), Some(tmp.path()));
    }

    #[tokio::test]
    async fn stores_built_from_local_tree() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("pkg")).unwrap();
        std::fs::write(tmp.path().join("pkg/m.py"), "x = 1\n").unwrap();

        let config = fs_config(tmp.path());
        let classifier = Classifier::new(&config.classifier).unwrap();
        let meta = build_metadata(&config, &classifier).await.unwrap();
        let tree = build_structure(&config, &classifier).await.unwrap();

        assert_eq!(meta.get("pkg/m.py").unwrap().size, 6);
        assert!(tree.lookup("pkg").unwrap().entries().contains_key("m.py"));
    }

    #[test]
    fn extract_corpus_separates_unsupported() {
        let corpus = organize::organize_files(
            vec![
                SourceFile::new("a.py", "def f():\n    pass\n"),
                SourceFile::new("notes.zzz-none", "plain words"),
            ],
            &LanguageDetector::new(),
        );
        let (elements, unsupported) = extract_corpus(&corpus);

        assert_eq!(elements["a.py"].functions, vec!["f"]);
        assert_eq!(
            unsupported,
            vec![("notes.zzz-none".to_string(), LanguageLabel::Unknown)]
        );
    }
}
