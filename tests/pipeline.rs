//! Library-level pipeline tests: filesystem source through synthesis with a
//! scripted generator standing in for the text-generation service.

use async_trait::async_trait;
use std::fs;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use code_scribe::chunk::collect_chunks;
use code_scribe::classify::Classifier;
use code_scribe::config::ClassifierConfig;
use code_scribe::connector_fs::scan_directory;
use code_scribe::context::ContextStores;
use code_scribe::error::GenerationError;
use code_scribe::generation::{Generator, RetryPolicy};
use code_scribe::language::LanguageDetector;
use code_scribe::metadata::scan_metadata;
use code_scribe::models::{ArtifactKind, LanguageLabel};
use code_scribe::organize::organize_files;
use code_scribe::progress::NoProgress;
use code_scribe::structure::scan_structure;
use code_scribe::synthesize::{SynthesisOptions, Synthesizer};

/// Records prompts; the first call for any prompt mentioning `flaky` fails
/// with a retryable status.
#[derive(Default)]
struct Recorder {
    prompts: Mutex<Vec<String>>,
    flaky_failures: AtomicUsize,
}

#[async_trait]
impl Generator for Recorder {
    fn model_name(&self) -> &str {
        "recorder"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("flaky") && self.flaky_failures.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(GenerationError::Status {
                status: 429,
                body: "slow down".into(),
            });
        }
        Ok(format!("documented {} bytes", prompt.len()))
    }
}

fn write_repo(root: &std::path::Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("node_modules/dep")).unwrap();
    fs::write(
        root.join("src/lib.py"),
        "def helper():\n    return 1  # flaky\n\n\nclass Tool:\n    pass\n",
    )
    .unwrap();
    fs::write(root.join("src/main.go"), "package main\n\nfunc main() {}\n").unwrap();
    fs::write(root.join("node_modules/dep/index.js"), "module.exports = 1;\n").unwrap();
}

fn options(hierarchical: bool) -> SynthesisOptions {
    SynthesisOptions {
        hierarchical,
        max_concurrency: 2,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
    }
}

#[tokio::test]
async fn filesystem_to_documentation() {
    let tmp = TempDir::new().unwrap();
    write_repo(tmp.path());

    let classifier = Classifier::new(&ClassifierConfig::default()).unwrap();
    let ingestion = scan_directory(tmp.path(), false, &classifier).unwrap();
    let paths: Vec<&str> = ingestion.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["src/lib.py", "src/main.go"]);

    let corpus = organize_files(ingestion.files, &LanguageDetector::new());
    assert_eq!(corpus.files(&LanguageLabel::known("Python")).len(), 1);

    let chunks = collect_chunks(&corpus, NonZeroUsize::new(30).unwrap());
    let py_chunks = chunks.iter().filter(|c| c.path == "src/lib.py").count();
    assert_eq!(py_chunks, 2);

    let stores = ContextStores::new(
        scan_metadata(tmp.path(), &classifier).unwrap(),
        scan_structure(tmp.path(), &classifier).unwrap(),
    );

    let generator = Arc::new(Recorder::default());
    let output = Synthesizer::new(generator.clone(), options(true))
        .run(&chunks, &stores, &CancellationToken::new(), &NoProgress)
        .await;

    // the flaky chunk recovers on retry
    assert!(output.failures.is_empty(), "failures: {:?}", output.failures);
    let detailed = output
        .artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Detailed)
        .count();
    assert_eq!(detailed, chunks.len());
    assert_eq!(output.artifacts.last().unwrap().kind, ArtifactKind::Combined);

    let prompts = generator.prompts.lock().unwrap();
    let lib_prompt = prompts
        .iter()
        .find(|p| p.starts_with("Generate detailed documentation") && p.contains("def helper"))
        .unwrap();
    assert!(lib_prompt.contains("\"size\": 59"));
    assert!(lib_prompt.contains("\"main.go\": null"));
}
