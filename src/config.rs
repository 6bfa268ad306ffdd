use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where the corpus comes from. Selected by `kind`.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Filesystem(FilesystemSourceConfig),
    Git(GitSourceConfig),
    S3(S3SourceConfig),
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Filesystem(_) => "filesystem",
            SourceConfig::Git(_) => "git",
            SourceConfig::S3(_) => "s3",
        }
    }

    /// Human-readable location, used in logs and progress lines.
    pub fn location(&self) -> String {
        match self {
            SourceConfig::Filesystem(fs) => fs.root.display().to_string(),
            SourceConfig::Git(git) => git.url.clone(),
            SourceConfig::S3(s3) => format!("s3://{}/{}", s3.bucket, s3.prefix),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemSourceConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitSourceConfig {
    pub url: String,
    /// Local path the repository is cloned into before traversal.
    pub staging_dir: PathBuf,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3SourceConfig {
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassifierConfig {
    /// Extensions excluded on top of the built-in set (with leading dot).
    #[serde(default)]
    pub extra_extensions: Vec<String>,
    /// Directory names excluded on top of the built-in set.
    #[serde(default)]
    pub extra_directories: Vec<String>,
    /// Globs matched against the root-relative path.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

impl ChunkingConfig {
    /// Chunk size as a validated non-zero count. [`load_config`] rejects 0,
    /// so the fallback only applies to hand-built configs.
    pub fn size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.chunk_size).unwrap_or(crate::chunk::DEFAULT_CHUNK_SIZE)
    }
}

fn default_chunk_size() -> usize {
    crate::chunk::DEFAULT_CHUNK_SIZE.get()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub hierarchical: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            max_concurrency: default_max_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            hierarchical: false,
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_concurrency() -> usize {
    4
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    60
}

/// Paths of persisted artifacts. Every entry is optional; a missing path
/// means the artifact is not written (or, for inputs, not loaded).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub documentation: Option<PathBuf>,
    #[serde(default)]
    pub corpus: Option<PathBuf>,
    #[serde(default)]
    pub metadata: Option<PathBuf>,
    #[serde(default)]
    pub structure: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate source
    match &config.source {
        SourceConfig::Filesystem(_) => {}
        SourceConfig::Git(git) => {
            if git.url.trim().is_empty() {
                bail!("source.url must not be empty for a git source");
            }
        }
        SourceConfig::S3(s3) => {
            if s3.bucket.trim().is_empty() {
                bail!("source.bucket must not be empty for an s3 source");
            }
        }
    }

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }

    // Validate generation
    if config.generation.max_concurrency == 0 {
        bail!("generation.max_concurrency must be > 0");
    }
    if config.generation.max_attempts == 0 {
        bail!("generation.max_attempts must be > 0");
    }

    match config.generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_filesystem_config_gets_defaults() {
        let config = parse_config(
            r#"
            [source]
            kind = "filesystem"
            root = "./project"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.kind(), "filesystem");
        assert_eq!(config.chunking.chunk_size, 4000);
        assert_eq!(config.generation.model, "gpt-3.5-turbo");
        assert_eq!(config.generation.max_attempts, 3);
        assert!(!config.generation.hierarchical);
        assert!(config.output.documentation.is_none());
    }

    #[test]
    fn s3_source_parses() {
        let config = parse_config(
            r#"
            [source]
            kind = "s3"
            bucket = "corpus"
            prefix = "repos/app/"

            [generation]
            provider = "disabled"
            "#,
        )
        .unwrap();

        match &config.source {
            SourceConfig::S3(s3) => {
                assert_eq!(s3.bucket, "corpus");
                assert_eq!(s3.region, "us-east-1");
            }
            other => panic!("unexpected source: {:?}", other),
        }
        assert_eq!(config.source.location(), "s3://corpus/repos/app/");
        assert!(!config.generation.is_enabled());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let err = parse_config(
            r#"
            [source]
            kind = "filesystem"
            root = "."

            [chunking]
            chunk_size = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = parse_config(
            r#"
            [source]
            kind = "filesystem"
            root = "."

            [generation]
            provider = "carrier-pigeon"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn unknown_source_kind_rejected() {
        assert!(parse_config(
            r#"
            [source]
            kind = "ftp"
            root = "."
            "#,
        )
        .is_err());
    }
}
