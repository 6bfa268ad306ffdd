use anyhow::{bail, Result};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::classify::{to_slash_path, Classifier, SkipReason, SkippedFile};
use crate::ingest::Ingestion;

/// Walk a local directory tree and classify every file under it.
///
/// Paths are recorded relative to `root`. Files are returned sorted by path
/// for deterministic ordering. Excluded directories are not descended into;
/// each one is recorded as a single skip.
pub fn scan_directory(root: &Path, follow_symlinks: bool, classifier: &Classifier) -> Result<Ingestion> {
    if !root.is_dir() {
        bail!("Source root does not exist or is not a directory: {}", root.display());
    }

    let mut ingestion = Ingestion {
        local_root: Some(root.to_path_buf()),
        ..Ingestion::default()
    };

    let mut pruned = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .into_iter()
        .filter_entry(|e| {
            let excluded = e.depth() > 0
                && e.file_type().is_dir()
                && e.file_name()
                    .to_str()
                    .is_some_and(|name| classifier.is_excluded_directory(name));
            if excluded {
                let path = relative_to(root, e.path());
                debug!(path = %path, "pruning excluded directory");
                pruned.push(SkippedFile {
                    path,
                    reason: SkipReason::ExcludedDirectory,
                });
            }
            !excluded
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| relative_to(root, p))
                    .unwrap_or_else(|| "<unknown>".to_string());
                warn!(path = %path, error = %e, "skipping unreadable entry");
                ingestion.skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::Unreadable,
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel_str = relative_to(root, entry.path());

        if let Some(reason) = classifier.check_path(&rel_str) {
            debug!(path = %rel_str, %reason, "skipping file");
            ingestion.skipped.push(SkippedFile { path: rel_str, reason });
            continue;
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %rel_str, error = %e, "failed to read file");
                ingestion.skipped.push(SkippedFile {
                    path: rel_str,
                    reason: SkipReason::Unreadable,
                });
                continue;
            }
        };

        match classifier.classify_bytes(&rel_str, bytes) {
            Ok(file) => ingestion.files.push(file),
            Err(reason) => {
                debug!(path = %rel_str, %reason, "skipping file");
                ingestion.skipped.push(SkippedFile { path: rel_str, reason });
            }
        }
    }

    ingestion.skipped.extend(pruned);

    // Sort for deterministic ordering
    ingestion.files.sort_by(|a, b| a.path.cmp(&b.path));
    ingestion.skipped.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(ingestion)
}

fn relative_to(root: &Path, path: &Path) -> String {
    to_slash_path(path.strip_prefix(root).unwrap_or(path))
}
