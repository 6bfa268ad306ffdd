//! Git repository source.
//!
//! The repository is fully cloned into `staging_dir` and then walked like a
//! local directory. A staging dir that already holds a clone is refreshed
//! with `git fetch` + `git reset --hard` instead of being cloned again.
//! Any git failure aborts the run.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::info;

use crate::classify::Classifier;
use crate::config::GitSourceConfig;
use crate::connector_fs;
use crate::ingest::Ingestion;

/// Clone (or refresh) the repository, then classify its files.
pub fn scan_git(git_config: &GitSourceConfig, classifier: &Classifier) -> Result<Ingestion> {
    prepare_checkout(git_config)?;
    connector_fs::scan_directory(&git_config.staging_dir, false, classifier)
}

/// Make `staging_dir` hold an up-to-date checkout of the repository.
pub fn prepare_checkout(git_config: &GitSourceConfig) -> Result<()> {
    let dest = &git_config.staging_dir;

    if dest.join(".git").exists() {
        info!(url = %git_config.url, dest = %dest.display(), "refreshing existing clone");
        git_refresh(dest, git_config.branch.as_deref())
    } else {
        info!(url = %git_config.url, dest = %dest.display(), "cloning repository");
        git_clone(&git_config.url, git_config.branch.as_deref(), dest)
    }
}

fn git_clone(url: &str, branch: Option<&str>, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create staging parent: {}", parent.display()))?;
    }

    let mut cmd = Command::new("git");
    cmd.arg("clone");
    if let Some(branch) = branch {
        cmd.args(["--branch", branch]);
    }
    cmd.arg(url);
    cmd.arg(dest);

    let output = cmd
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone of {} failed: {}", url, stderr.trim());
    }

    Ok(())
}

fn git_refresh(repo_dir: &Path, branch: Option<&str>) -> Result<()> {
    let mut fetch = Command::new("git");
    fetch.args(["fetch", "origin"]);
    if let Some(branch) = branch {
        fetch.arg(branch);
    }
    run_in(repo_dir, &mut fetch, "git fetch")?;

    // Without an explicit branch, follow whatever the remote HEAD points at.
    let target = match branch {
        Some(branch) => format!("origin/{}", branch),
        None => "FETCH_HEAD".to_string(),
    };
    run_in(
        repo_dir,
        Command::new("git").args(["reset", "--hard", &target]),
        "git reset",
    )
}

fn run_in(repo_dir: &Path, cmd: &mut Command, what: &str) -> Result<()> {
    let output = cmd
        .current_dir(repo_dir)
        .output()
        .with_context(|| format!("Failed to execute '{}'", what))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{} failed: {}", what, stderr.trim());
    }
    Ok(())
}
