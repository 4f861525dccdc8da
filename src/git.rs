//! Thin wrapper around the `git` command line.
//!
//! Remote repositories are shallow-cloned into a temporary directory that is
//! deleted when the returned [`ClonedRepo`] is dropped.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info, instrument};

const FALLBACK_REPO_NAME: &str = "repository";

/// A shallow clone living in a temporary directory.
#[derive(Debug)]
pub struct ClonedRepo {
    _dir: TempDir,
    path: PathBuf,
    name: String,
}

impl ClonedRepo {
    /// Working tree of the clone.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Repository name derived from the URL.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Extracts the repository name from a clone URL.
///
/// Handles trailing slashes, `.git` suffixes and scp-style URLs such as
/// `git@host:org/repo.git`.
#[must_use]
pub fn repo_name(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);

    if name.is_empty() {
        FALLBACK_REPO_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Shallow-clones `url` (depth 1) into a fresh temporary directory.
///
/// Credential prompts are disabled, so private repositories that need
/// interactive authentication fail instead of blocking.
///
/// # Errors
///
/// Returns a git error if `git` cannot be started or the clone fails.
#[instrument]
pub fn clone_shallow(url: &str) -> Result<ClonedRepo> {
    let dir = tempfile::Builder::new()
        .prefix("codesnap-")
        .tempdir()
        .map_err(|e| Error::git(format!("cannot create clone directory: {e}")))?;
    let name = repo_name(url);
    let path = dir.path().join(&name);

    info!("Cloning {} into {}", url, path.display());
    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--quiet", "--", url])
        .arg(&path)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| Error::git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::git(format!("clone of {url} failed: {}", stderr.trim())));
    }

    Ok(ClonedRepo {
        _dir: dir,
        path,
        name,
    })
}

/// Returns `remote.origin.url` of the checkout containing `path`, if any.
#[must_use]
pub fn repository_info(path: &Path) -> Option<String> {
    let output = match Command::new("git")
        .arg("-C")
        .arg(path)
        .args(["config", "--get", "remote.origin.url"])
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            debug!("git unavailable: {e}");
            return None;
        }
    };

    if !output.status.success() {
        return None;
    }

    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!url.is_empty()).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_name() {
        let cases = [
            ("https://github.com/org/project.git", "project"),
            ("https://github.com/org/project/", "project"),
            ("https://github.com/org/project", "project"),
            ("git@github.com:org/tool.git", "tool"),
            ("project.git", "project"),
            ("", "repository"),
        ];
        for (url, expected) in cases {
            assert_eq!(repo_name(url), expected, "url: {url}");
        }
    }

    #[test]
    fn test_clone_failure_is_git_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let missing = temp.path().join("no-such-repo");

        let err = clone_shallow(&missing.to_string_lossy()).unwrap_err();

        assert!(matches!(err, Error::Git { .. }));
    }

    #[test]
    fn test_repository_info_outside_checkout() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert_eq!(repository_info(temp.path()), None);
    }
}
