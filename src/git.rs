//! Git collaborator for the recipes directory.
//!
//! Version control is an audit and recovery layer, not the primary
//! store: the markdown files on disk are authoritative. Commit-side
//! operations are therefore fire-and-forget — failures are logged and
//! swallowed so an unavailable repository never blocks a user's edit.
//! Read-side operations (log, show, find) return empty results on
//! failure for the same reason.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use git2::{Commit, IndexAddOption, Oid, Repository, Signature};
use serde::{Deserialize, Serialize};

/// One entry of a file's commit history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub date: String,
    pub message: String,
    /// File content at this revision, populated on request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Initialize a git repository in `recipes_dir` with an initial commit,
/// unless one already exists. Failures are logged, never raised.
pub fn init_if_needed(recipes_dir: &Path) {
    if recipes_dir.join(".git").exists() {
        return;
    }
    if let Err(err) = try_init(recipes_dir) {
        tracing::error!(error = %err, "failed to initialize git repo");
    } else {
        tracing::info!(dir = %recipes_dir.display(), "initialized git repo");
    }
}

fn try_init(recipes_dir: &Path) -> Result<()> {
    let repo = Repository::init(recipes_dir)?;
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;
    let sig = signature(&repo)?;
    repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])?;
    Ok(())
}

/// Stage the given paths (additions, modifications, and deletions alike)
/// and commit. Fire-and-forget: on failure the error is logged and
/// `None` returned. On success returns the new commit id, which the
/// merge workflow records for later unmerge.
pub fn commit(recipes_dir: &Path, paths: &[&Path], message: &str) -> Option<String> {
    match try_commit(recipes_dir, paths, message) {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::error!(message, error = %err, "git commit failed");
            None
        }
    }
}

fn try_commit(recipes_dir: &Path, paths: &[&Path], message: &str) -> Result<String> {
    let repo = Repository::open(recipes_dir)?;
    let mut index = repo.index()?;
    for path in paths {
        let rel = path
            .strip_prefix(recipes_dir)
            .with_context(|| format!("{} is outside the recipes dir", path.display()))?;
        if path.exists() {
            index.add_path(rel)?;
        } else {
            index.remove_path(rel)?;
        }
    }
    index.write()?;

    let tree = repo.find_tree(index.write_tree()?)?;
    let sig = signature(&repo)?;
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
    Ok(oid.to_string())
}

/// Commit history of one file, newest first, capped at `max_entries`.
/// Returns an empty list on any git failure.
pub fn log(recipes_dir: &Path, path: &Path, max_entries: usize) -> Vec<LogEntry> {
    match try_log(recipes_dir, path, max_entries) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "git log failed");
            Vec::new()
        }
    }
}

fn try_log(recipes_dir: &Path, path: &Path, max_entries: usize) -> Result<Vec<LogEntry>> {
    let repo = Repository::open(recipes_dir)?;
    let rel = path.strip_prefix(recipes_dir)?;

    let mut walk = repo.revwalk()?;
    walk.push_head()?;
    walk.set_sorting(git2::Sort::TIME)?;

    let mut entries = Vec::new();
    for oid in walk {
        if entries.len() >= max_entries {
            break;
        }
        let commit = repo.find_commit(oid?)?;
        if !touches(&commit, rel) {
            continue;
        }
        entries.push(LogEntry {
            id: commit.id().to_string(),
            date: commit_date(&commit),
            message: commit.summary().unwrap_or("").to_string(),
            content: None,
        });
    }
    Ok(entries)
}

/// Most recent commit touching `path` whose message contains `needle`,
/// or `None` when no such commit (or the repo) can be found.
pub fn find_commit(recipes_dir: &Path, path: &Path, needle: &str) -> Option<String> {
    match try_find_commit(recipes_dir, path, needle) {
        Ok(found) => found,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "git commit search failed");
            None
        }
    }
}

fn try_find_commit(recipes_dir: &Path, path: &Path, needle: &str) -> Result<Option<String>> {
    let repo = Repository::open(recipes_dir)?;
    let rel = path.strip_prefix(recipes_dir)?;

    let mut walk = repo.revwalk()?;
    walk.push_head()?;
    walk.set_sorting(git2::Sort::TIME)?;

    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        let matches = commit.message().is_some_and(|msg| msg.contains(needle));
        if matches && touches(&commit, rel) {
            return Ok(Some(commit.id().to_string()));
        }
    }
    Ok(None)
}

/// File content at a revision expression (`abc123`, `abc123~1`, `HEAD`).
/// Returns `None` when the revision or the file at it cannot be read.
pub fn show(recipes_dir: &Path, revision: &str, path: &Path) -> Option<String> {
    match try_show(recipes_dir, revision, path) {
        Ok(content) => Some(content),
        Err(err) => {
            tracing::error!(revision, path = %path.display(), error = %err, "git show failed");
            None
        }
    }
}

fn try_show(recipes_dir: &Path, revision: &str, path: &Path) -> Result<String> {
    let repo = Repository::open(recipes_dir)?;
    let rel = path.strip_prefix(recipes_dir)?;
    let commit = repo.revparse_single(revision)?.peel_to_commit()?;
    let entry = commit.tree()?.get_path(rel)?;
    let blob = repo.find_blob(entry.id())?;
    Ok(String::from_utf8_lossy(blob.content()).into_owned())
}

/// Current HEAD commit hash, or `None` when the repo has no commits.
pub fn head_hash(recipes_dir: &Path) -> Option<String> {
    let repo = Repository::open(recipes_dir).ok()?;
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

// A commit touches a file when the blob at that path differs from the
// first parent's (or exists in a root commit).
fn touches(commit: &Commit, rel: &Path) -> bool {
    let entry_id = |commit: &Commit| -> Option<Oid> {
        commit
            .tree()
            .ok()
            .and_then(|tree| tree.get_path(rel).ok())
            .map(|entry| entry.id())
    };

    let current = entry_id(commit);
    if commit.parent_count() == 0 {
        return current.is_some();
    }
    let parent = commit.parent(0).ok();
    let previous = parent.as_ref().and_then(entry_id);
    current != previous
}

fn commit_date(commit: &Commit) -> String {
    let time = commit.time();
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    DateTime::from_timestamp(time.seconds(), 0)
        .map(|utc| utc.with_timezone(&offset).to_rfc3339())
        .unwrap_or_default()
}

fn signature(repo: &Repository) -> Result<Signature<'static>> {
    // Fall back to a fixed identity when no git config is present, so
    // commits work in fresh containers.
    if let Ok(sig) = repo.signature() {
        return Ok(sig);
    }
    Ok(Signature::now("forks", "forks@localhost")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_init_and_head() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", "one");
        init_if_needed(tmp.path());
        assert!(tmp.path().join(".git").exists());
        assert!(head_hash(tmp.path()).is_some());

        // Second call is a no-op.
        init_if_needed(tmp.path());
    }

    #[test]
    fn test_commit_and_log() {
        let tmp = TempDir::new().unwrap();
        init_if_needed(tmp.path());

        let path = write(tmp.path(), "pasta.md", "v1");
        let first = commit(tmp.path(), &[&path], "Create pasta").unwrap();
        write(tmp.path(), "pasta.md", "v2");
        let second = commit(tmp.path(), &[&path], "Update pasta").unwrap();
        assert_ne!(first, second);

        let entries = log(tmp.path(), &path, 20);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second);
        assert_eq!(entries[0].message, "Update pasta");
        assert_eq!(entries[1].message, "Create pasta");
    }

    #[test]
    fn test_log_ignores_other_files() {
        let tmp = TempDir::new().unwrap();
        init_if_needed(tmp.path());

        let pasta = write(tmp.path(), "pasta.md", "pasta");
        commit(tmp.path(), &[&pasta], "Create pasta");
        let soup = write(tmp.path(), "soup.md", "soup");
        commit(tmp.path(), &[&soup], "Create soup");

        let entries = log(tmp.path(), &pasta, 20);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Create pasta");
    }

    #[test]
    fn test_show_at_parent_revision() {
        let tmp = TempDir::new().unwrap();
        init_if_needed(tmp.path());

        let path = write(tmp.path(), "pasta.md", "before merge");
        commit(tmp.path(), &[&path], "Create pasta");
        write(tmp.path(), "pasta.md", "after merge");
        let merge = commit(tmp.path(), &[&path], "Merge fork 'Vegan' into pasta").unwrap();

        assert_eq!(
            show(tmp.path(), &merge, &path).as_deref(),
            Some("after merge")
        );
        assert_eq!(
            show(tmp.path(), &format!("{merge}~1"), &path).as_deref(),
            Some("before merge")
        );
    }

    #[test]
    fn test_find_commit_by_message() {
        let tmp = TempDir::new().unwrap();
        init_if_needed(tmp.path());

        let path = write(tmp.path(), "pasta.md", "v1");
        commit(tmp.path(), &[&path], "Create pasta");
        write(tmp.path(), "pasta.md", "v2");
        let merge = commit(tmp.path(), &[&path], "Merge fork 'Vegan' into pasta").unwrap();

        assert_eq!(
            find_commit(tmp.path(), &path, "Merge fork 'Vegan' into pasta"),
            Some(merge)
        );
        assert_eq!(find_commit(tmp.path(), &path, "no such message"), None);
    }

    #[test]
    fn test_commit_stages_deletion() {
        let tmp = TempDir::new().unwrap();
        init_if_needed(tmp.path());

        let path = write(tmp.path(), "pasta.md", "v1");
        commit(tmp.path(), &[&path], "Create pasta");
        std::fs::remove_file(&path).unwrap();
        let removal = commit(tmp.path(), &[&path], "Delete pasta").unwrap();

        // The file is gone from the tree at the removal commit.
        assert!(show(tmp.path(), &removal, &path).is_none());
        assert_eq!(
            show(tmp.path(), &format!("{removal}~1"), &path).as_deref(),
            Some("v1")
        );
    }

    #[test]
    fn test_failures_are_swallowed() {
        let tmp = TempDir::new().unwrap();
        // No git repo here at all.
        let path = tmp.path().join("pasta.md");
        assert!(commit(tmp.path(), &[&path], "nope").is_none());
        assert!(log(tmp.path(), &path, 10).is_empty());
        assert!(show(tmp.path(), "HEAD", &path).is_none());
        assert!(find_commit(tmp.path(), &path, "x").is_none());
        assert!(head_hash(tmp.path()).is_none());
    }
}
