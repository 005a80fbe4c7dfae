//! Fork lifecycle workflows: create, update, merge, unmerge, delete.
//!
//! [`ForkService`] sequences the section engine ([`crate::sections`])
//! against the document store and the git collaborator. It holds no
//! document state between calls — every operation re-reads the files it
//! touches — and serializes all mutations of one base recipe behind a
//! per-slug async mutex, so two concurrent merges of the same base
//! cannot interleave.
//!
//! Write discipline: each document is rendered completely (content and
//! metadata together) before anything is written, and written in a
//! single call. Git commits happen after the file writes and are
//! fire-and-forget; a failed commit degrades history, never the files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::changelog::{self, ChangelogAction};
use crate::document::Document;
use crate::errors::ApiError;
use crate::git::{self, LogEntry};
use crate::index::{RecipeIndex, FORK_MARKER};
use crate::recipe::{ForkDetail, ForkInput};
use crate::sections::{detect_changed_sections, diff_sections, generate_fork_markdown, merge_content};
use crate::slug::{slugify, validate_slug};

const HISTORY_LIMIT: usize = 20;

/// Identifies a fork in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ForkRef {
    pub name: String,
    pub fork_name: String,
}

/// A merged-for-download fork document.
#[derive(Debug, Clone)]
pub struct ForkExport {
    pub filename: String,
    pub markdown: String,
}

/// Stateless orchestrator for all fork operations on one recipes
/// directory.
pub struct ForkService {
    recipes_dir: PathBuf,
    index: Arc<RecipeIndex>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ForkService {
    pub fn new(recipes_dir: PathBuf, index: Arc<RecipeIndex>) -> Self {
        Self {
            recipes_dir,
            index,
            locks: DashMap::new(),
        }
    }

    /// Raw fork metadata and body.
    pub fn get_fork(&self, slug: &str, fork: &str) -> Result<ForkDetail, ApiError> {
        let path = self.existing_fork_path(slug, fork)?;
        let doc = Document::load(&path)?;
        Ok(ForkDetail {
            name: fork.to_string(),
            fork_name: doc.get_str("fork_name").unwrap_or(fork).to_string(),
            author: doc.get_str("author").map(str::to_string),
            date_added: doc.get_str("date_added").map(str::to_string),
            content: doc.body,
        })
    }

    /// Create a fork from structured data that differs from the base.
    ///
    /// Rejected when nothing differs ("No changes from base recipe") and
    /// when the data would remove a base section entirely — a fork file
    /// cannot express "inherit nothing here", so the deletion case is
    /// forbidden outright rather than silently dropped.
    pub async fn create_fork(&self, slug: &str, input: &ForkInput) -> Result<ForkRef, ApiError> {
        let _guard = self.lock_base(slug).await;
        let base_path = self.existing_base_path(slug)?;

        let fork_slug = slugify(&input.fork_name);
        if fork_slug.is_empty() {
            return Err(ApiError::bad_request("Invalid fork name"));
        }
        let path = self.fork_path(slug, &fork_slug)?;
        if path.exists() {
            return Err(ApiError::conflict("Fork name already exists"));
        }

        let base_doc = Document::load(&base_path)?;
        let changed = diff_sections(
            &base_doc.body,
            &input.ingredients,
            &input.instructions,
            &input.notes,
        );
        if changed.is_empty() {
            return Err(ApiError::bad_request("No changes from base recipe"));
        }
        if changed.values().any(String::is_empty) {
            return Err(ApiError::bad_request(
                "A fork cannot remove a section from the base recipe",
            ));
        }

        let head = git::head_hash(&self.recipes_dir);
        let markdown = generate_fork_markdown(
            slug,
            &input.fork_name,
            &changed,
            input.author.as_deref(),
            head.as_deref(),
        );

        let mut doc = Document::parse(&markdown)?;
        changelog::append_entry(&mut doc, ChangelogAction::Created, "Forked from original");
        doc.set("version", 1);
        doc.save(&path)?;

        git::commit(
            &self.recipes_dir,
            &[&path],
            &format!("Create fork: {} ({slug})", input.fork_name),
        );
        self.index.add_or_update(&path);

        Ok(ForkRef {
            name: fork_slug,
            fork_name: input.fork_name.clone(),
        })
    }

    /// Re-diff a fork against the current base and rewrite it.
    ///
    /// Stale `version` tokens are rejected so two concurrent editors
    /// cannot silently overwrite each other. Lifecycle markers
    /// (`merged_at`, `merge_commit_id`, `failed_at`, provenance) survive
    /// the rewrite.
    pub async fn update_fork(
        &self,
        slug: &str,
        fork: &str,
        input: &ForkInput,
    ) -> Result<ForkRef, ApiError> {
        let _guard = self.lock_base(slug).await;
        let base_path = self.existing_base_path(slug)?;
        let path = self.existing_fork_path(slug, fork)?;

        let old_doc = Document::load(&path)?;
        let old_version = old_doc.get_i64("version").unwrap_or(0);
        if input.version.is_some_and(|v| v != old_version) {
            return Err(ApiError::conflict(
                "Fork was modified by another user. Please reload and try again.",
            ));
        }

        let base_doc = Document::load(&base_path)?;
        let changed = diff_sections(
            &base_doc.body,
            &input.ingredients,
            &input.instructions,
            &input.notes,
        );
        if changed.is_empty() {
            return Err(ApiError::bad_request("No changes from base recipe"));
        }
        if changed.values().any(String::is_empty) {
            return Err(ApiError::bad_request(
                "A fork cannot remove a section from the base recipe",
            ));
        }

        let markdown = generate_fork_markdown(
            slug,
            &input.fork_name,
            &changed,
            input.author.as_deref(),
            old_doc.get_str("forked_at_commit"),
        );
        let mut doc = Document::parse(&markdown)?;

        // Carry lifecycle state through the rewrite.
        for key in ["merged_at", "merge_commit_id", "failed_at", "failed_reason"] {
            if let Some(value) = old_doc.metadata.get(key) {
                doc.set(key, value.clone());
            }
        }
        if let Some(old_changelog) = old_doc.metadata.get("changelog") {
            doc.set("changelog", old_changelog.clone());
        }

        let edited = detect_changed_sections(&old_doc.body, &doc.body);
        let summary = if edited.is_empty() {
            "Edited metadata".to_string()
        } else {
            format!("Edited {}", edited.join(", "))
        };
        changelog::append_entry(&mut doc, ChangelogAction::Edited, summary);
        doc.set("version", old_version + 1);
        doc.save(&path)?;

        git::commit(
            &self.recipes_dir,
            &[&path],
            &format!("Update fork: {} ({slug})", input.fork_name),
        );
        self.index.add_or_update(&path);

        Ok(ForkRef {
            name: fork.to_string(),
            fork_name: input.fork_name.clone(),
        })
    }

    /// Delete a fork file and scrub merge/unmerge entries that reference
    /// it from the base changelog.
    pub async fn delete_fork(&self, slug: &str, fork: &str) -> Result<(), ApiError> {
        let _guard = self.lock_base(slug).await;
        let base_path = self.existing_base_path(slug)?;
        let path = self.existing_fork_path(slug, fork)?;

        let fork_doc = Document::load(&path)?;
        let fork_name = fork_doc.get_str("fork_name").unwrap_or(fork).to_string();

        let mut base_doc = Document::load(&base_path)?;
        changelog::remove_entries_for_fork(&mut base_doc, &fork_name);
        base_doc.save(&base_path)?;

        std::fs::remove_file(&path)
            .map_err(|err| ApiError::Internal(anyhow::Error::new(err)))?;

        git::commit(
            &self.recipes_dir,
            &[&base_path, &path],
            &format!("Delete fork: {fork} ({slug})"),
        );
        self.index.add_or_update(&base_path);
        self.index.remove(&format!("{slug}{FORK_MARKER}{fork}"));

        Ok(())
    }

    /// Fold the fork's sections into the base recipe and persist.
    ///
    /// The base-side commit id is recorded on the fork as
    /// `merge_commit_id` so unmerge can find the pre-merge snapshot
    /// without searching commit messages. Re-merging an already-merged
    /// fork is permitted; the overlay fully replaces, so the result is
    /// the same.
    pub async fn merge_fork(
        &self,
        slug: &str,
        fork: &str,
        note: &str,
    ) -> Result<ForkRef, ApiError> {
        let _guard = self.lock_base(slug).await;
        let base_path = self.existing_base_path(slug)?;
        let fork_path = self.existing_fork_path(slug, fork)?;

        let mut base_doc = Document::load(&base_path)?;
        let mut fork_doc = Document::load(&fork_path)?;
        let fork_name = fork_doc.get_str("fork_name").unwrap_or(fork).to_string();

        base_doc.body = merge_content(&base_doc.body, &fork_doc.body);
        changelog::append_entry(
            &mut base_doc,
            ChangelogAction::Merged,
            format!("Merged fork '{fork_name}': {note}"),
        );
        base_doc.save(&base_path)?;
        let merge_commit = git::commit(
            &self.recipes_dir,
            &[&base_path],
            &format!("Merge fork '{fork_name}' into {slug}"),
        );

        fork_doc.set("merged_at", today());
        if let Some(id) = &merge_commit {
            fork_doc.set("merge_commit_id", id.as_str());
        }
        changelog::append_entry(
            &mut fork_doc,
            ChangelogAction::Merged,
            format!("Merged into {slug}"),
        );
        fork_doc.save(&fork_path)?;
        git::commit(
            &self.recipes_dir,
            &[&fork_path],
            &format!("Mark fork '{fork_name}' as merged ({slug})"),
        );

        self.index.add_or_update(&base_path);
        self.index.add_or_update(&fork_path);

        Ok(ForkRef {
            name: fork.to_string(),
            fork_name,
        })
    }

    /// Undo a merge by restoring the base recipe to its pre-merge
    /// snapshot from git history.
    ///
    /// The snapshot is the parent of the merge commit — located by the
    /// stored `merge_commit_id` when present, otherwise by searching the
    /// base's history for the merge commit message.
    pub async fn unmerge_fork(&self, slug: &str, fork: &str) -> Result<ForkRef, ApiError> {
        let _guard = self.lock_base(slug).await;
        let base_path = self.existing_base_path(slug)?;
        let fork_path = self.existing_fork_path(slug, fork)?;

        let mut fork_doc = Document::load(&fork_path)?;
        if !fork_doc.has("merged_at") {
            return Err(ApiError::bad_request("Fork is not merged"));
        }
        let fork_name = fork_doc.get_str("fork_name").unwrap_or(fork).to_string();

        let merge_commit = fork_doc
            .get_str("merge_commit_id")
            .map(str::to_string)
            .or_else(|| {
                git::find_commit(
                    &self.recipes_dir,
                    &base_path,
                    &format!("Merge fork '{fork_name}' into {slug}"),
                )
            })
            .ok_or_else(|| ApiError::conflict("Merge commit not found in history"))?;

        let pre_merge = git::show(
            &self.recipes_dir,
            &format!("{merge_commit}~1"),
            &base_path,
        )
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ApiError::conflict("Could not retrieve pre-merge content"))?;

        let mut base_doc = Document::parse(&pre_merge)?;
        changelog::append_entry(
            &mut base_doc,
            ChangelogAction::Unmerged,
            format!("Unmerged fork '{fork_name}'"),
        );

        fork_doc.remove("merged_at");
        fork_doc.remove("merge_commit_id");
        changelog::append_entry(
            &mut fork_doc,
            ChangelogAction::Unmerged,
            format!("Unmerged from {slug}"),
        );

        // Both documents staged, then written, then one commit for both.
        base_doc.save(&base_path)?;
        fork_doc.save(&fork_path)?;
        git::commit(
            &self.recipes_dir,
            &[&base_path, &fork_path],
            &format!("Unmerge fork '{fork_name}' from {slug}"),
        );

        self.index.add_or_update(&base_path);
        self.index.add_or_update(&fork_path);

        Ok(ForkRef {
            name: fork.to_string(),
            fork_name,
        })
    }

    /// Merge base and fork for download: base metadata with the fork's
    /// name folded into the title, fork author/date overlaid, and the
    /// same section overlay the persisted merge would produce.
    pub fn export_fork(&self, slug: &str, fork: &str) -> Result<ForkExport, ApiError> {
        let base_path = self.existing_base_path(slug)?;
        let fork_path = self.existing_fork_path(slug, fork)?;

        let base_doc = Document::load(&base_path)?;
        let fork_doc = Document::load(&fork_path)?;

        let mut merged = Document {
            metadata: base_doc.metadata.clone(),
            body: merge_content(&base_doc.body, &fork_doc.body),
        };
        if let Some(fork_name) = fork_doc.get_str("fork_name") {
            let title = base_doc.get_str("title").unwrap_or(slug);
            merged.set("title", format!("{title} ({fork_name})"));
        }
        if let Some(author) = fork_doc.get_str("author") {
            merged.set("author", author);
        }
        if let Some(date_added) = fork_doc.get_str("date_added") {
            merged.set("date_added", date_added);
        }

        Ok(ForkExport {
            filename: format!("{slug}-{fork}.md"),
            markdown: merged.render(),
        })
    }

    /// Git history of the fork file, optionally with the file content at
    /// each revision.
    pub fn fork_history(
        &self,
        slug: &str,
        fork: &str,
        with_content: bool,
    ) -> Result<Vec<LogEntry>, ApiError> {
        let path = self.existing_fork_path(slug, fork)?;
        let mut entries = git::log(&self.recipes_dir, &path, HISTORY_LIMIT);
        if with_content {
            for entry in &mut entries {
                entry.content = git::show(&self.recipes_dir, &entry.id, &path);
            }
        }
        Ok(entries)
    }

    /// Mark a fork as failed with a reason.
    pub async fn fail_fork(&self, slug: &str, fork: &str, reason: &str) -> Result<(), ApiError> {
        let _guard = self.lock_base(slug).await;
        let path = self.existing_fork_path(slug, fork)?;

        let mut doc = Document::load(&path)?;
        if doc.has("failed_at") {
            return Err(ApiError::bad_request("Fork is already marked as failed"));
        }
        let fork_name = doc.get_str("fork_name").unwrap_or(fork).to_string();

        doc.set("failed_at", today());
        doc.set("failed_reason", reason);
        changelog::append_entry(
            &mut doc,
            ChangelogAction::Failed,
            format!("Marked as failed: {reason}"),
        );
        doc.save(&path)?;

        git::commit(
            &self.recipes_dir,
            &[&path],
            &format!("Mark fork '{fork_name}' as failed ({slug})"),
        );
        self.index.add_or_update(&path);
        Ok(())
    }

    /// Reactivate a previously failed fork.
    pub async fn unfail_fork(&self, slug: &str, fork: &str) -> Result<(), ApiError> {
        let _guard = self.lock_base(slug).await;
        let path = self.existing_fork_path(slug, fork)?;

        let mut doc = Document::load(&path)?;
        if !doc.has("failed_at") {
            return Err(ApiError::bad_request("Fork is not failed"));
        }
        let fork_name = doc.get_str("fork_name").unwrap_or(fork).to_string();

        doc.remove("failed_at");
        doc.remove("failed_reason");
        changelog::append_entry(
            &mut doc,
            ChangelogAction::Unfailed,
            format!("Reactivated fork '{fork_name}'"),
        );
        doc.save(&path)?;

        git::commit(
            &self.recipes_dir,
            &[&path],
            &format!("Reactivate fork '{fork_name}' ({slug})"),
        );
        self.index.add_or_update(&path);
        Ok(())
    }

    // Per-base-slug mutual exclusion for every mutating workflow. Locks
    // are created on first use and live for the process lifetime; the
    // guard releases on every exit path, including errors.
    async fn lock_base(&self, slug: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(slug.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    fn existing_base_path(&self, slug: &str) -> Result<PathBuf, ApiError> {
        validate_slug(slug, "slug")?;
        let path = self.recipes_dir.join(format!("{slug}.md"));
        if !path.exists() {
            return Err(ApiError::not_found("Base recipe not found"));
        }
        Ok(path)
    }

    fn fork_path(&self, slug: &str, fork: &str) -> Result<PathBuf, ApiError> {
        validate_slug(slug, "slug")?;
        validate_slug(fork, "fork")?;
        Ok(self
            .recipes_dir
            .join(format!("{slug}{FORK_MARKER}{fork}.md")))
    }

    fn existing_fork_path(&self, slug: &str, fork: &str) -> Result<PathBuf, ApiError> {
        let path = self.fork_path(slug, fork)?;
        if !path.exists() {
            return Err(ApiError::not_found("Fork not found"));
        }
        Ok(path)
    }

    pub fn recipes_dir(&self) -> &Path {
        &self.recipes_dir
    }
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
