//! Changelog entries stored in recipe and fork front matter.
//!
//! Every mutation appends a `{date, action, summary}` entry to the
//! document's `changelog` list. Action kinds are a single shared enum so
//! the workflow layer and the on-disk format can never drift apart on
//! spelling.

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Action kinds recorded in recipe and fork changelogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangelogAction {
    Created,
    Edited,
    Merged,
    Unmerged,
    Failed,
    Unfailed,
}

impl std::fmt::Display for ChangelogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChangelogAction::Created => "created",
            ChangelogAction::Edited => "edited",
            ChangelogAction::Merged => "merged",
            ChangelogAction::Unmerged => "unmerged",
            ChangelogAction::Failed => "failed",
            ChangelogAction::Unfailed => "unfailed",
        };
        f.write_str(name)
    }
}

/// One changelog entry as stored in front matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub date: String,
    pub action: ChangelogAction,
    pub summary: String,
}

/// Append an entry dated today to the document's changelog.
///
/// A missing or malformed `changelog` field is replaced with a fresh
/// list rather than treated as an error.
pub fn append_entry(doc: &mut Document, action: ChangelogAction, summary: impl Into<String>) {
    let mut entries = read_entries(doc);
    entries.push(ChangelogEntry {
        date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        action,
        summary: summary.into(),
    });
    write_entries(doc, &entries);
}

/// Parse the document's changelog, skipping entries that don't fit the
/// expected shape.
pub fn read_entries(doc: &Document) -> Vec<ChangelogEntry> {
    let Some(serde_yaml::Value::Sequence(raw)) = doc.metadata.get("changelog") else {
        return Vec::new();
    };
    raw.iter()
        .filter_map(|value| serde_yaml::from_value(value.clone()).ok())
        .collect()
}

/// Strip merge/unmerge entries that reference a fork's display name.
///
/// Best-effort cosmetic cleanup when a fork is deleted: the match is a
/// substring test on the quoted name, exactly as the merge and unmerge
/// summaries embed it.
pub fn remove_entries_for_fork(doc: &mut Document, fork_name: &str) {
    let needle = format!("'{fork_name}'");
    let entries: Vec<ChangelogEntry> = read_entries(doc)
        .into_iter()
        .filter(|entry| {
            !matches!(
                entry.action,
                ChangelogAction::Merged | ChangelogAction::Unmerged
            ) || !entry.summary.contains(&needle)
        })
        .collect();
    write_entries(doc, &entries);
}

pub fn write_entries(doc: &mut Document, entries: &[ChangelogEntry]) {
    let value = serde_yaml::to_value(entries).unwrap_or(serde_yaml::Value::Sequence(Vec::new()));
    doc.set("changelog", value);
}
