//! Markdown documents with YAML front matter.
//!
//! Every recipe and fork on disk is a markdown file fenced with a `---`
//! front matter block. [`Document`] is the read-modify-write unit for
//! those files: metadata and body travel together, and a single
//! [`Document::save`] writes both atomically from the caller's point of
//! view (one file write per document, never content and metadata in
//! separate passes).

use std::path::Path;

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};

/// A parsed markdown document: YAML front matter plus markdown body.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub metadata: Mapping,
    pub body: String,
}

impl Document {
    /// Parse raw file text into front matter and body.
    ///
    /// A document without a leading `---` fence has empty metadata and
    /// its full text as the body. An unterminated fence is an error.
    pub fn parse(raw: &str) -> Result<Self> {
        let Some(rest) = raw.strip_prefix("---\n").or_else(|| raw.strip_prefix("---\r\n")) else {
            return Ok(Self {
                metadata: Mapping::new(),
                body: raw.to_string(),
            });
        };

        // The closing fence must be a whole `---` line; a YAML value
        // merely starting with dashes is not a fence.
        let mut offset = 0;
        let mut fence = None;
        for line in rest.split_inclusive('\n') {
            if line.trim_end_matches(['\r', '\n']) == "---" {
                fence = Some((offset, offset + line.len()));
                break;
            }
            offset += line.len();
        }
        let Some((fence_start, fence_end)) = fence else {
            anyhow::bail!("unterminated front matter block");
        };
        let (yaml, body) = (&rest[..fence_start], &rest[fence_end..]);

        let metadata: Mapping = if yaml.trim().is_empty() {
            Mapping::new()
        } else {
            serde_yaml::from_str(yaml).context("invalid YAML front matter")?
        };

        Ok(Self {
            metadata,
            body: body.trim_start_matches('\n').to_string(),
        })
    }

    /// Read and parse a document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&raw)
    }

    /// Serialize back to file text: front matter fence, YAML metadata,
    /// blank line, body, trailing newline.
    pub fn render(&self) -> String {
        let yaml = serde_yaml::to_string(&self.metadata).unwrap_or_default();
        let body = self.body.trim_end();
        if body.is_empty() {
            format!("---\n{yaml}---\n")
        } else {
            format!("---\n{yaml}---\n\n{body}\n")
        }
    }

    /// Write the rendered document to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// String-valued metadata field, if present.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Integer-valued metadata field, if present.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(Value::as_i64)
    }

    /// Set a metadata field, replacing any existing value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata
            .insert(Value::String(key.to_string()), value.into());
    }

    /// Remove a metadata field. Missing keys are a no-op.
    pub fn remove(&mut self, key: &str) {
        self.metadata.remove(key);
    }

    /// True if the field is present (whatever its value).
    pub fn has(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_front_matter() {
        let doc = Document::parse("---\ntitle: Pancakes\nlikes: 3\n---\n\n# Pancakes\n").unwrap();
        assert_eq!(doc.get_str("title"), Some("Pancakes"));
        assert_eq!(doc.get_i64("likes"), Some(3));
        assert_eq!(doc.body, "# Pancakes\n");
    }

    #[test]
    fn test_parse_without_front_matter() {
        let doc = Document::parse("# Just a title\n").unwrap();
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "# Just a title\n");
    }

    #[test]
    fn test_parse_unterminated_fence_fails() {
        assert!(Document::parse("---\ntitle: Broken\n").is_err());
    }

    #[test]
    fn test_parse_fence_must_be_whole_line() {
        // A metadata line that merely starts with dashes is not a fence.
        let doc =
            Document::parse("---\ntitle: Pancakes\n----: dashes\n---\n\n# Pancakes\n").unwrap();
        assert_eq!(doc.get_str("title"), Some("Pancakes"));
        assert_eq!(doc.get_str("----"), Some("dashes"));
        assert_eq!(doc.body, "# Pancakes\n");
    }

    #[test]
    fn test_parse_fence_at_end_of_file() {
        let doc = Document::parse("---\ntitle: Bare\n---").unwrap();
        assert_eq!(doc.get_str("title"), Some("Bare"));
        assert!(doc.body.is_empty());
    }

    #[test]
    fn test_render_round_trip() {
        let mut doc = Document::default();
        doc.set("title", "Pancakes");
        doc.set("tags", vec![Value::from("breakfast")]);
        doc.body = "# Pancakes\n\n## Ingredients\n\n- flour".to_string();

        let rendered = doc.render();
        let reparsed = Document::parse(&rendered).unwrap();
        assert_eq!(reparsed.get_str("title"), Some("Pancakes"));
        assert_eq!(reparsed.body.trim_end(), doc.body);
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn test_render_empty_body() {
        let mut doc = Document::default();
        doc.set("fork_name", "Spicy");
        let rendered = doc.render();
        assert!(rendered.starts_with("---\n"));
        assert!(rendered.ends_with("---\n"));
    }

    #[test]
    fn test_set_and_remove() {
        let mut doc = Document::default();
        doc.set("merged_at", "2026-08-30");
        assert!(doc.has("merged_at"));
        doc.remove("merged_at");
        assert!(!doc.has("merged_at"));
    }
}
