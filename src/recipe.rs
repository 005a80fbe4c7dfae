//! Recipe data models and markdown generation.
//!
//! [`RecipeInput`] and [`ForkInput`] are the structured request payloads;
//! [`RecipeSummary`] and [`Recipe`] are what the catalog and API serve
//! back. [`generate_markdown`] turns structured input into a complete
//! base-recipe document (front matter, title, the fixed section layout).

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::document::Document;

/// Catalog entry: front matter fields without the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub servings: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub date_added: Option<String>,
    pub source: Option<String>,
    pub image: Option<String>,
}

/// Full recipe: summary fields plus the markdown body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub content: String,
}

/// Structured payload to create or update a base recipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeInput {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub servings: Option<String>,
    #[serde(default)]
    pub prep_time: Option<String>,
    #[serde(default)]
    pub cook_time: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Structured payload to create or update a fork.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForkInput {
    pub fork_name: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Optimistic-concurrency token; stale values are rejected.
    #[serde(default)]
    pub version: Option<i64>,
}

/// Fork metadata plus raw body, served by the fork GET endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkDetail {
    pub name: String,
    pub fork_name: String,
    pub author: Option<String>,
    pub date_added: Option<String>,
    pub content: String,
}

/// Build a summary from a parsed document. Fork files fall back to their
/// `fork_name` and then the slug when `title` is absent.
pub fn summary_from_document(slug: &str, doc: &Document) -> RecipeSummary {
    RecipeSummary {
        slug: slug.to_string(),
        title: doc
            .get_str("title")
            .or_else(|| doc.get_str("fork_name"))
            .unwrap_or(slug)
            .to_string(),
        tags: doc
            .metadata
            .get("tags")
            .map(tags_from_value)
            .unwrap_or_default(),
        servings: field_as_string(doc, "servings"),
        prep_time: field_as_string(doc, "prep_time"),
        cook_time: field_as_string(doc, "cook_time"),
        date_added: field_as_string(doc, "date_added"),
        source: field_as_string(doc, "source"),
        image: field_as_string(doc, "image"),
    }
}

/// Parse only the front matter of a recipe file. Unreadable files yield
/// a bare slug-titled summary rather than an error, so one corrupt file
/// never breaks the whole catalog.
pub fn load_summary(path: &Path) -> RecipeSummary {
    let slug = file_slug(path);
    match Document::load(path) {
        Ok(doc) => summary_from_document(&slug, &doc),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to parse front matter");
            RecipeSummary {
                slug: slug.clone(),
                title: slug,
                tags: Vec::new(),
                servings: None,
                prep_time: None,
                cook_time: None,
                date_added: None,
                source: None,
                image: None,
            }
        }
    }
}

/// Parse a full recipe including front matter and markdown body.
pub fn load_recipe(path: &Path) -> Option<Recipe> {
    let slug = file_slug(path);
    let doc = Document::load(path).ok()?;
    Some(Recipe {
        summary: summary_from_document(&slug, &doc),
        content: doc.body,
    })
}

/// File stem as the slug: `pasta.md` → `pasta`,
/// `pasta.fork.vegan.md` → `pasta.fork.vegan`.
pub fn file_slug(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Render structured recipe data into a complete markdown document with
/// YAML front matter, a `# Title` preamble, and the fixed section layout
/// (Notes only when non-empty).
pub fn generate_markdown(data: &RecipeInput) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("---".to_string());
    lines.push(format!("title: {}", data.title));
    if let Some(source) = &data.source {
        lines.push(format!("source: {source}"));
    }
    if let Some(author) = &data.author {
        lines.push(format!("author: {author}"));
    }
    if !data.tags.is_empty() {
        lines.push(format!("tags: [{}]", data.tags.join(", ")));
    }
    if let Some(servings) = &data.servings {
        lines.push(format!("servings: {servings}"));
    }
    if let Some(prep_time) = &data.prep_time {
        lines.push(format!("prep_time: {prep_time}"));
    }
    if let Some(cook_time) = &data.cook_time {
        lines.push(format!("cook_time: {cook_time}"));
    }
    lines.push(format!(
        "date_added: {}",
        chrono::Local::now().format("%Y-%m-%d")
    ));
    if let Some(image) = &data.image {
        lines.push(format!("image: {image}"));
    }
    if data.likes != 0 {
        lines.push(format!("likes: {}", data.likes));
    }
    lines.push("---".to_string());

    lines.push(String::new());
    lines.push(format!("# {}", data.title));

    lines.push(String::new());
    lines.push("## Ingredients".to_string());
    lines.push(String::new());
    for item in &data.ingredients {
        lines.push(format!("- {item}"));
    }

    lines.push(String::new());
    lines.push("## Instructions".to_string());
    lines.push(String::new());
    for (i, step) in data.instructions.iter().enumerate() {
        lines.push(format!("{}. {step}", i + 1));
    }

    if !data.notes.is_empty() {
        lines.push(String::new());
        lines.push("## Notes".to_string());
        lines.push(String::new());
        for note in &data.notes {
            lines.push(format!("- {note}"));
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

fn tags_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(seq) => seq.iter().filter_map(scalar_to_string).collect(),
        Value::String(tag) => vec![tag.clone()],
        _ => Vec::new(),
    }
}

// YAML front matter is hand-edited: `servings: 4` arrives as a number,
// `servings: "4-6"` as a string. Stringify scalars either way.
fn field_as_string(doc: &Document, key: &str) -> Option<String> {
    doc.metadata.get(key).and_then(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> RecipeInput {
        RecipeInput {
            title: "Pancakes".to_string(),
            tags: vec!["breakfast".to_string(), "quick".to_string()],
            servings: Some("4".to_string()),
            prep_time: Some("10 min".to_string()),
            cook_time: None,
            source: None,
            author: None,
            image: None,
            likes: 0,
            ingredients: vec!["1 cup flour".to_string(), "2 eggs".to_string()],
            instructions: vec!["Mix".to_string(), "Fry".to_string()],
            notes: vec!["Serve warm".to_string()],
        }
    }

    #[test]
    fn test_generate_markdown_layout() {
        let md = generate_markdown(&sample_input());
        assert!(md.starts_with("---\ntitle: Pancakes\n"));
        assert!(md.contains("tags: [breakfast, quick]"));
        assert!(md.contains("\n# Pancakes\n"));
        assert!(md.contains("\n## Ingredients\n\n- 1 cup flour\n- 2 eggs\n"));
        assert!(md.contains("\n## Instructions\n\n1. Mix\n2. Fry\n"));
        assert!(md.contains("\n## Notes\n\n- Serve warm\n"));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn test_generate_markdown_omits_empty_notes() {
        let mut input = sample_input();
        input.notes.clear();
        assert!(!generate_markdown(&input).contains("## Notes"));
    }

    #[test]
    fn test_generated_markdown_parses_back() {
        let md = generate_markdown(&sample_input());
        let doc = Document::parse(&md).unwrap();
        let summary = summary_from_document("pancakes", &doc);
        assert_eq!(summary.title, "Pancakes");
        assert_eq!(summary.tags, ["breakfast", "quick"]);
        assert_eq!(summary.servings.as_deref(), Some("4"));

        let sections = crate::sections::parse_sections(&doc.body);
        assert_eq!(sections["Ingredients"], "- 1 cup flour\n- 2 eggs");
    }

    #[test]
    fn test_summary_numeric_servings() {
        let doc = Document::parse("---\ntitle: Soup\nservings: 6\n---\n\n# Soup\n").unwrap();
        let summary = summary_from_document("soup", &doc);
        assert_eq!(summary.servings.as_deref(), Some("6"));
    }

    #[test]
    fn test_summary_falls_back_to_fork_name() {
        let doc = Document::parse("---\nfork_name: Spicy\nforked_from: soup\n---\n").unwrap();
        let summary = summary_from_document("soup.fork.spicy", &doc);
        assert_eq!(summary.title, "Spicy");
    }

    #[test]
    fn test_file_slug() {
        assert_eq!(file_slug(Path::new("/recipes/pasta.md")), "pasta");
        assert_eq!(
            file_slug(Path::new("/recipes/pasta.fork.vegan.md")),
            "pasta.fork.vegan"
        );
    }
}
