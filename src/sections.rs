//! Section-level parsing, diffing, and merging for the fork system.
//!
//! Recipe bodies are plain markdown split on `## ` headings. A fork file
//! stores only the sections that differ from its base recipe, so every
//! fork operation funnels through the primitives here: parse a body into
//! named sections, diff structured fork data against the base, render a
//! minimal fork document, and overlay fork sections onto the base.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Key under which content before the first `## ` heading is stored
/// (usually the `# Title` line).
pub const PREAMBLE: &str = "_preamble";

/// The three section names a fork is allowed to override.
pub const CANONICAL_SECTIONS: [&str; 3] = ["Ingredients", "Instructions", "Notes"];

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^##\s+(.+)$").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Parse a markdown body (after front matter) into `{section name: content}`.
///
/// Splits on `## ` headings. Content before the first heading is stored
/// under [`PREAMBLE`]. Section content is trimmed; sections that end up
/// empty are dropped. Insertion order is preserved, which the merger
/// relies on.
pub fn parse_sections(content: &str) -> IndexMap<String, String> {
    let mut sections: IndexMap<String, String> = IndexMap::new();
    let mut current_key = PREAMBLE.to_string();
    let mut current_lines: Vec<&str> = Vec::new();

    for line in content.split('\n') {
        if let Some(caps) = HEADING_RE.captures(line) {
            sections.insert(current_key, current_lines.join("\n").trim().to_string());
            current_key = caps[1].trim().to_string();
            current_lines.clear();
        } else {
            current_lines.push(line);
        }
    }
    sections.insert(current_key, current_lines.join("\n").trim().to_string());

    sections.retain(|_, content| !content.is_empty());
    sections
}

/// Render structured recipe data into section content strings.
///
/// Ingredients and notes become `- item` bullet lists, instructions a
/// 1-based numbered list. Empty lists produce no entry.
pub fn sections_from_recipe_data(
    ingredients: &[String],
    instructions: &[String],
    notes: &[String],
) -> IndexMap<String, String> {
    let mut sections = IndexMap::new();
    if !ingredients.is_empty() {
        let body: Vec<String> = ingredients.iter().map(|item| format!("- {item}")).collect();
        sections.insert("Ingredients".to_string(), body.join("\n"));
    }
    if !instructions.is_empty() {
        let body: Vec<String> = instructions
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {step}", i + 1))
            .collect();
        sections.insert("Instructions".to_string(), body.join("\n"));
    }
    if !notes.is_empty() {
        let body: Vec<String> = notes.iter().map(|note| format!("- {note}")).collect();
        sections.insert("Notes".to_string(), body.join("\n"));
    }
    sections
}

/// Compare structured fork data against the base recipe body.
///
/// Returns only the sections that differ from the base, in canonical
/// order. Comparison is whitespace-insensitive (runs collapse to single
/// spaces) so pure reformatting never registers as a change. A section
/// the base has but the fork data drops is recorded with an empty string;
/// callers decide whether that deletion is allowed.
pub fn diff_sections(
    base_content: &str,
    fork_ingredients: &[String],
    fork_instructions: &[String],
    fork_notes: &[String],
) -> IndexMap<String, String> {
    let base_sections = parse_sections(base_content);
    let fork_sections = sections_from_recipe_data(fork_ingredients, fork_instructions, fork_notes);

    let mut changed = IndexMap::new();
    for key in CANONICAL_SECTIONS {
        let base_text = normalize(base_sections.get(key).map_or("", String::as_str));
        let fork_text = normalize(fork_sections.get(key).map_or("", String::as_str));
        if fork_text != base_text {
            if !fork_text.is_empty() {
                changed.insert(key.to_string(), fork_sections[key].clone());
            } else if !base_text.is_empty() {
                changed.insert(key.to_string(), String::new());
            }
        }
    }
    changed
}

/// Names of sections whose content differs between two markdown bodies.
///
/// Used to build human-readable edit summaries ("Edited Ingredients,
/// Notes") when a fork is updated. Base order first, then sections only
/// the new body has. The preamble is ignored.
pub fn detect_changed_sections(old_content: &str, new_content: &str) -> Vec<String> {
    let old_sections = parse_sections(old_content);
    let new_sections = parse_sections(new_content);

    let mut changed = Vec::new();
    for (name, old_text) in &old_sections {
        if name == PREAMBLE {
            continue;
        }
        let new_text = new_sections.get(name).map_or("", String::as_str);
        if normalize(old_text) != normalize(new_text) {
            changed.push(name.clone());
        }
    }
    for (name, new_text) in &new_sections {
        if name == PREAMBLE || old_sections.contains_key(name) {
            continue;
        }
        if !normalize(new_text).is_empty() {
            changed.push(name.clone());
        }
    }
    changed
}

/// Render a complete fork markdown document: front matter naming the base
/// recipe, followed by the changed sections only.
///
/// Sections recorded as deletions (empty content) are not emitted, so a
/// rendered fork never distinguishes "unchanged" from "removed" — the
/// workflow layer rejects deletions before reaching this point.
pub fn generate_fork_markdown(
    forked_from: &str,
    fork_name: &str,
    changed_sections: &IndexMap<String, String>,
    author: Option<&str>,
    forked_at_commit: Option<&str>,
) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("---".to_string());
    lines.push(format!("forked_from: {forked_from}"));
    lines.push(format!("fork_name: {fork_name}"));
    if let Some(author) = author {
        lines.push(format!("author: {author}"));
    }
    lines.push(format!(
        "date_added: {}",
        chrono::Local::now().format("%Y-%m-%d")
    ));
    if let Some(commit) = forked_at_commit {
        lines.push(format!("forked_at_commit: {commit}"));
    }
    lines.push("---".to_string());

    for (name, content) in changed_sections {
        if !content.is_empty() {
            lines.push(String::new());
            lines.push(format!("## {name}"));
            lines.push(String::new());
            lines.push(content.clone());
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Merge a base recipe body with a fork's section overrides.
///
/// For every section in the base (in base order) the fork's version wins
/// when present, otherwise the base's is kept. Sections only the fork
/// defines are appended at the end. The base preamble carries through
/// verbatim. Export preview and the persisted merge both call this, so
/// the preview is exactly what merging will write.
pub fn merge_content(base_content: &str, fork_content: &str) -> String {
    let base_sections = parse_sections(base_content);
    let fork_sections = parse_sections(fork_content);

    let mut lines: Vec<String> = Vec::new();
    if let Some(preamble) = base_sections.get(PREAMBLE) {
        lines.push(preamble.clone());
    }

    let mut emit = |name: &str, content: &str| {
        if !content.is_empty() {
            lines.push(String::new());
            lines.push(format!("## {name}"));
            lines.push(String::new());
            lines.push(content.to_string());
        }
    };

    for (name, base_text) in &base_sections {
        if name == PREAMBLE {
            continue;
        }
        let content = fork_sections.get(name).unwrap_or(base_text);
        emit(name, content);
    }

    for (name, fork_text) in &fork_sections {
        if name == PREAMBLE || base_sections.contains_key(name) {
            continue;
        }
        emit(name, fork_text);
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Collapse whitespace runs to single spaces and trim, for comparisons.
fn normalize(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "# Pancakes\n\n## Ingredients\n\n- 1 cup flour\n- 2 eggs\n\n## Instructions\n\n1. Mix\n2. Fry\n\n## Notes\n\n- Serve warm";

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_sections_basic() {
        let sections = parse_sections(BASE);
        assert_eq!(sections[PREAMBLE], "# Pancakes");
        assert_eq!(sections["Ingredients"], "- 1 cup flour\n- 2 eggs");
        assert_eq!(sections["Instructions"], "1. Mix\n2. Fry");
        assert_eq!(sections["Notes"], "- Serve warm");
    }

    #[test]
    fn test_parse_sections_preserves_order() {
        let sections = parse_sections(BASE);
        let names: Vec<&str> = sections.keys().map(String::as_str).collect();
        assert_eq!(names, [PREAMBLE, "Ingredients", "Instructions", "Notes"]);
    }

    #[test]
    fn test_parse_sections_empty_input() {
        assert!(parse_sections("").is_empty());
    }

    #[test]
    fn test_parse_sections_drops_empty_sections() {
        let sections = parse_sections("## Ingredients\n\n## Notes\n\n- a note");
        assert!(!sections.contains_key("Ingredients"));
        assert_eq!(sections["Notes"], "- a note");
        assert!(!sections.contains_key(PREAMBLE));
    }

    #[test]
    fn test_parse_sections_keeps_internal_blank_lines() {
        let sections = parse_sections("## Notes\n\npara one\n\npara two\n");
        assert_eq!(sections["Notes"], "para one\n\npara two");
    }

    #[test]
    fn test_parse_sections_arbitrary_headings() {
        let sections = parse_sections("## Equipment\n\n- skillet");
        assert_eq!(sections["Equipment"], "- skillet");
    }

    #[test]
    fn test_sections_from_recipe_data() {
        let sections = sections_from_recipe_data(
            &strings(&["flour", "eggs"]),
            &strings(&["Mix", "Fry"]),
            &[],
        );
        assert_eq!(sections["Ingredients"], "- flour\n- eggs");
        assert_eq!(sections["Instructions"], "1. Mix\n2. Fry");
        assert!(!sections.contains_key("Notes"));
    }

    #[test]
    fn test_diff_single_changed_section() {
        // Only the ingredient list differs; instructions match the base.
        let base = "# T\n\n## Ingredients\n\n- flour\n- 2 eggs\n\n## Instructions\n\n1. Mix";
        let changed = diff_sections(
            base,
            &strings(&["flour", "2 flax eggs"]),
            &strings(&["Mix"]),
            &[],
        );
        assert_eq!(changed.len(), 1);
        assert_eq!(changed["Ingredients"], "- flour\n- 2 flax eggs");
    }

    #[test]
    fn test_diff_identical_data_is_empty() {
        let changed = diff_sections(
            BASE,
            &strings(&["1 cup flour", "2 eggs"]),
            &strings(&["Mix", "Fry"]),
            &strings(&["Serve warm"]),
        );
        assert!(changed.is_empty());
    }

    #[test]
    fn test_diff_is_whitespace_insensitive() {
        let base = "## Ingredients\n\n- flour\n-   2  eggs";
        let changed = diff_sections(base, &strings(&["flour", "2 eggs"]), &[], &[]);
        assert!(changed.is_empty());
    }

    #[test]
    fn test_diff_records_removed_section_as_empty() {
        let changed = diff_sections(
            BASE,
            &strings(&["1 cup flour", "2 eggs"]),
            &strings(&["Mix", "Fry"]),
            &[],
        );
        assert_eq!(changed.len(), 1);
        assert_eq!(changed["Notes"], "");
    }

    #[test]
    fn test_diff_canonical_order() {
        let changed = diff_sections(
            BASE,
            &strings(&["butter"]),
            &strings(&["Melt"]),
            &strings(&["New note"]),
        );
        let names: Vec<&str> = changed.keys().map(String::as_str).collect();
        assert_eq!(names, ["Ingredients", "Instructions", "Notes"]);
    }

    #[test]
    fn test_detect_changed_sections() {
        let old = "## Ingredients\n\n- flour\n\n## Notes\n\n- a";
        let new = "## Ingredients\n\n- rice flour\n\n## Notes\n\n- a\n\n## Equipment\n\n- pan";
        assert_eq!(
            detect_changed_sections(old, new),
            ["Ingredients", "Equipment"]
        );
    }

    #[test]
    fn test_generate_fork_markdown() {
        let mut changed = IndexMap::new();
        changed.insert("Ingredients".to_string(), "- chili".to_string());
        let md = generate_fork_markdown("pancakes", "Spicy", &changed, Some("alex"), Some("abc123"));
        assert!(md.starts_with("---\nforked_from: pancakes\nfork_name: Spicy\nauthor: alex\n"));
        assert!(md.contains("forked_at_commit: abc123"));
        assert!(md.contains("\n## Ingredients\n\n- chili"));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn test_generate_fork_markdown_skips_deletions() {
        let mut changed = IndexMap::new();
        changed.insert("Notes".to_string(), String::new());
        let md = generate_fork_markdown("pancakes", "Plain", &changed, None, None);
        assert!(!md.contains("## Notes"));
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = "# Title\n\n## Ingredients\n\n- flour\n\n## Notes\n\n- a note";
        let fork = "## Notes\n\n- new note";
        let merged = merge_content(base, fork);
        assert_eq!(
            merged,
            "# Title\n\n## Ingredients\n\n- flour\n\n## Notes\n\n- new note\n"
        );
    }

    #[test]
    fn test_merge_empty_overlay_round_trips() {
        let merged = merge_content(BASE, "");
        assert_eq!(parse_sections(&merged), parse_sections(BASE));
    }

    #[test]
    fn test_merge_appends_fork_only_sections() {
        let base = "# T\n\n## Ingredients\n\n- flour";
        let fork = "## Equipment\n\n- skillet";
        let merged = merge_content(base, fork);
        let sections = parse_sections(&merged);
        let names: Vec<&str> = sections.keys().map(String::as_str).collect();
        assert_eq!(names, [PREAMBLE, "Ingredients", "Equipment"]);
    }

    #[test]
    fn test_merge_preserves_base_order() {
        let base = "# T\n\n## Notes\n\n- n\n\n## Ingredients\n\n- flour";
        let fork = "## Ingredients\n\n- rice";
        let names: Vec<String> = parse_sections(&merge_content(base, fork))
            .keys()
            .cloned()
            .collect();
        assert_eq!(names, [PREAMBLE, "Notes", "Ingredients"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fork = "## Ingredients\n\n- rice flour";
        let once = merge_content(BASE, fork);
        let twice = merge_content(&once, fork);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merged_section_equals_fork_section() {
        let fork = "## Instructions\n\n1. Whisk\n2. Rest\n3. Fry";
        let merged = merge_content(BASE, fork);
        assert_eq!(
            parse_sections(&merged)["Instructions"],
            parse_sections(fork)["Instructions"]
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  a\n\n b\tc  "), "a b c");
        assert_eq!(normalize(""), "");
    }
}
