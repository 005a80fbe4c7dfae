//! In-memory recipe catalog.
//!
//! A dictionary keyed by slug, rebuilt from the recipes directory at
//! startup and kept current by the routes and the file watcher. Fork
//! files (`<base>.fork.<name>.md`) are indexed under their full stem so
//! listings can filter them out while fork lookups stay cheap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::recipe::{self, Recipe, RecipeSummary};

/// Marker that distinguishes fork files from base recipe files. The
/// naming convention `<base-slug>.fork.<fork-slug>.md` is a bit-exact
/// contract shared with routing and the workflow layer.
pub const FORK_MARKER: &str = ".fork.";

#[derive(Default)]
struct Inner {
    recipes: HashMap<String, RecipeSummary>,
    ingredients: HashMap<String, Vec<String>>,
}

/// Catalog of all recipes and forks in one directory.
pub struct RecipeIndex {
    recipes_dir: PathBuf,
    inner: RwLock<Inner>,
}

impl RecipeIndex {
    pub fn new(recipes_dir: PathBuf) -> Self {
        Self {
            recipes_dir,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn recipes_dir(&self) -> &Path {
        &self.recipes_dir
    }

    /// Scan the recipes directory and rebuild the catalog from scratch.
    pub fn build(&self) {
        let mut inner = self.inner.write();
        inner.recipes.clear();
        inner.ingredients.clear();
        drop(inner);

        let entries = match std::fs::read_dir(&self.recipes_dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    dir = %self.recipes_dir.display(),
                    error = %err,
                    "recipes directory not readable"
                );
                return;
            }
        };

        let mut count = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                self.add_or_update(&path);
                count += 1;
            }
        }
        tracing::info!(count, dir = %self.recipes_dir.display(), "indexed recipes");
    }

    /// Index or re-index one file.
    pub fn add_or_update(&self, path: &Path) {
        let summary = recipe::load_summary(path);
        let ingredients = extract_ingredients(path);
        let mut inner = self.inner.write();
        inner.ingredients.insert(summary.slug.clone(), ingredients);
        inner.recipes.insert(summary.slug.clone(), summary);
    }

    /// Drop one slug from the catalog. Unknown slugs are a no-op.
    pub fn remove(&self, slug: &str) {
        let mut inner = self.inner.write();
        inner.recipes.remove(slug);
        inner.ingredients.remove(slug);
    }

    /// All base recipes, sorted by case-insensitive title. Forks are
    /// excluded from listings.
    pub fn list_all(&self) -> Vec<RecipeSummary> {
        let inner = self.inner.read();
        let mut recipes: Vec<RecipeSummary> = inner
            .recipes
            .iter()
            .filter(|(slug, _)| !slug.contains(FORK_MARKER))
            .map(|(_, summary)| summary.clone())
            .collect();
        recipes.sort_by_key(|summary| summary.title.to_lowercase());
        recipes
    }

    /// Base recipes carrying every one of the given tags.
    pub fn filter_by_tags(&self, tags: &[String]) -> Vec<RecipeSummary> {
        self.list_all()
            .into_iter()
            .filter(|summary| tags.iter().all(|tag| summary.tags.contains(tag)))
            .collect()
    }

    /// Fork summaries belonging to one base recipe.
    pub fn forks_of(&self, base_slug: &str) -> Vec<RecipeSummary> {
        let prefix = format!("{base_slug}{FORK_MARKER}");
        let inner = self.inner.read();
        let mut forks: Vec<RecipeSummary> = inner
            .recipes
            .iter()
            .filter(|(slug, _)| slug.starts_with(&prefix))
            .map(|(_, summary)| summary.clone())
            .collect();
        forks.sort_by_key(|summary| summary.title.to_lowercase());
        forks
    }

    /// Full recipe for one slug, read fresh from disk.
    pub fn get(&self, slug: &str) -> Option<Recipe> {
        if !self.inner.read().recipes.contains_key(slug) {
            return None;
        }
        let path = self.recipes_dir.join(format!("{slug}.md"));
        recipe::load_recipe(&path)
    }

    /// Substring search across titles, tags, and ingredient lines.
    /// A blank query lists everything.
    pub fn search(&self, query: &str) -> Vec<RecipeSummary> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return self.list_all();
        }

        let inner = self.inner.read();
        let mut results: Vec<RecipeSummary> = inner
            .recipes
            .iter()
            .filter(|(slug, _)| !slug.contains(FORK_MARKER))
            .filter(|(slug, summary)| {
                summary.title.to_lowercase().contains(&q)
                    || summary.tags.iter().any(|tag| tag.to_lowercase().contains(&q))
                    || inner
                        .ingredients
                        .get(*slug)
                        .is_some_and(|lines| lines.iter().any(|line| line.contains(&q)))
            })
            .map(|(_, summary)| summary.clone())
            .collect();
        results.sort_by_key(|summary| summary.title.to_lowercase());
        results
    }

    pub fn len(&self) -> usize {
        self.inner.read().recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().recipes.is_empty()
    }
}

// Lowercased `- item` lines from the Ingredients section, for search.
fn extract_ingredients(path: &Path) -> Vec<String> {
    let body = match crate::document::Document::load(path) {
        Ok(doc) => doc.body,
        Err(_) => std::fs::read_to_string(path).unwrap_or_default(),
    };

    let mut lines = Vec::new();
    let mut in_ingredients = false;
    for line in body.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix("## ") {
            in_ingredients = heading.trim().eq_ignore_ascii_case("ingredients");
            continue;
        }
        if in_ingredients {
            if let Some(item) = trimmed.strip_prefix("- ") {
                lines.push(item.to_lowercase());
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn sample_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "pancakes.md",
            "---\ntitle: Pancakes\ntags: [breakfast]\n---\n\n# Pancakes\n\n## Ingredients\n\n- flour\n- maple syrup\n",
        );
        write(
            tmp.path(),
            "chili.md",
            "---\ntitle: Chili\ntags: [dinner, spicy]\n---\n\n# Chili\n\n## Ingredients\n\n- beans\n",
        );
        write(
            tmp.path(),
            "chili.fork.vegan.md",
            "---\nfork_name: Vegan\nforked_from: chili\n---\n\n## Ingredients\n\n- lentils\n",
        );
        tmp
    }

    #[test]
    fn test_build_and_list() {
        let tmp = sample_dir();
        let index = RecipeIndex::new(tmp.path().to_path_buf());
        index.build();

        assert_eq!(index.len(), 3);
        let titles: Vec<String> = index.list_all().into_iter().map(|r| r.title).collect();
        // Forks are excluded and listings are title-sorted.
        assert_eq!(titles, ["Chili", "Pancakes"]);
    }

    #[test]
    fn test_forks_of() {
        let tmp = sample_dir();
        let index = RecipeIndex::new(tmp.path().to_path_buf());
        index.build();

        let forks = index.forks_of("chili");
        assert_eq!(forks.len(), 1);
        assert_eq!(forks[0].slug, "chili.fork.vegan");
        assert!(index.forks_of("pancakes").is_empty());
    }

    #[test]
    fn test_filter_by_tags() {
        let tmp = sample_dir();
        let index = RecipeIndex::new(tmp.path().to_path_buf());
        index.build();

        let spicy = index.filter_by_tags(&["spicy".to_string()]);
        assert_eq!(spicy.len(), 1);
        assert_eq!(spicy[0].slug, "chili");
        assert!(index
            .filter_by_tags(&["spicy".to_string(), "breakfast".to_string()])
            .is_empty());
    }

    #[test]
    fn test_search_by_ingredient() {
        let tmp = sample_dir();
        let index = RecipeIndex::new(tmp.path().to_path_buf());
        index.build();

        let results = index.search("maple");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].slug, "pancakes");
    }

    #[test]
    fn test_get_reads_from_disk() {
        let tmp = sample_dir();
        let index = RecipeIndex::new(tmp.path().to_path_buf());
        index.build();

        let recipe = index.get("chili").unwrap();
        assert_eq!(recipe.summary.title, "Chili");
        assert!(recipe.content.contains("## Ingredients"));
        assert!(index.get("missing").is_none());
    }

    #[test]
    fn test_add_update_remove() {
        let tmp = sample_dir();
        let index = RecipeIndex::new(tmp.path().to_path_buf());
        index.build();

        write(
            tmp.path(),
            "soup.md",
            "---\ntitle: Soup\n---\n\n# Soup\n",
        );
        index.add_or_update(&tmp.path().join("soup.md"));
        assert!(index.get("soup").is_some());

        index.remove("soup");
        assert!(index.get("soup").is_none());
    }
}
