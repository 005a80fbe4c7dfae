//! Recipe CRUD, search, and history routes.

use std::collections::HashMap;
use std::fs;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::changelog::{self, ChangelogAction};
use crate::document::Document;
use crate::errors::ApiError;
use crate::git;
use crate::recipe::{self, Recipe, RecipeInput, RecipeSummary};
use crate::slug::{slugify, validate_slug};

use super::AppState;

/// `GET /api/recipes` — all base recipes, optionally filtered by
/// a comma-separated `tags` query.
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<RecipeSummary>> {
    let recipes = match params.get("tags").filter(|t| !t.is_empty()) {
        Some(tags) => {
            let tags: Vec<String> = tags
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            state.index.filter_by_tags(&tags)
        }
        None => state.index.list_all(),
    };
    Json(recipes)
}

/// `GET /api/search?q=` — substring match over titles, tags, and
/// ingredients.
pub async fn search_recipes(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<RecipeSummary>>, ApiError> {
    let query = params
        .get("q")
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing search query"))?;
    Ok(Json(state.index.search(query)))
}

/// `GET /api/recipes/{slug}`
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    validate_slug(&slug, "slug")?;
    state
        .index
        .get(&slug)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Recipe not found"))
}

/// `GET /api/recipes/{slug}/forks`
pub async fn list_forks(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<RecipeSummary>>, ApiError> {
    validate_slug(&slug, "slug")?;
    if !state.recipes_dir.join(format!("{slug}.md")).is_file() {
        return Err(ApiError::not_found("Recipe not found"));
    }
    Ok(Json(state.index.forks_of(&slug)))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub content: bool,
}

/// `GET /api/recipes/{slug}/history` — recent commits touching the
/// recipe file, newest first.
pub async fn recipe_history(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<git::LogEntry>>, ApiError> {
    validate_slug(&slug, "slug")?;
    let path = state.recipes_dir.join(format!("{slug}.md"));
    if !path.is_file() {
        return Err(ApiError::not_found("Recipe not found"));
    }
    let mut entries = git::log(&state.recipes_dir, &path, 20);
    if query.content {
        for entry in &mut entries {
            entry.content = git::show(&state.recipes_dir, &entry.id, &path);
        }
    }
    Ok(Json(entries))
}

/// `POST /api/recipes` — create a recipe from structured input. The
/// slug is derived from the title.
pub async fn create_recipe(
    State(state): State<AppState>,
    Json(input): Json<RecipeInput>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let slug = slugify(&input.title);
    if slug.is_empty() {
        return Err(ApiError::bad_request("Invalid recipe title"));
    }
    validate_slug(&slug, "slug")?;

    let path = state.recipes_dir.join(format!("{slug}.md"));
    if path.exists() {
        return Err(ApiError::conflict("Recipe already exists"));
    }

    let markdown = recipe::generate_markdown(&input);
    let mut doc = Document::parse(&markdown)?;
    changelog::append_entry(&mut doc, ChangelogAction::Created, "Recipe created");
    doc.save(&path)?;
    git::commit(
        &state.recipes_dir,
        &[&path],
        &format!("Create recipe: {} ({slug})", input.title),
    );
    state.index.add_or_update(&path);

    let recipe = state
        .index
        .get(&slug)
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// `PUT /api/recipes/{slug}` — regenerate the recipe from structured
/// input, keeping its changelog and date_added.
pub async fn update_recipe(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<RecipeInput>,
) -> Result<Json<Recipe>, ApiError> {
    validate_slug(&slug, "slug")?;
    let path = state.recipes_dir.join(format!("{slug}.md"));
    if !path.is_file() {
        return Err(ApiError::not_found("Recipe not found"));
    }

    let old_doc = Document::load(&path)?;
    let markdown = recipe::generate_markdown(&input);
    let mut doc = Document::parse(&markdown)?;
    if let Some(date_added) = old_doc.get_str("date_added") {
        doc.set("date_added", date_added);
    }
    changelog::write_entries(&mut doc, &changelog::read_entries(&old_doc));
    changelog::append_entry(&mut doc, ChangelogAction::Edited, "Recipe edited");
    doc.save(&path)?;
    git::commit(
        &state.recipes_dir,
        &[&path],
        &format!("Update recipe: {} ({slug})", input.title),
    );
    state.index.add_or_update(&path);

    state
        .index
        .get(&slug)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Recipe not found"))
}

/// `DELETE /api/recipes/{slug}` — remove the recipe and all of its
/// fork files.
pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_slug(&slug, "slug")?;
    let path = state.recipes_dir.join(format!("{slug}.md"));
    if !path.is_file() {
        return Err(ApiError::not_found("Recipe not found"));
    }

    let mut removed = vec![path.clone()];
    for fork in state.index.forks_of(&slug) {
        let fork_path = state.recipes_dir.join(format!("{}.md", fork.slug));
        if fork_path.is_file() {
            fs::remove_file(&fork_path).map_err(anyhow::Error::from)?;
            removed.push(fork_path);
        }
    }
    fs::remove_file(&path).map_err(anyhow::Error::from)?;

    let staged: Vec<&std::path::Path> = removed.iter().map(|p| p.as_path()).collect();
    git::commit(
        &state.recipes_dir,
        &staged,
        &format!("Delete recipe: {slug}"),
    );
    for p in &removed {
        state.index.remove(&recipe::file_slug(p));
    }
    Ok(StatusCode::NO_CONTENT)
}
