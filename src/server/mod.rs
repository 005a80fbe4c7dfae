//! HTTP layer: axum router, shared state, and server startup.

pub mod forks;
pub mod recipes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use colored::Colorize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::forks::ForkService;
use crate::git;
use crate::index::RecipeIndex;
use crate::watcher;

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<RecipeIndex>,
    pub forks: Arc<ForkService>,
    pub recipes_dir: PathBuf,
}

impl AppState {
    pub fn new(recipes_dir: PathBuf) -> Self {
        let index = Arc::new(RecipeIndex::new(recipes_dir.clone()));
        index.build();
        let forks = Arc::new(ForkService::new(recipes_dir.clone(), index.clone()));
        Self {
            index,
            forks,
            recipes_dir,
        }
    }
}

/// Build the full API router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Forks" }))
        .route("/health", get(|| async { axum::Json("OK") }))
        .route(
            "/api/recipes",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route("/api/search", get(recipes::search_recipes))
        .route(
            "/api/recipes/{slug}",
            get(recipes::get_recipe)
                .put(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route("/api/recipes/{slug}/history", get(recipes::recipe_history))
        .route(
            "/api/recipes/{slug}/forks",
            get(recipes::list_forks).post(forks::create_fork),
        )
        .route(
            "/api/recipes/{slug}/forks/{fork}",
            get(forks::get_fork)
                .put(forks::update_fork)
                .delete(forks::delete_fork),
        )
        .route(
            "/api/recipes/{slug}/forks/{fork}/export",
            get(forks::export_fork),
        )
        .route(
            "/api/recipes/{slug}/forks/{fork}/history",
            get(forks::fork_history),
        )
        .route(
            "/api/recipes/{slug}/forks/{fork}/merge",
            post(forks::merge_fork),
        )
        .route(
            "/api/recipes/{slug}/forks/{fork}/unmerge",
            post(forks::unmerge_fork),
        )
        .route(
            "/api/recipes/{slug}/forks/{fork}/fail",
            post(forks::fail_fork),
        )
        .route(
            "/api/recipes/{slug}/forks/{fork}/unfail",
            post(forks::unfail_fork),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize storage, start the watcher, and serve the API.
pub async fn serve(settings: Settings) -> Result<()> {
    std::fs::create_dir_all(&settings.recipes_dir)?;
    git::init_if_needed(&settings.recipes_dir);

    let state = AppState::new(settings.recipes_dir.clone());
    let _watcher = watcher::start(state.index.clone(), settings.recipes_dir.clone())?;

    let app = router(state);
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "{} Serving recipes from {} at {}",
        "✓".green(),
        settings.recipes_dir.display().to_string().bright_yellow(),
        format!("http://{addr}").bright_blue()
    );

    axum::serve(listener, app).await?;
    Ok(())
}
