//! # Forks - Git-Backed Recipe Manager
//!
//! Markdown recipes with YAML front matter, stored in a plain directory
//! under git. Recipes can be forked: a fork records only the sections
//! that differ from its base, and can later be merged back (overlaying
//! its sections onto the base) or unmerged (restoring the base from the
//! pre-merge commit).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forks::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env();
//!     forks::server::serve(settings).await
//! }
//! ```

pub mod changelog;
pub mod config;
pub mod document;
pub mod errors;
pub mod forks;
pub mod git;
pub mod index;
pub mod recipe;
pub mod sections;
pub mod server;
pub mod slug;
pub mod watcher;

// Re-export main types for library consumers
pub use document::Document;
pub use forks::{ForkRef, ForkService};
pub use index::RecipeIndex;
pub use recipe::{ForkDetail, ForkInput, Recipe, RecipeInput, RecipeSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
