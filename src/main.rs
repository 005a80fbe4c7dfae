use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

use forks::config::Settings;
use forks::git;
use forks::index::RecipeIndex;
use forks::server;

#[derive(Parser)]
#[command(name = "forks")]
#[command(about = "Git-backed recipe manager with forkable, mergeable recipes", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        /// Recipes directory (defaults to FORKS_RECIPES_DIR or ./recipes)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Initialize a recipes directory as a git repository
    Init {
        #[arg(short, long, default_value = "recipes")]
        path: PathBuf,
    },

    /// Scan a recipes directory and print what would be indexed
    Index {
        #[arg(short, long, default_value = "recipes")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forks=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();

    match cli.command {
        None => server::serve(settings).await,
        Some(Commands::Serve { port, path }) => {
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(path) = path {
                settings.recipes_dir = path;
            }
            server::serve(settings).await
        }
        Some(Commands::Init { path }) => {
            std::fs::create_dir_all(&path)?;
            git::init_if_needed(&path);
            println!(
                "{} Initialized recipe repository at {}",
                "✓".green(),
                path.display().to_string().bright_yellow()
            );
            Ok(())
        }
        Some(Commands::Index { path }) => {
            let index = RecipeIndex::new(path.clone());
            index.build();
            let recipes = index.list_all();
            println!(
                "{} {} recipes in {}",
                "✓".green(),
                recipes.len().to_string().bright_blue(),
                path.display().to_string().bright_yellow()
            );
            for recipe in &recipes {
                let forks = index.forks_of(&recipe.slug);
                if forks.is_empty() {
                    println!("  {} {}", recipe.slug.bright_white(), recipe.title.dimmed());
                } else {
                    println!(
                        "  {} {} ({} forks)",
                        recipe.slug.bright_white(),
                        recipe.title.dimmed(),
                        forks.len()
                    );
                }
            }
            Ok(())
        }
    }
}
