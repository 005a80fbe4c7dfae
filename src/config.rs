//! Runtime settings, read from `FORKS_*` environment variables.

use std::path::PathBuf;

/// Server and storage configuration with sensible local defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the recipe markdown files and their git repo.
    pub recipes_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recipes_dir: PathBuf::from("recipes"),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Settings {
    /// Build settings from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            recipes_dir: std::env::var("FORKS_RECIPES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.recipes_dir),
            host: std::env::var("FORKS_HOST").unwrap_or(defaults.host),
            port: std::env::var("FORKS_PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.recipes_dir, PathBuf::from("recipes"));
        assert_eq!(settings.port, 8000);
    }
}
