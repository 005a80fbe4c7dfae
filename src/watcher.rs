//! Filesystem watcher keeping the catalog in sync with external edits.
//!
//! Recipes are plain files users edit in any editor (or receive via git
//! pull), so the index cannot rely on the API being the only writer.
//! Events are debounced for half a second to coalesce editor write
//! bursts; each settled `.md` path is reindexed or removed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent};

use crate::index::RecipeIndex;
use crate::recipe::file_slug;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Handle keeping the watcher alive; dropping it stops watching.
pub struct WatcherHandle {
    _debouncer: notify_debouncer_full::Debouncer<
        notify::RecommendedWatcher,
        notify_debouncer_full::RecommendedCache,
    >,
}

/// Start watching the recipes directory (non-recursive) and keep the
/// index current. Returns a handle the caller must keep alive.
pub fn start(index: Arc<RecipeIndex>, recipes_dir: PathBuf) -> Result<WatcherHandle> {
    let watch_dir = recipes_dir.clone();
    let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                for event in events {
                    handle_event(&index, &event);
                }
            }
            Err(errors) => {
                for err in errors {
                    tracing::warn!(error = %err, "watcher error");
                }
            }
        }
    })?;
    debouncer.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    tracing::info!(dir = %recipes_dir.display(), "watching for recipe changes");
    Ok(WatcherHandle {
        _debouncer: debouncer,
    })
}

fn handle_event(index: &RecipeIndex, event: &DebouncedEvent) {
    for path in &event.paths {
        if !path.extension().is_some_and(|ext| ext == "md") {
            continue;
        }
        if path.exists() {
            tracing::info!(file = %path.display(), "recipe updated");
            index.add_or_update(path);
        } else {
            let slug = file_slug(path);
            tracing::info!(slug, "recipe deleted");
            index.remove(&slug);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_watcher_picks_up_new_recipe() {
        let tmp = TempDir::new().unwrap();
        let index = Arc::new(RecipeIndex::new(tmp.path().to_path_buf()));
        index.build();
        assert!(index.is_empty());

        let _handle = start(index.clone(), tmp.path().to_path_buf()).unwrap();
        std::fs::write(
            tmp.path().join("soup.md"),
            "---\ntitle: Soup\n---\n\n# Soup\n",
        )
        .unwrap();

        // Debounce window plus slack for the event to land.
        for _ in 0..40 {
            if index.get("soup").is_some() {
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        panic!("watcher never indexed the new recipe");
    }
}
