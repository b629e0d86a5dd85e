//! File system change tracker.
//!
//! Watches the working directory during one monitoring session, accumulates
//! the sets of created and modified paths, and can later materialize those
//! paths into a coherent project directory. Built on the debounced `notify`
//! watcher so build tools touching a file many times in quick succession
//! report it once, after the stability window.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Default)]
struct TrackedSets {
    created: HashSet<PathBuf>,
    modified: HashSet<PathBuf>,
}

impl TrackedSets {
    fn apply(&mut self, kind: &EventKind, path: &Path) {
        match kind {
            EventKind::Create(_) => {
                debug!(path = %path.display(), "file created");
                self.created.insert(path.to_path_buf());
            }
            EventKind::Modify(_) => {
                debug!(path = %path.display(), "file modified");
                self.modified.insert(path.to_path_buf());
            }
            EventKind::Remove(_) => {
                debug!(path = %path.display(), "file deleted");
                self.created.remove(path);
                self.modified.remove(path);
            }
            _ => {}
        }
    }
}

pub struct ChangeTracker {
    working_dir: PathBuf,
    sets: Arc<Mutex<TrackedSets>>,
    debouncer: Mutex<Option<Debouncer<notify_debouncer_full::notify::RecommendedWatcher, FileIdMap>>>,
    /// Watch-subsystem errors are notifications, not exceptions: a transient
    /// watcher error must not abort a long build.
    errors_tx: broadcast::Sender<String>,
    debounce: Duration,
}

impl ChangeTracker {
    pub fn new(working_dir: PathBuf, debounce: Duration) -> Self {
        let (errors_tx, _) = broadcast::channel(64);
        Self {
            working_dir,
            sets: Arc::new(Mutex::new(TrackedSets::default())),
            debouncer: Mutex::new(None),
            errors_tx,
            debounce,
        }
    }

    /// Subscribe to watch-subsystem error notifications.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.errors_tx.subscribe()
    }

    /// Begin a monitoring session: clears both tracked sets and starts a
    /// recursive, debounced watch. A second call while active is a warn +
    /// no-op. Returns once the watch is registered with the OS.
    pub fn start_monitoring(&self) -> Result<()> {
        let mut slot = self.debouncer.lock().expect("tracker lock poisoned");
        if slot.is_some() {
            warn!("file system monitoring is already active");
            return Ok(());
        }

        info!(dir = %self.working_dir.display(), "starting file system monitoring");
        {
            let mut sets = self.sets.lock().expect("tracker lock poisoned");
            sets.created.clear();
            sets.modified.clear();
        }

        let sets = Arc::clone(&self.sets);
        let errors_tx = self.errors_tx.clone();
        let root = self.working_dir.clone();
        let mut debouncer = new_debouncer(
            self.debounce,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let mut sets = sets.lock().expect("tracker lock poisoned");
                    for event in &events {
                        for path in &event.event.paths {
                            if is_hidden(&root, path) {
                                continue;
                            }
                            sets.apply(&event.event.kind, path);
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!(err = %e, "file watcher error");
                        let _ = errors_tx.send(e.to_string());
                    }
                }
            },
        )
        .context("failed to create file watcher")?;

        debouncer
            .watcher()
            .watch(&self.working_dir, RecursiveMode::Recursive)
            .with_context(|| {
                format!("failed to watch {}", self.working_dir.display())
            })?;

        *slot = Some(debouncer);
        info!("file system monitoring active");
        Ok(())
    }

    /// Stop the session. Idempotent; dropping the debouncer releases the
    /// underlying watch.
    pub fn stop_monitoring(&self) {
        let mut slot = self.debouncer.lock().expect("tracker lock poisoned");
        if slot.take().is_some() {
            info!("file system monitoring stopped");
        }
    }

    pub fn created_files(&self) -> Vec<PathBuf> {
        let sets = self.sets.lock().expect("tracker lock poisoned");
        sets.created.iter().cloned().collect()
    }

    pub fn modified_files(&self) -> Vec<PathBuf> {
        let sets = self.sets.lock().expect("tracker lock poisoned");
        sets.modified.iter().cloned().collect()
    }

    /// Copy the union of the tracked sets into `working_dir/name`, preserving
    /// paths relative to the working directory. Not atomic across files; a
    /// failure partway leaves a partially-populated directory.
    pub fn materialize_project(&self, name: &str) -> Result<PathBuf> {
        let project_dir = self.working_dir.join(name);
        std::fs::create_dir_all(&project_dir)
            .with_context(|| format!("failed to create {}", project_dir.display()))?;

        let union: HashSet<PathBuf> = {
            let sets = self.sets.lock().expect("tracker lock poisoned");
            sets.created.union(&sets.modified).cloned().collect()
        };

        info!(project = name, files = union.len(), "materializing project");
        for path in union {
            // Tracked sets may hold directory events and since-deleted paths;
            // only regular files are copied.
            if !path.is_file() {
                continue;
            }
            let relative = match path.strip_prefix(&self.working_dir) {
                Ok(r) => r,
                Err(_) => {
                    warn!(path = %path.display(), "tracked path outside working directory; skipped");
                    continue;
                }
            };
            let target = project_dir.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::copy(&path, &target)
                .with_context(|| format!("failed to copy {}", path.display()))?;
            debug!(from = %path.display(), to = %target.display(), "copied");
        }

        info!(dir = %project_dir.display(), "project materialized");
        Ok(project_dir)
    }
}

/// Hidden (dot-prefixed) entries are ignored; this also keeps the
/// controller's sentinel files out of the tracked sets.
fn is_hidden(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_debouncer_full::notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn hidden_paths_are_filtered() {
        let root = Path::new("/work");
        assert!(is_hidden(root, Path::new("/work/.composer_prompt")));
        assert!(is_hidden(root, Path::new("/work/.git/config")));
        assert!(!is_hidden(root, Path::new("/work/src/main.ts")));
    }

    #[test]
    fn delete_removes_from_both_sets() {
        let mut sets = TrackedSets::default();
        let path = Path::new("/work/a.txt");
        sets.apply(&EventKind::Create(CreateKind::Any), path);
        sets.apply(&EventKind::Modify(ModifyKind::Any), path);
        assert!(sets.created.contains(path));
        assert!(sets.modified.contains(path));

        sets.apply(&EventKind::Remove(RemoveKind::Any), path);
        assert!(sets.created.is_empty());
        assert!(sets.modified.is_empty());
    }
}
