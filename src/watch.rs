use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Work deferred from background threads onto the engine's update thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainThreadTask {
    ReloadScripts,
}

/// Mutex-protected task queue, drained once per frame on the update thread.
/// The mutex guards only this queue; runtime state never crosses threads.
#[derive(Clone, Default)]
pub struct MainThreadQueue(Arc<Mutex<Vec<MainThreadTask>>>);

impl MainThreadQueue {
    pub fn push(&self, task: MainThreadTask) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(task);
    }

    pub fn drain(&self) -> Vec<MainThreadTask> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect()
    }
}

/// De-duplicates file-change notifications into at most one queued reload.
/// `notify_modified` runs on the watcher thread; everything it touches is
/// atomic or queue-internal.
#[derive(Clone)]
pub struct ReloadCoordinator {
    queue: MainThreadQueue,
    pending: Arc<AtomicBool>,
}

impl ReloadCoordinator {
    pub fn new(queue: MainThreadQueue) -> Self {
        Self { queue, pending: Arc::new(AtomicBool::new(false)) }
    }

    /// Called for every file-modified notification. Rapid successive writes
    /// (a build replacing the module) collapse into one reload task.
    pub fn notify_modified(&self) {
        if self.pending.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.push(MainThreadTask::ReloadScripts);
    }

    pub fn reload_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Cleared by the update thread once the queued reload has run.
    pub fn clear_pending(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }
}

/// Background watcher on the compiled game module. Watches the parent
/// directory (builds replace the file by rename) and filters to the module's
/// file name; disposed and recreated after every reload.
pub struct ModuleWatcher {
    // Held for its Drop; the callback owns the coordinator clone.
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl ModuleWatcher {
    pub fn new(module_path: &Path, coordinator: ReloadCoordinator) -> Result<Self> {
        let normalized = normalize_watch_path(module_path);
        let watch_root = normalized
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| normalized.clone());
        let target_name: OsString =
            normalized.file_name().map(OsString::from).unwrap_or_default();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_relevant(&event.kind) {
                    return;
                }
                if event.paths.iter().any(|path| path.file_name() == Some(target_name.as_os_str())) {
                    coordinator.notify_modified();
                }
            }
            Err(err) => eprintln!("[scripts] module watcher error: {err}"),
        })?;
        watcher
            .configure(
                NotifyConfig::default()
                    .with_compare_contents(false)
                    .with_poll_interval(Duration::from_millis(300)),
            )
            .context("configure module watcher")?;
        watcher
            .watch(&watch_root, RecursiveMode::NonRecursive)
            .with_context(|| format!("watch {}", watch_root.display()))?;
        Ok(Self { _watcher: watcher, path: normalized })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Create(_)
            | EventKind::Remove(_)
    )
}

fn normalize_watch_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else if let Ok(cwd) = env::current_dir() {
        cwd.join(path)
    } else {
        path.to_path_buf()
    };
    match fs::canonicalize(&absolute) {
        Ok(canonical) => canonical,
        Err(_) => {
            if let Some(parent) = absolute.parent() {
                if let Ok(parent_canon) = fs::canonicalize(parent) {
                    if let Some(name) = absolute.file_name() {
                        return parent_canon.join(name);
                    }
                    return parent_canon;
                }
            }
            absolute
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_notifications_queue_a_single_reload() {
        let queue = MainThreadQueue::default();
        let coordinator = ReloadCoordinator::new(queue.clone());

        coordinator.notify_modified();
        coordinator.notify_modified();
        coordinator.notify_modified();

        assert_eq!(queue.drain(), vec![MainThreadTask::ReloadScripts]);
        assert!(coordinator.reload_pending(), "pending stays set until the task runs");
    }

    #[test]
    fn clearing_pending_rearms_the_coordinator() {
        let queue = MainThreadQueue::default();
        let coordinator = ReloadCoordinator::new(queue.clone());

        coordinator.notify_modified();
        assert_eq!(queue.drain().len(), 1);
        coordinator.clear_pending();

        coordinator.notify_modified();
        assert_eq!(queue.drain(), vec![MainThreadTask::ReloadScripts]);
    }

    #[test]
    fn irrelevant_event_kinds_are_filtered() {
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_relevant(&EventKind::Create(notify::event::CreateKind::File)));
        assert!(!is_relevant(&EventKind::Access(notify::event::AccessKind::Read)));
    }
}
