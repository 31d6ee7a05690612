//! Watcher thread and the reload algorithm.
//!
//! A reload runs with the shared flag set locked:
//!
//! 1. snapshot every flag's value and the provenance ledger;
//! 2. unpin flags whose provenance is the secret directory or the config
//!    file, resetting them to their defaults;
//! 3. re-run the secret-directory and config-file passes;
//! 4. on failure restore the snapshot, otherwise diff the renderings.
//!
//! Flags set on the command line, from the environment or with
//! [`FlagSet::set`] stay pinned. Callbacks run after the lock is released.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, never, select, tick};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::container::SharedFlagSet;
use super::types::{ChangeTrigger, FlagChange, WatchError};
use crate::pass::{self, ConfigFilePass, SecretDirPass};
use crate::{Error, FlagSet, Source};

/// Callback invoked for a changed flag.
pub type ChangeCallback = Box<dyn Fn(&FlagChange) + Send + Sync + 'static>;

/// Callback invoked when a reload fails.
pub type ErrorCallback = Box<dyn Fn(&WatchError) + Send + Sync + 'static>;

/// Commands sent to the watcher thread.
pub(crate) enum WatchCommand {
    /// Reload now and report the number of changed flags.
    Reload(Sender<Result<usize, WatchError>>),
    /// Stop the watcher.
    Stop,
}

/// Files the reload passes read. `None` falls back to the controlling flag.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReloadTargets {
    pub secret_dir: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

/// Everything the watcher thread owns.
pub(crate) struct WatcherContext {
    pub shared: SharedFlagSet,
    pub targets: ReloadTargets,
    pub on_change: HashMap<String, Vec<ChangeCallback>>,
    pub on_error: Vec<ErrorCallback>,
    pub running: Arc<AtomicBool>,
}

struct Snapshot {
    values: Vec<(String, Box<dyn Any + Send>)>,
    actual: BTreeMap<String, Source>,
    renders: HashMap<String, String>,
}

fn take_snapshot(flags: &FlagSet) -> Snapshot {
    Snapshot {
        values: flags
            .formal
            .iter()
            .map(|(name, flag)| (name.clone(), flag.value().get()))
            .collect(),
        actual: flags.actual.clone(),
        renders: flags.renders(),
    }
}

fn restore(flags: &mut FlagSet, snapshot: Snapshot) {
    for (name, value) in snapshot.values {
        if let Some(flag) = flags.formal.get_mut(&name)
            && !flag.value_mut().restore(value)
        {
            tracing::debug!(flag = %name, "value does not support restore");
        }
    }
    flags.actual = snapshot.actual;
}

/// Drops reloadable provenance and resets those flags to their defaults.
fn unpin(flags: &mut FlagSet) {
    let reloadable: Vec<String> = flags
        .actual
        .iter()
        .filter(|(_, source)| source.is_reloadable())
        .map(|(name, _)| name.clone())
        .collect();

    for name in reloadable {
        flags.actual.remove(&name);
        if let Some(flag) = flags.formal.get_mut(&name) {
            let default = flag.default_value().to_string();
            if let Err(err) = flag.value_mut().reset(&default) {
                tracing::debug!(flag = %name, error = %err, "failed to reset flag");
            }
        }
    }
}

/// Re-runs the file passes. A removed file or directory supplies nothing.
fn rerun_passes(flags: &mut FlagSet, targets: &ReloadTargets) -> Result<(), Error> {
    if let Some(dir) = targets.secret_dir.clone().or_else(|| flags.secret_dir_path()) {
        if dir.exists() {
            pass::run(&SecretDirPass::new(dir), flags)?;
        } else {
            tracing::debug!(path = %dir.display(), "secret directory is gone");
        }
    }
    if let Some(path) = targets.config_file.clone().or_else(|| flags.config_path()) {
        if path.exists() {
            pass::run(&ConfigFilePass::new(path), flags)?;
        } else {
            tracing::debug!(path = %path.display(), "config file is gone");
        }
    }
    Ok(())
}

/// Re-resolves the file sources and returns the flags whose values changed.
pub(crate) fn reload(
    shared: &SharedFlagSet,
    targets: &ReloadTargets,
    trigger: &ChangeTrigger,
) -> Result<Vec<FlagChange>, Error> {
    let mut flags = shared.lock();
    let snapshot = take_snapshot(&flags);

    unpin(&mut flags);
    if let Err(err) = rerun_passes(&mut flags, targets) {
        restore(&mut flags, snapshot);
        return Err(err);
    }

    let after = flags.renders();
    let mut changes = Vec::new();
    for (name, new) in after {
        let old = snapshot.renders.get(&name).cloned().unwrap_or_default();
        if old == new {
            continue;
        }
        let sensitive = flags.lookup(&name).is_some_and(crate::Flag::is_sensitive);
        let source = flags.source_of(&name).unwrap_or(Source::Default);
        changes.push(FlagChange {
            version: shared.bump_version(&name),
            name,
            old,
            new,
            source,
            trigger: trigger.clone(),
            sensitive,
        });
    }
    changes.sort_by(|a, b| a.name.cmp(&b.name));

    shared.bump_epoch();
    Ok(changes)
}

impl WatcherContext {
    fn reload_and_notify(&self, trigger: ChangeTrigger) -> Result<usize, WatchError> {
        tracing::debug!(trigger = %trigger, "reloading flags");

        let changes = match reload(&self.shared, &self.targets, &trigger) {
            Ok(changes) => changes,
            Err(source) => {
                let err = WatchError::ReloadFailed { trigger, source };
                tracing::warn!(error = %err, "reload failed, keeping previous values");
                self.report(&err);
                return Err(err);
            }
        };

        for change in &changes {
            tracing::debug!(flag = %change.name, version = change.version, "flag changed");
            for callback in self.on_change.get(&change.name).into_iter().flatten() {
                if catch_unwind(AssertUnwindSafe(|| callback(change))).is_err() {
                    tracing::error!(flag = %change.name, "change callback panicked");
                }
            }
        }
        Ok(changes.len())
    }

    fn report(&self, err: &WatchError) {
        for callback in &self.on_error {
            if catch_unwind(AssertUnwindSafe(|| callback(err))).is_err() {
                tracing::error!("error callback panicked");
            }
        }
    }
}

/// Create a notify watcher with the given event sender.
pub(crate) fn create_notify_watcher(
    tx: Sender<notify::Result<Event>>,
) -> Result<RecommendedWatcher, WatchError> {
    notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .map_err(|e| WatchError::init_failed(format!("failed to create file watcher: {e}"), Some(e)))
}

/// Paths whose events trigger a reload.
#[derive(Debug, Default)]
pub(crate) struct WatchedPaths {
    files: HashSet<PathBuf>,
    dirs: HashSet<PathBuf>,
}

fn with_canonical(path: &Path) -> Vec<PathBuf> {
    let mut paths = vec![path.to_path_buf()];
    if let Ok(canonical) = path.canonicalize()
        && canonical != path
    {
        paths.push(canonical);
    }
    paths
}

impl WatchedPaths {
    /// Watches `file` through its parent directory, so replaced files are seen.
    pub(crate) fn watch_file(
        &mut self,
        watcher: &mut RecommendedWatcher,
        file: &Path,
    ) -> Result<(), WatchError> {
        let parent = match file.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
            Some(parent) => parent,
            None => return Err(WatchError::path_error(file, "invalid path")),
        };
        if !parent.exists() {
            return Err(WatchError::path_error(file, "parent directory does not exist"));
        }
        watcher
            .watch(parent, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::path_error(file, format!("failed to watch: {e}")))?;

        self.files.extend(with_canonical(file));
        Ok(())
    }

    /// Watches every entry directly inside `dir`.
    pub(crate) fn watch_dir(
        &mut self,
        watcher: &mut RecommendedWatcher,
        dir: &Path,
    ) -> Result<(), WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::path_error(dir, "not a directory"));
        }
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::path_error(dir, format!("failed to watch: {e}")))?;

        self.dirs.extend(with_canonical(dir));
        Ok(())
    }

    fn matches(&self, path: &Path) -> bool {
        let direct = |p: &Path| {
            self.files.contains(p) || p.parent().is_some_and(|parent| self.dirs.contains(parent))
        };
        direct(path) || path.canonicalize().is_ok_and(|c| direct(&c))
    }

    /// Maps a notify event to a trigger, if it touches a watched path.
    pub(crate) fn classify(&self, event: &Event) -> Option<ChangeTrigger> {
        let path = event.paths.iter().find(|path| self.matches(path))?;
        match event.kind {
            EventKind::Create(_) => Some(ChangeTrigger::FileCreated(path.clone())),
            EventKind::Modify(_) => Some(ChangeTrigger::FileModified(path.clone())),
            EventKind::Remove(_) => Some(ChangeTrigger::FileDeleted(path.clone())),
            _ => None,
        }
    }
}

/// Main watcher loop running in a separate thread.
pub(crate) fn watcher_loop(
    context: &WatcherContext,
    commands: &Receiver<WatchCommand>,
    events: &Receiver<notify::Result<Event>>,
    paths: &WatchedPaths,
    poll_interval: Option<Duration>,
) {
    let ticker = poll_interval.map_or_else(never, tick);

    while context.running.load(Ordering::Acquire) {
        select! {
            recv(commands) -> command => match command {
                Ok(WatchCommand::Reload(reply)) => {
                    let result = context.reload_and_notify(ChangeTrigger::ManualReload);
                    let _ = reply.send(result);
                }
                Ok(WatchCommand::Stop) | Err(_) => break,
            },

            recv(events) -> event => match event {
                Ok(Ok(event)) => {
                    if let Some(trigger) = paths.classify(&event) {
                        let _ = context.reload_and_notify(trigger);
                    }
                }
                Ok(Err(err)) => tracing::warn!(error = %err, "file watcher error"),
                Err(_) => break,
            },

            recv(ticker) -> _ => {
                let _ = context.reload_and_notify(ChangeTrigger::Poll);
            }
        }
    }

    context.running.store(false, Ordering::Release);
    tracing::debug!("watcher stopped");
}
