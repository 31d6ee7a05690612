//! Builder for starting a watcher.
//!
//! The [`WatchBuilder`] names the files to watch, registers callbacks and
//! spawns the watcher thread.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;

use super::container::SharedFlagSet;
use super::handle::WatchHandle;
use super::types::{FlagChange, WatchError};
use super::watcher::{
    ChangeCallback, ErrorCallback, ReloadTargets, WatchedPaths, WatcherContext,
    create_notify_watcher, watcher_loop,
};

/// Builder for a watcher over a [`SharedFlagSet`].
///
/// Without explicit paths the watcher follows the controlling flags
/// (`-secret-dir` and `-config` by default), read once when it starts.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use flaglayer::FlagSet;
/// use flaglayer::watch::{SharedFlagSet, WatchBuilder};
///
/// let mut flags = FlagSet::new("app");
/// flags.string("config", String::new(), "config file").unwrap();
/// let port = flags.int("port", 8080, "listen port").unwrap();
/// flags.parse(std::env::args().skip(1)).unwrap();
///
/// let handle = WatchBuilder::new(SharedFlagSet::new(flags))
///     .on_change("port", |change| println!("port: {} -> {}", change.old, change.new))
///     .on_error(|err| eprintln!("{err}"))
///     .poll_interval(Duration::from_secs(30))
///     .start()
///     .unwrap();
///
/// println!("serving on {}", port.get());
/// # drop(handle);
/// ```
pub struct WatchBuilder {
    shared: SharedFlagSet,
    secret_dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
    on_change: HashMap<String, Vec<ChangeCallback>>,
    on_error: Vec<ErrorCallback>,
    poll_interval: Option<Duration>,
}

impl WatchBuilder {
    /// Creates a builder for the given flag set.
    #[must_use]
    pub fn new(shared: SharedFlagSet) -> Self {
        Self {
            shared,
            secret_dir: None,
            config_file: None,
            on_change: HashMap::new(),
            on_error: Vec::new(),
            poll_interval: None,
        }
    }

    /// Watches this secret directory instead of the one named by the controlling flag.
    #[must_use]
    pub fn secret_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.secret_dir = Some(dir.into());
        self
    }

    /// Watches this config file instead of the one named by the controlling flag.
    #[must_use]
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Registers a callback for changes to the named flag.
    ///
    /// Callbacks run on the watcher thread after the flag set is unlocked.
    /// A panicking callback is logged and does not stop the watcher.
    #[must_use]
    pub fn on_change<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&FlagChange) + Send + Sync + 'static,
    {
        self.on_change
            .entry(name.into())
            .or_default()
            .push(Box::new(callback));
        self
    }

    /// Registers a callback for failed reloads.
    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WatchError) + Send + Sync + 'static,
    {
        self.on_error.push(Box::new(callback));
        self
    }

    /// Also reloads on a fixed interval, for filesystems without change events.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Starts watching.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InitFailed`] if the file watcher or its thread
    /// could not be created, and [`WatchError::PathError`] if a path cannot
    /// be watched.
    pub fn start(self) -> Result<WatchHandle, WatchError> {
        let (secret_dir, config_file) = self.shared.read(|flags| {
            (
                self.secret_dir.clone().or_else(|| flags.secret_dir_path()),
                self.config_file.clone().or_else(|| flags.config_path()),
            )
        });

        let (event_tx, event_rx) = unbounded();
        let mut notify_watcher = create_notify_watcher(event_tx)?;
        let mut paths = WatchedPaths::default();
        if let Some(dir) = &secret_dir {
            paths.watch_dir(&mut notify_watcher, dir)?;
        }
        if let Some(file) = &config_file {
            paths.watch_file(&mut notify_watcher, file)?;
        }

        let running = Arc::new(AtomicBool::new(true));
        let context = WatcherContext {
            shared: self.shared.clone(),
            targets: ReloadTargets {
                secret_dir: secret_dir.clone(),
                config_file: config_file.clone(),
            },
            on_change: self.on_change,
            on_error: self.on_error,
            running: Arc::clone(&running),
        };

        let (command_tx, command_rx) = unbounded();
        let poll_interval = self.poll_interval;
        let thread = thread::Builder::new()
            .name("flaglayer-watcher".to_string())
            .spawn(move || {
                let _watcher = notify_watcher;
                watcher_loop(&context, &command_rx, &event_rx, &paths, poll_interval);
            })
            .map_err(|e| WatchError::init_failed(format!("failed to spawn watcher thread: {e}"), None))?;

        tracing::debug!(
            secret_dir = ?secret_dir,
            config_file = ?config_file,
            poll_interval = ?poll_interval,
            "watcher started"
        );
        Ok(WatchHandle::new(command_tx, running, self.shared, thread))
    }
}

impl std::fmt::Debug for WatchBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchBuilder")
            .field("secret_dir", &self.secret_dir)
            .field("config_file", &self.config_file)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
