//! User-facing handle for a running watcher.
//!
//! The [`WatchHandle`] triggers manual reloads, reports change counters and
//! stops the watcher thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, bounded};

use super::container::SharedFlagSet;
use super::types::WatchError;
use super::watcher::WatchCommand;

/// Handle for controlling a running watcher.
///
/// Dropping the handle stops the watcher and waits for its thread.
///
/// # Example
///
/// ```ignore
/// let seen = handle.epoch();
/// handle.reload()?;
/// if handle.flags().has_changed_since(seen) {
///     println!("port is now v{}", handle.version("port"));
/// }
/// handle.stop();
/// ```
pub struct WatchHandle {
    commands: Sender<WatchCommand>,
    running: Arc<AtomicBool>,
    shared: SharedFlagSet,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub(crate) const fn new(
        commands: Sender<WatchCommand>,
        running: Arc<AtomicBool>,
        shared: SharedFlagSet,
        thread: JoinHandle<()>,
    ) -> Self {
        Self {
            commands,
            running,
            shared,
            thread: Some(thread),
        }
    }

    /// Re-resolves the file sources now and waits for the result.
    ///
    /// Returns the number of flags whose value changed. Change callbacks have
    /// run by the time this returns.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Stopped`] if the watcher is no longer running,
    /// or [`WatchError::ReloadFailed`] if resolution failed. In the latter
    /// case every flag kept its previous value.
    pub fn reload(&self) -> Result<usize, WatchError> {
        if !self.is_running() {
            return Err(WatchError::Stopped);
        }

        let (reply, result) = bounded(1);
        self.commands
            .send(WatchCommand::Reload(reply))
            .map_err(|_| WatchError::Stopped)?;
        result.recv().map_err(|_| WatchError::Stopped)?
    }

    /// Stops the watcher and waits for its thread to exit.
    ///
    /// Bindings keep the values of the last successful reload.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        let _ = self.commands.send(WatchCommand::Stop);

        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("watcher thread panicked");
        }
    }

    /// Returns `true` while the watcher thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of successful reloads so far.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.shared.epoch()
    }

    /// How many reloads changed the named flag.
    #[must_use]
    pub fn version(&self, name: &str) -> u64 {
        self.shared.version(name)
    }

    /// The watched flag set.
    #[must_use]
    pub const fn flags(&self) -> &SharedFlagSet {
        &self.shared
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("running", &self.is_running())
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}
