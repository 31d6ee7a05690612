//! Shared flag set container.
//!
//! This module provides [`SharedFlagSet`], the lock through which the watcher
//! thread and the rest of the program take turns mutating one [`FlagSet`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::FlagSet;

struct Shared {
    flags: Mutex<FlagSet>,
    /// Incremented after every successful reload.
    epoch: AtomicU64,
    versions: Mutex<HashMap<String, u64>>,
}

/// A [`FlagSet`] shared between the watcher thread and its owner.
///
/// Source passes update several flags non-atomically, so every resolution,
/// manual or triggered by the watcher, runs under this one lock. Bindings
/// obtained at declaration time can still be read without it.
///
/// Cloning is cheap; all clones share the same flag set.
///
/// # Example
///
/// ```rust
/// use flaglayer::FlagSet;
/// use flaglayer::watch::SharedFlagSet;
///
/// let mut flags = FlagSet::new("app");
/// let port = flags.int("port", 8080, "").unwrap();
///
/// let shared = SharedFlagSet::new(flags);
/// shared.lock().set("port", "9000").unwrap();
///
/// assert_eq!(port.get(), 9000);
/// assert_eq!(shared.read(|flags| flags.n_flag()), 1);
/// assert_eq!(shared.epoch(), 0);
/// ```
#[derive(Clone)]
pub struct SharedFlagSet {
    inner: Arc<Shared>,
}

impl SharedFlagSet {
    /// Wraps a flag set, usually one that was already resolved.
    #[must_use]
    pub fn new(flags: FlagSet) -> Self {
        Self {
            inner: Arc::new(Shared {
                flags: Mutex::new(flags),
                epoch: AtomicU64::new(0),
                versions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Locks the flag set.
    pub fn lock(&self) -> MutexGuard<'_, FlagSet> {
        self.inner.flags.lock()
    }

    /// Runs `f` with the flag set locked.
    pub fn read<R>(&self, f: impl FnOnce(&FlagSet) -> R) -> R {
        f(&self.inner.flags.lock())
    }

    /// Number of successful reloads so far.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    /// Returns `true` if a reload succeeded after `epoch` was observed.
    #[must_use]
    pub fn has_changed_since(&self, epoch: u64) -> bool {
        self.epoch() > epoch
    }

    /// How many reloads changed the named flag; `0` if none did.
    #[must_use]
    pub fn version(&self, name: &str) -> u64 {
        self.inner.versions.lock().get(name).copied().unwrap_or(0)
    }

    pub(crate) fn bump_epoch(&self) -> u64 {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Increments the named flag's version and returns the new one.
    pub(crate) fn bump_version(&self, name: &str) -> u64 {
        let mut versions = self.inner.versions.lock();
        let version = versions.entry(name.to_string()).or_insert(0);
        *version += 1;
        *version
    }
}

impl std::fmt::Debug for SharedFlagSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedFlagSet")
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}
