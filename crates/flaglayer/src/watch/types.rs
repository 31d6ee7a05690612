//! Core types for the change watcher.
//!
//! - [`WatchError`] - Errors specific to watching and reloading
//! - [`FlagChange`] - One flag whose value changed during a reload
//! - [`ChangeTrigger`] - What caused the reload

use std::fmt::{self, Debug, Display, Formatter};
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::{MASK, Source};

/// Error type for watch and reload operations.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize the file watcher.
    #[error("failed to initialize file watcher: {message}")]
    #[diagnostic(
        code(flaglayer::watch::init_failed),
        help("check that the watched paths exist and are accessible")
    )]
    InitFailed {
        /// Human-readable error message.
        message: String,
        /// The underlying notify error, if available.
        #[source]
        source: Option<notify::Error>,
    },

    /// Failed to watch a specific path.
    #[error("failed to watch path '{}': {message}", path.display())]
    #[diagnostic(
        code(flaglayer::watch::path_error),
        help("ensure the path exists and you have read permissions")
    )]
    PathError {
        /// The path that could not be watched.
        path: PathBuf,
        /// Human-readable error message.
        message: String,
    },

    /// Re-resolution failed; every flag kept its previous value.
    #[error("reload failed: {source}")]
    #[diagnostic(
        code(flaglayer::watch::reload_failed),
        help("fix the file and save it again; the previous values remain active")
    )]
    ReloadFailed {
        /// What triggered the reload.
        trigger: ChangeTrigger,
        /// The resolution error.
        #[diagnostic_source]
        source: crate::Error,
    },

    /// The watcher has been stopped.
    #[error("watcher has been stopped")]
    #[diagnostic(
        code(flaglayer::watch::stopped),
        help("start a new watcher to continue watching for changes")
    )]
    Stopped,
}

impl WatchError {
    /// Create a new `InitFailed` error.
    pub fn init_failed(message: impl Into<String>, source: Option<notify::Error>) -> Self {
        Self::InitFailed {
            message: message.into(),
            source,
        }
    }

    /// Create a new `PathError`.
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PathError {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// What triggered a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChangeTrigger {
    /// A watched file was modified.
    FileModified(PathBuf),

    /// A watched file was created.
    FileCreated(PathBuf),

    /// A watched file was removed. Flags it supplied fall back to lower sources.
    FileDeleted(PathBuf),

    /// The poll interval elapsed.
    Poll,

    /// [`WatchHandle::reload`](super::WatchHandle::reload) was called.
    ManualReload,
}

impl ChangeTrigger {
    /// Returns the file path if this trigger is file-related.
    #[must_use]
    pub const fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::FileModified(p) | Self::FileCreated(p) | Self::FileDeleted(p) => Some(p),

            _ => None,
        }
    }
}

impl Display for ChangeTrigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileModified(p) => write!(f, "file modified: {}", p.display()),

            Self::FileCreated(p) => write!(f, "file created: {}", p.display()),

            Self::FileDeleted(p) => write!(f, "file deleted: {}", p.display()),

            Self::Poll => write!(f, "poll"),

            Self::ManualReload => write!(f, "manual reload"),
        }
    }
}

/// A flag whose value changed during a reload.
///
/// `old` and `new` hold the real formatted values, so callbacks can act on
/// them; `Debug` masks them for sensitive flags.
#[derive(Clone)]
pub struct FlagChange {
    /// Flag name.
    pub name: String,

    /// Value before the reload.
    pub old: String,

    /// Value after the reload.
    pub new: String,

    /// Provenance of the new value.
    pub source: Source,

    /// The flag's version after this change, starting at 1.
    pub version: u64,

    /// What triggered the reload.
    pub trigger: ChangeTrigger,

    pub(crate) sensitive: bool,
}

impl FlagChange {
    /// Whether the flag is sensitive.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        self.sensitive
    }
}

impl Debug for FlagChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (old, new) = if self.sensitive {
            (MASK, MASK)
        } else {
            (self.old.as_str(), self.new.as_str())
        };
        f.debug_struct("FlagChange")
            .field("name", &self.name)
            .field("old", &old)
            .field("new", &new)
            .field("source", &self.source)
            .field("version", &self.version)
            .field("trigger", &self.trigger)
            .finish()
    }
}
