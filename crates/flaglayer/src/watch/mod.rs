//! Change watcher for the secret directory and config file.
//!
//! Enabled by the `watch` feature (on by default). The watcher owns a thread
//! that re-resolves the file sources of a [`SharedFlagSet`] when a watched
//! path changes, when the poll interval elapses, or when
//! [`WatchHandle::reload`] is called. Command-line, environment and manual
//! values are never replaced by a reload.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use flaglayer::FlagSet;
//! use flaglayer::watch::{SharedFlagSet, WatchBuilder};
//!
//! let mut flags = FlagSet::new("app");
//! let level = flags.string("log-level", "info".into(), "log level").unwrap();
//! flags.string("config", String::new(), "config file").unwrap();
//! flags.parse(["-config", "/etc/app.conf"]).unwrap();
//!
//! let mut handle = WatchBuilder::new(SharedFlagSet::new(flags))
//!     .on_change("log-level", |change| {
//!         println!("log level changed to {} (v{})", change.new, change.version);
//!     })
//!     .start()
//!     .unwrap();
//!
//! println!("current level: {}", level.get());
//! handle.stop();
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌───────────────┐
//! │   notify    │────▶│ watcher thread  │────▶│ SharedFlagSet │
//! │  (events)   │     │ (select! loop)  │     │ (Mutex + epoch)│
//! └─────────────┘     └─────────────────┘     └───────────────┘
//!        ▲                    │                       │
//!   poll tick /               ▼                       ▼
//!   reload()          ┌─────────────┐          ┌─────────────┐
//!                     │  on_change  │          │  Binding<T> │
//!                     │  callbacks  │          │  (readers)  │
//!                     └─────────────┘          └─────────────┘
//! ```
//!
//! # Error Handling
//!
//! A reload that fails leaves every flag at its previous value. The error
//! goes to the `on_error` callbacks and is logged; the watcher keeps running.

mod builder;
mod container;
mod handle;
mod types;
mod watcher;

pub use builder::WatchBuilder;
pub use container::SharedFlagSet;
pub use handle::WatchHandle;
pub use types::{ChangeTrigger, FlagChange, WatchError};
pub use watcher::{ChangeCallback, ErrorCallback};
