//! Change watching over a resolved flag set.

#![cfg(feature = "watch")]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flaglayer::watch::{ChangeTrigger, FlagChange, SharedFlagSet, WatchBuilder};
use flaglayer::{FlagSet, Source};
use parking_lot::Mutex;
use tempfile::tempdir;

/// Replaces a file atomically so a reload never observes it half written.
fn replace(path: &Path, content: &str) {
    let staging = path.with_extension("staging");
    fs::write(&staging, content).unwrap();
    fs::rename(&staging, path).unwrap();
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn test_secret_rotation_is_masked() {
    let dir = tempdir().unwrap();
    let secrets = dir.path().join("secrets");
    fs::create_dir(&secrets).unwrap();
    replace(&secrets.join("api-key"), "first\n");

    let mut flags = FlagSet::new("app");
    flags.string("secret-dir", String::new(), "").unwrap();
    let key = flags.string("api-key", String::new(), "").unwrap();
    flags.mark_sensitive("api-key").unwrap();
    flags
        .parse_with_env(
            ["-secret-dir", secrets.to_str().unwrap()],
            Vec::<(String, String)>::new(),
        )
        .unwrap();
    assert_eq!(key.get(), "first");

    let changes: Arc<Mutex<Vec<FlagChange>>> = Arc::default();
    let recorder = Arc::clone(&changes);
    let handle = WatchBuilder::new(SharedFlagSet::new(flags))
        .on_change("api-key", move |change| recorder.lock().push(change.clone()))
        .start()
        .unwrap();

    replace(&secrets.join("api-key"), "second\n");
    handle.reload().unwrap();

    assert_eq!(key.get(), "second");
    let changes = changes.lock();
    let change = changes.last().unwrap();
    assert!(change.is_sensitive());
    assert_eq!(change.new, "second");
    assert!(matches!(change.source, Source::SecretDir(_)));

    let debug = format!("{change:?}");
    assert!(!debug.contains("second"), "{debug}");
    assert!(!debug.contains("first"), "{debug}");
}

#[test]
fn test_cli_values_stay_pinned() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("app.conf");
    replace(&config, "port 1\nhost a\n");

    let mut flags = FlagSet::new("app");
    flags.string("config", String::new(), "").unwrap();
    let port = flags.int("port", 8080, "").unwrap();
    let host = flags.string("host", String::new(), "").unwrap();
    flags
        .parse_with_env(
            ["-config", config.to_str().unwrap(), "-port", "9"],
            Vec::<(String, String)>::new(),
        )
        .unwrap();

    let shared = SharedFlagSet::new(flags);
    let handle = WatchBuilder::new(shared.clone()).start().unwrap();

    replace(&config, "port 2\nhost b\n");
    handle.reload().unwrap();

    assert_eq!(port.get(), 9);
    assert_eq!(host.get(), "b");
    assert_eq!(handle.version("port"), 0);
    assert_eq!(handle.version("host"), 1);
    assert_eq!(shared.read(|flags| flags.source_of("port")), Some(Source::Cli));
}

#[test]
fn test_file_events_trigger_reload() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("app.conf");
    replace(&config, "workers 1\n");

    let mut flags = FlagSet::new("app");
    let workers = flags.int("workers", 1, "").unwrap();
    flags.parse_file(&config).unwrap();

    let triggers: Arc<Mutex<Vec<ChangeTrigger>>> = Arc::default();
    let recorder = Arc::clone(&triggers);
    let shared = SharedFlagSet::new(flags);
    let start_epoch = shared.epoch();
    let handle = WatchBuilder::new(shared.clone())
        .config_file(&config)
        .on_change("workers", move |change| {
            recorder.lock().push(change.trigger.clone());
        })
        .start()
        .unwrap();

    replace(&config, "workers 8\n");
    assert!(wait_for(|| workers.get() == 8), "no reload observed");
    assert!(shared.has_changed_since(start_epoch));
    assert!(
        triggers
            .lock()
            .iter()
            .all(|trigger| !matches!(trigger, ChangeTrigger::Poll | ChangeTrigger::ManualReload))
    );
    drop(handle);
}
