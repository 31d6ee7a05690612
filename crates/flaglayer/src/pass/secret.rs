//! Secret directory pass.

use std::fs;
use std::path::{Path, PathBuf};

use super::SourcePass;
use crate::error::Error;
use crate::flag::FlagSet;
use crate::indirect::trim_line_ending;
use crate::source::Source;

/// Applies the regular files directly inside a directory.
///
/// A file maps to the flag named by its lower-cased name, or failing that by
/// its lower-cased name with `_` replaced by `-`. Files that match no flag and
/// subdirectories are skipped. The content minus one trailing line terminator
/// is the value; for a boolean flag, empty content or `true` in any case sets
/// it to `true`.
pub struct SecretDirPass {
    dir: PathBuf,
}

impl SecretDirPass {
    /// Creates a pass over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The declared flag a secret file maps to, if any.
fn target_flag(flags: &FlagSet, file_name: &str) -> Option<String> {
    let lower = file_name.to_lowercase();
    let dashed = lower.replace('_', "-");
    [lower, dashed]
        .into_iter()
        .find(|candidate| flags.formal.contains_key(candidate))
}

impl SourcePass for SecretDirPass {
    fn source(&self) -> Source {
        Source::SecretDir(Some(self.dir.clone()))
    }

    fn apply(&self, flags: &mut FlagSet) -> Result<usize, Error> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.dir, e))?;
            files.push(entry.path());
        }
        files.sort();

        let mut applied = 0;
        for path in files {
            // Follows symlinks, so mounted secrets behave like plain files.
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            if metadata.is_dir() {
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(name) = target_flag(flags, file_name) else {
                tracing::trace!(file = file_name, "secret file matches no flag");
                continue;
            };
            if flags.actual.contains_key(&name) {
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            let value = trim_line_ending(&content);

            let is_bool = flags
                .lookup(&name)
                .is_some_and(|flag| flag.value().is_bool_flag());

            let result = if is_bool && (value.is_empty() || value.eq_ignore_ascii_case("true")) {
                flags.store(&name, "true", self.source())
            } else {
                flags.assign(&name, value, self.source())
            };

            result.map_err(|source| Error::SecretFile {
                file: file_name.to_string(),
                flag: name.clone(),
                source: Box::new(source),
            })?;
            applied += 1;
        }

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_file_name_candidates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DB_PASSWORD"), "s3cr3t\n").unwrap();
        fs::write(dir.path().join("unrelated"), "x").unwrap();
        fs::create_dir(dir.path().join("port")).unwrap();

        let mut flags = FlagSet::new("test");
        let password = flags.string("db-password", String::new(), "").unwrap();
        let port = flags.int("port", 8080, "").unwrap();

        let applied = flags.parse_secret_dir(dir.path()).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(password.get(), "s3cr3t");
        assert_eq!(port.get(), 8080);
        assert_eq!(flags.source_of("db-password").unwrap().label(), "secret");
    }

    #[test]
    fn test_precedence_preserved() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("token"), "from-secret").unwrap();

        let mut flags = FlagSet::new("test");
        let token = flags.string("token", String::new(), "").unwrap();
        flags.set("token", "from-cli").unwrap();

        assert_eq!(flags.parse_secret_dir(dir.path()).unwrap(), 0);
        assert_eq!(token.get(), "from-cli");
    }

    #[test]
    fn test_bool_forms() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "").unwrap();
        fs::write(dir.path().join("b"), "TRUE\n").unwrap();
        fs::write(dir.path().join("c"), "0").unwrap();

        let mut flags = FlagSet::new("test");
        let a = flags.bool("a", false, "").unwrap();
        let b = flags.bool("b", false, "").unwrap();
        let c = flags.bool("c", true, "").unwrap();

        flags.parse_secret_dir(dir.path()).unwrap();
        assert!(a.get());
        assert!(b.get());
        assert!(!c.get());
    }

    #[test]
    fn test_only_one_newline_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("motd"), "hello\n\n").unwrap();

        let mut flags = FlagSet::new("test");
        let motd = flags.string("motd", String::new(), "").unwrap();
        flags.parse_secret_dir(dir.path()).unwrap();
        assert_eq!(motd.get(), "hello\n");
    }

    #[test]
    fn test_invalid_value_names_file_and_flag() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("PORT"), "eighty").unwrap();

        let mut flags = FlagSet::new("test");
        flags.int("port", 8080, "").unwrap();

        let err = flags.parse_secret_dir(dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("secret file PORT invalid for -port"));
        assert!(matches!(err, Error::SecretFile { .. }));
    }

    #[test]
    fn test_sensitive_value_not_leaked() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pin"), "hunter2").unwrap();

        let mut flags = FlagSet::new("test");
        flags.int("pin", 0, "").unwrap();
        flags.mark_sensitive("pin").unwrap();

        let err = flags.parse_secret_dir(dir.path()).unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
        assert!(!format!("{err:?}").contains("hunter2"));
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let mut flags = FlagSet::new("test");
        let err = flags.parse_secret_dir("/definitely/not/a/dir").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
