//! Environment variable pass.

use std::collections::HashMap;
use std::ffi::OsString;

use super::SourcePass;
use crate::error::Error;
use crate::flag::FlagSet;
use crate::source::Source;

/// Applies environment variables named after the flags.
///
/// Flag `db-password` reads `DB_PASSWORD`, or `APP_DB_PASSWORD` with prefix
/// `APP`. Dots from nested struct prefixes become underscores as well. An
/// empty value sets a boolean flag to `true` and is otherwise parsed as is.
pub struct EnvPass {
    vars: HashMap<String, OsString>,
}

impl EnvPass {
    /// Snapshot of the process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    /// Uses the given variables instead of the process environment.
    ///
    /// Variables whose names are not valid UTF-8 cannot match a flag and are dropped.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let vars = vars
            .into_iter()
            .filter_map(|(key, value)| Some((key.into().into_string().ok()?, value.into())))
            .collect();
        Self { vars }
    }
}

/// The variable name a flag is read from.
///
/// The mapping is not injective: `db.pool`, `db-pool` and `db_pool` all read
/// `DB_POOL`. Declaring two such flags logs a warning and both resolve from the
/// same variable.
#[must_use]
pub fn env_key(prefix: Option<&str>, flag: &str) -> String {
    let key = match prefix {
        Some(prefix) => format!("{prefix}_{flag}"),
        None => flag.to_string(),
    };
    key.to_uppercase().replace(['-', '.'], "_")
}

impl SourcePass for EnvPass {
    fn source(&self) -> Source {
        Source::Environment
    }

    fn apply(&self, flags: &mut FlagSet) -> Result<usize, Error> {
        let pending: Vec<(String, bool)> = flags
            .formal
            .values()
            .filter(|flag| !flags.actual.contains_key(flag.name()))
            .map(|flag| (flag.name().to_string(), flag.value().is_bool_flag()))
            .collect();

        let mut applied = 0;
        for (name, is_bool) in pending {
            let key = env_key(flags.env_prefix(), &name);
            let Some(raw) = self.vars.get(&key) else {
                continue;
            };
            let raw = raw
                .to_str()
                .ok_or_else(|| Error::InvalidUtf8 { var: key.clone() })?;

            if is_bool && raw.is_empty() {
                flags.store(&name, "true", Source::Environment)?;
            } else {
                flags.assign(&name, raw, Source::Environment)?;
            }
            applied += 1;
        }

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Vec<(String, String)> {
        vars.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_env_key() {
        assert_eq!(env_key(None, "db-password"), "DB_PASSWORD");
        assert_eq!(env_key(Some("APP"), "port"), "APP_PORT");
        assert_eq!(env_key(None, "db.max-conns"), "DB_MAX_CONNS");
    }

    #[test]
    fn test_colliding_names_share_variable() {
        assert_eq!(env_key(None, "db.pool"), env_key(None, "db-pool"));

        let mut flags = FlagSet::new("test");
        let dotted = flags.int("db.pool", 1, "").unwrap();
        let dashed = flags.int("db-pool", 2, "").unwrap();
        let applied = flags.parse_env_from(env(&[("DB_POOL", "8")])).unwrap();

        assert_eq!(applied, 2);
        assert_eq!(dotted.get(), 8);
        assert_eq!(dashed.get(), 8);
    }

    #[test]
    fn test_applies_unset_flags_only() {
        let mut flags = FlagSet::new("test");
        let port = flags.int("port", 8080, "").unwrap();
        let host = flags.string("host", "localhost".into(), "").unwrap();
        flags.set("host", "pinned").unwrap();

        let applied = flags
            .parse_env_from(env(&[("PORT", "9000"), ("HOST", "ignored")]))
            .unwrap();

        assert_eq!(applied, 1);
        assert_eq!(port.get(), 9000);
        assert_eq!(host.get(), "pinned");
        assert_eq!(flags.source_of("port"), Some(Source::Environment));
    }

    #[test]
    fn test_prefix() {
        let mut flags = FlagSet::new("test").with_env_prefix("APP");
        let port = flags.int("port", 8080, "").unwrap();

        flags
            .parse_env_from(env(&[("PORT", "1"), ("APP_PORT", "2")]))
            .unwrap();
        assert_eq!(port.get(), 2);
    }

    #[test]
    fn test_empty_bool_is_true() {
        let mut flags = FlagSet::new("test");
        let debug = flags.bool("debug", false, "").unwrap();
        flags.parse_env_from(env(&[("DEBUG", "")])).unwrap();
        assert!(debug.get());
    }

    #[test]
    fn test_invalid_value_mentions_variable() {
        let mut flags = FlagSet::new("test");
        flags.int("port", 8080, "").unwrap();
        let err = flags.parse_env_from(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("invalid value \"eighty\" for environment variable port")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_utf8() {
        use std::os::unix::ffi::OsStringExt;

        let mut flags = FlagSet::new("test");
        flags.string("name", String::new(), "").unwrap();
        let err = flags
            .parse_env_from([(OsString::from("NAME"), OsString::from_vec(vec![0xff, 0xfe]))])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8 { .. }));
    }
}
