//! Resolution orchestrator.
//!
//! [`FlagSet::parse`] runs the source passes in precedence order:
//!
//! 1. command line
//! 2. environment
//! 3. secret directory, if the secret-dir flag resolved to a non-empty path
//! 4. config file, if the config flag resolved to a non-empty path
//!
//! The two controlling flags are ordinary flags, so they are themselves
//! resolved by the passes that run before the one they gate. A config path can
//! therefore come from a secret file, but a secret directory can never come
//! from the config file.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::Error;
use crate::flag::{ErrorHandling, FlagSet};
use crate::pass::{self, CliPass, ConfigFilePass, EnvPass, SecretDirPass};

impl FlagSet {
    /// Resolves every flag from the command line, the process environment,
    /// the secret directory and the config file.
    ///
    /// `args` excludes the program name. Positional arguments left after flag
    /// scanning are available through [`FlagSet::args`].
    ///
    /// # Errors
    ///
    /// With [`ErrorHandling::ContinueOnError`], the first error any pass
    /// reports. The other policies exit or panic instead of returning.
    pub fn parse<I, S>(&mut self, args: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parse_from(CliPass::new(args), EnvPass::from_process())
    }

    /// Like [`FlagSet::parse`], reading `env` instead of the process environment.
    ///
    /// # Errors
    ///
    /// See [`FlagSet::parse`].
    pub fn parse_with_env<I, S, E, K, V>(&mut self, args: I, env: E) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        E: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.parse_from(CliPass::new(args), EnvPass::from_vars(env))
    }

    fn parse_from(&mut self, cli: CliPass, env: EnvPass) -> Result<(), Error> {
        self.parsed = true;
        match self.run_passes(&cli, &env) {
            Ok(()) => Ok(()),
            Err(err) => self.handle_error(err),
        }
    }

    fn run_passes(&mut self, cli: &CliPass, env: &EnvPass) -> Result<(), Error> {
        pass::run(cli, self)?;
        pass::run(env, self)?;
        self.run_file_passes()?;

        tracing::debug!(set = self.actual.len(), declared = self.formal.len(), "resolved flags");
        Ok(())
    }

    /// Runs the secret-directory and config-file passes gated by their
    /// controlling flags.
    pub(crate) fn run_file_passes(&mut self) -> Result<(), Error> {
        if let Some(dir) = self.secret_dir_path() {
            pass::run(&SecretDirPass::new(dir), self)?;
        }
        // Read after the secret pass, which may have supplied it.
        if let Some(path) = self.config_path() {
            pass::run(&ConfigFilePass::new(path), self)?;
        }
        Ok(())
    }

    /// The secret directory named by the secret-dir flag, if any.
    #[must_use]
    pub fn secret_dir_path(&self) -> Option<PathBuf> {
        self.controlling_path(&self.secret_dir_flag)
    }

    /// The config file named by the config flag, if any.
    #[must_use]
    pub fn config_path(&self) -> Option<PathBuf> {
        self.controlling_path(&self.config_flag)
    }

    fn controlling_path(&self, name: &str) -> Option<PathBuf> {
        let rendered = self.lookup(name)?.value().render();
        (!rendered.is_empty()).then(|| PathBuf::from(rendered))
    }

    /// Applies the error-handling policy to a failed resolution.
    pub(crate) fn handle_error(&mut self, err: Error) -> Result<(), Error> {
        match self.error_handling {
            ErrorHandling::ContinueOnError => Err(err),
            ErrorHandling::ExitOnError => {
                if err.is_help() {
                    std::process::exit(0);
                }
                self.write_message(&err.to_string());
                std::process::exit(2);
            }
            ErrorHandling::PanicOnError => panic!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::source::Source;

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn test_parse_marks_parsed_and_collects_args() {
        let mut flags = FlagSet::new("test");
        let verbose = flags.bool("v", false, "").unwrap();
        assert!(!flags.parsed());

        flags
            .parse_with_env(["-v", "serve", "-x"], no_env())
            .unwrap();
        assert!(flags.parsed());
        assert!(verbose.get());
        assert_eq!(flags.args(), ["serve", "-x"]);
    }

    #[test]
    fn test_cli_beats_env() {
        let mut flags = FlagSet::new("test");
        let port = flags.int("port", 8080, "").unwrap();
        flags
            .parse_with_env(["-port", "9100"], [("PORT", "9000")])
            .unwrap();

        assert_eq!(port.get(), 9100);
        assert_eq!(flags.source_of("port"), Some(Source::Cli));
    }

    #[test]
    fn test_config_path_from_secret_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("app.conf");
        fs::write(&config, "port 7000\n").unwrap();

        let secrets = dir.path().join("secrets");
        fs::create_dir(&secrets).unwrap();
        fs::write(secrets.join("config"), config.to_str().unwrap()).unwrap();

        let mut flags = FlagSet::new("test");
        flags.string("config", String::new(), "").unwrap();
        flags.string("secret-dir", String::new(), "").unwrap();
        let port = flags.int("port", 8080, "").unwrap();

        flags
            .parse_with_env(
                Vec::<String>::new(),
                [("SECRET_DIR", secrets.to_str().unwrap())],
            )
            .unwrap();

        assert_eq!(port.get(), 7000);
        assert!(matches!(flags.source_of("config"), Some(Source::SecretDir(_))));
        assert!(matches!(flags.source_of("port"), Some(Source::ConfigFile(_))));
    }

    #[test]
    fn test_renamed_controlling_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("app.conf");
        fs::write(&config, "debug\n").unwrap();

        let mut flags = FlagSet::new("test");
        flags.set_config_flag_name("settings");
        flags.string("settings", String::new(), "").unwrap();
        let debug = flags.bool("debug", false, "").unwrap();

        flags
            .parse_with_env(["-settings", config.to_str().unwrap()], no_env())
            .unwrap();
        assert!(debug.get());
        assert_eq!(flags.config_path(), Some(config));
    }

    #[test]
    fn test_no_controlling_flags_no_file_passes() {
        let mut flags = FlagSet::new("test");
        flags.int("port", 1, "").unwrap();
        flags.parse_with_env(Vec::<String>::new(), no_env()).unwrap();
        assert!(flags.secret_dir_path().is_none());
        assert!(flags.config_path().is_none());
    }

    #[test]
    fn test_continue_returns_first_error() {
        let mut flags = FlagSet::new("test");
        flags.int("port", 1, "").unwrap();
        let err = flags
            .parse_with_env(["-nope"], [("PORT", "bad")])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownFlag { .. }));
    }

    #[test]
    #[should_panic(expected = "flag provided but not defined: -nope")]
    fn test_panic_policy() {
        let mut flags =
            FlagSet::new("test").with_error_handling(ErrorHandling::PanicOnError);
        flags.set_output(std::io::sink());
        let _ = flags.parse_with_env(["-nope"], no_env());
    }
}
