//! Source passes.
//!
//! Each pass sweeps one source of truth and writes only flags that no earlier
//! pass has set. That single rule implements precedence:
//!
//! ```text
//! CLI  ->  environment  ->  secret directory  ->  config file  ->  defaults
//! ```
//!
//! The command line is the exception: it always writes, so a repeated flag
//! keeps its last occurrence.

mod cli;
mod config;
mod env;
mod secret;

pub use cli::CliPass;
pub use config::{ConfigFilePass, Directive, MAX_LINE_LEN, parse_line};
pub use env::{EnvPass, env_key};
pub use secret::SecretDirPass;

use std::ffi::OsString;
use std::path::Path;

use crate::error::Error;
use crate::flag::FlagSet;
use crate::source::Source;

/// One sweep over a flag set.
pub trait SourcePass {
    /// Provenance recorded for flags this pass sets.
    fn source(&self) -> Source;

    /// Applies the source to `flags` and returns how many flags it set.
    ///
    /// # Errors
    ///
    /// Stops at the first failure; flags already written stay written.
    fn apply(&self, flags: &mut FlagSet) -> Result<usize, Error>;
}

/// Runs a pass with the debug logging every pass shares.
pub(crate) fn run(pass: &dyn SourcePass, flags: &mut FlagSet) -> Result<usize, Error> {
    let label = pass.source().label();
    tracing::debug!(pass = label, "source pass started");
    let applied = pass.apply(flags)?;
    tracing::debug!(pass = label, applied, "source pass finished");
    Ok(applied)
}

impl FlagSet {
    /// Applies command-line arguments, leaving positional ones in [`FlagSet::args`].
    ///
    /// # Errors
    ///
    /// See [`CliPass`].
    pub fn parse_args<I, S>(&mut self, args: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        run(&CliPass::new(args), self)
    }

    /// Applies the process environment.
    ///
    /// # Errors
    ///
    /// See [`EnvPass`].
    pub fn parse_env(&mut self) -> Result<usize, Error> {
        run(&EnvPass::from_process(), self)
    }

    /// Applies the given environment instead of the process one.
    ///
    /// # Errors
    ///
    /// See [`EnvPass`].
    pub fn parse_env_from<I, K, V>(&mut self, vars: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        run(&EnvPass::from_vars(vars), self)
    }

    /// Applies the files of a secret directory.
    ///
    /// # Errors
    ///
    /// See [`SecretDirPass`].
    pub fn parse_secret_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, Error> {
        run(&SecretDirPass::new(dir.as_ref()), self)
    }

    /// Applies the lines of a config file.
    ///
    /// # Errors
    ///
    /// See [`ConfigFilePass`].
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<usize, Error> {
        run(&ConfigFilePass::new(path.as_ref()), self)
    }
}

/// Returns `true` for the names that request usage when undeclared.
pub(crate) fn is_help(name: &str) -> bool {
    matches!(name, "help" | "h")
}
