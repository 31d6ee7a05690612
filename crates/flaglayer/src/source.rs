//! Provenance and introspection.
//!
//! Every flag that receives a value records the [`Source`] that supplied it.
//! [`FlagSet::introspect`](crate::FlagSet::introspect) turns that ledger into
//! a [`FlagReport`], masking sensitive values.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Indicates where a flag's value originated from.
///
/// # Priority Order
///
/// Sources are resolved in this order; the first one to supply a flag wins:
///
/// 1. **CLI arguments** - `-port 8080`
/// 2. **Environment variables** - `PORT=8080`
/// 3. **Secret directory** - file `port` inside the directory named by `-secret-dir`
/// 4. **Config file** - line `port 8080` in the file named by `-config`
/// 5. **Declared defaults**
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[non_exhaustive]
pub enum Source {
    /// Value was provided via a command-line argument.
    Cli,

    /// Value was read from an environment variable.
    Environment,

    /// Value was read from a file in the secret directory.
    SecretDir(Option<PathBuf>),

    /// Value was read from a line of the config file.
    ConfigFile(Option<PathBuf>),

    /// Value was written programmatically with [`FlagSet::set`](crate::FlagSet::set).
    Manual,

    /// No source supplied a value; the declared default is in effect.
    Default,
}

impl Source {
    /// Short provenance label: `cli`, `env`, `secret`, `config`, `manual` or `default`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Environment => "env",
            Self::SecretDir(_) => "secret",
            Self::ConfigFile(_) => "config",
            Self::Manual => "manual",
            Self::Default => "default",
        }
    }

    /// Returns `true` for sources a hot reload may replace.
    #[must_use]
    pub const fn is_reloadable(&self) -> bool {
        matches!(self, Self::SecretDir(_) | Self::ConfigFile(_))
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI argument"),

            Self::Environment => write!(f, "Environment variable"),

            Self::SecretDir(Some(path)) => write!(f, "Secret directory ({})", path.display()),

            Self::SecretDir(None) => write!(f, "Secret directory"),

            Self::ConfigFile(Some(path)) => write!(f, "Config file ({})", path.display()),

            Self::ConfigFile(None) => write!(f, "Config file"),

            Self::Manual => write!(f, "Set programmatically"),

            Self::Default => write!(f, "Default value"),
        }
    }
}

/// Introspection record for a single flag.
///
/// `value` and `default` hold [`MASK`](crate::MASK) for sensitive flags.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FlagMeta {
    /// Flag name.
    pub name: String,

    /// Usage text.
    pub usage: String,

    /// Resolved value, formatted.
    pub value: String,

    /// Default value, formatted.
    pub default: String,

    /// Whether any source supplied a value.
    pub set: bool,

    /// Where the value came from.
    pub source: Source,

    /// Whether the flag is sensitive.
    pub sensitive: bool,

    /// Deprecation note, if any.
    pub deprecated: Option<String>,
}

/// Introspection of every flag in a set, sorted by name.
///
/// # Display Output
///
/// ```text
/// Flag Sources:
/// --------------------------------------------------
///   db-password  = ******  <- secret
///   port         = 9000    <- env
/// ```
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FlagReport {
    entries: Vec<FlagMeta>,
}

impl FlagReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, meta: FlagMeta) {
        self.entries.push(meta);
    }

    /// All entries, sorted by flag name.
    #[must_use]
    pub fn entries(&self) -> &[FlagMeta] {
        &self.entries
    }

    /// Looks up one flag's record.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FlagMeta> {
        self.entries.iter().find(|meta| meta.name == name)
    }

    /// Iterates over the records.
    pub fn iter(&self) -> impl Iterator<Item = &FlagMeta> {
        self.entries.iter()
    }

    /// Number of flags in the report.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the set has no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a FlagReport {
    type Item = &'a FlagMeta;
    type IntoIter = std::slice::Iter<'a, FlagMeta>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Display for FlagReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Flag Sources:")?;
        writeln!(f, "{}", "-".repeat(50))?;

        let name_width = self.entries.iter().map(|m| m.name.len()).max().unwrap_or(0);
        let value_width = self.entries.iter().map(|m| m.value.len()).max().unwrap_or(0);

        for meta in &self.entries {
            writeln!(
                f,
                "  {:<name_width$}  = {:<value_width$}  <- {}",
                meta.name,
                meta.value,
                meta.source.label(),
            )?;
        }

        Ok(())
    }
}
