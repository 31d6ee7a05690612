//! Config file pass.

use std::fs;
use std::path::PathBuf;

use super::{SourcePass, is_help};
use crate::error::Error;
use crate::flag::FlagSet;
use crate::source::Source;

/// Longest accepted config line, in bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Applies a flat `key value` file.
///
/// ```text
/// # comment
/// port 9000
/// host=0.0.0.0
/// debug
/// ```
///
/// A line splits at its first `=` or space. A bare key sets a boolean flag to
/// `true`. Lines are trimmed; blank lines and lines starting with `#` are
/// skipped.
pub struct ConfigFilePass {
    path: PathBuf,
}

impl ConfigFilePass {
    /// Creates a pass over the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// A parsed config directive.
#[derive(Debug, PartialEq, Eq)]
pub struct Directive<'a> {
    /// Flag name.
    pub name: &'a str,
    /// Raw value; `None` for a bare key.
    pub value: Option<&'a str>,
}

/// Parses one line; `None` for blank lines and comments.
#[must_use]
pub fn parse_line(line: &str) -> Option<Directive<'_>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    Some(match line.find(['=', ' ']) {
        Some(at) => Directive {
            name: &line[..at],
            value: Some(&line[at + 1..]),
        },
        None => Directive {
            name: line,
            value: None,
        },
    })
}

impl SourcePass for ConfigFilePass {
    fn source(&self) -> Source {
        Source::ConfigFile(Some(self.path.clone()))
    }

    fn apply(&self, flags: &mut FlagSet) -> Result<usize, Error> {
        let content = fs::read_to_string(&self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;

        let mut applied = 0;
        for (index, line) in content.lines().enumerate() {
            if line.len() > MAX_LINE_LEN {
                return Err(Error::LineTooLong {
                    path: self.path.clone(),
                    line: index + 1,
                });
            }

            let Some(Directive { name, value }) = parse_line(line) else {
                continue;
            };
            if flags.actual.contains_key(name) {
                continue;
            }

            let Some(flag) = flags.lookup(name) else {
                if is_help(name) {
                    flags.usage();
                    return Err(Error::HelpRequested);
                }
                return Err(Error::UnknownFlag {
                    name: name.to_string(),
                    origin: self.source(),
                });
            };

            let is_bool = flag.value().is_bool_flag();
            match value {
                Some(raw) => flags.assign(name, raw, self.source())?,
                None if is_bool => flags.store(name, "true", self.source())?,
                None => flags.assign(name, "", self.source())?,
            }
            applied += 1;
        }

        Ok(applied)
    }
}
