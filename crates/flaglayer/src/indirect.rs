//! `@file` indirection for flag values.
//!
//! A raw value beginning with `@` names a file whose contents become the
//! value. `@@` escapes a literal leading `@`. Every source pass runs values
//! through [`expand_at_file`] immediately before parsing them.
//!
//! ```text
//! -db-password @/run/secrets/db     -> contents of /run/secrets/db
//! -greeting @@hello                 -> "@hello"
//! -greeting hello                   -> unchanged
//! ```

use std::fs;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Failure while expanding an `@file` reference.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum IndirectionError {
    /// The value was a bare `@`.
    #[error("empty path")]
    #[diagnostic(
        code(flaglayer::indirect::empty_path),
        help("write @path/to/file, or @@ for a literal leading @")
    )]
    EmptyPath,

    /// The referenced file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    #[diagnostic(code(flaglayer::indirect::read))]
    Read {
        /// The referenced path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Expands an `@file` reference.
///
/// Returns `Ok(None)` when `raw` does not start with `@`, so callers can tell
/// "nothing to expand" apart from a failed expansion. File contents lose one
/// trailing line terminator.
///
/// # Errors
///
/// [`IndirectionError::EmptyPath`] for a bare `@`, and
/// [`IndirectionError::Read`] when the file cannot be read.
pub fn expand_at_file(raw: &str) -> Result<Option<String>, IndirectionError> {
    let Some(rest) = raw.strip_prefix('@') else {
        return Ok(None);
    };

    if rest.starts_with('@') {
        return Ok(Some(rest.to_string()));
    }

    if rest.is_empty() {
        return Err(IndirectionError::EmptyPath);
    }

    let path = PathBuf::from(rest);
    let contents = fs::read_to_string(&path)
        .map_err(|source| IndirectionError::Read { path, source })?;

    Ok(Some(trim_line_ending(&contents).to_string()))
}

/// Strips exactly one trailing `\n`, `\r\n` or `\r`.
pub(crate) fn trim_line_ending(value: &str) -> &str {
    value
        .strip_suffix("\r\n")
        .or_else(|| value.strip_suffix('\n'))
        .or_else(|| value.strip_suffix('\r'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_plain_value_not_expanded() {
        assert!(expand_at_file("plain").unwrap().is_none());
        assert!(expand_at_file("").unwrap().is_none());
        assert!(expand_at_file("a@b").unwrap().is_none());
    }

    #[test]
    fn test_double_at_escapes() {
        assert_eq!(expand_at_file("@@").unwrap().as_deref(), Some("@"));
        assert_eq!(expand_at_file("@@user").unwrap().as_deref(), Some("@user"));
        assert_eq!(expand_at_file("@@@x").unwrap().as_deref(), Some("@@x"));
    }

    #[test]
    fn test_empty_path_is_error() {
        assert!(matches!(
            expand_at_file("@"),
            Err(IndirectionError::EmptyPath)
        ));
    }

    #[test]
    fn test_reads_file_and_trims_one_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "token\n\n").unwrap();

        let raw = format!("@{}", file.path().display());
        assert_eq!(expand_at_file(&raw).unwrap().as_deref(), Some("token\n"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = expand_at_file("@/definitely/not/here").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here"));
    }

    #[test]
    fn test_trim_line_ending() {
        assert_eq!(trim_line_ending("a\r\n"), "a");
        assert_eq!(trim_line_ending("a\n"), "a");
        assert_eq!(trim_line_ending("a\r"), "a");
        assert_eq!(trim_line_ending("a\n\n"), "a\n");
        assert_eq!(trim_line_ending("a"), "a");
    }
}
