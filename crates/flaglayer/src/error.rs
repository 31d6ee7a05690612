//! Error types for flag declaration, resolution and validation.
//!
//! This module contains the [`Error`] enum and [`MultiError`], both of which
//! integrate with [`miette`] for rich diagnostics.
//!
//! # Error Kinds
//!
//! | Kind | Variants | Handling |
//! |------|----------|----------|
//! | Registration | [`Error::Redefined`], [`Error::UnsupportedType`], [`Error::InvalidDefault`], [`Error::InvalidLayout`], [`Error::AlreadyResolved`] | Always returned immediately |
//! | Resolution | [`Error::UnknownFlag`], [`Error::Syntax`], [`Error::MissingArgument`], [`Error::InvalidValue`], [`Error::Io`], [`Error::LineTooLong`], [`Error::Indirection`], [`Error::SecretFile`] | Subject to the flag set's [`ErrorHandling`](crate::ErrorHandling) policy |
//! | Validation | [`Error::Validation`], [`Error::MissingRequired`], [`Error::Multiple`] | Aggregated, every check runs |
//!
//! # Sensitive Values
//!
//! Values of flags marked sensitive are never rendered. Wherever a raw value
//! would appear, the fixed token [`MASK`](crate::MASK) is printed instead:
//!
//! ```text
//! invalid value "******" for flag -db-password: ...
//! ```

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::path::PathBuf;

use miette::Diagnostic;

use crate::MASK;
use crate::indirect::IndirectionError;
use crate::source::Source;

/// Boxed cause carried by parse failures.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors produced while declaring, resolving or validating flags.
///
/// # Diagnostic Codes
///
/// | Code | Meaning |
/// |------|---------|
/// | `flaglayer::redefined` | Flag name declared twice |
/// | `flaglayer::unknown_flag` | Source referenced an undeclared flag |
/// | `flaglayer::help_requested` | `-help` / `-h` was given |
/// | `flaglayer::invalid_value` | Raw value failed to parse |
/// | `flaglayer::invalid_default` | Struct default literal failed to parse |
/// | `flaglayer::validation` | Deferred constraint failed |
/// | `flaglayer::missing_required` | Required flags were never supplied |
/// | `flaglayer::multiple_errors` | Several independent failures |
#[derive(Diagnostic)]
pub enum Error {
    /// A flag with this name was already declared in the flag set.
    #[diagnostic(
        code(flaglayer::redefined),
        help("every flag name must be unique within a flag set")
    )]
    Redefined {
        /// The flag set's name.
        set: String,
        /// The duplicated flag name.
        name: String,
    },

    /// A struct was registered with auto-resolution after resolution already ran.
    #[diagnostic(
        code(flaglayer::already_resolved),
        help("register structs before calling parse(), or disable auto_resolve")
    )]
    AlreadyResolved,

    /// A struct field has a type with no built-in or registered handler.
    #[diagnostic(
        code(flaglayer::unsupported_type),
        help("register a handler with flaglayer::register_field_handler::<T>()")
    )]
    UnsupportedType {
        /// Rust field name.
        field: String,
        /// Flag name the field would have been bound to.
        flag: String,
        /// Fully qualified type name.
        type_name: &'static str,
    },

    /// A timestamp flag's strftime layout has an unknown specifier.
    #[diagnostic(
        code(flaglayer::invalid_layout),
        help("use chrono strftime specifiers, e.g. \"%Y-%m-%d %H:%M:%S\"")
    )]
    InvalidLayout {
        /// Flag name.
        flag: String,
        /// The rejected layout.
        layout: String,
    },

    /// A struct field's declared default could not be parsed by its type.
    #[diagnostic(code(flaglayer::invalid_default))]
    InvalidDefault {
        /// Rust field name.
        field: String,
        /// Flag name.
        flag: String,
        /// Raw default literal.
        value: String,
        /// Whether the field is sensitive.
        secret: bool,
        /// Short kind name of the field type (e.g. `int`).
        kind: &'static str,
        /// Help text.
        #[help]
        help: String,
        /// Underlying parse error.
        source: BoxError,
    },

    /// A source named a flag that was never declared.
    #[diagnostic(code(flaglayer::unknown_flag))]
    UnknownFlag {
        /// The undeclared name.
        name: String,
        /// Which source supplied it.
        origin: Source,
    },

    /// `-help` or `-h` was requested and is not a declared flag.
    #[diagnostic(code(flaglayer::help_requested), severity(Advice))]
    HelpRequested,

    /// A command-line token is not valid flag syntax.
    #[diagnostic(
        code(flaglayer::syntax),
        help("flags look like -name, -name=value or --name value")
    )]
    Syntax {
        /// The offending token.
        token: String,
    },

    /// A non-boolean flag appeared last on the command line without a value.
    #[diagnostic(code(flaglayer::missing_argument))]
    MissingArgument {
        /// Flag name.
        name: String,
    },

    /// A raw value could not be parsed into the flag's type.
    #[diagnostic(code(flaglayer::invalid_value))]
    InvalidValue {
        /// Flag name.
        name: String,
        /// The raw value.
        value: String,
        /// Whether the flag is sensitive.
        secret: bool,
        /// Which source supplied the value.
        origin: Source,
        /// Underlying parse error.
        source: BoxError,
    },

    /// An environment variable bound to a flag is not valid UTF-8.
    #[diagnostic(
        code(flaglayer::invalid_utf8),
        help("ensure the variable contains valid UTF-8 text")
    )]
    InvalidUtf8 {
        /// The environment variable name.
        var: String,
    },

    /// A config file or secret directory could not be read.
    #[diagnostic(code(flaglayer::io))]
    Io {
        /// The path being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A config file line exceeds the scan buffer.
    #[diagnostic(
        code(flaglayer::line_too_long),
        help("config lines are limited to 64 KiB; use @file indirection for large values")
    )]
    LineTooLong {
        /// Config file path.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
    },

    /// `@file` indirection failed for a flag's value.
    #[diagnostic(code(flaglayer::indirection))]
    Indirection {
        /// Flag name.
        name: String,
        /// Which source supplied the `@` reference.
        origin: Source,
        /// Underlying indirection error.
        #[diagnostic_source]
        source: IndirectionError,
    },

    /// A file in the secret directory held an invalid value for its flag.
    #[diagnostic(code(flaglayer::secret_file))]
    SecretFile {
        /// File name inside the secret directory.
        file: String,
        /// Flag the file maps to.
        flag: String,
        /// Underlying failure.
        source: Box<Error>,
    },

    /// A deferred constraint failed after resolution.
    #[diagnostic(code(flaglayer::validation))]
    Validation {
        /// Flag the constraint is attached to.
        flag: String,
        /// Human readable failure.
        message: String,
    },

    /// Required flags were not supplied by any source.
    #[diagnostic(
        code(flaglayer::missing_required),
        help("supply each flag on the command line, environment, secret directory or config file")
    )]
    MissingRequired {
        /// Missing flag names, in declaration order.
        names: Vec<String>,
    },

    /// Several independent errors.
    #[diagnostic(transparent)]
    Multiple(MultiError),

    /// A flag's value does not hold the type the caller asked for.
    #[diagnostic(code(flaglayer::type_mismatch))]
    TypeMismatch {
        /// Flag name.
        flag: String,
        /// Requested type.
        expected: &'static str,
    },

    /// No flag with this name is declared.
    #[diagnostic(code(flaglayer::no_such_flag))]
    NoSuchFlag {
        /// Flag name.
        name: String,
    },
}

fn describe_origin(origin: &Source, name: &str) -> String {
    match origin {
        Source::Cli | Source::Manual | Source::Default => format!("flag -{name}"),
        Source::Environment => format!("environment variable {name}"),
        Source::SecretDir(_) => format!("secret -{name}"),
        Source::ConfigFile(_) => format!("configuration variable {name}"),
    }
}

// Manual Display impl for secret masking
impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redefined { set, name } => {
                if set.is_empty() {
                    write!(f, "flag redefined: {name}")
                } else {
                    write!(f, "{set} flag redefined: {name}")
                }
            }

            Self::AlreadyResolved => {
                write!(f, "register_struct must be called before parse")
            }

            Self::UnsupportedType {
                field,
                flag,
                type_name,
            } => write!(
                f,
                "field {field}: unsupported field type {type_name} for flag {flag}"
            ),

            Self::InvalidDefault {
                field,
                value,
                secret,
                kind,
                source,
                ..
            } => {
                let shown = if *secret { MASK } else { value.as_str() };
                write!(f, "field {field}: invalid default {kind} {shown:?}: {source}")
            }

            Self::UnknownFlag { name, origin } => match origin {
                Source::Environment => {
                    write!(f, "environment variable provided but not defined: {name}")
                }
                Source::ConfigFile(_) => {
                    write!(f, "configuration variable provided but not defined: {name}")
                }
                _ => write!(f, "flag provided but not defined: -{name}"),
            },

            Self::HelpRequested => write!(f, "flag: help requested"),

            Self::Syntax { token } => write!(f, "bad flag syntax: {token}"),

            Self::MissingArgument { name } => write!(f, "flag needs an argument: -{name}"),

            Self::InvalidValue {
                name,
                value,
                secret,
                origin,
                source,
            } => {
                let shown = if *secret { MASK } else { value.as_str() };
                let target = describe_origin(origin, name);
                // Parse errors may echo their input.
                let cause = if *secret {
                    "invalid syntax".to_string()
                } else {
                    source.to_string()
                };
                write!(f, "invalid value {shown:?} for {target}: {cause}")
            }

            Self::InvalidUtf8 { var } => {
                write!(f, "environment variable {var} contains invalid UTF-8")
            }

            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),

            Self::LineTooLong { path, line } => {
                write!(f, "{}:{line}: line too long", path.display())
            }

            Self::Indirection {
                name,
                origin,
                source,
            } => write!(
                f,
                "invalid @file reference for {}: {source}",
                describe_origin(origin, name)
            ),

            Self::SecretFile { file, flag, source } => {
                write!(f, "secret file {file} invalid for -{flag}: {source}")
            }

            Self::Validation { flag, message } => write!(f, "{flag}: {message}"),

            Self::MissingRequired { names } => {
                write!(f, "missing required flags: {}", names.join(", "))
            }

            Self::Multiple(multi) => Display::fmt(multi, f),

            Self::TypeMismatch { flag, expected } => {
                write!(f, "flag -{flag} does not hold a value of type {expected}")
            }

            Self::NoSuchFlag { name } => write!(f, "no such flag -{name}"),

            Self::InvalidLayout { flag, layout } => {
                write!(f, "flag -{flag}: invalid time layout {layout:?}")
            }
        }
    }
}

const fn masked(value: &str, secret: bool) -> &str {
    if secret { MASK } else { value }
}

// Manual Debug impl for secret masking
impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue {
                name,
                value,
                secret,
                origin,
                ..
            } => f
                .debug_struct("InvalidValue")
                .field("name", name)
                .field("value", &masked(value, *secret))
                .field("secret", secret)
                .field("origin", origin)
                .finish_non_exhaustive(),

            Self::InvalidDefault {
                field,
                flag,
                value,
                secret,
                kind,
                ..
            } => f
                .debug_struct("InvalidDefault")
                .field("field", field)
                .field("flag", flag)
                .field("value", &masked(value, *secret))
                .field("kind", kind)
                .finish_non_exhaustive(),

            Self::Multiple(multi) => f.debug_tuple("Multiple").field(multi).finish(),

            // Remaining variants hold no raw values; Display is safe to reuse.
            other => f
                .debug_tuple("Error")
                .field(&format_args!("{other}"))
                .finish(),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::InvalidValue { source, secret, .. } | Self::InvalidDefault { source, secret, .. }
                if !*secret =>
            {
                Some(source.as_ref())
            }
            Self::Io { source, .. } => Some(source),
            Self::Indirection { source, .. } => Some(source),
            Self::SecretFile { source, .. } => Some(source.as_ref()),
            Self::Multiple(multi) => Some(multi),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Constructor helpers for ergonomic error creation
// ─────────────────────────────────────────────────────────────────────────────

impl Error {
    /// Creates a [`Error::Validation`] for a flag.
    pub fn validation(flag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            flag: flag.into(),
            message: message.into(),
        }
    }

    /// Collects errors into one.
    ///
    /// Returns `None` if the input is empty and the single error itself when
    /// there is exactly one.
    pub fn multiple(errors: Vec<Self>) -> Option<Self> {
        if errors.len() > 1 {
            return Some(Self::Multiple(MultiError::from(errors)));
        }
        errors.into_iter().next()
    }

    /// Returns the individual errors this error stands for.
    ///
    /// For [`Error::Multiple`] these are the aggregated children; any other
    /// variant yields itself.
    #[must_use]
    pub fn errors(&self) -> &[Self] {
        match self {
            Self::Multiple(multi) => multi.errors(),
            other => std::slice::from_ref(other),
        }
    }

    /// Returns `true` for [`Error::HelpRequested`].
    #[must_use]
    pub const fn is_help(&self) -> bool {
        matches!(self, Self::HelpRequested)
    }
}

/// An ordered collection of independent errors.
///
/// Displays as the children's messages joined with `"; "`. miette renders the
/// children as related diagnostics.
#[derive(Debug, Default, Diagnostic)]
#[diagnostic(
    code(flaglayer::multiple_errors),
    help("fix all listed configuration errors")
)]
pub struct MultiError {
    #[related]
    errors: Vec<Error>,
}

impl MultiError {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Appends an error.
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// The collected errors, in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    /// Number of collected errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` when nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<Vec<Error>> for MultiError {
    fn from(errors: Vec<Error>) -> Self {
        Self { errors }
    }
}

impl Display for MultiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            Display::fmt(error, f)?;
        }
        Ok(())
    }
}

impl StdError for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_failure(secret: bool) -> Error {
        Error::InvalidValue {
            name: "db-password".to_string(),
            value: "hunter2".to_string(),
            secret,
            origin: Source::Environment,
            source: "bad input hunter2".into(),
        }
    }

    #[test]
    fn test_invalid_value_display() {
        let display = parse_failure(false).to_string();
        assert!(display.contains("hunter2"));
        assert!(display.contains("environment variable db-password"));
    }

    #[test]
    fn test_invalid_value_secret_masked() {
        let err = parse_failure(true);
        let display = err.to_string();
        assert!(display.contains(MASK));
        assert!(!display.contains("hunter2"));

        let debug = format!("{err:?}");
        assert!(!debug.contains("hunter2"));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_unknown_flag_messages() {
        let cli = Error::UnknownFlag {
            name: "nope".into(),
            origin: Source::Cli,
        };
        assert_eq!(cli.to_string(), "flag provided but not defined: -nope");

        let config = Error::UnknownFlag {
            name: "nope".into(),
            origin: Source::ConfigFile(None),
        };
        assert_eq!(
            config.to_string(),
            "configuration variable provided but not defined: nope"
        );
    }

    #[test]
    fn test_missing_required_joined() {
        let err = Error::MissingRequired {
            names: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "missing required flags: a, b");
    }

    #[test]
    fn test_error_multiple() {
        let err = Error::multiple(vec![
            Error::validation("port", "value 0 < min 1"),
            Error::validation("name", "value \"X\" does not match pattern ^[a-z]+$"),
        ])
        .unwrap();

        assert_eq!(err.errors().len(), 2);
        assert_eq!(
            err.to_string(),
            "port: value 0 < min 1; name: value \"X\" does not match pattern ^[a-z]+$"
        );
    }

    #[test]
    fn test_error_multiple_single_unwraps() {
        let err = Error::multiple(vec![Error::HelpRequested]).unwrap();
        assert!(err.is_help());
        assert_eq!(err.errors().len(), 1);
    }

    #[test]
    fn test_error_multiple_empty_returns_none() {
        assert!(Error::multiple(vec![]).is_none());
    }

    #[test]
    fn test_multi_error_accessors() {
        let mut multi = MultiError::new();
        assert!(multi.is_empty());
        multi.push(Error::HelpRequested);
        multi.push(Error::AlreadyResolved);
        assert_eq!(multi.len(), 2);
        assert_eq!(multi.into_errors().len(), 2);
    }
}
