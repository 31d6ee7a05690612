//! The value registry: [`Flag`], [`FlagSet`] and declaration helpers.
//!
//! A [`FlagSet`] owns every declared flag (`formal`) and the provenance ledger
//! of flags that received a value (`actual`). Resolution lives in
//! [`resolve`](crate::resolve); this module only stores, declares and looks up.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Debug, Formatter};
use std::io::{self, Write};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use regex::Regex;
use rust_decimal::Decimal;
use url::Url;
use uuid::Uuid;

use crate::MASK;
use crate::error::{BoxError, Error};
use crate::pass::env_key;
use crate::source::{FlagMeta, FlagReport, Source};
use crate::validation::DeferredCheck;
use crate::value::{Binding, ByteSize, FuncValue, Scalar, TypedValue, Value, ValueOptions};

/// Default name of the flag that points at the config file.
pub const DEFAULT_CONFIG_FLAG: &str = "config";

/// Default name of the flag that points at the secret directory.
pub const DEFAULT_SECRET_DIR_FLAG: &str = "secret-dir";

/// How [`FlagSet::parse`] reports a failed resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ErrorHandling {
    /// Return the error to the caller.
    #[default]
    ContinueOnError,
    /// Print the error and exit the process with status 2 (0 for help).
    ExitOnError,
    /// Panic with the error message.
    PanicOnError,
}

/// Custom usage printer installed with [`FlagSet::set_usage`].
pub type UsageFn = Arc<dyn Fn(&FlagSet, &mut dyn Write) -> io::Result<()> + Send + Sync>;

/// One declared flag.
pub struct Flag {
    name: String,
    usage: String,
    value: Box<dyn Value>,
    default: String,
    sensitive: bool,
    deprecated: Option<String>,
}

impl Flag {
    /// Name as it appears on the command line.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help text.
    #[must_use]
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// The value cell.
    #[must_use]
    pub fn value(&self) -> &dyn Value {
        self.value.as_ref()
    }

    /// Default value as text, captured at declaration.
    #[must_use]
    pub fn default_value(&self) -> &str {
        &self.default
    }

    /// Whether the flag's value must never be displayed.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Deprecation note, if any.
    #[must_use]
    pub fn deprecated(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    /// Current value formatted for display, masked when sensitive.
    #[must_use]
    pub fn display_value(&self) -> String {
        if self.sensitive {
            MASK.to_string()
        } else {
            self.value.render()
        }
    }

    /// Default value formatted for display, masked when sensitive.
    #[must_use]
    pub fn display_default(&self) -> &str {
        if self.sensitive { MASK } else { &self.default }
    }

    pub(crate) fn value_mut(&mut self) -> &mut dyn Value {
        self.value.as_mut()
    }
}

impl Debug for Flag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name)
            .field("kind", &self.value.type_name())
            .field("value", &self.display_value())
            .field("default", &self.display_default())
            .field("sensitive", &self.sensitive)
            .finish_non_exhaustive()
    }
}

/// A set of declared flags and the state of their resolution.
///
/// # Example
///
/// ```rust
/// use flaglayer::FlagSet;
///
/// let mut flags = FlagSet::new("server");
/// let port = flags.int("port", 8080, "listen port").unwrap();
/// flags.parse_with_env(["-port", "9100"], Vec::<(String, String)>::new()).unwrap();
///
/// assert_eq!(port.get(), 9100);
/// assert_eq!(flags.source_of("port").unwrap().label(), "cli");
/// ```
pub struct FlagSet {
    pub(crate) name: String,
    pub(crate) formal: BTreeMap<String, Flag>,
    pub(crate) actual: BTreeMap<String, Source>,
    pub(crate) env_prefix: Option<String>,
    pub(crate) error_handling: ErrorHandling,
    pub(crate) args: Vec<String>,
    pub(crate) parsed: bool,
    pub(crate) config_flag: String,
    pub(crate) secret_dir_flag: String,
    pub(crate) required: Vec<String>,
    pub(crate) checks: Vec<DeferredCheck>,
    output: Box<dyn Write + Send>,
    usage_fn: Option<UsageFn>,
    warned: HashSet<String>,
}

impl FlagSet {
    /// Creates an empty set that returns errors to the caller.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formal: BTreeMap::new(),
            actual: BTreeMap::new(),
            env_prefix: None,
            error_handling: ErrorHandling::ContinueOnError,
            args: Vec::new(),
            parsed: false,
            config_flag: DEFAULT_CONFIG_FLAG.to_string(),
            secret_dir_flag: DEFAULT_SECRET_DIR_FLAG.to_string(),
            required: Vec::new(),
            checks: Vec::new(),
            output: Box::new(io::stderr()),
            usage_fn: None,
            warned: HashSet::new(),
        }
    }

    /// Prefixes environment lookups: with prefix `APP`, flag `port` reads `APP_PORT`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('_');
        self.env_prefix = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Sets the error-handling policy.
    #[must_use]
    pub const fn with_error_handling(mut self, policy: ErrorHandling) -> Self {
        self.error_handling = policy;
        self
    }

    /// The set's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The error-handling policy.
    #[must_use]
    pub const fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    /// The environment prefix, without its trailing underscore.
    #[must_use]
    pub fn env_prefix(&self) -> Option<&str> {
        self.env_prefix.as_deref()
    }

    /// Redirects usage text, error and deprecation messages (default: stderr).
    pub fn set_output(&mut self, output: impl Write + Send + 'static) {
        self.output = Box::new(output);
    }

    /// Replaces the default usage printer.
    pub fn set_usage(
        &mut self,
        usage: impl Fn(&Self, &mut dyn Write) -> io::Result<()> + Send + Sync + 'static,
    ) {
        self.usage_fn = Some(Arc::new(usage));
    }

    /// Renames the flag whose value locates the config file.
    pub fn set_config_flag_name(&mut self, name: impl Into<String>) {
        self.config_flag = name.into();
    }

    /// Renames the flag whose value locates the secret directory.
    pub fn set_secret_dir_flag_name(&mut self, name: impl Into<String>) {
        self.secret_dir_flag = name.into();
    }

    /// Name of the flag that locates the config file.
    #[must_use]
    pub fn config_flag_name(&self) -> &str {
        &self.config_flag
    }

    /// Name of the flag that locates the secret directory.
    #[must_use]
    pub fn secret_dir_flag_name(&self) -> &str {
        &self.secret_dir_flag
    }

    // ------------------------------------------------------------------
    // Declaration
    // ------------------------------------------------------------------

    /// Declares a flag backed by an arbitrary [`Value`].
    ///
    /// The value's current rendering becomes the flag's default.
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared.
    pub fn var(&mut self, value: Box<dyn Value>, name: &str, usage: &str) -> Result<(), Error> {
        if self.formal.contains_key(name) {
            return Err(Error::Redefined {
                set: self.name.clone(),
                name: name.to_string(),
            });
        }

        let key = env_key(None, name);
        if let Some(other) = self
            .formal
            .keys()
            .find(|other| env_key(None, other) == key)
        {
            tracing::warn!(
                flag = name,
                other = other.as_str(),
                variable = key.as_str(),
                "flags share an environment variable"
            );
        }

        let default = value.render();
        tracing::trace!(flag = name, kind = value.type_name(), "declared flag");
        self.formal.insert(
            name.to_string(),
            Flag {
                name: name.to_string(),
                usage: usage.to_string(),
                value,
                default,
                sensitive: false,
                deprecated: None,
            },
        );
        Ok(())
    }

    /// Declares a flag of any [`Scalar`] kind.
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared.
    pub fn define<T: Scalar>(
        &mut self,
        name: &str,
        default: T,
        usage: &str,
    ) -> Result<Binding<T>, Error> {
        self.define_with(name, default, ValueOptions::default(), usage)
    }

    /// Declares a flag of any [`Scalar`] kind with parse options.
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared,
    /// [`Error::InvalidLayout`] if `options` holds a bad strftime layout.
    pub fn define_with<T: Scalar>(
        &mut self,
        name: &str,
        default: T,
        options: ValueOptions,
        usage: &str,
    ) -> Result<Binding<T>, Error> {
        if !options.layout_is_valid() {
            return Err(Error::InvalidLayout {
                flag: name.to_string(),
                layout: options.layout.unwrap_or_default(),
            });
        }
        let value = TypedValue::new(default, options);
        let binding = value.binding();
        self.var(Box::new(value), name, usage)?;
        Ok(binding)
    }

    /// Declares a flag whose every assignment calls `callback`.
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared.
    pub fn func(
        &mut self,
        name: &str,
        usage: &str,
        callback: impl Fn(&str) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.var(Box::new(FuncValue::new(false, callback)), name, usage)
    }

    /// Like [`FlagSet::func`], for a flag that needs no value.
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared.
    pub fn bool_func(
        &mut self,
        name: &str,
        usage: &str,
        callback: impl Fn(&str) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.var(Box::new(FuncValue::new(true, callback)), name, usage)
    }

    /// Marks a declared flag as sensitive.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchFlag`] if the name is not declared.
    pub fn mark_sensitive(&mut self, name: &str) -> Result<(), Error> {
        self.flag_mut(name)?.sensitive = true;
        Ok(())
    }

    /// Marks a declared flag as deprecated. Setting it logs `note` once.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchFlag`] if the name is not declared.
    pub fn mark_deprecated(&mut self, name: &str, note: impl Into<String>) -> Result<(), Error> {
        self.flag_mut(name)?.deprecated = Some(note.into());
        Ok(())
    }

    pub(crate) fn flag_mut(&mut self, name: &str) -> Result<&mut Flag, Error> {
        self.formal.get_mut(name).ok_or_else(|| Error::NoSuchFlag {
            name: name.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    /// Looks up a declared flag.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Flag> {
        self.formal.get(name)
    }

    /// Parses `raw` into the named flag and records it as set programmatically.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchFlag`] for an undeclared name, [`Error::InvalidValue`]
    /// when `raw` does not parse.
    pub fn set(&mut self, name: &str, raw: &str) -> Result<(), Error> {
        if !self.formal.contains_key(name) {
            return Err(Error::NoSuchFlag {
                name: name.to_string(),
            });
        }
        self.assign(name, raw, Source::Manual)
    }

    /// Where the named flag's value came from, or `None` if it is undeclared.
    #[must_use]
    pub fn source_of(&self, name: &str) -> Option<Source> {
        if !self.formal.contains_key(name) {
            return None;
        }
        Some(self.actual.get(name).cloned().unwrap_or(Source::Default))
    }

    /// Returns `true` when some source supplied the named flag.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.actual.contains_key(name)
    }

    /// Visits the flags that were set, in lexicographical order.
    pub fn visit(&self, mut f: impl FnMut(&Flag)) {
        for name in self.actual.keys() {
            if let Some(flag) = self.formal.get(name) {
                f(flag);
            }
        }
    }

    /// Visits every declared flag, in lexicographical order.
    pub fn visit_all(&self, mut f: impl FnMut(&Flag)) {
        self.formal.values().for_each(|flag| f(flag));
    }

    /// Number of flags that were set.
    #[must_use]
    pub fn n_flag(&self) -> usize {
        self.actual.len()
    }

    /// The `i`-th positional argument left after flag scanning.
    #[must_use]
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(String::as_str)
    }

    /// Number of positional arguments.
    #[must_use]
    pub fn n_arg(&self) -> usize {
        self.args.len()
    }

    /// Positional arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns `true` once [`FlagSet::parse`] has been called.
    #[must_use]
    pub const fn parsed(&self) -> bool {
        self.parsed
    }

    /// Names of flags registered as required, in declaration order.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    // ------------------------------------------------------------------
    // Assignment internals shared by all passes
    // ------------------------------------------------------------------

    /// Expands `@file`, parses and stores `raw`, then records provenance.
    pub(crate) fn assign(&mut self, name: &str, raw: &str, source: Source) -> Result<(), Error> {
        let expanded = match crate::indirect::expand_at_file(raw) {
            Ok(Some(expanded)) => expanded,
            Ok(None) => raw.to_string(),
            Err(source_err) => {
                return Err(Error::Indirection {
                    name: name.to_string(),
                    origin: source,
                    source: source_err,
                });
            }
        };
        self.store(name, &expanded, source)
    }

    /// Parses and stores an already expanded value, then records provenance.
    pub(crate) fn store(&mut self, name: &str, raw: &str, source: Source) -> Result<(), Error> {
        let flag = self.flag_mut(name)?;
        if let Err(cause) = flag.value.set(raw) {
            return Err(Error::InvalidValue {
                name: name.to_string(),
                value: raw.to_string(),
                secret: flag.sensitive,
                origin: source,
                source: cause,
            });
        }

        if flag.sensitive {
            tracing::trace!(flag = name, value = MASK, source = source.label(), "applied");
        } else {
            tracing::trace!(flag = name, value = raw, source = source.label(), "applied");
        }

        self.mark_actual(name, source);
        Ok(())
    }

    pub(crate) fn mark_actual(&mut self, name: &str, source: Source) {
        self.actual.insert(name.to_string(), source);

        let Some(note) = self.formal.get(name).and_then(|f| f.deprecated.clone()) else {
            return;
        };
        if self.warned.insert(name.to_string()) {
            tracing::warn!(flag = name, note = %note, "deprecated flag set");
            let _ = writeln!(self.output, "flag -{name} is deprecated: {note}");
        }
    }

    // ------------------------------------------------------------------
    // Usage
    // ------------------------------------------------------------------

    /// Prints the usage message through the custom printer or the default one.
    pub fn usage(&mut self) {
        let mut out = std::mem::replace(&mut self.output, Box::new(io::sink()));
        let result = match self.usage_fn.clone() {
            Some(usage) => usage(self, &mut out),
            None => self.default_usage(&mut out),
        };
        if let Err(err) = result {
            tracing::debug!(error = %err, "failed to write usage");
        }
        self.output = out;
    }

    fn default_usage(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.name.is_empty() {
            writeln!(out, "Usage:")?;
        } else {
            writeln!(out, "Usage of {}:", self.name)?;
        }
        out.write_all(self.defaults_text().as_bytes())
    }

    /// Prints the defaults of every flag to the output writer.
    pub fn print_defaults(&mut self) {
        let text = self.defaults_text();
        if let Err(err) = self.output.write_all(text.as_bytes()) {
            tracing::debug!(error = %err, "failed to write defaults");
        }
    }

    /// The text [`FlagSet::print_defaults`] writes.
    ///
    /// ```text
    ///   -db-password string
    ///     	database password (default "******")
    ///   -v	verbose output
    /// ```
    #[must_use]
    pub fn defaults_text(&self) -> String {
        let mut text = String::new();
        for flag in self.formal.values() {
            let mut line = format!("  -{}", flag.name);
            let (hint, usage) = unquote_usage(flag);
            if !hint.is_empty() {
                line.push(' ');
                line.push_str(&hint);
            }
            // One-letter flags without a type hint share the line with their usage.
            if line.len() <= 4 {
                line.push('\t');
            } else {
                line.push_str("\n    \t");
            }
            line.push_str(&usage.replace('\n', "\n    \t"));

            if !is_zero_value(&flag.default) {
                if flag.value.type_name() == "string" {
                    line.push_str(&format!(" (default {:?})", flag.display_default()));
                } else {
                    line.push_str(&format!(" (default {})", flag.display_default()));
                }
            }
            if let Some(note) = &flag.deprecated {
                line.push_str(&format!(" (deprecated: {note})"));
            }
            text.push_str(&line);
            text.push('\n');
        }
        text
    }

    pub(crate) fn write_message(&mut self, message: &str) {
        let _ = writeln!(self.output, "{message}");
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Reports every flag's value, default and provenance, masking sensitive ones.
    #[must_use]
    pub fn introspect(&self) -> FlagReport {
        let mut report = FlagReport::new();
        for flag in self.formal.values() {
            let source = self.actual.get(&flag.name).cloned();
            report.push(FlagMeta {
                name: flag.name.clone(),
                usage: flag.usage.clone(),
                value: flag.display_value(),
                default: flag.display_default().to_string(),
                set: source.is_some(),
                source: source.unwrap_or(Source::Default),
                sensitive: flag.sensitive,
                deprecated: flag.deprecated.clone(),
            });
        }
        report
    }

    /// Current raw renderings of every flag, keyed by name.
    pub(crate) fn renders(&self) -> HashMap<String, String> {
        self.formal
            .iter()
            .map(|(name, flag)| (name.clone(), flag.value.render()))
            .collect()
    }
}

impl Debug for FlagSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("name", &self.name)
            .field("flags", &self.formal.values().collect::<Vec<_>>())
            .field("actual", &self.actual)
            .field("parsed", &self.parsed)
            .finish_non_exhaustive()
    }
}

fn is_zero_value(default: &str) -> bool {
    matches!(default, "" | "0" | "false" | "0s" | "null")
}

/// Extracts a back-quoted name from the usage text.
///
/// `"a `file` to read"` yields `("file", "a file to read")`. Without back
/// quotes the hint is the value's kind, or empty for boolean flags.
fn unquote_usage(flag: &Flag) -> (String, String) {
    let usage = &flag.usage;
    if let Some(start) = usage.find('`')
        && let Some(len) = usage[start + 1..].find('`')
    {
        let name = &usage[start + 1..start + 1 + len];
        let unquoted = format!("{}{}{}", &usage[..start], name, &usage[start + 2 + len..]);
        return (name.to_string(), unquoted);
    }

    let hint = if flag.value.is_bool_flag() {
        String::new()
    } else {
        flag.value.type_name().to_string()
    };
    (hint, usage.clone())
}

// ============================================================================
// Typed declaration helpers
// ============================================================================

macro_rules! typed_helpers {
    ($( $(#[$meta:meta])* $fn_name:ident: $ty:ty; )+) => {
        impl FlagSet {
            $(
                $(#[$meta])*
                ///
                /// # Errors
                ///
                /// [`Error::Redefined`] if the name is already declared.
                pub fn $fn_name(
                    &mut self,
                    name: &str,
                    default: $ty,
                    usage: &str,
                ) -> Result<Binding<$ty>, Error> {
                    self.define(name, default, usage)
                }
            )+
        }
    };
}

typed_helpers! {
    /// Declares a boolean flag.
    bool: bool;
    /// Declares a signed integer flag.
    int: i64;
    /// Declares a 64-bit signed integer flag.
    i64: i64;
    /// Declares an unsigned integer flag.
    uint: u64;
    /// Declares a 64-bit unsigned integer flag.
    u64: u64;
    /// Declares a floating point flag.
    f64: f64;
    /// Declares a string flag.
    string: String;
    /// Declares a duration flag (`1h30m`).
    duration: Duration;
    /// Declares an arbitrary-precision decimal flag.
    decimal: Decimal;
    /// Declares an IP address flag; `None` until set.
    ip: Option<IpAddr>;
    /// Declares a CIDR network flag; `None` until set.
    ip_net: Option<IpNet>;
    /// Declares a URL flag; `None` until set.
    url: Option<Url>;
    /// Declares a UUID flag.
    uuid: Uuid;
    /// Declares a byte size flag (`10MiB`).
    byte_size: ByteSize;
    /// Declares a regular expression flag; `None` until set.
    regex: Option<Regex>;
    /// Declares a JSON flag, validated for well-formedness.
    json: serde_json::Value;
    /// Declares a key=value map flag.
    string_map: HashMap<String, String>;
}

impl FlagSet {
    /// Declares a timestamp flag parsed with `layout` (RFC 3339 when `None`).
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared,
    /// [`Error::InvalidLayout`] for a bad layout.
    pub fn time(
        &mut self,
        name: &str,
        layout: Option<&str>,
        default: DateTime<Utc>,
        usage: &str,
    ) -> Result<Binding<DateTime<Utc>>, Error> {
        let options = ValueOptions {
            layout: layout.map(str::to_string),
            ..ValueOptions::default()
        };
        self.define_with(name, default, options, usage)
    }

    /// Declares a list of strings split on `separator`.
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared.
    pub fn string_slice(
        &mut self,
        name: &str,
        separator: &str,
        default: Vec<String>,
        usage: &str,
    ) -> Result<Binding<Vec<String>>, Error> {
        let options = ValueOptions::default().with_separator(separator);
        self.define_with(name, default, options, usage)
    }

    /// Declares a list of durations split on `separator`.
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared.
    pub fn duration_slice(
        &mut self,
        name: &str,
        separator: &str,
        default: Vec<Duration>,
        usage: &str,
    ) -> Result<Binding<Vec<Duration>>, Error> {
        let options = ValueOptions::default().with_separator(separator);
        self.define_with(name, default, options, usage)
    }

    /// Declares a string flag restricted to `allowed`.
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared.
    pub fn enumeration<I, S>(
        &mut self,
        name: &str,
        default: &str,
        allowed: I,
        usage: &str,
    ) -> Result<Binding<String>, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = ValueOptions::default().with_choices(allowed);
        self.define_with(name, default.to_string(), options, usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Writer that appends into a shared buffer.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_redefinition_rejected() {
        let mut flags = FlagSet::new("app");
        flags.int("port", 1, "").unwrap();

        let err = flags.int("port", 2, "").unwrap_err();
        assert!(matches!(err, Error::Redefined { .. }));
        assert_eq!(err.to_string(), "app flag redefined: port");
    }

    #[test]
    fn test_set_records_manual_source() {
        let mut flags = FlagSet::new("app");
        let port = flags.int("port", 8080, "").unwrap();
        assert_eq!(flags.source_of("port"), Some(Source::Default));

        flags.set("port", "9000").unwrap();
        assert_eq!(port.get(), 9000);
        assert_eq!(flags.source_of("port"), Some(Source::Manual));
        assert!(flags.is_set("port"));

        assert!(matches!(
            flags.set("missing", "1"),
            Err(Error::NoSuchFlag { .. })
        ));
        assert!(flags.source_of("missing").is_none());
    }

    #[test]
    fn test_set_expands_at_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "from-file").unwrap();

        let mut flags = FlagSet::new("app");
        let name = flags.string("name", String::new(), "").unwrap();
        flags
            .set("name", &format!("@{}", file.path().display()))
            .unwrap();
        assert_eq!(name.get(), "from-file");

        flags.set("name", "@@literal").unwrap();
        assert_eq!(name.get(), "@literal");
    }

    #[test]
    fn test_invalid_value_keeps_default_and_masks() {
        let mut flags = FlagSet::new("app");
        let count = flags.int("count", 3, "").unwrap();
        flags.mark_sensitive("count").unwrap();

        let err = flags.set("count", "hunter2").unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
        assert_eq!(count.get(), 3);
        assert!(!flags.is_set("count"));
    }

    #[test]
    fn test_visit_orders() {
        let mut flags = FlagSet::new("app");
        flags.bool("zeta", false, "").unwrap();
        flags.bool("alpha", false, "").unwrap();
        flags.bool("mid", false, "").unwrap();
        flags.set("zeta", "true").unwrap();
        flags.set("alpha", "true").unwrap();

        let mut all = Vec::new();
        flags.visit_all(|f| all.push(f.name().to_string()));
        assert_eq!(all, ["alpha", "mid", "zeta"]);

        let mut set = Vec::new();
        flags.visit(|f| set.push(f.name().to_string()));
        assert_eq!(set, ["alpha", "zeta"]);
        assert_eq!(flags.n_flag(), 2);
    }

    #[test]
    fn test_defaults_text() {
        let mut flags = FlagSet::new("app");
        flags.bool("v", false, "verbose output").unwrap();
        flags.string("host", "localhost".into(), "bind `address`").unwrap();
        flags.string("token", "abc".into(), "api token").unwrap();
        flags.int("retries", 0, "retry count").unwrap();
        flags.mark_sensitive("token").unwrap();

        let text = flags.defaults_text();
        assert!(text.contains("  -v\tverbose output\n"));
        assert!(text.contains("  -host address\n    \tbind address (default \"localhost\")"));
        assert!(text.contains("(default \"******\")"));
        assert!(!text.contains("abc"));
        assert!(text.contains("  -retries int\n    \tretry count\n"));
    }

    #[test]
    fn test_usage_writes_to_output() {
        let capture = Capture::default();
        let mut flags = FlagSet::new("app");
        flags.set_output(capture.clone());
        flags.bool("debug", false, "debug mode").unwrap();

        flags.usage();
        assert!(capture.text().starts_with("Usage of app:\n"));

        flags.set_usage(|set, out| writeln!(out, "custom {}", set.name()));
        flags.usage();
        assert!(capture.text().ends_with("custom app\n"));
    }

    #[test]
    fn test_deprecated_warns_once() {
        let capture = Capture::default();
        let mut flags = FlagSet::new("app");
        flags.set_output(capture.clone());
        flags.int("old", 0, "").unwrap();
        flags.mark_deprecated("old", "use -new").unwrap();

        flags.set("old", "1").unwrap();
        flags.set("old", "2").unwrap();
        assert_eq!(capture.text().matches("deprecated").count(), 1);
    }

    #[test]
    fn test_func_flag() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut flags = FlagSet::new("app");
        flags
            .func("tag", "repeatable", move |raw| {
                sink.lock().unwrap().push(raw.to_string());
                Ok(())
            })
            .unwrap();

        flags.set("tag", "a").unwrap();
        flags.set("tag", "b").unwrap();
        assert_eq!(*seen.lock().unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_introspect_masks_sensitive() {
        let mut flags = FlagSet::new("app");
        flags.string("password", "default-pw".into(), "").unwrap();
        flags.string("mode", "fast".into(), "").unwrap();
        flags.mark_sensitive("password").unwrap();
        flags.set("password", "supersecret").unwrap();

        let report = flags.introspect();
        let pw = report.get("password").unwrap();
        assert_eq!(pw.value, MASK);
        assert_eq!(pw.default, MASK);
        assert!(pw.set);
        assert!(pw.sensitive);

        let mode = report.get("mode").unwrap();
        assert_eq!(mode.value, "fast");
        assert_eq!(mode.source, Source::Default);
        assert!(!format!("{report}").contains("supersecret"));
    }

    #[test]
    fn test_env_prefix_trimmed() {
        let flags = FlagSet::new("app").with_env_prefix("APP_");
        assert_eq!(flags.env_prefix(), Some("APP"));
        assert_eq!(FlagSet::new("app").with_env_prefix("").env_prefix(), None);
    }
}
