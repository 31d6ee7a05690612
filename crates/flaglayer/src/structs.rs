//! Struct registration.
//!
//! `#[derive(FlagStruct)]` implements [`FlagStruct`] for a struct whose
//! fields carry `#[flag(...)]` attributes. Registration declares one flag per
//! field, then (with [`StructOptions::auto`]) resolves, validates and writes
//! the resolved values back into the struct.
//!
//! ```rust
//! use flaglayer::{FlagSet, FlagStruct, StructOptions};
//!
//! #[derive(FlagStruct, Default)]
//! struct Server {
//!     /// Listen port.
//!     #[flag(default = "8080", min = "1", max = "65535")]
//!     port: u16,
//!     #[flag(name = "db-password", required, sensitive)]
//!     db_password: String,
//! }
//!
//! let mut flags = FlagSet::new("server");
//! let mut server = Server::default();
//! flags
//!     .register_struct(
//!         &mut server,
//!         StructOptions::auto()
//!             .with_args(["-db-password", "hunter2"])
//!             .with_env(Vec::<(String, String)>::new()),
//!     )
//!     .unwrap();
//!
//! assert_eq!(server.port, 8080);
//! assert_eq!(server.db_password, "hunter2");
//! assert!(!format!("{server:?}").contains("hunter2"));
//! ```

use std::ffi::OsString;

use crate::error::Error;
use crate::flag::FlagSet;
use crate::handler::{self, FieldContext};
use crate::validation::Constraint;

/// A struct whose fields map to flags. Derive it with `#[derive(FlagStruct)]`.
pub trait FlagStruct {
    /// Declares a flag for every `#[flag]` field.
    ///
    /// # Errors
    ///
    /// Stops at the first field that fails to register.
    fn register_flags(&self, registrar: &mut Registrar<'_>) -> Result<(), Error>;

    /// Copies resolved values back into the fields.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchFlag`] or [`Error::TypeMismatch`] if the flag set no
    /// longer matches the struct.
    fn load_flags(&mut self, reader: &Reader<'_>) -> Result<(), Error>;
}

/// The attributes of one `#[flag]` field.
#[derive(Clone, Debug, Default)]
pub struct FieldDescriptor {
    field: String,
    name: String,
    help: String,
    default: Option<String>,
    required: bool,
    sensitive: bool,
    deprecated: Option<String>,
    choices: Option<Vec<String>>,
    separator: Option<String>,
    layout: Option<String>,
    min: Option<String>,
    max: Option<String>,
    pattern: Option<String>,
}

impl FieldDescriptor {
    /// Describes Rust field `field`, bound to flag `name`.
    pub fn new(field: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the help text.
    #[must_use]
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Sets the default literal, parsed by the field's kind.
    #[must_use]
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Marks the field required; its default is then ignored.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Masks the field's value wherever it is displayed.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Marks the field deprecated.
    #[must_use]
    pub fn deprecated(mut self, note: impl Into<String>) -> Self {
        self.deprecated = Some(note.into());
        self
    }

    /// Restricts a string field to the given values.
    #[must_use]
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the list separator.
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Sets the timestamp layout.
    #[must_use]
    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Lower bound checked after resolution.
    #[must_use]
    pub fn min(mut self, bound: impl Into<String>) -> Self {
        self.min = Some(bound.into());
        self
    }

    /// Upper bound checked after resolution.
    #[must_use]
    pub fn max(mut self, bound: impl Into<String>) -> Self {
        self.max = Some(bound.into());
        self
    }

    /// Pattern checked after resolution.
    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Rust field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Flag name, without nested prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help text.
    #[must_use]
    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// Default literal.
    #[must_use]
    pub fn default_literal(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Whether the field is required.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the field is sensitive.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Deprecation note.
    #[must_use]
    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    /// Allowed values.
    #[must_use]
    pub fn allowed(&self) -> Option<&[String]> {
        self.choices.as_deref()
    }

    /// List separator.
    #[must_use]
    pub fn list_separator(&self) -> Option<&str> {
        self.separator.as_deref()
    }

    /// Timestamp layout.
    #[must_use]
    pub fn time_layout(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    fn constraints(&self) -> impl Iterator<Item = Constraint> + '_ {
        let min = self.min.clone().map(Constraint::Min);
        let max = self.max.clone().map(Constraint::Max);
        let pattern = self.pattern.clone().map(Constraint::Pattern);
        min.into_iter().chain(max).chain(pattern)
    }
}

fn qualify(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}.{name}"),
        _ => name.to_string(),
    }
}

fn join_prefix(outer: Option<&str>, inner: Option<&str>) -> Option<String> {
    match (outer, inner) {
        (Some(outer), Some(inner)) => Some(qualify(Some(outer), inner)),
        (Some(prefix), None) | (None, Some(prefix)) => Some(prefix.to_string()),
        (None, None) => None,
    }
}

/// Declares flags for the fields of a [`FlagStruct`].
pub struct Registrar<'a> {
    flags: &'a mut FlagSet,
    prefix: Option<String>,
}

impl<'a> Registrar<'a> {
    /// Registers into `flags` without a prefix.
    pub fn new(flags: &'a mut FlagSet) -> Self {
        Self {
            flags,
            prefix: None,
        }
    }

    /// Registers one field whose value before registration is `current`.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedType`], [`Error::InvalidDefault`] or
    /// [`Error::Redefined`]. Nothing is recorded for the field on error.
    pub fn field<T: 'static>(
        &mut self,
        descriptor: FieldDescriptor,
        current: &T,
    ) -> Result<(), Error> {
        let name = qualify(self.prefix.as_deref(), descriptor.name());

        let mut ctx = FieldContext::new(self.flags, &descriptor, name.clone(), current);
        handler::dispatch::<T>(&mut ctx)?;

        if descriptor.is_sensitive() {
            self.flags.mark_sensitive(&name)?;
        }
        if let Some(note) = descriptor.deprecation() {
            self.flags.mark_deprecated(&name, note)?;
        }
        if descriptor.is_required() {
            self.flags.required.push(name.clone());
        }
        for constraint in descriptor.constraints() {
            self.flags.add_constraint(name.clone(), constraint);
        }

        tracing::trace!(field = descriptor.field(), flag = %name, "registered field");
        Ok(())
    }

    /// Registers the fields of a nested struct, prefixing their flag names
    /// with `prefix.` when given.
    ///
    /// # Errors
    ///
    /// See [`Registrar::field`].
    pub fn nested<S: FlagStruct>(&mut self, prefix: Option<&str>, value: &S) -> Result<(), Error> {
        let mut inner = Registrar {
            flags: &mut *self.flags,
            prefix: join_prefix(self.prefix.as_deref(), prefix),
        };
        value.register_flags(&mut inner)
    }
}

/// Reads resolved values back for a [`FlagStruct`].
pub struct Reader<'a> {
    flags: &'a FlagSet,
    prefix: Option<String>,
}

impl<'a> Reader<'a> {
    /// Reads from `flags` without a prefix.
    #[must_use]
    pub const fn new(flags: &'a FlagSet) -> Self {
        Self {
            flags,
            prefix: None,
        }
    }

    /// The current value of flag `name`.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchFlag`] if undeclared, [`Error::TypeMismatch`] if the
    /// flag does not hold a `T`.
    pub fn read<T: 'static>(&self, name: &str) -> Result<T, Error> {
        let name = qualify(self.prefix.as_deref(), name);
        let flag = self
            .flags
            .lookup(&name)
            .ok_or_else(|| Error::NoSuchFlag { name: name.clone() })?;

        flag.value()
            .get()
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::TypeMismatch {
                flag: name,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Loads a nested struct registered with the same prefix.
    ///
    /// # Errors
    ///
    /// See [`Reader::read`].
    pub fn nested<S: FlagStruct>(&self, prefix: Option<&str>, target: &mut S) -> Result<(), Error> {
        let inner = Reader {
            flags: self.flags,
            prefix: join_prefix(self.prefix.as_deref(), prefix),
        };
        target.load_flags(&inner)
    }
}

/// How [`FlagSet::register_struct`] proceeds after declaring flags.
#[derive(Clone, Debug)]
pub struct StructOptions {
    /// Resolve, validate, check required flags and populate the struct.
    pub auto_resolve: bool,
    /// Arguments for resolution; the process arguments when `None`.
    pub args: Option<Vec<String>>,
    /// Environment for resolution; the process environment when `None`.
    pub env: Option<Vec<(OsString, OsString)>>,
}

impl Default for StructOptions {
    fn default() -> Self {
        Self::auto()
    }
}

impl StructOptions {
    /// Registers and resolves in one call.
    #[must_use]
    pub const fn auto() -> Self {
        Self {
            auto_resolve: true,
            args: None,
            env: None,
        }
    }

    /// Registers only; the caller resolves and validates later.
    #[must_use]
    pub const fn manual() -> Self {
        Self {
            auto_resolve: false,
            args: None,
            env: None,
        }
    }

    /// Resolves from `args` instead of the process arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Resolves from `env` instead of the process environment.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env = Some(env.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }
}

impl FlagSet {
    /// Declares a flag for every `#[flag]` field of `target`.
    ///
    /// With [`StructOptions::auto`], then resolves (unless already resolved),
    /// runs every deferred check, checks required flags and writes the
    /// resolved values into `target`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyResolved`] when auto-resolving after [`FlagSet::parse`].
    /// - The first registration error; later fields are not registered.
    /// - Any resolution error.
    /// - Validation failures and [`Error::MissingRequired`], aggregated.
    pub fn register_struct<T: FlagStruct>(
        &mut self,
        target: &mut T,
        options: StructOptions,
    ) -> Result<(), Error> {
        if options.auto_resolve && self.parsed {
            return Err(Error::AlreadyResolved);
        }

        target.register_flags(&mut Registrar::new(self))?;
        if !options.auto_resolve {
            return Ok(());
        }

        let args = options
            .args
            .unwrap_or_else(|| {
                std::env::args_os()
                    .skip(1)
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect()
            });
        match options.env {
            Some(env) => self.parse_with_env(args, env)?,
            None => self.parse(args)?,
        }

        let mut failures = Vec::new();
        if let Err(err) = self.validate() {
            failures.extend(flatten(err));
        }
        if let Err(err) = self.check_required() {
            failures.push(err);
        }
        if let Some(err) = Error::multiple(failures) {
            return Err(err);
        }

        self.populate(target)
    }

    /// Writes the current flag values into `target`'s fields.
    ///
    /// # Errors
    ///
    /// See [`FlagStruct::load_flags`].
    pub fn populate<T: FlagStruct>(&self, target: &mut T) -> Result<(), Error> {
        target.load_flags(&Reader::new(self))
    }

    /// Required flags no source supplied, in registration order.
    #[must_use]
    pub fn missing_required(&self) -> Vec<String> {
        self.required
            .iter()
            .filter(|name| !self.actual.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    /// Fails when a required flag was not supplied.
    ///
    /// # Errors
    ///
    /// [`Error::MissingRequired`] listing every missing flag.
    pub fn check_required(&self) -> Result<(), Error> {
        let names = self.missing_required();
        if names.is_empty() {
            return Ok(());
        }
        Err(Error::MissingRequired { names })
    }
}

fn flatten(err: Error) -> Vec<Error> {
    match err {
        Error::Multiple(multi) => multi.into_errors(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::source::Source;

    #[derive(Default)]
    struct Database {
        url: String,
        pool: u32,
    }

    impl FlagStruct for Database {
        fn register_flags(&self, registrar: &mut Registrar<'_>) -> Result<(), Error> {
            registrar.field(FieldDescriptor::new("url", "url").required(), &self.url)?;
            registrar.field(
                FieldDescriptor::new("pool", "pool").default_value("4").min("1"),
                &self.pool,
            )
        }

        fn load_flags(&mut self, reader: &Reader<'_>) -> Result<(), Error> {
            self.url = reader.read("url")?;
            self.pool = reader.read("pool")?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct App {
        timeout: Duration,
        token: String,
        db: Database,
    }

    impl FlagStruct for App {
        fn register_flags(&self, registrar: &mut Registrar<'_>) -> Result<(), Error> {
            registrar.field(
                FieldDescriptor::new("timeout", "timeout").default_value("5s"),
                &self.timeout,
            )?;
            registrar.field(
                FieldDescriptor::new("token", "token").required().sensitive(),
                &self.token,
            )?;
            registrar.nested(Some("db"), &self.db)
        }

        fn load_flags(&mut self, reader: &Reader<'_>) -> Result<(), Error> {
            self.timeout = reader.read("timeout")?;
            self.token = reader.read("token")?;
            reader.nested(Some("db"), &mut self.db)
        }
    }

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn test_auto_registration() {
        let mut flags = FlagSet::new("test");
        let mut app = App::default();
        flags
            .register_struct(
                &mut app,
                StructOptions::auto()
                    .with_args(["-token", "t0k", "-db.url", "postgres://db"])
                    .with_env([("DB_POOL", "8")]),
            )
            .unwrap();

        assert_eq!(app.timeout, Duration::from_secs(5));
        assert_eq!(app.token, "t0k");
        assert_eq!(app.db.url, "postgres://db");
        assert_eq!(app.db.pool, 8);
        assert_eq!(flags.source_of("db.pool"), Some(Source::Environment));
        assert!(flags.lookup("token").unwrap().is_sensitive());
    }

    #[test]
    fn test_missing_and_invalid_aggregate() {
        let mut flags = FlagSet::new("test");
        let mut app = App::default();
        let err = flags
            .register_struct(
                &mut app,
                StructOptions::auto()
                    .with_args(["-db.pool", "0"])
                    .with_env(no_env()),
            )
            .unwrap_err();

        let messages: Vec<String> = err.errors().iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            [
                "db.pool: value 0 < min 1",
                "missing required flags: token, db.url"
            ]
        );
        assert!(app.token.is_empty());
    }

    #[test]
    fn test_already_resolved() {
        let mut flags = FlagSet::new("test");
        flags.parse_with_env(Vec::<String>::new(), no_env()).unwrap();

        let mut app = App::default();
        let err = flags
            .register_struct(&mut app, StructOptions::auto())
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyResolved));

        flags
            .register_struct(&mut app, StructOptions::manual())
            .unwrap();
        assert_eq!(flags.missing_required(), ["token", "db.url"]);
    }

    #[test]
    fn test_manual_then_populate() {
        let mut flags = FlagSet::new("test");
        let mut db = Database::default();
        flags
            .register_struct(&mut db, StructOptions::manual())
            .unwrap();
        assert!(!flags.parsed());

        flags
            .parse_with_env(["-url", "sqlite://"], no_env())
            .unwrap();
        flags.check_required().unwrap();
        flags.validate().unwrap();
        flags.populate(&mut db).unwrap();
        assert_eq!(db.url, "sqlite://");
        assert_eq!(db.pool, 4);
    }

    #[test]
    fn test_reader_type_mismatch() {
        let mut flags = FlagSet::new("test");
        flags.int("port", 1, "").unwrap();
        let reader = Reader::new(&flags);

        assert!(matches!(
            reader.read::<String>("port"),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            reader.read::<i64>("missing"),
            Err(Error::NoSuchFlag { .. })
        ));
        assert_eq!(reader.read::<i64>("port").unwrap(), 1);
    }

    #[test]
    fn test_prefix_joining() {
        assert_eq!(qualify(None, "a"), "a");
        assert_eq!(qualify(Some("db"), "a"), "db.a");
        assert_eq!(join_prefix(Some("app"), Some("db")).as_deref(), Some("app.db"));
        assert_eq!(join_prefix(None, Some("db")).as_deref(), Some("db"));
        assert_eq!(join_prefix(Some("app"), None).as_deref(), Some("app"));
    }
}
