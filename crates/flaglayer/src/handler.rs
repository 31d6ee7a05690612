//! Type-keyed field handlers for struct registration.
//!
//! Every `#[flag]` field is registered by looking up its [`TypeId`]:
//!
//! 1. handlers installed with [`register_field_handler`] or
//!    [`register_scalar`] are consulted first, and may decline a field by
//!    returning `Ok(false)`;
//! 2. otherwise the built-in table covers every kind listed in
//!    [`value`](crate::value);
//! 3. anything else is [`Error::UnsupportedType`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use parking_lot::RwLock;
use regex::Regex;
use rust_decimal::Decimal;
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::flag::FlagSet;
use crate::structs::FieldDescriptor;
use crate::value::{ByteSize, Scalar, ValueOptions};

/// A user-supplied field handler. Returns `Ok(true)` when it declared the flag.
pub type FieldHandler = Arc<dyn Fn(&mut FieldContext<'_>) -> Result<bool, Error> + Send + Sync>;

type BuiltinHandler = fn(&mut FieldContext<'_>) -> Result<(), Error>;

static USER_HANDLERS: LazyLock<RwLock<HashMap<TypeId, FieldHandler>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

static BUILTIN_HANDLERS: LazyLock<HashMap<TypeId, BuiltinHandler>> = LazyLock::new(|| {
    let mut table: HashMap<TypeId, BuiltinHandler> = HashMap::new();

    macro_rules! builtin {
        ($($ty:ty),+ $(,)?) => {
            $( table.insert(TypeId::of::<$ty>(), install_scalar::<$ty>); )+
        };
    }

    builtin!(
        bool,
        i8,
        i16,
        i32,
        i64,
        isize,
        u8,
        u16,
        u32,
        u64,
        usize,
        f32,
        f64,
        String,
        Duration,
        DateTime<Utc>,
        Decimal,
        Option<IpAddr>,
        Option<IpNet>,
        Option<Url>,
        Uuid,
        ByteSize,
        Option<Regex>,
        serde_json::Value,
        Vec<String>,
        Vec<Duration>,
        Vec<DateTime<Utc>>,
        HashMap<String, String>,
    );
    table
});

/// Installs a handler for fields of type `T`, replacing any earlier one.
///
/// ```rust
/// use flaglayer::{FieldContext, register_field_handler};
///
/// #[derive(Clone, Default)]
/// struct Hostname(String);
///
/// register_field_handler::<Hostname>(|ctx: &mut FieldContext<'_>| {
///     let current = ctx.current::<Hostname>().map(|h| h.0.clone()).unwrap_or_default();
///     let initial = ctx.descriptor().default_literal().map_or(current, str::to_lowercase);
///     ctx.define(initial)?;
///     Ok(true)
/// });
/// ```
pub fn register_field_handler<T: 'static>(
    handler: impl Fn(&mut FieldContext<'_>) -> Result<bool, Error> + Send + Sync + 'static,
) {
    tracing::debug!(type_name = std::any::type_name::<T>(), "registered field handler");
    USER_HANDLERS
        .write()
        .insert(TypeId::of::<T>(), Arc::new(handler));
}

/// Makes a custom [`Scalar`] usable as a struct field type.
pub fn register_scalar<T: Scalar + Default>() {
    register_field_handler::<T>(|ctx| {
        install_scalar::<T>(ctx)?;
        Ok(true)
    });
}

fn install_scalar<T: Scalar + Default>(ctx: &mut FieldContext<'_>) -> Result<(), Error> {
    let initial = ctx.initial_value::<T>()?;
    ctx.define(initial)
}

/// Declares the flag for one field through the handler chain.
pub(crate) fn dispatch<T: 'static>(ctx: &mut FieldContext<'_>) -> Result<(), Error> {
    let type_id = TypeId::of::<T>();

    // Cloned out so a handler may register further handlers.
    let user = USER_HANDLERS.read().get(&type_id).cloned();
    if let Some(handler) = user
        && handler(ctx)?
    {
        return Ok(());
    }

    match BUILTIN_HANDLERS.get(&type_id) {
        Some(builtin) => builtin(ctx),
        None => Err(Error::UnsupportedType {
            field: ctx.descriptor.field().to_string(),
            flag: ctx.flag_name.clone(),
            type_name: std::any::type_name::<T>(),
        }),
    }
}

/// What a handler sees while registering one field.
pub struct FieldContext<'a> {
    flags: &'a mut FlagSet,
    descriptor: &'a FieldDescriptor,
    flag_name: String,
    current: &'a dyn Any,
}

impl<'a> FieldContext<'a> {
    pub(crate) fn new(
        flags: &'a mut FlagSet,
        descriptor: &'a FieldDescriptor,
        flag_name: String,
        current: &'a dyn Any,
    ) -> Self {
        Self {
            flags,
            descriptor,
            flag_name,
            current,
        }
    }

    /// The field's attributes.
    #[must_use]
    pub const fn descriptor(&self) -> &FieldDescriptor {
        self.descriptor
    }

    /// The flag name, including any nested prefix.
    #[must_use]
    pub fn flag_name(&self) -> &str {
        &self.flag_name
    }

    /// The field's value before registration, if it is a `T`.
    #[must_use]
    pub fn current<T: 'static>(&self) -> Option<&T> {
        self.current.downcast_ref::<T>()
    }

    /// Parse options derived from the field's `sep`, `layout` and `choices`.
    #[must_use]
    pub fn options(&self) -> ValueOptions {
        let mut options = ValueOptions::default();
        if let Some(separator) = self.descriptor.list_separator() {
            options = options.with_separator(separator);
        }
        if let Some(layout) = self.descriptor.time_layout() {
            options = options.with_layout(layout);
        }
        if let Some(choices) = self.descriptor.allowed() {
            options = options.with_choices(choices.iter().cloned());
        }
        options
    }

    /// The flag's starting value.
    ///
    /// Required fields start from `T::default()`. Otherwise a declared default
    /// is parsed by the kind, and without one the field's current value is kept.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLayout`] for a bad `layout` tag, and
    /// [`Error::InvalidDefault`] when the declared default does not parse.
    pub fn initial_value<T: Scalar + Default>(&self) -> Result<T, Error> {
        let options = self.options();
        if !options.layout_is_valid() {
            return Err(Error::InvalidLayout {
                flag: self.flag_name.clone(),
                layout: options.layout.unwrap_or_default(),
            });
        }

        if self.descriptor.is_required() {
            return Ok(T::default());
        }

        if let Some(raw) = self.descriptor.default_literal() {
            return T::parse_scalar(raw, &options).map_err(|source| {
                Error::InvalidDefault {
                    field: self.descriptor.field().to_string(),
                    flag: self.flag_name.clone(),
                    value: raw.to_string(),
                    secret: self.descriptor.is_sensitive(),
                    kind: T::KIND,
                    help: format!("the default must be a valid {} value", T::KIND),
                    source,
                }
            });
        }

        Ok(self.current::<T>().cloned().unwrap_or_default())
    }

    /// Declares the flag with `initial` as its default.
    ///
    /// # Errors
    ///
    /// [`Error::Redefined`] if the name is already declared.
    pub fn define<T: Scalar>(&mut self, initial: T) -> Result<(), Error> {
        let options = self.options();
        self.flags
            .define_with(&self.flag_name, initial, options, self.descriptor.help_text())?;
        Ok(())
    }

    /// The flag set being registered into.
    pub fn flags(&mut self) -> &mut FlagSet {
        self.flags
    }
}
