//! Typed value cells and the parse/format contract of every flag kind.
//!
//! A flag owns a boxed [`Value`]. Built-in kinds implement [`Scalar`] and are
//! stored in a [`TypedValue`], whose [`Binding`] is handed back to the caller
//! so the resolved value can be read after (and during, with hot reload)
//! resolution.
//!
//! | Kind | Rust type | Syntax |
//! |------|-----------|--------|
//! | `bool` | `bool` | `1 0 t f T F true false TRUE FALSE True False` |
//! | `int` / `uint` | `i8`..`i64`, `u8`..`u64` | decimal, `0x`, `0o`, `0b` |
//! | `float` | `f32`, `f64` | Rust float syntax |
//! | `string` | `String` | verbatim, optionally restricted to choices |
//! | `duration` | [`Duration`] | `1h30m`, `250ms` |
//! | `time` | [`DateTime<Utc>`] | RFC 3339, or a strftime layout |
//! | `decimal` | [`Decimal`] | `12.50` |
//! | `ip` / `cidr` | `Option<IpAddr>`, `Option<IpNet>` | empty means unset |
//! | `url` | `Option<Url>` | absolute URL |
//! | `uuid` | [`Uuid`] | hyphenated |
//! | `size` | [`ByteSize`] | `512`, `10KB`, `1.5GiB` |
//! | `regexp` | `Option<Regex>` | regex syntax |
//! | `json` | [`serde_json::Value`] | any JSON document |
//! | `list` | `Vec<String>`, `Vec<Duration>`, `Vec<DateTime<Utc>>` | separated items |
//! | `map` | `HashMap<String, String>` | `k=v,k2=v2` |

use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter, Write as _};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use ipnet::IpNet;
use num_traits::ToPrimitive;
use parking_lot::RwLock;
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::error::BoxError;

/// Structured parse failures raised by the built-in kinds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScalarError {
    /// Input is not valid syntax for the kind.
    #[error("invalid syntax")]
    Syntax,

    /// Input is syntactically valid but does not fit the target type.
    #[error("value out of range")]
    Range,

    /// Input is not one of the allowed choices.
    #[error("invalid value {value:?} (allowed: {allowed})")]
    NotAllowed {
        /// The rejected input.
        value: String,
        /// Comma-joined allowed values.
        allowed: String,
    },

    /// A map entry has no `=` or an empty key.
    #[error("invalid map entry {0:?}")]
    MapEntry(String),

    /// A byte size has an unknown unit suffix.
    #[error("unknown size unit in {0:?}")]
    SizeUnit(String),
}

/// Comparable projection of a value, used by min/max/pattern constraints.
#[derive(Clone, Debug, PartialEq)]
pub enum Measure {
    /// Signed integer kinds, compared exactly.
    Signed(i128),
    /// Unsigned integer kinds, compared exactly.
    Unsigned(u128),
    /// Floating point and decimal kinds.
    Number(f64),
    /// Elapsed-time kinds.
    Elapsed(Duration),
    /// Byte counts.
    Bytes(i64),
    /// Strings: bounds apply to the character count, patterns to the text.
    Text(String),
    /// Lists and maps: bounds apply to the element count.
    Length(usize),
    /// Kinds that support no constraints.
    Opaque,
}

/// Per-flag parse parameters taken from struct tags or declaration helpers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueOptions {
    /// List separator; `,` when unset.
    pub separator: Option<String>,
    /// strftime layout for timestamps; RFC 3339 when unset.
    pub layout: Option<String>,
    /// Allowed values for strings; unrestricted when empty.
    pub choices: Vec<String>,
}

impl ValueOptions {
    /// Sets the list separator.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Sets the timestamp layout.
    #[must_use]
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Restricts strings to the given choices.
    #[must_use]
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `false` when the layout has a specifier strftime does not know.
    #[must_use]
    pub fn layout_is_valid(&self) -> bool {
        self.layout
            .as_deref()
            .is_none_or(|layout| StrftimeItems::new(layout).all(|item| !matches!(item, Item::Error)))
    }

    /// The effective list separator.
    #[must_use]
    pub fn separator(&self) -> &str {
        match self.separator.as_deref() {
            Some(sep) if !sep.is_empty() => sep,
            _ => ",",
        }
    }
}

/// A flag's mutable value cell.
///
/// Implement this directly for values that do not fit [`Scalar`], then
/// declare them with [`FlagSet::var`](crate::FlagSet::var).
pub trait Value: Send + Sync {
    /// Parses `raw` and stores the result.
    ///
    /// # Errors
    ///
    /// Returns the parse failure; the stored value is unchanged on error.
    fn set(&mut self, raw: &str) -> Result<(), BoxError>;

    /// Formats the current value.
    fn render(&self) -> String;

    /// Boolean values may appear without an explicit value.
    fn is_bool_flag(&self) -> bool {
        false
    }

    /// Snapshot of the current typed value.
    fn get(&self) -> Box<dyn Any + Send>;

    /// Short kind name for usage text and error messages.
    fn type_name(&self) -> &'static str {
        "value"
    }

    /// Projection used by deferred constraints.
    fn measure(&self) -> Measure {
        Measure::Opaque
    }

    /// Restores the declared default, whose formatted form is `default`.
    ///
    /// # Errors
    ///
    /// Returns the parse failure of `default`.
    fn reset(&mut self, default: &str) -> Result<(), BoxError> {
        self.set(default)
    }

    /// Restores a snapshot taken with [`Value::get`].
    ///
    /// Returns `false` when the snapshot has the wrong type or the value
    /// does not support snapshots.
    fn restore(&mut self, snapshot: Box<dyn Any + Send>) -> bool {
        let _ = snapshot;
        false
    }
}

/// Shared, thread-safe cell through which callers read a resolved value.
///
/// Cloning a binding is cheap; every clone observes the same value.
pub struct Binding<T>(Arc<RwLock<T>>);

impl<T> Binding<T> {
    /// Creates a binding holding `value`.
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Reads the value through a closure without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.read())
    }

    pub(crate) fn replace(&self, value: T) {
        *self.0.write() = value;
    }
}

impl<T: Clone> Binding<T> {
    /// Returns a copy of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.0.read().clone()
    }
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Debug> Debug for Binding<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Binding").field(&*self.0.read()).finish()
    }
}

/// The parse/format contract of a flag kind.
///
/// Implement this for a custom type and register it with
/// [`register_scalar`](crate::register_scalar) to use it in struct fields.
pub trait Scalar: Clone + Send + Sync + 'static {
    /// Short kind name (e.g. `int`, `duration`).
    const KIND: &'static str;

    /// Whether the kind may appear without an explicit value.
    const IS_BOOL: bool = false;

    /// Parses a raw value.
    ///
    /// # Errors
    ///
    /// Returns the reason the input is not valid for the kind.
    fn parse_scalar(raw: &str, options: &ValueOptions) -> Result<Self, BoxError>;

    /// Formats the value so that `parse_scalar` accepts it again.
    fn format_scalar(&self, options: &ValueOptions) -> String;

    /// Projection used by deferred constraints.
    fn measure(&self) -> Measure {
        Measure::Opaque
    }
}

/// [`Value`] implementation shared by every [`Scalar`] kind.
pub struct TypedValue<T: Scalar> {
    cell: Binding<T>,
    default: T,
    options: ValueOptions,
}

impl<T: Scalar> TypedValue<T> {
    /// Creates a value whose default and current content is `initial`.
    pub fn new(initial: T, options: ValueOptions) -> Self {
        Self {
            cell: Binding::new(initial.clone()),
            default: initial,
            options,
        }
    }

    /// A binding that observes this value.
    #[must_use]
    pub fn binding(&self) -> Binding<T> {
        self.cell.clone()
    }
}

impl<T: Scalar> Value for TypedValue<T> {
    fn set(&mut self, raw: &str) -> Result<(), BoxError> {
        let parsed = T::parse_scalar(raw, &self.options)?;
        self.cell.replace(parsed);
        Ok(())
    }

    fn render(&self) -> String {
        self.cell.read(|value| value.format_scalar(&self.options))
    }

    fn is_bool_flag(&self) -> bool {
        T::IS_BOOL
    }

    fn get(&self) -> Box<dyn Any + Send> {
        Box::new(self.cell.get())
    }

    fn type_name(&self) -> &'static str {
        T::KIND
    }

    fn measure(&self) -> Measure {
        self.cell.read(Scalar::measure)
    }

    fn reset(&mut self, _default: &str) -> Result<(), BoxError> {
        self.cell.replace(self.default.clone());
        Ok(())
    }

    fn restore(&mut self, snapshot: Box<dyn Any + Send>) -> bool {
        match snapshot.downcast::<T>() {
            Ok(value) => {
                self.cell.replace(*value);
                true
            }
            Err(_) => false,
        }
    }
}

/// Value whose every assignment invokes a callback.
pub(crate) struct FuncValue {
    callback: Box<dyn Fn(&str) -> Result<(), BoxError> + Send + Sync>,
    last: String,
    boolean: bool,
}

impl FuncValue {
    pub(crate) fn new(
        boolean: bool,
        callback: impl Fn(&str) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
            last: String::new(),
            boolean,
        }
    }
}

impl Value for FuncValue {
    fn set(&mut self, raw: &str) -> Result<(), BoxError> {
        (self.callback)(raw)?;
        raw.clone_into(&mut self.last);
        Ok(())
    }

    fn render(&self) -> String {
        self.last.clone()
    }

    fn is_bool_flag(&self) -> bool {
        self.boolean
    }

    fn get(&self) -> Box<dyn Any + Send> {
        Box::new(self.last.clone())
    }

    fn type_name(&self) -> &'static str {
        if self.boolean { "" } else { "value" }
    }

    fn reset(&mut self, _default: &str) -> Result<(), BoxError> {
        self.last.clear();
        Ok(())
    }
}

// ============================================================================
// Built-in kinds
// ============================================================================

impl Scalar for bool {
    const KIND: &'static str = "bool";
    const IS_BOOL: bool = true;

    fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
        match raw {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err(ScalarError::Syntax.into()),
        }
    }

    fn format_scalar(&self, _: &ValueOptions) -> String {
        self.to_string()
    }
}

/// Splits an integer literal into sign, digits and radix.
fn split_int_literal(raw: &str) -> Result<(bool, &str, u32), ScalarError> {
    let (negative, unsigned) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };

    let lower = unsigned.get(..2).map(str::to_ascii_lowercase);
    let (digits, radix) = match lower.as_deref() {
        Some("0x") => (&unsigned[2..], 16),
        Some("0o") => (&unsigned[2..], 8),
        Some("0b") => (&unsigned[2..], 2),
        _ => (unsigned, 10),
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(ScalarError::Syntax);
    }

    Ok((negative, digits, radix))
}

pub(crate) fn parse_signed(raw: &str) -> Result<i128, ScalarError> {
    let (negative, digits, radix) = split_int_literal(raw)?;
    let magnitude = i128::from_str_radix(digits, radix).map_err(|_| ScalarError::Syntax)?;
    Ok(if negative { -magnitude } else { magnitude })
}

pub(crate) fn parse_unsigned(raw: &str) -> Result<u128, ScalarError> {
    let (negative, digits, radix) = split_int_literal(raw)?;
    if negative {
        return Err(ScalarError::Syntax);
    }
    u128::from_str_radix(digits, radix).map_err(|_| ScalarError::Syntax)
}

macro_rules! impl_integer {
    ($parse:ident, $measure:ident, $kind:literal: $($ty:ty),+ $(,)?) => {$(
        impl Scalar for $ty {
            const KIND: &'static str = $kind;

            fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
                let wide = $parse(raw)?;
                <$ty>::try_from(wide).map_err(|_| ScalarError::Range.into())
            }

            fn format_scalar(&self, _: &ValueOptions) -> String {
                self.to_string()
            }

            fn measure(&self) -> Measure {
                (*self).try_into().map_or(Measure::Opaque, Measure::$measure)
            }
        }
    )+};
}

impl_integer!(parse_signed, Signed, "int": i8, i16, i32, i64, isize);
impl_integer!(parse_unsigned, Unsigned, "uint": u8, u16, u32, u64, usize);

macro_rules! impl_float {
    ($($ty:ty),+ $(,)?) => {$(
        impl Scalar for $ty {
            const KIND: &'static str = "float";

            fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
                Ok(raw.parse::<$ty>()?)
            }

            fn format_scalar(&self, _: &ValueOptions) -> String {
                self.to_string()
            }

            fn measure(&self) -> Measure {
                self.to_f64().map_or(Measure::Opaque, Measure::Number)
            }
        }
    )+};
}

impl_float!(f32, f64);

impl Scalar for String {
    const KIND: &'static str = "string";

    fn parse_scalar(raw: &str, options: &ValueOptions) -> Result<Self, BoxError> {
        if !options.choices.is_empty() && !options.choices.iter().any(|c| c == raw) {
            return Err(ScalarError::NotAllowed {
                value: raw.to_string(),
                allowed: options.choices.join(","),
            }
            .into());
        }
        Ok(raw.to_string())
    }

    fn format_scalar(&self, _: &ValueOptions) -> String {
        self.clone()
    }

    fn measure(&self) -> Measure {
        Measure::Text(self.clone())
    }
}

impl Scalar for Duration {
    const KIND: &'static str = "duration";

    fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
        Ok(humantime::parse_duration(raw.trim())?)
    }

    fn format_scalar(&self, _: &ValueOptions) -> String {
        humantime::format_duration(*self).to_string()
    }

    fn measure(&self) -> Measure {
        Measure::Elapsed(*self)
    }
}

impl Scalar for DateTime<Utc> {
    const KIND: &'static str = "time";

    fn parse_scalar(raw: &str, options: &ValueOptions) -> Result<Self, BoxError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let Some(layout) = options.layout.as_deref() else {
            return Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc));
        };

        if let Ok(zoned) = DateTime::parse_from_str(raw, layout) {
            return Ok(zoned.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Ok(naive.and_utc());
        }
        let date = NaiveDate::parse_from_str(raw, layout)?;
        date.and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| ScalarError::Range.into())
    }

    // The Unix epoch is the zero time and renders empty.
    fn format_scalar(&self, options: &ValueOptions) -> String {
        if *self == Self::default() {
            return String::new();
        }
        let Some(layout) = options.layout.as_deref() else {
            return self.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        };

        let mut out = String::new();
        if write!(out, "{}", self.format(layout)).is_err() {
            out.clear();
        }
        out
    }
}

impl Scalar for Decimal {
    const KIND: &'static str = "decimal";

    fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
        Ok(Self::from_str(raw.trim())?)
    }

    fn format_scalar(&self, _: &ValueOptions) -> String {
        self.to_string()
    }

    fn measure(&self) -> Measure {
        self.to_f64().map_or(Measure::Opaque, Measure::Number)
    }
}

macro_rules! impl_optional {
    ($kind:literal, $ty:ty, |$raw:ident| $parse:expr, |$value:ident| $format:expr) => {
        impl Scalar for Option<$ty> {
            const KIND: &'static str = $kind;

            fn parse_scalar($raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
                if $raw.is_empty() {
                    return Ok(None);
                }
                Ok(Some($parse))
            }

            fn format_scalar(&self, _: &ValueOptions) -> String {
                self.as_ref().map_or_else(String::new, |$value| $format)
            }
        }
    };
}

impl_optional!("ip", IpAddr, |raw| raw.parse::<IpAddr>()?, |ip| ip.to_string());
impl_optional!("cidr", IpNet, |raw| raw.parse::<IpNet>()?.trunc(), |net| net
    .to_string());
impl_optional!("regexp", Regex, |raw| Regex::new(raw)?, |re| re.as_str().to_string());

impl Scalar for Option<Url> {
    const KIND: &'static str = "url";

    fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(Url::parse(raw)?))
    }

    fn format_scalar(&self, _: &ValueOptions) -> String {
        self.as_ref().map_or_else(String::new, ToString::to_string)
    }

    fn measure(&self) -> Measure {
        Measure::Text(self.as_ref().map_or_else(String::new, ToString::to_string))
    }
}

impl Scalar for Uuid {
    const KIND: &'static str = "uuid";

    fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
        Ok(Self::parse_str(raw.trim())?)
    }

    fn format_scalar(&self, _: &ValueOptions) -> String {
        self.hyphenated().to_string()
    }
}

impl Scalar for serde_json::Value {
    const KIND: &'static str = "json";

    fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
        if raw.trim().is_empty() {
            return Ok(Self::Null);
        }
        Ok(serde_json::from_str(raw)?)
    }

    fn format_scalar(&self, _: &ValueOptions) -> String {
        self.to_string()
    }
}

impl<T: Scalar> Scalar for Vec<T> {
    const KIND: &'static str = "list";

    fn parse_scalar(raw: &str, options: &ValueOptions) -> Result<Self, BoxError> {
        if raw.is_empty() {
            return Ok(Self::new());
        }
        raw.split(options.separator())
            .map(|item| T::parse_scalar(item.trim(), options))
            .collect()
    }

    fn format_scalar(&self, options: &ValueOptions) -> String {
        self.iter()
            .map(|item| item.format_scalar(options))
            .collect::<Vec<_>>()
            .join(options.separator())
    }

    fn measure(&self) -> Measure {
        Measure::Length(self.len())
    }
}

impl Scalar for HashMap<String, String> {
    const KIND: &'static str = "map";

    fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
        let mut map = Self::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| ScalarError::MapEntry(entry.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ScalarError::MapEntry(entry.to_string()).into());
            }
            map.insert(key.to_string(), value.trim().to_string());
        }
        Ok(map)
    }

    fn format_scalar(&self, _: &ValueOptions) -> String {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort();
        entries
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn measure(&self) -> Measure {
        Measure::Length(self.len())
    }
}

// ============================================================================
// Byte sizes
// ============================================================================

/// A byte count parsed from human-friendly sizes.
///
/// Decimal units (`K`, `KB`, `M`, `MB`, `G`, `GB`, `T`, `TB`) are powers of
/// 1000, binary units (`Ki`, `KiB`, ... `Ti`, `TiB`) powers of 1024. Units are
/// case-insensitive and the number may have a fraction. An empty string is
/// zero bytes. Formatting yields the plain byte count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(pub i64);

impl ByteSize {
    /// The number of bytes.
    #[must_use]
    pub const fn bytes(self) -> i64 {
        self.0
    }
}

fn size_multiplier(unit: &str) -> Option<f64> {
    const K: f64 = 1000.0;
    const KI: f64 = 1024.0;

    let multiplier = match unit {
        "" | "B" => 1.0,
        "K" | "KB" => K,
        "KI" | "KIB" => KI,
        "M" | "MB" => K * K,
        "MI" | "MIB" => KI * KI,
        "G" | "GB" => K * K * K,
        "GI" | "GIB" => KI * KI * KI,
        "T" | "TB" => K * K * K * K,
        "TI" | "TIB" => KI * KI * KI * KI,
        _ => return None,
    };
    Some(multiplier)
}

impl FromStr for ByteSize {
    type Err = BoxError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self(0));
        }

        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '+' | '-')))
            .unwrap_or(trimmed.len());
        if split == 0 {
            return Err(ScalarError::Syntax.into());
        }

        let (number, unit) = trimmed.split_at(split);
        let number: f64 = number.parse()?;
        let multiplier = size_multiplier(&unit.trim().to_ascii_uppercase())
            .ok_or_else(|| ScalarError::SizeUnit(raw.to_string()))?;

        let bytes = number * multiplier;
        if !bytes.is_finite() {
            return Err(ScalarError::Range.into());
        }
        // Fractional bytes truncate toward zero.
        bytes.to_i64().map(Self).ok_or_else(|| ScalarError::Range.into())
    }
}

impl Display for ByteSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Scalar for ByteSize {
    const KIND: &'static str = "size";

    fn parse_scalar(raw: &str, _: &ValueOptions) -> Result<Self, BoxError> {
        raw.parse()
    }

    fn format_scalar(&self, _: &ValueOptions) -> String {
        self.to_string()
    }

    fn measure(&self) -> Measure {
        Measure::Bytes(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: Scalar>(raw: &str) -> Result<T, BoxError> {
        T::parse_scalar(raw, &ValueOptions::default())
    }

    #[test]
    fn test_bool_tokens() {
        for raw in ["1", "t", "T", "true", "TRUE", "True"] {
            assert!(parse::<bool>(raw).unwrap(), "{raw}");
        }
        for raw in ["0", "f", "F", "false", "FALSE", "False"] {
            assert!(!parse::<bool>(raw).unwrap(), "{raw}");
        }
        assert!(parse::<bool>("yes").is_err());
        assert!(parse::<bool>("").is_err());
    }

    #[test]
    fn test_integer_literals() {
        assert_eq!(parse::<i64>("42").unwrap(), 42);
        assert_eq!(parse::<i64>("-42").unwrap(), -42);
        assert_eq!(parse::<i64>("0x1f").unwrap(), 31);
        assert_eq!(parse::<i64>("0b101").unwrap(), 5);
        assert_eq!(parse::<u16>("0o17").unwrap(), 15);
        assert!(parse::<i64>("NaN").is_err());
        assert!(parse::<i64>("--1").is_err());
        assert!(parse::<u64>("-1").is_err());
        assert!(parse::<u8>("256").is_err());
    }

    #[test]
    fn test_enum_choices() {
        let options = ValueOptions::default().with_choices(["fast", "slow"]);
        assert_eq!(String::parse_scalar("fast", &options).unwrap(), "fast");

        let err = String::parse_scalar("medium", &options).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"medium\" (allowed: fast,slow)"
        );
    }

    #[test]
    fn test_duration_round_trip() {
        let d = parse::<Duration>("1h30m").unwrap();
        assert_eq!(d, Duration::from_secs(5400));
        let text = d.format_scalar(&ValueOptions::default());
        assert_eq!(parse::<Duration>(&text).unwrap(), d);
    }

    #[test]
    fn test_time_layouts() {
        let rfc = parse::<DateTime<Utc>>("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(
            rfc.format_scalar(&ValueOptions::default()),
            "2024-03-01T10:00:00Z"
        );

        let options = ValueOptions::default().with_layout("%Y-%m-%d");
        let day = DateTime::<Utc>::parse_scalar("2024-03-01", &options).unwrap();
        assert_eq!(day.format_scalar(&options), "2024-03-01");
        assert!(DateTime::<Utc>::parse_scalar("03/01/2024", &options).is_err());
    }

    #[test]
    fn test_zero_time_renders_empty() {
        let zero = DateTime::<Utc>::default();
        assert_eq!(zero.format_scalar(&ValueOptions::default()), "");
        assert_eq!(parse::<DateTime<Utc>>("").unwrap(), zero);

        let mut value = TypedValue::new(zero, ValueOptions::default().with_layout("%Y"));
        assert_eq!(value.render(), "");
        value.set("").unwrap();
    }

    #[test]
    fn test_layout_validity() {
        assert!(ValueOptions::default().layout_is_valid());
        assert!(ValueOptions::default().with_layout("%Y-%m-%d").layout_is_valid());
        assert!(!ValueOptions::default().with_layout("%Y-%m-%d %").layout_is_valid());
        assert!(!ValueOptions::default().with_layout("%Q").layout_is_valid());

        // A bad layout never panics while formatting.
        let options = ValueOptions::default().with_layout("%Y-%m-%d %");
        let now = parse::<DateTime<Utc>>("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(now.format_scalar(&options), "");
    }

    #[test]
    fn test_optional_network_kinds() {
        assert_eq!(parse::<Option<IpAddr>>("").unwrap(), None);
        assert!(parse::<Option<IpAddr>>("10.0.0.1").unwrap().is_some());
        assert!(parse::<Option<IpAddr>>("10.0.0").is_err());

        let net = parse::<Option<IpNet>>("10.1.2.3/8").unwrap().unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/8");

        assert!(parse::<Option<Url>>("https://example.com/x").unwrap().is_some());
        assert!(parse::<Option<Url>>("not a url").is_err());
    }

    #[test]
    fn test_json_validated() {
        assert_eq!(parse::<serde_json::Value>("").unwrap(), serde_json::Value::Null);
        assert!(parse::<serde_json::Value>("{\"a\":1}").is_ok());
        assert!(parse::<serde_json::Value>("{\"a\":").is_err());
    }

    #[test]
    fn test_lists_and_separator() {
        let items = parse::<Vec<String>>("a, b,c").unwrap();
        assert_eq!(items, vec!["a", "b", "c"]);
        assert!(parse::<Vec<String>>("").unwrap().is_empty());

        let options = ValueOptions::default().with_separator(";");
        let durations = Vec::<Duration>::parse_scalar("1s; 2s", &options).unwrap();
        assert_eq!(durations.len(), 2);
        assert_eq!(durations.format_scalar(&options), "1s;2s");
    }

    #[test]
    fn test_string_map() {
        let map = parse::<HashMap<String, String>>("b=2,,a=1").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.format_scalar(&ValueOptions::default()), "a=1,b=2");

        let err = parse::<HashMap<String, String>>("a=1,broken").unwrap_err();
        assert!(err.to_string().contains("invalid map entry"));
        assert!(parse::<HashMap<String, String>>("=v").is_err());
    }

    #[test]
    fn test_byte_size_units() {
        let cases = [
            ("", 0),
            ("512", 512),
            ("10B", 10),
            ("1k", 1000),
            ("1KB", 1000),
            ("1Ki", 1024),
            ("1kib", 1024),
            ("2MB", 2_000_000),
            ("1MiB", 1_048_576),
            ("1.5GiB", 1_610_612_736),
            ("1T", 1_000_000_000_000),
            (" 3 KiB ", 3072),
        ];
        for (raw, bytes) in cases {
            assert_eq!(raw.parse::<ByteSize>().unwrap().bytes(), bytes, "{raw}");
        }
        assert!("10XB".parse::<ByteSize>().is_err());
        assert!("KB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_typed_value_binding_and_reset() {
        let mut value = TypedValue::new(8080_i64, ValueOptions::default());
        let binding = value.binding();

        value.set("9000").unwrap();
        assert_eq!(binding.get(), 9000);
        assert_eq!(value.render(), "9000");
        assert_eq!(value.measure(), Measure::Signed(9000));

        value.reset("8080").unwrap();
        assert_eq!(binding.get(), 8080);

        assert!(value.restore(Box::new(7_i64)));
        assert_eq!(binding.get(), 7);
        assert!(!value.restore(Box::new("wrong type")));
    }

    #[test]
    fn test_failed_set_keeps_value() {
        let mut value = TypedValue::new(1_u16, ValueOptions::default());
        assert!(value.set("nope").is_err());
        assert_eq!(value.render(), "1");
    }
}
