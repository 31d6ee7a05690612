//! Deferred validation queue.
//!
//! Constraints are queued while flags are declared and evaluated once, after
//! every source has been applied, against each flag's final value. Every
//! check runs; failures are aggregated into one [`Error::Multiple`].
//!
//! | Constraint | Numbers | Durations | Byte sizes | Strings | Lists / maps |
//! |------------|---------|-----------|------------|---------|--------------|
//! | `min` / `max` | value | value | value | length | length |
//! | `pattern` | - | - | - | regex match | - |

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::MASK;
use crate::error::Error;
use crate::flag::{Flag, FlagSet};
use crate::value::{ByteSize, Measure, parse_signed, parse_unsigned};

/// Cross-field check; returns a message on failure.
pub type CheckFn = Arc<dyn Fn(&FlagSet) -> Result<(), String> + Send + Sync>;

/// A check evaluated against a flag after resolution.
#[derive(Clone)]
pub enum Constraint {
    /// Lower bound, inclusive. Parsed with the flag's kind.
    Min(String),
    /// Upper bound, inclusive. Parsed with the flag's kind.
    Max(String),
    /// Regular expression the string value must match somewhere.
    Pattern(String),
    /// Arbitrary check over the whole flag set.
    Custom(CheckFn),
}

impl Debug for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min(bound) => f.debug_tuple("Min").field(bound).finish(),
            Self::Max(bound) => f.debug_tuple("Max").field(bound).finish(),
            Self::Pattern(pattern) => f.debug_tuple("Pattern").field(pattern).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A queued constraint and the flag it is attached to.
#[derive(Clone, Debug)]
pub struct DeferredCheck {
    flag: String,
    constraint: Constraint,
}

impl DeferredCheck {
    /// Attaches `constraint` to `flag`.
    pub fn new(flag: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            flag: flag.into(),
            constraint,
        }
    }

    /// The flag the check is attached to.
    #[must_use]
    pub fn flag(&self) -> &str {
        &self.flag
    }

    /// The queued constraint.
    #[must_use]
    pub const fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    fn evaluate(&self, flags: &FlagSet) -> Result<(), Error> {
        if let Constraint::Custom(check) = &self.constraint {
            return check(flags).map_err(|message| Error::validation(&self.flag, message));
        }

        let flag = flags.lookup(&self.flag).ok_or_else(|| Error::NoSuchFlag {
            name: self.flag.clone(),
        })?;

        let outcome = match &self.constraint {
            Constraint::Min(bound) => check_bound(flag, bound, Bound::Min),
            Constraint::Max(bound) => check_bound(flag, bound, Bound::Max),
            Constraint::Pattern(pattern) => check_pattern(flag, pattern),
            Constraint::Custom(_) => Ok(()),
        };
        outcome.map_err(|message| Error::validation(&self.flag, message))
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Min,
    Max,
}

impl Bound {
    const fn label(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    const fn operator(self) -> &'static str {
        match self {
            Self::Min => "<",
            Self::Max => ">",
        }
    }

    fn violated<T: PartialOrd>(self, value: &T, bound: &T) -> bool {
        match self {
            Self::Min => value < bound,
            Self::Max => value > bound,
        }
    }
}

fn shown(flag: &Flag) -> String {
    if flag.is_sensitive() {
        MASK.to_string()
    } else {
        flag.value().render()
    }
}

fn invalid_bound(kind: Bound, bound: &str) -> String {
    format!("invalid {} bound {bound:?}", kind.label())
}

fn check_bound(flag: &Flag, bound: &str, kind: Bound) -> Result<(), String> {
    let value_failure = || {
        format!(
            "value {} {} {} {bound}",
            shown(flag),
            kind.operator(),
            kind.label()
        )
    };
    let length_failure = |len: usize| format!("length {len} {} {} {bound}", kind.operator(), kind.label());

    match flag.value().measure() {
        Measure::Signed(value) => {
            let limit = parse_signed(bound.trim()).map_err(|_| invalid_bound(kind, bound))?;
            if kind.violated(&value, &limit) {
                return Err(value_failure());
            }
        }
        Measure::Unsigned(value) => {
            let limit = parse_unsigned(bound.trim()).map_err(|_| invalid_bound(kind, bound))?;
            if kind.violated(&value, &limit) {
                return Err(value_failure());
            }
        }
        Measure::Number(value) => {
            let limit: f64 = bound.trim().parse().map_err(|_| invalid_bound(kind, bound))?;
            if kind.violated(&value, &limit) {
                return Err(value_failure());
            }
        }
        Measure::Elapsed(value) => {
            let limit: Duration =
                humantime::parse_duration(bound.trim()).map_err(|_| invalid_bound(kind, bound))?;
            if kind.violated(&value, &limit) {
                return Err(value_failure());
            }
        }
        Measure::Bytes(value) => {
            let limit: ByteSize = bound.parse().map_err(|_| invalid_bound(kind, bound))?;
            if kind.violated(&value, &limit.bytes()) {
                return Err(value_failure());
            }
        }
        Measure::Text(text) => {
            let limit: usize = bound.trim().parse().map_err(|_| invalid_bound(kind, bound))?;
            let len = text.chars().count();
            if kind.violated(&len, &limit) {
                return Err(length_failure(len));
            }
        }
        Measure::Length(len) => {
            let limit: usize = bound.trim().parse().map_err(|_| invalid_bound(kind, bound))?;
            if kind.violated(&len, &limit) {
                return Err(length_failure(len));
            }
        }
        Measure::Opaque => {
            return Err(format!(
                "{} not supported for type {}",
                kind.label(),
                flag.value().type_name()
            ));
        }
    }
    Ok(())
}

fn check_pattern(flag: &Flag, pattern: &str) -> Result<(), String> {
    let regex = Regex::new(pattern).map_err(|err| format!("invalid pattern {pattern:?}: {err}"))?;

    let Measure::Text(text) = flag.value().measure() else {
        return Err(format!(
            "pattern not supported for type {}",
            flag.value().type_name()
        ));
    };

    if regex.is_match(&text) {
        return Ok(());
    }

    let value = if flag.is_sensitive() { MASK } else { text.as_str() };
    Err(format!("value {value:?} does not match pattern {pattern}"))
}

impl FlagSet {
    /// Queues a constraint on a flag.
    pub fn add_constraint(&mut self, flag: impl Into<String>, constraint: Constraint) {
        self.checks.push(DeferredCheck::new(flag, constraint));
    }

    /// Queues a cross-field check attributed to `flag`.
    ///
    /// ```rust
    /// use flaglayer::FlagSet;
    ///
    /// let mut flags = FlagSet::new("app");
    /// let min = flags.int("min-conns", 10, "").unwrap();
    /// let max = flags.int("max-conns", 5, "").unwrap();
    /// flags.defer("max-conns", move |_| {
    ///     if max.get() < min.get() {
    ///         return Err("must not be below min-conns".to_string());
    ///     }
    ///     Ok(())
    /// });
    ///
    /// let err = flags.validate().unwrap_err();
    /// assert_eq!(err.to_string(), "max-conns: must not be below min-conns");
    /// ```
    pub fn defer(
        &mut self,
        flag: impl Into<String>,
        check: impl Fn(&Self) -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.add_constraint(flag, Constraint::Custom(Arc::new(check)));
    }

    /// Number of queued checks.
    #[must_use]
    pub fn pending_checks(&self) -> usize {
        self.checks.len()
    }

    /// Runs and drains every queued check.
    ///
    /// # Errors
    ///
    /// One [`Error::Validation`], or [`Error::Multiple`] holding every failure
    /// in queue order.
    pub fn validate(&mut self) -> Result<(), Error> {
        let checks = std::mem::take(&mut self.checks);
        tracing::debug!(checks = checks.len(), "running deferred validation");

        let failures: Vec<Error> = checks
            .iter()
            .filter_map(|check| check.evaluate(self).err())
            .collect();

        match Error::multiple(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_bounds() {
        let mut flags = FlagSet::new("test");
        flags.int("port", 0, "").unwrap();
        flags.add_constraint("port", Constraint::Min("1".into()));
        flags.add_constraint("port", Constraint::Max("20".into()));

        let err = flags.validate().unwrap_err();
        assert_eq!(err.to_string(), "port: value 0 < min 1");

        flags.set("port", "25").unwrap();
        flags.add_constraint("port", Constraint::Max("20".into()));
        let err = flags.validate().unwrap_err();
        assert_eq!(err.to_string(), "port: value 25 > max 20");
    }

    #[test]
    fn test_integer_bounds_are_exact() {
        let mut flags = FlagSet::new("test");
        flags.u64("count", 9_007_199_254_740_993, "").unwrap();
        flags.i64("offset", -9_007_199_254_740_993, "").unwrap();
        flags.add_constraint("count", Constraint::Max("9007199254740992".into()));
        flags.add_constraint("offset", Constraint::Min("-9007199254740992".into()));
        flags.add_constraint("count", Constraint::Max("9007199254740993".into()));

        let err = flags.validate().unwrap_err();
        let messages: Vec<String> = err.errors().iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            [
                "count: value 9007199254740993 > max 9007199254740992",
                "offset: value -9007199254740993 < min -9007199254740992",
            ]
        );
    }

    #[test]
    fn test_fractional_bound_on_integer() {
        let mut flags = FlagSet::new("test");
        flags.int("port", 5, "").unwrap();
        flags.add_constraint("port", Constraint::Min("1.5".into()));

        let err = flags.validate().unwrap_err();
        assert_eq!(err.to_string(), "port: invalid min bound \"1.5\"");
    }

    #[test]
    fn test_checks_run_once() {
        let mut flags = FlagSet::new("test");
        flags.int("port", 0, "").unwrap();
        flags.add_constraint("port", Constraint::Min("1".into()));

        assert!(flags.validate().is_err());
        assert_eq!(flags.pending_checks(), 0);
        assert!(flags.validate().is_ok());
    }

    #[test]
    fn test_length_bounds() {
        let mut flags = FlagSet::new("test");
        flags.string("name", "ab".into(), "").unwrap();
        flags
            .string_slice("tags", ",", vec!["a".into(), "b".into(), "c".into()], "")
            .unwrap();
        flags.add_constraint("name", Constraint::Min("3".into()));
        flags.add_constraint("tags", Constraint::Max("2".into()));

        let err = flags.validate().unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert_eq!(
            err.to_string(),
            "name: length 2 < min 3; tags: length 3 > max 2"
        );
    }

    #[test]
    fn test_duration_and_size_bounds() {
        let mut flags = FlagSet::new("test");
        flags
            .duration("timeout", Duration::from_millis(500), "")
            .unwrap();
        flags.byte_size("cache", ByteSize(2048), "").unwrap();
        flags.add_constraint("timeout", Constraint::Min("1s".into()));
        flags.add_constraint("cache", Constraint::Max("1KiB".into()));

        let err = flags.validate().unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert!(err.to_string().contains("timeout: value 500ms < min 1s"));
        assert!(err.to_string().contains("cache: value 2048 > max 1KiB"));
    }

    #[test]
    fn test_pattern() {
        let mut flags = FlagSet::new("test");
        flags.string("name", "Alpha!".into(), "").unwrap();
        flags.add_constraint("name", Constraint::Pattern("^[a-z0-9]+$".into()));

        let err = flags.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "name: value \"Alpha!\" does not match pattern ^[a-z0-9]+$"
        );
    }

    #[test]
    fn test_sensitive_values_masked() {
        let mut flags = FlagSet::new("test");
        flags.string("token", "abc".into(), "").unwrap();
        flags.int("pin", 3, "").unwrap();
        flags.mark_sensitive("token").unwrap();
        flags.mark_sensitive("pin").unwrap();
        flags.add_constraint("token", Constraint::Pattern("^x".into()));
        flags.add_constraint("pin", Constraint::Min("4".into()));

        let message = flags.validate().unwrap_err().to_string();
        assert!(!message.contains("abc"));
        assert!(message.contains("value \"******\" does not match"));
        assert!(message.contains("value ****** < min 4"));
    }

    #[test]
    fn test_bad_bounds_are_failures() {
        let mut flags = FlagSet::new("test");
        flags.int("port", 1, "").unwrap();
        flags.string("name", String::new(), "").unwrap();
        flags.bool("debug", false, "").unwrap();
        flags.add_constraint("port", Constraint::Min("one".into()));
        flags.add_constraint("name", Constraint::Pattern("(".into()));
        flags.add_constraint("debug", Constraint::Max("1".into()));

        let err = flags.validate().unwrap_err();
        let messages: Vec<String> = err.errors().iter().map(ToString::to_string).collect();
        assert_eq!(messages[0], "port: invalid min bound \"one\"");
        assert!(messages[1].starts_with("name: invalid pattern \"(\""));
        assert_eq!(messages[2], "debug: max not supported for type bool");
    }

    #[test]
    fn test_custom_check_sees_final_values() {
        let mut flags = FlagSet::new("test");
        let low = flags.int("low", 1, "").unwrap();
        let high = flags.int("high", 10, "").unwrap();
        flags.defer("high", move |_| {
            if high.get() < low.get() {
                Err("below low".to_string())
            } else {
                Ok(())
            }
        });

        flags.set("low", "50").unwrap();
        let err = flags.validate().unwrap_err();
        assert_eq!(err.to_string(), "high: below low");
    }
}
