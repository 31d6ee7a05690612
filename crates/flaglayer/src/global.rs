//! The process-wide flag set.
//!
//! Most programs need a single flag set parsed from the process arguments.
//! [`command_line`] hands out that set; it is created on first use with
//! [`ErrorHandling::ExitOnError`] and named after the program. Everything
//! else in the crate works on an explicit [`FlagSet`], so libraries should
//! take one as a parameter instead of reaching for the global.
//!
//! ```rust,no_run
//! let port = flaglayer::command_line().int("port", 8080, "listen port").unwrap();
//! flaglayer::parse().unwrap();
//! println!("listening on {}", port.get());
//! ```

use std::sync::LazyLock;

use parking_lot::{Mutex, MutexGuard};

use crate::error::Error;
use crate::flag::{ErrorHandling, FlagSet};
use crate::structs::{FlagStruct, StructOptions};

static COMMAND_LINE: LazyLock<Mutex<FlagSet>> =
    LazyLock::new(|| Mutex::new(fresh(ErrorHandling::ExitOnError)));

fn program_name() -> String {
    std::env::args_os()
        .next()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn fresh(policy: ErrorHandling) -> FlagSet {
    FlagSet::new(program_name()).with_error_handling(policy)
}

fn process_args() -> Vec<String> {
    std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

/// Locks the process-wide flag set.
///
/// The guard must be dropped before calling [`parse`], [`parse_struct`],
/// [`set`] or [`with_args`], which lock it themselves.
pub fn command_line() -> MutexGuard<'static, FlagSet> {
    COMMAND_LINE.lock()
}

/// Resolves the process-wide flag set from the process arguments and environment.
///
/// # Errors
///
/// Only returns an error after the policy was changed from
/// [`ErrorHandling::ExitOnError`]; see [`FlagSet::parse`].
pub fn parse() -> Result<(), Error> {
    command_line().parse(process_args())
}

/// Returns `true` once the process-wide flag set has been resolved.
#[must_use]
pub fn parsed() -> bool {
    command_line().parsed()
}

/// Registers a struct with the process-wide flag set and resolves it.
///
/// # Errors
///
/// See [`FlagSet::register_struct`].
pub fn parse_struct<T: FlagStruct>(target: &mut T) -> Result<(), Error> {
    command_line().register_struct(target, StructOptions::auto())
}

/// Sets a flag of the process-wide flag set.
///
/// # Errors
///
/// See [`FlagSet::set`].
pub fn set(name: &str, raw: &str) -> Result<(), Error> {
    command_line().set(name, raw)
}

/// Replaces the process-wide flag set with an empty one.
///
/// Bindings handed out by the old set keep their last values but are no
/// longer updated.
pub fn reset_command_line() {
    *command_line() = fresh(ErrorHandling::ExitOnError);
    tracing::debug!("process-wide flag set reset");
}

/// Replaces the process-wide flag set with an empty one that returns errors,
/// lets `declare` define flags on it, then resolves it from `args`.
///
/// `args` excludes the program name.
///
/// # Errors
///
/// The error from `declare`, or the resolution error.
pub fn with_args<I, S>(
    args: I,
    declare: impl FnOnce(&mut FlagSet) -> Result<(), Error>,
) -> Result<(), Error>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut flags = command_line();
    *flags = fresh(ErrorHandling::ContinueOnError);
    declare(&mut flags)?;
    flags.parse(args)
}
