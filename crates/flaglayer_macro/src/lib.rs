//! # flaglayer_macro
//!
//! Procedural macro implementation for the `flaglayer` crate.
//!
//! This crate provides `#[derive(FlagStruct)]`, which turns a struct with
//! `#[flag(...)]` field attributes into flag registration and write-back
//! code. It is a proc-macro crate and can only export procedural macros.
//!
//! **Note:** Users should depend on the `flaglayer` crate, not this one
//! directly. `flaglayer` re-exports the macro next to the runtime trait.
//!
//! # Module Structure
//!
//! - `parse` - Attribute parsing for `#[flag(...)]`
//! - `field` - Per-field code generation strategies
//! - `expand` - Macro expansion orchestration and code generation

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod expand;
mod field;
mod parse;

/// Derives `flaglayer::FlagStruct` for a struct with named fields.
///
/// Every field carrying `#[flag(...)]` becomes one flag; fields without the
/// attribute are left alone.
///
/// # Field Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `name = "..."` | Flag name (default: field name, `_` replaced by `-`) |
/// | `default = "..."` | Default literal, parsed by the field's type |
/// | `help = "..."` | Usage text (default: the doc comment) |
/// | `required` | Some source must supply the flag |
/// | `sensitive` | Value is masked everywhere it is displayed |
/// | `deprecated = "..."` | Warns once when the flag receives a value |
/// | `choices = "a,b"` | Allowed values of a `String` field |
/// | `sep = ";"` | List separator for `Vec` fields |
/// | `layout = "%Y-%m-%d"` | Time layout for `DateTime` fields |
/// | `min = "..."` / `max = "..."` | Deferred bound checks |
/// | `pattern = "..."` | Deferred regex check |
/// | `nested` | Field is itself a `FlagStruct` |
/// | `prefix = "db"` | Prefix for a nested struct's flags, joined with `.` |
///
/// Without a `default`, the field's value at registration time is the
/// default.
///
/// # Example
///
/// ```ignore
/// use flaglayer::FlagStruct;
///
/// #[derive(FlagStruct, Default)]
/// struct Config {
///     /// Listen port.
///     #[flag(default = "8080", min = "1", max = "65535")]
///     port: u16,
///
///     #[flag(required, sensitive)]
///     api_key: String,
///
///     #[flag(nested, prefix = "db")]
///     database: Database,
/// }
/// ```
///
/// # Generated Code
///
/// - `impl flaglayer::FlagStruct` (`register_flags` and `load_flags`)
/// - `impl Debug` that prints `******` for sensitive fields
#[proc_macro_derive(FlagStruct, attributes(flag))]
pub fn derive_flag_struct(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    // On error, convert to a compile_error!() invocation
    expand::Expander::expand(&input).unwrap_or_else(|err| err.to_compile_error().into())
}
