//! # flaglayer
//!
//! Layered flag resolution: one declaration, five sources.
//!
//! Every flag declared on a [`FlagSet`] can be supplied by, in order of
//! precedence:
//!
//! 1. the command line (`-port 9000`, `--port=9000`);
//! 2. an environment variable (`PORT`, or `APP_PORT` with a prefix);
//! 3. a file in the secret directory (`<secret-dir>/port`);
//! 4. a line in the config file (`port 9000`);
//! 5. the declared default.
//!
//! The secret directory and the config file are named by two controlling
//! flags (`-secret-dir` and `-config`), which are themselves resolved like
//! every other flag. Any value of the form `@path` is replaced by the
//! contents of that file; `@@` escapes a literal `@`.
//!
//! ## Quick Start
//!
//! ```rust
//! use flaglayer::FlagSet;
//!
//! let mut flags = FlagSet::new("server");
//! let port = flags.int("port", 8080, "listen port").unwrap();
//! let host = flags.string("host", "localhost".into(), "listen address").unwrap();
//!
//! flags
//!     .parse_with_env(["-port", "9000"], [("HOST", "0.0.0.0")])
//!     .unwrap();
//!
//! assert_eq!(port.get(), 9000);
//! assert_eq!(host.get(), "0.0.0.0");
//! assert_eq!(flags.source_of("host").unwrap().label(), "env");
//! ```
//!
//! ## Struct Registration
//!
//! `#[derive(FlagStruct)]` declares one flag per annotated field and writes
//! the resolved values back:
//!
//! ```rust
//! use flaglayer::{FlagSet, FlagStruct, StructOptions};
//!
//! #[derive(FlagStruct, Default)]
//! struct Database {
//!     #[flag(default = "postgres://localhost/app")]
//!     url: String,
//!     #[flag(default = "10", min = "1")]
//!     pool_size: u32,
//! }
//!
//! #[derive(FlagStruct, Default)]
//! struct Config {
//!     /// Address to bind.
//!     #[flag(default = "127.0.0.1:8080")]
//!     listen: String,
//!     #[flag(nested, prefix = "db")]
//!     database: Database,
//!     #[flag(required, sensitive)]
//!     api_key: String,
//! }
//!
//! let mut config = Config::default();
//! FlagSet::new("app")
//!     .register_struct(
//!         &mut config,
//!         StructOptions::auto()
//!             .with_args(["-db.pool-size", "4", "-api-key", "k-123"])
//!             .with_env(Vec::<(String, String)>::new()),
//!     )
//!     .unwrap();
//!
//! assert_eq!(config.database.pool_size, 4);
//! assert_eq!(config.api_key, "k-123");
//! ```
//!
//! ## Field Attributes
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `name = "..."` | Flag name (default: field name with `_` replaced by `-`) |
//! | `default = "..."` | Default literal, parsed by the field's type |
//! | `help = "..."` | Usage text (default: the field's doc comment) |
//! | `required` | Must be supplied by some source |
//! | `sensitive` | Masked in usage, errors, introspection and `Debug` |
//! | `deprecated = "..."` | Warns once when the flag receives a value |
//! | `choices = "a,b"` | Restricts a `String` field to the listed values |
//! | `sep = ";"` | List separator for `Vec` fields (default `,`) |
//! | `layout = "%Y-%m-%d"` | Time layout for `DateTime` fields |
//! | `min`, `max`, `pattern` | Checks queued for [`FlagSet::validate`] |
//! | `nested`, `prefix = "..."` | Registers a nested struct, prefixing its flags |
//!
//! ## Errors
//!
//! Every operation returns [`Error`], a [`miette::Diagnostic`] whose output
//! never contains the value of a sensitive flag. What [`FlagSet::parse`]
//! does with an error depends on its [`ErrorHandling`] policy.
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|---------|
//! | `watch` | Re-resolve the secret directory and config file on change | **Yes** |
//! | `serde` | `Serialize` for [`Source`], [`FlagMeta`] and [`FlagReport`] | No |
//! | `full` | Enable all features | No |

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Placeholder shown instead of the value of a sensitive flag.
pub const MASK: &str = "******";

// Re-export the derive macro. It shares its name with the trait, as serde does.
pub use flaglayer_macro::FlagStruct;

/// Re-export miette so users can render [`Error`] without adding it.
pub use miette;

mod error;
pub use error::{BoxError, Error, MultiError};

mod indirect;
pub use indirect::{IndirectionError, expand_at_file};

mod value;
pub use value::{Binding, ByteSize, Measure, Scalar, ScalarError, TypedValue, Value, ValueOptions};

mod flag;
pub use flag::{
    DEFAULT_CONFIG_FLAG, DEFAULT_SECRET_DIR_FLAG, ErrorHandling, Flag, FlagSet, UsageFn,
};

mod source;
pub use source::{FlagMeta, FlagReport, Source};

pub mod pass;

mod resolve;

mod validation;
pub use validation::{CheckFn, Constraint, DeferredCheck};

mod handler;
pub use handler::{FieldContext, FieldHandler, register_field_handler, register_scalar};

mod structs;
pub use structs::{FieldDescriptor, FlagStruct, Reader, Registrar, StructOptions};

mod global;
pub use global::{command_line, parse, parse_struct, parsed, reset_command_line, set, with_args};

#[cfg(feature = "watch")]
pub mod watch;
