//! Per-field code generation.
//!
//! Each `#[flag]` field becomes a [`FieldGenerator`] trait object that emits
//! its part of `register_flags` and `load_flags`:
//!
//! | Attribute | Generator | Registration | Write-back |
//! |-----------|-----------|--------------|------------|
//! | `#[flag(...)]` | [`FlagField`] | `Registrar::field` | `Reader::read` |
//! | `#[flag(nested)]` | [`NestedField`] | `Registrar::nested` | `Reader::nested` |

mod flag;
mod nested;

use proc_macro2::TokenStream as QuoteStream;
use syn::{Error as SynError, Field, Ident, Result as SynResult};

pub use flag::FlagField;
pub use nested::NestedField;

use crate::parse::{FieldConfig, Parser, default_flag_name, extract_doc_comment};

/// Code generation for one struct field.
pub trait FieldGenerator {
    /// Statement registering the field through `__registrar`.
    fn generate_register(&self) -> QuoteStream;

    /// Statement writing the resolved value back through `__reader`.
    fn generate_load(&self) -> QuoteStream;

    /// The field identifier.
    fn name(&self) -> &Ident;

    /// Whether `Debug` must mask the field.
    fn is_sensitive(&self) -> bool {
        false
    }
}

/// Builds generators from parsed fields.
pub struct FieldFactory;

impl FieldFactory {
    /// Returns the generator for `field`, or `None` for fields without `#[flag]`.
    pub fn parse_field(field: &Field) -> SynResult<Option<Box<dyn FieldGenerator>>> {
        let Some(name) = field.ident.clone() else {
            return Err(SynError::new_spanned(field, "FlagStruct fields must be named"));
        };

        let Some(config) = Parser::parse_field_config(field)? else {
            return Ok(None);
        };

        let generator: Box<dyn FieldGenerator> = match config {
            FieldConfig::Nested { prefix } => Box::new(NestedField { name, prefix }),
            FieldConfig::Flag(attr) => {
                let flag_name = attr
                    .name
                    .clone()
                    .unwrap_or_else(|| default_flag_name(&name.to_string()));
                let help = attr
                    .help
                    .clone()
                    .or_else(|| extract_doc_comment(field))
                    .unwrap_or_default();
                Box::new(FlagField {
                    name,
                    ty: field.ty.clone(),
                    flag_name,
                    help,
                    attr,
                })
            }
        };

        Ok(Some(generator))
    }
}
