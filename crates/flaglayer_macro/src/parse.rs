//! Attribute parsing for `#[flag(name = "...", default = "...", required, ...)]`.
//!
//! Parsing runs in two phases: [`Parser::parse_meta`] accumulates options one
//! at a time through syn's `ParseNestedMeta`, then [`Parser::build_config`]
//! checks how they combine. Unknown and duplicate options are rejected with
//! a span on the offending token.
//!
//! # Supported Syntax
//!
//! ```ignore
//! #[flag]                                        // Flag named after the field
//! #[flag(name = "listen-port", default = "80")]  // Explicit name and default
//! #[flag(required, sensitive)]                   // Must be set, masked
//! #[flag(choices = "debug,info,warn")]           // Enumerated string
//! #[flag(min = "1", max = "10")]                 // Deferred bound checks
//! #[flag(nested, prefix = "db")]                 // Nested FlagStruct
//! ```

use std::collections::HashSet;

use syn::meta::ParseNestedMeta;
use syn::{
    Attribute, Error as SynError, Expr, ExprLit, Field, Lit, LitStr, Meta, Result as SynResult,
};

/// Extracts the doc comment of a field, joining lines with a space.
pub fn extract_doc_comment(field: &Field) -> Option<String> {
    let mut result = String::new();

    for attr in &field.attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }

        if let Meta::NameValue(meta) = &attr.meta
            && let Expr::Lit(ExprLit {
                lit: Lit::Str(lit_str),
                ..
            }) = &meta.value
        {
            let line = lit_str.value();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !result.is_empty() {
                result.push(' ');
            }
            result.push_str(line);
        }
    }

    (!result.is_empty()).then_some(result)
}

/// Converts a field identifier to its default flag name.
///
/// `pool_size` becomes `pool-size`; a raw identifier loses its `r#`.
pub fn default_flag_name(ident: &str) -> String {
    ident.trim_start_matches("r#").replace('_', "-")
}

/// What a field's `#[flag(...)]` attribute asks for.
pub enum FieldConfig {
    /// A regular field bound to one flag.
    Flag(FlagAttr),

    /// A nested `FlagStruct` whose flags are registered recursively.
    Nested {
        /// Prefix joined to the nested flag names with `.`.
        prefix: Option<String>,
    },
}

/// Options of a regular flag field.
#[derive(Clone, Debug, Default)]
pub struct FlagAttr {
    pub name: Option<String>,
    pub default: Option<String>,
    pub help: Option<String>,
    pub required: bool,
    pub sensitive: bool,
    pub deprecated: Option<String>,
    pub choices: Option<Vec<String>>,
    pub separator: Option<String>,
    pub layout: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub pattern: Option<String>,
}

/// Accumulates options while the attribute is being parsed.
#[derive(Default)]
pub struct Parser {
    seen: HashSet<&'static str>,
    attr: FlagAttr,
    nested: bool,
    prefix: Option<String>,
}

/// Options that only make sense on a regular flag field.
const FLAG_ONLY: &[&str] = &[
    "name",
    "default",
    "help",
    "required",
    "sensitive",
    "deprecated",
    "choices",
    "sep",
    "layout",
    "min",
    "max",
    "pattern",
];

fn non_empty(meta: &ParseNestedMeta<'_>, key: &str) -> SynResult<String> {
    let lit: LitStr = meta.value()?.parse()?;
    let value = lit.value();
    if value.is_empty() {
        return Err(SynError::new_spanned(lit, format!("`{key}` must not be empty")));
    }
    Ok(value)
}

impl Parser {
    /// Parses a single option inside `#[flag(...)]`.
    fn parse_meta(&mut self, meta: &ParseNestedMeta<'_>) -> SynResult<()> {
        let ident = meta
            .path
            .get_ident()
            .ok_or_else(|| meta.error("Expected identifier"))?;
        let name = ident.to_string();

        let key: &'static str = match name.as_str() {
            "name" => "name",
            "default" => "default",
            "help" => "help",
            "required" => "required",
            "sensitive" => "sensitive",
            "deprecated" => "deprecated",
            "choices" => "choices",
            "sep" => "sep",
            "layout" => "layout",
            "min" => "min",
            "max" => "max",
            "pattern" => "pattern",
            "nested" => "nested",
            "prefix" => "prefix",
            _ => return Err(meta.error(format!("Unknown option `{name}`"))),
        };

        if !self.seen.insert(key) {
            return Err(meta.error(format!("Duplicate option: `{key}`")));
        }

        match key {
            "name" => {
                let value = non_empty(meta, key)?;
                if value.starts_with('-') || value.contains('=') {
                    return Err(meta.error("flag name cannot start with `-` or contain `=`"));
                }
                self.attr.name = Some(value);
            }
            "default" => {
                let lit: LitStr = meta.value()?.parse()?;
                self.attr.default = Some(lit.value());
            }
            "help" => {
                let lit: LitStr = meta.value()?.parse()?;
                self.attr.help = Some(lit.value());
            }
            "required" => self.attr.required = true,
            "sensitive" => self.attr.sensitive = true,
            "deprecated" => {
                let lit: LitStr = meta.value()?.parse()?;
                self.attr.deprecated = Some(lit.value());
            }
            "choices" => {
                let lit: LitStr = meta.value()?.parse()?;
                let choices: Vec<String> = lit
                    .value()
                    .split(',')
                    .map(str::trim)
                    .filter(|choice| !choice.is_empty())
                    .map(String::from)
                    .collect();
                if choices.is_empty() {
                    return Err(SynError::new_spanned(lit, "`choices` lists no values"));
                }
                self.attr.choices = Some(choices);
            }
            "sep" => self.attr.separator = Some(non_empty(meta, key)?),
            "layout" => self.attr.layout = Some(non_empty(meta, key)?),
            "min" => self.attr.min = Some(non_empty(meta, key)?),
            "max" => self.attr.max = Some(non_empty(meta, key)?),
            "pattern" => self.attr.pattern = Some(non_empty(meta, key)?),
            "nested" => self.nested = true,
            "prefix" => self.prefix = Some(non_empty(meta, key)?),
            _ => unreachable!(),
        }

        Ok(())
    }

    /// Checks option combinations and builds the field's configuration.
    fn build_config(self, attr: &Attribute) -> SynResult<FieldConfig> {
        if self.nested {
            let mut invalid: Vec<&str> = FLAG_ONLY
                .iter()
                .copied()
                .filter(|key| self.seen.contains(key))
                .collect();
            invalid.sort_unstable();
            if !invalid.is_empty() {
                return Err(SynError::new_spanned(
                    attr,
                    format!(
                        "`nested` cannot be combined with: {}",
                        invalid
                            .iter()
                            .map(|key| format!("`{key}`"))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                ));
            }
            return Ok(FieldConfig::Nested {
                prefix: self.prefix,
            });
        }

        if self.prefix.is_some() {
            return Err(SynError::new_spanned(attr, "`prefix` requires `nested`"));
        }

        Ok(FieldConfig::Flag(self.attr))
    }

    /// Parses the field's `#[flag]` attribute; `None` if it has none.
    pub fn parse_field_config(field: &Field) -> SynResult<Option<FieldConfig>> {
        let mut found = None;

        for attr in &field.attrs {
            if !attr.path().is_ident("flag") {
                continue;
            }
            if found.is_some() {
                return Err(SynError::new_spanned(
                    attr,
                    "only one #[flag] attribute is allowed per field",
                ));
            }

            let mut builder = Self::default();
            if !matches!(attr.meta, Meta::Path(_)) {
                attr.parse_nested_meta(|meta| builder.parse_meta(&meta))?;
            }
            found = Some(builder.build_config(attr)?);
        }

        Ok(found)
    }
}
