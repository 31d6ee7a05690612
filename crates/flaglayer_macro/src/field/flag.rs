//! Regular `#[flag(...)]` fields.
//!
//! Registration builds a `FieldDescriptor` from the attribute and passes the
//! field's current value, which serves as the default when no `default` is
//! given:
//!
//! ```rust,ignore
//! __registrar.field(
//!     ::flaglayer::FieldDescriptor::new("port", "port")
//!         .help("Listen port.")
//!         .default_value("8080"),
//!     &self.port,
//! )?;
//! ```
//!
//! Write-back reads the flag as the field's type:
//!
//! ```rust,ignore
//! self.port = __reader.read::<u16>("port")?;
//! ```

use proc_macro2::TokenStream as QuoteStream;
use quote::quote;
use syn::{Ident, Type};

use super::FieldGenerator;
use crate::parse::FlagAttr;

/// A field bound to one flag.
pub struct FlagField {
    pub name: Ident,
    pub ty: Type,
    pub flag_name: String,
    pub help: String,
    pub attr: FlagAttr,
}

fn optional_call(method: &str, value: Option<&String>) -> QuoteStream {
    value.map_or_else(QuoteStream::new, |value| {
        let method = Ident::new(method, proc_macro2::Span::call_site());
        quote! { .#method(#value) }
    })
}

impl FlagField {
    fn descriptor(&self) -> QuoteStream {
        let field = self.name.to_string();
        let field = field.trim_start_matches("r#");
        let flag_name = &self.flag_name;
        let help = &self.help;
        let attr = &self.attr;

        let default = optional_call("default_value", attr.default.as_ref());
        let deprecated = optional_call("deprecated", attr.deprecated.as_ref());
        let separator = optional_call("separator", attr.separator.as_ref());
        let layout = optional_call("layout", attr.layout.as_ref());
        let min = optional_call("min", attr.min.as_ref());
        let max = optional_call("max", attr.max.as_ref());
        let pattern = optional_call("pattern", attr.pattern.as_ref());

        let required = attr.required.then(|| quote! { .required() });
        let sensitive = attr.sensitive.then(|| quote! { .sensitive() });
        let choices = attr.choices.as_ref().map(|choices| {
            quote! { .choices([#(#choices),*]) }
        });

        quote! {
            ::flaglayer::FieldDescriptor::new(#field, #flag_name)
                .help(#help)
                #default
                #required
                #sensitive
                #deprecated
                #choices
                #separator
                #layout
                #min
                #max
                #pattern
        }
    }
}

impl FieldGenerator for FlagField {
    fn generate_register(&self) -> QuoteStream {
        let name = &self.name;
        let descriptor = self.descriptor();

        quote! {
            __registrar.field(#descriptor, &self.#name)?;
        }
    }

    fn generate_load(&self) -> QuoteStream {
        let name = &self.name;
        let ty = &self.ty;
        let flag_name = &self.flag_name;

        quote! {
            self.#name = __reader.read::<#ty>(#flag_name)?;
        }
    }

    fn name(&self) -> &Ident {
        &self.name
    }

    fn is_sensitive(&self) -> bool {
        self.attr.sensitive
    }
}
