//! `#[flag(nested)]` fields.
//!
//! The field's type must implement `FlagStruct`. Its flags are registered
//! with the prefix joined to any outer prefix:
//!
//! ```rust,ignore
//! #[flag(nested, prefix = "db")]
//! database: Database,   // Database.url becomes flag `db.url`
//! ```

use proc_macro2::TokenStream as QuoteStream;
use quote::quote;
use syn::Ident;

use super::FieldGenerator;

/// A nested `FlagStruct` field.
pub struct NestedField {
    pub name: Ident,
    pub prefix: Option<String>,
}

impl NestedField {
    fn prefix(&self) -> QuoteStream {
        match &self.prefix {
            Some(prefix) => quote! { ::core::option::Option::Some(#prefix) },
            None => quote! { ::core::option::Option::None },
        }
    }
}

impl FieldGenerator for NestedField {
    fn generate_register(&self) -> QuoteStream {
        let name = &self.name;
        let prefix = self.prefix();

        quote! {
            __registrar.nested(#prefix, &self.#name)?;
        }
    }

    fn generate_load(&self) -> QuoteStream {
        let name = &self.name;
        let prefix = self.prefix();

        quote! {
            __reader.nested(#prefix, &mut self.#name)?;
        }
    }

    fn name(&self) -> &Ident {
        &self.name
    }
}
