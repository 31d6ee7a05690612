//! Debug implementation code generation.
//!
//! The generated `Debug` prints every field of the struct, with `"******"`
//! in place of fields marked `sensitive`:
//!
//! ```rust,ignore
//! #[derive(FlagStruct)]
//! struct Config {
//!     #[flag(default = "8080")]
//!     port: u16,
//!
//!     #[flag(sensitive)]
//!     api_key: String,
//! }
//!
//! // Config { port: 8080, api_key: "******" }
//! ```
//!
//! Fields without `#[flag]` and nested structs use their own `Debug`.

use std::collections::HashSet;

use proc_macro2::TokenStream as QuoteStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{Field, Generics, Ident};

use crate::field::FieldGenerator;

/// Generate a custom `Debug` implementation with masking.
pub fn generate_debug_impl(
    struct_name: &Ident,
    generics: &Generics,
    fields: &Punctuated<Field, Comma>,
    generators: &[Box<dyn FieldGenerator>],
) -> QuoteStream {
    let (impl_generics, type_generics, where_clause) = generics.split_for_impl();
    let struct_name_str = struct_name.to_string();

    let sensitive: HashSet<&Ident> = generators
        .iter()
        .filter(|g| g.is_sensitive())
        .map(|g| g.name())
        .collect();

    let field_entries: Vec<QuoteStream> = fields
        .iter()
        .filter_map(|field| field.ident.as_ref())
        .map(|name| {
            let label = name.to_string();
            let label = label.trim_start_matches("r#");

            if sensitive.contains(name) {
                quote! { .field(#label, &"******") }
            } else {
                quote! { .field(#label, &self.#name) }
            }
        })
        .collect();

    quote! {
        impl #impl_generics ::core::fmt::Debug for #struct_name #type_generics #where_clause {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.debug_struct(#struct_name_str)
                    #(#field_entries)*
                    .finish()
            }
        }
    }
}
