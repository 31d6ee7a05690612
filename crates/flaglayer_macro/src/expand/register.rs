//! `FlagStruct` implementation code generation.
//!
//! Fields are registered in declaration order and registration stops at the
//! first failing field, so later fields are never declared.

use proc_macro2::TokenStream as QuoteStream;
use quote::quote;
use syn::{Generics, Ident};

use crate::field::FieldGenerator;

/// Generate `impl ::flaglayer::FlagStruct for Struct`.
pub fn generate_flag_struct_impl(
    struct_name: &Ident,
    generics: &Generics,
    fields: &[Box<dyn FieldGenerator>],
) -> QuoteStream {
    let (impl_generics, type_generics, where_clause) = generics.split_for_impl();

    let registers = fields.iter().map(|f| f.generate_register());
    let loads = fields.iter().map(|f| f.generate_load());

    quote! {
        impl #impl_generics ::flaglayer::FlagStruct for #struct_name #type_generics #where_clause {
            fn register_flags(
                &self,
                __registrar: &mut ::flaglayer::Registrar<'_>,
            ) -> ::core::result::Result<(), ::flaglayer::Error> {
                #(#registers)*
                ::core::result::Result::Ok(())
            }

            fn load_flags(
                &mut self,
                __reader: &::flaglayer::Reader<'_>,
            ) -> ::core::result::Result<(), ::flaglayer::Error> {
                #(#loads)*
                ::core::result::Result::Ok(())
            }
        }
    }
}
