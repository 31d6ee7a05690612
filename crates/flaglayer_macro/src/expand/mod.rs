//! Code generation orchestration for the `FlagStruct` derive macro.
//!
//! The [`Expander`] validates that the input is a struct with named fields,
//! turns every `#[flag]` field into a [`FieldGenerator`] and emits:
//!
//! | Output | Generator Function |
//! |--------|-------------------|
//! | `impl FlagStruct` | [`register::generate_flag_struct_impl`] |
//! | `impl Debug` | [`debug::generate_debug_impl`] |

use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{Data, DeriveInput, Error as SynError, Field, Fields, Result as SynResult};

use crate::field::{FieldFactory, FieldGenerator};

pub mod debug;
pub mod register;

/// The main orchestrator for macro expansion.
pub struct Expander;

impl Expander {
    /// Main entry point for expanding the derive macro.
    pub fn expand(input: &DeriveInput) -> SynResult<TokenStream> {
        let struct_name = &input.ident;
        let generics = &input.generics;

        let fields = Self::extract_struct_fields(input)?;

        let mut generators: Vec<Box<dyn FieldGenerator>> = Vec::new();
        for field in fields {
            if let Some(generator) = FieldFactory::parse_field(field)? {
                generators.push(generator);
            }
        }

        let flag_struct_impl =
            register::generate_flag_struct_impl(struct_name, generics, &generators);
        let debug_impl = debug::generate_debug_impl(struct_name, generics, fields, &generators);

        Ok(quote! {
            #flag_struct_impl
            #debug_impl
        }
        .into())
    }

    /// Extract named fields from the struct, rejecting invalid types.
    fn extract_struct_fields(input: &DeriveInput) -> SynResult<&Punctuated<Field, Comma>> {
        match &input.data {
            Data::Struct(data_struct) => match &data_struct.fields {
                Fields::Named(fields_named) => Ok(&fields_named.named),

                Fields::Unnamed(_) => Err(SynError::new_spanned(
                    input,
                    "FlagStruct does not support tuple structs",
                )),

                Fields::Unit => Err(SynError::new_spanned(
                    input,
                    "FlagStruct does not support unit structs",
                )),
            },

            Data::Enum(_) => Err(SynError::new_spanned(
                input,
                "FlagStruct can only be derived for structs, not enums",
            )),

            Data::Union(_) => Err(SynError::new_spanned(
                input,
                "FlagStruct can only be derived for structs, not unions",
            )),
        }
    }
}
