#![allow(unreachable_pub)]

//! # Derive macros for gestalt
//!
//! This crate provides `#[derive(DecodeConfig)]`, which generates the
//! field-by-field decoding `gestalt` needs to build typed objects out of
//! its config node tree.
//!
//! ## Structs
//!
//! Each named field decodes from `path + "." + field_name`, recursing
//! through the decoder registry so registered overrides apply at any
//! depth. Field behavior is tuned with `#[config(...)]`:
//!
//! ```rust,ignore
//! use gestalt::prelude::*;
//!
//! #[derive(DecodeConfig, Clone, Debug)]
//! struct PoolConfig {
//!     #[config(rename = "maxTotal")]
//!     max_total: u32,
//!     timeout: Option<u64>,
//!     #[config(default = 3)]
//!     retries: u32,
//! }
//! ```
//!
//! * `rename = "..."` — look the field up under a different key.
//! * `default` — fall back to `Default::default()` when the key is absent.
//! * `default = expr` — fall back to `expr` when the key is absent.
//!
//! ## Enums
//!
//! Unit-variant enums decode from a leaf by case-insensitive variant name
//! match; `#[config(rename = "...")]` on a variant overrides the matched
//! name.

mod decode;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `gestalt::decode::Decode` for a struct with named fields or a
/// unit-variant enum.
///
/// # Errors
///
/// Emits a compile-time error for tuple/unit structs, enums with data
/// variants, unions, and generic types.
#[proc_macro_derive(DecodeConfig, attributes(config))]
pub fn derive_decode_config(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    decode::expand_derive(&input).into()
}
