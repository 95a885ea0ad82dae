//! Derive macros for the stackvm crate.
//!
//! Provides:
//! - `#[derive(Error)]` - error type boilerplate (thiserror replacement)

mod error;

use proc_macro::TokenStream;

/// Automatically implements `Display` and `Error` traits for error types.
///
/// Variant fields marked `#[from]` also get a `From` impl.
#[proc_macro_derive(Error, attributes(error, from))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
