//! Derive macro for error types.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations.
//! Replacement for `thiserror` crate.
//!
//! # Usage
//!
//! ```ignore
//! use stackvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum LoadError {
//!     #[error("file not found: {0}")]
//!     NotFound(String),
//!
//!     #[error("address {address:#06x} out of bounds (size {size})")]
//!     OutOfBounds { address: i32, size: usize },
//!
//!     #[error(transparent)]
//!     Parse(#[from] ParseError),
//!
//!     #[error("empty program")]
//!     Empty,
//! }
//! ```
//!
//! # Supported Features
//!
//! - Unit variants: `#[error("message")]`
//! - Tuple variants with positional args: `#[error("error: {0}")]`, `{0:?}`
//! - Struct variants with named args: `#[error("expected {expected}")]`
//! - Forwarding variants: `#[error(transparent)]` delegates `Display` and `source`
//! - `#[from]` on the single field of a variant generates a `From` impl and
//!   exposes the field as the error `source`
//!
//! Only fields referenced by the message are passed to `write!`, so a variant
//! may carry data that its message does not print.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, Ident, Lit, Meta, parse_macro_input};

/// Parsed content of an `#[error(...)]` attribute.
enum Message {
    /// `#[error("...")]`
    Format(String),
    /// `#[error(transparent)]`
    Transparent,
}

/// Derives `Display` and `Error` for an enum or struct.
///
/// Each variant must have an `#[error("...")]` attribute specifying
/// the display message. Supports field interpolation using `{0}`, `{1}`
/// for tuple fields or `{field_name}` for struct fields.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_error_derive(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_error_derive(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (display_body, source_body, from_impls) = match &input.data {
        Data::Enum(data_enum) => {
            let mut display_arms = Vec::with_capacity(data_enum.variants.len());
            let mut source_arms = Vec::with_capacity(data_enum.variants.len());
            let mut from_impls = Vec::new();

            for variant in &data_enum.variants {
                let variant_name = &variant.ident;
                let message = extract_message(
                    &variant.attrs,
                    variant_name,
                    &format!("variant `{}`", variant_name),
                )?;

                display_arms.push(display_arm(variant_name, &variant.fields, &message)?);
                source_arms.push(source_arm(variant_name, &variant.fields, &message)?);
                if let Some(from) = from_impl(name, variant_name, &variant.fields)? {
                    from_impls.push(from);
                }
            }

            (
                quote! { match self { #(#display_arms)* } },
                quote! { match self { #(#source_arms)* } },
                from_impls,
            )
        }
        Data::Struct(data_struct) => {
            let message = extract_message(
                &input.attrs,
                &input.ident,
                &format!("type `{}`", input.ident),
            )?;
            let Message::Format(error_msg) = message else {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "#[error(transparent)] is only supported on enum variants",
                ));
            };

            (
                struct_display(&data_struct.fields, &error_msg),
                quote! { ::std::option::Option::None },
                Vec::new(),
            )
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #display_body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {
            fn source(&self) -> ::std::option::Option<&(dyn ::std::error::Error + 'static)> {
                #source_body
            }
        }

        #(#from_impls)*
    })
}

/// Builds the `Display` match arm for one enum variant.
fn display_arm(variant: &Ident, fields: &Fields, message: &Message) -> syn::Result<TokenStream2> {
    let error_msg = match message {
        Message::Transparent => {
            let pattern = single_field_pattern(variant, fields)?;
            return Ok(quote! {
                #pattern => ::std::fmt::Display::fmt(inner, f),
            });
        }
        Message::Format(msg) => msg,
    };

    let (format_str, referenced) = scan_format(error_msg);

    let arm = match fields {
        Fields::Unit => quote! {
            Self::#variant => write!(f, #format_str),
        },
        Fields::Unnamed(unnamed) => {
            let bindings: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| {
                    let ident = format_ident!("f{}", i);
                    if referenced.contains(&ident.to_string()) {
                        ident.into_token_stream()
                    } else {
                        quote! { _ }
                    }
                })
                .collect();
            let used: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .filter(|ident| referenced.contains(&ident.to_string()))
                .collect();
            quote! {
                Self::#variant(#(#bindings),*) => write!(f, #format_str, #(#used = #used),*),
            }
        }
        Fields::Named(named) => {
            let used: Vec<_> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| referenced.contains(&ident.to_string()))
                .collect();
            quote! {
                Self::#variant { #(#used,)* .. } => write!(f, #format_str, #(#used = #used),*),
            }
        }
    };

    Ok(arm)
}

/// Builds the `Error::source` match arm for one enum variant.
fn source_arm(variant: &Ident, fields: &Fields, message: &Message) -> syn::Result<TokenStream2> {
    if let Message::Transparent = message {
        let pattern = single_field_pattern(variant, fields)?;
        return Ok(quote! {
            #pattern => ::std::error::Error::source(inner),
        });
    }

    if fields.iter().any(|field| has_attr(&field.attrs, "from")) {
        let pattern = single_field_pattern(variant, fields)?;
        return Ok(quote! {
            #pattern => ::std::option::Option::Some(inner as &(dyn ::std::error::Error + 'static)),
        });
    }

    Ok(quote! {
        Self::#variant { .. } => ::std::option::Option::None,
    })
}

/// Generates `From<Field>` for a variant whose single field carries `#[from]`.
fn from_impl(name: &Ident, variant: &Ident, fields: &Fields) -> syn::Result<Option<TokenStream2>> {
    let Some(marked) = fields.iter().find(|field| has_attr(&field.attrs, "from")) else {
        return Ok(None);
    };

    if fields.len() != 1 {
        return Err(syn::Error::new_spanned(
            marked,
            "#[from] requires a variant with exactly one field",
        ));
    }

    let ty = &marked.ty;
    let construct = match &marked.ident {
        Some(ident) => quote! { Self::#variant { #ident: value } },
        None => quote! { Self::#variant(value) },
    };

    Ok(Some(quote! {
        impl ::std::convert::From<#ty> for #name {
            fn from(value: #ty) -> Self {
                #construct
            }
        }
    }))
}

/// Pattern binding the only field of a variant as `inner`.
fn single_field_pattern(variant: &Ident, fields: &Fields) -> syn::Result<TokenStream2> {
    if fields.len() != 1 {
        return Err(syn::Error::new_spanned(
            variant,
            "#[error(transparent)] and #[from] require exactly one field",
        ));
    }

    Ok(match fields {
        Fields::Named(named) => {
            let ident = &named.named[0].ident;
            quote! { Self::#variant { #ident: inner } }
        }
        _ => quote! { Self::#variant(inner) },
    })
}

fn struct_display(fields: &Fields, error_msg: &str) -> TokenStream2 {
    let (format_str, referenced) = scan_format(error_msg);

    match fields {
        Fields::Unit => quote! {
            write!(f, #format_str)
        },
        Fields::Named(named) => {
            let used: Vec<_> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| referenced.contains(&ident.to_string()))
                .collect();
            quote! {
                write!(f, #format_str, #(#used = self.#used),*)
            }
        }
        Fields::Unnamed(unnamed) => {
            let (idents, indices): (Vec<_>, Vec<_>) = (0..unnamed.unnamed.len())
                .map(|i| (format_ident!("f{}", i), syn::Index::from(i)))
                .filter(|(ident, _)| referenced.contains(&ident.to_string()))
                .unzip();
            quote! {
                write!(f, #format_str, #(#idents = self.#indices),*)
            }
        }
    }
}

fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

/// Extracts the message from an `#[error(...)]` attribute.
fn extract_message<T: ToTokens>(
    attrs: &[Attribute],
    target: &T,
    target_desc: &str,
) -> syn::Result<Message> {
    for attr in attrs {
        if !attr.path().is_ident("error") {
            continue;
        }

        let Meta::List(meta_list) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")] or #[error(transparent)]",
            ));
        };

        if let Ok(ident) = syn::parse2::<Ident>(meta_list.tokens.clone()) {
            if ident == "transparent" {
                return Ok(Message::Transparent);
            }
            return Err(syn::Error::new_spanned(
                ident,
                "unknown #[error] keyword; the only supported keyword is `transparent`",
            ));
        }

        return match syn::parse2::<Lit>(meta_list.tokens.clone()) {
            Ok(Lit::Str(lit_str)) => Ok(Message::Format(lit_str.value())),
            Ok(_) => Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute: message must be a string literal, e.g. #[error(\"stack underflow in {0}\")]",
            )),
            Err(_) => Err(syn::Error::new_spanned(
                &attr.meta,
                "failed to parse #[error] attribute; expected a string literal like #[error(\"unknown opcode: {0}\")]",
            )),
        };
    }

    Err(syn::Error::new_spanned(
        target,
        format!(
            "missing #[error(\"...\")] attribute on {}; every error variant must declare a display message",
            target_desc
        ),
    ))
}

/// Rewrites positional placeholders `{0}` / `{0:?}` to `{f0}` / `{f0:?}` and
/// collects every argument name the format string refers to.
fn scan_format(format_str: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(format_str.len() + 4);
    let mut names: Vec<String> = Vec::new();
    let mut chars = format_str.chars().peekable();

    while let Some(c) = chars.next() {
        out.push(c);
        match c {
            '{' if chars.peek() == Some(&'{') => {
                out.push('{');
                chars.next();
            }
            '{' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next == '}' || next == ':' {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                if !name.is_empty() && name.chars().all(|d| d.is_ascii_digit()) {
                    name.insert(0, 'f');
                }
                out.push_str(&name);
                if !name.is_empty() && !names.contains(&name) {
                    names.push(name);
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                out.push('}');
                chars.next();
            }
            _ => {}
        }
    }

    (out, names)
}

#[cfg(test)]
mod tests {
    use super::scan_format;

    #[test]
    fn positional_args_are_renamed() {
        let (fmt, names) = scan_format("unknown opcode {0:#04x} at {1}");
        assert_eq!(fmt, "unknown opcode {f0:#04x} at {f1}");
        assert_eq!(names, vec!["f0", "f1"]);
    }

    #[test]
    fn named_args_are_collected_once() {
        let (fmt, names) = scan_format("{name} then {name:?} and {limit}");
        assert_eq!(fmt, "{name} then {name:?} and {limit}");
        assert_eq!(names, vec!["name", "limit"]);
    }

    #[test]
    fn escaped_braces_are_left_alone() {
        let (fmt, names) = scan_format("{{literal}} {0}");
        assert_eq!(fmt, "{{literal}} {f0}");
        assert_eq!(names, vec!["f0"]);
    }
}
