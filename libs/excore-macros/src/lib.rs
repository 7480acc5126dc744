//! `#[excore::register(...)]` — plug-in discovery for the `Registry` pool.
//!
//! Grounded on `libs/modkit/macros/src/lib.rs`'s `#[module(...)]` attribute:
//! both expand a plain item into a hidden registrator function submitted to
//! a global `inventory` collection, so that merely *linking* a crate (no
//! explicit setup call) is enough for its targets to end up registered.
//! `#[module(...)]` builds a `ModuleEntry` with dependency/capability
//! metadata for a topo-sorted runtime graph; `#[excore::register(...)]` is
//! the simpler case the spec calls for (§4.1 AMBIENT): there is no
//! dependency graph between registry entries, so the registrator just
//! inserts one `Factory` into one named `Registry`.
//!
//! ```rust,ignore
//! use std::collections::BTreeMap;
//! use excore_core::Value;
//!
//! #[excore_core::register(field = "Backbone", required = ["depth"])]
//! fn resnet(params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
//!     Ok(Value::Map(params))
//! }
//! ```
//!
//! expands to the function unchanged, plus a hidden `Factory` impl and an
//! `inventory::submit!` of a registrator that calls
//! `excore_core::registry::register_global` the first time
//! `RegistryPool::bootstrap()` runs.

use heck::ToUpperCamelCase;
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
    Expr, ExprArray, ItemFn, Lit, LitStr, Meta, Token,
};

/// Parsed `field = "...", name = "...", required = [...]` attribute body.
struct RegisterArgs {
    field: String,
    name: Option<String>,
    required: Vec<String>,
}

impl Parse for RegisterArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let metas = Punctuated::<Meta, Token![,]>::parse_terminated(input)?;
        let mut field: Option<String> = None;
        let mut name: Option<String> = None;
        let mut required: Vec<String> = Vec::new();

        for meta in metas {
            let Meta::NameValue(nv) = &meta else {
                return Err(syn::Error::new_spanned(
                    &meta,
                    "expected `key = value` inside #[excore::register(...)]",
                ));
            };
            let key = nv
                .path
                .get_ident()
                .map(|i| i.to_string())
                .unwrap_or_default();
            match key.as_str() {
                "field" => field = Some(expect_str(&nv.value)?),
                "name" => name = Some(expect_str(&nv.value)?),
                "required" => required = expect_str_array(&nv.value)?,
                other => {
                    return Err(syn::Error::new_spanned(
                        &nv.path,
                        format!("unknown #[excore::register(...)] key `{other}`, expected one of: field, name, required"),
                    ))
                }
            }
        }

        let field = field.ok_or_else(|| {
            syn::Error::new(
                Span::call_site(),
                "#[excore::register(...)] requires a `field = \"...\"` argument naming the target registry",
            )
        })?;
        Ok(RegisterArgs { field, name, required })
    }
}

fn expect_str(expr: &Expr) -> syn::Result<String> {
    if let Expr::Lit(syn::ExprLit { lit: Lit::Str(s), .. }) = expr {
        Ok(s.value())
    } else {
        Err(syn::Error::new_spanned(expr, "expected a string literal"))
    }
}

fn expect_str_array(expr: &Expr) -> syn::Result<Vec<String>> {
    if let Expr::Array(ExprArray { elems, .. }) = expr {
        elems.iter().map(expect_str).collect()
    } else {
        Err(syn::Error::new_spanned(expr, "expected an array of string literals, e.g. [\"a\", \"b\"]"))
    }
}

#[proc_macro_attribute]
pub fn register(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as RegisterArgs);
    let func = parse_macro_input!(item as ItemFn);

    let fn_ident = func.sig.ident.clone();
    let field_lit = LitStr::new(&args.field, Span::call_site());
    let target_name = args
        .name
        .clone()
        .unwrap_or_else(|| fn_ident.to_string().to_upper_camel_case());
    let name_lit = LitStr::new(&target_name, Span::call_site());
    let required_lits: Vec<LitStr> = args
        .required
        .iter()
        .map(|s| LitStr::new(s, Span::call_site()))
        .collect();

    let registrator_ident = format_ident!("__excore_register_{}", fn_ident);
    let factory_ident = format_ident!("__ExcoreFactory{}", fn_ident.to_string().to_upper_camel_case());

    let expanded = quote! {
        #func

        #[doc(hidden)]
        #[allow(non_camel_case_types)]
        struct #factory_ident;

        impl ::excore_core::Factory for #factory_ident {
            fn required_params(&self) -> &'static [&'static str] {
                &[#(#required_lits),*]
            }

            fn call(
                &self,
                params: ::std::collections::BTreeMap<::std::string::String, ::excore_core::Value>,
            ) -> ::anyhow::Result<::excore_core::Value> {
                #fn_ident(params)
            }

            fn dotted_path(&self) -> &'static str {
                concat!(module_path!(), "::", stringify!(#fn_ident))
            }
        }

        #[doc(hidden)]
        fn #registrator_ident() {
            let _ = ::excore_core::registry::register_global(
                #field_lit,
                #name_lit,
                ::std::sync::Arc::new(#factory_ident),
            );
        }

        ::excore_core::inventory::submit! {
            ::excore_core::Registrator(#registrator_ident)
        }
    };

    TokenStream::from(expanded)
}
