//! `#[derive(AstWalk)]`: walker plumbing for the `gobuild` AST arena.
//!
//! The generated impl forwards every field (or every variant payload) to
//! `crate::walk::Walk::walk`, so a `Visitor` sees the whole subtree without
//! hand-written traversal code. Fields that carry no AST payload can be
//! excluded with `#[walk(skip)]`.

use proc_macro::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Field, Fields, Index};

#[proc_macro_derive(AstWalk, attributes(walk))]
pub fn derive_ast_walk(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let span = input.span();

    let body = match walk_body(&input.data) {
        Ok(body) => body,
        Err(err) => return err.into_compile_error().into(),
    };

    let expanded = quote_spanned! {span =>
        impl<'ast> crate::walk::Walk<'ast> for #name {
            #[inline(always)]
            fn walk<V: crate::walk::Visitor<'ast> + ?Sized>(
                &self,
                a: &'ast crate::ast::AstArena,
                v: &mut V,
            ) {
                #body
            }
        }
    };

    expanded.into()
}

fn is_skipped(field: &Field) -> bool {
    field.attrs.iter().any(|attr| {
        if !attr.path().is_ident("walk") {
            return false;
        }
        let mut skip = false;
        // Unparseable attribute contents surface through syn elsewhere; a
        // best-effort parse is enough here.
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
            }
            Ok(())
        });
        skip
    })
}

fn walk_body(data: &Data) -> syn::Result<proc_macro2::TokenStream> {
    match data {
        Data::Struct(s) => Ok(struct_body(&s.fields)),
        Data::Enum(e) => {
            let arms = e.variants.iter().map(|variant| {
                let ident = &variant.ident;
                variant_arm(ident, &variant.fields)
            });
            Ok(quote! {
                match self {
                    #(#arms)*
                }
            })
        }
        Data::Union(u) => Err(syn::Error::new_spanned(
            u.union_token,
            "AstWalk cannot be derived for unions",
        )),
    }
}

fn struct_body(fields: &Fields) -> proc_macro2::TokenStream {
    let calls = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| !is_skipped(f))
        .map(|(i, field)| {
            let access = match &field.ident {
                Some(ident) => quote! { &self.#ident },
                None => {
                    let idx = Index::from(i);
                    quote! { &self.#idx }
                }
            };
            quote! { crate::walk::Walk::walk(#access, a, v); }
        });
    quote! { #(#calls)* }
}

fn variant_arm(ident: &syn::Ident, fields: &Fields) -> proc_macro2::TokenStream {
    match fields {
        Fields::Unit => quote! { Self::#ident => {} },
        Fields::Named(named) => {
            // Skipped fields bind to `_` so the expansion stays warning-free.
            let mut patterns = Vec::new();
            let mut calls = Vec::new();
            for f in &named.named {
                let name = f.ident.clone().unwrap();
                if is_skipped(f) {
                    patterns.push(quote! { #name: _ });
                } else {
                    patterns.push(quote! { #name });
                    calls.push(quote! { crate::walk::Walk::walk(#name, a, v); });
                }
            }
            quote! {
                Self::#ident { #(#patterns),* } => {
                    #(#calls)*
                }
            }
        }
        Fields::Unnamed(unnamed) => {
            let mut patterns = Vec::new();
            let mut calls = Vec::new();
            for (i, f) in unnamed.unnamed.iter().enumerate() {
                if is_skipped(f) {
                    patterns.push(quote! { _ });
                } else {
                    let b = format_ident!("f{i}");
                    patterns.push(quote! { #b });
                    calls.push(quote! { crate::walk::Walk::walk(#b, a, v); });
                }
            }
            quote! {
                Self::#ident(#(#patterns),*) => {
                    #(#calls)*
                }
            }
        }
    }
}
