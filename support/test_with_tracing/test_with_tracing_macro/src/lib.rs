// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test attribute macro for `test_with_tracing` crate.

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse_macro_input;
use syn::spanned::Spanned;
use syn::Error;
use syn::ItemFn;

/// Attribute macro on tests that have tracing output.
///
/// This attribute macro acts just like the `#[test]` attribute except that it
/// first initializes the `tracing` crate. Other attributes on the test, such
/// as `#[should_panic]` or `#[ignore]`, are kept on the generated test.
#[proc_macro_attribute]
pub fn test(
    attr: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let attr = TokenStream::from(attr);
    let item = parse_macro_input!(item as ItemFn);
    make_test(attr, item)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn make_test(attr: TokenStream, item: ItemFn) -> syn::Result<TokenStream> {
    if !attr.is_empty() {
        return Err(Error::new(attr.span(), "unexpected arguments"));
    }
    let sig = &item.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(Error::new(
            asyncness.span(),
            "test function must not be async",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(Error::new(
            sig.generics.span(),
            "test function must not be generic",
        ));
    }
    if !sig.inputs.is_empty() {
        return Err(Error::new(sig.inputs.span(), "expected 0 arguments"));
    }

    let name = &sig.ident;
    let output = &sig.output;
    let attrs = &item.attrs;
    let vis = &item.vis;

    // Nest the original function so that its body, attributes aside, is
    // unchanged.
    let mut inner = item.clone();
    inner.attrs.clear();

    Ok(quote! {
        #[::core::prelude::v1::test]
        #(#attrs)*
        #vis fn #name() #output {
            #inner
            ::test_with_tracing::init();
            #name()
        }
    })
}
