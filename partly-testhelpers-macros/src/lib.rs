//! The `#[partly_testhelpers::test]` attribute.

use unsynn::*;

keyword! {
    KFn = "fn";
}

unsynn! {
    /// Attributes, visibility and qualifiers before `fn`
    struct UntilFn {
        items: Any<Cons<Except<KFn>, TokenTree>>,
    }

    /// Arguments and return type, up to the body
    struct UntilBody {
        items: Any<Cons<Except<BraceGroup>, TokenTree>>,
    }

    struct TestFn {
        before_fn: UntilFn,
        _fn: KFn,
        name: Ident,
        signature: UntilBody,
        body: BraceGroup,
    }
}

/// Like `#[test]`, but calls `partly_testhelpers::setup()` first so the
/// test gets log output and readable backtraces.
///
/// Another test attribute can be passed as an argument, e.g.
/// `#[partly_testhelpers::test(some_runtime::test)]`.
#[proc_macro_attribute]
pub fn test(
    attr: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let item = TokenStream::from(item);
    let mut iter = item.to_token_iter();
    let parsed = match iter.parse::<TestFn>() {
        Ok(parsed) => parsed,
        Err(err) => {
            let msg = format!("#[partly_testhelpers::test] expects a function: {err}");
            return quote::quote! { compile_error!(#msg); }.into();
        }
    };

    let mut before_fn = TokenStream::new();
    parsed.before_fn.items.to_tokens(&mut before_fn);
    let mut signature = TokenStream::new();
    parsed.signature.items.to_tokens(&mut signature);
    let name = parsed.name;
    let body = parsed.body.0.stream();

    let test_attr = if attr.is_empty() {
        quote::quote! { #[::core::prelude::rust_2024::test] }
    } else {
        let attr = TokenStream::from(attr);
        quote::quote! { #[#attr] }
    };

    quote::quote! {
        #test_attr
        #before_fn fn #name #signature {
            ::partly_testhelpers::setup();

            #body
        }
    }
    .into()
}
