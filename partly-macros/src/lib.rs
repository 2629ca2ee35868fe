#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use proc_macro::TokenStream;
use quote::quote;

mod parsed;
mod process_struct;

use parsed::PStruct;

fn derive_with(
    input: TokenStream,
    process: fn(&PStruct) -> Result<proc_macro2::TokenStream, String>,
) -> TokenStream {
    match PStruct::parse(input.into()).and_then(|parsed| process(&parsed)) {
        Ok(expanded) => expanded.into(),
        Err(err) => quote! { compile_error!(#err); }.into(),
    }
}

/// Generate a `Key` constant per field and a `<Name>PartialExt` trait of
/// named accessors on `Partial<Name>`.
///
/// Field attributes:
/// - `#[partly(skip)]`: no key, no accessors;
/// - `#[partly(nested)]`: also generate `set_<field>_partial`, taking a
///   nested partial. For an `Option<T>` field both `set_<field>_partial`
///   and `<field>_partial` work with a `Partial<T>`.
///
/// Key constants are named in SCREAMING_SNAKE_CASE. A field whose
/// accessors would clash with a method of `Partial` (`len`, `value`,
/// `build`, ...) is rejected.
///
/// ```ignore
/// #[derive(PartialKeys)]
/// struct Person {
///     name: String,
/// }
///
/// let mut partial = Partial::<Person>::new();
/// partial.set_name("Alice".into());
/// assert_eq!(partial.value(&Person::NAME)?, "Alice");
/// ```
#[proc_macro_derive(PartialKeys, attributes(partly))]
pub fn derive_partial_keys(input: TokenStream) -> TokenStream {
    derive_with(input, process_struct::process_partial_keys)
}

/// Implement `FromPartial` by resolving every field through the key
/// constants generated by `#[derive(PartialKeys)]`. Fields marked
/// `#[partly(skip)]` are filled with `Default::default()`.
#[proc_macro_derive(FromPartial, attributes(partly))]
pub fn derive_from_partial(input: TokenStream) -> TokenStream {
    derive_with(input, process_struct::process_from_partial)
}
