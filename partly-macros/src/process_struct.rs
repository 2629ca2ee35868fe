use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};

use crate::parsed::{PField, PStruct};

fn key_ident(field: &PField) -> proc_macro2::Ident {
    format_ident!("{}", field.key_name())
}

/// Methods callable on a `Partial` with method syntax. An extension trait
/// method with one of these names would never be picked.
const PARTIAL_METHODS: &[&str] = &[
    "backing",
    "keys",
    "len",
    "is_empty",
    "clear",
    "state",
    "is_set",
    "value",
    "get",
    "partial_value",
    "optional_partial_value",
    "set_value",
    "with_value",
    "set_nested_partial",
    "set_optional_nested_partial",
    "remove_value",
    "build",
    "clone",
    "clone_from",
    "eq",
    "ne",
    "fmt",
    "into",
];

fn check_method_name(field: &PField, method: &str) -> Result<(), String> {
    if PARTIAL_METHODS.contains(&method) {
        return Err(format!(
            "field `{}` would generate `{method}()`, which `Partial` already has; \
             rename the field or mark it `#[partly(skip)]`",
            field.property_name()
        ));
    }
    Ok(())
}

/// Key constants plus the `<Name>PartialExt` accessor trait.
pub(crate) fn process_partial_keys(parsed: &PStruct) -> Result<TokenStream2, String> {
    let name = &parsed.name;
    let vis = &parsed.vis;
    let ext_trait = format_ident!("{}PartialExt", name);
    let fields: Vec<&PField> = parsed.fields.iter().filter(|f| !f.skip).collect();

    let keys = fields.iter().map(|field| {
        let field_vis = &field.vis;
        let field_name = &field.name;
        let ty = &field.ty;
        let key = key_ident(field);
        let property = field.property_name();
        let doc = format!("Key for the `{property}` property.");
        quote! {
            #[doc = #doc]
            #field_vis const #key: ::partly::Key<#name, #ty> =
                ::partly::Key::<#name, #ty>::new(#property, |value| &value.#field_name);
        }
    });

    let mut signatures = Vec::new();
    let mut bodies = Vec::new();
    for field in &fields {
        let ty = &field.ty;
        let key = key_ident(field);
        let property = field.property_name();
        let getter = &field.name;
        let setter = format_ident!("set_{}", property);
        let remover = format_ident!("remove_{}", property);
        let partial_getter = format_ident!("{}_partial", property);
        let nested_setter = format_ident!("set_{}_partial", property);
        check_method_name(field, &property)?;
        check_method_name(field, &setter.to_string())?;
        check_method_name(field, &remover.to_string())?;
        check_method_name(field, &partial_getter.to_string())?;
        if field.nested {
            check_method_name(field, &nested_setter.to_string())?;
        }

        let getter_doc = format!("Best-effort value of `{property}`.");
        let setter_doc = format!("Set `{property}`.");
        let remover_doc = format!("Reset `{property}` to unset.");
        let partial_doc = format!("A partial of `{property}`.");

        signatures.push(quote! {
            #[doc = #getter_doc]
            fn #getter(&self) -> ::core::option::Option<#ty>;
            #[doc = #setter_doc]
            fn #setter(&mut self, value: #ty);
            #[doc = #remover_doc]
            fn #remover(&mut self);
        });
        bodies.push(quote! {
            fn #getter(&self) -> ::core::option::Option<#ty> {
                ::partly::Partial::get(self, &#name::#key)
            }
            fn #setter(&mut self, value: #ty) {
                ::partly::Partial::set_value(self, &#name::#key, value)
            }
            fn #remover(&mut self) {
                ::partly::Partial::remove_value(self, &#name::#key)
            }
        });

        let nested_doc = format!("Set `{property}` to a nested partial.");
        // Nested `Option<T>` fields are handled as partials of `T`.
        match field.option_inner().filter(|_| field.nested) {
            Some(inner) => {
                signatures.push(quote! {
                    #[doc = #partial_doc]
                    fn #partial_getter(&self) -> ::partly::Partial<#inner>;
                    #[doc = #nested_doc]
                    fn #nested_setter(&mut self, partial: ::partly::Partial<#inner>);
                });
                bodies.push(quote! {
                    fn #partial_getter(&self) -> ::partly::Partial<#inner> {
                        ::partly::Partial::optional_partial_value(self, &#name::#key)
                    }
                    fn #nested_setter(&mut self, partial: ::partly::Partial<#inner>) {
                        ::partly::Partial::set_optional_nested_partial(self, &#name::#key, partial)
                    }
                });
            }
            None => {
                signatures.push(quote! {
                    #[doc = #partial_doc]
                    fn #partial_getter(&self) -> ::partly::Partial<#ty>;
                });
                bodies.push(quote! {
                    fn #partial_getter(&self) -> ::partly::Partial<#ty> {
                        ::partly::Partial::partial_value(self, &#name::#key)
                    }
                });
                if field.nested {
                    signatures.push(quote! {
                        #[doc = #nested_doc]
                        fn #nested_setter(&mut self, partial: ::partly::Partial<#ty>);
                    });
                    bodies.push(quote! {
                        fn #nested_setter(&mut self, partial: ::partly::Partial<#ty>) {
                            ::partly::Partial::set_nested_partial(self, &#name::#key, partial)
                        }
                    });
                }
            }
        }
    }

    let trait_doc = format!("Named accessors for `Partial<{name}>`.");
    Ok(quote! {
        impl #name {
            #(#keys)*
        }

        #[doc = #trait_doc]
        #vis trait #ext_trait {
            #(#signatures)*
        }

        impl #ext_trait for ::partly::Partial<#name> {
            #(#bodies)*
        }
    })
}

/// `FromPartial`, resolving every exposed field through its key.
pub(crate) fn process_from_partial(parsed: &PStruct) -> Result<TokenStream2, String> {
    let name = &parsed.name;
    let inits = parsed.fields.iter().map(|field| {
        let field_name = &field.name;
        if field.skip {
            quote! { #field_name: ::core::default::Default::default() }
        } else {
            let key = key_ident(field);
            quote! { #field_name: partial.value(&Self::#key)? }
        }
    });

    Ok(quote! {
        impl ::partly::FromPartial for #name {
            fn from_partial(
                partial: &::partly::Partial<Self>,
            ) -> ::core::result::Result<Self, ::partly::PartialError> {
                ::core::result::Result::Ok(Self {
                    #(#inits,)*
                })
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(input: TokenStream2) -> String {
        process_partial_keys(&PStruct::parse(input).unwrap())
            .unwrap()
            .to_string()
    }

    #[test]
    fn emits_one_key_per_exposed_field() {
        let out = expand(quote! {
            pub struct Person {
                pub name: String,
                #[partly(skip)]
                cache: Vec<u8>,
            }
        });
        assert!(out.contains("const NAME"));
        assert!(!out.contains("CACHE"));
        assert!(out.contains("trait PersonPartialExt"));
        assert!(out.contains("fn set_name"));
        assert!(out.contains("fn remove_name"));
        assert!(out.contains("fn name_partial"));
    }

    #[test]
    fn nested_optional_fields_look_through_option() {
        let out = expand(quote! {
            struct Person {
                #[partly(nested)]
                address: Option<Address>,
            }
        });
        assert!(out.contains("fn set_address_partial"));
        assert!(out.contains("set_optional_nested_partial"));
        assert!(out.contains("optional_partial_value"));
        assert!(out.contains(&quote!(fn address_partial(&self) -> ::partly::Partial<Address>).to_string()));
    }

    #[test]
    fn key_constants_are_screaming_snake_case() {
        let out = expand(quote! {
            struct Window {
                innerWidth: u32,
            }
        });
        assert!(out.contains("const INNER_WIDTH"));
        assert!(out.contains("fn set_innerWidth"));
    }

    #[test]
    fn rejects_fields_shadowed_by_partial_methods() {
        let parsed = PStruct::parse(quote! {
            struct Queue {
                len: usize,
                name: String,
            }
        })
        .unwrap();
        assert_eq!(
            process_partial_keys(&parsed).err().as_deref(),
            Some(
                "field `len` would generate `len()`, which `Partial` already has; \
                 rename the field or mark it `#[partly(skip)]`"
            )
        );

        // `value` also collides through `set_value` and `remove_value`.
        let parsed = PStruct::parse(quote! { struct Cell { value: u8 } }).unwrap();
        assert!(process_partial_keys(&parsed).is_err());

        let parsed = PStruct::parse(quote! {
            struct Queue {
                #[partly(skip)]
                len: usize,
                length: usize,
            }
        })
        .unwrap();
        assert!(process_partial_keys(&parsed).is_ok());
    }

    #[test]
    fn from_partial_defaults_skipped_fields() {
        let parsed = PStruct::parse(quote! {
            struct Person {
                name: String,
                #[partly(skip)]
                cache: Vec<u8>,
            }
        })
        .unwrap();
        let out = process_from_partial(&parsed).unwrap().to_string();
        assert!(out.contains("Self :: NAME"));
        assert!(!out.contains("Self :: CACHE"));
        assert!(out.contains("Default :: default"));
    }
}
