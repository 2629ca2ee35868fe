//! Parsing of the struct a derive is applied to.

use proc_macro2::{Delimiter, Ident, Spacing, TokenStream as TokenStream2, TokenTree as TokenTree2};
use unsynn::*;

keyword! {
    KStruct = "struct";
}

unsynn! {
    /// Attributes and visibility: everything up to the `struct` keyword
    struct UntilStruct {
        items: Any<Cons<Except<KStruct>, TokenTree>>,
    }

    /// `struct Name { ... }`, with no generics and no where clause
    struct StructDecl {
        head: UntilStruct,
        _struct: KStruct,
        name: Ident,
        body: BraceGroup,
    }
}

/// A struct with named fields, as far as the derives care.
pub(crate) struct PStruct {
    pub vis: TokenStream2,
    pub name: Ident,
    pub fields: Vec<PField>,
}

/// One named field.
pub(crate) struct PField {
    pub vis: TokenStream2,
    pub name: Ident,
    pub ty: TokenStream2,
    /// `#[partly(skip)]`: not exposed through the partial.
    pub skip: bool,
    /// `#[partly(nested)]`: also gets a setter taking a nested partial.
    pub nested: bool,
}

impl PField {
    /// The field name without any `r#` prefix.
    pub fn property_name(&self) -> String {
        let name = self.name.to_string();
        match name.strip_prefix("r#") {
            Some(stripped) => stripped.to_string(),
            None => name,
        }
    }

    /// For `Option<T>` fields, the tokens of `T`. The path may be
    /// qualified, as in `core::option::Option<T>`.
    pub fn option_inner(&self) -> Option<TokenStream2> {
        let tokens: Vec<TokenTree2> = self.ty.clone().into_iter().collect();
        let open = tokens
            .iter()
            .position(|tt| matches!(tt, TokenTree2::Punct(p) if p.as_char() == '<'))?;
        let is_path = tokens[..open].iter().all(|tt| match tt {
            TokenTree2::Ident(_) => true,
            TokenTree2::Punct(p) => p.as_char() == ':',
            _ => false,
        });
        let last_segment_is_option =
            matches!(open.checked_sub(1).map(|i| &tokens[i]), Some(TokenTree2::Ident(ident)) if ident == "Option");
        let closes = matches!(tokens.last(), Some(TokenTree2::Punct(p)) if p.as_char() == '>');
        if !is_path || !last_segment_is_option || !closes || tokens.len() < open + 3 {
            return None;
        }
        Some(tokens[open + 1..tokens.len() - 1].iter().cloned().collect())
    }

    /// The name of the generated key constant, in SCREAMING_SNAKE_CASE.
    pub fn key_name(&self) -> String {
        let property = self.property_name();
        let chars: Vec<char> = property.chars().collect();
        let mut out = String::with_capacity(chars.len() + 4);
        for (i, &c) in chars.iter().enumerate() {
            if c.is_uppercase() && i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_is_lower)
                {
                    out.push('_');
                }
            }
            out.extend(c.to_uppercase());
        }
        out
    }
}

const UNSUPPORTED: &str = "partly derives only support non-generic structs with named fields";

impl PStruct {
    pub fn parse(input: TokenStream2) -> core::result::Result<Self, String> {
        let mut iter = input.to_token_iter();
        let decl: StructDecl = iter.parse().map_err(|_| UNSUPPORTED.to_string())?;

        let mut head = TokenStream2::new();
        decl.head.items.to_tokens(&mut head);

        let fields = split_top_level(decl.body.0.stream())
            .into_iter()
            .map(parse_field)
            .collect::<core::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            vis: strip_attributes(head.into_iter().collect()).1,
            name: decl.name,
            fields,
        })
    }
}

/// Split a field list on the commas that are not inside `<...>`.
fn split_top_level(body: TokenStream2) -> Vec<Vec<TokenTree2>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    let mut after_dash = false;

    for tt in body {
        if let TokenTree2::Punct(p) = &tt {
            match p.as_char() {
                '<' => depth += 1,
                // `->` in a fn pointer type does not close an angle bracket
                '>' if !after_dash => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    chunks.push(core::mem::take(&mut current));
                    after_dash = false;
                    continue;
                }
                _ => {}
            }
            after_dash = p.as_char() == '-' && p.spacing() == Spacing::Joint;
        } else {
            after_dash = false;
        }
        current.push(tt);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split leading `#[...]` attributes from the rest of the tokens.
fn strip_attributes(tokens: Vec<TokenTree2>) -> (Vec<TokenStream2>, TokenStream2) {
    let mut attrs = Vec::new();
    let mut rest = tokens.into_iter().peekable();

    while matches!(rest.peek(), Some(TokenTree2::Punct(p)) if p.as_char() == '#') {
        rest.next();
        match rest.next() {
            Some(TokenTree2::Group(g)) if g.delimiter() == Delimiter::Bracket => {
                attrs.push(g.stream())
            }
            _ => break,
        }
    }

    (attrs, rest.collect())
}

fn parse_field(tokens: Vec<TokenTree2>) -> core::result::Result<PField, String> {
    let (attrs, rest) = strip_attributes(tokens);

    let mut skip = false;
    let mut nested = false;
    for attr in attrs {
        let mut attr = attr.into_iter();
        if !matches!(attr.next(), Some(TokenTree2::Ident(ident)) if ident == "partly") {
            continue;
        }
        let Some(TokenTree2::Group(args)) = attr.next() else {
            return Err("expected `#[partly(...)]`".to_string());
        };
        for arg in args.stream() {
            match arg {
                TokenTree2::Ident(ident) if ident == "skip" => skip = true,
                TokenTree2::Ident(ident) if ident == "nested" => nested = true,
                TokenTree2::Punct(p) if p.as_char() == ',' => {}
                other => {
                    return Err(format!(
                        "unknown partly attribute `{other}`, expected `skip` or `nested`"
                    ));
                }
            }
        }
    }

    let mut rest = rest.into_iter().peekable();
    let mut vis = TokenStream2::new();
    if matches!(rest.peek(), Some(TokenTree2::Ident(ident)) if ident == "pub") {
        vis.extend(rest.next());
        if matches!(rest.peek(), Some(TokenTree2::Group(g)) if g.delimiter() == Delimiter::Parenthesis)
        {
            vis.extend(rest.next());
        }
    }

    let name = match rest.next() {
        Some(TokenTree2::Ident(name)) => name,
        _ => return Err(UNSUPPORTED.to_string()),
    };
    match rest.next() {
        Some(TokenTree2::Punct(p)) if p.as_char() == ':' => {}
        _ => return Err(UNSUPPORTED.to_string()),
    }

    Ok(PField {
        vis,
        name,
        ty: rest.collect(),
        skip,
        nested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;

    #[test]
    fn parses_named_fields() {
        let parsed = PStruct::parse(quote! {
            #[derive(Debug)]
            /// A person
            pub struct Person {
                pub name: String,
                #[partly(nested)]
                address: Option<Address>,
                #[partly(skip)]
                pub(crate) cache: HashMap<String, Vec<u8>>,
                callback: fn(u32) -> u32,
            }
        })
        .unwrap();

        assert_eq!(parsed.name.to_string(), "Person");
        assert_eq!(parsed.vis.to_string(), "pub");
        let names: Vec<_> = parsed.fields.iter().map(|f| f.name.to_string()).collect();
        assert_eq!(names, ["name", "address", "cache", "callback"]);

        assert!(parsed.fields[1].nested);
        assert_eq!(
            parsed.fields[1].option_inner().map(|t| t.to_string()).as_deref(),
            Some("Address")
        );
        assert!(parsed.fields[2].skip);
        assert_eq!(
            parsed.fields[2].vis.to_string(),
            quote!(pub(crate)).to_string()
        );
        assert_eq!(
            parsed.fields[2].ty.to_string(),
            quote!(HashMap<String, Vec<u8>>).to_string()
        );
        assert_eq!(
            parsed.fields[3].ty.to_string(),
            quote!(fn(u32) -> u32).to_string()
        );
        assert!(parsed.fields[0].option_inner().is_none());
    }

    #[test]
    fn raw_identifiers_keep_their_property_name() {
        let parsed = PStruct::parse(quote! {
            struct Token { r#type: u8 }
        })
        .unwrap();
        assert_eq!(parsed.fields[0].property_name(), "type");
    }

    #[test]
    fn qualified_options_are_recognised() {
        let parsed = PStruct::parse(quote! {
            struct Person {
                a: core::option::Option<Address>,
                b: ::std::option::Option<Vec<u8>>,
                c: Vec<Option<u8>>,
                d: crate::Option,
            }
        })
        .unwrap();
        let inner: Vec<_> = parsed
            .fields
            .iter()
            .map(|f| f.option_inner().map(|t| t.to_string()))
            .collect();
        assert_eq!(
            inner,
            [
                Some(quote!(Address).to_string()),
                Some(quote!(Vec<u8>).to_string()),
                None,
                None,
            ]
        );
    }

    #[test]
    fn key_names_are_screaming_snake_case() {
        let parsed = PStruct::parse(quote! {
            struct S { previous_address: u8, fooBar: u8, httpURL: u8, HTTPServer: u8, v2Name: u8 }
        })
        .unwrap();
        let keys: Vec<_> = parsed.fields.iter().map(PField::key_name).collect();
        assert_eq!(
            keys,
            ["PREVIOUS_ADDRESS", "FOO_BAR", "HTTP_URL", "HTTP_SERVER", "V2_NAME"]
        );
    }

    #[test]
    fn rejects_tuple_structs_and_enums() {
        assert!(PStruct::parse(quote! { struct Pair(u8, u8); }).is_err());
        assert!(PStruct::parse(quote! { enum Either { A, B } }).is_err());
        assert!(PStruct::parse(quote! { struct Wrapper<T> { inner: T } }).is_err());
    }

    #[test]
    fn rejects_unknown_options() {
        let err = PStruct::parse(quote! {
            struct S { #[partly(flatten)] a: u8 }
        })
        .err()
        .unwrap();
        assert_eq!(err, "unknown partly attribute `flatten`, expected `skip` or `nested`");
    }
}
