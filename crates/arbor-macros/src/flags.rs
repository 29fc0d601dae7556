//! Implementation of the `#[derive(Flags)]` macro.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{
    ext::IdentExt,
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Attribute, Data, DeriveInput, Error, Fields, Ident, LitStr, Result, Token,
};

/// One argument inside `#[flag(...)]`.
enum FlagArg {
    /// `"name,usage"` payload.
    Payload(LitStr),
    /// `hidden`, `value` or `flatten`.
    Word(Ident),
    /// `name = "..."` or `usage = "..."`.
    Assign(Ident, LitStr),
}

impl Parse for FlagArg {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.peek(LitStr) {
            return Ok(FlagArg::Payload(input.parse()?));
        }
        let ident = Ident::parse_any(input)?;
        if input.peek(Token![=]) {
            input.parse::<Token![=]>()?;
            return Ok(FlagArg::Assign(ident, input.parse()?));
        }
        Ok(FlagArg::Word(ident))
    }
}

/// How a field takes part in the flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Bind,
    Value,
    Flatten,
}

/// Field-level attributes from `#[flag(...)]`.
struct FlagAttr {
    payload: Option<LitStr>,
    name: Option<LitStr>,
    usage: Option<LitStr>,
    hidden: bool,
    binding: Binding,
    span: Span,
}

impl FlagAttr {
    fn from_attr(attr: &Attribute) -> Result<Self> {
        let mut out = FlagAttr {
            payload: None,
            name: None,
            usage: None,
            hidden: false,
            binding: Binding::Bind,
            span: attr.span(),
        };
        // A bare `#[flag]` has no argument list.
        if matches!(attr.meta, syn::Meta::Path(_)) {
            return Ok(out);
        }
        let args = attr.parse_args_with(Punctuated::<FlagArg, Token![,]>::parse_terminated)?;
        for arg in args {
            match arg {
                FlagArg::Payload(lit) => set_once(&mut out.payload, lit, "flag payload")?,
                FlagArg::Word(word) => match word.to_string().as_str() {
                    "hidden" => out.hidden = true,
                    "value" => out.set_binding(Binding::Value, &word)?,
                    "flatten" => out.set_binding(Binding::Flatten, &word)?,
                    other => {
                        return Err(Error::new(
                            word.span(),
                            format!(
                                "unknown flag option `{other}`. Expected hidden, value or flatten"
                            ),
                        ))
                    }
                },
                FlagArg::Assign(key, lit) => match key.to_string().as_str() {
                    "name" => set_once(&mut out.name, lit, "name")?,
                    "usage" => set_once(&mut out.usage, lit, "usage")?,
                    other => {
                        return Err(Error::new(
                            key.span(),
                            format!("unknown flag key `{other}`. Expected name or usage"),
                        ))
                    }
                },
            }
        }
        out.check()?;
        Ok(out)
    }

    fn set_binding(&mut self, binding: Binding, word: &Ident) -> Result<()> {
        if self.binding != Binding::Bind {
            return Err(Error::new(
                word.span(),
                "`value` and `flatten` cannot be combined",
            ));
        }
        self.binding = binding;
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if let Some(payload) = &self.payload {
            if self.name.is_some() || self.usage.is_some() {
                return Err(Error::new(
                    payload.span(),
                    "use either a \"name,usage\" payload or name = / usage =, not both",
                ));
            }
        }
        if self.binding == Binding::Flatten
            && (self.payload.is_some() || self.name.is_some() || self.usage.is_some() || self.hidden)
        {
            return Err(Error::new(
                self.span,
                "`flatten` takes no other flag arguments",
            ));
        }
        if let Some(name) = &self.name {
            check_name(&name.value(), name.span())?;
        }
        if let Some(payload) = &self.payload {
            if let Some(name) = explicit_name(&payload.value()) {
                check_name(name, payload.span())?;
            }
        }
        Ok(())
    }
}

fn set_once(slot: &mut Option<LitStr>, lit: LitStr, what: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::new(lit.span(), format!("duplicate {what}")));
    }
    *slot = Some(lit);
    Ok(())
}

/// Name part of a `"name,usage"` payload, mirroring the runtime split rule.
fn explicit_name(payload: &str) -> Option<&str> {
    let (head, _) = payload.split_once(',')?;
    if head.is_empty() || head.contains([' ', '\t', '{', '<']) {
        return None;
    }
    Some(head)
}

fn check_name(name: &str, span: Span) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::new(span, format!("invalid flag name {name:?}")))
    }
}

/// Main implementation of the Flags derive macro.
pub fn flags_derive_impl(input: DeriveInput) -> Result<TokenStream> {
    let struct_name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            Fields::Unit => {
                return Ok(empty_impl(&input));
            }
            Fields::Unnamed(_) => {
                return Err(Error::new(
                    input.span(),
                    "Flags can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.span(),
                "Flags can only be derived for structs",
            ))
        }
    };

    let mut statements = Vec::new();
    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "expected named field"))?;
        let mut attrs = field.attrs.iter().filter(|a| a.path().is_ident("flag"));
        let Some(attr) = attrs.next() else {
            continue;
        };
        if let Some(extra) = attrs.next() {
            return Err(Error::new(extra.span(), "duplicate #[flag] attribute"));
        }
        let attr = FlagAttr::from_attr(attr)?;
        let field_name = ident.unraw().to_string();

        if attr.binding == Binding::Flatten {
            statements.push(quote! {
                ::arbor::Flags::define_flags(&mut self.#ident, set)?;
            });
            continue;
        }

        let mut tag = match (&attr.payload, &attr.name, &attr.usage) {
            (Some(payload), _, _) => quote! { ::arbor::FlagTag::parse(#field_name, #payload) },
            (None, Some(name), usage) => {
                let usage = usage.as_ref().map_or_else(String::new, LitStr::value);
                quote! { ::arbor::FlagTag::new(#name, #usage) }
            }
            (None, None, Some(usage)) => {
                quote! { ::arbor::FlagTag::new(::arbor::flag_name(#field_name), #usage) }
            }
            (None, None, None) => quote! { ::arbor::FlagTag::parse(#field_name, "") },
        };
        if attr.hidden {
            tag = quote! { #tag.hidden() };
        }

        statements.push(match attr.binding {
            Binding::Value => quote! { set.var(#tag, &mut self.#ident)?; },
            _ => quote! { set.bind(#tag, &mut self.#ident)?; },
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::arbor::Flags for #struct_name #ty_generics #where_clause {
            fn define_flags<'__arbor>(
                &'__arbor mut self,
                set: &mut ::arbor::FlagSet<'__arbor>,
            ) -> ::core::result::Result<(), ::arbor::ConfigError> {
                #(#statements)*
                ::core::result::Result::Ok(())
            }
        }
    })
}

fn empty_impl(input: &DeriveInput) -> TokenStream {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    quote! {
        impl #impl_generics ::arbor::Flags for #struct_name #ty_generics #where_clause {
            fn define_flags<'__arbor>(
                &'__arbor mut self,
                _set: &mut ::arbor::FlagSet<'__arbor>,
            ) -> ::core::result::Result<(), ::arbor::ConfigError> {
                ::core::result::Result::Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand(input: DeriveInput) -> String {
        flags_derive_impl(input).unwrap().to_string()
    }

    fn error(input: DeriveInput) -> String {
        flags_derive_impl(input).unwrap_err().to_string()
    }

    #[test]
    fn test_payload_forms() {
        let out = expand(parse_quote! {
            struct Opts {
                #[flag("v,Verbose output")]
                verbose: bool,
                #[flag]
                dry_run: bool,
                #[flag(hidden, "Secret")]
                secret: String,
                not_a_flag: u8,
            }
        });
        assert!(out.contains(r#"FlagTag :: parse ("verbose" , "v,Verbose output")"#));
        assert!(out.contains(r#"FlagTag :: parse ("dry_run" , "")"#));
        assert!(out.contains(r#"FlagTag :: parse ("secret" , "Secret") . hidden ()"#));
        assert!(!out.contains("not_a_flag"));
        assert_eq!(out.matches("set . bind").count(), 3);
    }

    #[test]
    fn test_named_parts() {
        let out = expand(parse_quote! {
            struct Opts {
                #[flag(name = "n", usage = "Count, in {units}")]
                count: u32,
                #[flag(usage = "Only usage")]
                r#type: String,
            }
        });
        assert!(out.contains(r#"FlagTag :: new ("n" , "Count, in {units}")"#));
        assert!(out.contains(r#"FlagTag :: new (:: arbor :: flag_name ("type") , "Only usage")"#));
        assert!(out.contains("& mut self . r#type"));
    }

    #[test]
    fn test_value_and_flatten() {
        let out = expand(parse_quote! {
            struct Opts<T: Default> {
                #[flag(value, "Level")]
                level: Level,
                #[flag(flatten)]
                common: Common,
                extra: T,
            }
        });
        assert!(out.contains("set . var (:: arbor :: FlagTag :: parse (\"level\" , \"Level\") , & mut self . level) ?"));
        assert!(out.contains(":: arbor :: Flags :: define_flags (& mut self . common , set) ?"));
        assert!(out.contains("impl < T : Default > :: arbor :: Flags for Opts < T >"));
    }

    #[test]
    fn test_unit_struct() {
        let out = expand(parse_quote! { struct Nothing; });
        assert!(out.contains("_set"));
    }

    #[test]
    fn test_errors() {
        assert!(error(parse_quote! { struct T(u8); }).contains("named fields"));
        assert!(error(parse_quote! { enum E { A } }).contains("only be derived for structs"));
        assert!(error(parse_quote! {
            struct T { #[flag(bogus)] a: bool }
        })
        .contains("unknown flag option `bogus`"));
        assert!(error(parse_quote! {
            struct T { #[flag(name = "-x")] a: bool }
        })
        .contains("invalid flag name"));
        assert!(error(parse_quote! {
            struct T { #[flag("a b,usage")] #[flag] a: bool }
        })
        .contains("duplicate #[flag]"));
        assert!(error(parse_quote! {
            struct T { #[flag("x!,usage")] a: bool }
        })
        .contains("invalid flag name \"x!\""));
        assert!(error(parse_quote! {
            struct T { #[flag(flatten, "x")] a: Inner }
        })
        .contains("`flatten` takes no other flag arguments"));
        assert!(error(parse_quote! {
            struct T { #[flag("x", name = "y")] a: bool }
        })
        .contains("not both"));
    }
}
