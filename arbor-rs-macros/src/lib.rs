use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// Derives `arbor::Choice` for a fieldless enum.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Choice)]
/// enum GameMode {
///     Survival,
///     Creative,
///     #[choice(name = "spectate")]
///     Spectator,
/// }
/// ```
///
/// This will generate:
///
/// ```ignore
/// impl ::arbor::Choice for GameMode {
///     fn choices() -> Vec<(&'static str, Self)> {
///         vec![
///             ("survival", GameMode::Survival),
///             ("creative", GameMode::Creative),
///             ("spectate", GameMode::Spectator),
///         ]
///     }
/// }
/// ```
#[proc_macro_derive(Choice, attributes(choice))]
pub fn derive_choice(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_choice(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_choice(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let enum_name = &input.ident;
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            enum_name,
            "Choice can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            enum_name,
            "Choice needs at least one variant",
        ));
    }

    let mut entries = Vec::with_capacity(data.variants.len());
    let mut seen: Vec<String> = Vec::new();
    for variant in &data.variants {
        let variant_name = &variant.ident;
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Choice variants cannot carry fields",
            ));
        }

        let name = match choice_name(&variant.attrs)? {
            Some(name) => name,
            None => variant_name.to_string().to_lowercase(),
        };
        if seen.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
            return Err(syn::Error::new_spanned(
                variant,
                format!("choice name '{name}' is used twice"),
            ));
        }
        seen.push(name.clone());

        entries.push(quote! { (#name, #enum_name::#variant_name) });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::arbor::Choice for #enum_name #ty_generics #where_clause {
            fn choices() -> ::std::vec::Vec<(&'static str, Self)> {
                ::std::vec![#(#entries),*]
            }
        }
    })
}

/// Extract the name from #[choice(name = "...")]
fn choice_name(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut name = None;
    for attr in attrs {
        if !attr.path().is_ident("choice") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                let text = value.value();
                if text.is_empty() || text.chars().any(char::is_whitespace) {
                    return Err(syn::Error::new_spanned(
                        &value,
                        "choice name must be a single non-empty token",
                    ));
                }
                name = Some(text);
                Ok(())
            } else {
                Err(meta.error("unsupported choice attribute, expected `name`"))
            }
        })?;
    }
    Ok(name)
}
