// #[derive(Describe)] implementation
//
// Generates a struct descriptor whose field list is built lazily, so
// self-referential types (through Vec, Box, Option, ...) describe fine.

use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_quote, Data, DeriveInput, Fields, GenericParam, Result};

use crate::attrs::{container_attrs, field_attrs};

/// Expands #[derive(Describe)].
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[derive(Describe)]
/// struct Point {
///     x: i32,
///     #[serde(rename = "Y")]
///     y: i32,
/// }
///
/// // Output:
/// impl ::lunabind_engine::Describe for Point where Self: 'static {
///     fn describe() -> ::lunabind_engine::TypeDescriptor {
///         ::lunabind_engine::TypeDescriptor::structure::<Self>("Point", || {
///             vec![
///                 FieldDescriptor::new("x", <i32 as Describe>::describe()),
///                 FieldDescriptor::new("Y", <i32 as Describe>::describe()),
///             ]
///         })
///     }
/// }
/// ```
pub fn expand_describe(mut input: DeriveInput) -> Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.clone(),
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Describe can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Describe can only be derived for structs",
            ))
        }
    };

    let container = container_attrs(&input.attrs)?;
    let ident = input.ident.clone();
    let struct_name = container
        .rename
        .clone()
        .unwrap_or_else(|| ident.unraw().to_string());

    let mut entries = Vec::with_capacity(fields.len());
    for field in &fields {
        let attrs = field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let name = match (attrs.rename, container.rename_all) {
            (Some(rename), _) => rename,
            (None, Some(rule)) => rule.apply(&field_ident.unraw().to_string()),
            (None, None) => field_ident.unraw().to_string(),
        };
        let ty = &field.ty;
        entries.push(quote! {
            ::lunabind_engine::FieldDescriptor::new(
                #name,
                <#ty as ::lunabind_engine::Describe>::describe(),
            )
        });
    }

    // Type parameters must describe themselves; TypeId needs 'static
    let type_params: Vec<_> = input
        .generics
        .params
        .iter()
        .filter_map(|p| match p {
            GenericParam::Type(t) => Some(t.ident.clone()),
            _ => None,
        })
        .collect();
    let where_clause = input.generics.make_where_clause();
    for param in &type_params {
        where_clause
            .predicates
            .push(parse_quote!(#param: ::lunabind_engine::Describe + 'static));
    }
    where_clause.predicates.push(parse_quote!(Self: 'static));

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::lunabind_engine::Describe for #ident #ty_generics #where_clause {
            fn describe() -> ::lunabind_engine::TypeDescriptor {
                ::lunabind_engine::TypeDescriptor::structure::<Self>(#struct_name, || {
                    ::std::vec![#(#entries),*]
                })
            }
        }
    })
}
