use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Expr, Field, Fields, LitStr, Type};

enum FieldDefault {
    None,
    Std,
    Expr(Expr),
}

struct FieldMeta<'a> {
    ident: &'a syn::Ident,
    ty: &'a Type,
    key: String,
    default: FieldDefault,
    nullable: bool,
}

pub fn expand_derive(input: &DeriveInput) -> TokenStream {
    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &input.generics,
            "DecodeConfig does not support generic types",
        )
        .to_compile_error();
    }

    match &input.data {
        Data::Struct(data) => expand_struct(input, &data.fields),
        Data::Enum(data) => expand_enum(input, data),
        Data::Union(_) => {
            syn::Error::new_spanned(&input.ident, "DecodeConfig cannot be derived for unions")
                .to_compile_error()
        },
    }
}

fn expand_struct(input: &DeriveInput, fields: &Fields) -> TokenStream {
    let Fields::Named(named) = fields else {
        return syn::Error::new_spanned(
            &input.ident,
            "DecodeConfig requires a struct with named fields",
        )
        .to_compile_error();
    };

    let metas = match named
        .named
        .iter()
        .map(parse_field)
        .collect::<Result<Vec<FieldMeta<'_>>, syn::Error>>()
    {
        Ok(metas) => metas,
        Err(error) => return error.to_compile_error(),
    };

    let name = &input.ident;
    let bindings = metas.iter().map(|meta| {
        let ident = meta.ident;
        let ty = meta.ty;
        let key = &meta.key;
        match &meta.default {
            FieldDefault::None => quote! {
                let #ident: ::std::option::Option<#ty> =
                    ctx.field::<#ty>(path, node, #key, &mut errors);
            },
            FieldDefault::Std => quote! {
                let #ident: ::std::option::Option<#ty> = ctx.field_or::<#ty>(
                    path,
                    node,
                    #key,
                    &mut errors,
                    <#ty as ::std::default::Default>::default,
                );
            },
            FieldDefault::Expr(expr) => quote! {
                let #ident: ::std::option::Option<#ty> =
                    ctx.field_or::<#ty>(path, node, #key, &mut errors, || #expr);
            },
        }
    });

    let null_checks = metas.iter().filter(|meta| meta.nullable).map(|meta| {
        let ident = meta.ident;
        let key = &meta.key;
        quote! {
            if ctx.config().treat_null_values_in_class_as_errors {
                if let ::std::option::Option::Some(::std::option::Option::None) = &#ident {
                    errors.push(::gestalt::ValidationError::NullValueInClass {
                        path: ::std::borrow::ToOwned::to_owned(path),
                        field: ::std::borrow::ToOwned::to_owned(#key),
                    });
                }
            }
        }
    });

    let idents: Vec<_> = metas.iter().map(|meta| meta.ident).collect();
    let assemble = if idents.is_empty() {
        quote! {
            let _ = ctx;
            ::gestalt::Validated::of(::std::option::Option::Some(Self {}), errors)
        }
    } else {
        quote! {
            match (#(#idents,)*) {
                (#(::std::option::Option::Some(#idents),)*) => ::gestalt::Validated::of(
                    ::std::option::Option::Some(Self { #(#idents),* }),
                    errors,
                ),
                _ => ::gestalt::Validated::of(::std::option::Option::None, errors),
            }
        }
    };

    quote! {
        #[automatically_derived]
        impl ::gestalt::decode::Decode for #name {
            fn decode(
                path: &str,
                node: &::gestalt::ConfigNode,
                ctx: &::gestalt::decode::DecodeContext<'_>,
            ) -> ::gestalt::Validated<Self> {
                match node {
                    ::gestalt::ConfigNode::Map(_) => {},
                    other => {
                        return ::gestalt::Validated::invalid(
                            ::gestalt::ValidationError::DecodingExpectedMap {
                                path: ::std::borrow::ToOwned::to_owned(path),
                                received: other.kind(),
                            },
                        );
                    },
                }

                #[allow(unused_mut)]
                let mut errors: ::std::vec::Vec<::gestalt::ValidationError> =
                    ::std::vec::Vec::new();
                #(#bindings)*
                #(#null_checks)*
                #assemble
            }
        }
    }
}

fn expand_enum(input: &DeriveInput, data: &syn::DataEnum) -> TokenStream {
    let name = &input.ident;
    let name_str = name.to_string();

    let mut idents = Vec::new();
    let mut keys = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(
                variant,
                "DecodeConfig enums must only have unit variants",
            )
            .to_compile_error();
        }
        let key = match parse_rename(&variant.attrs) {
            Ok(rename) => rename.unwrap_or_else(|| variant.ident.to_string()),
            Err(error) => return error.to_compile_error(),
        };
        idents.push(&variant.ident);
        keys.push(key);
    }

    quote! {
        #[automatically_derived]
        impl ::gestalt::decode::Decode for #name {
            fn decode(
                path: &str,
                node: &::gestalt::ConfigNode,
                ctx: &::gestalt::decode::DecodeContext<'_>,
            ) -> ::gestalt::Validated<Self> {
                let _ = ctx;
                ::gestalt::decode::leaf_value(path, node, #name_str).and_then(|raw| {
                    let trimmed = raw.trim();
                    #(
                        if trimmed.eq_ignore_ascii_case(#keys) {
                            return ::gestalt::Validated::valid(Self::#idents);
                        }
                    )*
                    ::gestalt::Validated::invalid(
                        ::gestalt::ValidationError::DecodingValueParsing {
                            path: ::std::borrow::ToOwned::to_owned(path),
                            value: ::std::borrow::ToOwned::to_owned(trimmed),
                            kind: ::std::borrow::Cow::Borrowed(#name_str),
                            reason: ::std::borrow::Cow::Borrowed(
                                "does not match any enum variant",
                            ),
                        },
                    )
                })
            }
        }
    }
}

fn parse_field(field: &Field) -> Result<FieldMeta<'_>, syn::Error> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;

    let mut rename: Option<String> = None;
    let mut default = FieldDefault::None;
    for attr in &field.attrs {
        if !attr.path().is_ident("config") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                rename = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("default") {
                if meta.input.peek(syn::Token![=]) {
                    let expr: Expr = meta.value()?.parse()?;
                    default = FieldDefault::Expr(expr);
                } else {
                    default = FieldDefault::Std;
                }
                Ok(())
            } else {
                Err(meta.error("unsupported config attribute; expected rename or default"))
            }
        })?;
    }

    Ok(FieldMeta {
        ident,
        ty: &field.ty,
        key: rename.unwrap_or_else(|| ident.to_string()),
        default,
        nullable: is_option(&field.ty),
    })
}

fn parse_rename(attrs: &[syn::Attribute]) -> Result<Option<String>, syn::Error> {
    let mut rename = None;
    for attr in attrs {
        if !attr.path().is_ident("config") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                rename = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported config attribute; expected rename"))
            }
        })?;
    }
    Ok(rename)
}

fn is_option(ty: &Type) -> bool {
    let Type::Path(type_path) = ty else {
        return false;
    };
    type_path.qself.is_none()
        && type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option")
}
