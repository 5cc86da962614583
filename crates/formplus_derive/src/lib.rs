use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{Data, DeriveInput, Field, Fields, Type, parse_macro_input};

/// Generates a `<Model>Fields` accessor struct, one lens type per named field
/// and name-based access for every `String` field.
#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "FormModel cannot be derived for generic structs",
        ));
    }
    let model = input.ident.clone();
    let fields = named_fields(input)?;
    let formplus = formplus_path();
    let accessors = format_ident!("{model}Fields");

    let mut lenses = Vec::with_capacity(fields.len());
    let mut accessor_fns = Vec::with_capacity(fields.len());
    let mut reads = Vec::new();
    let mut writes = Vec::new();

    for field in fields {
        let Some(ident) = field.ident else {
            continue;
        };
        let ty = field.ty;
        let name = ident.to_string();
        let lens = format_ident!("{model}{}Lens", pascal_case(&name));

        if is_string(&ty) {
            reads.push(quote! {
                #name => ::core::option::Option::Some(self.#ident.as_str()),
            });
            writes.push(quote! {
                #name => {
                    self.#ident = value;
                    true
                }
            });
        }

        accessor_fns.push(quote! {
            pub const fn #ident(&self) -> #lens {
                #lens
            }
        });

        lenses.push(quote! {
            #[derive(Clone, Copy, Debug, Default)]
            pub struct #lens;

            impl #formplus::form::FieldLens<#model> for #lens {
                type Value = #ty;

                fn key(self) -> #formplus::form::FieldKey {
                    #formplus::form::FieldKey::new(#name)
                }

                fn get<'a>(self, model: &'a #model) -> &'a Self::Value {
                    &model.#ident
                }

                fn set(self, model: &mut #model, value: Self::Value) {
                    model.#ident = value;
                }
            }
        });
    }

    Ok(quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #accessors;

        impl #accessors {
            #(#accessor_fns)*
        }

        impl #formplus::form::FormModel for #model {
            type Fields = #accessors;

            fn fields() -> Self::Fields {
                #accessors
            }

            fn field_value(&self, key: &str) -> ::core::option::Option<&str> {
                match key {
                    #(#reads)*
                    _ => ::core::option::Option::None,
                }
            }

            fn set_field_value(&mut self, key: &str, value: ::std::string::String) -> bool {
                match key {
                    #(#writes)*
                    _ => {
                        let _ = value;
                        false
                    }
                }
            }
        }

        #(#lenses)*
    })
}

fn named_fields(input: DeriveInput) -> syn::Result<Punctuated<Field, Comma>> {
    let Data::Struct(data) = input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "FormModel can only be derived for structs",
        ));
    };
    match data.fields {
        Fields::Named(fields) => Ok(fields.named),
        other => Err(syn::Error::new_spanned(
            other,
            "FormModel requires named fields",
        )),
    }
}

fn formplus_path() -> TokenStream2 {
    match crate_name("formplus") {
        Ok(FoundCrate::Itself) => quote!(crate),
        Ok(FoundCrate::Name(name)) => {
            let name = Ident::new(&name, Span::call_site());
            quote!(::#name)
        }
        Err(_) => quote!(::formplus),
    }
}

fn is_string(ty: &Type) -> bool {
    match ty {
        Type::Path(path) if path.qself.is_none() => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "String" && segment.arguments.is_empty()),
        _ => false,
    }
}

/// `password_confirm` becomes `PasswordConfirm`.
fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .filter_map(|word| {
            let mut chars = word.chars();
            chars
                .next()
                .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
        })
        .collect()
}
