use proc_macro::TokenStream;
use quote::quote;
use syn;

pub fn impl_decode_macro(ast: &syn::DeriveInput) -> TokenStream {
    let name = ast.ident.clone();
    let data = match ast.data {
        syn::Data::Struct(ref data) => data,
        _ => panic!("WireDecode can only be derived for structs; write enum codecs by hand"),
    };
    let is_tuple_struct = matches!(data.fields, syn::Fields::Unnamed(_));

    let statements: Vec<quote::__private::TokenStream> = data
        .fields
        .iter()
        .map(|field| decode_field(field))
        .collect();

    let expanded = if is_tuple_struct {
        quote! {
            impl WireDecode for #name {
                fn wire_decode<R: std::io::Read>(mut target: R) -> Result<Self, crate::CodecError> {
                    Ok(#name (
                        #(#statements)*
                    ))
                }
            }
        }
    } else {
        quote! {
            impl WireDecode for #name {
                fn wire_decode<R: std::io::Read>(mut target: R) -> Result<Self, crate::CodecError> {
                    Ok(#name {
                        #(#statements)*
                    })
                }
            }
        }
    };

    TokenStream::from(expanded)
}

fn decode_field(field: &syn::Field) -> quote::__private::TokenStream {
    let ty = field.ty.clone();
    match field.ident.clone() {
        Some(name) => {
            quote! { #name: <#ty as WireDecode>::wire_decode(&mut target)?, }
        }
        None => {
            quote! { <#ty as WireDecode>::wire_decode(&mut target)?, }
        }
    }
}
