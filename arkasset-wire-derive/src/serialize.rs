use proc_macro::TokenStream;
use quote::quote;
use syn::{self};

pub fn impl_encode_macro(ast: &syn::DeriveInput) -> TokenStream {
    let name = ast.ident.clone();
    match ast.data {
        syn::Data::Struct(ref data) => {
            let statements: Vec<quote::__private::TokenStream> = data
                .fields
                .iter()
                .zip(0..1_000_000)
                .map(|(field, index)| encode_field(field, index))
                .collect();

            let expanded = quote! {
                impl WireEncode for #name {
                    fn wire_encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
                    where
                        W: std::io::Write,
                    {
                        #(#statements)*
                        Ok(())
                    }
                }
            };
            TokenStream::from(expanded)
        }
        _ => panic!("WireEncode can only be derived for structs; write enum codecs by hand"),
    }
}

fn encode_field(field: &syn::Field, index: usize) -> quote::__private::TokenStream {
    match field.ident.clone() {
        Some(id) => quote! { self.#id.wire_encode(&mut target)?; },
        None => {
            let index = syn::Index::from(index);
            quote! { self.#index.wire_encode(&mut target)?; }
        }
    }
}
