//! Derive macros for the `WireEncode`/`WireDecode` traits of `arkasset-chain`.
//!
//! Both derives only support plain structs (named or tuple fields) whose
//! wire layout is simply each field encoded/decoded in declaration order.
//! Anything with presence bitfields, tags, or conditional fields (groups,
//! issuance records, asset refs) is written by hand in `arkasset-chain`.

extern crate proc_macro;
use proc_macro::TokenStream;

mod deserialize;
mod serialize;

#[proc_macro_derive(WireDecode)]
pub fn wire_decode(input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).unwrap();
    deserialize::impl_decode_macro(&ast)
}

#[proc_macro_derive(WireEncode)]
pub fn wire_encode(input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).unwrap();
    serialize::impl_encode_macro(&ast)
}
