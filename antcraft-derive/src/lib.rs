use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, FieldsNamed, Ident};

fn named_fields<'a>(input: &'a DeriveInput, derive: &str) -> Result<&'a FieldsNamed, TokenStream> {
    if let Data::Struct(ref data) = input.data {
        if let Fields::Named(ref fields) = data.fields {
            return Ok(fields);
        }
    }
    Err(error(&input.ident, derive))
}

/// Variant names of an enum whose variants each wrap exactly one value.
fn newtype_variants<'a>(input: &'a DeriveInput) -> Option<Vec<&'a Ident>> {
    let Data::Enum(ref data) = input.data else {
        return None;
    };
    data.variants
        .iter()
        .map(|variant| match variant.fields {
            Fields::Unnamed(ref fields) if fields.unnamed.len() == 1 => Some(&variant.ident),
            _ => None,
        })
        .collect()
}

fn error(ident: &Ident, derive: &str) -> TokenStream {
    TokenStream::from(
        syn::Error::new(
            ident.span(),
            format!("`{derive}` needs a struct with named fields or an enum of newtype variants"),
        )
        .to_compile_error(),
    )
}

/// Size of a struct is the sum of its fields; an enum asks the wrapped value.
#[proc_macro_derive(SizedProt)]
pub fn derive_sized_prot(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let body = if let Some(variants) = newtype_variants(&input) {
        quote!(match self {
            #(#name::#variants(inner) => inner.prot_size(),)*
        })
    } else {
        let fields = match named_fields(&input, "SizedProt") {
            Ok(fields) => fields,
            Err(e) => return e,
        };
        let sizes = fields.named.iter().map(|field| {
            let field = &field.ident;
            quote!(self.#field.prot_size())
        });
        quote!(0 #(+ #sizes)*)
    };

    TokenStream::from(quote!(
        impl crate::protocol_types::traits::SizedProt for #name {
            fn prot_size(&self) -> usize {
                #[allow(unused_imports)]
                use crate::protocol_types::traits::SizedProt;
                #body
            }
        }
    ))
}

/// Writes fields in declaration order. On an enum, writes whichever value it wraps.
#[proc_macro_derive(WriteProt)]
pub fn derive_write_prot(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let body = if let Some(variants) = newtype_variants(&input) {
        quote!(match self {
            #(#name::#variants(inner) => inner.write(stream).await,)*
        })
    } else {
        let fields = match named_fields(&input, "WriteProt") {
            Ok(fields) => fields,
            Err(e) => return e,
        };
        let writes = fields.named.iter().map(|field| {
            let field = &field.ident;
            quote!(self.#field.write(stream).await?;)
        });
        quote!(
            #(#writes)*
            Ok(())
        )
    };

    TokenStream::from(quote!(
        #[async_trait::async_trait]
        impl crate::protocol_types::traits::WriteProt for #name {
            async fn write(
                &self,
                stream: &mut (impl tokio::io::AsyncWrite + Unpin + Send),
            ) -> Result<(), String> {
                #[allow(unused_imports)]
                use crate::protocol_types::traits::WriteProt;
                #body
            }
        }
    ))
}

/// Reads fields in declaration order.
#[proc_macro_derive(ReadProt)]
pub fn derive_read_prot(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let fields = match named_fields(&input, "ReadProt") {
        Ok(fields) => fields,
        Err(e) => return e,
    };
    let name = &input.ident;
    let reads = fields.named.iter().map(|field| {
        let ident = &field.ident;
        let ty = &field.ty;
        quote!(#ident: <#ty as crate::protocol_types::traits::ReadProt>::read(stream).await?,)
    });

    TokenStream::from(quote!(
        #[async_trait::async_trait]
        impl crate::protocol_types::traits::ReadProt for #name {
            async fn read(
                stream: &mut (impl tokio::io::AsyncRead + Unpin + Send),
            ) -> Result<Self, String> {
                Ok(#name {
                    #(#reads)*
                })
            }
        }
    ))
}
