use itertools::Itertools;
use proc_macro::TokenStream;
use proc_macro2::Literal;
use quote::{quote, ToTokens};
use syn::{parse::Parser, punctuated::Punctuated, Expr, Lit, Token};

/// Generates a base64 encoder struct.
///
/// Usage: `base64_impl!(StructName, "64 CHARSET CHARS", padding)`
#[proc_macro]
pub fn base64_impl(item: TokenStream) -> TokenStream {
    let parser = Punctuated::<Expr, Token![,]>::parse_terminated;
    let args = match parser.parse(item) {
        Ok(args) => args,
        Err(e) => return e.to_compile_error().into(),
    };

    if args.len() != 3 {
        panic!("This macro requires 3 arguments (structName, \"CHARSET\", padding)")
    }

    let struct_name = if let Expr::Path(struct_name_expr) = &args[0] {
        let segments = struct_name_expr.path.segments.iter().collect::<Vec<_>>();
        if segments.len() != 1 {
            panic!("First argument should be simple struct name (one segment)");
        }

        segments[0].ident.clone()
    } else {
        panic!("First argument not a Expr::Path!");
    };

    let charset = match &args[1] {
        Expr::Lit(charset_expr) => match &charset_expr.lit {
            Lit::Str(charset_str) => charset_str.value(),
            _ => panic!("Second argument not a string!"),
        },
        _ => panic!("Second argument not a Expr::Lit!"),
    };

    let pad = match &args[2] {
        Expr::Lit(pad_expr) => match &pad_expr.lit {
            Lit::Bool(pad_val) => pad_val.value(),
            _ => panic!("Third argument not a bool!"),
        },
        _ => panic!("Third argument not a Expr::Lit!"),
    };

    if !charset.is_ascii() {
        panic!("Charset must be ascii!");
    }

    let encode_map = charset.bytes().collect::<Vec<_>>();
    if encode_map.len() != 64 {
        panic!("Charset must have exactly 64 characters!");
    }

    if encode_map.iter().unique().count() != encode_map.len() {
        panic!("Characters cannot contain duplicates!");
    }

    let encode_map = encode_map
        .iter()
        .map(|&c| Literal::u8_suffixed(c))
        .collect::<Vec<_>>();

    let pad_token = match pad {
        true => quote! {
            output[out_ptr..].fill(b'=');
        },
        false => quote! {},
    };

    let encode_len_tokens = match pad {
        true => quote! {
            (n + 2) / 3 * 4
        },
        false => quote! {
            n / 3 * 4 + (n % 3 * 4 + 2) / 3
        },
    };

    quote! {
        pub struct #struct_name;
        impl #struct_name {
            const ENCODE_MAP: [u8; 64] = [
                #(#encode_map,)*
            ];

            /// Encodes `input` into `output`, returns written length
            /// (`None` if `output` is too small).
            pub fn encode_slice(input: &[u8], output: &mut [u8]) -> Option<usize> {
                let len = Self::encode_len(input.len());
                let output = output.get_mut(..len)?;

                let mut out_ptr = 0;
                for chunk in input.chunks(3) {
                    let mut bit_stack = 0u32;
                    for (i, byte) in chunk.iter().enumerate() {
                        bit_stack |= (*byte as u32) << (16 - 8 * i);
                    }

                    // n input bytes give n + 1 sextets
                    for i in 0..=chunk.len() {
                        let sextet = (bit_stack >> (18 - 6 * i)) & 0b111111;
                        output[out_ptr] = Self::ENCODE_MAP[sextet as usize];
                        out_ptr += 1;
                    }
                }

                #pad_token
                Some(len)
            }

            pub fn encode(input: &[u8]) -> ::alloc::string::String {
                let mut output = ::alloc::vec![0u8; Self::encode_len(input.len())];
                let _ = Self::encode_slice(input, &mut output);

                // every byte written comes from ENCODE_MAP (or '='), which is ascii
                output.into_iter().map(char::from).collect()
            }

            pub const fn encode_len(n: usize) -> usize {
                #encode_len_tokens
            }
        }
    }
    .to_token_stream()
    .into()
}
