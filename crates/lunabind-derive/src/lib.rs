// lunabind-derive: derive macro for struct type descriptors
//
// Provides:
// - #[derive(Describe)] - builds a struct descriptor from the named fields
//
// Example:
// ```
// use lunabind_engine::Describe;
// use serde::Deserialize;
//
// #[derive(Deserialize, Describe)]
// struct Point {
//     x: i32,
//     #[serde(rename = "Y")]
//     y: i32,
// }
// ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod describe;

/// Derives `lunabind_engine::Describe` for a struct with named fields.
///
/// The generated descriptor names each field the way serde sees it:
/// - `#[serde(rename = "...")]` on a field renames it
/// - `#[serde(rename_all = "...")]` on the struct applies a case convention
/// - `#[serde(skip)]` and `#[serde(skip_deserializing)]` leave a field out
/// - `#[serde(rename = "...")]` on the struct changes the name shown in errors
///
/// Every field type must implement `Describe`; generic parameters get a
/// `Describe + 'static` bound.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Describe)]
/// #[serde(rename_all = "camelCase")]
/// struct Config {
///     max_depth: u32,
///     names: Vec<String>,
/// }
/// ```
///
/// This describes `Config` as a struct with fields `maxDepth: u32` and
/// `names: [String]`.
#[proc_macro_derive(Describe, attributes(serde))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    describe::expand_describe(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
