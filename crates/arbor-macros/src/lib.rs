//! Proc macros for Arbor.
//!
//! # Available Macros
//!
//! - [`Flags`] - Generate the flag declaration of a command struct
//!
//! The generated code refers to the `arbor` crate by absolute path, so these
//! macros are meant to be used through arbor's re-exports.

mod flags;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `arbor::Flags` from `#[flag]` field attributes.
///
/// Only fields carrying `#[flag]` become flags. Each one borrows its field,
/// so the value the instance holds before parsing is the flag's default.
///
/// # Attribute Forms
///
/// | Form | Meaning |
/// |------|---------|
/// | `#[flag]` | name derived from the field, no usage text |
/// | `#[flag("usage")]` | name derived from the field |
/// | `#[flag("n,usage")]` | explicit name `n` |
/// | `#[flag(name = "n", usage = "...")]` | explicit parts, no comma splitting |
/// | `#[flag(hidden, ...)]` | left out of help and completion |
/// | `#[flag(value, ...)]` | field implements `arbor::Value` instead of `arbor::Bind` |
/// | `#[flag(flatten)]` | field implements `arbor::Flags`; its flags are merged |
///
/// Derived names split the identifier at case and digit boundaries and join
/// the words with `-`: `dry_run` becomes `dry-run`, `HTTPServer` becomes
/// `http-server`.
///
/// # Example
///
/// ```ignore
/// use arbor::Flags;
///
/// #[derive(Default, Flags)]
/// struct Serve {
///     #[flag("Listen on {addr}")]
///     listen: String,
///     #[flag("v,Verbose logging")]
///     verbose: bool,
///     #[flag("Stop after {duration}")]
///     timeout: Option<std::time::Duration>,
///     #[flag(flatten)]
///     common: Common,
///     cache: Vec<u8>, // not a flag
/// }
/// ```
///
/// # Compile-Time Errors
///
/// - the type is not a struct with named fields
/// - an explicit flag name is empty, starts with `-` or contains characters
///   other than ASCII letters, digits, `_` and `-`
/// - unknown attribute arguments, or more than one `#[flag]` on a field
/// - a field type with no `Bind` (or `Value`) implementation
#[proc_macro_derive(Flags, attributes(flag))]
pub fn flags_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    flags::flags_derive_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
