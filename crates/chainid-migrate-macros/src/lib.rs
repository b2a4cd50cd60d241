//! Proc macros for `chainid-migrate`.
//!
//! - **`#[migration_step]`**: attribute macro that wraps a transform function
//!   into a `MigrationStep` implementation.

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, punctuated::Punctuated, token::Comma, Expr, ExprLit, ItemFn, Lit, LitStr,
    Meta,
};

/// Attribute macro that wraps a transform function into a `MigrationStep`.
///
/// The function receives the step's write transaction and returns
/// `Result<(), MigrationError>`.
///
/// # Attributes
///
/// - `from = N`: **Required.** Source schema version. The step targets `N + 1`.
/// - `buckets = ["a", "b"]`: **Required.** Buckets the step may touch.
/// - `name = "..."`: Optional. Defaults to the function name.
///
/// # Generated Code
///
/// Creates a unit struct `{FnName}Step` that implements `MigrationStep`, and
/// a `register_{fn_name}` function returning it boxed, ready for
/// `MigrationPlanBuilder::boxed`.
///
/// # Example
///
/// ```ignore
/// use chainid_migrate::{migration_step, records, MigrationError};
/// use chainid_migrate::chainid_store::WriteTx;
///
/// #[migration_step(from = 8, buckets = ["endpoints"])]
/// fn endpoint_groups(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
///     records::rewrite_all(tx, "endpoints", |e: &mut Endpoint| {
///         e.group_id = 1;
///         Ok(())
///     })?;
///     Ok(())
/// }
/// // Generates: EndpointGroupsStep struct + impl MigrationStep
/// // Generates: fn register_endpoint_groups() -> Box<dyn MigrationStep>
/// ```
#[proc_macro_attribute]
pub fn migration_step(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    let args = parse_macro_input!(attr with Punctuated::<Meta, Comma>::parse_terminated);

    let mut from_version: Option<u32> = None;
    let mut buckets: Option<Vec<LitStr>> = None;
    let mut name: Option<LitStr> = None;

    for meta in &args {
        let Meta::NameValue(nv) = meta else {
            return syn::Error::new_spanned(meta, "expected `key = value`")
                .to_compile_error()
                .into();
        };
        let key = nv
            .path
            .get_ident()
            .map(|i| i.to_string())
            .unwrap_or_default();
        match key.as_str() {
            "from" => {
                if let Expr::Lit(ExprLit {
                    lit: Lit::Int(lit), ..
                }) = &nv.value
                {
                    from_version = lit.base10_parse().ok();
                }
            }
            "name" => {
                if let Expr::Lit(ExprLit {
                    lit: Lit::Str(lit), ..
                }) = &nv.value
                {
                    name = Some(lit.clone());
                }
            }
            "buckets" => {
                let Expr::Array(array) = &nv.value else {
                    return syn::Error::new_spanned(
                        &nv.value,
                        "`buckets` must be an array of string literals",
                    )
                    .to_compile_error()
                    .into();
                };
                let mut names = Vec::new();
                for elem in &array.elems {
                    match elem {
                        Expr::Lit(ExprLit {
                            lit: Lit::Str(lit), ..
                        }) => names.push(lit.clone()),
                        other => {
                            return syn::Error::new_spanned(other, "expected a bucket name")
                                .to_compile_error()
                                .into();
                        }
                    }
                }
                buckets = Some(names);
            }
            _ => {
                return syn::Error::new_spanned(&nv.path, format!("unknown attribute `{key}`"))
                    .to_compile_error()
                    .into();
            }
        }
    }

    let from_ver = match from_version {
        Some(v) => v,
        None => {
            return syn::Error::new(
                proc_macro2::Span::call_site(),
                "missing required attribute `from`",
            )
            .to_compile_error()
            .into();
        }
    };

    let buckets = match buckets {
        Some(b) => b,
        None => {
            return syn::Error::new(
                proc_macro2::Span::call_site(),
                "missing required attribute `buckets`",
            )
            .to_compile_error()
            .into();
        }
    };

    if input.sig.inputs.len() != 1 {
        return syn::Error::new_spanned(
            &input.sig,
            "migration step function must take exactly one argument: the write transaction",
        )
        .to_compile_error()
        .into();
    }

    let fn_name = &input.sig.ident;
    let vis = &input.vis;
    let step_name = name.unwrap_or_else(|| LitStr::new(&fn_name.to_string(), fn_name.span()));

    // snake_case -> PascalCase + "Step"
    let struct_name = {
        let pascal: String = fn_name
            .to_string()
            .split('_')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect();
        syn::Ident::new(&format!("{pascal}Step"), fn_name.span())
    };

    let register_fn = syn::Ident::new(&format!("register_{fn_name}"), fn_name.span());

    let expanded = quote! {
        #input

        /// Migration step generated by `#[migration_step]`.
        #vis struct #struct_name;

        impl ::chainid_migrate::MigrationStep for #struct_name {
            fn source_version(&self) -> u32 {
                #from_ver
            }

            fn name(&self) -> &'static str {
                #step_name
            }

            fn buckets(&self) -> &'static [&'static str] {
                &[#(#buckets),*]
            }

            fn apply(
                &self,
                tx: &mut dyn ::chainid_migrate::chainid_store::WriteTx,
            ) -> ::core::result::Result<(), ::chainid_migrate::MigrationError> {
                #fn_name(tx)
            }
        }

        /// Boxed instance of this step, for `MigrationPlanBuilder::boxed`.
        #vis fn #register_fn() -> ::std::boxed::Box<dyn ::chainid_migrate::MigrationStep> {
            ::std::boxed::Box::new(#struct_name)
        }
    };

    expanded.into()
}
