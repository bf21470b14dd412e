//! Derive macros for the pfx particle effect engine.
//!
//! This crate provides one derive macro:
//!
//! - [`InstanceLayout`] - Describes a `#[repr(C)]` instance record to the GPU
//!
//! # Usage
//!
//! The macro is re-exported from the main `pfx` crate. You don't need to add
//! this crate directly:
//!
//! ```ignore
//! use pfx::prelude::*;
//!
//! #[repr(C)]
//! #[derive(Clone, Copy, Pod, Zeroable, InstanceLayout)]
//! #[instance(location = 2)]
//! struct Spark {
//!     position: [f32; 3],
//!     age: f32,
//! }
//! ```
//!
//! # What Gets Generated
//!
//! For every field (in declaration order) the macro emits one vertex
//! attribute with its WGSL type, byte offset and shader location. Matrices
//! (`[[f32; 4]; 4]`) are split into four `vec4<f32>` column attributes named
//! `{field}_0` .. `{field}_3`, because vertex inputs cannot be matrices.
//!
//! Offsets come from `core::mem::offset_of!`, so the Rust compiler stays the
//! single source of truth for the layout. Fields marked `#[instance(skip)]`
//! keep their bytes in the record but are not exposed to shaders.
//!
//! ## Supported Field Types
//!
//! | Rust Type | WGSL Type | Attribute Format |
//! |-----------|-----------|------------------|
//! | `f32` | `f32` | `Float32` |
//! | `u32` | `u32` | `Uint32` |
//! | `i32` | `i32` | `Sint32` |
//! | `[f32; 2]` | `vec2<f32>` | `Float32x2` |
//! | `[f32; 3]` | `vec3<f32>` | `Float32x3` |
//! | `[f32; 4]` | `vec4<f32>` | `Float32x4` |
//! | `[[f32; 4]; 4]` | 4 x `vec4<f32>` | 4 x `Float32x4` |

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, LitInt, Type};

/// Derive macro for GPU instance records.
///
/// Implements `pfx::InstanceLayout` for a `#[repr(C)]` struct whose fields
/// are plain 32-bit scalars, float arrays or a column-major 4x4 matrix.
///
/// # Attributes
///
/// - `#[instance(location = N)]` on the struct - first shader location used
///   by the record (default 0). Per-vertex mesh attributes usually take the
///   low locations, so instance records start after them.
/// - `#[instance(skip)]` on a field - padding or CPU-only data that must not
///   become a vertex attribute.
///
/// # Example
///
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy, Pod, Zeroable, InstanceLayout)]
/// #[instance(location = 2)]
/// struct GeometryInstance {
///     model: [[f32; 4]; 4],   // locations 2..=5
///     color: [f32; 4],        // location 6
///     age_factor: f32,        // location 7
/// }
///
/// assert_eq!(GeometryInstance::ATTRIBUTES.len(), 6);
/// ```
///
/// # Panics
///
/// The macro panics at compile time if:
/// - Applied to an enum, union or tuple struct
/// - Any exposed field has an unsupported type
#[proc_macro_derive(InstanceLayout, attributes(instance))]
pub fn derive_instance_layout(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let name_str = name.to_string();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => panic!("InstanceLayout derive only supports structs with named fields"),
        },
        _ => panic!("InstanceLayout derive only supports structs"),
    };

    let mut location = match base_location(&input) {
        Ok(location) => location,
        Err(err) => return err.to_compile_error().into(),
    };

    let mut attributes = Vec::new();
    let mut wgsl_fields = Vec::new();

    for field in fields.iter() {
        match is_skipped(field) {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => return err.to_compile_error().into(),
        }

        let field_name = field.ident.as_ref().unwrap();
        let field_name_str = field_name.to_string();
        let info = field_info(&field.ty);

        if info.columns == 0 {
            let format = &info.format;
            let wgsl_type = info.wgsl_type;
            wgsl_fields.push(format!(
                "    @location({}) {}: {},",
                location, field_name_str, wgsl_type
            ));
            attributes.push(quote! {
                ::pfx::InstanceAttribute {
                    name: #field_name_str,
                    format: ::pfx::AttributeFormat::#format,
                    offset: ::core::mem::offset_of!(#name, #field_name) as u64,
                    location: #location,
                }
            });
            location += 1;
        } else {
            for column in 0..info.columns {
                let column_name = format!("{}_{}", field_name_str, column);
                let column_offset = (column * 16) as u64;
                wgsl_fields.push(format!(
                    "    @location({}) {}: vec4<f32>,",
                    location, column_name
                ));
                attributes.push(quote! {
                    ::pfx::InstanceAttribute {
                        name: #column_name,
                        format: ::pfx::AttributeFormat::Float32x4,
                        offset: ::core::mem::offset_of!(#name, #field_name) as u64 + #column_offset,
                        location: #location,
                    }
                });
                location += 1;
            }
        }
    }

    let wgsl_struct = format!("struct {} {{\n{}\n}};\n", name_str, wgsl_fields.join("\n"));

    let expanded = quote! {
        impl ::pfx::InstanceLayout for #name {
            const WGSL_STRUCT: &'static str = #wgsl_struct;
            const ATTRIBUTES: &'static [::pfx::InstanceAttribute] = &[
                #(#attributes),*
            ];
        }
    };

    TokenStream::from(expanded)
}

/// Read `#[instance(location = N)]` from the struct attributes.
fn base_location(input: &DeriveInput) -> syn::Result<u32> {
    let mut location = 0u32;
    for attr in &input.attrs {
        if !attr.path().is_ident("instance") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("location") {
                let lit: LitInt = meta.value()?.parse()?;
                location = lit.base10_parse()?;
                Ok(())
            } else {
                Err(meta.error("expected `location = N`"))
            }
        })?;
    }
    Ok(location)
}

/// Whether a field carries `#[instance(skip)]`.
fn is_skipped(field: &Field) -> syn::Result<bool> {
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("instance") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

/// Attribute metadata for a field type.
struct FieldInfo {
    /// Variant name of `pfx::AttributeFormat`.
    format: proc_macro2::Ident,
    /// WGSL type name (e.g., "vec3<f32>")
    wgsl_type: &'static str,
    /// Number of vec4 columns for matrices, 0 for everything else.
    columns: u32,
}

/// Map a Rust field type to its vertex attribute format.
fn field_info(ty: &Type) -> FieldInfo {
    let type_str = quote!(#ty).to_string().replace(' ', "");
    let info = |format: &str, wgsl_type: &'static str, columns: u32| FieldInfo {
        format: proc_macro2::Ident::new(format, proc_macro2::Span::call_site()),
        wgsl_type,
        columns,
    };

    match type_str.as_str() {
        "f32" => info("Float32", "f32", 0),
        "u32" => info("Uint32", "u32", 0),
        "i32" => info("Sint32", "i32", 0),
        "[f32;2]" => info("Float32x2", "vec2<f32>", 0),
        "[f32;3]" => info("Float32x3", "vec3<f32>", 0),
        "[f32;4]" => info("Float32x4", "vec4<f32>", 0),
        "[[f32;4];4]" => info("Float32x4", "vec4<f32>", 4),
        _ => panic!("Unsupported type in InstanceLayout struct: {}", type_str),
    }
}
