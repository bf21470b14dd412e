//! Integration tests for the `InstanceLayout` derive macro.
//!
//! These tests verify that `#[derive(InstanceLayout)]` generates correct
//! attribute tables and WGSL structs by using the derived implementations
//! from outside the crate.

use pfx::bytemuck::{Pod, Zeroable};
use pfx::{AttributeFormat, BillboardInstance, GeometryInstance, InstanceLayout, TrailVertex};

// ============================================================================
// Scalar and vector fields
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, InstanceLayout)]
struct Spark {
    position: [f32; 3],
    age: f32,
    tint: [f32; 4],
    uv: [f32; 2],
    kind: u32,
    offset: i32,
}

#[test]
fn test_scalar_and_vector_formats() {
    let formats: Vec<_> = Spark::ATTRIBUTES.iter().map(|a| a.format).collect();
    assert_eq!(
        formats,
        vec![
            AttributeFormat::Float32x3,
            AttributeFormat::Float32,
            AttributeFormat::Float32x4,
            AttributeFormat::Float32x2,
            AttributeFormat::Uint32,
            AttributeFormat::Sint32,
        ]
    );
}

#[test]
fn test_offsets_follow_repr_c() {
    let offsets: Vec<_> = Spark::ATTRIBUTES.iter().map(|a| a.offset).collect();
    assert_eq!(offsets, vec![0, 12, 16, 32, 40, 44]);
    assert_eq!(Spark::STRIDE, 48);
}

#[test]
fn test_locations_start_at_zero() {
    let locations: Vec<_> = Spark::ATTRIBUTES.iter().map(|a| a.location).collect();
    assert_eq!(locations, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_wgsl_struct() {
    let wgsl = Spark::WGSL_STRUCT;
    assert!(wgsl.starts_with("struct Spark {"));
    assert!(wgsl.contains("@location(0) position: vec3<f32>,"));
    assert!(wgsl.contains("@location(1) age: f32,"));
    assert!(wgsl.contains("@location(2) tint: vec4<f32>,"));
    assert!(wgsl.contains("@location(3) uv: vec2<f32>,"));
    assert!(wgsl.contains("@location(4) kind: u32,"));
    assert!(wgsl.contains("@location(5) offset: i32,"));
    assert!(wgsl.trim_end().ends_with("};"));
}

// ============================================================================
// Matrices, base location and skipped fields
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, InstanceLayout)]
#[instance(location = 3)]
struct Oriented {
    transform: [[f32; 4]; 4],
    scale: f32,
    #[instance(skip)]
    _pad: [u32; 3],
}

#[test]
fn test_matrix_splits_into_columns() {
    let attrs = Oriented::ATTRIBUTES;
    assert_eq!(attrs.len(), 5);
    for (column, attr) in attrs.iter().take(4).enumerate() {
        assert_eq!(attr.name, format!("transform_{column}"));
        assert_eq!(attr.format, AttributeFormat::Float32x4);
        assert_eq!(attr.offset, column as u64 * 16);
    }
    assert_eq!(attrs[4].name, "scale");
    assert_eq!(attrs[4].offset, 64);
}

#[test]
fn test_base_location_attribute() {
    let locations: Vec<_> = Oriented::ATTRIBUTES.iter().map(|a| a.location).collect();
    assert_eq!(locations, vec![3, 4, 5, 6, 7]);
    assert!(Oriented::WGSL_STRUCT.contains("@location(3) transform_0: vec4<f32>,"));
}

#[test]
fn test_skipped_field_keeps_stride() {
    assert!(Oriented::ATTRIBUTES.iter().all(|a| a.name != "_pad"));
    assert!(!Oriented::WGSL_STRUCT.contains("_pad"));
    assert_eq!(Oriented::STRIDE, 80);
}

// ============================================================================
// Built-in records
// ============================================================================

#[test]
fn test_builtin_strides() {
    assert_eq!(BillboardInstance::STRIDE, 32);
    assert_eq!(GeometryInstance::STRIDE, 112);
    assert_eq!(TrailVertex::STRIDE, 32);
}

#[test]
fn test_geometry_instance_leaves_room_for_mesh() {
    let first = GeometryInstance::ATTRIBUTES[0];
    assert_eq!(first.name, "model_0");
    assert_eq!(first.location, 2);
    let last = GeometryInstance::ATTRIBUTES.last().unwrap();
    assert_eq!(last.name, "material");
    assert_eq!(last.format, AttributeFormat::Uint32);
}

#[test]
fn test_attribute_offsets_fit_in_stride() {
    for attrs in [
        (BillboardInstance::ATTRIBUTES, BillboardInstance::STRIDE),
        (GeometryInstance::ATTRIBUTES, GeometryInstance::STRIDE),
        (TrailVertex::ATTRIBUTES, TrailVertex::STRIDE),
    ] {
        for attr in attrs.0 {
            assert!(attr.offset < attrs.1, "{} at {}", attr.name, attr.offset);
        }
    }
}
