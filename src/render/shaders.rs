//! WGSL sources for the wgpu adapter.
//!
//! A material is a WGSL snippet that defines
//!
//! ```wgsl
//! fn shade(input: ShadeInput) -> vec4<f32>
//! ```
//!
//! and may call `point_lighting(position, normal)`. [`compose`] prepends the
//! per-kind prelude (bindings, vertex stage and `fs_main`) to it, producing
//! one module per material and particle kind.

use crate::particle::{BillboardInstance, GeometryInstance, ParticleKind, MAX_LIGHTS, TRAIL_COUNT};
use crate::InstanceLayout;

/// Vertices per trail instance: two triangles for each of the
/// `TRAIL_COUNT - 3` interior segments.
pub const TRAIL_VERTICES: u32 = (TRAIL_COUNT as u32 - 3) * 6;

/// Byte offset of the light array inside the light uniform block.
pub const LIGHT_HEADER_SIZE: u64 = 16;

/// Declarations shared by every kind.
const COMMON: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    camera_position: vec3<f32>,
    debug: u32,
    camera_right: vec3<f32>,
    _pad0: f32,
    camera_up: vec3<f32>,
    _pad1: f32,
};

struct Light {
    position: vec3<f32>,
    range: f32,
    color: vec3<f32>,
    intensity: f32,
};

struct LightBlock {
    count: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
    lights: array<Light, MAX_LIGHTS>,
};

struct ShadeInput {
    world_position: vec3<f32>,
    normal: vec3<f32>,
    uv: vec2<f32>,
    color: vec4<f32>,
    age_factor: f32,
    material: u32,
};

@group(0) @binding(0)
var<uniform> frame: Frame;

@group(0) @binding(1)
var<uniform> light_block: LightBlock;

fn point_lighting(position: vec3<f32>, normal: vec3<f32>) -> vec3<f32> {
    var total = vec3<f32>(0.0);
    let count = min(light_block.count, MAX_LIGHTSu);
    for (var i = 0u; i < count; i = i + 1u) {
        let lamp = light_block.lights[i];
        let to_lamp = lamp.position - position;
        let dist = length(to_lamp);
        if (dist >= lamp.range) {
            continue;
        }
        let falloff = 1.0 - dist / lamp.range;
        let lambert = max(dot(normal, to_lamp / max(dist, 0.0001)), 0.0);
        total = total + lamp.color * lamp.intensity * falloff * falloff * lambert;
    }
    return total;
}

// Stable per-material hue for debug views.
fn debug_color(material: u32) -> vec4<f32> {
    let hue = fract(f32(material) * 0.618034);
    let r = abs(hue * 6.0 - 3.0) - 1.0;
    let g = 2.0 - abs(hue * 6.0 - 2.0);
    let b = 2.0 - abs(hue * 6.0 - 4.0);
    return vec4<f32>(clamp(vec3<f32>(r, g, b), vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
"#;

const BILLBOARD: &str = r#"
struct BillboardOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) age_factor: f32,
    @location(3) @interpolate(flat) material: u32,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32, inst: BillboardInstance) -> BillboardOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );
    let corner = corners[vertex_index];
    let offset = frame.camera_right * corner.x * inst.size.x + frame.camera_up * corner.y * inst.size.y;
    let world = inst.position + offset * 0.5;

    var out: BillboardOut;
    out.clip_position = frame.view_proj * vec4<f32>(world, 1.0);
    out.world_position = world;
    out.uv = corner * 0.5 + vec2<f32>(0.5);
    out.age_factor = inst.age_factor;
    out.material = inst.material;
    return out;
}

@fragment
fn fs_main(in: BillboardOut) -> @location(0) vec4<f32> {
    if (frame.debug != 0u) {
        return debug_color(in.material);
    }
    var input: ShadeInput;
    input.world_position = in.world_position;
    input.normal = normalize(frame.camera_position - in.world_position);
    input.uv = in.uv;
    input.color = vec4<f32>(1.0);
    input.age_factor = in.age_factor;
    input.material = in.material;
    return shade(input);
}
"#;

const GEOMETRY: &str = r#"
struct MeshVertex {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct GeometryOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) age_factor: f32,
    @location(4) @interpolate(flat) material: u32,
    @location(5) uv: vec2<f32>,
};

@vertex
fn vs_main(vert: MeshVertex, inst: GeometryInstance) -> GeometryOut {
    let model = mat4x4<f32>(inst.model_0, inst.model_1, inst.model_2, inst.model_3);
    let phase = dot(vert.position, vec3<f32>(inst.noise_scale))
        + inst.age_factor * (inst.deform_speed + inst.noise_speed);
    let local = vert.position * (1.0 + inst.deform * sin(phase));
    let world = model * vec4<f32>(local, 1.0);

    var out: GeometryOut;
    out.clip_position = frame.view_proj * world;
    out.world_position = world.xyz;
    out.normal = normalize((model * vec4<f32>(vert.normal, 0.0)).xyz);
    out.color = inst.color;
    out.age_factor = inst.age_factor;
    out.material = inst.material;
    out.uv = vert.position.xy * 0.5 + vec2<f32>(0.5);
    return out;
}

@fragment
fn fs_main(in: GeometryOut) -> @location(0) vec4<f32> {
    if (frame.debug != 0u) {
        return debug_color(in.material);
    }
    var input: ShadeInput;
    input.world_position = in.world_position;
    input.normal = normalize(in.normal);
    input.uv = in.uv;
    input.color = in.color;
    input.age_factor = in.age_factor;
    input.material = in.material;
    return shade(input);
}
"#;

const TRAIL: &str = r#"
struct TrailPoint {
    position: vec3<f32>,
    size: f32,
    age_factor: f32,
    material: u32,
    _pad0: u32,
    _pad1: u32,
};

@group(1) @binding(0)
var<storage, read> trail_points: array<TrailPoint>;

struct TrailOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) age_factor: f32,
    @location(3) @interpolate(flat) material: u32,
};

// Segment s joins points s and s + 1 for s in 1..=TRAIL_COUNT-3. Points 0 and
// TRAIL_COUNT-1 are duplicates that only provide tangents.
@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @builtin(instance_index) trail: u32,
) -> TrailOut {
    var ends = array<u32, 6>(0u, 1u, 0u, 0u, 1u, 1u);
    var sides = array<f32, 6>(-1.0, -1.0, 1.0, 1.0, -1.0, 1.0);
    let segment = vertex_index / 6u + 1u;
    let corner = vertex_index % 6u;
    let point_index = segment + ends[corner];
    let base = trail * TRAIL_COUNTu;

    let pt = trail_points[base + point_index];
    let prev = trail_points[base + point_index - 1u].position;
    let next = trail_points[base + point_index + 1u].position;
    var side = cross(next - prev, frame.camera_position - pt.position);
    if (length(side) < 0.000001) {
        side = frame.camera_right;
    } else {
        side = normalize(side);
    }
    let world = pt.position + side * sides[corner] * pt.size * 0.5;

    var out: TrailOut;
    out.clip_position = frame.view_proj * vec4<f32>(world, 1.0);
    out.world_position = world;
    out.uv = vec2<f32>(f32(point_index) / f32(TRAIL_COUNTu - 1u), sides[corner] * 0.5 + 0.5);
    out.age_factor = pt.age_factor;
    out.material = pt.material;
    return out;
}

@fragment
fn fs_main(in: TrailOut) -> @location(0) vec4<f32> {
    if (frame.debug != 0u) {
        return debug_color(in.material);
    }
    var input: ShadeInput;
    input.world_position = in.world_position;
    input.normal = normalize(frame.camera_position - in.world_position);
    input.uv = in.uv;
    input.color = vec4<f32>(1.0);
    input.age_factor = in.age_factor;
    input.material = in.material;
    return shade(input);
}
"#;

/// Material used by the demo library and when no shader file is given.
pub const DEFAULT_MATERIAL: &str = r#"
fn shade(input: ShadeInput) -> vec4<f32> {
    let lit = input.color.rgb * (vec3<f32>(0.3) + point_lighting(input.world_position, input.normal));
    return vec4<f32>(lit, input.color.a * (1.0 - input.age_factor));
}
"#;

/// Prelude for `kind`, with its instance struct and constants filled in.
pub fn prelude(kind: ParticleKind) -> String {
    let body = match kind {
        ParticleKind::Billboard => format!("{}{}", BillboardInstance::WGSL_STRUCT, BILLBOARD),
        ParticleKind::Geometry => format!("{}{}", GeometryInstance::WGSL_STRUCT, GEOMETRY),
        ParticleKind::Trail => TRAIL.to_string(),
    };
    format!("{}{}", COMMON, body)
        .replace("MAX_LIGHTS", &MAX_LIGHTS.to_string())
        .replace("TRAIL_COUNT", &TRAIL_COUNT.to_string())
}

/// Full module source of `material` drawn as `kind`.
pub fn compose(kind: ParticleKind, material: &str) -> String {
    format!("{}\n// ---- material ----\n{}", prelude(kind), material)
}

/// Parse and validate a composed module, returning a readable error.
#[cfg(feature = "wgpu")]
pub fn validate(source: &str) -> Result<(), String> {
    use naga::valid::{Capabilities, ValidationFlags, Validator};

    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| format!("{:?}", e.into_inner()))?;
    Ok(())
}
