// cull.rs - frustum, box, sphere and plane culling for camera and light passes

use bspvis_common::q_shared::{
    bounds_contain_point, bounds_intersect, box_on_plane_side, dot_product, vector_add,
    vector_ma, vector_scale, vector_subtract, CPlane, Vec3, SIDE_BACK, SIDE_CROSS, SIDE_FRONT,
};

use crate::config::{CullConfig, ShadowingMode};
use crate::frame::PerfCounters;
use crate::interactions::{LightKind, LightVolume};
use crate::registry::CubeSideBits;
use crate::world_types::{CullType, Shader, SurfaceGeometry};

pub const FRUSTUM_LEFT: usize = 0;
pub const FRUSTUM_RIGHT: usize = 1;
pub const FRUSTUM_BOTTOM: usize = 2;
pub const FRUSTUM_TOP: usize = 3;
pub const FRUSTUM_NEAR: usize = 4;
pub const FRUSTUM_FAR: usize = 5;
pub const FRUSTUM_PLANES: usize = 6;
pub const FRUSTUM_CLIPALL: u32 = (1 << FRUSTUM_PLANES) - 1;

/// Surfaces within this distance of their plane are never plane-culled.
pub const PLANE_CULL_EPSILON: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullResult {
    Out,
    In,
    Clip,
}

// ============================================================
// Frustum
// ============================================================

/// Inward-facing planes of a view volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [CPlane; FRUSTUM_PLANES],
}

/// Position and rotation of an entity; `axis` rows are its forward, left and
/// up vectors in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub origin: Vec3,
    pub axis: [Vec3; 3],
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            axis: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

impl Orientation {
    pub fn world_point_to_local(&self, p: &Vec3) -> Vec3 {
        let delta = vector_subtract(p, &self.origin);
        [
            dot_product(&delta, &self.axis[0]),
            dot_product(&delta, &self.axis[1]),
            dot_product(&delta, &self.axis[2]),
        ]
    }

    pub fn local_point_to_world(&self, p: &Vec3) -> Vec3 {
        let mut out = self.origin;
        for i in 0..3 {
            out = vector_ma(&out, p[i], &self.axis[i]);
        }
        out
    }
}

impl Frustum {
    /// Build a perspective frustum. `fov_x`/`fov_y` are full angles in degrees.
    pub fn from_view(
        origin: Vec3,
        axis: [Vec3; 3],
        fov_x: f32,
        fov_y: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let [forward, left, up] = axis;

        let ang = (fov_x * 0.5).to_radians();
        let (xs, xc) = ang.sin_cos();
        let left_normal = vector_ma(&vector_scale(&forward, xs), -xc, &left);
        let right_normal = vector_ma(&vector_scale(&forward, xs), xc, &left);

        let ang = (fov_y * 0.5).to_radians();
        let (ys, yc) = ang.sin_cos();
        let bottom_normal = vector_ma(&vector_scale(&forward, ys), yc, &up);
        let top_normal = vector_ma(&vector_scale(&forward, ys), -yc, &up);

        let through_origin = |normal: Vec3| CPlane::new(normal, dot_product(&origin, &normal));

        let near_point = vector_ma(&origin, z_near, &forward);
        let far_point = vector_ma(&origin, z_far, &forward);
        let back = vector_scale(&forward, -1.0);

        Self {
            planes: [
                through_origin(left_normal),
                through_origin(right_normal),
                through_origin(bottom_normal),
                through_origin(top_normal),
                CPlane::new(forward, dot_product(&near_point, &forward)),
                CPlane::new(back, dot_product(&far_point, &back)),
            ],
        }
    }

    /// Express the frustum in an entity's local space.
    pub fn to_local(&self, orientation: &Orientation) -> Self {
        let mut planes = self.planes;
        for plane in planes.iter_mut() {
            let normal = [
                dot_product(&plane.normal, &orientation.axis[0]),
                dot_product(&plane.normal, &orientation.axis[1]),
                dot_product(&plane.normal, &orientation.axis[2]),
            ];
            let dist = plane.dist - dot_product(&plane.normal, &orientation.origin);
            *plane = CPlane::new(normal, dist);
        }
        Self { planes }
    }

    pub fn cull_box(&self, mins: &Vec3, maxs: &Vec3) -> CullResult {
        cull_box(&self.planes, mins, maxs)
    }

    pub fn cull_point_and_radius(&self, origin: &Vec3, radius: f32) -> CullResult {
        cull_point_and_radius(&self.planes, origin, radius)
    }
}

// ============================================================
// Volume tests
// ============================================================

pub fn cull_box(planes: &[CPlane], mins: &Vec3, maxs: &Vec3) -> CullResult {
    let mut any_clip = false;
    for plane in planes {
        match box_on_plane_side(mins, maxs, plane) {
            SIDE_BACK => return CullResult::Out,
            SIDE_CROSS => any_clip = true,
            _ => {}
        }
    }
    if any_clip {
        CullResult::Clip
    } else {
        CullResult::In
    }
}

/// Box test against the planes whose bit is still set in `plane_bits`.
/// Planes the box is entirely in front of are cleared from the mask, so a
/// subtree never tests them again.
pub fn cull_box_masked(planes: &[CPlane], mins: &Vec3, maxs: &Vec3, plane_bits: &mut u32) -> CullResult {
    let mut any_clip = false;
    for (i, plane) in planes.iter().enumerate() {
        if *plane_bits & (1 << i) == 0 {
            continue;
        }
        match box_on_plane_side(mins, maxs, plane) {
            SIDE_BACK => return CullResult::Out,
            SIDE_FRONT => *plane_bits &= !(1 << i),
            _ => any_clip = true,
        }
    }
    if any_clip {
        CullResult::Clip
    } else {
        CullResult::In
    }
}

pub fn cull_point_and_radius(planes: &[CPlane], origin: &Vec3, radius: f32) -> CullResult {
    let mut might_be_clipped = false;
    for plane in planes {
        let dist = plane.distance(origin);
        if dist < -radius {
            return CullResult::Out;
        } else if dist <= radius {
            might_be_clipped = true;
        }
    }
    if might_be_clipped {
        CullResult::Clip
    } else {
        CullResult::In
    }
}

/// Oriented plane test with the rounding band. `d` is the signed distance of
/// the viewer (or light) from the surface plane.
#[inline]
pub fn plane_culls(cull_type: CullType, d: f32) -> bool {
    match cull_type {
        CullType::FrontSided => d < -PLANE_CULL_EPSILON,
        CullType::BackSided => d > PLANE_CULL_EPSILON,
        CullType::TwoSided => false,
    }
}

// ============================================================
// Camera surface cull
// ============================================================

/// What the camera cull reports about a surface it keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceVisibility {
    /// Viewer is on the front side of a planar surface.
    pub front_face: bool,
}

/// Frustum and eye position a surface is tested against, in the space the
/// surface geometry lives in.
#[derive(Debug, Clone, Copy)]
pub struct CullView<'a> {
    pub frustum: &'a Frustum,
    pub view_origin: Vec3,
}

/// Single-surface camera cull. `None` means the surface is rejected.
pub fn cull_surface(
    geometry: &SurfaceGeometry,
    shader: &Shader,
    view: &CullView<'_>,
    config: &CullConfig,
    pc: &mut PerfCounters,
) -> Option<SurfaceVisibility> {
    let mut visibility = SurfaceVisibility::default();

    if config.no_cull {
        return Some(visibility);
    }

    if config.no_curves && matches!(geometry, SurfaceGeometry::Grid(_)) {
        return None;
    }

    let generic = geometry.generic()?;

    if let SurfaceGeometry::Face { plane, .. } = geometry {
        if config.face_plane_cull {
            let d = dot_product(&view.view_origin, &plane.normal) - plane.dist;
            if d > 0.0 {
                visibility.front_face = true;
            }
            if plane_culls(shader.cull_type, d) {
                pc.c_plane_cull_out += 1;
                return None;
            }
            pc.c_plane_cull_in += 1;
        }
    }

    if let SurfaceGeometry::VboMesh(_) = geometry {
        if view.frustum.cull_box(&generic.bounds[0], &generic.bounds[1]) == CullResult::Out {
            pc.c_box_cull_out += 1;
            return None;
        }
        pc.c_box_cull_in += 1;
    } else {
        if view.frustum.cull_point_and_radius(&generic.origin, generic.radius) == CullResult::Out {
            pc.c_sphere_cull_out += 1;
            return None;
        }
        pc.c_sphere_cull_in += 1;
    }

    Some(visibility)
}

// ============================================================
// Light surface cull
// ============================================================

/// Box test against a light's own frustum planes.
pub fn cull_light_world_bounds(light: &LightVolume, mins: &Vec3, maxs: &Vec3) -> CullResult {
    cull_box(&light.frustum, mins, maxs)
}

/// Single-surface light cull. Returns the cube faces the surface can appear
/// in, or `None` when the light cannot touch it.
pub fn cull_light_surface(
    geometry: &SurfaceGeometry,
    shader: &Shader,
    light: &LightVolume,
    config: &CullConfig,
) -> Option<CubeSideBits> {
    if config.no_cull {
        return Some(CubeSideBits::CLIPALL);
    }

    if config.no_curves && matches!(geometry, SurfaceGeometry::Grid(_)) {
        return None;
    }

    let generic = geometry.generic()?;
    let [mins, maxs] = &generic.bounds;

    let [light_mins, light_maxs] = &light.world_bounds;
    if !bounds_intersect(light_mins, light_maxs, mins, maxs) {
        return None;
    }

    if !config.no_light_frustums && cull_light_world_bounds(light, mins, maxs) == CullResult::Out {
        return None;
    }

    if let SurfaceGeometry::Face { plane, .. } = geometry {
        if config.face_plane_cull {
            let d = match light.kind {
                LightKind::Directional => dot_product(&light.direction, &plane.normal),
                LightKind::Omni | LightKind::Projected => {
                    dot_product(&light.origin, &plane.normal) - plane.dist
                }
            };
            if plane_culls(shader.cull_type, d) {
                return None;
            }
        }
    }

    if config.cull_shadow_pyramid_faces {
        Some(calc_light_cube_side_bits(light, mins, maxs, config.shadowing))
    } else {
        Some(CubeSideBits::CLIPALL)
    }
}

const CUBE_SIDES: [(Vec3, Vec3, Vec3, CubeSideBits); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], CubeSideBits::POS_X),
    ([-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], CubeSideBits::NEG_X),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], CubeSideBits::POS_Y),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], CubeSideBits::NEG_Y),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], CubeSideBits::POS_Z),
    ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], CubeSideBits::NEG_Z),
];

/// Cube shadow faces whose 90 degree pyramid the box reaches.
pub fn calc_light_cube_side_bits(
    light: &LightVolume,
    mins: &Vec3,
    maxs: &Vec3,
    shadowing: ShadowingMode,
) -> CubeSideBits {
    if light.kind != LightKind::Omni || shadowing == ShadowingMode::Blob || light.no_shadows {
        return CubeSideBits::CLIPALL;
    }

    if bounds_contain_point(mins, maxs, &light.origin) {
        return CubeSideBits::CLIPALL;
    }

    let mut bits = CubeSideBits::empty();
    for (forward, u, v, side) in CUBE_SIDES.iter() {
        let planes = [
            vector_add(forward, u),
            vector_subtract(forward, u),
            vector_add(forward, v),
            vector_subtract(forward, v),
        ]
        .map(|n| {
            let normal = vector_scale(&n, std::f32::consts::FRAC_1_SQRT_2);
            CPlane::new(normal, dot_product(&light.origin, &normal))
        });
        if cull_box(&planes, mins, maxs) != CullResult::Out {
            bits |= *side;
        }
    }
    bits
}

// ============================================================
// Tests
// ============================================================
