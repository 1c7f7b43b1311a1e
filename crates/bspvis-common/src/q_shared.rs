// q_shared.rs - vector math, planes and bounds shared by the visibility code

pub type Vec3 = [f32; 3];

// ============================================================
// Contents
// ============================================================

/// Leaf contents value for solid space. Solid leaves are never visible.
pub const CONTENTS_SOLID: i32 = 1;

/// Contents value carried by internal nodes, to tell them apart from leafs.
pub const CONTENTS_NODE: i32 = -1;

// ============================================================
// Plane
// ============================================================

pub const PLANE_X: u8 = 0;
pub const PLANE_Y: u8 = 1;
pub const PLANE_Z: u8 = 2;
pub const PLANE_NON_AXIAL: u8 = 3;

/// Result bits of [`box_on_plane_side`].
pub const SIDE_FRONT: i32 = 1;
pub const SIDE_BACK: i32 = 2;
pub const SIDE_CROSS: i32 = SIDE_FRONT | SIDE_BACK;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: u8,
    pub signbits: u8,
}

impl Default for CPlane {
    fn default() -> Self {
        Self {
            normal: [0.0; 3],
            dist: 0.0,
            plane_type: PLANE_NON_AXIAL,
            signbits: 0,
        }
    }
}

impl CPlane {
    /// Build a plane and classify it (axial type and sign bits).
    pub fn new(normal: Vec3, dist: f32) -> Self {
        let mut plane = Self {
            normal,
            dist,
            plane_type: plane_type_for_normal(&normal),
            signbits: 0,
        };
        plane.signbits = signbits_for_plane(&plane);
        plane
    }

    /// Signed distance from `p` to the plane.
    #[inline]
    pub fn distance(&self, p: &Vec3) -> f32 {
        if (self.plane_type as usize) < 3 {
            p[self.plane_type as usize] - self.dist
        } else {
            dot_product(p, &self.normal) - self.dist
        }
    }
}

pub fn plane_type_for_normal(normal: &Vec3) -> u8 {
    if normal[0] == 1.0 {
        PLANE_X
    } else if normal[1] == 1.0 {
        PLANE_Y
    } else if normal[2] == 1.0 {
        PLANE_Z
    } else {
        PLANE_NON_AXIAL
    }
}

pub fn signbits_for_plane(out: &CPlane) -> u8 {
    let mut bits = 0u8;
    for j in 0..3 {
        if out.normal[j] < 0.0 {
            bits |= 1 << j;
        }
    }
    bits
}

// ============================================================
// MATHLIB - Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

/// veca + scale * vecb
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

pub fn vector_length(v: &Vec3) -> f32 {
    dot_product(v, v).sqrt()
}

// ============================================================
// Bounds
// ============================================================

/// Inverted bounds, ready to grow with [`add_point_to_bounds`].
pub fn clear_bounds(mins: &mut Vec3, maxs: &mut Vec3) {
    *mins = [f32::MAX; 3];
    *maxs = [-f32::MAX; 3];
}

pub fn add_point_to_bounds(v: &Vec3, mins: &mut Vec3, maxs: &mut Vec3) {
    for i in 0..3 {
        if v[i] < mins[i] {
            mins[i] = v[i];
        }
        if v[i] > maxs[i] {
            maxs[i] = v[i];
        }
    }
}

/// Grow `mins`/`maxs` so they also enclose the box `bmins`/`bmaxs`.
pub fn add_bounds_to_bounds(bmins: &Vec3, bmaxs: &Vec3, mins: &mut Vec3, maxs: &mut Vec3) {
    add_point_to_bounds(bmins, mins, maxs);
    add_point_to_bounds(bmaxs, mins, maxs);
}

pub fn bounds_intersect(mins: &Vec3, maxs: &Vec3, mins2: &Vec3, maxs2: &Vec3) -> bool {
    !(maxs[0] < mins2[0]
        || maxs[1] < mins2[1]
        || maxs[2] < mins2[2]
        || mins[0] > maxs2[0]
        || mins[1] > maxs2[1]
        || mins[2] > maxs2[2])
}

pub fn bounds_contain_point(mins: &Vec3, maxs: &Vec3, p: &Vec3) -> bool {
    (0..3).all(|i| p[i] >= mins[i] && p[i] <= maxs[i])
}

pub fn bounds_center(mins: &Vec3, maxs: &Vec3) -> Vec3 {
    vector_scale(&vector_add(mins, maxs), 0.5)
}

/// Classify a box against a plane.
///
/// Returns [`SIDE_FRONT`] when the box is entirely on or in front of the
/// plane, [`SIDE_BACK`] when it is entirely behind it, and [`SIDE_CROSS`]
/// when it straddles.
pub fn box_on_plane_side(emins: &Vec3, emaxs: &Vec3, p: &CPlane) -> i32 {
    // fast axial cases
    if (p.plane_type as usize) < 3 {
        let t = p.plane_type as usize;
        if p.dist <= emins[t] {
            return SIDE_FRONT;
        }
        if p.dist >= emaxs[t] {
            return SIDE_BACK;
        }
        return SIDE_CROSS;
    }

    // general case: pick the corners nearest and farthest along the normal
    let mut near = [0.0f32; 3];
    let mut far = [0.0f32; 3];
    for i in 0..3 {
        if p.signbits & (1 << i) != 0 {
            far[i] = emins[i];
            near[i] = emaxs[i];
        } else {
            far[i] = emaxs[i];
            near[i] = emins[i];
        }
    }
    let dist1 = dot_product(&p.normal, &far);
    let dist2 = dot_product(&p.normal, &near);

    let mut sides = 0;
    if dist1 >= p.dist {
        sides = SIDE_FRONT;
    }
    if dist2 < p.dist {
        sides |= SIDE_BACK;
    }
    sides
}

// ============================================================
// Tests
// ============================================================
