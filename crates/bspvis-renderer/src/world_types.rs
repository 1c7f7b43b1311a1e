// world_types.rs - in-memory world: BSP nodes and leafs, surfaces, shaders, visibility rows
//
// The world is built once and never mutated afterwards. Everything that
// changes per frame (node visibility stamps, surface view/light stamps) lives
// in `frame::WorldState`, indexed by node and surface number.

use std::sync::Arc;

use bspvis_common::common::{com_dprintf, VisError, VisResult};
use bspvis_common::q_shared::{
    add_bounds_to_bounds, bounds_center, clear_bounds, vector_length, vector_subtract, CPlane,
    Vec3, CONTENTS_NODE, CONTENTS_SOLID,
};
use rayon::prelude::*;

pub type SurfaceId = usize;
pub type NodeId = usize;

/// Above this many surfaces, load-time surface checks run on the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 4096;

// ============================================================
// Shaders
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullType {
    #[default]
    FrontSided,
    BackSided,
    TwoSided,
}

/// The material facts the visibility code needs. Sort keys, stages and the
/// rest of the material live with the renderer that owns the shader.
#[derive(Debug, Clone, Default)]
pub struct Shader {
    pub name: String,
    pub is_sky: bool,
    pub interact_light: bool,
    pub no_shadows: bool,
    pub cull_type: CullType,
}

impl Shader {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            interact_light: true,
            ..Self::default()
        }
    }

    /// Surfaces with this shader never take part in a light pass.
    pub fn ignores_lights(&self) -> bool {
        self.is_sky || (!self.interact_light && self.no_shadows)
    }
}

// ============================================================
// Surfaces
// ============================================================

/// Bounds, bounding-sphere origin and radius shared by every drawable kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenericGeometry {
    pub bounds: [Vec3; 2],
    pub origin: Vec3,
    pub radius: f32,
}

impl GenericGeometry {
    /// Sphere around the center of the box that encloses the box.
    pub fn from_bounds(mins: Vec3, maxs: Vec3) -> Self {
        let origin = bounds_center(&mins, &maxs);
        let radius = vector_length(&vector_subtract(&maxs, &origin));
        Self {
            bounds: [mins, maxs],
            origin,
            radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Face,
    Grid,
    Triangles,
    VboMesh,
    Skip,
}

/// Geometry payload of a world surface. The vertex data itself belongs to
/// the draw backend; culling only needs the shared bounds capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceGeometry {
    /// Planar polygon.
    Face { generic: GenericGeometry, plane: CPlane },
    /// Curved patch, tessellated on load.
    Grid(GenericGeometry),
    /// Fixed triangle soup.
    Triangles(GenericGeometry),
    /// Precomputed batched mesh.
    VboMesh(GenericGeometry),
    /// Anything the world path never draws (flares, skipped faces).
    Skip,
}

impl SurfaceGeometry {
    pub fn kind(&self) -> SurfaceKind {
        match self {
            SurfaceGeometry::Face { .. } => SurfaceKind::Face,
            SurfaceGeometry::Grid(_) => SurfaceKind::Grid,
            SurfaceGeometry::Triangles(_) => SurfaceKind::Triangles,
            SurfaceGeometry::VboMesh(_) => SurfaceKind::VboMesh,
            SurfaceGeometry::Skip => SurfaceKind::Skip,
        }
    }

    pub fn generic(&self) -> Option<&GenericGeometry> {
        match self {
            SurfaceGeometry::Face { generic, .. }
            | SurfaceGeometry::Grid(generic)
            | SurfaceGeometry::Triangles(generic)
            | SurfaceGeometry::VboMesh(generic) => Some(generic),
            SurfaceGeometry::Skip => None,
        }
    }

    pub fn bounds(&self) -> Option<&[Vec3; 2]> {
        self.generic().map(|g| &g.bounds)
    }

    pub fn origin(&self) -> Option<Vec3> {
        self.generic().map(|g| g.origin)
    }

    pub fn radius(&self) -> Option<f32> {
        self.generic().map(|g| g.radius)
    }

    pub fn plane(&self) -> Option<&CPlane> {
        match self {
            SurfaceGeometry::Face { plane, .. } => Some(plane),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Surface {
    pub geometry: SurfaceGeometry,
    pub shader: Arc<Shader>,
    pub lightmap_num: i32,
    pub fog_index: i32,
}

impl Surface {
    pub fn new(geometry: SurfaceGeometry, shader: Arc<Shader>) -> Self {
        Self {
            geometry,
            shader,
            lightmap_num: -1,
            fog_index: 0,
        }
    }
}

// ============================================================
// BSP nodes
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Decision point: front child first, then back child.
    Internal { plane: usize, children: [NodeId; 2] },
    /// Convex leaf with its mark-surface range into `World::mark_surfaces`.
    Leaf {
        cluster: i32,
        area: i32,
        first_mark: usize,
        num_marks: usize,
    },
}

#[derive(Debug, Clone)]
pub struct WorldNode {
    /// [`CONTENTS_NODE`] for internal nodes, leaf contents otherwise.
    pub contents: i32,
    pub mins: Vec3,
    pub maxs: Vec3,
    /// Filled in by [`World::new`]. Only used for ancestor walks.
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl WorldNode {
    pub fn internal(plane: usize, children: [NodeId; 2]) -> Self {
        Self {
            contents: CONTENTS_NODE,
            mins: [0.0; 3],
            maxs: [0.0; 3],
            parent: None,
            kind: NodeKind::Internal { plane, children },
        }
    }

    pub fn leaf(cluster: i32, area: i32, mins: Vec3, maxs: Vec3, marks: std::ops::Range<usize>) -> Self {
        Self {
            contents: 0,
            mins,
            maxs,
            parent: None,
            kind: NodeKind::Leaf {
                cluster,
                area,
                first_mark: marks.start,
                num_marks: marks.len(),
            },
        }
    }

    /// Solid leaf: cluster -1, never visible.
    pub fn solid_leaf(mins: Vec3, maxs: Vec3) -> Self {
        let mut node = Self::leaf(-1, 0, mins, maxs, 0..0);
        node.contents = CONTENTS_SOLID;
        node
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Cluster of a leaf; -1 for internal nodes and solid leafs.
    pub fn cluster(&self) -> i32 {
        match self.kind {
            NodeKind::Leaf { cluster, .. } => cluster,
            NodeKind::Internal { .. } => -1,
        }
    }

    pub fn area(&self) -> i32 {
        match self.kind {
            NodeKind::Leaf { area, .. } => area,
            NodeKind::Internal { .. } => -1,
        }
    }

    pub fn num_marks(&self) -> usize {
        match self.kind {
            NodeKind::Leaf { num_marks, .. } => num_marks,
            NodeKind::Internal { .. } => 0,
        }
    }
}

/// Inline brush model: a run of world surfaces drawn through an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub first_surface: SurfaceId,
    pub num_surfaces: usize,
}

// ============================================================
// Visibility rows
// ============================================================

/// Cluster-to-cluster potential visibility, one `cluster_bytes` row per
/// cluster, bit `j` of row `i` set when `j` may be seen from `i`.
#[derive(Debug, Clone, Default)]
pub struct VisData {
    pub num_clusters: usize,
    pub cluster_bytes: usize,
    pub vis: Option<Vec<u8>>,
    /// Extended visibility set, same layout as `vis`.
    pub visvis: Option<Vec<u8>>,
    /// All-visible sentinel row.
    novis: Vec<u8>,
}

impl VisData {
    pub fn new(num_clusters: usize, vis: Option<Vec<u8>>, visvis: Option<Vec<u8>>) -> Self {
        let cluster_bytes = (num_clusters + 7) >> 3;
        Self {
            num_clusters,
            cluster_bytes,
            vis,
            visvis,
            novis: vec![0xff; cluster_bytes.max(1)],
        }
    }

    /// No PVS at all: every cluster sees every other.
    pub fn without_vis(num_clusters: usize) -> Self {
        Self::new(num_clusters, None, None)
    }

    pub fn novis_row(&self) -> &[u8] {
        &self.novis
    }
}

// ============================================================
// Whole world
// ============================================================

#[derive(Debug, Clone)]
pub struct World {
    pub name: String,
    pub nodes: Vec<WorldNode>,
    pub planes: Vec<CPlane>,
    pub surfaces: Vec<Surface>,
    pub mark_surfaces: Vec<SurfaceId>,
    pub models: Vec<BrushModel>,
    pub vis: VisData,
}

impl World {
    /// Assemble a world from parts. Node 0 is the root.
    ///
    /// Derives parent links, recomputes internal node bounds as the union of
    /// their children and rejects structurally broken input.
    pub fn new(
        name: &str,
        mut nodes: Vec<WorldNode>,
        planes: Vec<CPlane>,
        surfaces: Vec<Surface>,
        mark_surfaces: Vec<SurfaceId>,
        vis: VisData,
    ) -> VisResult<Self> {
        if nodes.is_empty() {
            return Err(VisError::MalformedWorld("world has no nodes".into()));
        }

        if let Some(expected) = vis.num_clusters.checked_mul(vis.cluster_bytes) {
            for (label, rows) in [("vis", &vis.vis), ("visvis", &vis.visvis)] {
                if let Some(rows) = rows {
                    if rows.len() != expected {
                        return Err(VisError::MalformedWorld(format!(
                            "{} has {} bytes, expected {}",
                            label,
                            rows.len(),
                            expected
                        )));
                    }
                }
            }
        }

        // Walk from the root: every node must be reached exactly once.
        let mut order = Vec::with_capacity(nodes.len());
        let mut seen = vec![false; nodes.len()];
        let mut stack = vec![0usize];
        seen[0] = true;
        while let Some(n) = stack.pop() {
            order.push(n);
            match nodes[n].kind {
                NodeKind::Internal { plane, children } => {
                    if plane >= planes.len() {
                        return Err(VisError::MalformedWorld(format!(
                            "node {} references plane {} of {}",
                            n,
                            plane,
                            planes.len()
                        )));
                    }
                    for child in children {
                        if child >= nodes.len() {
                            return Err(VisError::MalformedWorld(format!(
                                "node {} has child {} out of range",
                                n, child
                            )));
                        }
                        if seen[child] {
                            return Err(VisError::MalformedWorld(format!(
                                "node {} reached twice",
                                child
                            )));
                        }
                        seen[child] = true;
                        nodes[child].parent = Some(n);
                        stack.push(child);
                    }
                }
                NodeKind::Leaf {
                    cluster,
                    first_mark,
                    num_marks,
                    ..
                } => {
                    if cluster >= vis.num_clusters as i32 {
                        return Err(VisError::MalformedWorld(format!(
                            "leaf {} has cluster {} of {}",
                            n, cluster, vis.num_clusters
                        )));
                    }
                    let end = first_mark.checked_add(num_marks);
                    match end {
                        Some(end) if end <= mark_surfaces.len() => {}
                        _ => {
                            return Err(VisError::MalformedWorld(format!(
                                "leaf {} mark range out of bounds",
                                n
                            )))
                        }
                    }
                }
            }
        }
        if let Some(unreached) = seen.iter().position(|s| !s) {
            return Err(VisError::MalformedWorld(format!(
                "node {} is not reachable from the root",
                unreached
            )));
        }
        nodes[0].parent = None;

        if let Some(&bad) = mark_surfaces.iter().find(|&&s| s >= surfaces.len()) {
            return Err(VisError::MalformedWorld(format!(
                "mark surface {} of {}",
                bad,
                surfaces.len()
            )));
        }

        if let Some(bad) = find_bad_surface(&surfaces) {
            return Err(VisError::MalformedWorld(format!(
                "surface {} has inverted or non-finite bounds",
                bad
            )));
        }

        // children come after their parent in `order`
        for &n in order.iter().rev() {
            if let NodeKind::Internal { children, .. } = nodes[n].kind {
                let mut mins = [0.0; 3];
                let mut maxs = [0.0; 3];
                clear_bounds(&mut mins, &mut maxs);
                for child in children {
                    let (cmins, cmaxs) = (nodes[child].mins, nodes[child].maxs);
                    add_bounds_to_bounds(&cmins, &cmaxs, &mut mins, &mut maxs);
                }
                nodes[n].mins = mins;
                nodes[n].maxs = maxs;
            }
        }

        let world = Self {
            name: name.to_string(),
            nodes,
            planes,
            surfaces,
            mark_surfaces,
            models: Vec::new(),
            vis,
        };
        com_dprintf(&format!(
            "world {}: {} nodes, {} leafs, {} surfaces, {} clusters\n",
            world.name,
            world.nodes.len(),
            world.num_leafs(),
            world.surfaces.len(),
            world.vis.num_clusters
        ));
        Ok(world)
    }

    /// Attach inline brush models.
    pub fn with_models(mut self, models: Vec<BrushModel>) -> VisResult<Self> {
        for (i, m) in models.iter().enumerate() {
            match m.first_surface.checked_add(m.num_surfaces) {
                Some(end) if end <= self.surfaces.len() => {}
                _ => {
                    return Err(VisError::MalformedWorld(format!(
                        "model {} surface range out of bounds",
                        i
                    )))
                }
            }
        }
        self.models = models;
        Ok(self)
    }

    pub fn num_leafs(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Mark-surface slice of a leaf; empty for internal nodes.
    pub fn leaf_marks(&self, node: NodeId) -> &[SurfaceId] {
        match self.nodes[node].kind {
            NodeKind::Leaf {
                first_mark,
                num_marks,
                ..
            } => &self.mark_surfaces[first_mark..first_mark + num_marks],
            NodeKind::Internal { .. } => &[],
        }
    }
}

fn surface_is_bad(surface: &Surface) -> bool {
    match surface.geometry.generic() {
        Some(g) => {
            let [mins, maxs] = g.bounds;
            (0..3).any(|i| !mins[i].is_finite() || !maxs[i].is_finite() || mins[i] > maxs[i])
                || !g.radius.is_finite()
                || g.radius < 0.0
        }
        None => false,
    }
}

fn find_bad_surface(surfaces: &[Surface]) -> Option<SurfaceId> {
    if surfaces.len() >= PARALLEL_THRESHOLD {
        (0..surfaces.len())
            .into_par_iter()
            .find_first(|&i| surface_is_bad(&surfaces[i]))
    } else {
        surfaces.iter().position(surface_is_bad)
    }
}

// ============================================================
// Tests
// ============================================================
