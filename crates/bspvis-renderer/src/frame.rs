// frame.rs - per-frame context, persistent per-world traversal state, view and refdef inputs

use bspvis_common::q_shared::{clear_bounds, Vec3};

use crate::config::CullConfig;
use crate::cull::Frustum;
use crate::registry::SurfaceStamps;
use crate::world_types::{NodeId, World};

/// Number of viewpoint clusters whose PVS marking is kept around.
pub const MAX_VISCOUNTS: usize = 5;

/// Cluster value of a ring slot that must never produce a cache hit.
pub const VIS_CLUSTER_STALE: i32 = -2;

// ============================================================
// Statistics
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfCounters {
    pub c_leafs: u32,
    pub c_plane_cull_in: u32,
    pub c_plane_cull_out: u32,
    pub c_box_cull_in: u32,
    pub c_box_cull_out: u32,
    pub c_sphere_cull_in: u32,
    pub c_sphere_cull_out: u32,
    /// First interactions accepted for static lights.
    pub c_slight_surfaces: u32,
    /// First interactions accepted for dynamic lights.
    pub c_dlight_surfaces: u32,
    pub c_dlight_surfaces_culled: u32,
    /// Nodes entered by the light interaction walk.
    pub c_interaction_nodes: u32,
}

// ============================================================
// Frame context
// ============================================================

/// Counters and accumulators owned by one frame. Passed explicitly to every
/// traversal instead of living in globals.
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub config: CullConfig,
    pub frame_count: u32,
    /// Camera generation. Advanced once per view, whether or not the world
    /// itself is drawn.
    pub view_count: u32,
    /// Light pass generation. Advanced once per light interaction pass.
    pub light_count: u32,
    pub pc: PerfCounters,
    /// Union of the bounds of every leaf the last camera pass reached.
    pub vis_bounds: [Vec3; 2],
}

impl Default for FrameContext {
    fn default() -> Self {
        Self::new(CullConfig::default())
    }
}

impl FrameContext {
    pub fn new(config: CullConfig) -> Self {
        let mut vis_bounds = [[0.0; 3]; 2];
        let [mins, maxs] = &mut vis_bounds;
        clear_bounds(mins, maxs);
        Self {
            config,
            frame_count: 0,
            // fresh surface stamps hold 0, so the first view is already open
            view_count: 1,
            light_count: 0,
            pc: PerfCounters::default(),
            vis_bounds,
        }
    }

    /// Start a frame: take the new toggle snapshot, zero the statistics and
    /// open the frame's first view. Generation counters keep running across
    /// frames.
    pub fn begin_frame(&mut self, config: CullConfig) {
        self.config = config;
        self.frame_count = self.frame_count.wrapping_add(1);
        self.pc = PerfCounters::default();
        self.clear_vis_bounds();
        self.begin_view();
    }

    /// Open a new camera generation. World and brush model surfaces are
    /// each accepted at most once per view.
    pub fn begin_view(&mut self) -> u32 {
        self.view_count = self.view_count.wrapping_add(1);
        self.view_count
    }

    pub fn clear_vis_bounds(&mut self) {
        let [mins, maxs] = &mut self.vis_bounds;
        clear_bounds(mins, maxs);
    }

    pub(crate) fn next_light_count(&mut self) -> u32 {
        self.light_count = self.light_count.wrapping_add(1);
        self.light_count
    }
}

// ============================================================
// Persistent traversal state
// ============================================================

/// Ring of recently marked viewpoint clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisCache {
    pub clusters: [i32; MAX_VISCOUNTS],
    pub counts: [u32; MAX_VISCOUNTS],
    /// Slot the current marking lives in.
    pub index: usize,
}

impl Default for VisCache {
    fn default() -> Self {
        Self {
            clusters: [VIS_CLUSTER_STALE; MAX_VISCOUNTS],
            counts: [0; MAX_VISCOUNTS],
            index: 0,
        }
    }
}

impl VisCache {
    pub fn find(&self, cluster: i32) -> Option<usize> {
        self.clusters.iter().position(|&c| c == cluster)
    }

    pub fn current_count(&self) -> u32 {
        self.counts[self.index]
    }

    pub fn invalidate(&mut self) {
        self.clusters = [VIS_CLUSTER_STALE; MAX_VISCOUNTS];
    }
}

/// Everything a traversal writes, sized to one world. The world itself stays
/// immutable and shareable.
#[derive(Debug, Clone)]
pub struct WorldState {
    pub vis_cache: VisCache,
    /// Per node, the generation each ring slot last marked it with.
    pub node_vis_counts: Vec<[u32; MAX_VISCOUNTS]>,
    pub surfaces: Vec<SurfaceStamps>,
}

impl WorldState {
    pub fn new(world: &World) -> Self {
        Self {
            vis_cache: VisCache::default(),
            node_vis_counts: vec![[0; MAX_VISCOUNTS]; world.nodes.len()],
            surfaces: vec![SurfaceStamps::default(); world.surfaces.len()],
        }
    }

    /// Whether the current PVS marking reaches `node`. Before the first
    /// marking every node reads as visible.
    #[inline]
    pub fn node_marked(&self, node: NodeId) -> bool {
        let index = self.vis_cache.index;
        self.node_vis_counts[node][index] == self.vis_cache.counts[index]
    }
}

// ============================================================
// Inputs
// ============================================================

/// Camera placement for one view.
#[derive(Debug, Clone)]
pub struct ViewParms {
    pub origin: Vec3,
    /// Point the PVS cluster is taken from; usually `origin`.
    pub pvs_origin: Vec3,
    pub frustum: Frustum,
}

impl ViewParms {
    pub fn new(origin: Vec3, frustum: Frustum) -> Self {
        Self {
            origin,
            pvs_origin: origin,
            frustum,
        }
    }
}

/// Scene-level flags from the host.
#[derive(Debug, Clone, Default)]
pub struct RefDef {
    /// A set bit hides the area behind a closed door.
    pub area_mask: Vec<u8>,
    pub area_mask_modified: bool,
    pub no_world_model: bool,
}

impl RefDef {
    pub fn area_hidden(&self, area: i32) -> bool {
        if area < 0 {
            return false;
        }
        let area = area as usize;
        self.area_mask
            .get(area >> 3)
            .is_some_and(|byte| byte & (1 << (area & 7)) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShadowingMode;

    #[test]
    fn test_begin_frame_resets_stats_but_not_generations() {
        let mut frame = FrameContext::default();
        assert_eq!(frame.view_count, 1);
        frame.begin_view();
        frame.next_light_count();
        frame.pc.c_leafs = 12;
        frame.vis_bounds = [[0.0; 3], [1.0; 3]];

        let config = CullConfig {
            shadowing: ShadowingMode::Blob,
            ..CullConfig::default()
        };
        frame.begin_frame(config);
        assert_eq!(frame.pc, PerfCounters::default());
        assert_eq!(frame.view_count, 3);
        assert_eq!(frame.light_count, 1);
        assert_eq!(frame.frame_count, 1);
        assert_eq!(frame.config.shadowing, ShadowingMode::Blob);
        assert_eq!(frame.vis_bounds[0], [f32::MAX; 3]);
        assert_eq!(frame.vis_bounds[1], [-f32::MAX; 3]);
    }

    #[test]
    fn test_vis_cache_find_and_invalidate() {
        let mut cache = VisCache::default();
        assert_eq!(cache.find(-1), None);
        cache.clusters[3] = 7;
        assert_eq!(cache.find(7), Some(3));
        cache.invalidate();
        assert_eq!(cache.find(7), None);
    }

    #[test]
    fn test_area_hidden() {
        let refdef = RefDef {
            area_mask: vec![0b0000_0100, 0b0000_0001],
            ..RefDef::default()
        };
        assert!(refdef.area_hidden(2));
        assert!(refdef.area_hidden(8));
        assert!(!refdef.area_hidden(0));
        assert!(!refdef.area_hidden(-1));
        assert!(!refdef.area_hidden(200));
    }
}
