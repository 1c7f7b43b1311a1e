// renderer.rs - world registration and the per-frame visibility queries

use std::sync::Arc;

use bspvis_common::common::{com_dprintf, VisError, VisResult};
use bspvis_common::cvar::CvarContext;
use bspvis_common::q_shared::Vec3;

use crate::config::CullConfig;
use crate::decals::DecalProjector;
use crate::frame::{FrameContext, PerfCounters, RefDef, ViewParms, WorldState};
use crate::interactions::{self, InteractionSink, LightInteraction, LightVolume};
use crate::pvs;
use crate::world_surfaces::{self, BrushEntity, DrawSurface, DrawSurfaceSink};
use crate::world_types::{World, WorldNode};

/// Result of a camera pass.
#[derive(Debug, Clone)]
pub struct VisibleWorldSurfaces {
    pub surfaces: Vec<DrawSurface>,
    /// Union of the bounds of every leaf the pass reached.
    pub vis_bounds: [Vec3; 2],
}

struct LoadedWorld {
    world: Arc<World>,
    state: WorldState,
}

/// Owns the registered world, the traversal state sized to it and the frame
/// context. Every query fails with `NoWorldLoaded` until a world is loaded.
#[derive(Default)]
pub struct WorldRenderer {
    loaded: Option<LoadedWorld>,
    frame: FrameContext,
}

impl WorldRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================
    // Registration
    // ============================================================

    pub fn load_world(&mut self, world: Arc<World>) {
        com_dprintf(&format!("R_LoadWorld: {}\n", world.name));
        let state = WorldState::new(&world);
        self.loaded = Some(LoadedWorld { world, state });
    }

    pub fn unload_world(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            com_dprintf(&format!("R_UnloadWorld: {}\n", loaded.world.name));
        }
    }

    pub fn world(&self) -> Option<&Arc<World>> {
        self.loaded.as_ref().map(|loaded| &loaded.world)
    }

    // ============================================================
    // Frame
    // ============================================================

    /// Take a new toggle snapshot, reset the frame statistics and open the
    /// frame's first view.
    pub fn begin_frame(&mut self, config: CullConfig) {
        self.frame.begin_frame(config);
    }

    /// Open another view inside the current frame, such as a mirror or a
    /// portal. Camera-side queries issued after it accept each surface again.
    pub fn begin_view(&mut self) {
        self.frame.begin_view();
    }

    pub fn begin_frame_from_cvars(&mut self, cvars: &mut CvarContext) {
        self.begin_frame(CullConfig::from_cvars(cvars));
    }

    /// Same as `begin_frame_from_cvars`, reading the process-wide cvars.
    /// Falls back to the default toggles when the cvar system is down.
    pub fn begin_frame_from_global_cvars(&mut self) {
        let config = CullConfig::from_global_cvars().unwrap_or_else(|| {
            com_dprintf("cvar system not initialized, using default toggles\n");
            CullConfig::default()
        });
        self.begin_frame(config);
    }

    pub fn frame(&self) -> &FrameContext {
        &self.frame
    }

    pub fn perf_counters(&self) -> &PerfCounters {
        &self.frame.pc
    }

    fn parts(&mut self) -> VisResult<(&World, &mut WorldState, &mut FrameContext)> {
        let loaded = self.loaded.as_mut().ok_or(VisError::NoWorldLoaded)?;
        Ok((&*loaded.world, &mut loaded.state, &mut self.frame))
    }

    fn loaded_world(&self) -> VisResult<&World> {
        self.loaded
            .as_ref()
            .map(|loaded| &*loaded.world)
            .ok_or(VisError::NoWorldLoaded)
    }

    // ============================================================
    // Point and cluster queries
    // ============================================================

    pub fn leaf_containing(&self, p: &Vec3) -> VisResult<&WorldNode> {
        let world = self.loaded_world()?;
        let leaf = pvs::leaf_containing(Some(world), p)?;
        Ok(&world.nodes[leaf])
    }

    pub fn is_cluster_visible(&self, from: i32, to: i32) -> VisResult<bool> {
        Ok(pvs::is_cluster_visible(self.loaded_world()?, from, to))
    }

    /// Whether the cluster holding `p2` is in the PVS of the cluster holding `p1`.
    pub fn is_cluster_mutually_visible(&self, p1: &Vec3, p2: &Vec3) -> VisResult<bool> {
        pvs::in_pvs(Some(self.loaded_world()?), p1, p2)
    }

    /// Same as `is_cluster_mutually_visible`, against the extended set.
    pub fn is_cluster_mutually_visible_extended(&self, p1: &Vec3, p2: &Vec3) -> VisResult<bool> {
        pvs::in_pvvs(Some(self.loaded_world()?), p1, p2)
    }

    // ============================================================
    // Camera pass
    // ============================================================

    pub fn add_world_surfaces<S: DrawSurfaceSink>(
        &mut self,
        view: &ViewParms,
        refdef: &RefDef,
        decals: &mut [&mut dyn DecalProjector],
        sink: &mut S,
    ) -> VisResult<()> {
        let (world, state, frame) = self.parts()?;
        world_surfaces::add_world_surfaces(world, state, frame, view, refdef, decals, sink)
    }

    pub fn compute_visible_world_surfaces(
        &mut self,
        view: &ViewParms,
        refdef: &RefDef,
        decals: &mut [&mut dyn DecalProjector],
    ) -> VisResult<VisibleWorldSurfaces> {
        let mut surfaces = Vec::new();
        self.add_world_surfaces(view, refdef, decals, &mut surfaces)?;
        Ok(VisibleWorldSurfaces {
            surfaces,
            vis_bounds: self.frame.vis_bounds,
        })
    }

    /// Brush models share the view generation of the world surfaces, so
    /// they are drawn even when the world model is not.
    pub fn add_brush_model_surfaces<S: DrawSurfaceSink>(
        &mut self,
        view: &ViewParms,
        entity: &BrushEntity,
        sink: &mut S,
    ) -> VisResult<()> {
        let (world, state, frame) = self.parts()?;
        world_surfaces::add_brush_model_surfaces(world, state, frame, view, entity, sink)
    }

    // ============================================================
    // Light passes
    // ============================================================

    pub fn add_world_interactions<S: InteractionSink>(
        &mut self,
        view: &ViewParms,
        refdef: &RefDef,
        light: &LightVolume,
        sink: &mut S,
    ) -> VisResult<()> {
        let (world, state, frame) = self.parts()?;
        interactions::add_world_interactions(world, state, frame, view, refdef, light, sink);
        Ok(())
    }

    pub fn compute_light_interactions(
        &mut self,
        view: &ViewParms,
        refdef: &RefDef,
        light: &LightVolume,
    ) -> VisResult<Vec<LightInteraction>> {
        let mut out = Vec::new();
        self.add_world_interactions(view, refdef, light, &mut out)?;
        Ok(out)
    }

    pub fn add_precached_world_interactions<S: InteractionSink>(
        &mut self,
        refdef: &RefDef,
        light: &LightVolume,
        sink: &mut S,
    ) -> VisResult<()> {
        let (world, state, frame) = self.parts()?;
        interactions::add_precached_world_interactions(world, state, frame, refdef, light, sink);
        Ok(())
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{register_cvars, register_global_cvars};
    use bspvis_common::cvar::{cvar_init, cvar_set};
    use crate::cull::{Frustum, Orientation};
    use crate::interactions::InteractionSurface;
    use crate::pvs::tests::two_leaf_world;
    use crate::registry::InteractionBits;
    use crate::world_surfaces::tests::camera_world;
    use crate::world_types::VisData;

    const IDENTITY: [Vec3; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    fn view(origin: Vec3, z_far: f32) -> ViewParms {
        ViewParms::new(origin, Frustum::from_view(origin, IDENTITY, 90.0, 90.0, 1.0, z_far))
    }

    fn renderer_with(world: World) -> WorldRenderer {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut renderer = WorldRenderer::new();
        renderer.load_world(Arc::new(world));
        renderer
    }

    #[test]
    fn test_queries_without_world_fail() {
        let mut renderer = WorldRenderer::new();
        let v = view([0.0; 3], 100.0);
        let refdef = RefDef::default();

        assert!(matches!(renderer.leaf_containing(&[0.0; 3]), Err(VisError::NoWorldLoaded)));
        assert!(matches!(renderer.is_cluster_visible(0, 0), Err(VisError::NoWorldLoaded)));
        assert!(matches!(
            renderer.is_cluster_mutually_visible(&[0.0; 3], &[1.0; 3]),
            Err(VisError::NoWorldLoaded)
        ));
        assert!(matches!(
            renderer.is_cluster_mutually_visible_extended(&[0.0; 3], &[1.0; 3]),
            Err(VisError::NoWorldLoaded)
        ));
        assert!(matches!(
            renderer.compute_visible_world_surfaces(&v, &refdef, &mut []),
            Err(VisError::NoWorldLoaded)
        ));
        assert!(matches!(
            renderer.compute_light_interactions(&v, &refdef, &LightVolume::omni([0.0; 3], 10.0)),
            Err(VisError::NoWorldLoaded)
        ));
    }

    #[test]
    fn test_unload_world() {
        let mut renderer = renderer_with(two_leaf_world(VisData::without_vis(2)));
        assert!(renderer.world().is_some());
        renderer.unload_world();
        assert!(renderer.world().is_none());
        assert!(matches!(renderer.leaf_containing(&[0.0; 3]), Err(VisError::NoWorldLoaded)));
    }

    #[test]
    fn test_two_leaf_scenario() {
        let renderer = renderer_with(two_leaf_world(VisData::without_vis(2)));

        assert_eq!(renderer.leaf_containing(&[-5.0, 0.0, 0.0]).unwrap().cluster(), 0);
        assert_eq!(renderer.leaf_containing(&[5.0, 0.0, 0.0]).unwrap().cluster(), 1);
        assert!(renderer
            .is_cluster_mutually_visible(&[-5.0, 0.0, 0.0], &[5.0, 0.0, 0.0])
            .unwrap());
        assert!(renderer
            .is_cluster_mutually_visible_extended(&[-5.0, 0.0, 0.0], &[5.0, 0.0, 0.0])
            .unwrap());
    }

    #[test]
    fn test_pvs_fallback_and_explicit_zero_bits() {
        let renderer = renderer_with(two_leaf_world(VisData::without_vis(2)));
        for from in 0..2 {
            for to in 0..2 {
                assert!(renderer.is_cluster_visible(from, to).unwrap());
            }
        }

        let renderer = renderer_with(two_leaf_world(VisData::new(2, Some(vec![0b01, 0b10]), None)));
        assert!(renderer.is_cluster_visible(0, 0).unwrap());
        assert!(!renderer.is_cluster_visible(0, 1).unwrap());
        assert!(!renderer.is_cluster_visible(1, 0).unwrap());
        assert!(!renderer
            .is_cluster_mutually_visible(&[-5.0, 0.0, 0.0], &[5.0, 0.0, 0.0])
            .unwrap());
    }

    #[test]
    fn test_far_plane_scenario() {
        let mut renderer = renderer_with(camera_world(VisData::without_vis(2)));
        let v = view([-5.0, 0.0, 0.0], 55.0);
        let refdef = RefDef::default();

        let visible = renderer.compute_visible_world_surfaces(&v, &refdef, &mut []).unwrap();
        let ids: Vec<_> = visible.surfaces.iter().map(|ds| ds.surface).collect();
        assert!(ids.contains(&0));
        assert!(!ids.contains(&1));

        renderer.begin_frame(CullConfig {
            no_cull: true,
            ..CullConfig::default()
        });
        let visible = renderer.compute_visible_world_surfaces(&v, &refdef, &mut []).unwrap();
        assert!(visible.surfaces.iter().any(|ds| ds.surface == 1));
        assert_eq!(visible.vis_bounds, [[-128.0; 3], [128.0; 3]]);
    }

    #[test]
    fn test_light_interactions_after_camera_pass() {
        let mut renderer = renderer_with(camera_world(VisData::without_vis(2)));
        let v = view([-5.0, 0.0, 0.0], 1000.0);
        let refdef = RefDef::default();
        renderer.compute_visible_world_surfaces(&v, &refdef, &mut []).unwrap();

        let light = LightVolume::omni([10.0, 0.0, 0.0], 5.0);
        let lit = renderer.compute_light_interactions(&v, &refdef, &light).unwrap();
        let surfaces: Vec<_> = lit.iter().map(|i| i.surface).collect();
        assert_eq!(surfaces, vec![InteractionSurface::World(0)]);
        assert!(lit[0].kind.contains(InteractionBits::LIGHT));
        assert_eq!(renderer.perf_counters().c_dlight_surfaces, 1);

        // a second light pass starts from a clean registry
        let again = renderer.compute_light_interactions(&v, &refdef, &light).unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_brush_model_through_renderer() {
        let mut renderer = renderer_with(camera_world(VisData::without_vis(2)));
        let v = view([-5.0, 0.0, 0.0], 1000.0);
        renderer
            .compute_visible_world_surfaces(&v, &RefDef::default(), &mut [])
            .unwrap();

        let entity = BrushEntity {
            model: 1,
            orientation: Orientation {
                origin: [20.0, 0.0, 0.0],
                axis: IDENTITY,
            },
            fog_index: 2,
        };
        let mut out: Vec<DrawSurface> = Vec::new();
        renderer.add_brush_model_surfaces(&v, &entity, &mut out).unwrap();
        assert!(out.iter().all(|ds| ds.fog_index == 2));
        assert!(out.iter().any(|ds| ds.surface == 3));
    }

    fn brush_entity() -> BrushEntity {
        BrushEntity {
            model: 1,
            orientation: Orientation {
                origin: [20.0, 0.0, 0.0],
                axis: IDENTITY,
            },
            fog_index: 0,
        }
    }

    fn brush_surfaces(renderer: &mut WorldRenderer, v: &ViewParms) -> Vec<usize> {
        let mut out: Vec<DrawSurface> = Vec::new();
        renderer.add_brush_model_surfaces(v, &brush_entity(), &mut out).unwrap();
        out.iter().map(|ds| ds.surface).collect()
    }

    #[test]
    fn test_brush_model_drawn_without_world_model() {
        let mut renderer = renderer_with(camera_world(VisData::without_vis(2)));
        let v = view([-5.0, 0.0, 0.0], 1000.0);
        let refdef = RefDef {
            no_world_model: true,
            ..RefDef::default()
        };

        for _ in 0..2 {
            renderer.begin_frame(CullConfig::default());
            let visible = renderer.compute_visible_world_surfaces(&v, &refdef, &mut []).unwrap();
            assert!(visible.surfaces.is_empty());
            assert_eq!(brush_surfaces(&mut renderer, &v), vec![3]);
        }
    }

    #[test]
    fn test_brush_model_before_world_pass() {
        let mut renderer = renderer_with(camera_world(VisData::without_vis(2)));
        let v = view([-5.0, 0.0, 0.0], 1000.0);

        // first frame, no begin_frame yet
        assert_eq!(brush_surfaces(&mut renderer, &v), vec![3]);
        let visible = renderer
            .compute_visible_world_surfaces(&v, &RefDef::default(), &mut [])
            .unwrap();
        let ids: Vec<_> = visible.surfaces.iter().map(|ds| ds.surface).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        // same view: nothing is accepted twice
        assert!(brush_surfaces(&mut renderer, &v).is_empty());

        renderer.begin_view();
        assert_eq!(brush_surfaces(&mut renderer, &v), vec![3]);
    }

    #[test]
    fn test_begin_frame_from_cvars() {
        let mut cvars = CvarContext::new();
        register_cvars(&mut cvars);
        cvars.set("r_nocull", "1");

        let mut renderer = WorldRenderer::new();
        renderer.begin_frame_from_cvars(&mut cvars);
        assert!(renderer.frame().config.no_cull);
        assert_eq!(renderer.frame().frame_count, 1);
    }

    #[test]
    fn test_begin_frame_from_global_cvars() {
        cvar_init();
        assert!(register_global_cvars());
        cvar_set("r_novis", "1");

        let mut renderer = WorldRenderer::new();
        renderer.begin_frame_from_global_cvars();
        assert!(renderer.frame().config.no_vis);
        assert!(!renderer.frame().config.no_cull);
    }
}
