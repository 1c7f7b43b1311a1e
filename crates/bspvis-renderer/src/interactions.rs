// interactions.rs - per-light world walk and light/surface interaction emission

use std::sync::Arc;

use bspvis_common::q_shared::{box_on_plane_side, CPlane, Vec3, SIDE_BACK, SIDE_FRONT};

use crate::cull::{cull_light_surface, Frustum, FRUSTUM_CLIPALL};
use crate::frame::{FrameContext, RefDef, ViewParms, WorldState};
use crate::registry::{CubeSideBits, InteractionBits};
use crate::world_types::{NodeId, NodeKind, Shader, SurfaceId, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightKind {
    #[default]
    Omni,
    Directional,
    Projected,
}

/// Backend handle of a merged interaction mesh.
pub type MeshId = usize;

/// One precomputed light/surface pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedInteraction {
    pub surface: SurfaceId,
    pub kind: InteractionBits,
    pub cube_side_bits: CubeSideBits,
    /// Fully covered by another cached entry.
    pub redundant: bool,
    /// Drawn through one of the light's merged meshes.
    pub merged_into_vbo: bool,
}

/// Interactions of one shader merged into static meshes.
#[derive(Debug, Clone)]
pub struct InteractionMesh {
    pub light_mesh: Option<MeshId>,
    pub shadow_mesh: Option<MeshId>,
    pub shader: Arc<Shader>,
    pub cube_side_bits: CubeSideBits,
}

/// A light as the visibility code sees it.
#[derive(Debug, Clone, Default)]
pub struct LightVolume {
    pub kind: LightKind,
    pub origin: Vec3,
    /// Direction light travels, for directional lights.
    pub direction: Vec3,
    pub world_bounds: [Vec3; 2],
    /// Inward-facing planes bounding the lit volume.
    pub frustum: Vec<CPlane>,
    pub is_static: bool,
    pub no_shadows: bool,
    pub interaction_cache: Vec<CachedInteraction>,
    pub interaction_meshes: Vec<InteractionMesh>,
}

impl LightVolume {
    /// Point light reaching `radius` units along each axis. Its frustum is
    /// the six faces of its box.
    pub fn omni(origin: Vec3, radius: f32) -> Self {
        let mins = [origin[0] - radius, origin[1] - radius, origin[2] - radius];
        let maxs = [origin[0] + radius, origin[1] + radius, origin[2] + radius];
        Self {
            kind: LightKind::Omni,
            origin,
            world_bounds: [mins, maxs],
            frustum: box_planes(&mins, &maxs),
            ..Self::default()
        }
    }
}

/// Inward-facing planes of an axis-aligned box.
pub fn box_planes(mins: &Vec3, maxs: &Vec3) -> Vec<CPlane> {
    let mut planes = Vec::with_capacity(6);
    for i in 0..3 {
        let mut normal = [0.0; 3];
        normal[i] = 1.0;
        planes.push(CPlane::new(normal, mins[i]));
        normal[i] = -1.0;
        planes.push(CPlane::new(normal, -maxs[i]));
    }
    planes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionSurface {
    World(SurfaceId),
    Mesh(MeshId),
}

/// A light/surface pair handed to the shadow and lighting passes.
#[derive(Debug, Clone)]
pub struct LightInteraction {
    pub surface: InteractionSurface,
    pub shader: Arc<Shader>,
    pub cube_side_bits: CubeSideBits,
    pub kind: InteractionBits,
}

pub trait InteractionSink {
    fn add_light_interaction(&mut self, interaction: LightInteraction);
}

impl InteractionSink for Vec<LightInteraction> {
    fn add_light_interaction(&mut self, interaction: LightInteraction) {
        self.push(interaction);
    }
}

// ============================================================
// Dynamic walk
// ============================================================

struct InteractionWalker<'a, S: InteractionSink> {
    world: &'a World,
    state: &'a mut WorldState,
    frame: &'a mut FrameContext,
    frustum: &'a Frustum,
    light: &'a LightVolume,
    sink: &'a mut S,
    /// Node, plane bits and interaction bits at each step of the walk.
    #[cfg(test)]
    visits: Vec<(NodeId, u32, InteractionBits)>,
}

impl<S: InteractionSink> InteractionWalker<'_, S> {
    fn recursive_interaction_node(
        &mut self,
        mut node: NodeId,
        mut plane_bits: u32,
        mut interaction_bits: InteractionBits,
    ) {
        loop {
            self.frame.pc.c_interaction_nodes += 1;
            let n = &self.world.nodes[node];

            // outside the PVS: no visible lighting, but may still shadow
            if !self.state.node_marked(node) {
                interaction_bits &= !InteractionBits::LIGHT;
            }

            // nodes outside the view may still cast shadows into it
            if !self.frame.config.no_cull {
                for (i, plane) in self.frustum.planes.iter().enumerate() {
                    if plane_bits & (1 << i) == 0 {
                        continue;
                    }
                    let r = box_on_plane_side(&n.mins, &n.maxs, plane);
                    if r == SIDE_BACK {
                        interaction_bits &= !InteractionBits::LIGHT;
                        break;
                    }
                    if r == SIDE_FRONT {
                        plane_bits &= !(1 << i);
                    }
                }
            }

            #[cfg(test)]
            self.visits.push((node, plane_bits, interaction_bits));

            if interaction_bits.is_empty() {
                return;
            }

            let (plane, children) = match n.kind {
                NodeKind::Internal { plane, children } => (plane, children),
                NodeKind::Leaf { .. } => break,
            };

            let [light_mins, light_maxs] = &self.light.world_bounds;
            match box_on_plane_side(light_mins, light_maxs, &self.world.planes[plane]) {
                SIDE_FRONT => node = children[0],
                SIDE_BACK => node = children[1],
                _ => {
                    self.recursive_interaction_node(children[0], plane_bits, interaction_bits);
                    node = children[1];
                }
            }
        }

        for &surface in self.world.leaf_marks(node) {
            // surfaces spanning several leafs are filtered by the registry
            add_interaction_surface(
                self.world,
                self.state,
                self.frame,
                self.light,
                surface,
                interaction_bits,
                self.sink,
            );
        }
    }
}

/// Dedup one surface against the current light pass and emit whatever kinds
/// it has not received yet.
pub fn add_interaction_surface<S: InteractionSink + ?Sized>(
    world: &World,
    state: &mut WorldState,
    frame: &mut FrameContext,
    light: &LightVolume,
    surface_id: SurfaceId,
    interaction_bits: InteractionBits,
    sink: &mut S,
) {
    let request = match state.surfaces[surface_id].request_interactions(frame.light_count, interaction_bits) {
        Some(request) => request,
        None => return,
    };

    let surface = &world.surfaces[surface_id];
    if surface.shader.ignores_lights() {
        return;
    }

    let cube_side_bits = match cull_light_surface(&surface.geometry, &surface.shader, light, &frame.config) {
        Some(bits) => bits,
        None => {
            if !light.is_static && request.first_addition {
                frame.pc.c_dlight_surfaces_culled += 1;
            }
            return;
        }
    };

    sink.add_light_interaction(LightInteraction {
        surface: InteractionSurface::World(surface_id),
        shader: surface.shader.clone(),
        cube_side_bits,
        kind: request.new_bits,
    });

    if request.first_addition {
        if light.is_static {
            frame.pc.c_slight_surfaces += 1;
        } else {
            frame.pc.c_dlight_surfaces += 1;
        }
    }
}

/// Walk the world for one light, starting a new light pass.
///
/// `view` supplies the camera frustum: nodes outside it can only contribute
/// shadow casters.
pub fn add_world_interactions<S: InteractionSink>(
    world: &World,
    state: &mut WorldState,
    frame: &mut FrameContext,
    view: &ViewParms,
    refdef: &RefDef,
    light: &LightVolume,
    sink: &mut S,
) {
    if !frame.config.draw_world || refdef.no_world_model {
        return;
    }

    frame.next_light_count();

    let mut interaction_bits = InteractionBits::DEFAULT;
    if !frame.config.allows_world_shadows() || light.no_shadows {
        interaction_bits &= InteractionBits::LIGHT;
    }

    let mut walker = InteractionWalker {
        world,
        state,
        frame,
        frustum: &view.frustum,
        light,
        sink,
        #[cfg(test)]
        visits: Vec::new(),
    };
    walker.recursive_interaction_node(0, FRUSTUM_CLIPALL, interaction_bits);
}

// ============================================================
// Precached interactions
// ============================================================

/// Emit a light's precomputed interactions for the current camera pass.
///
/// Cached surfaces the camera pass did not reach are only kept as shadow
/// casters, and only at shadow qualities that render them.
pub fn add_precached_world_interactions<S: InteractionSink>(
    world: &World,
    state: &WorldState,
    frame: &FrameContext,
    refdef: &RefDef,
    light: &LightVolume,
    sink: &mut S,
) {
    let config = &frame.config;
    if !config.draw_world || refdef.no_world_model {
        return;
    }

    if light.interaction_cache.is_empty() {
        return;
    }

    let use_meshes = config.vbo_shadows || config.vbo_lighting;
    if use_meshes {
        // shadow mapping or shadowless lighting
        for mesh in &light.interaction_meshes {
            if let Some(id) = mesh.light_mesh {
                sink.add_light_interaction(LightInteraction {
                    surface: InteractionSurface::Mesh(id),
                    shader: mesh.shader.clone(),
                    cube_side_bits: CubeSideBits::CLIPALL,
                    kind: InteractionBits::LIGHT,
                });
            }
        }

        for mesh in &light.interaction_meshes {
            if let Some(id) = mesh.shadow_mesh {
                sink.add_light_interaction(LightInteraction {
                    surface: InteractionSurface::Mesh(id),
                    shader: mesh.shader.clone(),
                    cube_side_bits: mesh.cube_side_bits,
                    kind: InteractionBits::SHADOW,
                });
            }
        }
    }

    let skip_out_of_view = config.shadowing < config.min_shadow_caster_shadowing || light.no_shadows;

    for cached in &light.interaction_cache {
        if cached.redundant || (use_meshes && cached.merged_into_vbo) {
            continue;
        }

        let surface = match world.surfaces.get(cached.surface) {
            Some(surface) => surface,
            None => {
                log::debug!("cached interaction references missing surface {}", cached.surface);
                continue;
            }
        };

        // not in this view, but it may still cast a shadow into it
        let kind = if state.surfaces[cached.surface].seen_in_view(frame.view_count) {
            cached.kind
        } else if skip_out_of_view {
            continue;
        } else {
            InteractionBits::SHADOW
        };

        sink.add_light_interaction(LightInteraction {
            surface: InteractionSurface::World(cached.surface),
            shader: surface.shader.clone(),
            cube_side_bits: cached.cube_side_bits,
            kind,
        });
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CullConfig, ShadowingMode};
    use crate::cull::FRUSTUM_NEAR;
    use crate::pvs::mark_leaves;
    use crate::world_types::{GenericGeometry, Surface, SurfaceGeometry, VisData, WorldNode};

    const IDENTITY: [Vec3; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    fn shader() -> Arc<Shader> {
        Arc::new(Shader::new("textures/base/floor"))
    }

    fn box_surface(mins: Vec3, maxs: Vec3, shader: Arc<Shader>) -> Surface {
        Surface::new(SurfaceGeometry::Triangles(GenericGeometry::from_bounds(mins, maxs)), shader)
    }

    /// Split on X=0. Front side: one leaf with surface 0 at x=10 and surface
    /// 2 spanning both leafs. Back side: a subtree split on Y=0 whose leafs
    /// hold surfaces 1 (x=-10) and 2.
    fn light_world() -> World {
        let s = shader();
        let surfaces = vec![
            box_surface([9.0, -1.0, -1.0], [11.0, 1.0, 1.0], s.clone()),
            box_surface([-11.0, 1.0, -1.0], [-9.0, 3.0, 1.0], s.clone()),
            box_surface([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0], s),
        ];
        let nodes = vec![
            WorldNode::internal(0, [1, 2]),
            WorldNode::leaf(0, 0, [0.0, -64.0, -64.0], [64.0, 64.0, 64.0], 0..2),
            WorldNode::internal(1, [3, 4]),
            WorldNode::leaf(0, 0, [-64.0, 0.0, -64.0], [0.0, 64.0, 64.0], 2..4),
            WorldNode::leaf(0, 0, [-64.0, -64.0, -64.0], [0.0, 0.0, 64.0], 4..5),
        ];
        World::new(
            "lights",
            nodes,
            vec![CPlane::new([1.0, 0.0, 0.0], 0.0), CPlane::new([0.0, 1.0, 0.0], 0.0)],
            surfaces,
            vec![0, 2, 1, 2, 2],
            VisData::without_vis(1),
        )
        .unwrap()
    }

    fn view_facing_x(origin: Vec3) -> ViewParms {
        ViewParms::new(origin, Frustum::from_view(origin, IDENTITY, 90.0, 90.0, 1.0, 1000.0))
    }

    fn setup(config: CullConfig) -> (World, WorldState, FrameContext, ViewParms) {
        let world = light_world();
        let mut state = WorldState::new(&world);
        let view = view_facing_x([-50.0, 0.0, 0.0]);
        mark_leaves(&world, &mut state, &config, &RefDef::default(), &view.pvs_origin).unwrap();
        (world, state, FrameContext::new(config), view)
    }

    fn kinds_by_surface(out: &[LightInteraction]) -> Vec<(InteractionSurface, InteractionBits)> {
        out.iter().map(|ia| (ia.surface, ia.kind)).collect()
    }

    #[test]
    fn test_light_front_of_split_visits_only_front_child() {
        let (world, mut state, mut frame, view) = setup(CullConfig::default());
        let light = LightVolume::omni([20.0, 0.0, 0.0], 15.0);
        let mut out = Vec::new();
        add_world_interactions(&world, &mut state, &mut frame, &view, &RefDef::default(), &light, &mut out);

        // root and the front leaf, never the back subtree
        assert_eq!(frame.pc.c_interaction_nodes, 2);
        assert_eq!(
            kinds_by_surface(&out),
            vec![(InteractionSurface::World(0), InteractionBits::DEFAULT)]
        );
    }

    #[test]
    fn test_light_straddling_split_visits_both_sides_once_per_surface() {
        let (world, mut state, mut frame, view) = setup(CullConfig::default());
        let light = LightVolume::omni([0.0, 0.0, 0.0], 20.0);
        let mut out = Vec::new();
        add_world_interactions(&world, &mut state, &mut frame, &view, &RefDef::default(), &light, &mut out);

        assert_eq!(frame.pc.c_interaction_nodes, 5);
        let mut surfaces: Vec<_> = out.iter().map(|ia| ia.surface).collect();
        surfaces.sort_by_key(|s| match s {
            InteractionSurface::World(id) | InteractionSurface::Mesh(id) => *id,
        });
        // surface 2 sits in three leafs but is emitted once
        assert_eq!(
            surfaces,
            vec![
                InteractionSurface::World(0),
                InteractionSurface::World(1),
                InteractionSurface::World(2)
            ]
        );
        assert_eq!(frame.pc.c_dlight_surfaces, 3);
    }

    #[test]
    fn test_walk_bits_never_grow_below_parent() {
        let (world, mut state, mut frame, view) = setup(CullConfig::default());
        frame.next_light_count();
        let light = LightVolume::omni([0.0, 0.0, 0.0], 20.0);
        let mut out: Vec<LightInteraction> = Vec::new();
        let mut walker = InteractionWalker {
            world: &world,
            state: &mut state,
            frame: &mut frame,
            frustum: &view.frustum,
            light: &light,
            sink: &mut out,
            visits: Vec::new(),
        };
        walker.recursive_interaction_node(0, FRUSTUM_CLIPALL, InteractionBits::DEFAULT);
        let visits = walker.visits;

        assert_eq!(visits.len(), 5);
        // the front leaf lies wholly inside the near plane
        let front = visits.iter().find(|v| v.0 == 1).unwrap();
        assert_ne!(visits[0].1 & (1 << FRUSTUM_NEAR), 0);
        assert_eq!(front.1 & (1 << FRUSTUM_NEAR), 0);
        for &(node, plane_bits, interaction_bits) in &visits {
            let parent = match world.nodes[node].parent {
                Some(parent) => parent,
                None => continue,
            };
            let &(_, parent_plane_bits, parent_interaction_bits) =
                visits.iter().find(|v| v.0 == parent).unwrap();
            assert_eq!(plane_bits & !parent_plane_bits, 0, "node {}", node);
            assert!(parent_interaction_bits.contains(interaction_bits), "node {}", node);
        }
    }

    #[test]
    fn test_shadow_without_visibility() {
        let (world, mut state, mut frame, _) = setup(CullConfig::default());
        // camera at x=-50 looking down -X sees none of the world's surfaces
        let back = [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]];
        let origin = [-50.0, 0.0, 0.0];
        let view = ViewParms::new(origin, Frustum::from_view(origin, back, 90.0, 90.0, 1.0, 1000.0));
        let light = LightVolume::omni([20.0, 0.0, 0.0], 15.0);
        let mut out = Vec::new();
        add_world_interactions(&world, &mut state, &mut frame, &view, &RefDef::default(), &light, &mut out);
        assert_eq!(
            kinds_by_surface(&out),
            vec![(InteractionSurface::World(0), InteractionBits::SHADOW)]
        );
    }

    #[test]
    fn test_low_shadow_quality_requests_light_only() {
        let config = CullConfig {
            shadowing: ShadowingMode::Blob,
            ..CullConfig::default()
        };
        let (world, mut state, mut frame, view) = setup(config);
        let light = LightVolume::omni([20.0, 0.0, 0.0], 15.0);
        let mut out = Vec::new();
        add_world_interactions(&world, &mut state, &mut frame, &view, &RefDef::default(), &light, &mut out);
        assert_eq!(
            kinds_by_surface(&out),
            vec![(InteractionSurface::World(0), InteractionBits::LIGHT)]
        );

        // light-only pass on a surface outside the view emits nothing
        let (world, mut state, mut frame, _) = setup(config);
        let back = [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]];
        let origin = [-50.0, 0.0, 0.0];
        let view = ViewParms::new(origin, Frustum::from_view(origin, back, 90.0, 90.0, 1.0, 1000.0));
        let mut out = Vec::new();
        add_world_interactions(&world, &mut state, &mut frame, &view, &RefDef::default(), &light, &mut out);
        assert!(out.is_empty());
        assert_eq!(frame.pc.c_interaction_nodes, 2);
    }

    #[test]
    fn test_no_shadows_light_requests_light_only() {
        let (world, mut state, mut frame, view) = setup(CullConfig::default());
        let mut light = LightVolume::omni([20.0, 0.0, 0.0], 15.0);
        light.no_shadows = true;
        light.is_static = true;
        let mut out = Vec::new();
        add_world_interactions(&world, &mut state, &mut frame, &view, &RefDef::default(), &light, &mut out);
        assert_eq!(out[0].kind, InteractionBits::LIGHT);
        assert_eq!(frame.pc.c_slight_surfaces, 1);
        assert_eq!(frame.pc.c_dlight_surfaces, 0);
    }

    #[test]
    fn test_sky_and_non_interacting_shaders_are_dropped() {
        let mut world = light_world();
        let mut sky = Shader::new("sky");
        sky.is_sky = true;
        world.surfaces[0].shader = Arc::new(sky);
        let mut state = WorldState::new(&world);
        let mut frame = FrameContext::default();
        let view = view_facing_x([-50.0, 0.0, 0.0]);
        let light = LightVolume::omni([20.0, 0.0, 0.0], 15.0);
        let mut out = Vec::new();
        add_world_interactions(&world, &mut state, &mut frame, &view, &RefDef::default(), &light, &mut out);
        assert!(out.is_empty());
        // only surface 2 reached the light cull, and missed the light box
        assert_eq!(frame.pc.c_dlight_surfaces_culled, 1);
        assert_eq!(frame.pc.c_dlight_surfaces, 0);
    }

    #[test]
    fn test_culled_surface_counts_for_dynamic_lights() {
        let (world, mut state, mut frame, _) = setup(CullConfig::default());
        // light box reaches the front leaf but not surface 0 at x=9..11
        let light = LightVolume::omni([1.0, 30.0, 0.0], 5.0);
        frame.next_light_count();
        add_interaction_surface(
            &world,
            &mut state,
            &mut frame,
            &light,
            0,
            InteractionBits::DEFAULT,
            &mut Vec::<LightInteraction>::new(),
        );
        assert_eq!(frame.pc.c_dlight_surfaces_culled, 1);

        let mut static_light = light.clone();
        static_light.is_static = true;
        frame.next_light_count();
        add_interaction_surface(
            &world,
            &mut state,
            &mut frame,
            &static_light,
            0,
            InteractionBits::DEFAULT,
            &mut Vec::<LightInteraction>::new(),
        );
        assert_eq!(frame.pc.c_dlight_surfaces_culled, 1);
    }

    #[test]
    fn test_registry_dedups_within_pass_and_resets_next_pass() {
        let (world, mut state, mut frame, _) = setup(CullConfig::default());
        let light = LightVolume::omni([10.0, 0.0, 0.0], 15.0);
        frame.next_light_count();
        let mut out = Vec::new();
        for bits in [InteractionBits::SHADOW, InteractionBits::DEFAULT, InteractionBits::LIGHT] {
            add_interaction_surface(&world, &mut state, &mut frame, &light, 0, bits, &mut out);
        }
        assert_eq!(
            out.iter().map(|ia| ia.kind).collect::<Vec<_>>(),
            vec![InteractionBits::SHADOW, InteractionBits::LIGHT]
        );

        frame.next_light_count();
        add_interaction_surface(&world, &mut state, &mut frame, &light, 0, InteractionBits::LIGHT, &mut out);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_world_toggles_suppress_walk() {
        let config = CullConfig {
            draw_world: false,
            ..CullConfig::default()
        };
        let (world, mut state, mut frame, view) = setup(config);
        let light = LightVolume::omni([20.0, 0.0, 0.0], 15.0);
        let mut out = Vec::new();
        add_world_interactions(&world, &mut state, &mut frame, &view, &RefDef::default(), &light, &mut out);
        assert!(out.is_empty());
        assert_eq!(frame.light_count, 0);

        let (world, mut state, mut frame, view) = setup(CullConfig::default());
        let refdef = RefDef {
            no_world_model: true,
            ..RefDef::default()
        };
        add_world_interactions(&world, &mut state, &mut frame, &view, &refdef, &light, &mut out);
        assert!(out.is_empty());
    }

    // ============================================================
    // Precached
    // ============================================================

    fn cached(surface: SurfaceId, kind: InteractionBits) -> CachedInteraction {
        CachedInteraction {
            surface,
            kind,
            cube_side_bits: CubeSideBits::POS_X,
            redundant: false,
            merged_into_vbo: false,
        }
    }

    fn precached_light() -> LightVolume {
        let mut light = LightVolume::omni([0.0; 3], 50.0);
        light.interaction_cache = vec![
            cached(0, InteractionBits::DEFAULT),
            CachedInteraction {
                redundant: true,
                ..cached(1, InteractionBits::DEFAULT)
            },
            CachedInteraction {
                merged_into_vbo: true,
                ..cached(2, InteractionBits::DEFAULT)
            },
            cached(1, InteractionBits::LIGHT),
        ];
        light.interaction_meshes = vec![
            InteractionMesh {
                light_mesh: Some(7),
                shadow_mesh: Some(8),
                shader: shader(),
                cube_side_bits: CubeSideBits::NEG_Z,
            },
            InteractionMesh {
                light_mesh: None,
                shadow_mesh: Some(9),
                shader: shader(),
                cube_side_bits: CubeSideBits::POS_Z,
            },
        ];
        light
    }

    #[test]
    fn test_precached_mesh_path_order_and_kinds() {
        let world = light_world();
        let mut state = WorldState::new(&world);
        let mut frame = FrameContext::default();
        frame.begin_view();
        state.surfaces[0].stamp_view(frame.view_count);

        let mut out = Vec::new();
        add_precached_world_interactions(&world, &state, &frame, &RefDef::default(), &precached_light(), &mut out);
        assert_eq!(
            kinds_by_surface(&out),
            vec![
                (InteractionSurface::Mesh(7), InteractionBits::LIGHT),
                (InteractionSurface::Mesh(8), InteractionBits::SHADOW),
                (InteractionSurface::Mesh(9), InteractionBits::SHADOW),
                (InteractionSurface::World(0), InteractionBits::DEFAULT),
                // surface 1 is outside the view, so it only casts
                (InteractionSurface::World(1), InteractionBits::SHADOW),
            ]
        );
        assert_eq!(out[0].cube_side_bits, CubeSideBits::CLIPALL);
        assert_eq!(out[2].cube_side_bits, CubeSideBits::POS_Z);
        assert_eq!(out[3].cube_side_bits, CubeSideBits::POS_X);
    }

    #[test]
    fn test_precached_without_meshes_includes_merged_entries() {
        let world = light_world();
        let mut state = WorldState::new(&world);
        let config = CullConfig {
            vbo_shadows: false,
            vbo_lighting: false,
            ..CullConfig::default()
        };
        let mut frame = FrameContext::new(config);
        frame.begin_view();
        for s in 0..3 {
            state.surfaces[s].stamp_view(frame.view_count);
        }

        let mut out = Vec::new();
        add_precached_world_interactions(&world, &state, &frame, &RefDef::default(), &precached_light(), &mut out);
        assert_eq!(
            kinds_by_surface(&out),
            vec![
                (InteractionSurface::World(0), InteractionBits::DEFAULT),
                (InteractionSurface::World(2), InteractionBits::DEFAULT),
                (InteractionSurface::World(1), InteractionBits::LIGHT),
            ]
        );
    }

    #[test]
    fn test_precached_out_of_view_skipped_at_low_quality_or_no_shadows() {
        let world = light_world();
        let state = WorldState::new(&world);
        let config = CullConfig {
            shadowing: ShadowingMode::Blob,
            ..CullConfig::default()
        };
        let mut frame = FrameContext::new(config);
        frame.begin_view();

        let mut out = Vec::new();
        add_precached_world_interactions(&world, &state, &frame, &RefDef::default(), &precached_light(), &mut out);
        assert!(out.iter().all(|ia| matches!(ia.surface, InteractionSurface::Mesh(_))));

        let mut frame = FrameContext::default();
        frame.begin_view();
        let mut light = precached_light();
        light.no_shadows = true;
        let mut out = Vec::new();
        add_precached_world_interactions(&world, &state, &frame, &RefDef::default(), &light, &mut out);
        assert!(out.iter().all(|ia| matches!(ia.surface, InteractionSurface::Mesh(_))));
    }

    #[test]
    fn test_precached_empty_cache_emits_nothing() {
        let world = light_world();
        let state = WorldState::new(&world);
        let frame = FrameContext::default();
        let mut light = precached_light();
        light.interaction_cache.clear();
        let mut out = Vec::new();
        add_precached_world_interactions(&world, &state, &frame, &RefDef::default(), &light, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_box_planes_bound_the_light() {
        let light = LightVolume::omni([0.0; 3], 10.0);
        assert_eq!(light.frustum.len(), 6);
        for plane in &light.frustum {
            assert!(plane.distance(&[0.0; 3]) > 0.0);
            assert!(plane.distance(&[5.0, -5.0, 5.0]) > 0.0);
        }
        assert!(light.frustum.iter().any(|p| p.distance(&[20.0, 0.0, 0.0]) < 0.0));
    }
}
