// world_surfaces.rs - camera pass over the BSP and brush sub-model surfaces

use std::sync::Arc;

use bspvis_common::q_shared::add_bounds_to_bounds;

use crate::cull::{cull_box_masked, cull_surface, CullResult, CullView, Frustum, Orientation, FRUSTUM_CLIPALL};
use crate::decals::{cull_decal_bits, initial_decal_bits, project_decals, DecalProjector};
use crate::frame::{FrameContext, RefDef, ViewParms, WorldState};
use crate::pvs::mark_leaves;
use crate::world_types::{NodeId, NodeKind, Shader, SurfaceId, World};

use bspvis_common::common::VisResult;

/// An accepted surface, ready for sorting and submission.
#[derive(Debug, Clone)]
pub struct DrawSurface {
    pub surface: SurfaceId,
    pub shader: Arc<Shader>,
    pub lightmap_num: i32,
    pub fog_index: i32,
    pub front_face: bool,
}

pub trait DrawSurfaceSink {
    fn add_draw_surface(&mut self, surface: DrawSurface);
}

impl DrawSurfaceSink for Vec<DrawSurface> {
    fn add_draw_surface(&mut self, surface: DrawSurface) {
        self.push(surface);
    }
}

/// Inline model instance placed in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushEntity {
    pub model: usize,
    pub orientation: Orientation,
    pub fog_index: i32,
}

// ============================================================
// Surface acceptance
// ============================================================

/// Stamp, cull and emit one surface. Returns true when it was emitted.
#[allow(clippy::too_many_arguments)]
fn add_surface<S: DrawSurfaceSink + ?Sized>(
    world: &World,
    state: &mut WorldState,
    frame: &mut FrameContext,
    view: &CullView<'_>,
    surface_id: SurfaceId,
    fog_index: Option<i32>,
    sink: &mut S,
) -> bool {
    // already added through another leaf
    if !state.surfaces[surface_id].stamp_view(frame.view_count) {
        return false;
    }

    let surface = &world.surfaces[surface_id];
    let visibility = match cull_surface(&surface.geometry, &surface.shader, view, &frame.config, &mut frame.pc) {
        Some(visibility) => visibility,
        None => return false,
    };

    sink.add_draw_surface(DrawSurface {
        surface: surface_id,
        shader: surface.shader.clone(),
        lightmap_num: surface.lightmap_num,
        fog_index: fog_index.unwrap_or(surface.fog_index),
        front_face: visibility.front_face,
    });
    true
}

// ============================================================
// World walk
// ============================================================

struct WorldWalker<'a, 'd, S: DrawSurfaceSink> {
    world: &'a World,
    state: &'a mut WorldState,
    frame: &'a mut FrameContext,
    view: &'a ViewParms,
    decals: &'a mut [&'d mut dyn DecalProjector],
    sink: &'a mut S,
    /// Node, plane bits and decal bits at each step of the walk.
    #[cfg(test)]
    visits: Vec<(NodeId, u32, u32)>,
}

impl<S: DrawSurfaceSink> WorldWalker<'_, '_, S> {
    fn recursive_world_node(&mut self, mut node: NodeId, mut plane_bits: u32, mut decal_bits: u32) {
        let world = self.world;
        loop {
            let n = &world.nodes[node];

            // not potentially visible from the view cluster
            if !self.state.node_marked(node) {
                return;
            }

            // don't waste time dealing with this empty leaf
            if n.is_leaf() && n.num_marks() == 0 {
                return;
            }

            if !self.frame.config.no_cull
                && cull_box_masked(&self.view.frustum.planes, &n.mins, &n.maxs, &mut plane_bits) == CullResult::Out
            {
                return;
            }

            decal_bits = cull_decal_bits(self.decals, decal_bits, &n.mins, &n.maxs);

            #[cfg(test)]
            self.visits.push((node, plane_bits, decal_bits));

            match n.kind {
                NodeKind::Internal { children, .. } => {
                    // front side first, then continue down the back
                    self.recursive_world_node(children[0], plane_bits, decal_bits);
                    node = children[1];
                }
                NodeKind::Leaf { .. } => break,
            }
        }

        self.add_leaf_surfaces(node, decal_bits);
    }

    fn add_leaf_surfaces(&mut self, node: NodeId, decal_bits: u32) {
        let world = self.world;
        let n = &world.nodes[node];

        self.frame.pc.c_leafs += 1;

        // add to z buffer bounds
        let [mins, maxs] = &mut self.frame.vis_bounds;
        add_bounds_to_bounds(&n.mins, &n.maxs, mins, maxs);

        let view = self.view;
        let cull_view = CullView {
            frustum: &view.frustum,
            view_origin: view.origin,
        };
        for &surface_id in world.leaf_marks(node) {
            if add_surface(world, self.state, self.frame, &cull_view, surface_id, None, self.sink) {
                project_decals(self.decals, decal_bits, surface_id, &world.surfaces[surface_id]);
            }
        }
    }
}

/// Camera pass: mark the PVS from the view cluster, then walk the tree and
/// emit every surface that survives culling, at most once.
///
/// Accepts surfaces under the current view generation and resets the frame's
/// visible bounds.
pub fn add_world_surfaces<S: DrawSurfaceSink>(
    world: &World,
    state: &mut WorldState,
    frame: &mut FrameContext,
    view: &ViewParms,
    refdef: &RefDef,
    decals: &mut [&mut dyn DecalProjector],
    sink: &mut S,
) -> VisResult<()> {
    if !frame.config.draw_world || refdef.no_world_model {
        return Ok(());
    }

    frame.clear_vis_bounds();

    mark_leaves(world, state, &frame.config, refdef, &view.pvs_origin)?;

    let decal_bits = initial_decal_bits(decals);
    let mut walker = WorldWalker {
        world,
        state,
        frame,
        view,
        decals,
        sink,
        #[cfg(test)]
        visits: Vec::new(),
    };
    walker.recursive_world_node(0, FRUSTUM_CLIPALL, decal_bits);
    Ok(())
}

// ============================================================
// Brush models
// ============================================================

/// Add the surfaces of an inline model for the current view generation.
///
/// The entity's local bounds are tested against the view frustum moved into
/// the entity's space; surviving surfaces take the entity's fog index.
pub fn add_brush_model_surfaces<S: DrawSurfaceSink>(
    world: &World,
    state: &mut WorldState,
    frame: &mut FrameContext,
    view: &ViewParms,
    entity: &BrushEntity,
    sink: &mut S,
) -> VisResult<()> {
    let model = match world.models.get(entity.model) {
        Some(model) => model,
        None => {
            log::debug!("brush entity references missing model {}", entity.model);
            return Ok(());
        }
    };

    let local_frustum: Frustum = view.frustum.to_local(&entity.orientation);
    if !frame.config.no_cull && local_frustum.cull_box(&model.mins, &model.maxs) == CullResult::Out {
        return Ok(());
    }

    let local_view = CullView {
        frustum: &local_frustum,
        view_origin: entity.orientation.world_point_to_local(&view.origin),
    };
    for surface_id in model.first_surface..model.first_surface + model.num_surfaces {
        add_surface(world, state, frame, &local_view, surface_id, Some(entity.fog_index), sink);
    }
    Ok(())
}

// ============================================================
// Tests
// ============================================================
