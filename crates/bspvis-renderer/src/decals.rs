// decals.rs - decal projector activation masks

use bspvis_common::q_shared::Vec3;

use crate::world_types::{Surface, SurfaceId};

/// Projectors past this index are never tracked by the world walk.
pub const MAX_DECAL_PROJECTORS: usize = 32;

/// A decal projector supplied by the host. Only its bounds test and the
/// projection hook are used here; the clipping math lives with the host.
pub trait DecalProjector {
    /// Projectors without a shader never touch the world.
    fn is_active(&self) -> bool {
        true
    }

    fn intersects_box(&self, mins: &Vec3, maxs: &Vec3) -> bool;

    fn project_onto_surface(&mut self, surface_id: SurfaceId, surface: &Surface);
}

/// One bit per active projector, in slice order.
pub fn initial_decal_bits(decals: &[&mut dyn DecalProjector]) -> u32 {
    decals
        .iter()
        .take(MAX_DECAL_PROJECTORS)
        .enumerate()
        .filter(|(_, d)| d.is_active())
        .fold(0, |bits, (i, _)| bits | (1 << i))
}

/// Drop every projector that no longer reaches the box. The result is always
/// a subset of `decal_bits`.
pub fn cull_decal_bits(
    decals: &[&mut dyn DecalProjector],
    mut decal_bits: u32,
    mins: &Vec3,
    maxs: &Vec3,
) -> u32 {
    if decal_bits == 0 {
        return 0;
    }
    for (i, decal) in decals.iter().take(MAX_DECAL_PROJECTORS).enumerate() {
        if decal_bits & (1 << i) == 0 {
            continue;
        }
        if !decal.is_active() || !decal.intersects_box(mins, maxs) {
            decal_bits &= !(1 << i);
        }
    }
    decal_bits
}

/// Apply every projector still in `decal_bits` to a surface.
pub fn project_decals(
    decals: &mut [&mut dyn DecalProjector],
    decal_bits: u32,
    surface_id: SurfaceId,
    surface: &Surface,
) {
    if decal_bits == 0 {
        return;
    }
    for (i, decal) in decals.iter_mut().take(MAX_DECAL_PROJECTORS).enumerate() {
        if decal_bits & (1 << i) != 0 {
            decal.project_onto_surface(surface_id, surface);
        }
    }
}
