// pvs.rs - point location, cluster visibility rows and PVS leaf marking

use bspvis_common::common::{com_dprintf, com_printf, VisError, VisResult};
use bspvis_common::q_shared::{Vec3, CONTENTS_SOLID};
use rayon::prelude::*;

use crate::config::CullConfig;
use crate::frame::{RefDef, WorldState, MAX_VISCOUNTS};
use crate::world_types::{NodeId, NodeKind, World, WorldNode, PARALLEL_THRESHOLD};

// ============================================================
// Point location
// ============================================================

/// Descend from the root to the leaf holding `p`. Points exactly on a
/// splitting plane go to the back child.
pub fn leaf_containing(world: Option<&World>, p: &Vec3) -> VisResult<NodeId> {
    let world = world.ok_or(VisError::NoWorldLoaded)?;
    let mut node = 0;
    loop {
        match world.nodes[node].kind {
            NodeKind::Leaf { .. } => return Ok(node),
            NodeKind::Internal { plane, children } => {
                let d = world.planes[plane].distance(p);
                node = if d > 0.0 { children[0] } else { children[1] };
            }
        }
    }
}

// ============================================================
// Cluster rows
// ============================================================

fn cluster_row<'a>(world: &'a World, rows: Option<&'a Vec<u8>>, cluster: i32) -> &'a [u8] {
    let vis = &world.vis;
    match rows {
        Some(rows) if cluster >= 0 && (cluster as usize) < vis.num_clusters => {
            let start = cluster as usize * vis.cluster_bytes;
            &rows[start..start + vis.cluster_bytes]
        }
        _ => {
            log::trace!("cluster {} has no vis row, using all-visible row", cluster);
            vis.novis_row()
        }
    }
}

/// PVS row of `cluster`, or the all-visible row when there is no data.
pub fn cluster_pvs(world: &World, cluster: i32) -> &[u8] {
    cluster_row(world, world.vis.vis.as_ref(), cluster)
}

/// Extended visibility row of `cluster`. Falls back like [`cluster_pvs`].
pub fn cluster_pvvs(world: &World, cluster: i32) -> &[u8] {
    // without a PVS the extended set is meaningless too
    let rows = world.vis.vis.as_ref().and(world.vis.visvis.as_ref());
    cluster_row(world, rows, cluster)
}

#[inline]
fn row_has_cluster(row: &[u8], cluster: i32) -> bool {
    if cluster < 0 {
        return false;
    }
    let cluster = cluster as usize;
    row.get(cluster >> 3)
        .is_some_and(|byte| byte & (1 << (cluster & 7)) != 0)
}

/// Whether `to` may be seen from `from`.
///
/// Always true without PVS data; false when either cluster is outside
/// `0..num_clusters`.
pub fn is_cluster_visible(world: &World, from: i32, to: i32) -> bool {
    let vis = &world.vis;
    if vis.vis.is_none() {
        return true;
    }
    let in_range = |c: i32| c >= 0 && (c as usize) < vis.num_clusters;
    if !in_range(from) || !in_range(to) {
        log::trace!("cluster pair {} -> {} out of range", from, to);
        return false;
    }
    row_has_cluster(cluster_pvs(world, from), to)
}

/// Point-to-point PVS test.
pub fn in_pvs(world: Option<&World>, p1: &Vec3, p2: &Vec3) -> VisResult<bool> {
    let leaf1 = leaf_containing(world, p1)?;
    let leaf2 = leaf_containing(world, p2)?;
    let world = world.ok_or(VisError::NoWorldLoaded)?;
    let from = world.nodes[leaf1].cluster();
    let to = world.nodes[leaf2].cluster();
    Ok(is_cluster_visible(world, from, to))
}

/// Point-to-point test against the extended visibility set.
pub fn in_pvvs(world: Option<&World>, p1: &Vec3, p2: &Vec3) -> VisResult<bool> {
    let leaf1 = leaf_containing(world, p1)?;
    let leaf2 = leaf_containing(world, p2)?;
    let world = world.ok_or(VisError::NoWorldLoaded)?;
    let from = world.nodes[leaf1].cluster();
    let to = world.nodes[leaf2].cluster();
    if world.vis.vis.is_none() {
        return Ok(true);
    }
    Ok(row_has_cluster(cluster_pvvs(world, from), to))
}

// ============================================================
// Leaf marking
// ============================================================

/// Mark the nodes that are potentially visible from `pvs_origin` with the
/// current ring slot's generation.
///
/// Reuses the ring slot of an earlier marking of the same cluster when the
/// area mask is unchanged. Returns the viewpoint cluster, or the cluster of
/// the frozen marking when the PVS is locked.
pub fn mark_leaves(
    world: &World,
    state: &mut WorldState,
    config: &CullConfig,
    refdef: &RefDef,
    pvs_origin: &Vec3,
) -> VisResult<i32> {
    // lockpvs lets designers walk around to see the extent of the current pvs
    if config.lock_pvs {
        return Ok(state.vis_cache.clusters[state.vis_cache.index]);
    }

    let view_leaf = leaf_containing(Some(world), pvs_origin)?;
    let cluster = world.nodes[view_leaf].cluster();
    let area = world.nodes[view_leaf].area();

    let cache = &mut state.vis_cache;
    if refdef.area_mask_modified {
        cache.invalidate();
        cache.index = 0;
    } else {
        if let Some(slot) = cache.find(cluster) {
            // r_showcluster just toggled: remark everything
            if !config.show_cluster_modified {
                if slot != cache.index && config.show_cluster {
                    com_printf(&format!(
                        "found cluster:{}  area:{}  index:{}\n",
                        cluster, area, slot
                    ));
                }
                cache.index = slot;
                return Ok(cluster);
            }
        }
        cache.index = (cache.index + 1) % MAX_VISCOUNTS;
    }

    let index = cache.index;
    cache.clusters[index] = cluster;
    cache.counts[index] = cache.counts[index].wrapping_add(1);
    let count = cache.counts[index];

    if config.show_cluster {
        com_printf(&format!(
            "update cluster:{}  area:{}  index:{}\n",
            cluster, area, index
        ));
    }

    if config.no_vis || cluster < 0 {
        com_dprintf(&format!("marking all leafs for cluster {}\n", cluster));
        mark_all_nodes(world, &mut state.node_vis_counts, index, count);
        return Ok(cluster);
    }

    let vis = cluster_pvs(world, cluster);
    let has_vis = world.vis.vis.is_some();

    for (n, node) in world.nodes.iter().enumerate() {
        let leaf_cluster = match node.kind {
            NodeKind::Leaf { cluster, .. } => cluster,
            NodeKind::Internal { .. } => continue,
        };

        // solid and outside leafs never reach the view
        if leaf_cluster < 0 {
            continue;
        }

        if has_vis && !row_has_cluster(vis, leaf_cluster) {
            continue;
        }

        // closed doors
        if refdef.area_hidden(node.area()) {
            continue;
        }

        let mut parent = Some(n);
        while let Some(p) = parent {
            if state.node_vis_counts[p][index] == count {
                break;
            }
            state.node_vis_counts[p][index] = count;
            parent = world.nodes[p].parent;
        }
    }

    Ok(cluster)
}

/// No-vis fallback: every non-solid node gets the new stamp.
fn mark_all_nodes(world: &World, node_vis_counts: &mut [[u32; MAX_VISCOUNTS]], index: usize, count: u32) {
    let stamp = |(node, counts): (&WorldNode, &mut [u32; MAX_VISCOUNTS])| {
        if node.contents != CONTENTS_SOLID {
            counts[index] = count;
        }
    };
    if world.nodes.len() >= PARALLEL_THRESHOLD {
        world
            .nodes
            .par_iter()
            .zip(node_vis_counts.par_iter_mut())
            .for_each(stamp);
    } else {
        world.nodes.iter().zip(node_vis_counts.iter_mut()).for_each(stamp);
    }
}

// ============================================================
// Tests
// ============================================================
