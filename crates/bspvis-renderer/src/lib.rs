#![allow(clippy::needless_range_loop, clippy::too_many_arguments)]
// BSP world visibility: PVS marking, frustum culling and light interaction
// determination for the world model.

pub mod config;
pub mod world_types;
pub mod registry;
pub mod frame;
pub mod cull;
pub mod decals;
pub mod pvs;
pub mod interactions;
pub mod world_surfaces;
pub mod renderer;

pub use renderer::{VisibleWorldSurfaces, WorldRenderer};
