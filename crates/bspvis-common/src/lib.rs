#![allow(clippy::needless_range_loop, clippy::float_cmp, clippy::manual_range_contains)]
// Shared math, console variables and error types for the visibility renderer

pub mod q_shared;
pub mod common;
pub mod cvar;
