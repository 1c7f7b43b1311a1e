// common.rs - print front-ends and the error type shared by client code

use thiserror::Error;

// ============================================================
// Com_Printf / Com_DPrintf
// ============================================================

/// General-purpose print. Routed to the `log` facade at info level.
pub fn com_printf(msg: &str) {
    log::info!("{}", msg.trim_end_matches('\n'));
}

/// Developer-only print. Routed to the `log` facade at debug level, so the
/// installed logger's filter decides whether it shows.
pub fn com_dprintf(msg: &str) {
    log::debug!("{}", msg.trim_end_matches('\n'));
}

// ============================================================
// Errors
// ============================================================

/// Errors surfaced by world queries.
///
/// Degraded visibility data (missing PVS rows, clusters out of range) is not
/// an error; it resolves to the all-visible fallback instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisError {
    /// A point, leaf or traversal query was issued with no world attached.
    #[error("no world loaded")]
    NoWorldLoaded,

    /// World data assembled from parts breaks a structural invariant.
    #[error("malformed world: {0}")]
    MalformedWorld(String),
}

pub type VisResult<T> = Result<T, VisError>;
