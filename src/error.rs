//! Error taxonomy for the compositor core.
//!
//! Recoverable conditions (resource exhaustion, protocol misuse, backend
//! loss) are represented here so call sites can match on kind rather than
//! stringly-typed errors. Structural/invariant-violation bugs are logged in
//! place via `tracing::error!` and the offending operation is skipped; they
//! do not produce a `CompositorError` because there is nothing a caller
//! could usefully do with one.

use thiserror::Error;

/// Errors surfaced by core subsystems (container tree, workspaces, layer
/// surfaces, protocol glue). Init-time failures (socket, backend, renderer)
/// are reported as `anyhow::Error` straight out of `main`, since they are
/// fatal and don't need a matchable kind.
#[derive(Debug, Error)]
pub enum CompositorError {
    /// Allocation failed while creating a view, container, workspace, layer
    /// surface, or protocol resource.
    #[error("failed to allocate {0}")]
    ResourceExhausted(&'static str),

    /// A client made a request the protocol forbids in the current state.
    #[error("protocol misuse by client: {0}")]
    ProtocolMisuse(&'static str),

    /// The GPU renderer reported itself lost and must be recreated.
    #[error("renderer lost: {0}")]
    BackendLost(String),

    /// Operation attempted on a view whose underlying surface is currently
    /// dissociated (xwayland surfaces between associate/dissociate).
    #[error("view has no associated surface")]
    Clientless,
}

pub type Result<T> = std::result::Result<T, CompositorError>;
