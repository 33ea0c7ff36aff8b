//! Error types for the tandem-agents crate.
//!
//! Expected branches of the scheduling loop (skips, failures, timeouts) are
//! plain [`tandem_types::TaskOutcome`] values, not errors. Errors here mean
//! the simulation's own bookkeeping is inconsistent: a dangling id or a
//! malformed collaboration demand.

use tandem_types::{AgentId, DemandId};

/// Errors that can occur during agent operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A market-level lookup or snapshot operation failed.
    #[error(transparent)]
    Market(#[from] tandem_market::MarketError),

    /// A collaboration demand referenced an agent not present in the
    /// simulation.
    #[error("unknown peer agent: {0}")]
    UnknownPeer(AgentId),

    /// A demand of kind `Collaborate` was missing its ancillary demand or
    /// creator reference.
    #[error("malformed collaboration demand: {0}")]
    MalformedCollaboration(DemandId),
}
