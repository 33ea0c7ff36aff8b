//! Error types for the tandem-market crate.
//!
//! All fallible market operations return typed errors rather than panicking.

use tandem_types::{DemandId, SupplyId};

/// Errors that can occur during market operations.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// A snapshot was applied to a supply it was not captured from.
    #[error("snapshot mismatch: image of supply {image_of} applied to supply {applied_to}")]
    SnapshotMismatch {
        /// The supply the image was captured from.
        image_of: SupplyId,
        /// The supply the caller tried to restore.
        applied_to: SupplyId,
    },

    /// A demand id was not present on the board.
    #[error("unknown demand: {0}")]
    UnknownDemand(DemandId),

    /// A demand was published under an id already in use.
    #[error("duplicate demand: {0}")]
    DuplicateDemand(DemandId),
}
