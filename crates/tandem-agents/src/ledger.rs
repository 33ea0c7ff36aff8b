//! Provisional work records.
//!
//! Every piece of work an agent performs is logged as a [`LedgerEntry`]
//! keyed by demand id: the local time it started, the local time it
//! finished (start plus actual effort), and the supply snapshots captured
//! immediately before each supply was mutated. The entry is the unit of
//! rollback -- restoring its images and resetting the clock to its start
//! time undoes the work exactly. An entry exists for a demand precisely
//! while the agent has applied effort to it and not yet rolled it back.

use serde::{Deserialize, Serialize};
use tandem_market::SupplyImage;

/// One provisional unit of work in an agent's ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    time_at_start: u64,
    time_at_finish: u64,
    images: Vec<SupplyImage>,
}

impl LedgerEntry {
    /// Record work starting at `start` local time, costing `effort` units,
    /// with the snapshots taken before each supply mutation.
    #[must_use]
    pub fn new(start: u64, effort: u32, images: Vec<SupplyImage>) -> Self {
        Self {
            time_at_start: start,
            time_at_finish: start.saturating_add(u64::from(effort)),
            images,
        }
    }

    /// Local time at which the work began.
    pub const fn time_at_start(&self) -> u64 {
        self.time_at_start
    }

    /// Local time at which the work finished.
    pub const fn time_at_finish(&self) -> u64 {
        self.time_at_finish
    }

    /// Actual effort expended.
    pub const fn effort(&self) -> u64 {
        self.time_at_finish.saturating_sub(self.time_at_start)
    }

    /// Supply snapshots captured before each mutation, in capture order.
    pub fn images(&self) -> &[SupplyImage] {
        &self.images
    }
}
