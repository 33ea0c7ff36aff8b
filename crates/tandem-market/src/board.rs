//! The shared demand arena.
//!
//! Every demand in the simulation lives in the [`DemandBoard`], keyed by id.
//! Agents hold `DemandId`s, never `Demand`s, so there is a single source of
//! truth for each demand's state no matter how many backlogs reference it.
//!
//! Publication assigns a monotonically increasing sequence number, which is
//! the deterministic tie-breaker when two demands share a priority: the one
//! published earlier is worked first.

use std::collections::BTreeMap;

use tandem_types::{DemandId, DemandState};
use tracing::debug;

use crate::demand::Demand;
use crate::error::MarketError;

/// Arena of all demands, in publication order.
#[derive(Debug, Default)]
pub struct DemandBoard {
    demands: BTreeMap<DemandId, Demand>,
    order: Vec<DemandId>,
    next_seq: u64,
}

impl DemandBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a demand: mark it `Queued`, assign its sequence number, and
    /// make it visible to agents.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::DuplicateDemand`] if the id is already on the
    /// board.
    pub fn publish(&mut self, mut demand: Demand) -> Result<DemandId, MarketError> {
        let id = demand.id();
        if self.demands.contains_key(&id) {
            return Err(MarketError::DuplicateDemand(id));
        }
        self.next_seq = self.next_seq.saturating_add(1);
        demand.set_queued(self.next_seq);
        debug!(
            demand = %id,
            name = demand.name(),
            kind = ?demand.kind(),
            priority = ?demand.priority(),
            effort = demand.effort(),
            seq = demand.seq(),
            "demand published"
        );
        self.order.push(id);
        self.demands.insert(id, demand);
        Ok(id)
    }

    /// Look up a demand by id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::UnknownDemand`] if the id is not on the board.
    pub fn get(&self, id: DemandId) -> Result<&Demand, MarketError> {
        self.demands.get(&id).ok_or(MarketError::UnknownDemand(id))
    }

    /// Look up a demand mutably by id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::UnknownDemand`] if the id is not on the board.
    pub fn get_mut(&mut self, id: DemandId) -> Result<&mut Demand, MarketError> {
        self.demands
            .get_mut(&id)
            .ok_or(MarketError::UnknownDemand(id))
    }

    /// Current state of a demand, if it exists.
    pub fn state_of(&self, id: DemandId) -> Option<DemandState> {
        self.demands.get(&id).map(Demand::state)
    }

    /// All demands in publication order.
    pub fn demands_in_order(&self) -> impl Iterator<Item = &Demand> {
        self.order.iter().filter_map(|id| self.demands.get(id))
    }

    /// Total demands ever published.
    #[must_use]
    pub fn demand_count(&self) -> usize {
        self.order.len()
    }

    /// Number of demands currently in the given state.
    #[must_use]
    pub fn count_in_state(&self, state: DemandState) -> usize {
        self.demands.values().filter(|d| d.state() == state).count()
    }
}
