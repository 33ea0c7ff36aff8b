//! Demand lifecycle and collaboration derivation.
//!
//! A [`Demand`] is a unit of work published on the shared board: a kind, a
//! priority, and an effort cost in virtual-time units. Agents claim demands
//! from the board, expend supplies against them, and either complete them or
//! get stuck part-way. A stuck demand records which supply kinds it has
//! already satisfied in its `partial` map, so a collaborator only has to
//! cover the rest.
//!
//! Collaboration demands are derived, never generated: [`Demand::collaboration`]
//! wraps a stuck demand in an `Urgent` request naming the stuck agent as
//! creator and the stuck demand as ancillary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_types::{AgentId, DemandId, DemandKind, DemandPriority, DemandState, SupplyKind};

/// A unit of work competed for by agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demand {
    id: DemandId,
    name: String,
    kind: DemandKind,
    priority: DemandPriority,
    state: DemandState,
    /// Virtual-time units of work this demand requires.
    effort: u32,
    /// Supply kinds already satisfied, with the effort expended on each.
    partial: BTreeMap<SupplyKind, u32>,
    /// For `Collaborate` demands: the stuck demand being rescued.
    ancillary: Option<DemandId>,
    /// For `Collaborate` demands: the agent stuck on the ancillary demand.
    creator: Option<AgentId>,
    /// Publication sequence number, assigned by the board. Breaks priority
    /// ties deterministically (earlier publication wins).
    seq: u64,
    created_at: DateTime<Utc>,
}

impl Demand {
    /// Define a new demand. It is not visible to agents until published.
    pub fn new(
        name: impl Into<String>,
        kind: DemandKind,
        priority: DemandPriority,
        effort: u32,
    ) -> Self {
        Self {
            id: DemandId::new(),
            name: name.into(),
            kind,
            priority,
            state: DemandState::Defined,
            effort: effort.max(1),
            partial: BTreeMap::new(),
            ancillary: None,
            creator: None,
            seq: 0,
            created_at: Utc::now(),
        }
    }

    /// Derive an `Urgent` collaboration demand from a stuck demand.
    ///
    /// The new demand carries the stuck demand's partial progress so the
    /// rescuer knows which supply kinds are already covered, and its own
    /// nominal effort is a tenth of the stuck demand's (at least one unit).
    #[must_use]
    pub fn collaboration(stuck: &Self, creator: AgentId) -> Self {
        let mut demand = Self::new(
            format!("collab:{}", stuck.name),
            DemandKind::Collaborate,
            DemandPriority::Urgent,
            (stuck.effort / 10).max(1),
        );
        demand.partial = stuck.partial.clone();
        demand.ancillary = Some(stuck.id);
        demand.creator = Some(creator);
        demand
    }

    /// Clone this demand under a fresh id, back in the `Queued` state.
    ///
    /// Used when a rescue rollback supersedes a demand: the original is
    /// marked `Replaced` and this clone re-enters circulation with the
    /// partial progress intact.
    #[must_use]
    pub fn clone_as_replacement(&self) -> Self {
        let mut clone = self.clone();
        clone.id = DemandId::new();
        clone.state = DemandState::Queued;
        clone.created_at = Utc::now();
        clone
    }

    /// Unique id of this demand.
    pub const fn id(&self) -> DemandId {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The category of work required.
    pub const fn kind(&self) -> DemandKind {
        self.kind
    }

    /// Scheduling priority.
    pub const fn priority(&self) -> DemandPriority {
        self.priority
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> DemandState {
        self.state
    }

    /// Virtual-time units of work required.
    pub const fn effort(&self) -> u32 {
        self.effort
    }

    /// Publication sequence number (0 until published).
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// For collaboration demands, the stuck demand being rescued.
    pub const fn ancillary(&self) -> Option<DemandId> {
        self.ancillary
    }

    /// For collaboration demands, the agent that raised the request.
    pub const fn creator(&self) -> Option<AgentId> {
        self.creator
    }

    /// Effort already expended against the given supply kind.
    pub fn partial_progress(&self, kind: SupplyKind) -> u32 {
        self.partial.get(&kind).copied().unwrap_or(0)
    }

    /// Supply kinds with recorded progress.
    pub const fn partial(&self) -> &BTreeMap<SupplyKind, u32> {
        &self.partial
    }

    /// Record effort expended against one supply kind.
    pub fn record_partial(&mut self, kind: SupplyKind, effort: u32) {
        self.partial.insert(kind, effort);
    }

    /// Replace the partial-progress map wholesale. Used when a failed
    /// attempt is unwound and the pre-attempt progress must come back.
    pub fn restore_partial(&mut self, partial: BTreeMap<SupplyKind, u32>) {
        self.partial = partial;
    }

    pub(crate) fn set_queued(&mut self, seq: u64) {
        self.state = DemandState::Queued;
        self.seq = seq;
    }

    /// Claim the demand for active work.
    pub fn mark_active(&mut self) {
        self.state = DemandState::Active;
    }

    /// Park the demand as partially satisfied, pending a collaborator.
    pub fn mark_partial(&mut self) {
        self.state = DemandState::Partial;
    }

    /// Return the demand to circulation after a rollback or failed attempt.
    pub fn mark_queued(&mut self) {
        self.state = DemandState::Queued;
    }

    /// Abandon the demand for good.
    pub fn mark_incomplete(&mut self) {
        self.state = DemandState::Incomplete;
    }

    /// Mark the demand superseded by a replacement clone.
    pub fn mark_replaced(&mut self) {
        self.state = DemandState::Replaced;
    }

    /// Mark the demand fully satisfied.
    pub fn mark_complete(&mut self) {
        self.state = DemandState::Complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_demand_starts_defined_with_positive_effort() {
        let demand = Demand::new("d1", DemandKind::Analysis, DemandPriority::Medium, 0);
        assert_eq!(demand.state(), DemandState::Defined);
        assert_eq!(demand.effort(), 1);
    }

    #[test]
    fn collaboration_carries_progress_and_provenance() {
        let mut stuck = Demand::new("d1", DemandKind::Modeling, DemandPriority::Low, 40);
        stuck.record_partial(SupplyKind::Analysis, 40);
        let creator = AgentId::new();

        let collab = Demand::collaboration(&stuck, creator);
        assert_eq!(collab.kind(), DemandKind::Collaborate);
        assert_eq!(collab.priority(), DemandPriority::Urgent);
        assert_eq!(collab.effort(), 4);
        assert_eq!(collab.ancillary(), Some(stuck.id()));
        assert_eq!(collab.creator(), Some(creator));
        assert_eq!(collab.partial_progress(SupplyKind::Analysis), 40);
    }

    #[test]
    fn collaboration_effort_is_at_least_one() {
        let stuck = Demand::new("d1", DemandKind::Analysis, DemandPriority::Low, 5);
        let collab = Demand::collaboration(&stuck, AgentId::new());
        assert_eq!(collab.effort(), 1);
    }

    #[test]
    fn replacement_gets_fresh_id_and_keeps_progress() {
        let mut demand = Demand::new("d1", DemandKind::Modeling, DemandPriority::High, 30);
        demand.record_partial(SupplyKind::Communication, 30);
        demand.mark_active();

        let clone = demand.clone_as_replacement();
        assert_ne!(clone.id(), demand.id());
        assert_eq!(clone.state(), DemandState::Queued);
        assert_eq!(clone.partial_progress(SupplyKind::Communication), 30);
        assert_eq!(clone.effort(), demand.effort());
    }
}
