//! Enumeration types for the Tandem simulation.
//!
//! Orderings matter here: [`DemandPriority`] and [`SupplyQuality`] derive
//! `Ord` so that backlog sorting and quality gating are plain comparisons.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Demand enumerations
// ---------------------------------------------------------------------------

/// Priority of a demand, ordered low to urgent.
///
/// Backlogs are worked highest-priority-first. `Urgent` is reserved for
/// collaboration demands raised on behalf of a stuck agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DemandPriority {
    /// Lowest priority.
    Low,
    /// Between low and medium.
    MediumLow,
    /// Default priority.
    Medium,
    /// Between medium and high.
    MediumHigh,
    /// High priority.
    High,
    /// Reserved for collaboration requests; preempts everything else.
    Urgent,
}

/// The category of work a demand represents.
///
/// Each kind maps, through the compatibility dictionary, onto the supply
/// kinds needed to service it. `Collaborate` is reserved: such demands are
/// only ever created by agents asking for help, never injected by the
/// environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DemandKind {
    /// Software development work.
    Development,
    /// Data analysis work.
    Analysis,
    /// Model building work.
    Modeling,
    /// Communication work.
    Communication,
    /// Project management work.
    Management,
    /// A request for a second agent to finish a partially completed demand.
    Collaborate,
}

impl DemandKind {
    /// All kinds the environment may generate spontaneously
    /// (everything except `Collaborate`).
    pub const GENERATABLE: [Self; 5] = [
        Self::Development,
        Self::Analysis,
        Self::Modeling,
        Self::Communication,
        Self::Management,
    ];
}

/// Lifecycle state of a demand.
///
/// ```text
/// DEFINED → QUEUED → ACTIVE → COMPLETE
///                      ├──→ PARTIAL ──→ COMPLETE   (needs a collaborator)
///                      ├──→ INCOMPLETE             (abandoned on timeout)
///                      └──→ REPLACED               (superseded by a clone)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DemandState {
    /// Defined but not yet published to agents.
    Defined,
    /// Published on the shared board, available for selection.
    Queued,
    /// Claimed and being worked by an agent.
    Active,
    /// Some required supply kinds satisfied; waiting on a collaborator.
    Partial,
    /// Abandoned: the owner gave up waiting for help.
    Incomplete,
    /// Superseded by a re-queued clone during a rescue rollback.
    Replaced,
    /// Fully satisfied; no further action.
    Complete,
}

// ---------------------------------------------------------------------------
// Supply enumerations
// ---------------------------------------------------------------------------

/// The category of capability a supply provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SupplyKind {
    /// Software development skill.
    Development,
    /// Data analysis skill.
    Analysis,
    /// Model building skill.
    Modeling,
    /// Communication skill.
    Communication,
    /// Project management skill.
    Management,
}

/// Quality tier of a supply, ordered low to high.
///
/// A supply satisfies a requirement only when its quality is at or above
/// the requirement's minimum tier. Sustained use promotes a supply one
/// tier at a time (see the learning counter on `Supply`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SupplyQuality {
    /// Lowest tier.
    Low,
    /// Between low and medium.
    MediumLow,
    /// Middle tier.
    Medium,
    /// Between medium and high.
    MediumHigh,
    /// Highest tier; no further promotion possible.
    High,
}

impl SupplyQuality {
    /// The next tier up, or `None` if already at the top.
    pub const fn promoted(self) -> Option<Self> {
        match self {
            Self::Low => Some(Self::MediumLow),
            Self::MediumLow => Some(Self::Medium),
            Self::Medium => Some(Self::MediumHigh),
            Self::MediumHigh => Some(Self::High),
            Self::High => None,
        }
    }
}

/// Availability state of a supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SupplyState {
    /// Exists and is ready for use.
    Available,
    /// Past its expiry; no longer usable.
    Expired,
    /// Fully used up and not replenishable.
    Exhausted,
}

// ---------------------------------------------------------------------------
// Agent enumerations
// ---------------------------------------------------------------------------

/// Lifecycle state of an agent.
///
/// Agents start `Unavailable`, become `Active` once subscribed to the
/// demand board, and oscillate between `Active`, `Waiting` (blocked on a
/// collaborator) and `Communicating` (transiently, while expending effort
/// on a collaboration). There is no terminal state; the environment simply
/// stops issuing cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentState {
    /// Working through the backlog.
    Active,
    /// Blocked pending help from a collaborator.
    Waiting,
    /// Transient: expending effort on a collaboration.
    Communicating,
    /// Not yet started (initial state).
    Unavailable,
}

/// Outcome of one task-selection attempt by an agent.
///
/// Every variant is an expected branch of the scheduling loop, so these
/// are plain values rather than errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// Resource shortfall that even replenishment could not cover; any
    /// partial mutation was rolled back before returning.
    Fail,
    /// The demand was fully or partially advanced as designed.
    Success,
    /// The demand was already resolved elsewhere; dropped from the backlog.
    SkipComplete,
    /// The collaboration's ancillary demand was already abandoned or
    /// superseded; dropped from the backlog.
    SkipIncomplete,
    /// Causal prerequisite not yet satisfied; the backlog entry is kept
    /// and a different entry is tried this cycle.
    SkipTooEarly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_is_low_to_urgent() {
        assert!(DemandPriority::Low < DemandPriority::Medium);
        assert!(DemandPriority::High < DemandPriority::Urgent);
    }

    #[test]
    fn quality_ordering_gates_requirements() {
        assert!(SupplyQuality::Medium >= SupplyQuality::Low);
        assert!(SupplyQuality::Low < SupplyQuality::High);
    }

    #[test]
    fn quality_promotion_stops_at_high() {
        assert_eq!(SupplyQuality::Low.promoted(), Some(SupplyQuality::MediumLow));
        assert_eq!(SupplyQuality::MediumHigh.promoted(), Some(SupplyQuality::High));
        assert_eq!(SupplyQuality::High.promoted(), None);
    }

    #[test]
    fn generatable_kinds_exclude_collaborate() {
        assert!(!DemandKind::GENERATABLE.contains(&DemandKind::Collaborate));
        assert_eq!(DemandKind::GENERATABLE.len(), 5);
    }

    #[test]
    fn enums_roundtrip_serde() {
        let json = serde_json::to_string(&DemandState::Partial).ok();
        let back: Option<DemandState> =
            json.as_deref().and_then(|j| serde_json::from_str(j).ok());
        assert_eq!(back, Some(DemandState::Partial));
    }
}
