//! Agent state, backlog management, and commitment.
//!
//! An [`Agent`] owns its supplies exclusively and tracks every demand it
//! knows about in exactly one of four id lists: backlog (not yet done),
//! completed (done, still provisional), committed (done and causally safe),
//! or abandoned (gave up waiting for help). The scheduling loop itself
//! lives in [`crate::engine`]; this module holds the state and the
//! operations the environment drives directly -- board scans, commitment,
//! and wait timeouts.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tandem_market::{Demand, DemandBoard, Supply, SupplyDemandDictionary};
use tandem_types::{AgentId, AgentState, DemandId, DemandKind, DemandPriority, DemandState};
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::ledger::LedgerEntry;

/// An independently paced virtual-time worker.
#[derive(Debug)]
pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) name: String,
    pub(crate) state: AgentState,
    pub(crate) config: AgentConfig,

    /// Local virtual clock; monotone except through rollback.
    pub(crate) local_time: u64,
    /// Cumulative virtual time spent waiting on others.
    pub(crate) wait_time: u64,
    pub(crate) steps_since_active: u32,
    pub(crate) cycles_since_sync: u32,
    /// Urgent demands admitted to the backlog and not yet serviced; lets a
    /// waiting agent know a pivot is worth attempting.
    pub(crate) urgent_pending: u32,

    pub(crate) supplies: Vec<Supply>,

    pub(crate) backlog: Vec<DemandId>,
    pub(crate) completed: Vec<DemandId>,
    pub(crate) committed: Vec<DemandId>,
    pub(crate) abandoned: Vec<DemandId>,

    pub(crate) ledger: BTreeMap<DemandId, LedgerEntry>,
    pub(crate) interactions: BTreeMap<AgentId, u32>,

    pub(crate) current_task: Option<DemandId>,
    /// Holds the interrupted current task while a waiting agent pivots to
    /// an urgent request.
    pub(crate) backup_task: Option<DemandId>,

    pub(crate) rng: SmallRng,
}

impl Agent {
    /// Create an agent with the given behaviour parameters and no supplies.
    pub fn new(name: impl Into<String>, config: AgentConfig) -> Self {
        let config = config.normalized();
        let rng = SmallRng::seed_from_u64(config.seed);
        Self {
            id: AgentId::new(),
            name: name.into(),
            state: AgentState::Unavailable,
            config,
            local_time: 0,
            wait_time: 0,
            steps_since_active: 0,
            cycles_since_sync: 0,
            urgent_pending: 0,
            supplies: Vec::new(),
            backlog: Vec::new(),
            completed: Vec::new(),
            committed: Vec::new(),
            abandoned: Vec::new(),
            ledger: BTreeMap::new(),
            interactions: BTreeMap::new(),
            current_task: None,
            backup_task: None,
            rng,
        }
    }

    /// Grant the agent exclusive ownership of a supply.
    pub fn add_supply(&mut self, supply: Supply) {
        self.supplies.push(supply);
    }

    /// Unique id of this agent.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Local virtual clock.
    pub const fn local_time(&self) -> u64 {
        self.local_time
    }

    /// Cumulative virtual time spent waiting.
    pub const fn wait_time(&self) -> u64 {
        self.wait_time
    }

    /// The agent's supplies.
    pub fn supplies(&self) -> &[Supply] {
        &self.supplies
    }

    /// Demands queued for work.
    pub fn backlog(&self) -> &[DemandId] {
        &self.backlog
    }

    /// Provisionally completed demands.
    pub fn completed(&self) -> &[DemandId] {
        &self.completed
    }

    /// Demands whose completion is causally safe.
    pub fn committed(&self) -> &[DemandId] {
        &self.committed
    }

    /// Demands this agent gave up waiting on.
    pub fn abandoned(&self) -> &[DemandId] {
        &self.abandoned
    }

    /// The demand currently being worked or waited on, if any.
    pub const fn current_task(&self) -> Option<DemandId> {
        self.current_task
    }

    /// Behaviour parameters.
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Total collaborations across all partners.
    #[must_use]
    pub fn collaboration_count(&self) -> u32 {
        self.interactions
            .values()
            .fold(0_u32, |total, count| total.saturating_add(*count))
    }

    /// Per-partner interaction counts.
    pub const fn interactions(&self) -> &BTreeMap<AgentId, u32> {
        &self.interactions
    }

    /// Effort this agent expended on a demand, per its ledger.
    #[must_use]
    pub fn effort_spent_on(&self, demand: DemandId) -> u64 {
        self.ledger.get(&demand).map_or(0, LedgerEntry::effort)
    }

    /// Local time at which this agent started a demand, if it has a ledger
    /// entry for it.
    #[must_use]
    pub fn time_started_on(&self, demand: DemandId) -> Option<u64> {
        self.ledger.get(&demand).map(LedgerEntry::time_at_start)
    }

    /// Subscribe to the board: seed the backlog and go active.
    pub fn start(&mut self, board: &DemandBoard, dictionary: &SupplyDemandDictionary) {
        self.refresh_backlog(board, dictionary);
        self.state = AgentState::Active;
        info!(agent = self.name, backlog = self.backlog.len(), "agent started");
    }

    /// Scan the whole board for demands worth queueing.
    ///
    /// Skips demands that are complete, that this agent previously
    /// abandoned, that are already queued locally, and collaboration
    /// demands this agent itself raised. Everything else is admitted on a
    /// shallow achievability check.
    pub fn refresh_backlog(&mut self, board: &DemandBoard, dictionary: &SupplyDemandDictionary) {
        let candidates: Vec<DemandId> = board.demands_in_order().map(Demand::id).collect();
        for id in candidates {
            let Ok(demand) = board.get(id) else { continue };
            match demand.state() {
                DemandState::Complete => continue,
                DemandState::Incomplete if self.abandoned.contains(&id) => continue,
                _ => {}
            }
            if self.backlog.contains(&id) {
                continue;
            }
            if demand.kind() == DemandKind::Collaborate && demand.creator() == Some(self.id) {
                continue;
            }
            if self.demand_achievable_any(demand, board, dictionary) {
                debug!(agent = self.name, demand = %id, "added demand to backlog");
                self.backlog.push(id);
            }
        }
        self.cycles_since_sync = 0;
    }

    /// React to a newly published demand.
    ///
    /// A collaboration demand this agent itself raised is never queued; it
    /// only reaffirms the waiting state. Any other queued demand passing a
    /// shallow achievability check joins the backlog, and urgent arrivals
    /// bump the pivot counter.
    pub fn on_new_demand(
        &mut self,
        id: DemandId,
        board: &DemandBoard,
        dictionary: &SupplyDemandDictionary,
    ) -> Result<(), AgentError> {
        let demand = board.get(id)?;
        if demand.state() != DemandState::Queued {
            return Ok(());
        }
        if demand.kind() == DemandKind::Collaborate && demand.creator() == Some(self.id) {
            if self.state != AgentState::Waiting {
                // Missed or dropped the original wait; pick it back up.
                self.state = AgentState::Waiting;
                self.current_task = demand.ancillary();
            }
            return Ok(());
        }
        if self.backlog.contains(&id) {
            return Ok(());
        }
        if self.demand_achievable_any(demand, board, dictionary) {
            debug!(agent = self.name, demand = %id, "added demand to backlog");
            self.backlog.push(id);
            if demand.priority() == DemandPriority::Urgent {
                self.urgent_pending = self.urgent_pending.saturating_add(1);
            }
        }
        Ok(())
    }

    /// Migrate completed demands finished at or before `time` into the
    /// committed list.
    pub fn commit_until(&mut self, time: u64) {
        let ledger = &self.ledger;
        let (commit, keep): (Vec<DemandId>, Vec<DemandId>) = self
            .completed
            .drain(..)
            .partition(|id| ledger.get(id).is_some_and(|entry| entry.time_at_finish() <= time));
        if !commit.is_empty() {
            debug!(agent = self.name, committed = commit.len(), until = time, "committed work");
        }
        self.committed.extend(commit);
        self.completed = keep;
    }

    /// Give up on a wait that found no collaborator.
    ///
    /// The stuck demand is marked incomplete and moved to the abandoned
    /// list, and both the local clock and the wait-time tally take a fixed
    /// penalty per allowed wait cycle.
    pub fn release_wait(&mut self, board: &mut DemandBoard) -> Result<(), AgentError> {
        if let Some(id) = self.current_task {
            warn!(
                agent = self.name,
                demand = %id,
                "no collaborators found; marking demand incomplete and moving on"
            );
            board.get_mut(id)?.mark_incomplete();
            self.backlog.retain(|d| *d != id);
            self.abandoned.push(id);
        }
        let penalty = self
            .config
            .incomplete_penalty
            .saturating_mul(u64::from(self.config.max_wait_cycles));
        self.local_time = self.local_time.saturating_add(penalty);
        self.wait_time = self.wait_time.saturating_add(penalty);
        self.current_task = None;
        self.steps_since_active = 0;
        self.state = AgentState::Active;
        Ok(())
    }

    /// Count one more collaboration with the given partner.
    pub(crate) fn bump_interactions(&mut self, partner: AgentId) {
        let count = self.interactions.entry(partner).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Shallow achievability for a demand, resolving collaboration demands
    /// to their ancillary demand's kind.
    pub(crate) fn demand_achievable_any(
        &mut self,
        demand: &Demand,
        board: &DemandBoard,
        dictionary: &SupplyDemandDictionary,
    ) -> bool {
        let Some(kind) = Self::effective_kind(demand, board) else {
            return false;
        };
        dictionary.is_achievable_any(demand, kind, &mut self.supplies, self.local_time)
    }

    /// The kind whose requirements govern a demand: its own, or for a
    /// collaboration demand, the ancillary demand's.
    pub(crate) fn effective_kind(demand: &Demand, board: &DemandBoard) -> Option<DemandKind> {
        if demand.kind() == DemandKind::Collaborate {
            let ancillary = demand.ancillary()?;
            board.get(ancillary).ok().map(Demand::kind)
        } else {
            Some(demand.kind())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tandem_market::Supply;
    use tandem_types::{SupplyKind, SupplyQuality};

    use super::*;

    fn make_agent(name: &str) -> Agent {
        let mut agent = Agent::new(name, AgentConfig::default());
        agent.add_supply(Supply::new(
            "analysis",
            SupplyKind::Analysis,
            SupplyQuality::Medium,
            100,
        ));
        agent.add_supply(Supply::new(
            "development",
            SupplyKind::Development,
            SupplyQuality::Medium,
            100,
        ));
        agent
    }

    fn make_board_with(demands: Vec<Demand>) -> DemandBoard {
        let mut board = DemandBoard::new();
        for demand in demands {
            board.publish(demand).unwrap();
        }
        board
    }

    #[test]
    fn start_seeds_backlog_with_achievable_demands() {
        let dictionary = SupplyDemandDictionary::standard();
        let board = make_board_with(vec![
            Demand::new("dev", DemandKind::Development, DemandPriority::Medium, 10),
            Demand::new("mgmt", DemandKind::Management, DemandPriority::Medium, 10),
        ]);
        let mut agent = make_agent("a");
        agent.start(&board, &dictionary);
        assert_eq!(agent.state(), AgentState::Active);
        // Management needs Communication/Management supplies the agent lacks.
        assert_eq!(agent.backlog().len(), 1);
    }

    #[test]
    fn refresh_skips_own_abandoned_demands() {
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = make_board_with(vec![Demand::new(
            "dev",
            DemandKind::Development,
            DemandPriority::Medium,
            10,
        )]);
        let id = board.demands_in_order().next().map(Demand::id).unwrap();
        board.get_mut(id).unwrap().mark_incomplete();

        let mut agent = make_agent("a");
        agent.abandoned.push(id);
        agent.refresh_backlog(&board, &dictionary);
        assert!(agent.backlog().is_empty());
    }

    #[test]
    fn new_urgent_demand_bumps_pivot_counter() {
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let mut agent = make_agent("a");

        // A collaboration demand raised by someone else, rescuing a
        // development demand this agent could serve.
        let mut stuck = Demand::new("dev", DemandKind::Development, DemandPriority::Medium, 20);
        stuck.mark_partial();
        let stuck_id = board.publish(stuck).unwrap();
        let stuck_ref = board.get(stuck_id).unwrap();
        let collab = Demand::collaboration(stuck_ref, AgentId::new());
        let collab_id = board.publish(collab).unwrap();

        agent.on_new_demand(collab_id, &board, &dictionary).unwrap();
        assert_eq!(agent.backlog(), &[collab_id]);
        assert_eq!(agent.urgent_pending, 1);
    }

    #[test]
    fn own_collaboration_demand_is_not_queued() {
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let mut agent = make_agent("a");

        let stuck = Demand::new("dev", DemandKind::Development, DemandPriority::Medium, 20);
        let stuck_id = board.publish(stuck).unwrap();
        let collab = Demand::collaboration(board.get(stuck_id).unwrap(), agent.id());
        let collab_id = board.publish(collab).unwrap();

        agent.on_new_demand(collab_id, &board, &dictionary).unwrap();
        assert!(agent.backlog().is_empty());
        assert_eq!(agent.state(), AgentState::Waiting);
        assert_eq!(agent.current_task(), Some(stuck_id));
    }

    #[test]
    fn commit_until_migrates_only_finished_work() {
        let mut agent = make_agent("a");
        let early = DemandId::new();
        let late = DemandId::new();
        agent.completed = vec![early, late];
        agent.ledger.insert(early, LedgerEntry::new(0, 5, Vec::new()));
        agent.ledger.insert(late, LedgerEntry::new(5, 10, Vec::new()));

        agent.commit_until(5);
        assert_eq!(agent.committed(), &[early]);
        assert_eq!(agent.completed(), &[late]);
    }

    #[test]
    fn release_wait_abandons_and_penalizes() {
        let mut board = make_board_with(vec![Demand::new(
            "dev",
            DemandKind::Development,
            DemandPriority::Medium,
            10,
        )]);
        let id = board.demands_in_order().next().map(Demand::id).unwrap();

        let mut agent = make_agent("a");
        agent.state = AgentState::Waiting;
        agent.current_task = Some(id);
        agent.backlog.push(id);
        agent.release_wait(&mut board).unwrap();

        assert_eq!(board.state_of(id), Some(DemandState::Incomplete));
        assert_eq!(agent.abandoned(), &[id]);
        assert!(agent.backlog().is_empty());
        // Default penalty 8 over 5 allowed wait cycles.
        assert_eq!(agent.local_time(), 40);
        assert_eq!(agent.wait_time(), 40);
        assert_eq!(agent.state(), AgentState::Active);
    }
}
