//! The per-cycle scheduling, rollback, and collaboration loop.
//!
//! Once per environment cycle each agent receives a pulse. An active agent
//! picks the highest-priority demand off its backlog (ties broken by
//! earliest publication) and tries to complete it; a waiting agent either
//! pivots to an urgent collaboration request or edges towards its wait
//! timeout. All the optimistic machinery lives here:
//!
//! - effort expenditure with snapshot-before-mutate supply accounting,
//! - full rollback (restore snapshots, rewind the clock, requeue the work),
//! - partial rollback (rescue a behind-schedule collaborator by replaying a
//!   completed demand with capped effort),
//! - the collaboration handshake between a helper and the stuck creator.
//!
//! Outcomes of a single attempt are [`TaskOutcome`] values; `Err` is
//! reserved for inconsistent bookkeeping (dangling ids, malformed
//! collaboration demands).

use std::collections::BTreeMap;

use rand::Rng;
use tandem_market::{DemandBoard, SupplyDemandDictionary, SupplyImage};
use tandem_types::{AgentId, AgentState, DemandId, DemandKind, DemandPriority, DemandState, TaskOutcome};
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::error::AgentError;
use crate::ledger::LedgerEntry;
use crate::signal::AgentSignal;

/// Collaboration effort after the learning-curve discount.
///
/// `ceil(base * exp(-interactions * rate))`, never below one unit: the more
/// often two agents have worked together, the cheaper the joint overhead.
#[must_use]
pub fn discounted_effort(base: u32, interactions: u32, rate: f64) -> u32 {
    let scaled = f64::from(base) * (-f64::from(interactions) * rate).exp();
    let clamped = scaled.ceil().clamp(1.0, f64::from(u32::MAX));
    // Clamped to [1, u32::MAX] above, so the cast is exact enough.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        clamped as u32
    }
}

impl Agent {
    /// Handle one simulation pulse.
    ///
    /// Active agents work their backlog and occasionally ask for a backlog
    /// refresh. Waiting agents pivot to urgent requests when any are
    /// pending, and otherwise creep towards their wait timeout.
    ///
    /// # Errors
    ///
    /// Returns an error only on inconsistent bookkeeping (dangling demand
    /// ids or malformed collaboration demands).
    pub fn finish_cycle_pulse(
        &mut self,
        board: &mut DemandBoard,
        dictionary: &SupplyDemandDictionary,
        peers: &mut BTreeMap<AgentId, Agent>,
        signals: &mut Vec<AgentSignal>,
    ) -> Result<(), AgentError> {
        match self.state {
            AgentState::Active => {
                self.cycles_since_sync = self.cycles_since_sync.saturating_add(1);
                self.complete_next_task(false, board, dictionary, peers, signals)?;
                if self.cycles_since_sync >= self.config.sync_backlog_every {
                    signals.push(AgentSignal::RefreshBacklog { agent: self.id });
                }
            }
            AgentState::Waiting if self.urgent_pending > 0 => {
                self.cycles_since_sync = self.cycles_since_sync.saturating_add(1);
                self.backup_task = self.current_task;
                if self.complete_next_task(true, board, dictionary, peers, signals)? {
                    self.urgent_pending = self.urgent_pending.saturating_sub(1);
                } else {
                    debug!(agent = self.name, "unable to pivot to collaborate; continuing to wait");
                }
                self.current_task = self.backup_task.take();
                if let Some(current) = self.current_task {
                    if board.state_of(current) == Some(DemandState::Partial) {
                        // Still stuck on our own demand after the pivot.
                        self.state = AgentState::Waiting;
                    }
                }
            }
            _ => {
                self.steps_since_active = self.steps_since_active.saturating_add(1);
                if self.steps_since_active >= self.config.max_wait_cycles {
                    self.release_wait(board)?;
                }
            }
        }
        Ok(())
    }

    /// Work through the backlog until one demand succeeds or fails.
    ///
    /// The backlog is sorted highest-priority-first, ties broken by earliest
    /// publication. `urgent_only` restricts attention to urgent demands (the
    /// waiting-agent pivot). Returns whether a demand was completed; with
    /// `urgent_only`, an exhausted backlog also counts as serviced so the
    /// pivot counter drains.
    ///
    /// # Errors
    ///
    /// Returns an error only on inconsistent bookkeeping.
    pub fn complete_next_task(
        &mut self,
        urgent_only: bool,
        board: &mut DemandBoard,
        dictionary: &SupplyDemandDictionary,
        peers: &mut BTreeMap<AgentId, Agent>,
        signals: &mut Vec<AgentSignal>,
    ) -> Result<bool, AgentError> {
        if self.backlog.is_empty() {
            return Ok(true);
        }

        let mut keyed: Vec<(DemandPriority, u64, DemandId)> = Vec::new();
        for id in &self.backlog {
            let demand = board.get(*id)?;
            keyed.push((demand.priority(), demand.seq(), *id));
        }
        keyed.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        self.backlog = keyed.into_iter().map(|(_, _, id)| id).collect();

        let mut index: usize = 0;
        let mut outcome = TaskOutcome::Success;
        loop {
            if let Some(&candidate) = self.backlog.get(index) {
                if urgent_only && board.get(candidate)?.priority() != DemandPriority::Urgent {
                    break;
                }
                self.current_task = Some(candidate);

                // A waiting agent whose would-be partner is behind in
                // virtual time has to yield ground before it can help.
                if self.state == AgentState::Waiting {
                    let creator = board.get(candidate)?.creator();
                    let creator_time =
                        creator.and_then(|id| peers.get(&id)).map(|peer| peer.local_time);
                    if let Some(creator_time) = creator_time {
                        if creator_time < self.local_time {
                            info!(
                                agent = self.name,
                                "rolling back unfinished demand to collaborate"
                            );
                            self.partial_roll_back(creator_time, board, dictionary, signals)?;
                            self.backup_task = None;
                            self.state = AgentState::Active;
                        }
                    }
                }
            }

            outcome = self.complete_task(board, dictionary, peers, signals)?;
            if matches!(outcome, TaskOutcome::Success | TaskOutcome::Fail)
                || self.backlog.is_empty()
            {
                break;
            }
            if outcome == TaskOutcome::SkipTooEarly {
                // Keep the entry; try the next backlog item this cycle.
                debug!(agent = self.name, "too far behind; skipping collaboration for now");
                index = index.saturating_add(1);
            }
        }

        Ok(outcome == TaskOutcome::Success)
    }

    /// Attempt the current task once.
    ///
    /// # Errors
    ///
    /// Returns an error only on inconsistent bookkeeping.
    pub(crate) fn complete_task(
        &mut self,
        board: &mut DemandBoard,
        dictionary: &SupplyDemandDictionary,
        peers: &mut BTreeMap<AgentId, Agent>,
        signals: &mut Vec<AgentSignal>,
    ) -> Result<TaskOutcome, AgentError> {
        let Some(id) = self.current_task else {
            return Ok(TaskOutcome::Fail);
        };
        let (state, kind) = {
            let demand = board.get(id)?;
            (demand.state(), demand.kind())
        };

        // Demands claimed or resolved elsewhere are dropped quietly.
        if !matches!(state, DemandState::Queued | DemandState::Incomplete) {
            self.backlog.retain(|d| *d != id);
            self.current_task = None;
            return Ok(TaskOutcome::SkipComplete);
        }

        if kind == DemandKind::Collaborate {
            self.complete_collaboration(id, board, dictionary, peers)
        } else {
            board.get_mut(id)?.mark_active();
            info!(agent = self.name, demand = %id, "started working on demand");
            let nominal = board.get(id)?.effort();
            let effort = self.inflated_effort(nominal);
            self.execute_demand(id, effort, board, dictionary, signals)
        }
    }

    /// Service a collaboration demand raised by a stuck peer.
    fn complete_collaboration(
        &mut self,
        id: DemandId,
        board: &mut DemandBoard,
        dictionary: &SupplyDemandDictionary,
        peers: &mut BTreeMap<AgentId, Agent>,
    ) -> Result<TaskOutcome, AgentError> {
        let (ancillary, creator_id) = {
            let demand = board.get(id)?;
            (demand.ancillary(), demand.creator())
        };
        let ancillary = ancillary.ok_or(AgentError::MalformedCollaboration(id))?;
        let creator_id = creator_id.ok_or(AgentError::MalformedCollaboration(id))?;

        let ancillary_state = board.get(ancillary)?.state();
        if matches!(ancillary_state, DemandState::Incomplete | DemandState::Replaced) {
            debug!(
                agent = self.name,
                demand = %ancillary,
                state = ?ancillary_state,
                "ancillary demand already resolved; moving on"
            );
            // Close the collaboration demand so nobody else picks it up.
            board.get_mut(id)?.mark_complete();
            self.backlog.retain(|d| *d != id);
            self.current_task = None;
            return Ok(TaskOutcome::SkipIncomplete);
        }

        let creator = peers
            .get_mut(&creator_id)
            .ok_or(AgentError::UnknownPeer(creator_id))?;

        // Too early to engage if the creator's request lies in this agent's
        // future; keep the entry and revisit once time catches up.
        let Some(started) = creator.time_started_on(ancillary) else {
            self.current_task = None;
            return Ok(TaskOutcome::SkipTooEarly);
        };
        if started > self.local_time {
            self.current_task = None;
            return Ok(TaskOutcome::SkipTooEarly);
        }

        board.get_mut(id)?.mark_active();
        info!(agent = self.name, demand = %id, "started collaborating");

        // Unwind completed work until close enough to the requester's
        // clock. Collaborations themselves are never rolled back.
        while creator.local_time < self.local_time {
            let last_is_collab = self.completed.last().is_some_and(|last| {
                board
                    .get(*last)
                    .is_ok_and(|demand| demand.kind() == DemandKind::Collaborate)
            });
            if last_is_collab {
                break;
            }
            let gap = self.local_time.saturating_sub(creator.local_time);
            if gap > self.config.collab_gap_threshold && !self.completed.is_empty() {
                self.roll_back_last(board)?;
            } else {
                break;
            }
        }

        let ancillary_effort = board.get(ancillary)?.effort();
        let prior = self.interactions.get(&creator_id).copied().unwrap_or(0);
        let collab_effort = discounted_effort(ancillary_effort, prior, self.config.learning_rate);

        let partial_before = board.get(id)?.partial().clone();
        let mut snapshot = Vec::new();
        if self.expend_effort(id, ancillary_effort, &mut snapshot, board, dictionary)? {
            self.backlog.retain(|d| *d != id);
            self.completed.push(ancillary);
            self.completed.push(id);

            self.ledger
                .insert(ancillary, LedgerEntry::new(self.local_time, ancillary_effort, snapshot));
            self.local_time = self.local_time.saturating_add(u64::from(ancillary_effort));
            self.ledger
                .insert(id, LedgerEntry::new(self.local_time, collab_effort, Vec::new()));
            self.local_time = self.local_time.saturating_add(u64::from(collab_effort));
            self.current_task = None;

            let helper_started = self.time_started_on(ancillary).unwrap_or(self.local_time);
            self.bump_interactions(creator_id);
            creator.finish_collaboration(
                self.id,
                board,
                id,
                ancillary,
                collab_effort,
                helper_started,
            )?;
            self.state = AgentState::Active;
            info!(
                agent = self.name,
                ancillary_effort, collab_effort, "collaboration complete"
            );
            Ok(TaskOutcome::Success)
        } else {
            warn!(agent = self.name, demand = %id, "failed to complete collaboration");
            self.restore_snapshot(&snapshot)?;
            let demand = board.get_mut(id)?;
            demand.restore_partial(partial_before);
            demand.mark_queued();
            self.current_task = None;
            self.state = AgentState::Active;
            Ok(TaskOutcome::Fail)
        }
    }

    /// Close out a collaboration on the requesting side.
    ///
    /// Called by the helper once it has expended the effort: the stuck
    /// demand and the collaboration demand both complete, excess wait time
    /// is absorbed into the clock, and the agent goes back to work.
    pub(crate) fn finish_collaboration(
        &mut self,
        partner: AgentId,
        board: &mut DemandBoard,
        collab: DemandId,
        ancillary: DemandId,
        collab_effort: u32,
        partner_started: u64,
    ) -> Result<(), AgentError> {
        self.bump_interactions(partner);

        board.get_mut(ancillary)?.mark_complete();
        board.get_mut(collab)?.mark_complete();

        self.backlog.retain(|d| *d != ancillary);
        self.completed.push(ancillary);
        self.completed.push(collab);
        self.ledger
            .insert(collab, LedgerEntry::new(self.local_time, collab_effort, Vec::new()));

        // Wait time is non-negative: only accrues if the partner started
        // after this agent's clock.
        let wait = partner_started.saturating_sub(self.local_time);
        self.local_time = self
            .local_time
            .saturating_add(u64::from(collab_effort))
            .saturating_add(wait);
        self.wait_time = self.wait_time.saturating_add(wait);

        self.current_task = None;
        self.steps_since_active = 0;
        self.state = AgentState::Active;
        info!(agent = self.name, demand = %ancillary, "collaborator finished stuck demand");
        Ok(())
    }

    /// Execute a demand with a fixed actual effort.
    ///
    /// On success the demand either completes or, if some requirements
    /// could not be matched at all, parks as `Partial` and the agent starts
    /// waiting. On failure every mutation is undone and the demand goes
    /// back to the queue (a false start, no time charged).
    fn execute_demand(
        &mut self,
        id: DemandId,
        effort: u32,
        board: &mut DemandBoard,
        dictionary: &SupplyDemandDictionary,
        signals: &mut Vec<AgentSignal>,
    ) -> Result<TaskOutcome, AgentError> {
        let partial_before = board.get(id)?.partial().clone();
        let mut snapshot = Vec::new();
        if self.expend_effort(id, effort, &mut snapshot, board, dictionary)? {
            let demand = board.get_mut(id)?;
            if demand.state() == DemandState::Partial {
                self.state = AgentState::Waiting;
                info!(agent = self.name, demand = %id, "waiting for help from others");
                signals.push(AgentSignal::Collaborate { demand: id, agent: self.id });
            } else {
                demand.mark_complete();
                self.backlog.retain(|d| *d != id);
                self.completed.push(id);
                self.current_task = None;
            }
            self.ledger.insert(id, LedgerEntry::new(self.local_time, effort, snapshot));
            self.local_time = self.local_time.saturating_add(u64::from(effort));
            debug!(agent = self.name, effort, "task effort applied");
            Ok(TaskOutcome::Success)
        } else {
            warn!(agent = self.name, demand = %id, "failed to complete task");
            self.backlog.retain(|d| *d != id);
            self.restore_snapshot(&snapshot)?;
            let demand = board.get_mut(id)?;
            demand.restore_partial(partial_before);
            demand.mark_queued();
            self.current_task = None;
            Ok(TaskOutcome::Fail)
        }
    }

    /// Replay a demand with a hard effort cap (no stochastic inflation).
    /// Used after a partial rollback so the agent lands at the capped time.
    fn partial_complete_task(
        &mut self,
        id: DemandId,
        effort: u32,
        board: &mut DemandBoard,
        dictionary: &SupplyDemandDictionary,
        signals: &mut Vec<AgentSignal>,
    ) -> Result<TaskOutcome, AgentError> {
        let state = board.get(id)?.state();
        if !matches!(state, DemandState::Queued | DemandState::Incomplete) {
            self.backlog.retain(|d| *d != id);
            self.current_task = None;
            return Ok(TaskOutcome::SkipComplete);
        }
        board.get_mut(id)?.mark_active();
        info!(agent = self.name, demand = %id, effort, "replaying demand with capped effort");
        self.execute_demand(id, effort, board, dictionary, signals)
    }

    /// Expend supplies against a demand, snapshotting strictly before each
    /// mutation.
    ///
    /// Requirements already covered by the demand's partial map cost
    /// nothing. A shortfall triggers one replenish attempt (its time cost
    /// inflating the remaining effort); if even a full supply cannot cover
    /// the need, the whole expenditure reports failure and the caller
    /// restores the snapshots. Requirements with no matching supply at all
    /// park a non-collaboration demand as `Partial`.
    pub(crate) fn expend_effort(
        &mut self,
        id: DemandId,
        effort: u32,
        snapshot: &mut Vec<SupplyImage>,
        board: &mut DemandBoard,
        dictionary: &SupplyDemandDictionary,
    ) -> Result<bool, AgentError> {
        let is_collab = board.get(id)?.kind() == DemandKind::Collaborate;
        if is_collab {
            self.state = AgentState::Communicating;
        }
        let Some(kind) = Self::effective_kind(board.get(id)?, board) else {
            return Ok(false);
        };
        let Some(requirements) = dictionary.required_supplies(kind).map(<[_]>::to_vec) else {
            return Ok(false);
        };

        let now = self.local_time;
        let mut effort = effort;
        let mut success = true;
        for requirement in requirements {
            let done = board.get(id)?.partial_progress(requirement.kind);
            let mut matched = false;
            let mut expended: Option<u32> = None;

            for supply in &mut self.supplies {
                if supply.kind() != requirement.kind
                    || supply.quality() < requirement.min_quality
                {
                    continue;
                }
                let needed = effort.saturating_sub(done);
                if needed == 0 {
                    // A previous actor already covered this requirement.
                    matched = true;
                } else if supply.amount() >= needed {
                    snapshot.push(SupplyImage::capture(supply));
                    supply.reduce_amount(needed);
                    expended = Some(effort);
                    matched = true;
                } else if supply.capacity() >= needed {
                    // Snapshot before the refill so a rollback undoes it too.
                    snapshot.push(SupplyImage::capture(supply));
                    supply.replenish(now);
                    effort = effort.saturating_add(supply.replenish_time());
                    let needed = effort.saturating_sub(done);
                    if supply.amount() >= needed {
                        supply.reduce_amount(needed);
                        expended = Some(effort);
                        matched = true;
                    } else {
                        warn!(
                            amount = supply.amount(),
                            needed, "too much effort to complete task"
                        );
                        success = false;
                    }
                } else {
                    warn!(
                        amount = supply.amount(),
                        needed, "too much effort to complete task"
                    );
                    success = false;
                }
                // Only the first matching supply is consulted.
                break;
            }

            if let Some(total) = expended {
                board.get_mut(id)?.record_partial(requirement.kind, total);
            }
            if !success {
                break;
            }
            if !matched && !is_collab {
                board.get_mut(id)?.mark_partial();
            }
        }
        Ok(success)
    }

    /// Roll back the most recently completed demand.
    pub(crate) fn roll_back_last(&mut self, board: &mut DemandBoard) -> Result<(), AgentError> {
        if let Some(&last) = self.completed.last() {
            self.roll_back(last, true, board)?;
        }
        Ok(())
    }

    /// Undo provisional work on a demand.
    ///
    /// Restores every snapshot in the ledger entry, rewinds the local clock
    /// to the entry's start time (for completed work), requeues the demand,
    /// and discards the entry. Rolling back a demand with no completed
    /// record is a benign no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot no longer matches its supply or the
    /// demand has vanished from the board.
    pub fn roll_back(
        &mut self,
        id: DemandId,
        was_completed: bool,
        board: &mut DemandBoard,
    ) -> Result<(), AgentError> {
        if was_completed {
            let Some(position) = self.completed.iter().position(|d| *d == id) else {
                // False start; nothing to roll back.
                return Ok(());
            };
            self.completed.remove(position);
        }
        let Some(entry) = self.ledger.remove(&id) else {
            warn!(agent = self.name, demand = %id, "no ledger entry to roll back");
            return Ok(());
        };
        self.restore_snapshot(entry.images())?;

        if was_completed {
            self.local_time = entry.time_at_start();
            board.get_mut(id)?.mark_queued();
            self.backlog.push(id);
            info!(
                agent = self.name,
                demand = %id,
                rewound_to = entry.time_at_start(),
                "rolled back completed demand"
            );
        } else if self.state == AgentState::Waiting {
            self.local_time = entry.time_at_start();
        }
        Ok(())
    }

    /// Rescue rollback: unwind a completed demand, supersede it with a
    /// fresh clone, and immediately replay the clone with effort capped so
    /// the clock lands at `time_cap`.
    pub(crate) fn partial_roll_back(
        &mut self,
        time_cap: u64,
        board: &mut DemandBoard,
        dictionary: &SupplyDemandDictionary,
        signals: &mut Vec<AgentSignal>,
    ) -> Result<(), AgentError> {
        let target = self.backup_task.or_else(|| self.completed.last().copied());
        let Some(target) = target else {
            // Nothing to yield.
            return Ok(());
        };

        let was_completed = board.state_of(target) == Some(DemandState::Complete);
        self.roll_back(target, was_completed, board)?;
        board.get_mut(target)?.mark_replaced();

        let replacement = board.get(target)?.clone_as_replacement();
        let new_id = board.publish(replacement)?;
        info!(agent = self.name, original = %target, clone = %new_id, "cloned demand after rollback");

        // The clone supersedes the original everywhere in this backlog.
        self.backlog.retain(|d| *d != target);
        self.backlog.push(new_id);

        let cap = u32::try_from(time_cap.saturating_sub(self.local_time))
            .unwrap_or(u32::MAX)
            .max(1);
        self.partial_complete_task(new_id, cap, board, dictionary, signals)?;
        Ok(())
    }

    /// Restore captured supply images, most recent first.
    fn restore_snapshot(&mut self, snapshot: &[SupplyImage]) -> Result<(), AgentError> {
        for image in snapshot.iter().rev() {
            if let Some(supply) = self
                .supplies
                .iter_mut()
                .find(|supply| supply.id() == image.supply())
            {
                image.restore(supply)?;
            }
        }
        Ok(())
    }

    /// Stochastically inflate nominal effort: each unit has a
    /// `100 - efficiency` percent chance of costing one extra.
    fn inflated_effort(&mut self, nominal: u32) -> u32 {
        let mut total: u32 = 0;
        for _ in 0..nominal {
            total = total.saturating_add(1);
            if self.config.efficiency < self.rng.random_range(0..=100) {
                total = total.saturating_add(1);
            }
        }
        total
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use tandem_market::{Demand, Supply};
    use tandem_types::{SupplyKind, SupplyQuality};

    use super::*;
    use crate::config::AgentConfig;

    fn perfect_config() -> AgentConfig {
        AgentConfig {
            efficiency: 100,
            ..AgentConfig::default()
        }
    }

    fn make_agent(name: &str, supplies: Vec<Supply>) -> Agent {
        let mut agent = Agent::new(name, perfect_config());
        for supply in supplies {
            agent.add_supply(supply);
        }
        agent
    }

    fn run_one(
        agent: &mut Agent,
        board: &mut DemandBoard,
        dictionary: &SupplyDemandDictionary,
    ) -> bool {
        let mut peers = BTreeMap::new();
        let mut signals = Vec::new();
        agent
            .complete_next_task(false, board, dictionary, &mut peers, &mut signals)
            .unwrap()
    }

    #[test]
    fn perfect_agent_completes_demand_exactly() {
        // Capacity 10, effort 5, efficiency 100: five units expended.
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let id = board
            .publish(Demand::new(
                "dev",
                DemandKind::Development,
                DemandPriority::Medium,
                5,
            ))
            .unwrap();

        let mut agent = make_agent(
            "a",
            vec![Supply::new("dev", SupplyKind::Development, SupplyQuality::Medium, 10)],
        );
        agent.start(&board, &dictionary);
        assert!(run_one(&mut agent, &mut board, &dictionary));

        assert_eq!(board.state_of(id), Some(DemandState::Complete));
        assert_eq!(agent.supplies()[0].amount(), 5);
        assert_eq!(agent.local_time(), 5);
        assert_eq!(agent.completed(), &[id]);
    }

    #[test]
    fn shortfall_beyond_capacity_fails_without_mutation() {
        // Capacity 3, effort 5: not coverable even by a refill.
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let id = board
            .publish(Demand::new(
                "dev",
                DemandKind::Development,
                DemandPriority::Medium,
                5,
            ))
            .unwrap();

        let mut agent = make_agent(
            "a",
            vec![
                Supply::new("dev", SupplyKind::Development, SupplyQuality::Medium, 3)
                    .non_replenishing(),
            ],
        );
        agent.start(&board, &dictionary);
        assert!(!run_one(&mut agent, &mut board, &dictionary));

        assert_eq!(agent.supplies()[0].amount(), 3);
        assert_eq!(agent.local_time(), 0);
        assert_ne!(board.state_of(id), Some(DemandState::Complete));
        // Dropped locally but still discoverable by other agents.
        assert!(agent.backlog().is_empty());
        assert_eq!(board.state_of(id), Some(DemandState::Queued));
    }

    #[test]
    fn replenish_covers_shortfall_and_charges_extra_effort() {
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let id = board
            .publish(Demand::new(
                "dev",
                DemandKind::Development,
                DemandPriority::Medium,
                5,
            ))
            .unwrap();

        let mut supply = Supply::new("dev", SupplyKind::Development, SupplyQuality::Medium, 20);
        supply.reduce_amount(17); // leaves 3, short of the needed 5
        let mut agent = make_agent("a", vec![supply]);
        agent.start(&board, &dictionary);
        assert!(run_one(&mut agent, &mut board, &dictionary));

        assert_eq!(board.state_of(id), Some(DemandState::Complete));
        // Refill cost 8 inflates the expended effort to 13 of 20 units.
        assert_eq!(agent.supplies()[0].amount(), 7);
        // The clock still advances by the nominal effort only.
        assert_eq!(agent.local_time(), 5);
    }

    #[test]
    fn rollback_round_trips_time_supplies_and_backlog() {
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let id = board
            .publish(Demand::new(
                "dev",
                DemandKind::Development,
                DemandPriority::Medium,
                5,
            ))
            .unwrap();

        let mut agent = make_agent(
            "a",
            vec![Supply::new("dev", SupplyKind::Development, SupplyQuality::Medium, 10)],
        );
        agent.start(&board, &dictionary);
        assert!(run_one(&mut agent, &mut board, &dictionary));
        assert_eq!(agent.local_time(), 5);

        agent.roll_back(id, true, &mut board).unwrap();
        assert_eq!(agent.local_time(), 0);
        assert_eq!(agent.supplies()[0].amount(), 10);
        assert_eq!(agent.backlog(), &[id]);
        assert!(agent.completed().is_empty());
        assert_eq!(board.state_of(id), Some(DemandState::Queued));
        assert_eq!(agent.effort_spent_on(id), 0);
    }

    #[test]
    fn rollback_of_uncompleted_demand_is_benign() {
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let id = board
            .publish(Demand::new(
                "dev",
                DemandKind::Development,
                DemandPriority::Medium,
                5,
            ))
            .unwrap();
        let mut agent = make_agent("a", Vec::new());
        agent.start(&board, &dictionary);

        agent.roll_back(id, true, &mut board).unwrap();
        assert_eq!(agent.local_time(), 0);
    }

    #[test]
    fn highest_priority_wins_with_publication_tiebreak() {
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let low = board
            .publish(Demand::new("low", DemandKind::Development, DemandPriority::Low, 5))
            .unwrap();
        let high_first = board
            .publish(Demand::new("h1", DemandKind::Development, DemandPriority::High, 5))
            .unwrap();
        let high_second = board
            .publish(Demand::new("h2", DemandKind::Development, DemandPriority::High, 5))
            .unwrap();

        let mut agent = make_agent(
            "a",
            vec![Supply::new("dev", SupplyKind::Development, SupplyQuality::Medium, 100)],
        );
        agent.start(&board, &dictionary);

        assert!(run_one(&mut agent, &mut board, &dictionary));
        assert_eq!(agent.completed(), &[high_first]);
        assert!(run_one(&mut agent, &mut board, &dictionary));
        assert_eq!(agent.completed(), &[high_first, high_second]);
        assert!(run_one(&mut agent, &mut board, &dictionary));
        assert_eq!(agent.completed(), &[high_first, high_second, low]);
    }

    #[test]
    fn partial_rollback_replaces_and_replays_with_capped_effort() {
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let id = board
            .publish(Demand::new(
                "dev",
                DemandKind::Development,
                DemandPriority::Medium,
                10,
            ))
            .unwrap();

        let mut agent = make_agent(
            "a",
            vec![Supply::new("dev", SupplyKind::Development, SupplyQuality::Medium, 20)],
        );
        agent.start(&board, &dictionary);
        assert!(run_one(&mut agent, &mut board, &dictionary));
        assert_eq!(agent.local_time(), 10);

        // A peer stuck at time 4 asks for help; yield back to its clock.
        let mut signals = Vec::new();
        agent
            .partial_roll_back(4, &mut board, &dictionary, &mut signals)
            .unwrap();

        assert_eq!(board.state_of(id), Some(DemandState::Replaced));
        let clone_id = board
            .demands_in_order()
            .find(|demand| demand.id() != id)
            .map(Demand::id)
            .unwrap();
        // The clone's partial progress already covers the requirement, so
        // the replay costs no supplies and lands at the capped time.
        assert_eq!(board.state_of(clone_id), Some(DemandState::Complete));
        assert_eq!(agent.local_time(), 4);
        assert_eq!(agent.supplies()[0].amount(), 20);
        assert_eq!(agent.completed(), &[clone_id]);
    }

    #[test]
    fn waiting_agent_pivots_to_urgent_rescue_with_partial_rollback() {
        // Requester a parks a modeling demand at time 10; helper b parks
        // its own modeling demand at time 20. The urgent rescue forces b
        // to yield back to a's clock before collaborating: its parked
        // demand is superseded by a capped replay and the rescue runs in
        // the same pulse.
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let stuck_id = board
            .publish(Demand::new(
                "model",
                DemandKind::Modeling,
                DemandPriority::Medium,
                10,
            ))
            .unwrap();

        let mut requester = make_agent(
            "a",
            vec![
                Supply::new("ana", SupplyKind::Analysis, SupplyQuality::Medium, 100),
                Supply::new("com", SupplyKind::Communication, SupplyQuality::Medium, 100),
            ],
        );
        requester.start(&board, &dictionary);
        assert!(run_one(&mut requester, &mut board, &dictionary));
        assert_eq!(requester.state(), AgentState::Waiting);
        assert_eq!(requester.local_time(), 10);

        let own_id = board
            .publish(Demand::new(
                "plan",
                DemandKind::Modeling,
                DemandPriority::Medium,
                20,
            ))
            .unwrap();
        let mut helper = make_agent(
            "b",
            vec![
                Supply::new("mod", SupplyKind::Modeling, SupplyQuality::Medium, 100),
                Supply::new("ana", SupplyKind::Analysis, SupplyQuality::Medium, 100),
            ],
        );
        helper.start(&board, &dictionary);
        assert!(run_one(&mut helper, &mut board, &dictionary));
        assert_eq!(helper.state(), AgentState::Waiting);
        assert_eq!(helper.local_time(), 20);
        assert_eq!(helper.current_task(), Some(own_id));
        assert_eq!(board.state_of(own_id), Some(DemandState::Partial));

        let collab = Demand::collaboration(board.get(stuck_id).unwrap(), requester.id());
        let collab_id = board.publish(collab).unwrap();
        helper.on_new_demand(collab_id, &board, &dictionary).unwrap();
        assert_eq!(helper.urgent_pending, 1);

        let requester_id = requester.id();
        let mut peers = BTreeMap::new();
        peers.insert(requester_id, requester);
        let mut signals = Vec::new();
        helper
            .finish_cycle_pulse(&mut board, &dictionary, &mut peers, &mut signals)
            .unwrap();

        // The parked demand was superseded; its clone replayed up to the
        // requester's clock and parked again.
        assert_eq!(board.state_of(own_id), Some(DemandState::Replaced));
        let clone_id = board
            .demands_in_order()
            .find(|demand| ![own_id, stuck_id, collab_id].contains(&demand.id()))
            .map(Demand::id)
            .unwrap();
        assert_eq!(board.state_of(clone_id), Some(DemandState::Partial));
        assert_eq!(helper.backlog(), &[clone_id]);
        assert!(signals.contains(&AgentSignal::Collaborate {
            demand: clone_id,
            agent: helper.id(),
        }));

        // The rescue itself completed in the same pulse: 10 for the
        // capped replay, 10 for the ancillary effort, 10 collab overhead.
        assert_eq!(board.state_of(stuck_id), Some(DemandState::Complete));
        assert_eq!(board.state_of(collab_id), Some(DemandState::Complete));
        assert_eq!(helper.local_time(), 30);
        assert_eq!(helper.state(), AgentState::Active);
        assert_eq!(helper.completed(), &[stuck_id, collab_id]);
        assert_eq!(helper.urgent_pending, 0);
        assert_eq!(helper.current_task(), None);
        // Only the modeling skill was spent on the rescue; the analysis
        // requirement was already covered by the requester's progress.
        assert_eq!(helper.supplies()[0].amount(), 90);
        assert_eq!(helper.supplies()[1].amount(), 100);

        let requester = peers.get(&requester_id).unwrap();
        assert_eq!(requester.state(), AgentState::Active);
        assert_eq!(requester.local_time(), 20);
        assert_eq!(requester.interactions().get(&helper.id()), Some(&1));
        assert_eq!(helper.interactions().get(&requester_id), Some(&1));
    }

    #[test]
    fn discount_is_monotone_and_at_least_one() {
        let mut last = u32::MAX;
        for interactions in 0..8 {
            let effort = discounted_effort(40, interactions, 0.85);
            assert!(effort <= last);
            assert!(effort >= 1);
            last = effort;
        }
        // Zero interactions means no discount at all.
        assert_eq!(discounted_effort(40, 0, 0.85), 40);
    }

    #[test]
    fn first_collaboration_uses_raw_ancillary_effort() {
        // Requester a completes what it can of a modeling demand, getting
        // stuck on the modeling skill; helper b rescues it at full price.
        let dictionary = SupplyDemandDictionary::standard();
        let mut board = DemandBoard::new();
        let stuck_id = board
            .publish(Demand::new(
                "model",
                DemandKind::Modeling,
                DemandPriority::Medium,
                10,
            ))
            .unwrap();

        let mut requester = make_agent(
            "a",
            vec![
                Supply::new("ana", SupplyKind::Analysis, SupplyQuality::Medium, 100),
                Supply::new("com", SupplyKind::Communication, SupplyQuality::Medium, 100),
            ],
        );
        requester.start(&board, &dictionary);

        let mut signals = Vec::new();
        let mut peers = BTreeMap::new();
        requester
            .complete_next_task(false, &mut board, &dictionary, &mut peers, &mut signals)
            .unwrap();
        assert_eq!(requester.state(), AgentState::Waiting);
        assert_eq!(board.state_of(stuck_id), Some(DemandState::Partial));
        assert_eq!(requester.local_time(), 10);
        assert_eq!(
            signals,
            vec![AgentSignal::Collaborate { demand: stuck_id, agent: requester.id() }]
        );

        // The environment would now derive and publish the urgent demand.
        let collab = Demand::collaboration(board.get(stuck_id).unwrap(), requester.id());
        let collab_id = board.publish(collab).unwrap();

        let mut helper = make_agent(
            "b",
            vec![Supply::new("mod", SupplyKind::Modeling, SupplyQuality::Medium, 100)],
        );
        helper.start(&board, &dictionary);
        helper.on_new_demand(collab_id, &board, &dictionary).unwrap();

        let requester_id = requester.id();
        peers.insert(requester_id, requester);
        let mut signals = Vec::new();
        assert!(
            helper
                .complete_next_task(false, &mut board, &dictionary, &mut peers, &mut signals)
                .unwrap()
        );

        let requester = peers.get(&requester_id).unwrap();
        assert_eq!(board.state_of(stuck_id), Some(DemandState::Complete));
        assert_eq!(board.state_of(collab_id), Some(DemandState::Complete));
        assert_eq!(helper.state(), AgentState::Active);
        assert_eq!(requester.state(), AgentState::Active);
        // Full price at zero prior interactions: effort 10, then collab
        // overhead 10 on the helper's ledger.
        assert_eq!(helper.effort_spent_on(stuck_id), 10);
        assert_eq!(helper.effort_spent_on(collab_id), 10);
        assert_eq!(helper.local_time(), 20);
        assert_eq!(requester.interactions().get(&helper.id()), Some(&1));
        assert_eq!(helper.interactions().get(&requester_id), Some(&1));
    }
}
