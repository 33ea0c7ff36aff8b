//! The cycle driver and global-virtual-time authority.
//!
//! [`SimEnvironment`] owns the board, the dictionary, and the population.
//! Each cycle it:
//!
//! 1. maybe publishes one randomly generated demand,
//! 2. services the signals agents raised last cycle (deriving collaboration
//!    demands for the stuck, refreshing backlogs on request),
//! 3. pulses every agent, earliest local clock first,
//! 4. advances global virtual time to the minimum local clock and lets
//!    every agent commit work finished at or before it.
//!
//! Global virtual time never decreases: rollbacks can rewind a local clock,
//! but only work ahead of the committed frontier is ever provisional, so
//! the minimum-and-commit step is safe. A final pass after the last cycle
//! commits everything outstanding.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tandem_agents::{Agent, AgentConfig, AgentSignal};
use tandem_market::{Demand, DemandBoard, Supply, SupplyDemandDictionary};
use tandem_types::{AgentId, DemandId, DemandKind, DemandPriority, DemandState};
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::error::EnvError;
use crate::report::{AgentProgress, ProgressReport, ReportSink};

/// Priorities assigned to generated demands. `Urgent` is reserved for
/// derived collaboration demands.
const GENERATED_PRIORITIES: [DemandPriority; 5] = [
    DemandPriority::Low,
    DemandPriority::MediumLow,
    DemandPriority::Medium,
    DemandPriority::MediumHigh,
    DemandPriority::High,
];

/// The simulation environment: board, population, and the cycle loop.
#[derive(Debug)]
pub struct SimEnvironment {
    config: SimConfig,
    board: DemandBoard,
    dictionary: SupplyDemandDictionary,
    agents: BTreeMap<AgentId, Agent>,
    /// Pulse order, re-sorted by ascending local clock after each cycle.
    order: Vec<AgentId>,
    /// Signals raised during the last pulse, serviced next cycle.
    pending: Vec<AgentSignal>,
    global_time: u64,
    cycle: u32,
    rng: SmallRng,
}

impl SimEnvironment {
    /// Build the environment and instantiate the population. Nothing is
    /// published and no agent is active until [`Self::start`].
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let mut agents = BTreeMap::new();
        let mut order = Vec::new();

        for archetype in &config.agents {
            for index in 0..archetype.count {
                let agent_config = AgentConfig {
                    efficiency: archetype.efficiency,
                    max_wait_cycles: archetype.max_wait_cycles,
                    seed: rng.random(),
                    ..AgentConfig::default()
                };
                let mut agent = Agent::new(format!("{}-{index}", archetype.name), agent_config);
                for spec in &archetype.supplies {
                    let capacity = spec
                        .capacity
                        .unwrap_or_else(|| rng.random_range(1..=100));
                    agent.add_supply(Supply::new(
                        format!("{:?}", spec.kind).to_lowercase(),
                        spec.kind,
                        spec.quality,
                        capacity,
                    ));
                }
                order.push(agent.id());
                agents.insert(agent.id(), agent);
            }
        }

        Self {
            config,
            board: DemandBoard::new(),
            dictionary: SupplyDemandDictionary::standard(),
            agents,
            order,
            pending: Vec::new(),
            global_time: 0,
            cycle: 0,
            rng,
        }
    }

    /// Publish the initial demands and activate every agent.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing or backlog seeding fails.
    pub fn start(&mut self) -> Result<(), EnvError> {
        for _ in 0..self.config.initial_demands {
            let demand = self.random_demand();
            self.board.publish(demand)?;
        }
        for agent in self.agents.values_mut() {
            agent.start(&self.board, &self.dictionary);
        }
        info!(
            simulation = self.config.name,
            agents = self.agents.len(),
            demands = self.board.demand_count(),
            "simulation started"
        );
        Ok(())
    }

    /// Run the configured number of cycles, reporting along the way, then
    /// finalize.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a cycle.
    pub fn run(&mut self, sink: &mut dyn ReportSink) -> Result<(), EnvError> {
        self.start()?;
        for _ in 0..self.config.cycles {
            self.step()?;
            if self.cycle.checked_rem(self.config.report_every) == Some(0) {
                sink.report(&self.progress());
            }
        }
        self.finalize();
        sink.report(&self.progress());
        Ok(())
    }

    /// Execute one cycle.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by demand management or a pulse.
    pub fn step(&mut self) -> Result<(), EnvError> {
        self.cycle = self.cycle.saturating_add(1);
        self.maybe_publish_random_demand()?;
        self.manage_requests()?;
        self.pulse_agents()?;
        self.advance_global_time();
        Ok(())
    }

    /// Publish an externally created demand and announce it to every agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the demand is already on the board.
    pub fn publish_demand(&mut self, demand: Demand) -> Result<DemandId, EnvError> {
        let id = self.board.publish(demand)?;
        self.notify_all(id)?;
        Ok(id)
    }

    /// Commit everything outstanding after the last cycle.
    pub fn finalize(&mut self) {
        let horizon = self
            .agents
            .values()
            .map(Agent::local_time)
            .max()
            .unwrap_or(self.global_time);
        for agent in self.agents.values_mut() {
            agent.commit_until(horizon);
        }
        self.global_time = self.global_time.max(horizon);
        info!(global_time = self.global_time, "simulation finalized");
    }

    /// Global virtual time: the committed frontier.
    pub const fn global_time(&self) -> u64 {
        self.global_time
    }

    /// Cycles executed so far.
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    /// The shared demand board.
    pub const fn board(&self) -> &DemandBoard {
        &self.board
    }

    /// The population, in scheduling order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    /// Assemble a progress report for the current cycle.
    #[must_use]
    pub fn progress(&self) -> ProgressReport {
        ProgressReport {
            cycle: self.cycle,
            global_time: self.global_time,
            demands_published: self.board.demand_count(),
            demands_complete: self.board.count_in_state(DemandState::Complete),
            demands_incomplete: self.board.count_in_state(DemandState::Incomplete),
            agents: self
                .agents()
                .map(|agent| AgentProgress {
                    name: agent.name().to_owned(),
                    state: agent.state(),
                    local_time: agent.local_time(),
                    wait_time: agent.wait_time(),
                    backlog: agent.backlog().len(),
                    completed: agent.completed().len(),
                    committed: agent.committed().len(),
                    abandoned: agent.abandoned().len(),
                    collaborations: agent.collaboration_count(),
                })
                .collect(),
        }
    }

    /// Draw a generated demand: random kind, non-urgent priority, and
    /// effort, named after its publication index.
    fn random_demand(&mut self) -> Demand {
        let kind = DemandKind::GENERATABLE
            .get(self.rng.random_range(0..DemandKind::GENERATABLE.len()))
            .copied()
            .unwrap_or(DemandKind::Development);
        let priority = GENERATED_PRIORITIES
            .get(self.rng.random_range(0..GENERATED_PRIORITIES.len()))
            .copied()
            .unwrap_or(DemandPriority::Medium);
        let effort = self.rng.random_range(1..=self.config.max_demand_effort.max(1));
        Demand::new(
            format!("demand-{}", self.board.demand_count()),
            kind,
            priority,
            effort,
        )
    }

    fn maybe_publish_random_demand(&mut self) -> Result<(), EnvError> {
        if self.rng.random_range(0..100_u32) >= self.config.new_demand_percent {
            return Ok(());
        }
        let demand = self.random_demand();
        let id = self.board.publish(demand)?;
        debug!(demand = %id, cycle = self.cycle, "generated demand");
        self.notify_all(id)?;
        Ok(())
    }

    /// Service the signals raised during the previous pulse.
    fn manage_requests(&mut self) -> Result<(), EnvError> {
        let pending = std::mem::take(&mut self.pending);
        for signal in pending {
            match signal {
                AgentSignal::Collaborate { demand, agent } => {
                    // The stuck demand may have resolved since the signal.
                    let stuck = self.board.get(demand)?;
                    if stuck.state() != DemandState::Partial {
                        continue;
                    }
                    let collab = Demand::collaboration(stuck, agent);
                    let id = self.board.publish(collab)?;
                    info!(stuck = %demand, collab = %id, "collaboration demand published");
                    self.notify_all(id)?;
                }
                AgentSignal::RefreshBacklog { agent } => {
                    if let Some(agent) = self.agents.get_mut(&agent) {
                        agent.refresh_backlog(&self.board, &self.dictionary);
                    }
                }
            }
        }
        Ok(())
    }

    /// Pulse every agent, earliest local clock first. Each agent is
    /// detached from the population for its pulse so it can see the others
    /// as peers.
    fn pulse_agents(&mut self) -> Result<(), EnvError> {
        let mut signals = Vec::new();
        let order = self.order.clone();
        for id in order {
            let Some(mut agent) = self.agents.remove(&id) else {
                continue;
            };
            let result = agent.finish_cycle_pulse(
                &mut self.board,
                &self.dictionary,
                &mut self.agents,
                &mut signals,
            );
            self.agents.insert(id, agent);
            result?;
        }
        self.pending.extend(signals);
        Ok(())
    }

    /// Re-sort the pulse order, advance global virtual time to the minimum
    /// local clock, and let every agent commit up to it.
    fn advance_global_time(&mut self) {
        let agents = &self.agents;
        self.order
            .sort_by_key(|id| agents.get(id).map_or(u64::MAX, Agent::local_time));

        let Some(minimum) = self.agents.values().map(Agent::local_time).min() else {
            return;
        };
        for agent in self.agents.values_mut() {
            agent.commit_until(minimum);
        }
        self.global_time = self.global_time.max(minimum);
        debug!(cycle = self.cycle, global_time = self.global_time, "advanced global time");
    }

    fn notify_all(&mut self, id: DemandId) -> Result<(), EnvError> {
        for agent in self.agents.values_mut() {
            agent.on_new_demand(id, &self.board, &self.dictionary)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn population_matches_archetype_counts() {
        let env = SimEnvironment::new(SimConfig::default());
        // Two engineers, two scientists, one manager.
        assert_eq!(env.agents().count(), 5);
        assert_eq!(
            env.agents().filter(|a| a.name().starts_with("engineer")).count(),
            2
        );
        assert_eq!(
            env.agents().filter(|a| a.name().starts_with("manager")).count(),
            1
        );
    }

    #[test]
    fn start_publishes_initial_demands_and_activates() {
        let mut env = SimEnvironment::new(SimConfig::default());
        env.start().unwrap();
        assert_eq!(env.board().demand_count(), 10);
        assert!(
            env.agents()
                .all(|agent| agent.state() == tandem_types::AgentState::Active)
        );
    }

    #[test]
    fn seeded_environments_evolve_identically() {
        let mut first = SimEnvironment::new(SimConfig::default());
        let mut second = SimEnvironment::new(SimConfig::default());
        first.start().unwrap();
        second.start().unwrap();
        for _ in 0..60 {
            first.step().unwrap();
            second.step().unwrap();
        }
        assert_eq!(first.global_time(), second.global_time());
        assert_eq!(first.board().demand_count(), second.board().demand_count());
        assert_eq!(
            first.board().count_in_state(DemandState::Complete),
            second.board().count_in_state(DemandState::Complete)
        );
    }

    #[test]
    fn global_time_never_decreases() {
        let mut env = SimEnvironment::new(SimConfig::default());
        env.start().unwrap();
        let mut last = 0;
        for _ in 0..80 {
            env.step().unwrap();
            assert!(env.global_time() >= last);
            last = env.global_time();
        }
    }
}
