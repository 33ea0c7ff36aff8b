//! Tunable parameters for agent behaviour.

use serde::{Deserialize, Serialize};

/// Efficiency used when none is configured, in percent.
pub const DEFAULT_EFFICIENCY: u32 = 85;

/// How many cycles an agent works before re-scanning the board.
pub const DEFAULT_SYNC_BACKLOG_EVERY: u32 = 50;

/// Virtual-time penalty per allowed wait cycle when a wait is abandoned.
pub const DEFAULT_INCOMPLETE_PENALTY: u64 = 8;

/// Largest clock gap (in virtual-time units) a collaborator tolerates
/// without rolling back to meet the requesting agent.
pub const DEFAULT_COLLAB_GAP_THRESHOLD: u64 = 5;

/// Parameters governing one agent's pacing, patience, and learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Productive fraction of effort, in percent (0..=100). Each nominal
    /// unit of work has a `100 - efficiency` percent chance of costing an
    /// extra unit.
    pub efficiency: u32,
    /// Unproductive cycles tolerated in `Waiting` before giving up.
    pub max_wait_cycles: u32,
    /// Exponent of the collaboration learning curve: effort with a known
    /// partner shrinks by `exp(-interactions * learning_rate)`.
    pub learning_rate: f64,
    /// Cycles of work between backlog re-scans.
    pub sync_backlog_every: u32,
    /// Virtual-time penalty per allowed wait cycle on abandonment.
    pub incomplete_penalty: u64,
    /// Clock gap beyond which a collaborator rolls back completed work to
    /// reach the requesting agent's time.
    pub collab_gap_threshold: u64,
    /// Seed for the agent's private random source.
    pub seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            efficiency: DEFAULT_EFFICIENCY,
            max_wait_cycles: 5,
            learning_rate: 0.85,
            sync_backlog_every: DEFAULT_SYNC_BACKLOG_EVERY,
            incomplete_penalty: DEFAULT_INCOMPLETE_PENALTY,
            collab_gap_threshold: DEFAULT_COLLAB_GAP_THRESHOLD,
            seed: 43,
        }
    }
}

impl AgentConfig {
    /// Clamp fields to their valid ranges (efficiency is a percentage).
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.efficiency = self.efficiency.min(100);
        self.max_wait_cycles = self.max_wait_cycles.max(1);
        self
    }
}
