//! Typed signals agents raise towards the environment.
//!
//! Agents never talk to each other directly about coordination; they push
//! an [`AgentSignal`] into the cycle's outbox and the environment services
//! the requests between pulses.

use serde::{Deserialize, Serialize};
use tandem_types::{AgentId, DemandId};

/// A request from an agent to the simulation environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentSignal {
    /// The agent got stuck part-way through `demand` and needs a
    /// collaborator; the environment should derive and publish a
    /// collaboration demand on its behalf.
    Collaborate {
        /// The partially completed demand.
        demand: DemandId,
        /// The stuck agent.
        agent: AgentId,
    },
    /// The agent has worked long enough without rescanning the board and
    /// wants its backlog refreshed.
    RefreshBacklog {
        /// The requesting agent.
        agent: AgentId,
    },
}
