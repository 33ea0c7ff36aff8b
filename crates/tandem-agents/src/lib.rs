//! Optimistic virtual-time agents for the Tandem simulation.
//!
//! Each agent runs on its own local virtual clock, claiming demands from the
//! shared board and expending its exclusively owned supplies against them.
//! Completed work is provisional: every expenditure is preceded by a supply
//! snapshot and logged in a per-agent ledger, so an agent can roll its clock
//! and its supplies back when a collaboration forces it to revisit the past.
//! Work only becomes permanent once the global virtual time (the minimum of
//! all local clocks) passes its finish time.
//!
//! # Modules
//!
//! - [`agent`] -- Agent state, backlog management, and commitment ([`Agent`])
//! - [`config`] -- Tunable parameters for agent behaviour ([`AgentConfig`])
//! - [`engine`] -- The per-cycle scheduling, rollback, and collaboration loop
//! - [`error`] -- Error types for agent operations ([`AgentError`])
//! - [`ledger`] -- Provisional work records ([`LedgerEntry`])
//! - [`signal`] -- Typed signals agents raise towards the environment ([`AgentSignal`])

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod signal;

// Re-export primary types at crate root for convenience.
pub use agent::Agent;
pub use config::AgentConfig;
pub use error::AgentError;
pub use ledger::LedgerEntry;
pub use signal::AgentSignal;
