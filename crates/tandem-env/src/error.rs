//! Error types for the simulation environment.

use tandem_agents::AgentError;
use tandem_market::MarketError;

/// Errors that can occur while driving the simulation.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// An agent operation failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// A market operation failed.
    #[error(transparent)]
    Market(#[from] MarketError),
}
