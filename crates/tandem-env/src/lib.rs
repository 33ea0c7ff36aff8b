//! Simulation environment for the Tandem optimistic virtual-time market.
//!
//! This crate drives the whole system: it instantiates the agent population
//! from configuration, generates demand, services collaboration and
//! backlog-refresh signals between pulses, and advances global virtual time
//! (the minimum of all local clocks) so provisional work becomes permanent.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration loading ([`SimConfig`])
//! - [`environment`] -- The cycle driver ([`SimEnvironment`])
//! - [`error`] -- Error types for environment operations ([`EnvError`])
//! - [`report`] -- Progress reporting ([`ProgressReport`], [`ReportSink`])

pub mod config;
pub mod environment;
pub mod error;
pub mod report;

pub use config::{AgentArchetypeConfig, ConfigError, SimConfig, SupplySpec};
pub use environment::SimEnvironment;
pub use error::EnvError;
pub use report::{AgentProgress, CollectingSink, ProgressReport, ReportSink, TracingSink};
