//! Shared type definitions for the Tandem simulation.
//!
//! This crate is the leaf of the workspace: strongly-typed identifiers and
//! the enumerations that every other crate agrees on. It carries no logic
//! beyond ordering and display.

pub mod enums;
pub mod ids;

pub use enums::{
    AgentState, DemandKind, DemandPriority, DemandState, SupplyKind, SupplyQuality, SupplyState,
    TaskOutcome,
};
pub use ids::{AgentId, DemandId, SupplyId};
