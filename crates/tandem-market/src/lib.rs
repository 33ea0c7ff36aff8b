//! Supplies, demands, and the shared market structures for the Tandem
//! simulation.
//!
//! This crate contains everything that exists *between* agents: the demands
//! they compete for, the supplies they hold exclusively, the shared board
//! where demands are published, and the dictionary that maps demand kinds
//! onto the supply kinds needed to service them. It has no notion of virtual
//! time beyond storing timestamps handed to it -- clocks and scheduling
//! belong to the agent crate.
//!
//! # Modules
//!
//! - [`board`] -- The shared demand arena and publication order ([`DemandBoard`])
//! - [`demand`] -- Demand lifecycle and collaboration derivation ([`Demand`])
//! - [`dictionary`] -- Demand-kind to supply-kind compatibility ([`SupplyDemandDictionary`])
//! - [`error`] -- Error types for market operations ([`MarketError`])
//! - [`image`] -- Point-in-time supply snapshots for rollback ([`SupplyImage`])
//! - [`supply`] -- Consumable, replenishable, learning supplies ([`Supply`])

pub mod board;
pub mod demand;
pub mod dictionary;
pub mod error;
pub mod image;
pub mod supply;

// Re-export primary types at crate root for convenience.
pub use board::DemandBoard;
pub use demand::Demand;
pub use dictionary::{Requirement, SupplyDemandDictionary};
pub use error::MarketError;
pub use image::SupplyImage;
pub use supply::{Supply, DEFAULT_REPLENISH_TIME, LEARNING_THRESHOLD};
