//! UrbanCycle Common Library
//!
//! Shared types, constants, and utilities for the three UrbanCycle ledger
//! contracts:
//!
//! - **UrbanCoin**: fungible reward token with a minter allow-list
//! - **WasteNFT**: provenance registry with a single bound writer
//! - **RecycleManager**: verify -> reward -> record -> pay orchestrator
//!
//! The host ledger is modelled as a linearizable state-transition executor;
//! nothing here depends on a particular chain.

pub mod constants;
pub mod errors;
pub mod events;
pub mod math;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use constants::*;
pub use errors::*;
pub use events::*;
pub use math::*;
pub use types::*;
pub use validation::*;
