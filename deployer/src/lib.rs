//! UrbanCycle Deployer
//!
//! Bootstraps the three UrbanCycle contracts against an in-memory host and
//! serves them through a single global sequencer.
//!
//! - [`bootstrap`]: the five-step, resumable deploy-and-wire sequence
//! - [`deployment`]: a wired deployment and its `Sequencer`
//! - [`config`]: TOML deployment configuration
//! - [`address_book`]: persisted contract addresses for the dashboards

pub mod address_book;
pub mod bootstrap;
pub mod config;
pub mod deployment;

pub use address_book::{AddressBook, AddressBookError};
pub use bootstrap::{BootstrapError, BootstrapSequencer, BootstrapStep, PartialDeployment};
pub use config::{ConfigError, DeployConfig};
pub use deployment::{Deployment, Sequencer, SharedProcessor};
