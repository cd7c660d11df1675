//! Normalizes a Django deployment request into per-region function, gateway
//! and DNS configurations and reconciles them against the recorded state.
//!
//! The cloud APIs themselves are reached through the traits in [`provider`],
//! the recorded state through [`state::StateStore`].
//!
//! ## Crate Features
//!
//! - `clap` (default) enables the CLI argument types in [`cli`].

#[cfg(feature = "clap")]
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod dns;
pub mod provider;
pub mod state;

pub use coordinator::{DeployOutputs, Deployer};
pub use deployer_telemetry as telemetry;
