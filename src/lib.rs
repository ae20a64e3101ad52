//! # Volume Inventory
//!
//! Periodic storage inventory: probes the capacity usage of configured
//! volumes and ranks the disk footprint of configured folders inside them.
//!
//! ## Core Components
//!
//! - [`collector`]: Concurrent fan-out of probes and folder scans, counting join
//! - [`scanner`]: Recursive directory sizing with per-entry failure absorption
//! - [`probe`]: Platform capacity queries behind the [`probe::CapacityProbe`] trait
//! - [`ranking`]: Stable size ranking
//! - [`format`]: Human readable sizes and durations
//! - [`report`]: Text and JSON rendering of a finished run
//! - [`config`]: Layered configuration loading
//! - [`error`]: The [`error::InventoryError`] taxonomy
//! - [`metrics`]: Run statistics tallied by the collector
//! - [`types`]: Shared data model

pub mod collector;
pub mod config;
pub mod error;
pub mod format;
pub mod metrics;
pub mod probe;
pub mod ranking;
pub mod report;
pub mod scanner;
pub mod types;

#[cfg(test)]
mod tests;
