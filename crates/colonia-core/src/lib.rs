//! Colonia Core -- factory production logic for a city-building simulation.
//!
//! A factory converts one commodity into another (or extracts a raw one)
//! at a rate set by its kind and scaled by staffing. It keeps its goods in a
//! bounded [`ledger::GoodsLedger`], asks for input and ships output through
//! transport agents, and runs a work animation exactly while it may work.
//!
//! # Per-factory step
//!
//! Each call to [`factory::Factory::step`] runs, in order:
//!
//! 1. **Dispatch** -- on cadence ticks, request input, then ship output.
//! 2. **Animation** -- start or stop the work animation to match the gate.
//! 3. **Production** -- if the gate is open, finalize, advance or start a
//!    cycle (see [`production`]).
//!
//! [`city::City::step`] runs that for every factory, then settles events
//! and hashes the result.
//!
//! # Key Types
//!
//! - [`city::City`] -- Owns factories, carts and events; runs the pipeline.
//! - [`factory::Factory`] -- One building and its per-tick step.
//! - [`production::ProductionCycle`] -- Progress accrual and cycle gating.
//! - [`logistics::Dispatcher`] -- Single-agent dispatch against a
//!   [`logistics::TransportService`].
//! - [`cart::CartPool`] -- Built-in transport service backed by a warehouse.
//! - [`catalog::Catalog`] -- Immutable table of factory kinds.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`serialize`] -- Save records and versioned `bitcode` snapshots.

pub mod animation;
pub mod cart;
pub mod catalog;
pub mod city;
pub mod event;
pub mod factory;
pub mod fixed;
pub mod id;
pub mod ledger;
pub mod logistics;
pub mod production;
pub mod serialize;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
