//! Serde data file structs for factory content.
//!
//! These structs define the on-disk format for factory kinds and logistics
//! tuning. They are deserialized from RON, JSON, or TOML data files and then
//! resolved into engine types by the loader.

use colonia_core::animation::FrameId;
use colonia_core::catalog::PlacementRule;
use serde::Deserialize;

// ===========================================================================
// Factories
// ===========================================================================

/// A factory kind definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct FactoryData {
    pub name: String,
    /// Good consumed per batch. Absent for raw-material producers.
    #[serde(default)]
    pub input: Option<String>,
    pub output: String,
    /// Batches per simulated year at full staffing.
    pub production_rate: f64,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
    #[serde(default)]
    pub capacities: CapacityData,
    #[serde(default)]
    pub placement: PlacementRule,
    #[serde(default)]
    pub picture: Option<FrameId>,
    #[serde(default)]
    pub animation: Option<AnimationData>,
}

fn default_size() -> u32 {
    2
}

fn default_max_workers() -> u32 {
    10
}

/// Ledger caps for a factory kind. Signed so that negative values in a file
/// are reported instead of failing to parse.
#[derive(Debug, Clone, Deserialize)]
pub struct CapacityData {
    #[serde(default = "default_stock_capacity")]
    pub input: i64,
    #[serde(default = "default_stock_capacity")]
    pub output: i64,
    #[serde(default = "default_store_capacity")]
    pub store: i64,
}

fn default_stock_capacity() -> i64 {
    200
}

fn default_store_capacity() -> i64 {
    1000
}

impl Default for CapacityData {
    fn default() -> Self {
        Self {
            input: default_stock_capacity(),
            output: default_stock_capacity(),
            store: default_store_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimationData {
    pub first_frame: FrameId,
    pub frame_count: u32,
    #[serde(default = "default_frame_delay")]
    pub frame_delay: u32,
}

fn default_frame_delay() -> u32 {
    1
}

// ===========================================================================
// Logistics
// ===========================================================================

/// Dispatcher tuning in a data file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogisticsData {
    #[serde(default)]
    pub cadence: Option<u64>,
    #[serde(default)]
    pub cadence_offset: Option<u64>,
    #[serde(default)]
    pub shipment_limit: Option<u32>,
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// TOML files need a top-level table, so lists live under a key.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlFactories {
    pub factories: Vec<FactoryData>,
}
