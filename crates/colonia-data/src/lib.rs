//! Data-driven factory content.
//!
//! Loads `factories.{ron,toml,json}` (required) and `logistics.{ron,toml,json}`
//! (optional) from a directory and resolves them into a [`Catalog`] and a
//! [`LogisticsConfig`].

pub mod loader;
pub mod schema;

pub use loader::DataLoadError;

use colonia_core::cart::CartPool;
use colonia_core::catalog::Catalog;
use colonia_core::city::City;
use colonia_core::logistics::LogisticsConfig;
use schema::{FactoryData, LogisticsData};
use std::path::Path;

/// Everything a data directory defines.
#[derive(Debug, Clone)]
pub struct GameData {
    pub catalog: Catalog,
    pub logistics: LogisticsConfig,
}

impl GameData {
    /// An empty city using this data and the default cart pool.
    pub fn into_city(self) -> City {
        City::new(self.catalog, self.logistics, CartPool::default())
    }
}

/// Load and resolve every data file in `dir`.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let factories_path = loader::require_data_file(dir, "factories")?;
    let factories: Vec<FactoryData> = loader::deserialize_list(&factories_path, "factories")?;
    let catalog = loader::build_catalog(&factories, &factories_path)?;

    let logistics = match loader::find_data_file(dir, "logistics")? {
        Some(path) => {
            let data: LogisticsData = loader::deserialize_file(&path)?;
            loader::resolve_logistics(&data, &path)?
        }
        None => LogisticsConfig::default(),
    };

    log::info!(
        "loaded {} factory kinds from {}",
        catalog.len(),
        factories_path.display()
    );
    Ok(GameData { catalog, logistics })
}
