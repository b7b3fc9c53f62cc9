//! Factory-kind catalog: the immutable table every factory is stamped from.
//!
//! Each kind fixes a commodity pair, a production rate, a footprint, worker
//! slots, stock caps and a placement rule. The table is assembled with a
//! [`CatalogBuilder`], validated once, and frozen into a [`Catalog`].

use crate::animation::{AnimationSpec, FrameId};
use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::{FactoryKindId, GoodType};
use crate::production::{BATCH, Recipe};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Terrain a placement rule can look for around a footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainFeature {
    Tree,
    Rock,
    Water,
}

/// Extra placement condition beyond "the footprint is buildable".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementRule {
    #[default]
    Anywhere,
    /// Some tile of the one-tile ring around the footprint has this feature.
    NearTerrain(TerrainFeature),
    /// One whole side of the ring (corners excluded) is water.
    WaterEdge,
}

/// A factory kind definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryKindDef {
    pub name: String,
    pub recipe: Recipe,
    /// Output batches per simulated year at full staffing.
    pub production_rate: Fixed64,
    /// Footprint edge length in tiles.
    pub size: u32,
    pub max_workers: u32,
    pub input_capacity: u32,
    pub output_capacity: u32,
    /// Aggregate cap of the factory's ledger.
    pub store_capacity: u32,
    pub placement: PlacementRule,
    pub picture: Option<FrameId>,
    pub animation: Option<AnimationSpec>,
}

impl FactoryKindDef {
    /// A 2x2 kind with ten worker slots and 200-unit stocks.
    pub fn new(name: &str, input: Option<GoodType>, output: GoodType, production_rate: f64) -> Self {
        Self {
            name: name.to_string(),
            recipe: Recipe { input, output },
            production_rate: f64_to_fixed64(production_rate),
            size: 2,
            max_workers: 10,
            input_capacity: 200,
            output_capacity: 200,
            store_capacity: 1000,
            placement: PlacementRule::Anywhere,
            picture: None,
            animation: None,
        }
    }

    pub fn with_placement(mut self, placement: PlacementRule) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_picture(mut self, picture: FrameId) -> Self {
        self.picture = Some(picture);
        self
    }

    pub fn with_animation(mut self, first_frame: FrameId, frame_count: u32, frame_delay: u32) -> Self {
        self.animation = Some(AnimationSpec {
            first_frame,
            frame_count,
            frame_delay,
        });
        self
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let kind = || self.name.clone();
        if self.max_workers == 0 {
            return Err(CatalogError::NoWorkerSlots(kind()));
        }
        if self.size == 0 {
            return Err(CatalogError::EmptyFootprint(kind()));
        }
        if self.production_rate <= Fixed64::ZERO {
            return Err(CatalogError::InvalidRate(kind()));
        }
        if self.recipe.input == Some(self.recipe.output) {
            return Err(CatalogError::SameInputOutput(kind()));
        }
        if self.recipe.input.is_some() && self.input_capacity < BATCH {
            return Err(CatalogError::CapacityBelowBatch {
                kind: kind(),
                capacity: self.input_capacity,
            });
        }
        if self.output_capacity < BATCH {
            return Err(CatalogError::CapacityBelowBatch {
                kind: kind(),
                capacity: self.output_capacity,
            });
        }
        if self.store_capacity < BATCH {
            return Err(CatalogError::CapacityBelowBatch {
                kind: kind(),
                capacity: self.store_capacity,
            });
        }
        Ok(())
    }
}

/// Errors raised while assembling a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate factory kind: {0}")]
    DuplicateName(String),
    #[error("factory kind not found: {0}")]
    NotFound(String),
    #[error("no factory kind with id {0:?}")]
    UnknownId(FactoryKindId),
    #[error("factory kind {0} has no worker slots")]
    NoWorkerSlots(String),
    #[error("factory kind {0} has an empty footprint")]
    EmptyFootprint(String),
    #[error("factory kind {0} needs a positive production rate")]
    InvalidRate(String),
    #[error("factory kind {0} consumes what it produces")]
    SameInputOutput(String),
    #[error("factory kind {kind}: capacity {capacity} is below one batch")]
    CapacityBelowBatch { kind: String, capacity: u32 },
}

/// Builder for constructing an immutable [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    kinds: Vec<FactoryKindDef>,
    name_to_id: HashMap<String, FactoryKindId>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind. Returns its ID.
    pub fn register(&mut self, def: FactoryKindDef) -> Result<FactoryKindId, CatalogError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(CatalogError::DuplicateName(def.name));
        }
        let id = FactoryKindId(self.kinds.len() as u32);
        self.name_to_id.insert(def.name.clone(), id);
        self.kinds.push(def);
        Ok(id)
    }

    /// Adjust an already registered kind by name.
    pub fn mutate_kind<F>(&mut self, name: &str, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut FactoryKindDef),
    {
        let id = self
            .name_to_id
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        f(&mut self.kinds[id.0 as usize]);
        Ok(())
    }

    pub fn kind_id(&self, name: &str) -> Option<FactoryKindId> {
        self.name_to_id.get(name).copied()
    }

    /// Validate every kind and freeze the table.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        for def in &self.kinds {
            def.validate()?;
            if self.name_to_id.get(&def.name).map(|id| &self.kinds[id.0 as usize].name) != Some(&def.name) {
                return Err(CatalogError::DuplicateName(def.name.clone()));
            }
        }
        Ok(Catalog {
            kinds: self.kinds,
            name_to_id: self.name_to_id,
        })
    }
}

/// Immutable table of factory kinds.
#[derive(Debug, Clone)]
pub struct Catalog {
    kinds: Vec<FactoryKindDef>,
    name_to_id: HashMap<String, FactoryKindId>,
}

impl Catalog {
    /// The eight stock kinds, validated like any other table.
    pub fn try_standard() -> Result<Self, CatalogError> {
        let mut b = CatalogBuilder::new();
        for def in standard_kinds() {
            b.register(def)?;
        }
        b.build()
    }

    /// The eight stock kinds. Falls back to an empty catalog if the stock
    /// table ever fails validation.
    pub fn standard() -> Self {
        match Self::try_standard() {
            Ok(catalog) => catalog,
            Err(err) => {
                log::error!("stock factory table is invalid: {err}");
                Catalog {
                    kinds: Vec::new(),
                    name_to_id: HashMap::new(),
                }
            }
        }
    }

    pub fn get(&self, id: FactoryKindId) -> Option<&FactoryKindDef> {
        self.kinds.get(id.0 as usize)
    }

    pub fn kind_id(&self, name: &str) -> Option<FactoryKindId> {
        self.name_to_id.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&FactoryKindDef> {
        self.kind_id(name).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FactoryKindId, &FactoryKindDef)> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(i, def)| (FactoryKindId(i as u32), def))
    }
}

fn standard_kinds() -> Vec<FactoryKindDef> {
    use GoodType::*;
    vec![
        FactoryKindDef::new("timber_yard", None, Timber, 9.6)
            .with_placement(PlacementRule::NearTerrain(TerrainFeature::Tree))
            .with_picture(72)
            .with_animation(73, 10, 1),
        FactoryKindDef::new("iron_mine", None, Iron, 9.6)
            .with_placement(PlacementRule::NearTerrain(TerrainFeature::Rock))
            .with_picture(54)
            .with_animation(55, 6, 5),
        FactoryKindDef::new("clay_pit", None, Clay, 4.8)
            .with_placement(PlacementRule::NearTerrain(TerrainFeature::Water))
            .with_picture(61)
            .with_animation(62, 10, 1),
        FactoryKindDef::new("wharf", None, Fish, 4.8)
            .with_placement(PlacementRule::WaterEdge)
            .with_picture(52),
        FactoryKindDef::new("weapons_workshop", Some(Iron), Weapon, 4.8)
            .with_picture(108)
            .with_animation(109, 6, 1),
        FactoryKindDef::new("furniture_workshop", Some(Timber), Furniture, 4.8)
            .with_picture(117)
            .with_animation(118, 14, 1),
        FactoryKindDef::new("winery", Some(Grape), Wine, 4.8)
            .with_picture(86)
            .with_animation(87, 12, 1),
        FactoryKindDef::new("oil_workshop", Some(Olive), Oil, 4.8)
            .with_picture(99)
            .with_animation(100, 8, 1),
    ]
}
