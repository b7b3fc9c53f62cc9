use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Identifies a factory building placed in a city.
    pub struct FactoryId;

    /// Identifies a live transport agent (cart).
    pub struct AgentId;
}

/// Identifies a factory kind in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactoryKindId(pub u32);

/// A commodity category.
///
/// There is no "none" variant: a factory that needs no input carries
/// `input: None` instead, so the raw-material path has no ledger entry to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoodType {
    Wheat,
    Vegetable,
    Fruit,
    Olive,
    Grape,
    Meat,
    Fish,
    Wine,
    Oil,
    Iron,
    Timber,
    Clay,
    Marble,
    Weapon,
    Furniture,
    Pottery,
}

impl GoodType {
    pub const ALL: [GoodType; 16] = [
        GoodType::Wheat,
        GoodType::Vegetable,
        GoodType::Fruit,
        GoodType::Olive,
        GoodType::Grape,
        GoodType::Meat,
        GoodType::Fish,
        GoodType::Wine,
        GoodType::Oil,
        GoodType::Iron,
        GoodType::Timber,
        GoodType::Clay,
        GoodType::Marble,
        GoodType::Weapon,
        GoodType::Furniture,
        GoodType::Pottery,
    ];

    /// Stable snake_case name, matching the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            GoodType::Wheat => "wheat",
            GoodType::Vegetable => "vegetable",
            GoodType::Fruit => "fruit",
            GoodType::Olive => "olive",
            GoodType::Grape => "grape",
            GoodType::Meat => "meat",
            GoodType::Fish => "fish",
            GoodType::Wine => "wine",
            GoodType::Oil => "oil",
            GoodType::Iron => "iron",
            GoodType::Timber => "timber",
            GoodType::Clay => "clay",
            GoodType::Marble => "marble",
            GoodType::Weapon => "weapon",
            GoodType::Furniture => "furniture",
            GoodType::Pottery => "pottery",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.name() == name)
    }

    /// Index into `ALL`, used for hashing.
    pub fn index(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for GoodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
