//! Tile map for factory placement: terrain, roads and building footprints.
//!
//! Provides a bounded 2D grid of tiles, a record of which factory occupies
//! each tile, and the rectangle scans placement rules need. The placement
//! rules themselves live in [`placement`].

use colonia_core::catalog::TerrainFeature;
use colonia_core::id::FactoryId;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::collections::BTreeMap;

pub mod placement;
pub use placement::{PlacementError, access_roads, can_build, check_placement, place_factory};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A position on the grid. `(0, 0)` is the top-left tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

/// Square building footprint anchored at its top-left tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub origin: GridPosition,
    pub size: u32,
}

impl Footprint {
    pub fn new(origin: GridPosition, size: u32) -> Self {
        Self { origin, size }
    }

    /// Every tile the footprint covers, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = GridPosition> {
        let n = self.size as i32;
        let o = self.origin;
        (0..n).flat_map(move |dy| (0..n).map(move |dx| o.offset(dx, dy)))
    }

    pub fn contains(&self, pos: GridPosition) -> bool {
        let n = self.size as i32;
        (self.origin.x..self.origin.x + n).contains(&pos.x)
            && (self.origin.y..self.origin.y + n).contains(&pos.y)
    }

    /// The four sides of the one-tile ring around the footprint, corners
    /// excluded, in north, east, south, west order.
    pub fn sides(&self) -> [Vec<GridPosition>; 4] {
        let n = self.size as i32;
        let o = self.origin;
        [
            (0..n).map(|dx| o.offset(dx, -1)).collect(),
            (0..n).map(|dy| o.offset(n, dy)).collect(),
            (0..n).map(|dx| o.offset(dx, n)).collect(),
            (0..n).map(|dy| o.offset(-1, dy)).collect(),
        ]
    }

    /// The one-tile ring around the footprint, corners included.
    pub fn ring(&self) -> Vec<GridPosition> {
        let n = self.size as i32;
        let o = self.origin;
        let mut ring: Vec<GridPosition> = self.sides().into_iter().flatten().collect();
        ring.extend([o.offset(-1, -1), o.offset(n, -1), o.offset(n, n), o.offset(-1, n)]);
        ring
    }
}

/// Ground type of a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Grass,
    Tree,
    Rock,
    Water,
}

impl Terrain {
    /// The feature placement rules look for, if this terrain is one.
    pub fn feature(self) -> Option<TerrainFeature> {
        match self {
            Terrain::Grass => None,
            Terrain::Tree => Some(TerrainFeature::Tree),
            Terrain::Rock => Some(TerrainFeature::Rock),
            Terrain::Water => Some(TerrainFeature::Water),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub road: bool,
}

// ---------------------------------------------------------------------------
// Tilemap
// ---------------------------------------------------------------------------

/// A bounded grid of tiles plus the factories standing on it.
///
/// Maintains a bidirectional mapping:
/// - `occupants`: position -> factory
/// - `footprints`: factory -> footprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tilemap {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
    occupants: BTreeMap<GridPosition, FactoryId>,
    footprints: SecondaryMap<FactoryId, Footprint>,
}

impl Tilemap {
    /// A map of open grass.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::default(); width as usize * height as usize],
            occupants: BTreeMap::new(),
            footprints: SecondaryMap::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, pos: GridPosition) -> Option<usize> {
        let x = u32::try_from(pos.x).ok()?;
        let y = u32::try_from(pos.y).ok()?;
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }

    pub fn in_bounds(&self, pos: GridPosition) -> bool {
        self.index(pos).is_some()
    }

    pub fn tile(&self, pos: GridPosition) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    /// Returns false when `pos` is off the map.
    pub fn set_terrain(&mut self, pos: GridPosition, terrain: Terrain) -> bool {
        let Some(i) = self.index(pos) else {
            return false;
        };
        self.tiles[i].terrain = terrain;
        true
    }

    /// Returns false when `pos` is off the map.
    pub fn set_road(&mut self, pos: GridPosition, road: bool) -> bool {
        let Some(i) = self.index(pos) else {
            return false;
        };
        self.tiles[i].road = road;
        true
    }

    /// Paint an inclusive rectangle with one terrain, clipped to the map.
    pub fn fill(&mut self, min: GridPosition, max: GridPosition, terrain: Terrain) {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                self.set_terrain(GridPosition::new(x, y), terrain);
            }
        }
    }

    pub fn is_road(&self, pos: GridPosition) -> bool {
        self.tile(pos).is_some_and(|t| t.road)
    }

    pub fn has_feature(&self, pos: GridPosition, feature: TerrainFeature) -> bool {
        self.tile(pos)
            .is_some_and(|t| t.terrain.feature() == Some(feature))
    }

    /// Grass without a road or a building.
    pub fn is_buildable(&self, pos: GridPosition) -> bool {
        self.tile(pos)
            .is_some_and(|t| t.terrain == Terrain::Grass && !t.road)
            && !self.occupants.contains_key(&pos)
    }

    pub fn occupant(&self, pos: GridPosition) -> Option<FactoryId> {
        self.occupants.get(&pos).copied()
    }

    pub fn footprint(&self, factory: FactoryId) -> Option<Footprint> {
        self.footprints.get(factory).copied()
    }

    /// Every placed factory with its footprint.
    pub fn placements(&self) -> impl Iterator<Item = (FactoryId, Footprint)> + '_ {
        self.footprints.iter().map(|(id, fp)| (id, *fp))
    }

    /// Mark the footprint's tiles as taken by `factory`. Callers check
    /// buildability first.
    pub(crate) fn occupy(&mut self, factory: FactoryId, footprint: Footprint) {
        for tile in footprint.tiles() {
            self.occupants.insert(tile, factory);
        }
        self.footprints.insert(factory, footprint);
    }

    /// Free a factory's tiles. Returns its footprint.
    pub fn vacate(&mut self, factory: FactoryId) -> Option<Footprint> {
        let footprint = self.footprints.remove(factory)?;
        for tile in footprint.tiles() {
            self.occupants.remove(&tile);
        }
        Some(footprint)
    }
}
