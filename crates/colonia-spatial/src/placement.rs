//! Placement rules: whether a factory kind may stand at a position, and
//! putting it there.

use crate::{Footprint, GridPosition, Tilemap};
use colonia_core::catalog::{CatalogError, FactoryKindDef, PlacementRule, TerrainFeature};
use colonia_core::city::City;
use colonia_core::factory::Factory;
use colonia_core::id::{FactoryId, FactoryKindId};

/// Why a factory cannot be placed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("tile {0:?} is not buildable")]
    Blocked(GridPosition),
    #[error("placement rule {0:?} is not met")]
    RuleNotMet(PlacementRule),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Whether `rule` holds for `footprint` on `map`.
pub fn rule_holds(map: &Tilemap, rule: PlacementRule, footprint: Footprint) -> bool {
    match rule {
        PlacementRule::Anywhere => true,
        PlacementRule::NearTerrain(feature) => footprint
            .ring()
            .into_iter()
            .any(|pos| map.has_feature(pos, feature)),
        PlacementRule::WaterEdge => footprint.sides().iter().any(|side| {
            side.iter()
                .all(|&pos| map.has_feature(pos, TerrainFeature::Water))
        }),
    }
}

/// Check every footprint tile and the kind's placement rule.
pub fn check_placement(
    map: &Tilemap,
    def: &FactoryKindDef,
    origin: GridPosition,
) -> Result<Footprint, PlacementError> {
    let footprint = Footprint::new(origin, def.size);
    if let Some(blocked) = footprint.tiles().find(|&pos| !map.is_buildable(pos)) {
        return Err(PlacementError::Blocked(blocked));
    }
    if !rule_holds(map, def.placement, footprint) {
        return Err(PlacementError::RuleNotMet(def.placement));
    }
    Ok(footprint)
}

pub fn can_build(map: &Tilemap, def: &FactoryKindDef, origin: GridPosition) -> bool {
    check_placement(map, def, origin).is_ok()
}

/// Road tiles orthogonally adjacent to the footprint.
pub fn access_roads(map: &Tilemap, footprint: Footprint) -> u32 {
    footprint
        .sides()
        .iter()
        .flatten()
        .filter(|&&pos| map.is_road(pos))
        .count() as u32
}

/// Validate, occupy the tiles, and add the factory to the city with its
/// access-road count.
pub fn place_factory(
    city: &mut City,
    map: &mut Tilemap,
    kind: FactoryKindId,
    origin: GridPosition,
) -> Result<FactoryId, PlacementError> {
    let def = city
        .catalog()
        .get(kind)
        .ok_or(CatalogError::UnknownId(kind))?;
    let footprint = check_placement(map, def, origin)?;
    let roads = access_roads(map, footprint);

    let id = city.add_factory(kind)?;
    if let Some(factory) = city.factory_mut(id) {
        factory.set_access_roads(roads);
    }
    map.occupy(id, footprint);
    log::debug!("placed factory {id:?} at {origin:?} with {roads} access roads");
    Ok(id)
}

/// Remove a factory from both the city and the map.
pub fn demolish(city: &mut City, map: &mut Tilemap, id: FactoryId) -> Option<Factory> {
    map.vacate(id);
    city.remove_factory(id)
}

/// Recount access roads for every placed factory, after roads changed.
pub fn refresh_access_roads(city: &mut City, map: &Tilemap) {
    for (id, footprint) in map.placements() {
        if let Some(factory) = city.factory_mut(id) {
            factory.set_access_roads(access_roads(map, footprint));
        }
    }
}
