//! Persistence: per-factory save records and binary city snapshots.
//!
//! Save records are the stable, human-readable format (`productionRate`,
//! `progress`, `goodStore`, ...) meant for JSON save files. Snapshots are
//! opaque `bitcode` blobs with a versioned header, used for quick save and
//! desync debugging.

use crate::cart::CartPool;
use crate::catalog::Catalog;
use crate::city::City;
use crate::event::EventBus;
use crate::factory::Factory;
use crate::fixed::{Fixed64, f64_to_fixed64, fixed64_to_f64};
use crate::id::{FactoryId, FactoryKindId, GoodType};
use crate::ledger::{GoodsLedger, LedgerError};
use crate::logistics::LogisticsConfig;
use crate::production::ProductionCycle;
use crate::sim::SimState;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Save records
// ---------------------------------------------------------------------------

/// One stock entry of a saved goods store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub good: GoodType,
    pub current: i64,
    pub max: i64,
}

/// A saved goods store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub max_qty: i64,
    pub stocks: Vec<StockRecord>,
}

/// Saved state of one factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryRecord {
    /// Catalog name of the factory kind.
    pub kind: String,
    #[serde(default)]
    pub workers: u32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub access_roads: u32,
    #[serde(deserialize_with = "coerce_f64")]
    pub production_rate: f64,
    #[serde(deserialize_with = "coerce_f64")]
    pub progress: f64,
    pub good_store: LedgerRecord,
    #[serde(default)]
    pub producing: bool,
}

fn default_active() -> bool {
    true
}

/// Accept any JSON/RON/TOML number, integer or float.
fn coerce_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    struct NumberVisitor;

    impl Visitor<'_> for NumberVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a number")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }
    }

    deserializer.deserialize_any(NumberVisitor)
}

/// Errors raised while restoring saved factories.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unknown factory kind: {0}")]
    UnknownKind(String),
    #[error("invalid {field}: {value}")]
    InvalidNumber { field: &'static str, value: f64 },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("save file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while writing save records.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("factory kind {0:?} is missing from the catalog")]
    UnknownKind(FactoryKindId),
    #[error("save records could not be encoded: {0}")]
    Json(#[from] serde_json::Error),
}

fn checked_number(field: &'static str, value: f64) -> Result<Fixed64, LoadError> {
    if !value.is_finite() || value < 0.0 {
        return Err(LoadError::InvalidNumber { field, value });
    }
    Ok(f64_to_fixed64(value))
}

impl LedgerRecord {
    pub fn capture(ledger: &GoodsLedger) -> Self {
        Self {
            max_qty: i64::from(ledger.max_total()),
            stocks: ledger
                .stocks()
                .map(|s| StockRecord {
                    good: s.good,
                    current: i64::from(s.current),
                    max: i64::from(s.max),
                })
                .collect(),
        }
    }

    /// Overlay the saved stocks onto `ledger`. Stocks the record does not
    /// mention keep their configured capacity and stay empty. A record whose
    /// stocks add up to more than its store capacity is rejected.
    pub fn restore_into(&self, ledger: &mut GoodsLedger) -> Result<(), LedgerError> {
        ledger.set_max_total(self.max_qty)?;
        for stock in &self.stocks {
            ledger.set_capacity(stock.good, stock.max)?;
            let current = u32::try_from(stock.current.max(0)).unwrap_or(u32::MAX);
            ledger.set_quantity(stock.good, current);
        }
        ledger.check_total()
    }
}

impl FactoryRecord {
    /// Fails when `catalog` does not know the factory's kind, since the
    /// record could never be loaded again.
    pub fn capture(factory: &Factory, catalog: &Catalog) -> Result<Self, SaveError> {
        let kind = catalog
            .get(factory.kind())
            .map(|def| def.name.clone())
            .ok_or(SaveError::UnknownKind(factory.kind()))?;
        Ok(Self {
            kind,
            workers: factory.workers(),
            active: factory.is_active(),
            access_roads: factory.access_roads(),
            production_rate: fixed64_to_f64(factory.cycle().rate()),
            progress: fixed64_to_f64(factory.cycle().progress()),
            good_store: LedgerRecord::capture(factory.ledger()),
            producing: factory.cycle().is_producing(),
        })
    }

    /// Rebuild a factory. The catalog supplies everything the record does
    /// not carry.
    pub fn restore(&self, catalog: &Catalog, logistics: &LogisticsConfig) -> Result<Factory, LoadError> {
        let kind = catalog
            .kind_id(&self.kind)
            .ok_or_else(|| LoadError::UnknownKind(self.kind.clone()))?;
        let def = catalog
            .get(kind)
            .ok_or_else(|| LoadError::UnknownKind(self.kind.clone()))?;
        let rate = checked_number("productionRate", self.production_rate)?;
        let progress = checked_number("progress", self.progress)?;

        let mut factory = Factory::new(kind, def, logistics.clone());
        let mut ledger = factory.ledger().clone();
        self.good_store.restore_into(&mut ledger)?;
        let cycle = ProductionCycle::restore(rate, progress, self.producing, self.active);
        factory.replace_state(ledger, cycle);
        factory.set_workers(self.workers);
        factory.set_access_roads(self.access_roads);
        Ok(factory)
    }
}

impl City {
    /// Save records for every factory, in slot order.
    pub fn save_records(&self) -> Result<Vec<FactoryRecord>, SaveError> {
        self.factories
            .values()
            .map(|f| FactoryRecord::capture(f, &self.catalog))
            .collect()
    }

    /// Replace every factory with the saved ones. Nothing changes if any
    /// record fails to load.
    pub fn load_records(&mut self, records: &[FactoryRecord]) -> Result<Vec<FactoryId>, LoadError> {
        let factories = records
            .iter()
            .map(|r| r.restore(&self.catalog, &self.logistics))
            .collect::<Result<Vec<_>, _>>()?;

        let old: Vec<FactoryId> = self.factories.keys().collect();
        for id in old {
            self.remove_factory(id);
        }
        let ids = factories
            .into_iter()
            .map(|f| self.insert_factory(f))
            .collect();
        log::info!("restored {} factories from save records", records.len());
        Ok(ids)
    }

    pub fn save_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string_pretty(&self.save_records()?)?)
    }

    pub fn load_json(&mut self, json: &str) -> Result<Vec<FactoryId>, LoadError> {
        let records: Vec<FactoryRecord> = serde_json::from_str(json)?;
        self.load_records(&records)
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Magic number identifying a city snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xC017_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

/// Header at the front of every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick the snapshot was taken on.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// The serializable part of a city. The catalog is static data and the
/// event bus holds closures, so neither is stored.
#[derive(Debug, Serialize, Deserialize)]
struct CitySnapshot {
    header: SnapshotHeader,
    logistics: LogisticsConfig,
    factories: SlotMap<FactoryId, Factory>,
    carts: CartPool,
    sim_state: SimState,
    last_state_hash: u64,
    #[serde(default)]
    paused: bool,
}

fn decode(data: &[u8]) -> Result<CitySnapshot, DeserializeError> {
    bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
}

/// Decode a snapshot far enough to read its header.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    Ok(decode(data)?.header)
}

impl City {
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = CitySnapshot {
            header: SnapshotHeader::new(self.sim_state.tick),
            logistics: self.logistics.clone(),
            factories: self.factories.clone(),
            carts: self.carts.clone(),
            sim_state: self.sim_state.clone(),
            last_state_hash: self.last_state_hash,
            paused: self.paused,
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Restore a city from a snapshot taken with the same catalog. The event
    /// bus comes back empty; listeners must be registered again.
    pub fn deserialize(data: &[u8], catalog: Catalog) -> Result<Self, DeserializeError> {
        let snapshot = decode(data)?;
        snapshot.header.validate()?;
        log::info!("restored city snapshot at tick {}", snapshot.header.tick);

        Ok(City {
            catalog,
            logistics: snapshot.logistics,
            factories: snapshot.factories,
            carts: snapshot.carts,
            events: EventBus::default(),
            sim_state: snapshot.sim_state,
            last_state_hash: snapshot.last_state_hash,
            paused: snapshot.paused,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;

    fn staffed_city() -> (City, FactoryId) {
        let mut city = City::standard();
        let id = city.add_factory_named("weapons_workshop").unwrap();
        let f = city.factory_mut(id).unwrap();
        f.set_workers(6);
        f.set_access_roads(1);
        let _ = f.receive_delivery(GoodType::Iron, 180);
        city.advance(40);
        (city, id)
    }

    #[test]
    fn record_uses_save_keys() {
        let (city, _) = staffed_city();
        let json = city.save_json().unwrap();
        for key in ["productionRate", "progress", "goodStore", "maxQty", "accessRoads"] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn integer_numbers_are_accepted() {
        let json = r#"{
            "kind": "winery",
            "productionRate": 5,
            "progress": 42,
            "goodStore": { "maxQty": 1000, "stocks": [
                { "good": "grape", "current": 120, "max": 200 }
            ] }
        }"#;
        let record: FactoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.production_rate, 5.0);
        assert!(!record.producing);
        assert!(record.active);

        let factory = record
            .restore(&Catalog::standard(), &LogisticsConfig::default())
            .unwrap();
        assert_eq!(factory.progress_percent(), 42);
        assert_eq!(factory.ledger().quantity(GoodType::Grape), 120);
        // The output stock comes from the catalog when the save omits it.
        assert_eq!(factory.output_stock().unwrap().max, 200);
    }

    #[test]
    fn records_restore_the_same_factories() {
        let (city, id) = staffed_city();
        let records = city.save_records().unwrap();

        let mut copy = City::standard();
        let ids = copy.load_records(&records).unwrap();
        assert_eq!(ids.len(), 1);
        let a = city.factory(id).unwrap();
        let b = copy.factory(ids[0]).unwrap();
        assert_eq!(a.ledger(), b.ledger());
        assert_eq!(a.cycle(), b.cycle());
        assert_eq!(a.workers(), b.workers());
    }

    #[test]
    fn unknown_kind_leaves_city_untouched() {
        let (mut city, id) = staffed_city();
        let mut records = city.save_records().unwrap();
        records.push(FactoryRecord {
            kind: "granary".into(),
            ..records[0].clone()
        });
        assert!(matches!(
            city.load_records(&records),
            Err(LoadError::UnknownKind(k)) if k == "granary"
        ));
        assert!(city.factory(id).is_some());
    }

    #[test]
    fn negative_capacity_is_a_load_error() {
        let mut record = staffed_city().0.save_records().unwrap().remove(0);
        record.good_store.stocks[0].max = -5;
        assert!(matches!(
            record.restore(&Catalog::standard(), &LogisticsConfig::default()),
            Err(LoadError::Ledger(_))
        ));
    }

    #[test]
    fn overfull_store_is_a_load_error() {
        let json = r#"{
            "kind": "weapons_workshop",
            "productionRate": 4.8,
            "progress": 0,
            "goodStore": { "maxQty": 150, "stocks": [
                { "good": "weapon", "current": 200, "max": 200 }
            ] }
        }"#;
        let record: FactoryRecord = serde_json::from_str(json).unwrap();
        assert!(matches!(
            record.restore(&Catalog::standard(), &LogisticsConfig::default()),
            Err(LoadError::Ledger(LedgerError::OverStoreCapacity { total: 200, max: 150 }))
        ));
    }

    #[test]
    fn saving_with_a_foreign_catalog_fails() {
        let (city, _) = staffed_city();
        let data = city.serialize().unwrap();
        let restored = City::deserialize(&data, CatalogBuilder::new().build().unwrap()).unwrap();
        assert!(matches!(restored.save_json(), Err(SaveError::UnknownKind(_))));
    }

    #[test]
    fn nan_progress_is_rejected() {
        let mut record = staffed_city().0.save_records().unwrap().remove(0);
        record.progress = f64::NAN;
        assert!(matches!(
            record.restore(&Catalog::standard(), &LogisticsConfig::default()),
            Err(LoadError::InvalidNumber { field: "progress", .. })
        ));
    }

    #[test]
    fn snapshot_round_trip_keeps_hash() {
        let (mut city, _) = staffed_city();
        let data = city.serialize().unwrap();
        let mut restored = City::deserialize(&data, Catalog::standard()).unwrap();
        assert_eq!(restored.tick(), city.tick());
        assert_eq!(restored.state_hash(), city.state_hash());

        city.advance(50);
        restored.advance(50);
        assert_eq!(restored.state_hash(), city.state_hash());
    }

    #[test]
    fn header_mismatch_is_rejected() {
        let mut header = SnapshotHeader::new(3);
        header.magic = 0xDEAD_BEEF;
        assert!(matches!(header.validate(), Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))));

        let mut header = SnapshotHeader::new(3);
        header.version = FORMAT_VERSION + 1;
        assert!(matches!(header.validate(), Err(DeserializeError::FutureVersion(_))));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            City::deserialize(&[1, 2, 3], Catalog::standard()),
            Err(DeserializeError::Decode(_))
        ));
    }
}
