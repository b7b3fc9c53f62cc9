#![no_main]
use arbitrary::Arbitrary;
use colonia_core::city::City;
use colonia_core::id::{FactoryId, FactoryKindId, GoodType};
use libfuzzer_sys::fuzz_target;

/// A structured city operation for fuzzing.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    AddFactory { kind: u8 },
    RemoveFactory { index: u8 },
    SetWorkers { index: u8, workers: u8 },
    SetRoads { index: u8, roads: u8 },
    Deliver { index: u8, good: u8, quantity: u16 },
    Toggle { index: u8 },
    Step { count: u8 },
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    ops: Vec<FuzzOp>,
}

fn pick(ids: &[FactoryId], index: u8) -> Option<FactoryId> {
    (!ids.is_empty()).then(|| ids[index as usize % ids.len()])
}

fuzz_target!(|input: FuzzInput| {
    let mut city = City::standard();
    let mut ids: Vec<FactoryId> = Vec::new();
    let kinds = city.catalog().len() as u32;

    // Limit operations to prevent timeouts.
    for op in input.ops.iter().take(200) {
        match *op {
            FuzzOp::AddFactory { kind } => {
                if let Ok(id) = city.add_factory(FactoryKindId(kind as u32 % kinds)) {
                    ids.push(id);
                }
            }
            FuzzOp::RemoveFactory { index } => {
                if let Some(id) = pick(&ids, index) {
                    city.remove_factory(id);
                    ids.retain(|&other| other != id);
                }
            }
            FuzzOp::SetWorkers { index, workers } => {
                if let Some(f) = pick(&ids, index).and_then(|id| city.factory_mut(id)) {
                    f.set_workers(workers as u32);
                }
            }
            FuzzOp::SetRoads { index, roads } => {
                if let Some(f) = pick(&ids, index).and_then(|id| city.factory_mut(id)) {
                    f.set_access_roads(roads as u32 % 4);
                }
            }
            FuzzOp::Deliver { index, good, quantity } => {
                let good = GoodType::ALL[good as usize % GoodType::ALL.len()];
                if let Some(f) = pick(&ids, index).and_then(|id| city.factory_mut(id)) {
                    let _ = f.receive_delivery(good, quantity as u32);
                }
            }
            FuzzOp::Toggle { index } => {
                if let Some(f) = pick(&ids, index).and_then(|id| city.factory_mut(id)) {
                    let active = f.is_active();
                    f.set_active(!active);
                }
            }
            FuzzOp::Step { count } => {
                city.advance(count as u64 % 50);
            }
        }

        for (_, factory) in city.factories() {
            let ledger = factory.ledger();
            assert!(ledger.total() <= ledger.max_total());
            for stock in ledger.stocks() {
                assert!(stock.current <= stock.max);
            }
        }
    }
});
