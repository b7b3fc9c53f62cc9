//! Production chain example: an iron mine feeding a weapons workshop
//! through the city warehouse.
//!
//! The mine ships iron to the warehouse on cadence ticks; the workshop
//! pulls it back in and turns it into weapons. Prints both factories every
//! 200 steps for one simulated year.
//!
//! Run with: `cargo run -p colonia-core --example production_chain`

use colonia_core::city::City;
use colonia_core::event::{Event, EventKind};
use colonia_core::id::GoodType;

fn main() {
    let mut city = City::standard();

    let mine = city.add_factory_named("iron_mine").expect("stock kind");
    let workshop = city.add_factory_named("weapons_workshop").expect("stock kind");
    for id in [mine, workshop] {
        let factory = city.factory_mut(id).expect("just added");
        factory.set_workers(10);
        factory.set_access_roads(1);
    }

    city.on_passive(
        EventKind::GoodsProduced,
        Box::new(|event| {
            if let Event::GoodsProduced { good, quantity, tick, .. } = event {
                println!("  tick {tick}: +{quantity} {good}");
            }
        }),
    );

    // One year at full staffing is 1080 seconds of 0.67 ticks.
    for _ in 0..4 {
        city.advance(200);
        println!("=== Tick {} ===", city.tick());
        for (label, id) in [("mine", mine), ("workshop", workshop)] {
            let f = city.factory(id).expect("still placed");
            println!(
                "  {label}: phase={:?} progress={}% iron={} weapons={}",
                f.phase(),
                f.progress_percent(),
                f.ledger().quantity(GoodType::Iron),
                f.ledger().quantity(GoodType::Weapon),
            );
        }
        println!(
            "  warehouse: iron={} weapons={} carts={}",
            city.carts().warehouse().quantity(GoodType::Iron),
            city.carts().warehouse().quantity(GoodType::Weapon),
            city.carts().len(),
        );
    }

    println!("\nstate hash: {:#018x}", city.state_hash());
}
