//! End-to-end production scenarios for a single factory.

use colonia_core::animation::Animation;
use colonia_core::fixed::Fixed64;
use colonia_core::id::GoodType;
use colonia_core::production::{ProductionPhase, StallReason};
use colonia_core::test_utils::*;

// ===========================================================================
// Raw material at half staffing
// ===========================================================================

#[test]
fn half_staffed_raw_producer_deposits_one_batch() {
    let mut factory = staffed_factory("clay_pit", 5);
    let id = factory_id(1);
    let mut transport = ScriptedTransport::refusing();

    let mut produced = None;
    for t in 0..5_000 {
        let report = factory.step(t, id, &mut transport);
        if let Some(cycle) = report.cycle
            && cycle.produced > 0
        {
            produced = Some((t, cycle.produced));
            break;
        }
    }

    let (tick, quantity) = produced.expect("no batch within 5000 ticks");
    assert_eq!(quantity, 100);
    assert_eq!(factory.ledger().quantity(GoodType::Clay), 100);
    let progress = factory.cycle().progress();
    assert!(progress >= Fixed64::ZERO && progress < Fixed64::from_num(100));
    // 0.25 of the full-staff rate: about 603 ticks of work per batch.
    assert!((590..620).contains(&tick), "batch finished at tick {tick}");
}

// ===========================================================================
// Output already full
// ===========================================================================

#[test]
fn full_output_holds_progress_until_space_frees() {
    let mut factory = with_stock(staffed_factory("clay_pit", 10), GoodType::Clay, 200);
    let id = factory_id(1);
    let mut transport = ScriptedTransport::refusing();

    let mut t = 0;
    while factory.cycle().progress() < Fixed64::from_num(100) {
        factory.step(t, id, &mut transport);
        t += 1;
        assert!(t < 5_000, "progress never reached 100");
    }
    let held = factory.cycle().progress();
    assert_eq!(factory.phase(), ProductionPhase::OutputReady);

    for _ in 0..200 {
        factory.step(t, id, &mut transport);
        t += 1;
    }
    assert_eq!(factory.cycle().progress(), held);
    assert_eq!(factory.ledger().quantity(GoodType::Clay), 200);

    let _ = factory.ledger_mut().withdraw(GoodType::Clay, 100);
    let report = factory.step(t, id, &mut transport);
    assert_eq!(report.cycle.unwrap().produced, 100);
    assert_eq!(factory.cycle().progress(), held - Fixed64::from_num(100));
}

// ===========================================================================
// Empty input stock
// ===========================================================================

#[test]
fn empty_input_stops_work_and_animation() {
    let mut factory = staffed_factory("furniture_workshop", 8);
    assert!(!factory.may_work());
    assert!(!factory.cycle().is_producing());

    let report = factory.step(0, factory_id(1), &mut ScriptedTransport::refusing());
    assert!(report.cycle.is_none());
    assert!(factory.animation().is_stopped());
    assert!(factory.stand_idle());
}

// ===========================================================================
// Failed outbound dispatch
// ===========================================================================

#[test]
fn failed_shipment_refunds_output() {
    let mut factory = staffed_factory("oil_workshop", 10);
    factory.ledger_mut().add_stock(GoodType::Oil, 400);
    factory.ledger_mut().set_quantity(GoodType::Oil, 250);
    let mut transport = ScriptedTransport::refusing();

    // Tick 1 is a cadence tick.
    factory.step(1, factory_id(1), &mut transport);

    assert_eq!(factory.ledger().quantity(GoodType::Oil), 250);
    assert!(factory.dispatcher().outstanding().is_none());
    assert!(
        transport
            .requests
            .iter()
            .any(|r| r.good == GoodType::Oil && r.quantity == 250)
    );
}

// ===========================================================================
// Workshop life cycle
// ===========================================================================

#[test]
fn full_output_throttles_the_next_workshop_cycle() {
    let mut factory = with_stock(staffed_factory("winery", 10), GoodType::Grape, 200);
    let id = factory_id(1);
    let mut transport = ScriptedTransport::refusing();

    let mut produced = 0;
    let mut last = None;
    for t in 0..3_000 {
        let report = factory.step(t, id, &mut transport);
        if let Some(cycle) = &report.cycle {
            produced += cycle.produced;
        }
        last = Some(report);
    }
    // One batch out; with a full batch of wine waiting the second never starts.
    assert_eq!(produced, 100);
    assert_eq!(factory.ledger().quantity(GoodType::Grape), 100);
    assert_eq!(factory.ledger().quantity(GoodType::Wine), 100);
    assert!(factory.may_work());
    assert_eq!(last.unwrap().stall, Some(StallReason::OutputFull));
}

#[test]
fn shipped_output_frees_the_dispatcher_on_release() {
    let mut factory = with_stock(staffed_factory("iron_mine", 10), GoodType::Iron, 150);
    let id = factory_id(1);
    let mut transport = ScriptedTransport::accepting();

    factory.step(1, id, &mut transport);
    assert_eq!(factory.ledger().quantity(GoodType::Iron), 0);
    let agent = factory.dispatcher().outstanding().unwrap().agent;

    // Next cadence tick: still out, nothing new requested.
    factory.step(23, id, &mut transport);
    assert_eq!(transport.requests.len(), 1);

    transport.finish(agent);
    assert!(factory.release_agent(agent));
    assert!(factory.dispatcher().is_idle());
}
