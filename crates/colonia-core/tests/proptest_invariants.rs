//! Property-based tests for ledger, cycle and dispatch invariants.

use colonia_core::fixed::Fixed64;
use colonia_core::id::GoodType;
use colonia_core::ledger::GoodsLedger;
use colonia_core::logistics::{DispatchOutcome, Dispatcher};
use colonia_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum LedgerOp {
    Deposit(usize, u32),
    Withdraw(usize, u32),
    SetCapacity(usize, i64),
}

const GOODS: [GoodType; 3] = [GoodType::Iron, GoodType::Timber, GoodType::Weapon];

fn arb_ledger_ops() -> impl Strategy<Value = Vec<LedgerOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..3usize, 0..600u32).prop_map(|(g, q)| LedgerOp::Deposit(g, q)),
            (0..3usize, 0..600u32).prop_map(|(g, q)| LedgerOp::Withdraw(g, q)),
            (0..3usize, -50..500i64).prop_map(|(g, m)| LedgerOp::SetCapacity(g, m)),
        ],
        1..200,
    )
}

#[derive(Debug, Clone)]
enum WorldOp {
    Step,
    Deliver(u32),
    Collect(u32),
    FinishAgent,
}

fn arb_world_ops() -> impl Strategy<Value = Vec<WorldOp>> {
    proptest::collection::vec(
        prop_oneof![
            8 => Just(WorldOp::Step),
            1 => (0..250u32).prop_map(WorldOp::Deliver),
            1 => (0..250u32).prop_map(WorldOp::Collect),
            1 => Just(WorldOp::FinishAgent),
        ],
        1..1500,
    )
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every stock stays within `0..=max` and the total within the store cap.
    #[test]
    fn ledger_stays_within_capacity(ops in arb_ledger_ops()) {
        let mut ledger = GoodsLedger::new(700);
        for good in GOODS {
            ledger.set_capacity(good, 200).unwrap();
        }
        for op in ops {
            match op {
                LedgerOp::Deposit(g, q) => {
                    let before = ledger.quantity(GOODS[g]);
                    let accepted = ledger.deposit(GOODS[g], q);
                    prop_assert!(accepted <= q);
                    prop_assert_eq!(ledger.quantity(GOODS[g]), before + accepted);
                }
                LedgerOp::Withdraw(g, q) => {
                    let before = ledger.quantity(GOODS[g]);
                    let removed = ledger.withdraw(GOODS[g], q);
                    prop_assert_eq!(removed, q.min(before));
                }
                LedgerOp::SetCapacity(g, m) => {
                    let result = ledger.set_capacity(GOODS[g], m);
                    prop_assert_eq!(result.is_err(), m < 0);
                }
            }
            for stock in ledger.stocks() {
                prop_assert!(stock.current <= stock.max);
            }
            prop_assert!(ledger.total() <= 700);
        }
    }

    /// A refused shipment puts back exactly what it took, even when a
    /// restored store sits above its aggregate cap.
    #[test]
    fn failed_shipment_conserves_goods(
        stock in 0..=1000u32,
        limit in 1..=1000u32,
        store_cap in 100..=2000u32,
    ) {
        let mut ledger = GoodsLedger::new(store_cap);
        ledger.set_capacity(GoodType::Wine, 1000).unwrap();
        ledger.set_quantity(GoodType::Wine, stock);

        let mut dispatcher = Dispatcher::new(colonia_core::logistics::LogisticsConfig {
            shipment_limit: limit,
            ..Default::default()
        });
        let outcome = dispatcher.ship_output(
            factory_id(1),
            1,
            GoodType::Wine,
            &mut ledger,
            &mut ScriptedTransport::refusing(),
        );
        prop_assert_eq!(ledger.quantity(GoodType::Wine), stock);
        prop_assert!(dispatcher.is_idle());
        if let DispatchOutcome::Failed { request, refunded, .. } = outcome {
            prop_assert_eq!(refunded, request.quantity);
            prop_assert_eq!(request.quantity, stock.min(limit));
        }
    }

    /// Progress only drops by exactly one batch, and only on a completion;
    /// every started workshop cycle reserved exactly one batch; one agent at most.
    #[test]
    fn cycle_and_dispatch_invariants(workers in 1..=10u32, ops in arb_world_ops()) {
        let mut factory = staffed_factory("weapons_workshop", workers);
        let id = factory_id(1);
        let mut transport = ScriptedTransport::accepting();
        let batch = Fixed64::from_num(100);
        let mut t = 0u64;

        for op in ops {
            match op {
                WorldOp::Step => {
                    let before = factory.cycle().progress();
                    let idle_before = factory.dispatcher().is_idle();
                    let requests_before = transport.requests.len();

                    let report = factory.step(t, id, &mut transport);
                    t += 1;

                    let after = factory.cycle().progress();
                    if after < before {
                        prop_assert_eq!(before - after, batch);
                        let cycle = report.cycle.as_ref().unwrap();
                        prop_assert_eq!(cycle.produced + cycle.discarded, 100);
                        prop_assert!(cycle.produced > 0);
                    }
                    if let Some(cycle) = &report.cycle
                        && cycle.started
                    {
                        prop_assert_eq!(cycle.reserved, 100);
                    }
                    if !idle_before {
                        prop_assert_eq!(transport.requests.len(), requests_before);
                    }
                    prop_assert!(transport.live() <= 1);
                }
                WorldOp::Deliver(q) => {
                    let _ = factory.receive_delivery(GoodType::Iron, q);
                }
                WorldOp::Collect(q) => {
                    let _ = factory.ledger_mut().withdraw(GoodType::Weapon, q);
                }
                WorldOp::FinishAgent => {
                    let next = transport.agents().next();
                    if let Some(agent) = next {
                        transport.finish(agent);
                        prop_assert!(factory.release_agent(agent));
                    }
                }
            }
        }
    }
}
