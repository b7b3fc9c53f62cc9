//! The city: owns every factory, the cart pool and the event bus, and runs
//! the per-tick pipeline.
//!
//! # Step pipeline
//!
//! 1. **Carts** -- advance carts and settle arrivals (deliver inbound cargo,
//!    release the origin's transport slot).
//! 2. **Factories** -- step every factory in slot order with the current
//!    tick as `time`.
//! 3. **Events** -- translate step reports into events.
//! 4. **Delivery** -- hand buffered events to listeners.
//! 5. **Bookkeeping** -- advance the tick and hash the state.

use crate::cart::{Arrival, CartPool};
use crate::catalog::{Catalog, CatalogError};
use crate::event::{Event, EventBus, EventKind, PassiveListener};
use crate::factory::{Factory, StepReport};
use crate::fixed::Ticks;
use crate::id::{FactoryId, FactoryKindId};
use crate::logistics::{Direction, DispatchOutcome, LogisticsConfig};
use crate::sim::{SimState, StateHash};
use slotmap::SlotMap;

#[derive(Debug)]
pub struct City {
    pub(crate) catalog: Catalog,
    pub(crate) logistics: LogisticsConfig,
    pub(crate) factories: SlotMap<FactoryId, Factory>,
    pub(crate) carts: CartPool,
    pub(crate) events: EventBus,
    pub(crate) sim_state: SimState,
    pub(crate) last_state_hash: u64,
    pub(crate) paused: bool,
}

impl City {
    pub fn new(catalog: Catalog, logistics: LogisticsConfig, carts: CartPool) -> Self {
        Self {
            catalog,
            logistics,
            factories: SlotMap::with_key(),
            carts,
            events: EventBus::default(),
            sim_state: SimState::new(),
            last_state_hash: 0,
            paused: false,
        }
    }

    /// A city using the stock catalog, default logistics and a default cart pool.
    pub fn standard() -> Self {
        Self::new(Catalog::standard(), LogisticsConfig::default(), CartPool::default())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn logistics(&self) -> &LogisticsConfig {
        &self.logistics
    }

    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    pub fn carts(&self) -> &CartPool {
        &self.carts
    }

    pub fn carts_mut(&mut self) -> &mut CartPool {
        &mut self.carts
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.events.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.events.on_passive(kind, listener);
    }

    pub fn factory(&self, id: FactoryId) -> Option<&Factory> {
        self.factories.get(id)
    }

    pub fn factory_mut(&mut self, id: FactoryId) -> Option<&mut Factory> {
        self.factories.get_mut(id)
    }

    /// All factories in slot order.
    pub fn factories(&self) -> impl Iterator<Item = (FactoryId, &Factory)> {
        self.factories.iter()
    }

    pub fn factory_count(&self) -> usize {
        self.factories.len()
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Hash after the last completed step.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    /// Place a new, unstaffed factory of `kind`.
    pub fn add_factory(&mut self, kind: FactoryKindId) -> Result<FactoryId, CatalogError> {
        let def = self.catalog.get(kind).ok_or(CatalogError::UnknownId(kind))?;
        let factory = Factory::new(kind, def, self.logistics.clone());
        Ok(self.insert_factory(factory))
    }

    pub fn add_factory_named(&mut self, name: &str) -> Result<FactoryId, CatalogError> {
        let kind = self
            .catalog
            .kind_id(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        self.add_factory(kind)
    }

    pub(crate) fn insert_factory(&mut self, factory: Factory) -> FactoryId {
        let kind = factory.kind();
        let id = self.factories.insert(factory);
        log::info!("factory {id:?} built ({kind:?})");
        self.events.emit(Event::FactoryBuilt {
            factory: id,
            kind,
            tick: self.sim_state.tick,
        });
        id
    }

    /// Remove a factory. A cart still out for it unloads into the warehouse
    /// when it arrives.
    pub fn remove_factory(&mut self, id: FactoryId) -> Option<Factory> {
        let factory = self.factories.remove(id)?;
        log::info!("factory {id:?} removed");
        self.events.emit(Event::FactoryRemoved {
            factory: id,
            tick: self.sim_state.tick,
        });
        Some(factory)
    }

    /// Run `steps` steps. Returns how many ran (zero while paused).
    pub fn advance(&mut self, steps: u64) -> u64 {
        if self.paused {
            return 0;
        }
        for _ in 0..steps {
            self.run_step();
        }
        steps
    }

    /// Run a single step unless paused. Returns whether it ran.
    pub fn step(&mut self) -> bool {
        if self.paused {
            return false;
        }
        self.run_step();
        true
    }

    fn run_step(&mut self) {
        let time = self.sim_state.tick;

        // Phase 1: carts.
        for arrival in self.carts.advance() {
            self.settle_arrival(arrival, time);
        }

        // Phase 2: factories.
        let mut reports = Vec::with_capacity(self.factories.len());
        for (id, factory) in self.factories.iter_mut() {
            reports.push((id, factory.step(time, id, &mut self.carts)));
        }

        // Phase 3: events.
        for (id, report) in &reports {
            self.emit_report(*id, report, time);
        }

        // Phase 4: delivery.
        self.events.deliver();

        // Phase 5: bookkeeping.
        self.sim_state.tick += 1;
        self.last_state_hash = self.compute_state_hash();
    }

    fn settle_arrival(&mut self, arrival: Arrival, time: Ticks) {
        let Some(factory) = self.factories.get_mut(arrival.origin) else {
            if arrival.cargo > 0 {
                self.carts.restock(arrival.good, arrival.cargo);
            }
            return;
        };
        factory.release_agent(arrival.agent);
        if arrival.direction == Direction::Inbound {
            let accepted = factory.receive_delivery(arrival.good, arrival.cargo);
            if accepted < arrival.cargo {
                self.carts.restock(arrival.good, arrival.cargo - accepted);
            }
        }
        self.events.emit(Event::AgentReturned {
            factory: arrival.origin,
            agent: arrival.agent,
            tick: time,
        });
    }

    fn emit_report(&mut self, factory: FactoryId, report: &StepReport, tick: Ticks) {
        if let Some(round) = &report.dispatch {
            for outcome in [&round.inbound, &round.outbound] {
                match outcome {
                    DispatchOutcome::Skipped => {}
                    DispatchOutcome::Dispatched { agent, request } => {
                        self.events.emit(Event::AgentDispatched {
                            factory,
                            agent: *agent,
                            direction: request.direction,
                            good: request.good,
                            quantity: request.quantity,
                            tick,
                        });
                    }
                    DispatchOutcome::Failed { request, error, .. } => {
                        self.events.emit(Event::DispatchFailed {
                            factory,
                            direction: request.direction,
                            good: request.good,
                            error: error.clone(),
                            tick,
                        });
                    }
                }
            }
        }

        if let Some(cycle) = &report.cycle {
            let output = self.factories.get(factory).map(|f| f.recipe().output);
            if cycle.started {
                self.events.emit(Event::CycleStarted {
                    factory,
                    reserved: cycle.reserved,
                    tick,
                });
            }
            if let Some(good) = output {
                if cycle.produced > 0 {
                    self.events.emit(Event::GoodsProduced {
                        factory,
                        good,
                        quantity: cycle.produced,
                        tick,
                    });
                }
                if cycle.discarded > 0 {
                    self.events.emit(Event::OutputDiscarded {
                        factory,
                        good,
                        quantity: cycle.discarded,
                        tick,
                    });
                }
            }
        }

        if let Some(reason) = report.stalled() {
            self.events.emit(Event::ProductionStalled {
                factory,
                reason,
                tick,
            });
        } else if report.resumed() {
            self.events.emit(Event::ProductionResumed { factory, tick });
        }
    }

    /// FNV-1a over the tick, every factory in slot order, the carts and the
    /// warehouse.
    pub(crate) fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);

        for (_, factory) in &self.factories {
            hasher.write_u32(factory.kind().0);
            hasher.write_u32(factory.workers());
            hasher.write_u32(factory.access_roads());
            hasher.write_bool(factory.is_active());
            hasher.write_bool(factory.cycle().is_producing());
            hasher.write_fixed64(factory.cycle().progress());
            hasher.write_bool(factory.dispatcher().is_idle());
            for stock in factory.ledger().stocks() {
                hasher.write_u32(stock.good.index());
                hasher.write_u32(stock.current);
            }
        }

        for (_, cart) in self.carts.carts() {
            hasher.write_u32(cart.good.index());
            hasher.write_u32(cart.cargo);
            hasher.write_u32(cart.remaining);
        }
        for stock in self.carts.warehouse().stocks() {
            hasher.write_u32(stock.current);
        }

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::open_warehouse;
    use crate::id::GoodType;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn city(travel_time: u32) -> City {
        City::new(
            Catalog::standard(),
            LogisticsConfig::default(),
            CartPool::new(8, travel_time, open_warehouse(1000)),
        )
    }

    fn record(city: &mut City, kind: EventKind) -> Rc<RefCell<Vec<Event>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        city.on_passive(kind, Box::new(move |e| s.borrow_mut().push(e.clone())));
        seen
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut city = city(1);
        assert_eq!(
            city.add_factory_named("granary"),
            Err(CatalogError::NotFound("granary".into()))
        );
        assert_eq!(
            city.add_factory(FactoryKindId(99)),
            Err(CatalogError::UnknownId(FactoryKindId(99)))
        );
    }

    #[test]
    fn build_event_is_delivered_on_next_step() {
        let mut city = city(1);
        let built = record(&mut city, EventKind::FactoryBuilt);
        let id = city.add_factory_named("winery").unwrap();
        assert!(built.borrow().is_empty());
        city.step();
        assert_eq!(built.borrow()[0].factory(), id);
    }

    #[test]
    fn raw_producer_ships_to_warehouse() {
        let mut city = city(2);
        let id = city.add_factory_named("timber_yard").unwrap();
        let f = city.factory_mut(id).unwrap();
        f.set_workers(10);
        f.set_access_roads(1);

        // 9.6 batches a year at full staffing is roughly 1.33 progress per tick.
        city.advance(200);
        let produced = city.factory(id).unwrap().ledger().quantity(GoodType::Timber);
        let stored = city.carts().warehouse().quantity(GoodType::Timber);
        assert!(produced + stored >= 100, "{produced} + {stored}");
        assert!(city.factory(id).unwrap().output_stock().unwrap().current <= 200);
    }

    #[test]
    fn inbound_cart_feeds_workshop() {
        let mut city = city(3);
        let _ = city.carts_mut().warehouse_mut().deposit(GoodType::Grape, 500);
        let id = city.add_factory_named("winery").unwrap();
        let f = city.factory_mut(id).unwrap();
        f.set_workers(10);
        f.set_access_roads(1);
        let dispatched = record(&mut city, EventKind::AgentDispatched);
        let returned = record(&mut city, EventKind::AgentReturned);

        // Tick 1 is the first cadence tick.
        city.advance(2);
        assert_eq!(dispatched.borrow().len(), 1);
        assert!(!city.factory(id).unwrap().dispatcher().is_idle());

        city.advance(3);
        assert_eq!(returned.borrow().len(), 1);
        let f = city.factory(id).unwrap();
        assert!(f.dispatcher().is_idle());
        // 200 delivered, one batch already reserved.
        assert_eq!(f.ledger().quantity(GoodType::Grape), 100);
        assert_eq!(city.carts().warehouse().quantity(GoodType::Grape), 300);
    }

    #[test]
    fn stall_and_resume_are_reported_once() {
        let mut city = city(1);
        let id = city.add_factory_named("oil_workshop").unwrap();
        city.factory_mut(id).unwrap().set_workers(4);
        let stalled = record(&mut city, EventKind::ProductionStalled);
        let resumed = record(&mut city, EventKind::ProductionResumed);

        city.advance(5);
        assert_eq!(stalled.borrow().len(), 1);

        let _ = city
            .factory_mut(id)
            .unwrap()
            .receive_delivery(GoodType::Olive, 100);
        city.advance(5);
        assert_eq!(resumed.borrow().len(), 1);
    }

    #[test]
    fn removed_factory_cargo_returns_to_warehouse() {
        let mut city = city(5);
        let _ = city.carts_mut().warehouse_mut().deposit(GoodType::Olive, 150);
        let id = city.add_factory_named("oil_workshop").unwrap();
        let f = city.factory_mut(id).unwrap();
        f.set_workers(10);
        f.set_access_roads(1);

        city.advance(2);
        assert_eq!(city.carts().len(), 1);
        city.remove_factory(id).unwrap();
        city.advance(10);
        assert!(city.carts().is_empty());
        assert_eq!(city.carts().warehouse().quantity(GoodType::Olive), 150);
    }

    #[test]
    fn identical_cities_hash_identically() {
        let build = || {
            let mut city = city(2);
            for name in ["timber_yard", "furniture_workshop"] {
                let id = city.add_factory_named(name).unwrap();
                let f = city.factory_mut(id).unwrap();
                f.set_workers(7);
                f.set_access_roads(2);
            }
            city.advance(300);
            city
        };
        let a = build();
        let b = build();
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(a.tick(), 300);
    }

    #[test]
    fn paused_city_does_not_step() {
        let mut city = city(1);
        city.pause();
        assert!(!city.step());
        assert_eq!(city.advance(10), 0);
        assert_eq!(city.tick(), 0);
        city.resume();
        assert!(city.step());
        assert_eq!(city.tick(), 1);
    }
}
