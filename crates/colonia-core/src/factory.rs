//! A factory building: staffing, goods store, production cycle, dispatcher
//! and work animation, stepped together once per tick.

use crate::animation::{self, Animation, AnimationSignal, FrameId, FrameLoop};
use crate::catalog::FactoryKindDef;
use crate::fixed::Ticks;
use crate::id::{AgentId, FactoryId, FactoryKindId, GoodType};
use crate::ledger::{GoodStock, GoodsLedger};
use crate::logistics::{DispatchRound, Dispatcher, LogisticsConfig, Site, TransportService};
use crate::production::{CycleReport, ProductionCycle, ProductionPhase, Recipe, StallReason, Staffing};
use serde::{Deserialize, Serialize};

/// Everything one [`Factory::step`] did, in pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Present only on cadence ticks where the dispatcher ran.
    pub dispatch: Option<DispatchRound>,
    pub animation: Option<AnimationSignal>,
    /// `None` when the gate was closed and production was skipped.
    pub cycle: Option<CycleReport>,
    /// Stall reason after this step.
    pub stall: Option<StallReason>,
    /// Stall reason after the previous step.
    pub previous_stall: Option<StallReason>,
}

impl StepReport {
    /// The stall reason changed to a new, non-empty value.
    pub fn stalled(&self) -> Option<StallReason> {
        self.stall.filter(|_| self.stall != self.previous_stall)
    }

    /// A stall cleared during this step.
    pub fn resumed(&self) -> bool {
        self.previous_stall.is_some() && self.stall.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factory {
    kind: FactoryKindId,
    recipe: Recipe,
    size: u32,
    workers: u32,
    max_workers: u32,
    access_roads: u32,
    ledger: GoodsLedger,
    cycle: ProductionCycle,
    dispatcher: Dispatcher,
    animation: FrameLoop,
    last_stall: Option<StallReason>,
}

impl Factory {
    /// A fresh, unstaffed factory of the given kind.
    pub fn new(kind: FactoryKindId, def: &FactoryKindDef, logistics: LogisticsConfig) -> Self {
        let mut ledger = GoodsLedger::new(def.store_capacity);
        if let Some(input) = def.recipe.input {
            ledger.add_stock(input, def.input_capacity);
        }
        ledger.add_stock(def.recipe.output, def.output_capacity);

        Self {
            kind,
            recipe: def.recipe,
            size: def.size,
            workers: 0,
            max_workers: def.max_workers,
            access_roads: 0,
            ledger,
            cycle: ProductionCycle::new(def.production_rate),
            dispatcher: Dispatcher::new(logistics),
            animation: FrameLoop::new(def.animation),
            last_stall: None,
        }
    }

    pub fn kind(&self) -> FactoryKindId {
        self.kind
    }

    pub fn recipe(&self) -> Recipe {
        self.recipe
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }

    pub fn max_workers(&self) -> u32 {
        self.max_workers
    }

    /// Assign workers, clamped to the available slots. Returns the number
    /// actually assigned.
    pub fn set_workers(&mut self, workers: u32) -> u32 {
        self.workers = workers.min(self.max_workers);
        self.workers
    }

    pub fn staffing(&self) -> Staffing {
        Staffing {
            workers: self.workers,
            max_workers: self.max_workers,
        }
    }

    pub fn access_roads(&self) -> u32 {
        self.access_roads
    }

    pub fn set_access_roads(&mut self, roads: u32) {
        self.access_roads = roads;
    }

    pub fn ledger(&self) -> &GoodsLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut GoodsLedger {
        &mut self.ledger
    }

    pub fn cycle(&self) -> &ProductionCycle {
        &self.cycle
    }

    pub fn cycle_mut(&mut self) -> &mut ProductionCycle {
        &mut self.cycle
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn animation(&self) -> &FrameLoop {
        &self.animation
    }

    /// Frame to draw for the work animation, if it is running.
    pub fn animation_frame(&self) -> Option<FrameId> {
        self.animation
            .is_running()
            .then(|| self.animation.current_frame())
            .flatten()
    }

    pub fn input_stock(&self) -> Option<&GoodStock> {
        self.recipe.input.and_then(|good| self.ledger.stock(good))
    }

    pub fn output_stock(&self) -> Option<&GoodStock> {
        self.ledger.stock(self.recipe.output)
    }

    pub fn may_work(&self) -> bool {
        self.cycle.may_work(self.recipe, self.staffing(), &self.ledger)
    }

    pub fn stand_idle(&self) -> bool {
        !self.may_work()
    }

    pub fn phase(&self) -> ProductionPhase {
        self.cycle.phase(self.recipe, self.staffing(), &self.ledger)
    }

    pub fn progress_percent(&self) -> u32 {
        self.cycle.progress_percent()
    }

    pub fn is_active(&self) -> bool {
        self.cycle.is_active()
    }

    pub fn set_active(&mut self, active: bool) {
        self.cycle.set_active(active);
    }

    pub fn last_stall(&self) -> Option<StallReason> {
        self.last_stall
    }

    /// Free the transport slot held by `agent`.
    pub fn release_agent(&mut self, agent: AgentId) -> bool {
        self.dispatcher.release(agent)
    }

    /// Accept goods brought by a transport agent. Returns the amount taken.
    pub fn receive_delivery(&mut self, good: GoodType, quantity: u32) -> u32 {
        self.ledger.deposit(good, quantity)
    }

    pub(crate) fn replace_state(&mut self, ledger: GoodsLedger, cycle: ProductionCycle) {
        self.ledger = ledger;
        self.cycle = cycle;
    }

    /// Run one simulation step: dispatch, animation sync, then production.
    pub fn step(
        &mut self,
        time: Ticks,
        id: FactoryId,
        transport: &mut dyn TransportService,
    ) -> StepReport {
        let mut report = StepReport {
            previous_stall: self.last_stall,
            ..StepReport::default()
        };

        let site = Site {
            origin: id,
            workers: self.workers,
            access_roads: self.access_roads,
            recipe: self.recipe,
        };
        report.dispatch = self.dispatcher.run(time, site, &mut self.ledger, transport);

        let staffing = self.staffing();
        match self.cycle.gate(self.recipe, staffing, &self.ledger) {
            Some(reason) => {
                report.animation = animation::sync(false, &mut self.animation);
                report.stall = Some(reason);
            }
            None => {
                report.animation = animation::sync(true, &mut self.animation);
                let cycle = self.cycle.evaluate(self.recipe, staffing, &mut self.ledger);
                if cycle.started {
                    log::debug!("factory {id:?} started a cycle at tick {time}");
                }
                if cycle.produced > 0 {
                    log::debug!("factory {id:?} produced {} {}", cycle.produced, self.recipe.output);
                }
                if cycle.discarded > 0 {
                    log::warn!(
                        "factory {id:?} discarded {} {}: output store full",
                        cycle.discarded,
                        self.recipe.output
                    );
                }
                if cycle.advanced {
                    self.animation.advance(time);
                }
                report.stall = cycle.stall;
                report.cycle = Some(cycle);
            }
        }

        self.last_stall = report.stall;
        report
    }
}
