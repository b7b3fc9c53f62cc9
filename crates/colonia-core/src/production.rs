//! The production cycle: progress accrual, gating and batch bookkeeping.
//!
//! A cycle converts one batch of input into one batch of output. Each tick
//! runs the same four steps in a fixed order, because later steps read what
//! earlier ones changed:
//!
//! 1. **Gate** -- without an operator switch, workers, and either no input
//!    requirement, some input stock or a reserved batch, nothing happens.
//! 2. **Finalize** -- a cycle at `progress >= 100` deposits its batch once
//!    the output stock has room, carrying the remainder forward.
//! 3. **Advance** -- otherwise a reserved cycle accrues work.
//! 4. **Start** -- with nothing reserved, reserve the next input batch.

use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::GoodType;
use crate::ledger::GoodsLedger;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Goods moved per cycle completion or input reservation.
pub const BATCH: u32 = 100;

/// Simulated seconds in a game year.
pub const SECONDS_PER_YEAR: u32 = 1080;

/// Simulation steps per simulated second.
pub const TICKS_PER_SECOND: f64 = 0.67;

fn batch() -> Fixed64 {
    Fixed64::from_num(BATCH)
}

/// Progress gained per tick by a fully staffed building with a rate of one
/// batch per year.
fn base_work() -> Fixed64 {
    batch() / Fixed64::from_num(SECONDS_PER_YEAR) / f64_to_fixed64(TICKS_PER_SECOND)
}

// ---------------------------------------------------------------------------
// Inputs to a cycle evaluation
// ---------------------------------------------------------------------------

/// The commodity pair a factory converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// `None` for raw-material extraction.
    pub input: Option<GoodType>,
    pub output: GoodType,
}

/// Worker assignment of the hosting building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staffing {
    pub workers: u32,
    pub max_workers: u32,
}

impl Staffing {
    /// `workers / max_workers`, zero for a building without worker slots.
    pub fn ratio(&self) -> Fixed64 {
        if self.max_workers == 0 {
            return Fixed64::ZERO;
        }
        Fixed64::from_num(self.workers.min(self.max_workers)) / Fixed64::from_num(self.max_workers)
    }
}

// ---------------------------------------------------------------------------
// Observed state
// ---------------------------------------------------------------------------

/// Where a factory sits in its production cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductionPhase {
    /// Disabled, unstaffed, or out of input with nothing reserved.
    #[default]
    Idle,
    /// Allowed to work but no batch is reserved yet.
    Eligible,
    /// A batch is reserved and progress is advancing.
    Producing,
    /// `progress >= 100`, waiting for room to deposit the output.
    OutputReady,
}

/// Why a factory is not making progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StallReason {
    Disabled,
    NoWorkers,
    MissingInput,
    OutputFull,
}

/// What one evaluation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Phase after the evaluation.
    pub phase: ProductionPhase,
    pub stall: Option<StallReason>,
    /// Input withdrawn to reserve a new cycle.
    pub reserved: u32,
    /// Whether a new cycle was started.
    pub started: bool,
    /// Whether a reserved cycle accrued work.
    pub advanced: bool,
    /// Output accepted by the ledger on completion.
    pub produced: u32,
    /// Output the ledger refused on completion.
    pub discarded: u32,
}

// ---------------------------------------------------------------------------
// ProductionCycle
// ---------------------------------------------------------------------------

/// Progress, operator switch and reservation latch of one factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionCycle {
    /// Maximum output batches per simulated year.
    rate: Fixed64,
    /// Percent of the current cycle done. May sit at or above 100 while the
    /// output waits for room.
    progress: Fixed64,
    active: bool,
    /// An input batch has been reserved for the cycle in flight.
    producing: bool,
}

impl ProductionCycle {
    pub fn new(rate: Fixed64) -> Self {
        Self {
            rate,
            progress: Fixed64::ZERO,
            active: true,
            producing: false,
        }
    }

    /// Rebuild a cycle from persisted values.
    pub fn restore(rate: Fixed64, progress: Fixed64, producing: bool, active: bool) -> Self {
        Self {
            rate,
            progress,
            active,
            producing,
        }
    }

    pub fn rate(&self) -> Fixed64 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: Fixed64) {
        self.rate = rate;
    }

    pub fn progress(&self) -> Fixed64 {
        self.progress
    }

    /// Progress as a whole percentage clamped to `0..=100`.
    pub fn progress_percent(&self) -> u32 {
        self.progress.to_num::<i64>().clamp(0, 100) as u32
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_producing(&self) -> bool {
        self.producing
    }

    /// Progress accrued per tick at the given staffing. Understaffing is
    /// penalised by the square of the worker ratio.
    pub fn work_per_tick(&self, staffing: Staffing) -> Fixed64 {
        let ratio = staffing.ratio();
        base_work() * self.rate * ratio * ratio
    }

    /// Why the gate in step 1 is closed, if it is.
    pub fn gate(&self, recipe: Recipe, staffing: Staffing, ledger: &GoodsLedger) -> Option<StallReason> {
        if !self.active {
            return Some(StallReason::Disabled);
        }
        if staffing.workers == 0 {
            return Some(StallReason::NoWorkers);
        }
        match recipe.input {
            None => None,
            Some(_) if self.producing => None,
            Some(input) if ledger.quantity(input) > 0 => None,
            Some(_) => Some(StallReason::MissingInput),
        }
    }

    pub fn may_work(&self, recipe: Recipe, staffing: Staffing, ledger: &GoodsLedger) -> bool {
        self.gate(recipe, staffing, ledger).is_none()
    }

    /// Phase as seen from outside, without advancing anything.
    pub fn phase(&self, recipe: Recipe, staffing: Staffing, ledger: &GoodsLedger) -> ProductionPhase {
        if !self.may_work(recipe, staffing, ledger) {
            ProductionPhase::Idle
        } else {
            self.working_phase()
        }
    }

    fn working_phase(&self) -> ProductionPhase {
        if self.progress >= batch() {
            ProductionPhase::OutputReady
        } else if self.producing {
            ProductionPhase::Producing
        } else {
            ProductionPhase::Eligible
        }
    }

    /// Run one tick of the cycle against the factory's ledger.
    pub fn evaluate(
        &mut self,
        recipe: Recipe,
        staffing: Staffing,
        ledger: &mut GoodsLedger,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        if let Some(reason) = self.gate(recipe, staffing, ledger) {
            report.phase = ProductionPhase::Idle;
            report.stall = Some(reason);
            return report;
        }

        if self.progress >= batch() {
            if !self.finalize(recipe, ledger, &mut report) {
                report.stall = Some(StallReason::OutputFull);
            }
        } else if self.producing {
            self.progress += self.work_per_tick(staffing);
            report.advanced = true;
        }

        if !self.producing {
            self.try_start(recipe, ledger, &mut report);
        }

        report.phase = self.working_phase();
        report
    }

    /// OutputReady -> Eligible. Returns false while the output stock is full.
    fn finalize(&mut self, recipe: Recipe, ledger: &mut GoodsLedger, report: &mut CycleReport) -> bool {
        if !ledger.has_room(recipe.output) {
            return false;
        }
        let accepted = ledger.deposit(recipe.output, BATCH);
        report.produced = accepted;
        report.discarded = BATCH - accepted;
        self.progress -= batch();
        self.producing = false;
        true
    }

    /// Eligible -> Producing, reserving one input batch if the recipe needs one.
    fn try_start(&mut self, recipe: Recipe, ledger: &mut GoodsLedger, report: &mut CycleReport) {
        let Some(input) = recipe.input else {
            self.producing = true;
            report.started = true;
            return;
        };

        if ledger.quantity(input) < BATCH {
            report.stall.get_or_insert(StallReason::MissingInput);
            return;
        }
        // A full output stock throttles new cycles even with input on hand.
        if ledger.quantity(recipe.output) >= BATCH {
            report.stall.get_or_insert(StallReason::OutputFull);
            return;
        }

        report.reserved = ledger.withdraw(input, BATCH);
        self.producing = true;
        report.started = true;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
