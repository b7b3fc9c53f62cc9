//! Logistics dispatch: when a factory asks for input and ships its output.
//!
//! A factory has at most one transport agent out at a time, in either
//! direction. The dispatcher only runs on its cadence tick, and only while
//! the building is staffed and that slot is free. The agent itself lives in
//! an external [`TransportService`]; the dispatcher keeps only its id until
//! the service reports the agent finished.

use crate::fixed::Ticks;
use crate::id::{AgentId, FactoryId, GoodType};
use crate::ledger::GoodsLedger;
use crate::production::{BATCH, Recipe};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Requests and the transport seam
// ---------------------------------------------------------------------------

/// Which way goods move relative to the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Storage to factory.
    Inbound,
    /// Factory to storage.
    Outbound,
}

/// Cargo manifest handed to a transport agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRequest {
    pub good: GoodType,
    pub quantity: u32,
    pub direction: Direction,
}

/// Why a transport agent could not be put into the world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no transport agent available")]
    NoAgentAvailable,
    #[error("no destination accepts {quantity} {good}")]
    NoDestination { good: GoodType, quantity: u32 },
}

/// Creates transport agents on behalf of factories.
///
/// `Ok` means the agent exists and carries the request; `Err` means nothing
/// was created and nothing left the factory.
pub trait TransportService {
    fn dispatch(
        &mut self,
        origin: FactoryId,
        request: &TransportRequest,
    ) -> Result<AgentId, DispatchError>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Dispatch timing and shipment size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsConfig {
    /// The dispatcher runs when `time % cadence == cadence_offset`.
    pub cadence: Ticks,
    pub cadence_offset: Ticks,
    /// Most goods one outbound agent carries.
    pub shipment_limit: u32,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            cadence: 22,
            cadence_offset: 1,
            shipment_limit: 400,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// The factory's single transport slot while it is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outstanding {
    pub agent: AgentId,
    pub direction: Direction,
}

/// Result of one inbound or outbound attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Preconditions did not hold; nothing was attempted.
    Skipped,
    Dispatched {
        agent: AgentId,
        request: TransportRequest,
    },
    /// Creation failed. `refunded` goods went back into the ledger.
    Failed {
        request: TransportRequest,
        error: DispatchError,
        refunded: u32,
    },
}

/// The hosting building as the dispatcher sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub origin: FactoryId,
    pub workers: u32,
    pub access_roads: u32,
    pub recipe: Recipe,
}

/// Both attempts of a cadence tick, inbound first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRound {
    pub inbound: DispatchOutcome,
    pub outbound: DispatchOutcome,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Per-factory dispatch state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatcher {
    config: LogisticsConfig,
    outstanding: Option<Outstanding>,
}

impl Dispatcher {
    pub fn new(config: LogisticsConfig) -> Self {
        Self {
            config,
            outstanding: None,
        }
    }

    pub fn config(&self) -> &LogisticsConfig {
        &self.config
    }

    pub fn outstanding(&self) -> Option<Outstanding> {
        self.outstanding
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding.is_none()
    }

    pub fn is_due(&self, time: Ticks) -> bool {
        time % self.config.cadence.max(1) == self.config.cadence_offset
    }

    /// Free the slot if `agent` is the one holding it.
    pub fn release(&mut self, agent: AgentId) -> bool {
        match self.outstanding {
            Some(o) if o.agent == agent => {
                self.outstanding = None;
                true
            }
            _ => false,
        }
    }

    /// Run the cadence tick: inbound first, then outbound. Returns `None`
    /// when it is not the cadence tick, the building is unstaffed, or an
    /// agent is already out.
    pub fn run(
        &mut self,
        time: Ticks,
        site: Site,
        ledger: &mut GoodsLedger,
        transport: &mut dyn TransportService,
    ) -> Option<DispatchRound> {
        if !self.is_due(time) || site.workers == 0 || !self.is_idle() {
            return None;
        }
        let Site {
            origin,
            access_roads,
            recipe,
            ..
        } = site;
        let inbound = self.request_input(origin, access_roads, recipe.input, ledger, transport);
        let outbound = self.ship_output(origin, access_roads, recipe.output, ledger, transport);
        Some(DispatchRound { inbound, outbound })
    }

    fn may_dispatch(&self, access_roads: u32) -> bool {
        access_roads > 0 && self.is_idle()
    }

    /// Ask for enough input to fill the input stock.
    pub fn request_input(
        &mut self,
        origin: FactoryId,
        access_roads: u32,
        input: Option<GoodType>,
        ledger: &GoodsLedger,
        transport: &mut dyn TransportService,
    ) -> DispatchOutcome {
        let Some(good) = input else {
            return DispatchOutcome::Skipped;
        };
        let Some(stock) = ledger.stock(good) else {
            return DispatchOutcome::Skipped;
        };
        if !self.may_dispatch(access_roads) || stock.is_full() {
            return DispatchOutcome::Skipped;
        }

        let request = TransportRequest {
            good,
            quantity: stock.free(),
            direction: Direction::Inbound,
        };
        match transport.dispatch(origin, &request) {
            Ok(agent) => {
                log::debug!("factory {origin:?} requested {} {good}", request.quantity);
                self.outstanding = Some(Outstanding {
                    agent,
                    direction: Direction::Inbound,
                });
                DispatchOutcome::Dispatched { agent, request }
            }
            Err(error) => {
                log::warn!("factory {origin:?} could not request {good}: {error}");
                DispatchOutcome::Failed {
                    request,
                    error,
                    refunded: 0,
                }
            }
        }
    }

    /// Ship up to `shipment_limit` finished goods once a batch is on hand.
    /// On failure every withdrawn unit goes back into the ledger.
    pub fn ship_output(
        &mut self,
        origin: FactoryId,
        access_roads: u32,
        output: GoodType,
        ledger: &mut GoodsLedger,
        transport: &mut dyn TransportService,
    ) -> DispatchOutcome {
        if !self.may_dispatch(access_roads) || ledger.quantity(output) < BATCH {
            return DispatchOutcome::Skipped;
        }

        let quantity = ledger.withdraw(output, self.config.shipment_limit);
        let request = TransportRequest {
            good: output,
            quantity,
            direction: Direction::Outbound,
        };
        match transport.dispatch(origin, &request) {
            Ok(agent) => {
                log::debug!("factory {origin:?} shipped {quantity} {output}");
                self.outstanding = Some(Outstanding {
                    agent,
                    direction: Direction::Outbound,
                });
                DispatchOutcome::Dispatched { agent, request }
            }
            Err(error) => {
                let refunded = ledger.restore(output, quantity);
                debug_assert_eq!(refunded, quantity, "refund must restore the withdrawal");
                log::warn!("factory {origin:?} could not ship {output}: {error}");
                DispatchOutcome::Failed {
                    request,
                    error,
                    refunded,
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(LogisticsConfig::default())
    }
}
