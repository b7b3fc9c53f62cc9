//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::catalog::Catalog;
use crate::factory::Factory;
use crate::fixed::Fixed64;
use crate::id::{AgentId, FactoryId, GoodType};
use crate::logistics::{DispatchError, LogisticsConfig, TransportRequest, TransportService};
use slotmap::{KeyData, SlotMap};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// A stable factory id for tests that drive a [`Factory`] directly.
pub fn factory_id(n: u64) -> FactoryId {
    FactoryId::from(KeyData::from_ffi(n))
}

// ===========================================================================
// Factory builders
// ===========================================================================

/// A factory of a stock kind with the given workers and one access road.
pub fn staffed_factory(kind: &str, workers: u32) -> Factory {
    let catalog = Catalog::standard();
    let id = catalog
        .kind_id(kind)
        .unwrap_or_else(|| panic!("no stock factory kind named {kind}"));
    let def = catalog
        .get(id)
        .unwrap_or_else(|| panic!("catalog lost kind {kind}"));
    let mut factory = Factory::new(id, def, LogisticsConfig::default());
    factory.set_workers(workers);
    factory.set_access_roads(1);
    factory
}

/// Fill one stock of `factory`, bypassing its aggregate cap.
pub fn with_stock(mut factory: Factory, good: GoodType, quantity: u32) -> Factory {
    factory.ledger_mut().set_quantity(good, quantity);
    factory
}

// ===========================================================================
// Scripted transport
// ===========================================================================

/// A [`TransportService`] that either creates every agent it is asked for or
/// refuses all of them, and records each request.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    agents: SlotMap<AgentId, (FactoryId, TransportRequest)>,
    pub refuse: bool,
    pub requests: Vec<TransportRequest>,
}

impl ScriptedTransport {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Agents created and not yet finished.
    pub fn live(&self) -> usize {
        self.agents.len()
    }

    /// Finish an agent; returns what it was carrying.
    pub fn finish(&mut self, agent: AgentId) -> Option<(FactoryId, TransportRequest)> {
        self.agents.remove(agent)
    }

    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys()
    }
}

impl TransportService for ScriptedTransport {
    fn dispatch(
        &mut self,
        origin: FactoryId,
        request: &TransportRequest,
    ) -> Result<AgentId, DispatchError> {
        self.requests.push(*request);
        if self.refuse {
            return Err(DispatchError::NoAgentAvailable);
        }
        Ok(self.agents.insert((origin, *request)))
    }
}
