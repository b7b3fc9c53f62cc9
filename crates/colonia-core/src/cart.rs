//! Cart pool: the built-in [`TransportService`].
//!
//! Carts shuttle goods between factories and a single city warehouse. A cart
//! is loaded when it is dispatched, travels for `travel_time` steps and is
//! unloaded by [`CartPool::advance`]. Warehouse room is held for every cart
//! on the road, so an arriving load always fits.

use crate::id::{AgentId, FactoryId, GoodType};
use crate::ledger::GoodsLedger;
use crate::logistics::{DispatchError, Direction, TransportRequest, TransportService};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// A cart on the road.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub origin: FactoryId,
    pub direction: Direction,
    pub good: GoodType,
    /// Goods actually on board.
    pub cargo: u32,
    /// Steps until arrival.
    pub remaining: u32,
}

/// A cart that finished its trip during [`CartPool::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    pub agent: AgentId,
    pub origin: FactoryId,
    pub direction: Direction,
    pub good: GoodType,
    /// For inbound carts, goods waiting to be handed to the origin factory.
    /// Zero for outbound carts, whose load is already in the warehouse.
    pub cargo: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartPool {
    carts: SlotMap<AgentId, Cart>,
    /// Most carts on the road at once.
    limit: usize,
    travel_time: u32,
    warehouse: GoodsLedger,
}

impl CartPool {
    pub fn new(limit: usize, travel_time: u32, warehouse: GoodsLedger) -> Self {
        Self {
            carts: SlotMap::with_key(),
            limit,
            travel_time,
            warehouse,
        }
    }

    pub fn warehouse(&self) -> &GoodsLedger {
        &self.warehouse
    }

    pub fn warehouse_mut(&mut self) -> &mut GoodsLedger {
        &mut self.warehouse
    }

    pub fn cart(&self, agent: AgentId) -> Option<&Cart> {
        self.carts.get(agent)
    }

    pub fn carts(&self) -> impl Iterator<Item = (AgentId, &Cart)> {
        self.carts.iter()
    }

    pub fn len(&self) -> usize {
        self.carts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn travel_time(&self) -> u32 {
        self.travel_time
    }

    /// Warehouse room not already promised to carts on the road.
    fn uncommitted_room(&self, good: GoodType) -> u32 {
        let Some(stock) = self.warehouse.stock(good) else {
            return 0;
        };
        let (same, all) = self.carts.values().fold((0u32, 0u32), |(same, all), cart| {
            let same = if cart.good == good {
                same.saturating_add(cart.cargo)
            } else {
                same
            };
            (same, all.saturating_add(cart.cargo))
        });
        let total_free = self
            .warehouse
            .max_total()
            .saturating_sub(self.warehouse.total());
        stock
            .free()
            .saturating_sub(same)
            .min(total_free.saturating_sub(all))
    }

    /// Move every cart one step. Carts that arrive are removed, in slot
    /// order, and outbound loads are unloaded into the warehouse.
    pub fn advance(&mut self) -> Vec<Arrival> {
        let mut arrived = Vec::new();
        for (agent, cart) in self.carts.iter_mut() {
            cart.remaining = cart.remaining.saturating_sub(1);
            if cart.remaining == 0 {
                arrived.push(agent);
            }
        }

        let mut arrivals = Vec::with_capacity(arrived.len());
        for agent in arrived {
            let Some(cart) = self.carts.remove(agent) else {
                continue;
            };
            let cargo = match cart.direction {
                Direction::Outbound => {
                    let stored = self.warehouse.deposit(cart.good, cart.cargo);
                    debug_assert_eq!(stored, cart.cargo, "warehouse room was held for this load");
                    0
                }
                Direction::Inbound => cart.cargo,
            };
            log::debug!("cart {agent:?} arrived for factory {:?}", cart.origin);
            arrivals.push(Arrival {
                agent,
                origin: cart.origin,
                direction: cart.direction,
                good: cart.good,
                cargo,
            });
        }
        arrivals
    }

    /// Put back inbound cargo the factory could not take. Returns what the
    /// warehouse accepted.
    pub fn restock(&mut self, good: GoodType, quantity: u32) -> u32 {
        let accepted = self.warehouse.deposit(good, quantity);
        if accepted < quantity {
            log::warn!("warehouse dropped {} returned {good}", quantity - accepted);
        }
        accepted
    }
}

/// A warehouse holding up to `per_good` of every commodity.
pub fn open_warehouse(per_good: u32) -> GoodsLedger {
    let mut ledger = GoodsLedger::new(u32::MAX);
    for good in GoodType::ALL {
        ledger.add_stock(good, per_good);
    }
    ledger
}

impl Default for CartPool {
    fn default() -> Self {
        Self::new(64, 8, open_warehouse(10_000))
    }
}

impl TransportService for CartPool {
    fn dispatch(
        &mut self,
        origin: FactoryId,
        request: &TransportRequest,
    ) -> Result<AgentId, DispatchError> {
        if self.carts.len() >= self.limit {
            return Err(DispatchError::NoAgentAvailable);
        }
        let no_destination = DispatchError::NoDestination {
            good: request.good,
            quantity: request.quantity,
        };

        let cargo = match request.direction {
            Direction::Inbound => {
                let loaded = self.warehouse.withdraw(request.good, request.quantity);
                if loaded == 0 {
                    return Err(no_destination);
                }
                loaded
            }
            Direction::Outbound => {
                if self.uncommitted_room(request.good) < request.quantity {
                    return Err(no_destination);
                }
                request.quantity
            }
        };

        Ok(self.carts.insert(Cart {
            origin,
            direction: request.direction,
            good: request.good,
            cargo,
            remaining: self.travel_time.max(1),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn origin() -> FactoryId {
        FactoryId::from(KeyData::from_ffi(1))
    }

    fn warehouse(grapes: u32) -> GoodsLedger {
        let mut ledger = GoodsLedger::new(10_000);
        ledger.set_capacity(GoodType::Wine, 500).unwrap();
        ledger.set_capacity(GoodType::Grape, 500).unwrap();
        let _ = ledger.deposit(GoodType::Grape, grapes);
        ledger
    }

    fn request(good: GoodType, quantity: u32, direction: Direction) -> TransportRequest {
        TransportRequest {
            good,
            quantity,
            direction,
        }
    }

    #[test]
    fn outbound_lands_in_warehouse_after_travel() {
        let mut pool = CartPool::new(4, 3, warehouse(0));
        let agent = pool
            .dispatch(origin(), &request(GoodType::Wine, 200, Direction::Outbound))
            .unwrap();

        assert!(pool.advance().is_empty());
        assert!(pool.advance().is_empty());
        let arrivals = pool.advance();
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].agent, agent);
        assert_eq!(arrivals[0].cargo, 0);
        assert_eq!(pool.warehouse().quantity(GoodType::Wine), 200);
        assert!(pool.is_empty());
    }

    #[test]
    fn inbound_loads_at_dispatch() {
        let mut pool = CartPool::new(4, 1, warehouse(120));
        pool.dispatch(origin(), &request(GoodType::Grape, 200, Direction::Inbound))
            .unwrap();
        assert_eq!(pool.warehouse().quantity(GoodType::Grape), 0);

        let arrivals = pool.advance();
        assert_eq!(arrivals[0].cargo, 120);
        assert_eq!(arrivals[0].direction, Direction::Inbound);
    }

    #[test]
    fn inbound_without_stock_has_no_destination() {
        let mut pool = CartPool::new(4, 1, warehouse(0));
        let err = pool
            .dispatch(origin(), &request(GoodType::Grape, 100, Direction::Inbound))
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoDestination { .. }));
        assert!(pool.is_empty());
    }

    #[test]
    fn outbound_respects_room_held_by_other_carts() {
        let mut pool = CartPool::new(4, 5, warehouse(0));
        pool.dispatch(origin(), &request(GoodType::Wine, 400, Direction::Outbound))
            .unwrap();
        let err = pool
            .dispatch(origin(), &request(GoodType::Wine, 200, Direction::Outbound))
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::NoDestination {
                good: GoodType::Wine,
                quantity: 200
            }
        );
    }

    #[test]
    fn limit_caps_carts_on_the_road() {
        let mut pool = CartPool::new(1, 5, warehouse(0));
        pool.dispatch(origin(), &request(GoodType::Wine, 100, Direction::Outbound))
            .unwrap();
        assert_eq!(
            pool.dispatch(origin(), &request(GoodType::Wine, 100, Direction::Outbound)),
            Err(DispatchError::NoAgentAvailable)
        );
    }

    #[test]
    fn restock_returns_unwanted_cargo() {
        let mut pool = CartPool::new(4, 1, warehouse(100));
        pool.dispatch(origin(), &request(GoodType::Grape, 100, Direction::Inbound))
            .unwrap();
        let arrival = pool.advance()[0];
        assert_eq!(pool.restock(arrival.good, 30), 30);
        assert_eq!(pool.warehouse().quantity(GoodType::Grape), 30);
    }
}
