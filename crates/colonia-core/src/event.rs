//! Typed city events with pre-allocated ring buffers.
//!
//! Factories do not emit events themselves. [`City::step`](crate::city::City::step)
//! turns each factory's step report into events and delivers the whole batch
//! once every factory has run. Each event kind has its own [`EventBuffer`].
//!
//! Kinds can be suppressed with [`EventBus::suppress`]; a suppressed kind is
//! never buffered.

use crate::fixed::Ticks;
use crate::id::{AgentId, FactoryId, FactoryKindId, GoodType};
use crate::logistics::{DispatchError, Direction};
use crate::production::StallReason;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A city event. Every event carries the tick it happened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Production --
    CycleStarted {
        factory: FactoryId,
        /// Input withdrawn for the cycle; zero for raw materials.
        reserved: u32,
        tick: Ticks,
    },
    GoodsProduced {
        factory: FactoryId,
        good: GoodType,
        quantity: u32,
        tick: Ticks,
    },
    OutputDiscarded {
        factory: FactoryId,
        good: GoodType,
        quantity: u32,
        tick: Ticks,
    },
    ProductionStalled {
        factory: FactoryId,
        reason: StallReason,
        tick: Ticks,
    },
    ProductionResumed {
        factory: FactoryId,
        tick: Ticks,
    },

    // -- Logistics --
    AgentDispatched {
        factory: FactoryId,
        agent: AgentId,
        direction: Direction,
        good: GoodType,
        quantity: u32,
        tick: Ticks,
    },
    DispatchFailed {
        factory: FactoryId,
        direction: Direction,
        good: GoodType,
        error: DispatchError,
        tick: Ticks,
    },
    AgentReturned {
        factory: FactoryId,
        agent: AgentId,
        tick: Ticks,
    },

    // -- City --
    FactoryBuilt {
        factory: FactoryId,
        kind: FactoryKindId,
        tick: Ticks,
    },
    FactoryRemoved {
        factory: FactoryId,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CycleStarted,
    GoodsProduced,
    OutputDiscarded,
    ProductionStalled,
    ProductionResumed,
    AgentDispatched,
    DispatchFailed,
    AgentReturned,
    FactoryBuilt,
    FactoryRemoved,
}

const EVENT_KIND_COUNT: usize = 10;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::CycleStarted { .. } => EventKind::CycleStarted,
            Event::GoodsProduced { .. } => EventKind::GoodsProduced,
            Event::OutputDiscarded { .. } => EventKind::OutputDiscarded,
            Event::ProductionStalled { .. } => EventKind::ProductionStalled,
            Event::ProductionResumed { .. } => EventKind::ProductionResumed,
            Event::AgentDispatched { .. } => EventKind::AgentDispatched,
            Event::DispatchFailed { .. } => EventKind::DispatchFailed,
            Event::AgentReturned { .. } => EventKind::AgentReturned,
            Event::FactoryBuilt { .. } => EventKind::FactoryBuilt,
            Event::FactoryRemoved { .. } => EventKind::FactoryRemoved,
        }
    }

    /// The factory the event concerns.
    pub fn factory(&self) -> FactoryId {
        match *self {
            Event::CycleStarted { factory, .. }
            | Event::GoodsProduced { factory, .. }
            | Event::OutputDiscarded { factory, .. }
            | Event::ProductionStalled { factory, .. }
            | Event::ProductionResumed { factory, .. }
            | Event::AgentDispatched { factory, .. }
            | Event::DispatchFailed { factory, .. }
            | Event::AgentReturned { factory, .. }
            | Event::FactoryBuilt { factory, .. }
            | Event::FactoryRemoved { factory, .. } => factory,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity ring buffer. When full, the oldest event is overwritten.
#[derive(Debug)]
pub struct EventBuffer {
    slots: Vec<Option<Event>>,
    /// Next write position.
    head: usize,
    len: usize,
    /// Events ever pushed, dropped ones included.
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        let capacity = self.capacity();
        self.slots[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Events lost to overwriting since the last clear.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let capacity = self.capacity();
        // Once wrapped, `head` is the oldest entry.
        let start = if self.len < capacity { 0 } else { self.head };
        (0..self.len).filter_map(move |i| self.slots[(start + i) % capacity].as_ref())
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
        self.total_written = 0;
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Read-only subscriber, called once per delivered event.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Optional predicate deciding which events a listener sees.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

struct Listener {
    callback: PassiveListener,
    filter: Option<EventFilter>,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// One ring buffer and one listener list per event kind.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<Listener>; EVENT_KIND_COUNT],
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: std::array::from_fn(|_| Vec::new()),
            default_capacity,
        }
    }

    /// Stop buffering a kind and drop whatever it had buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        let idx = kind as usize;
        self.suppressed[idx] = true;
        self.buffers[idx] = None;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind as usize] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind as usize]
    }

    /// Buffer an event. Buffers are allocated on first use.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind() as usize;
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Listen to every event of `kind`, in registration order.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind as usize].push(Listener {
            callback: listener,
            filter: None,
        });
    }

    /// Listen to the events of `kind` that pass `filter`.
    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        filter: EventFilter,
        listener: PassiveListener,
    ) {
        self.listeners[kind as usize].push(Listener {
            callback: listener,
            filter: Some(filter),
        });
    }

    /// Hand every buffered event to its listeners, oldest first, then clear
    /// the buffers. Kinds are delivered in declaration order.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            for listener in &mut self.listeners[idx] {
                for event in buffer.iter() {
                    if listener.filter.as_ref().is_some_and(|f| !f(event)) {
                        continue;
                    }
                    (listener.callback)(event);
                }
            }
            buffer.clear();
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind as usize].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map_or(0, EventBuffer::len)
    }

    /// Every buffered event, grouped by kind.
    pub fn buffered(&self) -> impl Iterator<Item = &Event> {
        self.buffers.iter().flatten().flat_map(EventBuffer::iter)
    }

    pub fn clear_all(&mut self) {
        self.buffers.iter_mut().flatten().for_each(EventBuffer::clear);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn factory() -> FactoryId {
        let mut sm = SlotMap::<FactoryId, ()>::with_key();
        sm.insert(())
    }

    fn produced(factory: FactoryId, quantity: u32, tick: Ticks) -> Event {
        Event::GoodsProduced {
            factory,
            good: GoodType::Wine,
            quantity,
            tick,
        }
    }

    #[test]
    fn buffer_iterates_oldest_first() {
        let mut buf = EventBuffer::new(8);
        let f = factory();
        buf.push(produced(f, 100, 1));
        buf.push(produced(f, 50, 2));

        let events: Vec<&Event> = buf.iter().collect();
        assert_eq!(events, vec![&produced(f, 100, 1), &produced(f, 50, 2)]);
        assert_eq!(buf.dropped_count(), 0);
    }

    #[test]
    fn buffer_wraps_and_drops_oldest() {
        let mut buf = EventBuffer::new(3);
        let f = factory();
        for tick in 0..5 {
            buf.push(produced(f, 100, tick));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.dropped_count(), 2);
        let ticks: Vec<Ticks> = buf
            .iter()
            .map(|e| match e {
                Event::GoodsProduced { tick, .. } => *tick,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ticks, vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buf = EventBuffer::new(0);
        buf.push(produced(factory(), 1, 0));
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn suppressed_kind_is_not_buffered() {
        let mut bus = EventBus::default();
        let f = factory();
        bus.emit(produced(f, 100, 0));
        bus.suppress(EventKind::GoodsProduced);
        assert!(bus.buffer(EventKind::GoodsProduced).is_none());

        bus.emit(produced(f, 100, 1));
        assert_eq!(bus.buffered_count(EventKind::GoodsProduced), 0);

        bus.unsuppress(EventKind::GoodsProduced);
        bus.emit(produced(f, 100, 2));
        assert_eq!(bus.buffered_count(EventKind::GoodsProduced), 1);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let mut bus = EventBus::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["first", "second"] {
            let log = Rc::clone(&log);
            bus.on_passive(
                EventKind::ProductionResumed,
                Box::new(move |_| log.borrow_mut().push(name)),
            );
        }
        bus.emit(Event::ProductionResumed {
            factory: factory(),
            tick: 4,
        });
        bus.deliver();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn delivery_clears_buffers() {
        let mut bus = EventBus::default();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        bus.on_passive(EventKind::GoodsProduced, Box::new(move |_| *c.borrow_mut() += 1));

        let f = factory();
        bus.emit(produced(f, 100, 0));
        bus.emit(produced(f, 100, 1));
        bus.deliver();
        assert_eq!(*count.borrow(), 2);
        assert_eq!(bus.buffered_count(EventKind::GoodsProduced), 0);

        bus.deliver();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn filter_limits_what_a_listener_sees() {
        let mut bus = EventBus::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        bus.on_passive_filtered(
            EventKind::ProductionStalled,
            Box::new(|e| {
                matches!(
                    e,
                    Event::ProductionStalled {
                        reason: StallReason::OutputFull,
                        ..
                    }
                )
            }),
            Box::new(move |e| s.borrow_mut().push(e.clone())),
        );

        let f = factory();
        for reason in [StallReason::MissingInput, StallReason::OutputFull] {
            bus.emit(Event::ProductionStalled {
                factory: f,
                reason,
                tick: 0,
            });
        }
        bus.deliver();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn kinds_are_buffered_independently() {
        let mut bus = EventBus::default();
        let f = factory();
        bus.emit(produced(f, 100, 0));
        bus.emit(Event::FactoryRemoved { factory: f, tick: 0 });
        assert_eq!(bus.buffered_count(EventKind::GoodsProduced), 1);
        assert_eq!(bus.buffered_count(EventKind::FactoryRemoved), 1);
        assert_eq!(bus.buffered().count(), 2);
        assert!(bus.buffered().all(|e| e.factory() == f));

        bus.clear_all();
        assert_eq!(bus.buffered().count(), 0);
    }
}
