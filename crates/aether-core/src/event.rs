//! Typed events with per-kind ring buffers.
//!
//! Events are emitted while a tick runs (and by direct mutations between
//! ticks) and delivered in batch at the end of the tick. Each event kind has
//! its own [`EventBuffer`] with a fixed capacity; when it fills, the oldest
//! events are dropped.
//!
//! # Subscriber Types
//!
//! - **Passive listeners**: read-only, for UI updates, audio cues, analytics.
//! - **Reactive handlers**: return [`Command`]s that the simulation queues
//!   for the next tick.
//!
//! # Suppression
//!
//! [`EventBus::suppress`] stops an event kind from being buffered at all.
//!
//! Subscribers must be `Send` so the owning simulation can move between
//! threads.

use crate::command_queue::Command;
use crate::fixed::{Fixed64, Ticks};
use crate::graph::{GraphError, NodeKind};
use crate::id::{EdgeId, NodeId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. Every event carries the tick it was emitted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Topology --
    NodeAdded {
        node: NodeId,
        kind: NodeKind,
        tick: Ticks,
    },
    EdgeAdded {
        edge: EdgeId,
        source: NodeId,
        target: NodeId,
        tick: Ticks,
    },
    MutationRejected {
        error: GraphError,
        tick: Ticks,
    },

    // -- Economy --
    FluxExchanged {
        flux_spent: Fixed64,
        prestige_gained: Fixed64,
        tick: Ticks,
    },
    ExchangeRejected {
        needed: Fixed64,
        available: Fixed64,
        tick: Ticks,
    },

    // -- Pressure transitions --
    /// The node reached capacity this tick.
    NodeSaturated { node: NodeId, tick: Ticks },
    /// The node emptied this tick.
    NodeDrained { node: NodeId, tick: Ticks },

    // -- Lifecycle --
    SimulationReset { tick: Ticks },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeAdded,
    EdgeAdded,
    MutationRejected,
    FluxExchanged,
    ExchangeRejected,
    NodeSaturated,
    NodeDrained,
    SimulationReset,
}

const EVENT_KIND_COUNT: usize = 8;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NodeAdded { .. } => EventKind::NodeAdded,
            Event::EdgeAdded { .. } => EventKind::EdgeAdded,
            Event::MutationRejected { .. } => EventKind::MutationRejected,
            Event::FluxExchanged { .. } => EventKind::FluxExchanged,
            Event::ExchangeRejected { .. } => EventKind::ExchangeRejected,
            Event::NodeSaturated { .. } => EventKind::NodeSaturated,
            Event::NodeDrained { .. } => EventKind::NodeDrained,
            Event::SimulationReset { .. } => EventKind::SimulationReset,
        }
    }

    /// The tick the event was emitted on.
    pub fn tick(&self) -> Ticks {
        match *self {
            Event::NodeAdded { tick, .. }
            | Event::EdgeAdded { tick, .. }
            | Event::MutationRejected { tick, .. }
            | Event::FluxExchanged { tick, .. }
            | Event::ExchangeRejected { tick, .. }
            | Event::NodeSaturated { tick, .. }
            | Event::NodeDrained { tick, .. }
            | Event::SimulationReset { tick } => tick,
        }
    }
}

impl EventKind {
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::NodeAdded,
        EventKind::EdgeAdded,
        EventKind::MutationRejected,
        EventKind::FluxExchanged,
        EventKind::ExchangeRejected,
        EventKind::NodeSaturated,
        EventKind::NodeDrained,
        EventKind::SimulationReset,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity ring buffer. When full, the oldest event is overwritten.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Next write position.
    head: usize,
    len: usize,
    /// Includes dropped events.
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
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

    /// Events overwritten before anyone read them.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Slot holding the oldest stored event.
    fn oldest(&self) -> usize {
        if self.len < self.capacity() { 0 } else { self.head }
    }

    /// Oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        EventBufferIter {
            buffer: self,
            index: self.oldest(),
            remaining: self.len,
        }
    }

    /// Remove and return every stored event, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        let cap = self.capacity();
        let start = self.oldest();
        let out = (0..self.len)
            .filter_map(|i| self.events[(start + i) % cap].take())
            .collect();
        self.head = 0;
        self.len = 0;
        out
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

pub type PassiveListener = Box<dyn FnMut(&Event) + Send>;

/// Returns commands to queue for the next tick.
pub type ReactiveHandler = Box<dyn FnMut(&Event) -> Vec<Command> + Send>;

pub type EventFilter = Box<dyn Fn(&Event) -> bool + Send>;

/// Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

enum Subscriber {
    Passive(PassiveListener),
    Reactive(ReactiveHandler),
}

struct SubscriberEntry {
    subscriber: Subscriber,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// One ring buffer per event kind, subscriber lists, and suppression flags.
pub struct EventBus {
    /// Allocated on first emit.
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],
    /// Commands returned by reactive handlers, waiting for the simulation.
    pending_commands: Vec<Command>,
    default_capacity: usize,
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("pending_commands", &self.pending_commands)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus whose buffers each hold `default_capacity` events.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: std::array::from_fn(|_| Vec::new()),
            pending_commands: Vec::new(),
            default_capacity,
            next_insertion_order: 0,
        }
    }

    /// Stop buffering an event kind. Already-buffered events of that kind
    /// are discarded.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event. No-op for suppressed kinds.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) {
        self.on_reactive_filtered(kind, SubscriberPriority::Normal, None, handler);
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        self.subscribe(kind, priority, filter, Subscriber::Passive(listener));
    }

    pub fn on_reactive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        handler: ReactiveHandler,
    ) {
        self.subscribe(kind, priority, filter, Subscriber::Reactive(handler));
    }

    fn subscribe(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        subscriber: Subscriber,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        let list = &mut self.subscribers[kind.index()];
        list.push(SubscriberEntry {
            subscriber,
            priority,
            filter,
            insertion_order: order,
        });
        list.sort_by_key(|entry| (entry.priority, entry.insertion_order));
    }

    /// Whether anything is subscribed to `kind`.
    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        !self.subscribers[kind.index()].is_empty()
    }

    /// Deliver every buffered event to its subscribers, then clear the
    /// buffers. Kinds are visited in declaration order; within a kind each
    /// subscriber sees the events oldest first, subscribers ordered by
    /// `(priority, registration order)`.
    ///
    /// Commands returned by reactive handlers accumulate until
    /// [`drain_commands`](Self::drain_commands).
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let events = buffer.drain();

            for entry in &mut self.subscribers[idx] {
                for event in &events {
                    if let Some(filter) = &entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    match &mut entry.subscriber {
                        Subscriber::Passive(listener) => listener(event),
                        Subscriber::Reactive(handler) => {
                            self.pending_commands.extend(handler(event));
                        }
                    }
                }
            }
        }
    }

    /// Take the buffered events of one kind without delivering them.
    pub fn drain(&mut self, kind: EventKind) -> Vec<Event> {
        self.buffers[kind.index()]
            .as_mut()
            .map(EventBuffer::drain)
            .unwrap_or_default()
    }

    /// Take every buffered event, grouped by kind in declaration order.
    pub fn drain_all(&mut self) -> Vec<Event> {
        EventKind::ALL
            .iter()
            .flat_map(|&kind| self.drain(kind))
            .collect()
    }

    pub fn drain_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending_commands)
    }

    /// Commands returned by reactive handlers and not yet drained.
    pub fn pending_command_count(&self) -> usize {
        self.pending_commands.len()
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, EventBuffer::len)
    }

    /// Includes events already delivered or dropped.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, EventBuffer::total_written)
    }

    /// Clear all buffers and pending commands. Subscribers and suppression
    /// settings stay.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
        self.pending_commands.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
