//! Event bus - publish/subscribe routing plus the logical simulation clock
//!
//! Emission and delivery are decoupled: `emit` only queues. Each `tick`
//! advances the clock by one step and then drains everything that was queued
//! before it started, in priority order (lower value first) with emission
//! order breaking ties. Events emitted by handlers while a tick is delivering
//! land in the queue for the next tick, so one tick always has bounded work.
//!
//! The bus is shared as `Rc<EventBus>` and every operation takes `&self`, so
//! handlers may emit and subscribe while delivery is in progress.

use crate::core::config::SimulationConfig;
use crate::core::error::{BackboneError, Result};
use crate::core::types::{AgentId, Priority, SimTime};
use crate::events::event::Event;
use ahash::AHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Something that reacts to delivered events
pub trait EventHandler {
    fn handle(&self, event: &Event) -> Result<()>;

    /// Dead handlers are pruned from the subscription table
    fn is_alive(&self) -> bool {
        true
    }

    /// Short label used in log output
    fn label(&self) -> String {
        "handler".to_string()
    }
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> Result<()>,
{
    fn handle(&self, event: &Event) -> Result<()> {
        self(event)
    }
}

/// Handle returned by `subscribe`, usable with `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    owner: Option<AgentId>,
    handler: Rc<dyn EventHandler>,
}

struct Queued {
    seq: u64,
    event: Event,
}

/// A handler that returned an error during delivery
#[derive(Debug)]
pub struct DeliveryFailure {
    pub event_type: String,
    pub subscription: SubscriptionId,
    pub owner: Option<AgentId>,
    pub handler: String,
    pub error: BackboneError,
}

/// What happened during one `EventBus::tick`
#[derive(Debug, Default)]
pub struct TickReport {
    /// Clock value after the tick
    pub time: SimTime,
    /// Events drained from the queue
    pub events: usize,
    /// Successful handler invocations
    pub deliveries: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Running totals since the bus was created
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    pub emitted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub pruned: u64,
}

pub struct EventBus {
    clock: Cell<SimTime>,
    next_seq: Cell<u64>,
    next_subscription: Cell<u64>,
    subscriptions: RefCell<AHashMap<String, Vec<Subscription>>>,
    pending: RefCell<Vec<Queued>>,
    stats: Cell<BusStats>,
    default_priority: Priority,
    trace_deliveries: bool,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            clock: Cell::new(0),
            next_seq: Cell::new(0),
            next_subscription: Cell::new(0),
            subscriptions: RefCell::new(AHashMap::new()),
            pending: RefCell::new(Vec::new()),
            stats: Cell::new(BusStats::default()),
            default_priority: Priority::default(),
            trace_deliveries: false,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            default_priority: Priority(config.default_event_priority),
            trace_deliveries: config.trace_deliveries,
            ..Self::new()
        }
    }

    /// Register `handler` for every future delivered event whose type is in
    /// `event_types`
    ///
    /// Handlers of one type are invoked in registration order. A handler with
    /// no owner only sees broadcast events.
    pub fn subscribe<I, S>(
        &self,
        event_types: I,
        owner: Option<AgentId>,
        handler: Rc<dyn EventHandler>,
    ) -> SubscriptionId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);

        let mut table = self.subscriptions.borrow_mut();
        let mut seen: Vec<String> = Vec::new();
        for event_type in event_types {
            let event_type = event_type.as_ref();
            if seen.iter().any(|t| t == event_type) {
                continue;
            }
            seen.push(event_type.to_string());

            table.entry(event_type.to_string()).or_default().push(Subscription {
                id,
                owner: owner.clone(),
                handler: Rc::clone(&handler),
            });
        }

        tracing::debug!(
            "Subscription {:?} ({}) owned by {:?} to {:?}",
            id,
            handler.label(),
            owner,
            seen
        );
        id
    }

    /// Remove every registration made by one `subscribe` call
    ///
    /// Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        // Dropped after the table borrow ends; dropping a handler may unsubscribe again
        let removed = self.take_subscriptions(|s| s.id == id);
        !removed.is_empty()
    }

    /// Queue an event for delivery on the next tick
    pub fn emit(&self, event: Event) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);

        tracing::debug!(
            "Queued {} from {} to {} (priority {}, t={})",
            event.event_type(),
            event.source(),
            event.target(),
            event.priority().0,
            event.timestamp()
        );

        self.pending.borrow_mut().push(Queued { seq, event });
        self.bump(|s| s.emitted += 1);
    }

    /// Priority for events whose emitter did not pick one
    pub fn default_priority(&self) -> Priority {
        self.default_priority
    }

    /// Clock value as of the most recently completed tick
    pub fn get_current_time(&self) -> SimTime {
        self.clock.get()
    }

    /// Advance the clock one step and deliver everything queued so far
    pub fn tick(&self) -> TickReport {
        let now = self.clock.get() + 1;
        self.clock.set(now);

        let mut batch = self.pending.take();
        batch.sort_by_key(|q| (q.event.priority(), q.seq));

        self.prune_dead();

        let mut report = TickReport {
            time: now,
            events: batch.len(),
            ..Default::default()
        };

        for Queued { event, .. } in batch {
            self.deliver(&event, &mut report);
        }

        self.bump(|s| {
            s.delivered += report.deliveries as u64;
            s.failed += report.failures.len() as u64;
        });

        if !report.is_clean() {
            tracing::warn!(
                "Tick {}: {} of {} deliveries failed",
                now,
                report.failures.len(),
                report.deliveries + report.failures.len()
            );
        }

        report
    }

    fn deliver(&self, event: &Event, report: &mut TickReport) {
        // Snapshot so handlers can subscribe while we iterate
        let subscribers: Vec<Subscription> = self
            .subscriptions
            .borrow()
            .get(event.event_type())
            .cloned()
            .unwrap_or_default();

        if subscribers.is_empty() {
            tracing::debug!("No subscribers for {}", event.event_type());
            return;
        }

        for sub in subscribers {
            if !event.target().accepts(sub.owner.as_ref()) || !sub.handler.is_alive() {
                continue;
            }

            if self.trace_deliveries {
                tracing::trace!(
                    "Delivering {} (t={}) to {} owned by {:?}",
                    event.event_type(),
                    event.timestamp(),
                    sub.handler.label(),
                    sub.owner
                );
            }

            match sub.handler.handle(event) {
                Ok(()) => report.deliveries += 1,
                Err(error) => {
                    tracing::warn!(
                        "Handler {} failed on {}: {}",
                        sub.handler.label(),
                        event.event_type(),
                        error
                    );
                    report.failures.push(DeliveryFailure {
                        event_type: event.event_type().to_string(),
                        subscription: sub.id,
                        owner: sub.owner.clone(),
                        handler: sub.handler.label(),
                        error,
                    });
                }
            }
        }
    }

    fn prune_dead(&self) {
        let pruned = self.take_subscriptions(|s| !s.handler.is_alive());
        if !pruned.is_empty() {
            tracing::debug!("Pruned {} stale subscriptions", pruned.len());
            self.bump(|s| s.pruned += pruned.len() as u64);
        }
    }

    /// Move matching subscriptions out of the table
    fn take_subscriptions(&self, matches: impl Fn(&Subscription) -> bool) -> Vec<Subscription> {
        let mut taken = Vec::new();
        let mut table = self.subscriptions.borrow_mut();
        for subs in table.values_mut() {
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(subs).into_iter().partition(|s| matches(s));
            *subs = kept;
            taken.extend(gone);
        }
        table.retain(|_, subs| !subs.is_empty());
        taken
    }

    fn bump(&self, f: impl FnOnce(&mut BusStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscriptions
            .borrow()
            .get(event_type)
            .map_or(0, |subs| subs.iter().filter(|s| s.handler.is_alive()).count())
    }

    pub fn stats(&self) -> BusStats {
        self.stats.get()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("time", &self.clock.get())
            .field("pending", &self.pending_count())
            .field("event_types", &self.subscriptions.borrow().len())
            .field("stats", &self.stats.get())
            .finish()
    }
}
