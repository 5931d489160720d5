//! State shared by every component: identity, bus access, binding

use super::{AgentContext, Component};
use crate::core::error::{BackboneError, Result};
use crate::core::types::{AgentId, EventData, Priority, SimTime, Target};
use crate::events::bus::{EventBus, EventHandler, SubscriptionId};
use crate::events::event::Event;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Fields every component carries
///
/// Subscriptions requested before binding are remembered and registered with
/// the bus when the manager binds the component.
pub struct ComponentBase {
    agent_id: AgentId,
    bus: Rc<EventBus>,
    agent: Option<Weak<dyn AgentContext>>,
    handle: Option<Weak<RefCell<dyn Component>>>,
    name: String,
    subscribed_events: Vec<String>,
    deferred: Vec<Vec<String>>,
    subscriptions: Vec<SubscriptionId>,
}

impl ComponentBase {
    pub fn new(agent_id: AgentId, bus: Rc<EventBus>) -> Self {
        Self {
            agent_id,
            bus,
            agent: None,
            handle: None,
            name: "component".to_string(),
            subscribed_events: Vec::new(),
            deferred: Vec::new(),
            subscriptions: Vec::new(),
        }
    }

    /// Attach the component's own shared handle and its owning agent
    ///
    /// Registers any subscriptions requested during construction.
    pub fn bind(
        &mut self,
        name: &str,
        handle: Weak<RefCell<dyn Component>>,
        agent: Option<Weak<dyn AgentContext>>,
    ) {
        self.name = name.to_string();
        self.handle = Some(handle);
        self.agent = agent;

        for types in std::mem::take(&mut self.deferred) {
            self.register(&types);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn current_time(&self) -> SimTime {
        self.bus.get_current_time()
    }

    /// The owning agent; fails before binding or once the agent is gone
    pub fn agent(&self) -> Result<Rc<dyn AgentContext>> {
        self.agent
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| BackboneError::NotBound(format!("{} of {}", self.name, self.agent_id)))
    }

    pub fn subscribed_events(&self) -> &[String] {
        &self.subscribed_events
    }

    /// Route events of the given types to this component's `on_event`
    pub fn subscribe(&mut self, event_types: &[&str]) {
        let types: Vec<String> = event_types.iter().map(|t| t.to_string()).collect();
        if self.is_bound() {
            self.register(&types);
        } else {
            self.deferred.push(types.clone());
        }
        self.subscribed_events.extend(types);
    }

    fn register(&mut self, types: &[String]) {
        let Some(target) = self.handle.clone() else {
            return;
        };
        let handler = Rc::new(ComponentHandler {
            label: format!("{}@{}", self.name, self.agent_id),
            target,
        });
        let id = self
            .bus
            .subscribe(types, Some(self.agent_id.clone()), handler);
        self.subscriptions.push(id);
    }

    /// Withdraw every bus registration made by this component
    pub fn unsubscribe_all(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
        self.deferred.clear();
    }

    /// Event sourced from this agent, stamped with the bus clock and the
    /// bus's default priority
    pub fn event(&self, event_type: &str) -> Event {
        Event::new(event_type, self.agent_id.clone())
            .at_time(self.current_time())
            .with_priority(self.bus.default_priority())
    }

    pub fn emit_event(&self, event_type: &str, data: EventData, priority: Priority, target: Target) {
        self.emit_event_with(event_type, data, priority, target, EventData::new());
    }

    /// `emit_event` plus extra top-level event attributes
    pub fn emit_event_with(
        &self,
        event_type: &str,
        data: EventData,
        priority: Priority,
        target: Target,
        extra: EventData,
    ) {
        let mut event = self
            .event(event_type)
            .with_data(data)
            .with_priority(priority)
            .with_target(target);
        for (key, value) in extra {
            event = event.with_extra(key, value);
        }
        self.bus.emit(event);
    }

    pub fn emit(&self, event: Event) {
        self.bus.emit(event);
    }
}

impl Drop for ComponentBase {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

impl fmt::Debug for ComponentBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBase")
            .field("agent_id", &self.agent_id)
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .field("subscribed_events", &self.subscribed_events)
            .finish()
    }
}

/// Bus handler forwarding to a component's `on_event`
struct ComponentHandler {
    label: String,
    target: Weak<RefCell<dyn Component>>,
}

impl EventHandler for ComponentHandler {
    fn handle(&self, event: &Event) -> Result<()> {
        let Some(component) = self.target.upgrade() else {
            return Ok(());
        };
        let mut component = component
            .try_borrow_mut()
            .map_err(|_| BackboneError::HandlerBusy(self.label.clone()))?;
        component.on_event(event)
    }

    fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
