//! Per-agent component registry
//!
//! Holds at most one component per `ComponentKind`. Adding a kind that is
//! already present replaces the old instance in place (last write wins, the
//! slot keeps its position). Iteration order is insertion order.
//!
//! All methods take `&self` so a component can reach its siblings through the
//! agent back-reference while the manager is ticking.

use super::{AgentContext, Component, ComponentBase, ComponentKind, ComponentRef, ComponentType, DynComponent};
use crate::core::error::{BackboneError, Result};
use crate::core::types::{AgentId, StateMap};
use crate::events::bus::EventBus;
use ahash::AHashMap;
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Component name -> component state
pub type ComponentStates = BTreeMap<String, StateMap>;

struct Entry {
    kind: ComponentKind,
    handle: DynComponent,
    /// Same allocation as `handle`, kept for typed lookups
    typed: Rc<dyn Any>,
}

pub struct ComponentManager {
    agent_id: AgentId,
    bus: Rc<EventBus>,
    agent: Option<Weak<dyn AgentContext>>,
    entries: RefCell<Vec<Entry>>,
    index: RefCell<AHashMap<ComponentKind, usize>>,
}

impl ComponentManager {
    pub fn new(agent_id: AgentId, bus: Rc<EventBus>) -> Self {
        Self {
            agent_id,
            bus,
            agent: None,
            entries: RefCell::new(Vec::new()),
            index: RefCell::new(AHashMap::new()),
        }
    }

    /// Manager whose components get `agent` as their back-reference
    pub fn with_agent(mut self, agent: Weak<dyn AgentContext>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    /// Construct, bind and store a component of type `C`
    ///
    /// Replaces any existing component of the same kind.
    pub fn add_component<C: ComponentType>(&self, args: C::Args) -> Result<ComponentRef<C>> {
        let base = ComponentBase::new(self.agent_id.clone(), Rc::clone(&self.bus));
        let component = C::construct(base, args)?;

        let typed: ComponentRef<C> = Rc::new(RefCell::new(component));
        let handle: DynComponent = typed.clone();
        {
            let mut component = typed.borrow_mut();
            component
                .base_mut()
                .bind(C::KIND.name(), Rc::downgrade(&handle), self.agent.clone());
            component.on_bind()?;
        }

        let entry = Entry {
            kind: C::KIND,
            handle,
            typed: typed.clone(),
        };

        let existing = self.index.borrow().get(&C::KIND).copied();
        // Detach the old instance outside of the borrow
        let replaced = match existing {
            Some(slot) => Some(std::mem::replace(&mut self.entries.borrow_mut()[slot], entry)),
            None => {
                let mut entries = self.entries.borrow_mut();
                self.index.borrow_mut().insert(C::KIND, entries.len());
                entries.push(entry);
                None
            }
        };

        match replaced {
            Some(old) => {
                detach(&old);
                tracing::debug!("Replaced {} on {}", C::KIND, self.agent_id);
            }
            None => tracing::debug!("Added {} to {}", C::KIND, self.agent_id),
        }

        Ok(typed)
    }

    /// Stored instance of `C`, or `None`
    pub fn get_component<C: ComponentType>(&self) -> Option<ComponentRef<C>> {
        let slot = self.index.borrow().get(&C::KIND).copied()?;
        let typed = Rc::clone(&self.entries.borrow()[slot].typed);
        typed.downcast::<RefCell<C>>().ok()
    }

    /// Like `get_component`, but absence is an error
    pub fn require<C: ComponentType>(&self) -> Result<ComponentRef<C>> {
        self.get_component::<C>()
            .ok_or_else(|| BackboneError::ComponentNotFound(C::KIND.name().to_string()))
    }

    pub fn get_by_kind(&self, kind: ComponentKind) -> Option<DynComponent> {
        let slot = self.index.borrow().get(&kind).copied()?;
        Some(Rc::clone(&self.entries.borrow()[slot].handle))
    }

    pub fn has_component<C: ComponentType>(&self) -> bool {
        self.has_kind(C::KIND)
    }

    pub fn has_kind(&self, kind: ComponentKind) -> bool {
        self.index.borrow().contains_key(&kind)
    }

    /// All components in insertion order
    pub fn get_all_components(&self) -> Vec<DynComponent> {
        self.entries.borrow().iter().map(|e| Rc::clone(&e.handle)).collect()
    }

    pub fn kinds(&self) -> Vec<ComponentKind> {
        self.entries.borrow().iter().map(|e| e.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop the component of `kind`; its subscriptions go with it
    pub fn remove_kind(&self, kind: ComponentKind) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let Some(slot) = entries.iter().position(|e| e.kind == kind) else {
                return false;
            };
            let removed = entries.remove(slot);

            let mut index = self.index.borrow_mut();
            index.clear();
            for (i, e) in entries.iter().enumerate() {
                index.insert(e.kind, i);
            }
            removed
        };

        detach(&removed);
        tracing::debug!("Removed {} from {}", kind, self.agent_id);
        true
    }

    pub fn remove_component<C: ComponentType>(&self) -> bool {
        self.remove_kind(C::KIND)
    }

    fn snapshot(&self) -> Vec<(ComponentKind, DynComponent)> {
        self.entries
            .borrow()
            .iter()
            .map(|e| (e.kind, Rc::clone(&e.handle)))
            .collect()
    }

    /// Tick every component once, in insertion order
    ///
    /// The first failure aborts the step and is returned.
    pub fn tick(&self, delta_time: f64) -> Result<()> {
        for (kind, handle) in self.snapshot() {
            tick_one(kind, &handle, delta_time).map_err(|e| {
                tracing::debug!("{} on {} failed to tick: {}", kind, self.agent_id, e);
                e
            })?;
        }
        Ok(())
    }

    /// Tick every component, continuing past failures
    pub fn tick_isolated(&self, delta_time: f64) -> Vec<(ComponentKind, BackboneError)> {
        let mut failures = Vec::new();
        for (kind, handle) in self.snapshot() {
            if let Err(e) = tick_one(kind, &handle, delta_time) {
                tracing::warn!("{} on {} failed to tick: {}", kind, self.agent_id, e);
                failures.push((kind, e));
            }
        }
        failures
    }

    /// State of every component keyed by component name
    pub fn serialize(&self) -> Result<ComponentStates> {
        let mut states = ComponentStates::new();
        for (kind, handle) in self.snapshot() {
            let component = handle
                .try_borrow()
                .map_err(|_| BackboneError::HandlerBusy(kind.name().to_string()))?;
            states.insert(component.get_component_name(), component.serialize()?);
        }
        Ok(states)
    }

    /// Restore components already present; never constructs missing ones
    ///
    /// Unknown names are ignored, components without an entry keep their
    /// state. Stops at the first component whose state fails to parse.
    pub fn deserialize(&self, data: &ComponentStates) -> Result<()> {
        let mut restored = 0usize;
        for (kind, handle) in self.snapshot() {
            let mut component = handle
                .try_borrow_mut()
                .map_err(|_| BackboneError::HandlerBusy(kind.name().to_string()))?;
            if let Some(state) = data.get(&component.get_component_name()) {
                component.deserialize(state)?;
                restored += 1;
            }
        }

        if restored < data.len() {
            tracing::debug!(
                "{}: ignored {} unknown component states",
                self.agent_id,
                data.len() - restored
            );
        }
        Ok(())
    }
}

/// Stop a component that left the manager from hearing further events
fn detach(entry: &Entry) {
    match entry.handle.try_borrow_mut() {
        Ok(mut component) => component.base_mut().unsubscribe_all(),
        Err(_) => tracing::debug!(
            "{} busy while detached; its subscriptions go when it is dropped",
            entry.kind
        ),
    }
}

fn tick_one(kind: ComponentKind, handle: &DynComponent, delta_time: f64) -> Result<()> {
    let mut component = handle
        .try_borrow_mut()
        .map_err(|_| BackboneError::HandlerBusy(kind.name().to_string()))?;
    component.tick(delta_time)
}

impl fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentManager")
            .field("agent_id", &self.agent_id)
            .field("components", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{from_state, merge_state, to_state};
    use crate::core::types::{EventData, Priority, Target};
    use crate::events::bus::EventHandler;
    use crate::events::event::Event;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct CounterState {
        ticks: u32,
        minutes: f64,
        seen: Vec<String>,
    }

    struct Counter {
        base: ComponentBase,
        state: CounterState,
        generation: u32,
    }

    impl Component for Counter {
        fn base(&self) -> &ComponentBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ComponentBase {
            &mut self.base
        }
        fn kind(&self) -> ComponentKind {
            Self::KIND
        }
        fn on_event(&mut self, event: &Event) -> Result<()> {
            self.state.seen.push(event.event_type().to_string());
            Ok(())
        }
        fn tick(&mut self, delta_time: f64) -> Result<()> {
            self.state.ticks += 1;
            self.state.minutes += delta_time;
            Ok(())
        }
        fn serialize(&self) -> Result<StateMap> {
            to_state(&self.state)
        }
        fn deserialize(&mut self, data: &StateMap) -> Result<()> {
            self.state = merge_state(&self.get_component_name(), &self.state, data)?;
            Ok(())
        }
    }

    impl ComponentType for Counter {
        const KIND: ComponentKind = ComponentKind::Custom("Counter");
        type Args = u32;

        fn construct(mut base: ComponentBase, generation: u32) -> Result<Self> {
            base.subscribe(&["ping"]);
            Ok(Self {
                base,
                state: CounterState::default(),
                generation,
            })
        }
    }

    #[derive(Debug)]
    struct Faulty {
        base: ComponentBase,
    }

    impl Component for Faulty {
        fn base(&self) -> &ComponentBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ComponentBase {
            &mut self.base
        }
        fn kind(&self) -> ComponentKind {
            Self::KIND
        }
        fn on_event(&mut self, _event: &Event) -> Result<()> {
            Ok(())
        }
        fn tick(&mut self, _delta_time: f64) -> Result<()> {
            Err(BackboneError::Handler("faulty tick".into()))
        }
        fn serialize(&self) -> Result<StateMap> {
            Ok(StateMap::new())
        }
        fn deserialize(&mut self, _data: &StateMap) -> Result<()> {
            Ok(())
        }
    }

    impl ComponentType for Faulty {
        const KIND: ComponentKind = ComponentKind::Custom("Faulty");
        type Args = bool;

        fn construct(base: ComponentBase, allowed: bool) -> Result<Self> {
            if !allowed {
                return Err(BackboneError::Construction {
                    component: "Faulty".into(),
                    reason: "not allowed".into(),
                });
            }
            Ok(Self { base })
        }
    }

    fn manager() -> ComponentManager {
        ComponentManager::new(AgentId::from("agent_1"), Rc::new(EventBus::new()))
    }

    #[test]
    fn test_add_then_get_returns_same_instance() {
        let m = manager();
        let added = m.add_component::<Counter>(1).unwrap();
        let fetched = m.get_component::<Counter>().unwrap();
        assert!(Rc::ptr_eq(&added, &fetched));
        assert!(m.has_component::<Counter>());
        assert!(!m.has_component::<Faulty>());
        assert!(m.get_component::<Faulty>().is_none());
    }

    #[test]
    fn test_adding_twice_keeps_one_entry() {
        let m = manager();
        m.add_component::<Counter>(1).unwrap();
        let second = m.add_component::<Counter>(2).unwrap();

        assert_eq!(m.len(), 1);
        let fetched = m.get_component::<Counter>().unwrap();
        assert!(Rc::ptr_eq(&second, &fetched));
        assert_eq!(fetched.borrow().generation, 2);
    }

    #[test]
    fn test_replacement_keeps_slot_and_drops_old_subscriptions() {
        let m = manager();
        m.add_component::<Counter>(1).unwrap();
        m.add_component::<Faulty>(true).unwrap();
        m.add_component::<Counter>(2).unwrap();

        assert_eq!(m.kinds(), vec![Counter::KIND, Faulty::KIND]);
        assert_eq!(m.bus().subscriber_count("ping"), 1);
    }

    #[test]
    fn test_construction_error_surfaces() {
        let m = manager();
        let err = m.add_component::<Faulty>(false).unwrap_err();
        assert!(matches!(err, BackboneError::Construction { .. }));
        assert!(m.is_empty());
    }

    #[test]
    fn test_subscriptions_from_construction_registered_on_bind() {
        let m = manager();
        let counter = m.add_component::<Counter>(1).unwrap();
        assert_eq!(counter.borrow().subscribed_events(), ["ping".to_string()]);

        counter.borrow().emit_event("ping", EventData::new(), Priority::NORMAL, Target::All);
        m.bus().tick();
        assert_eq!(counter.borrow().state.seen, vec!["ping"]);
    }

    #[test]
    fn test_unbound_agent_reference() {
        let m = manager();
        let counter = m.add_component::<Counter>(1).unwrap();
        let err = counter.borrow().base().agent().err().unwrap();
        assert!(matches!(err, BackboneError::NotBound(_)));
    }

    #[test]
    fn test_tick_reaches_every_component_once() {
        let m = manager();
        let counter = m.add_component::<Counter>(1).unwrap();
        m.tick(1.0).unwrap();
        m.tick(2.5).unwrap();

        assert_eq!(counter.borrow().state.ticks, 2);
        assert_eq!(counter.borrow().state.minutes, 3.5);
    }

    #[test]
    fn test_tick_propagates_failure() {
        let m = manager();
        m.add_component::<Faulty>(true).unwrap();
        let counter = m.add_component::<Counter>(1).unwrap();

        assert!(m.tick(1.0).is_err());
        assert_eq!(counter.borrow().state.ticks, 0);

        let failures = m.tick_isolated(1.0);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, Faulty::KIND);
        assert_eq!(counter.borrow().state.ticks, 1);
    }

    #[test]
    fn test_serialize_round_trip() {
        let m = manager();
        let counter = m.add_component::<Counter>(1).unwrap();
        m.tick(4.0).unwrap();
        let saved = m.serialize().unwrap();

        let restored = manager();
        let fresh = restored.add_component::<Counter>(1).unwrap();
        restored.deserialize(&saved).unwrap();

        assert_eq!(fresh.borrow().state.ticks, counter.borrow().state.ticks);
        assert_eq!(fresh.borrow().state.minutes, 4.0);
        let state: CounterState = from_state("Counter", &saved["Counter"]).unwrap();
        assert_eq!(state.ticks, 1);
    }

    #[test]
    fn test_deserialize_ignores_unknown_and_missing() {
        let m = manager();
        let counter = m.add_component::<Counter>(1).unwrap();
        counter.borrow_mut().state.ticks = 7;

        let mut data = ComponentStates::new();
        data.insert("Mood".to_string(), StateMap::new());
        m.deserialize(&data).unwrap();

        assert_eq!(counter.borrow().state.ticks, 7);
        assert!(!m.has_kind(ComponentKind::Mood));
    }

    #[test]
    fn test_remove_component() {
        let m = manager();
        m.add_component::<Counter>(1).unwrap();
        m.add_component::<Faulty>(true).unwrap();

        assert!(m.remove_component::<Counter>());
        assert!(!m.remove_component::<Counter>());
        assert_eq!(m.kinds(), vec![Faulty::KIND]);
        assert!(m.get_component::<Faulty>().is_some());
        assert_eq!(m.bus().subscriber_count("ping"), 0);
    }

    /// Handler keeping a component alive after its manager is gone
    struct Keeper {
        _component: ComponentRef<Counter>,
        alive: bool,
    }

    impl EventHandler for Keeper {
        fn handle(&self, _event: &Event) -> Result<()> {
            Ok(())
        }

        fn is_alive(&self) -> bool {
            self.alive
        }
    }

    fn orphaned_counter(bus: &Rc<EventBus>) -> ComponentRef<Counter> {
        let m = ComponentManager::new(AgentId::from("agent_1"), Rc::clone(bus));
        m.add_component::<Counter>(1).unwrap()
    }

    #[test]
    fn test_unsubscribe_dropping_last_component_handle() {
        let bus = Rc::new(EventBus::new());
        let counter = orphaned_counter(&bus);
        assert_eq!(bus.subscriber_count("ping"), 1);

        let id = bus.subscribe(
            ["pong"],
            None,
            Rc::new(Keeper {
                _component: counter,
                alive: true,
            }),
        );

        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count("pong"), 0);
        assert_eq!(bus.subscriber_count("ping"), 0);
    }

    #[test]
    fn test_pruning_dropping_last_component_handle() {
        let bus = Rc::new(EventBus::new());
        let counter = orphaned_counter(&bus);
        bus.subscribe(
            ["pong"],
            None,
            Rc::new(Keeper {
                _component: counter,
                alive: false,
            }),
        );

        bus.tick();

        assert_eq!(bus.subscriber_count("ping"), 0);
        assert_eq!(bus.stats().pruned, 1);
    }
}
