//! Component contract - independent behavior units bound to one agent
//!
//! A component never talks to its siblings directly: it subscribes to event
//! types on the shared bus, reacts in `on_event`, advances continuous state in
//! `tick` and round-trips its state through `serialize`/`deserialize`.
//!
//! Components are built in two phases. `ComponentType::construct` receives a
//! `ComponentBase` holding everything known up front (agent id, bus). The
//! manager then binds the component to its own shared handle and to the owning
//! agent before anything else can reach it. Nothing that needs the agent
//! back-reference may run before binding completes; `ComponentBase::agent`
//! returns `BackboneError::NotBound` until then.

pub mod base;
pub mod manager;

pub use base::ComponentBase;
pub use manager::{ComponentManager, ComponentStates};

use crate::core::error::{BackboneError, Result};
use crate::core::types::{AgentId, EventData, Priority, StateMap, Target};
use crate::events::event::Event;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a concrete component owned by a manager
pub type ComponentRef<C> = Rc<RefCell<C>>;

/// Shared handle to any component
pub type DynComponent = Rc<RefCell<dyn Component>>;

/// Which behavior a component implements
///
/// An agent holds at most one component per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Needs,
    Body,
    ActionQueue,
    Mood,
    Decision,
    /// Behaviors outside the built-in set, keyed by a stable name
    Custom(&'static str),
}

impl ComponentKind {
    /// Stable name used as the serialization key
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Needs => "NeedsSystem",
            ComponentKind::Body => "Body",
            ComponentKind::ActionQueue => "ActionQueue",
            ComponentKind::Mood => "Mood",
            ComponentKind::Decision => "DecisionEngine",
            ComponentKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The aggregate a component belongs to, reachable after binding
pub trait AgentContext {
    fn agent_id(&self) -> &AgentId;
    fn components(&self) -> &ComponentManager;
}

/// Behavior unit bound to one agent
pub trait Component {
    fn base(&self) -> &ComponentBase;
    fn base_mut(&mut self) -> &mut ComponentBase;
    fn kind(&self) -> ComponentKind;

    /// Called by the bus for every delivered event this component subscribed to
    fn on_event(&mut self, event: &Event) -> Result<()>;

    /// Advance continuous state by `delta_time` simulation minutes
    ///
    /// `delta_time` varies between calls; never assume a fixed step.
    fn tick(&mut self, _delta_time: f64) -> Result<()> {
        Ok(())
    }

    /// Called once by the manager right after binding
    fn on_bind(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_component_name(&self) -> String {
        self.kind().name().to_string()
    }

    /// Capture all state needed to rebuild identical behavior
    fn serialize(&self) -> Result<StateMap>;

    /// Exact inverse of `serialize`
    fn deserialize(&mut self, data: &StateMap) -> Result<()>;

    fn subscribe(&mut self, event_types: &[&str]) {
        self.base_mut().subscribe(event_types);
    }

    fn emit_event(&self, event_type: &str, data: EventData, priority: Priority, target: Target) {
        self.base().emit_event(event_type, data, priority, target);
    }

    fn emit_event_with(
        &self,
        event_type: &str,
        data: EventData,
        priority: Priority,
        target: Target,
        extra: EventData,
    ) {
        self.base().emit_event_with(event_type, data, priority, target, extra);
    }

    fn agent_id(&self) -> &AgentId {
        self.base().agent_id()
    }

    fn subscribed_events(&self) -> &[String] {
        self.base().subscribed_events()
    }
}

/// Construction side of a component, used by `ComponentManager::add_component`
pub trait ComponentType: Component + Sized + 'static {
    const KIND: ComponentKind;

    /// Extra constructor arguments beyond the agent id and bus
    type Args;

    fn construct(base: ComponentBase, args: Self::Args) -> Result<Self>;
}

/// Serialize a state struct into a component state map
pub fn to_state<T: Serialize>(state: &T) -> Result<StateMap> {
    match serde_json::to_value(state)? {
        Value::Object(map) => Ok(map),
        other => Err(BackboneError::SerdeError(serde::ser::Error::custom(format!(
            "component state must be a mapping, got {}",
            other
        )))),
    }
}

/// Parse a state map, failing loudly on mistyped values
pub fn from_state<T: DeserializeOwned>(component: &str, data: &StateMap) -> Result<T> {
    serde_json::from_value(Value::Object(data.clone())).map_err(|source| {
        BackboneError::StateMismatch {
            component: component.to_string(),
            source,
        }
    })
}

/// Overlay `data` onto `current`
///
/// Nested mappings are merged key by key, so keys missing from `data` keep
/// their current value at every depth. Unknown struct fields are ignored and
/// mistyped values are an error.
pub fn merge_state<T>(component: &str, current: &T, data: &StateMap) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = to_state(current)?;
    overlay(&mut merged, data);
    from_state(component, &merged)
}

fn overlay(target: &mut StateMap, data: &StateMap) {
    for (key, value) in data {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => overlay(existing, incoming),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        level: f32,
        label: String,
    }

    fn map(value: Value) -> StateMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ComponentKind::Needs.name(), "NeedsSystem");
        assert_eq!(ComponentKind::Custom("Memory").name(), "Memory");
        assert_eq!(ComponentKind::ActionQueue.to_string(), "ActionQueue");
    }

    #[test]
    fn test_merge_keeps_missing_keys() {
        let current = Sample { level: 0.5, label: "a".into() };
        let merged = merge_state("Sample", &current, &map(json!({ "level": 0.9, "bogus": 1 }))).unwrap();
        assert_eq!(merged, Sample { level: 0.9, label: "a".into() });
    }

    #[test]
    fn test_mistyped_state_fails() {
        let current = Sample { level: 0.5, label: "a".into() };
        let err = merge_state("Sample", &current, &map(json!({ "level": "high" }))).unwrap_err();
        match err {
            BackboneError::StateMismatch { component, .. } => assert_eq!(component, "Sample"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Nested {
        levels: std::collections::BTreeMap<String, Sample>,
        turns: Vec<u32>,
    }

    #[test]
    fn test_merge_is_deep_for_mappings() {
        let current = Nested {
            levels: [
                ("a".to_string(), Sample { level: 0.1, label: "x".into() }),
                ("b".to_string(), Sample { level: 0.2, label: "y".into() }),
            ]
            .into(),
            turns: vec![1, 2, 3],
        };
        let data = map(json!({ "levels": { "a": { "level": 0.7 } }, "turns": [9] }));
        let merged = merge_state("Nested", &current, &data).unwrap();

        assert_eq!(merged.levels["a"], Sample { level: 0.7, label: "x".into() });
        assert_eq!(merged.levels["b"], current.levels["b"]);
        // Sequences are replaced whole
        assert_eq!(merged.turns, vec![9]);
    }

    #[test]
    fn test_non_mapping_state_rejected() {
        assert!(to_state(&5u32).is_err());
    }
}
