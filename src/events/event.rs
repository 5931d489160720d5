//! Immutable event values routed by the bus

use crate::core::types::{AgentId, EventData, Priority, SimTime, Target};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One occurrence in the simulation
///
/// Fields are private: once built, an event is never modified. The bus alone
/// decides when and in which order it is delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: String,
    source: AgentId,
    #[serde(default)]
    target: Target,
    #[serde(default)]
    data: EventData,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    timestamp: SimTime,
    /// Additional named attributes supplied by the emitter
    #[serde(default, skip_serializing_if = "EventData::is_empty")]
    extra: EventData,
}

impl Event {
    /// Broadcast event with an empty payload, default priority, stamped at time 0
    pub fn new(event_type: impl Into<String>, source: impl Into<AgentId>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            target: Target::All,
            data: EventData::new(),
            priority: Priority::default(),
            timestamp: 0,
            extra: EventData::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<Target>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn at_time(mut self, timestamp: SimTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn source(&self) -> &AgentId {
        &self.source
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Payload lookup by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn timestamp(&self) -> SimTime {
        self.timestamp
    }

    pub fn extra(&self) -> &EventData {
        &self.extra
    }
}

/// Build an `EventData` map from `key => value` pairs
#[macro_export]
macro_rules! event_data {
    () => { $crate::core::types::EventData::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut data = $crate::core::types::EventData::new();
        $( data.insert(($key).to_string(), ::serde_json::json!($value)); )+
        data
    }};
}
