//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Target value that addresses every subscriber
pub const BROADCAST: &str = "all";

/// Opaque JSON-like mapping used for event payloads
pub type EventData = serde_json::Map<String, serde_json::Value>;

/// Opaque JSON-like mapping holding one component's persisted state
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// Logical simulation time, advanced once per bus tick
pub type SimTime = u64;

/// Unique identifier for agents
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id for agents spawned without an explicit name
    pub fn generate() -> Self {
        Self(format!("agent_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the broadcast sentinel, which no agent may use as its id
    pub fn is_reserved(&self) -> bool {
        self.0 == BROADCAST
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Event urgency
///
/// Lower numeric value = more urgent. The bus delivers lower values first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u8);

impl Priority {
    pub const CRITICAL: Priority = Priority(0);
    pub const HIGH: Priority = Priority(1);
    pub const NORMAL: Priority = Priority(5);
    pub const LOW: Priority = Priority(9);
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// Addressing of an event: every subscriber, or only handlers owned by one agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Target {
    #[default]
    All,
    Agent(AgentId),
}

impl Target {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Target::All)
    }

    /// Whether a handler owned by `owner` should see an event with this target
    pub fn accepts(&self, owner: Option<&AgentId>) -> bool {
        match self {
            Target::All => true,
            Target::Agent(id) => owner == Some(id),
        }
    }
}

impl From<String> for Target {
    fn from(value: String) -> Self {
        if value == BROADCAST {
            Target::All
        } else {
            Target::Agent(AgentId(value))
        }
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Target::from(value.to_string())
    }
}

impl From<AgentId> for Target {
    fn from(id: AgentId) -> Self {
        Target::from(id.0)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        match target {
            Target::All => BROADCAST.to_string(),
            Target::Agent(id) => id.0,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str(BROADCAST),
            Target::Agent(id) => write!(f, "{}", id),
        }
    }
}
