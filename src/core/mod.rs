pub mod config;
pub mod error;
pub mod types;

pub use config::SimulationConfig;
pub use error::{BackboneError, Result};
pub use types::{AgentId, EventData, Priority, SimTime, StateMap, Target, BROADCAST};
