//! World - owns the bus and every agent, and drives the simulation step
//!
//! One step is always: bus tick (deliver what was queued), then every agent's
//! components tick, in spawn order.

use crate::component::{ComponentKind, ComponentStates};
use crate::core::config::SimulationConfig;
use crate::core::error::{BackboneError, Result};
use crate::core::types::{AgentId, SimTime};
use crate::ecs::agent::Agent;
use crate::events::bus::{EventBus, TickReport};
use ahash::AHashMap;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Persisted layout: agent id -> component name -> component state
pub type WorldSnapshot = BTreeMap<AgentId, ComponentStates>;

/// Outcome of one `World::tick`
#[derive(Debug, Default)]
pub struct StepReport {
    pub bus: TickReport,
    /// Component failures tolerated under `isolate_component_failures`
    pub component_failures: Vec<(AgentId, ComponentKind, BackboneError)>,
}

/// The simulation containing all agents
pub struct World {
    pub config: SimulationConfig,
    bus: Rc<EventBus>,
    agents: Vec<Rc<Agent>>,
    agent_index: AHashMap<AgentId, usize>,
}

impl World {
    pub fn new() -> Self {
        Self::build(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Result<Self> {
        config.validate().map_err(BackboneError::Config)?;
        Ok(Self::build(config))
    }

    fn build(config: SimulationConfig) -> Self {
        Self {
            bus: Rc::new(EventBus::from_config(&config)),
            config,
            agents: Vec::new(),
            agent_index: AHashMap::new(),
        }
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn current_time(&self) -> SimTime {
        self.bus.get_current_time()
    }

    pub fn spawn_agent(&mut self, name: impl Into<String>, age: u32) -> Rc<Agent> {
        let mut id = AgentId::generate();
        while self.agent_index.contains_key(&id) {
            id = AgentId::generate();
        }
        self.insert(Agent::new(id, name, age, Rc::clone(&self.bus)))
    }

    pub fn spawn_agent_with_id(
        &mut self,
        id: impl Into<AgentId>,
        name: impl Into<String>,
        age: u32,
    ) -> Result<Rc<Agent>> {
        let id = id.into();
        if id.is_reserved() {
            return Err(BackboneError::ReservedAgentId(id));
        }
        if self.agent_index.contains_key(&id) {
            return Err(BackboneError::DuplicateAgent(id));
        }
        Ok(self.insert(Agent::new(id, name, age, Rc::clone(&self.bus))))
    }

    fn insert(&mut self, agent: Rc<Agent>) -> Rc<Agent> {
        self.agent_index.insert(agent.id().clone(), self.agents.len());
        self.agents.push(Rc::clone(&agent));
        tracing::debug!("Spawned {} ({})", agent.id(), agent.name());
        agent
    }

    pub fn agent(&self, id: &AgentId) -> Option<Rc<Agent>> {
        self.agent_index.get(id).map(|&i| Rc::clone(&self.agents[i]))
    }

    pub fn agents(&self) -> impl Iterator<Item = &Rc<Agent>> + '_ {
        self.agents.iter()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Advance one step of `config.minutes_per_tick` minutes
    pub fn tick(&mut self) -> Result<StepReport> {
        self.step(self.config.minutes_per_tick)
    }

    /// Advance one step with an explicit `delta_time`
    pub fn step(&mut self, delta_time: f64) -> Result<StepReport> {
        let mut report = StepReport {
            bus: self.bus.tick(),
            ..Default::default()
        };

        for agent in &self.agents {
            if self.config.isolate_component_failures {
                for (kind, error) in agent.tick_isolated(delta_time) {
                    report.component_failures.push((agent.id().clone(), kind, error));
                }
            } else {
                agent.tick(delta_time)?;
            }
        }

        Ok(report)
    }

    /// Run `steps` ticks, stopping at the first propagated error
    pub fn run(&mut self, steps: u64) -> Result<()> {
        for _ in 0..steps {
            self.tick()?;
        }
        tracing::info!("Ran {} steps, clock at {}", steps, self.current_time());
        Ok(())
    }

    pub fn snapshot(&self) -> Result<WorldSnapshot> {
        let mut snapshot = WorldSnapshot::new();
        for agent in &self.agents {
            snapshot.insert(agent.id().clone(), agent.serialize()?);
        }
        Ok(snapshot)
    }

    /// Restore component state for agents that exist; others are ignored
    pub fn restore(&self, snapshot: &WorldSnapshot) -> Result<()> {
        for (id, states) in snapshot {
            match self.agent(id) {
                Some(agent) => agent.deserialize(states)?,
                None => tracing::debug!("Snapshot names unknown agent {}", id),
            }
        }
        Ok(())
    }

    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot()?)?)
    }

    pub fn restore_json(&self, json: &str) -> Result<()> {
        let snapshot: WorldSnapshot = serde_json::from_str(json)?;
        self.restore(&snapshot)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
