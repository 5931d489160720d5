//! Agent aggregate - one simulated entity and its components

use crate::component::{AgentContext, ComponentKind, ComponentManager, ComponentRef, ComponentStates, ComponentType};
use crate::core::error::{BackboneError, Result};
use crate::core::types::AgentId;
use crate::events::bus::EventBus;
use std::fmt;
use std::rc::{Rc, Weak};

pub struct Agent {
    id: AgentId,
    name: String,
    age: u32,
    components: ComponentManager,
}

impl Agent {
    /// Create an agent whose components can reach it through their back-reference
    pub fn new(id: AgentId, name: impl Into<String>, age: u32, bus: Rc<EventBus>) -> Rc<Self> {
        let name = name.into();
        Rc::new_cyclic(|this: &Weak<Agent>| {
            let link: Weak<dyn AgentContext> = this.clone();
            Agent {
                components: ComponentManager::new(id.clone(), bus).with_agent(link),
                id,
                name,
                age,
            }
        })
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn add_component<C: ComponentType>(&self, args: C::Args) -> Result<ComponentRef<C>> {
        self.components.add_component::<C>(args)
    }

    pub fn get_component<C: ComponentType>(&self) -> Option<ComponentRef<C>> {
        self.components.get_component::<C>()
    }

    pub fn has_component<C: ComponentType>(&self) -> bool {
        self.components.has_component::<C>()
    }

    pub fn tick(&self, delta_time: f64) -> Result<()> {
        self.components.tick(delta_time)
    }

    pub fn tick_isolated(&self, delta_time: f64) -> Vec<(ComponentKind, BackboneError)> {
        self.components.tick_isolated(delta_time)
    }

    pub fn serialize(&self) -> Result<ComponentStates> {
        self.components.serialize()
    }

    pub fn deserialize(&self, data: &ComponentStates) -> Result<()> {
        self.components.deserialize(data)
    }
}

impl AgentContext for Agent {
    fn agent_id(&self) -> &AgentId {
        &self.id
    }

    fn components(&self) -> &ComponentManager {
        &self.components
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("age", &self.age)
            .field("components", &self.components)
            .finish()
    }
}
