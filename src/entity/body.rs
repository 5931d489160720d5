//! Physical body simulation

use crate::component::{merge_state, to_state, Component, ComponentBase, ComponentKind, ComponentType};
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::types::{EventData, Priority, StateMap, Target};
use crate::events::event::Event;
use serde::{Deserialize, Serialize};

pub const ENERGY_RESTORED: &str = "energy_restored";
pub const EXHAUSTED: &str = "exhausted";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BodyState {
    /// 0.0 = exhausted, 1.0 = fresh
    energy: f32,
    /// Energy lost per simulation minute
    drain_rate: f32,
    exhausted: bool,
}

/// Energy reserve of an agent
#[derive(Debug)]
pub struct Body {
    base: ComponentBase,
    state: BodyState,
}

impl Body {
    pub fn energy(&self) -> f32 {
        self.state.energy
    }

    pub fn set_energy(&mut self, energy: f32) {
        self.state.energy = energy.clamp(0.0, 1.0);
        self.state.exhausted = self.state.energy <= 0.0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.exhausted
    }

    /// Work rate multiplier for actions: exhausted bodies work at half speed
    pub fn efficiency(&self) -> f64 {
        if self.state.exhausted {
            0.5
        } else {
            1.0
        }
    }

    pub fn recover(&mut self, amount: f32) {
        self.set_energy(self.state.energy + amount);
    }
}

impl Component for Body {
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
        if event.event_type() == ENERGY_RESTORED {
            if let Some(amount) = event.get("amount").and_then(|v| v.as_f64()) {
                self.recover(amount as f32);
            }
        }
        Ok(())
    }

    fn tick(&mut self, delta_time: f64) -> Result<()> {
        let was_exhausted = self.state.exhausted;
        self.set_energy(self.state.energy - self.state.drain_rate * delta_time as f32);

        if self.state.exhausted && !was_exhausted {
            self.emit_event(
                EXHAUSTED,
                EventData::new(),
                Priority::HIGH,
                Target::Agent(self.base.agent_id().clone()),
            );
        }
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

impl ComponentType for Body {
    const KIND: ComponentKind = ComponentKind::Body;
    type Args = SimulationConfig;

    fn construct(mut base: ComponentBase, config: SimulationConfig) -> Result<Self> {
        base.subscribe(&[ENERGY_RESTORED]);
        Ok(Self {
            base,
            state: BodyState {
                energy: 1.0,
                drain_rate: config.energy_drain_rate,
                exhausted: false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentManager;
    use crate::core::types::AgentId;
    use crate::event_data;
    use crate::events::bus::EventBus;
    use std::rc::Rc;

    #[test]
    fn test_exhaustion_emitted_once() {
        let bus = Rc::new(EventBus::new());
        let m = ComponentManager::new(AgentId::from("a1"), Rc::clone(&bus));
        let body = m.add_component::<Body>(SimulationConfig::default()).unwrap();
        body.borrow_mut().set_energy(0.001);

        m.tick(5.0).unwrap();
        m.tick(5.0).unwrap();

        assert_eq!(body.borrow().energy(), 0.0);
        assert!(body.borrow().is_exhausted());
        assert_eq!(body.borrow().efficiency(), 0.5);
        assert_eq!(bus.pending_count(), 1);
    }

    #[test]
    fn test_energy_restored_event() {
        let bus = Rc::new(EventBus::new());
        let m = ComponentManager::new(AgentId::from("a1"), Rc::clone(&bus));
        let body = m.add_component::<Body>(SimulationConfig::default()).unwrap();
        body.borrow_mut().set_energy(0.0);

        bus.emit(
            Event::new(ENERGY_RESTORED, "a1")
                .with_target("a1")
                .with_data(event_data! { "amount" => 0.25 }),
        );
        bus.tick();

        assert_eq!(body.borrow().energy(), 0.25);
        assert!(!body.borrow().is_exhausted());
    }

    #[test]
    fn test_mistyped_energy_fails_fast() {
        let bus = Rc::new(EventBus::new());
        let m = ComponentManager::new(AgentId::from("a1"), bus);
        let body = m.add_component::<Body>(SimulationConfig::default()).unwrap();

        let mut data = StateMap::new();
        data.insert("energy".into(), serde_json::json!("full"));
        assert!(body.borrow_mut().deserialize(&data).is_err());
        assert_eq!(body.borrow().energy(), 1.0);
    }

    #[test]
    fn test_completed_rest_restores_energy_next_tick() {
        use crate::entity::tasks::{Action, ActionQueue};

        let bus = Rc::new(EventBus::new());
        let config = SimulationConfig::default();
        let m = ComponentManager::new(AgentId::from("a1"), Rc::clone(&bus));
        let body = m.add_component::<Body>(config.clone()).unwrap();
        let queue = m.add_component::<ActionQueue>(config.clone()).unwrap();
        body.borrow_mut().set_energy(0.2);
        queue.borrow_mut().push(Action::rest(&config));

        m.tick(config.rest_duration).unwrap();
        let drained = body.borrow().energy();
        assert!(drained < 0.2);

        bus.tick();
        let expected = drained + config.rest_energy_restore;
        assert!((body.borrow().energy() - expected).abs() < 1e-6);
    }
}
