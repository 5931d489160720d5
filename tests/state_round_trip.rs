//! Property tests for component state persistence
//!
//! For arbitrary needs, body and action-queue states:
//! - serialize -> deserialize -> serialize yields the same maps
//! - a restored world behaves exactly like the original on the next step

use agent_backbone::component::Component;
use agent_backbone::core::config::SimulationConfig;
use agent_backbone::ecs::world::World;
use agent_backbone::entity::{Action, ActionQueue, Body, NeedsSystem};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct AgentState {
    hunger: f32,
    social: f32,
    fun: f32,
    energy: f32,
    /// true = eat, false = rest
    actions: Vec<bool>,
    progress: f64,
}

fn agent_state() -> impl Strategy<Value = AgentState> {
    (
        0.0f32..=1.0,
        0.0f32..=1.0,
        0.0f32..=1.0,
        0.0f32..=1.0,
        proptest::collection::vec(any::<bool>(), 0..4),
        0.0f64..20.0,
    )
        .prop_map(|(hunger, social, fun, energy, actions, progress)| AgentState {
            hunger,
            social,
            fun,
            energy,
            actions,
            progress,
        })
}

/// World with one agent carrying all three bundled components
fn fresh_world() -> World {
    let mut world = World::new();
    let config = world.config.clone();
    let agent = world.spawn_agent_with_id("agent_1", "Alice", 30).unwrap();
    agent.add_component::<NeedsSystem>(config.clone()).unwrap();
    agent.add_component::<Body>(config.clone()).unwrap();
    agent.add_component::<ActionQueue>(config).unwrap();
    world
}

fn populated_world(state: &AgentState) -> World {
    let world = fresh_world();
    let config = SimulationConfig::default();
    let agent = world.agent(&"agent_1".into()).unwrap();

    let queue = agent.get_component::<ActionQueue>().unwrap();
    for &eat in &state.actions {
        let action = if eat { Action::eat(&config) } else { Action::rest(&config) };
        queue.borrow_mut().push(action);
    }
    // Shorter than any action, so nothing completes here
    queue.borrow_mut().tick(state.progress).unwrap();

    let needs = agent.get_component::<NeedsSystem>().unwrap();
    needs.borrow_mut().get_need_mut("hunger").unwrap().value = state.hunger;
    needs.borrow_mut().get_need_mut("social").unwrap().value = state.social;
    needs.borrow_mut().get_need_mut("fun").unwrap().value = state.fun;

    let body = agent.get_component::<Body>().unwrap();
    body.borrow_mut().set_energy(state.energy);

    world
}

proptest! {
    #[test]
    fn prop_serialize_deserialize_serialize_is_stable(state in agent_state()) {
        let original = populated_world(&state);
        let saved = original.snapshot().unwrap();

        let restored = fresh_world();
        restored.restore(&saved).unwrap();

        prop_assert_eq!(restored.snapshot().unwrap(), saved);
    }

    #[test]
    fn prop_restored_world_steps_identically(state in agent_state(), minutes in 0.5f64..90.0) {
        let mut original = populated_world(&state);
        let mut restored = fresh_world();
        restored.restore(&original.snapshot().unwrap()).unwrap();

        original.step(minutes).unwrap();
        restored.step(minutes).unwrap();
        prop_assert_eq!(restored.snapshot().unwrap(), original.snapshot().unwrap());

        // Events raised by that step arrive on the next one
        original.step(minutes).unwrap();
        restored.step(minutes).unwrap();
        prop_assert_eq!(restored.snapshot().unwrap(), original.snapshot().unwrap());
    }
}
