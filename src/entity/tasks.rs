//! Action queue and execution
//!
//! Actions take simulation time. Their effects are not applied directly:
//! completion emits satisfaction events that the owning agent's other
//! components receive on a later tick.

use crate::component::{merge_state, to_state, Component, ComponentBase, ComponentKind, ComponentType};
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::types::{Priority, StateMap, Target};
use crate::entity::body::{Body, ENERGY_RESTORED};
use crate::entity::needs::{NeedType, NEED_SATISFIED};
use crate::event_data;
use crate::events::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const ACTION_REQUESTED: &str = "action_requested";
pub const ACTION_STARTED: &str = "action_started";
pub const ACTION_COMPLETED: &str = "action_completed";
pub const ACTION_INTERRUPTED: &str = "action_interrupted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionId {
    Eat,
    Rest,
}

impl ActionId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionId::Eat => "eat",
            ActionId::Rest => "rest",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "eat" => Some(ActionId::Eat),
            "rest" => Some(ActionId::Rest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum ActionEffect {
    SatisfyNeed { need: NeedType, amount: f32 },
    RestoreEnergy { amount: f32 },
}

/// An action with its duration and completion effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    /// Simulation minutes of work needed
    pub duration: f64,
    pub effects: Vec<ActionEffect>,
}

impl Action {
    /// Eating restores hunger and a little energy
    pub fn eat(config: &SimulationConfig) -> Self {
        Self {
            id: ActionId::Eat,
            duration: config.eat_duration,
            effects: vec![
                ActionEffect::SatisfyNeed {
                    need: NeedType::Hunger,
                    amount: config.eat_hunger_restore,
                },
                ActionEffect::RestoreEnergy {
                    amount: config.eat_energy_restore,
                },
            ],
        }
    }

    pub fn rest(config: &SimulationConfig) -> Self {
        Self {
            id: ActionId::Rest,
            duration: config.rest_duration,
            effects: vec![ActionEffect::RestoreEnergy {
                amount: config.rest_energy_restore,
            }],
        }
    }

    pub fn from_id(id: ActionId, config: &SimulationConfig) -> Self {
        match id {
            ActionId::Eat => Self::eat(config),
            ActionId::Rest => Self::rest(config),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct QueueState {
    current: Option<Action>,
    progress: f64,
    queued: VecDeque<Action>,
}

/// Current action plus FIFO of pending ones
#[derive(Debug)]
pub struct ActionQueue {
    base: ComponentBase,
    config: SimulationConfig,
    state: QueueState,
}

impl ActionQueue {
    pub fn current(&self) -> Option<&Action> {
        self.state.current.as_ref()
    }

    /// Minutes of work done on the current action
    pub fn action_progress(&self) -> f64 {
        self.state.progress
    }

    pub fn queued_len(&self) -> usize {
        self.state.queued.len()
    }

    pub fn is_busy(&self) -> bool {
        self.state.current.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.state.current.is_none() && self.state.queued.is_empty()
    }

    /// Queue an action; starts immediately when idle
    pub fn push(&mut self, action: Action) {
        self.state.queued.push_back(action);
        if self.state.current.is_none() {
            self.start_next();
        }
    }

    /// Start `action` now, interrupting whatever is running
    pub fn start_action(&mut self, action: Action) {
        if self.state.current.is_some() {
            self.cancel_current();
        }
        self.begin(action);
    }

    /// Drop the current action without applying its effects
    pub fn cancel_current(&mut self) {
        if let Some(action) = self.state.current.take() {
            tracing::debug!(
                "{} cancelled {} at {:.1}/{:.1}",
                self.base.agent_id(),
                action.id.as_str(),
                self.state.progress,
                action.duration
            );
            self.state.progress = 0.0;
        }
    }

    pub fn clear(&mut self) {
        self.cancel_current();
        self.state.queued.clear();
    }

    fn start_next(&mut self) {
        if let Some(action) = self.state.queued.pop_front() {
            self.begin(action);
        }
    }

    fn begin(&mut self, action: Action) {
        self.emit_event(
            ACTION_STARTED,
            event_data! { "action" => action.id.as_str(), "duration" => action.duration },
            Priority::NORMAL,
            Target::All,
        );
        self.state.progress = 0.0;
        self.state.current = Some(action);
    }

    fn complete(&mut self, action: Action) {
        let own = Target::Agent(self.base.agent_id().clone());

        for effect in &action.effects {
            match effect {
                ActionEffect::SatisfyNeed { need, amount } => self.emit_event(
                    NEED_SATISFIED,
                    event_data! { "need" => need.as_str(), "amount" => amount },
                    Priority::NORMAL,
                    own.clone(),
                ),
                ActionEffect::RestoreEnergy { amount } => self.emit_event(
                    ENERGY_RESTORED,
                    event_data! { "amount" => amount },
                    Priority::NORMAL,
                    own.clone(),
                ),
            }
        }

        self.emit_event(
            ACTION_COMPLETED,
            event_data! { "action" => action.id.as_str() },
            Priority::NORMAL,
            Target::All,
        );
    }

    /// Work rate from the agent's body; full speed when there is no body
    fn work_rate(&self) -> f64 {
        let Ok(agent) = self.base.agent() else {
            return 1.0;
        };
        let Some(body) = agent.components().get_component::<Body>() else {
            return 1.0;
        };
        body.try_borrow().map_or(1.0, |body| body.efficiency())
    }
}

impl Component for ActionQueue {
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
        match event.event_type() {
            ACTION_REQUESTED => {
                match event.get("action").and_then(|v| v.as_str()).and_then(ActionId::parse) {
                    Some(id) => self.push(Action::from_id(id, &self.config)),
                    None => tracing::warn!("{}: unknown action requested", self.base.agent_id()),
                }
            }
            ACTION_INTERRUPTED => {
                self.cancel_current();
                self.start_next();
            }
            _ => {}
        }
        Ok(())
    }

    fn tick(&mut self, delta_time: f64) -> Result<()> {
        if self.state.current.is_none() {
            return Ok(());
        }

        self.state.progress += delta_time * self.work_rate();

        let finished = self
            .state
            .current
            .as_ref()
            .is_some_and(|a| self.state.progress >= a.duration);
        if finished {
            if let Some(action) = self.state.current.take() {
                self.state.progress = 0.0;
                self.complete(action);
            }
            self.start_next();
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

impl ComponentType for ActionQueue {
    const KIND: ComponentKind = ComponentKind::ActionQueue;
    type Args = SimulationConfig;

    fn construct(mut base: ComponentBase, config: SimulationConfig) -> Result<Self> {
        base.subscribe(&[ACTION_REQUESTED, ACTION_INTERRUPTED]);
        Ok(Self {
            base,
            config,
            state: QueueState::default(),
        })
    }
}
