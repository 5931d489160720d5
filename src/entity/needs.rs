//! Universal needs that drive agent behavior

use crate::component::{merge_state, to_state, Component, ComponentBase, ComponentKind, ComponentType};
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::types::{Priority, StateMap, Target};
use crate::event_data;
use crate::events::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NEED_CRITICAL: &str = "need_critical";
pub const NEED_SATISFIED: &str = "need_satisfied";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedType {
    Hunger,
    Social,
    Fun,
}

impl NeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeedType::Hunger => "hunger",
            NeedType::Social => "social",
            NeedType::Fun => "fun",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "hunger" => Some(NeedType::Hunger),
            "social" => Some(NeedType::Social),
            "fun" => Some(NeedType::Fun),
            _ => None,
        }
    }
}

/// One need level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Need {
    /// 1.0 = fully satisfied, 0.0 = desperate
    pub value: f32,
    /// Loss per simulation minute
    pub decay_rate: f32,
    /// Set while below the critical threshold; cleared on recovery
    #[serde(default)]
    pub critical: bool,
}

impl Need {
    pub fn new(decay_rate: f32) -> Self {
        Self {
            value: 1.0,
            decay_rate,
            critical: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NeedsState {
    needs: BTreeMap<NeedType, Need>,
    critical_threshold: f32,
}

/// Decay of needs over time plus reaction to satisfaction events
#[derive(Debug)]
pub struct NeedsSystem {
    base: ComponentBase,
    state: NeedsState,
}

impl NeedsSystem {
    pub fn get_need(&self, name: &str) -> Option<&Need> {
        NeedType::parse(name).and_then(|n| self.state.needs.get(&n))
    }

    pub fn get_need_mut(&mut self, name: &str) -> Option<&mut Need> {
        NeedType::parse(name).and_then(|n| self.state.needs.get_mut(&n))
    }

    pub fn need(&self, need: NeedType) -> f32 {
        self.state.needs.get(&need).map_or(0.0, |n| n.value)
    }

    /// Lowest need and its value
    pub fn most_pressing(&self) -> Option<(NeedType, f32)> {
        self.state
            .needs
            .iter()
            .map(|(t, n)| (*t, n.value))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn satisfy(&mut self, need: NeedType, amount: f32) {
        let threshold = self.state.critical_threshold;
        if let Some(n) = self.state.needs.get_mut(&need) {
            n.value = (n.value + amount).clamp(0.0, 1.0);
            if n.value >= threshold {
                n.critical = false;
            }
        }
    }
}

impl Component for NeedsSystem {
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
        if event.event_type() != NEED_SATISFIED {
            return Ok(());
        }

        let need = event.get("need").and_then(|v| v.as_str()).and_then(NeedType::parse);
        let amount = event.get("amount").and_then(|v| v.as_f64());
        match (need, amount) {
            (Some(need), Some(amount)) => self.satisfy(need, amount as f32),
            _ => tracing::warn!("{}: malformed {} event ignored", self.base.agent_id(), NEED_SATISFIED),
        }
        Ok(())
    }

    fn tick(&mut self, delta_time: f64) -> Result<()> {
        let threshold = self.state.critical_threshold;
        let mut crossed = Vec::new();

        for (need_type, need) in self.state.needs.iter_mut() {
            need.value = (need.value - need.decay_rate * delta_time as f32).max(0.0);

            if need.value < threshold && !need.critical {
                need.critical = true;
                crossed.push((*need_type, need.value));
            } else if need.value >= threshold {
                need.critical = false;
            }
        }

        let own = Target::Agent(self.base.agent_id().clone());
        for (need, value) in crossed {
            self.emit_event(
                NEED_CRITICAL,
                event_data! { "need" => need.as_str(), "value" => value },
                Priority::HIGH,
                own.clone(),
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

impl ComponentType for NeedsSystem {
    const KIND: ComponentKind = ComponentKind::Needs;
    type Args = SimulationConfig;

    fn construct(mut base: ComponentBase, config: SimulationConfig) -> Result<Self> {
        base.subscribe(&[NEED_SATISFIED]);

        let needs = BTreeMap::from([
            (NeedType::Hunger, Need::new(config.hunger_decay_rate)),
            (NeedType::Social, Need::new(config.social_decay_rate)),
            (NeedType::Fun, Need::new(config.fun_decay_rate)),
        ]);

        Ok(Self {
            base,
            state: NeedsState {
                needs,
                critical_threshold: config.critical_need_threshold,
            },
        })
    }
}
