//! Agent Backbone - component/event core for tick-driven agent simulations

pub mod component;
pub mod core;
pub mod ecs;
pub mod entity;
pub mod events;
