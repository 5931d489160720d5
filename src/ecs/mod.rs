pub mod agent;
pub mod world;

pub use agent::Agent;
pub use world::{StepReport, World, WorldSnapshot};
