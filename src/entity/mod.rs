//! Bundled behavior components

pub mod body;
pub mod needs;
pub mod tasks;

pub use body::Body;
pub use needs::{Need, NeedType, NeedsSystem};
pub use tasks::{Action, ActionEffect, ActionId, ActionQueue};
