pub mod bus;
pub mod event;

pub use bus::{BusStats, DeliveryFailure, EventBus, EventHandler, SubscriptionId, TickReport};
pub use event::Event;
