

pub mod base;
pub mod bus;

pub use base::{Event, EXECUTION_COMPLETED, EXECUTION_FAILED, PLAN_READY};
pub use bus::{EventBus, EventHandler};
