

pub mod config;
pub mod error;
pub mod events;
pub mod locks;

pub use config::PurgeConfig;
pub use error::{PurgeError, Result};
pub use events::{Event, EventBus, EventHandler};
pub use locks::{EntityLock, LockRegistry};
