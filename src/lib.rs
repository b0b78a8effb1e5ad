

pub mod core;
pub mod db;
pub mod toolkit;


pub use core::config::PurgeConfig;
pub use core::error::{PurgeError, Result};
pub use db::{DataStore, InMemoryStore, StoreClient, StoreError};
pub use toolkit::deletion::{
    DeletionManager, DeletionPlan, DeletionSession, EntityKind, EntityRef, ExecutionResult, ExecutionStatus,
    PlanTotals, PlanView, SessionState,
};


pub const DEFAULT_MAX_RETRIES: u32 = 3;


pub const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 100;


pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 10_000;
