
pub mod deletion;


pub use deletion::{DeletionManager, DeletionPlan, DeletionSession, EntityKind, ExecutionResult};
