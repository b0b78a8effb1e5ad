
pub mod models;
pub mod associations;
pub mod references;
pub mod analyzer;
pub mod plan;
pub mod journal;
pub mod executor;
pub mod manager;
pub mod session;

#[cfg(test)]
pub(crate) mod fixtures;


pub use models::{
    AnalysisWarning, DeletedCounts, DeletionPlan, DeletionSet, DirectReferences, EntityKind, EntityRef,
    ExecutionResult, ExecutionStatus, GroupImpact, GroupView, ImpactReport, PlanTotals, PlanView, ResourceKind,
    SharedCounts, StepFailure, WarningScope,
};
pub use analyzer::ImpactAnalyzer;
pub use plan::PlanBuilder;
pub use executor::CascadeExecutor;
pub use manager::DeletionManager;
pub use session::{DeletionSession, SessionState};
