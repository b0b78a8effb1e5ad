use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use super::analyzer::ImpactAnalyzer;
use super::executor::CascadeExecutor;
use super::models::{DeletionPlan, EntityKind, EntityRef, ExecutionResult};
use super::plan::PlanBuilder;
use super::session::DeletionSession;
use crate::core::config::PurgeConfig;
use crate::core::error::{PurgeError, Result};
use crate::core::events::{EXECUTION_COMPLETED, EXECUTION_FAILED, Event, EventBus, PLAN_READY};
use crate::core::locks::LockRegistry;
use crate::db::{DataStore, RetryPolicy, StoreClient};


pub struct DeletionManager {
    analyzer: ImpactAnalyzer,
    builder: PlanBuilder,
    executor: CascadeExecutor,
    verify_plan: bool,
    locks: LockRegistry,
    events: EventBus,
}

impl DeletionManager {
    /// Every store call goes through a retrying [`StoreClient`].
    pub fn new(store: Arc<dyn DataStore>, config: &PurgeConfig) -> Self {
        info!("Initializing DeletionManager");
        let client: Arc<dyn DataStore> = Arc::new(StoreClient::with_policy(store, RetryPolicy::from_config(config)));

        let analyzer = ImpactAnalyzer::new(Arc::clone(&client));
        let analyzer = if config.concurrent_group_lookups {
            analyzer
        } else {
            analyzer.sequential()
        };

        Self {
            analyzer,
            builder: PlanBuilder::new(config),
            executor: CascadeExecutor::new(client).with_rollback(config.rollback_on_failure),
            verify_plan: config.verify_plan_before_execute,
            locks: LockRegistry::new(),
            events: EventBus::new(),
        }
    }


    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }


    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// A fresh plan every call; nothing is cached between analyses.
    pub async fn analyze(&self, entity_id: &str, kind: EntityKind) -> Result<DeletionPlan> {
        let target = EntityRef::new(entity_id, kind);
        let report = self.analyzer.analyze(&target).await?;
        let plan = self.builder.build(report);

        self.events
            .emit(
                Event::new(
                    PLAN_READY,
                    json!({
                        "plan": plan.view(false),
                        "totals_with_cascade": plan.totals(true),
                        "degraded": plan.is_degraded(),
                    }),
                )
                .with_correlation(plan.plan_id),
            )
            .await;

        Ok(plan)
    }

    /// Holds the target's advisory lock for the whole execution.
    pub async fn execute(&self, plan: &DeletionPlan, cascade_empty_groups: bool) -> Result<ExecutionResult> {
        let _lock = self.locks.try_acquire(&plan.target)?;
        self.execute_locked(plan, cascade_empty_groups).await
    }


    pub fn session(&self, entity_id: &str, kind: EntityKind) -> DeletionSession<'_> {
        DeletionSession::new(self, EntityRef::new(entity_id, kind))
    }

    /// Caller holds the lock for `plan.target`.
    pub(crate) async fn execute_locked(&self, plan: &DeletionPlan, cascade_empty_groups: bool) -> Result<ExecutionResult> {
        if self.verify_plan {
            let current = self.builder.build(self.analyzer.analyze(&plan.target).await?);
            if !current.same_impact(plan) {
                warn!("Plan {} for {} no longer matches the store", plan.plan_id, plan.target);
                return Err(PurgeError::StalePlan(plan.target.clone()));
            }
        }

        let result = self.executor.execute(plan, cascade_empty_groups).await?;

        let event_type = if result.is_success() {
            EXECUTION_COMPLETED
        } else {
            EXECUTION_FAILED
        };
        self.events
            .emit(Event::new(event_type, serde_json::to_value(&result)?).with_correlation(plan.plan_id))
            .await;

        Ok(result)
    }
}
