use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::journal::CompensationLog;
use super::models::{
    DeletedCounts, DeletionPlan, DeletionSet, EntityKind, EntityRef, ExecutionResult, ExecutionStatus, ResourceKind,
    StepFailure,
};
use crate::core::error::{PurgeError, Result};
use crate::db::{DataStore, Predicate, schema};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Memberships,
    Links,
    Documents,
    Parts,
    Groups,
    Target,
}


#[derive(Debug, Clone)]
pub struct DeleteStep {
    pub label: String,
    pub table: &'static str,
    pub predicate: Predicate,
    pub tally: Tally,
}

impl DeleteStep {
    fn new(label: impl Into<String>, table: &'static str, predicate: Predicate, tally: Tally) -> Self {
        Self {
            label: label.into(),
            table,
            predicate,
            tally,
        }
    }
}


pub struct CascadeExecutor {
    store: Arc<dyn DataStore>,
    rollback_on_failure: bool,
}

impl CascadeExecutor {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            rollback_on_failure: true,
        }
    }

    pub fn with_rollback(mut self, enabled: bool) -> Self {
        self.rollback_on_failure = enabled;
        self
    }


    pub async fn execute(&self, plan: &DeletionPlan, cascade_empty_groups: bool) -> Result<ExecutionResult> {
        if !plan.can_delete {
            warn!("Refusing to execute blocked plan {} for {}", plan.plan_id, plan.target);
            return Err(PurgeError::Blocked {
                target: plan.target.clone(),
                reason: plan.reason.clone(),
            });
        }

        let steps = script(&plan.target, plan.deletion_set(cascade_empty_groups));
        let started_at = Utc::now();
        warn!(
            "Executing plan {} for {} ({} steps, cascade={}) - THIS IS IRREVERSIBLE without the journal",
            plan.plan_id,
            plan.target,
            steps.len(),
            cascade_empty_groups
        );

        let mut deleted = DeletedCounts::default();
        let mut errors = Vec::new();
        let mut journal = CompensationLog::new();
        let mut completed_steps = 0;

        for step in &steps {
            match self.run_step(step, &mut journal).await {
                Ok(count) => {
                    debug!("{}: {} row(s) from {}", step.label, count, step.table);
                    add(&mut deleted, step.tally, count);
                    completed_steps += 1;
                }
                Err(e) => {
                    error!("Step '{}' on {} failed: {}", step.label, step.table, e);
                    errors.push(StepFailure {
                        step: step.label.clone(),
                        table: step.table.to_string(),
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }

        let mut restored_rows = 0;
        let status = if errors.is_empty() {
            ExecutionStatus::Completed
        } else if self.rollback_on_failure {
            match journal.rollback(self.store.as_ref()).await {
                Ok(restored) => {
                    restored_rows = restored;
                    deleted = DeletedCounts::default();
                    ExecutionStatus::RolledBack
                }
                Err((restored, table, e)) => {
                    restored_rows = restored;
                    errors.push(StepFailure {
                        step: "rollback".to_string(),
                        table,
                        error: e.to_string(),
                    });
                    ExecutionStatus::Failed
                }
            }
        } else {
            ExecutionStatus::Failed
        };

        info!(
            "Plan {} finished with {:?}: {}/{} steps, deleted {:?}",
            plan.plan_id,
            status,
            completed_steps,
            steps.len(),
            deleted
        );

        Ok(ExecutionResult {
            plan_id: plan.plan_id,
            target: plan.target.clone(),
            cascade_empty_groups,
            status,
            deleted,
            errors,
            completed_steps,
            total_steps: steps.len(),
            restored_rows,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_step(&self, step: &DeleteStep, journal: &mut CompensationLog) -> Result<usize> {
        if self.rollback_on_failure {
            let rows = self.store.select_where(step.table, &step.predicate).await?;
            let count = self.store.delete_where(step.table, &step.predicate).await?;
            journal.record(step.table, rows);
            Ok(count)
        } else {
            Ok(self.store.delete_where(step.table, &step.predicate).await?)
        }
    }
}

/// Delete order: the target's edges, its orphaned dependents, the target
/// row, then each emptied group with the resources only it kept alive.
pub fn script(target: &EntityRef, set: &DeletionSet) -> Vec<DeleteStep> {
    let mut steps = Vec::new();
    let id = target.id.as_str();

    match target.kind.as_resource() {
        None => {
            steps.push(DeleteStep::new(
                "target group memberships",
                schema::EQUIPMENT_GROUP_MEMBERS,
                Predicate::eq(schema::EQUIPMENT_ID, id),
                Tally::Memberships,
            ));
            for kind in ResourceKind::ALL {
                steps.push(DeleteStep::new(
                    "target links",
                    kind.link_table(),
                    Predicate::eq(schema::EQUIPMENT_ID, id),
                    Tally::Links,
                ));
            }
        }
        Some(kind) => {
            steps.push(DeleteStep::new(
                "target group memberships",
                kind.group_membership_table(),
                Predicate::eq(kind.member_column(), id),
                Tally::Memberships,
            ));
            steps.push(DeleteStep::new(
                "target links",
                kind.link_table(),
                Predicate::eq(kind.member_column(), id),
                Tally::Links,
            ));
        }
    }

    resource_steps(&mut steps, "direct", ResourceKind::Document, &set.direct_documents);
    resource_steps(&mut steps, "direct", ResourceKind::Part, &set.direct_parts);

    steps.push(DeleteStep::new(
        format!("{} row", target.kind),
        target.kind.table(),
        Predicate::eq(schema::ID, id),
        Tally::Target,
    ));

    for cleanup in &set.groups {
        let group = cleanup.group_id.as_str();
        for kind in [EntityKind::Equipment, EntityKind::Document, EntityKind::Part] {
            steps.push(DeleteStep::new(
                format!("group {} memberships", group),
                kind.group_membership_table(),
                Predicate::eq(schema::GROUP_ID, group),
                Tally::Memberships,
            ));
        }
        let scope = format!("group {}", group);
        resource_steps(&mut steps, &scope, ResourceKind::Document, &cleanup.documents);
        resource_steps(&mut steps, &scope, ResourceKind::Part, &cleanup.parts);
        steps.push(DeleteStep::new(
            format!("group {} row", group),
            schema::GROUPS,
            Predicate::eq(schema::ID, group),
            Tally::Groups,
        ));
    }

    steps
}

fn resource_steps(steps: &mut Vec<DeleteStep>, scope: &str, kind: ResourceKind, ids: &[String]) {
    if ids.is_empty() {
        return;
    }
    let name: &'static str = kind.into();
    let by_member = Predicate::any_of(kind.member_column(), ids.iter().map(String::as_str));

    steps.push(DeleteStep::new(
        format!("{} {} memberships", scope, name),
        kind.group_membership_table(),
        by_member.clone(),
        Tally::Memberships,
    ));
    steps.push(DeleteStep::new(
        format!("{} {} links", scope, name),
        kind.link_table(),
        by_member,
        Tally::Links,
    ));
    steps.push(DeleteStep::new(
        format!("{} {} rows", scope, name),
        kind.table(),
        Predicate::any_of(schema::ID, ids.iter().map(String::as_str)),
        match kind {
            ResourceKind::Document => Tally::Documents,
            ResourceKind::Part => Tally::Parts,
        },
    ));
}

fn add(counts: &mut DeletedCounts, tally: Tally, n: usize) {
    match tally {
        Tally::Memberships => counts.memberships += n,
        Tally::Links => counts.links += n,
        Tally::Documents => counts.documents += n,
        Tally::Parts => counts.parts += n,
        Tally::Groups => counts.groups += n,
        Tally::Target => counts.target += n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PurgeConfig;
    use crate::db::{InMemoryStore, StoreOp};
    use crate::toolkit::deletion::analyzer::ImpactAnalyzer;
    use crate::toolkit::deletion::fixtures;
    use crate::toolkit::deletion::plan::PlanBuilder;

    async fn plan_for(store: Arc<InMemoryStore>, target: EntityRef) -> DeletionPlan {
        let report = ImpactAnalyzer::new(store).analyze(&target).await.unwrap();
        PlanBuilder::new(&PurgeConfig::default()).build(report)
    }

    #[test]
    fn test_script_order_for_equipment() {
        let set = DeletionSet {
            direct_documents: vec!["D1".into()],
            ..Default::default()
        };
        let steps = script(&EntityRef::new("E1", EntityKind::Equipment), &set);
        let tables: Vec<_> = steps.iter().map(|s| s.table).collect();
        assert_eq!(
            tables,
            vec![
                "equipment_group_members",
                "equipment_documents",
                "equipment_parts",
                "document_group_members",
                "equipment_documents",
                "documents",
                "equipments",
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_without_cascade_keeps_empty_group() {
        let store = fixtures::plant().await;
        let plan = plan_for(store.clone(), EntityRef::new("E1", EntityKind::Equipment)).await;

        let result = CascadeExecutor::new(store.clone()).execute(&plan, false).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.deleted.target, 1);
        assert_eq!(result.deleted.documents, 1);
        assert_eq!(result.deleted.parts, 1);
        assert_eq!(result.deleted.groups, 0);
        assert_eq!(store.rows("groups").await.len(), 3);
        assert_eq!(store.rows("interventions").await.len(), 3);
    }

    #[tokio::test]
    async fn test_execute_with_cascade_removes_orphans() {
        let store = fixtures::plant().await;
        let plan = plan_for(store.clone(), EntityRef::new("E1", EntityKind::Equipment)).await;

        let result = CascadeExecutor::new(store.clone()).execute(&plan, true).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.deleted.groups, 1);
        assert_eq!(result.deleted.parts, 3);

        let parts: Vec<_> = store.rows("parts").await.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(parts, vec![serde_json::json!("P4")]);
        assert!(store.rows("part_group_members").await.is_empty());
    }

    #[tokio::test]
    async fn test_blocked_plan_is_refused() {
        let store = fixtures::plant().await;
        let plan = plan_for(store.clone(), EntityRef::new("D1", EntityKind::Document)).await;
        assert!(!plan.can_delete);

        let err = CascadeExecutor::new(store.clone()).execute(&plan, false).await.unwrap_err();
        assert!(matches!(err, PurgeError::Blocked { .. }));
        assert_eq!(store.rows("documents").await.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_applied_steps() {
        let store = fixtures::plant().await;
        let before = store.snapshot().await;
        let plan = plan_for(store.clone(), EntityRef::new("E1", EntityKind::Equipment)).await;

        store.fail_on("equipments", StoreOp::Delete);
        let result = CascadeExecutor::new(store.clone()).execute(&plan, true).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::RolledBack);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].table, "equipments");
        assert!(result.restored_rows > 0);
        assert_eq!(result.deleted, DeletedCounts::default());

        let after = store.snapshot().await;
        for table in ["equipment_group_members", "equipment_documents", "documents", "parts"] {
            assert_eq!(after[table].as_array().unwrap().len(), before[table].as_array().unwrap().len());
        }
    }

    #[tokio::test]
    async fn test_failure_without_rollback_is_partial() {
        let store = fixtures::plant().await;
        let plan = plan_for(store.clone(), EntityRef::new("E1", EntityKind::Equipment)).await;

        store.fail_on("groups", StoreOp::Delete);
        let result = CascadeExecutor::new(store.clone())
            .with_rollback(false)
            .execute(&plan, true)
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.is_partial());
        assert_eq!(result.errors[0].step, "group G2 row");
        assert_eq!(result.deleted.target, 1);
        assert!(store.rows("equipments").await.iter().all(|r| r["id"] != "E1"));
    }
}
