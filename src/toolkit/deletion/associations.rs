use std::sync::Arc;

use tracing::{debug, warn};

use super::models::{AnalysisWarning, EntityRef, GroupId, Lookup, WarningScope};
use crate::db::{DataStore, Predicate, Row, schema};


pub struct AssociationIndex {
    store: Arc<dyn DataStore>,
}

impl AssociationIndex {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Groups `entity` belongs to, in the order the store returns its edges.
    pub async fn groups_for(&self, entity: &EntityRef) -> Lookup<Vec<GroupId>> {
        let table = entity.kind.group_membership_table();
        let predicate = Predicate::eq(entity.kind.member_column(), entity.id.as_str());

        match self.store.select_where(table, &predicate).await {
            Ok(rows) => {
                let groups = distinct_column(&rows, schema::GROUP_ID);
                debug!("{} belongs to {} group(s)", entity, groups.len());
                Lookup::ok(groups)
            }
            Err(e) => {
                warn!("Could not resolve groups for {}: {}", entity, e);
                Lookup::degraded(
                    Vec::new(),
                    AnalysisWarning::new(WarningScope::Direct, format!("groups of {}", entity), e),
                )
            }
        }
    }


    pub async fn remaining_members(&self, group_id: &str, excluding: &str) -> Lookup<usize> {
        let predicate = Predicate::eq(schema::GROUP_ID, group_id).and(Predicate::ne(schema::EQUIPMENT_ID, excluding));

        match self.store.count(schema::EQUIPMENT_GROUP_MEMBERS, &predicate).await {
            Ok(count) => Lookup::ok(count),
            Err(e) => {
                warn!("Could not count remaining members of group {}: {}", group_id, e);
                Lookup::degraded(
                    0,
                    AnalysisWarning::new(WarningScope::Group, format!("remaining equipment in {}", group_id), e),
                )
            }
        }
    }

    /// Falls back to the id so the dialog always has something to show.
    pub async fn group_name(&self, group_id: &str) -> Lookup<String> {
        match self.store.select_where(schema::GROUPS, &Predicate::eq(schema::ID, group_id)).await {
            Ok(rows) => Lookup::ok(
                rows.first()
                    .and_then(|row| row.get(schema::NAME))
                    .and_then(|v| v.as_str())
                    .unwrap_or(group_id)
                    .to_string(),
            ),
            Err(e) => {
                warn!("Could not load name of group {}: {}", group_id, e);
                Lookup::degraded(
                    group_id.to_string(),
                    AnalysisWarning::new(WarningScope::Group, format!("name of {}", group_id), e),
                )
            }
        }
    }
}

/// String values of `column`, first occurrence wins.
pub(crate) fn distinct_column(rows: &[Row], column: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(rows.len());
    for value in rows.iter().filter_map(|r| r.get(column)).filter_map(|v| v.as_str()) {
        if !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryStore, StoreOp};
    use crate::toolkit::deletion::models::EntityKind;
    use serde_json::json;

    async fn store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.insert("groups", json!({"id": "G1", "name": "Ligne 1"})).await;
        for (eq, g) in [("E1", "G1"), ("E2", "G1"), ("E3", "G1"), ("E1", "G2"), ("E1", "G1")] {
            store
                .insert("equipment_group_members", json!({"equipment_id": eq, "group_id": g}))
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_groups_for_is_ordered_and_distinct() {
        let index = AssociationIndex::new(store().await);
        let groups = index.groups_for(&EntityRef::new("E1", EntityKind::Equipment)).await;
        assert!(!groups.is_degraded());
        assert_eq!(groups.value, vec!["G1".to_string(), "G2".to_string()]);
    }

    #[tokio::test]
    async fn test_no_memberships_is_empty_not_error() {
        let index = AssociationIndex::new(store().await);
        let groups = index.groups_for(&EntityRef::new("D9", EntityKind::Document)).await;
        assert!(groups.value.is_empty());
        assert!(!groups.is_degraded());
    }

    #[tokio::test]
    async fn test_remaining_members_excludes_target() {
        let index = AssociationIndex::new(store().await);
        // G1 holds E2 and E3 once E1's two edges are gone.
        assert_eq!(index.remaining_members("G1", "E1").await.value, 2);
        assert_eq!(index.remaining_members("G2", "E1").await.value, 0);
        assert_eq!(index.remaining_members("G1", "E9").await.value, 4);
    }

    #[tokio::test]
    async fn test_failures_degrade_with_warning() {
        let store = store().await;
        store.fail_on("equipment_group_members", StoreOp::Count);
        store.fail_on("groups", StoreOp::Select);
        let index = AssociationIndex::new(store);

        let remaining = index.remaining_members("G1", "E1").await;
        assert_eq!(remaining.value, 0);
        assert_eq!(remaining.warnings[0].scope, WarningScope::Group);

        let name = index.group_name("G1").await;
        assert_eq!(name.value, "G1");
        assert!(name.is_degraded());
    }

    #[tokio::test]
    async fn test_group_name() {
        let index = AssociationIndex::new(store().await);
        assert_eq!(index.group_name("G1").await.value, "Ligne 1");
        assert_eq!(index.group_name("G7").await.value, "G7");
    }
}
