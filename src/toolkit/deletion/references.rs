use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::associations::distinct_column;
use super::models::{AnalysisWarning, Lookup, ResourceKind, ResourceRefs, SharedCounts, SharedResources, WarningScope};
use crate::db::{DataStore, Predicate, Row, schema};


pub struct ReferenceCounter {
    store: Arc<dyn DataStore>,
}

impl ReferenceCounter {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }


    pub async fn shared_resource_counts(&self, group_id: &str) -> Lookup<SharedCounts> {
        self.shared_resources(group_id).await.map(|shared| shared.counts())
    }

    /// Documents and parts attached to `group_id`, whatever else references them.
    pub async fn shared_resources(&self, group_id: &str) -> Lookup<SharedResources> {
        let (documents, parts) = futures::join!(
            self.group_members(group_id, ResourceKind::Document),
            self.group_members(group_id, ResourceKind::Part),
        );

        let mut warnings = Vec::new();
        let shared = SharedResources {
            documents: documents.collect_into(&mut warnings),
            parts: parts.collect_into(&mut warnings),
        };
        debug!(
            "Group {} shares {} document(s) and {} part(s)",
            group_id,
            shared.documents.len(),
            shared.parts.len()
        );

        Lookup { value: shared, warnings }
    }

    async fn group_members(&self, group_id: &str, kind: ResourceKind) -> Lookup<Vec<String>> {
        let table = kind.group_membership_table();
        match self.store.select_where(table, &Predicate::eq(schema::GROUP_ID, group_id)).await {
            Ok(rows) => Lookup::ok(distinct_column(&rows, kind.member_column())),
            Err(e) => {
                warn!("Could not list {} of group {}: {}", table, group_id, e);
                Lookup::degraded(
                    Vec::new(),
                    AnalysisWarning::new(WarningScope::Group, format!("{} of {}", table, group_id), e),
                )
            }
        }
    }

    /// Full reference sets for `ids`. An id whose lookup failed comes back
    /// `unresolved` so it is never mistaken for an orphan.
    pub async fn resource_references(
        &self,
        kind: ResourceKind,
        ids: &[String],
    ) -> Lookup<BTreeMap<String, ResourceRefs>> {
        let mut refs: BTreeMap<String, ResourceRefs> =
            ids.iter().map(|id| (id.clone(), ResourceRefs::default())).collect();
        if refs.is_empty() {
            return Lookup::ok(refs);
        }

        let predicate = Predicate::any_of(kind.member_column(), ids.iter().map(String::as_str));
        let (links, memberships) = futures::join!(
            self.store.select_where(kind.link_table(), &predicate),
            self.store.select_where(kind.group_membership_table(), &predicate),
        );

        let mut warnings = Vec::new();
        let mut degrade = |table: &str, error: &dyn fmt::Display, refs: &mut BTreeMap<String, ResourceRefs>| {
            warn!("Could not load {} references from {}: {}", kind_name(kind), table, error);
            warnings.push(AnalysisWarning::new(
                WarningScope::References,
                format!("{} references", table),
                error,
            ));
            refs.values_mut().for_each(|r| r.unresolved = true);
        };

        match links {
            Ok(rows) => {
                for (resource, equipment) in edges(&rows, kind.member_column(), schema::EQUIPMENT_ID) {
                    if let Some(entry) = refs.get_mut(resource) {
                        entry.equipment.insert(equipment.to_string());
                    }
                }
            }
            Err(e) => degrade(kind.link_table(), &e, &mut refs),
        }

        match memberships {
            Ok(rows) => {
                for (resource, group) in edges(&rows, kind.member_column(), schema::GROUP_ID) {
                    if let Some(entry) = refs.get_mut(resource) {
                        entry.groups.insert(group.to_string());
                    }
                }
            }
            Err(e) => degrade(kind.group_membership_table(), &e, &mut refs),
        }

        Lookup { value: refs, warnings }
    }
}

fn str_field<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(|v| v.as_str())
}

/// `(from, to)` pairs of an edge table; rows missing either side are skipped.
fn edges<'a>(rows: &'a [Row], from: &'a str, to: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    rows.iter()
        .filter_map(move |row| Some((str_field(row, from)?, str_field(row, to)?)))
}

fn kind_name(kind: ResourceKind) -> &'static str {
    kind.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryStore, StoreOp};
    use serde_json::json;

    async fn store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for (doc, g) in [("D1", "G1"), ("D2", "G1"), ("D2", "G2")] {
            store.insert("document_group_members", json!({"document_id": doc, "group_id": g})).await;
        }
        store.insert("part_group_members", json!({"part_id": "P1", "group_id": "G1"})).await;
        store.insert("equipment_documents", json!({"equipment_id": "E1", "document_id": "D1"})).await;
        store.insert("equipment_documents", json!({"equipment_id": "E2", "document_id": "D1"})).await;
        store
    }

    #[tokio::test]
    async fn test_shared_counts_are_total_membership() {
        let counter = ReferenceCounter::new(store().await);
        let counts = counter.shared_resource_counts("G1").await;
        assert!(!counts.is_degraded());
        assert_eq!(counts.value, SharedCounts { documents: 2, parts: 1 });

        let empty = counter.shared_resource_counts("G9").await;
        assert_eq!(empty.value, SharedCounts::default());
    }

    #[tokio::test]
    async fn test_resource_references_collects_every_path() {
        let counter = ReferenceCounter::new(store().await);
        let ids = vec!["D1".to_string(), "D2".to_string(), "D3".to_string()];
        let refs = counter.resource_references(ResourceKind::Document, &ids).await.value;

        assert_eq!(refs["D1"].equipment.len(), 2);
        assert_eq!(refs["D1"].groups.len(), 1);
        assert_eq!(refs["D2"].groups.len(), 2);
        assert!(refs["D2"].equipment.is_empty());
        assert_eq!(refs["D3"].reference_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_reference_lookup_marks_unresolved() {
        let store = store().await;
        store.fail_on("equipment_documents", StoreOp::Select);
        let counter = ReferenceCounter::new(store);

        let refs = counter
            .resource_references(ResourceKind::Document, &["D2".to_string()])
            .await;
        assert!(refs.is_degraded());
        assert!(refs.value["D2"].unresolved);
        assert_eq!(refs.warnings[0].scope, WarningScope::References);
    }

    #[tokio::test]
    async fn test_partial_group_failure_keeps_other_kind() {
        let store = store().await;
        store.fail_on("part_group_members", StoreOp::Select);
        let counter = ReferenceCounter::new(store);

        let shared = counter.shared_resources("G1").await;
        assert_eq!(shared.value.documents.len(), 2);
        assert!(shared.value.parts.is_empty());
        assert_eq!(shared.warnings.len(), 1);
    }
}
