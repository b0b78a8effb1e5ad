use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::associations::{AssociationIndex, distinct_column};
use super::models::{
    AnalysisWarning, DirectReferences, EntityRef, GroupImpact, ImpactReport, Lookup, ResourceKind,
    WarningScope,
};
use super::references::ReferenceCounter;
use crate::core::error::{PurgeError, Result};
use crate::db::{DataStore, Predicate, Row, schema};


pub struct ImpactAnalyzer {
    store: Arc<dyn DataStore>,
    index: AssociationIndex,
    counter: ReferenceCounter,
    concurrent: bool,
}

impl ImpactAnalyzer {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            index: AssociationIndex::new(Arc::clone(&store)),
            counter: ReferenceCounter::new(Arc::clone(&store)),
            store,
            concurrent: true,
        }
    }

    /// Resolve groups one after the other instead of all at once.
    pub fn sequential(mut self) -> Self {
        self.concurrent = false;
        self
    }


    pub async fn analyze(&self, target: &EntityRef) -> Result<ImpactReport> {
        info!("Analyzing deletion impact of {}", target);
        let mut warnings = Vec::new();

        let row = self.load_target(target).await?.collect_into(&mut warnings);
        let item_name = row
            .as_ref()
            .and_then(|r| r.get(schema::NAME))
            .and_then(|v| v.as_str())
            .unwrap_or(&target.id)
            .to_string();

        let mut direct = match target.kind.as_resource() {
            None => {
                let (documents, parts, interventions) = futures::join!(
                    self.linked_ids(ResourceKind::Document.link_table(), schema::EQUIPMENT_ID, &target.id, schema::DOCUMENT_ID),
                    self.linked_ids(ResourceKind::Part.link_table(), schema::EQUIPMENT_ID, &target.id, schema::PART_ID),
                    self.intervention_count(&target.id),
                );
                DirectReferences {
                    documents: documents.collect_into(&mut warnings),
                    parts: parts.collect_into(&mut warnings),
                    interventions: interventions.collect_into(&mut warnings),
                    ..Default::default()
                }
            }
            Some(kind) => {
                let equipment = self
                    .linked_ids(kind.link_table(), kind.member_column(), &target.id, schema::EQUIPMENT_ID)
                    .await;
                DirectReferences {
                    equipment: equipment.collect_into(&mut warnings),
                    ..Default::default()
                }
            }
        };
        direct.has_image = row.as_ref().is_some_and(has_image);

        let group_ids = self.index.groups_for(target).await.collect_into(&mut warnings);
        let groups = self.group_impacts(target, &group_ids, &mut warnings).await;

        let (document_refs, part_refs) = {
            let documents = candidates(ResourceKind::Document, target, &direct, &groups);
            let parts = candidates(ResourceKind::Part, target, &direct, &groups);
            let (documents, parts) = futures::join!(
                self.counter.resource_references(ResourceKind::Document, &documents),
                self.counter.resource_references(ResourceKind::Part, &parts),
            );
            (documents.collect_into(&mut warnings), parts.collect_into(&mut warnings))
        };

        if !warnings.is_empty() {
            warn!("Analysis of {} degraded: {} lookup(s) fell back to zero", target, warnings.len());
        }
        info!(
            "Impact of {}: {} direct document(s), {} direct part(s), {} intervention(s), {} group(s)",
            target,
            direct.documents.len(),
            direct.parts.len(),
            direct.interventions,
            groups.len()
        );

        Ok(ImpactReport {
            target: target.clone(),
            item_name,
            direct,
            groups,
            document_refs,
            part_refs,
            warnings,
            analyzed_at: Utc::now(),
        })
    }

    /// `Ok(None)` inside the lookup means the row could not be read, not
    /// that it is missing; a missing row is `NotFound`.
    async fn load_target(&self, target: &EntityRef) -> Result<Lookup<Option<Row>>> {
        match self.store.select_where(target.kind.table(), &Predicate::eq(schema::ID, target.id.as_str())).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => Ok(Lookup::ok(Some(row))),
                None => Err(PurgeError::NotFound(target.clone())),
            },
            Err(e) => {
                warn!("Could not load {}: {}", target, e);
                Ok(Lookup::degraded(
                    None,
                    AnalysisWarning::new(WarningScope::Target, format!("row of {}", target), e),
                ))
            }
        }
    }

    async fn linked_ids(&self, table: &str, by_column: &str, id: &str, wanted: &str) -> Lookup<Vec<String>> {
        match self.store.select_where(table, &Predicate::eq(by_column, id)).await {
            Ok(rows) => Lookup::ok(distinct_column(&rows, wanted)),
            Err(e) => {
                warn!("Could not list {} linked to {}: {}", table, id, e);
                Lookup::degraded(
                    Vec::new(),
                    AnalysisWarning::new(WarningScope::Direct, format!("{} of {}", table, id), e),
                )
            }
        }
    }

    async fn intervention_count(&self, equipment_id: &str) -> Lookup<usize> {
        match self
            .store
            .count(schema::INTERVENTIONS, &Predicate::eq(schema::EQUIPMENT_ID, equipment_id))
            .await
        {
            Ok(count) => Lookup::ok(count),
            Err(e) => {
                warn!("Could not count interventions of {}: {}", equipment_id, e);
                Lookup::degraded(
                    0,
                    AnalysisWarning::new(WarningScope::Direct, format!("interventions of {}", equipment_id), e),
                )
            }
        }
    }

    async fn group_impacts(
        &self,
        target: &EntityRef,
        group_ids: &[String],
        warnings: &mut Vec<AnalysisWarning>,
    ) -> Vec<GroupImpact> {
        let lookups = if self.concurrent {
            join_all(group_ids.iter().map(|g| self.group_impact(target, g))).await
        } else {
            let mut out = Vec::with_capacity(group_ids.len());
            for g in group_ids {
                out.push(self.group_impact(target, g).await);
            }
            out
        };

        lookups.into_iter().map(|l| l.collect_into(warnings)).collect()
    }

    async fn group_impact(&self, target: &EntityRef, group_id: &str) -> Lookup<GroupImpact> {
        let (name, remaining, shared) = futures::join!(
            self.index.group_name(group_id),
            self.index.remaining_members(group_id, &target.id),
            self.counter.shared_resources(group_id),
        );

        let count_degraded = remaining.is_degraded();
        let shared_degraded = shared.is_degraded();
        let mut warnings = Vec::new();
        let impact = GroupImpact {
            group_id: group_id.to_string(),
            group_name: name.collect_into(&mut warnings),
            remaining_equipment: remaining.value,
            will_become_empty: remaining.value == 0,
            shared: shared.collect_into(&mut warnings),
            count_degraded,
            shared_degraded,
        };
        warnings.extend(remaining.warnings);

        debug!(
            "Group {} after removing {}: {} equipment left, empty={}",
            group_id, target, impact.remaining_equipment, impact.will_become_empty
        );
        Lookup { value: impact, warnings }
    }
}

/// Resources whose references the deletion might remove: the direct ones
/// and those shared through groups that lose their last equipment.
fn candidates(kind: ResourceKind, target: &EntityRef, direct: &DirectReferences, groups: &[GroupImpact]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let from_groups = groups.iter().filter(|g| g.will_become_empty).flat_map(|g| g.shared.ids(kind));

    for id in direct.resources(kind).iter().chain(from_groups) {
        let is_target = target.kind.as_resource() == Some(kind) && *id == target.id;
        if !is_target && !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}

fn has_image(row: &Row) -> bool {
    row.get(schema::IMAGE_URL)
        .and_then(|v| v.as_str())
        .is_some_and(|url| !url.is_empty())
}
