use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::db::schema;


pub type GroupId = String;


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, IntoStaticStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EntityKind {
    Equipment,
    Document,
    Part,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Equipment => schema::EQUIPMENTS,
            Self::Document => schema::DOCUMENTS,
            Self::Part => schema::PARTS,
        }
    }

    pub fn group_membership_table(self) -> &'static str {
        match self {
            Self::Equipment => schema::EQUIPMENT_GROUP_MEMBERS,
            Self::Document => schema::DOCUMENT_GROUP_MEMBERS,
            Self::Part => schema::PART_GROUP_MEMBERS,
        }
    }

    /// Column naming this kind in junction tables.
    pub fn member_column(self) -> &'static str {
        match self {
            Self::Equipment => schema::EQUIPMENT_ID,
            Self::Document => schema::DOCUMENT_ID,
            Self::Part => schema::PART_ID,
        }
    }

    pub fn as_resource(self) -> Option<ResourceKind> {
        match self {
            Self::Equipment => None,
            Self::Document => Some(ResourceKind::Document),
            Self::Part => Some(ResourceKind::Part),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Equipment => "équipement",
            Self::Document => "document",
            Self::Part => "pièce",
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Document,
    Part,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Document, ResourceKind::Part];

    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Document => EntityKind::Document,
            Self::Part => EntityKind::Part,
        }
    }

    /// Junction table linking this resource straight to equipment.
    pub fn link_table(self) -> &'static str {
        match self {
            Self::Document => schema::EQUIPMENT_DOCUMENTS,
            Self::Part => schema::EQUIPMENT_PARTS,
        }
    }

    pub fn table(self) -> &'static str {
        self.entity_kind().table()
    }

    pub fn group_membership_table(self) -> &'static str {
        self.entity_kind().group_membership_table()
    }

    pub fn member_column(self) -> &'static str {
        self.entity_kind().member_column()
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub kind: EntityKind,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self { id: id.into(), kind }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningScope {
    Target,
    Direct,
    Group,
    References,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    pub scope: WarningScope,
    pub lookup: String,
    pub error: String,
}

impl AnalysisWarning {
    pub fn new(scope: WarningScope, lookup: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            scope,
            lookup: lookup.into(),
            error: error.to_string(),
        }
    }
}


/// A lookup result that may have degraded to its fallback value.
#[derive(Debug, Clone)]
pub struct Lookup<T> {
    pub value: T,
    pub warnings: Vec<AnalysisWarning>,
}

impl<T> Lookup<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn degraded(value: T, warning: AnalysisWarning) -> Self {
        Self {
            value,
            warnings: vec![warning],
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        Lookup {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    /// Moves the warnings into `sink` and returns the value.
    pub fn collect_into(self, sink: &mut Vec<AnalysisWarning>) -> T {
        sink.extend(self.warnings);
        self.value
    }
}


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedCounts {
    pub documents: usize,
    pub parts: usize,
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedResources {
    pub documents: Vec<String>,
    pub parts: Vec<String>,
}

impl SharedResources {
    pub fn counts(&self) -> SharedCounts {
        SharedCounts {
            documents: self.documents.len(),
            parts: self.parts.len(),
        }
    }

    pub fn ids(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::Document => &self.documents,
            ResourceKind::Part => &self.parts,
        }
    }
}


/// Every path by which a document or part stays visible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRefs {
    pub equipment: BTreeSet<String>,
    pub groups: BTreeSet<GroupId>,
    /// A reference lookup failed; the resource is treated as still in use.
    pub unresolved: bool,
}

impl ResourceRefs {
    pub fn reference_count(&self) -> usize {
        self.equipment.len() + self.groups.len()
    }

    pub fn surviving_count(&self, removed_equipment: Option<&str>, removed_groups: &BTreeSet<GroupId>) -> usize {
        let equipment = self
            .equipment
            .iter()
            .filter(|id| Some(id.as_str()) != removed_equipment)
            .count();
        let groups = self.groups.difference(removed_groups).count();
        equipment + groups
    }

    pub fn survives(&self, removed_equipment: Option<&str>, removed_groups: &BTreeSet<GroupId>) -> bool {
        self.unresolved || self.surviving_count(removed_equipment, removed_groups) > 0
    }
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectReferences {
    pub documents: Vec<String>,
    pub parts: Vec<String>,
    pub interventions: usize,
    pub has_image: bool,
    /// Equipment linked to a document or part target.
    pub equipment: Vec<String>,
}

impl DirectReferences {
    pub fn resources(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::Document => &self.documents,
            ResourceKind::Part => &self.parts,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupImpact {
    pub group_id: GroupId,
    pub group_name: String,
    pub remaining_equipment: usize,
    pub shared: SharedResources,
    pub will_become_empty: bool,
    /// The remaining-member count fell back to zero after a failed lookup.
    pub count_degraded: bool,
    /// The shared Document/Part listing is incomplete.
    #[serde(default)]
    pub shared_degraded: bool,
}

impl GroupImpact {
    pub fn shared_counts(&self) -> SharedCounts {
        self.shared.counts()
    }

    pub fn cascadable(&self) -> bool {
        self.will_become_empty && !self.count_degraded && !self.shared_degraded
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub target: EntityRef,
    pub item_name: String,
    pub direct: DirectReferences,
    pub groups: Vec<GroupImpact>,
    pub document_refs: BTreeMap<String, ResourceRefs>,
    pub part_refs: BTreeMap<String, ResourceRefs>,
    pub warnings: Vec<AnalysisWarning>,
    pub analyzed_at: DateTime<Utc>,
}

impl ImpactReport {
    pub fn refs(&self, kind: ResourceKind) -> &BTreeMap<String, ResourceRefs> {
        match kind {
            ResourceKind::Document => &self.document_refs,
            ResourceKind::Part => &self.part_refs,
        }
    }

    pub fn has_warning(&self, scope: WarningScope) -> bool {
        self.warnings.iter().any(|w| w.scope == scope)
    }
}


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTotals {
    pub documents: usize,
    pub parts: usize,
    pub interventions: usize,
    pub groups: usize,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCleanup {
    pub group_id: GroupId,
    pub documents: Vec<String>,
    pub parts: Vec<String>,
}


/// Exact ids a deletion removes for one cascade choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSet {
    pub direct_documents: Vec<String>,
    pub direct_parts: Vec<String>,
    pub groups: Vec<GroupCleanup>,
}

impl DeletionSet {
    pub fn document_count(&self) -> usize {
        self.direct_documents.len() + self.groups.iter().map(|g| g.documents.len()).sum::<usize>()
    }

    pub fn part_count(&self) -> usize {
        self.direct_parts.len() + self.groups.iter().map(|g| g.parts.len()).sum::<usize>()
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionPlan {
    pub plan_id: Uuid,
    pub target: EntityRef,
    pub item_name: String,
    pub direct: DirectReferences,
    pub groups: Vec<GroupImpact>,
    pub can_delete: bool,
    pub reason: String,
    pub warnings: Vec<AnalysisWarning>,
    pub analyzed_at: DateTime<Utc>,
    pub(crate) without_cascade: DeletionSet,
    pub(crate) with_cascade: DeletionSet,
}

impl DeletionPlan {
    /// Dependents shown to the operator: every direct Document/Part, plus
    /// with cascade the resources only the emptied groups kept alive.
    pub fn totals(&self, cascade_empty_groups: bool) -> PlanTotals {
        let set = self.deletion_set(cascade_empty_groups);
        PlanTotals {
            documents: self.direct.documents.len() + set.groups.iter().map(|g| g.documents.len()).sum::<usize>(),
            parts: self.direct.parts.len() + set.groups.iter().map(|g| g.parts.len()).sum::<usize>(),
            interventions: self.direct.interventions,
            groups: set.groups.len(),
        }
    }

    /// Rows the executor will actually remove; a direct dependent still
    /// referenced elsewhere is counted in `totals` but not here.
    pub fn to_delete(&self, cascade_empty_groups: bool) -> PlanTotals {
        let set = self.deletion_set(cascade_empty_groups);
        PlanTotals {
            documents: set.document_count(),
            parts: set.part_count(),
            interventions: 0,
            groups: set.groups.len(),
        }
    }

    pub fn deletion_set(&self, cascade_empty_groups: bool) -> &DeletionSet {
        if cascade_empty_groups {
            &self.with_cascade
        } else {
            &self.without_cascade
        }
    }

    pub fn empty_groups(&self) -> impl Iterator<Item = &GroupImpact> {
        self.groups.iter().filter(|g| g.will_become_empty)
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Same store state produces the same impact; ids and timestamps aside.
    pub fn same_impact(&self, other: &DeletionPlan) -> bool {
        self.target == other.target
            && self.direct == other.direct
            && self.groups == other.groups
            && self.can_delete == other.can_delete
            && self.with_cascade == other.with_cascade
            && self.without_cascade == other.without_cascade
    }

    /// The plan as the deletion dialog renders it for one cascade choice.
    pub fn view(&self, cascade_empty_groups: bool) -> PlanView<'_> {
        PlanView {
            plan_id: self.plan_id,
            target: &self.target,
            item_name: &self.item_name,
            direct: &self.direct,
            groups: self
                .groups
                .iter()
                .map(|g| {
                    let shared = g.shared_counts();
                    GroupView {
                        group_id: &g.group_id,
                        group_name: &g.group_name,
                        remaining_equipment: g.remaining_equipment,
                        shared_documents: shared.documents,
                        shared_parts: shared.parts,
                        will_become_empty: g.will_become_empty,
                    }
                })
                .collect(),
            cascade_empty_groups,
            totals: self.totals(cascade_empty_groups),
            to_delete: self.to_delete(cascade_empty_groups),
            can_delete: self.can_delete,
            reason: &self.reason,
            warnings: &self.warnings,
        }
    }
}


#[derive(Debug, Clone, Serialize)]
pub struct GroupView<'a> {
    pub group_id: &'a str,
    pub group_name: &'a str,
    pub remaining_equipment: usize,
    pub shared_documents: usize,
    pub shared_parts: usize,
    pub will_become_empty: bool,
}


#[derive(Debug, Clone, Serialize)]
pub struct PlanView<'a> {
    pub plan_id: Uuid,
    pub target: &'a EntityRef,
    pub item_name: &'a str,
    pub direct: &'a DirectReferences,
    pub groups: Vec<GroupView<'a>>,
    pub cascade_empty_groups: bool,
    pub totals: PlanTotals,
    pub to_delete: PlanTotals,
    pub can_delete: bool,
    pub reason: &'a str,
    pub warnings: &'a [AnalysisWarning],
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Failed,
    RolledBack,
}


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedCounts {
    pub memberships: usize,
    pub links: usize,
    pub documents: usize,
    pub parts: usize,
    pub groups: usize,
    pub target: usize,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: String,
    pub table: String,
    pub error: String,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan_id: Uuid,
    pub target: EntityRef,
    pub cascade_empty_groups: bool,
    pub status: ExecutionStatus,
    pub deleted: DeletedCounts,
    pub errors: Vec<StepFailure>,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub restored_rows: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    /// Some deletes landed and were not undone.
    pub fn is_partial(&self) -> bool {
        self.status == ExecutionStatus::Failed && self.completed_steps > 0
    }
}
