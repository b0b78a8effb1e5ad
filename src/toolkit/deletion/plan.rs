use std::collections::BTreeSet;

use tracing::{debug, info};
use uuid::Uuid;

use super::models::{
    DeletionPlan, DeletionSet, EntityKind, GroupCleanup, GroupId, ImpactReport, ResourceKind, WarningScope,
};
use crate::core::config::PurgeConfig;


#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder {
    block_on_degraded: bool,
    interventions_block_deletion: bool,
}

impl PlanBuilder {
    pub fn new(config: &PurgeConfig) -> Self {
        Self {
            block_on_degraded: config.block_on_degraded,
            interventions_block_deletion: config.interventions_block_deletion,
        }
    }


    pub fn build(&self, report: ImpactReport) -> DeletionPlan {
        let without_cascade = deletion_set(&report, false);
        let with_cascade = deletion_set(&report, true);
        let blockers = self.blockers(&report);
        let can_delete = blockers.is_empty();

        let plan = DeletionPlan {
            plan_id: Uuid::new_v4(),
            target: report.target,
            item_name: report.item_name,
            direct: report.direct,
            groups: report.groups,
            can_delete,
            reason: blockers.join(". "),
            warnings: report.warnings,
            analyzed_at: report.analyzed_at,
            without_cascade,
            with_cascade,
        };

        info!(
            "Plan {} for {}: can_delete={}, {} empty group(s), totals {:?} / with cascade {:?}",
            plan.plan_id,
            plan.target,
            plan.can_delete,
            plan.empty_groups().count(),
            plan.totals(false),
            plan.totals(true)
        );
        plan
    }

    fn blockers(&self, report: &ImpactReport) -> Vec<String> {
        let mut blockers = Vec::new();
        let degraded_direct = report.has_warning(WarningScope::Target) || report.has_warning(WarningScope::Direct);

        match report.target.kind {
            EntityKind::Equipment => {
                let interventions = report.direct.interventions;
                if self.interventions_block_deletion && interventions > 0 {
                    blockers.push(format!("Référencé par {} intervention(s)", interventions));
                }
                if self.block_on_degraded && degraded_direct {
                    blockers.push("Vérification des références incomplète".to_string());
                }
            }
            EntityKind::Document | EntityKind::Part => {
                let mut usages = Vec::new();
                let equipment = report.direct.equipment.len();
                if equipment > 0 {
                    usages.push(format!("{} équipement(s)", equipment));
                }
                let active_groups = report.groups.iter().filter(|g| g.remaining_equipment > 0).count();
                if active_groups > 0 {
                    usages.push(format!("{} groupe(s) actif(s)", active_groups));
                }
                if !usages.is_empty() {
                    blockers.push(format!("Utilisé par {}", usages.join(" et ")));
                }

                let degraded_groups = report.groups.iter().any(|g| g.count_degraded);
                if self.block_on_degraded && (degraded_direct || degraded_groups) {
                    blockers.push("Vérification des références incomplète".to_string());
                }
            }
        }

        if !blockers.is_empty() {
            debug!("{} blocked: {:?}", report.target, blockers);
        }
        blockers
    }
}

/// Reference-counted sweep: a candidate is removed once none of its
/// references survive the target and, with `cascade`, the emptied groups.
fn deletion_set(report: &ImpactReport, cascade: bool) -> DeletionSet {
    let removed_equipment = match report.target.kind {
        EntityKind::Equipment => Some(report.target.id.as_str()),
        EntityKind::Document | EntityKind::Part => None,
    };

    let cascaded: Vec<&GroupId> = if cascade {
        report.groups.iter().filter(|g| g.cascadable()).map(|g| &g.group_id).collect()
    } else {
        Vec::new()
    };
    let removed_groups: BTreeSet<GroupId> = cascaded.iter().map(|g| (*g).clone()).collect();

    let mut set = DeletionSet {
        groups: cascaded
            .iter()
            .map(|g| GroupCleanup {
                group_id: (*g).clone(),
                documents: Vec::new(),
                parts: Vec::new(),
            })
            .collect(),
        ..Default::default()
    };

    for kind in ResourceKind::ALL {
        for (id, refs) in report.refs(kind) {
            if refs.survives(removed_equipment, &removed_groups) {
                continue;
            }

            if report.direct.resources(kind).contains(id) {
                match kind {
                    ResourceKind::Document => set.direct_documents.push(id.clone()),
                    ResourceKind::Part => set.direct_parts.push(id.clone()),
                }
                continue;
            }

            let owner = report
                .groups
                .iter()
                .filter(|g| removed_groups.contains(&g.group_id))
                .find(|g| g.shared.ids(kind).contains(id))
                .and_then(|g| set.groups.iter_mut().find(|c| c.group_id == g.group_id));
            if let Some(cleanup) = owner {
                match kind {
                    ResourceKind::Document => cleanup.documents.push(id.clone()),
                    ResourceKind::Part => cleanup.parts.push(id.clone()),
                }
            }
        }
    }

    set
}
