use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::aggregator;
use crate::config::AllocationPolicy;
use crate::error::PlanError;
use crate::model::Allocation;
use crate::scenario::{overlay, AllocationChange, Scenario, ScenarioStatus};
use crate::store::PlanStore;

/// A resource that would exceed the over-allocation threshold if the
/// scenario were applied to current live data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionConflict {
    pub resource_id: String,
    pub resource_name: String,
    pub projected_utilization: u32,
    pub threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PromotionOutcome {
    Promoted { applied_changes: usize },
    /// Validation conflicts are data for the caller, not an error; the
    /// scenario stays a draft and can be edited and retried.
    Rejected { conflicts: Vec<PromotionConflict> },
}

/// Live mutations distilled from a scenario's change lists. Applied by
/// the store as a single atomic batch.
#[derive(Debug, Clone, Default)]
pub struct PromotionBatch {
    pub upserts: Vec<Allocation>,
    pub removals: Vec<String>,
    pub timeline_updates: Vec<TimelineUpdate>,
}

#[derive(Debug, Clone)]
pub struct TimelineUpdate {
    pub project_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PromotionBatch {
    pub fn len(&self) -> usize {
        self.upserts.len() + self.removals.len() + self.timeline_updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Two-phase promotion: re-validate against the current live dataset,
/// then apply everything in one transaction.
///
/// Scenario changes are authored against a potentially stale read of
/// live data, so the cached snapshot is ignored here; the overlay is
/// re-resolved from a fresh baseline and every touched resource is
/// re-checked. Conflicts are collected in full rather than aborting at
/// the first one.
pub fn promote_scenario(
    store: &mut PlanStore,
    scenario: &mut Scenario,
    policy: &AllocationPolicy,
) -> Result<PromotionOutcome> {
    if scenario.status == ScenarioStatus::Promoted {
        return Err(PlanError::ScenarioAlreadyPromoted(scenario.id.clone()).into());
    }

    let resources = store.list_resources()?;
    let projects = store.list_projects()?;
    let effective = overlay::resolve(&resources, &projects, scenario);

    let mut conflicts = Vec::new();
    if !policy.allow_overallocation {
        let threshold = policy.max_utilization_percentage;
        for resource_id in scenario.touched_resource_ids() {
            let Some(resource) = effective.resource(&resource_id) else {
                continue;
            };
            let projected = aggregator::total_utilization(resource, None);
            if projected > threshold {
                conflicts.push(PromotionConflict {
                    resource_id: resource.id.clone(),
                    resource_name: resource.name.clone(),
                    projected_utilization: projected,
                    threshold,
                });
            }
        }
    }
    if !conflicts.is_empty() {
        info!(
            scenario = %scenario.id,
            conflicts = conflicts.len(),
            "promotion rejected by over-allocation check"
        );
        return Ok(PromotionOutcome::Rejected { conflicts });
    }

    let batch = build_batch(scenario);
    store.apply_promotion(&batch)?;

    scenario.status = ScenarioStatus::Promoted;
    scenario.updated_at = Utc::now();
    store.save_scenario(scenario)?;
    info!(
        scenario = %scenario.id,
        applied = batch.len(),
        "scenario promoted into live data"
    );
    Ok(PromotionOutcome::Promoted {
        applied_changes: batch.len(),
    })
}

/// Folds the ordered change lists into one mutation per allocation id
/// and one timeline update per project, later entries winning.
fn build_batch(scenario: &Scenario) -> PromotionBatch {
    let mut batch = PromotionBatch::default();
    for change in &scenario.resource_changes {
        match &change.change {
            AllocationChange::Upsert(payload) => {
                let mut alloc = payload.clone();
                alloc.resource_id = change.resource_id.clone();
                batch.removals.retain(|id| *id != alloc.id);
                match batch.upserts.iter_mut().find(|existing| existing.id == alloc.id) {
                    Some(existing) => *existing = alloc,
                    None => batch.upserts.push(alloc),
                }
            }
            AllocationChange::Remove { allocation_id } => {
                batch.upserts.retain(|existing| existing.id != *allocation_id);
                if !batch.removals.contains(allocation_id) {
                    batch.removals.push(allocation_id.clone());
                }
            }
        }
    }
    for change in &scenario.timeline_changes {
        let update = TimelineUpdate {
            project_id: change.project_id.clone(),
            start_date: change.new_start,
            end_date: change.new_end,
        };
        match batch
            .timeline_updates
            .iter_mut()
            .find(|existing| existing.project_id == update.project_id)
        {
            Some(existing) => *existing = update,
            None => batch.timeline_updates.push(update),
        }
    }
    batch
}
