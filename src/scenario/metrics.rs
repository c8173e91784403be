use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;

use crate::analysis::{aggregator, coverage, financials};
use crate::config::AllocationPolicy;
use crate::scenario::overlay::{self, EffectiveDataset};
use crate::scenario::{
    CostMetrics, CoverageMetrics, MetricsSnapshot, ResourceUtilization, Scenario,
    UtilizationMetrics,
};
use crate::store::PlanStore;

/// Runs the three calculators over an effective dataset. The same
/// arithmetic serves live dashboards and scenario simulations; only
/// the dataset differs.
pub fn dataset_metrics(dataset: &EffectiveDataset, policy: &AllocationPolicy) -> MetricsSnapshot {
    let threshold = policy.max_utilization_percentage;

    let mut by_resource = BTreeMap::new();
    let mut utilization_sum: u64 = 0;
    for resource in &dataset.resources {
        let total = aggregator::total_utilization(resource, None);
        utilization_sum += u64::from(total);
        by_resource.insert(
            resource.id.clone(),
            ResourceUtilization {
                resource_name: resource.name.clone(),
                total,
                status: aggregator::classify(total, threshold),
                over_allocated: total > threshold,
            },
        );
    }
    let overall_pct = if dataset.resources.is_empty() {
        0.0
    } else {
        utilization_sum as f64 / dataset.resources.len() as f64
    };

    let mut by_project = BTreeMap::new();
    let mut total_cost = 0.0;
    let mut total_billable = 0.0;
    for project in &dataset.projects {
        let rollup = financials::project_rollup(project, &dataset.resources, policy);
        total_cost += rollup.actual_cost;
        total_billable += rollup.billable;
        by_project.insert(project.id.clone(), rollup);
    }
    let total_profit = total_billable - total_cost;
    let margin_pct = if total_billable == 0.0 {
        0.0
    } else {
        total_profit / total_billable * 100.0
    };

    let mut coverage_by_project = BTreeMap::new();
    let mut covered_count = 0usize;
    let mut required_count = 0usize;
    let mut covered = Vec::new();
    let mut missing = Vec::new();
    for project in &dataset.projects {
        let assigned = coverage::assigned_resources(project, &dataset.resources);
        let report = coverage::project_coverage(project, &assigned);
        covered_count += report.covered.len();
        required_count += project.required_skills.len();
        for skill in &report.covered {
            if !covered.contains(skill) {
                covered.push(skill.clone());
            }
        }
        for skill in &report.missing {
            if !missing.contains(skill) {
                missing.push(skill.clone());
            }
        }
        coverage_by_project.insert(project.id.clone(), report);
    }
    let coverage_percentage = if required_count == 0 {
        100.0
    } else {
        covered_count as f64 / required_count as f64 * 100.0
    };

    MetricsSnapshot {
        utilization: UtilizationMetrics {
            overall_pct,
            by_resource,
        },
        costs: CostMetrics {
            total_cost,
            total_billable,
            total_profit,
            margin_pct,
            by_project,
        },
        skills_coverage: CoverageMetrics {
            coverage_percentage,
            covered,
            missing,
            by_project: coverage_by_project,
        },
        computed_at: Utc::now(),
    }
}

/// Metrics over the live dataset with no overlay applied.
pub fn live_metrics(store: &PlanStore, policy: &AllocationPolicy) -> Result<MetricsSnapshot> {
    let resources = store.list_resources()?;
    let projects = store.list_projects()?;
    let dataset = EffectiveDataset::from_live(&resources, &projects);
    Ok(dataset_metrics(&dataset, policy))
}

/// Resolves the scenario overlay against the current live baseline,
/// computes a fresh snapshot, caches it on the scenario tagged with
/// the scenario's revision, and persists the scenario.
///
/// The change list is read once from the in-memory scenario value, so
/// a concurrent edit cannot be observed mid-computation. Staleness is
/// surfaced via `Scenario::snapshot_is_stale`; nothing recomputes
/// implicitly on background writes.
pub fn calculate_metrics(
    store: &PlanStore,
    scenario: &mut Scenario,
    policy: &AllocationPolicy,
) -> Result<MetricsSnapshot> {
    let resources = store.list_resources()?;
    let projects = store.list_projects()?;
    let dataset = overlay::resolve(&resources, &projects, scenario);
    let snapshot = dataset_metrics(&dataset, policy);
    scenario.record_snapshot(snapshot.clone());
    store.save_scenario(scenario)?;
    Ok(snapshot)
}
