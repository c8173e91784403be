pub mod compare;
pub mod metrics;
pub mod overlay;
pub mod promotion;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::coverage::CoverageReport;
use crate::analysis::financials::ProjectFinancials;
use crate::analysis::AllocationStatus;
use crate::model::Allocation;
use crate::timeline::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Draft,
    /// Terminal. A promoted scenario's changes are never promotable
    /// again.
    Promoted,
}

impl Display for ScenarioStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Draft => "draft",
            Self::Promoted => "promoted",
        };
        write!(f, "{display}")
    }
}

/// One hypothetical allocation edit. An upsert fully replaces any live
/// allocation with the same id for metrics purposes; a removal drops
/// it from the effective set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationChange {
    Upsert(Allocation),
    Remove { allocation_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub resource_id: String,
    pub change: AllocationChange,
}

impl ResourceChange {
    pub fn allocation_id(&self) -> &str {
        match &self.change {
            AllocationChange::Upsert(alloc) => &alloc.id,
            AllocationChange::Remove { allocation_id } => allocation_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTimelineChange {
    pub project_id: String,
    /// Live dates captured when the change was recorded, kept for
    /// diffing and display.
    pub original_start: NaiveDate,
    pub original_end: NaiveDate,
    pub new_start: NaiveDate,
    pub new_end: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUtilization {
    pub resource_name: String,
    pub total: u32,
    pub status: AllocationStatus,
    pub over_allocated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationMetrics {
    /// Mean of per-resource lifetime totals.
    pub overall_pct: f64,
    pub by_resource: BTreeMap<String, ResourceUtilization>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostMetrics {
    pub total_cost: f64,
    pub total_billable: f64,
    pub total_profit: f64,
    pub margin_pct: f64,
    pub by_project: BTreeMap<String, ProjectFinancials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub coverage_percentage: f64,
    pub covered: Vec<String>,
    pub missing: Vec<String>,
    pub by_project: BTreeMap<String, CoverageReport>,
}

/// Derived figures for one effective dataset. Immutable once computed;
/// superseded, never mutated, when the scenario's changes are edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub utilization: UtilizationMetrics,
    pub costs: CostMetrics,
    pub skills_coverage: CoverageMetrics,
    pub computed_at: DateTime<Utc>,
}

/// A named, non-destructive overlay of hypothetical changes on top of
/// live data. Stores deltas only, never a copy of the live dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub base_scenario_id: Option<String>,
    pub window: DateRange,
    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,
    #[serde(default)]
    pub timeline_changes: Vec<ProjectTimelineChange>,
    pub status: ScenarioStatus,
    /// Bumped on every change-list edit; snapshots are tagged with the
    /// revision they were computed from.
    pub revision: u64,
    #[serde(default)]
    pub snapshot: Option<MetricsSnapshot>,
    #[serde(default)]
    pub snapshot_revision: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scenario {
    pub fn new(id: impl Into<String>, name: impl Into<String>, window: DateRange) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            base_scenario_id: None,
            window,
            resource_changes: Vec::new(),
            timeline_changes: Vec::new(),
            status: ScenarioStatus::Draft,
            revision: 0,
            snapshot: None,
            snapshot_revision: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Clone of `base` under a new identity. The change lists are
    /// copied, so the clone's effective dataset equals the base's
    /// until it records its own changes. The cached snapshot is not
    /// carried over.
    pub fn clone_from(base: &Scenario, id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            base_scenario_id: Some(base.id.clone()),
            window: base.window,
            resource_changes: base.resource_changes.clone(),
            timeline_changes: base.timeline_changes.clone(),
            status: ScenarioStatus::Draft,
            revision: 0,
            snapshot: None,
            snapshot_revision: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the existing change for the same allocation id, or
    /// appends. Later changes to the same id win during resolution.
    pub fn upsert_resource_change(&mut self, change: ResourceChange) {
        match self
            .resource_changes
            .iter_mut()
            .find(|existing| existing.allocation_id() == change.allocation_id())
        {
            Some(existing) => *existing = change,
            None => self.resource_changes.push(change),
        }
        self.touch();
    }

    /// Replaces the existing timeline change for the same project, or
    /// appends.
    pub fn upsert_timeline_change(&mut self, change: ProjectTimelineChange) {
        match self
            .timeline_changes
            .iter_mut()
            .find(|existing| existing.project_id == change.project_id)
        {
            Some(existing) => *existing = change,
            None => self.timeline_changes.push(change),
        }
        self.touch();
    }

    /// Unique ids of resources referenced by the change list.
    pub fn touched_resource_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for change in &self.resource_changes {
            if !out.contains(&change.resource_id) {
                out.push(change.resource_id.clone());
            }
        }
        out
    }

    pub fn has_fresh_snapshot(&self) -> bool {
        self.snapshot.is_some() && self.snapshot_revision == Some(self.revision)
    }

    /// The StaleSnapshotWarning flag: a cached snapshot computed from
    /// an older change list. Callers must recalculate explicitly.
    pub fn snapshot_is_stale(&self) -> bool {
        self.snapshot.is_some() && self.snapshot_revision != Some(self.revision)
    }

    pub fn record_snapshot(&mut self, snapshot: MetricsSnapshot) {
        self.snapshot = Some(snapshot);
        self.snapshot_revision = Some(self.revision);
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }
}

/// Listing row for scenario inventories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub status: ScenarioStatus,
    pub revision: u64,
    pub change_count: usize,
    pub snapshot_stale: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<&Scenario> for ScenarioSummary {
    fn from(scenario: &Scenario) -> Self {
        Self {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            status: scenario.status,
            revision: scenario.revision,
            change_count: scenario.resource_changes.len() + scenario.timeline_changes.len(),
            snapshot_stale: scenario.snapshot_is_stale(),
            updated_at: scenario.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn window() -> DateRange {
        DateRange::new(date(2025, 1, 1), date(2025, 6, 30)).unwrap()
    }

    fn upsert(resource_id: &str, allocation_id: &str, utilization: u32) -> ResourceChange {
        ResourceChange {
            resource_id: resource_id.to_string(),
            change: AllocationChange::Upsert(Allocation::new(
                allocation_id,
                resource_id,
                "proj-1",
                date(2025, 1, 1),
                date(2025, 3, 31),
                utilization,
            )),
        }
    }

    #[test]
    fn change_edits_bump_revision_and_stale_snapshots() {
        let mut scenario = Scenario::new("scn-1", "Q1 plan", window());
        assert_eq!(scenario.revision, 0);
        assert!(!scenario.snapshot_is_stale());

        scenario.upsert_resource_change(upsert("res-1", "a1", 60));
        assert_eq!(scenario.revision, 1);

        scenario.record_snapshot(MetricsSnapshot {
            utilization: UtilizationMetrics {
                overall_pct: 0.0,
                by_resource: BTreeMap::new(),
            },
            costs: CostMetrics {
                total_cost: 0.0,
                total_billable: 0.0,
                total_profit: 0.0,
                margin_pct: 0.0,
                by_project: BTreeMap::new(),
            },
            skills_coverage: CoverageMetrics {
                coverage_percentage: 100.0,
                covered: Vec::new(),
                missing: Vec::new(),
                by_project: BTreeMap::new(),
            },
            computed_at: Utc::now(),
        });
        assert!(scenario.has_fresh_snapshot());

        scenario.upsert_resource_change(upsert("res-1", "a2", 40));
        assert!(scenario.snapshot_is_stale());
        assert!(!scenario.has_fresh_snapshot());
    }

    #[test]
    fn upserting_same_allocation_id_replaces_in_place() {
        let mut scenario = Scenario::new("scn-1", "Q1 plan", window());
        scenario.upsert_resource_change(upsert("res-1", "a1", 60));
        scenario.upsert_resource_change(upsert("res-1", "a1", 80));

        assert_eq!(scenario.resource_changes.len(), 1);
        match &scenario.resource_changes[0].change {
            AllocationChange::Upsert(alloc) => assert_eq!(alloc.utilization, 80),
            AllocationChange::Remove { .. } => panic!("expected upsert"),
        }
    }

    #[test]
    fn removal_marker_replaces_upsert_for_same_id() {
        let mut scenario = Scenario::new("scn-1", "Q1 plan", window());
        scenario.upsert_resource_change(upsert("res-1", "a1", 60));
        scenario.upsert_resource_change(ResourceChange {
            resource_id: "res-1".to_string(),
            change: AllocationChange::Remove {
                allocation_id: "a1".to_string(),
            },
        });

        assert_eq!(scenario.resource_changes.len(), 1);
        assert!(matches!(
            scenario.resource_changes[0].change,
            AllocationChange::Remove { .. }
        ));
    }

    #[test]
    fn clone_copies_changes_but_not_snapshot() {
        let mut base = Scenario::new("scn-1", "Q1 plan", window());
        base.upsert_resource_change(upsert("res-1", "a1", 60));
        base.record_snapshot(MetricsSnapshot {
            utilization: UtilizationMetrics {
                overall_pct: 60.0,
                by_resource: BTreeMap::new(),
            },
            costs: CostMetrics {
                total_cost: 0.0,
                total_billable: 0.0,
                total_profit: 0.0,
                margin_pct: 0.0,
                by_project: BTreeMap::new(),
            },
            skills_coverage: CoverageMetrics {
                coverage_percentage: 100.0,
                covered: Vec::new(),
                missing: Vec::new(),
                by_project: BTreeMap::new(),
            },
            computed_at: Utc::now(),
        });

        let clone = Scenario::clone_from(&base, "scn-2", "Q1 plan v2");
        assert_eq!(clone.base_scenario_id.as_deref(), Some("scn-1"));
        assert_eq!(clone.resource_changes, base.resource_changes);
        assert!(clone.snapshot.is_none());
        assert_eq!(clone.status, ScenarioStatus::Draft);
    }

    #[test]
    fn touched_resources_deduplicate() {
        let mut scenario = Scenario::new("scn-1", "Q1 plan", window());
        scenario.upsert_resource_change(upsert("res-1", "a1", 60));
        scenario.upsert_resource_change(upsert("res-1", "a2", 20));
        scenario.upsert_resource_change(upsert("res-2", "a3", 40));

        assert_eq!(scenario.touched_resource_ids(), vec!["res-1", "res-2"]);
    }
}
