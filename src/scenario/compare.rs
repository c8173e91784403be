use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AllocationPolicy;
use crate::error::PlanError;
use crate::scenario::metrics;
use crate::scenario::{CostMetrics, CoverageMetrics, UtilizationMetrics};
use crate::store::PlanStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Utilization,
    Costs,
    Skills,
}

impl MetricCategory {
    pub const ALL: [MetricCategory; 3] = [
        MetricCategory::Utilization,
        MetricCategory::Costs,
        MetricCategory::Skills,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Utilization => "utilization",
            Self::Costs => "costs",
            Self::Skills => "skills",
        }
    }
}

impl Display for MetricCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown metric category: {0}")]
pub struct MetricCategoryParseError(pub String);

impl FromStr for MetricCategory {
    type Err = MetricCategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "utilization" | "util" => Ok(Self::Utilization),
            "costs" | "cost" | "financials" => Ok(Self::Costs),
            "skills" | "skills_coverage" | "coverage" => Ok(Self::Skills),
            _ => Err(MetricCategoryParseError(s.to_string())),
        }
    }
}

/// One scenario's metrics, restricted to the requested categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioColumn {
    pub scenario_id: String,
    pub scenario_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<UtilizationMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costs: Option<CostMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<CoverageMetrics>,
}

/// Side-by-side metrics for N scenarios, aligned by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub categories: Vec<MetricCategory>,
    pub scenarios: Vec<ScenarioColumn>,
}

/// Compares at least two scenarios. Snapshots are recomputed when
/// absent or stale, so columns always reflect each scenario's current
/// change list against current live data.
pub fn compare_scenarios(
    store: &PlanStore,
    scenario_ids: &[String],
    categories: &[MetricCategory],
    policy: &AllocationPolicy,
) -> Result<ScenarioComparison> {
    if scenario_ids.len() < 2 {
        return Err(PlanError::ComparisonTooSmall(scenario_ids.len()).into());
    }
    let categories: Vec<MetricCategory> = if categories.is_empty() {
        MetricCategory::ALL.to_vec()
    } else {
        let mut selected = Vec::new();
        for category in categories {
            if !selected.contains(category) {
                selected.push(*category);
            }
        }
        selected
    };

    let mut columns = Vec::with_capacity(scenario_ids.len());
    for id in scenario_ids {
        let mut scenario = store
            .load_scenario(id)?
            .ok_or_else(|| PlanError::UnknownScenario(id.clone()))?;
        let fresh = scenario.has_fresh_snapshot().then(|| scenario.snapshot.clone()).flatten();
        let snapshot = match fresh {
            Some(snapshot) => snapshot,
            None => metrics::calculate_metrics(store, &mut scenario, policy)?,
        };
        columns.push(ScenarioColumn {
            scenario_id: scenario.id.clone(),
            scenario_name: scenario.name.clone(),
            utilization: categories
                .contains(&MetricCategory::Utilization)
                .then(|| snapshot.utilization.clone()),
            costs: categories
                .contains(&MetricCategory::Costs)
                .then(|| snapshot.costs.clone()),
            skills: categories
                .contains(&MetricCategory::Skills)
                .then(|| snapshot.skills_coverage.clone()),
        });
    }

    Ok(ScenarioComparison {
        categories,
        scenarios: columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Allocation;
    use crate::scenario::{AllocationChange, ResourceChange, Scenario};
    use crate::timeline::DateRange;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn draft(id: &str, utilization: u32) -> Scenario {
        let mut scenario = Scenario::new(
            id,
            format!("Scenario {id}"),
            DateRange::new(date(2025, 1, 1), date(2025, 6, 30)).unwrap(),
        );
        scenario.upsert_resource_change(ResourceChange {
            resource_id: "res-1".to_string(),
            change: AllocationChange::Upsert(Allocation::new(
                format!("{id}-a1"),
                "res-1",
                "proj-1",
                date(2025, 1, 1),
                date(2025, 3, 31),
                utilization,
            )),
        });
        scenario
    }

    #[test]
    fn parses_category_slugs() {
        assert_eq!(
            "utilization".parse::<MetricCategory>().unwrap(),
            MetricCategory::Utilization
        );
        assert_eq!(
            "coverage".parse::<MetricCategory>().unwrap(),
            MetricCategory::Skills
        );
        assert!("velocity".parse::<MetricCategory>().is_err());
    }

    #[test]
    fn rejects_fewer_than_two_scenarios() {
        let store = PlanStore::open_in_memory().expect("store");
        let policy = AllocationPolicy::default();
        let result = compare_scenarios(&store, &["scn-1".to_string()], &[], &policy);
        assert!(result.is_err());
    }

    #[test]
    fn computes_missing_snapshots_and_aligns_categories() {
        let store = PlanStore::open_in_memory().expect("store");
        let policy = AllocationPolicy::default();
        store
            .upsert_resource(&crate::model::Resource::new("res-1", "Amara", "Developer"))
            .expect("seed resource");
        store.save_scenario(&draft("scn-1", 40)).expect("save");
        store.save_scenario(&draft("scn-2", 90)).expect("save");

        let comparison = compare_scenarios(
            &store,
            &["scn-1".to_string(), "scn-2".to_string()],
            &[MetricCategory::Utilization],
            &policy,
        )
        .expect("comparison");

        assert_eq!(comparison.scenarios.len(), 2);
        let first = &comparison.scenarios[0];
        assert!(first.utilization.is_some());
        assert!(first.costs.is_none());
        assert_eq!(
            first.utilization.as_ref().unwrap().by_resource["res-1"].total,
            40
        );
        assert_eq!(
            comparison.scenarios[1].utilization.as_ref().unwrap().by_resource["res-1"].total,
            90
        );
    }

    #[test]
    fn unknown_scenario_id_is_an_input_error() {
        let store = PlanStore::open_in_memory().expect("store");
        let policy = AllocationPolicy::default();
        let result = compare_scenarios(
            &store,
            &["missing-1".to_string(), "missing-2".to_string()],
            &[],
            &policy,
        );
        assert!(result.is_err());
    }
}
