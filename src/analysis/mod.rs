pub mod aggregator;
pub mod coverage;
pub mod financials;

use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Available,
    Partial,
    Full,
    Overallocated,
}

impl Display for AllocationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Available => "available",
            Self::Partial => "partial",
            Self::Full => "full",
            Self::Overallocated => "overallocated",
        };
        write!(f, "{display}")
    }
}

/// The `getResourceUtilization` shape exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationReport {
    pub resource_id: String,
    pub resource_name: String,
    /// Restricts the sum to allocations active on this date when set;
    /// otherwise the lifetime sum over all allocations.
    pub as_of: Option<NaiveDate>,
    pub total_utilization: u32,
    pub status: AllocationStatus,
    pub over_allocated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastWeek {
    pub week_start: NaiveDate,
    pub utilization: u32,
    /// Raw availability; negative when the week is overbooked.
    pub available_hours: f64,
    pub over_threshold: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceForecast {
    pub resource_id: String,
    pub resource_name: String,
    pub weekly_capacity_hours: f64,
    pub weeks: Vec<ForecastWeek>,
}

/// Per-resource, per-week utilization/availability grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityForecast {
    pub start: NaiveDate,
    pub weeks: usize,
    pub resources: Vec<ResourceForecast>,
}
