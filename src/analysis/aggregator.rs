use chrono::NaiveDate;

use crate::analysis::{
    AllocationStatus, CapacityForecast, ForecastWeek, ResourceForecast, UtilizationReport,
};
use crate::config::AllocationPolicy;
use crate::model::Resource;
use crate::timeline::week_starts;

/// Sum of utilization percentages over the resource's allocation set.
///
/// With no date this is the lifetime sum over every allocation on
/// record, not just currently active ones. With a date, only
/// allocations whose inclusive range contains it count.
pub fn total_utilization(resource: &Resource, as_of: Option<NaiveDate>) -> u32 {
    resource
        .effective_allocations()
        .iter()
        .filter(|alloc| as_of.map_or(true, |date| alloc.is_active_on(date)))
        .map(|alloc| alloc.utilization)
        .sum()
}

pub fn is_over_allocated(resource: &Resource, threshold: u32) -> bool {
    total_utilization(resource, None) > threshold
}

pub fn classify(total_utilization: u32, threshold: u32) -> AllocationStatus {
    if total_utilization == 0 {
        AllocationStatus::Available
    } else if total_utilization > threshold {
        AllocationStatus::Overallocated
    } else if total_utilization == threshold {
        AllocationStatus::Full
    } else {
        AllocationStatus::Partial
    }
}

/// Free hours in the week starting at `week_start`. Negative values
/// are meaningful overbooking signals and are preserved; clamp only
/// for display via `display_availability`.
pub fn availability_hours(
    resource: &Resource,
    week_start: NaiveDate,
    capacity_hours_per_week: f64,
) -> f64 {
    let utilization = total_utilization(resource, Some(week_start));
    capacity_hours_per_week * (1.0 - f64::from(utilization) / 100.0)
}

pub fn display_availability(hours: f64) -> f64 {
    hours.max(0.0)
}

pub fn utilization_report(
    resource: &Resource,
    as_of: Option<NaiveDate>,
    policy: &AllocationPolicy,
) -> UtilizationReport {
    let total = total_utilization(resource, as_of);
    UtilizationReport {
        resource_id: resource.id.clone(),
        resource_name: resource.name.clone(),
        as_of,
        total_utilization: total,
        status: classify(total, policy.max_utilization_percentage),
        over_allocated: total > policy.max_utilization_percentage,
    }
}

/// Per-resource, per-week grid for the coming `weeks` weeks, bucketed
/// to Monday week starts.
pub fn capacity_forecast(
    resources: &[Resource],
    start: NaiveDate,
    weeks: usize,
    policy: &AllocationPolicy,
) -> CapacityForecast {
    let buckets = week_starts(start, weeks);
    let forecasts = resources
        .iter()
        .map(|resource| {
            let capacity = resource
                .weekly_capacity_hours
                .unwrap_or(policy.default_weekly_capacity_hours);
            let weeks = buckets
                .iter()
                .map(|&week_start| {
                    let utilization = total_utilization(resource, Some(week_start));
                    ForecastWeek {
                        week_start,
                        utilization,
                        available_hours: availability_hours(resource, week_start, capacity),
                        over_threshold: utilization > policy.max_utilization_percentage,
                    }
                })
                .collect();
            ResourceForecast {
                resource_id: resource.id.clone(),
                resource_name: resource.name.clone(),
                weekly_capacity_hours: capacity,
                weeks,
            }
        })
        .collect();
    CapacityForecast {
        start,
        weeks,
        resources: forecasts,
    }
}
