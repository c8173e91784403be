use chrono::NaiveDate;
use thiserror::Error;

/// Domain errors surfaced to callers. Promotion conflicts and stale
/// snapshots are reported as values, not through this type.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("allocation {id}: end date {end} is before start date {start}")]
    InvalidAllocationDates {
        id: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("allocation {id}: utilization {utilization}% outside 1..={max}%")]
    UtilizationOutOfBounds {
        id: String,
        utilization: u32,
        max: u32,
    },
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    #[error("unknown project: {0}")]
    UnknownProject(String),
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("scenario {0} is already promoted")]
    ScenarioAlreadyPromoted(String),
    #[error("comparison requires at least two scenarios, got {0}")]
    ComparisonTooSmall(usize),
}
