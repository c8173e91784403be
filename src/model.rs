use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::AllocationPolicy;
use crate::error::PlanError;
use crate::timeline::DateRange;

/// A time-bounded, percentage-valued commitment of one resource to one
/// project. Overlapping allocations on the same resource are expected;
/// the overlap is what produces over-allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub resource_id: String,
    pub project_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Integer percent of the resource's capacity.
    pub utilization: u32,
    /// Overrides the resource's hourly rate when set.
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    /// Overrides the resource's billable rate when set.
    #[serde(default)]
    pub billable_rate: Option<f64>,
    /// Fixed hours estimate. When absent, hours are derived from the
    /// date range and weekly capacity.
    #[serde(default)]
    pub total_hours: Option<f64>,
}

impl Allocation {
    pub fn new(
        id: impl Into<String>,
        resource_id: impl Into<String>,
        project_id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        utilization: u32,
    ) -> Self {
        Self {
            id: id.into(),
            resource_id: resource_id.into(),
            project_id: project_id.into(),
            start_date,
            end_date,
            utilization,
            hourly_rate: None,
            billable_rate: None,
            total_hours: None,
        }
    }

    pub fn with_rates(mut self, hourly_rate: f64, billable_rate: f64) -> Self {
        self.hourly_rate = Some(hourly_rate);
        self.billable_rate = Some(billable_rate);
        self
    }

    pub fn with_total_hours(mut self, total_hours: f64) -> Self {
        self.total_hours = Some(total_hours);
        self
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.range().contains(date)
    }

    /// Hours represented by this allocation: the fixed estimate when
    /// present, otherwise derived from the inclusive date range.
    pub fn estimated_hours(&self, weekly_capacity_hours: f64) -> f64 {
        match self.total_hours {
            Some(hours) => hours,
            None => self.range().weeks() * weekly_capacity_hours * f64::from(self.utilization) / 100.0,
        }
    }

    pub fn validate(&self, policy: &AllocationPolicy) -> Result<(), PlanError> {
        if self.end_date < self.start_date {
            return Err(PlanError::InvalidAllocationDates {
                id: self.id.clone(),
                start: self.start_date,
                end: self.end_date,
            });
        }
        let max = policy.max_utilization_percentage;
        if self.utilization == 0 || self.utilization > max {
            return Err(PlanError::UtilizationOutOfBounds {
                id: self.id.clone(),
                utilization: self.utilization,
                max,
            });
        }
        Ok(())
    }
}

/// A skill carried by a resource, optionally tagged with a 1..=5
/// proficiency level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub proficiency: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    /// Free-text role name, matched fuzzily against project role
    /// requirements.
    pub role: String,
    #[serde(default)]
    pub skills: Vec<Skill>,
    pub hourly_rate: f64,
    pub billable_rate: f64,
    pub currency: String,
    #[serde(default)]
    pub weekly_capacity_hours: Option<f64>,
    /// Legacy single-slot allocation field still emitted by older
    /// clients. Readers must go through `effective_allocations`.
    #[serde(default)]
    pub allocation: Option<Allocation>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

impl Resource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            skills: Vec::new(),
            hourly_rate: 0.0,
            billable_rate: 0.0,
            currency: "USD".to_string(),
            weekly_capacity_hours: None,
            allocation: None,
            allocations: Vec::new(),
        }
    }

    pub fn with_rates(mut self, hourly_rate: f64, billable_rate: f64) -> Self {
        self.hourly_rate = hourly_rate;
        self.billable_rate = billable_rate;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_capacity(mut self, weekly_capacity_hours: f64) -> Self {
        self.weekly_capacity_hours = Some(weekly_capacity_hours);
        self
    }

    pub fn with_skill(mut self, name: impl Into<String>, proficiency: Option<u8>) -> Self {
        self.skills.push(Skill {
            name: name.into(),
            proficiency,
        });
        self
    }

    /// The one logical allocation set. The list wins over the legacy
    /// single slot; the slot is appended only when its id is absent
    /// from the list, and duplicate ids keep their first occurrence.
    pub fn effective_allocations(&self) -> Vec<&Allocation> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for alloc in self.allocations.iter().chain(self.allocation.as_ref()) {
            if seen.insert(alloc.id.as_str()) {
                out.push(alloc);
            }
        }
        out
    }
}

/// A named skill requirement on a project, optionally with a minimum
/// proficiency level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRequirement {
    pub name: String,
    #[serde(default)]
    pub min_proficiency: Option<u8>,
}

/// A role headcount requirement on a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRequirement {
    pub role: String,
    pub headcount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub client: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub budget: Option<f64>,
    pub currency: String,
    #[serde(default)]
    pub required_skills: Vec<SkillRequirement>,
    #[serde(default)]
    pub required_roles: Vec<RoleRequirement>,
}

impl Project {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        client: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            client: client.into(),
            start_date,
            end_date,
            budget: None,
            currency: "USD".to_string(),
            required_skills: Vec::new(),
            required_roles: Vec::new(),
        }
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_required_skill(
        mut self,
        name: impl Into<String>,
        min_proficiency: Option<u8>,
    ) -> Self {
        self.required_skills.push(SkillRequirement {
            name: name.into(),
            min_proficiency,
        });
        self
    }

    pub fn with_required_role(mut self, role: impl Into<String>, headcount: u32) -> Self {
        self.required_roles.push(RoleRequirement {
            role: role.into(),
            headcount,
        });
        self
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocationPolicy;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn alloc(id: &str, utilization: u32) -> Allocation {
        Allocation::new(
            id,
            "res-1",
            "proj-1",
            date(2025, 1, 1),
            date(2025, 3, 31),
            utilization,
        )
    }

    #[test]
    fn effective_allocations_prefers_list_over_legacy_slot() {
        let mut resource = Resource::new("res-1", "Amara", "Developer");
        resource.allocations = vec![alloc("a1", 50), alloc("a2", 30)];
        resource.allocation = Some(alloc("a1", 90));

        let effective = resource.effective_allocations();
        assert_eq!(effective.len(), 2);
        // The list copy of a1 wins over the legacy slot copy.
        assert_eq!(effective[0].utilization, 50);
    }

    #[test]
    fn effective_allocations_appends_unlisted_legacy_slot() {
        let mut resource = Resource::new("res-1", "Amara", "Developer");
        resource.allocations = vec![alloc("a1", 50)];
        resource.allocation = Some(alloc("a3", 20));

        let effective = resource.effective_allocations();
        assert_eq!(effective.len(), 2);
        assert_eq!(effective[1].id, "a3");
    }

    #[test]
    fn effective_allocations_drops_duplicate_ids() {
        let mut resource = Resource::new("res-1", "Amara", "Developer");
        resource.allocations = vec![alloc("a1", 50), alloc("a1", 50), alloc("a2", 30)];

        let effective = resource.effective_allocations();
        assert_eq!(effective.len(), 2);
    }

    #[test]
    fn validate_rejects_inverted_dates() {
        let policy = AllocationPolicy::default();
        let mut allocation = alloc("a1", 50);
        allocation.start_date = date(2025, 4, 1);
        allocation.end_date = date(2025, 3, 1);
        assert!(allocation.validate(&policy).is_err());
    }

    #[test]
    fn validate_honors_configured_utilization_ceiling() {
        let mut policy = AllocationPolicy::default();
        assert!(alloc("a1", 100).validate(&policy).is_ok());
        assert!(alloc("a1", 101).validate(&policy).is_err());
        assert!(alloc("a1", 0).validate(&policy).is_err());

        // A raised threshold explicitly permits overbooking.
        policy.max_utilization_percentage = 120;
        assert!(alloc("a1", 110).validate(&policy).is_ok());
    }

    #[test]
    fn estimated_hours_prefers_fixed_estimate() {
        let allocation = alloc("a1", 50).with_total_hours(120.0);
        assert!((allocation.estimated_hours(40.0) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn estimated_hours_derives_from_range_and_capacity() {
        // Two inclusive weeks at 50% of a 40h week.
        let allocation = Allocation::new(
            "a1",
            "res-1",
            "proj-1",
            date(2025, 1, 6),
            date(2025, 1, 19),
            50,
        );
        assert!((allocation.estimated_hours(40.0) - 40.0).abs() < 1e-9);
    }
}
