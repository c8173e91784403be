use crate::model::{Allocation, Project, Resource};
use crate::scenario::{AllocationChange, Scenario};

/// Live data merged with a scenario's changes. Derived on demand and
/// never persisted as a standalone copy.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveDataset {
    pub resources: Vec<Resource>,
    pub projects: Vec<Project>,
    pub allocations: Vec<Allocation>,
}

impl EffectiveDataset {
    /// Live data with no overlay: allocation sets are normalized
    /// through `effective_allocations` and re-attached, so the
    /// calculators see one canonical representation.
    pub fn from_live(resources: &[Resource], projects: &[Project]) -> Self {
        let allocations: Vec<Allocation> = resources
            .iter()
            .flat_map(|resource| resource.effective_allocations())
            .cloned()
            .collect();
        Self {
            resources: attach_allocations(resources, &allocations),
            projects: projects.to_vec(),
            allocations,
        }
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }
}

/// Composes the live baseline with a scenario's recorded changes.
///
/// Pure and side-effect free: inputs are never mutated, and resolving
/// twice with the same inputs yields the same dataset. Changes apply
/// in list order, so a later change to the same allocation id wins.
pub fn resolve(
    live_resources: &[Resource],
    live_projects: &[Project],
    scenario: &Scenario,
) -> EffectiveDataset {
    let mut allocations: Vec<Allocation> = live_resources
        .iter()
        .flat_map(|resource| resource.effective_allocations())
        .cloned()
        .collect();

    for change in &scenario.resource_changes {
        match &change.change {
            AllocationChange::Remove { allocation_id } => {
                allocations.retain(|alloc| alloc.id != *allocation_id);
            }
            AllocationChange::Upsert(payload) => {
                let mut alloc = payload.clone();
                alloc.resource_id = change.resource_id.clone();
                match allocations.iter_mut().find(|existing| existing.id == alloc.id) {
                    Some(existing) => *existing = alloc,
                    None => allocations.push(alloc),
                }
            }
        }
    }

    let projects: Vec<Project> = live_projects
        .iter()
        .map(|project| {
            let timeline = scenario
                .timeline_changes
                .iter()
                .rev()
                .find(|change| change.project_id == project.id);
            match timeline {
                Some(change) => {
                    let mut shifted = project.clone();
                    shifted.start_date = change.new_start;
                    shifted.end_date = change.new_end;
                    shifted
                }
                None => project.clone(),
            }
        })
        .collect();

    EffectiveDataset {
        resources: attach_allocations(live_resources, &allocations),
        projects,
        allocations,
    }
}

/// Rebuilds each resource's allocation list from the effective set.
/// The legacy single-slot field is cleared; the list is the one source
/// of truth downstream.
fn attach_allocations(resources: &[Resource], allocations: &[Allocation]) -> Vec<Resource> {
    resources
        .iter()
        .map(|resource| {
            let mut effective = resource.clone();
            effective.allocation = None;
            effective.allocations = allocations
                .iter()
                .filter(|alloc| alloc.resource_id == resource.id)
                .cloned()
                .collect();
            effective
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ResourceChange;
    use crate::timeline::DateRange;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn live_resource(id: &str, allocations: Vec<Allocation>) -> Resource {
        let mut resource = Resource::new(id, id.to_uppercase(), "Developer");
        resource.allocations = allocations;
        resource
    }

    fn alloc(id: &str, resource_id: &str, project_id: &str, utilization: u32) -> Allocation {
        Allocation::new(
            id,
            resource_id,
            project_id,
            date(2025, 1, 1),
            date(2025, 3, 31),
            utilization,
        )
    }

    fn scenario() -> Scenario {
        Scenario::new(
            "scn-1",
            "Q1 plan",
            DateRange::new(date(2025, 1, 1), date(2025, 6, 30)).unwrap(),
        )
    }

    fn upsert(resource_id: &str, allocation: Allocation) -> ResourceChange {
        ResourceChange {
            resource_id: resource_id.to_string(),
            change: AllocationChange::Upsert(allocation),
        }
    }

    fn remove(resource_id: &str, allocation_id: &str) -> ResourceChange {
        ResourceChange {
            resource_id: resource_id.to_string(),
            change: AllocationChange::Remove {
                allocation_id: allocation_id.to_string(),
            },
        }
    }

    #[test]
    fn resolve_is_pure_and_idempotent() {
        let resources = vec![live_resource("res-1", vec![alloc("a1", "res-1", "proj-1", 50)])];
        let projects = vec![Project::new(
            "proj-1",
            "Atlas",
            "Acme",
            date(2025, 1, 1),
            date(2025, 6, 30),
        )];
        let mut scn = scenario();
        scn.resource_changes
            .push(upsert("res-1", alloc("a2", "res-1", "proj-1", 30)));

        let resources_before = resources.clone();
        let first = resolve(&resources, &projects, &scn);
        let second = resolve(&resources, &projects, &scn);

        assert_eq!(first, second);
        assert_eq!(resources, resources_before);
        assert_eq!(first.allocations.len(), 2);
    }

    #[test]
    fn later_change_to_same_allocation_id_wins() {
        let resources = vec![live_resource("res-1", Vec::new())];
        let mut scn = scenario();
        scn.resource_changes
            .push(upsert("res-1", alloc("a1", "res-1", "proj-1", 40)));
        scn.resource_changes
            .push(upsert("res-1", alloc("a1", "res-1", "proj-2", 70)));

        let effective = resolve(&resources, &[], &scn);
        assert_eq!(effective.allocations.len(), 1);
        assert_eq!(effective.allocations[0].project_id, "proj-2");
        assert_eq!(effective.allocations[0].utilization, 70);
    }

    #[test]
    fn removal_drops_live_allocation_from_effective_set() {
        let resources = vec![live_resource(
            "res-1",
            vec![
                alloc("a1", "res-1", "proj-1", 50),
                alloc("a2", "res-1", "proj-2", 30),
            ],
        )];
        let mut scn = scenario();
        scn.resource_changes.push(remove("res-1", "a1"));

        let effective = resolve(&resources, &[], &scn);
        assert_eq!(effective.allocations.len(), 1);
        assert_eq!(effective.allocations[0].id, "a2");
        assert_eq!(effective.resource("res-1").unwrap().allocations.len(), 1);
    }

    #[test]
    fn upsert_replaces_live_allocation_by_id() {
        let resources = vec![live_resource("res-1", vec![alloc("a1", "res-1", "proj-1", 50)])];
        let mut scn = scenario();
        scn.resource_changes
            .push(upsert("res-1", alloc("a1", "res-1", "proj-1", 90)));

        let effective = resolve(&resources, &[], &scn);
        assert_eq!(effective.allocations.len(), 1);
        assert_eq!(effective.allocations[0].utilization, 90);
    }

    #[test]
    fn timeline_change_shifts_only_the_named_project() {
        let projects = vec![
            Project::new("proj-1", "Atlas", "Acme", date(2025, 1, 1), date(2025, 6, 30)),
            Project::new("proj-2", "Borealis", "Acme", date(2025, 2, 1), date(2025, 7, 31)),
        ];
        let mut scn = scenario();
        scn.timeline_changes.push(crate::scenario::ProjectTimelineChange {
            project_id: "proj-1".to_string(),
            original_start: date(2025, 1, 1),
            original_end: date(2025, 6, 30),
            new_start: date(2025, 3, 1),
            new_end: date(2025, 8, 31),
            notes: String::new(),
        });

        let effective = resolve(&[], &projects, &scn);
        let shifted = effective.project("proj-1").unwrap();
        assert_eq!(shifted.start_date, date(2025, 3, 1));
        assert_eq!(shifted.end_date, date(2025, 8, 31));
        let untouched = effective.project("proj-2").unwrap();
        assert_eq!(untouched.start_date, date(2025, 2, 1));
    }

    #[test]
    fn clone_resolves_to_same_dataset_as_base() {
        let resources = vec![live_resource("res-1", vec![alloc("a1", "res-1", "proj-1", 50)])];
        let projects = vec![Project::new(
            "proj-1",
            "Atlas",
            "Acme",
            date(2025, 1, 1),
            date(2025, 6, 30),
        )];
        let mut base = scenario();
        base.upsert_resource_change(upsert("res-1", alloc("a2", "res-1", "proj-1", 40)));

        let clone = Scenario::clone_from(&base, "scn-2", "Q1 plan v2");
        assert_eq!(
            resolve(&resources, &projects, &base),
            resolve(&resources, &projects, &clone)
        );

        // The clone diverges once it records its own change.
        let mut diverged = clone;
        diverged.upsert_resource_change(upsert("res-1", alloc("a3", "res-1", "proj-1", 10)));
        assert_ne!(
            resolve(&resources, &projects, &base),
            resolve(&resources, &projects, &diverged)
        );
    }

    #[test]
    fn legacy_slot_participates_in_live_baseline() {
        let mut resource = live_resource("res-1", vec![alloc("a1", "res-1", "proj-1", 50)]);
        resource.allocation = Some(alloc("a2", "res-1", "proj-2", 30));

        let effective = resolve(&[resource], &[], &scenario());
        assert_eq!(effective.allocations.len(), 2);
        let rebuilt = effective.resource("res-1").unwrap();
        assert!(rebuilt.allocation.is_none());
        assert_eq!(rebuilt.allocations.len(), 2);
    }
}
