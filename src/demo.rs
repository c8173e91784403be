use anyhow::Result;
use chrono::NaiveDate;

use crate::config::AllocationPolicy;
use crate::model::{Allocation, Project, Resource};
use crate::store::PlanStore;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid demo date")
}

/// Deterministic sample dataset used by `seed` and the quickstart.
pub fn sample_resources() -> Vec<Resource> {
    vec![
        Resource::new("res-amara", "Amara Okafor", "Senior Developer")
            .with_rates(65.0, 110.0)
            .with_capacity(40.0)
            .with_skill("rust", Some(5))
            .with_skill("sql", Some(4)),
        Resource::new("res-jonas", "Jonas Weber", "QA Engineer")
            .with_rates(45.0, 80.0)
            .with_capacity(40.0)
            .with_skill("test automation", Some(4))
            .with_skill("sql", Some(2)),
        Resource::new("res-priya", "Priya Sharma", "Designer")
            .with_rates(50.0, 90.0)
            .with_capacity(32.0)
            .with_skill("ux research", Some(4))
            .with_skill("figma", Some(5)),
        Resource::new("res-diego", "Diego Martinez", "Developer")
            .with_rates(48.0, 85.0)
            .with_capacity(40.0)
            .with_skill("rust", Some(3))
            .with_skill("react", Some(4)),
    ]
}

pub fn sample_projects() -> Vec<Project> {
    vec![
        Project::new(
            "proj-atlas",
            "Atlas Platform",
            "Acme Corp",
            date(2025, 1, 6),
            date(2025, 6, 27),
        )
        .with_budget(120_000.0)
        .with_required_skill("rust", Some(3))
        .with_required_skill("sql", None)
        .with_required_role("Developer", 2)
        .with_required_role("QA", 1),
        Project::new(
            "proj-borealis",
            "Borealis Redesign",
            "Northwind",
            date(2025, 2, 3),
            date(2025, 5, 30),
        )
        .with_budget(60_000.0)
        .with_required_skill("ux research", Some(3))
        .with_required_skill("figma", None)
        .with_required_role("Designer", 1),
    ]
}

pub fn sample_allocations() -> Vec<Allocation> {
    vec![
        Allocation::new(
            "alloc-amara-atlas",
            "res-amara",
            "proj-atlas",
            date(2025, 1, 6),
            date(2025, 6, 27),
            80,
        ),
        Allocation::new(
            "alloc-jonas-atlas",
            "res-jonas",
            "proj-atlas",
            date(2025, 2, 3),
            date(2025, 6, 27),
            60,
        ),
        Allocation::new(
            "alloc-priya-borealis",
            "res-priya",
            "proj-borealis",
            date(2025, 2, 3),
            date(2025, 5, 30),
            75,
        ),
        Allocation::new(
            "alloc-diego-atlas",
            "res-diego",
            "proj-atlas",
            date(2025, 1, 20),
            date(2025, 4, 25),
            50,
        ),
        Allocation::new(
            "alloc-diego-borealis",
            "res-diego",
            "proj-borealis",
            date(2025, 3, 3),
            date(2025, 5, 30),
            40,
        ),
    ]
}

pub fn seed_store(store: &PlanStore, policy: &AllocationPolicy) -> Result<usize> {
    let resources = sample_resources();
    let projects = sample_projects();
    let allocations = sample_allocations();
    for resource in &resources {
        store.upsert_resource(resource)?;
    }
    for project in &projects {
        store.upsert_project(project)?;
    }
    for allocation in &allocations {
        store.insert_allocation(allocation, policy)?;
    }
    Ok(resources.len() + projects.len() + allocations.len())
}
