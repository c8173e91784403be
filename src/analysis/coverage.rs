use serde::{Deserialize, Serialize};

use crate::model::{Project, Resource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCoverage {
    pub role: String,
    pub required: u32,
    pub assigned: u32,
    pub fulfilled: bool,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub project_id: String,
    pub project_name: String,
    /// Covered required skills / total required skills. 100 when the
    /// project requires nothing.
    pub coverage_percentage: f64,
    pub covered: Vec<String>,
    pub missing: Vec<String>,
    pub roles: Vec<RoleCoverage>,
}

/// Lowercase, `-`/`_` treated as spaces, whitespace collapsed.
pub fn normalize_role(name: &str) -> String {
    name.to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fuzzy role predicate: normalized equality, or either side contains
/// the other as a substring. Tolerates naming drift ("Senior
/// Developer" vs "developer") at the cost of occasional over-matching;
/// callers needing exact matching must pre-filter by role id.
pub fn roles_match(a: &str, b: &str) -> bool {
    let a = normalize_role(a);
    let b = normalize_role(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// Resources with at least one effective allocation on the project.
pub fn assigned_resources<'a>(project: &Project, resources: &'a [Resource]) -> Vec<&'a Resource> {
    resources
        .iter()
        .filter(|resource| {
            resource
                .effective_allocations()
                .iter()
                .any(|alloc| alloc.project_id == project.id)
        })
        .collect()
}

pub fn project_coverage(project: &Project, assigned: &[&Resource]) -> CoverageReport {
    let roles = project
        .required_roles
        .iter()
        .map(|requirement| {
            let count = assigned
                .iter()
                .filter(|resource| roles_match(&resource.role, &requirement.role))
                .count() as u32;
            RoleCoverage {
                role: requirement.role.clone(),
                required: requirement.headcount,
                assigned: count,
                fulfilled: count >= requirement.headcount,
                remaining: requirement.headcount.saturating_sub(count),
            }
        })
        .collect();

    let mut covered = Vec::new();
    let mut missing = Vec::new();
    for requirement in &project.required_skills {
        let satisfied = assigned.iter().any(|resource| {
            resource.skills.iter().any(|skill| {
                normalize_role(&skill.name) == normalize_role(&requirement.name)
                    && skill.proficiency.unwrap_or(0)
                        >= requirement.min_proficiency.unwrap_or(0)
            })
        });
        if satisfied {
            covered.push(requirement.name.clone());
        } else {
            missing.push(requirement.name.clone());
        }
    }

    let total = project.required_skills.len();
    let coverage_percentage = if total == 0 {
        100.0
    } else {
        covered.len() as f64 / total as f64 * 100.0
    };

    CoverageReport {
        project_id: project.id.clone(),
        project_name: project.name.clone(),
        coverage_percentage,
        covered,
        missing,
        roles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Allocation;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn assigned(id: &str, role: &str, project_id: &str) -> Resource {
        let mut resource = Resource::new(id, id.to_uppercase(), role);
        resource.allocations = vec![Allocation::new(
            format!("{id}-alloc"),
            id,
            project_id,
            date(2025, 1, 1),
            date(2025, 6, 30),
            50,
        )];
        resource
    }

    #[test]
    fn normalization_collapses_separators_and_case() {
        assert_eq!(normalize_role("Senior-Backend_Developer"), "senior backend developer");
        assert_eq!(normalize_role("  QA   Lead "), "qa lead");
    }

    #[test]
    fn substring_containment_tolerates_naming_drift() {
        assert!(roles_match("Senior Developer", "developer"));
        assert!(roles_match("developer", "Senior Developer"));
        assert!(roles_match("QA", "QA Lead"));
        assert!(!roles_match("Designer", "Developer"));
        assert!(!roles_match("", "Developer"));
    }

    #[test]
    fn role_coverage_counts_fuzzy_matches() {
        let project = Project::new("proj-1", "Atlas", "Acme", date(2025, 1, 1), date(2025, 6, 30))
            .with_required_role("Developer", 2)
            .with_required_role("Designer", 1);
        let r1 = assigned("res-1", "Senior Developer", "proj-1");
        let r2 = assigned("res-2", "developer", "proj-1");
        let assigned_refs = vec![&r1, &r2];

        let report = project_coverage(&project, &assigned_refs);
        let dev = &report.roles[0];
        assert_eq!(dev.assigned, 2);
        assert!(dev.fulfilled);
        assert_eq!(dev.remaining, 0);
        let design = &report.roles[1];
        assert_eq!(design.assigned, 0);
        assert!(!design.fulfilled);
        assert_eq!(design.remaining, 1);
    }

    #[test]
    fn skill_coverage_honors_minimum_proficiency() {
        let project = Project::new("proj-1", "Atlas", "Acme", date(2025, 1, 1), date(2025, 6, 30))
            .with_required_skill("Rust", Some(3))
            .with_required_skill("SQL", None);
        let mut r1 = assigned("res-1", "Developer", "proj-1");
        r1.skills = vec![
            crate::model::Skill {
                name: "rust".to_string(),
                proficiency: Some(2),
            },
            crate::model::Skill {
                name: "SQL".to_string(),
                proficiency: None,
            },
        ];
        let assigned_refs = vec![&r1];

        let report = project_coverage(&project, &assigned_refs);
        // Rust proficiency 2 misses the minimum of 3; SQL has no
        // minimum so an untagged skill satisfies it.
        assert_eq!(report.covered, vec!["SQL".to_string()]);
        assert_eq!(report.missing, vec!["Rust".to_string()]);
        assert!((report.coverage_percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn empty_requirements_mean_full_coverage() {
        let project = Project::new("proj-1", "Atlas", "Acme", date(2025, 1, 1), date(2025, 6, 30));
        let report = project_coverage(&project, &[]);
        assert!((report.coverage_percentage - 100.0).abs() < 1e-9);
        assert!(report.covered.is_empty());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn assignment_follows_effective_allocations() {
        let project = Project::new("proj-1", "Atlas", "Acme", date(2025, 1, 1), date(2025, 6, 30));
        let on_project = assigned("res-1", "Developer", "proj-1");
        let elsewhere = assigned("res-2", "Developer", "proj-2");
        let resources = vec![on_project, elsewhere];

        let matched = assigned_resources(&project, &resources);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "res-1");
    }
}
