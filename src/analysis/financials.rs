use serde::{Deserialize, Serialize};

use crate::config::AllocationPolicy;
use crate::model::{Allocation, Project, Resource};

/// Cost and revenue contribution of a single allocation. Rates fall
/// back to the owning resource when the allocation carries no override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationFinancials {
    pub allocation_id: String,
    pub project_id: String,
    pub hours: f64,
    pub cost: f64,
    pub billable: f64,
    pub profit: f64,
    pub margin_pct: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceFinancials {
    pub resource_id: String,
    pub resource_name: String,
    pub total_cost: f64,
    pub total_billable: f64,
    pub total_profit: f64,
    pub margin_pct: f64,
    /// Billable markup over cost rate, from the resource's own rates.
    pub markup_pct: f64,
    pub currency: String,
    pub allocations: Vec<AllocationFinancials>,
}

/// The `getProjectFinancials` shape. Amounts are summed numerically;
/// currencies are carried, never converted, so a rollup mixing
/// currencies is the caller's responsibility to avoid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFinancials {
    pub project_id: String,
    pub project_name: String,
    pub budget: Option<f64>,
    pub actual_cost: f64,
    pub billable: f64,
    pub profit: f64,
    pub margin_pct: f64,
    pub budget_utilization_pct: Option<f64>,
    pub variance: Option<f64>,
    pub currency: String,
}

pub fn allocation_financials(
    allocation: &Allocation,
    resource: &Resource,
    policy: &AllocationPolicy,
) -> AllocationFinancials {
    let capacity = resource
        .weekly_capacity_hours
        .unwrap_or(policy.default_weekly_capacity_hours);
    let hours = allocation.estimated_hours(capacity);
    let hourly_rate = allocation.hourly_rate.unwrap_or(resource.hourly_rate);
    let billable_rate = allocation.billable_rate.unwrap_or(resource.billable_rate);
    let cost = hourly_rate * hours;
    let billable = billable_rate * hours;
    let profit = billable - cost;
    AllocationFinancials {
        allocation_id: allocation.id.clone(),
        project_id: allocation.project_id.clone(),
        hours,
        cost,
        billable,
        profit,
        margin_pct: margin_pct(profit, billable),
        currency: resource.currency.clone(),
    }
}

pub fn resource_rollup(resource: &Resource, policy: &AllocationPolicy) -> ResourceFinancials {
    let allocations: Vec<AllocationFinancials> = resource
        .effective_allocations()
        .iter()
        .map(|alloc| allocation_financials(alloc, resource, policy))
        .collect();
    let total_cost: f64 = allocations.iter().map(|a| a.cost).sum();
    let total_billable: f64 = allocations.iter().map(|a| a.billable).sum();
    let total_profit = total_billable - total_cost;
    let markup_pct = if resource.hourly_rate == 0.0 {
        0.0
    } else {
        (resource.billable_rate / resource.hourly_rate - 1.0) * 100.0
    };
    ResourceFinancials {
        resource_id: resource.id.clone(),
        resource_name: resource.name.clone(),
        total_cost,
        total_billable,
        total_profit,
        margin_pct: margin_pct(total_profit, total_billable),
        markup_pct,
        currency: resource.currency.clone(),
        allocations,
    }
}

/// Rolls up every effective allocation referencing the project, across
/// all resources, and compares against the declared budget.
pub fn project_rollup(
    project: &Project,
    resources: &[Resource],
    policy: &AllocationPolicy,
) -> ProjectFinancials {
    let mut actual_cost = 0.0;
    let mut billable = 0.0;
    for resource in resources {
        for allocation in resource.effective_allocations() {
            if allocation.project_id != project.id {
                continue;
            }
            let entry = allocation_financials(allocation, resource, policy);
            actual_cost += entry.cost;
            billable += entry.billable;
        }
    }
    let profit = billable - actual_cost;
    let budget_utilization_pct = project.budget.and_then(|budget| {
        if budget == 0.0 {
            None
        } else {
            Some(actual_cost / budget * 100.0)
        }
    });
    ProjectFinancials {
        project_id: project.id.clone(),
        project_name: project.name.clone(),
        budget: project.budget,
        actual_cost,
        billable,
        profit,
        margin_pct: margin_pct(profit, billable),
        budget_utilization_pct,
        variance: project.budget.map(|budget| budget - actual_cost),
        currency: project.currency.clone(),
    }
}

fn margin_pct(profit: f64, billable: f64) -> f64 {
    if billable == 0.0 {
        0.0
    } else {
        profit / billable * 100.0
    }
}
