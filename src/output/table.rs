use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::analysis::coverage::CoverageReport;
use crate::analysis::financials::{ProjectFinancials, ResourceFinancials};
use crate::analysis::{CapacityForecast, UtilizationReport};
use crate::scenario::compare::ScenarioComparison;
use crate::scenario::promotion::PromotionConflict;
use crate::scenario::{MetricsSnapshot, ScenarioSummary};

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_utilization_table(report: &UtilizationReport) -> String {
    let mut table = base_table();
    table.set_header(vec!["Resource", "As Of", "Total %", "Status", "Overallocated"]);
    let over = if report.over_allocated { "YES" } else { "no" };
    let over_cell = if report.over_allocated {
        Cell::new(over).fg(Color::Red)
    } else {
        Cell::new(over)
    };
    table.add_row(Row::from(vec![
        Cell::new(&report.resource_name),
        Cell::new(
            report
                .as_of
                .map(|d| d.to_string())
                .unwrap_or_else(|| "lifetime".to_string()),
        ),
        Cell::new(report.total_utilization.to_string()),
        Cell::new(report.status.to_string()),
        over_cell,
    ]));
    table.to_string()
}

pub fn render_forecast_table(forecast: &CapacityForecast) -> String {
    let mut table = base_table();
    let mut header = vec!["Resource".to_string()];
    if let Some(first) = forecast.resources.first() {
        for week in &first.weeks {
            header.push(week.week_start.to_string());
        }
    }
    table.set_header(header);

    for resource in &forecast.resources {
        let mut row = vec![Cell::new(&resource.resource_name)];
        for week in &resource.weeks {
            let text = format!("{}% / {:.0}h", week.utilization, week.available_hours.max(0.0));
            let cell = if week.over_threshold {
                Cell::new(text).fg(Color::Red)
            } else if week.utilization == 0 {
                Cell::new(text).fg(Color::Green)
            } else {
                Cell::new(text)
            };
            row.push(cell);
        }
        table.add_row(Row::from(row));
    }
    table.to_string()
}

pub fn render_resource_financials_table(rollup: &ResourceFinancials) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "Allocation",
        "Project",
        "Hours",
        "Cost",
        "Billable",
        "Profit",
        "Margin %",
    ]);
    for entry in &rollup.allocations {
        table.add_row(vec![
            entry.allocation_id.clone(),
            entry.project_id.clone(),
            format!("{:.1}", entry.hours),
            format!("{:.2}", entry.cost),
            format!("{:.2}", entry.billable),
            format!("{:.2}", entry.profit),
            format!("{:.1}", entry.margin_pct),
        ]);
    }
    table.add_row(vec![
        format!("TOTAL ({})", rollup.currency),
        String::new(),
        String::new(),
        format!("{:.2}", rollup.total_cost),
        format!("{:.2}", rollup.total_billable),
        format!("{:.2}", rollup.total_profit),
        format!("{:.1}", rollup.margin_pct),
    ]);
    table.to_string()
}

pub fn render_project_financials_table(rollup: &ProjectFinancials) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "Project",
        "Budget",
        "Actual Cost",
        "Variance",
        "Budget Used %",
        "Billable",
        "Profit",
        "Margin %",
    ]);
    let over_budget = rollup
        .variance
        .map(|variance| variance < 0.0)
        .unwrap_or(false);
    let variance_text = rollup
        .variance
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "-".to_string());
    let variance_cell = if over_budget {
        Cell::new(variance_text).fg(Color::Red)
    } else {
        Cell::new(variance_text)
    };
    table.add_row(Row::from(vec![
        Cell::new(&rollup.project_name),
        Cell::new(
            rollup
                .budget
                .map(|b| format!("{b:.2}"))
                .unwrap_or_else(|| "-".to_string()),
        ),
        Cell::new(format!("{:.2}", rollup.actual_cost)),
        variance_cell,
        Cell::new(
            rollup
                .budget_utilization_pct
                .map(|p| format!("{p:.1}"))
                .unwrap_or_else(|| "-".to_string()),
        ),
        Cell::new(format!("{:.2}", rollup.billable)),
        Cell::new(format!("{:.2}", rollup.profit)),
        Cell::new(format!("{:.1}", rollup.margin_pct)),
    ]));
    table.to_string()
}

pub fn render_coverage_table(report: &CoverageReport) -> String {
    let mut table = base_table();
    table.set_header(vec!["Role", "Required", "Assigned", "Fulfilled", "Remaining"]);
    for role in &report.roles {
        let fulfilled = if role.fulfilled { "YES" } else { "NO" };
        let fulfilled_cell = if role.fulfilled {
            Cell::new(fulfilled).fg(Color::Green)
        } else {
            Cell::new(fulfilled).fg(Color::Red)
        };
        table.add_row(Row::from(vec![
            Cell::new(&role.role),
            Cell::new(role.required.to_string()),
            Cell::new(role.assigned.to_string()),
            fulfilled_cell,
            Cell::new(role.remaining.to_string()),
        ]));
    }
    format!(
        "{}\nSkills coverage: {:.1}%  covered: [{}]  missing: [{}]",
        table,
        report.coverage_percentage,
        report.covered.join(", "),
        report.missing.join(", ")
    )
}

pub fn render_snapshot_table(snapshot: &MetricsSnapshot) -> String {
    let mut table = base_table();
    table.set_header(vec!["Resource", "Total %", "Status", "Overallocated"]);
    for (resource_id, entry) in &snapshot.utilization.by_resource {
        let over = if entry.over_allocated { "YES" } else { "no" };
        let over_cell = if entry.over_allocated {
            Cell::new(over).fg(Color::Red)
        } else {
            Cell::new(over)
        };
        table.add_row(Row::from(vec![
            Cell::new(format!("{} ({resource_id})", entry.resource_name)),
            Cell::new(entry.total.to_string()),
            Cell::new(entry.status.to_string()),
            over_cell,
        ]));
    }
    format!(
        "{}\nOverall utilization: {:.1}%\nCosts: {:.2} cost / {:.2} billable / {:.2} profit ({:.1}% margin)\nSkills coverage: {:.1}%",
        table,
        snapshot.utilization.overall_pct,
        snapshot.costs.total_cost,
        snapshot.costs.total_billable,
        snapshot.costs.total_profit,
        snapshot.costs.margin_pct,
        snapshot.skills_coverage.coverage_percentage,
    )
}

pub fn render_comparison_table(comparison: &ScenarioComparison) -> String {
    let mut table = base_table();
    let mut header = vec!["Metric".to_string()];
    for column in &comparison.scenarios {
        header.push(column.scenario_name.clone());
    }
    table.set_header(header);

    let mut add_metric_row = |label: &str, values: Vec<String>| {
        let mut row = vec![label.to_string()];
        row.extend(values);
        table.add_row(row);
    };

    if comparison.scenarios.iter().any(|c| c.utilization.is_some()) {
        add_metric_row(
            "Overall utilization %",
            comparison
                .scenarios
                .iter()
                .map(|c| {
                    c.utilization
                        .as_ref()
                        .map(|u| format!("{:.1}", u.overall_pct))
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect(),
        );
        add_metric_row(
            "Overallocated resources",
            comparison
                .scenarios
                .iter()
                .map(|c| {
                    c.utilization
                        .as_ref()
                        .map(|u| {
                            u.by_resource
                                .values()
                                .filter(|entry| entry.over_allocated)
                                .count()
                                .to_string()
                        })
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect(),
        );
    }
    if comparison.scenarios.iter().any(|c| c.costs.is_some()) {
        add_metric_row(
            "Total cost",
            comparison
                .scenarios
                .iter()
                .map(|c| {
                    c.costs
                        .as_ref()
                        .map(|costs| format!("{:.2}", costs.total_cost))
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect(),
        );
        add_metric_row(
            "Total billable",
            comparison
                .scenarios
                .iter()
                .map(|c| {
                    c.costs
                        .as_ref()
                        .map(|costs| format!("{:.2}", costs.total_billable))
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect(),
        );
        add_metric_row(
            "Margin %",
            comparison
                .scenarios
                .iter()
                .map(|c| {
                    c.costs
                        .as_ref()
                        .map(|costs| format!("{:.1}", costs.margin_pct))
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect(),
        );
    }
    if comparison.scenarios.iter().any(|c| c.skills.is_some()) {
        add_metric_row(
            "Skills coverage %",
            comparison
                .scenarios
                .iter()
                .map(|c| {
                    c.skills
                        .as_ref()
                        .map(|skills| format!("{:.1}", skills.coverage_percentage))
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect(),
        );
    }
    table.to_string()
}

pub fn render_scenario_list_table(summaries: &[ScenarioSummary]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "Scenario",
        "Name",
        "Status",
        "Changes",
        "Snapshot",
        "Updated",
    ]);
    for summary in summaries {
        let snapshot = if summary.snapshot_stale {
            Cell::new("stale").fg(Color::Yellow)
        } else {
            Cell::new("fresh")
        };
        table.add_row(Row::from(vec![
            Cell::new(&summary.id),
            Cell::new(&summary.name),
            Cell::new(summary.status.to_string()),
            Cell::new(summary.change_count.to_string()),
            snapshot,
            Cell::new(summary.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]));
    }
    table.to_string()
}

pub fn render_conflicts_table(conflicts: &[PromotionConflict]) -> String {
    let mut table = base_table();
    table.set_header(vec!["Resource", "Projected %", "Threshold %"]);
    for conflict in conflicts {
        table.add_row(Row::from(vec![
            Cell::new(format!(
                "{} ({})",
                conflict.resource_name, conflict.resource_id
            )),
            Cell::new(conflict.projected_utilization.to_string()).fg(Color::Red),
            Cell::new(conflict.threshold.to_string()),
        ]));
    }
    table.to_string()
}
