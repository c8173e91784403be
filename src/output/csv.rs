use anyhow::Result;

use crate::analysis::CapacityForecast;
use crate::scenario::UtilizationMetrics;

pub fn forecast_to_csv(forecast: &CapacityForecast) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "resource_id",
        "resource_name",
        "week_start",
        "utilization_pct",
        "available_hours",
        "over_threshold",
    ])?;
    for resource in &forecast.resources {
        for week in &resource.weeks {
            writer.write_record([
                resource.resource_id.clone(),
                resource.resource_name.clone(),
                week.week_start.to_string(),
                week.utilization.to_string(),
                format!("{:.1}", week.available_hours),
                week.over_threshold.to_string(),
            ])?;
        }
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn utilization_to_csv(metrics: &UtilizationMetrics) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "resource_id",
        "resource_name",
        "total_utilization_pct",
        "status",
        "over_allocated",
    ])?;
    for (resource_id, entry) in &metrics.by_resource {
        writer.write_record([
            resource_id.clone(),
            entry.resource_name.clone(),
            entry.total.to_string(),
            entry.status.to_string(),
            entry.over_allocated.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
