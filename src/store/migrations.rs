pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    resource_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    project_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS allocations (
    id TEXT PRIMARY KEY,
    resource_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    utilization INTEGER NOT NULL,
    hourly_rate REAL,
    billable_rate REAL,
    total_hours REAL
);
CREATE INDEX IF NOT EXISTS idx_allocations_resource
    ON allocations(resource_id);
CREATE INDEX IF NOT EXISTS idx_allocations_project
    ON allocations(project_id);

CREATE TABLE IF NOT EXISTS scenarios (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    revision INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    scenario_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_scenarios_updated
    ON scenarios(updated_at DESC);
"#;
