pub mod migrations;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, TransactionBehavior};

use crate::config::AllocationPolicy;
use crate::error::PlanError;
use crate::model::{Allocation, Project, Resource};
use crate::scenario::promotion::PromotionBatch;
use crate::scenario::{Scenario, ScenarioSummary};
use crate::store::migrations::BASE_MIGRATION;

/// The live dataset and scenario persistence collaborator. Master
/// records are stored as JSON blobs; allocations are relational
/// because promotion mutates them row by row.
pub struct PlanStore {
    conn: Connection,
}

impl PlanStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    /// Persists master data only; the embedded allocation fields are
    /// stripped and the allocations table stays the single source of
    /// truth.
    pub fn upsert_resource(&self, resource: &Resource) -> Result<()> {
        let mut stripped = resource.clone();
        stripped.allocation = None;
        stripped.allocations = Vec::new();
        self.conn.execute(
            "INSERT OR REPLACE INTO resources(id, resource_json) VALUES (?1, ?2)",
            params![stripped.id, serde_json::to_string(&stripped)?],
        )?;
        Ok(())
    }

    pub fn upsert_project(&self, project: &Project) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO projects(id, project_json) VALUES (?1, ?2)",
            params![project.id, serde_json::to_string(project)?],
        )?;
        Ok(())
    }

    /// Live resources with their allocation lists attached.
    pub fn list_resources(&self) -> Result<Vec<Resource>> {
        let mut stmt = self
            .conn
            .prepare("SELECT resource_json FROM resources ORDER BY id")?;
        let mut resources = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|json| serde_json::from_str::<Resource>(&json))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut by_resource: HashMap<String, Vec<Allocation>> = HashMap::new();
        for allocation in self.list_allocations()? {
            by_resource
                .entry(allocation.resource_id.clone())
                .or_default()
                .push(allocation);
        }
        for resource in &mut resources {
            resource.allocations = by_resource.remove(&resource.id).unwrap_or_default();
        }
        Ok(resources)
    }

    pub fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        Ok(self
            .list_resources()?
            .into_iter()
            .find(|resource| resource.id == id))
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT project_json FROM projects ORDER BY id")?;
        let projects = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|json| serde_json::from_str::<Project>(&json))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let result = self.conn.query_row(
            "SELECT project_json FROM projects WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_allocations(&self) -> Result<Vec<Allocation>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, resource_id, project_id, start_date, end_date,
       utilization, hourly_rate, billable_rate, total_hours
FROM allocations
ORDER BY id
"#,
        )?;
        let rows = stmt
            .query_map([], row_to_allocation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Write boundary for live allocations: malformed input and
    /// unknown references are rejected here, before anything lands.
    pub fn insert_allocation(
        &self,
        allocation: &Allocation,
        policy: &AllocationPolicy,
    ) -> Result<()> {
        allocation.validate(policy)?;
        if self.get_resource(&allocation.resource_id)?.is_none() {
            return Err(PlanError::UnknownResource(allocation.resource_id.clone()).into());
        }
        if self.get_project(&allocation.project_id)?.is_none() {
            return Err(PlanError::UnknownProject(allocation.project_id.clone()).into());
        }
        upsert_allocation_row(&self.conn, allocation)
    }

    pub fn delete_allocation(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM allocations WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn save_scenario(&self, scenario: &Scenario) -> Result<()> {
        self.conn.execute(
            r#"
INSERT OR REPLACE INTO scenarios(id, status, revision, updated_at, scenario_json)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
            params![
                scenario.id,
                scenario.status.to_string(),
                scenario.revision as i64,
                scenario.updated_at.to_rfc3339(),
                serde_json::to_string(scenario)?
            ],
        )?;
        Ok(())
    }

    pub fn load_scenario(&self, id: &str) -> Result<Option<Scenario>> {
        let result = self.conn.query_row(
            "SELECT scenario_json FROM scenarios WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_scenarios(&self) -> Result<Vec<ScenarioSummary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT scenario_json FROM scenarios ORDER BY updated_at DESC")?;
        let summaries = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|json| serde_json::from_str::<Scenario>(&json))
            .collect::<std::result::Result<Vec<_>, _>>()?
            .iter()
            .map(ScenarioSummary::from)
            .collect();
        Ok(summaries)
    }

    /// Applies a promotion batch in one IMMEDIATE transaction. Either
    /// every mutation commits or none does; a timeline update against
    /// a project that vanished from live data fails the whole batch.
    pub fn apply_promotion(&mut self, batch: &PromotionBatch) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for allocation in &batch.upserts {
            upsert_allocation_row(&tx, allocation)?;
        }
        for allocation_id in &batch.removals {
            tx.execute(
                "DELETE FROM allocations WHERE id = ?1",
                params![allocation_id],
            )?;
        }
        for update in &batch.timeline_updates {
            let json = tx
                .query_row(
                    "SELECT project_json FROM projects WHERE id = ?1",
                    params![update.project_id],
                    |row| row.get::<_, String>(0),
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => {
                        anyhow!("project {} missing during promotion", update.project_id)
                    }
                    other => other.into(),
                })?;
            let mut project: Project = serde_json::from_str(&json)?;
            project.start_date = update.start_date;
            project.end_date = update.end_date;
            tx.execute(
                "UPDATE projects SET project_json = ?2 WHERE id = ?1",
                params![project.id, serde_json::to_string(&project)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert_allocation_row(conn: &Connection, allocation: &Allocation) -> Result<()> {
    conn.execute(
        r#"
INSERT OR REPLACE INTO allocations(
    id, resource_id, project_id, start_date, end_date,
    utilization, hourly_rate, billable_rate, total_hours
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#,
        params![
            allocation.id,
            allocation.resource_id,
            allocation.project_id,
            allocation.start_date.to_string(),
            allocation.end_date.to_string(),
            allocation.utilization as i64,
            allocation.hourly_rate,
            allocation.billable_rate,
            allocation.total_hours
        ],
    )?;
    Ok(())
}

fn row_to_allocation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Allocation> {
    Ok(Allocation {
        id: row.get(0)?,
        resource_id: row.get(1)?,
        project_id: row.get(2)?,
        start_date: parse_date(row.get::<_, String>(3)?.as_str(), 3)?,
        end_date: parse_date(row.get::<_, String>(4)?.as_str(), 4)?,
        utilization: row.get::<_, i64>(5)? as u32,
        hourly_rate: row.get(6)?,
        billable_rate: row.get(7)?,
        total_hours: row.get(8)?,
    })
}

fn parse_date(raw: &str, column: usize) -> rusqlite::Result<NaiveDate> {
    raw.parse().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::DateRange;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn seeded() -> PlanStore {
        let store = PlanStore::open_in_memory().expect("store");
        store
            .upsert_resource(
                &Resource::new("res-1", "Amara", "Developer")
                    .with_rates(40.0, 60.0)
                    .with_skill("rust", Some(4)),
            )
            .expect("resource");
        store
            .upsert_project(&Project::new(
                "proj-1",
                "Atlas",
                "Acme",
                date(2025, 1, 1),
                date(2025, 6, 30),
            ))
            .expect("project");
        store
    }

    #[test]
    fn resources_round_trip_with_allocations_attached() {
        let store = seeded();
        let policy = AllocationPolicy::default();
        store
            .insert_allocation(
                &Allocation::new(
                    "a1",
                    "res-1",
                    "proj-1",
                    date(2025, 1, 1),
                    date(2025, 3, 31),
                    50,
                )
                .with_total_hours(120.0),
                &policy,
            )
            .expect("allocation");

        let resources = store.list_resources().expect("list");
        assert_eq!(resources.len(), 1);
        let resource = &resources[0];
        assert_eq!(resource.skills.len(), 1);
        assert_eq!(resource.allocations.len(), 1);
        assert_eq!(resource.allocations[0].total_hours, Some(120.0));
        assert_eq!(resource.allocations[0].start_date, date(2025, 1, 1));
        assert!(resource.allocation.is_none());
    }

    #[test]
    fn allocation_writes_reject_malformed_input() {
        let store = seeded();
        let policy = AllocationPolicy::default();

        let inverted = Allocation::new(
            "a1",
            "res-1",
            "proj-1",
            date(2025, 4, 1),
            date(2025, 3, 1),
            50,
        );
        assert!(store.insert_allocation(&inverted, &policy).is_err());

        let unknown_resource = Allocation::new(
            "a2",
            "res-missing",
            "proj-1",
            date(2025, 1, 1),
            date(2025, 3, 1),
            50,
        );
        assert!(store.insert_allocation(&unknown_resource, &policy).is_err());

        let unknown_project = Allocation::new(
            "a3",
            "res-1",
            "proj-missing",
            date(2025, 1, 1),
            date(2025, 3, 1),
            50,
        );
        assert!(store.insert_allocation(&unknown_project, &policy).is_err());

        assert!(store.list_allocations().expect("list").is_empty());
    }

    #[test]
    fn scenarios_round_trip_and_list_newest_first() {
        let store = seeded();
        let window = DateRange::new(date(2025, 1, 1), date(2025, 6, 30)).unwrap();
        let older = Scenario::new("scn-1", "First", window);
        store.save_scenario(&older).expect("save");
        let mut newer = Scenario::new("scn-2", "Second", window);
        newer.updated_at = older.updated_at + chrono::Duration::seconds(5);
        store.save_scenario(&newer).expect("save");

        let loaded = store.load_scenario("scn-1").expect("load").expect("present");
        assert_eq!(loaded.name, "First");
        assert!(store.load_scenario("scn-missing").expect("load").is_none());

        let summaries = store.list_scenarios().expect("list");
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, "scn-2");
    }

    #[test]
    fn upsert_resource_strips_embedded_allocations() {
        let store = seeded();
        let policy = AllocationPolicy::default();
        store
            .insert_allocation(
                &Allocation::new(
                    "a1",
                    "res-1",
                    "proj-1",
                    date(2025, 1, 1),
                    date(2025, 3, 31),
                    50,
                ),
                &policy,
            )
            .expect("allocation");

        // Re-saving a loaded resource must not clone its allocations
        // into the JSON blob.
        let loaded = store.get_resource("res-1").expect("get").expect("present");
        store.upsert_resource(&loaded).expect("resave");

        let resources = store.list_resources().expect("list");
        assert_eq!(resources[0].allocations.len(), 1);
    }
}
