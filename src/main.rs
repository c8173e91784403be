use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use staffplan::analysis::coverage::{assigned_resources, project_coverage, CoverageReport};
use staffplan::analysis::financials::{project_rollup, resource_rollup};
use staffplan::analysis::{aggregator, CapacityForecast, UtilizationReport};
use staffplan::config::{Config, ConfigOverrides};
use staffplan::demo::seed_store;
use staffplan::error::PlanError;
use staffplan::model::Allocation;
use staffplan::output::csv::{forecast_to_csv, utilization_to_csv};
use staffplan::output::json::render_json;
use staffplan::output::table::{
    render_comparison_table, render_conflicts_table, render_coverage_table,
    render_forecast_table, render_project_financials_table, render_resource_financials_table,
    render_scenario_list_table, render_snapshot_table, render_utilization_table,
};
use staffplan::scenario::compare::{compare_scenarios, MetricCategory, ScenarioComparison};
use staffplan::scenario::metrics::calculate_metrics;
use staffplan::scenario::promotion::{promote_scenario, PromotionOutcome};
use staffplan::scenario::{
    AllocationChange, MetricsSnapshot, ProjectTimelineChange, ResourceChange, Scenario,
    ScenarioStatus, ScenarioSummary,
};
use staffplan::store::PlanStore;
use staffplan::timeline::DateRange;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "staffplan", about = "Resource allocation and what-if scenario engine")]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Populate the store with the deterministic demo dataset.
    Seed,
    Utilization {
        #[arg(long)]
        resource: String,
        #[arg(long = "as-of")]
        as_of: Option<NaiveDate>,
    },
    Financials {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        resource: Option<String>,
    },
    Forecast {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long, default_value_t = 8)]
        weeks: usize,
    },
    Coverage {
        #[arg(long)]
        project: String,
    },
    #[command(subcommand)]
    Scenario(ScenarioCommands),
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3400)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ScenarioCommands {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long = "clone-from")]
        clone_from: Option<String>,
    },
    /// Record an added or modified allocation in a scenario.
    Change {
        #[arg(long)]
        scenario: String,
        #[arg(long)]
        resource: String,
        #[arg(long)]
        project: String,
        #[arg(long = "allocation-id")]
        allocation_id: Option<String>,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        utilization: Option<u32>,
        #[arg(long)]
        hours: Option<f64>,
        #[arg(long = "hourly-rate")]
        hourly_rate: Option<f64>,
        #[arg(long = "billable-rate")]
        billable_rate: Option<f64>,
    },
    /// Record a removal marker for a live allocation.
    Remove {
        #[arg(long)]
        scenario: String,
        #[arg(long)]
        resource: String,
        #[arg(long = "allocation-id")]
        allocation_id: String,
    },
    Timeline {
        #[arg(long)]
        scenario: String,
        #[arg(long)]
        project: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Metrics {
        #[arg(long)]
        scenario: String,
    },
    Show {
        #[arg(long)]
        scenario: String,
    },
    List,
    Compare {
        /// Comma-separated scenario ids.
        #[arg(long)]
        scenarios: String,
        /// Comma-separated categories: utilization, costs, skills.
        #[arg(long)]
        metrics: Option<String>,
    },
    Promote {
        #[arg(long)]
        scenario: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        max_utilization_percentage: None,
        allow_overallocation: None,
    });

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    if let Commands::Serve { host, port } = &cli.command {
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return staffplan::server::run_server(config, addr).await;
    }

    let db_path = config.resolved_db_path();
    let mut store = PlanStore::open(&db_path)?;
    let policy = config.allocation.clone();

    match &cli.command {
        Commands::Seed => {
            let seeded = seed_store(&store, &policy)?;
            println!("Seeded {seeded} demo records into {}", db_path.display());
        }
        Commands::Utilization { resource, as_of } => {
            let resource = store
                .get_resource(resource)?
                .ok_or_else(|| PlanError::UnknownResource(resource.clone()))?;
            let report = aggregator::utilization_report(&resource, *as_of, &policy);
            print_utilization(&report, cli.output)?;
        }
        Commands::Financials { project, resource } => match (project, resource) {
            (Some(project_id), None) => {
                let project = store
                    .get_project(project_id)?
                    .ok_or_else(|| PlanError::UnknownProject(project_id.clone()))?;
                let resources = store.list_resources()?;
                let rollup = project_rollup(&project, &resources, &policy);
                match cli.output {
                    OutputFormat::Table => println!("{}", render_project_financials_table(&rollup)),
                    OutputFormat::Json => println!("{}", render_json(&rollup)?),
                    OutputFormat::Csv => {
                        warn!("CSV output for financials not implemented, using JSON");
                        println!("{}", render_json(&rollup)?);
                    }
                }
            }
            (None, Some(resource_id)) => {
                let resource = store
                    .get_resource(resource_id)?
                    .ok_or_else(|| PlanError::UnknownResource(resource_id.clone()))?;
                let rollup = resource_rollup(&resource, &policy);
                match cli.output {
                    OutputFormat::Table => {
                        println!("{}", render_resource_financials_table(&rollup))
                    }
                    OutputFormat::Json => println!("{}", render_json(&rollup)?),
                    OutputFormat::Csv => {
                        warn!("CSV output for financials not implemented, using JSON");
                        println!("{}", render_json(&rollup)?);
                    }
                }
            }
            _ => return Err(anyhow!("provide exactly one of --project or --resource")),
        },
        Commands::Forecast { start, weeks } => {
            let resources = store.list_resources()?;
            let forecast =
                aggregator::capacity_forecast(&resources, *start, (*weeks).clamp(1, 52), &policy);
            print_forecast(&forecast, cli.output)?;
        }
        Commands::Coverage { project } => {
            let project = store
                .get_project(project)?
                .ok_or_else(|| PlanError::UnknownProject(project.clone()))?;
            let resources = store.list_resources()?;
            let assigned = assigned_resources(&project, &resources);
            let report = project_coverage(&project, &assigned);
            print_coverage(&report, cli.output)?;
        }
        Commands::Scenario(command) => {
            run_scenario_command(command, &mut store, &config, cli.output)?;
        }
        Commands::Config { .. } => {}
        Commands::Serve { .. } => unreachable!("serve command handled before dispatch"),
    }

    Ok(())
}

fn run_scenario_command(
    command: &ScenarioCommands,
    store: &mut PlanStore,
    config: &Config,
    output: OutputFormat,
) -> Result<()> {
    let policy = &config.allocation;
    match command {
        ScenarioCommands::Create {
            name,
            start,
            end,
            clone_from,
        } => {
            let window = DateRange::new(*start, *end)?;
            let id = format!("scn-{}", Uuid::new_v4());
            let scenario = match clone_from {
                Some(base_id) => {
                    let base = store
                        .load_scenario(base_id)?
                        .ok_or_else(|| PlanError::UnknownScenario(base_id.clone()))?;
                    Scenario::clone_from(&base, id, name.clone())
                }
                None => Scenario::new(id, name.clone(), window),
            };
            store.save_scenario(&scenario)?;
            println!("Created scenario {}", scenario.id);
        }
        ScenarioCommands::Change {
            scenario,
            resource,
            project,
            allocation_id,
            start,
            end,
            utilization,
            hours,
            hourly_rate,
            billable_rate,
        } => {
            let mut scn = load_draft(store, scenario)?;
            if store.get_resource(resource)?.is_none() {
                return Err(PlanError::UnknownResource(resource.clone()).into());
            }
            let allocation = Allocation {
                id: allocation_id
                    .clone()
                    .unwrap_or_else(|| format!("alloc-{}", Uuid::new_v4())),
                resource_id: resource.clone(),
                project_id: project.clone(),
                start_date: *start,
                end_date: *end,
                utilization: utilization.unwrap_or(policy.default_allocation_percentage),
                hourly_rate: *hourly_rate,
                billable_rate: *billable_rate,
                total_hours: *hours,
            };
            allocation.validate(policy)?;
            scn.upsert_resource_change(ResourceChange {
                resource_id: resource.clone(),
                change: AllocationChange::Upsert(allocation),
            });
            store.save_scenario(&scn)?;
            println!(
                "Scenario {} now carries {} resource change(s)",
                scn.id,
                scn.resource_changes.len()
            );
        }
        ScenarioCommands::Remove {
            scenario,
            resource,
            allocation_id,
        } => {
            let mut scn = load_draft(store, scenario)?;
            scn.upsert_resource_change(ResourceChange {
                resource_id: resource.clone(),
                change: AllocationChange::Remove {
                    allocation_id: allocation_id.clone(),
                },
            });
            store.save_scenario(&scn)?;
            println!("Recorded removal of allocation {allocation_id} in {}", scn.id);
        }
        ScenarioCommands::Timeline {
            scenario,
            project,
            start,
            end,
            notes,
        } => {
            let mut scn = load_draft(store, scenario)?;
            let live = store
                .get_project(project)?
                .ok_or_else(|| PlanError::UnknownProject(project.clone()))?;
            if end < start {
                return Err(anyhow!("invalid timeline: end {end} is before start {start}"));
            }
            scn.upsert_timeline_change(ProjectTimelineChange {
                project_id: live.id,
                original_start: live.start_date,
                original_end: live.end_date,
                new_start: *start,
                new_end: *end,
                notes: notes.clone(),
            });
            store.save_scenario(&scn)?;
            println!("Recorded timeline change for {project} in {}", scn.id);
        }
        ScenarioCommands::Metrics { scenario } => {
            let mut scn = store
                .load_scenario(scenario)?
                .ok_or_else(|| PlanError::UnknownScenario(scenario.clone()))?;
            let snapshot = calculate_metrics(store, &mut scn, policy)?;
            print_snapshot(&snapshot, output)?;
        }
        ScenarioCommands::Show { scenario } => {
            let scn = store
                .load_scenario(scenario)?
                .ok_or_else(|| PlanError::UnknownScenario(scenario.clone()))?;
            match output {
                OutputFormat::Table => {
                    println!(
                        "{}",
                        render_scenario_list_table(&[ScenarioSummary::from(&scn)])
                    );
                    match &scn.snapshot {
                        Some(snapshot) => {
                            if scn.snapshot_is_stale() {
                                warn!(
                                    "snapshot is stale (computed at revision {:?}, scenario at {}); run scenario metrics to refresh",
                                    scn.snapshot_revision, scn.revision
                                );
                            }
                            println!("{}", render_snapshot_table(snapshot));
                        }
                        None => println!("No metrics snapshot computed yet."),
                    }
                }
                OutputFormat::Json => println!("{}", render_json(&scn)?),
                OutputFormat::Csv => {
                    warn!("CSV output for scenario show not implemented, using JSON");
                    println!("{}", render_json(&scn)?);
                }
            }
        }
        ScenarioCommands::List => {
            let summaries = store.list_scenarios()?;
            match output {
                OutputFormat::Table => println!("{}", render_scenario_list_table(&summaries)),
                OutputFormat::Json => println!("{}", render_json(&summaries)?),
                OutputFormat::Csv => {
                    warn!("CSV output for scenario list not implemented, using JSON");
                    println!("{}", render_json(&summaries)?);
                }
            }
        }
        ScenarioCommands::Compare { scenarios, metrics } => {
            let ids = parse_id_list(scenarios)?;
            let categories = match metrics {
                Some(raw) => parse_category_list(raw)?,
                None => Vec::new(),
            };
            let comparison = compare_scenarios(store, &ids, &categories, policy)?;
            print_comparison(&comparison, output)?;
        }
        ScenarioCommands::Promote { scenario } => {
            let mut scn = store
                .load_scenario(scenario)?
                .ok_or_else(|| PlanError::UnknownScenario(scenario.clone()))?;
            let outcome = promote_scenario(store, &mut scn, policy)?;
            match &outcome {
                PromotionOutcome::Promoted { applied_changes } => match output {
                    OutputFormat::Json => println!("{}", render_json(&outcome)?),
                    _ => println!("Promoted {} ({applied_changes} change(s) applied)", scn.id),
                },
                PromotionOutcome::Rejected { conflicts } => match output {
                    OutputFormat::Json => println!("{}", render_json(&outcome)?),
                    _ => {
                        println!(
                            "Rejected: {} resource(s) would exceed the threshold",
                            conflicts.len()
                        );
                        println!("{}", render_conflicts_table(conflicts));
                    }
                },
            }
        }
    }
    Ok(())
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &PathBuf) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn load_draft(store: &PlanStore, scenario_id: &str) -> Result<Scenario> {
    let scenario = store
        .load_scenario(scenario_id)?
        .ok_or_else(|| PlanError::UnknownScenario(scenario_id.to_string()))?;
    if scenario.status == ScenarioStatus::Promoted {
        return Err(PlanError::ScenarioAlreadyPromoted(scenario_id.to_string()).into());
    }
    Ok(scenario)
}

fn parse_id_list(raw: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(anyhow!("scenario list is empty"));
    }
    Ok(ids)
}

fn parse_category_list(raw: &str) -> Result<Vec<MetricCategory>> {
    let mut out = Vec::new();
    for piece in raw.split(',') {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.push(MetricCategory::from_str(trimmed)?);
    }
    Ok(out)
}

fn print_utilization(report: &UtilizationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_utilization_table(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => {
            warn!("CSV output for utilization not implemented, using JSON");
            println!("{}", render_json(report)?);
        }
    }
    Ok(())
}

fn print_forecast(forecast: &CapacityForecast, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_forecast_table(forecast)),
        OutputFormat::Json => println!("{}", render_json(forecast)?),
        OutputFormat::Csv => println!("{}", forecast_to_csv(forecast)?),
    }
    Ok(())
}

fn print_coverage(report: &CoverageReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_coverage_table(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => {
            warn!("CSV output for coverage not implemented, using JSON");
            println!("{}", render_json(report)?);
        }
    }
    Ok(())
}

fn print_snapshot(snapshot: &MetricsSnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_snapshot_table(snapshot)),
        OutputFormat::Json => println!("{}", render_json(snapshot)?),
        OutputFormat::Csv => println!("{}", utilization_to_csv(&snapshot.utilization)?),
    }
    Ok(())
}

fn print_comparison(comparison: &ScenarioComparison, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_comparison_table(comparison)),
        OutputFormat::Json => println!("{}", render_json(comparison)?),
        OutputFormat::Csv => {
            warn!("CSV output for comparison not implemented, using JSON");
            println!("{}", render_json(comparison)?);
        }
    }
    Ok(())
}
