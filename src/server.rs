use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::analysis::coverage::{self, CoverageReport};
use crate::analysis::financials::{self, ProjectFinancials, ResourceFinancials};
use crate::analysis::{aggregator, CapacityForecast, UtilizationReport};
use crate::config::Config;
use crate::error::PlanError;
use crate::model::Allocation;
use crate::scenario::compare::{compare_scenarios, MetricCategory, ScenarioComparison};
use crate::scenario::metrics::calculate_metrics;
use crate::scenario::promotion::{promote_scenario, PromotionOutcome};
use crate::scenario::{
    AllocationChange, MetricsSnapshot, ProjectTimelineChange, ResourceChange, Scenario,
    ScenarioStatus, ScenarioSummary,
};
use crate::store::PlanStore;
use crate::timeline::DateRange;

#[derive(Clone)]
struct ApiState {
    config: Config,
    db_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }

    /// Input errors surface as 400, a double promotion as 409, and
    /// everything else (storage failures included) as 500.
    fn from_engine(error: anyhow::Error) -> Self {
        match error.downcast_ref::<PlanError>() {
            Some(PlanError::ScenarioAlreadyPromoted(_)) => Self::conflict(error.to_string()),
            Some(
                PlanError::UnknownResource(_)
                | PlanError::UnknownProject(_)
                | PlanError::UnknownScenario(_),
            ) => Self::not_found(error.to_string()),
            Some(_) => Self::bad_request(error.to_string()),
            None => Self::internal(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Deserialize)]
struct UtilizationRequest {
    resource_id: String,
    #[serde(default)]
    as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectFinancialsRequest {
    project_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ResourceFinancialsRequest {
    resource_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ForecastRequest {
    start: NaiveDate,
    #[serde(default)]
    weeks: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct CoverageRequest {
    project_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateScenarioRequest {
    name: String,
    window_start: NaiveDate,
    window_end: NaiveDate,
    #[serde(default)]
    clone_from: Option<String>,
}

/// Allocation payload for a scenario change. Missing ids are
/// generated; a missing utilization takes the configured default.
#[derive(Debug, Clone, Deserialize)]
struct AllocationInput {
    #[serde(default)]
    id: Option<String>,
    project_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    utilization: Option<u32>,
    #[serde(default)]
    hourly_rate: Option<f64>,
    #[serde(default)]
    billable_rate: Option<f64>,
    #[serde(default)]
    total_hours: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScenarioChangeRequest {
    scenario_id: String,
    resource_id: String,
    #[serde(default)]
    allocation: Option<AllocationInput>,
    #[serde(default)]
    remove_allocation_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TimelineChangeRequest {
    scenario_id: String,
    project_id: String,
    new_start: NaiveDate,
    new_end: NaiveDate,
    #[serde(default)]
    notes: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ScenarioMetricsRequest {
    scenario_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CompareRequest {
    scenario_ids: Vec<String>,
    #[serde(default)]
    metrics: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PromoteRequest {
    scenario_id: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ScenarioMetricsResponse {
    scenario_id: String,
    revision: u64,
    snapshot: MetricsSnapshot,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState {
        db_path: config.resolved_db_path(),
        config,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/utilization", post(utilization))
        .route("/v1/financials/project", post(project_financials))
        .route("/v1/financials/resource", post(resource_financials))
        .route("/v1/forecast", post(forecast))
        .route("/v1/coverage", post(project_coverage))
        .route("/v1/scenarios", get(list_scenarios).post(create_scenario))
        .route("/v1/scenarios/changes", post(record_change))
        .route("/v1/scenarios/timeline", post(record_timeline_change))
        .route("/v1/scenarios/metrics", post(scenario_metrics))
        .route("/v1/scenarios/compare", post(compare))
        .route("/v1/scenarios/promote", post(promote))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("staffplan API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn utilization(
    State(state): State<ApiState>,
    Json(request): Json<UtilizationRequest>,
) -> ApiResult<UtilizationReport> {
    let store = open_store(&state)?;
    let resource = store
        .get_resource(&request.resource_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("unknown resource: {}", request.resource_id)))?;
    Ok(ok(aggregator::utilization_report(
        &resource,
        request.as_of,
        &state.config.allocation,
    )))
}

async fn project_financials(
    State(state): State<ApiState>,
    Json(request): Json<ProjectFinancialsRequest>,
) -> ApiResult<ProjectFinancials> {
    let store = open_store(&state)?;
    let project = store
        .get_project(&request.project_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("unknown project: {}", request.project_id)))?;
    let resources = store.list_resources().map_err(ApiError::internal)?;
    Ok(ok(financials::project_rollup(
        &project,
        &resources,
        &state.config.allocation,
    )))
}

async fn resource_financials(
    State(state): State<ApiState>,
    Json(request): Json<ResourceFinancialsRequest>,
) -> ApiResult<ResourceFinancials> {
    let store = open_store(&state)?;
    let resource = store
        .get_resource(&request.resource_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("unknown resource: {}", request.resource_id)))?;
    Ok(ok(financials::resource_rollup(
        &resource,
        &state.config.allocation,
    )))
}

async fn forecast(
    State(state): State<ApiState>,
    Json(request): Json<ForecastRequest>,
) -> ApiResult<CapacityForecast> {
    let weeks = request.weeks.unwrap_or(8).clamp(1, 52);
    let store = open_store(&state)?;
    let resources = store.list_resources().map_err(ApiError::internal)?;
    Ok(ok(aggregator::capacity_forecast(
        &resources,
        request.start,
        weeks,
        &state.config.allocation,
    )))
}

async fn project_coverage(
    State(state): State<ApiState>,
    Json(request): Json<CoverageRequest>,
) -> ApiResult<CoverageReport> {
    let store = open_store(&state)?;
    let project = store
        .get_project(&request.project_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("unknown project: {}", request.project_id)))?;
    let resources = store.list_resources().map_err(ApiError::internal)?;
    let assigned = coverage::assigned_resources(&project, &resources);
    Ok(ok(coverage::project_coverage(&project, &assigned)))
}

async fn list_scenarios(State(state): State<ApiState>) -> ApiResult<Vec<ScenarioSummary>> {
    let store = open_store(&state)?;
    Ok(ok(store.list_scenarios().map_err(ApiError::internal)?))
}

async fn create_scenario(
    State(state): State<ApiState>,
    Json(request): Json<CreateScenarioRequest>,
) -> ApiResult<ScenarioSummary> {
    let store = open_store(&state)?;
    let window = DateRange::new(request.window_start, request.window_end)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let id = format!("scn-{}", Uuid::new_v4());
    let scenario = match &request.clone_from {
        Some(base_id) => {
            let base = store
                .load_scenario(base_id)
                .map_err(ApiError::internal)?
                .ok_or_else(|| ApiError::not_found(format!("unknown scenario: {base_id}")))?;
            Scenario::clone_from(&base, id, request.name)
        }
        None => Scenario::new(id, request.name, window),
    };
    store.save_scenario(&scenario).map_err(ApiError::internal)?;
    Ok(ok(ScenarioSummary::from(&scenario)))
}

async fn record_change(
    State(state): State<ApiState>,
    Json(request): Json<ScenarioChangeRequest>,
) -> ApiResult<ScenarioSummary> {
    let store = open_store(&state)?;
    let mut scenario = load_draft(&store, &request.scenario_id)?;
    if store
        .get_resource(&request.resource_id)
        .map_err(ApiError::internal)?
        .is_none()
    {
        return Err(ApiError::not_found(format!(
            "unknown resource: {}",
            request.resource_id
        )));
    }

    let change = match (&request.allocation, &request.remove_allocation_id) {
        (Some(input), None) => {
            let allocation = allocation_from_input(input, &request.resource_id, &state.config);
            allocation
                .validate(&state.config.allocation)
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            AllocationChange::Upsert(allocation)
        }
        (None, Some(allocation_id)) => AllocationChange::Remove {
            allocation_id: allocation_id.clone(),
        },
        _ => {
            return Err(ApiError::bad_request(
                "provide exactly one of allocation or remove_allocation_id",
            ))
        }
    };
    scenario.upsert_resource_change(ResourceChange {
        resource_id: request.resource_id,
        change,
    });
    store.save_scenario(&scenario).map_err(ApiError::internal)?;
    Ok(ok(ScenarioSummary::from(&scenario)))
}

async fn record_timeline_change(
    State(state): State<ApiState>,
    Json(request): Json<TimelineChangeRequest>,
) -> ApiResult<ScenarioSummary> {
    let store = open_store(&state)?;
    let mut scenario = load_draft(&store, &request.scenario_id)?;
    let project = store
        .get_project(&request.project_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("unknown project: {}", request.project_id)))?;
    if request.new_end < request.new_start {
        return Err(ApiError::bad_request(format!(
            "invalid timeline: end {} is before start {}",
            request.new_end, request.new_start
        )));
    }

    scenario.upsert_timeline_change(ProjectTimelineChange {
        project_id: project.id,
        original_start: project.start_date,
        original_end: project.end_date,
        new_start: request.new_start,
        new_end: request.new_end,
        notes: request.notes,
    });
    store.save_scenario(&scenario).map_err(ApiError::internal)?;
    Ok(ok(ScenarioSummary::from(&scenario)))
}

async fn scenario_metrics(
    State(state): State<ApiState>,
    Json(request): Json<ScenarioMetricsRequest>,
) -> ApiResult<ScenarioMetricsResponse> {
    let store = open_store(&state)?;
    let mut scenario = store
        .load_scenario(&request.scenario_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("unknown scenario: {}", request.scenario_id)))?;
    let snapshot = calculate_metrics(&store, &mut scenario, &state.config.allocation)
        .map_err(ApiError::from_engine)?;
    Ok(ok(ScenarioMetricsResponse {
        scenario_id: scenario.id,
        revision: scenario.revision,
        snapshot,
    }))
}

async fn compare(
    State(state): State<ApiState>,
    Json(request): Json<CompareRequest>,
) -> ApiResult<ScenarioComparison> {
    let store = open_store(&state)?;
    let mut categories = Vec::new();
    for raw in &request.metrics {
        categories.push(
            MetricCategory::from_str(raw).map_err(|e| ApiError::bad_request(e.to_string()))?,
        );
    }
    let comparison = compare_scenarios(
        &store,
        &request.scenario_ids,
        &categories,
        &state.config.allocation,
    )
    .map_err(ApiError::from_engine)?;
    Ok(ok(comparison))
}

async fn promote(
    State(state): State<ApiState>,
    Json(request): Json<PromoteRequest>,
) -> ApiResult<PromotionOutcome> {
    let mut store = open_store(&state)?;
    let mut scenario = store
        .load_scenario(&request.scenario_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("unknown scenario: {}", request.scenario_id)))?;
    // A rejection is a successful response carrying the conflict list;
    // only storage failures and input errors become error statuses.
    let outcome = promote_scenario(&mut store, &mut scenario, &state.config.allocation)
        .map_err(ApiError::from_engine)?;
    Ok(ok(outcome))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn open_store(state: &ApiState) -> std::result::Result<PlanStore, ApiError> {
    PlanStore::open(&state.db_path).map_err(ApiError::internal)
}

fn load_draft(store: &PlanStore, scenario_id: &str) -> std::result::Result<Scenario, ApiError> {
    let scenario = store
        .load_scenario(scenario_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("unknown scenario: {scenario_id}")))?;
    if scenario.status == ScenarioStatus::Promoted {
        return Err(ApiError::conflict(format!(
            "scenario {scenario_id} is promoted and can no longer be edited"
        )));
    }
    Ok(scenario)
}

fn allocation_from_input(input: &AllocationInput, resource_id: &str, config: &Config) -> Allocation {
    Allocation {
        id: input
            .id
            .clone()
            .unwrap_or_else(|| format!("alloc-{}", Uuid::new_v4())),
        resource_id: resource_id.to_string(),
        project_id: input.project_id.clone(),
        start_date: input.start_date,
        end_date: input.end_date,
        utilization: input
            .utilization
            .unwrap_or(config.allocation.default_allocation_percentage),
        hourly_rate: input.hourly_rate,
        billable_rate: input.billable_rate,
        total_hours: input.total_hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_utilization_takes_configured_default() {
        let config = Config::default();
        let input = AllocationInput {
            id: None,
            project_id: "proj-1".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            utilization: None,
            hourly_rate: None,
            billable_rate: None,
            total_hours: None,
        };
        let allocation = allocation_from_input(&input, "res-1", &config);
        assert_eq!(allocation.utilization, 100);
        assert!(allocation.id.starts_with("alloc-"));
        assert_eq!(allocation.resource_id, "res-1");
    }
}
