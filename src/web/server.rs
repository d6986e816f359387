//! Axum server exposing the catalog, the compiler and saved reports.
//!
//! Query execution is not offered here: `/api/query/compile` hands back SQL
//! and parameters for an external executor to bind and run.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::catalog::{Entity, EntityCategory, EntityRegistry, Field, Relationship};
use crate::config::{Settings, SettingsError};
use crate::planner::{CompileError, CompileOptions, OutputColumn, ReportCompiler, ValidationWarning};
use crate::report::{ReportRequest, RequestError};
use crate::store::{ReportStore, SavedReport, StoreError, StoreResult};

/// Application state shared across handlers
pub struct AppState {
    pub registry: EntityRegistry,
    pub options: CompileOptions,
    pub store: ReportStore,
    /// Echo compiled SQL in compile responses.
    pub include_sql: bool,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        Ok(Self {
            registry: settings.registry()?,
            options: settings.compiler,
            store: ReportStore::new(settings.storage.resolved_reports_file()?),
            include_sql: settings.server.exposes_sql(),
        })
    }

    fn compiler(&self) -> ReportCompiler<'_> {
        ReportCompiler::new(&self.registry, self.options)
    }
}

/// Build the axum router with all routes
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Catalog
        .route("/api/entities", get(list_entities))
        .route("/api/entities/{id}", get(get_entity))
        .route("/api/entities/{id}/fields", get(get_entity_fields))
        .route(
            "/api/entities/{id}/relationships",
            get(get_entity_relationships),
        )
        // Compilation
        .route("/api/query/preview", post(preview_query))
        .route("/api/query/compile", post(compile_query))
        .route("/api/query/validate", post(validate_query))
        // Saved reports
        .route("/api/reports", get(list_reports).post(save_report))
        .route(
            "/api/reports/{id}",
            get(get_report).put(update_report).delete(delete_report),
        )
        .layer(cors)
        .with_state(state)
}

/// Start the web server
pub async fn serve(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_settings(&settings)?);
    let addr = settings.server.addr();

    info!(
        %addr,
        catalog = state.registry.version(),
        entities = state.registry.len(),
        reports = %state.store.path().display(),
        "starting server"
    );

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

/// Error responses: `{ "error", "kind" }` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    Request(RequestError),
    Compile(CompileError),
    NotFound(String),
    Store(StoreError),
    /// A blocking task panicked or was cancelled.
    Internal(String),
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::Request(err)
    }
}

impl From<CompileError> for ApiError {
    fn from(err: CompileError) -> Self {
        ApiError::Compile(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(format!("Report not found: {id}")),
            other => ApiError::Store(other),
        }
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Request(e) => (StatusCode::BAD_REQUEST, "request", e.to_string()),
            ApiError::Compile(e) => (StatusCode::BAD_REQUEST, e.kind().as_str(), e.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, "storage", e.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = self.parts();
        if status.is_server_error() {
            warn!(%error, "request failed");
        }
        (status, Json(json!({ "error": error, "kind": kind }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn entity_or_404<'a>(registry: &'a EntityRegistry, id: &str) -> Result<&'a Entity, ApiError> {
    registry
        .lookup(id)
        .ok_or_else(|| ApiError::NotFound(format!("Entity not found: {id}")))
}

// ============================================================================
// Catalog API
// ============================================================================

#[derive(Serialize)]
struct EntityList<'a> {
    entities: &'a [Entity],
    categories: &'a [EntityCategory],
}

/// GET /api/entities - All entities and categories
async fn list_entities(State(state): State<Arc<AppState>>) -> Response {
    Json(EntityList {
        entities: state.registry.all(),
        categories: state.registry.categories(),
    })
    .into_response()
}

/// GET /api/entities/{id}
async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let entity = entity_or_404(&state.registry, &id)?;
    Ok(Json(entity).into_response())
}

/// GET /api/entities/{id}/fields
async fn get_entity_fields(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let entity = entity_or_404(&state.registry, &id)?;
    Ok(Json::<&[Field]>(&entity.fields).into_response())
}

#[derive(Serialize)]
struct EntityRelationships<'a> {
    entity_id: &'a str,
    relationships: &'a [Relationship],
    related_entities: Vec<&'a Entity>,
}

/// GET /api/entities/{id}/relationships
async fn get_entity_relationships(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let entity = entity_or_404(&state.registry, &id)?;
    let related_entities = state
        .registry
        .related_entities(&id)
        .into_iter()
        .filter_map(|target| state.registry.lookup(target))
        .collect();

    Ok(Json(EntityRelationships {
        entity_id: &entity.id,
        relationships: &entity.relationships,
        related_entities,
    })
    .into_response())
}

// ============================================================================
// Query API
// ============================================================================

#[derive(Serialize)]
struct PreviewResponse {
    sql: String,
}

/// POST /api/query/preview - SQL with literals inlined, for display
async fn preview_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> ApiResult<PreviewResponse> {
    let config = req.into_config()?;
    let sql = state.compiler().preview(&config)?;
    Ok(Json(PreviewResponse { sql }))
}

#[derive(Serialize)]
struct CompileResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<String>,
    params: Vec<Value>,
    columns: Vec<OutputColumn>,
}

/// POST /api/query/compile - SQL and parameters for an external executor
async fn compile_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> ApiResult<CompileResponse> {
    let config = req.into_config()?;
    let query = state.compiler().compile(&config)?;
    Ok(Json(CompileResponse {
        sql: state.include_sql.then_some(query.sql),
        params: query.params,
        columns: query.columns,
    }))
}

#[derive(Serialize)]
struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

/// POST /api/query/validate - Never fails; reports problems in the body
async fn validate_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> Json<ValidateResponse> {
    let result = req
        .into_config()
        .map_err(ApiError::from)
        .and_then(|config| Ok(state.compiler().validate(&config)?));

    Json(match result {
        Ok(report) => ValidateResponse {
            valid: true,
            sql: Some(report.sql),
            warnings: report
                .warnings
                .iter()
                .map(ValidationWarning::to_string)
                .collect(),
            error: None,
            kind: None,
        },
        Err(err) => {
            let (_, kind, error) = err.parts();
            ValidateResponse {
                valid: false,
                sql: None,
                warnings: Vec::new(),
                error: Some(error),
                kind: Some(kind),
            }
        }
    })
}

// ============================================================================
// Saved Reports API
// ============================================================================

/// Run a store operation off the async workers; file I/O blocks.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&ReportStore) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// GET /api/reports
async fn list_reports(State(state): State<Arc<AppState>>) -> ApiResult<Vec<SavedReport>> {
    Ok(Json(with_store(&state, |store| store.list()).await?))
}

/// POST /api/reports
async fn save_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> ApiResult<SavedReport> {
    req.validate()?;
    Ok(Json(with_store(&state, move |store| store.save(req)).await?))
}

/// GET /api/reports/{id}
async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SavedReport> {
    Ok(Json(with_store(&state, move |store| store.get(&id)).await?))
}

/// PUT /api/reports/{id}
async fn update_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReportRequest>,
) -> ApiResult<SavedReport> {
    req.validate()?;
    Ok(Json(
        with_store(&state, move |store| store.update(&id, req)).await?,
    ))
}

/// DELETE /api/reports/{id}
async fn delete_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    with_store(&state, move |store| store.delete(&id)).await?;
    Ok(Json(json!({ "status": "deleted" })))
}
