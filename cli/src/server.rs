use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use sous_core::context::ExecutionContext;
use sous_core::error::{EngineError, ToolError, ToolFailure};
use sous_core::models::{FrequentMeal, MealEntry};
use sous_core::service::{AssistantSnapshot, MealLog, SousService};
use sous_core::tools::ToolDefinition;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    service: Arc<SousService>,
    api_key: Option<String>,
}

// --- Request / Response types ---

/// Body of a tool call: who is calling and the tool's own arguments.
#[derive(Deserialize)]
struct InvokeRequest {
    #[serde(default)]
    context: Value,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMealRequest {
    user_id: String,
    timezone: Option<String>,
    #[serde(flatten)]
    meal: MealLog,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: Option<String>,
    timezone: Option<String>,
}

impl UserQuery {
    fn context(&self) -> Result<ExecutionContext, ApiError> {
        Ok(ExecutionContext::new(
            self.user_id.as_deref().unwrap_or_default(),
            self.timezone.as_deref(),
        )?)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MissingIdentity => Self::BadRequest(err.to_string()),
            EngineError::Storage(e) => Self::Internal(e),
        }
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Failure(ToolFailure::Validation(msg)) => Self::BadRequest(msg),
            ToolError::Failure(ToolFailure::NotFound(msg)) => Self::NotFound(msg),
            ToolError::Storage(e) => Self::Internal(e),
        }
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDefinition>> {
    Json(state.service.tool_definitions())
}

/// Tool results are always 200: a `success: false` body is an answer for
/// the model, not a transport error.
async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = state.service.invoke(&name, req.arguments, &req.context)?;
    Ok(Json(result))
}

async fn create_meal(
    State(state): State<AppState>,
    Json(req): Json<CreateMealRequest>,
) -> Result<(StatusCode, Json<MealEntry>), ApiError> {
    let ctx = ExecutionContext::new(&req.user_id, req.timezone.as_deref())?;
    let entry = state.service.log_meal(&ctx, req.meal)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn frequent_meals(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<FrequentMeal>>, ApiError> {
    let ctx = query.context()?;
    Ok(Json(state.service.frequent_meals(&ctx)?))
}

async fn snapshot(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<AssistantSnapshot>, ApiError> {
    let ctx = query.context()?;
    Ok(Json(state.service.snapshot(&ctx)?))
}

// --- Server setup ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/tools", get(list_tools))
        .route("/api/tools/{name}", post(invoke_tool))
        .route("/api/meals", post(create_meal))
        .route("/api/meals/frequent", get(frequent_meals))
        .route("/api/snapshot", get(snapshot))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

pub async fn start_server(
    service: SousService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    new_api_key: bool,
) -> anyhow::Result<()> {
    let state = AppState {
        service: Arc::new(service),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    match api_key {
        Some(ref key) if new_api_key => {
            eprintln!("Generated new API key: {key}");
            eprintln!("Include in requests: Authorization: Bearer {key}");
        }
        Some(ref key) => {
            let tail = key.get(key.len().saturating_sub(4)..).unwrap_or_default();
            info!("API key ends in ...{tail} (see api_key file in data directory)");
        }
        None => warn!("authentication disabled (--no-auth), the API is open to anyone"),
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        warn!(
            "listening on {bind} with no authentication; any device on your network can call the tools"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    info!("listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
