//! Route table and HTTP handlers

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use docket_core::audit::{AuditSink, ACTION_CASE_CREATE, ACTION_USER_CREATE};
use docket_core::repository::DEFAULT_AUDIT_PAGE;
use docket_core::{CaseId, NewCase, RuleOptions, RulingError, StorageError};

use super::extract::{Caller, ValidatedJson};
use super::middleware::{cors_layer, request_logging_middleware, validation_middleware};
use super::{
    new_request_id, ApiResponse, CaseDetailResponse, CaseListResponse, CaseResponse,
    ComponentHealth, CreateCaseRequest, CreateUserRequest, ErrorInfo, HealthResponse,
    HealthStatus, LogEntryResponse, LogsResponse, RuleRequest, RulingResponse, UserResponse,
};
use crate::state::AppState;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    ValidationFailed(validator::ValidationErrors),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    RateLimited(String),
    /// Completion service failure; `code` names the failure kind
    Upstream { code: &'static str, message: String },
    InternalError(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::RateLimited(_) => "RATE_LIMITED",
            ApiError::Upstream { code, .. } => *code,
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn validation_details(errors: &validator::ValidationErrors) -> Value {
    let fields: serde_json::Map<String, Value> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages: Vec<String> = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            (field.to_string(), json!(messages))
        })
        .collect();
    json!({ "fields": fields })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_info = match &self {
            ApiError::ValidationFailed(errors) => {
                ErrorInfo::new(self.error_code(), "Request validation failed")
                    .with_details(validation_details(errors))
            }
            ApiError::Upstream { message, .. } => ErrorInfo::new(self.error_code(), message),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::RateLimited(msg)
            | ApiError::InternalError(msg) => ErrorInfo::new(self.error_code(), msg),
        };

        let response = ApiResponse::<()>::error(error_info, new_request_id());

        (status, Json(response)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound("Record not found".to_string()),
            StorageError::Conflict(msg) => ApiError::Conflict(msg),
            other => {
                tracing::error!(error = %other, "Storage failure");
                ApiError::InternalError("Internal storage error".to_string())
            }
        }
    }
}

impl From<RulingError> for ApiError {
    fn from(err: RulingError) -> Self {
        match err {
            RulingError::NotFound(_) => ApiError::NotFound("Case not found".to_string()),
            RulingError::RateLimited(_) => {
                ApiError::RateLimited("Rate limit exceeded, try again later".to_string())
            }
            RulingError::Upstream(detail) => {
                tracing::warn!(detail = %detail, "Completion service failed");
                ApiError::Upstream {
                    code: "UPSTREAM_ERROR",
                    message: "The ruling service is unavailable".to_string(),
                }
            }
            RulingError::MalformedResponse(detail) => {
                tracing::warn!(detail = %detail, "Completion returned malformed JSON");
                ApiError::Upstream {
                    code: "MALFORMED_RESPONSE",
                    message: "The ruling service returned an unreadable response".to_string(),
                }
            }
            RulingError::IncompleteResponse(detail) => {
                tracing::warn!(detail = %detail, "Completion response missing fields");
                ApiError::Upstream {
                    code: "INCOMPLETE_RESPONSE",
                    message: "The ruling service returned an incomplete response".to_string(),
                }
            }
            RulingError::Storage(err) => err.into(),
        }
    }
}

fn case_id_from(path: Result<Path<CaseId>, PathRejection>) -> Result<CaseId, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::BadRequest("case_id must be an integer".to_string()))
}

/// Create the router with all routes and layers
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origin);

    Router::new()
        // Service endpoints
        .route("/api/health", get(health_check))
        .route("/metrics", get(metrics))
        // Users
        .route("/api/users", post(create_user))
        .route("/api/users/me", get(current_user))
        // Cases and rulings
        .route("/api/cases", post(create_case).get(list_cases))
        .route("/api/cases/:case_id", get(get_case))
        .route("/api/cases/:case_id/rule", post(rule_case))
        // Audit
        .route("/api/logs", get(list_logs))
        .layer(middleware::from_fn(validation_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage = match state.repository.find_user(0).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            false
        }
    };

    let status = if storage {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    Json(HealthResponse {
        status,
        components: ComponentHealth {
            storage,
            storage_backend: state.storage_backend.as_str().to_string(),
            completion_model: state.completion_model.clone(),
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.encode_text().map_err(|e| {
        tracing::error!(error = %e, "Failed to encode metrics");
        ApiError::InternalError("Failed to encode metrics".to_string())
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let request_id = new_request_id();
    let user = state.repository.create_user(&request.username).await?;

    tracing::info!(user_id = user.id, "User registered");
    state.audit.record(
        user.id,
        ACTION_USER_CREATE,
        json!({ "username": user.username }),
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(user.into(), request_id)),
    ))
}

/// GET /api/users/me
pub async fn current_user(Caller(user): Caller) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::success(user.into(), new_request_id()))
}

/// POST /api/cases
pub async fn create_case(
    State(state): State<AppState>,
    Caller(user): Caller,
    ValidatedJson(request): ValidatedJson<CreateCaseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CaseResponse>>), ApiError> {
    let request_id = new_request_id();
    let case = state
        .repository
        .create_case(
            user.id,
            NewCase {
                title: request.title,
                narrative: request.narrative,
                locale: request.locale,
            },
        )
        .await?;

    tracing::info!(user_id = user.id, case_id = case.id, "Case filed");
    state.audit.record(
        user.id,
        ACTION_CASE_CREATE,
        json!({ "case_id": case.id, "title": case.title }),
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(case.into(), request_id)),
    ))
}

/// GET /api/cases
pub async fn list_cases(
    State(state): State<AppState>,
    Caller(user): Caller,
) -> Result<Json<ApiResponse<CaseListResponse>>, ApiError> {
    let cases = state.repository.list_cases(user.id).await?;
    let response = CaseListResponse {
        cases: cases.into_iter().map(Into::into).collect(),
    };
    Ok(Json(ApiResponse::success(response, new_request_id())))
}

/// GET /api/cases/:case_id
pub async fn get_case(
    State(state): State<AppState>,
    Caller(user): Caller,
    path: Result<Path<CaseId>, PathRejection>,
) -> Result<Json<ApiResponse<CaseDetailResponse>>, ApiError> {
    let case_id = case_id_from(path)?;
    let detail = state
        .repository
        .case_detail(case_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Case not found".to_string()))?;
    Ok(Json(ApiResponse::success(detail.into(), new_request_id())))
}

/// POST /api/cases/:case_id/rule
///
/// Generates (or regenerates) the ruling, optionally followed by a bias check.
pub async fn rule_case(
    State(state): State<AppState>,
    Caller(user): Caller,
    path: Result<Path<CaseId>, PathRejection>,
    ValidatedJson(request): ValidatedJson<RuleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RulingResponse>>), ApiError> {
    let request_id = new_request_id();
    let case_id = case_id_from(path)?;

    let outcome = state
        .orchestrator
        .rule_case(
            user.id,
            case_id,
            RuleOptions {
                bias_check: request.bias_check,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(outcome.into(), request_id)),
    ))
}

/// GET /api/logs
pub async fn list_logs(
    State(state): State<AppState>,
    Caller(user): Caller,
) -> Result<Json<ApiResponse<LogsResponse>>, ApiError> {
    let entries = state.repository.list_audit(user.id, DEFAULT_AUDIT_PAGE).await?;
    let response = LogsResponse {
        logs: entries.into_iter().map(LogEntryResponse::from).collect(),
    };
    Ok(Json(ApiResponse::success(response, new_request_id())))
}
