//! HTTP handler layer
//!
//! - `routes`: route table, handlers and the `ApiError` mapping
//! - `middleware`: request logging, content-type enforcement and CORS
//! - `extract`: caller identity and validated JSON bodies
//!
//! Every JSON response uses the same envelope: `{success, data?, error?, metadata}`.

pub mod extract;
pub mod middleware;
pub mod routes;

pub use extract::{Caller, ValidatedJson};
pub use middleware::{cors_layer, request_logging_middleware, validation_middleware};
pub use routes::{create_router, ApiError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use docket_core::{AuditEntry, BiasCheck, Case, CaseDetail, Ruling, RulingOutcome, User};

/// Standard response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub metadata: ResponseMetadata,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: ResponseMetadata::new(request_id),
        }
    }

    pub fn error(error: ErrorInfo, request_id: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
            metadata: ResponseMetadata::new(request_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable code for programmatic handling
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: String,
    /// RFC 3339
    pub timestamp: String,
    pub version: String,
}

impl ResponseMetadata {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub(crate) fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// Requests

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    /// Trimmed on the way in, so the length rule sees the stored value
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCaseRequest {
    #[validate(length(min = 3, max = 120, message = "Title must be 3-120 characters"))]
    pub title: String,

    #[validate(
        length(min = 5, message = "Narrative must be at least 5 characters"),
        custom = "validate_narrative_words"
    )]
    pub narrative: String,

    #[validate(length(min = 2, max = 80, message = "Locale must be 2-80 characters"))]
    pub locale: String,
}

pub const MAX_NARRATIVE_WORDS: usize = 500;

fn validate_narrative_words(narrative: &str) -> Result<(), ValidationError> {
    let words = narrative.split_whitespace().count();
    if (1..=MAX_NARRATIVE_WORDS).contains(&words) {
        Ok(())
    } else {
        let mut error = ValidationError::new("word_count");
        error.message = Some("Narrative must be between 1 and 500 words".into());
        Err(error)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RuleRequest {
    #[serde(default)]
    pub bias_check: bool,
}

// Responses

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResponse {
    pub id: i64,
    pub title: String,
    pub narrative: String,
    pub locale: String,
    pub created_at: DateTime<Utc>,
}

impl From<Case> for CaseResponse {
    fn from(case: Case) -> Self {
        Self {
            id: case.id,
            title: case.title,
            narrative: case.narrative,
            locale: case.locale,
            created_at: case.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseListResponse {
    pub cases: Vec<CaseResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulingView {
    pub verdict: String,
    pub rationale: String,
    pub plain_explanation: String,
    pub citations: Vec<String>,
    pub risk_flags: Vec<String>,
    pub model_name: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Ruling> for RulingView {
    fn from(ruling: Ruling) -> Self {
        Self {
            verdict: ruling.verdict.to_string(),
            plain_explanation: ruling.plain_explanation(),
            rationale: ruling.rationale,
            citations: ruling.citations,
            risk_flags: ruling.risk_flags,
            model_name: ruling.model_name,
            tokens_in: ruling.tokens_in,
            tokens_out: ruling.tokens_out,
            created_at: ruling.created_at,
            updated_at: ruling.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasCheckView {
    pub bias_score: f64,
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BiasCheck> for BiasCheckView {
    fn from(check: BiasCheck) -> Self {
        Self {
            bias_score: check.bias_score,
            notes: check.notes,
            created_at: check.created_at,
            updated_at: check.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDetailResponse {
    #[serde(flatten)]
    pub case: CaseResponse,
    pub ruling: Option<RulingView>,
    pub bias_check: Option<BiasCheckView>,
}

impl From<CaseDetail> for CaseDetailResponse {
    fn from(detail: CaseDetail) -> Self {
        Self {
            case: detail.case.into(),
            ruling: detail.ruling.map(Into::into),
            bias_check: detail.bias_check.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulingResponse {
    pub ruling: RulingView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_check: Option<BiasCheckView>,
}

impl From<RulingOutcome> for RulingResponse {
    fn from(outcome: RulingOutcome) -> Self {
        Self {
            ruling: outcome.ruling.into(),
            bias_check: outcome.bias_check.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryResponse {
    pub id: i64,
    pub action: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<AuditEntry> for LogEntryResponse {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id,
            action: entry.action,
            metadata: entry.metadata,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<LogEntryResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub components: ComponentHealth,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Repository answered a read
    pub storage: bool,
    /// "sled" or "memory"
    pub storage_backend: String,
    pub completion_model: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::Verdict;

    fn case_request(narrative: &str) -> CreateCaseRequest {
        CreateCaseRequest {
            title: "Stop sign".to_string(),
            narrative: narrative.to_string(),
            locale: "California".to_string(),
        }
    }

    #[test]
    fn test_api_response_envelopes() {
        let ok = ApiResponse::success("data".to_string(), "req-1".to_string());
        assert!(ok.success);
        assert!(ok.error.is_none());

        let err = ApiResponse::<()>::error(ErrorInfo::new("NOT_FOUND", "Case not found"), "req-2".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert!(json.get("data").is_none());
        assert_eq!(json["metadata"]["request_id"], "req-2");
    }

    #[test]
    fn test_case_request_validation() {
        assert!(case_request("I stopped fully at the sign.").validate().is_ok());
        assert!(case_request("shrt").validate().is_err());
        assert!(case_request("      ").validate().is_err());

        let long = vec!["word"; MAX_NARRATIVE_WORDS + 1].join(" ");
        let errors = case_request(&long).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("narrative"));

        let limit = vec!["word"; MAX_NARRATIVE_WORDS].join(" ");
        assert!(case_request(&limit).validate().is_ok());

        let mut bad = case_request("A valid narrative.");
        bad.title = "ab".to_string();
        bad.locale = "X".to_string();
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
        assert!(errors.field_errors().contains_key("locale"));
    }

    #[test]
    fn test_username_validation() {
        assert!(CreateUserRequest { username: "al".to_string() }.validate().is_err());
        assert!(CreateUserRequest { username: "alice".to_string() }.validate().is_ok());
        assert!(CreateUserRequest { username: "a".repeat(51) }.validate().is_err());
    }

    #[test]
    fn test_username_is_trimmed_before_validation() {
        let request: CreateUserRequest =
            serde_json::from_value(serde_json::json!({ "username": "  alice  " })).unwrap();
        assert_eq!(request.username, "alice");
        assert!(request.validate().is_ok());

        let request: CreateUserRequest =
            serde_json::from_value(serde_json::json!({ "username": "  ab  " })).unwrap();
        assert!(request.validate().is_err());

        let request: CreateUserRequest =
            serde_json::from_value(serde_json::json!({ "username": "     " })).unwrap();
        assert_eq!(request.username, "");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_ruling_view_includes_plain_explanation() {
        let now = Utc::now();
        let ruling = Ruling {
            id: 1,
            case_id: 1,
            verdict: Verdict::Reduced,
            rationale: "One. Two. Three.".to_string(),
            citations: vec![],
            risk_flags: vec![],
            model_name: "m".to_string(),
            tokens_in: 0,
            tokens_out: 0,
            created_at: now,
            updated_at: now,
        };
        let view = RulingView::from(ruling);
        assert_eq!(view.verdict, "reduced");
        assert_eq!(view.plain_explanation, "One. Two.");
    }
}
