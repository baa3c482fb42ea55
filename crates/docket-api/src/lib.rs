//! Docket REST API
//!
//! Axum server exposing case management and ruling generation over HTTP.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Service health
//! - `GET /metrics` - Prometheus metrics
//! - `POST /api/users` - Register a user
//! - `GET /api/users/me` - The calling user
//! - `POST /api/cases` - File a case
//! - `GET /api/cases` - The caller's cases, newest first
//! - `GET /api/cases/:case_id` - Case with its ruling and bias check
//! - `POST /api/cases/:case_id/rule` - Generate or regenerate the ruling
//! - `GET /api/logs` - The caller's recent audit entries
//!
//! Callers identify themselves with the `X-User-Id` header, set by whatever
//! authenticates requests in front of this service.

pub mod config;
pub mod handler;
pub mod state;

pub use config::{LogFormat, ServiceConfig};
pub use handler::{create_router, ApiError, ApiResponse, ErrorInfo};
pub use state::{AppState, StartupError, StateParts, StorageBackend};
