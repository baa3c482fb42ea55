//! Request extractors
//!
//! `Caller` resolves the `X-User-Id` header to a stored user and rejects with
//! 401 otherwise. `ValidatedJson` deserializes a JSON body and runs its
//! `validator` rules, rejecting with 400.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use docket_core::User;

use super::ApiError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct Caller(pub User);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                ApiError::Unauthorized("X-User-Id header is required and must be an integer".to_string())
            })?;

        match state.repository.find_user(user_id).await? {
            Some(user) => Ok(Caller(user)),
            None => {
                tracing::debug!(user_id = user_id, "Unknown caller");
                Err(ApiError::Unauthorized("Unknown user".to_string()))
            }
        }
    }
}

/// JSON body that passed its `Validate` rules
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate().map_err(ApiError::ValidationFailed)?;
        Ok(ValidatedJson(value))
    }
}
