//! Owner scoping for every business route.
//!
//! The caller's identity arrives in `X-Owner-ID`, set by whatever sits in
//! front of this service. Every record read or written by a request is
//! scoped to that owner.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const OWNER_ID_HEADER: &str = "X-Owner-ID";

#[derive(Debug, Clone)]
pub struct OwnerContext {
    pub owner_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for OwnerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner_id = parts
            .headers
            .get(OWNER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing {} header", OWNER_ID_HEADER))
            })?;

        tracing::Span::current().record("owner_id", owner_id);

        Ok(OwnerContext {
            owner_id: owner_id.to_string(),
        })
    }
}
