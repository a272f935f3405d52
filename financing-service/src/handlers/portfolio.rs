use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::middleware::OwnerContext;
use crate::models::PortfolioSummary;
use crate::startup::AppState;

pub async fn summary(
    State(state): State<AppState>,
    owner: OwnerContext,
) -> Result<Json<PortfolioSummary>, AppError> {
    Ok(Json(
        state.lifecycle.portfolio_summary(&owner.owner_id).await?,
    ))
}
