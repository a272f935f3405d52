use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::ListResponse;
use crate::middleware::OwnerContext;
use crate::models::Settlement;
use crate::startup::AppState;

pub async fn list_settlements(
    State(state): State<AppState>,
    owner: OwnerContext,
) -> Result<Json<ListResponse<Settlement>>, AppError> {
    let settlements = state.lifecycle.list_settlements(&owner.owner_id).await?;
    Ok(Json(settlements.into()))
}
