use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{AdvanceResponse, ListResponse, MarkPaidResponse};
use crate::middleware::OwnerContext;
use crate::startup::AppState;

/// Owner's advances with display status derived at request time.
pub async fn list_advances(
    State(state): State<AppState>,
    owner: OwnerContext,
) -> Result<Json<ListResponse<AdvanceResponse>>, AppError> {
    let now = state.lifecycle.now();
    let advances = state.lifecycle.list_advances(&owner.owner_id).await?;
    let items: Vec<AdvanceResponse> = advances
        .into_iter()
        .map(|a| AdvanceResponse::at(a, now))
        .collect();
    Ok(Json(items.into()))
}

pub async fn get_advance(
    State(state): State<AppState>,
    owner: OwnerContext,
    Path(advance_id): Path<String>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let advance = state
        .lifecycle
        .get_advance(&owner.owner_id, &advance_id)
        .await?;
    Ok(Json(AdvanceResponse::at(advance, state.lifecycle.now())))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    owner: OwnerContext,
    Path(advance_id): Path<String>,
) -> Result<Json<MarkPaidResponse>, AppError> {
    let settlement = state
        .lifecycle
        .mark_advance_paid(&owner.owner_id, &advance_id)
        .await?;

    Ok(Json(MarkPaidResponse {
        success: true,
        settlement,
    }))
}
