//! Invoice ingestion, lookup and offer acceptance.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    AcceptOfferRequest, ExtractInvoiceRequest, InvoiceResponse, ListResponse, ManualInvoiceRequest,
};
use crate::middleware::OwnerContext;
use crate::models::Offer;
use crate::services::Document;
use crate::startup::AppState;

/// Ingest a document through the configured extractor.
///
/// A failed or untrusted extraction answers 422 with a `manual_entry`
/// fallback and whatever draft the extractor produced.
pub async fn extract_invoice(
    State(state): State<AppState>,
    owner: OwnerContext,
    Json(payload): Json<ExtractInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    payload.validate()?;

    let bytes = general_purpose::STANDARD
        .decode(payload.content_base64.as_bytes())
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("content_base64 is not valid base64: {}", e)))?;

    let document = Document {
        filename: payload.filename,
        content_type: payload.content_type,
        bytes,
    };

    let invoice = state
        .lifecycle
        .create_invoice_from_extraction(&owner.owner_id, document, payload.signals.into())
        .await?;

    Ok((StatusCode::CREATED, Json(invoice.into())))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    owner: OwnerContext,
    Json(payload): Json<ManualInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    payload.validate()?;

    let invoice = state
        .lifecycle
        .create_invoice_manual(&owner.owner_id, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(invoice.into())))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    owner: OwnerContext,
    Path(invoice_id): Path<String>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .lifecycle
        .get_invoice(&owner.owner_id, &invoice_id)
        .await?;
    Ok(Json(invoice.into()))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    owner: OwnerContext,
) -> Result<Json<ListResponse<InvoiceResponse>>, AppError> {
    let invoices = state.lifecycle.list_invoices(&owner.owner_id).await?;
    let items: Vec<InvoiceResponse> = invoices.into_iter().map(Into::into).collect();
    Ok(Json(items.into()))
}

pub async fn get_offer(
    State(state): State<AppState>,
    owner: OwnerContext,
    Path(invoice_id): Path<String>,
) -> Result<Json<Offer>, AppError> {
    let offer = state
        .lifecycle
        .preview_offer(&owner.owner_id, &invoice_id)
        .await?;
    Ok(Json(offer))
}

pub async fn accept_offer(
    State(state): State<AppState>,
    owner: OwnerContext,
    Path(invoice_id): Path<String>,
    Json(payload): Json<AcceptOfferRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    payload.validate()?;

    tracing::info!(
        invoice_id = %invoice_id,
        owner_id = %owner.owner_id,
        advance_amount = payload.advance_amount,
        "Accepting offer"
    );

    let invoice = state
        .lifecycle
        .accept_offer(&owner.owner_id, &invoice_id, payload.into())
        .await?;

    Ok(Json(invoice.into()))
}
