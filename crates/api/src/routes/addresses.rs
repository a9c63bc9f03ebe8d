//! Address book endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::UserId;
use document_store::DocumentStore;
use domain::Address;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /users/:user_id/addresses
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Address>>, ApiError> {
    let session = state.session(&UserId::new(user_id)).await?;
    Ok(Json(session.addresses.list().await?))
}

/// POST /users/:user_id/addresses: insert or replace the address at the
/// same location.
#[tracing::instrument(skip(state, address))]
pub async fn save<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(address): Json<Address>,
) -> Result<(StatusCode, Json<Address>), ApiError> {
    if address.address_line.trim().is_empty() || address.postal_code.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "address_line and postal_code are required".to_string(),
        ));
    }
    let session = state.session(&UserId::new(user_id)).await?;
    let saved = session.addresses.save(address).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /users/:user_id/addresses/default: the address orders ship to.
#[tracing::instrument(skip(state))]
pub async fn get_default<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Address>, ApiError> {
    let session = state.session(&UserId::new(user_id.clone())).await?;
    session
        .addresses
        .default_address()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No default address for user {user_id}")))
}

/// PUT /users/:user_id/addresses/default: flag a saved address as the
/// default and clear the flag on every other one.
#[tracing::instrument(skip(state, address))]
pub async fn set_default<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(address): Json<Address>,
) -> Result<StatusCode, ApiError> {
    let session = state.session(&UserId::new(user_id)).await?;
    session.addresses.set_default(&address).await?;
    Ok(StatusCode::NO_CONTENT)
}
