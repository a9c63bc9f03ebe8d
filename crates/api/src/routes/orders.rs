//! Order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use checkout::StoredOrder;
use common::{DocumentId, UserId};
use document_store::DocumentStore;
use domain::OrderStatus;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
}

/// GET /users/:user_id/orders?status=pending|delivered
#[tracing::instrument(skip(state, query))]
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<StoredOrder>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()?;

    let orders = state
        .orders
        .list_for_user(&UserId::new(user_id), status)
        .await?;
    Ok(Json(orders))
}

/// GET /orders/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<StoredOrder>, ApiError> {
    state
        .orders
        .get(&DocumentId::new(id.clone()))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))
}
