//! Cart read and mutation endpoints.
//!
//! Mutations answer with what was written; the cart itself is read back
//! from the live snapshot, which catches up once the store notifies.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use cart::{CartMutation, QuantityChange};
use common::UserId;
use document_store::DocumentStore;
use domain::{CartLine, CartSnapshot, Money, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub image_url: String,
}

fn one() -> u32 {
    1
}

// -- Response types --

#[derive(Serialize)]
pub struct MutationResponse {
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<CartMutation> for MutationResponse {
    fn from(mutation: CartMutation) -> Self {
        let (result, quantity, reason) = match mutation {
            CartMutation::Inserted => ("inserted", None, None),
            CartMutation::QuantityChanged { quantity } => {
                ("quantity_changed", Some(quantity), None)
            }
            CartMutation::Removed => ("removed", None, None),
            CartMutation::Missing => ("missing", None, None),
            CartMutation::Failed { reason } => ("failed", None, Some(reason)),
        };
        Self {
            result,
            quantity,
            reason,
        }
    }
}

// -- Handlers --

/// GET /users/:user_id/cart: the latest cart snapshot.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartSnapshot>, ApiError> {
    let session = state.session(&UserId::new(user_id)).await?;
    Ok(Json(session.cart.snapshot()))
}

/// POST /users/:user_id/cart/items: add a product, or one more unit of it.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let line = CartLine::new(
        req.product_id,
        req.name,
        Money::new(req.price),
        req.quantity,
        req.image_url,
    )?;
    let session = state.session(&UserId::new(user_id)).await?;
    Ok(Json(session.cart.add_item(line).await.into()))
}

/// POST /users/:user_id/cart/items/:product_id/increment
#[tracing::instrument(skip(state))]
pub async fn increment<S: DocumentStore + 'static>(
    state: State<Arc<AppState<S>>>,
    path: Path<(String, String)>,
) -> Result<Json<MutationResponse>, ApiError> {
    change_quantity(state, path, QuantityChange::Increment).await
}

/// POST /users/:user_id/cart/items/:product_id/decrement: removes the line
/// at one unit.
#[tracing::instrument(skip(state))]
pub async fn decrement<S: DocumentStore + 'static>(
    state: State<Arc<AppState<S>>>,
    path: Path<(String, String)>,
) -> Result<Json<MutationResponse>, ApiError> {
    change_quantity(state, path, QuantityChange::Decrement).await
}

/// DELETE /users/:user_id/cart/items/:product_id
#[tracing::instrument(skip(state))]
pub async fn remove<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> Result<Json<MutationResponse>, ApiError> {
    let session = state.session(&UserId::new(user_id)).await?;
    let mutation = session.cart.remove_item(&ProductId::new(product_id)).await;
    Ok(Json(mutation.into()))
}

async fn change_quantity<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, product_id)): Path<(String, String)>,
    change: QuantityChange,
) -> Result<Json<MutationResponse>, ApiError> {
    let session = state.session(&UserId::new(user_id)).await?;
    let mutation = session
        .cart
        .change_quantity(&ProductId::new(product_id), change)
        .await;
    Ok(Json(mutation.into()))
}
