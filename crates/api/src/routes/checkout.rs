//! Two-step checkout over HTTP.
//!
//! `POST /users/:user_id/checkout` prices the order, opens a payment session
//! and answers `202` with the payment sheet configuration. The client
//! presents the sheet and reports its result to
//! `POST /users/:user_id/checkout/result`, which answers with the outcome.
//! A checkout that ends before a sheet is shown (backend error) answers the
//! first request directly.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{
    CheckoutError, CheckoutOutcome, CheckoutSource, PaymentSheetConfig, PaymentSheetResult,
};
use common::UserId;
use document_store::DocumentStore;
use domain::{Money, Product};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{AppState, PendingCheckout, UserSession};

#[derive(Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CheckoutRequest {
    /// Every line currently in the cart.
    Cart,

    /// Buy one product directly.
    Product {
        product_id: String,
        title: String,
        price: Decimal,
        #[serde(default)]
        image_url: String,
        quantity: u32,
    },
}

#[derive(Serialize)]
pub struct CheckoutStarted {
    pub status: &'static str,
    pub payment_sheet: PaymentSheetConfig,
}

/// POST /users/:user_id/checkout
#[tracing::instrument(skip(state, req))]
pub async fn start<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Response, ApiError> {
    let session = state.session(&UserId::new(user_id)).await?;

    let mut pending = session.pending.lock().await;
    if pending.is_some() || session.checkout.is_in_flight() {
        return Err(CheckoutError::CheckoutInProgress.into());
    }

    let source = match req {
        CheckoutRequest::Cart => CheckoutSource::Cart(session.cart.snapshot()),
        CheckoutRequest::Product {
            product_id,
            title,
            price,
            image_url,
            quantity,
        } => CheckoutSource::Product {
            product: Product::new(product_id, title, Money::new(price), image_url),
            quantity,
        },
    };
    let addresses = session.addresses.list().await?;

    let mut task = spawn_checkout(&session, source, addresses, &state);
    tokio::select! {
        joined = &mut task => {
            let outcome = joined.map_err(|e| ApiError::Internal(e.to_string()))??;
            Ok(Json(outcome).into_response())
        }
        presented = session.sheet.next_presentation() => {
            let Some(payment_sheet) = presented else {
                task.abort();
                return Err(ApiError::Internal("payment sheet closed".to_string()));
            };
            *pending = Some(task);
            let started = CheckoutStarted {
                status: "awaiting_payment",
                payment_sheet,
            };
            Ok((StatusCode::ACCEPTED, Json(started)).into_response())
        }
    }
}

/// POST /users/:user_id/checkout/result: report the payment sheet's
/// terminal result and wait for the checkout to finish.
#[tracing::instrument(skip(state, result))]
pub async fn submit_result<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(result): Json<PaymentSheetResult>,
) -> Result<Json<CheckoutOutcome>, ApiError> {
    let session = state.session(&UserId::new(user_id)).await?;
    let Some(task) = session.pending.lock().await.take() else {
        return Err(ApiError::Conflict(
            "No checkout is awaiting a payment result".to_string(),
        ));
    };

    if !session.sheet.resolve(result) {
        tracing::warn!("payment sheet was no longer waiting for a result");
    }

    let outcome = task
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(outcome))
}

fn spawn_checkout<S: DocumentStore + 'static>(
    session: &UserSession<S>,
    source: CheckoutSource,
    addresses: Vec<domain::Address>,
    state: &AppState<S>,
) -> PendingCheckout {
    let checkout = Arc::clone(&session.checkout);
    let charges = state.charges;
    tokio::spawn(async move { checkout.checkout(source, &addresses, &charges).await })
}
