//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart::CartError;
use checkout::CheckoutError;
use document_store::StoreError;
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The request clashes with the session's current state.
    Conflict(String),
    Domain(DomainError),
    Cart(CartError),
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Decode(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        DomainError::InvalidQuantity { .. }
        | DomainError::InvalidPrice { .. }
        | DomainError::UnknownOrderStatus(_) => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

fn store_error_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, String) {
    match err {
        CartError::AddressNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        CartError::Store(ref store) => (store_error_status(store), err.to_string()),
        CartError::Domain(domain) => domain_error_to_response(domain),
        CartError::Decode(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::CheckoutInProgress | CheckoutError::PaymentInProgress => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::Store(ref store) => (store_error_status(store), err.to_string()),
        CheckoutError::Domain(domain) => domain_error_to_response(domain),
        CheckoutError::Cart(cart) => cart_error_to_response(cart),
        CheckoutError::Decode(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_checkout_errors_map_to_status() {
        assert_eq!(status_of(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(CheckoutError::CheckoutInProgress),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CheckoutError::Store(StoreError::Unavailable("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_cart_errors_map_to_status() {
        let missing = CartError::AddressNotFound {
            address_line: "1 Main St".into(),
            postal_code: "411001".into(),
        };
        assert_eq!(status_of(missing), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(CartError::Domain(DomainError::InvalidQuantity { quantity: 0 })),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unknown_status_is_bad_request() {
        assert_eq!(
            status_of(DomainError::UnknownOrderStatus("shipped".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
