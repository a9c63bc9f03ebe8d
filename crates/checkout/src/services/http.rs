//! Payment backend reached over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use serde::Serialize;

use super::backend::{PaymentBackend, PaymentSession};
use crate::error::PaymentError;

/// Upper bound on one payment-session request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct PaymentSheetRequest {
    /// Whole currency units, as a decimal string.
    amount: String,
}

/// Client for a backend exposing `POST /payment-sheet`.
///
/// The request body is `{"amount": "<units>"}`; the response carries
/// `customer`, `ephemeralKey`, `paymentIntent` and `publishableKey`.
#[derive(Debug, Clone)]
pub struct HttpPaymentBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPaymentBackend {
    /// Creates a client for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::Unexpected(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a backend using an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PaymentBackend for HttpPaymentBackend {
    #[tracing::instrument(skip(self), fields(amount = %amount))]
    async fn create_payment_session(&self, amount: Money) -> Result<PaymentSession, PaymentError> {
        let units = amount
            .whole_units()
            .ok_or_else(|| PaymentError::Unexpected(format!("amount out of range: {amount}")))?;

        let url = format!("{}/payment-sheet", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&PaymentSheetRequest {
                amount: units.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = if body.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                body
            };
            tracing::warn!(status = status.as_u16(), "payment backend rejected request");
            return Err(PaymentError::Server {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<PaymentSession>()
            .await
            .map_err(|e| PaymentError::Unexpected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let backend = HttpPaymentBackend::new("http://localhost:8081/").unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8081");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(PaymentSheetRequest {
            amount: "3893".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"amount": "3893"}));
    }
}
