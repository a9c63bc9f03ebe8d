//! Payment backend trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::Money;
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

/// Credentials for one payment attempt, as issued by the backend.
///
/// Lives only between the request and the attempt's terminal result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    #[serde(rename = "customer")]
    pub customer_ref: String,

    #[serde(rename = "ephemeralKey")]
    pub ephemeral_key_ref: String,

    /// Client secret of the payment intent.
    #[serde(rename = "paymentIntent")]
    pub payment_intent_ref: String,

    #[serde(rename = "publishableKey")]
    pub publishable_key_ref: String,
}

/// Trait for the remote service that issues payment sessions.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Creates a payment session charging `amount`.
    async fn create_payment_session(&self, amount: Money) -> Result<PaymentSession, PaymentError>;
}

#[async_trait]
impl<T: PaymentBackend + ?Sized> PaymentBackend for Arc<T> {
    async fn create_payment_session(&self, amount: Money) -> Result<PaymentSession, PaymentError> {
        (**self).create_payment_session(amount).await
    }
}

#[derive(Debug, Default)]
struct InMemoryBackendState {
    requested: Vec<Money>,
    next_id: u32,
    failure: Option<PaymentError>,
}

/// In-memory payment backend for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentBackend {
    state: Arc<RwLock<InMemoryBackendState>>,
}

impl InMemoryPaymentBackend {
    /// Creates a new in-memory payment backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to fail every request with a server error.
    pub fn set_fail_on_request(&self, fail: bool) {
        let failure = fail.then(|| PaymentError::Server {
            status: 500,
            body: "payment backend unavailable".to_string(),
        });
        self.set_failure(failure);
    }

    /// Configures the error returned by every request, or none.
    pub fn set_failure(&self, failure: Option<PaymentError>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .failure = failure;
    }

    /// Returns the number of requests received, failed ones included.
    pub fn request_count(&self) -> usize {
        self.requested_amounts().len()
    }

    /// Returns every amount requested, in order.
    pub fn requested_amounts(&self) -> Vec<Money> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .requested
            .clone()
    }
}

#[async_trait]
impl PaymentBackend for InMemoryPaymentBackend {
    async fn create_payment_session(&self, amount: Money) -> Result<PaymentSession, PaymentError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.requested.push(amount);

        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }

        state.next_id += 1;
        let n = state.next_id;
        Ok(PaymentSession {
            customer_ref: format!("cus_{n:04}"),
            ephemeral_key_ref: format!("ek_{n:04}"),
            payment_intent_ref: format!("pi_{n:04}_secret"),
            publishable_key_ref: "pk_test".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sequential_sessions() {
        let backend = InMemoryPaymentBackend::new();

        let s1 = backend
            .create_payment_session(Money::from_units(100))
            .await
            .unwrap();
        let s2 = backend
            .create_payment_session(Money::from_units(200))
            .await
            .unwrap();

        assert_eq!(s1.payment_intent_ref, "pi_0001_secret");
        assert_eq!(s2.customer_ref, "cus_0002");
        assert_eq!(
            backend.requested_amounts(),
            vec![Money::from_units(100), Money::from_units(200)]
        );
    }

    #[tokio::test]
    async fn test_fail_on_request() {
        let backend = InMemoryPaymentBackend::new();
        backend.set_fail_on_request(true);

        let result = backend.create_payment_session(Money::from_units(100)).await;
        assert!(matches!(result, Err(PaymentError::Server { status: 500, .. })));
        assert_eq!(backend.request_count(), 1);

        backend.set_fail_on_request(false);
        assert!(
            backend
                .create_payment_session(Money::from_units(100))
                .await
                .is_ok()
        );
    }

    #[test]
    fn test_session_wire_names() {
        let session: PaymentSession = serde_json::from_value(json!({
            "customer": "cus_1",
            "ephemeralKey": "ek_1",
            "paymentIntent": "pi_1_secret_2",
            "publishableKey": "pk_live"
        }))
        .unwrap();

        assert_eq!(session.customer_ref, "cus_1");
        assert_eq!(session.ephemeral_key_ref, "ek_1");
        assert_eq!(session.payment_intent_ref, "pi_1_secret_2");
        assert_eq!(session.publishable_key_ref, "pk_live");
    }
}
