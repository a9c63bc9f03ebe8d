//! Hosted payment sheet seam.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};

use super::backend::PaymentSession;

/// Customer credentials handed to the payment sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerConfig {
    pub id: String,
    pub ephemeral_key_secret: String,
}

/// Everything the hosted payment sheet needs to present one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSheetConfig {
    pub merchant_display_name: String,
    pub customer: CustomerConfig,
    pub payment_intent_client_secret: String,
    pub publishable_key: String,
    pub allow_delayed_payment_methods: bool,
}

impl PaymentSheetConfig {
    /// Builds the sheet configuration for a session.
    pub fn for_session(session: &PaymentSession, merchant_display_name: &str) -> Self {
        Self {
            merchant_display_name: merchant_display_name.to_string(),
            customer: CustomerConfig {
                id: session.customer_ref.clone(),
                ephemeral_key_secret: session.ephemeral_key_ref.clone(),
            },
            payment_intent_client_secret: session.payment_intent_ref.clone(),
            publishable_key: session.publishable_key_ref.clone(),
            allow_delayed_payment_methods: true,
        }
    }
}

/// Terminal result reported by the payment sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "error", rename_all = "snake_case")]
pub enum PaymentSheetResult {
    Completed,
    Failed(String),
    Canceled,
}

/// An externally provided payment UI.
///
/// `present` suspends until the user completes, cancels, or the sheet
/// fails. Implementations must resolve exactly once per call.
#[async_trait]
pub trait HostedPaymentUi: Send + Sync {
    async fn present(&self, config: PaymentSheetConfig) -> PaymentSheetResult;
}

#[derive(Debug, Default)]
struct ScriptState {
    results: VecDeque<PaymentSheetResult>,
    presented: Vec<PaymentSheetConfig>,
}

/// Payment sheet that replays queued results, for testing.
///
/// Completes every attempt once the queue is empty.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPaymentSheet {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedPaymentSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result for a future presentation.
    pub fn push_result(&self, result: PaymentSheetResult) {
        self.lock().results.push_back(result);
    }

    /// Returns every configuration presented so far.
    pub fn presented(&self) -> Vec<PaymentSheetConfig> {
        self.lock().presented.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HostedPaymentUi for ScriptedPaymentSheet {
    async fn present(&self, config: PaymentSheetConfig) -> PaymentSheetResult {
        let mut state = self.lock();
        state.presented.push(config);
        state
            .results
            .pop_front()
            .unwrap_or(PaymentSheetResult::Completed)
    }
}

/// Payment sheet presented by a client outside this process.
///
/// `present` publishes the configuration and waits until [`resolve`] hands
/// back the client's result. An attempt whose result can no longer arrive
/// ends as `Canceled`.
///
/// [`resolve`]: DeferredPaymentSheet::resolve
#[derive(Debug, Clone)]
pub struct DeferredPaymentSheet {
    presented: Arc<watch::Sender<Option<PaymentSheetConfig>>>,
    reply: Arc<Mutex<Option<oneshot::Sender<PaymentSheetResult>>>>,
}

impl Default for DeferredPaymentSheet {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredPaymentSheet {
    pub fn new() -> Self {
        let (presented, _) = watch::channel(None);
        Self {
            presented: Arc::new(presented),
            reply: Arc::new(Mutex::new(None)),
        }
    }

    /// Configuration of the attempt waiting for a result, if any.
    pub fn pending(&self) -> Option<PaymentSheetConfig> {
        self.presented.borrow().clone()
    }

    /// Waits until an attempt is presented and returns its configuration.
    ///
    /// Returns `None` if the sheet is dropped first.
    pub async fn next_presentation(&self) -> Option<PaymentSheetConfig> {
        let mut rx = self.presented.subscribe();
        rx.wait_for(Option::is_some).await.ok().and_then(|c| c.clone())
    }

    /// Delivers the client's result to the waiting attempt.
    ///
    /// Returns false when no attempt is waiting.
    pub fn resolve(&self, result: PaymentSheetResult) -> bool {
        let reply = self
            .reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        reply.is_some_and(|reply| reply.send(result).is_ok())
    }
}

#[async_trait]
impl HostedPaymentUi for DeferredPaymentSheet {
    async fn present(&self, config: PaymentSheetConfig) -> PaymentSheetResult {
        let (reply, rx) = oneshot::channel();
        *self.reply.lock().unwrap_or_else(PoisonError::into_inner) = Some(reply);
        self.presented.send_replace(Some(config));

        let result = rx.await.unwrap_or(PaymentSheetResult::Canceled);
        self.presented.send_replace(None);
        result
    }
}
