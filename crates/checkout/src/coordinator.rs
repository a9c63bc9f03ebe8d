//! Payment coordinator driving one payment attempt at a time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use domain::Money;
use serde::Serialize;

use crate::error::CheckoutError;
use crate::services::backend::{PaymentBackend, PaymentSession};
use crate::services::sheet::{HostedPaymentUi, PaymentSheetConfig, PaymentSheetResult};
use crate::state::PaymentState;

/// Terminal result of a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Completed { payment_intent_ref: String },
    Failed { message: String },
    Canceled,
}

impl PaymentOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PaymentOutcome::Completed { .. })
    }

    /// The terminal state this outcome corresponds to.
    pub fn state(&self) -> PaymentState {
        match self {
            PaymentOutcome::Completed { .. } => PaymentState::Completed,
            PaymentOutcome::Failed { .. } => PaymentState::Failed,
            PaymentOutcome::Canceled => PaymentState::Canceled,
        }
    }
}

#[derive(Debug, Default)]
struct Attempt {
    id: u64,
    state: PaymentState,
    session: Option<PaymentSession>,
}

/// Runs payment attempts against a backend and a hosted payment sheet.
///
/// At most one attempt is live per coordinator. Starting a new attempt drops
/// the previous session, so a stale sheet configuration is never reused.
/// Failures of either the backend or the sheet end the attempt as
/// [`PaymentOutcome::Failed`]; nothing is retried automatically.
pub struct PaymentCoordinator<B, U>
where
    B: PaymentBackend,
    U: HostedPaymentUi,
{
    backend: B,
    ui: U,
    merchant_display_name: String,
    attempt: Mutex<Attempt>,
}

impl<B, U> PaymentCoordinator<B, U>
where
    B: PaymentBackend,
    U: HostedPaymentUi,
{
    /// Creates a new payment coordinator.
    pub fn new(backend: B, ui: U, merchant_display_name: impl Into<String>) -> Self {
        Self {
            backend,
            ui,
            merchant_display_name: merchant_display_name.into(),
            attempt: Mutex::new(Attempt::default()),
        }
    }

    /// Current state of the latest attempt.
    pub fn state(&self) -> PaymentState {
        self.lock().state
    }

    /// Session of the live attempt, if one has been issued.
    pub fn live_session(&self) -> Option<PaymentSession> {
        self.lock().session.clone()
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    /// Returns to `Idle` after a terminal result. Has no effect while an
    /// attempt is live; calling it repeatedly is harmless.
    pub fn reset(&self) {
        let mut attempt = self.lock();
        if !attempt.state.is_in_flight() {
            attempt.state = PaymentState::Idle;
            attempt.session = None;
        }
    }

    /// Charges `amount`: obtains a session, presents the sheet and waits for
    /// its terminal result.
    ///
    /// Fails only if another attempt is still live.
    #[tracing::instrument(skip(self), fields(amount = %amount))]
    pub async fn request_payment(&self, amount: Money) -> Result<PaymentOutcome, CheckoutError> {
        let mut guard = self.begin()?;
        metrics::counter!("payment_attempts_total").increment(1);
        tracing::info!(attempt = guard.id, "payment requested");

        let session = match self.backend.create_payment_session(amount).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(attempt = guard.id, error = %e, "payment session request failed");
                return Ok(guard.finish(PaymentOutcome::Failed {
                    message: e.to_string(),
                }));
            }
        };

        let config = PaymentSheetConfig::for_session(&session, &self.merchant_display_name);
        let payment_intent_ref = session.payment_intent_ref.clone();
        guard.awaiting_user(session);

        let outcome = match self.ui.present(config).await {
            PaymentSheetResult::Completed => PaymentOutcome::Completed { payment_intent_ref },
            PaymentSheetResult::Failed(message) => PaymentOutcome::Failed { message },
            PaymentSheetResult::Canceled => PaymentOutcome::Canceled,
        };
        Ok(guard.finish(outcome))
    }

    fn begin(&self) -> Result<AttemptGuard<'_, B, U>, CheckoutError> {
        let mut attempt = self.lock();
        if attempt.state.is_in_flight() {
            return Err(CheckoutError::PaymentInProgress);
        }
        attempt.id += 1;
        attempt.state = PaymentState::Requesting;
        attempt.session = None;

        Ok(AttemptGuard {
            coordinator: self,
            id: attempt.id,
            finished: false,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Attempt> {
        self.attempt.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the live attempt until it reaches a terminal state.
///
/// Dropping it early, for example when the caller stops waiting on the
/// sheet, ends the attempt as canceled so the coordinator is not left
/// stuck in flight.
struct AttemptGuard<'a, B, U>
where
    B: PaymentBackend,
    U: HostedPaymentUi,
{
    coordinator: &'a PaymentCoordinator<B, U>,
    id: u64,
    finished: bool,
}

impl<B, U> AttemptGuard<'_, B, U>
where
    B: PaymentBackend,
    U: HostedPaymentUi,
{
    fn awaiting_user(&mut self, session: PaymentSession) {
        let mut attempt = self.coordinator.lock();
        attempt.state = PaymentState::AwaitingUserAction;
        attempt.session = Some(session);
    }

    fn finish(mut self, outcome: PaymentOutcome) -> PaymentOutcome {
        self.settle(outcome.state());

        match &outcome {
            PaymentOutcome::Completed { .. } => {
                metrics::counter!("payment_completed").increment(1);
                tracing::info!(attempt = self.id, "payment completed");
            }
            PaymentOutcome::Failed { message } => {
                metrics::counter!("payment_failed").increment(1);
                tracing::warn!(attempt = self.id, %message, "payment failed");
            }
            PaymentOutcome::Canceled => {
                metrics::counter!("payment_canceled").increment(1);
                tracing::info!(attempt = self.id, "payment canceled");
            }
        }
        outcome
    }

    fn settle(&mut self, state: PaymentState) {
        let mut attempt = self.coordinator.lock();
        if attempt.id == self.id {
            attempt.state = state;
            attempt.session = None;
        }
        self.finished = true;
    }
}

impl<B, U> Drop for AttemptGuard<'_, B, U>
where
    B: PaymentBackend,
    U: HostedPaymentUi,
{
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(attempt = self.id, "payment attempt abandoned");
            metrics::counter!("payment_canceled").increment(1);
            self.settle(PaymentState::Canceled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaymentError;
    use crate::services::backend::InMemoryPaymentBackend;
    use crate::services::sheet::ScriptedPaymentSheet;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    fn coordinator() -> (
        InMemoryPaymentBackend,
        ScriptedPaymentSheet,
        PaymentCoordinator<InMemoryPaymentBackend, ScriptedPaymentSheet>,
    ) {
        let backend = InMemoryPaymentBackend::new();
        let sheet = ScriptedPaymentSheet::new();
        let coordinator = PaymentCoordinator::new(backend.clone(), sheet.clone(), "Fake Store");
        (backend, sheet, coordinator)
    }

    #[tokio::test]
    async fn test_completed_payment() {
        let (backend, sheet, coordinator) = coordinator();

        let outcome = coordinator
            .request_payment(Money::from_units(3893))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PaymentOutcome::Completed {
                payment_intent_ref: "pi_0001_secret".into()
            }
        );
        assert_eq!(coordinator.state(), PaymentState::Completed);
        assert_eq!(backend.requested_amounts(), vec![Money::from_units(3893)]);

        let presented = sheet.presented();
        assert_eq!(presented.len(), 1);
        assert_eq!(presented[0].merchant_display_name, "Fake Store");
        assert_eq!(presented[0].payment_intent_client_secret, "pi_0001_secret");
        assert!(coordinator.live_session().is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_skips_sheet() {
        let (backend, sheet, coordinator) = coordinator();
        backend.set_failure(Some(PaymentError::Network("connection refused".into())));

        let outcome = coordinator
            .request_payment(Money::from_units(10))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PaymentOutcome::Failed {
                message: "Network Error: connection refused".into()
            }
        );
        assert_eq!(coordinator.state(), PaymentState::Failed);
        assert!(sheet.presented().is_empty());
    }

    #[tokio::test]
    async fn test_sheet_failure_and_cancel_are_terminal() {
        let (_backend, sheet, coordinator) = coordinator();
        sheet.push_result(PaymentSheetResult::Failed("card declined".into()));
        sheet.push_result(PaymentSheetResult::Canceled);

        let failed = coordinator
            .request_payment(Money::from_units(10))
            .await
            .unwrap();
        assert_eq!(
            failed,
            PaymentOutcome::Failed {
                message: "card declined".into()
            }
        );

        let canceled = coordinator
            .request_payment(Money::from_units(10))
            .await
            .unwrap();
        assert_eq!(canceled, PaymentOutcome::Canceled);
        assert_eq!(coordinator.state(), PaymentState::Canceled);

        coordinator.reset();
        coordinator.reset();
        assert_eq!(coordinator.state(), PaymentState::Idle);
    }

    #[tokio::test]
    async fn test_each_attempt_gets_a_fresh_session() {
        let (_backend, sheet, coordinator) = coordinator();
        sheet.push_result(PaymentSheetResult::Canceled);

        coordinator.request_payment(Money::from_units(10)).await.unwrap();
        coordinator.request_payment(Money::from_units(10)).await.unwrap();

        let secrets: Vec<_> = sheet
            .presented()
            .into_iter()
            .map(|c| c.payment_intent_client_secret)
            .collect();
        assert_eq!(secrets, vec!["pi_0001_secret", "pi_0002_secret"]);
    }

    #[tokio::test]
    async fn test_completed_outcome_carries_the_presented_intent() {
        let (_backend, sheet, coordinator) = coordinator();
        sheet.push_result(PaymentSheetResult::Canceled);

        coordinator.request_payment(Money::from_units(10)).await.unwrap();
        coordinator.reset();
        let outcome = coordinator
            .request_payment(Money::from_units(10))
            .await
            .unwrap();

        let presented = sheet.presented();
        assert_eq!(presented.len(), 2);
        assert_eq!(
            outcome,
            PaymentOutcome::Completed {
                payment_intent_ref: presented[1].payment_intent_client_secret.clone()
            }
        );
        assert_eq!(presented[1].payment_intent_client_secret, "pi_0002_secret");
    }

    /// Sheet that never resolves until released.
    #[derive(Clone, Default)]
    struct PendingSheet {
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl HostedPaymentUi for PendingSheet {
        async fn present(&self, _config: PaymentSheetConfig) -> PaymentSheetResult {
            self.release.notified().await;
            PaymentSheetResult::Completed
        }
    }

    #[tokio::test]
    async fn test_second_request_while_live_is_rejected() {
        let sheet = PendingSheet::default();
        let coordinator = Arc::new(PaymentCoordinator::new(
            InMemoryPaymentBackend::new(),
            sheet.clone(),
            "Fake Store",
        ));

        let first = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.request_payment(Money::from_units(10)).await }
        });

        while coordinator.state() != PaymentState::AwaitingUserAction {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(coordinator.live_session().is_some());

        let second = coordinator.request_payment(Money::from_units(10)).await;
        assert!(matches!(second, Err(CheckoutError::PaymentInProgress)));

        coordinator.reset();
        assert_eq!(coordinator.state(), PaymentState::AwaitingUserAction);

        sheet.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn test_abandoned_attempt_is_canceled() {
        let sheet = PendingSheet::default();
        let coordinator =
            PaymentCoordinator::new(InMemoryPaymentBackend::new(), sheet, "Fake Store");

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            coordinator.request_payment(Money::from_units(10)),
        )
        .await;
        assert!(result.is_err());

        assert_eq!(coordinator.state(), PaymentState::Canceled);
        assert!(coordinator.live_session().is_none());
    }
}
