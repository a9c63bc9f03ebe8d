//! Shared application state and per-user sessions.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, Weak};
use std::time::{Duration, Instant};

use cart::{AddressBook, CartAggregator};
use checkout::{
    CheckoutOrchestrator, CheckoutOutcome, DeferredPaymentSheet, OrderRepository,
    PaymentBackend, PaymentCoordinator, PaymentSheetResult,
};
use common::UserId;
use document_store::DocumentStore;
use domain::{Charges, OrderComposer};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::ApiError;

/// How long a new session waits for its first cart snapshot.
const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Checkout orchestrator as wired for HTTP clients.
pub type SessionCheckout<S> =
    CheckoutOrchestrator<S, Arc<dyn PaymentBackend>, DeferredPaymentSheet>;

/// A checkout started over HTTP that is waiting for the client's
/// payment sheet result.
pub type PendingCheckout = JoinHandle<checkout::Result<CheckoutOutcome>>;

/// One user's live cart plus checkout wiring.
pub struct UserSession<S: DocumentStore + 'static> {
    pub cart: Arc<CartAggregator<S>>,
    pub addresses: AddressBook<S>,
    pub checkout: Arc<SessionCheckout<S>>,
    pub sheet: DeferredPaymentSheet,
    pub pending: Mutex<Option<PendingCheckout>>,
    last_used: std::sync::Mutex<Instant>,
}

impl<S: DocumentStore + 'static> UserSession<S> {
    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the session last served a request.
    pub fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Returns true while a checkout is doing work that must not be cut off:
    /// requesting a payment session or writing orders. A checkout parked on
    /// the payment sheet is waiting on the client, not working.
    pub fn is_working(&self) -> bool {
        self.checkout.is_in_flight() && self.sheet.pending().is_none()
    }

    /// Stops the cart subscription. A checkout still waiting on the payment
    /// sheet ends as canceled.
    fn close(&self) {
        if self.sheet.resolve(PaymentSheetResult::Canceled) {
            tracing::info!(user_id = %self.cart.user_id(), "pending payment canceled on close");
        }
        self.cart.unsubscribe();
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore + 'static> {
    pub store: Arc<S>,
    pub orders: OrderRepository<S>,
    pub payment_backend: Arc<dyn PaymentBackend>,
    pub composer: OrderComposer,
    pub charges: Charges,
    pub merchant_display_name: String,
    sessions: Mutex<HashMap<UserId, Arc<UserSession<S>>>>,
}

impl<S: DocumentStore + 'static> AppState<S> {
    pub fn new(store: Arc<S>, payment_backend: Arc<dyn PaymentBackend>, config: &Config) -> Self {
        Self {
            orders: OrderRepository::new(Arc::clone(&store)),
            store,
            payment_backend,
            composer: config.composer(),
            charges: config.charges(),
            merchant_display_name: config.merchant_display_name.clone(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the user's session, opening it (and its cart subscription)
    /// on first use.
    ///
    /// Opening happens outside the session map lock. When two requests open
    /// the same user at once, the first insert wins and the other session is
    /// closed.
    pub async fn session(&self, user_id: &UserId) -> Result<Arc<UserSession<S>>, ApiError> {
        if let Some(session) = self.sessions.lock().await.get(user_id) {
            session.touch();
            return Ok(Arc::clone(session));
        }

        let opened = Arc::new(self.open_session(user_id).await?);

        let mut sessions = self.sessions.lock().await;
        let session = Arc::clone(
            sessions
                .entry(user_id.clone())
                .or_insert_with(|| Arc::clone(&opened)),
        );
        metrics::gauge!("api_sessions_open").set(sessions.len() as f64);
        drop(sessions);

        if !Arc::ptr_eq(&session, &opened) {
            opened.close();
            session.touch();
        }
        Ok(session)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Closes a user's session. Returns false if none was open.
    pub async fn close_session(&self, user_id: &UserId) -> bool {
        let mut sessions = self.sessions.lock().await;
        let removed = sessions.remove(user_id);
        metrics::gauge!("api_sessions_open").set(sessions.len() as f64);
        drop(sessions);

        match removed {
            Some(session) => {
                session.close();
                tracing::info!(%user_id, "session closed");
                true
            }
            None => false,
        }
    }

    /// Closes every session idle for at least `max_idle`, skipping those
    /// whose checkout is still working. Returns how many were closed.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let expired: Vec<UserId> = sessions
            .iter()
            .filter(|(_, s)| s.idle_for() >= max_idle && !s.is_working())
            .map(|(user_id, _)| user_id.clone())
            .collect();
        let closed: Vec<_> = expired
            .iter()
            .filter_map(|user_id| sessions.remove(user_id))
            .collect();
        metrics::gauge!("api_sessions_open").set(sessions.len() as f64);
        drop(sessions);

        for session in &closed {
            session.close();
        }
        if !closed.is_empty() {
            metrics::counter!("api_sessions_evicted").increment(closed.len() as u64);
            tracing::info!(evicted = closed.len(), "idle sessions closed");
        }
        closed.len()
    }

    /// Spawns a task that closes idle sessions every half `max_idle`. The
    /// task ends once the state is dropped.
    pub fn spawn_session_reaper(state: &Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let state: Weak<Self> = Arc::downgrade(state);
        let period = (max_idle / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(state) = state.upgrade() else {
                    break;
                };
                state.evict_idle(max_idle).await;
            }
        })
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn open_session(&self, user_id: &UserId) -> Result<UserSession<S>, ApiError> {
        let cart = Arc::new(CartAggregator::for_user(
            Arc::clone(&self.store),
            user_id.clone(),
        ));
        let mut first_snapshot = cart.watch();
        cart.subscribe().await?;
        if tokio::time::timeout(FIRST_SNAPSHOT_TIMEOUT, first_snapshot.changed())
            .await
            .is_err()
        {
            tracing::warn!("no cart snapshot yet, serving an empty cart");
        }

        let sheet = DeferredPaymentSheet::new();
        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&cart),
            OrderRepository::new(Arc::clone(&self.store)),
            PaymentCoordinator::new(
                Arc::clone(&self.payment_backend),
                sheet.clone(),
                self.merchant_display_name.as_str(),
            ),
            self.composer,
        );

        tracing::info!("session opened");
        Ok(UserSession {
            addresses: AddressBook::for_user(Arc::clone(&self.store), user_id.clone()),
            cart,
            checkout: Arc::new(checkout),
            sheet,
            pending: Mutex::new(None),
            last_used: std::sync::Mutex::new(Instant::now()),
        })
    }
}
