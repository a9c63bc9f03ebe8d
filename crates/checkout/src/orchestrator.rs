//! Checkout orchestration: compose, pay, persist, clean up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cart::{CartAggregator, CartMutation};
use document_store::DocumentStore;
use domain::{
    Address, CartSnapshot, Charges, Money, OrderComposer, OrderRecord, Product, ProductId,
    amount_due,
};
use serde::Serialize;

use crate::coordinator::{PaymentCoordinator, PaymentOutcome};
use crate::error::{CheckoutError, Result};
use crate::order_store::{OrderRepository, StoredOrder};
use crate::services::backend::PaymentBackend;
use crate::services::sheet::HostedPaymentUi;
use crate::state::PaymentState;

/// What is being bought.
#[derive(Debug, Clone)]
pub enum CheckoutSource {
    /// Every line of the cart. Lines are removed from the cart as their
    /// orders are persisted.
    Cart(CartSnapshot),

    /// A single product bought directly; the cart is not touched.
    Product { product: Product, quantity: u32 },
}

/// A line whose order could not be written after payment went through.
/// Its cart line is kept so the user can retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedLine {
    pub product_id: ProductId,
    pub reason: String,
}

/// Result of a paid checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub orders: Vec<StoredOrder>,
    pub failed_lines: Vec<FailedLine>,
    pub payment_intent_ref: String,
    pub amount: Money,
}

impl CheckoutReceipt {
    /// Identifier of the first persisted order.
    pub fn order_id(&self) -> Option<&common::DocumentId> {
        self.orders.first().map(|o| &o.id)
    }

    /// Returns true when payment went through but some orders were not written.
    pub fn is_partial(&self) -> bool {
        !self.failed_lines.is_empty()
    }
}

/// How a checkout ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Placed(CheckoutReceipt),
    PaymentFailed { message: String },
    PaymentCanceled,
}

/// Sequences order composition, payment and order persistence for one
/// user session.
///
/// Orders are written only after the payment sheet reports completion. Each
/// order is written separately; a failed write does not undo the others, and
/// only lines whose order was written are removed from the cart.
pub struct CheckoutOrchestrator<S, B, U>
where
    S: DocumentStore + 'static,
    B: PaymentBackend,
    U: HostedPaymentUi,
{
    cart: Arc<CartAggregator<S>>,
    orders: OrderRepository<S>,
    payments: PaymentCoordinator<B, U>,
    composer: OrderComposer,
    in_flight: AtomicBool,
}

impl<S, B, U> CheckoutOrchestrator<S, B, U>
where
    S: DocumentStore + 'static,
    B: PaymentBackend,
    U: HostedPaymentUi,
{
    /// Creates a new checkout orchestrator.
    pub fn new(
        cart: Arc<CartAggregator<S>>,
        orders: OrderRepository<S>,
        payments: PaymentCoordinator<B, U>,
        composer: OrderComposer,
    ) -> Self {
        Self {
            cart,
            orders,
            payments,
            composer,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn payments(&self) -> &PaymentCoordinator<B, U> {
        &self.payments
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one checkout.
    ///
    /// `addresses` are the user's saved addresses; the one flagged default
    /// is attached to every order.
    #[tracing::instrument(skip_all, fields(user_id = %self.cart.user_id()))]
    pub async fn checkout(
        &self,
        source: CheckoutSource,
        addresses: &[Address],
        charges: &Charges,
    ) -> Result<CheckoutOutcome> {
        let _in_flight = InFlight::acquire(&self.in_flight)?;
        let started = std::time::Instant::now();

        let from_cart = matches!(source, CheckoutSource::Cart(_));
        let drafts = self.compose(source, addresses, charges)?;
        let amount = amount_due(&drafts, charges);
        tracing::info!(orders = drafts.len(), %amount, "checkout started");

        let outcome = match self.payments.request_payment(amount).await? {
            PaymentOutcome::Completed { payment_intent_ref } => {
                let receipt = self
                    .place_orders(drafts, from_cart, payment_intent_ref, amount)
                    .await;
                CheckoutOutcome::Placed(receipt)
            }
            PaymentOutcome::Failed { message } => {
                self.payments.reset();
                CheckoutOutcome::PaymentFailed { message }
            }
            PaymentOutcome::Canceled => {
                self.payments.reset();
                CheckoutOutcome::PaymentCanceled
            }
        };

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    fn compose(
        &self,
        source: CheckoutSource,
        addresses: &[Address],
        charges: &Charges,
    ) -> Result<Vec<OrderRecord>> {
        let user_id = self.cart.user_id();
        match source {
            CheckoutSource::Cart(snapshot) => {
                if snapshot.is_empty() {
                    return Err(CheckoutError::EmptyCart);
                }
                Ok(self
                    .composer
                    .compose_from_cart(user_id, &snapshot, addresses, charges))
            }
            CheckoutSource::Product { product, quantity } => Ok(vec![
                self.composer
                    .compose_from_product(user_id, &product, quantity, addresses, charges)?,
            ]),
        }
    }

    async fn place_orders(
        &self,
        drafts: Vec<OrderRecord>,
        from_cart: bool,
        payment_intent_ref: String,
        amount: Money,
    ) -> CheckoutReceipt {
        let mut orders = Vec::with_capacity(drafts.len());
        let mut failed_lines = Vec::new();

        for draft in drafts {
            match self.orders.persist(&draft).await {
                Ok(stored) => {
                    metrics::counter!("checkout_orders_persisted").increment(1);
                    if from_cart {
                        self.remove_from_cart(&draft.product_id).await;
                    }
                    orders.push(stored);
                }
                Err(e) => {
                    metrics::counter!("checkout_orders_failed").increment(1);
                    tracing::warn!(product_id = %draft.product_id, error = %e, "order persist failed after payment");
                    failed_lines.push(FailedLine {
                        product_id: draft.product_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            placed = orders.len(),
            failed = failed_lines.len(),
            "checkout finished"
        );
        CheckoutReceipt {
            orders,
            failed_lines,
            payment_intent_ref,
            amount,
        }
    }

    async fn remove_from_cart(&self, product_id: &ProductId) {
        if let CartMutation::Failed { reason } = self.cart.remove_item(product_id).await {
            tracing::warn!(%product_id, %reason, "ordered line left in cart");
        }
    }

    /// State of the latest payment attempt.
    pub fn payment_state(&self) -> PaymentState {
        self.payments.state()
    }
}

/// Marks a checkout as running until dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CheckoutError::CheckoutInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::backend::InMemoryPaymentBackend;
    use crate::services::sheet::{PaymentSheetResult, ScriptedPaymentSheet};
    use common::UserId;
    use document_store::{CollectionPath, InMemoryDocumentStore};
    use domain::CartLine;

    type TestOrchestrator =
        CheckoutOrchestrator<InMemoryDocumentStore, InMemoryPaymentBackend, ScriptedPaymentSheet>;

    struct Fixture {
        store: Arc<InMemoryDocumentStore>,
        cart: Arc<CartAggregator<InMemoryDocumentStore>>,
        backend: InMemoryPaymentBackend,
        sheet: ScriptedPaymentSheet,
        checkout: TestOrchestrator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryDocumentStore::new());
        let cart = Arc::new(CartAggregator::for_user(
            Arc::clone(&store),
            UserId::new("u1"),
        ));
        let backend = InMemoryPaymentBackend::new();
        let sheet = ScriptedPaymentSheet::new();
        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&cart),
            OrderRepository::new(Arc::clone(&store)),
            PaymentCoordinator::new(backend.clone(), sheet.clone(), "Fake Store"),
            OrderComposer::default(),
        );
        Fixture {
            store,
            cart,
            backend,
            sheet,
            checkout,
        }
    }

    fn cart_snapshot() -> CartSnapshot {
        CartSnapshot::from_lines(vec![
            CartLine::new("p1", "Backpack", Money::from_cents(1999), 2, "a.png").unwrap(),
            CartLine::new("p2", "T-Shirt", Money::from_cents(500), 1, "b.png").unwrap(),
        ])
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_before_payment() {
        let f = fixture();
        let result = f
            .checkout
            .checkout(
                CheckoutSource::Cart(CartSnapshot::empty()),
                &[],
                &Charges::default(),
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert_eq!(f.backend.request_count(), 0);
        assert!(!f.checkout.is_in_flight());
    }

    #[tokio::test]
    async fn test_charges_flat_fees_once_per_checkout() {
        let f = fixture();
        let outcome = f
            .checkout
            .checkout(CheckoutSource::Cart(cart_snapshot()), &[], &Charges::default())
            .await
            .unwrap();

        let CheckoutOutcome::Placed(receipt) = outcome else {
            panic!("expected placed checkout");
        };
        // 1699 * 2 + 425 * 1 + 50 + 20
        assert_eq!(receipt.amount, Money::from_units(3893));
        assert_eq!(f.backend.requested_amounts(), vec![Money::from_units(3893)]);
        assert_eq!(receipt.orders.len(), 2);
        let recorded: Vec<_> = receipt.orders.iter().map(|o| o.order.total).collect();
        assert_eq!(recorded, vec![Money::from_units(3468), Money::from_units(495)]);
        assert!(receipt.order_id().is_some());
        assert!(!receipt.is_partial());
        assert_eq!(receipt.payment_intent_ref, "pi_0001_secret");
    }

    #[tokio::test]
    async fn test_canceled_payment_writes_nothing() {
        let f = fixture();
        f.sheet.push_result(PaymentSheetResult::Canceled);

        let outcome = f
            .checkout
            .checkout(CheckoutSource::Cart(cart_snapshot()), &[], &Charges::default())
            .await
            .unwrap();

        assert!(matches!(outcome, CheckoutOutcome::PaymentCanceled));
        assert_eq!(f.store.document_count(&CollectionPath::orders()).await, 0);
        assert_eq!(f.checkout.payment_state(), PaymentState::Idle);
    }

    #[tokio::test]
    async fn test_buy_now_leaves_cart_alone() {
        let f = fixture();
        f.cart
            .add_item(CartLine::new("p9", "Hat", Money::from_units(3), 1, "").unwrap())
            .await;

        let product = Product::new("p1", "Backpack", Money::from_cents(1999), "a.png");
        let outcome = f
            .checkout
            .checkout(
                CheckoutSource::Product {
                    product,
                    quantity: 1,
                },
                &[],
                &Charges::default(),
            )
            .await
            .unwrap();

        let CheckoutOutcome::Placed(receipt) = outcome else {
            panic!("expected placed checkout");
        };
        assert_eq!(receipt.amount, Money::from_units(1769));
        assert_eq!(
            f.store
                .document_count(&CollectionPath::cart(&UserId::new("u1")))
                .await,
            1
        );
    }
}
