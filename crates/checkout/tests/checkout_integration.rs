//! Integration tests for checkout: cart → payment → orders → cart cleanup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cart::{AddressBook, CartAggregator};
use checkout::{
    CheckoutError, CheckoutOrchestrator, CheckoutOutcome, CheckoutSource, HostedPaymentUi,
    InMemoryPaymentBackend, OrderRepository, PaymentCoordinator, PaymentError, PaymentSheetConfig,
    PaymentSheetResult, PaymentState, ScriptedPaymentSheet,
};
use common::UserId;
use document_store::{CollectionPath, InMemoryDocumentStore};
use domain::{Address, CartLine, CartSnapshot, Charges, Money, OrderComposer, OrderStatus};

type TestOrchestrator =
    CheckoutOrchestrator<InMemoryDocumentStore, InMemoryPaymentBackend, ScriptedPaymentSheet>;

struct TestHarness {
    store: Arc<InMemoryDocumentStore>,
    cart: Arc<CartAggregator<InMemoryDocumentStore>>,
    addresses: AddressBook<InMemoryDocumentStore>,
    orders: OrderRepository<InMemoryDocumentStore>,
    backend: InMemoryPaymentBackend,
    sheet: ScriptedPaymentSheet,
    checkout: TestOrchestrator,
}

impl TestHarness {
    async fn new() -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let user = UserId::new("u1");
        let cart = Arc::new(CartAggregator::for_user(Arc::clone(&store), user.clone()));
        cart.subscribe().await.unwrap();

        let backend = InMemoryPaymentBackend::new();
        let sheet = ScriptedPaymentSheet::new();
        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&cart),
            OrderRepository::new(Arc::clone(&store)),
            PaymentCoordinator::new(backend.clone(), sheet.clone(), "Fake Store"),
            OrderComposer::default(),
        );

        Self {
            addresses: AddressBook::for_user(Arc::clone(&store), user),
            orders: OrderRepository::new(Arc::clone(&store)),
            store,
            cart,
            backend,
            sheet,
            checkout,
        }
    }

    async fn fill_cart(&self) -> CartSnapshot {
        self.cart
            .add_item(CartLine::new("p1", "Backpack", Money::from_cents(1999), 2, "a.png").unwrap())
            .await;
        self.cart
            .add_item(CartLine::new("p2", "T-Shirt", Money::from_cents(500), 1, "b.png").unwrap())
            .await;
        self.wait_for_cart(|s| s.len() == 2).await
    }

    async fn wait_for_cart(&self, predicate: impl FnMut(&CartSnapshot) -> bool) -> CartSnapshot {
        let mut rx = self.cart.watch();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
            .await
            .expect("timed out waiting for cart")
            .unwrap()
            .clone()
    }

    async fn order_count(&self) -> usize {
        self.store.document_count(&CollectionPath::orders()).await
    }

    async fn checkout_cart(&self, snapshot: CartSnapshot) -> CheckoutOutcome {
        let addresses = self.addresses.list().await.unwrap();
        self.checkout
            .checkout(CheckoutSource::Cart(snapshot), &addresses, &Charges::default())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_completed_payment_places_orders_and_empties_cart() {
    let h = TestHarness::new().await;
    h.addresses
        .save(Address::new("1 Main St", "Pune", "MH", "411001", "IN").as_default())
        .await
        .unwrap();
    let snapshot = h.fill_cart().await;

    let outcome = h.checkout_cart(snapshot).await;
    let CheckoutOutcome::Placed(receipt) = outcome else {
        panic!("expected placed checkout, got {outcome:?}");
    };

    assert_eq!(receipt.orders.len(), 2);
    assert!(receipt.failed_lines.is_empty());
    assert_eq!(h.order_count().await, 2);

    let pending = h
        .orders
        .list_for_user(&UserId::new("u1"), Some(OrderStatus::Pending))
        .await
        .unwrap();
    let totals: Vec<_> = pending.iter().map(|o| o.order.total).collect();
    assert_eq!(totals, vec![Money::from_units(3468), Money::from_units(495)]);
    assert!(
        pending
            .iter()
            .all(|o| o.order.address.as_ref().map(|a| a.postal_code.as_str()) == Some("411001"))
    );

    let cart = h.wait_for_cart(|s| s.is_empty()).await;
    assert_eq!(cart.total_price(), Money::zero());
}

#[tokio::test]
async fn test_failed_payment_persists_nothing_and_keeps_cart() {
    let h = TestHarness::new().await;
    let snapshot = h.fill_cart().await;
    h.sheet
        .push_result(PaymentSheetResult::Failed("card declined".into()));

    let outcome = h.checkout_cart(snapshot.clone()).await;
    assert!(matches!(
        outcome,
        CheckoutOutcome::PaymentFailed { ref message } if message == "card declined"
    ));
    assert_eq!(h.order_count().await, 0);
    assert_eq!(h.cart.snapshot(), snapshot);
    assert_eq!(h.checkout.payment_state(), PaymentState::Idle);

    // The session is reset, so a retry goes through
    let outcome = h.checkout_cart(snapshot).await;
    assert!(matches!(outcome, CheckoutOutcome::Placed(_)));
    assert_eq!(h.backend.request_count(), 2);
}

#[tokio::test]
async fn test_backend_error_fails_checkout_without_orders() {
    let h = TestHarness::new().await;
    let snapshot = h.fill_cart().await;
    h.backend.set_failure(Some(PaymentError::Server {
        status: 503,
        body: "maintenance".into(),
    }));

    let outcome = h.checkout_cart(snapshot).await;
    assert!(matches!(
        outcome,
        CheckoutOutcome::PaymentFailed { ref message } if message == "Server Error: maintenance"
    ));
    assert_eq!(h.order_count().await, 0);
    assert!(h.sheet.presented().is_empty());
}

#[tokio::test]
async fn test_partial_persist_failure_keeps_failed_line_in_cart() {
    let h = TestHarness::new().await;
    let snapshot = h.fill_cart().await;
    h.store.reject_adds_where("productId", "p2");

    let outcome = h.checkout_cart(snapshot).await;
    let CheckoutOutcome::Placed(receipt) = outcome else {
        panic!("expected placed checkout");
    };

    assert!(receipt.is_partial());
    assert_eq!(receipt.orders.len(), 1);
    assert_eq!(receipt.failed_lines.len(), 1);
    assert_eq!(receipt.failed_lines[0].product_id.as_str(), "p2");
    assert_eq!(h.order_count().await, 1);

    let cart = h.wait_for_cart(|s| s.len() == 1).await;
    assert_eq!(cart.lines()[0].product_id.as_str(), "p2");
}

/// Payment sheet that stays open until released.
#[derive(Clone, Default)]
struct HeldSheet {
    release: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl HostedPaymentUi for HeldSheet {
    async fn present(&self, _config: PaymentSheetConfig) -> PaymentSheetResult {
        self.release.notified().await;
        PaymentSheetResult::Canceled
    }
}

#[tokio::test]
async fn test_second_checkout_while_first_is_open_is_rejected() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let cart = Arc::new(CartAggregator::for_user(
        Arc::clone(&store),
        UserId::new("u1"),
    ));
    let sheet = HeldSheet::default();
    let checkout = Arc::new(CheckoutOrchestrator::new(
        Arc::clone(&cart),
        OrderRepository::new(Arc::clone(&store)),
        PaymentCoordinator::new(InMemoryPaymentBackend::new(), sheet.clone(), "Fake Store"),
        OrderComposer::default(),
    ));
    let snapshot = CartSnapshot::from_lines(vec![
        CartLine::new("p1", "Backpack", Money::from_cents(1999), 1, "").unwrap(),
    ]);

    let first = tokio::spawn({
        let checkout = Arc::clone(&checkout);
        let snapshot = snapshot.clone();
        async move {
            checkout
                .checkout(CheckoutSource::Cart(snapshot), &[], &Charges::default())
                .await
        }
    });

    while checkout.payment_state() != PaymentState::AwaitingUserAction {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let second = checkout
        .checkout(CheckoutSource::Cart(snapshot), &[], &Charges::default())
        .await;
    assert!(matches!(second, Err(CheckoutError::CheckoutInProgress)));

    sheet.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, CheckoutOutcome::PaymentCanceled));
    assert!(!checkout.is_in_flight());
    assert_eq!(store.document_count(&CollectionPath::orders()).await, 0);
}
