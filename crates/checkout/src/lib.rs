//! Checkout for the storefront.
//!
//! Checkout prices the cart (or a single product), takes payment through a
//! hosted payment sheet and persists orders only once payment completed:
//! 1. Compose draft orders
//! 2. Request a payment session and present the sheet
//! 3. Persist each order, then drop its line from the cart
//!
//! A failed or canceled payment leaves both the order store and the cart
//! untouched.

pub mod coordinator;
pub mod error;
pub mod orchestrator;
pub mod order_store;
pub mod services;
pub mod state;

pub use coordinator::{PaymentCoordinator, PaymentOutcome};
pub use error::{CheckoutError, PaymentError, Result};
pub use orchestrator::{
    CheckoutOrchestrator, CheckoutOutcome, CheckoutReceipt, CheckoutSource, FailedLine,
};
pub use order_store::{OrderRepository, StoredOrder};
pub use services::{
    CustomerConfig, DeferredPaymentSheet, HostedPaymentUi, HttpPaymentBackend,
    InMemoryPaymentBackend, PaymentBackend, PaymentSession, PaymentSheetConfig, PaymentSheetResult,
    ScriptedPaymentSheet,
};
pub use state::PaymentState;
