//! Payment backend and hosted payment sheet seams.

pub mod backend;
pub mod http;
pub mod sheet;

pub use backend::{InMemoryPaymentBackend, PaymentBackend, PaymentSession};
pub use http::HttpPaymentBackend;
pub use sheet::{
    CustomerConfig, DeferredPaymentSheet, HostedPaymentUi, PaymentSheetConfig, PaymentSheetResult,
    ScriptedPaymentSheet,
};
