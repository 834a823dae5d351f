//! Checkout: payment capture, order submission and reconciliation.

pub mod orchestrator;
pub mod payment;

pub use orchestrator::{CheckoutOrchestrator, CheckoutOutcome, CheckoutState, Shortfall};
pub use payment::{PaymentCapture, PaymentOutcome, PaymentPrompt};
