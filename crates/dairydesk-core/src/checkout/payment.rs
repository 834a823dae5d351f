use futures::future::BoxFuture;
use rust_decimal::Decimal;

use super::Shortfall;
use crate::models::CapturedPayment;

/// What the payment dialog is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPrompt {
    pub total_amount: Decimal,
    pub item_count: u64,
    /// Categories where the cart asks for more than the last known stock.
    pub shortfalls: Vec<Shortfall>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Confirmed(CapturedPayment),
    Dismissed,
}

/// Modal payment step. Resolves once the user confirms or dismisses.
pub trait PaymentCapture: Send + Sync {
    fn capture(&self, prompt: PaymentPrompt) -> BoxFuture<'_, PaymentOutcome>;
}
