use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::{PaymentCapture, PaymentOutcome, PaymentPrompt};
use crate::api::OrderGateway;
use crate::cart::{CartItem, CartStore};
use crate::error::DeskError;
use crate::models::{Order, OrderRequest, ProductQuantity, QuantityCategory};
use crate::notify::{Notifier, LONG_NOTICE, SHORT_NOTICE};
use crate::quantities::QuantityBroadcaster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    AwaitingPayment,
    Submitting,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Completed(Order),
    /// The user dismissed the payment step; nothing changed.
    Cancelled,
}

/// Cart demand exceeding the last known stock for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct Shortfall {
    pub category: QuantityCategory,
    pub requested: Decimal,
    pub available: Decimal,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} requested, {} available",
            self.category.label(),
            self.requested,
            self.available
        )
    }
}

/// Compare summed cart quantities per stock category with `stock`.
pub fn shortfalls(items: &[CartItem], stock: &ProductQuantity) -> Vec<Shortfall> {
    let mut requested: HashMap<QuantityCategory, Decimal> = HashMap::new();
    for item in items {
        if let Some(category) = item.product.product_type.category() {
            *requested.entry(category).or_default() += Decimal::from(item.quantity);
        }
    }
    QuantityCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let requested = requested.get(&category).copied()?;
            let available = stock.get(category);
            (requested > available).then_some(Shortfall {
                category,
                requested,
                available,
            })
        })
        .collect()
}

/// Drives one checkout at a time:
/// `Idle -> AwaitingPayment -> Submitting -> Completed | Failed`.
///
/// The order is built from the cart as it stands when the payment step
/// confirms, so edits made while the dialog was open are included.
pub struct CheckoutOrchestrator {
    cart: CartStore,
    orders: Arc<dyn OrderGateway>,
    payments: Arc<dyn PaymentCapture>,
    notifier: Arc<dyn Notifier>,
    quantities: QuantityBroadcaster,
    state: CheckoutState,
}

impl CheckoutOrchestrator {
    pub fn new(
        cart: CartStore,
        orders: Arc<dyn OrderGateway>,
        payments: Arc<dyn PaymentCapture>,
        notifier: Arc<dyn Notifier>,
        quantities: QuantityBroadcaster,
    ) -> Self {
        Self {
            cart,
            orders,
            payments,
            notifier,
            quantities,
            state: CheckoutState::Idle,
        }
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    fn transition(&mut self, next: CheckoutState) {
        debug!(from = ?self.state, to = ?next, "Checkout state");
        self.state = next;
    }

    /// Run a checkout for the current cart.
    ///
    /// An empty cart is refused before the payment step. A failed submission
    /// leaves the cart untouched so the user can try again.
    pub async fn checkout(&mut self, customer_id: Option<i64>) -> Result<CheckoutOutcome, DeskError> {
        self.transition(CheckoutState::Idle);

        if self.cart.is_empty() {
            self.notifier.notify("Cart is empty", SHORT_NOTICE);
            return Err(DeskError::Validation("Cart is empty".to_string()));
        }

        self.transition(CheckoutState::AwaitingPayment);
        let items = self.cart.items();
        let stock = self.quantities.current();
        let short = shortfalls(&items, &stock.quantities);
        for shortfall in &short {
            warn!(%shortfall, "Cart exceeds available stock");
            self.notifier
                .notify(&format!("Low stock - {}", shortfall), LONG_NOTICE);
        }
        let prompt = PaymentPrompt {
            total_amount: self.cart.total_price(),
            item_count: self.cart.total_item_count(),
            shortfalls: short,
        };

        let payment = match self.payments.capture(prompt).await {
            PaymentOutcome::Dismissed => {
                info!("Payment dismissed");
                self.transition(CheckoutState::Idle);
                return Ok(CheckoutOutcome::Cancelled);
            }
            PaymentOutcome::Confirmed(payment) => payment,
        };
        if let Err(e) = payment.validate() {
            self.transition(CheckoutState::Idle);
            self.notifier.notify(&e.to_string(), LONG_NOTICE);
            return Err(e);
        }

        self.transition(CheckoutState::Submitting);
        let items = self.cart.items();
        let lines: Vec<_> = items.iter().filter_map(CartItem::to_order_item).collect();
        if lines.is_empty() {
            self.transition(CheckoutState::Idle);
            self.notifier.notify("Cart is empty", SHORT_NOTICE);
            return Err(DeskError::Validation("Cart is empty".to_string()));
        }
        let request = OrderRequest {
            customer_id,
            total_amount: lines.iter().map(|l| l.line_total()).sum(),
            items: lines,
            payment_data: payment,
        };

        match self.orders.submit_order(request).await {
            Ok(order) => {
                self.cart.clear();
                self.notifier.notify("Order placed successfully!", LONG_NOTICE);
                self.quantities.invalidator().invalidate();
                info!(order_id = ?order.id, "Order placed");
                self.transition(CheckoutState::Completed);
                Ok(CheckoutOutcome::Completed(order))
            }
            Err(e) => {
                warn!(error = %e, "Order submission failed");
                self.notifier
                    .notify(&format!("Error placing order: {}", e), LONG_NOTICE);
                self.transition(CheckoutState::Failed);
                Err(DeskError::submission("placing order", e))
            }
        }
    }
}
