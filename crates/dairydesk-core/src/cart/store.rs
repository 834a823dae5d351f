use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DeskError;
use crate::models::{OrderItem, Product};
use crate::notify::{Notifier, SHORT_NOTICE};
use crate::storage::KeyValueStore;

/// Storage key holding the serialized cart.
pub const CART_KEY: &str = "cart";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    pub fn product_id(&self) -> Option<i64> {
        self.product.id
    }

    pub fn line_total(&self) -> Decimal {
        self.product.price_per_unit * Decimal::from(self.quantity)
    }

    pub fn to_order_item(&self) -> Option<OrderItem> {
        Some(OrderItem {
            product_id: self.product.id?,
            quantity: Decimal::from(self.quantity),
            price: self.product.price_per_unit,
        })
    }
}

/// Decode a stored cart blob.
///
/// Entries for the same product are merged, and entries with no product id
/// or a zero quantity are dropped, so the result always satisfies the cart
/// invariants.
pub fn decode_cart(blob: &str) -> Result<Vec<CartItem>, DeskError> {
    let raw: Vec<CartItem> =
        serde_json::from_str(blob).map_err(|e| DeskError::StorageCorruption(e.to_string()))?;

    let mut items: Vec<CartItem> = Vec::with_capacity(raw.len());
    for item in raw {
        if item.quantity == 0 || item.product_id().is_none() {
            continue;
        }
        match items.iter_mut().find(|i| i.product_id() == item.product_id()) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }
    Ok(items)
}

/// Cart of (product, quantity) pairs.
///
/// At most one entry per product id, every quantity at least 1. Every
/// mutation writes the full cart to storage before returning. Totals are
/// computed from the entries on each call.
///
/// Cloning yields another handle to the same cart.
#[derive(Clone)]
pub struct CartStore {
    items: Arc<Mutex<Vec<CartItem>>>,
    storage: Arc<dyn KeyValueStore>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl CartStore {
    /// Rehydrate from storage. A missing, unreadable or corrupt blob gives
    /// an empty cart.
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Self {
        let items = match storage.get_item(CART_KEY) {
            Ok(Some(blob)) => decode_cart(&blob).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding stored cart");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Could not read stored cart");
                Vec::new()
            }
        };
        debug!(entries = items.len(), "Cart loaded");
        Self {
            items: Arc::new(Mutex::new(items)),
            storage,
            notifier: None,
        }
    }

    /// Confirm adds, removals and clears to the user.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn confirm(&self, message: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(message, SHORT_NOTICE);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CartItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, items: &[CartItem]) {
        let blob = match serde_json::to_string(items) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Could not serialize cart");
                return;
            }
        };
        if let Err(e) = self.storage.set_item(CART_KEY, &blob) {
            warn!(error = %e, "Could not save cart");
        }
    }

    /// Add one unit of `product`, merging with an existing entry.
    /// Returns the entry's new quantity.
    pub fn add(&self, product: &Product) -> Result<u32, DeskError> {
        let id = product.id.ok_or_else(|| {
            DeskError::Validation(format!("{} has not been saved yet", product.name))
        })?;
        let mut items = self.lock();
        let quantity = match items.iter_mut().find(|i| i.product_id() == Some(id)) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(1);
                existing.quantity
            }
            None => {
                items.push(CartItem {
                    product: product.clone(),
                    quantity: 1,
                });
                1
            }
        };
        self.persist(&items);
        drop(items);
        self.confirm(&format!("{} added to cart", product.name));
        Ok(quantity)
    }

    /// Returns false if no entry matched.
    pub fn remove(&self, product_id: i64) -> bool {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|i| i.product_id() != Some(product_id));
        let removed = items.len() != before;
        if removed {
            self.persist(&items);
            drop(items);
            self.confirm("Item removed from cart");
        }
        removed
    }

    /// Change an entry's quantity by `delta`. Reaching zero or below removes
    /// the entry. Returns the new quantity, or `None` if the entry is gone.
    pub fn set_quantity_delta(&self, product_id: i64, delta: i64) -> Option<u32> {
        let mut items = self.lock();
        let index = items.iter().position(|i| i.product_id() == Some(product_id))?;
        let next = i64::from(items[index].quantity).saturating_add(delta);
        let result = if next <= 0 {
            items.remove(index);
            None
        } else {
            let quantity = u32::try_from(next).unwrap_or(u32::MAX);
            items[index].quantity = quantity;
            Some(quantity)
        };
        self.persist(&items);
        result
    }

    pub fn clear(&self) {
        let mut items = self.lock();
        items.clear();
        self.persist(&items);
        drop(items);
        self.confirm("Cart cleared");
    }

    pub fn total_price(&self) -> Decimal {
        self.lock().iter().map(CartItem::line_total).sum()
    }

    pub fn total_item_count(&self) -> u64 {
        self.lock().iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Copy of the entries in insertion order.
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
