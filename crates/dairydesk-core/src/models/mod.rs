//! Data models for dairydesk entities.
//!
//! This module contains the records exchanged with the backend:
//!
//! - `Customer`, `Product`, `MilkDelivery`, `Payment`, `Order`: list entities
//! - `ProductQuantity`: per-category stock levels
//! - `OrderRequest`, `CapturedPayment`: checkout payloads
//!
//! Every list entity implements [`Entity`], which ties it to its REST path
//! and to the filter schema its list view uses.

pub mod customer;
pub mod delivery;
pub mod order;
pub mod payment;
pub mod product;
pub mod quantity;

use serde::{de::DeserializeOwned, Serialize};

use crate::filter::FilterSchema;

pub use customer::{Customer, DeliveryStatus, MilkType};
pub use delivery::MilkDelivery;
pub use order::{Order, OrderItem, OrderRequest};
pub use payment::{CapturedPayment, Payment, PaymentMethod, PaymentStatus};
pub use product::{Product, ProductType};
pub use quantity::{ProductQuantity, QuantityCategory};

/// The server-side collections a list view can be built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Customers,
    Products,
    Deliveries,
    Payments,
    Orders,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Customers,
        EntityKind::Products,
        EntityKind::Deliveries,
        EntityKind::Payments,
        EntityKind::Orders,
    ];

    /// REST collection path, relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Products => "products",
            EntityKind::Deliveries => "deliveries",
            EntityKind::Payments => "payments",
            EntityKind::Orders => "orders",
        }
    }

    /// Get the display title for this kind.
    pub fn title(&self) -> &'static str {
        match self {
            EntityKind::Customers => "Customers",
            EntityKind::Products => "Products",
            EntityKind::Deliveries => "Deliveries",
            EntityKind::Payments => "Payments",
            EntityKind::Orders => "Orders",
        }
    }

    /// Whether creating, changing or deleting records of this kind moves stock levels.
    pub fn affects_stock(&self) -> bool {
        matches!(
            self,
            EntityKind::Products | EntityKind::Deliveries | EntityKind::Orders
        )
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.path() == lower || kind.path().trim_end_matches('s') == lower)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// A server-identified record.
///
/// The identifier is assigned by the server; a record whose `id()` is `None`
/// has not been persisted yet.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Option<i64>;

    fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Search fields and filter inputs offered by this entity's list view.
    fn filter_schema() -> FilterSchema<Self>;
}
