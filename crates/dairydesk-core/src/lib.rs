//! State layer for the dairy admin console.
//!
//! Entity lists are cached per view and filtered through a debounced
//! multi-predicate pipeline ([`filter`]). Stock levels come from one shared,
//! periodically refreshed [`quantities::QuantityBroadcaster`]. The cart is a
//! locally persisted [`cart::CartStore`], drained into an order by
//! [`checkout::CheckoutOrchestrator`]. The REST backend, payment dialog,
//! storage and notification sink are reached through traits so any of them
//! can be swapped out.

pub mod api;
pub mod cache;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod notify;
pub mod quantities;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use cart::CartStore;
pub use checkout::CheckoutOrchestrator;
pub use config::Config;
pub use error::DeskError;
pub use filter::ListView;
pub use quantities::QuantityBroadcaster;
