//! Shopping cart persisted to local storage.

pub mod store;

pub use store::{decode_cart, CartItem, CartStore, CART_KEY};
