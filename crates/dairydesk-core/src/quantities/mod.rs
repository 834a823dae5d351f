//! Session-wide stock levels.

pub mod broadcaster;

pub use broadcaster::{QuantityBroadcaster, QuantityInvalidator, QuantitySnapshot, QuantityWatch};
