//! REST boundary for the dairy backend.
//!
//! The state layer talks to the backend only through the traits in
//! [`backend`]; `ApiClient` is the reqwest implementation used at runtime.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::{OrderGateway, QuantitySource, Repository};
pub use client::ApiClient;
pub use error::ApiError;
