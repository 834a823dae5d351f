use futures::future::BoxFuture;

use super::ApiError;
use crate::models::{Entity, Order, OrderRequest, ProductQuantity};

/// List and CRUD access to one entity collection.
pub trait Repository<T: Entity>: Send + Sync {
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<T>, ApiError>>;

    fn create(&self, record: T) -> BoxFuture<'_, Result<T, ApiError>>;

    fn update(&self, id: i64, record: T) -> BoxFuture<'_, Result<T, ApiError>>;

    fn delete(&self, id: i64) -> BoxFuture<'_, Result<(), ApiError>>;
}

/// Source of the per-category stock snapshot.
pub trait QuantitySource: Send + Sync {
    fn fetch_quantities(&self) -> BoxFuture<'_, Result<ProductQuantity, ApiError>>;
}

/// Accepts a finished checkout as an order.
pub trait OrderGateway: Send + Sync {
    fn submit_order(&self, request: OrderRequest) -> BoxFuture<'_, Result<Order, ApiError>>;
}
