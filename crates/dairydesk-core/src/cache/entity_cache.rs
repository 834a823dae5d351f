use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::api::Repository;
use crate::error::DeskError;
use crate::models::Entity;
use crate::utils::format_age;

/// Consider a snapshot stale after 1 hour.
const CACHE_STALE_MINUTES: i64 = 60;

/// Authoritative snapshot of one entity list.
///
/// The snapshot is replaced wholesale and never patched. Readers hold an
/// `Arc` to whichever snapshot was current when they looked, so they always
/// see a complete list.
///
/// Fetches are ticketed: [`begin_fetch`](Self::begin_fetch) hands out an
/// increasing ticket and [`install`](Self::install) refuses a result whose
/// ticket is older than the one already installed. A slow response can
/// therefore never overwrite a newer list.
#[derive(Debug)]
pub struct EntityCache<T> {
    records: Arc<Vec<T>>,
    fetched_at: Option<DateTime<Utc>>,
    issued: u64,
    installed: u64,
}

impl<T> Default for EntityCache<T> {
    fn default() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            fetched_at: None,
            issued: 0,
            installed: 0,
        }
    }
}

impl<T> EntityCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; empty until the first successful fetch.
    pub fn records(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn begin_fetch(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Replace the snapshot with the result of fetch `ticket`.
    ///
    /// Returns false, leaving the snapshot alone, when a newer fetch has
    /// already been installed.
    pub fn install(&mut self, ticket: u64, records: Vec<T>) -> bool {
        if ticket <= self.installed {
            debug!(ticket, installed = self.installed, "Dropping superseded fetch");
            return false;
        }
        self.installed = ticket;
        self.records = Arc::new(records);
        self.fetched_at = Some(Utc::now());
        true
    }

    /// "never" until the first fetch lands.
    pub fn age_display(&self) -> String {
        self.fetched_at
            .map_or_else(|| "never".to_string(), |at| format_age(at, Utc::now()))
    }

    pub fn is_stale(&self) -> bool {
        self.fetched_at
            .map_or(true, |at| (Utc::now() - at).num_minutes() > CACHE_STALE_MINUTES)
    }
}

impl<T: Entity> EntityCache<T> {
    /// Fetch the full list and install it.
    ///
    /// On failure the previous snapshot stays in place and the error is
    /// returned for the caller to report. There is no retry here.
    pub async fn fetch_all(
        &mut self,
        repo: &dyn Repository<T>,
    ) -> Result<Arc<Vec<T>>, DeskError> {
        let ticket = self.begin_fetch();
        let records = repo
            .fetch_all()
            .await
            .map_err(|e| DeskError::fetch(T::KIND.title(), e))?;
        debug!(kind = %T::KIND, count = records.len(), "Fetched list");
        self.install(ticket, records);
        Ok(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::models::{Product, ProductType};
    use chrono::Duration;
    use futures::future::{BoxFuture, FutureExt};
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    fn product(id: i64, name: &str) -> Product {
        Product {
            id: Some(id),
            name: name.to_string(),
            product_type: ProductType::CowMilk,
            category: None,
            quantity: Decimal::ZERO,
            price_per_unit: Decimal::from(50),
            unit: "L".to_string(),
            description: None,
            min_order_quantity: None,
        }
    }

    struct ScriptedRepo {
        responses: Mutex<Vec<Result<Vec<Product>, ApiError>>>,
    }

    impl Repository<Product> for ScriptedRepo {
        fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Product>, ApiError>> {
            let next = self.responses.lock().unwrap().remove(0);
            async move { next }.boxed()
        }

        fn create(&self, record: Product) -> BoxFuture<'_, Result<Product, ApiError>> {
            async move { Ok(record) }.boxed()
        }

        fn update(&self, _id: i64, record: Product) -> BoxFuture<'_, Result<Product, ApiError>> {
            async move { Ok(record) }.boxed()
        }

        fn delete(&self, _id: i64) -> BoxFuture<'_, Result<(), ApiError>> {
            async move { Ok(()) }.boxed()
        }
    }

    #[test]
    fn test_age_follows_last_install() {
        let mut cache = EntityCache::new();
        let ticket = cache.begin_fetch();
        cache.install(ticket, vec![product(1, "Cow Milk")]);
        assert_eq!(cache.age_display(), "just now");
        assert!(!cache.is_stale());

        cache.fetched_at = Some(Utc::now() - Duration::minutes(61));
        assert_eq!(cache.age_display(), "1h ago");
        assert!(cache.is_stale());
    }

    #[test]
    fn test_empty_cache_reports_never() {
        let cache: EntityCache<Product> = EntityCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.age_display(), "never");
        assert!(cache.is_stale());
    }

    #[test]
    fn test_superseded_fetch_is_dropped() {
        let mut cache = EntityCache::new();
        let older = cache.begin_fetch();
        let newer = cache.begin_fetch();

        assert!(cache.install(newer, vec![product(2, "Buffalo Milk")]));
        assert!(!cache.install(older, vec![product(1, "Cow Milk")]));
        assert_eq!(cache.records()[0].name, "Buffalo Milk");
    }

    #[test]
    fn test_install_replaces_wholesale() {
        let mut cache = EntityCache::new();
        let first = cache.begin_fetch();
        cache.install(first, vec![product(1, "Cow Milk"), product(2, "Curd")]);
        let held = cache.records();

        let second = cache.begin_fetch();
        cache.install(second, vec![product(3, "Buffalo Milk")]);

        assert_eq!(held.len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_snapshot() {
        let repo = ScriptedRepo {
            responses: Mutex::new(vec![
                Ok(vec![product(1, "Cow Milk")]),
                Err(ApiError::ServerError { status: 500, message: "boom".into() }),
            ]),
        };
        let mut cache = EntityCache::new();
        cache.fetch_all(&repo).await.unwrap();

        let err = cache.fetch_all(&repo).await.unwrap_err();
        assert!(matches!(err, DeskError::Fetch { .. }));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.records()[0].name, "Cow Milk");
    }
}
