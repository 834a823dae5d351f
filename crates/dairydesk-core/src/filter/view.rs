use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{apply, Debouncer, DisplayedView, FilterSchema, FilterState, FilterValue};
use crate::api::Repository;
use crate::cache::EntityCache;
use crate::error::DeskError;
use crate::models::Entity;
use crate::quantities::QuantityInvalidator;

struct ViewState<T> {
    cache: EntityCache<T>,
    filters: FilterState,
    generation: u64,
    /// Bumped whenever the search term is set outside the debouncer.
    /// Typed input queued under an older epoch is stale.
    search_epoch: u64,
}

struct Shared<T: Entity> {
    schema: FilterSchema<T>,
    state: Mutex<ViewState<T>>,
    tx: watch::Sender<Arc<DisplayedView<T>>>,
    closed: AtomicBool,
}

impl<T: Entity> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, ViewState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recompute and publish while the caller still holds the lock, so a
    /// subscriber never sees a view computed against a replaced snapshot.
    fn publish(&self, state: &mut ViewState<T>) {
        state.generation += 1;
        let snapshot = state.cache.records();
        let indices = apply(&self.schema, &snapshot, &state.filters);
        debug!(
            kind = %T::KIND,
            shown = indices.len(),
            total = snapshot.len(),
            generation = state.generation,
            "Recomputed list"
        );
        self.tx.send_replace(Arc::new(DisplayedView::new(
            snapshot,
            indices,
            state.generation,
        )));
    }

    fn settle_search(&self, epoch: u64, term: String) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.lock();
        if state.search_epoch != epoch {
            debug!(kind = %T::KIND, term = %term, "Dropping search superseded while pending");
            return;
        }
        if state.filters.set_search(term) {
            self.publish(&mut state);
        }
    }
}

/// One entity list as a view shows it: cache, filter inputs and the
/// displayed subset.
///
/// Free-text search is debounced; every other filter recomputes at once.
/// Dropping or [closing](Self::close) the view cancels pending search
/// input and discards any fetch still in flight.
pub struct ListView<T: Entity> {
    repo: Arc<dyn Repository<T>>,
    shared: Arc<Shared<T>>,
    search: Debouncer<(u64, String)>,
    invalidator: Option<QuantityInvalidator>,
}

impl<T: Entity> ListView<T> {
    /// Must be called from within a tokio runtime.
    pub fn new(repo: Arc<dyn Repository<T>>, debounce: Duration) -> Self {
        let (tx, _) = watch::channel(Arc::new(DisplayedView::empty()));
        let shared = Arc::new(Shared {
            schema: T::filter_schema(),
            state: Mutex::new(ViewState {
                cache: EntityCache::new(),
                filters: FilterState::new(),
                generation: 0,
                search_epoch: 0,
            }),
            tx,
            closed: AtomicBool::new(false),
        });

        let weak: Weak<Shared<T>> = Arc::downgrade(&shared);
        let search = Debouncer::spawn(debounce, move |(epoch, term)| {
            if let Some(shared) = weak.upgrade() {
                shared.settle_search(epoch, term);
            }
        });

        Self {
            repo,
            shared,
            search,
            invalidator: None,
        }
    }

    /// Signal stock changes after creates, updates and deletes of
    /// stock-affecting records.
    pub fn with_invalidator(mut self, invalidator: QuantityInvalidator) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    /// Latest displayed view now, then every recomputation.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DisplayedView<T>>> {
        let mut rx = self.shared.tx.subscribe();
        rx.mark_changed();
        rx
    }

    pub fn current(&self) -> Arc<DisplayedView<T>> {
        self.shared.tx.borrow().clone()
    }

    pub fn schema(&self) -> &FilterSchema<T> {
        &self.shared.schema
    }

    pub fn filters(&self) -> FilterState {
        self.shared.lock().filters.clone()
    }

    pub fn cache_age(&self) -> String {
        self.shared.lock().cache.age_display()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Fetch the full list, replace the cache and recompute.
    ///
    /// Returns the number of records fetched. A failure keeps the previous
    /// snapshot. A result arriving after [`close`](Self::close), or after a
    /// newer refresh already landed, is dropped.
    pub async fn refresh(&self) -> Result<usize, DeskError> {
        if self.is_closed() {
            return Err(DeskError::Cancelled);
        }
        let ticket = self.shared.lock().cache.begin_fetch();
        let result = self.repo.fetch_all().await;

        if self.is_closed() {
            debug!(kind = %T::KIND, "View closed, discarding fetch result");
            return Err(DeskError::Cancelled);
        }

        match result {
            Ok(records) => {
                let count = records.len();
                let mut state = self.shared.lock();
                if state.cache.install(ticket, records) {
                    self.shared.publish(&mut state);
                }
                Ok(count)
            }
            Err(e) => {
                warn!(kind = %T::KIND, error = %e, "Failed to load list");
                Err(DeskError::fetch(T::KIND.title(), e))
            }
        }
    }

    /// Queue a search term; it applies after the quiet period.
    pub fn set_search(&self, term: impl Into<String>) {
        let state = self.shared.lock();
        self.search.push((state.search_epoch, term.into()));
    }

    /// Apply a search term immediately, bypassing the debounce. Any term
    /// still waiting out the quiet period is discarded.
    pub fn set_search_now(&self, term: impl Into<String>) {
        if self.is_closed() {
            return;
        }
        let mut state = self.shared.lock();
        state.search_epoch += 1;
        if state.filters.set_search(term.into()) {
            self.shared.publish(&mut state);
        }
    }

    pub fn set_filter(&self, name: &str, value: FilterValue) -> Result<(), DeskError> {
        self.shared.schema.check(name, &value)?;
        let mut state = self.shared.lock();
        if state.filters.set(name, value) {
            self.shared.publish(&mut state);
        }
        Ok(())
    }

    /// Parse raw input for the named filter, then set it.
    pub fn set_filter_input(&self, name: &str, raw: &str) -> Result<(), DeskError> {
        let value = self.shared.schema.parse_input(name, raw)?;
        self.set_filter(name, value)
    }

    pub fn clear_filter(&self, name: &str) {
        let mut state = self.shared.lock();
        if state.filters.unset(name) {
            self.shared.publish(&mut state);
        }
    }

    /// Drop every filter including the search term, pending search input
    /// too, and show the full cache.
    pub fn clear_filters(&self) {
        let mut state = self.shared.lock();
        state.search_epoch += 1;
        if state.filters.clear() {
            self.shared.publish(&mut state);
        }
    }

    pub async fn create(&self, record: T) -> Result<T, DeskError> {
        if !record.is_new() {
            return Err(DeskError::Validation(format!(
                "New {} record must not carry an id",
                T::KIND
            )));
        }
        let action = format!("creating {}", T::KIND);
        let created = self
            .repo
            .create(record)
            .await
            .map_err(|e| DeskError::submission(action, e))?;
        info!(kind = %T::KIND, id = ?created.id(), "Created record");
        self.after_write().await;
        Ok(created)
    }

    pub async fn update(&self, record: T) -> Result<T, DeskError> {
        let Some(id) = record.id() else {
            return Err(DeskError::Validation(format!(
                "Cannot update a {} record that has not been saved",
                T::KIND
            )));
        };
        let action = format!("updating {}", T::KIND);
        let updated = self
            .repo
            .update(id, record)
            .await
            .map_err(|e| DeskError::submission(action, e))?;
        if updated.id() != Some(id) {
            warn!(kind = %T::KIND, id, returned = ?updated.id(), "Server changed record id on update");
        }
        self.after_write().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), DeskError> {
        let action = format!("deleting {}", T::KIND);
        self.repo
            .delete(id)
            .await
            .map_err(|e| DeskError::submission(action, e))?;
        info!(kind = %T::KIND, id, "Deleted record");
        self.after_write().await;
        Ok(())
    }

    async fn after_write(&self) {
        if T::KIND.affects_stock() {
            if let Some(invalidator) = &self.invalidator {
                invalidator.invalidate();
            }
        }
        if let Err(e) = self.refresh().await {
            warn!(kind = %T::KIND, error = %e, "Reload after write failed");
        }
    }

    /// Cancel pending search input and ignore any fetch still in flight.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            self.search.abort();
            debug!(kind = %T::KIND, "List view closed");
        }
    }
}

impl<T: Entity> Drop for ListView<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::models::{Product, ProductType};
    use futures::future::{BoxFuture, FutureExt};
    use rust_decimal::Decimal;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    const QUIET: Duration = Duration::from_millis(300);

    fn product(id: i64, name: &str, product_type: ProductType) -> Product {
        Product {
            id: Some(id),
            name: name.to_string(),
            product_type,
            category: None,
            quantity: Decimal::ZERO,
            price_per_unit: Decimal::from(50),
            unit: "L".to_string(),
            description: None,
            min_order_quantity: None,
        }
    }

    fn milks() -> Vec<Product> {
        vec![
            product(1, "Cow Milk", ProductType::CowMilk),
            product(2, "Buffalo Milk", ProductType::BuffaloMilk),
        ]
    }

    type Response = oneshot::Receiver<Result<Vec<Product>, ApiError>>;

    /// Each fetch waits for the next scripted response.
    #[derive(Default)]
    struct FakeRepo {
        pending: Mutex<VecDeque<Response>>,
        fail_writes: bool,
    }

    impl FakeRepo {
        fn queue(&self) -> oneshot::Sender<Result<Vec<Product>, ApiError>> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().push_back(rx);
            tx
        }

        fn queue_ok(&self, records: Vec<Product>) {
            let _ = self.queue().send(Ok(records));
        }
    }

    impl Repository<Product> for FakeRepo {
        fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Product>, ApiError>> {
            let next = self.pending.lock().unwrap().pop_front();
            async move {
                match next {
                    Some(rx) => rx.await.unwrap_or(Err(ApiError::ServerError { status: 500, message: "dropped".into() })),
                    None => Err(ApiError::ServerError { status: 500, message: "unscripted".into() }),
                }
            }
            .boxed()
        }

        fn create(&self, mut record: Product) -> BoxFuture<'_, Result<Product, ApiError>> {
            let fail = self.fail_writes;
            async move {
                if fail {
                    return Err(ApiError::BadRequest { status: 409, message: "duplicate name".into() });
                }
                record.id = Some(99);
                Ok(record)
            }
            .boxed()
        }

        fn update(&self, _id: i64, record: Product) -> BoxFuture<'_, Result<Product, ApiError>> {
            async move { Ok(record) }.boxed()
        }

        fn delete(&self, _id: i64) -> BoxFuture<'_, Result<(), ApiError>> {
            async move { Ok(()) }.boxed()
        }
    }

    fn names(view: &DisplayedView<Product>) -> Vec<String> {
        view.iter().map(|p| p.name.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_search_narrows_after_quiet_period() {
        let repo = Arc::new(FakeRepo::default());
        repo.queue_ok(milks());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);
        view.refresh().await.unwrap();

        view.set_search("cow");
        sleep(Duration::from_millis(299)).await;
        assert_eq!(names(&view.current()).len(), 2);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(names(&view.current()), vec!["Cow Milk"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_search_does_not_recompute() {
        let repo = Arc::new(FakeRepo::default());
        repo.queue_ok(milks());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);
        view.refresh().await.unwrap();

        view.set_search("cow");
        sleep(QUIET * 2).await;
        let generation = view.current().generation();

        view.set_search("co");
        view.set_search("cow");
        sleep(QUIET * 2).await;
        assert_eq!(view.current().generation(), generation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_filters_discards_pending_search() {
        let repo = Arc::new(FakeRepo::default());
        repo.queue_ok(milks());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);
        view.refresh().await.unwrap();

        view.set_search("cow");
        sleep(Duration::from_millis(100)).await;
        view.clear_filters();
        assert_eq!(view.current().len(), 2);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(view.filters().search(), "");
        assert_eq!(names(&view.current()), vec!["Cow Milk", "Buffalo Milk"]);

        view.set_search("buffalo");
        sleep(QUIET * 2).await;
        assert_eq!(names(&view.current()), vec!["Buffalo Milk"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_search_wins_over_pending_keystrokes() {
        let repo = Arc::new(FakeRepo::default());
        repo.queue_ok(milks());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);
        view.refresh().await.unwrap();

        view.set_search("cow");
        view.set_search_now("buffalo");
        sleep(QUIET * 2).await;
        assert_eq!(view.filters().search(), "buffalo");
        assert_eq!(names(&view.current()), vec!["Buffalo Milk"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_search_applies_to_snapshot_refreshed_meanwhile() {
        let repo = Arc::new(FakeRepo::default());
        repo.queue_ok(milks());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);
        view.refresh().await.unwrap();

        view.set_search("milk");
        sleep(Duration::from_millis(100)).await;

        let mut next = milks();
        next.push(product(3, "Toned Milk", ProductType::CowMilk));
        next.push(product(4, "Curd", ProductType::Curd));
        repo.queue_ok(next);
        view.refresh().await.unwrap();
        assert_eq!(view.current().len(), 4);

        sleep(QUIET).await;
        let shown = view.current();
        assert_eq!(shown.total(), 4);
        assert_eq!(names(&shown), vec!["Cow Milk", "Buffalo Milk", "Toned Milk"]);
    }

    #[tokio::test]
    async fn test_non_text_filters_apply_immediately() {
        let repo = Arc::new(FakeRepo::default());
        repo.queue_ok(milks());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);
        view.refresh().await.unwrap();

        view.set_filter("type", FilterValue::Text("BUFFALO_MILK".into()))
            .unwrap();
        assert_eq!(names(&view.current()), vec!["Buffalo Milk"]);

        view.clear_filters();
        assert_eq!(names(&view.current()), vec!["Cow Milk", "Buffalo Milk"]);
    }

    #[tokio::test]
    async fn test_unknown_or_mistyped_filter_is_rejected() {
        let repo = Arc::new(FakeRepo::default());
        let view = ListView::new(repo as Arc<dyn Repository<Product>>, QUIET);
        assert!(matches!(
            view.set_filter("colour", FilterValue::Text("white".into())),
            Err(DeskError::Validation(_))
        ));
        assert!(matches!(
            view.set_filter_input("min_price", "cheap"),
            Err(DeskError::Validation(_))
        ));
        assert!(view.filters().is_empty());
    }

    #[tokio::test]
    async fn test_cache_replacement_recomputes_with_current_filters() {
        let repo = Arc::new(FakeRepo::default());
        repo.queue_ok(milks());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);
        view.refresh().await.unwrap();
        view.set_search_now("milk");

        let mut rx = view.subscribe();
        let _ = rx.borrow_and_update();

        let mut next = milks();
        next.push(product(3, "Toned Milk", ProductType::CowMilk));
        next.push(product(4, "Curd", ProductType::Curd));
        repo.queue_ok(next);
        view.refresh().await.unwrap();

        assert!(rx.has_changed().unwrap());
        let shown = rx.borrow_and_update().clone();
        assert_eq!(shown.total(), 4);
        assert_eq!(names(&shown), vec!["Cow Milk", "Buffalo Milk", "Toned Milk"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let repo = Arc::new(FakeRepo::default());
        repo.queue_ok(milks());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);
        view.refresh().await.unwrap();

        let _ = repo.queue().send(Err(ApiError::ServerError { status: 500, message: "down".into() }));
        assert!(matches!(view.refresh().await, Err(DeskError::Fetch { .. })));
        assert_eq!(view.current().len(), 2);
    }

    #[tokio::test]
    async fn test_older_response_never_replaces_newer() {
        let repo = Arc::new(FakeRepo::default());
        let slow = repo.queue();
        let fast = repo.queue();
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);

        let (first, second) = tokio::join!(view.refresh(), async {
            let _ = fast.send(Ok(vec![product(2, "Buffalo Milk", ProductType::BuffaloMilk)]));
            let result = view.refresh().await;
            let _ = slow.send(Ok(milks()));
            result
        });
        assert_eq!(first.unwrap(), 2);
        assert_eq!(second.unwrap(), 1);
        assert_eq!(names(&view.current()), vec!["Buffalo Milk"]);
    }

    #[tokio::test]
    async fn test_fetch_after_close_is_discarded() {
        let repo = Arc::new(FakeRepo::default());
        let response = repo.queue();
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);

        let (result, _) = tokio::join!(view.refresh(), async {
            view.close();
            let _ = response.send(Ok(milks()));
        });
        assert!(matches!(result, Err(DeskError::Cancelled)));
        assert!(view.current().is_empty());
        assert_eq!(view.current().generation(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_search() {
        let repo = Arc::new(FakeRepo::default());
        repo.queue_ok(milks());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);
        view.refresh().await.unwrap();

        view.set_search("cow");
        view.close();
        sleep(QUIET * 2).await;
        assert_eq!(view.filters().search(), "");
        assert_eq!(view.current().len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_existing_id() {
        let repo = Arc::new(FakeRepo::default());
        let view = ListView::new(repo as Arc<dyn Repository<Product>>, QUIET);
        let result = view.create(product(5, "Ghee", ProductType::Other)).await;
        assert!(matches!(result, Err(DeskError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_reloads_list() {
        let repo = Arc::new(FakeRepo::default());
        let view = ListView::new(repo.clone() as Arc<dyn Repository<Product>>, QUIET);

        let mut ghee = product(0, "Ghee", ProductType::Other);
        ghee.id = None;
        let mut reloaded = milks();
        reloaded.push(product(99, "Ghee", ProductType::Other));
        repo.queue_ok(reloaded);

        let created = view.create(ghee).await.unwrap();
        assert_eq!(created.id, Some(99));
        assert_eq!(view.current().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_create_is_submission_error() {
        let repo = Arc::new(FakeRepo {
            fail_writes: true,
            ..FakeRepo::default()
        });
        let view = ListView::new(repo as Arc<dyn Repository<Product>>, QUIET);
        let mut ghee = product(0, "Ghee", ProductType::Other);
        ghee.id = None;
        let err = view.create(ghee).await.unwrap_err();
        assert!(matches!(err, DeskError::Submission { .. }));
        assert!(err.to_string().contains("duplicate name"));
    }
}
