use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{ApiError, QuantitySource};
use crate::error::DeskError;
use crate::models::ProductQuantity;

/// Stock levels as last published.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantitySnapshot {
    pub quantities: ProductQuantity,
    /// Time of the fetch that produced these values; `None` while the
    /// placeholder defaults are still showing.
    pub as_of: Option<DateTime<Utc>>,
    /// Number of successful fetches published so far.
    pub revision: u64,
}

impl Default for QuantitySnapshot {
    fn default() -> Self {
        Self {
            quantities: ProductQuantity::default(),
            as_of: None,
            revision: 0,
        }
    }
}

impl QuantitySnapshot {
    pub fn is_placeholder(&self) -> bool {
        self.as_of.is_none()
    }
}

#[derive(Default)]
struct PollerState {
    subscribers: usize,
    poller: Option<JoinHandle<()>>,
}

struct Shared {
    source: Arc<dyn QuantitySource>,
    tx: watch::Sender<QuantitySnapshot>,
    period: Duration,
    poller: Mutex<PollerState>,
    issued: AtomicU64,
    applied: AtomicU64,
}

impl Shared {
    fn poller(&self) -> MutexGuard<'_, PollerState> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh(&self) -> Result<(), DeskError> {
        let ticket = self.issued.fetch_add(1, Ordering::AcqRel) + 1;
        let fetched = self
            .source
            .fetch_quantities()
            .await
            .and_then(|q| q.validate().map(|_| q).map_err(ApiError::InvalidResponse));

        let quantities = match fetched {
            Ok(q) => q,
            Err(e) => {
                warn!(error = %e, "Failed to refresh stock levels, keeping last snapshot");
                return Err(DeskError::fetch("stock levels", e));
            }
        };

        let published = self.tx.send_if_modified(|snapshot| {
            // A refresh that started earlier but finished later must not win
            if ticket <= self.applied.load(Ordering::Acquire) {
                return false;
            }
            self.applied.store(ticket, Ordering::Release);
            snapshot.quantities = quantities;
            snapshot.as_of = Some(Utc::now());
            snapshot.revision += 1;
            true
        });
        if published {
            debug!(ticket, "Published stock levels");
        } else {
            debug!(ticket, "Dropping superseded stock levels");
        }
        Ok(())
    }

    fn detach(&self) {
        let mut state = self.poller();
        state.subscribers = state.subscribers.saturating_sub(1);
        if state.subscribers == 0 {
            if let Some(handle) = state.poller.take() {
                handle.abort();
                debug!("Last stock subscriber left, poller stopped");
            }
        }
    }
}

fn spawn_refresh(shared: Arc<Shared>) {
    if tokio::runtime::Handle::try_current().is_err() {
        debug!("No runtime, skipping stock refresh");
        return;
    }
    tokio::spawn(async move {
        let _ = shared.refresh().await;
    });
}

/// One shared, periodically refreshed stock snapshot.
///
/// Starts from placeholder defaults so views have something to show before
/// the first fetch. A failed fetch leaves the previous snapshot in place and
/// publishes nothing. The background poller runs only while at least one
/// [`QuantityWatch`] is alive.
///
/// Cloning yields another handle to the same broadcaster.
#[derive(Clone)]
pub struct QuantityBroadcaster {
    shared: Arc<Shared>,
}

impl QuantityBroadcaster {
    pub fn new(source: Arc<dyn QuantitySource>, period: Duration) -> Self {
        let (tx, _) = watch::channel(QuantitySnapshot::default());
        Self {
            shared: Arc::new(Shared {
                source,
                tx,
                period,
                poller: Mutex::new(PollerState::default()),
                issued: AtomicU64::new(0),
                applied: AtomicU64::new(0),
            }),
        }
    }

    pub fn current(&self) -> QuantitySnapshot {
        self.shared.tx.borrow().clone()
    }

    /// Fetch and publish now. The error is returned for callers that want
    /// it; subscribers never see it.
    pub async fn refresh(&self) -> Result<(), DeskError> {
        self.shared.refresh().await
    }

    /// Fire-and-forget [`refresh`](Self::refresh).
    pub fn refresh_now(&self) {
        spawn_refresh(Arc::clone(&self.shared));
    }

    /// Current snapshot immediately, then every later one.
    ///
    /// The first live subscription starts the background poller; dropping
    /// the last one stops it. Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> QuantityWatch {
        let mut rx = self.shared.tx.subscribe();
        rx.mark_changed();

        let mut state = self.shared.poller();
        state.subscribers += 1;
        if state.poller.is_none() {
            state.poller = Some(self.spawn_poller());
            info!(period_secs = self.shared.period.as_secs(), "Stock poller started");
        }
        drop(state);

        QuantityWatch {
            rx,
            shared: Arc::clone(&self.shared),
        }
    }

    fn spawn_poller(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        let period = self.shared.period;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let _ = shared.refresh().await;
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.poller().subscribers
    }

    pub fn is_polling(&self) -> bool {
        self.shared.poller().poller.is_some()
    }

    /// Handle for signalling that stock may have changed.
    pub fn invalidator(&self) -> QuantityInvalidator {
        QuantityInvalidator {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Stop the poller regardless of live subscriptions.
    pub fn shutdown(&self) {
        let mut state = self.shared.poller();
        if let Some(handle) = state.poller.take() {
            handle.abort();
            info!("Stock poller shut down");
        }
    }
}

/// Live subscription to stock levels. Dropping it detaches.
pub struct QuantityWatch {
    rx: watch::Receiver<QuantitySnapshot>,
    shared: Arc<Shared>,
}

impl QuantityWatch {
    /// Wait for the next snapshot. Returns the current one straight away on
    /// the first call.
    pub async fn next(&mut self) -> QuantitySnapshot {
        // The sender lives in `shared`, which this watch keeps alive
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// Latest snapshot, marking it seen.
    pub fn latest(&mut self) -> QuantitySnapshot {
        self.rx.borrow_and_update().clone()
    }

    /// True if a snapshot has been published since the last one seen.
    pub fn has_update(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}

impl Drop for QuantityWatch {
    fn drop(&mut self) {
        self.shared.detach();
    }
}

/// Signal consumed by the broadcaster: "stock may have changed, refetch".
///
/// Holds only a weak reference, so an invalidator outliving the session
/// is harmless.
#[derive(Clone)]
pub struct QuantityInvalidator {
    shared: Weak<Shared>,
}

impl QuantityInvalidator {
    pub fn invalidate(&self) {
        match self.shared.upgrade() {
            Some(shared) => {
                debug!("Stock invalidated, refreshing");
                spawn_refresh(shared);
            }
            None => debug!("Stock invalidated after broadcaster shut down"),
        }
    }
}
