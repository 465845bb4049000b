//! ==============================================================================
//! aggregator.rs - fan-out / fan-in over the registry
//! ==============================================================================
//!
//! purpose:
//! ```text
//!     fetch every registry controller concurrently, wait for all of them and
//!     assemble one DashboardSnapshot in registry order.
//!
//!     the snapshot lives in a watch channel owned by SnapshotStore:
//!     - one writer (the aggregator, driven by the scheduler)
//!     - many readers (http handlers) holding SnapshotReader
//!     - every publish replaces the whole Arc<DashboardSnapshot>, so a reader
//!       sees either the previous cycle or the next one, never a mix
//! ```
//!
//! relationships:
//! ```text
//!     - uses: upstream.rs (SensorFetcher), registry.rs, domain.rs
//!     - used by: scheduler.rs (drives cycles), api.rs (reads snapshots)
//! ```
//!
//! ==============================================================================

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;

use crate::domain::{now_ms, ControllerSnapshot, DashboardSnapshot, GroupSnapshot, Reading};
use crate::registry::Registry;
use crate::upstream::SensorFetcher;

/// how a cycle is surfaced to readers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    /// raise `initial_loading` until the snapshot lands
    Initial,
    /// keep serving the previous snapshot until it is replaced
    Silent,
}

pub struct SnapshotStore {
    tx: watch::Sender<Arc<DashboardSnapshot>>,
}

#[derive(Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Arc<DashboardSnapshot>>,
}

impl SnapshotStore {
    pub fn new(initial: DashboardSnapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader { rx: self.tx.subscribe() }
    }

    pub fn current(&self) -> Arc<DashboardSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn publish(&self, snapshot: DashboardSnapshot) -> Arc<DashboardSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(snapshot.clone());
        snapshot
    }
}

impl SnapshotReader {
    pub fn current(&self) -> Arc<DashboardSnapshot> {
        self.rx.borrow().clone()
    }

    /// wait for the next publish; false once the store is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

pub struct Aggregator {
    registry: Arc<Registry>,
    fetcher: Arc<dyn SensorFetcher>,
    store: SnapshotStore,
}

impl Aggregator {
    /// starts with every controller in the loading state
    pub fn new(registry: Arc<Registry>, fetcher: Arc<dyn SensorFetcher>) -> Self {
        let store = SnapshotStore::new(DashboardSnapshot::placeholder(&registry));
        Self { registry, fetcher, store }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn reader(&self) -> SnapshotReader {
        self.store.reader()
    }

    pub fn current(&self) -> Arc<DashboardSnapshot> {
        self.store.current()
    }

    /// one fetch task per controller, joined without short-circuiting.
    /// the result is not published.
    pub async fn aggregate(&self) -> DashboardSnapshot {
        let handles: Vec<_> = self
            .registry
            .groups()
            .iter()
            .flat_map(|g| g.controllers.iter())
            .map(|controller| {
                let fetcher = self.fetcher.clone();
                let mac = controller.mac.clone();
                tokio::spawn(async move { fetcher.fetch(&mac).await })
            })
            .collect();

        let mut readings = join_all(handles).await.into_iter().map(|joined| {
            joined.unwrap_or_else(|e| Reading::error(format!("Failed to fetch: {e}")))
        });

        let groups = self
            .registry
            .groups()
            .iter()
            .map(|group| GroupSnapshot {
                name: group.name.clone(),
                controllers: group
                    .controllers
                    .iter()
                    .map(|controller| ControllerSnapshot {
                        name: controller.name.clone(),
                        mac: controller.mac.clone(),
                        reading: readings
                            .next()
                            .unwrap_or_else(|| Reading::error("Failed to fetch: no result")),
                        is_loading: false,
                    })
                    .collect(),
            })
            .collect();

        DashboardSnapshot {
            groups,
            cycle: 0,
            refreshed_at_ms: Some(now_ms()),
            initial_loading: false,
        }
    }

    /// signal the loading state an initial cycle exposes to readers
    pub fn begin(&self, mode: AggregationMode) {
        if mode == AggregationMode::Initial {
            self.store.tx.send_modify(|current| {
                Arc::make_mut(current).initial_loading = true;
            });
        }
    }

    /// replace the shared snapshot with the result of a finished cycle
    pub fn publish(&self, mut snapshot: DashboardSnapshot) -> Arc<DashboardSnapshot> {
        snapshot.cycle = self.store.current().cycle + 1;
        snapshot.initial_loading = false;
        self.store.publish(snapshot)
    }

    /// begin, aggregate and publish in one step
    pub async fn refresh(&self, mode: AggregationMode) -> Arc<DashboardSnapshot> {
        self.begin(mode);
        let snapshot = self.aggregate().await;
        let published = self.publish(snapshot);
        log_cycle(&published, mode);
        published
    }
}

pub(crate) fn log_cycle(snapshot: &DashboardSnapshot, mode: AggregationMode) {
    let failed = snapshot
        .controllers()
        .filter(|(_, c)| matches!(c.reading, Reading::Error { .. }))
        .count();
    let total = snapshot.controllers().count();
    tracing::info!(cycle = snapshot.cycle, ?mode, total, failed, "snapshot refreshed");
}
