//! The store the UI talks to.
//!
//! ```text
//!   intent ─▶ outbox + queue ─▶ Signal ─▶ dispatcher ─▶ processor ─▶ backend
//!                 ▲                                       │
//!                 └────────── confirm / discard ◀─────────┘
//!   refresher (timer) ──▶ Idle? ──▶ list ──▶ replace entities
//! ```
//!
//! Intents only record the change locally and wake the dispatcher; the
//! dispatcher task is the single place mutations are sent from.

use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace};

use crate::backend::{ProductsBackend, ResilientBackend};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::metrics::{MetricsSnapshot, SyncMetrics};
use crate::model::{NewProduct, Product, ProductView, TempId};
use crate::processor::ReconciliationProcessor;
use crate::queue::PendingChange;
use crate::refresher::{load, BackgroundRefresher};
use crate::state::{Shared, Signal, SyncState};
use crate::status::RequestStatus;

pub struct ProductsStore {
    shared: Arc<Shared>,
    dispatcher: Option<JoinHandle<()>>,
    refresher: Option<BackgroundRefresher>,
}

impl ProductsStore {
    /// Build the store, start the initial load and (if configured) the
    /// background refresher on the current tokio runtime.
    pub fn new<B>(backend: B, config: StoreConfig) -> Result<Self, StoreError>
    where
        B: ProductsBackend + 'static,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;

        let (signals, inbox) = mpsc::unbounded_channel();
        let mut shared = Shared::new(config.clone(), signals);
        shared.state.get_mut().status.begin_loading()?;
        let shared = Arc::new(shared);
        if let Ok(state) = shared.state.try_read() {
            shared.publish(&state);
        }
        shared.signal(Signal::Reload);

        let backend = Arc::new(ResilientBackend::new(backend, config.call.clone()));
        let processor = ReconciliationProcessor::new(Arc::clone(&shared), Arc::clone(&backend));
        let dispatcher = runtime.spawn(run_dispatcher(
            Arc::clone(&shared),
            processor,
            Arc::clone(&backend),
            inbox,
        ));
        let refresher = config
            .refresh_interval
            .map(|period| BackgroundRefresher::start(Arc::clone(&shared), backend, period));

        info!(?config, "products store started");
        Ok(Self {
            shared,
            dispatcher: Some(dispatcher),
            refresher,
        })
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Show `product` immediately and queue its creation.
    #[instrument(skip(self, product))]
    pub async fn add_product(&self, product: NewProduct) -> TempId {
        let temp_id = TempId::generate();
        let mut state = self.shared.state.write().await;
        state.outbox.add_addition(temp_id.clone(), product.clone());
        state.queue.enqueue(PendingChange::Add {
            temp_id: temp_id.clone(),
            payload: product,
        });
        self.enqueued(&state);
        debug!(temp_id = %temp_id, "addition queued");
        temp_id
    }

    /// Queue a full replacement of `product` (matched by id).
    #[instrument(skip(self, product), fields(id = %product.id))]
    pub async fn update_product(&self, product: Product) -> Result<(), StoreError> {
        ensure_confirmed(&product)?;
        let mut state = self.shared.state.write().await;
        state.outbox.add_update(product.clone());
        state.queue.enqueue(PendingChange::Update { entity: product });
        self.enqueued(&state);
        Ok(())
    }

    pub async fn double_price(&self, product: Product) -> Result<(), StoreError> {
        self.update_product(product.with_doubled_price()).await
    }

    #[instrument(skip(self, product), fields(id = %product.id))]
    pub async fn delete_product(&self, product: Product) -> Result<(), StoreError> {
        ensure_confirmed(&product)?;
        let mut state = self.shared.state.write().await;
        state.outbox.add_deletion(product.clone());
        state.queue.enqueue(PendingChange::Delete { entity: product });
        self.enqueued(&state);
        Ok(())
    }

    /// Leave the error state. Queued changes resume afterwards.
    pub async fn clear_error(&self) -> Result<(), StoreError> {
        let mut state = self.shared.state.write().await;
        state.status.clear_error()?;
        self.shared.publish(&state);
        Ok(())
    }

    /// Full reload from the backend.
    ///
    /// From `BackgroundFetching` the running refresh is promoted to the load
    /// instead of issuing a second list call.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<(), StoreError> {
        let mut state = self.shared.state.write().await;
        let promote = state.status == RequestStatus::BackgroundFetching;
        state.status.begin_loading()?;
        self.shared.publish(&state);
        if !promote {
            self.shared.signal(Signal::Reload);
        }
        Ok(())
    }

    fn enqueued(&self, state: &SyncState<Product>) {
        SyncMetrics::incr(&self.shared.metrics.intents_enqueued);
        self.shared.publish(state);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Confirmed products merged with everything still pending.
    pub async fn product_list(&self) -> Vec<ProductView> {
        self.shared.state.read().await.project()
    }

    /// Only confirmed products.
    pub async fn confirmed_products(&self) -> Vec<Product> {
        self.shared.state.read().await.entities.iter().cloned().collect()
    }

    pub async fn request_status(&self) -> RequestStatus {
        self.shared.state.read().await.status.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.shared.state.read().await.status.is_loading()
    }

    pub async fn has_error(&self) -> bool {
        self.shared.state.read().await.status.has_error()
    }

    pub async fn error_message(&self) -> Option<String> {
        self.shared
            .state
            .read()
            .await
            .status
            .error_message()
            .map(str::to_string)
    }

    /// Changes queued but not yet sent.
    pub async fn pending_changes(&self) -> usize {
        self.shared.state.read().await.queue.len()
    }

    /// Changes not yet confirmed or discarded, in-flight one included.
    pub async fn outbox_len(&self) -> usize {
        self.shared.state.read().await.outbox.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Follow request status changes.
    pub fn subscribe(&self) -> watch::Receiver<RequestStatus> {
        self.shared.subscribe_status()
    }

    /// Revision counter bumped on every state change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.subscribe_revision()
    }

    /// Wait until nothing is in flight and no queued change can start on its
    /// own: either the queue is empty or the store is in the error state.
    pub async fn settled(&self) {
        let mut changes = self.changes();
        loop {
            if self.shared.state.read().await.is_settled() {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn is_running(&self) -> bool {
        self.dispatcher.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the dispatcher and the refresher. Calls already sent to the
    /// backend are abandoned; their outbox entries stay where they are.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(mut refresher) = self.refresher.take() {
            refresher.stop();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
            info!("products store shut down");
        }
    }
}

impl fmt::Debug for ProductsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductsStore")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .field("refreshing", &self.refresher.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for ProductsStore {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Server ids must not use the temporary prefix (see [`TempId::is_temporary`]).
fn ensure_confirmed(product: &Product) -> Result<(), StoreError> {
    if TempId::is_temporary(product.id.as_str()) {
        return Err(StoreError::Unconfirmed {
            id: product.id.to_string(),
        });
    }
    Ok(())
}

/// Single consumer of [`Signal`]s. Loads and reconciliation cycles run here
/// one after another, never concurrently.
async fn run_dispatcher<B>(
    shared: Arc<Shared>,
    processor: ReconciliationProcessor<B>,
    backend: Arc<B>,
    mut inbox: mpsc::UnboundedReceiver<Signal>,
) where
    B: ProductsBackend,
{
    while let Some(signal) = inbox.recv().await {
        let mut reload = signal == Signal::Reload;
        // Coalesce whatever piled up while we were busy.
        while let Ok(next) = inbox.try_recv() {
            reload |= next == Signal::Reload;
        }

        if reload {
            load(&shared, backend.as_ref()).await;
        }
        while let Some(outcome) = processor.reconcile_next().await {
            trace!(?outcome, "reconciliation cycle finished");
        }
    }
    debug!("dispatcher inbox closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use assert_matches::assert_matches;

    #[test]
    fn new_outside_runtime_is_an_error() {
        let result = ProductsStore::new(InMemoryBackend::seeded(), StoreConfig::default());
        assert_matches!(result, Err(StoreError::NoRuntime));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = StoreConfig::default().with_refresh_interval(std::time::Duration::ZERO);
        let result = ProductsStore::new(InMemoryBackend::seeded(), config);
        assert_matches!(result, Err(StoreError::Config(_)));
    }

    #[tokio::test]
    async fn starts_loading_and_settles_idle() {
        let store =
            ProductsStore::new(InMemoryBackend::seeded(), StoreConfig::default().without_refresh())
                .unwrap();
        assert!(store.is_loading().await);

        store.settled().await;
        assert_eq!(store.request_status().await, RequestStatus::Idle);
        assert_eq!(store.product_list().await.len(), 5);
        assert_eq!(store.metrics().loads_completed, 1);
    }

    #[tokio::test]
    async fn temporary_products_cannot_be_edited() {
        let store =
            ProductsStore::new(InMemoryBackend::new(), StoreConfig::default().without_refresh())
                .unwrap();
        let temp_id = store.add_product(NewProduct::new("Y", 5.0)).await;
        let optimistic = Product::new(temp_id.as_str(), "Y", 5.0);

        assert_matches!(
            store.delete_product(optimistic.clone()).await,
            Err(StoreError::Unconfirmed { .. })
        );
        assert_matches!(
            store.double_price(optimistic).await,
            Err(StoreError::Unconfirmed { .. })
        );
    }

    #[tokio::test]
    async fn debug_output_names_the_store() {
        let store = ProductsStore::new(InMemoryBackend::seeded(), StoreConfig::default()).unwrap();
        let rendered = format!("{store:?}");
        assert!(rendered.starts_with("ProductsStore"));
        assert!(rendered.contains("running: true"));
    }

    #[tokio::test]
    async fn shutdown_stops_background_tasks() {
        let store = ProductsStore::new(InMemoryBackend::seeded(), StoreConfig::default()).unwrap();
        assert!(store.is_running());
        store.shutdown();
    }
}
