use tokio::sync::{mpsc, watch, RwLock};
use tracing::debug;

use crate::config::StoreConfig;
use crate::entity_store::EntityStore;
use crate::metrics::SyncMetrics;
use crate::model::{Entity, Product, Tracked};
use crate::outbox::Outbox;
use crate::projection::project;
use crate::queue::{PendingChangeQueue, QueueOrder};
use crate::status::RequestStatus;

/// Everything the store knows, composed in one place.
#[derive(Clone, Debug)]
pub struct SyncState<T: Entity> {
    pub status: RequestStatus,
    pub entities: EntityStore<T>,
    pub outbox: Outbox<T>,
    pub queue: PendingChangeQueue<T>,
}

impl<T: Entity> SyncState<T> {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            status: RequestStatus::default(),
            entities: EntityStore::new(),
            outbox: Outbox::new(),
            queue: PendingChangeQueue::new(order),
        }
    }

    pub fn project(&self) -> Vec<Tracked<T>> {
        project(&self.entities, &self.outbox)
    }

    /// The processor would start a cycle right now.
    pub fn can_reconcile(&self) -> bool {
        self.status.can_transition_to_mutating() && !self.queue.is_empty()
    }

    /// Nothing is in flight and nothing more will start without outside help.
    pub fn is_settled(&self) -> bool {
        !self.status.is_in_flight() && (self.queue.is_empty() || self.status.has_error())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Signal {
    /// Something changed; check whether a reconciliation cycle can start.
    Reevaluate,
    /// A foreground load was requested and the status is already `Loading`.
    Reload,
}

/// State plus the channels that make it observable. Shared by the facade,
/// the dispatcher and the refresher.
pub(crate) struct Shared {
    pub(crate) state: RwLock<SyncState<Product>>,
    pub(crate) metrics: SyncMetrics,
    pub(crate) config: StoreConfig,
    status: watch::Sender<RequestStatus>,
    revision: watch::Sender<u64>,
    signals: mpsc::UnboundedSender<Signal>,
}

impl Shared {
    pub(crate) fn new(config: StoreConfig, signals: mpsc::UnboundedSender<Signal>) -> Self {
        let (status, _) = watch::channel(RequestStatus::default());
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(SyncState::new(config.queue_order)),
            metrics: SyncMetrics::new(),
            config,
            status,
            revision,
            signals,
        }
    }

    /// Announce a change to `state`. Call while still holding the write guard
    /// so observers never see revisions out of order.
    pub(crate) fn publish(&self, state: &SyncState<Product>) {
        self.status.send_if_modified(|current| {
            if *current == state.status {
                return false;
            }
            *current = state.status.clone();
            true
        });
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
        self.signal(Signal::Reevaluate);
    }

    pub(crate) fn signal(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            debug!(?signal, "dispatcher is gone, dropping signal");
        }
    }

    pub(crate) fn subscribe_status(&self) -> watch::Receiver<RequestStatus> {
        self.status.subscribe()
    }

    pub(crate) fn subscribe_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
