use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::backend::{ProductsBackend, TransportError};
use crate::metrics::SyncMetrics;
use crate::model::Product;
use crate::queue::{ChangeKind, PendingChange};
use crate::state::{Shared, SyncState};
use crate::status::StatusError;

/// Outcome of one reconciliation cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum Reconciled {
    Confirmed {
        kind: ChangeKind,
        id: String,
    },
    Rejected {
        kind: ChangeKind,
        id: String,
        error: TransportError,
    },
}

impl Reconciled {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Reconciled::Confirmed { kind, .. } | Reconciled::Rejected { kind, .. } => *kind,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Reconciled::Confirmed { .. })
    }
}

/// Message left in the request status when a rejected mutation is surfaced.
pub fn failure_message(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Add => "Could not add",
        ChangeKind::Update => "Could not update",
        ChangeKind::Delete => "Could not delete",
    }
}

/// Sends queued changes to the backend one at a time.
///
/// A cycle only starts by moving the status from `Idle` to `Mutating`, so at
/// most one mutating call is ever outstanding and none overlaps a fetch.
pub struct ReconciliationProcessor<B> {
    shared: Arc<Shared>,
    backend: Arc<B>,
}

impl<B: ProductsBackend> ReconciliationProcessor<B> {
    pub(crate) fn new(shared: Arc<Shared>, backend: Arc<B>) -> Self {
        Self { shared, backend }
    }

    /// Run one cycle if the store is idle and has queued work.
    ///
    /// Returns `None` when no cycle was started.
    pub async fn reconcile_next(&self) -> Option<Reconciled> {
        let change = self.begin().await?;
        let outcome = self.dispatch(change).await;
        Some(outcome)
    }

    async fn begin(&self) -> Option<PendingChange<Product>> {
        let mut state = self.shared.state.write().await;
        if !state.can_reconcile() {
            return None;
        }
        if let Err(e) = state.status.begin_mutation() {
            error!(error = %e, "could not start reconciliation");
            return None;
        }

        let change = state.queue.dequeue_next();
        if change.is_some() {
            SyncMetrics::incr(&self.shared.metrics.mutations_dispatched);
        } else {
            // Guarded by can_reconcile; only reachable if the queue was drained underneath.
            settle(&mut state, |s| s.status.settle());
        }
        self.shared.publish(&state);
        change
    }

    #[instrument(skip(self, change), fields(kind = %change.kind(), id = %change.target_id()))]
    async fn dispatch(&self, change: PendingChange<Product>) -> Reconciled {
        let kind = change.kind();
        let id = change.target_id().to_string();

        let result = match &change {
            PendingChange::Add { payload, .. } => self.backend.create(payload).await.map(Some),
            PendingChange::Update { entity } => self.backend.replace(entity).await.map(Some),
            PendingChange::Delete { entity } => {
                self.backend.delete(&entity.id).await.map(|()| None)
            }
        };

        let mut state = self.shared.state.write().await;
        let outcome = match result {
            Ok(confirmed) => {
                apply_success(&mut state, change, confirmed);
                settle(&mut state, |s| s.status.settle());
                SyncMetrics::incr(&self.shared.metrics.mutations_confirmed);
                info!("change confirmed");
                Reconciled::Confirmed { kind, id }
            }
            Err(error) => {
                if apply_failure(&mut state, change) {
                    SyncMetrics::incr(&self.shared.metrics.compensations);
                }
                SyncMetrics::incr(&self.shared.metrics.mutations_rejected);

                if self.shared.config.error_policy.surfaces(kind) {
                    error!(error = %error, "change rejected");
                    settle(&mut state, |s| s.status.fail(failure_message(kind)));
                } else {
                    warn!(error = %error, "change rejected, discarding it");
                    settle(&mut state, |s| s.status.settle());
                }
                Reconciled::Rejected { kind, id, error }
            }
        };
        self.shared.publish(&state);
        outcome
    }
}

fn apply_success(
    state: &mut SyncState<Product>,
    change: PendingChange<Product>,
    confirmed: Option<Product>,
) {
    match change {
        PendingChange::Add { temp_id, .. } => {
            if let Some(created) = confirmed {
                state.entities.upsert(created);
            }
            state.outbox.remove_addition(&temp_id);
        }
        PendingChange::Update { entity } => {
            state.entities.upsert(confirmed.unwrap_or_else(|| entity.clone()));
            state.outbox.remove_update(&entity);
        }
        PendingChange::Delete { entity } => {
            state.entities.remove(entity.id.as_str());
            state.outbox.remove_deletion(&entity);
        }
    }
}

/// Drop the optimistic entry. Returns whether the change needed compensating.
///
/// A rejected delete puts the entity back only if the store lost it; a
/// confirmed value already present is kept.
fn apply_failure(state: &mut SyncState<Product>, change: PendingChange<Product>) -> bool {
    match change {
        PendingChange::Add { temp_id, .. } => {
            state.outbox.remove_addition(&temp_id);
            false
        }
        PendingChange::Update { entity } => {
            // The optimistic value only ever lived in the outbox.
            state.outbox.remove_update(&entity);
            false
        }
        PendingChange::Delete { entity } => {
            state.outbox.remove_deletion(&entity);
            state.entities.insert_if_absent(entity);
            true
        }
    }
}

fn settle(
    state: &mut SyncState<Product>,
    transition: impl FnOnce(&mut SyncState<Product>) -> Result<(), StatusError>,
) {
    if let Err(e) = transition(state) {
        error!(error = %e, status = %state.status, "unexpected status after reconciliation");
    }
}
