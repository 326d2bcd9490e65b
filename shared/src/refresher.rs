use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{ProductsBackend, TransportError};
use crate::metrics::SyncMetrics;
use crate::model::Product;
use crate::state::{Shared, SyncState};
use crate::status::RequestStatus;

pub const LOAD_FAILURE_MESSAGE: &str = "Could not load products";

#[derive(Clone, Debug, PartialEq)]
pub enum RefreshOutcome {
    /// The store was busy; nothing was fetched this tick.
    Skipped { status: &'static str },
    Refreshed { count: usize },
    Failed { error: TransportError },
}

/// Periodic full reload that only runs while the store is idle.
///
/// Owns the timer task; stopping it (explicitly or on drop) aborts the task
/// exactly once.
pub struct BackgroundRefresher {
    handle: Option<JoinHandle<()>>,
}

impl BackgroundRefresher {
    pub(crate) fn start<B>(shared: Arc<Shared>, backend: Arc<B>, period: Duration) -> Self
    where
        B: ProductsBackend + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                refresh_once(&shared, backend.as_ref()).await;
            }
        });
        debug!(?period, "background refresher started");
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("background refresher stopped");
        }
    }
}

impl Drop for BackgroundRefresher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One refresher tick. Fetches only if the status can move `Idle → BackgroundFetching`.
#[instrument(skip_all)]
pub(crate) async fn refresh_once<B: ProductsBackend + ?Sized>(
    shared: &Shared,
    backend: &B,
) -> RefreshOutcome {
    {
        let mut state = shared.state.write().await;
        if let Err(e) = state.status.begin_background_fetch() {
            SyncMetrics::incr(&shared.metrics.refreshes_skipped);
            debug!(error = %e, "skipping refresh tick");
            return RefreshOutcome::Skipped {
                status: state.status.name(),
            };
        }
        shared.publish(&state);
    }

    let result = backend.list().await;
    finish_fetch(shared, result).await
}

/// Foreground load. The caller has already moved the status to `Loading`.
#[instrument(skip_all)]
pub(crate) async fn load<B: ProductsBackend + ?Sized>(
    shared: &Shared,
    backend: &B,
) -> Option<RefreshOutcome> {
    if !shared.state.read().await.status.is_loading() {
        debug!("load requested but store is no longer loading");
        return None;
    }
    let result = backend.list().await;
    Some(finish_fetch(shared, result).await)
}

/// Apply a list result according to whichever fetch the status says is
/// running. A refresh upgraded to a load by `reload()` is finished as a load.
async fn finish_fetch(
    shared: &Shared,
    result: Result<Vec<Product>, TransportError>,
) -> RefreshOutcome {
    let mut state = shared.state.write().await;
    let foreground = state.status.is_loading();

    let outcome = match result {
        Ok(products) => {
            let count = products.len();
            state.entities.replace_all(products);
            transition(&mut state, |s| s.settle());
            if foreground {
                SyncMetrics::incr(&shared.metrics.loads_completed);
                info!(count, "products loaded");
            } else {
                SyncMetrics::incr(&shared.metrics.refreshes_completed);
                debug!(count, "products refreshed");
            }
            RefreshOutcome::Refreshed { count }
        }
        Err(error) => {
            if foreground {
                SyncMetrics::incr(&shared.metrics.loads_failed);
                error!(error = %error, "initial load failed");
                transition(&mut state, |s| s.fail(LOAD_FAILURE_MESSAGE));
            } else {
                SyncMetrics::incr(&shared.metrics.refreshes_failed);
                warn!(error = %error, "background refresh failed");
                transition(&mut state, |s| s.settle());
            }
            RefreshOutcome::Failed { error }
        }
    };
    shared.publish(&state);
    outcome
}

fn transition(
    state: &mut SyncState<Product>,
    f: impl FnOnce(&mut RequestStatus) -> Result<(), crate::status::StatusError>,
) {
    if let Err(e) = f(&mut state.status) {
        error!(error = %e, "unexpected status after fetch");
    }
}
