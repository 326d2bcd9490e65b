//! Optimistic product list kept in sync with a remote backend.
//!
//! The UI reads [`ProductsStore::product_list`], which merges confirmed
//! products with changes still waiting in the outbox. Intents return
//! immediately; a single dispatcher task sends queued changes to the
//! backend one at a time and a background refresher reloads the list while
//! the store is idle.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod backend;
pub mod config;
pub mod entity_store;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod outbox;
pub mod processor;
pub mod projection;
pub mod queue;
pub mod refresher;
mod state;
pub mod status;
pub mod store;

pub use backend::{
    Operation, ProductsBackend, ResilientBackend, TransportError, RETRYABLE_STATUS_CODES,
};
pub use config::{
    CallPolicy, ConfigError, MutationErrorPolicy, StoreConfig, DEFAULT_CALL_TIMEOUT,
    DEFAULT_REFRESH_INTERVAL, DEFAULT_RETRY_DELAY, MAX_CALL_ATTEMPTS,
};
pub use entity_store::EntityStore;
pub use error::StoreError;
pub use memory::InMemoryBackend;
pub use metrics::{MetricsSnapshot, SyncMetrics};
pub use model::{Entity, NewProduct, Product, ProductId, ProductView, TempId, Tracked};
pub use outbox::Outbox;
pub use processor::{failure_message, Reconciled, ReconciliationProcessor};
pub use projection::project;
pub use queue::{ChangeKind, PendingChange, PendingChangeQueue, QueueOrder};
pub use refresher::{BackgroundRefresher, RefreshOutcome, LOAD_FAILURE_MESSAGE};
pub use state::SyncState;
pub use status::{RequestStatus, StatusError};
pub use store::ProductsStore;
