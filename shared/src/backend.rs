use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::config::CallPolicy;
use crate::model::{NewProduct, Product, ProductId};

/// Status codes worth another attempt.
pub const RETRYABLE_STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Create,
    Replace,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::List,
        Operation::Create,
        Operation::Replace,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Replace => "replace",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend call failed or answered with something other than success.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: Operation, after_ms: u64 },

    #[error("{operation} returned status {status}")]
    Status { operation: Operation, status: u16 },

    #[error("{operation} failed: {message}")]
    Network {
        operation: Operation,
        message: String,
    },

    #[error("{operation} rejected: {message}")]
    Rejected {
        operation: Operation,
        message: String,
    },
}

impl TransportError {
    pub fn operation(&self) -> Operation {
        match self {
            TransportError::Timeout { operation, .. }
            | TransportError::Status { operation, .. }
            | TransportError::Network { operation, .. }
            | TransportError::Rejected { operation, .. } => *operation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout { .. } | TransportError::Network { .. } => true,
            TransportError::Status { status, .. } => RETRYABLE_STATUS_CODES.contains(status),
            TransportError::Rejected { .. } => false,
        }
    }
}

/// The remote collection the store reconciles against.
///
/// `delete` must only succeed on the backend's explicit success answer
/// (a 204 for the HTTP implementation); anything else is a `TransportError`.
#[async_trait::async_trait]
pub trait ProductsBackend: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, TransportError>;
    async fn create(&self, product: &NewProduct) -> Result<Product, TransportError>;
    async fn replace(&self, product: &Product) -> Result<Product, TransportError>;
    async fn delete(&self, id: &ProductId) -> Result<(), TransportError>;
}

#[async_trait::async_trait]
impl<B: ProductsBackend + ?Sized> ProductsBackend for Arc<B> {
    async fn list(&self) -> Result<Vec<Product>, TransportError> {
        (**self).list().await
    }

    async fn create(&self, product: &NewProduct) -> Result<Product, TransportError> {
        (**self).create(product).await
    }

    async fn replace(&self, product: &Product) -> Result<Product, TransportError> {
        (**self).replace(product).await
    }

    async fn delete(&self, id: &ProductId) -> Result<(), TransportError> {
        (**self).delete(id).await
    }
}

// ============================================================================
// Timeout + bounded retry
// ============================================================================

/// Wraps a backend so every call is bounded by `policy.timeout` and retried
/// at most `policy.max_attempts - 1` times on retryable errors.
pub struct ResilientBackend<B> {
    inner: B,
    policy: CallPolicy,
}

impl<B: ProductsBackend> ResilientBackend<B> {
    pub fn new(inner: B, policy: CallPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    async fn call<R, F, Fut>(
        &self,
        operation: Operation,
        mut attempt: F,
    ) -> Result<R, TransportError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<R, TransportError>> + Send,
        R: Send,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = match tokio::time::timeout(self.policy.timeout, attempt()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Timeout {
                    operation,
                    after_ms: u64::try_from(self.policy.timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };

            match outcome {
                Err(e) if e.is_retryable() && attempts < self.policy.max_attempts => {
                    warn!(%operation, attempts, error = %e, "retrying backend call");
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait::async_trait]
impl<B: ProductsBackend> ProductsBackend for ResilientBackend<B> {
    async fn list(&self) -> Result<Vec<Product>, TransportError> {
        self.call(Operation::List, || self.inner.list()).await
    }

    async fn create(&self, product: &NewProduct) -> Result<Product, TransportError> {
        self.call(Operation::Create, || self.inner.create(product)).await
    }

    async fn replace(&self, product: &Product) -> Result<Product, TransportError> {
        self.call(Operation::Replace, || self.inner.replace(product)).await
    }

    async fn delete(&self, id: &ProductId) -> Result<(), TransportError> {
        self.call(Operation::Delete, || self.inner.delete(id)).await
    }
}
