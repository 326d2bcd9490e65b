//! In-process implementation of [`ProductsBackend`].
//!
//! Behaves like the HTTP service the store normally talks to: the server
//! assigns ids on create, `replace` needs an existing id and `delete` only
//! succeeds for known ids. On top of that it can be told to fail a given
//! operation, to hold every call until resumed, and it counts calls, which
//! is what the store's tests lean on.

use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Notify, RwLock};

use crate::backend::{Operation, ProductsBackend, TransportError};
use crate::model::{NewProduct, Product, ProductId};

/// Status used for injected failures.
pub const INJECTED_FAILURE_STATUS: u16 = 500;

#[derive(Debug, Default)]
struct PerOperation<T> {
    list: T,
    create: T,
    replace: T,
    delete: T,
}

impl<T> PerOperation<T> {
    fn get(&self, operation: Operation) -> &T {
        match operation {
            Operation::List => &self.list,
            Operation::Create => &self.create,
            Operation::Replace => &self.replace,
            Operation::Delete => &self.delete,
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    products: RwLock<IndexMap<ProductId, Product>>,
    next_id: AtomicU64,
    failing: PerOperation<AtomicBool>,
    calls: PerOperation<AtomicU64>,
    paused: AtomicBool,
    resumed: Notify,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products: IndexMap<ProductId, Product> =
            products.into_iter().map(|p| (p.id.clone(), p)).collect();
        let next_id = products
            .keys()
            .filter_map(|id| id.as_str().parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);

        Self {
            products: RwLock::new(products),
            next_id: AtomicU64::new(next_id),
            ..Self::default()
        }
    }

    /// The five-product catalogue the demo service ships with.
    pub fn seeded() -> Self {
        Self::with_products([
            Product::new("1", "E Product 1", 32.23),
            Product::new("2", "D Product 2", 118.23),
            Product::new("3", "C Product 3", 42.18),
            Product::new("4", "B Product 4", 103.23),
            Product::new("5", "A Product 5", 1.89),
        ])
    }

    /// Make every following call of `operation` fail until turned off again.
    pub fn set_failing(&self, operation: Operation, failing: bool) {
        self.failing.get(operation).store(failing, Ordering::SeqCst);
    }

    /// Hold all calls (including ones already waiting) until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resumed.notify_waiters();
    }

    pub fn calls(&self, operation: Operation) -> u64 {
        self.calls.get(operation).load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u64 {
        Operation::ALL.iter().map(|op| self.calls(*op)).sum()
    }

    /// Calls currently inside the backend (waiting on the pause gate included).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Largest number of calls that were ever inside the backend at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Server-side contents, in insertion order.
    pub async fn products(&self) -> Vec<Product> {
        self.products.read().await.values().cloned().collect()
    }

    pub async fn insert(&self, product: Product) {
        self.products.write().await.insert(product.id.clone(), product);
    }

    async fn enter(&self, operation: Operation) -> Result<CallGuard<'_>, TransportError> {
        self.calls.get(operation).fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = CallGuard { backend: self };

        loop {
            let resumed = self.resumed.notified();
            if !self.paused.load(Ordering::SeqCst) {
                break;
            }
            resumed.await;
        }

        if self.failing.get(operation).load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                operation,
                status: INJECTED_FAILURE_STATUS,
            });
        }
        Ok(guard)
    }
}

struct CallGuard<'a> {
    backend: &'a InMemoryBackend,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.backend.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ProductsBackend for InMemoryBackend {
    async fn list(&self) -> Result<Vec<Product>, TransportError> {
        let _call = self.enter(Operation::List).await?;
        Ok(self.products().await)
    }

    async fn create(&self, product: &NewProduct) -> Result<Product, TransportError> {
        let _call = self.enter(Operation::Create).await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created = product.clone().into_product(ProductId::new(id.to_string()));
        self.insert(created.clone()).await;
        Ok(created)
    }

    async fn replace(&self, product: &Product) -> Result<Product, TransportError> {
        let _call = self.enter(Operation::Replace).await?;
        let mut products = self.products.write().await;
        match products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(product.clone())
            }
            None => Err(TransportError::Status {
                operation: Operation::Replace,
                status: 404,
            }),
        }
    }

    async fn delete(&self, id: &ProductId) -> Result<(), TransportError> {
        let _call = self.enter(Operation::Delete).await?;
        match self.products.write().await.shift_remove(id) {
            Some(_) => Ok(()),
            None => Err(TransportError::Status {
                operation: Operation::Delete,
                status: 404,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn create_assigns_next_numeric_id() {
        let backend = InMemoryBackend::seeded();
        let created = backend.create(&NewProduct::new("Y", 5.0)).await.unwrap();
        assert_eq!(created, Product::new("6", "Y", 5.0));
        assert_eq!(backend.products().await.len(), 6);
    }

    #[tokio::test]
    async fn empty_backend_starts_ids_at_one() {
        let backend = InMemoryBackend::new();
        let created = backend.create(&NewProduct::new("Y", 5.0)).await.unwrap();
        assert_eq!(created.id, ProductId::new("1"));
    }

    #[tokio::test]
    async fn delete_of_unknown_id_fails() {
        let backend = InMemoryBackend::seeded();
        let err = backend.delete(&ProductId::new("99")).await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Status {
                operation: Operation::Delete,
                status: 404,
            }
        );
        assert!(backend.delete(&ProductId::new("1")).await.is_ok());
    }

    #[tokio::test]
    async fn injected_failure_leaves_data_alone() {
        let backend = InMemoryBackend::seeded();
        backend.set_failing(Operation::Replace, true);

        let err = backend
            .replace(&Product::new("1", "E Product 1", 1.0))
            .await
            .unwrap_err();
        assert_eq!(err.operation(), Operation::Replace);
        assert_eq!(backend.products().await[0].price, 32.23);
        assert_eq!(backend.calls(Operation::Replace), 1);
    }

    #[tokio::test]
    async fn paused_calls_wait_for_resume() {
        let backend = Arc::new(InMemoryBackend::seeded());
        backend.pause();

        let task = tokio::spawn({
            let backend = Arc::clone(&backend);
            async move { backend.list().await }
        });
        while backend.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!task.is_finished());

        backend.resume();
        let listed = task.await.unwrap().unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(backend.in_flight(), 0);
        assert_eq!(backend.peak_in_flight(), 1);
    }
}
