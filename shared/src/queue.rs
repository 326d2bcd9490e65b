use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::model::{Entity, TempId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One intent waiting to be sent to the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingChange<T: Entity> {
    Add { temp_id: TempId, payload: T::Draft },
    /// Carries the full post-update entity.
    Update { entity: T },
    Delete { entity: T },
}

impl<T: Entity> PendingChange<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            PendingChange::Add { .. } => ChangeKind::Add,
            PendingChange::Update { .. } => ChangeKind::Update,
            PendingChange::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Id of the affected entity; the temporary id for additions.
    pub fn target_id(&self) -> &str {
        match self {
            PendingChange::Add { temp_id, .. } => temp_id.as_str(),
            PendingChange::Update { entity } | PendingChange::Delete { entity } => entity.id(),
        }
    }
}

/// Which end of the queue the processor takes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    /// Oldest intent first. Keeps successive edits to one entity in causal order.
    #[default]
    Fifo,
    /// Newest intent first (last-write priority). Older intents can starve.
    Lifo,
}

#[derive(Clone, Debug)]
pub struct PendingChangeQueue<T: Entity> {
    changes: VecDeque<PendingChange<T>>,
    order: QueueOrder,
}

impl<T: Entity> Default for PendingChangeQueue<T> {
    fn default() -> Self {
        Self::new(QueueOrder::default())
    }
}

impl<T: Entity> PendingChangeQueue<T> {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            changes: VecDeque::new(),
            order,
        }
    }

    pub fn enqueue(&mut self, change: PendingChange<T>) {
        self.changes.push_back(change);
    }

    pub fn dequeue_next(&mut self) -> Option<PendingChange<T>> {
        match self.order {
            QueueOrder::Fifo => self.changes.pop_front(),
            QueueOrder::Lifo => self.changes.pop_back(),
        }
    }

    pub fn order(&self) -> QueueOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes in submission order, regardless of the dequeue order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingChange<T>> {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewProduct, Product};
    use proptest::prelude::*;

    fn update(id: &str, price: f64) -> PendingChange<Product> {
        PendingChange::Update {
            entity: Product::new(id, "P", price),
        }
    }

    #[test]
    fn fifo_takes_oldest_first() {
        let mut q = PendingChangeQueue::new(QueueOrder::Fifo);
        q.enqueue(update("1", 20.0));
        q.enqueue(update("1", 40.0));

        assert_eq!(q.dequeue_next(), Some(update("1", 20.0)));
        assert_eq!(q.dequeue_next(), Some(update("1", 40.0)));
        assert_eq!(q.dequeue_next(), None);
    }

    #[test]
    fn lifo_takes_newest_first() {
        let mut q = PendingChangeQueue::new(QueueOrder::Lifo);
        q.enqueue(update("1", 20.0));
        q.enqueue(update("1", 40.0));

        assert_eq!(q.dequeue_next(), Some(update("1", 40.0)));
        assert_eq!(q.dequeue_next(), Some(update("1", 20.0)));
        assert!(q.is_empty());
    }

    #[test]
    fn empty_queue_signals_absence() {
        let mut q: PendingChangeQueue<Product> = PendingChangeQueue::default();
        assert_eq!(q.order(), QueueOrder::Fifo);
        assert!(q.dequeue_next().is_none());
    }

    #[test]
    fn target_id_and_kind() {
        let add: PendingChange<Product> = PendingChange::Add {
            temp_id: TempId::new("tmp-1"),
            payload: NewProduct::new("Y", 5.0),
        };
        assert_eq!(add.kind(), ChangeKind::Add);
        assert_eq!(add.target_id(), "tmp-1");

        let delete = PendingChange::Delete {
            entity: Product::new("7", "Z", 1.0),
        };
        assert_eq!(delete.kind(), ChangeKind::Delete);
        assert_eq!(delete.target_id(), "7");
        assert_eq!(ChangeKind::Delete.to_string(), "delete");
    }

    proptest! {
        #[test]
        fn fifo_preserves_submission_order(prices in prop::collection::vec(0u32..1000, 0..50)) {
            let mut q = PendingChangeQueue::new(QueueOrder::Fifo);
            for p in &prices {
                q.enqueue(update("1", f64::from(*p)));
            }

            let mut drained = Vec::new();
            while let Some(PendingChange::Update { entity }) = q.dequeue_next() {
                drained.push(entity.price);
            }
            let expected: Vec<f64> = prices.iter().map(|p| f64::from(*p)).collect();
            prop_assert_eq!(drained, expected);
        }
    }
}
