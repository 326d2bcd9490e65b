//! Local changes the backend has not confirmed yet.
//!
//! Every intent puts exactly one entry here before it is queued, and the
//! processor takes exactly one entry out once the backend has answered,
//! whether the answer was a success or a failure. Removal is keyed by id
//! (temporary id for additions), never by value: the entity handed back on
//! completion may differ from the one recorded.

use indexmap::IndexMap;
use std::collections::VecDeque;

use crate::model::{Entity, TempId, Tracked};
use crate::queue::ChangeKind;

/// Unconfirmed additions, updates and deletions.
///
/// Several intents of the same kind may target one id (two quick price
/// doublings, say). Each of them owns its own slot; the newest slot is the
/// one shown, and completing an intent frees the slot whose value matches,
/// or the oldest one for that id otherwise.
#[derive(Clone, Debug)]
pub struct Outbox<T: Entity> {
    additions: IndexMap<TempId, T::Draft>,
    updates: IndexMap<String, VecDeque<T>>,
    deletions: IndexMap<String, VecDeque<T>>,
}

impl<T: Entity> Default for Outbox<T> {
    fn default() -> Self {
        Self {
            additions: IndexMap::new(),
            updates: IndexMap::new(),
            deletions: IndexMap::new(),
        }
    }
}

impl<T: Entity> Outbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Additions
    // ========================================================================

    pub fn add_addition(&mut self, temp_id: TempId, payload: T::Draft) {
        self.additions.insert(temp_id, payload);
    }

    pub fn remove_addition(&mut self, temp_id: &TempId) -> Option<T::Draft> {
        self.additions.shift_remove(temp_id)
    }

    // ========================================================================
    // Updates
    // ========================================================================

    pub fn add_update(&mut self, entity: T) {
        push_slot(&mut self.updates, entity);
    }

    pub fn remove_update(&mut self, entity: &T) -> Option<T> {
        pop_slot(&mut self.updates, entity)
    }

    // ========================================================================
    // Deletions
    // ========================================================================

    pub fn add_deletion(&mut self, entity: T) {
        push_slot(&mut self.deletions, entity);
    }

    pub fn remove_deletion(&mut self, entity: &T) -> Option<T> {
        pop_slot(&mut self.deletions, entity)
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Flattened pending view: additions, then deletions, then updates.
    pub fn pending_entries(&self) -> Vec<Tracked<T>> {
        self.additions()
            .chain(latest(&self.deletions))
            .chain(latest(&self.updates))
            .map(Tracked::pending)
            .collect()
    }

    /// Pending view grouped by kind. All three keys are always present.
    pub fn pending_by_kind(&self) -> IndexMap<ChangeKind, Vec<Tracked<T>>> {
        let mut by_kind = IndexMap::with_capacity(3);
        by_kind.insert(
            ChangeKind::Add,
            self.additions().map(Tracked::pending).collect(),
        );
        by_kind.insert(
            ChangeKind::Delete,
            latest(&self.deletions).map(Tracked::pending).collect(),
        );
        by_kind.insert(
            ChangeKind::Update,
            latest(&self.updates).map(Tracked::pending).collect(),
        );
        by_kind
    }

    pub fn additions_len(&self) -> usize {
        self.additions.len()
    }

    pub fn updates_len(&self) -> usize {
        self.updates.values().map(VecDeque::len).sum()
    }

    pub fn deletions_len(&self) -> usize {
        self.deletions.values().map(VecDeque::len).sum()
    }

    pub fn len(&self) -> usize {
        self.additions_len() + self.updates_len() + self.deletions_len()
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty() && self.deletions.is_empty()
    }

    pub fn has_addition(&self, temp_id: &TempId) -> bool {
        self.additions.contains_key(temp_id)
    }

    pub fn has_update(&self, id: &str) -> bool {
        self.updates.contains_key(id)
    }

    pub fn has_deletion(&self, id: &str) -> bool {
        self.deletions.contains_key(id)
    }

    fn additions(&self) -> impl Iterator<Item = T> + '_ {
        self.additions
            .iter()
            .map(|(temp_id, draft)| T::from_draft(temp_id.as_str(), draft))
    }
}

fn latest<T: Entity>(slots: &IndexMap<String, VecDeque<T>>) -> impl Iterator<Item = T> + '_ {
    slots.values().filter_map(|s| s.back().cloned())
}

fn push_slot<T: Entity>(slots: &mut IndexMap<String, VecDeque<T>>, entity: T) {
    slots
        .entry(entity.id().to_string())
        .or_default()
        .push_back(entity);
}

fn pop_slot<T: Entity>(slots: &mut IndexMap<String, VecDeque<T>>, entity: &T) -> Option<T> {
    let queue = slots.get_mut(entity.id())?;
    let index = queue.iter().position(|e| e == entity).unwrap_or(0);
    let removed = queue.remove(index);
    if queue.is_empty() {
        slots.shift_remove(entity.id());
    }
    removed
}
