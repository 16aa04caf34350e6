//! Observable list model.
//!
//! `ListModel<T>` is a [`List`] guarded by a lock that broadcasts a
//! [`ListEvent`] after every mutation. Events are always sent after the lock
//! is released, so listeners may read the model (or mutate it again) freely.

use parking_lot::{RwLock, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use webact_core::{Broadcaster, ListenerId};

use super::collections::List;
use super::error::{ModelError, ModelResult};
use super::traits::{ListEvent, ListEventKind, ListSource};

/// A list that notifies listeners about every mutation.
///
/// | operation      | events                                   |
/// |----------------|------------------------------------------|
/// | `add`          | `Added { index, value }`                 |
/// | `set`          | `Changed { index, value, prior }`, none if equal |
/// | `remove`       | `WillRemove`, then `Removed` (or `Filtered`) |
/// | `changed`      | `Changed` for an in-place mutation       |
///
/// # Example
///
/// ```
/// use webact::model::{ListEvent, ListEventKind, ListModel, ListSource};
///
/// let model = ListModel::new(vec!["apple".to_string()]);
/// model.add_listener(ListEventKind::Added, |event| {
///     if let ListEvent::Added { index, value } = event {
///         println!("added {value} at {index}");
///     }
/// });
///
/// model.push("banana".to_string());
/// assert_eq!(model.size(), 2);
/// ```
pub struct ListModel<T: Clone + Send + Sync + 'static> {
    items: RwLock<List<T>>,
    /// Bumped by every mutation.
    revision: AtomicU64,
    events: Broadcaster<ListEvent<T>>,
}

impl<T: Clone + Send + Sync + 'static> Default for ListModel<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: Clone + Send + Sync + 'static> ListModel<T> {
    /// Creates a model holding `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(List::from(items)),
            revision: AtomicU64::new(0),
            events: Broadcaster::new(),
        }
    }

    /// Creates an empty model.
    pub fn empty() -> Self {
        Self::default()
    }

    fn write(&self) -> RwLockWriteGuard<'_, List<T>> {
        let items = self.items.write();
        self.revision.fetch_add(1, Ordering::Relaxed);
        items
    }

    /// Register a listener for one kind of list event.
    pub fn add_listener<F>(&self, kind: ListEventKind, listener: F) -> ListenerId
    where
        F: Fn(&ListEvent<T>) + Send + Sync + 'static,
    {
        self.events.add_listener(kind, listener)
    }

    /// Remove a listener registered with [`add_listener`](Self::add_listener).
    pub fn remove_listener(&self, kind: ListEventKind, id: ListenerId) -> bool {
        self.events.remove_listener(kind, id)
    }

    /// Inserts `value` at `index` (append when `None`) and broadcasts `Added`.
    ///
    /// Returns the insertion position.
    pub fn add(&self, value: T, index: Option<usize>) -> ModelResult<usize> {
        let index = self.write().add(value.clone(), index)?;
        tracing::trace!(target: "webact::model", index, "item added");
        self.events.broadcast(ListEvent::Added { index, value });
        Ok(index)
    }

    /// Appends `value`, returning its position.
    pub fn push(&self, value: T) -> usize {
        let index = self.write().push(value.clone());
        self.events.broadcast(ListEvent::Added { index, value });
        index
    }

    /// Removes the item at `index`.
    ///
    /// Broadcasts `WillRemove` before and `Removed` after the removal. If a
    /// `WillRemove` listener mutates the model, the announced item may no
    /// longer sit at `index`: nothing is removed, `Filtered` is broadcast so
    /// derived views resync, and [`ModelError::RemovalInterrupted`] is
    /// returned.
    pub fn remove(&self, index: usize) -> ModelResult<T> {
        let (value, revision) = {
            let items = self.items.read();
            (items.get(index)?.clone(), self.revision.load(Ordering::Relaxed))
        };
        self.events.broadcast(ListEvent::WillRemove { index, value });

        let removed = {
            let mut items = self.items.write();
            if self.revision.load(Ordering::Relaxed) == revision {
                self.revision.fetch_add(1, Ordering::Relaxed);
                Some(items.remove(index)?)
            } else {
                None
            }
        };
        let Some(removed) = removed else {
            tracing::debug!(target: "webact::model", index, "list changed during removal, abandoned");
            self.events.broadcast(ListEvent::Filtered);
            return Err(ModelError::RemovalInterrupted { index });
        };
        tracing::trace!(target: "webact::model", index, "item removed");
        self.events.broadcast(ListEvent::Removed {
            index,
            value: removed.clone(),
        });
        Ok(removed)
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> ModelResult<T> {
        self.items.read().get(index).cloned()
    }

    /// Number of items.
    pub fn size(&self) -> usize {
        self.items.read().size()
    }

    /// Notify listeners that the item at `index` was mutated in place.
    ///
    /// `prior` is the value before the mutation, if the caller kept it.
    pub fn changed(&self, index: usize, prior: Option<T>) -> ModelResult<()> {
        let value = self.get(index)?;
        self.events.broadcast(ListEvent::Changed {
            index,
            value,
            prior,
        });
        Ok(())
    }

    /// Mutates the item at `index` in place and broadcasts `Changed`.
    pub fn modify<F>(&self, index: usize, mutate: F) -> ModelResult<()>
    where
        F: FnOnce(&mut T),
    {
        let (value, prior) = {
            let mut items = self.write();
            let slot = items.get_mut(index)?;
            let prior = slot.clone();
            mutate(slot);
            (slot.clone(), prior)
        };
        self.events.broadcast(ListEvent::Changed {
            index,
            value,
            prior: Some(prior),
        });
        Ok(())
    }

    /// Replaces every item and broadcasts `Filtered`.
    pub fn reset(&self, items: Vec<T>) {
        *self.write() = List::from(items);
        self.events.broadcast(ListEvent::Filtered);
    }

    /// Runs `f` with a borrowed view of the items.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(self.items.read().as_slice())
    }

    /// The model's broadcaster.
    pub fn events(&self) -> &Broadcaster<ListEvent<T>> {
        &self.events
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> ListModel<T> {
    /// Replaces the item at `index`.
    ///
    /// Broadcasts `Changed` unless `value` equals the current item, in which
    /// case nothing happens.
    pub fn set(&self, index: usize, value: T) -> ModelResult<()> {
        let prior = {
            let mut items = self.items.write();
            if items.get(index)? == &value {
                return Ok(());
            }
            self.revision.fetch_add(1, Ordering::Relaxed);
            items.set(index, value.clone())?
        };
        self.events.broadcast(ListEvent::Changed {
            index,
            value,
            prior: Some(prior),
        });
        Ok(())
    }

    /// Position of the first item equal to `value` at or after `start`.
    pub fn index_of(&self, value: &T, start: usize) -> Option<usize> {
        self.items.read().index_of(value, start)
    }

    /// Whether any item equals `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.items.read().contains(value)
    }
}

impl<T: Clone + Send + Sync + 'static> ListSource for ListModel<T> {
    type Item = T;

    fn size(&self) -> usize {
        ListModel::size(self)
    }

    fn get(&self, index: usize) -> ModelResult<T> {
        ListModel::get(self, index)
    }

    fn item_index(&self, index: usize) -> Option<usize> {
        (index < self.size()).then_some(index)
    }

    fn back_index(&self, original_index: usize) -> Option<usize> {
        (original_index < self.size()).then_some(original_index)
    }

    fn events(&self) -> &Broadcaster<ListEvent<T>> {
        &self.events
    }

    fn to_vec(&self) -> Vec<T> {
        self.items.read().as_slice().to_vec()
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for ListModel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListModel")
            .field("items", &*self.items.read())
            .field("events", &self.events)
            .finish()
    }
}
