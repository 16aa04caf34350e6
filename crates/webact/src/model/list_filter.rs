//! Filtered and sorted view over a list source.
//!
//! `ListFilter` wraps any [`ListSource`] and exposes the items passing a
//! predicate, ordered by an optional comparator. The mapping between filtered
//! and source positions is recomputed lazily after the source changes, and
//! source events are re-broadcast in filtered coordinates.

use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use webact_core::logging::span_names;
use webact_core::{Broadcaster, ListenerId, PerfSpan};

use super::collections::List;
use super::error::{ModelError, ModelResult};
use super::traits::{ListEvent, ListEventKind, ListSource};

/// Type alias for a filter predicate.
///
/// Receives the item and its position in the source. Return `true` to include
/// the item.
pub type FilterFn<T> = Arc<dyn Fn(&T, usize) -> bool + Send + Sync>;

/// Type alias for a comparator used to order the filtered items.
pub type CompareFn<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Mapping between filtered and source positions.
struct RowMapping {
    /// Filtered position to source position.
    index_map: Vec<usize>,
    /// Source position to filtered position (None if filtered out).
    back_index: Vec<Option<usize>>,
    /// The source changed since the last recompute.
    dirty: bool,
}

impl RowMapping {
    fn new() -> Self {
        Self {
            index_map: Vec::new(),
            back_index: Vec::new(),
            dirty: true,
        }
    }

    fn len(&self) -> usize {
        self.index_map.len()
    }

    fn map_to_source(&self, filtered: usize) -> Option<usize> {
        self.index_map.get(filtered).copied()
    }

    fn map_from_source(&self, source: usize) -> Option<usize> {
        self.back_index.get(source).and_then(|&x| x)
    }
}

/// Where a source position sat in the filtered view before an event.
enum PriorPosition {
    /// The mapping was stale, so the prior position is unknown.
    Unknown,
    Known(Option<usize>),
}

struct Binding<S> {
    source: Arc<S>,
    listeners: Vec<(ListEventKind, ListenerId)>,
}

impl<S: ListSource> Binding<S> {
    fn unsubscribe(&mut self) {
        for (kind, id) in self.listeners.drain(..) {
            self.source.events().remove_listener(kind, id);
        }
    }
}

/// A read-only, observable view of the items of a source that pass a
/// predicate, in comparator order.
///
/// # Example
///
/// ```
/// use webact::model::{ListFilter, ListModel};
/// use std::sync::Arc;
///
/// let numbers = Arc::new(ListModel::new(vec![5, 2, 8, 1, 4]));
/// let evens = ListFilter::builder(numbers.clone())
///     .filter(|value: &i32, _| value % 2 == 0)
///     .order(|a: &i32, b: &i32| a.cmp(b))
///     .build();
///
/// assert_eq!(evens.to_vec(), vec![2, 4, 8]);
///
/// numbers.push(6);
/// assert_eq!(evens.to_vec(), vec![2, 4, 6, 8]);
/// ```
pub struct ListFilter<S: ListSource> {
    binding: RwLock<Binding<S>>,
    filter: RwLock<Option<FilterFn<S::Item>>>,
    compare: RwLock<Option<CompareFn<S::Item>>>,
    mapping: RwLock<RowMapping>,
    /// Filtered position recorded on `WillRemove`, consumed on `Removed`.
    pending_removal: Mutex<Option<usize>>,
    events: Broadcaster<ListEvent<S::Item>>,
}

impl<S: ListSource> ListFilter<S> {
    /// Creates a filter showing every item of `source` in source order.
    pub fn new(source: Arc<S>) -> Arc<Self> {
        Self::with_parts(source, None, None)
    }

    /// Starts building a filter over `source`.
    pub fn builder(source: Arc<S>) -> ListFilterBuilder<S> {
        ListFilterBuilder::new(source)
    }

    fn with_parts(
        source: Arc<S>,
        filter: Option<FilterFn<S::Item>>,
        compare: Option<CompareFn<S::Item>>,
    ) -> Arc<Self> {
        let list_filter = Arc::new(Self {
            binding: RwLock::new(Binding {
                source,
                listeners: Vec::new(),
            }),
            filter: RwLock::new(filter),
            compare: RwLock::new(compare),
            mapping: RwLock::new(RowMapping::new()),
            pending_removal: Mutex::new(None),
            events: Broadcaster::new(),
        });
        list_filter.subscribe();
        list_filter
    }

    fn subscribe(self: &Arc<Self>) {
        let mut binding = self.binding.write();
        let listeners = ListEventKind::ALL
            .into_iter()
            .map(|kind| {
                let id = binding
                    .source
                    .events()
                    .add_receiver(kind, self, Self::on_source_event);
                (kind, id)
            })
            .collect();
        binding.listeners = listeners;
    }

    /// Binds the filter to a different source.
    ///
    /// Unsubscribes from the previous source and broadcasts `Filtered`.
    pub fn set_list(self: &Arc<Self>, source: Arc<S>) {
        {
            let mut binding = self.binding.write();
            binding.unsubscribe();
            binding.source = source;
        }
        self.subscribe();
        self.mark_dirty();
        tracing::debug!(target: "webact::model", "list filter rebound");
        self.events.broadcast(ListEvent::Filtered);
    }

    /// Replaces the predicate and broadcasts `Filtered`.
    pub fn filter_by<F>(&self, filter: F)
    where
        F: Fn(&S::Item, usize) -> bool + Send + Sync + 'static,
    {
        *self.filter.write() = Some(Arc::new(filter));
        self.invalidate();
    }

    /// Removes the predicate, showing every source item.
    pub fn clear_filter(&self) {
        *self.filter.write() = None;
        self.invalidate();
    }

    /// Replaces the comparator and broadcasts `Filtered`.
    pub fn order_by<F>(&self, compare: F)
    where
        F: Fn(&S::Item, &S::Item) -> Ordering + Send + Sync + 'static,
    {
        *self.compare.write() = Some(Arc::new(compare));
        self.invalidate();
    }

    /// Removes the comparator, restoring source order.
    pub fn clear_order(&self) {
        *self.compare.write() = None;
        self.invalidate();
    }

    /// Marks the mapping stale and tells listeners the view was rebuilt.
    pub fn invalidate(&self) {
        self.mark_dirty();
        self.events.broadcast(ListEvent::Filtered);
    }

    /// The wrapped source.
    pub fn source(&self) -> Arc<S> {
        self.binding.read().source.clone()
    }

    /// The filter's broadcaster.
    pub fn events(&self) -> &Broadcaster<ListEvent<S::Item>> {
        &self.events
    }

    /// Register a listener for one kind of event on the filtered view.
    pub fn add_listener<F>(&self, kind: ListEventKind, listener: F) -> ListenerId
    where
        F: Fn(&ListEvent<S::Item>) + Send + Sync + 'static,
    {
        self.events.add_listener(kind, listener)
    }

    /// Whether the mapping will be recomputed on the next read.
    pub fn is_dirty(&self) -> bool {
        self.mapping.read().dirty
    }

    fn mark_dirty(&self) {
        self.mapping.write().dirty = true;
    }

    /// Recomputes the mapping if the source changed since the last call.
    ///
    /// Filtering scans the source in order, sorting is stable, and the back
    /// index is rebuilt from the result.
    pub fn update(&self) {
        if !self.mapping.read().dirty {
            return;
        }
        let _perf = PerfSpan::new(span_names::FILTER_UPDATE);

        let items = self.source().to_vec();
        let filter = self.filter.read().clone();
        let compare = self.compare.read().clone();

        let mut index_map: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(index, item)| filter.as_ref().is_none_or(|filter| filter(*item, *index)))
            .map(|(index, _)| index)
            .collect();
        if let Some(compare) = compare {
            index_map.sort_by(|&a, &b| compare(&items[a], &items[b]));
        }

        let mut back_index = vec![None; items.len()];
        for (filtered, &source) in index_map.iter().enumerate() {
            back_index[source] = Some(filtered);
        }

        tracing::trace!(
            target: "webact::model",
            source_size = items.len(),
            filtered_size = index_map.len(),
            "list filter recomputed"
        );
        *self.mapping.write() = RowMapping {
            index_map,
            back_index,
            dirty: false,
        };
    }

    /// Number of items passing the filter.
    pub fn size(&self) -> usize {
        self.update();
        self.mapping.read().len()
    }

    /// Whether no item passes the filter.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns the item at filtered position `index`.
    pub fn get(&self, index: usize) -> ModelResult<S::Item> {
        self.update();
        let source_index = {
            let mapping = self.mapping.read();
            mapping
                .map_to_source(index)
                .ok_or_else(|| ModelError::out_of_bounds(index, mapping.len()))?
        };
        self.source().get(source_index)
    }

    /// Maps a filtered position to the position in the underlying model,
    /// following every layer of nested sources.
    pub fn item_index(&self, index: usize) -> Option<usize> {
        self.update();
        let source_index = self.mapping.read().map_to_source(index)?;
        self.source().item_index(source_index)
    }

    /// Maps a position in the underlying model to a filtered position.
    pub fn back_index(&self, original_index: usize) -> Option<usize> {
        let source_index = self.source().back_index(original_index)?;
        self.update();
        self.mapping.read().map_from_source(source_index)
    }

    /// Position in the immediate source of the item at filtered `index`.
    pub fn source_index(&self, index: usize) -> Option<usize> {
        self.update();
        self.mapping.read().map_to_source(index)
    }

    /// Snapshot of the filtered items in order.
    pub fn to_vec(&self) -> Vec<S::Item> {
        self.update();
        let items = self.source().to_vec();
        self.mapping
            .read()
            .index_map
            .iter()
            .filter_map(|&source| items.get(source).cloned())
            .collect()
    }

    /// Calls `closure` with every filtered item and its filtered position.
    pub fn each<F>(&self, mut closure: F)
    where
        F: FnMut(&S::Item, usize),
    {
        for (index, item) in self.to_vec().iter().enumerate() {
            closure(item, index);
        }
    }

    /// Maps every filtered item into a new list.
    pub fn collect<U, F>(&self, closure: F) -> List<U>
    where
        F: FnMut(&S::Item, usize) -> U,
    {
        List::from(self.to_vec()).collect(closure)
    }

    /// Returns the filtered items passing `test` as a new list.
    pub fn select<F>(&self, test: F) -> List<S::Item>
    where
        F: FnMut(&S::Item, usize) -> bool,
    {
        List::from(self.to_vec()).select(test)
    }

    /// Returns the first filtered item passing `test`.
    pub fn find<F>(&self, mut test: F) -> Option<S::Item>
    where
        F: FnMut(&S::Item, usize) -> bool,
    {
        self.to_vec()
            .into_iter()
            .enumerate()
            .find(|(index, item)| test(item, *index))
            .map(|(_, item)| item)
    }

    fn prior_position(&self, source_index: usize) -> PriorPosition {
        let mapping = self.mapping.read();
        if mapping.dirty {
            PriorPosition::Unknown
        } else {
            PriorPosition::Known(mapping.map_from_source(source_index))
        }
    }

    fn current_position(&self, source_index: usize) -> Option<usize> {
        self.update();
        self.mapping.read().map_from_source(source_index)
    }

    fn emit_removal(&self, index: usize, value: S::Item) {
        self.events.broadcast(ListEvent::WillRemove {
            index,
            value: value.clone(),
        });
        self.events.broadcast(ListEvent::Removed { index, value });
    }

    fn on_source_event(&self, event: &ListEvent<S::Item>) {
        match event {
            ListEvent::WillRemove { index, value } => self.on_will_remove(*index, value),
            ListEvent::Removed { index, value } => self.on_removed(*index, value),
            ListEvent::Added { index, value } => self.on_added(*index, value),
            ListEvent::Changed {
                index,
                value,
                prior,
            } => self.on_changed(*index, value, prior.as_ref()),
            ListEvent::Filtered => self.on_filtered(),
        }
    }

    fn on_will_remove(&self, source_index: usize, value: &S::Item) {
        // The source still holds the item here.
        let position = self.current_position(source_index);
        *self.pending_removal.lock() = position;
        if let Some(index) = position {
            self.events.broadcast(ListEvent::WillRemove {
                index,
                value: value.clone(),
            });
        }
    }

    fn on_removed(&self, _source_index: usize, value: &S::Item) {
        let position = self.pending_removal.lock().take();
        self.mark_dirty();
        self.update();
        if let Some(index) = position {
            self.events.broadcast(ListEvent::Removed {
                index,
                value: value.clone(),
            });
        }
    }

    fn on_added(&self, source_index: usize, value: &S::Item) {
        self.mark_dirty();
        if let Some(index) = self.current_position(source_index) {
            self.events.broadcast(ListEvent::Added {
                index,
                value: value.clone(),
            });
        }
    }

    fn on_changed(&self, source_index: usize, value: &S::Item, prior: Option<&S::Item>) {
        let before = self.prior_position(source_index);
        self.mark_dirty();
        let after = self.current_position(source_index);
        let old_value = || prior.unwrap_or(value).clone();

        match (before, after) {
            (PriorPosition::Unknown, Some(index)) => {
                self.events.broadcast(ListEvent::Changed {
                    index,
                    value: value.clone(),
                    prior: prior.cloned(),
                });
            }
            (PriorPosition::Unknown, None) | (PriorPosition::Known(None), None) => {}
            (PriorPosition::Known(Some(old)), Some(new)) if old == new => {
                self.events.broadcast(ListEvent::Changed {
                    index: new,
                    value: value.clone(),
                    prior: prior.cloned(),
                });
            }
            (PriorPosition::Known(Some(old)), Some(new)) => {
                self.emit_removal(old, old_value());
                self.events.broadcast(ListEvent::Added {
                    index: new,
                    value: value.clone(),
                });
            }
            (PriorPosition::Known(Some(old)), None) => {
                self.emit_removal(old, old_value());
            }
            (PriorPosition::Known(None), Some(new)) => {
                self.events.broadcast(ListEvent::Added {
                    index: new,
                    value: value.clone(),
                });
            }
        }
    }

    fn on_filtered(&self) {
        // An abandoned removal never delivers its `Removed`.
        self.pending_removal.lock().take();
        self.mark_dirty();
        self.update();
        self.events.broadcast(ListEvent::Filtered);
    }
}

impl<S> ListFilter<S>
where
    S: ListSource,
    S::Item: PartialEq,
{
    /// Filtered position of the first item equal to `value` at or after `start`.
    pub fn index_of(&self, value: &S::Item, start: usize) -> Option<usize> {
        self.to_vec()
            .iter()
            .skip(start)
            .position(|item| item == value)
            .map(|offset| offset + start)
    }

    /// Whether any filtered item equals `value`.
    pub fn contains(&self, value: &S::Item) -> bool {
        self.to_vec().contains(value)
    }
}

impl<S: ListSource> ListSource for ListFilter<S> {
    type Item = S::Item;

    fn size(&self) -> usize {
        ListFilter::size(self)
    }

    fn get(&self, index: usize) -> ModelResult<S::Item> {
        ListFilter::get(self, index)
    }

    fn item_index(&self, index: usize) -> Option<usize> {
        ListFilter::item_index(self, index)
    }

    fn back_index(&self, original_index: usize) -> Option<usize> {
        ListFilter::back_index(self, original_index)
    }

    fn events(&self) -> &Broadcaster<ListEvent<S::Item>> {
        &self.events
    }

    fn to_vec(&self) -> Vec<S::Item> {
        ListFilter::to_vec(self)
    }
}

impl<S: ListSource> Drop for ListFilter<S> {
    fn drop(&mut self) {
        self.binding.get_mut().unsubscribe();
    }
}

/// Renders the filtered items as `[a, b]`.
impl<S> fmt::Display for ListFilter<S>
where
    S: ListSource,
    S::Item: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (position, item) in self.to_vec().iter().enumerate() {
            if position > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, "]")
    }
}

impl<S: ListSource> fmt::Debug for ListFilter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mapping = self.mapping.read();
        f.debug_struct("ListFilter")
            .field("index_map", &mapping.index_map)
            .field("dirty", &mapping.dirty)
            .field("has_filter", &self.filter.read().is_some())
            .field("has_order", &self.compare.read().is_some())
            .finish()
    }
}

/// Builder for [`ListFilter`].
pub struct ListFilterBuilder<S: ListSource> {
    source: Arc<S>,
    filter: Option<FilterFn<S::Item>>,
    compare: Option<CompareFn<S::Item>>,
}

impl<S: ListSource> ListFilterBuilder<S> {
    fn new(source: Arc<S>) -> Self {
        Self {
            source,
            filter: None,
            compare: None,
        }
    }

    /// Sets the predicate.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&S::Item, usize) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sets the comparator.
    pub fn order<F>(mut self, compare: F) -> Self
    where
        F: Fn(&S::Item, &S::Item) -> Ordering + Send + Sync + 'static,
    {
        self.compare = Some(Arc::new(compare));
        self
    }

    /// Builds the filter and subscribes it to the source.
    pub fn build(self) -> Arc<ListFilter<S>> {
        ListFilter::with_parts(self.source, self.filter, self.compare)
    }
}
