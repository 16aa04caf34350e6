//! Core traits and events shared by the list models.

use webact_core::{Broadcaster, Event};

use super::error::ModelResult;

/// Notification sent by list sources.
///
/// Every event carries the index in the coordinates of the broadcasting
/// source: a [`ListFilter`](super::ListFilter) re-broadcasts source events at
/// filtered positions.
#[derive(Clone, Debug, PartialEq)]
pub enum ListEvent<T> {
    /// `value` was inserted at `index`.
    Added { index: usize, value: T },
    /// `value` at `index` is about to be removed. Sent before the removal.
    WillRemove { index: usize, value: T },
    /// `value` was removed from `index`.
    Removed { index: usize, value: T },
    /// The item at `index` is now `value`.
    ///
    /// `prior` is `None` when the item was mutated in place and the old value
    /// is unknown.
    Changed {
        index: usize,
        value: T,
        prior: Option<T>,
    },
    /// Membership or order changed wholesale (new predicate, comparator or source).
    Filtered,
}

/// The kinds of [`ListEvent`] listeners can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListEventKind {
    Added,
    WillRemove,
    Removed,
    Changed,
    Filtered,
}

impl ListEventKind {
    /// Every kind, in declaration order.
    pub const ALL: [ListEventKind; 5] = [
        ListEventKind::Added,
        ListEventKind::WillRemove,
        ListEventKind::Removed,
        ListEventKind::Changed,
        ListEventKind::Filtered,
    ];
}

impl<T> ListEvent<T> {
    /// The index carried by the event, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Added { index, .. }
            | Self::WillRemove { index, .. }
            | Self::Removed { index, .. }
            | Self::Changed { index, .. } => Some(*index),
            Self::Filtered => None,
        }
    }
}

impl<T: Send + Sync + 'static> Event for ListEvent<T> {
    type Kind = ListEventKind;

    fn kind(&self) -> ListEventKind {
        match self {
            Self::Added { .. } => ListEventKind::Added,
            Self::WillRemove { .. } => ListEventKind::WillRemove,
            Self::Removed { .. } => ListEventKind::Removed,
            Self::Changed { .. } => ListEventKind::Changed,
            Self::Filtered => ListEventKind::Filtered,
        }
    }
}

/// A readable, observable ordered sequence.
///
/// Implemented by [`ListModel`](super::ListModel) and
/// [`ListFilter`](super::ListFilter), so filters and tag indexes can be layered
/// over either.
pub trait ListSource: Send + Sync + 'static {
    /// The item type. Items are cloned out of the source.
    type Item: Clone + Send + Sync + 'static;

    /// Number of items.
    fn size(&self) -> usize;

    /// Returns the item at `index`.
    fn get(&self, index: usize) -> ModelResult<Self::Item>;

    /// Maps a position in this source to the position in the underlying model.
    fn item_index(&self, index: usize) -> Option<usize>;

    /// Maps a position in the underlying model to a position in this source.
    ///
    /// Returns `None` when the item is not visible through this source.
    fn back_index(&self, original_index: usize) -> Option<usize>;

    /// The broadcaster carrying this source's [`ListEvent`]s.
    fn events(&self) -> &Broadcaster<ListEvent<Self::Item>>;

    /// Snapshot of all items in order.
    fn to_vec(&self) -> Vec<Self::Item> {
        (0..self.size())
            .filter_map(|index| self.get(index).ok())
            .collect()
    }

    /// Whether the source has no items.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
