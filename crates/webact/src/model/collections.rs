//! Plain ordered collection with bounds-checked access.

use std::cmp::Ordering;
use std::fmt;

use super::error::{ModelError, ModelResult};

/// A mutable ordered sequence with 0-based, bounds-checked positions.
///
/// `List` does not broadcast; wrap items in a [`ListModel`](super::ListModel)
/// when observers need to be told about mutations.
///
/// # Example
///
/// ```
/// use webact::model::List;
///
/// let mut list = List::from(vec![1, 2, 3]);
/// list.add(9, Some(1)).unwrap();
/// assert_eq!(list.as_slice(), &[1, 9, 2, 3]);
/// assert!(list.get(4).is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Default)]
pub struct List<T> {
    items: Vec<T>,
}

impl<T> List<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Number of items.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Whether the list has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> ModelResult<&T> {
        self.items
            .get(index)
            .ok_or_else(|| ModelError::out_of_bounds(index, self.items.len()))
    }

    /// Mutable access to the item at `index`.
    pub fn get_mut(&mut self, index: usize) -> ModelResult<&mut T> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or_else(|| ModelError::out_of_bounds(index, len))
    }

    /// Replaces the item at `index`, returning the prior value.
    pub fn set(&mut self, index: usize, value: T) -> ModelResult<T> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or_else(|| ModelError::out_of_bounds(index, len))?;
        Ok(std::mem::replace(slot, value))
    }

    /// Inserts `value` at `index`, or appends when `index` is `None`.
    ///
    /// `index == size()` is a valid insertion point. Returns the position
    /// the value was inserted at.
    pub fn add(&mut self, value: T, index: Option<usize>) -> ModelResult<usize> {
        let len = self.items.len();
        let index = index.unwrap_or(len);
        if index > len {
            return Err(ModelError::out_of_bounds(index, len));
        }
        self.items.insert(index, value);
        Ok(index)
    }

    /// Appends `value`, returning its position.
    pub fn push(&mut self, value: T) -> usize {
        self.items.push(value);
        self.items.len() - 1
    }

    /// Removes and returns the item at `index`.
    pub fn remove(&mut self, index: usize) -> ModelResult<T> {
        let len = self.items.len();
        if index >= len {
            return Err(ModelError::out_of_bounds(index, len));
        }
        Ok(self.items.remove(index))
    }

    /// Calls `closure` with every item and its position.
    pub fn each<F>(&self, mut closure: F)
    where
        F: FnMut(&T, usize),
    {
        for (index, item) in self.items.iter().enumerate() {
            closure(item, index);
        }
    }

    /// Maps every item into a new list.
    pub fn collect<U, F>(&self, mut closure: F) -> List<U>
    where
        F: FnMut(&T, usize) -> U,
    {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| closure(item, index))
            .collect()
    }

    /// Returns the first item passing `test`.
    pub fn find<F>(&self, mut test: F) -> Option<&T>
    where
        F: FnMut(&T, usize) -> bool,
    {
        self.items
            .iter()
            .enumerate()
            .find(|(index, item)| test(item, *index))
            .map(|(_, item)| item)
    }

    /// Sorts in place with a stable comparator.
    pub fn sort_by<F>(&mut self, compare: F) -> &mut Self
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items.sort_by(compare);
        self
    }

    /// Iterates over the items.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Borrow the items as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Consumes the list, returning the backing vector.
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Clone> List<T> {
    /// Returns the items passing `test` as a new list.
    pub fn select<F>(&self, mut test: F) -> List<T>
    where
        F: FnMut(&T, usize) -> bool,
    {
        self.items
            .iter()
            .enumerate()
            .filter(|(index, item)| test(item, *index))
            .map(|(_, item)| item.clone())
            .collect()
    }

    /// Copies `start..end` into a new list. `end` defaults to the size.
    pub fn slice(&self, start: usize, end: Option<usize>) -> ModelResult<List<T>> {
        let len = self.items.len();
        let end = end.unwrap_or(len);
        if end > len {
            return Err(ModelError::out_of_bounds(end, len));
        }
        if start > end {
            return Err(ModelError::out_of_bounds(start, end));
        }
        Ok(Self::from(self.items[start..end].to_vec()))
    }

    /// Returns a new list with `items` appended; `self` is unchanged.
    pub fn append<I>(&self, items: I) -> List<T>
    where
        I: IntoIterator<Item = T>,
    {
        let mut result = self.items.clone();
        result.extend(items);
        Self::from(result)
    }
}

impl<T: PartialEq> List<T> {
    /// Position of the first item equal to `value` at or after `start`.
    pub fn index_of(&self, value: &T, start: usize) -> Option<usize> {
        self.items
            .iter()
            .skip(start)
            .position(|item| item == value)
            .map(|offset| offset + start)
    }

    /// Whether any item equals `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.items.contains(value)
    }
}

impl<T> From<Vec<T>> for List<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for List<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

/// Renders as `List([1, "a"])`.
impl<T: fmt::Debug> fmt::Display for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "List({:?})", self.items)
    }
}
