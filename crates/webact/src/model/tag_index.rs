//! Inverted index from tags to list positions.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use webact_core::logging::span_names;
use webact_core::{Broadcaster, Event, ListenerId, PerfSpan};

use super::error::ModelResult;
use super::traits::{ListEvent, ListEventKind, ListSource};

/// Items that carry string tags.
pub trait TaggedItem {
    /// Tags stored under the default `tags` field.
    fn tags(&self) -> Vec<String> {
        self.field_tags("tags")
    }

    /// Tags stored under `field`.
    fn field_tags(&self, field: &str) -> Vec<String>;
}

/// JSON objects carry their tags as an array of strings (a single string is
/// treated as one tag). Anything else has no tags.
impl TaggedItem for serde_json::Value {
    fn field_tags(&self, field: &str) -> Vec<String> {
        match self.get(field) {
            Some(serde_json::Value::Array(values)) => values
                .iter()
                .filter_map(|value| value.as_str().map(str::to_owned))
                .collect(),
            Some(serde_json::Value::String(tag)) => vec![tag.clone()],
            _ => Vec::new(),
        }
    }
}

/// Type alias for a function extracting the tags of an item.
pub type TagAccessor<T> = Arc<dyn Fn(&T) -> Vec<String> + Send + Sync>;

/// A tag and the ascending source positions carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub tag: String,
    pub locations: Vec<usize>,
}

/// Notification sent after the index changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagIndexEvent {
    /// The whole index was rebuilt.
    Reindexed,
    /// The tags of one position were patched.
    ItemIndexed { position: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagIndexEventKind {
    Reindexed,
    ItemIndexed,
}

impl Event for TagIndexEvent {
    type Kind = TagIndexEventKind;

    fn kind(&self) -> TagIndexEventKind {
        match self {
            Self::Reindexed => TagIndexEventKind::Reindexed,
            Self::ItemIndexed { .. } => TagIndexEventKind::ItemIndexed,
        }
    }
}

#[derive(Default)]
struct TagTable {
    records: BTreeMap<String, TagRecord>,
    item_tags: HashMap<usize, Vec<String>>,
}

impl TagTable {
    fn insert(&mut self, position: usize, tags: Vec<String>) {
        for tag in &tags {
            let record = self
                .records
                .entry(tag.clone())
                .or_insert_with(|| TagRecord {
                    tag: tag.clone(),
                    locations: Vec::new(),
                });
            if let Err(slot) = record.locations.binary_search(&position) {
                record.locations.insert(slot, position);
            }
        }
        self.item_tags.insert(position, tags);
    }

    fn remove(&mut self, position: usize) {
        let Some(tags) = self.item_tags.remove(&position) else {
            return;
        };
        for tag in tags {
            let now_empty = match self.records.get_mut(&tag) {
                Some(record) => {
                    record.locations.retain(|&location| location != position);
                    record.locations.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.records.remove(&tag);
            }
        }
    }
}

/// Removes duplicate tags, keeping first occurrences.
fn dedupe(tags: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Maintains, for one list source, which positions carry which tags.
///
/// The index is rebuilt wholesale when items are added or removed (positions
/// shift) and patched in place when a single item changes.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use std::sync::Arc;
/// use webact::model::{ListModel, TagIndex};
///
/// let photos = Arc::new(ListModel::new(vec![
///     json!({"tags": ["beach"]}),
///     json!({"tags": ["city"]}),
///     json!({"tags": ["beach", "city"]}),
/// ]));
/// let index = TagIndex::new(photos);
///
/// assert_eq!(index.locations("beach"), vec![0, 2]);
/// assert_eq!(index.collect_locations(&["beach", "city"], true), vec![2]);
/// ```
pub struct TagIndex<S: ListSource> {
    source: RwLock<Arc<S>>,
    listeners: Mutex<Vec<(ListEventKind, ListenerId)>>,
    accessor: TagAccessor<S::Item>,
    table: RwLock<TagTable>,
    events: Broadcaster<TagIndexEvent>,
}

impl<S> TagIndex<S>
where
    S: ListSource,
    S::Item: TaggedItem,
{
    /// Indexes `source` using each item's `tags` field.
    pub fn new(source: Arc<S>) -> Arc<Self> {
        Self::with_accessor(source, |item: &S::Item| item.tags())
    }

    /// Indexes `source` using the tags stored under `field`.
    pub fn by_field(source: Arc<S>, field: impl Into<String>) -> Arc<Self> {
        let field = field.into();
        Self::with_accessor(source, move |item: &S::Item| item.field_tags(&field))
    }
}

impl<S: ListSource> TagIndex<S> {
    /// Indexes `source` using `accessor` to read the tags of an item.
    pub fn with_accessor<F>(source: Arc<S>, accessor: F) -> Arc<Self>
    where
        F: Fn(&S::Item) -> Vec<String> + Send + Sync + 'static,
    {
        let index = Arc::new(Self {
            source: RwLock::new(source),
            listeners: Mutex::new(Vec::new()),
            accessor: Arc::new(accessor),
            table: RwLock::new(TagTable::default()),
            events: Broadcaster::new(),
        });
        index.subscribe();
        index.index_all();
        index
    }

    fn subscribe(self: &Arc<Self>) {
        let source = self.source();
        let events = source.events();
        let mut listeners = self.listeners.lock();
        for kind in [
            ListEventKind::Added,
            ListEventKind::Removed,
            ListEventKind::Filtered,
        ] {
            let id = events.add_receiver(kind, self, |index: &Self, _| index.index_all());
            listeners.push((kind, id));
        }
        let id = events.add_receiver(ListEventKind::Changed, self, Self::on_changed);
        listeners.push((ListEventKind::Changed, id));
    }

    fn unsubscribe(&self) {
        let source = self.source();
        for (kind, id) in self.listeners.lock().drain(..) {
            source.events().remove_listener(kind, id);
        }
    }

    fn on_changed(&self, event: &ListEvent<S::Item>) {
        if let ListEvent::Changed { index, .. } = event
            && let Err(error) = self.index_item(*index)
        {
            tracing::warn!(target: "webact::tags", %error, "changed item vanished, reindexing");
            self.index_all();
        }
    }

    /// Binds the index to a different source and rebuilds it.
    pub fn set_list(self: &Arc<Self>, source: Arc<S>) {
        self.unsubscribe();
        *self.source.write() = source;
        self.subscribe();
        self.index_all();
    }

    /// The indexed source.
    pub fn source(&self) -> Arc<S> {
        self.source.read().clone()
    }

    /// The index's broadcaster.
    pub fn events(&self) -> &Broadcaster<TagIndexEvent> {
        &self.events
    }

    /// Rebuilds the whole index from the source.
    pub fn index_all(&self) {
        let _perf = PerfSpan::new(span_names::TAG_REINDEX);
        let items = self.source().to_vec();
        let mut table = TagTable::default();
        for (position, item) in items.iter().enumerate() {
            table.insert(position, dedupe((self.accessor)(item)));
        }
        tracing::trace!(
            target: "webact::tags",
            items = items.len(),
            tags = table.records.len(),
            "tag index rebuilt"
        );
        *self.table.write() = table;
        self.events.broadcast(TagIndexEvent::Reindexed);
    }

    /// Re-reads the tags of the item at `position`.
    pub fn index_item(&self, position: usize) -> ModelResult<()> {
        let item = self.source().get(position)?;
        let tags = dedupe((self.accessor)(&item));
        {
            let mut table = self.table.write();
            table.remove(position);
            table.insert(position, tags);
        }
        self.events.broadcast(TagIndexEvent::ItemIndexed { position });
        Ok(())
    }

    /// Forgets the tags recorded for `position`.
    ///
    /// Tags left without locations are dropped from the index.
    pub fn remove_item(&self, position: usize) {
        self.table.write().remove(position);
    }

    /// Every known tag, sorted.
    pub fn tags(&self) -> Vec<String> {
        self.table.read().records.keys().cloned().collect()
    }

    /// Ascending positions carrying `tag`. Empty for an unknown tag.
    pub fn locations(&self, tag: &str) -> Vec<usize> {
        self.table
            .read()
            .records
            .get(tag)
            .map(|record| record.locations.clone())
            .unwrap_or_default()
    }

    /// The record for `tag`, if any position carries it.
    pub fn tag_record(&self, tag: &str) -> Option<TagRecord> {
        self.table.read().records.get(tag).cloned()
    }

    /// Tags recorded for the item at `position` when it was last indexed.
    pub fn item_tags(&self, position: usize) -> Vec<String> {
        self.table
            .read()
            .item_tags
            .get(&position)
            .cloned()
            .unwrap_or_default()
    }

    /// The items carrying `tag`.
    pub fn items(&self, tag: &str) -> Vec<S::Item> {
        self.items_at(&self.locations(tag))
    }

    /// Share of source items carrying `tag`, in `[0, 1]`.
    ///
    /// Zero for an unknown tag or an empty source.
    pub fn frequency(&self, tag: &str) -> f64 {
        let size = self.source().size();
        if size == 0 {
            return 0.0;
        }
        let count = self
            .table
            .read()
            .records
            .get(tag)
            .map_or(0, |record| record.locations.len());
        count as f64 / size as f64
    }

    /// Positions carrying the requested tags.
    ///
    /// With no tags every position is returned. Otherwise positions carrying
    /// at least one tag (union) or every tag (`intersection`) are returned,
    /// deduplicated and ascending.
    pub fn collect_locations<T: AsRef<str>>(&self, tags: &[T], intersection: bool) -> Vec<usize> {
        if tags.is_empty() {
            return self.collect_all_locations();
        }
        let requested: BTreeSet<&str> = tags.iter().map(AsRef::as_ref).collect();
        let table = self.table.read();

        let mut markers: BTreeMap<usize, usize> = BTreeMap::new();
        for tag in &requested {
            if let Some(record) = table.records.get(*tag) {
                for &location in &record.locations {
                    *markers.entry(location).or_default() += 1;
                }
            }
        }

        markers
            .into_iter()
            .filter(|&(_, count)| !intersection || count >= requested.len())
            .map(|(location, _)| location)
            .collect()
    }

    /// Every source position, ascending.
    pub fn collect_all_locations(&self) -> Vec<usize> {
        (0..self.source().size()).collect()
    }

    /// Items at the positions returned by
    /// [`collect_locations`](Self::collect_locations).
    pub fn collect_items<T: AsRef<str>>(&self, tags: &[T], intersection: bool) -> Vec<S::Item> {
        self.items_at(&self.collect_locations(tags, intersection))
    }

    fn items_at(&self, locations: &[usize]) -> Vec<S::Item> {
        let source = self.source();
        locations
            .iter()
            .filter_map(|&location| source.get(location).ok())
            .collect()
    }

    /// Picks up to `count` tags that best split the source in half.
    ///
    /// Tags are weighted by how far their location count is from half the
    /// source size; the closest win, ties go to the alphabetically smaller
    /// tag. The result is sorted alphabetically.
    pub fn find_best_selectors(&self, count: usize) -> Vec<String> {
        let half = self.source().size() as f64 / 2.0;
        let mut weighted: Vec<(f64, String)> = self
            .table
            .read()
            .records
            .values()
            .map(|record| ((record.locations.len() as f64 - half).abs(), record.tag.clone()))
            .collect();
        // Records iterate alphabetically and the sort is stable.
        weighted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut result: Vec<String> = weighted
            .into_iter()
            .take(count)
            .map(|(_, tag)| tag)
            .collect();
        result.sort();
        result
    }

    /// Frequencies of `tags` rescaled so the least frequent maps to 0 and the
    /// most frequent to 1. When every frequency is equal all map to 0.
    pub fn normalized_frequencies<T: AsRef<str>>(&self, tags: &[T]) -> BTreeMap<String, f64> {
        let frequencies: BTreeMap<String, f64> = tags
            .iter()
            .map(|tag| (tag.as_ref().to_owned(), self.frequency(tag.as_ref())))
            .collect();
        let minimum = frequencies.values().copied().fold(f64::INFINITY, f64::min);
        let maximum = frequencies.values().copied().fold(0.0, f64::max);

        frequencies
            .into_iter()
            .map(|(tag, frequency)| {
                let normalized = if frequency > minimum {
                    (frequency - minimum) / (maximum - minimum)
                } else {
                    0.0
                };
                (tag, normalized)
            })
            .collect()
    }
}

impl<S: ListSource> Drop for TagIndex<S> {
    fn drop(&mut self) {
        let source = self.source.get_mut().clone();
        for (kind, id) in self.listeners.get_mut().drain(..) {
            source.events().remove_listener(kind, id);
        }
    }
}

/// One `tag: count` line per tag, sorted by tag.
impl<S: ListSource> fmt::Display for TagIndex<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.read();
        for (line, record) in table.records.values().enumerate() {
            if line > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", record.tag, record.locations.len())?;
        }
        Ok(())
    }
}

impl<S: ListSource> fmt::Debug for TagIndex<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagIndex")
            .field("records", &self.table.read().records)
            .finish()
    }
}
