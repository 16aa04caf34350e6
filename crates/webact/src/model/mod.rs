//! Observable data models for webact.
//!
//! Models broadcast typed events after every mutation so that views, tag
//! selectors and remote connectors can follow along.
//!
//! # Core Types
//!
//! - `List`: plain bounds-checked sequence
//! - `ListModel`: observable list
//! - `ListFilter`: filtered and sorted view over any `ListSource`
//! - `TagIndex`: tag to position index over any `ListSource`
//! - `Tree`: arena of named, change-tracked nodes
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────┐  events  ┌─────────────┐  events  ┌─────────────┐
//! │  ListModel  │─────────>│ ListFilter  │─────────>│  TagIndex   │
//! │ (ListSource)│          │ (ListSource)│          │             │
//! └─────────────┘          └─────────────┘          └─────────────┘
//! ```
//!
//! Filters and indexes subscribe to their source on construction and
//! unsubscribe when dropped.

mod collections;
mod error;
mod list_filter;
mod list_model;
mod tag_index;
mod traits;
mod tree;
mod tree_debug;

pub use collections::List;
pub use error::{ModelError, ModelResult, TreeError, TreeResult};
pub use list_filter::{CompareFn, FilterFn, ListFilter, ListFilterBuilder};
pub use list_model::ListModel;
pub use tag_index::{TagAccessor, TagIndex, TagIndexEvent, TagIndexEventKind, TagRecord, TaggedItem};
pub use traits::{ListEvent, ListEventKind, ListSource};
pub use tree::{NodeId, Tree, TreeEvent, TreeEventKind};
pub use tree_debug::{TreeDebug, TreeFormatOptions, TreeStyle};
