//! Prelude module for webact.
//!
//! ```ignore
//! use webact::prelude::*;
//! ```
//!
//! This provides access to:
//! - The broadcaster (`Broadcaster`, `Event`, `ListenerId`)
//! - List models (`List`, `ListModel`, `ListFilter`, `ListSource`)
//! - Tag indexing (`TagIndex`, `TaggedItem`)
//! - Node trees (`Tree`, `NodeId`, `TreeEvent`)

// ============================================================================
// Broadcasting
// ============================================================================

pub use crate::{Broadcaster, Event, ListenerGuard, ListenerId};

// ============================================================================
// Lists
// ============================================================================

pub use crate::model::{
    List, ListEvent, ListEventKind, ListFilter, ListModel, ListSource, ModelError, ModelResult,
};

// ============================================================================
// Tags
// ============================================================================

pub use crate::model::{TagIndex, TagIndexEvent, TaggedItem};

// ============================================================================
// Trees
// ============================================================================

pub use crate::model::{NodeId, Tree, TreeError, TreeEvent, TreeEventKind, TreeResult};
pub use crate::paths;
