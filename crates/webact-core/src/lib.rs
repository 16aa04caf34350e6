//! Core systems for webact.
//!
//! This crate provides the foundational pieces the webact models are built on:
//!
//! - **Broadcaster**: Typed observer primitive with ordered listeners
//! - **Id allocation**: Per-owner `Class_N` identifier counters
//! - **Logging**: `tracing` targets, span names and a timing guard
//!
//! # Broadcaster Example
//!
//! ```
//! use webact_core::{Broadcaster, Event};
//!
//! #[derive(Debug)]
//! struct Saved(u32);
//!
//! impl Event for Saved {
//!     type Kind = ();
//!
//!     fn kind(&self) {}
//! }
//!
//! let saved = Broadcaster::<Saved>::new();
//! saved.add_listener((), |event| println!("saved {}", event.0));
//! assert_eq!(saved.broadcast(Saved(3)), 1);
//! ```

pub mod broadcast;
pub mod ids;
pub mod logging;

pub use broadcast::{Broadcaster, Event, ListenerGuard, ListenerId};
pub use ids::IdAllocator;
pub use logging::PerfSpan;
