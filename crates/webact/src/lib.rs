//! webact - observable models for web content trees.
//!
//! This crate provides the data layer of webact: observable lists, filtered
//! views, tag indexes and change-tracked node trees. The broadcaster they are
//! built on lives in `webact-core` and is re-exported here.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use webact::prelude::*;
//!
//! let names = Arc::new(ListModel::new(vec!["delta", "alpha", "charlie"]));
//! let sorted = ListFilter::builder(names.clone())
//!     .order(|a: &&str, b: &&str| a.cmp(b))
//!     .build();
//!
//! names.push("bravo");
//! assert_eq!(sorted.to_vec(), vec!["alpha", "bravo", "charlie", "delta"]);
//! ```

pub use webact_core::*;

pub mod model;
pub mod paths;
pub mod prelude;
