//! Model Builder Context
//!
//! The namespaced store a resolution writes into and presentation code reads
//! from.
//!
//! This crate provides:
//! - [`BuildContext`]: the trait application contexts implement (usually by
//!   embedding a [`ContextStore`] next to request fields such as a viewer id)
//! - [`ContextStore`]: namespace -> (id -> value) storage with lazy namespaces
//!   and merge
//! - [`NamespaceData`]: the live, internally synchronised mapping of one namespace
//! - [`LazyDecl`]: a deferred builder computed once on first read
//!
//! # Example
//!
//! ```
//! use model_builder_context::{BuildContext, SimpleBuildContext};
//! use model_builder_types::{Key, Value};
//!
//! let ctx = SimpleBuildContext::new();
//! let users = ctx.data("User").unwrap();
//! users.insert(Key::from(1i32), Value::new("alice".to_string()));
//! assert_eq!(ctx.data("User").unwrap().len(), 1);
//! ```

pub mod context;
pub mod data;
pub mod lazy;
pub mod metrics;
pub mod store;

pub use context::{BuildContext, SimpleBuildContext};
pub use data::NamespaceData;
pub use lazy::{LazyDecl, LazyFn};
pub use metrics::{StoreMetrics, StoreMetricsSnapshot};
pub use store::ContextStore;
