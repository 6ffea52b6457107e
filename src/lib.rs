//! Model Builder
//!
//! Batched resolution of object graphs whose references are only discovered
//! at runtime:
//!
//! - **Registration**: declare which ids (or embedded values) each type
//!   refers to, and which batch functions turn ids into values
//! - **Resolution**: [`ModelBuilder::resolve`] runs extraction and batched
//!   builder rounds until no new objects appear, never asking twice for the
//!   same id in a context
//! - **Context**: results land in a [`BuildContext`], a namespaced,
//!   concurrent store with lazily computed namespaces and merge
//!
//! ```
//! use std::collections::HashMap;
//! use model_builder::{ModelBuilder, SimpleBuildContext, BuildContext, Value};
//!
//! struct Comment { id: i32, author: i32 }
//! struct User { name: String }
//!
//! let builder: ModelBuilder<SimpleBuildContext> = ModelBuilder::new();
//! builder.on::<Comment>().id(|c| c.author).to("User");
//! builder.build("User").by_ids(|ids: &[i32]| {
//!     Ok(ids.iter().map(|id| (*id, User { name: format!("user{id}") })).collect::<HashMap<_, _>>())
//! }).to_self();
//!
//! let ctx = SimpleBuildContext::new();
//! builder.resolve([Value::new(Comment { id: 1, author: 42 })], &ctx).unwrap();
//! let user = ctx.data("User").unwrap().get_as::<User>(42i32).unwrap();
//! assert_eq!(user.name, "user42");
//! # let _ = |c: &Comment| c.id;
//! ```
//!
//! See [`builder`] for the registration surface and [`resolve`] for the loop.

#![allow(clippy::type_complexity)]

pub mod builder;
pub mod config;
pub mod guard;
pub mod metrics;
pub mod resolve;

pub use builder::{Build, BuildTo, Declare, IdTo, ModelBuilder, On, ValueTo};
pub use config::ResolveConfig;
pub use guard::{ConflictGuard, ConflictHook};
pub use metrics::{BuildMetrics, MetricsSnapshot};
pub use resolve::ResolveReport;

pub use model_builder_context::{
    BuildContext, ContextStore, LazyDecl, NamespaceData, SimpleBuildContext,
};
pub use model_builder_resolver::{BatchBuilder, Extracted};
pub use model_builder_types::{BuildError, Key, KeyType, Namespace, Value};
