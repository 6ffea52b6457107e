//! The build context contract.
//!
//! Application contexts embed a [`ContextStore`] and add whatever request
//! state their builders need:
//!
//! ```
//! use std::any::Any;
//! use model_builder_context::{BuildContext, ContextStore};
//!
//! struct ViewerContext {
//!     viewer_id: i32,
//!     store: ContextStore,
//! }
//!
//! impl BuildContext for ViewerContext {
//!     fn store(&self) -> &ContextStore {
//!         &self.store
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let ctx = ViewerContext { viewer_id: 1, store: ContextStore::new() };
//! assert!(ctx.data("isFollowing").unwrap().is_empty());
//! # let _ = ctx.viewer_id;
//! ```

use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use model_builder_types::Namespace;

use crate::data::NamespaceData;
use crate::store::ContextStore;

/// A per-build (or shared, long-lived) container of resolved namespace data.
pub trait BuildContext: Any + Send + Sync {
    /// The store holding this context's namespaces.
    fn store(&self) -> &ContextStore;

    /// `self` as `Any`, used to hand lazy builders their typed context.
    fn as_any(&self) -> &dyn Any;

    /// Type name used in diagnostics.
    fn context_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Live mapping of `namespace`, materializing it if it is lazy.
    fn data(&self, namespace: impl Into<Namespace>) -> Result<Arc<NamespaceData>>
    where
        Self: Sized,
    {
        self.store().data(self, &namespace.into())
    }

    /// Live mapping of the type-token namespace for `T`.
    fn data_of<T: ?Sized + 'static>(&self) -> Result<Arc<NamespaceData>>
    where
        Self: Sized,
    {
        self.store().data(self, &Namespace::of::<T>())
    }

    /// Live mapping of a namespace that must have a lazy declaration.
    fn lazy_data(&self, namespace: impl Into<Namespace>) -> Result<Arc<NamespaceData>>
    where
        Self: Sized,
    {
        self.store().lazy_data(self, &namespace.into())
    }

    /// Merge `other` into this context.
    fn merge(&self, other: &dyn BuildContext) -> Result<()> {
        self.store()
            .merge(other.store(), self.as_any().type_id(), self.context_name())
    }
}

/// Context with no request state of its own.
#[derive(Debug, Default)]
pub struct SimpleBuildContext {
    store: ContextStore,
}

impl SimpleBuildContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BuildContext for SimpleBuildContext {
    fn store(&self) -> &ContextStore {
        &self.store
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
