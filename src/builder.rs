//! Fluent configuration of a [`ModelBuilder`].
//!
//! Registrations take `&self`, so a builder can be configured through a
//! shared reference and then used from many threads:
//!
//! ```
//! use std::collections::HashMap;
//! use model_builder::ModelBuilder;
//! use model_builder_context::SimpleBuildContext;
//!
//! struct Post { id: i32, author: i32 }
//! struct User { id: i32 }
//!
//! let builder: ModelBuilder<SimpleBuildContext> = ModelBuilder::new();
//! builder
//!     .on::<Post>()
//!     .id(|p| p.author)
//!     .to("User");
//! builder.build("User").by_ids(|ids: &[i32]| {
//!     Ok(ids.iter().map(|id| (*id, User { id: *id })).collect::<HashMap<_, _>>())
//! }).to_self();
//! # let _ = |p: &Post| p.id;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use model_builder_context::{BuildContext, LazyDecl};
use model_builder_resolver::{
    id_of, BatchBuilder, Extracted, ExtractorRegistry, IdExtractor, IdOf, RegistryStats,
    ValueExtractor,
};
use model_builder_types::{Key, KeyType, Namespace};
use tracing::debug;

use crate::config::ResolveConfig;
use crate::guard::ConflictGuard;
use crate::metrics::BuildMetrics;

type IdentityFn<B> = fn(&ExtractorRegistry<B>);

/// Registry of extractors and builders plus the resolution loop that uses them.
pub struct ModelBuilder<B> {
    pub(crate) registry: ExtractorRegistry<B>,
    pub(crate) guard: ConflictGuard,
    pub(crate) config: ResolveConfig,
    pub(crate) metrics: BuildMetrics,
}

impl<B: BuildContext> Default for ModelBuilder<B> {
    fn default() -> Self {
        Self::with_config(ResolveConfig::default())
    }
}

impl<B: BuildContext> ModelBuilder<B> {
    /// Builder with the default [`ResolveConfig`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder configured from `MODEL_BUILDER_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_config(ResolveConfig::from_env())
    }

    pub fn with_config(config: ResolveConfig) -> Self {
        Self {
            registry: ExtractorRegistry::new(),
            guard: ConflictGuard::new(),
            config,
            metrics: BuildMetrics::default(),
        }
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub fn metrics(&self) -> &BuildMetrics {
        &self.metrics
    }

    pub fn registry(&self) -> &ExtractorRegistry<B> {
        &self.registry
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    // ==================== Conflict guard ====================

    /// Install the callback run for every registration made after the first
    /// `resolve`.
    pub fn on_conflict<F>(&self, hook: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.guard.set_hook(Arc::new(hook));
        self
    }

    /// Treat the configuration as final from now on.
    pub fn freeze(&self) {
        self.guard.freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.guard.is_frozen()
    }

    fn registering(&self, what: &str) {
        if self.guard.check(what) {
            self.metrics.record_conflict();
        }
    }

    // ==================== Hierarchy ====================

    /// Start declaring the supertypes of `C`.
    pub fn declare<C: Any>(&self) -> Declare<'_, B, C> {
        Declare {
            builder: self,
            _type: PhantomData,
        }
    }

    // ==================== Extractors ====================

    /// Start an extractor registration on the sized type `S`.
    ///
    /// `S` also matches every type declared to extend it.
    pub fn on<S: Any + Send + Sync>(&self) -> On<'_, B, S> {
        let identity: IdentityFn<B> = |registry| registry.identity::<S>();
        On {
            builder: self,
            identity: Some(identity),
            _source: PhantomData,
        }
    }

    /// Start an extractor registration on a declared view such as `dyn HasUser`.
    pub fn on_view<S: ?Sized + 'static>(&self) -> On<'_, B, S> {
        On {
            builder: self,
            identity: None,
            _source: PhantomData,
        }
    }

    /// Register every `T` into `Namespace::of::<T>()` under `id(&T)`.
    pub fn register_self<T, K, F>(&self, id: F) -> &Self
    where
        T: Any + Send + Sync,
        K: KeyType,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.registering("register_self");
        self.registry.identity::<T>();
        self.registry
            .add_value_extractor(ValueExtractor::itself::<T, K, F>(Namespace::of::<T>(), id));
        self
    }

    // ==================== Builders ====================

    /// Start a batch builder registration for ids of `source`.
    pub fn build(&self, source: impl Into<Namespace>) -> Build<'_, B> {
        Build {
            builder: self,
            source: source.into(),
        }
    }

    /// Batch builder whose results land in the namespace of its ids.
    pub fn build_self<K, V, F>(&self, namespace: impl Into<Namespace>, f: F) -> &Self
    where
        K: KeyType + Clone,
        V: Any + Send + Sync,
        F: Fn(&B, &[K]) -> Result<HashMap<K, V>> + Send + Sync + 'static,
    {
        self.build(namespace).by(f).to_self()
    }

    /// Register a pre-built batch builder.
    pub fn add_builder(&self, builder: BatchBuilder<B>) -> &Self {
        self.registering("build");
        debug!(
            source = %builder.source(),
            target = %builder.target(),
            "registered batch builder"
        );
        self.registry.add_builder(builder);
        self
    }

    // ==================== Lazy namespaces ====================

    /// Declare `target` as computed on first read from the ids of `source`.
    pub fn lazy<K, V, F>(
        &self,
        source: impl Into<Namespace>,
        f: F,
        target: impl Into<Namespace>,
    ) -> &Self
    where
        K: KeyType + Clone,
        V: Any + Send + Sync,
        F: Fn(&B, &[K]) -> Result<HashMap<K, V>> + Send + Sync + 'static,
    {
        let source = source.into();
        let target = target.into();
        let typed = BatchBuilder::<B>::typed(source.clone(), target.clone(), f);
        self.add_lazy(LazyDecl::new(source, target, move |ctx: &B, ids: &[Key]| {
            typed.run(ctx, ids)
        }))
    }

    /// [`lazy`](Self::lazy) for builders that ignore the context.
    pub fn lazy_ids<K, V, F>(
        &self,
        source: impl Into<Namespace>,
        f: F,
        target: impl Into<Namespace>,
    ) -> &Self
    where
        K: KeyType + Clone,
        V: Any + Send + Sync,
        F: Fn(&[K]) -> Result<HashMap<K, V>> + Send + Sync + 'static,
    {
        self.lazy(source, move |_ctx: &B, ids: &[K]| f(ids), target)
    }

    /// Register a pre-built lazy declaration.
    pub fn add_lazy(&self, decl: LazyDecl) -> &Self {
        self.registering("lazy");
        debug!(
            source = %decl.source(),
            target = %decl.target(),
            "registered lazy namespace"
        );
        self.registry.add_lazy(decl);
        self
    }
}

impl<B> fmt::Debug for ModelBuilder<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("registry", &self.registry)
            .field("guard", &self.guard)
            .field("config", &self.config)
            .finish()
    }
}

/// `declare::<C>()` chain.
pub struct Declare<'a, B, C> {
    builder: &'a ModelBuilder<B>,
    _type: PhantomData<fn(&C)>,
}

impl<'a, B: BuildContext, C: Any> Declare<'a, B, C> {
    /// `C` embeds `P`: extractors on `P` (and its views) apply to `C`.
    pub fn extends<P, F>(self, project: F) -> Self
    where
        P: Any,
        F: Fn(&C) -> &P + Send + Sync + 'static,
    {
        self.builder.registering("extends");
        self.builder.registry.declare_extends::<C, P, F>(project);
        self
    }

    /// `C` can be viewed as `S`: extractors on `S` apply to `C`.
    pub fn implements<S, F>(self, project: F) -> Self
    where
        S: ?Sized + 'static,
        F: Fn(&C) -> &S + Send + Sync + 'static,
    {
        self.builder.registering("implements");
        self.builder.registry.declare_implements::<C, S, F>(project);
        self
    }
}

/// `on::<S>()` / `on_view::<S>()` chain.
pub struct On<'a, B, S: ?Sized> {
    builder: &'a ModelBuilder<B>,
    identity: Option<IdentityFn<B>>,
    _source: PhantomData<fn(&S)>,
}

impl<'a, B: BuildContext, S: ?Sized + 'static> On<'a, B, S> {
    /// One id per object.
    pub fn id<K, F>(self, f: F) -> IdTo<'a, B>
    where
        K: KeyType,
        F: Fn(&S) -> K + Send + Sync + 'static,
    {
        self.ids(move |s: &S| Some(f(s)))
    }

    /// Any number of ids per object (`Option` for "maybe one").
    pub fn ids<K, I, F>(self, f: F) -> IdTo<'a, B>
    where
        K: KeyType,
        I: IntoIterator<Item = K>,
        F: Fn(&S) -> I + Send + Sync + 'static,
    {
        IdTo {
            builder: self.builder,
            identity: self.identity,
            make: Box::new(move |target| IdExtractor::new::<S, K, I, F>(target, f)),
        }
    }

    /// Values embedded in the object. Raw `One`/`Many` results need
    /// [`ValueTo::id`].
    pub fn value<R, F>(self, f: F) -> ValueTo<'a, B>
    where
        R: Into<Extracted>,
        F: Fn(&S) -> R + Send + Sync + 'static,
    {
        ValueTo {
            builder: self.builder,
            identity: self.identity,
            make: Box::new(move |target| ValueExtractor::new::<S, R, F>(target, f)),
            id_of: None,
        }
    }

    /// Embedded collection of `V`, keyed by `id(&V)`.
    pub fn values<V, K, I, F, G>(self, f: F, id: G) -> ValueTo<'a, B>
    where
        V: Any + Send + Sync,
        K: KeyType,
        I: IntoIterator<Item = V>,
        F: Fn(&S) -> I + Send + Sync + 'static,
        G: Fn(&V) -> K + Send + Sync + 'static,
    {
        self.value(move |s: &S| Extracted::many(f(s))).id(id)
    }

    /// Embedded mapping, used as is.
    pub fn mapping<K, V, F>(self, f: F) -> ValueTo<'a, B>
    where
        K: KeyType,
        V: Any + Send + Sync,
        F: Fn(&S) -> Option<HashMap<K, V>> + Send + Sync + 'static,
    {
        self.value(move |s: &S| f(s).map(Extracted::mapping).unwrap_or_default())
    }
}

/// Pending id extractor, completed by [`IdTo::to`].
pub struct IdTo<'a, B> {
    builder: &'a ModelBuilder<B>,
    identity: Option<IdentityFn<B>>,
    make: Box<dyn FnOnce(Namespace) -> IdExtractor>,
}

impl<'a, B: BuildContext> IdTo<'a, B> {
    /// Send the extracted ids to `target`.
    pub fn to(self, target: impl Into<Namespace>) -> &'a ModelBuilder<B> {
        let builder = self.builder;
        builder.registering("id extractor");
        if let Some(identity) = self.identity {
            identity(&builder.registry);
        }
        let extractor = (self.make)(target.into());
        debug!(
            source = ?extractor.source(),
            target = %extractor.target(),
            "registered id extractor"
        );
        builder.registry.add_id_extractor(extractor);
        builder
    }
}

/// Pending value extractor, completed by [`ValueTo::to`].
pub struct ValueTo<'a, B> {
    builder: &'a ModelBuilder<B>,
    identity: Option<IdentityFn<B>>,
    make: Box<dyn FnOnce(Namespace) -> ValueExtractor>,
    id_of: Option<IdOf>,
}

impl<'a, B: BuildContext> ValueTo<'a, B> {
    /// Id function for raw single or collection results.
    pub fn id<V, K, F>(mut self, f: F) -> Self
    where
        V: Any + Send + Sync,
        K: KeyType,
        F: Fn(&V) -> K + Send + Sync + 'static,
    {
        self.id_of = Some(id_of(f));
        self
    }

    /// Send the extracted entries to `target`.
    pub fn to(self, target: impl Into<Namespace>) -> &'a ModelBuilder<B> {
        let builder = self.builder;
        builder.registering("value extractor");
        if let Some(identity) = self.identity {
            identity(&builder.registry);
        }
        let mut extractor = (self.make)(target.into());
        if let Some(id_of) = self.id_of {
            extractor = extractor.with_id_of(id_of);
        }
        debug!(
            source = ?extractor.source(),
            target = %extractor.target(),
            id_of = extractor.has_id_of(),
            "registered value extractor"
        );
        builder.registry.add_value_extractor(extractor);
        builder
    }
}

/// `build(source)` chain.
pub struct Build<'a, B> {
    builder: &'a ModelBuilder<B>,
    source: Namespace,
}

impl<'a, B: BuildContext> Build<'a, B> {
    /// Batch function reading the build context.
    pub fn by<K, V, F>(self, f: F) -> BuildTo<'a, B>
    where
        K: KeyType + Clone,
        V: Any + Send + Sync,
        F: Fn(&B, &[K]) -> Result<HashMap<K, V>> + Send + Sync + 'static,
    {
        BuildTo {
            builder: self.builder,
            source: self.source,
            make: Box::new(move |source, target| BatchBuilder::typed(source, target, f)),
        }
    }

    /// Batch function that ignores the build context.
    pub fn by_ids<K, V, F>(self, f: F) -> BuildTo<'a, B>
    where
        K: KeyType + Clone,
        V: Any + Send + Sync,
        F: Fn(&[K]) -> Result<HashMap<K, V>> + Send + Sync + 'static,
    {
        self.by(move |_ctx: &B, ids: &[K]| f(ids))
    }
}

/// Pending batch builder, completed by [`BuildTo::to`] or [`BuildTo::to_self`].
pub struct BuildTo<'a, B> {
    builder: &'a ModelBuilder<B>,
    source: Namespace,
    make: Box<dyn FnOnce(Namespace, Namespace) -> BatchBuilder<B>>,
}

impl<'a, B: BuildContext> BuildTo<'a, B> {
    /// Store the built values in `target`.
    pub fn to(self, target: impl Into<Namespace>) -> &'a ModelBuilder<B> {
        let builder = (self.make)(self.source, target.into());
        self.builder.add_builder(builder)
    }

    /// Store the built values in the namespace of the ids.
    pub fn to_self(self) -> &'a ModelBuilder<B> {
        let target = self.source.clone();
        self.to(target)
    }
}
