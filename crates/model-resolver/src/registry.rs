//! Registration storage and per-type dispatch.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    ExtractorRegistry<B>                        │
//! │  ┌────────────────┐ ┌──────────────────┐ ┌──────────────────┐  │
//! │  │ supertypes     │ │ id / value       │ │ builders         │  │
//! │  │ (declared      │ │ extractors       │ │ source ns ->     │  │
//! │  │  hierarchy)    │ │ type -> [ex]     │ │   [BatchBuilder] │  │
//! │  └────────────────┘ └──────────────────┘ └──────────────────┘  │
//! │  ┌──────────────────────────┐  ┌───────────────────────────┐   │
//! │  │ dispatch cache           │  │ lazy declarations         │   │
//! │  │ concrete type -> routed  │  │ installed into contexts   │   │
//! │  │ effective extractors     │  │ before each resolve       │   │
//! │  └──────────────────────────┘  └───────────────────────────┘   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The dispatch cache is cleared by every extractor registration and every
//! hierarchy declaration.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use model_builder_context::LazyDecl;
use model_builder_types::{Key, KeyType, Namespace, Value};
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::extract::{IdExtractor, ValueExtractor};
use crate::supertypes::{Route, SupertypeResolver, TypeKey};

/// Erased batch builder: `(context, ids) -> entries for the target`.
pub type BuilderFn<B> = Arc<dyn Fn(&B, &[Key]) -> Result<Vec<(Key, Value)>> + Send + Sync>;

/// Builds the values of one namespace from ids of another, in one batch.
pub struct BatchBuilder<B> {
    source: Namespace,
    target: Namespace,
    func: BuilderFn<B>,
}

impl<B: 'static> BatchBuilder<B> {
    pub fn new(source: Namespace, target: Namespace, func: BuilderFn<B>) -> Self {
        Self {
            source,
            target,
            func,
        }
    }

    /// Builder over typed ids and values.
    ///
    /// Ids that are not a `K` are skipped with a warning. If none remain,
    /// `f` is not called.
    pub fn typed<K, V, F>(source: Namespace, target: Namespace, f: F) -> Self
    where
        K: KeyType + Clone,
        V: Any + Send + Sync,
        F: Fn(&B, &[K]) -> Result<HashMap<K, V>> + Send + Sync + 'static,
    {
        let label = source.clone();
        let func: BuilderFn<B> = Arc::new(move |ctx: &B, ids: &[Key]| {
            let typed: Vec<K> = ids
                .iter()
                .filter_map(|id| match id.downcast_ref::<K>() {
                    Some(id) => Some(id.clone()),
                    None => {
                        warn!(
                            namespace = %label,
                            id = %id,
                            expected = std::any::type_name::<K>(),
                            "builder skipped id of unexpected type"
                        );
                        None
                    }
                })
                .collect();
            if typed.is_empty() {
                return Ok(Vec::new());
            }
            let built = f(ctx, &typed)?;
            Ok(built
                .into_iter()
                .map(|(k, v)| (Key::new(k), Value::new(v)))
                .collect())
        });
        Self::new(source, target, func)
    }

    pub fn source(&self) -> &Namespace {
        &self.source
    }

    pub fn target(&self) -> &Namespace {
        &self.target
    }

    /// Run the builder for `ids`.
    pub fn run(&self, ctx: &B, ids: &[Key]) -> Result<Vec<(Key, Value)>> {
        (self.func)(ctx, ids)
    }
}

impl<B> fmt::Debug for BatchBuilder<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchBuilder")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

/// Extractors that apply to one concrete type, each with its route.
#[derive(Default)]
pub struct Dispatch {
    pub ids: Vec<(Arc<IdExtractor>, Route)>,
    pub values: Vec<(Arc<ValueExtractor>, Route)>,
}

impl Dispatch {
    /// Whether no extractor applies.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.values.is_empty()
    }
}

/// Registration counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub id_extractors: usize,
    pub value_extractors: usize,
    pub builders: usize,
    pub lazies: usize,
}

/// Every registration of a model builder.
pub struct ExtractorRegistry<B> {
    supertypes: SupertypeResolver,
    id_extractors: RwLock<HashMap<TypeKey, Vec<Arc<IdExtractor>>>>,
    value_extractors: RwLock<HashMap<TypeKey, Vec<Arc<ValueExtractor>>>>,
    builders: RwLock<HashMap<Namespace, Vec<Arc<BatchBuilder<B>>>>>,
    lazies: RwLock<Vec<LazyDecl>>,
    dispatch: RwLock<HashMap<TypeKey, Arc<Dispatch>>>,
}

impl<B> Default for ExtractorRegistry<B> {
    fn default() -> Self {
        Self {
            supertypes: SupertypeResolver::new(),
            id_extractors: RwLock::new(HashMap::new()),
            value_extractors: RwLock::new(HashMap::new()),
            builders: RwLock::new(HashMap::new()),
            lazies: RwLock::new(Vec::new()),
            dispatch: RwLock::new(HashMap::new()),
        }
    }
}

impl<B: 'static> ExtractorRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Hierarchy ====================

    /// Declare that `C` embeds the sized parent `P`.
    pub fn declare_extends<C, P, F>(&self, project: F)
    where
        C: Any,
        P: Any,
        F: Fn(&C) -> &P + Send + Sync + 'static,
    {
        self.supertypes.extends::<C, P, F>(project);
        self.invalidate();
    }

    /// Declare that `C` can be viewed as `S`.
    pub fn declare_implements<C, S, F>(&self, project: F)
    where
        C: Any,
        S: ?Sized + 'static,
        F: Fn(&C) -> &S + Send + Sync + 'static,
    {
        self.supertypes.implements::<C, S, F>(project);
        self.invalidate();
    }

    /// Make the sized type `S` a valid extractor source for itself.
    pub fn identity<S: Any>(&self) {
        self.supertypes.identity::<S>();
        self.invalidate();
    }

    pub fn supertypes(&self) -> &SupertypeResolver {
        &self.supertypes
    }

    // ==================== Registration ====================

    pub fn add_id_extractor(&self, extractor: IdExtractor) {
        self.id_extractors
            .write()
            .entry(extractor.source())
            .or_default()
            .push(Arc::new(extractor));
        self.invalidate();
    }

    pub fn add_value_extractor(&self, extractor: ValueExtractor) {
        self.value_extractors
            .write()
            .entry(extractor.source())
            .or_default()
            .push(Arc::new(extractor));
        self.invalidate();
    }

    pub fn add_builder(&self, builder: BatchBuilder<B>) {
        self.builders
            .write()
            .entry(builder.source().clone())
            .or_default()
            .push(Arc::new(builder));
    }

    pub fn add_lazy(&self, decl: LazyDecl) {
        self.lazies.write().push(decl);
    }

    fn invalidate(&self) {
        self.dispatch.write().clear();
    }

    // ==================== Queries ====================

    /// Routed extractors for objects of the concrete type `concrete`.
    pub fn dispatch_for(&self, concrete: TypeKey) -> Arc<Dispatch> {
        if let Some(cached) = self.dispatch.read().get(&concrete) {
            return Arc::clone(cached);
        }
        let closure = self.supertypes.supertypes_of(concrete);
        let mut dispatch = Dispatch::default();
        {
            let ids = self.id_extractors.read();
            let values = self.value_extractors.read();
            for supertype in closure.iter().filter(|s| s.route.view().is_some()) {
                for ex in ids.get(&supertype.key).into_iter().flatten() {
                    dispatch.ids.push((Arc::clone(ex), supertype.route.clone()));
                }
                for ex in values.get(&supertype.key).into_iter().flatten() {
                    dispatch.values.push((Arc::clone(ex), supertype.route.clone()));
                }
            }
        }
        trace!(
            concrete = ?concrete,
            id_extractors = dispatch.ids.len(),
            value_extractors = dispatch.values.len(),
            "computed extractor dispatch"
        );
        let dispatch = Arc::new(dispatch);
        self.dispatch
            .write()
            .entry(concrete)
            .or_insert_with(|| Arc::clone(&dispatch));
        dispatch
    }

    /// Builders consuming ids of `source`, in registration order.
    pub fn builders_for(&self, source: &Namespace) -> Vec<Arc<BatchBuilder<B>>> {
        self.builders.read().get(source).cloned().unwrap_or_default()
    }

    /// Every lazy declaration, in registration order.
    pub fn lazies(&self) -> Vec<LazyDecl> {
        self.lazies.read().clone()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            id_extractors: self.id_extractors.read().values().map(Vec::len).sum(),
            value_extractors: self.value_extractors.read().values().map(Vec::len).sum(),
            builders: self.builders.read().values().map(Vec::len).sum(),
            lazies: self.lazies.read().len(),
        }
    }
}

impl<B> fmt::Debug for ExtractorRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("supertypes", &self.supertypes)
            .field("id_extractors", &self.id_extractors.read().len())
            .field("value_extractors", &self.value_extractors.read().len())
            .field("builders", &self.builders.read().len())
            .field("lazies", &self.lazies.read().len())
            .finish()
    }
}
