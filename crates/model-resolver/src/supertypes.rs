//! Declared type hierarchy and memoized supertype closures.
//!
//! Rust has no runtime class hierarchy, so relations are declared:
//!
//! - **extends**: `C` embeds a sized parent `P` (`|c: &C| -> &P`). Extends
//!   edges compose, so `C -> P -> G` lets `C` reach `G`.
//! - **implements**: `C` exposes a view `S` (usually `dyn Trait`,
//!   `|c: &C| -> &dyn Trait`). A view is terminal. Views declared on a parent
//!   are inherited by every type that extends it.
//!
//! Registering an extractor against a sized type `S` declares the identity
//! view `S -> S`, which is what makes `S` itself part of its own closure.
//!
//! `supertypes_of(C)` walks the extends edges from `C`, collecting every view
//! reachable along the way together with the [`Route`] that projects a `&C`
//! to that view. Results are cached per concrete type; any declaration clears
//! the cache.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use model_builder_types::namespace::short_type_name;
use parking_lot::RwLock;
use tracing::trace;

/// Identity of a Rust type in the declared hierarchy.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T` (sized or not).
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key from raw parts, as carried by a `Value`.
    pub fn from_parts(id: TypeId, name: &'static str) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(short_type_name(self.name))
    }
}

/// Erased sized upcast: `&C` (as `Any`) to `&P` (as `Any`).
pub(crate) type Upcast = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;

/// Typed projection from an erased object to `&S`.
pub(crate) struct View<S: ?Sized + 'static>(
    pub(crate) Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a S> + Send + Sync>,
);

fn upcast_fn<F>(f: F) -> Upcast
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn view_fn<S, F>(f: F) -> View<S>
where
    S: ?Sized + 'static,
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a S> + Send + Sync + 'static,
{
    View(Arc::new(f))
}

/// How to get from a concrete object to one of its supertypes.
#[derive(Clone)]
pub struct Route {
    hops: Vec<Upcast>,
    view: Option<Arc<dyn Any + Send + Sync>>,
}

impl Route {
    /// Apply the extends hops, yielding the object the view expects.
    pub fn project<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any> {
        self.hops.iter().try_fold(object, |current, hop| hop(current))
    }

    /// The erased `View<S>` closing this route, if the supertype has one.
    pub(crate) fn view(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.view.as_deref()
    }

    /// Project `object` all the way to `&S`.
    pub fn resolve<'a, S: ?Sized + 'static>(&self, object: &'a dyn Any) -> Option<&'a S> {
        let projected = self.project(object)?;
        let view = self.view()?.downcast_ref::<View<S>>()?;
        (view.0)(projected)
    }
}

/// One entry of a supertype closure.
#[derive(Clone)]
pub struct Supertype {
    pub key: TypeKey,
    pub route: Route,
}

/// Declared hierarchy plus per-type closure cache.
#[derive(Default)]
pub struct SupertypeResolver {
    parents: RwLock<HashMap<TypeKey, Vec<(TypeKey, Upcast)>>>,
    views: RwLock<HashMap<TypeKey, Vec<(TypeKey, Arc<dyn Any + Send + Sync>)>>>,
    cache: RwLock<HashMap<TypeKey, Arc<Vec<Supertype>>>>,
}

impl SupertypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `C` embeds the sized parent `P`.
    pub fn extends<C, P, F>(&self, project: F)
    where
        C: Any,
        P: Any,
        F: Fn(&C) -> &P + Send + Sync + 'static,
    {
        let hop = upcast_fn(move |any: &dyn Any| any.downcast_ref::<C>().map(|c| project(c) as &dyn Any));
        self.parents
            .write()
            .entry(TypeKey::of::<C>())
            .or_default()
            .push((TypeKey::of::<P>(), hop));
        self.invalidate();
    }

    /// Declare that `C` can be viewed as `S`.
    pub fn implements<C, S, F>(&self, project: F)
    where
        C: Any,
        S: ?Sized + 'static,
        F: Fn(&C) -> &S + Send + Sync + 'static,
    {
        let view = view_fn::<S, _>(move |any: &dyn Any| any.downcast_ref::<C>().map(|c| project(c)));
        self.add_view(TypeKey::of::<C>(), TypeKey::of::<S>(), Arc::new(view));
    }

    /// Declare the identity view `S -> S` (idempotent).
    pub fn identity<S: Any>(&self) {
        let key = TypeKey::of::<S>();
        let exists = self
            .views
            .read()
            .get(&key)
            .map(|views| views.iter().any(|(target, _)| *target == key))
            .unwrap_or(false);
        if !exists {
            let view = view_fn::<S, _>(|any: &dyn Any| any.downcast_ref::<S>());
            self.add_view(key, key, Arc::new(view));
        }
    }

    fn add_view(&self, from: TypeKey, to: TypeKey, view: Arc<dyn Any + Send + Sync>) {
        {
            let mut views = self.views.write();
            let entry = views.entry(from).or_default();
            if entry.iter().any(|(target, _)| *target == to) {
                return;
            }
            entry.push((to, view));
        }
        self.invalidate();
    }

    /// Drop every cached closure.
    pub fn invalidate(&self) {
        self.cache.write().clear();
    }

    /// Memoized supertype closure of `concrete`, always starting with itself.
    pub fn supertypes_of(&self, concrete: TypeKey) -> Arc<Vec<Supertype>> {
        if let Some(cached) = self.cache.read().get(&concrete) {
            return Arc::clone(cached);
        }
        let computed = Arc::new(self.compute(concrete));
        trace!(
            concrete = ?concrete,
            supertypes = computed.len(),
            "computed supertype closure"
        );
        self.cache
            .write()
            .entry(concrete)
            .or_insert_with(|| Arc::clone(&computed));
        computed
    }

    fn compute(&self, concrete: TypeKey) -> Vec<Supertype> {
        let parents = self.parents.read();
        let views = self.views.read();

        let mut result: Vec<Supertype> = Vec::new();
        let mut seen_views: HashSet<TypeKey> = HashSet::new();
        let mut visited: HashSet<TypeKey> = HashSet::new();
        let mut queue: VecDeque<(TypeKey, Vec<Upcast>)> = VecDeque::new();
        queue.push_back((concrete, Vec::new()));
        visited.insert(concrete);

        // The concrete type is always part of its closure, even without a view.
        let own_view = views
            .get(&concrete)
            .and_then(|vs| vs.iter().find(|(target, _)| *target == concrete))
            .map(|(_, view)| Arc::clone(view));
        result.push(Supertype {
            key: concrete,
            route: Route {
                hops: Vec::new(),
                view: own_view,
            },
        });
        seen_views.insert(concrete);

        while let Some((current, hops)) = queue.pop_front() {
            for (target, view) in views.get(&current).into_iter().flatten() {
                if seen_views.insert(*target) {
                    result.push(Supertype {
                        key: *target,
                        route: Route {
                            hops: hops.clone(),
                            view: Some(Arc::clone(view)),
                        },
                    });
                }
            }
            for (parent, hop) in parents.get(&current).into_iter().flatten() {
                if visited.insert(*parent) {
                    let mut next = hops.clone();
                    next.push(Arc::clone(hop));
                    queue.push_back((*parent, next));
                }
            }
        }
        result
    }
}

impl fmt::Debug for SupertypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupertypeResolver")
            .field("parents", &self.parents.read().len())
            .field("views", &self.views.read().len())
            .field("cached", &self.cache.read().len())
            .finish()
    }
}
