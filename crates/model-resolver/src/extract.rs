//! Id and value extractors.
//!
//! An extractor is registered against a source type `S` (a concrete type or
//! a declared view such as `dyn HasUser`) and a target namespace. At
//! dispatch time the registry hands it the object already projected along
//! the [`Route`](crate::supertypes::Route) for `S`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use model_builder_types::{Key, KeyType, Namespace, Value};
use tracing::warn;

use crate::supertypes::{Route, TypeKey, View};

/// What a value extractor found on one object.
#[derive(Clone, Default)]
pub enum Extracted {
    /// Nothing to contribute.
    #[default]
    Nothing,
    /// Entries already keyed by id.
    Mapping(Vec<(Key, Value)>),
    /// A single raw value; needs an id function.
    One(Value),
    /// Several raw values; needs an id function.
    Many(Vec<Value>),
}

impl Extracted {
    /// Keyed entries from typed pairs.
    pub fn mapping<K, V, I>(entries: I) -> Self
    where
        K: KeyType,
        V: Any + Send + Sync,
        I: IntoIterator<Item = (K, V)>,
    {
        Extracted::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (Key::new(k), Value::new(v)))
                .collect(),
        )
    }

    /// One raw value.
    pub fn one<V: Any + Send + Sync>(value: V) -> Self {
        Extracted::One(Value::new(value))
    }

    /// Several raw values.
    pub fn many<V, I>(values: I) -> Self
    where
        V: Any + Send + Sync,
        I: IntoIterator<Item = V>,
    {
        Extracted::Many(values.into_iter().map(Value::new).collect())
    }
}

impl From<Option<Value>> for Extracted {
    fn from(value: Option<Value>) -> Self {
        value.map(Extracted::One).unwrap_or_default()
    }
}

impl From<Value> for Extracted {
    fn from(value: Value) -> Self {
        Extracted::One(value)
    }
}

impl<K: KeyType, V: Any + Send + Sync> From<HashMap<K, V>> for Extracted {
    fn from(map: HashMap<K, V>) -> Self {
        Extracted::mapping(map)
    }
}

/// Computes the id of a raw extracted value.
pub type IdOf = Arc<dyn Fn(&Value) -> Option<Key> + Send + Sync>;

type IdFn = Arc<dyn Fn(&dyn Any, &(dyn Any + Send + Sync)) -> Option<Vec<Key>> + Send + Sync>;

type ValueFn =
    Arc<dyn Fn(&Value, &dyn Any, &(dyn Any + Send + Sync)) -> Option<Extracted> + Send + Sync>;

/// Build an [`IdOf`] from a typed function over the raw value.
pub fn id_of<V, K, F>(f: F) -> IdOf
where
    V: Any + Send + Sync,
    K: KeyType,
    F: Fn(&V) -> K + Send + Sync + 'static,
{
    Arc::new(move |value: &Value| value.downcast_ref::<V>().map(|v| Key::new(f(v))))
}

/// Produces ids for objects of one source type.
pub struct IdExtractor {
    source: TypeKey,
    target: Namespace,
    func: IdFn,
}

impl IdExtractor {
    /// Extractor from `&S` to a collection of ids in `target`.
    pub fn new<S, K, I, F>(target: Namespace, f: F) -> Self
    where
        S: ?Sized + 'static,
        K: KeyType,
        I: IntoIterator<Item = K>,
        F: Fn(&S) -> I + Send + Sync + 'static,
    {
        let func: IdFn = Arc::new(move |object: &dyn Any, view: &(dyn Any + Send + Sync)| {
            let view = view.downcast_ref::<View<S>>()?;
            let source = (view.0)(object)?;
            Some(f(source).into_iter().map(Key::new).collect())
        });
        Self {
            source: TypeKey::of::<S>(),
            target,
            func,
        }
    }

    pub fn source(&self) -> TypeKey {
        self.source
    }

    pub fn target(&self) -> &Namespace {
        &self.target
    }

    /// Ids of `object` reached along `route`.
    pub fn extract(&self, object: &dyn Any, route: &Route) -> Vec<Key> {
        let found = route
            .project(object)
            .zip(route.view())
            .and_then(|(projected, view)| (self.func)(projected, view));
        match found {
            Some(ids) => ids,
            None => {
                warn!(
                    source = ?self.source,
                    target = %self.target,
                    "id extractor could not project object"
                );
                Vec::new()
            }
        }
    }
}

impl fmt::Debug for IdExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdExtractor")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

/// Produces already-built (id, value) entries for objects of one source type.
pub struct ValueExtractor {
    source: TypeKey,
    target: Namespace,
    func: ValueFn,
    id_of: Option<IdOf>,
}

impl ValueExtractor {
    /// Extractor from `&S` to an [`Extracted`] result for `target`.
    pub fn new<S, R, F>(target: Namespace, f: F) -> Self
    where
        S: ?Sized + 'static,
        R: Into<Extracted>,
        F: Fn(&S) -> R + Send + Sync + 'static,
    {
        let func: ValueFn = Arc::new(
            move |_origin: &Value, object: &dyn Any, view: &(dyn Any + Send + Sync)| {
                let view = view.downcast_ref::<View<S>>()?;
                let source = (view.0)(object)?;
                Some(f(source).into())
            },
        );
        Self {
            source: TypeKey::of::<S>(),
            target,
            func,
            id_of: None,
        }
    }

    /// Extractor that contributes the source object itself under `id(&S)`.
    pub fn itself<S, K, F>(target: Namespace, id: F) -> Self
    where
        S: Any + Send + Sync,
        K: KeyType,
        F: Fn(&S) -> K + Send + Sync + 'static,
    {
        let func: ValueFn = Arc::new(
            move |origin: &Value, object: &dyn Any, view: &(dyn Any + Send + Sync)| {
                let view = view.downcast_ref::<View<S>>()?;
                let source = (view.0)(object)?;
                Some(Extracted::Mapping(vec![(Key::new(id(source)), origin.clone())]))
            },
        );
        Self {
            source: TypeKey::of::<S>(),
            target,
            func,
            id_of: None,
        }
    }

    /// Attach the id function used for raw `One`/`Many` results.
    pub fn with_id_of(mut self, id_of: IdOf) -> Self {
        self.id_of = Some(id_of);
        self
    }

    pub fn source(&self) -> TypeKey {
        self.source
    }

    pub fn target(&self) -> &Namespace {
        &self.target
    }

    pub fn has_id_of(&self) -> bool {
        self.id_of.is_some()
    }

    /// Entries contributed by `origin` reached along `route`.
    pub fn extract(&self, origin: &Value, route: &Route) -> Vec<(Key, Value)> {
        let found = route
            .project(origin.as_any())
            .zip(route.view())
            .and_then(|(projected, view)| (self.func)(origin, projected, view));
        let Some(extracted) = found else {
            warn!(
                source = ?self.source,
                target = %self.target,
                object = origin.type_name(),
                "value extractor could not project object"
            );
            return Vec::new();
        };
        match extracted {
            Extracted::Nothing => Vec::new(),
            Extracted::Mapping(entries) => entries,
            Extracted::One(value) => self.key_all(vec![value]),
            Extracted::Many(values) => self.key_all(values),
        }
    }

    fn key_all(&self, values: Vec<Value>) -> Vec<(Key, Value)> {
        let Some(id_of) = &self.id_of else {
            warn!(
                source = ?self.source,
                target = %self.target,
                count = values.len(),
                "value extractor returned raw values without an id function; dropping them"
            );
            return Vec::new();
        };
        values
            .into_iter()
            .filter_map(|value| match id_of(&value) {
                Some(key) => Some((key, value)),
                None => {
                    warn!(
                        target = %self.target,
                        value = ?value,
                        "id function does not accept extracted value; skipping"
                    );
                    None
                }
            })
            .collect()
    }
}

impl fmt::Debug for ValueExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueExtractor")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("id_of", &self.id_of.is_some())
            .finish()
    }
}
