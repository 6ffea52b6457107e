//! Type-erased identifiers.
//!
//! Identifiers produced by extractors can be any hashable Rust value. A
//! [`Key`] erases the concrete type while keeping `Eq` and `Hash` meaningful:
//! two keys are equal only when they wrap the same concrete type and the
//! wrapped values compare equal, so `1i32` and `1i64` are distinct ids.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Bounds every typed identifier satisfies.
pub trait KeyType: Hash + Eq + fmt::Debug + Send + Sync + 'static {}

impl<K> KeyType for K where K: Hash + Eq + fmt::Debug + Send + Sync + 'static {}

trait DynKey: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn DynKey) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<K: KeyType> DynKey for K {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynKey) -> bool {
        other
            .as_any()
            .downcast_ref::<K>()
            .map(|other| self == other)
            .unwrap_or(false)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }

    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Opaque identifier of an entity within a namespace.
#[derive(Clone)]
pub struct Key(Arc<dyn DynKey>);

impl Key {
    /// Wrap a typed identifier.
    pub fn new<K: KeyType>(id: K) -> Self {
        Key(Arc::new(id))
    }

    /// Borrow the typed identifier if it is a `K`.
    pub fn downcast_ref<K: 'static>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }

    /// Whether the wrapped identifier is a `K`.
    pub fn is<K: 'static>(&self) -> bool {
        self.0.as_any().is::<K>()
    }

    /// `TypeId` of the wrapped identifier.
    pub fn key_type(&self) -> TypeId {
        self.0.as_any().type_id()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.dyn_eq(&*other.0)
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_type().hash(state);
        self.0.dyn_hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.dyn_fmt(f)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.dyn_fmt(f)
    }
}

macro_rules! key_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Key {
                fn from(id: $ty) -> Self {
                    Key::new(id)
                }
            }
        )*
    };
}

key_from!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, usize, isize, bool, char, String);

impl From<&'static str> for Key {
    fn from(id: &'static str) -> Self {
        Key::new(id)
    }
}
