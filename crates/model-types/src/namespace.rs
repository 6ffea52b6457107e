//! Namespaces partition the id/value space of a build context.
//!
//! A namespace is either a type token (`Namespace::of::<User>()`) or a
//! caller-chosen name (`Namespace::from("isFollowing")`). The engine never
//! looks inside a namespace; it only hashes and compares it.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Logical category of identifiers and values.
#[derive(Clone)]
pub enum Namespace {
    /// Namespace named after a Rust type. Compared by `TypeId` only.
    Type { id: TypeId, name: &'static str },
    /// Free-form namespace, e.g. a derived attribute like `"isFollowing"`.
    Named(Cow<'static, str>),
}

impl Namespace {
    /// Type-token namespace for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Namespace::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Named namespace.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Namespace::Named(name.into())
    }

    /// Whether this namespace is the type token for `T`.
    pub fn is_type<T: ?Sized + 'static>(&self) -> bool {
        matches!(self, Namespace::Type { id, .. } if *id == TypeId::of::<T>())
    }

    /// Short human-readable label (last path segment for type tokens).
    pub fn label(&self) -> &str {
        match self {
            Namespace::Type { name, .. } => short_type_name(name),
            Namespace::Named(name) => name,
        }
    }
}

/// Strip the module path from a type name, keeping generic arguments intact.
pub fn short_type_name(full: &str) -> &str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Namespace::Type { id: a, .. }, Namespace::Type { id: b, .. }) => a == b,
            (Namespace::Named(a), Namespace::Named(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Namespace {}

impl Hash for Namespace {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Namespace::Type { id, .. } => {
                0u8.hash(state);
                id.hash(state);
            }
            Namespace::Named(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Type { name, .. } => write!(f, "Type({})", short_type_name(name)),
            Namespace::Named(name) => write!(f, "Named({:?})", name),
        }
    }
}

impl From<&'static str> for Namespace {
    fn from(name: &'static str) -> Self {
        Namespace::Named(Cow::Borrowed(name))
    }
}

impl From<String> for Namespace {
    fn from(name: String) -> Self {
        Namespace::Named(Cow::Owned(name))
    }
}

impl From<&Namespace> for Namespace {
    fn from(ns: &Namespace) -> Self {
        ns.clone()
    }
}
