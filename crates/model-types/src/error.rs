//! Engine-level error taxonomy.
//!
//! | Kind | Variant | Policy |
//! |------|---------|--------|
//! | Configuration | `UndeclaredLazy` | fatal to the call |
//! | Configuration | `ReentrantLazy` | fatal to the call |
//! | Merge mismatch | `ContextMismatch` | fatal to the call |
//! | Loop guard | `RoundLimitExceeded` | fatal to the call, earlier rounds stay merged |
//!
//! Extraction problems (a raw value without `idOf`, an id of the wrong type)
//! are not errors: they are logged and the single extraction yields nothing.
//! Builder failures are the builder's own `anyhow::Error`, propagated as is.
//!
//! Public functions return `anyhow::Result`; callers can recover the variant
//! with `err.downcast_ref::<BuildError>()`.

use std::fmt;

use crate::namespace::Namespace;

/// Failures raised by the engine itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// `lazy_data` was called for a namespace without a lazy declaration.
    UndeclaredLazy { namespace: Namespace },
    /// A lazy builder read its own target namespace while computing it.
    ReentrantLazy { namespace: Namespace },
    /// A lazy declaration bound to one context type met a different one.
    ContextMismatch {
        namespace: Namespace,
        expected: &'static str,
        found: &'static str,
    },
    /// The resolution loop ran more rounds than configured.
    RoundLimitExceeded { limit: usize, pending: usize },
}

impl BuildError {
    /// Namespace the error is about, if any.
    pub fn namespace(&self) -> Option<&Namespace> {
        match self {
            BuildError::UndeclaredLazy { namespace }
            | BuildError::ReentrantLazy { namespace }
            | BuildError::ContextMismatch { namespace, .. } => Some(namespace),
            BuildError::RoundLimitExceeded { .. } => None,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::UndeclaredLazy { namespace } => {
                write!(f, "UNDECLARED_LAZY: no lazy builder declared for namespace {}", namespace)
            }
            BuildError::ReentrantLazy { namespace } => write!(
                f,
                "REENTRANT_LAZY: lazy builder for {} read its own namespace while materializing",
                namespace
            ),
            BuildError::ContextMismatch {
                namespace,
                expected,
                found,
            } => write!(
                f,
                "CONTEXT_MISMATCH: lazy namespace {} is bound to context {}, got {}",
                namespace, expected, found
            ),
            BuildError::RoundLimitExceeded { limit, pending } => write!(
                f,
                "ROUND_LIMIT_EXCEEDED: resolution did not reach a fixpoint within {} rounds ({} objects pending)",
                limit, pending
            ),
        }
    }
}

impl std::error::Error for BuildError {}
