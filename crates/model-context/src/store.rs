//! Namespaced store backing every build context.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ContextStore                          │
//! │  ┌──────────────────┐ ┌─────────────────┐ ┌───────────────┐  │
//! │  │ namespaces       │ │ lazies          │ │ slots         │  │
//! │  │ ns -> Namespace- │ │ target ->       │ │ target ->     │  │
//! │  │        Data      │ │   LazyDecl      │ │   LazySlot    │  │
//! │  └──────────────────┘ └─────────────────┘ └───────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A namespace with a lazy declaration is always served from its slot;
//! every other namespace is created empty on first access. Locks on the
//! outer maps are only held to look up or insert an `Arc`, never while a
//! builder runs.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use model_builder_types::{BuildError, Key, Namespace, Value};
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::context::BuildContext;
use crate::data::NamespaceData;
use crate::lazy::{LazyDecl, LazySlot};
use crate::metrics::StoreMetrics;

/// Namespace -> (id -> value) storage with lazy namespaces and merge.
#[derive(Default)]
pub struct ContextStore {
    namespaces: RwLock<HashMap<Namespace, Arc<NamespaceData>>>,
    lazies: RwLock<HashMap<Namespace, Arc<LazyDecl>>>,
    slots: RwLock<HashMap<Namespace, Arc<LazySlot>>>,
    metrics: StoreMetrics,
}

/// Copy of one concrete namespace taken while merging.
struct NamespaceSnapshot {
    namespace: Namespace,
    entries: HashMap<Key, Value>,
    requested: Vec<Key>,
}

impl ContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Reads ====================

    /// Live mapping for `namespace`.
    ///
    /// Lazy namespaces are materialized on first read (passing `host` to the
    /// builder) and memoized; other namespaces are created empty on demand.
    pub fn data(&self, host: &dyn BuildContext, namespace: &Namespace) -> Result<Arc<NamespaceData>> {
        match self.lazy_decl(namespace) {
            Some(decl) => self.materialize(host, &decl),
            None => Ok(self.concrete(namespace)),
        }
    }

    /// Live mapping for a namespace that must be lazy.
    pub fn lazy_data(&self, host: &dyn BuildContext, namespace: &Namespace) -> Result<Arc<NamespaceData>> {
        let decl = self.lazy_decl(namespace).ok_or_else(|| BuildError::UndeclaredLazy {
            namespace: namespace.clone(),
        })?;
        self.materialize(host, &decl)
    }

    /// Whether `namespace` has a lazy declaration.
    pub fn is_lazy(&self, namespace: &Namespace) -> bool {
        self.lazies.read().contains_key(namespace)
    }

    /// Whether the lazy namespace currently holds a memoized result.
    pub fn is_materialized(&self, namespace: &Namespace) -> bool {
        self.slots
            .read()
            .get(namespace)
            .map(|slot| slot.is_present())
            .unwrap_or(false)
    }

    /// Concrete (non-lazy) namespaces created so far.
    pub fn namespaces(&self) -> Vec<Namespace> {
        self.namespaces.read().keys().cloned().collect()
    }

    /// Targets of every lazy declaration.
    pub fn lazy_namespaces(&self) -> Vec<Namespace> {
        self.lazies.read().keys().cloned().collect()
    }

    /// Store-level counters.
    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    // ==================== Writes ====================

    /// Insert every absent entry into `namespace`, returning the new values.
    ///
    /// Memoized lazy namespaces sourced from `namespace` keep their value.
    pub fn extend(
        &self,
        host: &dyn BuildContext,
        namespace: &Namespace,
        entries: impl IntoIterator<Item = (Key, Value)>,
    ) -> Result<Vec<Value>> {
        Ok(self.data(host, namespace)?.extend_new(entries))
    }

    /// Record that a builder was asked for `keys` in `namespace`.
    pub fn mark_requested(
        &self,
        host: &dyn BuildContext,
        namespace: &Namespace,
        keys: impl IntoIterator<Item = Key>,
    ) -> Result<()> {
        self.data(host, namespace)?.mark_requested(keys);
        Ok(())
    }

    /// Install a lazy declaration unless one exists for its target.
    ///
    /// Returns whether the declaration was installed.
    pub fn declare_lazy(&self, decl: LazyDecl) -> bool {
        let target = decl.target().clone();
        {
            let mut lazies = self.lazies.write();
            if lazies.contains_key(&target) {
                return false;
            }
            lazies.insert(target.clone(), Arc::new(decl));
        }
        self.invalidate(&target);
        true
    }

    // ==================== Merge ====================

    /// Merge `other` into this store.
    ///
    /// Concrete namespaces are unioned insert-if-absent (with their requested
    /// ledgers). Lazy declarations absent here are adopted, which resets any
    /// memo for their target and for lazies derived from it; no other memo
    /// is touched. `host_type`/`host_name` identify the context
    /// that owns this store; adopting a declaration bound to another context
    /// type fails before anything is written.
    pub fn merge(&self, other: &ContextStore, host_type: TypeId, host_name: &'static str) -> Result<()> {
        if std::ptr::eq(self, other) {
            return Ok(());
        }

        // Snapshot `other` first so no lock of ours is held while reading it.
        let foreign_lazies: Vec<Arc<LazyDecl>> = other.lazies.read().values().cloned().collect();
        let foreign_data: Vec<NamespaceSnapshot> = other
            .namespaces
            .read()
            .iter()
            .map(|(namespace, data)| NamespaceSnapshot {
                namespace: namespace.clone(),
                entries: data.snapshot(),
                requested: data.requested(),
            })
            .collect();

        let adopt: Vec<Arc<LazyDecl>> = {
            let lazies = self.lazies.read();
            foreign_lazies
                .into_iter()
                .filter(|decl| !lazies.contains_key(decl.target()))
                .collect()
        };
        if let Some(bad) = adopt.iter().find(|decl| decl.context_type() != host_type) {
            return Err(BuildError::ContextMismatch {
                namespace: bad.target().clone(),
                expected: host_name,
                found: bad.context_name(),
            })
            .context("merge rejected: incompatible lazy declaration");
        }

        for decl in adopt {
            let target = decl.target().clone();
            let adopted = {
                let mut lazies = self.lazies.write();
                if lazies.contains_key(&target) {
                    false
                } else {
                    lazies.insert(target.clone(), decl);
                    true
                }
            };
            if adopted {
                debug!(namespace = %target, "adopted lazy declaration from merged context");
                self.invalidate(&target);
            }
        }

        for snapshot in foreign_data {
            let data = self.concrete(&snapshot.namespace);
            let inserted = data.extend(snapshot.entries);
            data.mark_requested(snapshot.requested);
            trace!(namespace = %snapshot.namespace, inserted, "merged namespace");
        }

        self.metrics.record_merge();
        Ok(())
    }

    // ==================== Internals ====================

    fn concrete(&self, namespace: &Namespace) -> Arc<NamespaceData> {
        if let Some(data) = self.namespaces.read().get(namespace) {
            return Arc::clone(data);
        }
        let mut namespaces = self.namespaces.write();
        Arc::clone(
            namespaces
                .entry(namespace.clone())
                .or_insert_with(|| Arc::new(NamespaceData::new())),
        )
    }

    fn lazy_decl(&self, namespace: &Namespace) -> Option<Arc<LazyDecl>> {
        self.lazies.read().get(namespace).cloned()
    }

    fn slot(&self, namespace: &Namespace) -> Arc<LazySlot> {
        if let Some(slot) = self.slots.read().get(namespace) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(
            slots
                .entry(namespace.clone())
                .or_insert_with(|| Arc::new(LazySlot::new())),
        )
    }

    fn materialize(&self, host: &dyn BuildContext, decl: &LazyDecl) -> Result<Arc<NamespaceData>> {
        let slot = self.slot(decl.target());
        slot.get_or_compute(decl.target(), || {
            let ids = self.data(host, decl.source())?.keys();
            debug!(
                namespace = %decl.target(),
                source = %decl.source(),
                ids = ids.len(),
                "materializing lazy namespace"
            );
            let entries = decl
                .run(host, &ids)
                .with_context(|| format!("lazy builder for {} failed", decl.target()))?;
            self.metrics.record_lazy_computation();
            Ok(NamespaceData::from_entries(entries))
        })
    }

    /// Drop the memo of `namespace` and of every lazy namespace derived from it.
    fn invalidate(&self, namespace: &Namespace) {
        if self.slots.write().remove(namespace).is_some() {
            self.metrics.record_lazy_invalidation();
            trace!(namespace = %namespace, "invalidated lazy namespace");
        }
        self.invalidate_dependents(namespace);
    }

    fn invalidate_dependents(&self, namespace: &Namespace) {
        let mut visited = HashSet::new();
        let mut frontier = vec![namespace.clone()];
        while let Some(source) = frontier.pop() {
            let targets: Vec<Namespace> = self
                .lazies
                .read()
                .values()
                .filter(|decl| decl.source() == &source)
                .map(|decl| decl.target().clone())
                .collect();
            for target in targets {
                if !visited.insert(target.clone()) {
                    continue;
                }
                if self.slots.write().remove(&target).is_some() {
                    self.metrics.record_lazy_invalidation();
                    trace!(namespace = %target, source = %source, "invalidated dependent lazy namespace");
                }
                frontier.push(target);
            }
        }
    }
}

impl fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let namespaces: Vec<String> = self
            .namespaces
            .read()
            .iter()
            .map(|(ns, data)| format!("{}={}", ns, data.len()))
            .collect();
        let lazies: Vec<String> = self.lazies.read().keys().map(|ns| ns.to_string()).collect();
        f.debug_struct("ContextStore")
            .field("namespaces", &namespaces)
            .field("lazies", &lazies)
            .finish()
    }
}
