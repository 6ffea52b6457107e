//! Lazy namespaces: declarations and single-flight materialization slots.
//!
//! A lazy namespace is computed on first read by handing the ids of its
//! source namespace to a builder. The result is memoized in a [`LazySlot`]
//! until the store invalidates it.
//!
//! Slot states: Absent -> Materializing(owner thread) -> Present. The
//! computation runs with no lock held, so a builder may read other
//! namespaces freely; reading its own target from the owning thread fails
//! fast with `ReentrantLazy` instead of deadlocking. A builder that fails
//! or panics leaves the slot Absent and wakes every waiter.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use anyhow::Result;
use model_builder_types::{BuildError, Key, Namespace, Value};
use parking_lot::{Condvar, Mutex};

use crate::context::BuildContext;
use crate::data::NamespaceData;

/// Erased lazy builder: `(context, source ids) -> entries`.
pub type LazyFn =
    Arc<dyn Fn(&dyn BuildContext, &[Key]) -> Result<Vec<(Key, Value)>> + Send + Sync>;

/// Declaration of a lazy namespace.
#[derive(Clone)]
pub struct LazyDecl {
    source: Namespace,
    target: Namespace,
    context_type: TypeId,
    context_name: &'static str,
    build: LazyFn,
}

impl LazyDecl {
    /// Declare `target` as computed from the ids of `source` by `build`.
    ///
    /// `build` receives the reading context as `&B`; reading through a
    /// context of another type fails with `BuildError::ContextMismatch`.
    pub fn new<B, F>(source: Namespace, target: Namespace, build: F) -> Self
    where
        B: BuildContext,
        F: Fn(&B, &[Key]) -> Result<Vec<(Key, Value)>> + Send + Sync + 'static,
    {
        let namespace = target.clone();
        let erased: LazyFn = Arc::new(move |ctx: &dyn BuildContext, ids: &[Key]| {
            let typed = ctx.as_any().downcast_ref::<B>().ok_or_else(|| {
                BuildError::ContextMismatch {
                    namespace: namespace.clone(),
                    expected: std::any::type_name::<B>(),
                    found: ctx.context_name(),
                }
            })?;
            build(typed, ids)
        });
        Self {
            source,
            target,
            context_type: TypeId::of::<B>(),
            context_name: std::any::type_name::<B>(),
            build: erased,
        }
    }

    /// Namespace whose ids feed the builder.
    pub fn source(&self) -> &Namespace {
        &self.source
    }

    /// Namespace the builder populates.
    pub fn target(&self) -> &Namespace {
        &self.target
    }

    /// `TypeId` of the context type the builder expects.
    pub fn context_type(&self) -> TypeId {
        self.context_type
    }

    /// Type name of the context type the builder expects.
    pub fn context_name(&self) -> &'static str {
        self.context_name
    }

    pub(crate) fn run(&self, ctx: &dyn BuildContext, ids: &[Key]) -> Result<Vec<(Key, Value)>> {
        (self.build)(ctx, ids)
    }
}

impl fmt::Debug for LazyDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyDecl")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("context", &self.context_name)
            .finish()
    }
}

enum SlotState {
    Absent,
    Materializing(ThreadId),
    Present(Arc<NamespaceData>),
}

enum Claim {
    Wait,
    Compute,
}

/// Resets a claimed slot to Absent unless disarmed, so an unwinding
/// builder does not leave it Materializing.
struct Claimed<'a> {
    slot: &'a LazySlot,
    armed: bool,
}

impl Drop for Claimed<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.slot.state.lock() = SlotState::Absent;
            self.slot.ready.notify_all();
        }
    }
}

/// Memo cell of one lazy namespace.
pub(crate) struct LazySlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl LazySlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Absent),
            ready: Condvar::new(),
        }
    }

    /// Whether a memoized result is present.
    pub(crate) fn is_present(&self) -> bool {
        matches!(*self.state.lock(), SlotState::Present(_))
    }

    /// Return the memoized mapping, computing it with `compute` if absent.
    ///
    /// At most one thread runs `compute` at a time; others wait for its
    /// outcome. A failed or panicking computation resets the slot to Absent.
    pub(crate) fn get_or_compute<F>(&self, namespace: &Namespace, compute: F) -> Result<Arc<NamespaceData>>
    where
        F: FnOnce() -> Result<NamespaceData>,
    {
        let me = thread::current().id();
        {
            let mut state = self.state.lock();
            loop {
                let claim = match &*state {
                    SlotState::Present(data) => return Ok(Arc::clone(data)),
                    SlotState::Materializing(owner) if *owner == me => {
                        return Err(BuildError::ReentrantLazy {
                            namespace: namespace.clone(),
                        }
                        .into());
                    }
                    SlotState::Materializing(_) => Claim::Wait,
                    SlotState::Absent => Claim::Compute,
                };
                match claim {
                    Claim::Wait => self.ready.wait(&mut state),
                    Claim::Compute => {
                        *state = SlotState::Materializing(me);
                        break;
                    }
                }
            }
        }

        let mut claimed = Claimed { slot: self, armed: true };
        let outcome = compute();
        claimed.armed = false;

        let mut state = self.state.lock();
        let result = match outcome {
            Ok(data) => {
                let data = Arc::new(data);
                *state = SlotState::Present(Arc::clone(&data));
                Ok(data)
            }
            Err(err) => {
                *state = SlotState::Absent;
                Err(err)
            }
        };
        self.ready.notify_all();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_computes_once() {
        let slot = LazySlot::new();
        let calls = AtomicUsize::new(0);
        let ns = Namespace::from("isFans");
        for _ in 0..3 {
            let data = slot
                .get_or_compute(&ns, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(NamespaceData::from_entries([(Key::from(1i32), Value::new(true))]))
                })
                .unwrap();
            assert_eq!(data.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(slot.is_present());
    }

    #[test]
    fn test_failure_resets_to_absent() {
        let slot = LazySlot::new();
        let ns = Namespace::from("isFans");
        let err = slot
            .get_or_compute(&ns, || Err(anyhow::anyhow!("backend down")))
            .unwrap_err();
        assert!(err.to_string().contains("backend down"));
        assert!(!slot.is_present());
        let data = slot.get_or_compute(&ns, || Ok(NamespaceData::new())).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_panic_resets_slot_for_other_threads() {
        let slot = LazySlot::new();
        let ns = Namespace::from("isFans");
        let (started_tx, started_rx) = std::sync::mpsc::channel();

        let (first, second) = std::thread::scope(|scope| {
            let first = scope.spawn(|| {
                slot.get_or_compute(&ns, || {
                    started_tx.send(()).unwrap();
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    panic!("lazy builder exploded");
                })
                .map(|_| ())
            });
            // Claimed by the first thread: this reader waits, then retries.
            started_rx.recv().unwrap();
            let second = scope.spawn(|| {
                slot.get_or_compute(&ns, || {
                    Ok(NamespaceData::from_entries([(Key::from(1i32), Value::new(true))]))
                })
                .map(|data| data.len())
            });
            (first.join(), second.join())
        });

        assert!(first.is_err());
        assert_eq!(second.unwrap().unwrap(), 1);
        assert!(slot.is_present());
    }

    #[test]
    fn test_owner_retries_after_caught_panic() {
        let slot = LazySlot::new();
        let ns = Namespace::from("isFans");
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            slot.get_or_compute(&ns, || panic!("lazy builder exploded"))
        }));
        assert!(caught.is_err());
        assert!(!slot.is_present());

        // Not reported as a reentrant read.
        let data = slot.get_or_compute(&ns, || Ok(NamespaceData::new())).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_reentrant_read_fails_fast() {
        let slot = LazySlot::new();
        let ns = Namespace::from("self_ref");
        let err = slot
            .get_or_compute(&ns, || {
                slot.get_or_compute(&ns, || Ok(NamespaceData::new()))?;
                Ok(NamespaceData::new())
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::ReentrantLazy { .. })
        ));
    }

    #[test]
    fn test_concurrent_first_access_computes_once() {
        let slot = Arc::new(LazySlot::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    let ns = Namespace::from("isFans");
                    slot.get_or_compute(&ns, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok(NamespaceData::new())
                    })
                    .map(|_| ())
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
