//! Detection of registrations made after a builder started resolving.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

/// Callback invoked for every late registration.
pub type ConflictHook = Arc<dyn Fn() + Send + Sync>;

/// Frozen flag plus optional hook.
///
/// A late registration is reported, never refused.
#[derive(Default)]
pub struct ConflictGuard {
    frozen: AtomicBool,
    hook: RwLock<Option<ConflictHook>>,
}

impl ConflictGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the registry as in use. Returns `true` on the first call.
    pub fn freeze(&self) -> bool {
        !self.frozen.swap(true, Ordering::AcqRel)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn set_hook(&self, hook: ConflictHook) {
        *self.hook.write() = Some(hook);
    }

    /// Report `registration` if frozen. Returns whether it was a conflict.
    pub fn check(&self, registration: &str) -> bool {
        if !self.is_frozen() {
            return false;
        }
        warn!(
            registration = registration,
            "registration after first resolve on a shared model builder"
        );
        let hook = self.hook.read().clone();
        if let Some(hook) = hook {
            hook();
        }
        true
    }
}

impl fmt::Debug for ConflictGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictGuard")
            .field("frozen", &self.is_frozen())
            .field("hook", &self.hook.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_no_conflict_before_freeze() {
        let guard = ConflictGuard::new();
        assert!(!guard.check("on::<User>"));
        assert!(guard.freeze());
        assert!(!guard.freeze());
        assert!(guard.is_frozen());
    }

    #[test]
    fn test_hook_called_for_each_late_registration() {
        let guard = ConflictGuard::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        guard.set_hook(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        guard.freeze();
        assert!(guard.check("build"));
        assert!(guard.check("lazy"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
