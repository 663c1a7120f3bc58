//! Handles for removing registered hooks.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use crate::registry::{HookEntry, HookId, RegistryShared};
use crate::target::MethodTarget;

/// Removes one registered hook.
///
/// Unhooking is idempotent: the first call removes the hook, later calls
/// (through this handle or any clone of it) do nothing. Dispatches that
/// already took a snapshot of the chain still run the hook once.
///
/// The handle does not keep the registry alive. Dropping a handle does not
/// unhook; use [`into_guard`](Self::into_guard) for scoped hooks.
#[derive(Clone)]
pub struct UnhookHandle {
    entry: Arc<HookEntry>,
    registry: Weak<RegistryShared>,
}

impl UnhookHandle {
    pub(crate) fn new(entry: Arc<HookEntry>, registry: Weak<RegistryShared>) -> Self {
        Self { entry, registry }
    }

    /// Returns the hook's unique ID.
    #[must_use]
    pub fn id(&self) -> &HookId {
        &self.entry.id
    }

    /// Returns the hooked member.
    #[must_use]
    pub fn target(&self) -> &MethodTarget {
        &self.entry.target
    }

    /// Returns the registration sequence number. Lower numbers registered
    /// earlier.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.entry.sequence
    }

    /// Returns `true` until the hook has been removed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.entry.active.load(Ordering::SeqCst)
    }

    /// Removes the hook. Returns `true` if this call removed it.
    pub fn unhook(&self) -> bool {
        match self.registry.upgrade() {
            Some(shared) => shared.detach(&self.entry),
            None => {
                self.entry.active.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Wraps the handle so the hook is removed when the guard is dropped.
    #[must_use = "dropping the guard immediately removes the hook"]
    pub fn into_guard(self) -> UnhookGuard {
        UnhookGuard { handle: Some(self) }
    }
}

impl PartialEq for UnhookHandle {
    fn eq(&self, other: &Self) -> bool {
        self.entry.id == other.entry.id
    }
}

impl Eq for UnhookHandle {}

impl Hash for UnhookHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entry.id.hash(state);
    }
}

impl fmt::Debug for UnhookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnhookHandle")
            .field("id", &self.entry.id)
            .field("target", &self.entry.target)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Scoped hook: unhooks when dropped.
#[derive(Debug)]
pub struct UnhookGuard {
    handle: Option<UnhookHandle>,
}

impl UnhookGuard {
    /// Returns the wrapped handle.
    #[must_use]
    pub fn handle(&self) -> Option<&UnhookHandle> {
        self.handle.as_ref()
    }

    /// Disarms the guard and returns the handle. The hook stays registered.
    #[must_use]
    pub fn release(mut self) -> Option<UnhookHandle> {
        self.handle.take()
    }
}

impl Drop for UnhookGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.unhook();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::backend::ManualBackend;
    use crate::callback::nop;
    use crate::registry::HookRegistry;
    use crate::resolve::{ResolveError, Resolver};
    use crate::target::{MethodTarget, Signature, TypeRef};

    struct AnyTarget;

    impl Resolver for AnyTarget {
        fn declared_members(&self, _owner: &TypeRef) -> Result<Vec<MethodTarget>, ResolveError> {
            Ok(Vec::new())
        }

        fn find_exact(
            &self,
            owner: &TypeRef,
            name: &str,
            params: &Signature,
        ) -> Result<MethodTarget, ResolveError> {
            Ok(MethodTarget::method(owner.clone(), name, params.clone()))
        }

        fn find_best_match(
            &self,
            owner: &TypeRef,
            name: &str,
            _arg_types: &[Option<TypeRef>],
        ) -> Result<MethodTarget, ResolveError> {
            Ok(MethodTarget::method(owner.clone(), name, Signature::empty()))
        }

        fn find_constructor(
            &self,
            owner: &TypeRef,
            params: &Signature,
        ) -> Result<MethodTarget, ResolveError> {
            Ok(MethodTarget::constructor(owner.clone(), params.clone()))
        }
    }

    fn target() -> MethodTarget {
        MethodTarget::method("demo.Foo", "run", Signature::empty())
    }

    #[test]
    fn guard_unhooks_on_drop() {
        let backend = Arc::new(ManualBackend::new());
        let registry = HookRegistry::new(Arc::new(AnyTarget), Arc::clone(&backend));

        {
            let _guard = registry
                .register_on_resolved(&target(), nop())
                .unwrap()
                .into_guard();
            assert!(registry.is_hooked(&target()));
        }
        assert!(!registry.is_hooked(&target()));
        assert_eq!(backend.uninstall_count(), 1);
    }

    #[test]
    fn released_guard_keeps_hook() {
        let registry = HookRegistry::new(Arc::new(AnyTarget), Arc::new(ManualBackend::new()));
        let guard = registry
            .register_on_resolved(&target(), nop())
            .unwrap()
            .into_guard();

        let handle = guard.release().unwrap();
        assert!(registry.is_hooked(&target()));
        assert!(handle.is_active());
    }

    #[test]
    fn unhook_after_registry_drop_is_noop() {
        let registry = HookRegistry::new(Arc::new(AnyTarget), Arc::new(ManualBackend::new()));
        let handle = registry.register_on_resolved(&target(), nop()).unwrap();
        drop(registry);

        assert!(!handle.is_active());
        assert!(!handle.unhook());
    }

    #[test]
    fn handles_compare_by_identity() {
        let registry = HookRegistry::new(Arc::new(AnyTarget), Arc::new(ManualBackend::new()));
        let first = registry.register_on_resolved(&target(), nop()).unwrap();
        let second = registry.register_on_resolved(&target(), nop()).unwrap();

        assert_eq!(first, first.clone());
        assert_ne!(first, second);
        assert!(first.sequence() < second.sequence());

        let set: HashSet<_> = [first.clone(), second, first].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
