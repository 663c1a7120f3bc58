//! Shared fixtures for the engine integration tests.

#![allow(dead_code, reason = "not every test binary uses every fixture")]

use std::sync::Arc;

use interpose_engine::prelude::*;

/// Resolver over a fixed list of declared members.
pub struct TableResolver {
    members: Vec<MethodTarget>,
}

impl TableResolver {
    pub fn new(members: impl IntoIterator<Item = MethodTarget>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }
}

impl Resolver for TableResolver {
    fn declared_members(&self, owner: &TypeRef) -> Result<Vec<MethodTarget>, ResolveError> {
        let members: Vec<_> = self
            .members
            .iter()
            .filter(|target| target.owner() == owner)
            .cloned()
            .collect();
        if members.is_empty() {
            return Err(ResolveError::TypeNotFound(owner.clone()));
        }
        Ok(members)
    }

    fn find_exact(
        &self,
        owner: &TypeRef,
        name: &str,
        params: &Signature,
    ) -> Result<MethodTarget, ResolveError> {
        self.members
            .iter()
            .find(|t| t.owner() == owner && t.name() == Some(name) && t.signature() == params)
            .cloned()
            .ok_or_else(|| ResolveError::method_not_found(owner, name, params))
    }

    fn find_best_match(
        &self,
        owner: &TypeRef,
        name: &str,
        arg_types: &[Option<TypeRef>],
    ) -> Result<MethodTarget, ResolveError> {
        let params: Vec<TypeRef> = arg_types.iter().flatten().cloned().collect();
        self.find_exact(owner, name, &Signature::new(params))
    }

    fn find_constructor(
        &self,
        owner: &TypeRef,
        params: &Signature,
    ) -> Result<MethodTarget, ResolveError> {
        self.members
            .iter()
            .find(|t| t.owner() == owner && t.is_constructor() && t.signature() == params)
            .cloned()
            .ok_or_else(|| ResolveError::constructor_not_found(owner, params))
    }
}

/// Backend that fails the n-th install (0-based) and delegates otherwise.
pub struct FlakyBackend {
    inner: ManualBackend,
    fail_at: usize,
    attempts: core::sync::atomic::AtomicUsize,
}

impl FlakyBackend {
    pub fn failing_at(fail_at: usize) -> Self {
        Self {
            inner: ManualBackend::new(),
            fail_at,
            attempts: core::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &ManualBackend {
        &self.inner
    }
}

impl InstrumentationBackend for FlakyBackend {
    fn install_intercept(
        &self,
        target: &MethodTarget,
        dispatcher: Dispatcher,
    ) -> Result<BackendHandle, InstallError> {
        let attempt = self
            .attempts
            .fetch_add(1, core::sync::atomic::Ordering::SeqCst);
        if attempt == self.fail_at {
            return Err(InstallError::failed(target, "simulated failure"));
        }
        self.inner.install_intercept(target, dispatcher)
    }

    fn uninstall_intercept(&self, handle: BackendHandle) {
        self.inner.uninstall_intercept(handle);
    }
}

pub fn foo() -> TypeRef {
    TypeRef::named("demo.Foo")
}

pub fn bar_int() -> MethodTarget {
    MethodTarget::method(foo(), "bar", Signature::new([TypeRef::INT]))
}

pub fn bar_string() -> MethodTarget {
    MethodTarget::method(foo(), "bar", Signature::new([TypeRef::STRING]))
}

pub fn baz() -> MethodTarget {
    MethodTarget::method(foo(), "baz", Signature::empty())
}

pub fn foo_members() -> Vec<MethodTarget> {
    vec![
        bar_int(),
        bar_string(),
        baz(),
        MethodTarget::constructor(foo(), Signature::empty()),
    ]
}

pub fn registry() -> (HookRegistry, Arc<ManualBackend>) {
    let backend = Arc::new(ManualBackend::new());
    let registry = HookRegistry::new(
        Arc::new(TableResolver::new(foo_members())),
        Arc::clone(&backend),
    );
    (registry, backend)
}

/// Calls `target` through the installed dispatcher, or the body directly if
/// nothing is installed.
pub fn call(
    backend: &ManualBackend,
    target: &MethodTarget,
    receiver: Option<ObjectRef>,
    args: Vec<Value>,
    body: &dyn OriginalMethod,
) -> Result<Value, Throwable> {
    match backend.dispatcher(target) {
        Some(dispatcher) => dispatcher.dispatch(receiver, args, body),
        None => body.invoke(receiver.as_ref(), &args),
    }
}
