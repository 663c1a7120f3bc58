//! Hook registry and dispatch protocol.
//!
//! The [`HookRegistry`] owns every registered hook, grouped into one chain per
//! [`MethodTarget`], and runs those chains around intercepted calls.
//!
//! # Dispatch Protocol
//!
//! For each intercepted call:
//!
//! 1. The target's chain is snapshotted. Registration and unhooking on other
//!    threads never affect a dispatch that has already taken its snapshot.
//! 2. Every `before` phase runs, in ascending registration order. All of them
//!    run, even after one has settled the outcome.
//! 3. If the outcome is still pending, the original body runs and its return
//!    value or error becomes the outcome. Otherwise it is skipped.
//! 4. Every `after` phase runs, in descending registration order, so the most
//!    recently registered hook has the final say.
//! 5. The outcome is handed back to the backend.
//!
//! # Install Bookkeeping
//!
//! The backend intercept for a target is installed exactly once when its
//! first hook arrives and uninstalled exactly once when its last hook leaves.
//! A registration lock serialises these transitions; dispatch never takes it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use interpose_engine::backend::{ManualBackend, original_fn};
//! use interpose_engine::callback::before_fn;
//! use interpose_engine::registry::HookRegistry;
//! # use interpose_engine::resolve::{Resolver, ResolveError};
//! # use interpose_engine::target::{MethodTarget, Signature, TypeRef};
//! use interpose_engine::value::Value;
//!
//! # struct OneMethod(MethodTarget);
//! # impl Resolver for OneMethod {
//! #     fn declared_members(&self, _: &TypeRef) -> Result<Vec<MethodTarget>, ResolveError> {
//! #         Ok(vec![self.0.clone()])
//! #     }
//! #     fn find_exact(&self, o: &TypeRef, n: &str, p: &Signature) -> Result<MethodTarget, ResolveError> {
//! #         Ok(self.0.clone())
//! #     }
//! #     fn find_best_match(&self, o: &TypeRef, n: &str, _: &[Option<TypeRef>]) -> Result<MethodTarget, ResolveError> {
//! #         Ok(self.0.clone())
//! #     }
//! #     fn find_constructor(&self, o: &TypeRef, p: &Signature) -> Result<MethodTarget, ResolveError> {
//! #         Err(ResolveError::constructor_not_found(o, p))
//! #     }
//! # }
//! let target = MethodTarget::method("demo.Math", "square", Signature::new([TypeRef::INT]));
//! # let resolver = Arc::new(OneMethod(target.clone()));
//! let backend = Arc::new(ManualBackend::new());
//! let registry = HookRegistry::new(resolver, Arc::clone(&backend));
//!
//! let handle = registry
//!     .register_on_resolved(&target, before_fn(|ctx| {
//!         ctx.set_arg(0, 4);
//!     }))
//!     .expect("target exists");
//!
//! let square = original_fn(|_, args| {
//!     let n = args[0].as_int().unwrap_or(0);
//!     Ok(Value::Int(n * n))
//! });
//! let dispatcher = backend.dispatcher(&target).expect("intercept installed");
//! assert_eq!(dispatcher.dispatch(None, vec![Value::Int(3)], &square).ok(), Some(Value::Int(16)));
//!
//! handle.unhook();
//! assert!(!backend.is_installed(&target));
//! ```

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::backend::{BackendHandle, Dispatcher, InstrumentationBackend, OriginalMethod};
use crate::callback::{Callback, CallbackError};
use crate::config::EngineConfig;
use crate::context::{InvocationContext, Outcome, Phase};
use crate::error::{InstallError, RegistrationError};
use crate::fields::AdditionalFieldStore;
use crate::handle::UnhookHandle;
use crate::resolve::Resolver;
use crate::target::{MethodTarget, TypeRef};
use crate::value::{ObjectRef, Throwable, Value};

/// Tracing target for all engine events.
pub(crate) const LOG_TARGET: &str = "interpose";

// ─────────────────────────────────────────────────────────────────────────────
// HookId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier of one registered hook.
///
/// Generated with nanoid so identifiers from different registries never
/// collide. Internally uses `Arc<str>` for cheap cloning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookId(Arc<str>);

impl HookId {
    fn generate() -> Self {
        Self(nanoid::nanoid!().into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook_{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookEntry
// ─────────────────────────────────────────────────────────────────────────────

/// One (target, callback) association.
pub(crate) struct HookEntry {
    pub(crate) id: HookId,
    pub(crate) target: MethodTarget,
    pub(crate) sequence: u64,
    pub(crate) active: AtomicBool,
    callback: Arc<dyn Callback>,
}

impl HookEntry {
    fn invoke(&self, phase: Phase, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        match phase {
            Phase::Before => self.callback.before(ctx),
            Phase::After => self.callback.after(ctx),
            Phase::Original => Ok(()),
        }
    }
}

/// Immutable snapshot of a target's hooks in ascending sequence order.
type Chain = Arc<[Arc<HookEntry>]>;

struct TargetSlot {
    chain: Chain,
    intercept: BackendHandle,
}

// ─────────────────────────────────────────────────────────────────────────────
// RegistryShared
// ─────────────────────────────────────────────────────────────────────────────

/// State shared between the registry, its handles, and its dispatchers.
pub(crate) struct RegistryShared {
    chains: RwLock<HashMap<MethodTarget, TargetSlot>>,
    /// Serialises registration and unhooking.
    registration: Mutex<()>,
    next_sequence: AtomicU64,
    resolver: Arc<dyn Resolver>,
    backend: Arc<dyn InstrumentationBackend>,
    fields: Arc<AdditionalFieldStore>,
    config: EngineConfig,
}

impl RegistryShared {
    fn attach(
        self: &Arc<Self>,
        target: MethodTarget,
        callback: Arc<dyn Callback>,
    ) -> Result<UnhookHandle, InstallError> {
        let _registration = self.registration.lock();

        let entry = Arc::new(HookEntry {
            id: HookId::generate(),
            target: target.clone(),
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            active: AtomicBool::new(true),
            callback,
        });

        let already_hooked = self.chains.read().contains_key(&target);
        if already_hooked {
            let mut chains = self.chains.write();
            if let Some(slot) = chains.get_mut(&target) {
                let mut next = Vec::with_capacity(slot.chain.len() + 1);
                next.extend(slot.chain.iter().cloned());
                next.push(Arc::clone(&entry));
                slot.chain = next.into();
            }
        } else {
            let dispatcher = Dispatcher::new(target.clone(), Arc::downgrade(self));
            let intercept = self.backend.install_intercept(&target, dispatcher)?;
            tracing::debug!(target: LOG_TARGET, member = %target, "intercept installed");
            self.chains.write().insert(
                target.clone(),
                TargetSlot {
                    chain: Arc::from([Arc::clone(&entry)]),
                    intercept,
                },
            );
        }

        tracing::debug!(
            target: LOG_TARGET,
            member = %target,
            hook = %entry.id,
            sequence = entry.sequence,
            "hook registered"
        );
        Ok(UnhookHandle::new(entry, Arc::downgrade(self)))
    }

    /// Removes `entry` from its chain. Returns `false` if it was already gone.
    pub(crate) fn detach(&self, entry: &Arc<HookEntry>) -> bool {
        let _registration = self.registration.lock();

        if !entry.active.swap(false, Ordering::SeqCst) {
            return false;
        }

        let uninstall = {
            let mut chains = self.chains.write();
            match chains.get_mut(&entry.target) {
                Some(slot) => {
                    let next: Vec<_> = slot
                        .chain
                        .iter()
                        .filter(|other| !Arc::ptr_eq(other, entry))
                        .cloned()
                        .collect();
                    if next.is_empty() {
                        chains.remove(&entry.target).map(|slot| slot.intercept)
                    } else {
                        slot.chain = next.into();
                        None
                    }
                }
                None => None,
            }
        };

        tracing::debug!(
            target: LOG_TARGET,
            member = %entry.target,
            hook = %entry.id,
            "hook removed"
        );

        if let Some(intercept) = uninstall {
            self.backend.uninstall_intercept(intercept);
            tracing::debug!(target: LOG_TARGET, member = %entry.target, "intercept uninstalled");
        }
        true
    }

    fn snapshot(&self, target: &MethodTarget) -> Option<Chain> {
        self.chains
            .read()
            .get(target)
            .map(|slot| Arc::clone(&slot.chain))
    }

    pub(crate) fn dispatch(
        &self,
        target: &MethodTarget,
        receiver: Option<ObjectRef>,
        args: Vec<Value>,
        original: &dyn OriginalMethod,
    ) -> Result<Value, Throwable> {
        let Some(chain) = self.snapshot(target) else {
            return original.invoke(receiver.as_ref(), &args);
        };

        let mut ctx =
            InvocationContext::with_fields(target.clone(), receiver, args, Arc::clone(&self.fields));

        for entry in chain.iter() {
            self.run_phase(entry, Phase::Before, &mut ctx);
        }

        if ctx.outcome().is_pending() {
            ctx.enter(Phase::Original);
            let (receiver, args) = ctx.parts();
            let outcome = Outcome::from(original.invoke(receiver, args));
            ctx.settle(outcome);
        } else {
            ctx.mark_skipped_original();
        }

        ctx.enter(Phase::After);
        for entry in chain.iter().rev() {
            self.run_phase(entry, Phase::After, &mut ctx);
        }

        ctx.into_outcome().into_result()
    }

    fn run_phase(&self, entry: &HookEntry, phase: Phase, ctx: &mut InvocationContext) {
        let result = if self.config.catch_panics {
            match panic::catch_unwind(AssertUnwindSafe(|| entry.invoke(phase, ctx))) {
                Ok(result) => result,
                Err(payload) => {
                    tracing::error!(
                        target: LOG_TARGET,
                        member = %entry.target,
                        hook = %entry.id,
                        %phase,
                        panic = panic_message(payload.as_ref()),
                        "hook callback panicked"
                    );
                    return;
                }
            }
        } else {
            entry.invoke(phase, ctx)
        };

        if let Err(error) = result {
            tracing::warn!(
                target: LOG_TARGET,
                member = %entry.target,
                hook = %entry.id,
                %phase,
                %error,
                "hook callback failed"
            );
        }
    }
}

impl Drop for RegistryShared {
    fn drop(&mut self) {
        for (target, slot) in self.chains.get_mut().drain() {
            for entry in slot.chain.iter() {
                entry.active.store(false, Ordering::SeqCst);
            }
            self.backend.uninstall_intercept(slot.intercept);
            tracing::debug!(target: LOG_TARGET, member = %target, "intercept uninstalled on registry drop");
        }
    }
}

fn panic_message(payload: &(dyn core::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of hooks and entry point of the dispatch protocol.
///
/// Cloning is cheap and yields another handle to the same registry. When the
/// last clone is dropped, every remaining intercept is uninstalled.
///
/// # Thread Safety
///
/// All methods take `&self`. Chains are copy-on-write snapshots behind a
/// [`RwLock`], so dispatches only hold a read lock long enough to clone an
/// `Arc`, and registration never blocks a dispatch that is already running.
#[derive(Clone)]
pub struct HookRegistry {
    shared: Arc<RegistryShared>,
}

impl HookRegistry {
    /// Creates a registry with the default configuration.
    #[must_use]
    pub fn new<R, B>(resolver: Arc<R>, backend: Arc<B>) -> Self
    where
        R: Resolver,
        B: InstrumentationBackend,
    {
        Self::with_config(resolver, backend, EngineConfig::default())
    }

    /// Creates a registry with an explicit configuration.
    #[must_use]
    pub fn with_config<R, B>(resolver: Arc<R>, backend: Arc<B>, config: EngineConfig) -> Self
    where
        R: Resolver,
        B: InstrumentationBackend,
    {
        Self {
            shared: Arc::new(RegistryShared {
                chains: RwLock::new(HashMap::new()),
                registration: Mutex::new(()),
                next_sequence: AtomicU64::new(0),
                resolver: resolver as Arc<dyn Resolver>,
                backend: backend as Arc<dyn InstrumentationBackend>,
                fields: Arc::new(AdditionalFieldStore::with_purge_interval(
                    config.field_purge_interval,
                )),
                config,
            }),
        }
    }

    /// Hooks every method declared directly on `owner` named `name`.
    ///
    /// Inherited methods are not included. Each overload becomes its own
    /// target with its own handle, returned in declaration order. The same
    /// callback instance serves all of them.
    ///
    /// If nothing matches, an empty list is returned rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner cannot be resolved or an intercept
    /// cannot be installed. In the latter case, hooks already created by this
    /// call are removed again before returning.
    pub fn register_by_name(
        &self,
        owner: &TypeRef,
        name: &str,
        callback: impl Callback,
    ) -> Result<Vec<UnhookHandle>, RegistrationError> {
        let targets = self.shared.resolver.declared_methods_named(owner, name)?;
        if targets.is_empty() {
            tracing::debug!(target: LOG_TARGET, %owner, name, "no declared methods matched");
        }
        self.attach_all(targets, Arc::new(callback))
    }

    /// Hooks every constructor declared on `owner`.
    ///
    /// # Errors
    ///
    /// Same as [`register_by_name`](Self::register_by_name).
    pub fn register_constructors(
        &self,
        owner: &TypeRef,
        callback: impl Callback,
    ) -> Result<Vec<UnhookHandle>, RegistrationError> {
        let targets: Vec<_> = self
            .shared
            .resolver
            .declared_members(owner)?
            .into_iter()
            .filter(MethodTarget::is_constructor)
            .collect();
        self.attach_all(targets, Arc::new(callback))
    }

    /// Hooks one already-resolved method or constructor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::TargetUnresolved`] if the resolver does
    /// not know `target`, or an install error from the backend.
    pub fn register_on_resolved(
        &self,
        target: &MethodTarget,
        callback: impl Callback,
    ) -> Result<UnhookHandle, RegistrationError> {
        if !self.shared.resolver.contains(target) {
            return Err(RegistrationError::TargetUnresolved(target.clone()));
        }
        Ok(self.shared.attach(target.clone(), Arc::new(callback))?)
    }

    fn attach_all(
        &self,
        targets: Vec<MethodTarget>,
        callback: Arc<dyn Callback>,
    ) -> Result<Vec<UnhookHandle>, RegistrationError> {
        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            match self.shared.attach(target, Arc::clone(&callback)) {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    for handle in &handles {
                        handle.unhook();
                    }
                    return Err(error.into());
                }
            }
        }
        Ok(handles)
    }

    /// Runs the hook chain of `target` around `original`.
    ///
    /// Backends normally reach this through the [`Dispatcher`] they were
    /// given on install. Targets without hooks run `original` directly.
    pub fn dispatch(
        &self,
        target: &MethodTarget,
        receiver: Option<ObjectRef>,
        args: Vec<Value>,
        original: &dyn OriginalMethod,
    ) -> Result<Value, Throwable> {
        self.shared.dispatch(target, receiver, args, original)
    }

    /// Returns the number of active hooks on `target`.
    #[must_use]
    pub fn hook_count(&self, target: &MethodTarget) -> usize {
        self.shared
            .chains
            .read()
            .get(target)
            .map_or(0, |slot| slot.chain.len())
    }

    /// Returns `true` if `target` has at least one active hook.
    #[must_use]
    pub fn is_hooked(&self, target: &MethodTarget) -> bool {
        self.shared.chains.read().contains_key(target)
    }

    /// Returns every target that currently has hooks.
    #[must_use]
    pub fn hooked_targets(&self) -> Vec<MethodTarget> {
        self.shared.chains.read().keys().cloned().collect()
    }

    /// Returns the field store shared with callbacks.
    #[must_use]
    pub fn fields(&self) -> &AdditionalFieldStore {
        &self.shared.fields
    }

    /// Returns the resolver used for registration.
    #[must_use]
    pub fn resolver(&self) -> &dyn Resolver {
        self.shared.resolver.as_ref()
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("targets", &self.hooked_targets())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ManualBackend, original_fn};
    use crate::callback::{after_fn, before_fn, constant};
    use crate::resolve::ResolveError;
    use crate::target::Signature;
    use std::sync::Mutex as StdMutex;

    /// Resolver over a fixed member list.
    struct StaticResolver(Vec<MethodTarget>);

    impl Resolver for StaticResolver {
        fn declared_members(&self, owner: &TypeRef) -> Result<Vec<MethodTarget>, ResolveError> {
            Ok(self
                .0
                .iter()
                .filter(|target| target.owner() == owner)
                .cloned()
                .collect())
        }

        fn find_exact(
            &self,
            owner: &TypeRef,
            name: &str,
            params: &Signature,
        ) -> Result<MethodTarget, ResolveError> {
            self.0
                .iter()
                .find(|t| t.owner() == owner && t.name() == Some(name) && t.signature() == params)
                .cloned()
                .ok_or_else(|| ResolveError::method_not_found(owner, name, params))
        }

        fn find_best_match(
            &self,
            owner: &TypeRef,
            name: &str,
            _arg_types: &[Option<TypeRef>],
        ) -> Result<MethodTarget, ResolveError> {
            self.find_exact(owner, name, &Signature::empty())
        }

        fn find_constructor(
            &self,
            owner: &TypeRef,
            params: &Signature,
        ) -> Result<MethodTarget, ResolveError> {
            self.0
                .iter()
                .find(|t| t.owner() == owner && t.is_constructor() && t.signature() == params)
                .cloned()
                .ok_or_else(|| ResolveError::constructor_not_found(owner, params))
        }
    }

    fn bar_int() -> MethodTarget {
        MethodTarget::method("demo.Foo", "bar", Signature::new([TypeRef::INT]))
    }

    fn bar_string() -> MethodTarget {
        MethodTarget::method("demo.Foo", "bar", Signature::new([TypeRef::STRING]))
    }

    fn setup() -> (HookRegistry, Arc<ManualBackend>) {
        let resolver = Arc::new(StaticResolver(vec![
            bar_int(),
            bar_string(),
            MethodTarget::constructor("demo.Foo", Signature::empty()),
        ]));
        let backend = Arc::new(ManualBackend::new());
        (HookRegistry::new(resolver, Arc::clone(&backend)), backend)
    }

    fn echo(args: &[Value]) -> Result<Value, Throwable> {
        Ok(args.first().cloned().unwrap_or_default())
    }

    #[test]
    fn unhooked_target_runs_original() {
        let (registry, _) = setup();
        let body = original_fn(|_, args| echo(args));
        let result = registry.dispatch(&bar_int(), None, vec![Value::Int(5)], &body);
        assert_eq!(result.ok(), Some(Value::Int(5)));
    }

    #[test]
    fn register_on_resolved_rejects_unknown_target() {
        let (registry, backend) = setup();
        let unknown = MethodTarget::method("demo.Foo", "baz", Signature::empty());

        let result = registry.register_on_resolved(&unknown, constant(1));
        assert!(matches!(result, Err(RegistrationError::TargetUnresolved(t)) if t == unknown));
        assert_eq!(backend.install_count(), 0);
    }

    #[test]
    fn install_once_uninstall_once() {
        let (registry, backend) = setup();
        let target = bar_int();

        let first = registry.register_on_resolved(&target, constant(1)).unwrap();
        let second = registry.register_on_resolved(&target, constant(2)).unwrap();
        assert_eq!(backend.install_count(), 1);
        assert_eq!(registry.hook_count(&target), 2);

        first.unhook();
        assert_eq!(backend.uninstall_count(), 0);
        assert!(registry.is_hooked(&target));

        second.unhook();
        assert_eq!(backend.uninstall_count(), 1);
        assert!(!registry.is_hooked(&target));
        assert!(!backend.is_installed(&target));
    }

    #[test]
    fn unhook_is_idempotent() {
        let (registry, backend) = setup();
        let handle = registry.register_on_resolved(&bar_int(), constant(1)).unwrap();

        assert!(handle.unhook());
        assert!(!handle.unhook());
        assert!(!handle.clone().unhook());
        assert_eq!(backend.uninstall_count(), 1);
        assert!(!handle.is_active());
    }

    #[test]
    fn register_by_name_returns_one_handle_per_overload() {
        let (registry, backend) = setup();
        let handles = registry
            .register_by_name(&TypeRef::named("demo.Foo"), "bar", constant(0))
            .unwrap();

        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].target(), &bar_int());
        assert_eq!(handles[1].target(), &bar_string());
        assert_eq!(backend.install_count(), 2);
    }

    #[test]
    fn register_by_name_without_matches_is_empty_success() {
        let (registry, backend) = setup();
        let handles = registry
            .register_by_name(&TypeRef::named("demo.Foo"), "missing", constant(0))
            .unwrap();
        assert!(handles.is_empty());
        assert_eq!(backend.install_count(), 0);
    }

    #[test]
    fn register_constructors_hooks_only_constructors() {
        let (registry, _) = setup();
        let handles = registry
            .register_constructors(&TypeRef::named("demo.Foo"), constant(0))
            .unwrap();
        assert_eq!(handles.len(), 1);
        assert!(handles[0].target().is_constructor());
    }

    #[test]
    fn before_hooks_ascending_after_hooks_descending() {
        let (registry, _) = setup();
        let target = bar_int();
        let log = Arc::new(StdMutex::new(Vec::new()));

        for name in ["a", "b", "c"] {
            let before_log = Arc::clone(&log);
            let after_log = Arc::clone(&log);
            let callback = crate::callback::FnCallback::new()
                .on_before(move |_| before_log.lock().unwrap().push(format!("before:{name}")))
                .on_after(move |_| after_log.lock().unwrap().push(format!("after:{name}")));
            registry.register_on_resolved(&target, callback).unwrap();
        }

        let body_log = Arc::clone(&log);
        let body = original_fn(move |_, args| {
            body_log.lock().unwrap().push("original".to_string());
            echo(args)
        });
        registry
            .dispatch(&target, None, vec![Value::Int(1)], &body)
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "before:a", "before:b", "before:c", "original", "after:c", "after:b", "after:a"
            ]
        );
    }

    #[test]
    fn before_result_skips_original_and_last_write_wins() {
        let (registry, _) = setup();
        let target = bar_int();
        registry.register_on_resolved(&target, constant(1)).unwrap();
        registry.register_on_resolved(&target, constant(2)).unwrap();

        let observed = Arc::new(StdMutex::new(None));
        let observed_clone = Arc::clone(&observed);
        registry
            .register_on_resolved(
                &target,
                after_fn(move |ctx| {
                    *observed_clone.lock().unwrap() = Some(ctx.returned_early());
                }),
            )
            .unwrap();

        let body = original_fn(|_, _| panic!("original must not run"));
        let result = registry.dispatch(&target, None, vec![Value::Int(9)], &body);

        assert_eq!(result.ok(), Some(Value::Int(2)));
        assert_eq!(*observed.lock().unwrap(), Some(true));
    }

    #[test]
    fn after_hook_replaces_original_error() {
        let (registry, _) = setup();
        let target = bar_int();
        registry
            .register_on_resolved(
                &target,
                after_fn(|ctx| {
                    if ctx.has_throwable() {
                        ctx.set_result("recovered");
                    }
                }),
            )
            .unwrap();

        let body = original_fn(|_, _| Err(Throwable::msg("boom")));
        let result = registry.dispatch(&target, None, vec![], &body);
        assert_eq!(result.ok(), Some(Value::from("recovered")));
    }

    #[test]
    fn original_error_propagates_with_identity() {
        let (registry, _) = setup();
        let target = bar_int();
        registry
            .register_on_resolved(&target, before_fn(|_| {}))
            .unwrap();

        let thrown = Throwable::msg("original failure");
        let thrown_clone = thrown.clone();
        let body = original_fn(move |_, _| Err(thrown_clone.clone()));

        let error = registry
            .dispatch(&target, None, vec![], &body)
            .expect_err("error should propagate");
        assert!(error.ptr_eq(&thrown));
    }

    #[test]
    fn failing_and_panicking_callbacks_are_contained() {
        struct Failing;
        impl Callback for Failing {
            fn before(&self, _ctx: &mut InvocationContext) -> Result<(), CallbackError> {
                Err("broken hook".into())
            }
        }

        let (registry, _) = setup();
        let target = bar_int();
        registry.register_on_resolved(&target, Failing).unwrap();
        registry
            .register_on_resolved(&target, before_fn(|_| panic!("hook exploded")))
            .unwrap();
        registry
            .register_on_resolved(
                &target,
                before_fn(|ctx| {
                    ctx.set_arg(0, 100);
                }),
            )
            .unwrap();

        let body = original_fn(|_, args| echo(args));
        let result = registry.dispatch(&target, None, vec![Value::Int(1)], &body);
        assert_eq!(result.ok(), Some(Value::Int(100)));
    }

    #[test]
    fn dispatcher_outliving_registry_runs_original() {
        let (registry, backend) = setup();
        let target = bar_int();
        registry.register_on_resolved(&target, constant(1)).unwrap();
        let dispatcher = backend.dispatcher(&target).unwrap();

        drop(registry);
        assert_eq!(backend.uninstall_count(), 1);

        let body = original_fn(|_, args| echo(args));
        let result = dispatcher.dispatch(None, vec![Value::Int(7)], &body);
        assert_eq!(result.ok(), Some(Value::Int(7)));
    }
}
