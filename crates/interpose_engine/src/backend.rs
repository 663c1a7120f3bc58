//! Instrumentation backend boundary.
//!
//! The engine does not patch call sites itself. An
//! [`InstrumentationBackend`] is asked to install an intercept the first time
//! a target gains a hook and to uninstall it when the last hook goes away.
//! While installed, the backend routes every real call of the target through
//! the [`Dispatcher`] it was given, passing the original body along so the
//! dispatcher can run it when no hook overrides the outcome.
//!
//! ```text
//!  caller ──► backend intercept ──► Dispatcher::dispatch ──► before hooks
//!                                                        ├─► original body
//!                                                        └─► after hooks
//!  caller ◄── return / raise ◄───────── outcome ◄─────────────┘
//! ```
//!
//! [`ManualBackend`] is a backend that patches nothing; embedders that already
//! own the call path fetch the dispatcher and call it themselves.

use core::fmt;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Weak;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::error::InstallError;
use crate::registry::RegistryShared;
use crate::target::MethodTarget;
use crate::value::{ObjectRef, Throwable, Value};

/// Token identifying one installed intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendHandle(u64);

impl BackendHandle {
    /// Wraps a backend-specific identifier.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the backend-specific identifier.
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Installs and removes call interception for individual members.
///
/// The registry serialises calls to this trait: for a given target,
/// `install_intercept` and `uninstall_intercept` strictly alternate. The
/// registry's chain lock is not held during these calls, but the registration
/// lock is, so implementations must not register or unhook from inside them.
pub trait InstrumentationBackend: Send + Sync + 'static {
    /// Starts routing calls of `target` through `dispatcher`.
    fn install_intercept(
        &self,
        target: &MethodTarget,
        dispatcher: Dispatcher,
    ) -> Result<BackendHandle, InstallError>;

    /// Restores the original call behaviour of the member behind `handle`.
    fn uninstall_intercept(&self, handle: BackendHandle);
}

/// The un-intercepted body of a member.
pub trait OriginalMethod {
    /// Runs the body with the (possibly rewritten) receiver and arguments.
    fn invoke(&self, receiver: Option<&ObjectRef>, args: &[Value]) -> Result<Value, Throwable>;
}

impl<F> OriginalMethod for F
where
    F: Fn(Option<&ObjectRef>, &[Value]) -> Result<Value, Throwable>,
{
    fn invoke(&self, receiver: Option<&ObjectRef>, args: &[Value]) -> Result<Value, Throwable> {
        self(receiver, args)
    }
}

/// Pins a closure to the [`OriginalMethod`] signature.
///
/// Closures passed straight to `&dyn OriginalMethod` may not infer the
/// higher-ranked argument lifetimes; routing them through this function does.
pub fn original_fn<F>(body: F) -> F
where
    F: Fn(Option<&ObjectRef>, &[Value]) -> Result<Value, Throwable>,
{
    body
}

/// Call-time entry point handed to a backend on install.
///
/// Holds only a weak reference to the registry. If the registry has been
/// dropped, dispatching simply runs the original body.
#[derive(Clone)]
pub struct Dispatcher {
    target: MethodTarget,
    registry: Weak<RegistryShared>,
}

impl Dispatcher {
    pub(crate) fn new(target: MethodTarget, registry: Weak<RegistryShared>) -> Self {
        Self { target, registry }
    }

    /// Returns the target this dispatcher serves.
    #[must_use]
    pub fn target(&self) -> &MethodTarget {
        &self.target
    }

    /// Runs the hook chain around `original` and returns the outcome the
    /// caller must observe.
    pub fn dispatch(
        &self,
        receiver: Option<ObjectRef>,
        args: Vec<Value>,
        original: &dyn OriginalMethod,
    ) -> Result<Value, Throwable> {
        match self.registry.upgrade() {
            Some(shared) => shared.dispatch(&self.target, receiver, args, original),
            None => original.invoke(receiver.as_ref(), &args),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("target", &self.target)
            .field("registry_alive", &(self.registry.strong_count() > 0))
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ManualBackend
// ─────────────────────────────────────────────────────────────────────────────

/// Backend that records installs without patching anything.
///
/// Use [`dispatcher`](Self::dispatcher) to obtain the entry point for a
/// hooked target and call it from your own call path.
#[derive(Default)]
pub struct ManualBackend {
    installed: RwLock<HashMap<BackendHandle, Dispatcher>>,
    next_handle: AtomicU64,
    installs: AtomicUsize,
    uninstalls: AtomicUsize,
}

impl ManualBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dispatcher for `target` if it is currently intercepted.
    #[must_use]
    pub fn dispatcher(&self, target: &MethodTarget) -> Option<Dispatcher> {
        self.installed
            .read()
            .values()
            .find(|dispatcher| dispatcher.target() == target)
            .cloned()
    }

    /// Returns `true` if `target` is currently intercepted.
    #[must_use]
    pub fn is_installed(&self, target: &MethodTarget) -> bool {
        self.dispatcher(target).is_some()
    }

    /// Total number of installs performed.
    #[must_use]
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    /// Total number of uninstalls performed.
    #[must_use]
    pub fn uninstall_count(&self) -> usize {
        self.uninstalls.load(Ordering::SeqCst)
    }
}

impl InstrumentationBackend for ManualBackend {
    fn install_intercept(
        &self,
        _target: &MethodTarget,
        dispatcher: Dispatcher,
    ) -> Result<BackendHandle, InstallError> {
        let handle = BackendHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.installed.write().insert(handle, dispatcher);
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn uninstall_intercept(&self, handle: BackendHandle) {
        if self.installed.write().remove(&handle).is_some() {
            self.uninstalls.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl fmt::Debug for ManualBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualBackend")
            .field("installed", &self.installed.read().len())
            .field("installs", &self.install_count())
            .field("uninstalls", &self.uninstall_count())
            .finish()
    }
}
