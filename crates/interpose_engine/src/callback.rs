//! The callback capability and closure adapters.
//!
//! A [`Callback`] has two independent phases, [`before`](Callback::before) and
//! [`after`](Callback::after), both of which default to doing nothing.
//! Implement whichever phases you need.
//!
//! # Failures
//!
//! A phase may return an error or even panic. The registry catches both, logs
//! them under the `interpose` tracing target, and carries on with the rest of
//! the chain and the original call. Neither reaches the intercepted caller.
//! To make the intercepted call itself fail, set a throwable on the context.
//!
//! # Adapters
//!
//! | Adapter | Phase | Effect |
//! |---------|-------|--------|
//! | [`before_fn`] | before | runs a closure |
//! | [`after_fn`] | after | runs a closure |
//! | [`replace_fn`] | before | closure's `Ok`/`Err` becomes the result/throwable |
//! | [`constant`] | before | fixed result |
//! | [`nop`] | before | `Null` result |
//! | [`when`] | both | gates another callback on a predicate |
//!
//! # Example
//!
//! ```
//! use interpose_engine::callback::{Callback, CallbackError};
//! use interpose_engine::context::InvocationContext;
//! use interpose_engine::value::Value;
//!
//! /// Doubles the first argument and records the original result.
//! struct Doubler;
//!
//! impl Callback for Doubler {
//!     fn before(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
//!         let n = ctx.arg(0).and_then(Value::as_int).ok_or("expected int")?;
//!         ctx.set_arg(0, n * 2);
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::context::InvocationContext;
use crate::value::{Throwable, Value};

/// Error returned by a callback phase.
///
/// Callback errors are contained by the registry and only logged.
pub type CallbackError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// A pair of optional interception phases.
pub trait Callback: Send + Sync + 'static {
    /// Runs before the original body.
    ///
    /// Setting a result or throwable on `ctx` skips the original body.
    fn before(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        let _ = ctx;
        Ok(())
    }

    /// Runs after the original body, or after the before phase if it was
    /// skipped.
    fn after(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        let _ = ctx;
        Ok(())
    }
}

impl<C: Callback + ?Sized> Callback for Arc<C> {
    fn before(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        (**self).before(ctx)
    }

    fn after(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        (**self).after(ctx)
    }
}

impl<C: Callback + ?Sized> Callback for Box<C> {
    fn before(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        (**self).before(ctx)
    }

    fn after(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        (**self).after(ctx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Closure adapters
// ─────────────────────────────────────────────────────────────────────────────

type PhaseFn = Box<dyn Fn(&mut InvocationContext) + Send + Sync>;

/// Callback built from closures.
///
/// ```
/// use interpose_engine::callback::FnCallback;
///
/// let callback = FnCallback::new()
///     .on_before(|ctx| {
///         ctx.set_arg(0, 1);
///     })
///     .on_after(|ctx| {
///         if ctx.has_throwable() {
///             ctx.set_result(0);
///         }
///     });
/// ```
#[derive(Default)]
pub struct FnCallback {
    before: Option<PhaseFn>,
    after: Option<PhaseFn>,
}

impl FnCallback {
    /// Creates a callback with no phases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the before phase.
    #[must_use]
    pub fn on_before(mut self, f: impl Fn(&mut InvocationContext) + Send + Sync + 'static) -> Self {
        self.before = Some(Box::new(f));
        self
    }

    /// Sets the after phase.
    #[must_use]
    pub fn on_after(mut self, f: impl Fn(&mut InvocationContext) + Send + Sync + 'static) -> Self {
        self.after = Some(Box::new(f));
        self
    }
}

impl Callback for FnCallback {
    fn before(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        if let Some(f) = &self.before {
            f(ctx);
        }
        Ok(())
    }

    fn after(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        if let Some(f) = &self.after {
            f(ctx);
        }
        Ok(())
    }
}

/// Callback that runs `f` in the before phase.
#[must_use]
pub fn before_fn(f: impl Fn(&mut InvocationContext) + Send + Sync + 'static) -> FnCallback {
    FnCallback::new().on_before(f)
}

/// Callback that runs `f` in the after phase.
#[must_use]
pub fn after_fn(f: impl Fn(&mut InvocationContext) + Send + Sync + 'static) -> FnCallback {
    FnCallback::new().on_after(f)
}

/// Callback that replaces the original body.
///
/// Created by [`replace_fn`].
pub struct Replace<F> {
    replacement: F,
}

impl<F> Callback for Replace<F>
where
    F: Fn(&mut InvocationContext) -> Result<Value, Throwable> + Send + Sync + 'static,
{
    fn before(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        match (self.replacement)(ctx) {
            Ok(value) => ctx.set_result(value),
            Err(error) => ctx.set_throwable(error),
        }
        Ok(())
    }
}

/// Callback whose closure supplies the call's outcome, so the original body
/// never runs.
///
/// `Ok(value)` becomes the result and `Err(throwable)` is raised to the caller.
#[must_use]
pub fn replace_fn<F>(replacement: F) -> Replace<F>
where
    F: Fn(&mut InvocationContext) -> Result<Value, Throwable> + Send + Sync + 'static,
{
    Replace { replacement }
}

/// Callback that always returns a fixed value without running the original.
#[derive(Debug, Clone)]
pub struct Constant(Value);

impl Callback for Constant {
    fn before(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        ctx.set_result(self.0.clone());
        Ok(())
    }
}

/// Callback that always returns `value`.
#[must_use]
pub fn constant(value: impl Into<Value>) -> Constant {
    Constant(value.into())
}

/// Callback that turns the member into a no-op returning `Null`.
#[must_use]
pub fn nop() -> Constant {
    Constant(Value::Null)
}

/// Callback gated on a predicate.
///
/// Created by [`when`]. The predicate is evaluated separately for each phase.
pub struct When<P, C> {
    predicate: P,
    inner: C,
}

impl<P, C> Callback for When<P, C>
where
    P: Fn(&InvocationContext) -> bool + Send + Sync + 'static,
    C: Callback,
{
    fn before(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        if (self.predicate)(ctx) {
            self.inner.before(ctx)
        } else {
            Ok(())
        }
    }

    fn after(&self, ctx: &mut InvocationContext) -> Result<(), CallbackError> {
        if (self.predicate)(ctx) {
            self.inner.after(ctx)
        } else {
            Ok(())
        }
    }
}

/// Runs `inner` only when `predicate` holds.
#[must_use]
pub fn when<P, C>(predicate: P, inner: C) -> When<P, C>
where
    P: Fn(&InvocationContext) -> bool + Send + Sync + 'static,
    C: Callback,
{
    When { predicate, inner }
}
