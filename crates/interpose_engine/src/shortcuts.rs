//! One-call helpers that hook every overload of a method by name.
//!
//! Each helper is [`HookRegistry::register_by_name`] combined with one of the
//! adapters from [`callback`](crate::callback). For conditional hooks, wrap the
//! adapter in [`when`](crate::callback::when) and call `register_by_name`
//! directly.

use crate::callback::{after_fn, before_fn, constant, nop, replace_fn};
use crate::context::InvocationContext;
use crate::error::RegistrationError;
use crate::handle::UnhookHandle;
use crate::registry::HookRegistry;
use crate::target::TypeRef;
use crate::value::{Throwable, Value};

impl HookRegistry {
    /// Runs `f` before every overload of `owner.name`.
    ///
    /// # Errors
    ///
    /// See [`register_by_name`](Self::register_by_name).
    pub fn hook_all_before(
        &self,
        owner: &TypeRef,
        name: &str,
        f: impl Fn(&mut InvocationContext) + Send + Sync + 'static,
    ) -> Result<Vec<UnhookHandle>, RegistrationError> {
        self.register_by_name(owner, name, before_fn(f))
    }

    /// Runs `f` after every overload of `owner.name`.
    ///
    /// # Errors
    ///
    /// See [`register_by_name`](Self::register_by_name).
    pub fn hook_all_after(
        &self,
        owner: &TypeRef,
        name: &str,
        f: impl Fn(&mut InvocationContext) + Send + Sync + 'static,
    ) -> Result<Vec<UnhookHandle>, RegistrationError> {
        self.register_by_name(owner, name, after_fn(f))
    }

    /// Replaces the body of every overload of `owner.name` with `f`.
    ///
    /// # Errors
    ///
    /// See [`register_by_name`](Self::register_by_name).
    pub fn hook_all_replace<F>(
        &self,
        owner: &TypeRef,
        name: &str,
        f: F,
    ) -> Result<Vec<UnhookHandle>, RegistrationError>
    where
        F: Fn(&mut InvocationContext) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.register_by_name(owner, name, replace_fn(f))
    }

    /// Makes every overload of `owner.name` return `value`.
    ///
    /// # Errors
    ///
    /// See [`register_by_name`](Self::register_by_name).
    pub fn hook_all_constant(
        &self,
        owner: &TypeRef,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<UnhookHandle>, RegistrationError> {
        self.register_by_name(owner, name, constant(value))
    }

    /// Turns every overload of `owner.name` into a no-op returning `Null`.
    ///
    /// # Errors
    ///
    /// See [`register_by_name`](Self::register_by_name).
    pub fn hook_all_nop(
        &self,
        owner: &TypeRef,
        name: &str,
    ) -> Result<Vec<UnhookHandle>, RegistrationError> {
        self.register_by_name(owner, name, nop())
    }
}
