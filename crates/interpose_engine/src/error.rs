//! Errors reported to registration callers.
//!
//! Only registration can fail from the caller's point of view. Failures that
//! happen while a hooked member is being called (a callback returning an
//! error or panicking) are contained by the dispatcher and logged; errors
//! raised by the original body become the call's [`Throwable`] outcome.
//!
//! [`Throwable`]: crate::value::Throwable

use thiserror::Error;

use crate::resolve::ResolveError;
use crate::target::MethodTarget;

/// The backend refused or failed to install an intercept.
#[derive(Debug, Clone, Error)]
pub enum InstallError {
    /// The backend cannot intercept this kind of member.
    #[error("member cannot be intercepted: {target}")]
    Unsupported {
        /// The rejected target.
        target: MethodTarget,
    },

    /// Installation was attempted and failed.
    #[error("failed to install intercept on {target}: {reason}")]
    Failed {
        /// The target being instrumented.
        target: MethodTarget,
        /// Backend-specific reason.
        reason: String,
    },
}

impl InstallError {
    /// Creates a [`Failed`](Self::Failed) error.
    pub fn failed(target: &MethodTarget, reason: impl Into<String>) -> Self {
        Self::Failed {
            target: target.clone(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while registering a hook.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// The resolver does not know the target.
    #[error("target cannot be located: {0}")]
    TargetUnresolved(MethodTarget),

    /// Member lookup failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The backend could not install the intercept.
    #[error(transparent)]
    Install(#[from] InstallError),
}
