//! Per-call mutable state handed to callbacks.
//!
//! An [`InvocationContext`] is created fresh by the dispatcher for every
//! intercepted call and dropped when the call completes. It is never shared
//! between threads or between invocations.
//!
//! # Outcome
//!
//! The context holds exactly one canonical [`Outcome`]. Setting a result
//! replaces any pending throwable and setting a throwable replaces any
//! pending result; the last write wins. There is no secondary copy of the
//! result to keep in sync.
//!
//! | Phase | Outcome on entry | Effect of setting it |
//! |-------|------------------|----------------------|
//! | `Before` | `Pending` (or a value set by an earlier hook) | skips the original body |
//! | `After` | result or throwable of the call | replaces what the caller sees |

use core::fmt;
use std::sync::Arc;

use crate::fields::AdditionalFieldStore;
use crate::target::MethodTarget;
use crate::value::{ObjectRef, Throwable, Value};

/// The state of a call's result.
#[derive(Debug, Clone, Default)]
pub enum Outcome {
    /// No result yet; the original body will run.
    #[default]
    Pending,
    /// The call returns this value.
    Returned(Value),
    /// The call raises this error.
    Thrown(Throwable),
}

impl Outcome {
    /// Returns `true` while no result or throwable has been set.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }

    /// Converts a settled outcome into the value the caller observes.
    ///
    /// `Pending` realizes as a `Null` return.
    pub fn into_result(self) -> Result<Value, Throwable> {
        match self {
            Outcome::Pending => Ok(Value::Null),
            Outcome::Returned(value) => Ok(value),
            Outcome::Thrown(error) => Err(error),
        }
    }
}

impl From<Result<Value, Throwable>> for Outcome {
    fn from(result: Result<Value, Throwable>) -> Self {
        match result {
            Ok(value) => Outcome::Returned(value),
            Err(error) => Outcome::Thrown(error),
        }
    }
}

/// Which stage of the dispatch protocol is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before-hooks are running.
    Before,
    /// The original body is running.
    Original,
    /// After-hooks are running.
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Before => "before",
            Phase::Original => "original",
            Phase::After => "after",
        };
        f.write_str(name)
    }
}

/// Mutable state of one intercepted call.
pub struct InvocationContext {
    target: MethodTarget,
    receiver: Option<ObjectRef>,
    args: Vec<Value>,
    outcome: Outcome,
    phase: Phase,
    skipped_original: bool,
    fields: Arc<AdditionalFieldStore>,
}

impl InvocationContext {
    /// Creates a context with a private field store.
    ///
    /// The dispatcher uses [`with_fields`](Self::with_fields) so that callbacks
    /// share the registry's store; this constructor is mostly for tests.
    #[must_use]
    pub fn new(target: MethodTarget, receiver: Option<ObjectRef>, args: Vec<Value>) -> Self {
        Self::with_fields(target, receiver, args, Arc::new(AdditionalFieldStore::new()))
    }

    /// Creates a context backed by the given field store.
    #[must_use]
    pub fn with_fields(
        target: MethodTarget,
        receiver: Option<ObjectRef>,
        args: Vec<Value>,
        fields: Arc<AdditionalFieldStore>,
    ) -> Self {
        Self {
            target,
            receiver,
            args,
            outcome: Outcome::Pending,
            phase: Phase::Before,
            skipped_original: false,
            fields,
        }
    }

    /// Returns the intercepted member.
    #[must_use]
    pub fn target(&self) -> &MethodTarget {
        &self.target
    }

    /// Returns the receiver, or `None` for static members.
    ///
    /// For constructors, the receiver is the object under construction when
    /// the backend provides one.
    #[must_use]
    pub fn receiver(&self) -> Option<&ObjectRef> {
        self.receiver.as_ref()
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    // ─────────────────────────────────────────────────────────────────────
    // Arguments
    // ─────────────────────────────────────────────────────────────────────

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns the arguments for in-place modification.
    ///
    /// Elements can be replaced but the argument count is fixed by the
    /// target's signature. Changes made during the before phase are what the
    /// original body receives. Changes made later are only visible to
    /// subsequent hooks.
    pub fn args_mut(&mut self) -> &mut [Value] {
        &mut self.args
    }

    /// Returns the argument at `index`.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Replaces the argument at `index`, returning the previous value.
    ///
    /// Returns `None` and leaves the arguments untouched if `index` is out of
    /// range.
    pub fn set_arg(&mut self, index: usize, value: impl Into<Value>) -> Option<Value> {
        self.args
            .get_mut(index)
            .map(|slot| core::mem::replace(slot, value.into()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Outcome
    // ─────────────────────────────────────────────────────────────────────

    /// Returns the current outcome.
    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Returns the result if the outcome is a returned value.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Returned(value) => Some(value),
            _ => None,
        }
    }

    /// Sets the returned value, clearing any throwable.
    ///
    /// During the before phase this prevents the original body from running.
    pub fn set_result(&mut self, value: impl Into<Value>) {
        self.outcome = Outcome::Returned(value.into());
    }

    /// Returns the throwable if the outcome is a raised error.
    #[must_use]
    pub fn throwable(&self) -> Option<&Throwable> {
        match &self.outcome {
            Outcome::Thrown(error) => Some(error),
            _ => None,
        }
    }

    /// Sets the raised error, clearing any result.
    ///
    /// During the before phase this prevents the original body from running.
    pub fn set_throwable(&mut self, error: Throwable) {
        self.outcome = Outcome::Thrown(error);
    }

    /// Returns `true` if the outcome is a raised error.
    #[must_use]
    pub fn has_throwable(&self) -> bool {
        matches!(self.outcome, Outcome::Thrown(_))
    }

    /// Returns `true` once the original body was skipped because a
    /// before-hook settled the outcome.
    #[must_use]
    pub fn returned_early(&self) -> bool {
        self.skipped_original
    }

    // ─────────────────────────────────────────────────────────────────────
    // Auxiliary state
    // ─────────────────────────────────────────────────────────────────────

    /// Returns the field store shared by all hooks of the registry.
    #[must_use]
    pub fn fields(&self) -> &AdditionalFieldStore {
        &self.fields
    }

    /// Reads an additional field of the receiver.
    ///
    /// Returns `None` for static calls or when the field is unset.
    #[must_use]
    pub fn receiver_field(&self, key: &str) -> Option<Value> {
        self.receiver
            .as_ref()
            .and_then(|receiver| self.fields.get(receiver, key))
    }

    /// Writes an additional field of the receiver, returning the previous
    /// value.
    ///
    /// Does nothing and returns `None` for static calls.
    pub fn set_receiver_field(&self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.receiver
            .as_ref()
            .and_then(|receiver| self.fields.set(receiver, key, value))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dispatcher internals
    // ─────────────────────────────────────────────────────────────────────

    pub(crate) fn enter(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn mark_skipped_original(&mut self) {
        self.skipped_original = true;
    }

    pub(crate) fn settle(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }

    pub(crate) fn parts(&self) -> (Option<&ObjectRef>, &[Value]) {
        (self.receiver.as_ref(), &self.args)
    }

    pub(crate) fn into_outcome(self) -> Outcome {
        self.outcome
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("target", &self.target)
            .field("receiver", &self.receiver)
            .field("args", &self.args)
            .field("outcome", &self.outcome)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
