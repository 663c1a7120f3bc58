//! Runtime error types.

use interpose_engine::resolve::ResolveError;
use interpose_engine::target::{MethodTarget, TypeRef};
use thiserror::Error;

/// Errors raised by the reference runtime.
///
/// Definition errors are returned directly. Errors that occur while calling a
/// member are raised into the managed world as a
/// [`Throwable`](interpose_engine::value::Throwable) wrapping this type, the
/// same way a real VM raises linkage errors.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// A type with this name is already defined.
    #[error("type already defined: {0}")]
    DuplicateType(TypeRef),

    /// The declared supertype has not been defined yet.
    #[error("supertype {supertype} of {ty} is not defined")]
    UnknownSupertype {
        /// The type being defined.
        ty: TypeRef,
        /// The missing supertype.
        supertype: TypeRef,
    },

    /// Two members of one type share a name and signature.
    #[error("duplicate member: {0}")]
    DuplicateMember(MethodTarget),

    /// The member does not exist.
    #[error("no such member: {0}")]
    NoSuchMember(MethodTarget),

    /// Member lookup failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Wrong number of arguments.
    #[error("{target} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        /// The called member.
        target: MethodTarget,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// An instance member was called without a receiver.
    #[error("{0} requires a receiver")]
    MissingReceiver(MethodTarget),

    /// A static member or constructor was called with a receiver.
    #[error("{0} does not take a receiver")]
    UnexpectedReceiver(MethodTarget),

    /// The receiver is not an instance of the member's owner.
    #[error("receiver of type {actual} is not a {}", target.owner())]
    IncompatibleReceiver {
        /// The called member.
        target: MethodTarget,
        /// Runtime type of the receiver.
        actual: TypeRef,
    },

    /// A constructor produced something other than an object.
    #[error("constructor {0} did not produce an object")]
    NotAnObject(MethodTarget),
}
