//! The hook-dispatch engine of Interpose.
//!
//! `interpose_engine` attaches before and after callbacks to members of a
//! managed runtime and runs them around every intercepted call:
//!
//! - [`registry`] - Hook registry and the dispatch protocol
//! - [`callback`] - Callback trait and closure adapters
//! - [`context`] - Mutable per-call state
//! - [`handle`] - Unhook handles and scoped guards
//! - [`fields`] - Per-object auxiliary state
//! - [`backend`] - Instrumentation backend boundary
//! - [`resolve`] - Member lookup boundary
//! - [`target`] - Member identities and type names
//! - [`value`] - Runtime values, objects, and throwables
//!
//! # Architecture
//!
//! The engine does not patch anything itself. Two collaborators sit at its
//! edges:
//!
//! - A [`Resolver`](resolve::Resolver) turns type and member names into
//!   [`MethodTarget`](target::MethodTarget)s.
//! - An [`InstrumentationBackend`](backend::InstrumentationBackend) redirects
//!   real calls of a target into a [`Dispatcher`](backend::Dispatcher).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use interpose_engine::prelude::*;
//! # struct Members(Vec<MethodTarget>);
//! # impl Resolver for Members {
//! #     fn declared_members(&self, owner: &TypeRef) -> Result<Vec<MethodTarget>, ResolveError> {
//! #         Ok(self.0.iter().filter(|t| t.owner() == owner).cloned().collect())
//! #     }
//! #     fn find_exact(&self, o: &TypeRef, n: &str, p: &Signature) -> Result<MethodTarget, ResolveError> {
//! #         Err(ResolveError::method_not_found(o, n, p))
//! #     }
//! #     fn find_best_match(&self, o: &TypeRef, n: &str, _: &[Option<TypeRef>]) -> Result<MethodTarget, ResolveError> {
//! #         Err(ResolveError::method_not_found(o, n, &Signature::empty()))
//! #     }
//! #     fn find_constructor(&self, o: &TypeRef, p: &Signature) -> Result<MethodTarget, ResolveError> {
//! #         Err(ResolveError::constructor_not_found(o, p))
//! #     }
//! # }
//!
//! let greet = MethodTarget::method("demo.Greeter", "greet", Signature::new([TypeRef::STRING]));
//! # let resolver = Arc::new(Members(vec![greet.clone()]));
//! let backend = Arc::new(ManualBackend::new());
//! let registry = HookRegistry::new(resolver, Arc::clone(&backend));
//!
//! let handles = registry
//!     .hook_all_after(&TypeRef::named("demo.Greeter"), "greet", |ctx| {
//!         let greeting = ctx.result().and_then(Value::as_str).unwrap_or_default().to_uppercase();
//!         ctx.set_result(greeting);
//!     })
//!     .expect("registration");
//! assert_eq!(handles.len(), 1);
//!
//! let body = original_fn(|_, args| {
//!     Ok(Value::from(format!("hello {}", args[0].as_str().unwrap_or("?"))))
//! });
//! let result = backend
//!     .dispatcher(&greet)
//!     .expect("installed")
//!     .dispatch(None, vec![Value::from("ada")], &body);
//! assert_eq!(result.ok(), Some(Value::from("HELLO ADA")));
//! ```

/// Instrumentation backend boundary.
pub mod backend;

/// Callback trait and closure adapters.
pub mod callback;

/// Engine configuration.
pub mod config;

/// Mutable per-call state.
pub mod context;

/// Registration error types.
pub mod error;

/// Per-object auxiliary state.
pub mod fields;

/// Unhook handles and scoped guards.
pub mod handle;

/// Hook registry and dispatch protocol.
pub mod registry;

/// Member lookup boundary.
pub mod resolve;

mod shortcuts;

/// Member identities and type names.
pub mod target;

/// Runtime values, objects, and throwables.
pub mod value;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::callback::*;
    pub use crate::config::*;
    pub use crate::context::*;
    pub use crate::error::*;
    pub use crate::fields::*;
    pub use crate::handle::*;
    pub use crate::registry::{HookId, HookRegistry};
    pub use crate::resolve::*;
    pub use crate::target::*;
    pub use crate::value::*;
}
