//! In-process reference runtime for Interpose.
//!
//! `interpose_runtime` models a small managed runtime so hooks can be
//! exercised without a real virtual machine:
//!
//! - [`types`] - Type definitions with constructors, instance and static methods
//! - [`object`] - Dynamic object instances
//! - [`runtime`] - Type table, member resolution, and call routing
//! - [`error`] - Linkage and definition errors
//!
//! The [`Runtime`](runtime::Runtime) implements both
//! [`Resolver`](interpose_engine::resolve::Resolver) and
//! [`InstrumentationBackend`](interpose_engine::backend::InstrumentationBackend),
//! so one `Arc<Runtime>` is all a
//! [`HookRegistry`](interpose_engine::registry::HookRegistry) needs.

/// Linkage and definition errors.
pub mod error;

/// Dynamic object instances.
pub mod object;

/// Type table, member resolution, and call routing.
pub mod runtime;

/// Type definitions.
pub mod types;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::error::*;
    pub use crate::object::*;
    pub use crate::runtime::*;
    pub use crate::types::*;
}
