//! Runtime method interception for Rust hosts.
//!
//! Attach before and after hooks to methods and constructors of a managed
//! runtime, rewrite arguments and results, and detach cleanly.
//!
//! - [`engine`] - Hook registry, dispatch protocol, and field store
//! - [`runtime`] - In-process reference runtime (feature `runtime`)
//! - [`tracing`](mod@tracing) - Subscriber setup (feature `tracing`)

pub use interpose_engine as engine;

#[cfg(feature = "runtime")]
pub use interpose_runtime as runtime;

#[cfg(feature = "tracing")]
pub use interpose_tracing as tracing;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use interpose_engine::prelude::*;

    #[cfg(feature = "runtime")]
    pub use interpose_runtime::prelude::*;

    #[cfg(feature = "tracing")]
    pub use interpose_tracing::{TracingConfig, TracingFormat};
}
