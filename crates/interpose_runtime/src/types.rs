//! Type definitions for the reference runtime.
//!
//! A [`TypeDef`] is assembled with a builder and handed to
//! [`Runtime::define`](crate::runtime::Runtime::define). Member bodies are
//! plain Rust closures.

use core::fmt;
use std::sync::Arc;

use interpose_engine::target::{MethodTarget, Signature, TypeRef};
use interpose_engine::value::{ObjectRef, Throwable, Value};

use crate::error::RuntimeError;

/// Executable body of a member, called with the receiver (for instance
/// members) and the arguments.
pub type BodyFn = dyn Fn(Option<&ObjectRef>, &[Value]) -> Result<Value, Throwable> + Send + Sync;

/// How a member is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Called on a receiver.
    Instance,
    /// Called without a receiver.
    Static,
    /// Creates a new instance.
    Constructor,
}

/// One declared method or constructor.
pub struct MemberDef {
    pub(crate) target: MethodTarget,
    pub(crate) dispatch: Dispatch,
    pub(crate) body: Arc<BodyFn>,
}

impl MemberDef {
    /// Returns the member's identity.
    #[must_use]
    pub fn target(&self) -> &MethodTarget {
        &self.target
    }

    /// Returns how the member is called.
    #[must_use]
    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }
}

impl fmt::Debug for MemberDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDef")
            .field("target", &self.target)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

/// Definition of a runtime type.
///
/// # Example
///
/// ```
/// use interpose_engine::target::TypeRef;
/// use interpose_engine::value::{ObjectRef, Value};
/// use interpose_runtime::object::Instance;
/// use interpose_runtime::types::TypeDef;
///
/// let counter = TypeDef::new("demo.Counter")
///     .constructor([TypeRef::INT], |args| {
///         let object = Instance::new("demo.Counter");
///         object.set("count", args[0].clone());
///         Ok(ObjectRef::new(object))
///     })
///     .method("get", [] as [TypeRef; 0], |this, _| {
///         let count = this.downcast_ref::<Instance>().and_then(|o| o.get("count"));
///         Ok(count.unwrap_or_default())
///     })
///     .static_method("zero", [] as [TypeRef; 0], |_| Ok(Value::Int(0)));
/// assert_eq!(counter.members().len(), 3);
/// ```
#[derive(Debug)]
pub struct TypeDef {
    name: TypeRef,
    supertype: Option<TypeRef>,
    members: Vec<MemberDef>,
}

impl TypeDef {
    /// Starts a definition for `name`.
    #[must_use]
    pub fn new(name: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            supertype: None,
            members: Vec::new(),
        }
    }

    /// Sets the supertype. It must already be defined in the runtime.
    #[must_use]
    pub fn extends(mut self, supertype: impl Into<TypeRef>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    /// Declares an instance method.
    #[must_use]
    pub fn method<F>(
        mut self,
        name: &str,
        params: impl IntoIterator<Item = impl Into<TypeRef>>,
        body: F,
    ) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        let target = MethodTarget::method(self.name.clone(), name, Signature::new(params));
        let missing = target.clone();
        self.members.push(MemberDef {
            target,
            dispatch: Dispatch::Instance,
            body: Arc::new(move |receiver: Option<&ObjectRef>, args: &[Value]| match receiver {
                Some(receiver) => body(receiver, args),
                None => Err(Throwable::new(RuntimeError::MissingReceiver(missing.clone()))),
            }),
        });
        self
    }

    /// Declares a static method.
    #[must_use]
    pub fn static_method<F>(
        mut self,
        name: &str,
        params: impl IntoIterator<Item = impl Into<TypeRef>>,
        body: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.members.push(MemberDef {
            target: MethodTarget::method(self.name.clone(), name, Signature::new(params)),
            dispatch: Dispatch::Static,
            body: Arc::new(move |_: Option<&ObjectRef>, args: &[Value]| body(args)),
        });
        self
    }

    /// Declares a constructor.
    #[must_use]
    pub fn constructor<F>(mut self, params: impl IntoIterator<Item = impl Into<TypeRef>>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<ObjectRef, Throwable> + Send + Sync + 'static,
    {
        self.members.push(MemberDef {
            target: MethodTarget::constructor(self.name.clone(), Signature::new(params)),
            dispatch: Dispatch::Constructor,
            body: Arc::new(move |_: Option<&ObjectRef>, args: &[Value]| {
                body(args).map(Value::Object)
            }),
        });
        self
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &TypeRef {
        &self.name
    }

    /// Returns the supertype, if any.
    #[must_use]
    pub fn supertype(&self) -> Option<&TypeRef> {
        self.supertype.as_ref()
    }

    /// Returns the declared members in declaration order.
    #[must_use]
    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }

    pub(crate) fn into_parts(self) -> (TypeRef, Option<TypeRef>, Vec<MemberDef>) {
        (self.name, self.supertype, self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_records_members_in_order() {
        let def = TypeDef::new("demo.Foo")
            .extends("demo.Base")
            .method("bar", [TypeRef::INT], |_, _| Ok(Value::Null))
            .method("bar", [TypeRef::STRING], |_, _| Ok(Value::Null))
            .constructor([] as [TypeRef; 0], |_| Err(Throwable::msg("unused")));

        assert_eq!(def.supertype(), Some(&TypeRef::named("demo.Base")));
        let targets: Vec<String> = def.members().iter().map(|m| m.target().to_string()).collect();
        assert_eq!(
            targets,
            vec!["demo.Foo#bar(int)", "demo.Foo#bar(string)", "demo.Foo#<init>()"]
        );
        assert_eq!(def.members()[2].dispatch(), Dispatch::Constructor);
    }

    #[test]
    fn instance_body_without_receiver_raises() {
        let def = TypeDef::new("demo.Foo").method("bar", [TypeRef::INT], |_, _| Ok(Value::Int(1)));
        let body = &def.members()[0].body;

        let error = body(None, &[Value::Int(1)]).expect_err("receiver required");
        assert!(matches!(
            error.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::MissingReceiver(_))
        ));
    }
}
