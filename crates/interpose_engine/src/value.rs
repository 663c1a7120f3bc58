//! Runtime values flowing through intercepted calls.
//!
//! Arguments, receivers, and results of intercepted members are all
//! [`Value`]s. Heap objects of the managed runtime are represented by
//! [`ObjectRef`], a shared handle compared by identity rather than equality,
//! and errors raised by the runtime are represented by [`Throwable`].
//!
//! # Identity
//!
//! Two `ObjectRef`s are equal only when they point at the same allocation.
//! The [`ObjectId`] of a live object is stable for as long as any strong or
//! weak reference to it exists, which is what the
//! [`AdditionalFieldStore`](crate::fields::AdditionalFieldStore) relies on.

use core::fmt;
use std::sync::{Arc, Weak};

use downcast_rs::{DowncastSync, impl_downcast};

use crate::target::TypeRef;

// ─────────────────────────────────────────────────────────────────────────────
// ManagedObject
// ─────────────────────────────────────────────────────────────────────────────

/// An object living in the managed runtime.
///
/// Concrete object types are plain Rust structs; the engine only needs to
/// know their runtime type name. Use [`ObjectRef::downcast_ref`] to get the
/// concrete type back inside a callback.
///
/// # Example
///
/// ```
/// use interpose_engine::target::TypeRef;
/// use interpose_engine::value::{ManagedObject, ObjectRef};
///
/// #[derive(Debug)]
/// struct Counter {
///     start: i64,
/// }
///
/// impl ManagedObject for Counter {
///     fn runtime_type(&self) -> TypeRef {
///         TypeRef::named("demo.Counter")
///     }
/// }
///
/// let object = ObjectRef::new(Counter { start: 7 });
/// assert_eq!(object.downcast_ref::<Counter>().map(|c| c.start), Some(7));
/// ```
pub trait ManagedObject: DowncastSync + fmt::Debug {
    /// Returns the runtime type of this object.
    fn runtime_type(&self) -> TypeRef;
}

impl_downcast!(sync ManagedObject);

/// Identity of a managed object, derived from its allocation address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Returns the raw identity value.
    #[must_use]
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj@{:#x}", self.0)
    }
}

/// Shared, identity-compared handle to a [`ManagedObject`].
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn ManagedObject>);

impl ObjectRef {
    /// Wraps a new object.
    #[must_use]
    pub fn new<T: ManagedObject>(object: T) -> Self {
        Self(Arc::new(object))
    }

    /// Wraps an already shared object.
    #[must_use]
    pub fn from_arc(object: Arc<dyn ManagedObject>) -> Self {
        Self(object)
    }

    /// Returns the identity of this object.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        ObjectId(Arc::as_ptr(&self.0).cast::<()>().addr())
    }

    /// Returns `true` if both handles point at the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.id() == other.id()
    }

    /// Returns the runtime type of the referenced object.
    #[must_use]
    pub fn runtime_type(&self) -> TypeRef {
        self.0.runtime_type()
    }

    /// Returns the concrete object if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: ManagedObject>(&self) -> Option<&T> {
        self.0.as_ref().downcast_ref::<T>()
    }

    /// Returns `true` if the concrete object is a `T`.
    #[must_use]
    pub fn is<T: ManagedObject>(&self) -> bool {
        self.0.as_ref().is::<T>()
    }

    /// Creates a weak handle that does not keep the object alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Arc::downgrade(&self.0))
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("id", &self.id())
            .field("object", &self.0)
            .finish()
    }
}

/// Weak counterpart of [`ObjectRef`].
#[derive(Clone)]
pub struct WeakObjectRef(Weak<dyn ManagedObject>);

impl WeakObjectRef {
    /// Returns a strong handle if the object is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    /// Returns `true` while at least one strong handle exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Returns the identity of the referenced object, alive or not.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        ObjectId(Weak::as_ptr(&self.0).cast::<()>().addr())
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObjectRef")
            .field("id", &self.id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// A value of the managed runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// The null reference, also used for `void` returns.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// An immutable string.
    Str(Arc<str>),
    /// A heap object.
    Object(ObjectRef),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float, if this is one.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the object handle, if this is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the runtime type of the value.
    ///
    /// `Null` has no type of its own and is assignable to any reference type,
    /// so it returns `None`.
    #[must_use]
    pub fn runtime_type(&self) -> Option<TypeRef> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(TypeRef::BOOL),
            Value::Int(_) => Some(TypeRef::INT),
            Value::Float(_) => Some(TypeRef::FLOAT),
            Value::Str(_) => Some(TypeRef::STRING),
            Value::Object(o) => Some(o.runtime_type()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Throwable
// ─────────────────────────────────────────────────────────────────────────────

/// An error raised inside the managed runtime.
///
/// Cloning a `Throwable` shares the underlying error, so the identity of an
/// error thrown by an original method body survives the dispatch protocol
/// unchanged unless a hook replaces it.
#[derive(Clone)]
pub struct Throwable(Arc<dyn core::error::Error + Send + Sync + 'static>);

impl Throwable {
    /// Wraps an error.
    #[must_use]
    pub fn new<E>(error: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Creates a throwable carrying only a message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(RuntimeFault(message.into()))
    }

    /// Returns the concrete error if it is an `E`.
    #[must_use]
    pub fn downcast_ref<E: core::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Returns `true` if both handles share the same error instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Throwable) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the wrapped error.
    #[must_use]
    pub fn as_error(&self) -> &(dyn core::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl fmt::Debug for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Message-only error produced by [`Throwable::msg`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RuntimeFault(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Widget {
        size: u32,
    }

    impl ManagedObject for Widget {
        fn runtime_type(&self) -> TypeRef {
            TypeRef::named("test.Widget")
        }
    }

    #[test]
    fn object_equality_is_identity() {
        let a = ObjectRef::new(Widget { size: 1 });
        let b = ObjectRef::new(Widget { size: 1 });
        let a2 = a.clone();

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(a.id(), a2.id());
    }

    #[test]
    fn object_downcast() {
        let obj = ObjectRef::new(Widget { size: 3 });
        assert!(obj.is::<Widget>());
        assert_eq!(obj.downcast_ref::<Widget>().map(|w| w.size), Some(3));
        assert_eq!(obj.runtime_type(), TypeRef::named("test.Widget"));
    }

    #[test]
    fn weak_handle_tracks_liveness() {
        let obj = ObjectRef::new(Widget { size: 0 });
        let weak = obj.downgrade();
        assert!(weak.is_alive());
        assert_eq!(weak.id(), obj.id());
        assert!(weak.upgrade().is_some());

        drop(obj);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn value_runtime_types() {
        assert_eq!(Value::from(5).runtime_type(), Some(TypeRef::INT));
        assert_eq!(Value::from("x").runtime_type(), Some(TypeRef::STRING));
        assert_eq!(Value::from(true).runtime_type(), Some(TypeRef::BOOL));
        assert_eq!(Value::Null.runtime_type(), None);
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn throwable_preserves_identity_and_type() {
        let thrown = Throwable::msg("boom");
        let shared = thrown.clone();
        assert!(thrown.ptr_eq(&shared));
        assert!(!thrown.ptr_eq(&Throwable::msg("boom")));
        assert_eq!(
            thrown.downcast_ref::<RuntimeFault>(),
            Some(&RuntimeFault("boom".into()))
        );
        assert_eq!(thrown.to_string(), "boom");
    }
}
