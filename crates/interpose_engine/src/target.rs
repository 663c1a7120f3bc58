//! Resolved member targets.
//!
//! A [`MethodTarget`] names exactly one interceptable member of the managed
//! runtime: a method (owner + name + parameter signature) or a constructor
//! (owner + parameter signature). Return types are not part of the identity.
//! Targets are produced by a [`Resolver`](crate::resolve::Resolver) and are
//! immutable afterwards.

use core::fmt;
use std::borrow::Cow;
use std::sync::Arc;

/// Name of a type in the managed runtime.
///
/// Well-known primitive types are available as constants so they can be used
/// in `const` contexts and in patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(Cow<'static, str>);

impl TypeRef {
    /// Boolean primitive.
    pub const BOOL: TypeRef = TypeRef::from_static("bool");
    /// Integer primitive.
    pub const INT: TypeRef = TypeRef::from_static("int");
    /// Floating point primitive.
    pub const FLOAT: TypeRef = TypeRef::from_static("float");
    /// String type.
    pub const STRING: TypeRef = TypeRef::from_static("string");
    /// Return type of members that produce no value.
    pub const VOID: TypeRef = TypeRef::from_static("void");

    /// Creates a type reference from a static name.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a type reference from any name.
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the primitive types, which cannot hold `null`.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        *self == Self::BOOL || *self == Self::INT || *self == Self::FLOAT
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeRef {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Ordered parameter types of a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature(Arc<[TypeRef]>);

impl Signature {
    /// Creates a signature from parameter types.
    #[must_use]
    pub fn new(params: impl IntoIterator<Item = impl Into<TypeRef>>) -> Self {
        Self(params.into_iter().map(Into::into).collect())
    }

    /// The empty signature.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the parameter types.
    #[must_use]
    pub fn params(&self) -> &[TypeRef] {
        &self.0
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

/// Kind of an interceptable member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// A named method.
    Method(Arc<str>),
    /// A constructor.
    Constructor,
}

/// One resolved, interceptable member.
///
/// Cheap to clone; two targets are equal when owner, kind, and signature all
/// match.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MethodTarget(Arc<TargetInner>);

#[derive(Debug, PartialEq, Eq, Hash)]
struct TargetInner {
    owner: TypeRef,
    kind: MemberKind,
    signature: Signature,
}

impl MethodTarget {
    /// Creates a method target.
    #[must_use]
    pub fn method(owner: impl Into<TypeRef>, name: impl Into<Arc<str>>, signature: Signature) -> Self {
        Self(Arc::new(TargetInner {
            owner: owner.into(),
            kind: MemberKind::Method(name.into()),
            signature,
        }))
    }

    /// Creates a constructor target.
    #[must_use]
    pub fn constructor(owner: impl Into<TypeRef>, signature: Signature) -> Self {
        Self(Arc::new(TargetInner {
            owner: owner.into(),
            kind: MemberKind::Constructor,
            signature,
        }))
    }

    /// Returns the declaring type.
    #[must_use]
    pub fn owner(&self) -> &TypeRef {
        &self.0.owner
    }

    /// Returns the member kind.
    #[must_use]
    pub fn kind(&self) -> &MemberKind {
        &self.0.kind
    }

    /// Returns the method name, or `None` for constructors.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.0.kind {
            MemberKind::Method(name) => Some(name),
            MemberKind::Constructor => None,
        }
    }

    /// Returns `true` if this target is a constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        matches!(self.0.kind, MemberKind::Constructor)
    }

    /// Returns the parameter signature.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.0.signature
    }
}

impl fmt::Display for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            MemberKind::Method(name) => write!(f, "{}#{}{}", self.0.owner, name, self.0.signature),
            MemberKind::Constructor => write!(f, "{}#<init>{}", self.0.owner, self.0.signature),
        }
    }
}

impl fmt::Debug for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodTarget({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_compare_by_owner_name_and_signature() {
        let a = MethodTarget::method("demo.Foo", "bar", Signature::new([TypeRef::INT]));
        let b = MethodTarget::method("demo.Foo", "bar", Signature::new([TypeRef::INT]));
        let c = MethodTarget::method("demo.Foo", "bar", Signature::new([TypeRef::STRING]));
        let d = MethodTarget::method("demo.Other", "bar", Signature::new([TypeRef::INT]));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn constructor_is_distinct_from_method() {
        let ctor = MethodTarget::constructor("demo.Foo", Signature::empty());
        let method = MethodTarget::method("demo.Foo", "<init>", Signature::empty());

        assert!(ctor.is_constructor());
        assert_eq!(ctor.name(), None);
        assert_ne!(ctor, method);
    }

    #[test]
    fn display_formats() {
        let target = MethodTarget::method(
            "demo.Foo",
            "bar",
            Signature::new([TypeRef::INT, TypeRef::STRING]),
        );
        assert_eq!(target.to_string(), "demo.Foo#bar(int, string)");

        let ctor = MethodTarget::constructor("demo.Foo", Signature::empty());
        assert_eq!(ctor.to_string(), "demo.Foo#<init>()");
    }

    #[test]
    fn primitive_types() {
        assert!(TypeRef::INT.is_primitive());
        assert!(!TypeRef::STRING.is_primitive());
        assert!(!TypeRef::named("demo.Foo").is_primitive());
    }
}
