//! Member lookup boundary.
//!
//! The engine never inspects the managed runtime itself. It asks a
//! [`Resolver`] to turn owner types, names, and signatures into
//! [`MethodTarget`]s. Resolvers are pure lookups with no side effects.

use thiserror::Error;

use crate::target::{MemberKind, MethodTarget, Signature, TypeRef};

/// Errors produced by member lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The owner type does not exist.
    #[error("type not found: {0}")]
    TypeNotFound(TypeRef),

    /// No member matches.
    #[error("member not found: {owner}#{member}")]
    NotFound {
        /// The searched type.
        owner: TypeRef,
        /// Name and signature that were looked up.
        member: String,
    },

    /// More than one member matches equally well.
    #[error("ambiguous member {owner}#{member}: {candidates} candidates")]
    Ambiguous {
        /// The searched type.
        owner: TypeRef,
        /// Name and argument types that were looked up.
        member: String,
        /// Number of equally good matches.
        candidates: usize,
    },

    /// The member exists but is of a kind that cannot be hooked.
    #[error("unsupported member {owner}#{member}: {reason}")]
    Unsupported {
        /// The searched type.
        owner: TypeRef,
        /// The offending member.
        member: String,
        /// Why it is unsupported.
        reason: String,
    },
}

impl ResolveError {
    /// Creates a [`NotFound`](Self::NotFound) for a method lookup.
    pub fn method_not_found(owner: &TypeRef, name: &str, params: &Signature) -> Self {
        Self::NotFound {
            owner: owner.clone(),
            member: format!("{name}{params}"),
        }
    }

    /// Creates a [`NotFound`](Self::NotFound) for a constructor lookup.
    pub fn constructor_not_found(owner: &TypeRef, params: &Signature) -> Self {
        Self::NotFound {
            owner: owner.clone(),
            member: format!("<init>{params}"),
        }
    }
}

/// Looks up interceptable members of a managed runtime.
pub trait Resolver: Send + Sync + 'static {
    /// Returns every method and constructor declared directly on `owner`,
    /// excluding inherited members, in declaration order.
    fn declared_members(&self, owner: &TypeRef) -> Result<Vec<MethodTarget>, ResolveError>;

    /// Finds the method declared on `owner` (or a supertype) with exactly
    /// this name and signature.
    fn find_exact(
        &self,
        owner: &TypeRef,
        name: &str,
        params: &Signature,
    ) -> Result<MethodTarget, ResolveError>;

    /// Finds the most specific method named `name` that accepts arguments of
    /// the given types.
    ///
    /// `None` stands for a `null` argument, which matches any reference type.
    fn find_best_match(
        &self,
        owner: &TypeRef,
        name: &str,
        arg_types: &[Option<TypeRef>],
    ) -> Result<MethodTarget, ResolveError>;

    /// Finds the constructor of `owner` with exactly this signature.
    fn find_constructor(&self, owner: &TypeRef, params: &Signature) -> Result<MethodTarget, ResolveError>;

    /// Returns the methods declared directly on `owner` named `name`.
    ///
    /// Each overload is a separate target. Return types are ignored.
    fn declared_methods_named(
        &self,
        owner: &TypeRef,
        name: &str,
    ) -> Result<Vec<MethodTarget>, ResolveError> {
        Ok(self
            .declared_members(owner)?
            .into_iter()
            .filter(|target| target.name() == Some(name))
            .collect())
    }

    /// Returns `true` if `target` refers to a member that exists.
    fn contains(&self, target: &MethodTarget) -> bool {
        match target.kind() {
            MemberKind::Method(name) => self
                .find_exact(target.owner(), name, target.signature())
                .is_ok_and(|found| found == *target),
            MemberKind::Constructor => self
                .find_constructor(target.owner(), target.signature())
                .is_ok(),
        }
    }
}
