//! The reference runtime.
//!
//! [`Runtime`] holds a table of [`TypeDef`]s and plays both external roles the
//! engine needs:
//!
//! - as a [`Resolver`] it answers member lookups, including best-match
//!   resolution along the supertype chain;
//! - as an [`InstrumentationBackend`] it keeps one [`Dispatcher`] per
//!   intercepted member and routes calls through it.
//!
//! # Call Routing
//!
//! Every call entry point ([`invoke`](Runtime::invoke),
//! [`call_method`](Runtime::call_method), [`call_static`](Runtime::call_static),
//! [`construct`](Runtime::construct)) validates the receiver and arity, then
//! either runs the member body directly or, if the member is intercepted,
//! hands the body to the dispatcher as the original method. Linkage problems
//! are raised as a [`Throwable`] wrapping [`RuntimeError`].

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use interpose_engine::backend::{BackendHandle, Dispatcher, InstrumentationBackend};
use interpose_engine::error::InstallError;
use interpose_engine::resolve::{ResolveError, Resolver};
use interpose_engine::target::{MemberKind, MethodTarget, Signature, TypeRef};
use interpose_engine::value::{ObjectRef, Throwable, Value};
use parking_lot::RwLock;

use crate::error::RuntimeError;
use crate::types::{BodyFn, Dispatch, MemberDef, TypeDef};

const LOG_TARGET: &str = "interpose::runtime";

struct TypeEntry {
    supertype: Option<TypeRef>,
    members: Vec<Arc<MemberDef>>,
}

struct Intercept {
    handle: BackendHandle,
    dispatcher: Dispatcher,
}

type TypeTable = HashMap<TypeRef, TypeEntry>;

/// Which members a lookup considers.
#[derive(Clone, Copy)]
enum Wanted<'a> {
    Method(&'a str),
    Constructor,
}

impl Wanted<'_> {
    fn describe(self, args: &str) -> String {
        match self {
            Wanted::Method(name) => format!("{name}({args})"),
            Wanted::Constructor => format!("<init>({args})"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────────────────────────────────────

/// In-process managed runtime.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use interpose_engine::callback::before_fn;
/// use interpose_engine::registry::HookRegistry;
/// use interpose_engine::target::TypeRef;
/// use interpose_engine::value::{ObjectRef, Value};
/// use interpose_runtime::object::Instance;
/// use interpose_runtime::runtime::Runtime;
/// use interpose_runtime::types::TypeDef;
///
/// let runtime = Arc::new(Runtime::new());
/// runtime
///     .define(
///         TypeDef::new("demo.Calc")
///             .static_method("twice", [TypeRef::INT], |args| {
///                 Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2))
///             }),
///     )
///     .expect("valid definition");
///
/// let registry = HookRegistry::new(Arc::clone(&runtime), Arc::clone(&runtime));
/// let _handles = registry
///     .hook_all_before(&TypeRef::named("demo.Calc"), "twice", |ctx| {
///         ctx.set_arg(0, 21);
///     })
///     .expect("hooked");
///
/// let calc = TypeRef::named("demo.Calc");
/// let result = runtime.call_static(&calc, "twice", vec![Value::Int(1)]);
/// assert_eq!(result.ok(), Some(Value::Int(42)));
/// ```
#[derive(Default)]
pub struct Runtime {
    types: RwLock<TypeTable>,
    intercepts: RwLock<HashMap<MethodTarget, Intercept>>,
    next_handle: AtomicU64,
    fail_installs: AtomicBool,
}

impl Runtime {
    /// Creates an empty runtime. Primitive types need no definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken, the supertype is unknown, or two members
    /// share a signature.
    pub fn define(&self, def: TypeDef) -> Result<TypeRef, RuntimeError> {
        let (name, supertype, members) = def.into_parts();
        let mut types = self.types.write();

        if types.contains_key(&name) {
            return Err(RuntimeError::DuplicateType(name));
        }
        if let Some(supertype) = &supertype
            && !types.contains_key(supertype)
        {
            return Err(RuntimeError::UnknownSupertype {
                ty: name,
                supertype: supertype.clone(),
            });
        }
        for (index, member) in members.iter().enumerate() {
            if members[..index].iter().any(|other| other.target == member.target) {
                return Err(RuntimeError::DuplicateMember(member.target.clone()));
            }
        }

        tracing::debug!(
            target: LOG_TARGET,
            ty = %name,
            supertype = ?supertype.as_ref().map(TypeRef::name),
            members = members.len(),
            "type defined"
        );
        types.insert(
            name.clone(),
            TypeEntry {
                supertype,
                members: members.into_iter().map(Arc::new).collect(),
            },
        );
        Ok(name)
    }

    /// Returns `true` if `name` has been defined.
    #[must_use]
    pub fn is_defined(&self, name: &TypeRef) -> bool {
        self.types.read().contains_key(name)
    }

    /// Returns the supertype of `name`.
    #[must_use]
    pub fn supertype_of(&self, name: &TypeRef) -> Option<TypeRef> {
        self.types.read().get(name).and_then(|entry| entry.supertype.clone())
    }

    /// Returns `true` if a value of type `from` can be passed where `to` is
    /// expected. `None` stands for `null`.
    #[must_use]
    pub fn is_assignable(&self, from: Option<&TypeRef>, to: &TypeRef) -> bool {
        assignable(&self.types.read(), from, to)
    }

    /// Makes every following install fail, to exercise error paths.
    pub fn set_fail_installs(&self, fail: bool) {
        self.fail_installs.store(fail, Ordering::SeqCst);
    }

    /// Returns `true` if calls of `target` currently go through a dispatcher.
    #[must_use]
    pub fn is_intercepted(&self, target: &MethodTarget) -> bool {
        self.intercepts.read().contains_key(target)
    }

    /// Number of currently intercepted members.
    #[must_use]
    pub fn intercept_count(&self) -> usize {
        self.intercepts.read().len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Calls exactly `target`, with no overload or virtual resolution.
    pub fn invoke(
        &self,
        target: &MethodTarget,
        receiver: Option<ObjectRef>,
        args: Vec<Value>,
    ) -> Result<Value, Throwable> {
        let member = self.member(target).map_err(Throwable::new)?;
        self.check_call(&member, receiver.as_ref(), &args)
            .map_err(Throwable::new)?;

        let dispatcher = self
            .intercepts
            .read()
            .get(target)
            .map(|intercept| intercept.dispatcher.clone());
        let body: &BodyFn = member.body.as_ref();
        match dispatcher {
            Some(dispatcher) => dispatcher.dispatch(receiver, args, &body),
            None => body(receiver.as_ref(), &args),
        }
    }

    /// Calls the most specific method named `name` applicable to the
    /// receiver's runtime type and the argument types.
    pub fn call_method(
        &self,
        receiver: &ObjectRef,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, Throwable> {
        let target = self
            .find_best_match(&receiver.runtime_type(), name, &arg_types(&args))
            .map_err(|error| Throwable::new(RuntimeError::from(error)))?;
        self.invoke(&target, Some(receiver.clone()), args)
    }

    /// Calls the most specific static method of `owner` named `name`.
    pub fn call_static(
        &self,
        owner: &TypeRef,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, Throwable> {
        let target = self
            .find_best_match(owner, name, &arg_types(&args))
            .map_err(|error| Throwable::new(RuntimeError::from(error)))?;
        self.invoke(&target, None, args)
    }

    /// Creates an instance of `owner` with the best-matching constructor.
    pub fn construct(&self, owner: &TypeRef, args: Vec<Value>) -> Result<ObjectRef, Throwable> {
        let target = self
            .select(owner, Wanted::Constructor, &arg_types(&args))
            .map_err(|error| Throwable::new(RuntimeError::from(error)))?;
        match self.invoke(&target, None, args)? {
            Value::Object(object) => Ok(object),
            _ => Err(Throwable::new(RuntimeError::NotAnObject(target))),
        }
    }

    fn member(&self, target: &MethodTarget) -> Result<Arc<MemberDef>, RuntimeError> {
        self.types
            .read()
            .get(target.owner())
            .and_then(|entry| entry.members.iter().find(|m| m.target == *target).cloned())
            .ok_or_else(|| RuntimeError::NoSuchMember(target.clone()))
    }

    fn check_call(
        &self,
        member: &MemberDef,
        receiver: Option<&ObjectRef>,
        args: &[Value],
    ) -> Result<(), RuntimeError> {
        let target = &member.target;
        let expected = target.signature().arity();
        if args.len() != expected {
            return Err(RuntimeError::ArityMismatch {
                target: target.clone(),
                expected,
                actual: args.len(),
            });
        }

        match (member.dispatch, receiver) {
            (Dispatch::Instance, None) => Err(RuntimeError::MissingReceiver(target.clone())),
            (Dispatch::Instance, Some(receiver)) => {
                let actual = receiver.runtime_type();
                if self.is_assignable(Some(&actual), target.owner()) {
                    Ok(())
                } else {
                    Err(RuntimeError::IncompatibleReceiver {
                        target: target.clone(),
                        actual,
                    })
                }
            }
            (Dispatch::Static | Dispatch::Constructor, Some(_)) => {
                Err(RuntimeError::UnexpectedReceiver(target.clone()))
            }
            (Dispatch::Static | Dispatch::Constructor, None) => Ok(()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// Best-match selection.
    ///
    /// Methods are searched on `owner` and then up the supertype chain; a
    /// method hides any supertype method with the same signature.
    /// Constructors are searched on `owner` only. Among applicable members
    /// the one whose parameters are all assignable to every other
    /// candidate's parameters wins.
    fn select(
        &self,
        owner: &TypeRef,
        wanted: Wanted<'_>,
        arg_types: &[Option<TypeRef>],
    ) -> Result<MethodTarget, ResolveError> {
        let types = self.types.read();
        if !types.contains_key(owner) {
            return Err(ResolveError::TypeNotFound(owner.clone()));
        }

        let mut candidates: Vec<&MethodTarget> = Vec::new();
        for ty in lineage(&types, owner) {
            let Some(entry) = types.get(&ty) else {
                break;
            };
            for member in &entry.members {
                let target = &member.target;
                let wanted_kind = match (wanted, target.kind()) {
                    (Wanted::Method(name), MemberKind::Method(declared)) => **declared == *name,
                    (Wanted::Constructor, MemberKind::Constructor) => true,
                    _ => false,
                };
                if !wanted_kind
                    || candidates.iter().any(|c| c.signature() == target.signature())
                    || !applicable(&types, target.signature(), arg_types)
                {
                    continue;
                }
                candidates.push(target);
            }
            if matches!(wanted, Wanted::Constructor) {
                break;
            }
        }

        let best: Vec<&MethodTarget> = candidates
            .iter()
            .copied()
            .filter(|a| {
                candidates
                    .iter()
                    .all(|b| more_specific(&types, a.signature(), b.signature()))
            })
            .collect();

        match (best.as_slice(), candidates.len()) {
            ([winner], _) => Ok((*winner).clone()),
            (_, 0) => Err(ResolveError::NotFound {
                owner: owner.clone(),
                member: wanted.describe(&describe_args(arg_types)),
            }),
            (_, candidates) => Err(ResolveError::Ambiguous {
                owner: owner.clone(),
                member: wanted.describe(&describe_args(arg_types)),
                candidates,
            }),
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("types", &self.types.read().len())
            .field("intercepts", &self.intercept_count())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Assignability
// ─────────────────────────────────────────────────────────────────────────────

/// `owner` followed by its supertypes, nearest first.
fn lineage(types: &TypeTable, owner: &TypeRef) -> Vec<TypeRef> {
    let mut chain = vec![owner.clone()];
    let mut current = types.get(owner).and_then(|entry| entry.supertype.clone());
    while let Some(ty) = current {
        current = types.get(&ty).and_then(|entry| entry.supertype.clone());
        chain.push(ty);
    }
    chain
}

fn assignable(types: &TypeTable, from: Option<&TypeRef>, to: &TypeRef) -> bool {
    match from {
        None => !to.is_primitive(),
        Some(from) => lineage(types, from).contains(to),
    }
}

fn applicable(types: &TypeTable, params: &Signature, arg_types: &[Option<TypeRef>]) -> bool {
    params.arity() == arg_types.len()
        && params
            .params()
            .iter()
            .zip(arg_types)
            .all(|(param, arg)| assignable(types, arg.as_ref(), param))
}

fn more_specific(types: &TypeTable, a: &Signature, b: &Signature) -> bool {
    a.params()
        .iter()
        .zip(b.params())
        .all(|(a, b)| assignable(types, Some(a), b))
}

fn arg_types(args: &[Value]) -> Vec<Option<TypeRef>> {
    args.iter().map(Value::runtime_type).collect()
}

fn describe_args(arg_types: &[Option<TypeRef>]) -> String {
    arg_types
        .iter()
        .map(|ty| ty.as_ref().map_or("null", TypeRef::name))
        .collect::<Vec<_>>()
        .join(", ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

impl Resolver for Runtime {
    fn declared_members(&self, owner: &TypeRef) -> Result<Vec<MethodTarget>, ResolveError> {
        self.types
            .read()
            .get(owner)
            .map(|entry| entry.members.iter().map(|m| m.target.clone()).collect())
            .ok_or_else(|| ResolveError::TypeNotFound(owner.clone()))
    }

    fn find_exact(
        &self,
        owner: &TypeRef,
        name: &str,
        params: &Signature,
    ) -> Result<MethodTarget, ResolveError> {
        let types = self.types.read();
        if !types.contains_key(owner) {
            return Err(ResolveError::TypeNotFound(owner.clone()));
        }
        lineage(&types, owner)
            .iter()
            .filter_map(|ty| types.get(ty))
            .flat_map(|entry| entry.members.iter())
            .find(|m| m.target.name() == Some(name) && m.target.signature() == params)
            .map(|m| m.target.clone())
            .ok_or_else(|| ResolveError::method_not_found(owner, name, params))
    }

    fn find_best_match(
        &self,
        owner: &TypeRef,
        name: &str,
        arg_types: &[Option<TypeRef>],
    ) -> Result<MethodTarget, ResolveError> {
        self.select(owner, Wanted::Method(name), arg_types)
    }

    fn find_constructor(
        &self,
        owner: &TypeRef,
        params: &Signature,
    ) -> Result<MethodTarget, ResolveError> {
        self.types
            .read()
            .get(owner)
            .ok_or_else(|| ResolveError::TypeNotFound(owner.clone()))?
            .members
            .iter()
            .find(|m| m.target.is_constructor() && m.target.signature() == params)
            .map(|m| m.target.clone())
            .ok_or_else(|| ResolveError::constructor_not_found(owner, params))
    }

    fn contains(&self, target: &MethodTarget) -> bool {
        self.member(target).is_ok()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// InstrumentationBackend
// ─────────────────────────────────────────────────────────────────────────────

impl InstrumentationBackend for Runtime {
    fn install_intercept(
        &self,
        target: &MethodTarget,
        dispatcher: Dispatcher,
    ) -> Result<BackendHandle, InstallError> {
        if self.fail_installs.load(Ordering::SeqCst) {
            return Err(InstallError::failed(target, "installs disabled"));
        }
        if self.member(target).is_err() {
            return Err(InstallError::Unsupported {
                target: target.clone(),
            });
        }

        let handle = BackendHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.intercepts
            .write()
            .insert(target.clone(), Intercept { handle, dispatcher });
        tracing::debug!(target: LOG_TARGET, member = %target, handle = handle.raw(), "intercept installed");
        Ok(handle)
    }

    fn uninstall_intercept(&self, handle: BackendHandle) {
        self.intercepts.write().retain(|target, intercept| {
            let keep = intercept.handle != handle;
            if !keep {
                tracing::debug!(target: LOG_TARGET, member = %target, handle = handle.raw(), "intercept removed");
            }
            keep
        });
    }
}
