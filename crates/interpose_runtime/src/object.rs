//! Dynamic object instances.

use hashbrown::HashMap;
use interpose_engine::target::TypeRef;
use interpose_engine::value::{ManagedObject, Value};
use parking_lot::RwLock;

/// A runtime object with a type name and named fields.
///
/// Constructors of the reference runtime usually return one of these wrapped
/// in an [`ObjectRef`](interpose_engine::value::ObjectRef). Embedders that
/// want typed objects can implement [`ManagedObject`] on their own structs
/// instead.
#[derive(Debug)]
pub struct Instance {
    ty: TypeRef,
    fields: RwLock<HashMap<String, Value>>,
}

impl Instance {
    /// Creates an instance of `ty` with no fields set.
    #[must_use]
    pub fn new(ty: impl Into<TypeRef>) -> Self {
        Self {
            ty: ty.into(),
            fields: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        self.fields.read().get(field).cloned()
    }

    /// Sets a field, returning the previous value.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Option<Value> {
        self.fields.write().insert(field.to_owned(), value.into())
    }
}

impl ManagedObject for Instance {
    fn runtime_type(&self) -> TypeRef {
        self.ty.clone()
    }
}
