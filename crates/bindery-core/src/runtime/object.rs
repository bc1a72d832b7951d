//! Host objects, functions and property slots.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use super::{Env, ObjectHandle, PropertyKey, Value, Wrapped};
use crate::Exception;

bitflags! {
    /// Attributes of a property slot.
    ///
    /// An empty set is read-only, hidden and fixed, matching a property
    /// defined with default attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyAttributes: u32 {
        /// Value can be replaced by assignment
        const WRITABLE = 1 << 0;
        /// Property shows up in enumeration
        const ENUMERABLE = 1 << 1;
        /// Property can be redefined or deleted
        const CONFIGURABLE = 1 << 2;
        /// Placed on the class constructor instead of the prototype
        const STATIC = 1 << 10;
    }
}

impl PropertyAttributes {
    /// Attributes of a property created by plain assignment.
    pub const ASSIGNED: PropertyAttributes = PropertyAttributes::WRITABLE
        .union(PropertyAttributes::ENUMERABLE)
        .union(PropertyAttributes::CONFIGURABLE);
}

/// Native body of a host function.
pub type HostCallback =
    Arc<dyn Fn(&mut Env, &CallFrame<'_>) -> Result<Value, Exception> + Send + Sync>;

/// Everything a host function sees about one call.
#[derive(Debug)]
pub struct CallFrame<'a> {
    /// The function being called.
    pub callee: ObjectHandle,
    /// Receiver. For constructor calls, the freshly created instance.
    pub this: Value,
    /// Arguments in call order.
    pub args: &'a [Value],
    /// Whether this is a `new` call.
    pub is_construct: bool,
}

impl CallFrame<'_> {
    /// Argument at `index`, or undefined past the end.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }
}

/// A callable host object.
#[derive(Clone)]
pub struct HostFunction {
    /// Function name, as shown in diagnostics.
    pub name: Arc<str>,
    pub(crate) callback: HostCallback,
    /// Class constructors reject plain calls.
    pub is_class: bool,
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("is_class", &self.is_class)
            .finish_non_exhaustive()
    }
}

/// What sort of object lives in a heap slot.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Dense array
    Array(Vec<Value>),
    /// Callable
    Function(HostFunction),
}

/// One property of a host object.
#[derive(Debug, Clone)]
pub enum PropertySlot {
    /// Plain value
    Data {
        /// Stored value
        value: Value,
        /// Slot attributes
        attributes: PropertyAttributes,
    },
    /// Getter and/or setter pair
    Accessor {
        /// Function called on read
        getter: Option<Value>,
        /// Function called on write
        setter: Option<Value>,
        /// Slot attributes
        attributes: PropertyAttributes,
    },
}

impl PropertySlot {
    /// Create a data slot.
    pub fn data(value: impl Into<Value>, attributes: PropertyAttributes) -> Self {
        PropertySlot::Data {
            value: value.into(),
            attributes,
        }
    }

    /// Slot attributes.
    pub fn attributes(&self) -> PropertyAttributes {
        match self {
            PropertySlot::Data { attributes, .. } | PropertySlot::Accessor { attributes, .. } => {
                *attributes
            }
        }
    }

    fn trace(&self, out: &mut Vec<ObjectHandle>) {
        match self {
            PropertySlot::Data { value, .. } => trace_value(value, out),
            PropertySlot::Accessor { getter, setter, .. } => {
                getter.iter().chain(setter.iter()).for_each(|v| trace_value(v, out))
            }
        }
    }
}

fn trace_value(value: &Value, out: &mut Vec<ObjectHandle>) {
    if let Value::Object(handle) = value {
        out.push(*handle);
    }
}

/// A host object as stored on the heap.
#[derive(Debug)]
pub struct HostObject {
    /// Object variety.
    pub kind: ObjectKind,
    /// Prototype used for property lookup.
    pub prototype: Option<ObjectHandle>,
    /// Own properties in definition order.
    pub(crate) properties: IndexMap<PropertyKey, PropertySlot, FxBuildHasher>,
    pub(crate) wrapped: Option<Wrapped>,
}

impl HostObject {
    /// Create a plain object.
    pub fn ordinary(prototype: Option<ObjectHandle>) -> Self {
        Self::with_kind(ObjectKind::Ordinary, prototype)
    }

    /// Create an object of the given kind.
    pub fn with_kind(kind: ObjectKind, prototype: Option<ObjectHandle>) -> Self {
        Self {
            kind,
            prototype,
            properties: IndexMap::default(),
            wrapped: None,
        }
    }

    /// Whether the object is callable.
    pub fn is_function(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    /// Own property slot by key.
    pub fn property(&self, key: &PropertyKey) -> Option<&PropertySlot> {
        self.properties.get(key)
    }

    /// Own property keys, in definition order.
    pub fn keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.properties.keys()
    }

    /// Whether a native pointer is attached.
    pub fn is_wrapped(&self) -> bool {
        self.wrapped.is_some()
    }

    /// Heap handles directly reachable from this object.
    pub fn trace(&self, out: &mut Vec<ObjectHandle>) {
        if let Some(prototype) = self.prototype {
            out.push(prototype);
        }
        if let ObjectKind::Array(elements) = &self.kind {
            elements.iter().for_each(|v| trace_value(v, out));
        }
        for slot in self.properties.values() {
            slot.trace(out);
        }
    }
}
