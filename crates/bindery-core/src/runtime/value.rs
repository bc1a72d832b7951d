//! Dynamic values exchanged with the host.

use std::fmt;
use std::sync::Arc;

use super::{NativeRef, ObjectHandle};

/// Runtime kind of a dynamic value, as reported by `Env::type_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `undefined`, also used for absent trailing arguments
    Undefined,
    /// `null`
    Null,
    /// `true` / `false`
    Boolean,
    /// IEEE-754 double
    Number,
    /// UTF-8 string
    String,
    /// Symbol
    Symbol,
    /// Any non-callable object
    Object,
    /// Callable object
    Function,
    /// Opaque external handle carrying a native pointer
    External,
}

impl ValueKind {
    /// Get a human-readable name for this kind.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Symbol => "symbol",
            ValueKind::Object => "object",
            ValueKind::Function => "function",
            ValueKind::External => "external",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A host symbol. Descriptions live in the `Env` that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(pub(crate) u32);

impl Symbol {
    /// Numeric id, unique within one `Env`.
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Well-known symbols every `Env` provides, in id order.
pub const WELL_KNOWN_SYMBOLS: &[&str] = &[
    "iterator",
    "asyncIterator",
    "hasInstance",
    "toPrimitive",
    "toStringTag",
];

/// Key of an object property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// String-named property
    Name(Arc<str>),
    /// Symbol-keyed property
    Symbol(Symbol),
}

impl PropertyKey {
    /// Create a string-named key.
    pub fn name(name: impl AsRef<str>) -> Self {
        PropertyKey::Name(Arc::from(name.as_ref()))
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::name(name)
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::Name(Arc::from(name))
    }
}

impl From<Symbol> for PropertyKey {
    fn from(symbol: Symbol) -> Self {
        PropertyKey::Symbol(symbol)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(name) => f.write_str(name),
            PropertyKey::Symbol(symbol) => match WELL_KNOWN_SYMBOLS.get(symbol.0 as usize) {
                Some(description) => write!(f, "[Symbol.{}]", description),
                None => write!(f, "[Symbol #{}]", symbol.0),
            },
        }
    }
}

/// A dynamic value.
///
/// Cloning a `Value` clones the handle, not the object behind it. Objects
/// and functions are owned by the `Env` heap and kept alive by reachability.
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value
    Number(f64),
    /// String value
    String(Arc<str>),
    /// Symbol value
    Symbol(Symbol),
    /// Object or function on the heap
    Object(ObjectHandle),
    /// External handle around a native pointer
    External(NativeRef),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Check if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the object handle, for objects and functions.
    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Value::Object(handle) => Some(*handle),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Symbol(s) => write!(f, "Symbol({})", s.0),
            Value::Object(h) => write!(f, "Object({:?})", h),
            Value::External(n) => write!(f, "External({:?})", n),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            // Externals compare by identity
            (Value::External(a), Value::External(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(symbol: Symbol) -> Self {
        Value::Symbol(symbol)
    }
}

impl From<NativeRef> for Value {
    fn from(native: NativeRef) -> Self {
        Value::External(native)
    }
}
