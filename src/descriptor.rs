//! Descriptor tables: the declarative metadata bound classes are built from.
//!
//! Descriptors are plain data plus a callback. They are assembled once at
//! startup with the builder methods below, handed to
//! [`ClassBinder::bind`](crate::ClassBinder::bind), and never change after
//! that.
//!
//! # Example
//!
//! ```
//! use bindery::prelude::*;
//!
//! let ctor = MethodDescriptor::constructor("HttpRequest")
//!     .arg(ValueKind::String)
//!     .arg(ValueKind::String);
//!
//! let method = PropertyDescriptor::named("method")
//!     .kind(ValueKind::String)
//!     .getter(|_env, _info| Ok(Value::from("GET")));
//!
//! let add = MethodDescriptor::named("add")
//!     .arg(ValueKind::String)
//!     .arg(ValueKind::String)
//!     .callback(|_env, _info| Ok(Value::Undefined));
//! # let _ = (ctor, method, add);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bindery_core::{Env, PropertyAttributes, PropertyKey, TypeHash, Value, ValueKind};

use crate::callback::CallbackInfo;
use crate::error::BindError;

/// Fixed argument capacity of every descriptor and call.
pub const METHOD_MAX_ARGS: usize = 9;

/// Native body of a constructor, method or getter.
pub trait NativeCallback: Send + Sync {
    /// Run the body.
    fn call(&self, env: &mut Env, info: &CallbackInfo<'_>) -> Result<Value, BindError>;
}

impl<F> NativeCallback for F
where
    F: Fn(&mut Env, &CallbackInfo<'_>) -> Result<Value, BindError> + Send + Sync,
{
    fn call(&self, env: &mut Env, info: &CallbackInfo<'_>) -> Result<Value, BindError> {
        (self)(env, info)
    }
}

/// Native body of a property setter. The new value is argument 0.
pub trait NativeSetter: Send + Sync {
    /// Run the body.
    fn call(&self, env: &mut Env, info: &CallbackInfo<'_>) -> Result<(), BindError>;
}

impl<F> NativeSetter for F
where
    F: Fn(&mut Env, &CallbackInfo<'_>) -> Result<(), BindError> + Send + Sync,
{
    fn call(&self, env: &mut Env, info: &CallbackInfo<'_>) -> Result<(), BindError> {
        (self)(env, info)
    }
}

/// How a member is named on the host side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Plain string name.
    Name(Cow<'static, str>),
    /// Well-known symbol, by description (`"iterator"` is `Symbol.iterator`).
    Symbol(Cow<'static, str>),
}

impl Identity {
    /// The text of the identity, without decoration.
    pub fn as_str(&self) -> &str {
        match self {
            Identity::Name(name) | Identity::Symbol(name) => name,
        }
    }

    /// Identity hash of this member within `owner`.
    pub fn member_hash(&self, owner: TypeHash) -> TypeHash {
        match self {
            Identity::Name(name) => TypeHash::from_member(owner, name),
            Identity::Symbol(description) => {
                TypeHash::from_member(owner, &format!("@@{}", description))
            }
        }
    }

    /// Resolve to a host property key. Symbols go through `Symbol[name]`.
    pub fn key(&self, env: &Env) -> Result<PropertyKey, BindError> {
        match self {
            Identity::Name(name) => Ok(PropertyKey::name(name)),
            Identity::Symbol(description) => {
                Ok(PropertyKey::Symbol(env.well_known_symbol(description)?))
            }
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Name(name) => f.write_str(name),
            Identity::Symbol(description) => write!(f, "[Symbol.{}]", description),
        }
    }
}

/// Describes a constructor, method or free function.
///
/// Required slots are declared first with [`arg`](Self::arg) or
/// [`any_arg`](Self::any_arg); optional trailing slots follow with
/// [`optional_arg`](Self::optional_arg). A `required` count of zero means
/// every argument is optional.
#[derive(Clone)]
pub struct MethodDescriptor {
    /// Host-visible name.
    pub identity: Identity,
    /// Declared kind per slot. `None` accepts any kind.
    pub arg_kinds: Vec<Option<ValueKind>>,
    /// Minimum number of arguments.
    pub required: usize,
    /// Attributes of the installed member.
    pub attributes: PropertyAttributes,
    /// Slot index of the first `optional_arg`.
    first_optional: Option<usize>,
    callback: Option<Arc<dyn NativeCallback>>,
}

impl MethodDescriptor {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            arg_kinds: Vec::new(),
            required: 0,
            attributes: PropertyAttributes::empty(),
            first_optional: None,
            callback: None,
        }
    }

    /// A method or function with a plain name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Identity::Name(name.into()))
    }

    /// A method keyed by a well-known symbol.
    pub fn symbol(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Identity::Symbol(description.into()))
    }

    /// A class constructor. The name is the exported class name.
    ///
    /// A constructor without a callback produces bare instances; such
    /// classes are only useful through
    /// [`ClassBinding::wrap_existing`](crate::ClassBinding::wrap_existing).
    pub fn constructor(class_name: impl Into<Cow<'static, str>>) -> Self {
        Self::named(class_name)
    }

    /// Append a required slot of the given kind.
    pub fn arg(mut self, kind: ValueKind) -> Self {
        self.arg_kinds.push(Some(kind));
        self.required += 1;
        self
    }

    /// Append a required slot accepting any kind.
    pub fn any_arg(mut self) -> Self {
        self.arg_kinds.push(None);
        self.required += 1;
        self
    }

    /// Append an optional slot. Undefined is always accepted here.
    pub fn optional_arg(mut self, kind: Option<ValueKind>) -> Self {
        self.first_optional.get_or_insert(self.arg_kinds.len());
        self.arg_kinds.push(kind);
        self
    }

    /// Override the required argument count.
    pub fn required(mut self, count: usize) -> Self {
        self.required = count;
        self
    }

    /// Set the member attributes.
    pub fn attributes(mut self, attributes: PropertyAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Install on the constructor; the body receives no native instance.
    pub fn with_static(mut self) -> Self {
        self.attributes |= PropertyAttributes::STATIC;
        self
    }

    /// Set the native body.
    pub fn callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Env, &CallbackInfo<'_>) -> Result<Value, BindError> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(f));
        self
    }

    /// Declared kind for slot `index`. Undeclared slots accept any kind.
    pub fn kind_at(&self, index: usize) -> Option<ValueKind> {
        self.arg_kinds.get(index).copied().flatten()
    }

    /// Whether the member lives on the constructor.
    pub fn is_static(&self) -> bool {
        self.attributes.contains(PropertyAttributes::STATIC)
    }

    /// The native body, if any.
    pub fn native(&self) -> Option<&Arc<dyn NativeCallback>> {
        self.callback.as_ref()
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("identity", &self.identity)
            .field("arg_kinds", &self.arg_kinds)
            .field("required", &self.required)
            .field("attributes", &self.attributes)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Describes an accessor property of a bound class.
#[derive(Clone)]
pub struct PropertyDescriptor {
    /// Host-visible name.
    pub identity: Identity,
    /// Declared value kind. `None` accepts any kind.
    pub kind: Option<ValueKind>,
    /// Attributes of the installed accessor.
    pub attributes: PropertyAttributes,
    getter: Option<Arc<dyn NativeCallback>>,
    setter: Option<Arc<dyn NativeSetter>>,
}

impl PropertyDescriptor {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            kind: None,
            attributes: PropertyAttributes::empty(),
            getter: None,
            setter: None,
        }
    }

    /// A property with a plain name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Identity::Name(name.into()))
    }

    /// A property keyed by a well-known symbol.
    pub fn symbol(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Identity::Symbol(description.into()))
    }

    /// Declare the value kind.
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the accessor attributes.
    pub fn attributes(mut self, attributes: PropertyAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the getter.
    pub fn getter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Env, &CallbackInfo<'_>) -> Result<Value, BindError> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(f));
        self
    }

    /// Set the setter.
    pub fn setter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Env, &CallbackInfo<'_>) -> Result<(), BindError> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(f));
        self
    }

    /// The getter, if any.
    pub fn native_getter(&self) -> Option<&Arc<dyn NativeCallback>> {
        self.getter.as_ref()
    }

    /// The setter, if any.
    pub fn native_setter(&self) -> Option<&Arc<dyn NativeSetter>> {
        self.setter.as_ref()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .field("attributes", &self.attributes)
            .field("readable", &self.getter.is_some())
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

// ============================================================================
// Registration invariants
// ============================================================================

fn reject(identity: &Identity, reason: &str) -> BindError {
    log::error!("rejecting descriptor {}: {}", identity, reason);
    BindError::invalid(identity, reason)
}

fn validate_identity(identity: &Identity) -> Result<(), BindError> {
    if identity.as_str().is_empty() {
        return Err(reject(identity, "identity is empty"));
    }
    Ok(())
}

/// `capacity` is the binder's argument cap, never above [`METHOD_MAX_ARGS`].
fn validate_arity(method: &MethodDescriptor, capacity: usize) -> Result<(), BindError> {
    let capacity = capacity.min(METHOD_MAX_ARGS);
    if method.arg_kinds.len() > capacity {
        return Err(reject(
            &method.identity,
            &format!("declares {} arguments, capacity is {}", method.arg_kinds.len(), capacity),
        ));
    }
    if method.required > capacity {
        return Err(reject(
            &method.identity,
            &format!("requires {} arguments, capacity is {}", method.required, capacity),
        ));
    }
    if let Some(optional) = method.first_optional
        && optional < method.required
    {
        return Err(reject(
            &method.identity,
            &format!("slot {} is optional but {} arguments are required", optional, method.required),
        ));
    }
    Ok(())
}

pub(crate) fn validate_constructor(ctor: &MethodDescriptor, capacity: usize) -> Result<(), BindError> {
    if !matches!(ctor.identity, Identity::Name(_)) {
        return Err(reject(&ctor.identity, "constructor must have a plain name"));
    }
    validate_identity(&ctor.identity)?;
    if !ctor.attributes.is_empty() {
        return Err(reject(&ctor.identity, "constructor must use default attributes"));
    }
    validate_arity(ctor, capacity)
}

pub(crate) fn validate_method(method: &MethodDescriptor, capacity: usize) -> Result<(), BindError> {
    validate_identity(&method.identity)?;
    validate_arity(method, capacity)?;
    if method.callback.is_none() {
        return Err(reject(&method.identity, "method has no callback"));
    }
    Ok(())
}

pub(crate) fn validate_property(property: &PropertyDescriptor) -> Result<(), BindError> {
    validate_identity(&property.identity)?;
    if property.getter.is_none() && property.setter.is_none() {
        return Err(reject(&property.identity, "property has neither getter nor setter"));
    }
    if property.attributes.contains(PropertyAttributes::STATIC) {
        return Err(reject(&property.identity, "static properties are not supported"));
    }
    Ok(())
}
