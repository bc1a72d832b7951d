//! Class binding: turning descriptor tables into host classes.
//!
//! [`ClassBinder::bind`] validates a class's descriptors, installs one
//! trampoline closure per member, registers the constructor in an export
//! namespace and keeps a persistent reference to it. The resulting
//! [`ClassBinding`] can later instantiate the class around an existing
//! native object with [`ClassBinding::wrap_existing`].

use std::sync::Arc;

use bindery_core::{
    Env, Exception, Finalizer, NativeRef, PropertyAttributes, PropertyKey, PropertySlot, Reference,
    TypeHash, Value,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::BinderConfig;
use crate::descriptor::{self, Identity, MethodDescriptor, PropertyDescriptor};
use crate::error::BindError;
use crate::marshal::Marshaler;
use crate::trampoline::{self, Construct, Dispatch, WrapRequest};

/// A class that has been bound into a host environment.
///
/// Cheap to clone; all clones share the same tables.
#[derive(Clone)]
pub struct ClassBinding {
    inner: Arc<BindingInner>,
}

struct BindingInner {
    id: TypeHash,
    dispatch: Arc<Dispatch>,
    ctor: Arc<MethodDescriptor>,
    properties: FxHashMap<TypeHash, Arc<PropertyDescriptor>>,
    methods: FxHashMap<TypeHash, Arc<MethodDescriptor>>,
    constructor: Reference,
}

impl ClassBinding {
    /// Deterministic class id, derived from the class name.
    pub fn id(&self) -> TypeHash {
        self.inner.id
    }

    /// Exported class name.
    pub fn name(&self) -> &str {
        &self.inner.dispatch.class_name
    }

    /// The host constructor function.
    pub fn constructor(&self, env: &Env) -> Result<Value, BindError> {
        env.reference_value(&self.inner.constructor).ok_or_else(|| {
            BindError::AllocationFailure(format!("constructor of {} was collected", self.name()))
        })
    }

    /// Property descriptor by identity.
    pub fn property(&self, identity: &Identity) -> Option<&PropertyDescriptor> {
        self.inner
            .properties
            .get(&identity.member_hash(self.inner.id))
            .map(Arc::as_ref)
    }

    /// Method descriptor by identity.
    pub fn method(&self, identity: &Identity) -> Option<&MethodDescriptor> {
        self.inner
            .methods
            .get(&identity.member_hash(self.inner.id))
            .map(Arc::as_ref)
    }

    /// `new Class(...args)` from native code.
    pub fn new_instance(&self, env: &mut Env, args: &[Value]) -> Result<Value, BindError> {
        let ctor = self.constructor(env)?;
        Ok(env.new_instance(&ctor, args)?)
    }

    /// Create an instance of this class around an existing native object.
    ///
    /// The pending pointer and finalizer travel with this call only, so
    /// concurrent or nested calls on the same class cannot observe each
    /// other's request.
    pub fn wrap_existing(
        &self,
        env: &mut Env,
        native: NativeRef,
        finalizer: Finalizer,
    ) -> Result<Value, BindError> {
        let ctor = self.constructor(env)?;
        let this = env.create_instance_of(&ctor)?;
        trampoline::construct(
            env,
            &self.inner.dispatch,
            &self.inner.ctor,
            this,
            &[],
            Construct::Wrap(WrapRequest { native, finalizer }),
        )
    }
}

impl std::fmt::Debug for ClassBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassBinding")
            .field("id", &self.inner.id)
            .field("name", &self.name())
            .field("properties", &self.inner.properties.len())
            .field("methods", &self.inner.methods.len())
            .finish()
    }
}

/// Binds classes and free functions into a host environment.
///
/// # Example
///
/// ```
/// use bindery::prelude::*;
///
/// let mut env = Env::new();
/// let exports = env.create_object();
/// let mut binder = ClassBinder::new();
///
/// binder
///     .define_function(
///         &mut env,
///         &exports,
///         MethodDescriptor::named("answer").callback(|_, _| Ok(Value::from(42))),
///     )
///     .unwrap();
///
/// let answer = env.get_named_property(&exports, "answer").unwrap();
/// let result = env.call_function(&answer, Value::Undefined, &[]).unwrap();
/// assert_eq!(result, Value::from(42));
/// ```
pub struct ClassBinder {
    config: BinderConfig,
    marshaler: Arc<Marshaler>,
    classes: FxHashMap<TypeHash, ClassBinding>,
    functions: FxHashMap<TypeHash, Arc<MethodDescriptor>>,
}

impl ClassBinder {
    /// Create a binder with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BinderConfig::default())
    }

    /// Create a binder with an explicit configuration.
    pub fn with_config(config: BinderConfig) -> Self {
        let config = config.clone().with_max_args(config.max_args);
        Self {
            marshaler: Arc::new(Marshaler::new(&config)),
            config,
            classes: FxHashMap::default(),
            functions: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// The marshaler shared by every trampoline of this binder.
    pub fn marshaler(&self) -> &Arc<Marshaler> {
        &self.marshaler
    }

    /// A class bound by this binder, by id.
    pub fn class(&self, id: TypeHash) -> Option<&ClassBinding> {
        self.classes.get(&id)
    }

    /// A class bound by this binder, by name.
    pub fn class_named(&self, name: &str) -> Option<&ClassBinding> {
        self.class(TypeHash::from_name(name))
    }

    /// Descriptor of a free function defined by this binder.
    pub fn function(&self, identity: &Identity) -> Option<&MethodDescriptor> {
        self.functions
            .get(&function_id(identity))
            .map(Arc::as_ref)
    }

    /// Bind a class and export its constructor as `exports[name]`.
    pub fn bind(
        &mut self,
        env: &mut Env,
        exports: &Value,
        constructor: MethodDescriptor,
        properties: Vec<PropertyDescriptor>,
        methods: Vec<MethodDescriptor>,
    ) -> Result<ClassBinding, BindError> {
        self.bind_class(env, Some(exports), constructor, properties, methods)
    }

    /// Bind a class without exporting it. Instances can only come from
    /// [`ClassBinding::wrap_existing`] or [`ClassBinding::new_instance`].
    pub fn bind_unexported(
        &mut self,
        env: &mut Env,
        constructor: MethodDescriptor,
        properties: Vec<PropertyDescriptor>,
        methods: Vec<MethodDescriptor>,
    ) -> Result<ClassBinding, BindError> {
        self.bind_class(env, None, constructor, properties, methods)
    }

    fn dispatch(&self, class: Option<TypeHash>, name: &str) -> Arc<Dispatch> {
        Arc::new(Dispatch {
            class,
            class_name: Arc::from(name),
            marshaler: Arc::clone(&self.marshaler),
            max_args: self.config.max_args,
            validate_getters: self.config.validate_getter_results,
        })
    }

    fn bind_class(
        &mut self,
        env: &mut Env,
        exports: Option<&Value>,
        constructor: MethodDescriptor,
        properties: Vec<PropertyDescriptor>,
        methods: Vec<MethodDescriptor>,
    ) -> Result<ClassBinding, BindError> {
        let capacity = self.config.max_args;
        descriptor::validate_constructor(&constructor, capacity)?;
        let name = constructor.identity.as_str().to_string();
        let id = TypeHash::from_name(&name);
        if self.classes.contains_key(&id) {
            return Err(BindError::invalid(&constructor.identity, "class is already bound"));
        }

        let mut seen = FxHashSet::default();
        for identity in properties
            .iter()
            .map(|p| &p.identity)
            .chain(methods.iter().map(|m| &m.identity))
        {
            if !seen.insert(identity.member_hash(id)) {
                log::error!("class {} declares {} twice", name, identity);
                return Err(BindError::invalid(identity, "duplicate member"));
            }
        }
        properties.iter().try_for_each(descriptor::validate_property)?;
        methods
            .iter()
            .try_for_each(|m| descriptor::validate_method(m, capacity))?;

        let dispatch = self.dispatch(Some(id), &name);
        let mut instance_slots = Vec::with_capacity(properties.len() + methods.len());
        let mut static_slots = Vec::new();

        let properties: Vec<Arc<PropertyDescriptor>> = properties.into_iter().map(Arc::new).collect();
        for property in &properties {
            let key = property.identity.key(env)?;
            let label = property.identity.to_string();

            let getter = {
                let dispatch = Arc::clone(&dispatch);
                let property = Arc::clone(property);
                env.create_function(&label, move |env, frame| {
                    trampoline::get(env, &dispatch, &property, frame).map_err(Exception::from)
                })
            };
            let setter = {
                let dispatch = Arc::clone(&dispatch);
                let property = Arc::clone(property);
                env.create_function(&label, move |env, frame| {
                    trampoline::set(env, &dispatch, &property, frame).map_err(Exception::from)
                })
            };

            instance_slots.push((
                key,
                PropertySlot::Accessor {
                    getter: Some(getter),
                    setter: Some(setter),
                    attributes: property.attributes,
                },
            ));
        }

        let methods: Vec<Arc<MethodDescriptor>> = methods.into_iter().map(Arc::new).collect();
        for method in &methods {
            let (key, slot) = method_slot(env, &dispatch, method)?;
            if method.is_static() {
                static_slots.push((key, slot));
            } else {
                instance_slots.push((key, slot));
            }
        }

        let ctor = Arc::new(constructor);
        let class = {
            let dispatch = Arc::clone(&dispatch);
            let ctor = Arc::clone(&ctor);
            env.define_class(
                &name,
                move |env, frame| {
                    let this = frame.this.clone();
                    trampoline::construct(env, &dispatch, &ctor, this, frame.args, Construct::Call)
                        .map_err(Exception::from)
                },
                instance_slots,
                static_slots,
            )?
        };
        let reference = env.create_reference(&class)?;

        if let Some(exports) = exports {
            env.define_property(
                exports,
                PropertyKey::name(&name),
                PropertySlot::data(class, PropertyAttributes::ASSIGNED),
            )?;
        }

        log::debug!(
            "bound class {} ({}, {} properties, {} methods)",
            name,
            id,
            properties.len(),
            methods.len()
        );

        let binding = ClassBinding {
            inner: Arc::new(BindingInner {
                id,
                dispatch,
                ctor,
                properties: properties
                    .into_iter()
                    .map(|p| (p.identity.member_hash(id), p))
                    .collect(),
                methods: methods
                    .into_iter()
                    .map(|m| (m.identity.member_hash(id), m))
                    .collect(),
                constructor: reference,
            }),
        };
        self.classes.insert(id, binding.clone());
        Ok(binding)
    }

    /// Export a single static function as `exports[identity]`.
    ///
    /// The static attribute is forced on; the body never receives a native
    /// instance. The export is assigned like an ordinary property, so a
    /// later definition under the same identity replaces it.
    pub fn define_function(
        &mut self,
        env: &mut Env,
        exports: &Value,
        method: MethodDescriptor,
    ) -> Result<Value, BindError> {
        descriptor::validate_method(&method, self.config.max_args)?;
        let method = Arc::new(method.with_static());
        let dispatch = self.dispatch(None, "");

        let key = method.identity.key(env)?;
        let function = method_function(env, &dispatch, &method);
        env.define_property(
            exports,
            key,
            PropertySlot::data(function.clone(), PropertyAttributes::ASSIGNED),
        )?;

        let id = function_id(&method.identity);
        if self.functions.insert(id, Arc::clone(&method)).is_some() {
            log::debug!("redefined function {} ({})", method.identity, id);
        } else {
            log::debug!("defined function {} ({})", method.identity, id);
        }
        Ok(function)
    }
}

impl Default for ClassBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClassBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassBinder")
            .field("config", &self.config)
            .field("classes", &self.classes.len())
            .field("functions", &self.functions.len())
            .finish()
    }
}

fn function_id(identity: &Identity) -> TypeHash {
    TypeHash::from_function(&identity.to_string())
}

fn method_function(env: &mut Env, dispatch: &Arc<Dispatch>, method: &Arc<MethodDescriptor>) -> Value {
    let dispatch = Arc::clone(dispatch);
    let method = Arc::clone(method);
    env.create_function(&method.identity.to_string(), move |env, frame| {
        trampoline::call(env, &dispatch, &method, frame).map_err(Exception::from)
    })
}

fn method_slot(
    env: &mut Env,
    dispatch: &Arc<Dispatch>,
    method: &Arc<MethodDescriptor>,
) -> Result<(PropertyKey, PropertySlot), BindError> {
    let key = method.identity.key(env)?;
    let function = method_function(env, dispatch, method);
    let attributes = method.attributes - PropertyAttributes::STATIC;
    Ok((key, PropertySlot::data(function, attributes)))
}
