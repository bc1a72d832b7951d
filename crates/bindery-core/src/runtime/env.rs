//! The host environment: object heap, handle scopes, classes and wrapping.
//!
//! `Env` is a small in-process dynamic host. It owns every host object,
//! decides object lifetime by reachability, and runs wrap finalizers exactly
//! once, either when the collector frees an object or when the `Env` itself
//! is dropped.
//!
//! Roots are the global object, the open handle scopes, the frames of calls
//! in progress, and objects held by persistent [`Reference`]s.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::object::PropertyAttributes as Attrs;
use super::value::WELL_KNOWN_SYMBOLS;
use super::{
    CallFrame, FinalizeHint, Finalizer, HostCallback, HostFunction, HostObject, NativeRef,
    ObjectHandle, ObjectHeap, ObjectKind, PropertyKey, PropertySlot, Symbol, Value, ValueKind,
    Wrapped,
};
use crate::{Exception, HostError, HostStatus};

/// Token for an open handle scope. Must be closed innermost-first.
#[must_use = "a handle scope keeps its objects alive until closed"]
#[derive(Debug)]
pub struct HandleScope {
    depth: usize,
}

/// A persistent reference keeping one object alive across scopes.
///
/// Not `Clone`: each reference is released exactly once through
/// [`Env::delete_reference`]. A reference that is never deleted pins its
/// object until the `Env` is dropped.
#[derive(Debug, PartialEq, Eq)]
pub struct Reference {
    handle: ObjectHandle,
}

/// The host environment.
pub struct Env {
    heap: ObjectHeap,
    scopes: Vec<Vec<ObjectHandle>>,
    global: ObjectHandle,
    symbols: Vec<Arc<str>>,
}

impl Env {
    /// Create an environment with a global object and the well-known symbols.
    pub fn new() -> Self {
        let mut heap = ObjectHeap::new();
        let global = heap.allocate(HostObject::ordinary(None));
        let mut env = Self {
            heap,
            scopes: vec![Vec::new()],
            global,
            symbols: Vec::new(),
        };
        env.install_symbol_namespace();
        env
    }

    fn install_symbol_namespace(&mut self) {
        let namespace = self.heap.allocate(HostObject::ordinary(None));
        for description in WELL_KNOWN_SYMBOLS {
            let symbol = self.new_symbol(description);
            self.insert_slot(
                namespace,
                PropertyKey::name(description),
                PropertySlot::data(Value::Symbol(symbol), Attrs::empty()),
            );
        }
        self.insert_slot(
            self.global,
            PropertyKey::from("Symbol"),
            PropertySlot::data(
                Value::Object(namespace),
                Attrs::WRITABLE | Attrs::CONFIGURABLE,
            ),
        );
    }

    /// The global object.
    pub fn global(&self) -> Value {
        Value::Object(self.global)
    }

    /// Direct access to the heap.
    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    /// Number of live host objects.
    pub fn live_objects(&self) -> usize {
        self.heap.len()
    }

    // ------------------------------------------------------------------
    // Handle scopes
    // ------------------------------------------------------------------

    /// Open a handle scope. Objects created until it closes are rooted by it.
    pub fn open_handle_scope(&mut self) -> HandleScope {
        self.scopes.push(Vec::new());
        HandleScope {
            depth: self.scopes.len(),
        }
    }

    /// Close the innermost handle scope.
    pub fn close_handle_scope(&mut self, scope: HandleScope) -> Result<(), HostError> {
        if scope.depth != self.scopes.len() || scope.depth <= 1 {
            return Err(HostError::new(
                HostStatus::ScopeMismatch,
                format!(
                    "closing scope at depth {} while {} are open",
                    scope.depth,
                    self.scopes.len() - 1
                ),
            ));
        }
        self.scopes.pop();
        Ok(())
    }

    fn root(&mut self, handle: ObjectHandle) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(handle);
        }
    }

    fn allocate(&mut self, object: HostObject) -> ObjectHandle {
        let handle = self.heap.allocate(object);
        self.root(handle);
        handle
    }

    // ------------------------------------------------------------------
    // Value inspection
    // ------------------------------------------------------------------

    /// Runtime kind of a value.
    pub fn type_of(&self, value: &Value) -> ValueKind {
        match value {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::External(_) => ValueKind::External,
            Value::Object(handle) => match self.heap.get(*handle) {
                Some(object) if object.is_function() => ValueKind::Function,
                _ => ValueKind::Object,
            },
        }
    }

    /// Read a boolean.
    pub fn get_value_bool(&self, value: &Value) -> Result<bool, HostError> {
        value
            .as_bool()
            .ok_or_else(|| expected(HostStatus::BooleanExpected, self.type_of(value)))
    }

    /// Read a number as a double.
    pub fn get_value_double(&self, value: &Value) -> Result<f64, HostError> {
        value
            .as_number()
            .ok_or_else(|| expected(HostStatus::NumberExpected, self.type_of(value)))
    }

    /// Read a number as a signed 64-bit integer.
    ///
    /// Fractions truncate toward zero, out-of-range values saturate, and
    /// non-finite values read as zero.
    pub fn get_value_int64(&self, value: &Value) -> Result<i64, HostError> {
        let n = self.get_value_double(value)?;
        if n.is_finite() { Ok(n as i64) } else { Ok(0) }
    }

    /// Read a string.
    pub fn get_value_string(&self, value: &Value) -> Result<Arc<str>, HostError> {
        match value {
            Value::String(s) => Ok(Arc::clone(s)),
            other => Err(expected(HostStatus::StringExpected, self.type_of(other))),
        }
    }

    /// Read the native pointer of an external handle.
    pub fn get_value_external(&self, value: &Value) -> Result<NativeRef, HostError> {
        match value {
            Value::External(native) => Ok(native.clone()),
            other => Err(expected(HostStatus::ExternalExpected, self.type_of(other))),
        }
    }

    /// Create an external handle around a native pointer.
    pub fn create_external(&self, native: NativeRef) -> Value {
        Value::External(native)
    }

    // ------------------------------------------------------------------
    // Symbols
    // ------------------------------------------------------------------

    fn new_symbol(&mut self, description: &str) -> Symbol {
        let symbol = Symbol(self.symbols.len() as u32);
        self.symbols.push(Arc::from(description));
        symbol
    }

    /// Create a fresh symbol. Two calls never return the same symbol.
    pub fn create_symbol(&mut self, description: &str) -> Value {
        Value::Symbol(self.new_symbol(description))
    }

    /// Description a symbol was created with.
    pub fn symbol_description(&self, symbol: Symbol) -> Option<Arc<str>> {
        self.symbols.get(symbol.0 as usize).cloned()
    }

    /// Resolve `Symbol[name]` through the global object.
    pub fn well_known_symbol(&self, name: &str) -> Result<Symbol, HostError> {
        let namespace = self
            .own_data(self.global, &PropertyKey::from("Symbol"))
            .and_then(|v| v.as_object())
            .ok_or_else(|| HostError::new(HostStatus::ObjectExpected, "global Symbol is missing"))?;

        match self.own_data(namespace, &PropertyKey::from(name)) {
            Some(Value::Symbol(symbol)) => Ok(symbol),
            _ => Err(HostError::new(
                HostStatus::UnknownSymbol,
                format!("Symbol.{} is not a symbol", name),
            )),
        }
    }

    // ------------------------------------------------------------------
    // Objects and arrays
    // ------------------------------------------------------------------

    /// Create an empty plain object.
    pub fn create_object(&mut self) -> Value {
        Value::Object(self.allocate(HostObject::ordinary(None)))
    }

    /// Create an empty array.
    pub fn create_array(&mut self) -> Value {
        self.create_array_from(Vec::new())
    }

    /// Create an array holding `elements`.
    pub fn create_array_from(&mut self, elements: Vec<Value>) -> Value {
        Value::Object(self.allocate(HostObject::with_kind(ObjectKind::Array(elements), None)))
    }

    /// Whether the value is an array.
    pub fn is_array(&self, value: &Value) -> bool {
        self.array(value).is_ok()
    }

    fn array(&self, value: &Value) -> Result<&Vec<Value>, HostError> {
        let object = value.as_object().and_then(|h| self.heap.get(h));
        match object.map(|o| &o.kind) {
            Some(ObjectKind::Array(elements)) => Ok(elements),
            _ => Err(expected(HostStatus::ArrayExpected, self.type_of(value))),
        }
    }

    fn array_mut(&mut self, value: &Value) -> Result<&mut Vec<Value>, HostError> {
        let kind = self.type_of(value);
        let object = value.as_object().and_then(|h| self.heap.get_mut(h));
        match object.map(|o| &mut o.kind) {
            Some(ObjectKind::Array(elements)) => Ok(elements),
            _ => Err(expected(HostStatus::ArrayExpected, kind)),
        }
    }

    /// Length of an array.
    pub fn array_length(&self, array: &Value) -> Result<usize, HostError> {
        Ok(self.array(array)?.len())
    }

    /// Element at `index`, undefined past the end.
    pub fn get_element(&self, array: &Value, index: usize) -> Result<Value, HostError> {
        Ok(self.array(array)?.get(index).cloned().unwrap_or_default())
    }

    /// Store an element, growing the array with undefined as needed.
    pub fn set_element(&mut self, array: &Value, index: usize, value: Value) -> Result<(), HostError> {
        let elements = self.array_mut(array)?;
        if index >= elements.len() {
            elements.resize(index + 1, Value::Undefined);
        }
        elements[index] = value;
        Ok(())
    }

    /// Append an element.
    pub fn array_push(&mut self, array: &Value, value: Value) -> Result<(), HostError> {
        self.array_mut(array)?.push(value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Functions and classes
    // ------------------------------------------------------------------

    /// Create a host function.
    pub fn create_function<F>(&mut self, name: &str, callback: F) -> Value
    where
        F: Fn(&mut Env, &CallFrame<'_>) -> Result<Value, Exception> + Send + Sync + 'static,
    {
        Value::Object(self.new_function(name, Arc::new(callback), false))
    }

    fn new_function(&mut self, name: &str, callback: HostCallback, is_class: bool) -> ObjectHandle {
        let name: Arc<str> = Arc::from(name);
        let mut object = HostObject::with_kind(
            ObjectKind::Function(HostFunction {
                name: Arc::clone(&name),
                callback,
                is_class,
            }),
            None,
        );
        object.properties.insert(
            PropertyKey::from("name"),
            PropertySlot::data(Value::String(name), Attrs::CONFIGURABLE),
        );
        self.allocate(object)
    }

    /// Define a class: a constructor function plus its prototype.
    ///
    /// Instance members land on the prototype, static members on the
    /// constructor. Keys must be unique within each table.
    pub fn define_class<F>(
        &mut self,
        name: &str,
        constructor: F,
        instance_members: Vec<(PropertyKey, PropertySlot)>,
        static_members: Vec<(PropertyKey, PropertySlot)>,
    ) -> Result<Value, HostError>
    where
        F: Fn(&mut Env, &CallFrame<'_>) -> Result<Value, Exception> + Send + Sync + 'static,
    {
        let prototype = self.allocate(HostObject::ordinary(None));
        let ctor = self.new_function(name, Arc::new(constructor), true);

        self.insert_slot(
            ctor,
            PropertyKey::from("prototype"),
            PropertySlot::data(Value::Object(prototype), Attrs::empty()),
        );
        self.insert_slot(
            prototype,
            PropertyKey::from("constructor"),
            PropertySlot::data(Value::Object(ctor), Attrs::WRITABLE | Attrs::CONFIGURABLE),
        );

        for (target, members) in [(prototype, instance_members), (ctor, static_members)] {
            let mut seen = FxHashSet::default();
            for (key, slot) in members {
                if !seen.insert(key.clone()) {
                    return Err(HostError::new(
                        HostStatus::InvalidArg,
                        format!("duplicate member '{}' on class {}", key, name),
                    ));
                }
                self.insert_slot(target, key, slot);
            }
        }

        log::debug!("defined class {} (constructor {:?})", name, ctor);
        Ok(Value::Object(ctor))
    }

    fn function_handle(&self, value: &Value) -> Result<(ObjectHandle, &HostFunction), Exception> {
        let handle = value.as_object();
        let function = handle.and_then(|h| self.heap.get(h)).and_then(|o| match &o.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        });
        match (handle, function) {
            (Some(handle), Some(function)) => Ok((handle, function)),
            _ => Err(Exception::type_error(format!(
                "{} is not a function",
                self.type_of(value)
            ))),
        }
    }

    fn prototype_of_constructor(&self, ctor: ObjectHandle) -> Option<ObjectHandle> {
        self.own_data(ctor, &PropertyKey::from("prototype"))
            .and_then(|v| v.as_object())
    }

    /// Create an instance of a class without running its constructor.
    pub fn create_instance_of(&mut self, constructor: &Value) -> Result<Value, HostError> {
        let handle = constructor
            .as_object()
            .filter(|h| self.heap.get(*h).is_some_and(HostObject::is_function))
            .ok_or_else(|| expected(HostStatus::FunctionExpected, self.type_of(constructor)))?;
        let prototype = self.prototype_of_constructor(handle);
        Ok(Value::Object(self.allocate(HostObject::ordinary(prototype))))
    }

    /// `new constructor(...args)`
    pub fn new_instance(&mut self, constructor: &Value, args: &[Value]) -> Result<Value, Exception> {
        let (handle, _) = self.function_handle(constructor)?;
        let prototype = self.prototype_of_constructor(handle);
        let this = Value::Object(self.allocate(HostObject::ordinary(prototype)));

        let result = self.invoke(handle, this.clone(), args, true)?;
        match result {
            Value::Object(_) => Ok(result),
            _ => Ok(this),
        }
    }

    /// Call a function with an explicit receiver.
    pub fn call_function(
        &mut self,
        function: &Value,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Exception> {
        let (handle, f) = self.function_handle(function)?;
        if f.is_class {
            return Err(Exception::type_error(format!(
                "Class constructor {} cannot be invoked without 'new'",
                f.name
            )));
        }
        self.invoke(handle, this, args, false)
    }

    /// Look up a method on `this` and call it.
    pub fn call_method(
        &mut self,
        this: &Value,
        key: impl Into<PropertyKey>,
        args: &[Value],
    ) -> Result<Value, Exception> {
        let key = key.into();
        let method = self.get_property(this, key.clone())?;
        if self.type_of(&method) != ValueKind::Function {
            return Err(Exception::type_error(format!("{} is not a function", key)));
        }
        self.call_function(&method, this.clone(), args)
    }

    fn invoke(
        &mut self,
        callee: ObjectHandle,
        this: Value,
        args: &[Value],
        is_construct: bool,
    ) -> Result<Value, Exception> {
        let callback = match self.heap.get(callee).map(|o| &o.kind) {
            Some(ObjectKind::Function(f)) => Arc::clone(&f.callback),
            _ => return Err(Exception::type_error("callee was collected")),
        };

        // The frame's objects stay rooted for the duration of the call
        let frame_roots = std::iter::once(&this)
            .chain(args)
            .filter_map(Value::as_object)
            .chain(std::iter::once(callee))
            .collect();
        self.scopes.push(frame_roots);

        let frame = CallFrame {
            callee,
            this,
            args,
            is_construct,
        };
        let result = callback(self, &frame);
        self.scopes.pop();

        if let Ok(Value::Object(handle)) = &result {
            self.root(*handle);
        }
        result
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    fn object_handle(&self, value: &Value) -> Result<ObjectHandle, HostError> {
        value
            .as_object()
            .filter(|h| self.heap.contains(*h))
            .ok_or_else(|| expected(HostStatus::ObjectExpected, self.type_of(value)))
    }

    fn insert_slot(&mut self, target: ObjectHandle, key: PropertyKey, slot: PropertySlot) {
        if let Some(object) = self.heap.get_mut(target) {
            object.properties.insert(key, slot);
        }
    }

    fn own_data(&self, target: ObjectHandle, key: &PropertyKey) -> Option<Value> {
        match self.heap.get(target)?.properties.get(key)? {
            PropertySlot::Data { value, .. } => Some(value.clone()),
            PropertySlot::Accessor { .. } => None,
        }
    }

    fn lookup(&self, start: ObjectHandle, key: &PropertyKey) -> Option<(ObjectHandle, PropertySlot)> {
        let mut current = Some(start);
        while let Some(handle) = current {
            let object = self.heap.get(handle)?;
            if let Some(slot) = object.properties.get(key) {
                return Some((handle, slot.clone()));
            }
            current = object.prototype;
        }
        None
    }

    /// Define or redefine an own property.
    pub fn define_property(
        &mut self,
        target: &Value,
        key: impl Into<PropertyKey>,
        slot: PropertySlot,
    ) -> Result<(), HostError> {
        let handle = self.object_handle(target)?;
        let key = key.into();
        if let Some(existing) = self.heap.get(handle).and_then(|o| o.properties.get(&key))
            && !existing.attributes().contains(Attrs::CONFIGURABLE)
        {
            return Err(HostError::new(
                HostStatus::GenericFailure,
                format!("cannot redefine property '{}'", key),
            ));
        }
        self.insert_slot(handle, key, slot);
        Ok(())
    }

    /// Own property slot, without walking the prototype chain.
    pub fn get_own_property(
        &self,
        target: &Value,
        key: impl Into<PropertyKey>,
    ) -> Result<Option<PropertySlot>, HostError> {
        let handle = self.object_handle(target)?;
        Ok(self
            .heap
            .get(handle)
            .and_then(|o| o.properties.get(&key.into()).cloned()))
    }

    /// Own property keys in definition order.
    pub fn own_keys(&self, target: &Value) -> Result<Vec<PropertyKey>, HostError> {
        let handle = self.object_handle(target)?;
        Ok(self
            .heap
            .get(handle)
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Whether the property exists on the object or its prototype chain.
    pub fn has_property(&self, target: &Value, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        self.object_handle(target)
            .ok()
            .is_some_and(|h| self.lookup(h, &key).is_some())
    }

    /// `target[key]`, running getters. Missing properties read as undefined.
    pub fn get_property(
        &mut self,
        target: &Value,
        key: impl Into<PropertyKey>,
    ) -> Result<Value, Exception> {
        let handle = self.object_handle(target)?;
        let key = key.into();

        if let PropertyKey::Name(name) = &key
            && &**name == "length"
            && let Ok(elements) = self.array(target)
        {
            return Ok(Value::from(elements.len()));
        }

        match self.lookup(handle, &key) {
            None => Ok(Value::Undefined),
            Some((_, PropertySlot::Data { value, .. })) => Ok(value),
            Some((_, PropertySlot::Accessor { getter: None, .. })) => Ok(Value::Undefined),
            Some((_, PropertySlot::Accessor { getter: Some(getter), .. })) => {
                self.call_function(&getter, target.clone(), &[])
            }
        }
    }

    /// `target[key] = value`, running setters.
    pub fn set_property(
        &mut self,
        target: &Value,
        key: impl Into<PropertyKey>,
        value: Value,
    ) -> Result<(), Exception> {
        let handle = self.object_handle(target)?;
        let key = key.into();

        match self.lookup(handle, &key) {
            Some((_, PropertySlot::Accessor { setter: Some(setter), .. })) => {
                self.call_function(&setter, target.clone(), &[value])?;
                Ok(())
            }
            Some((_, PropertySlot::Accessor { setter: None, .. })) => Err(Exception::type_error(
                format!("Cannot set property {} which has only a getter", key),
            )),
            Some((_, PropertySlot::Data { attributes, .. }))
                if !attributes.contains(Attrs::WRITABLE) =>
            {
                Err(Exception::type_error(format!(
                    "Cannot assign to read only property '{}'",
                    key
                )))
            }
            Some((owner, PropertySlot::Data { attributes, .. })) if owner == handle => {
                self.insert_slot(handle, key, PropertySlot::data(value, attributes));
                Ok(())
            }
            _ => {
                self.insert_slot(handle, key, PropertySlot::data(value, Attrs::ASSIGNED));
                Ok(())
            }
        }
    }

    /// `target.name`
    pub fn get_named_property(&mut self, target: &Value, name: &str) -> Result<Value, Exception> {
        self.get_property(target, PropertyKey::from(name))
    }

    /// `target.name = value`
    pub fn set_named_property(
        &mut self,
        target: &Value,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), Exception> {
        self.set_property(target, PropertyKey::from(name), value.into())
    }

    /// `value instanceof constructor`
    pub fn instance_of(&self, value: &Value, constructor: &Value) -> Result<bool, HostError> {
        let ctor = constructor
            .as_object()
            .filter(|h| self.heap.get(*h).is_some_and(HostObject::is_function))
            .ok_or_else(|| expected(HostStatus::FunctionExpected, self.type_of(constructor)))?;
        let Some(prototype) = self.prototype_of_constructor(ctor) else {
            return Ok(false);
        };

        let mut current = value
            .as_object()
            .and_then(|h| self.heap.get(h))
            .and_then(|o| o.prototype);
        while let Some(handle) = current {
            if handle == prototype {
                return Ok(true);
            }
            current = self.heap.get(handle).and_then(|o| o.prototype);
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Persistent references
    // ------------------------------------------------------------------

    /// Pin an object beyond the current handle scope.
    pub fn create_reference(&mut self, value: &Value) -> Result<Reference, HostError> {
        let handle = self.object_handle(value)?;
        self.heap.add_ref(handle);
        Ok(Reference { handle })
    }

    /// The referenced object, if still alive.
    pub fn reference_value(&self, reference: &Reference) -> Option<Value> {
        self.heap
            .contains(reference.handle)
            .then_some(Value::Object(reference.handle))
    }

    /// Release a persistent reference.
    pub fn delete_reference(&mut self, reference: Reference) -> Result<(), HostError> {
        self.heap
            .release(reference.handle)
            .map(|_| ())
            .ok_or_else(|| HostError::new(HostStatus::InvalidReference, "referenced object is gone"))
    }

    // ------------------------------------------------------------------
    // Wrapping
    // ------------------------------------------------------------------

    /// Attach a native pointer and its finalizer to an object.
    pub fn wrap(
        &mut self,
        target: &Value,
        native: NativeRef,
        finalizer: Finalizer,
        hint: FinalizeHint,
    ) -> Result<(), HostError> {
        let handle = self.object_handle(target)?;
        let object = self
            .heap
            .get_mut(handle)
            .ok_or_else(|| HostError::new(HostStatus::ObjectExpected, "object was collected"))?;
        if object.wrapped.is_some() {
            return Err(HostError::new(
                HostStatus::AlreadyWrapped,
                "object already carries a native pointer",
            ));
        }
        object.wrapped = Some(Wrapped {
            native,
            finalizer,
            hint,
        });
        Ok(())
    }

    /// The native pointer attached to an object.
    pub fn unwrap(&self, target: &Value) -> Result<NativeRef, HostError> {
        let handle = self.object_handle(target)?;
        self.heap
            .get(handle)
            .and_then(|o| o.wrapped.as_ref())
            .map(|w| w.native.clone())
            .ok_or_else(|| HostError::new(HostStatus::NotWrapped, "object carries no native pointer"))
    }

    /// The finalize hint stored with an object's wrap.
    pub fn wrap_hint(&self, target: &Value) -> Option<FinalizeHint> {
        let handle = target.as_object()?;
        self.heap.get(handle)?.wrapped.as_ref().map(|w| w.hint)
    }

    /// Detach the native pointer without running its finalizer.
    pub fn remove_wrap(&mut self, target: &Value) -> Result<NativeRef, HostError> {
        let handle = self.object_handle(target)?;
        self.heap
            .get_mut(handle)
            .and_then(|o| o.wrapped.take())
            .map(|w| w.native)
            .ok_or_else(|| HostError::new(HostStatus::NotWrapped, "object carries no native pointer"))
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Free every object not reachable from a root and run wrap finalizers.
    ///
    /// Returns the number of objects freed.
    pub fn collect_garbage(&mut self) -> usize {
        let mut marked = FxHashSet::default();
        let mut worklist: Vec<ObjectHandle> = std::iter::once(self.global)
            .chain(self.scopes.iter().flatten().copied())
            .chain(self.heap.referenced())
            .collect();

        while let Some(handle) = worklist.pop() {
            if !marked.insert(handle) {
                continue;
            }
            if let Some(object) = self.heap.get(handle) {
                object.trace(&mut worklist);
            }
        }

        let mut finalize = Vec::new();
        let mut freed = 0;
        for handle in self.heap.live_handles() {
            if marked.contains(&handle) {
                continue;
            }
            if let Some(object) = self.heap.free(handle) {
                freed += 1;
                finalize.extend(object.wrapped);
            }
        }

        log::debug!(
            "collected {} objects ({} finalizers, {} live)",
            freed,
            finalize.len(),
            self.heap.len()
        );
        for wrapped in finalize {
            wrapped.finalize();
        }
        freed
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("heap", &self.heap)
            .field("scopes", &self.scopes.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Env {
    fn drop(&mut self) {
        let wrapped: Vec<Wrapped> = self
            .heap
            .live_handles()
            .into_iter()
            .filter_map(|h| self.heap.free(h))
            .filter_map(|o| o.wrapped)
            .collect();
        if !wrapped.is_empty() {
            log::debug!("environment teardown: running {} finalizers", wrapped.len());
        }
        for w in wrapped {
            w.finalize();
        }
    }
}

fn expected(status: HostStatus, actual: ValueKind) -> HostError {
    HostError::new(status, format!("got {}", actual))
}
