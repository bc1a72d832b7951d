//! Argument marshaling: dynamic call values in, typed native arguments out.
//!
//! Marshaling is positional and stops at the first failure. Every string
//! argument owns a byte buffer drawn from a small pool; an
//! [`ArgumentFrame`] hands all of them back when it is dropped, so a call
//! that fails on slot `i` still releases the buffers of slots `0..i`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bindery_core::{Env, NativeRef, Value, ValueKind};
use parking_lot::Mutex;

use crate::config::BinderConfig;
use crate::descriptor::MethodDescriptor;
use crate::error::BindError;

/// Typed payload of a marshaled argument.
#[derive(Debug, Clone)]
pub enum Payload {
    Boolean(bool),
    Integer(i64),
    /// UTF-8 bytes of a string argument.
    Buffer(Vec<u8>),
    External(NativeRef),
    /// Native pointer of a wrapped object, or `None` for an unwrapped one.
    Unwrapped(Option<NativeRef>),
    /// Left as a dynamic handle, not inspected.
    Opaque,
}

/// One marshaled call argument.
#[derive(Debug, Clone)]
pub struct Argument {
    value: Value,
    kind: ValueKind,
    payload: Payload,
}

impl Argument {
    /// The dynamic value as passed.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Runtime kind of the value.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The typed payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Payload::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.payload {
            Payload::Integer(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn as_external(&self) -> Option<&NativeRef> {
        match &self.payload {
            Payload::External(native) => Some(native),
            _ => None,
        }
    }

    /// Native pointer of an object argument, if the object was wrapped.
    pub fn as_unwrapped(&self) -> Option<&NativeRef> {
        match &self.payload {
            Payload::Unwrapped(native) => native.as_ref(),
            _ => None,
        }
    }

    /// Typed native behind an external or wrapped-object argument.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_external()
            .or_else(|| self.as_unwrapped())
            .and_then(NativeRef::downcast::<T>)
    }

    fn take_buffer(&mut self) -> Option<Vec<u8>> {
        match std::mem::replace(&mut self.payload, Payload::Opaque) {
            Payload::Buffer(bytes) => Some(bytes),
            other => {
                self.payload = other;
                None
            }
        }
    }
}

/// Pool of reusable string buffers.
#[derive(Debug)]
struct BufferPool {
    free: Vec<Vec<u8>>,
    limit: usize,
    initial_capacity: usize,
    outstanding: usize,
}

impl BufferPool {
    fn acquire(&mut self, len: usize) -> Vec<u8> {
        self.outstanding += 1;
        match self.free.pop() {
            Some(mut buffer) => {
                buffer.clear();
                buffer.reserve(len);
                buffer
            }
            None => Vec::with_capacity(len.max(self.initial_capacity)),
        }
    }

    fn recycle(&mut self, mut buffer: Vec<u8>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.free.len() < self.limit {
            buffer.clear();
            self.free.push(buffer);
        }
    }
}

/// Converts dynamic values into [`Argument`]s.
pub struct Marshaler {
    pool: Mutex<BufferPool>,
}

impl Marshaler {
    /// Create a marshaler sized by `config`.
    pub fn new(config: &BinderConfig) -> Self {
        Self {
            pool: Mutex::new(BufferPool {
                free: Vec::new(),
                limit: config.buffer_pool_limit,
                initial_capacity: config.initial_buffer_capacity,
                outstanding: 0,
            }),
        }
    }

    /// Marshal one value for slot `index`.
    ///
    /// `expected == None` accepts any kind. With `accept_absent`, undefined
    /// passes whatever kind is expected.
    pub fn marshal(
        &self,
        env: &Env,
        index: usize,
        value: &Value,
        expected: Option<ValueKind>,
        accept_absent: bool,
    ) -> Result<Argument, BindError> {
        let kind = env.type_of(value);
        let mismatch = || BindError::TypeMismatch {
            index,
            expected: expected.unwrap_or(kind),
            actual: kind,
        };

        if let Some(expected) = expected
            && expected != kind
            && !(accept_absent && kind == ValueKind::Undefined)
        {
            return Err(mismatch());
        }

        let payload = match kind {
            ValueKind::Boolean => Payload::Boolean(env.get_value_bool(value).map_err(|_| mismatch())?),
            ValueKind::Number => Payload::Integer(env.get_value_int64(value).map_err(|_| mismatch())?),
            ValueKind::String => {
                let text = env.get_value_string(value).map_err(|_| mismatch())?;
                let mut buffer = self.pool.lock().acquire(text.len());
                buffer.extend_from_slice(text.as_bytes());
                Payload::Buffer(buffer)
            }
            ValueKind::External => {
                Payload::External(env.get_value_external(value).map_err(|_| mismatch())?)
            }
            // Not every object is wrapped; only instance-requiring calls care
            ValueKind::Object => Payload::Unwrapped(env.unwrap(value).ok()),
            _ => Payload::Opaque,
        };

        Ok(Argument {
            value: value.clone(),
            kind,
            payload,
        })
    }

    /// Marshal a call's arguments against a method's declared slots.
    ///
    /// Slots at or past the required count accept undefined.
    pub fn marshal_call(
        &self,
        env: &Env,
        values: &[Value],
        method: &MethodDescriptor,
    ) -> Result<ArgumentFrame<'_>, BindError> {
        let mut frame = ArgumentFrame::new(self);
        for (index, value) in values.iter().enumerate() {
            let argument = self.marshal(
                env,
                index,
                value,
                method.kind_at(index),
                index >= method.required,
            )?;
            frame.arguments.push(argument);
        }
        Ok(frame)
    }

    /// Return an argument's buffer to the pool.
    pub fn release(&self, mut argument: Argument) {
        if let Some(buffer) = argument.take_buffer() {
            self.pool.lock().recycle(buffer);
        }
    }

    /// Buffers handed out and not yet released.
    pub fn outstanding_buffers(&self) -> usize {
        self.pool.lock().outstanding
    }

    /// Buffers waiting in the pool.
    pub fn pooled_buffers(&self) -> usize {
        self.pool.lock().free.len()
    }
}

impl Default for Marshaler {
    fn default() -> Self {
        Self::new(&BinderConfig::default())
    }
}

impl fmt::Debug for Marshaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pool = self.pool.lock();
        f.debug_struct("Marshaler")
            .field("outstanding", &pool.outstanding)
            .field("pooled", &pool.free.len())
            .finish()
    }
}

/// The marshaled arguments of one call. Releases every buffer on drop.
pub struct ArgumentFrame<'m> {
    marshaler: &'m Marshaler,
    arguments: Vec<Argument>,
}

impl<'m> ArgumentFrame<'m> {
    /// An empty frame.
    pub fn new(marshaler: &'m Marshaler) -> Self {
        Self {
            marshaler,
            arguments: Vec::new(),
        }
    }

    /// Append an already marshaled argument.
    pub fn push(&mut self, argument: Argument) {
        self.arguments.push(argument);
    }

    /// The arguments, in call order.
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }
}

impl Drop for ArgumentFrame<'_> {
    fn drop(&mut self) {
        for argument in self.arguments.drain(..) {
            self.marshaler.release(argument);
        }
    }
}
