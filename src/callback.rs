//! What a native body sees about the call it is serving.

use std::any::Any;
use std::sync::Arc;

use bindery_core::{NativeRef, TypeHash, Value, ValueKind};

use crate::error::BindError;
use crate::marshal::Argument;

/// Call-scoped view handed to every native callback.
#[derive(Debug)]
pub struct CallbackInfo<'a> {
    callee: &'a str,
    this: Value,
    native_this: Option<NativeRef>,
    arguments: &'a [Argument],
    class: Option<TypeHash>,
}

impl<'a> CallbackInfo<'a> {
    pub(crate) fn new(
        callee: &'a str,
        this: Value,
        native_this: Option<NativeRef>,
        arguments: &'a [Argument],
        class: Option<TypeHash>,
    ) -> Self {
        Self {
            callee,
            this,
            native_this,
            arguments,
            class,
        }
    }

    /// Name of the member being called.
    pub fn callee(&self) -> &str {
        self.callee
    }

    /// The receiver. For constructors, the instance under construction.
    pub fn this(&self) -> &Value {
        &self.this
    }

    /// The unwrapped native instance. Absent for constructors and statics.
    pub fn native_this(&self) -> Option<&NativeRef> {
        self.native_this.as_ref()
    }

    /// The native instance as a `T`.
    pub fn native<T: Any + Send + Sync>(&self) -> Result<Arc<T>, BindError> {
        self.native_this
            .as_ref()
            .and_then(NativeRef::downcast::<T>)
            .ok_or_else(|| BindError::UnwrapOnUnboundObject {
                callee: self.callee.to_string(),
            })
    }

    /// Class the call was dispatched through, if any.
    pub fn class(&self) -> Option<TypeHash> {
        self.class
    }

    /// All marshaled arguments.
    pub fn args(&self) -> &'a [Argument] {
        self.arguments
    }

    pub fn num_args(&self) -> usize {
        self.arguments.len()
    }

    pub fn arg(&self, index: usize) -> Option<&'a Argument> {
        self.arguments.get(index)
    }

    fn typed<T>(
        &self,
        index: usize,
        expected: ValueKind,
        read: impl FnOnce(&'a Argument) -> Option<T>,
    ) -> Result<T, BindError> {
        let argument = self.arguments.get(index);
        argument.and_then(read).ok_or_else(|| BindError::TypeMismatch {
            index,
            expected,
            actual: argument.map_or(ValueKind::Undefined, Argument::kind),
        })
    }

    /// String argument at `index`.
    pub fn string(&self, index: usize) -> Result<&'a str, BindError> {
        self.typed(index, ValueKind::String, Argument::as_str)
    }

    /// Integer argument at `index`.
    pub fn integer(&self, index: usize) -> Result<i64, BindError> {
        self.typed(index, ValueKind::Number, Argument::as_i64)
    }

    /// Boolean argument at `index`.
    pub fn boolean(&self, index: usize) -> Result<bool, BindError> {
        self.typed(index, ValueKind::Boolean, Argument::as_bool)
    }

    /// Walk the arguments in order.
    pub fn cursor(&self) -> ArgumentCursor<'a> {
        ArgumentCursor {
            arguments: self.arguments,
            next: 0,
        }
    }
}

/// Sequential reader over a call's arguments.
///
/// Every call to [`next`](Self::next) consumes one slot, whether or not it
/// matched.
#[derive(Debug, Clone)]
pub struct ArgumentCursor<'a> {
    arguments: &'a [Argument],
    next: usize,
}

impl<'a> ArgumentCursor<'a> {
    /// Consume the next slot and return it if it matches `expected`.
    ///
    /// `None` matches anything except undefined.
    pub fn next(&mut self, expected: Option<ValueKind>) -> Option<&'a Argument> {
        let argument = self.arguments.get(self.next)?;
        self.next += 1;
        let matches = match expected {
            None => argument.kind() != ValueKind::Undefined,
            Some(kind) => argument.kind() == kind,
        };
        matches.then_some(argument)
    }

    /// Index of the slot the next call will read.
    pub fn position(&self) -> usize {
        self.next
    }
}
