//! Errors raised by the binding engine.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BindError
//! ├── call-time   - TypeMismatch, ArityMismatch, UnwrapOnUnboundObject,
//! │                 PropertyNotReadable, PropertyNotWritable, NativeOperationFailure
//! ├── bind-time   - InvalidDescriptor, AllocationFailure
//! └── passthrough - Host (a failed host call), Thrown (an exception from script code)
//! ```
//!
//! Every `BindError` becomes a host [`Exception`] when it crosses back into
//! the host. The exception's `code` is the [`ErrorKind`] tag.

use std::fmt;

use bindery_core::{Exception, ExceptionClass, HostError, ValueKind};
use thiserror::Error;

/// Tag identifying the kind of a [`BindError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TypeMismatch,
    ArityMismatch,
    UnwrapOnUnboundObject,
    PropertyNotReadable,
    PropertyNotWritable,
    AllocationFailure,
    NativeOperationFailure,
    InvalidDescriptor,
    Host,
}

impl ErrorKind {
    /// The tag string carried as an exception's `code`.
    pub fn tag(self) -> &'static str {
        match self {
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::ArityMismatch => "ArityMismatch",
            ErrorKind::UnwrapOnUnboundObject => "UnwrapOnUnboundObject",
            ErrorKind::PropertyNotReadable => "PropertyNotReadable",
            ErrorKind::PropertyNotWritable => "PropertyNotWritable",
            ErrorKind::AllocationFailure => "AllocationFailure",
            ErrorKind::NativeOperationFailure => "NativeOperationFailure",
            ErrorKind::InvalidDescriptor => "InvalidDescriptor",
            ErrorKind::Host => "Host",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// How many arguments a call accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// Errors produced while binding classes or dispatching calls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    /// A declared argument kind disagrees with the runtime kind.
    #[error("argument {index}: expected {expected}, got {actual}")]
    TypeMismatch {
        index: usize,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Too few arguments, or the wrong count for an accessor.
    #[error("{callee}: expected {expected} arguments, received {received}")]
    ArityMismatch {
        callee: String,
        expected: Arity,
        received: usize,
    },

    /// An instance call on an object this engine never wrapped.
    #[error("{callee}: receiver is not a bound native instance")]
    UnwrapOnUnboundObject { callee: String },

    /// Read of a property without a getter.
    #[error("property '{property}' is not readable")]
    PropertyNotReadable { property: String },

    /// Write of a property without a setter.
    #[error("property '{property}' is not writable")]
    PropertyNotWritable { property: String },

    /// Table or object allocation failed.
    #[error("allocation failed: {0}")]
    AllocationFailure(String),

    /// The wrapped native object reported a genuine failure.
    #[error("{message}")]
    NativeOperationFailure { message: String },

    /// A descriptor broke a registration invariant.
    #[error("invalid descriptor '{identity}': {reason}")]
    InvalidDescriptor { identity: String, reason: String },

    /// A host API call failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// Script code called from a native body threw.
    #[error(transparent)]
    Thrown(Exception),
}

impl BindError {
    /// The kind tag of this error. Thrown exceptions keep their own code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BindError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            BindError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            BindError::UnwrapOnUnboundObject { .. } => ErrorKind::UnwrapOnUnboundObject,
            BindError::PropertyNotReadable { .. } => ErrorKind::PropertyNotReadable,
            BindError::PropertyNotWritable { .. } => ErrorKind::PropertyNotWritable,
            BindError::AllocationFailure(_) => ErrorKind::AllocationFailure,
            BindError::NativeOperationFailure { .. } => ErrorKind::NativeOperationFailure,
            BindError::InvalidDescriptor { .. } => ErrorKind::InvalidDescriptor,
            BindError::Host(_) | BindError::Thrown(_) => ErrorKind::Host,
        }
    }

    /// Shorthand for a native failure.
    pub fn native(message: impl Into<String>) -> Self {
        BindError::NativeOperationFailure {
            message: message.into(),
        }
    }

    pub(crate) fn invalid(identity: impl fmt::Display, reason: impl Into<String>) -> Self {
        BindError::InvalidDescriptor {
            identity: identity.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<Exception> for BindError {
    fn from(exception: Exception) -> Self {
        BindError::Thrown(exception)
    }
}

impl From<BindError> for Exception {
    fn from(err: BindError) -> Self {
        match err {
            BindError::Thrown(exception) => exception,
            BindError::Host(host) => Exception::from(host).with_code(ErrorKind::Host.tag()),
            other => {
                let class = match other.kind() {
                    ErrorKind::TypeMismatch => ExceptionClass::TypeError,
                    _ => ExceptionClass::Error,
                };
                Exception::new(class, other.to_string()).with_code(other.kind().tag())
            }
        }
    }
}
