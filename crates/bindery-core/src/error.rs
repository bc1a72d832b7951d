//! Error types for the host environment.
//!
//! ## Error Hierarchy
//!
//! ```text
//! HostError  - a host API call failed (status + message), never seen by scripts
//! Exception  - a host-visible exception raised into the calling script
//! ```
//!
//! Every `HostError` can be raised as an `Exception`; the reverse is not
//! true, since exceptions also originate from native callbacks.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

// ============================================================================
// Host API Errors
// ============================================================================

/// Status codes returned by host API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostStatus {
    /// An argument to the host API was invalid.
    InvalidArg,
    /// An object was expected.
    ObjectExpected,
    /// A string was expected.
    StringExpected,
    /// A number was expected.
    NumberExpected,
    /// A boolean was expected.
    BooleanExpected,
    /// A function was expected.
    FunctionExpected,
    /// An external handle was expected.
    ExternalExpected,
    /// An array was expected.
    ArrayExpected,
    /// The object already carries a native pointer.
    AlreadyWrapped,
    /// The object carries no native pointer.
    NotWrapped,
    /// A persistent reference no longer points at a live object.
    InvalidReference,
    /// Handle scopes were closed out of order.
    ScopeMismatch,
    /// A symbol description did not name a known symbol.
    UnknownSymbol,
    /// Anything else.
    GenericFailure,
}

impl HostStatus {
    /// Returns a human-readable name for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostStatus::InvalidArg => "invalid argument",
            HostStatus::ObjectExpected => "object expected",
            HostStatus::StringExpected => "string expected",
            HostStatus::NumberExpected => "number expected",
            HostStatus::BooleanExpected => "boolean expected",
            HostStatus::FunctionExpected => "function expected",
            HostStatus::ExternalExpected => "external expected",
            HostStatus::ArrayExpected => "array expected",
            HostStatus::AlreadyWrapped => "already wrapped",
            HostStatus::NotWrapped => "not wrapped",
            HostStatus::InvalidReference => "invalid reference",
            HostStatus::ScopeMismatch => "handle scope mismatch",
            HostStatus::UnknownSymbol => "unknown symbol",
            HostStatus::GenericFailure => "generic failure",
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed host API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {message}")]
pub struct HostError {
    /// What went wrong.
    pub status: HostStatus,
    /// Detail for diagnostics.
    pub message: String,
}

impl HostError {
    /// Create a new host error.
    pub fn new(status: HostStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

// ============================================================================
// Exceptions
// ============================================================================

/// The constructor a host exception is raised with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionClass {
    /// `Error`
    Error,
    /// `TypeError`
    TypeError,
    /// `RangeError`
    RangeError,
}

impl fmt::Display for ExceptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExceptionClass::Error => "Error",
            ExceptionClass::TypeError => "TypeError",
            ExceptionClass::RangeError => "RangeError",
        })
    }
}

/// A host-visible exception.
///
/// `code` carries a machine-readable tag (the engine uses its error kind
/// names) and `message` the human-readable text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class}: {message}")]
pub struct Exception {
    /// Exception constructor.
    pub class: ExceptionClass,
    /// Optional error code tag.
    pub code: Option<Cow<'static, str>>,
    /// Exception message.
    pub message: String,
}

impl Exception {
    /// Create an exception of the given class.
    pub fn new(class: ExceptionClass, message: impl Into<String>) -> Self {
        Self {
            class,
            code: None,
            message: message.into(),
        }
    }

    /// Create a plain `Error`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ExceptionClass::Error, message)
    }

    /// Create a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionClass::TypeError, message)
    }

    /// Attach an error code tag.
    pub fn with_code(mut self, code: impl Into<Cow<'static, str>>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// The error code tag, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl From<HostError> for Exception {
    fn from(err: HostError) -> Self {
        let class = match err.status {
            HostStatus::ObjectExpected
            | HostStatus::StringExpected
            | HostStatus::NumberExpected
            | HostStatus::BooleanExpected
            | HostStatus::FunctionExpected
            | HostStatus::ExternalExpected
            | HostStatus::ArrayExpected => ExceptionClass::TypeError,
            _ => ExceptionClass::Error,
        };
        Exception::new(class, err.to_string())
    }
}
