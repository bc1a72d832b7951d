//! Core types for the bindery binding engine.
//!
//! This crate holds the pieces shared by everything that talks to the host:
//!
//! - [`TypeHash`]: deterministic identity for classes and members
//! - [`HostError`] / [`Exception`]: host call failures and raised exceptions
//! - [`runtime`]: the in-process host environment ([`Env`], [`Value`], heap)

pub mod error;
pub mod runtime;
pub mod type_hash;

pub use error::{Exception, ExceptionClass, HostError, HostStatus};
pub use runtime::{
    CallFrame, Env, FinalizeHint, Finalizer, HandleScope, NativeRef, ObjectHandle, PropertyAttributes,
    PropertyKey, PropertySlot, Reference, Symbol, Value, ValueKind,
};
pub use type_hash::TypeHash;
