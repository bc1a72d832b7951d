//! In-process dynamic host.
//!
//! This module provides the host side the binding engine talks to.
//!
//! ## Key Types
//!
//! - [`Env`]: the environment (heap, scopes, classes, wrapping, collection)
//! - [`Value`]: a dynamic value, with [`ValueKind`] as its runtime kind
//! - [`ObjectHeap`]: generational arena for host objects
//! - [`NativeRef`]: shared native pointer carried by wrapped objects and externals
//! - [`Finalizer`]: callback run once when a wrapped object is collected

mod env;
mod native;
mod object;
mod object_heap;
mod value;

pub use env::{Env, HandleScope, Reference};
pub use native::{FinalizeHint, Finalizer, NativeRef, Wrapped};
pub use object::{
    CallFrame, HostCallback, HostFunction, HostObject, ObjectKind, PropertyAttributes,
    PropertySlot,
};
pub use object_heap::{ObjectHandle, ObjectHeap};
pub use value::{PropertyKey, Symbol, Value, ValueKind, WELL_KNOWN_SYMBOLS};
