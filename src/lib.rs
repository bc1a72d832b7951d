//! Descriptor-driven binding engine between native Rust objects and a
//! dynamic host.
//!
//! Domain code declares its classes as descriptor tables, hands them to a
//! [`ClassBinder`], and gets host classes whose constructors, accessors and
//! methods dispatch through shared trampolines. Arguments are checked and
//! converted by the [`Marshaler`] before any native body runs, and native
//! objects are attached to host objects through the wrap/unwrap bridge in
//! [`lifetime`].
//!
//! The host side lives in [`bindery_core`].

pub mod binder;
pub mod callback;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod iterator;
pub mod lifetime;
pub mod marshal;
pub mod status;
mod trampoline;

pub use binder::{ClassBinder, ClassBinding};
pub use callback::{ArgumentCursor, CallbackInfo};
pub use config::BinderConfig;
pub use descriptor::{
    Identity, METHOD_MAX_ARGS, MethodDescriptor, NativeCallback, NativeSetter, PropertyDescriptor,
};
pub use error::{Arity, BindError, ErrorKind};
pub use iterator::{CollectionIterator, IndexedCollection, IterStep, IteratorClass, iterator_method};
pub use marshal::{Argument, ArgumentFrame, Marshaler, Payload};
pub use status::{NativeStatus, surface, surface_value};

pub use bindery_core;

/// Everything needed to declare and bind classes.
pub mod prelude {
    pub use crate::lifetime::{unwrap, unwrap_as, wrap_existing, wrap_instance};
    pub use crate::{
        Argument, BindError, BinderConfig, CallbackInfo, ClassBinder, ClassBinding, ErrorKind,
        IndexedCollection, IteratorClass, MethodDescriptor, NativeStatus, PropertyDescriptor,
        iterator_method, surface, surface_value,
    };
    pub use bindery_core::{
        Env, Exception, FinalizeHint, Finalizer, NativeRef, PropertyAttributes, TypeHash, Value,
        ValueKind,
    };
}
