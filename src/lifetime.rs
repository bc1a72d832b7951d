//! The wrap/unwrap bridge between host objects and native lifetimes.
//!
//! Wrapping hands the host one share of a native object together with a
//! [`Finalizer`]. The host runs that finalizer exactly once, when the
//! wrapping object is collected or the environment is torn down, and that
//! is the only place the share is given back.

use std::any::Any;
use std::sync::Arc;

use bindery_core::{Env, FinalizeHint, Finalizer, NativeRef, TypeHash, Value};

use crate::binder::ClassBinding;
use crate::callback::CallbackInfo;
use crate::error::BindError;

/// Attach a native object to the instance a constructor body is building.
pub fn wrap_instance(
    env: &mut Env,
    info: &CallbackInfo<'_>,
    native: NativeRef,
    finalizer: Finalizer,
) -> Result<(), BindError> {
    let hint = FinalizeHint {
        class: info.class(),
    };
    env.wrap(info.this(), native, finalizer, hint)?;
    Ok(())
}

/// Create a new instance of `binding` around an existing native object.
pub fn wrap_existing(
    env: &mut Env,
    binding: &ClassBinding,
    native: NativeRef,
    finalizer: Finalizer,
) -> Result<Value, BindError> {
    binding.wrap_existing(env, native, finalizer)
}

/// The native object behind a host object wrapped by a bound class.
pub fn unwrap(env: &Env, value: &Value) -> Result<NativeRef, BindError> {
    match (env.unwrap(value), bound_class(env, value)) {
        (Ok(native), Some(_)) => Ok(native),
        _ => Err(BindError::UnwrapOnUnboundObject {
            callee: "unwrap".to_string(),
        }),
    }
}

/// Typed [`unwrap`]. A native of another type counts as unbound.
pub fn unwrap_as<T: Any + Send + Sync>(env: &Env, value: &Value) -> Result<Arc<T>, BindError> {
    unwrap(env, value)?
        .downcast::<T>()
        .ok_or_else(|| BindError::UnwrapOnUnboundObject {
            callee: std::any::type_name::<T>().to_string(),
        })
}

/// The bound class that wrapped `value`, if any.
pub fn bound_class(env: &Env, value: &Value) -> Option<TypeHash> {
    env.wrap_hint(value)?.class
}

/// Whether `value` was wrapped by a bound class.
pub fn is_bound(env: &Env, value: &Value) -> bool {
    bound_class(env, value).is_some()
}
