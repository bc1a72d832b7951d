//! Shared dispatch for constructors, accessors and methods.
//!
//! One function per operation kind. Each host function installed by the
//! binder is a small closure that captures its descriptor and forwards to
//! one of these.

use std::sync::Arc;

use bindery_core::{CallFrame, Env, FinalizeHint, Finalizer, NativeRef, TypeHash, Value};

use crate::callback::CallbackInfo;
use crate::descriptor::{MethodDescriptor, PropertyDescriptor};
use crate::error::{Arity, BindError};
use crate::marshal::{ArgumentFrame, Marshaler};

/// Per-class dispatch context shared by every trampoline of that class.
#[derive(Debug)]
pub(crate) struct Dispatch {
    /// Owning class. Free functions have none.
    pub class: Option<TypeHash>,
    pub class_name: Arc<str>,
    pub marshaler: Arc<Marshaler>,
    pub max_args: usize,
    pub validate_getters: bool,
}

/// A pending native pointer for construct-by-wrapping.
pub(crate) struct WrapRequest {
    pub native: NativeRef,
    pub finalizer: Finalizer,
}

/// How the constructor trampoline was entered.
pub(crate) enum Construct {
    /// `new Class(...)` from the host
    Call,
    /// Programmatic instantiation around an existing native object
    Wrap(WrapRequest),
}

fn cap_args<'v>(callee: &str, args: &'v [Value], max_args: usize) -> &'v [Value] {
    if args.len() > max_args {
        log::warn!(
            "{}: dropping {} arguments beyond the first {}",
            callee,
            args.len() - max_args,
            max_args
        );
        &args[..max_args]
    } else {
        args
    }
}

fn check_at_least(callee: &str, required: usize, received: usize) -> Result<(), BindError> {
    if received < required {
        return Err(BindError::ArityMismatch {
            callee: callee.to_string(),
            expected: Arity::AtLeast(required),
            received,
        });
    }
    Ok(())
}

fn check_exactly(callee: &str, expected: usize, received: usize) -> Result<(), BindError> {
    if received != expected {
        return Err(BindError::ArityMismatch {
            callee: callee.to_string(),
            expected: Arity::Exactly(expected),
            received,
        });
    }
    Ok(())
}

/// Native instance behind `this`, wrapped by this dispatch's class.
fn unwrap_instance(
    env: &Env,
    dispatch: &Dispatch,
    this: &Value,
    callee: &str,
) -> Result<NativeRef, BindError> {
    let unbound = || BindError::UnwrapOnUnboundObject {
        callee: callee.to_string(),
    };
    let native = env.unwrap(this).map_err(|_| unbound())?;
    let hint = env.wrap_hint(this).ok_or_else(unbound)?;
    match (dispatch.class, hint.class) {
        (Some(expected), Some(actual)) if expected == actual => Ok(native),
        (None, Some(_)) => Ok(native),
        _ => Err(unbound()),
    }
}

#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn construct(
    env: &mut Env,
    dispatch: &Dispatch,
    ctor: &MethodDescriptor,
    this: Value,
    args: &[Value],
    mode: Construct,
) -> Result<Value, BindError> {
    let callee = ctor.identity.as_str();
    log::trace!("construct {} with {} arguments", callee, args.len());

    match mode {
        Construct::Wrap(request) => {
            let hint = FinalizeHint {
                class: dispatch.class,
            };
            env.wrap(&this, request.native, request.finalizer, hint)?;
            Ok(this)
        }
        Construct::Call => {
            let args = cap_args(callee, args, dispatch.max_args);
            let Some(body) = ctor.native() else {
                return Ok(this);
            };
            check_at_least(callee, ctor.required, args.len())?;

            let frame = dispatch.marshaler.marshal_call(env, args, ctor)?;
            let info = CallbackInfo::new(callee, this.clone(), None, frame.arguments(), dispatch.class);
            match body.call(env, &info)? {
                result @ Value::Object(_) => Ok(result),
                _ => Ok(this),
            }
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn get(
    env: &mut Env,
    dispatch: &Dispatch,
    property: &PropertyDescriptor,
    frame: &CallFrame<'_>,
) -> Result<Value, BindError> {
    let callee = property.identity.as_str();
    log::trace!("get {}.{}", dispatch.class_name, callee);

    check_exactly(callee, 0, frame.args.len())?;
    let native = unwrap_instance(env, dispatch, &frame.this, callee)?;
    let getter = property
        .native_getter()
        .ok_or_else(|| BindError::PropertyNotReadable {
            property: property.identity.to_string(),
        })?;

    let info = CallbackInfo::new(callee, frame.this.clone(), Some(native), &[], dispatch.class);
    let result = getter.call(env, &info)?;

    if dispatch.validate_getters
        && let Some(expected) = property.kind
    {
        let actual = env.type_of(&result);
        if actual != expected {
            log::error!(
                "getter {}.{} returned {}, declared {}",
                dispatch.class_name,
                callee,
                actual,
                expected
            );
            return Err(BindError::TypeMismatch {
                index: 0,
                expected,
                actual,
            });
        }
    }
    Ok(result)
}

#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn set(
    env: &mut Env,
    dispatch: &Dispatch,
    property: &PropertyDescriptor,
    frame: &CallFrame<'_>,
) -> Result<Value, BindError> {
    let callee = property.identity.as_str();
    log::trace!("set {}.{}", dispatch.class_name, callee);

    check_exactly(callee, 1, frame.args.len())?;
    let native = unwrap_instance(env, dispatch, &frame.this, callee)?;
    let setter = property
        .native_setter()
        .ok_or_else(|| BindError::PropertyNotWritable {
            property: property.identity.to_string(),
        })?;

    let mut arguments = ArgumentFrame::new(&dispatch.marshaler);
    arguments.push(dispatch.marshaler.marshal(env, 0, &frame.args[0], property.kind, false)?);

    let info = CallbackInfo::new(
        callee,
        frame.this.clone(),
        Some(native),
        arguments.arguments(),
        dispatch.class,
    );
    setter.call(env, &info)?;
    Ok(Value::Undefined)
}

#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn call(
    env: &mut Env,
    dispatch: &Dispatch,
    method: &MethodDescriptor,
    frame: &CallFrame<'_>,
) -> Result<Value, BindError> {
    let callee = method.identity.as_str();
    log::trace!("call {}.{} with {} arguments", dispatch.class_name, callee, frame.args.len());

    let args = cap_args(callee, frame.args, dispatch.max_args);
    check_at_least(callee, method.required, args.len())?;

    let native = if method.is_static() {
        None
    } else {
        Some(unwrap_instance(env, dispatch, &frame.this, callee)?)
    };

    let Some(body) = method.native() else {
        return Ok(Value::Undefined);
    };
    let arguments = dispatch.marshaler.marshal_call(env, args, method)?;
    let info = CallbackInfo::new(
        callee,
        frame.this.clone(),
        native,
        arguments.arguments(),
        dispatch.class,
    );
    body.call(env, &info)
}
