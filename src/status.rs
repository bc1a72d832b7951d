//! Translating native error reports into host-visible outcomes.
//!
//! Wrapped native objects report failures through their own error types.
//! Some of those are not failures from the host's point of view (a lookup
//! that finds nothing, for instance); implementing [`NativeStatus`] lets a
//! trampoline body tell the two apart with [`surface`].

use bindery_core::Value;

use crate::error::BindError;

/// An error reported by a wrapped native object.
pub trait NativeStatus: std::error::Error {
    /// Whether this condition is an ordinary outcome rather than a failure.
    fn is_expected(&self) -> bool {
        false
    }
}

/// Map a native result: expected conditions become `None`, the rest become
/// [`BindError::NativeOperationFailure`].
pub fn surface<T, E: NativeStatus>(result: Result<T, E>) -> Result<Option<T>, BindError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_expected() => {
            log::trace!("native status treated as no value: {}", err);
            Ok(None)
        }
        Err(err) => Err(BindError::native(err.to_string())),
    }
}

/// [`surface`] for bodies returning a host value. "No value" is undefined.
pub fn surface_value<T, E>(result: Result<T, E>) -> Result<Value, BindError>
where
    T: Into<Value>,
    E: NativeStatus,
{
    Ok(surface(result)?.map_or(Value::Undefined, Into::into))
}
