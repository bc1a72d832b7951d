//! Native pointers carried by host objects and external handles.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::TypeHash;

/// Shared, type-erased reference to a native object.
///
/// This is what a host object "wraps" and what an external handle carries.
/// Clones share the same allocation, and identity is pointer identity.
#[derive(Clone)]
pub struct NativeRef(Arc<dyn Any + Send + Sync>);

impl NativeRef {
    /// Move a native value behind a new shared reference.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Share an existing allocation.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    /// Recover the typed `Arc` if the native value is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    /// Borrow the native value as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Check the concrete type without borrowing.
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Pointer identity.
    pub fn ptr_eq(&self, other: &NativeRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    /// Number of live references to the native value.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeRef({:p})", Arc::as_ptr(&self.0))
    }
}

/// Extra data handed to a finalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeHint {
    /// Bound class of the wrapping object, if it came from a class binding.
    pub class: Option<TypeHash>,
}

/// Callback run exactly once when a wrapping object is collected.
pub struct Finalizer(Box<dyn FnOnce(NativeRef, FinalizeHint) + Send>);

impl Finalizer {
    /// Create a finalizer from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(NativeRef, FinalizeHint) + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// A finalizer that only drops the host's share of the native value.
    pub fn release() -> Self {
        Self::new(|native, _| drop(native))
    }

    pub(crate) fn run(self, native: NativeRef, hint: FinalizeHint) {
        (self.0)(native, hint)
    }
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizer").finish_non_exhaustive()
    }
}

/// The native association stored on a wrapped host object.
#[derive(Debug)]
pub struct Wrapped {
    pub(crate) native: NativeRef,
    pub(crate) finalizer: Finalizer,
    pub(crate) hint: FinalizeHint,
}

impl Wrapped {
    pub(crate) fn finalize(self) {
        log::trace!("finalizing {:?} (class {:?})", self.native, self.hint.class);
        self.finalizer.run(self.native, self.hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn downcast_round_trip() {
        let native = NativeRef::new(String::from("payload"));
        assert!(native.is::<String>());
        assert_eq!(native.downcast_ref::<String>().map(String::as_str), Some("payload"));
        assert!(native.downcast::<u32>().is_none());

        let typed = native.downcast::<String>();
        assert!(typed.is_some());
        assert_eq!(native.strong_count(), 2);
    }

    #[test]
    fn identity_is_pointer_identity() {
        let a = NativeRef::new(1u32);
        let b = a.clone();
        let c = NativeRef::new(1u32);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn finalizer_receives_native_and_hint() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let class = TypeHash::from_name("Thing");

        let finalizer = Finalizer::new(move |native, hint| {
            assert_eq!(native.downcast_ref::<u32>(), Some(&7));
            assert_eq!(hint.class, Some(class));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        finalizer.run(NativeRef::new(7u32), FinalizeHint { class: Some(class) });

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_finalizer_drops_reference() {
        let value = Arc::new(3u8);
        let native = NativeRef::from_arc(Arc::clone(&value));
        assert_eq!(Arc::strong_count(&value), 2);

        Finalizer::release().run(native, FinalizeHint::default());
        assert_eq!(Arc::strong_count(&value), 1);
    }
}
