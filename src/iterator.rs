//! Iterator protocol for wrapped native collections.
//!
//! A collection opts in by implementing [`IndexedCollection`] and adding
//! [`iterator_method`] to its class's methods. Each `[Symbol.iterator]()`
//! call wraps a fresh [`CollectionIterator`] in the unexported iterator
//! class bound by [`IteratorClass::bind`].
//!
//! Iteration reads the collection's length on every step. Elements appended
//! while iterating are visited; nothing is snapshotted.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bindery_core::{Env, Finalizer, NativeRef, Value};

use crate::binder::{ClassBinder, ClassBinding};
use crate::descriptor::MethodDescriptor;
use crate::error::BindError;

/// A native collection addressable by position.
pub trait IndexedCollection: Send + Sync + 'static {
    /// Current number of elements.
    fn len(&self) -> usize;

    /// Host value for the element at `index`.
    fn element(&self, env: &mut Env, index: usize) -> Result<Value, BindError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one iteration step.
#[derive(Debug, Clone, PartialEq)]
pub enum IterStep {
    Yield(Value),
    Done,
}

impl IterStep {
    /// Build the host-side `{ done, value }` result object.
    pub fn into_result(self, env: &mut Env) -> Result<Value, BindError> {
        let (done, value) = match self {
            IterStep::Yield(value) => (false, value),
            IterStep::Done => (true, Value::Undefined),
        };
        let result = env.create_object();
        env.set_named_property(&result, "done", done)?;
        env.set_named_property(&result, "value", value)?;
        Ok(result)
    }
}

/// Cursor over an [`IndexedCollection`].
pub struct CollectionIterator {
    collection: Arc<dyn IndexedCollection>,
    position: AtomicUsize,
}

impl CollectionIterator {
    pub fn new(collection: Arc<dyn IndexedCollection>) -> Self {
        Self {
            collection,
            position: AtomicUsize::new(0),
        }
    }

    /// Index of the next element.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    /// Advance one step.
    pub fn next(&self, env: &mut Env) -> Result<IterStep, BindError> {
        let position = self.position();
        if position < self.collection.len() {
            let value = self.collection.element(env, position)?;
            self.position.store(position + 1, Ordering::Release);
            Ok(IterStep::Yield(value))
        } else {
            Ok(IterStep::Done)
        }
    }
}

impl std::fmt::Debug for CollectionIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionIterator")
            .field("position", &self.position())
            .field("len", &self.collection.len())
            .finish()
    }
}

/// The bound iterator class.
#[derive(Debug, Clone)]
pub struct IteratorClass {
    binding: ClassBinding,
}

impl IteratorClass {
    /// Class name the iterator is bound under.
    pub const NAME: &'static str = "NativeIterator";

    /// Bind the iterator class. It is not exported; its constructor has no
    /// body, so instances only come from [`iterate`](Self::iterate).
    pub fn bind(binder: &mut ClassBinder, env: &mut Env) -> Result<Self, BindError> {
        let next = MethodDescriptor::named("next").callback(|env, info| {
            let iterator = info.native::<CollectionIterator>()?;
            iterator.next(env)?.into_result(env)
        });
        let binding = binder.bind_unexported(
            env,
            MethodDescriptor::constructor(Self::NAME),
            Vec::new(),
            vec![next],
        )?;
        Ok(Self { binding })
    }

    /// Wrap a new iterator over `collection`.
    ///
    /// The iterator holds one share of the collection until it is collected.
    pub fn iterate(
        &self,
        env: &mut Env,
        collection: Arc<dyn IndexedCollection>,
    ) -> Result<Value, BindError> {
        let iterator = CollectionIterator::new(collection);
        self.binding
            .wrap_existing(env, NativeRef::new(iterator), Finalizer::release())
    }

    pub fn binding(&self) -> &ClassBinding {
        &self.binding
    }
}

/// `[Symbol.iterator]` method for a class whose instances wrap a `C`.
pub fn iterator_method<C: IndexedCollection>(iterators: IteratorClass) -> MethodDescriptor {
    MethodDescriptor::symbol("iterator").callback(move |env, info| {
        let collection: Arc<dyn IndexedCollection> = info.native::<C>()?;
        iterators.iterate(env, collection)
    })
}
