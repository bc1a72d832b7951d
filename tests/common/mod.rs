//! Shared fixtures for the integration tests.
//!
//! Binds two small classes the way a domain binding would: an `HttpHeaders`
//! collection (iterable, with a lookup whose "not found" is not an error)
//! and an `HttpRequest` whose constructor takes a method and a path.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bindery::prelude::*;
use parking_lot::Mutex;
use thiserror::Error;

// =============================================================================
// Native side
// =============================================================================

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("header not found")]
    NotFound,
}

impl NativeStatus for HeaderError {
    fn is_expected(&self) -> bool {
        matches!(self, HeaderError::NotFound)
    }
}

#[derive(Debug, Default)]
pub struct Headers {
    entries: Mutex<Vec<(String, String)>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: &str, value: &str) {
        self.entries.lock().push((name.to_string(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Result<String, HeaderError> {
        self.entries
            .lock()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .ok_or(HeaderError::NotFound)
    }

    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl IndexedCollection for Headers {
    fn len(&self) -> usize {
        self.count()
    }

    fn element(&self, env: &mut Env, index: usize) -> Result<Value, BindError> {
        let (name, value) = self
            .entries
            .lock()
            .get(index)
            .cloned()
            .ok_or_else(|| BindError::native(format!("no header at {}", index)))?;
        Ok(env.create_array_from(vec![Value::from(name), Value::from(value)]))
    }
}

#[derive(Debug)]
pub struct Request {
    pub method: Mutex<String>,
    pub path: String,
    pub headers: Arc<Headers>,
}

// =============================================================================
// Bindings
// =============================================================================

/// Finalizer that bumps `counter` when it runs.
pub fn counting(counter: &Arc<AtomicUsize>) -> Finalizer {
    let counter = Arc::clone(counter);
    Finalizer::new(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

pub fn bind_headers(
    binder: &mut ClassBinder,
    env: &mut Env,
    exports: &Value,
    iterators: IteratorClass,
    finalized: &Arc<AtomicUsize>,
) -> ClassBinding {
    let finalized = Arc::clone(finalized);
    binder
        .bind(
            env,
            exports,
            MethodDescriptor::constructor("HttpHeaders").callback(move |env, info| {
                wrap_instance(env, info, NativeRef::new(Headers::new()), counting(&finalized))?;
                Ok(Value::Undefined)
            }),
            vec![
                PropertyDescriptor::named("length")
                    .kind(ValueKind::Number)
                    .getter(|_, info| Ok(Value::from(info.native::<Headers>()?.count()))),
            ],
            vec![
                MethodDescriptor::named("add")
                    .arg(ValueKind::String)
                    .arg(ValueKind::String)
                    .callback(|_, info| {
                        info.native::<Headers>()?.add(info.string(0)?, info.string(1)?);
                        Ok(Value::Undefined)
                    }),
                MethodDescriptor::named("get")
                    .arg(ValueKind::String)
                    .callback(|_, info| surface_value(info.native::<Headers>()?.get(info.string(0)?))),
                iterator_method::<Headers>(iterators),
            ],
        )
        .expect("HttpHeaders binds")
}

pub fn bind_request(
    binder: &mut ClassBinder,
    env: &mut Env,
    exports: &Value,
    headers_class: ClassBinding,
    finalized: &Arc<AtomicUsize>,
) -> ClassBinding {
    let finalized = Arc::clone(finalized);
    binder
        .bind(
            env,
            exports,
            MethodDescriptor::constructor("HttpRequest")
                .arg(ValueKind::String)
                .arg(ValueKind::String)
                .optional_arg(Some(ValueKind::Object))
                .callback(move |env, info| {
                    let mut cursor = info.cursor();
                    let method = cursor.next(Some(ValueKind::String)).and_then(|a| a.as_str());
                    let path = cursor.next(Some(ValueKind::String)).and_then(|a| a.as_str());
                    let headers = cursor
                        .next(Some(ValueKind::Object))
                        .and_then(|a| a.downcast::<Headers>())
                        .unwrap_or_default();

                    let request = Request {
                        method: Mutex::new(method.unwrap_or_default().to_string()),
                        path: path.unwrap_or_default().to_string(),
                        headers,
                    };
                    wrap_instance(env, info, NativeRef::new(request), counting(&finalized))?;
                    Ok(Value::Undefined)
                }),
            vec![
                PropertyDescriptor::named("method")
                    .kind(ValueKind::String)
                    .getter(|_, info| Ok(Value::from(info.native::<Request>()?.method.lock().clone())))
                    .setter(|_, info| {
                        *info.native::<Request>()?.method.lock() = info.string(0)?.to_string();
                        Ok(())
                    }),
                PropertyDescriptor::named("path")
                    .kind(ValueKind::String)
                    .getter(|_, info| Ok(Value::from(info.native::<Request>()?.path.clone()))),
                PropertyDescriptor::named("headers")
                    .kind(ValueKind::Object)
                    .getter(move |env, info| {
                        let headers = Arc::clone(&info.native::<Request>()?.headers);
                        headers_class.wrap_existing(env, NativeRef::from_arc(headers), Finalizer::release())
                    }),
            ],
            Vec::new(),
        )
        .expect("HttpRequest binds")
}

// =============================================================================
// Fixture
// =============================================================================

pub struct Fixture {
    pub env: Env,
    pub exports: Value,
    pub binder: ClassBinder,
    pub iterators: IteratorClass,
    pub headers: ClassBinding,
    pub request: ClassBinding,
    /// Runs of the counting finalizers attached by the two constructors.
    pub finalized: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn new() -> Self {
        init_logging();
        let mut env = Env::new();
        let exports = env.create_object();
        let mut binder = ClassBinder::new();
        let finalized = Arc::new(AtomicUsize::new(0));

        let iterators = IteratorClass::bind(&mut binder, &mut env).expect("iterator binds");
        let headers = bind_headers(&mut binder, &mut env, &exports, iterators.clone(), &finalized);
        let request = bind_request(&mut binder, &mut env, &exports, headers.clone(), &finalized);

        Self {
            env,
            exports,
            binder,
            iterators,
            headers,
            request,
            finalized,
        }
    }

    /// An exported constructor.
    pub fn class(&mut self, name: &str) -> Value {
        self.env
            .get_named_property(&self.exports, name)
            .expect("exported class")
    }

    /// `new HttpRequest(...args)`
    pub fn new_request(&mut self, args: &[Value]) -> Result<Value, Exception> {
        let ctor = self.class("HttpRequest");
        self.env.new_instance(&ctor, args)
    }

    /// `new HttpHeaders()`
    pub fn new_headers(&mut self) -> Value {
        let ctor = self.class("HttpHeaders");
        self.env.new_instance(&ctor, &[]).expect("HttpHeaders constructs")
    }

    pub fn finalized(&self) -> usize {
        self.finalized.load(Ordering::SeqCst)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|s| Value::from(*s)).collect()
}
