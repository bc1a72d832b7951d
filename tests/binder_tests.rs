//! Integration tests for class binding and dispatch.
//!
//! Drives the `HttpRequest` and `HttpHeaders` classes from the shared
//! fixture through the host environment, the same way host code would.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bindery::Identity;
use bindery::bindery_core::{ExceptionClass, PropertyKey};
use bindery::prelude::*;
use common::{Fixture, strings};

fn code(exception: &Exception) -> &str {
    exception.code().unwrap_or("")
}

// =============================================================================
// Constructors
// =============================================================================

#[test]
fn test_constructor_arity_mismatch() {
    let mut fx = Fixture::new();
    let err = fx.new_request(&strings(&["GET"])).unwrap_err();
    assert_eq!(err.class, ExceptionClass::Error);
    assert_eq!(code(&err), "ArityMismatch");
    assert_eq!(fx.finalized(), 0);
}

#[test]
fn test_constructor_type_mismatch() {
    let mut fx = Fixture::new();
    let err = fx
        .new_request(&[Value::from("GET"), Value::from(42)])
        .unwrap_err();
    assert_eq!(err.class, ExceptionClass::TypeError);
    assert_eq!(code(&err), "TypeMismatch");
    assert!(err.message.contains("argument 1"));

    // The buffer marshaled for the first argument went back to the pool
    assert_eq!(fx.binder.marshaler().outstanding_buffers(), 0);
}

#[test]
fn test_constructor_success() {
    let mut fx = Fixture::new();
    let request = fx.new_request(&strings(&["GET", "/index.html"])).unwrap();

    assert_eq!(
        fx.env.get_named_property(&request, "method").unwrap(),
        Value::from("GET")
    );
    assert_eq!(
        fx.env.get_named_property(&request, "path").unwrap(),
        Value::from("/index.html")
    );
    let ctor = fx.class("HttpRequest");
    assert!(fx.env.instance_of(&request, &ctor).unwrap());
    assert_eq!(fx.binder.marshaler().outstanding_buffers(), 0);
}

#[test]
fn test_constructor_optional_argument_may_be_undefined() {
    let mut fx = Fixture::new();
    let request = fx
        .new_request(&[Value::from("GET"), Value::from("/"), Value::Undefined])
        .unwrap();
    let native = unwrap_as::<common::Request>(&fx.env, &request).unwrap();
    assert_eq!(native.headers.count(), 0);
}

#[test]
fn test_constructor_reuses_passed_headers() {
    let mut fx = Fixture::new();
    let headers = fx.new_headers();
    fx.env
        .call_method(&headers, "add", &strings(&["Host", "example.com"]))
        .unwrap();

    let request = fx
        .new_request(&[Value::from("GET"), Value::from("/"), headers.clone()])
        .unwrap();
    let from_request = unwrap_as::<common::Request>(&fx.env, &request).unwrap();
    let from_headers = unwrap_as::<common::Headers>(&fx.env, &headers).unwrap();
    assert!(Arc::ptr_eq(&from_request.headers, &from_headers));
}

#[test]
fn test_class_requires_new() {
    let mut fx = Fixture::new();
    let ctor = fx.class("HttpRequest");
    let err = fx
        .env
        .call_function(&ctor, Value::Undefined, &strings(&["GET", "/"]))
        .unwrap_err();
    assert_eq!(err.class, ExceptionClass::TypeError);
}

#[test]
fn test_constructor_truncates_excess_arguments() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let tally = fx
        .binder
        .bind(
            &mut fx.env,
            &exports,
            MethodDescriptor::constructor("Tally").callback(|env, info| {
                wrap_instance(env, info, NativeRef::new(info.num_args()), Finalizer::release())?;
                Ok(Value::Undefined)
            }),
            vec![
                PropertyDescriptor::named("received")
                    .kind(ValueKind::Number)
                    .getter(|_, info| Ok(Value::from(*info.native::<usize>()?))),
            ],
            vec![MethodDescriptor::named("count").callback(|_, info| Ok(Value::from(info.num_args())))],
        )
        .unwrap();

    let args: Vec<Value> = (0..12).map(Value::from).collect();
    let instance = tally.new_instance(&mut fx.env, &args).unwrap();
    assert_eq!(
        fx.env.get_named_property(&instance, "received").unwrap(),
        Value::from(9)
    );

    let counted = fx.env.call_method(&instance, "count", &args[..11]).unwrap();
    assert_eq!(counted, Value::from(9));
    assert_eq!(fx.binder.marshaler().outstanding_buffers(), 0);
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_setter_updates_native_state() {
    let mut fx = Fixture::new();
    let request = fx.new_request(&strings(&["GET", "/"])).unwrap();

    fx.env.set_named_property(&request, "method", "POST").unwrap();
    assert_eq!(
        fx.env.get_named_property(&request, "method").unwrap(),
        Value::from("POST")
    );
    let native = unwrap_as::<common::Request>(&fx.env, &request).unwrap();
    assert_eq!(*native.method.lock(), "POST");
}

#[test]
fn test_setter_rejects_wrong_kind() {
    let mut fx = Fixture::new();
    let request = fx.new_request(&strings(&["GET", "/"])).unwrap();

    let err = fx.env.set_named_property(&request, "method", 5).unwrap_err();
    assert_eq!(code(&err), "TypeMismatch");

    // Undefined is not accepted by setters either
    let err = fx
        .env
        .set_named_property(&request, "method", Value::Undefined)
        .unwrap_err();
    assert_eq!(code(&err), "TypeMismatch");
}

#[test]
fn test_read_only_property() {
    let mut fx = Fixture::new();
    let request = fx.new_request(&strings(&["GET", "/a"])).unwrap();

    let err = fx.env.set_named_property(&request, "path", "/b").unwrap_err();
    assert_eq!(code(&err), "PropertyNotWritable");
    assert_eq!(
        fx.env.get_named_property(&request, "path").unwrap(),
        Value::from("/a")
    );
}

#[test]
fn test_write_only_property() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let secrets = Arc::new(AtomicUsize::new(0));
    let written = Arc::clone(&secrets);

    let binding = fx
        .binder
        .bind(
            &mut fx.env,
            &exports,
            MethodDescriptor::constructor("Vault").callback(|env, info| {
                wrap_instance(env, info, NativeRef::new(()), Finalizer::release())?;
                Ok(Value::Undefined)
            }),
            vec![
                PropertyDescriptor::named("secret")
                    .kind(ValueKind::Number)
                    .setter(move |_, info| {
                        written.store(info.integer(0)? as usize, Ordering::SeqCst);
                        Ok(())
                    }),
            ],
            Vec::new(),
        )
        .unwrap();

    let vault = binding.new_instance(&mut fx.env, &[]).unwrap();
    fx.env.set_named_property(&vault, "secret", 7).unwrap();
    assert_eq!(secrets.load(Ordering::SeqCst), 7);

    let err = fx.env.get_named_property(&vault, "secret").unwrap_err();
    assert_eq!(code(&err), "PropertyNotReadable");
}

#[test]
fn test_getter_on_unbound_receiver() {
    let mut fx = Fixture::new();
    let ctor = fx.class("HttpRequest");
    let prototype = fx.env.get_named_property(&ctor, "prototype").unwrap();

    let err = fx.env.get_named_property(&prototype, "method").unwrap_err();
    assert_eq!(code(&err), "UnwrapOnUnboundObject");
}

#[test]
fn test_getter_result_validation_can_be_disabled() {
    let config = BinderConfig::default().with_getter_validation(false);
    let mut binder = ClassBinder::with_config(config);
    let mut env = Env::new();
    let exports = env.create_object();

    let binding = binder
        .bind(
            &mut env,
            &exports,
            MethodDescriptor::constructor("Loose").callback(|env, info| {
                wrap_instance(env, info, NativeRef::new(()), Finalizer::release())?;
                Ok(Value::Undefined)
            }),
            vec![
                PropertyDescriptor::named("name")
                    .kind(ValueKind::String)
                    .getter(|_, _| Ok(Value::from(1))),
            ],
            Vec::new(),
        )
        .unwrap();

    let loose = binding.new_instance(&mut env, &[]).unwrap();
    assert_eq!(env.get_named_property(&loose, "name").unwrap(), Value::from(1));
}

// =============================================================================
// Methods
// =============================================================================

#[test]
fn test_method_with_native_status() {
    let mut fx = Fixture::new();
    let headers = fx.new_headers();

    let missing = fx
        .env
        .call_method(&headers, "get", &strings(&["Accept"]))
        .unwrap();
    assert!(missing.is_undefined());

    fx.env
        .call_method(&headers, "add", &strings(&["Accept", "text/html"]))
        .unwrap();
    let found = fx
        .env
        .call_method(&headers, "get", &strings(&["accept"]))
        .unwrap();
    assert_eq!(found, Value::from("text/html"));
    assert_eq!(
        fx.env.get_named_property(&headers, "length").unwrap(),
        Value::from(1)
    );
}

#[test]
fn test_method_on_foreign_instance() {
    let mut fx = Fixture::new();
    let headers = fx.new_headers();
    let request = fx.new_request(&strings(&["GET", "/"])).unwrap();

    let add = fx.env.get_named_property(&headers, "add").unwrap();
    let err = fx
        .env
        .call_function(&add, request, &strings(&["Host", "x"]))
        .unwrap_err();
    assert_eq!(code(&err), "UnwrapOnUnboundObject");
}

#[test]
fn test_method_arity_failure_skips_body() {
    let mut fx = Fixture::new();
    let headers = fx.new_headers();

    let err = fx
        .env
        .call_method(&headers, "add", &strings(&["Host"]))
        .unwrap_err();
    assert_eq!(code(&err), "ArityMismatch");
    assert_eq!(
        fx.env.get_named_property(&headers, "length").unwrap(),
        Value::from(0)
    );
}

#[test]
fn test_static_method_lives_on_constructor() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();

    fx.binder
        .bind(
            &mut fx.env,
            &exports,
            MethodDescriptor::constructor("Status"),
            Vec::new(),
            vec![
                MethodDescriptor::named("isSuccess")
                    .arg(ValueKind::Number)
                    .with_static()
                    .callback(|_, info| {
                        assert!(info.native_this().is_none());
                        Ok(Value::from((200..300).contains(&info.integer(0)?)))
                    }),
            ],
        )
        .unwrap();

    let status = fx.class("Status");
    assert_eq!(
        fx.env.call_method(&status, "isSuccess", &[Value::from(204)]).unwrap(),
        Value::from(true)
    );
    assert_eq!(
        fx.env.call_method(&status, "isSuccess", &[Value::from(404)]).unwrap(),
        Value::from(false)
    );

    let instance = fx.env.new_instance(&status, &[]).unwrap();
    assert!(!fx.env.has_property(&instance, "isSuccess"));
}

#[test]
fn test_symbol_iterator_installed() {
    let mut fx = Fixture::new();
    let headers = fx.new_headers();
    let iterator = fx.env.well_known_symbol("iterator").unwrap();
    assert!(fx.env.has_property(&headers, PropertyKey::from(iterator)));
}

#[test]
fn test_members_installed_in_declaration_order() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let binding = fx
        .binder
        .bind(
            &mut fx.env,
            &exports,
            MethodDescriptor::constructor("Ordered"),
            vec![
                PropertyDescriptor::named("zeta").getter(|_, _| Ok(Value::Null)),
                PropertyDescriptor::named("alpha").getter(|_, _| Ok(Value::Null)),
            ],
            vec![
                MethodDescriptor::named("omega").callback(|_, _| Ok(Value::Null)),
                MethodDescriptor::named("beta").callback(|_, _| Ok(Value::Null)),
                MethodDescriptor::named("gamma").callback(|_, _| Ok(Value::Null)),
            ],
        )
        .unwrap();

    let ctor = binding.constructor(&fx.env).unwrap();
    let prototype = fx.env.get_named_property(&ctor, "prototype").unwrap();
    let keys: Vec<String> = fx
        .env
        .own_keys(&prototype)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(keys, ["constructor", "zeta", "alpha", "omega", "beta", "gamma"]);
}

// =============================================================================
// Free functions
// =============================================================================

#[test]
fn test_define_function_truncates_arguments() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let count = fx
        .binder
        .define_function(
            &mut fx.env,
            &exports,
            MethodDescriptor::named("count").callback(|_, info| Ok(Value::from(info.num_args()))),
        )
        .unwrap();

    let args: Vec<Value> = (0..12).map(Value::from).collect();
    let result = fx.env.call_function(&count, Value::Undefined, &args).unwrap();
    assert_eq!(result, Value::from(9));

    let exported = fx.env.get_named_property(&exports, "count").unwrap();
    assert_eq!(exported, count);
}

#[test]
fn test_define_function_with_smaller_capacity() {
    let mut binder = ClassBinder::with_config(BinderConfig::default().with_max_args(3));
    let mut env = Env::new();
    let exports = env.create_object();
    let count = binder
        .define_function(
            &mut env,
            &exports,
            MethodDescriptor::named("count").callback(|_, info| Ok(Value::from(info.num_args()))),
        )
        .unwrap();

    let args: Vec<Value> = (0..5).map(Value::from).collect();
    assert_eq!(
        env.call_function(&count, Value::Undefined, &args).unwrap(),
        Value::from(3)
    );
}

#[test]
fn test_define_function_arity_failure_skips_body() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let join = fx
        .binder
        .define_function(
            &mut fx.env,
            &exports,
            MethodDescriptor::named("join")
                .arg(ValueKind::String)
                .arg(ValueKind::String)
                .callback(move |_, info| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::from(format!("{}{}", info.string(0)?, info.string(1)?)))
                }),
        )
        .unwrap();

    let err = fx
        .env
        .call_function(&join, Value::Undefined, &strings(&["a"]))
        .unwrap_err();
    assert_eq!(code(&err), "ArityMismatch");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let joined = fx
        .env
        .call_function(&join, Value::Undefined, &strings(&["a", "b"]))
        .unwrap();
    assert_eq!(joined, Value::from("ab"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_define_function_can_be_redefined() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    fx.binder
        .define_function(
            &mut fx.env,
            &exports,
            MethodDescriptor::named("version").callback(|_, _| Ok(Value::from(1))),
        )
        .unwrap();
    let second = fx
        .binder
        .define_function(
            &mut fx.env,
            &exports,
            MethodDescriptor::named("version").callback(|_, _| Ok(Value::from(2))),
        )
        .unwrap();

    let exported = fx.env.get_named_property(&exports, "version").unwrap();
    assert_eq!(exported, second);
    assert_eq!(
        fx.env.call_function(&exported, Value::Undefined, &[]).unwrap(),
        Value::from(2)
    );

    // Exports behave like assigned properties
    fx.env.set_named_property(&exports, "version", 3).unwrap();
    assert_eq!(fx.env.get_named_property(&exports, "version").unwrap(), Value::from(3));
}

#[test]
fn test_defined_functions_are_registered() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    fx.binder
        .define_function(
            &mut fx.env,
            &exports,
            MethodDescriptor::named("parse")
                .arg(ValueKind::String)
                .callback(|_, info| Ok(Value::from(info.string(0)?.len()))),
        )
        .unwrap();

    let parse = fx.binder.function(&Identity::Name("parse".into())).unwrap();
    assert!(parse.is_static());
    assert_eq!(parse.required, 1);
    assert!(fx.binder.function(&Identity::Name("missing".into())).is_none());
}

#[test]
fn test_define_function_over_configured_capacity_rejected() {
    let mut binder = ClassBinder::with_config(BinderConfig::default().with_max_args(2));
    let mut env = Env::new();
    let exports = env.create_object();

    let err = binder
        .define_function(
            &mut env,
            &exports,
            MethodDescriptor::named("three")
                .arg(ValueKind::Number)
                .arg(ValueKind::Number)
                .arg(ValueKind::Number)
                .callback(|_, _| Ok(Value::Undefined)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDescriptor);
    assert!(env.get_named_property(&exports, "three").unwrap().is_undefined());
    assert!(binder.function(&Identity::Name("three".into())).is_none());
}

#[test]
fn test_class_members_over_configured_capacity_rejected() {
    let mut binder = ClassBinder::with_config(BinderConfig::default().with_max_args(1));
    let mut env = Env::new();
    let exports = env.create_object();

    let err = binder
        .bind(
            &mut env,
            &exports,
            MethodDescriptor::constructor("Pair")
                .arg(ValueKind::String)
                .arg(ValueKind::String),
            Vec::new(),
            Vec::new(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDescriptor);

    let err = binder
        .bind(
            &mut env,
            &exports,
            MethodDescriptor::constructor("Single").arg(ValueKind::String),
            Vec::new(),
            vec![
                MethodDescriptor::named("swap")
                    .arg(ValueKind::Number)
                    .arg(ValueKind::Number)
                    .callback(|_, _| Ok(Value::Undefined)),
            ],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDescriptor);
    assert!(binder.class_named("Single").is_none());
}

#[test]
fn test_native_failure_becomes_exception() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let fail = fx
        .binder
        .define_function(
            &mut fx.env,
            &exports,
            MethodDescriptor::named("fail").callback(|_, _| Err(BindError::native("disk full"))),
        )
        .unwrap();

    let err = fx.env.call_function(&fail, Value::Undefined, &[]).unwrap_err();
    assert_eq!(err.class, ExceptionClass::Error);
    assert_eq!(code(&err), "NativeOperationFailure");
    assert!(err.message.contains("disk full"));
}

// =============================================================================
// Descriptor validation
// =============================================================================

#[test]
fn test_property_without_accessors_rejected() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let err = fx
        .binder
        .bind(
            &mut fx.env,
            &exports,
            MethodDescriptor::constructor("Empty"),
            vec![PropertyDescriptor::named("nothing")],
            Vec::new(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDescriptor);
    assert!(fx.env.get_named_property(&exports, "Empty").unwrap().is_undefined());
}

#[test]
fn test_constructor_over_capacity_rejected() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let ctor = (0..10).fold(MethodDescriptor::constructor("Wide"), |ctor, _| {
        ctor.arg(ValueKind::Number)
    });
    let err = fx
        .binder
        .bind(&mut fx.env, &exports, ctor, Vec::new(), Vec::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDescriptor);
}

#[test]
fn test_symbol_constructor_rejected() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let err = fx
        .binder
        .bind(
            &mut fx.env,
            &exports,
            MethodDescriptor::symbol("iterator"),
            Vec::new(),
            Vec::new(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDescriptor);
}

#[test]
fn test_required_argument_after_optional_rejected() {
    let mut fx = Fixture::new();
    let exports = fx.exports.clone();
    let err = fx
        .binder
        .define_function(
            &mut fx.env,
            &exports,
            MethodDescriptor::named("misordered")
                .optional_arg(Some(ValueKind::String))
                .arg(ValueKind::Number)
                .callback(|_, _| Ok(Value::Undefined)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDescriptor);
}
