//! An in-memory host used by the integration tests.
//!
//! Implements just enough of a dynamic runtime for the bridge to exercise
//! every capability it consumes: a global namespace, Array/Object/Promise/
//! Error constructors, the array-test and key-enumeration predicates, JSON
//! stringification, function binding and a task queue standing in for the
//! host's event loop.

// Each test binary uses a different slice of the mock.
#![allow(dead_code)]

use dynbridge::errors::{BridgeError, Result};
use dynbridge::host::{BoundFn, Host, QueueScheduler, Scheduler};
use dynbridge::value::{Ref, Value};

use once_cell::sync::Lazy;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// A fresh mock host with logging initialized.
pub fn host() -> MockHost {
    Lazy::force(&TRACING);
    MockHost::new()
}

#[derive(Clone, Copy, Debug)]
enum Native {
    ArrayCtor,
    IsArray,
    ObjectCtor,
    ObjectKeys,
    JsonStringify,
    ErrorCtor,
    PromiseCtor,
    Combinator(&'static str),
    Resolve(Ref),
    Reject(Ref),
}

#[derive(Clone)]
enum Callable {
    Bound(Rc<RefCell<BoundFn>>),
    Native(Native),
}

#[derive(Default)]
struct Entry {
    /// Own properties in insertion order — the host enumeration order.
    props: Vec<(String, Value)>,
    array: bool,
    callable: Option<Callable>,
    ctor_tag: Option<Ref>,
}

impl Entry {
    fn object() -> Self {
        Self::default()
    }

    fn array() -> Self {
        Self { array: true, props: vec![("length".into(), Value::Number(0.0))], ..Self::default() }
    }

    fn native(native: Native) -> Self {
        Self { callable: Some(Callable::Native(native)), ..Self::default() }
    }

    fn prop(&self, key: &str) -> Value {
        self.props
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Undefined)
    }

    fn set_prop(&mut self, key: &str, value: Value) {
        match self.props.iter_mut().find(|(name, _)| name == key) {
            Some((_, slot)) => *slot = value,
            None => self.props.push((key.to_string(), value)),
        }
    }
}

pub struct MockHost {
    entries: RefCell<HashMap<Ref, Entry>>,
    next: Cell<Ref>,
    global_ref: Ref,
    promise_ctor: Cell<Ref>,
    released: RefCell<Vec<Ref>>,
    queue: QueueScheduler,
}

impl MockHost {
    pub fn new() -> Self {
        let mut host = Self {
            entries: RefCell::new(HashMap::new()),
            next: Cell::new(1),
            global_ref: 0,
            promise_ctor: Cell::new(0),
            released: RefCell::new(Vec::new()),
            queue: QueueScheduler::new(),
        };
        host.global_ref = host.alloc(Entry::object());

        let array_ctor = host.alloc(Entry::native(Native::ArrayCtor));
        let is_array = host.alloc(Entry::native(Native::IsArray));
        host.set(array_ctor, "isArray", Value::Function(is_array));

        let object_ctor = host.alloc(Entry::native(Native::ObjectCtor));
        let object_keys = host.alloc(Entry::native(Native::ObjectKeys));
        host.set(object_ctor, "keys", Value::Function(object_keys));

        let json = host.alloc(Entry::object());
        let stringify = host.alloc(Entry::native(Native::JsonStringify));
        host.set(json, "stringify", Value::Function(stringify));

        let error_ctor = host.alloc(Entry::native(Native::ErrorCtor));

        let promise_ctor = host.alloc(Entry::native(Native::PromiseCtor));
        host.promise_ctor.set(promise_ctor);
        for name in ["all", "any", "race", "allSettled"] {
            let combinator = host.alloc(Entry::native(Native::Combinator(name)));
            host.set(promise_ctor, name, Value::Function(combinator));
        }

        let global = host.global_ref;
        host.set(global, "Array", Value::Function(array_ctor));
        host.set(global, "Object", Value::Function(object_ctor));
        host.set(global, "JSON", Value::Object(json));
        host.set(global, "Error", Value::Function(error_ctor));
        host.set(global, "Promise", Value::Function(promise_ctor));
        host
    }

    fn alloc(&self, entry: Entry) -> Ref {
        let id = self.next.get();
        self.next.set(id + 1);
        self.entries.borrow_mut().insert(id, entry);
        id
    }

    /// Creates a plain object.
    pub fn new_object(&self) -> Value {
        Value::Object(self.alloc(Entry::object()))
    }

    /// Creates a host array holding `values`.
    pub fn new_array(&self, values: Vec<Value>) -> Value {
        let arr = self.alloc(Entry::array());
        for (i, value) in values.into_iter().enumerate() {
            self.set_index(arr, i, value);
        }
        Value::Object(arr)
    }

    /// Creates a host symbol handle.
    pub fn new_symbol(&self) -> Value {
        Value::Symbol(self.alloc(Entry::object()))
    }

    /// Installs the well-known publishing object under the global namespace.
    pub fn install_bridge(&self, ident: &str) -> Value {
        let bridge = self.new_object();
        self.set(self.global_ref, ident, bridge.clone());
        bridge
    }

    /// Removes a property from the global namespace (to simulate a missing
    /// capability).
    pub fn remove_global(&self, name: &str) {
        self.delete(self.global_ref, name);
    }

    /// Whether the object carries `key` as an own property.
    pub fn has_prop(&self, value: &Value, key: &str) -> bool {
        let obj = value.as_ref_id().expect("has_prop needs a reference kind");
        self.entries.borrow()[&obj].props.iter().any(|(name, _)| name == key)
    }

    /// Own property names in enumeration order, minus the array length slot.
    pub fn own_props(&self, value: &Value) -> Vec<String> {
        let obj = value.as_ref_id().expect("own_props needs a reference kind");
        let entries = self.entries.borrow();
        let entry = &entries[&obj];
        entry
            .props
            .iter()
            .filter(|(name, _)| !(entry.array && name == "length"))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Function referents released through [`Host::release`] so far.
    pub fn released(&self) -> Vec<Ref> {
        self.released.borrow().clone()
    }

    /// A promise's `(state, settled value)`.
    pub fn promise_state(&self, promise: &Value) -> (String, Value) {
        let obj = promise.as_ref_id().expect("promise_state needs an object");
        let entries = self.entries.borrow();
        let entry = &entries[&obj];
        let state = match entry.prop("__state__") {
            Value::String(s) => s.to_string(),
            _ => "pending".to_string(),
        };
        (state, entry.prop("__value__"))
    }

    /// Drains the task queue once.
    pub fn run_tasks(&self) -> usize {
        self.queue.drain(self)
    }

    /// Pumps scheduled tasks until `done` holds or a timeout elapses.
    pub fn pump_until(&self, done: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            self.run_tasks();
            if done(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn callable(&self, func: Ref) -> Result<Callable> {
        self.entries
            .borrow()
            .get(&func)
            .and_then(|entry| entry.callable.clone())
            .ok_or_else(|| BridgeError::Thrown(format!("{func} is not a function")))
    }

    fn run_native(&self, native: Native, args: &[Value]) -> Result<Value> {
        match native {
            Native::ArrayCtor => Ok(self.new_array(Vec::new())),
            Native::ObjectCtor => Ok(self.new_object()),
            Native::IsArray => {
                let is_array = match args.first() {
                    Some(Value::Object(obj)) => {
                        self.entries.borrow().get(obj).map(|entry| entry.array).unwrap_or(false)
                    }
                    _ => false,
                };
                Ok(Value::Bool(is_array))
            }
            Native::ObjectKeys => {
                let target = args.first().cloned().unwrap_or(Value::Undefined);
                let keys = self
                    .own_props(&target)
                    .into_iter()
                    .map(|name| Value::string(name))
                    .collect();
                Ok(self.new_array(keys))
            }
            Native::JsonStringify => {
                let target = args.first().cloned().unwrap_or(Value::Undefined);
                match self.json_of(&target) {
                    Some(json) => Ok(Value::string(json.to_string())),
                    None => Ok(Value::Undefined),
                }
            }
            Native::ErrorCtor => self.make_error(args),
            Native::Combinator(name) => {
                let combined = self.alloc(Entry {
                    ctor_tag: Some(self.promise_ctor.get()),
                    ..Entry::object()
                });
                self.set(combined, "__combinator__", Value::string(name));
                self.set(
                    combined,
                    "__inputs__",
                    args.first().cloned().unwrap_or(Value::Undefined),
                );
                Ok(Value::Object(combined))
            }
            Native::Resolve(promise) => {
                self.settle_promise(promise, "fulfilled", args);
                Ok(Value::Undefined)
            }
            Native::Reject(promise) => {
                self.settle_promise(promise, "rejected", args);
                Ok(Value::Undefined)
            }
            Native::PromiseCtor => {
                Err(BridgeError::Thrown("Promise constructor requires new".into()))
            }
        }
    }

    fn make_error(&self, args: &[Value]) -> Result<Value> {
        let message = args.first().cloned().unwrap_or(Value::Undefined);
        let error = self.alloc(Entry::object());
        self.set(error, "message", message);
        Ok(Value::Object(error))
    }

    fn settle_promise(&self, promise: Ref, state: &str, args: &[Value]) {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get_mut(&promise).expect("settled promise exists");
        if entry.prop("__state__").as_str() != Some("pending") {
            return;
        }
        entry.set_prop("__state__", Value::string(state));
        entry.set_prop("__value__", args.first().cloned().unwrap_or(Value::Undefined));
    }

    fn construct_promise(&self, ctor: Ref, args: &[Value]) -> Result<Value> {
        let executor = match args.first() {
            Some(Value::Function(executor)) => *executor,
            _ => return Err(BridgeError::Thrown("Promise executor must be a function".into())),
        };
        let promise = self.alloc(Entry { ctor_tag: Some(ctor), ..Entry::object() });
        self.set(promise, "__state__", Value::string("pending"));
        let resolve = self.alloc(Entry::native(Native::Resolve(promise)));
        let reject = self.alloc(Entry::native(Native::Reject(promise)));
        self.call(
            executor,
            Value::Undefined,
            &[Value::Function(resolve), Value::Function(reject)],
        )?;
        Ok(Value::Object(promise))
    }

    fn json_of(&self, value: &Value) -> Option<serde_json::Value> {
        match value {
            Value::Undefined | Value::Symbol(_) | Value::Function(_) => None,
            Value::Null => Some(serde_json::Value::Null),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    Some(serde_json::Value::from(*n as i64))
                } else {
                    serde_json::Number::from_f64(*n).map(serde_json::Value::Number)
                }
            }
            Value::String(s) => Some(serde_json::Value::String(s.to_string())),
            Value::Object(obj) => {
                let entry_props: Vec<(String, Value)>;
                let is_array;
                {
                    let entries = self.entries.borrow();
                    let entry = &entries[obj];
                    entry_props = entry.props.clone();
                    is_array = entry.array;
                }
                if is_array {
                    let len = entry_props
                        .iter()
                        .find(|(name, _)| name == "length")
                        .and_then(|(_, v)| v.as_f64())
                        .unwrap_or(0.0) as usize;
                    let mut items = Vec::with_capacity(len);
                    for i in 0..len {
                        let item = entry_props
                            .iter()
                            .find(|(name, _)| *name == i.to_string())
                            .map(|(_, v)| v.clone())
                            .unwrap_or(Value::Undefined);
                        items.push(self.json_of(&item).unwrap_or(serde_json::Value::Null));
                    }
                    Some(serde_json::Value::Array(items))
                } else {
                    let mut map = serde_json::Map::new();
                    for (name, prop) in entry_props {
                        if let Some(json) = self.json_of(&prop) {
                            map.insert(name, json);
                        }
                    }
                    Some(serde_json::Value::Object(map))
                }
            }
        }
    }
}

impl Host for MockHost {
    fn global(&self) -> Value {
        Value::Object(self.global_ref)
    }

    fn get(&self, obj: Ref, key: &str) -> Value {
        self.entries.borrow().get(&obj).map(|entry| entry.prop(key)).unwrap_or(Value::Undefined)
    }

    fn set(&self, obj: Ref, key: &str, value: Value) {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get_mut(&obj).expect("set on a live referent");
        entry.set_prop(key, value);
    }

    fn delete(&self, obj: Ref, key: &str) {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get_mut(&obj).expect("delete on a live referent");
        entry.props.retain(|(name, _)| name != key);
    }

    fn index(&self, obj: Ref, i: usize) -> Value {
        self.get(obj, &i.to_string())
    }

    fn set_index(&self, obj: Ref, i: usize, value: Value) {
        {
            let mut entries = self.entries.borrow_mut();
            let entry = entries.get_mut(&obj).expect("set_index on a live referent");
            entry.set_prop(&i.to_string(), value);
            if entry.array {
                let len = entry.prop("length").as_f64().unwrap_or(0.0) as usize;
                if i + 1 > len {
                    entry.set_prop("length", Value::Number((i + 1) as f64));
                }
            }
        }
    }

    fn call(&self, func: Ref, this: Value, args: &[Value]) -> Result<Value> {
        match self.callable(func)? {
            Callable::Bound(bound) => Ok(bound.borrow_mut()(self, this, args)),
            Callable::Native(native) => self.run_native(native, args),
        }
    }

    fn construct(&self, ctor: Ref, args: &[Value]) -> Result<Value> {
        match self.callable(ctor)? {
            Callable::Native(Native::ArrayCtor) => Ok(self.new_array(Vec::new())),
            Callable::Native(Native::ObjectCtor) => Ok(self.new_object()),
            Callable::Native(Native::ErrorCtor) => self.make_error(args),
            Callable::Native(Native::PromiseCtor) => self.construct_promise(ctor, args),
            _ => Err(BridgeError::Thrown(format!("{ctor} is not a constructor"))),
        }
    }

    fn instance_of(&self, obj: Ref, ctor: Ref) -> bool {
        self.entries
            .borrow()
            .get(&obj)
            .map(|entry| entry.ctor_tag == Some(ctor))
            .unwrap_or(false)
    }

    fn bind(&self, func: BoundFn) -> Value {
        let bound = self.alloc(Entry {
            callable: Some(Callable::Bound(Rc::new(RefCell::new(func)))),
            ..Entry::object()
        });
        Value::Function(bound)
    }

    fn release(&self, func: Ref) {
        self.entries.borrow_mut().remove(&func);
        self.released.borrow_mut().push(func);
    }

    fn scheduler(&self) -> Scheduler {
        self.queue.handle()
    }
}
