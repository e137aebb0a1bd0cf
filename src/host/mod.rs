//! The host capability surface.
//!
//! The dynamic runtime is consumed through the [`Host`] trait: an opaque
//! capability provider threaded explicitly through every public entry point
//! of this crate. Standard capabilities (constructors, predicates,
//! stringify) are looked up by path from the host's global namespace at
//! first use; a missing capability is fatal misconfiguration, not a
//! recoverable error.

use crate::errors::{BridgeError, Result};
use crate::value::{Object, Ref, Value};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A Rust closure bound into the host as a callable. The host passes itself
/// back in on every invocation, so bound closures never capture a host
/// reference.
pub type BoundFn = Box<dyn FnMut(&dyn Host, Value, &[Value]) -> Value>;

/// A unit of work handed back to the host's single logical execution
/// stream. Produced on worker threads, run by the host.
pub type HostTask = Box<dyn FnOnce(&dyn Host) + Send>;

/// The opaque dynamic runtime.
///
/// All mutation of dynamic values goes through these methods, and they must
/// only be called from the host's own logical thread. Worker threads
/// resynchronize through [`Host::scheduler`].
pub trait Host {
    /// The global namespace object.
    fn global(&self) -> Value;

    /// Reads property `key` of the referenced object.
    fn get(&self, obj: Ref, key: &str) -> Value;

    /// Writes property `key` of the referenced object.
    fn set(&self, obj: Ref, key: &str, value: Value);

    /// Removes property `key` from the referenced object.
    fn delete(&self, obj: Ref, key: &str);

    /// Reads index `i` of the referenced object.
    fn index(&self, obj: Ref, i: usize) -> Value;

    /// Writes index `i` of the referenced object.
    fn set_index(&self, obj: Ref, i: usize, value: Value);

    /// Calls the referenced function. A host-side throw is surfaced as
    /// [`BridgeError::Thrown`].
    fn call(&self, func: Ref, this: Value, args: &[Value]) -> Result<Value>;

    /// Calls the referenced constructor with `new` semantics.
    fn construct(&self, ctor: Ref, args: &[Value]) -> Result<Value>;

    /// The host's `instanceof` operator.
    fn instance_of(&self, obj: Ref, ctor: Ref) -> bool;

    /// Wraps a Rust closure as a host function value.
    fn bind(&self, func: BoundFn) -> Value;

    /// Releases a function previously produced by [`Host::bind`].
    fn release(&self, func: Ref);

    /// A handle for posting work back onto the host's execution stream
    /// from other threads.
    fn scheduler(&self) -> Scheduler;
}

/// A cloneable, thread-safe handle that posts [`HostTask`]s back to the
/// host. How and when the host drains them is the host's business; the only
/// contract is that tasks run on the host's single logical stream.
#[derive(Clone)]
pub struct Scheduler {
    post: Arc<dyn Fn(HostTask) + Send + Sync>,
}

impl Scheduler {
    pub fn new(post: Arc<dyn Fn(HostTask) + Send + Sync>) -> Self {
        Self { post }
    }

    /// Hands `task` back to the host.
    pub fn post(&self, task: HostTask) {
        (self.post)(task);
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Scheduler")
    }
}

/// A queue-backed scheduler for hosts that pump tasks between turns of
/// their own event loop.
#[derive(Default)]
pub struct QueueScheduler {
    tasks: Arc<Mutex<VecDeque<HostTask>>>,
}

impl QueueScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A posting handle for worker threads.
    pub fn handle(&self) -> Scheduler {
        let tasks = Arc::clone(&self.tasks);
        Scheduler::new(Arc::new(move |task| {
            tasks.lock().push_back(task);
        }))
    }

    /// True when tasks are waiting.
    pub fn is_idle(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Runs every queued task on the calling (host) thread, including tasks
    /// posted while draining. Returns the number of tasks run.
    pub fn drain(&self, host: &dyn Host) -> usize {
        let mut ran = 0;
        loop {
            let task = self.tasks.lock().pop_front();
            match task {
                Some(task) => {
                    task(host);
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl std::fmt::Debug for QueueScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueScheduler")
            .field("pending", &self.tasks.lock().len())
            .finish()
    }
}

/// The global namespace as a typed accessor. Panics if the host's global
/// value is not an object, which no downstream behavior survives.
pub fn global(host: &dyn Host) -> Object<'_> {
    match Object::new(host, host.global()) {
        Ok(obj) => obj,
        Err(err) => panic!("host global is not an object: {err}"),
    }
}

/// Looks up a required function capability under the global namespace,
/// e.g. `["Promise", "all"]`, returning its referent. Unlike the strict
/// accessor walk, intermediate steps may be of function kind — combinators
/// live as properties of their constructor. Absence is fatal
/// misconfiguration.
pub fn capability(host: &dyn Host, path: &[&str]) -> Ref {
    let mut current = host.global();
    for name in path {
        let obj = match current.as_ref_id() {
            Some(obj) => obj,
            None => {
                tracing::warn!(path = %path.join("."), "required host capability missing");
                panic!(
                    "host capability {} not found: hit a {} while descending",
                    path.join("."),
                    current.kind()
                );
            }
        };
        current = host.get(obj, name);
    }
    match current {
        Value::Function(func) => func,
        other => {
            tracing::warn!(path = %path.join("."), "required host capability missing");
            panic!("host capability {} is a {}, not a function", path.join("."), other.kind());
        }
    }
}

/// Constructs an empty plain object through the host's Object constructor.
pub fn new_object(host: &dyn Host) -> Result<Value> {
    let ctor = capability(host, &["Object"]);
    host.construct(ctor, &[])
}

/// Constructs an empty array through the host's Array constructor.
pub fn new_array(host: &dyn Host) -> Result<Value> {
    let ctor = capability(host, &["Array"]);
    host.construct(ctor, &[])
}

/// Builds a host Error object carrying the typed error's message. Only the
/// message text crosses the boundary.
pub fn new_error(host: &dyn Host, err: &BridgeError) -> Value {
    let ctor = capability(host, &["Error"]);
    match host.construct(ctor, &[Value::string(err.to_string())]) {
        Ok(value) => value,
        Err(thrown) => panic!("Error constructor threw: {thrown}"),
    }
}
