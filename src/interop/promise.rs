//! The async bridge: typed asynchronous work as host Promise objects.
//!
//! The host runtime is single-threaded and cooperative while the unit of
//! work runs on its own native thread. The two never touch: the worker
//! communicates its outcome through a one-shot channel, and the actual
//! resolve/reject host calls happen inside a task handed back to the host's
//! own execution stream through its [`Scheduler`](crate::host::Scheduler).

use crate::convert::encode;
use crate::errors::{BridgeError, Result};
use crate::host::{self, capability, Host};
use crate::typed::TypedValue;
use crate::value::{Object, Ref, Value};

use crossbeam::channel;
use std::cell::Cell;
use std::rc::Rc;
use std::thread;

/// A handle to a host Promise object.
#[derive(Debug, Clone)]
pub struct Promise {
    value: Value,
}

impl Promise {
    /// Wraps an existing dynamic value, checking that it is object-kind.
    pub fn from_value(host: &dyn Host, value: Value) -> Result<Self> {
        Object::new(host, value.clone())?;
        Ok(Self { value })
    }

    /// The underlying dynamic handle.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Starts `work` on its own thread and returns a host Promise that settles
/// with the work's outcome: the encoded value on success, a host Error
/// carrying the error's message on failure.
///
/// There is no cancellation and no timeout: once started, `work` runs to
/// completion even if nothing is listening. The executor binding is
/// consumed exactly once and released after the promise settles.
pub fn new_async<F>(host: &dyn Host, work: F) -> Result<Promise>
where
    F: FnOnce() -> Result<TypedValue> + Send + 'static,
{
    let (tx, rx) = channel::bounded(1);
    thread::spawn(move || {
        let _ = tx.send(work());
    });

    // The executor learns its own referent after binding so the settle
    // task can release it.
    let self_ref = Rc::new(Cell::new(None::<Ref>));
    let shared_ref = Rc::clone(&self_ref);
    let mut outcome_rx = Some(rx);

    let executor = host.bind(Box::new(move |host, _this, args| {
        let (resolve, reject) = match args {
            [Value::Function(resolve), Value::Function(reject), ..] => (*resolve, *reject),
            _ => panic!("host passed invalid arguments to the Promise executor"),
        };
        let rx = match outcome_rx.take() {
            Some(rx) => rx,
            None => panic!("Promise executor invoked twice"),
        };
        let scheduler = host.scheduler();
        let executor_ref = shared_ref.get();

        // Block for the outcome away from the host, then hand the actual
        // settlement back to the host's stream.
        thread::spawn(move || {
            let outcome = rx.recv().unwrap_or_else(|_| {
                Err(BridgeError::user("async work finished without an outcome"))
            });
            scheduler.post(Box::new(move |host| {
                settle(host, resolve, reject, outcome);
                if let Some(executor_ref) = executor_ref {
                    host.release(executor_ref);
                }
            }));
        });
        Value::Undefined
    }));
    self_ref.set(executor.as_ref_id());

    let ctor = capability(host, &["Promise"]);
    let promise = host.construct(ctor, &[executor])?;
    Promise::from_value(host, promise)
}

fn settle(host: &dyn Host, resolve: Ref, reject: Ref, outcome: Result<TypedValue>) {
    match outcome.and_then(|value| encode(host, &value)) {
        Ok(value) => {
            tracing::debug!("async work resolved");
            if let Err(err) = host.call(resolve, Value::Undefined, &[value]) {
                tracing::warn!(%err, "promise resolve callback threw");
            }
        }
        Err(err) => {
            tracing::debug!(%err, "async work rejected");
            let error = host::new_error(host, &err);
            if let Err(err) = host.call(reject, Value::Undefined, &[error]) {
                tracing::warn!(%err, "promise reject callback threw");
            }
        }
    }
}

/// `Promise.all` over the given promises.
pub fn all(host: &dyn Host, promises: &[Promise]) -> Result<Promise> {
    combine(host, "all", promises)
}

/// `Promise.any` over the given promises.
pub fn any(host: &dyn Host, promises: &[Promise]) -> Result<Promise> {
    combine(host, "any", promises)
}

/// `Promise.race` over the given promises.
pub fn race(host: &dyn Host, promises: &[Promise]) -> Result<Promise> {
    combine(host, "race", promises)
}

/// `Promise.allSettled` over the given promises.
pub fn all_settled(host: &dyn Host, promises: &[Promise]) -> Result<Promise> {
    combine(host, "allSettled", promises)
}

/// Delegates to the host's n-ary combinator with a single array argument.
/// A missing combinator capability is fatal misconfiguration.
fn combine(host: &dyn Host, name: &str, promises: &[Promise]) -> Result<Promise> {
    let ctor = capability(host, &["Promise"]);
    let combinator = capability(host, &["Promise", name]);

    let array = host::new_array(host)?;
    let arr = match array {
        Value::Object(arr) => arr,
        ref other => panic!("Array constructor returned a {}", other.kind()),
    };
    for (i, promise) in promises.iter().enumerate() {
        host.set_index(arr, i, promise.value().clone());
    }

    let combined = host.call(combinator, Value::Function(ctor), &[array])?;
    Promise::from_value(host, combined)
}
