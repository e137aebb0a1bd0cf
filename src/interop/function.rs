//! Exposing typed functions as dynamic callables.
//!
//! Every invocation from the host produces a throwable envelope — an object
//! whose `result` or `error` slot is populated, never both. A typed function
//! can never surface a native host fault from an argument mismatch or an
//! internal error; the host layer decides how an `error` envelope becomes
//! its own failure signaling.

use crate::convert::{decode, encode};
use crate::errors::{BridgeError, Result};
use crate::host::{self, Host};
use crate::typed::{FuncDesc, FuncValue, TypeDesc, TypedFn, TypedValue};
use crate::value::Value;

use smallvec::SmallVec;

/// Property holding a successful call's packed return value.
const RESULT_SLOT: &str = "result";
/// Property holding a failed call's host Error object.
const ERROR_SLOT: &str = "error";

/// Wraps a typed function as a host callable returning throwable envelopes.
pub fn bind_function(host: &dyn Host, func: FuncValue) -> Value {
    let FuncValue { desc, call } = func;
    host.bind(Box::new(move |host, this, args| {
        let outcome = invoke(host, &desc, &call, &this, args);
        envelope(host, outcome)
    }))
}

/// Conforms the dynamic arguments to the signature, invokes the typed
/// function and packs its return values.
fn invoke(
    host: &dyn Host,
    desc: &FuncDesc,
    call: &TypedFn,
    this: &Value,
    args: &[Value],
) -> Result<Value> {
    let mut incoming: SmallVec<[Value; 8]> = SmallVec::with_capacity(args.len() + 1);
    // The caller's invocation context is injected only when the signature
    // asks for it by declaring a leading dynamic parameter.
    if matches!(desc.params.first(), Some(TypeDesc::Dynamic)) {
        incoming.push(this.clone());
    }
    incoming.extend(args.iter().cloned());

    let conforms = if desc.variadic {
        incoming.len() + 1 >= desc.arity()
    } else {
        incoming.len() == desc.arity()
    };
    if !conforms {
        tracing::debug!(
            expected = desc.arity(),
            actual = incoming.len(),
            variadic = desc.variadic,
            "argument count mismatch"
        );
        return Err(BridgeError::InvalidArgument);
    }

    let mut typed_args = Vec::with_capacity(incoming.len());
    for (i, arg) in incoming.iter().enumerate() {
        let param = desc.param_at(i).ok_or(BridgeError::InvalidArgument)?;
        typed_args.push(decode(host, arg, param)?);
    }

    let results = call(host, &typed_args)?;
    pack(host, &results)
}

/// Packs typed return values for the envelope's result slot: none becomes
/// `undefined`, one becomes its encoding, several become an array.
fn pack(host: &dyn Host, results: &[TypedValue]) -> Result<Value> {
    match results {
        [] => Ok(Value::Undefined),
        [single] => encode(host, single),
        many => encode(host, &TypedValue::Seq(many.to_vec())),
    }
}

/// Builds the throwable envelope. Exactly one slot is populated: `result`
/// on success (possibly with `undefined`), `error` on failure with a host
/// Error carrying the message text.
fn envelope(host: &dyn Host, outcome: Result<Value>) -> Value {
    let envelope = match host::new_object(host) {
        Ok(envelope) => envelope,
        Err(err) => panic!("cannot allocate call envelope: {err}"),
    };
    let obj = match envelope {
        Value::Object(obj) => obj,
        ref other => panic!("Object constructor returned a {}", other.kind()),
    };
    match outcome {
        Ok(result) => host.set(obj, RESULT_SLOT, result),
        Err(err) => {
            tracing::debug!(%err, "typed call failed; returning error envelope");
            let error = host::new_error(host, &err);
            host.set(obj, ERROR_SLOT, error);
        }
    }
    envelope
}
