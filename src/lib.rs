//! dynbridge — bidirectional marshalling between statically typed values
//! and a dynamically typed host runtime.
//!
//! Typed values described by a closed [`TypeDesc`](typed::TypeDesc) sum
//! type convert to host-owned dynamic [`Value`](value::Value) handles and
//! back; typed functions become host callables reporting outcomes through
//! throwable envelopes; typed asynchronous work becomes host Promises. The
//! host runtime itself is an opaque capability provider behind the
//! [`Host`](host::Host) trait, threaded explicitly through every entry
//! point.

pub mod bridge;
pub mod convert;
pub mod errors;
pub mod host;
pub mod interop;
pub mod typed;
pub mod value;

pub use bridge::Bridge;
pub use convert::{decode, encode};
pub use errors::{BridgeError, Result};
pub use host::{Host, QueueScheduler, Scheduler};
pub use interop::{bind_function, new_async, Promise};
pub use typed::{
    CustomDesc, FieldDesc, FloatWidth, FuncDesc, FuncValue, HostValue, IntWidth, KeyKind, MapKey,
    StructDesc, StructValue, TypeDesc, TypedFn, TypedValue,
};
pub use value::{Kind, Object, Ref, Value};
