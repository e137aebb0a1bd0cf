//! Typed accessor over a dynamic object.

use crate::convert::encode;
use crate::errors::{BridgeError, Result};
use crate::host::{capability, Host};
use crate::typed::TypedValue;
use crate::value::{Kind, Ref, Value};

/// A statically typed capability over a dynamic value already confirmed to
/// be of object kind. Everything else in the crate builds on this.
#[derive(Clone, Copy)]
pub struct Object<'h> {
    host: &'h dyn Host,
    referent: Ref,
}

impl<'h> Object<'h> {
    /// Wraps `value`, failing with a [`BridgeError::TypeMismatch`] if it is
    /// not of object kind.
    pub fn new(host: &'h dyn Host, value: Value) -> Result<Self> {
        match value {
            Value::Object(referent) => Ok(Self { host, referent }),
            other => Err(BridgeError::TypeMismatch {
                expected: Kind::Object,
                actual: other.kind(),
            }),
        }
    }

    /// The underlying dynamic handle.
    pub fn value(&self) -> Value {
        Value::Object(self.referent)
    }

    /// Walks nested property names. Every intermediate step must be of
    /// object kind; the final value may be of any kind.
    pub fn get(&self, path: &[&str]) -> Result<Value> {
        let mut current = self.value();
        for name in path {
            let obj = match current {
                Value::Object(obj) => obj,
                other => {
                    return Err(BridgeError::TypeMismatch {
                        expected: Kind::Object,
                        actual: other.kind(),
                    })
                }
            };
            current = self.host.get(obj, name);
        }
        Ok(current)
    }

    /// [`Object::get`] followed by a kind assertion on the final value.
    pub fn expect(&self, expected: Kind, path: &[&str]) -> Result<Value> {
        let value = self.get(path)?;
        if value.kind() != expected {
            return Err(BridgeError::TypeMismatch { expected, actual: value.kind() });
        }
        Ok(value)
    }

    /// Encodes `value` and stores it under property `name`.
    pub fn set(&self, name: &str, value: &TypedValue) -> Result<()> {
        let encoded = encode(self.host, value)?;
        self.host.set(self.referent, name, encoded);
        Ok(())
    }

    /// Encodes `value` and stores it at index `i`.
    pub fn set_index(&self, i: usize, value: &TypedValue) -> Result<()> {
        let encoded = encode(self.host, value)?;
        self.host.set_index(self.referent, i, encoded);
        Ok(())
    }

    /// Reads the value at index `i`.
    pub fn index(&self, i: usize) -> Value {
        self.host.index(self.referent, i)
    }

    /// Removes property `name`.
    pub fn delete(&self, name: &str) {
        self.host.delete(self.referent, name);
    }

    /// The object's `length` property.
    pub fn length(&self) -> Result<usize> {
        let length = self.expect(Kind::Number, &["length"])?;
        match length {
            Value::Number(n) => Ok(n as usize),
            _ => unreachable!("expect(Number) only returns numbers"),
        }
    }

    /// Identity equality against another handle, the host's `===`.
    pub fn equal(&self, other: &Value) -> bool {
        self.value().equal(other)
    }

    /// The host's `instanceof` operator. Returns false — not an error —
    /// when `ctor` is not of function kind.
    pub fn instance_of(&self, ctor: &Value) -> bool {
        match ctor {
            Value::Function(ctor) => self.host.instance_of(self.referent, *ctor),
            _ => false,
        }
    }

    /// The object rendered as a JSON string through the host's own
    /// stringify capability, for debugging.
    ///
    /// Panics if the capability is absent, throws, or returns a non-string;
    /// a debug surface that lies silently is worse than one that stops.
    pub fn debug_json(&self) -> String {
        let stringify = capability(self.host, &["JSON", "stringify"]);
        let rendered = match self.host.call(stringify, Value::Undefined, &[self.value()]) {
            Ok(rendered) => rendered,
            Err(err) => panic!("JSON.stringify threw: {err}"),
        };
        match rendered {
            Value::String(s) => s.to_string(),
            other => panic!("JSON.stringify returned a {}", other.kind()),
        }
    }
}

impl std::fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object").field("referent", &self.referent).finish()
    }
}
