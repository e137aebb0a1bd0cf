//! Typed → dynamic conversion.

use crate::errors::{BridgeError, Result};
use crate::host::{self, Host};
use crate::interop::function::bind_function;
use crate::typed::{MapKey, StructValue, TypedValue};
use crate::value::{Ref, Value};

/// Converts a typed value into its dynamic equivalent.
///
/// Encoding is total for the supported typed set. The two deterministic
/// failure paths are mapping keys with no property representation and
/// custom values without a dynamic form; nothing is ever silently dropped.
///
/// Complex numbers become `{real, imag}` objects. An empty optional becomes
/// `undefined`, while [`TypedValue::Nil`] becomes `null` — distinct on
/// purpose, matching the host's two flavors of absence.
pub fn encode(host: &dyn Host, value: &TypedValue) -> Result<Value> {
    tracing::trace!(kind = %value.type_name(), "encode");
    match value {
        TypedValue::Nil => Ok(Value::Null),
        TypedValue::Dynamic(v) => Ok(v.clone()),
        TypedValue::Custom(custom) => custom.to_dynamic(host),
        TypedValue::Bool(b) => Ok(Value::Bool(*b)),
        TypedValue::Int(n) => Ok(Value::Number(*n as f64)),
        TypedValue::Uint(n) => Ok(Value::Number(*n as f64)),
        TypedValue::Float(n) => Ok(Value::Number(*n)),
        TypedValue::Str(s) => Ok(Value::string(s)),
        TypedValue::Complex { re, im } => encode_complex(host, *re, *im),
        TypedValue::Optional(None) => Ok(Value::Undefined),
        TypedValue::Optional(Some(inner)) => encode(host, inner),
        TypedValue::Array(elems) | TypedValue::Seq(elems) => encode_array(host, elems),
        TypedValue::Func(func) => Ok(bind_function(host, func.clone())),
        TypedValue::Map(entries) => encode_map(host, entries),
        TypedValue::Struct(value) => encode_struct(host, value),
    }
}

fn encode_complex(host: &dyn Host, re: f64, im: f64) -> Result<Value> {
    let (value, obj) = plain_object(host)?;
    host.set(obj, "real", Value::Number(re));
    host.set(obj, "imag", Value::Number(im));
    Ok(value)
}

fn encode_array(host: &dyn Host, elems: &[TypedValue]) -> Result<Value> {
    let array = host::new_array(host)?;
    let arr = referent(&array)?;
    for (i, elem) in elems.iter().enumerate() {
        let encoded = encode(host, elem).map_err(|e| BridgeError::at_index(i, e))?;
        host.set_index(arr, i, encoded);
    }
    Ok(array)
}

fn encode_map(
    host: &dyn Host,
    entries: &std::collections::HashMap<MapKey, TypedValue>,
) -> Result<Value> {
    let (value, obj) = plain_object(host)?;
    for (key, elem) in entries {
        let encoded = encode(host, elem)?;
        match key {
            MapKey::Str(name) => host.set(obj, name, encoded),
            // Integer keys land on the same property the host would use
            // for an indexed write.
            MapKey::Int(i) => host.set(obj, &i.to_string(), encoded),
            other => {
                return Err(BridgeError::UnsupportedKey { key: other.kind_name().into() })
            }
        }
    }
    Ok(value)
}

fn encode_struct(host: &dyn Host, value: &StructValue) -> Result<Value> {
    let (encoded, obj) = plain_object(host)?;
    for (field, field_value) in value.desc.fields.iter().zip(&value.fields) {
        if field.exclude {
            continue;
        }
        let encoded_field =
            encode(host, field_value).map_err(|e| BridgeError::in_field(&field.name, e))?;
        host.set(obj, field.property(), encoded_field);
    }
    Ok(encoded)
}

fn plain_object(host: &dyn Host) -> Result<(Value, Ref)> {
    let value = host::new_object(host)?;
    let obj = referent(&value)?;
    Ok((value, obj))
}

fn referent(value: &Value) -> Result<Ref> {
    value.as_ref_id().ok_or_else(|| BridgeError::TypeMismatch {
        expected: crate::value::Kind::Object,
        actual: value.kind(),
    })
}
