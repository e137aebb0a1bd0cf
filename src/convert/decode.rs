//! Dynamic → typed conversion.
//!
//! Decoding is a partial function: it either produces a fully validated
//! typed value or fails with an error naming the exact mismatch; callers
//! never observe partially decoded state.

use crate::errors::{BridgeError, Result};
use crate::host::{capability, Host};
use crate::typed::{
    FloatWidth, FuncDesc, FuncValue, IntWidth, KeyKind, MapKey, StructValue, TypeDesc, TypedValue,
};
use crate::value::{Kind, Object, Ref, Value};

use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Decodes a dynamic value into the shape described by `ty`.
///
/// Dispatch order matters: absence first,
/// then the custom-decode hook, then optional auto-initialization (one
/// layer per descriptor, so allocation depth is bounded by the static
/// nesting), then the open-interface and raw-passthrough escape hatches,
/// and only then kind-directed conversion.
pub fn decode(host: &dyn Host, value: &Value, ty: &TypeDesc) -> Result<TypedValue> {
    tracing::trace!(kind = %value.kind(), target = %ty.name(), "decode");

    if value.is_nothing() {
        return decode_nothing(value, ty);
    }

    if let TypeDesc::Custom(custom) = ty {
        let mut out = (custom.make)();
        out.decode_from(host, value)?;
        return Ok(TypedValue::Custom(out));
    }

    if let TypeDesc::Optional(inner) = ty {
        let pointee = decode(host, value, inner)?;
        return Ok(TypedValue::Optional(Some(Box::new(pointee))));
    }

    if matches!(ty, TypeDesc::Any) {
        return decode_any(host, value);
    }

    if matches!(ty, TypeDesc::Dynamic) {
        return Ok(TypedValue::Dynamic(value.clone()));
    }

    match value.kind() {
        Kind::Bool => decode_bool(value, ty),
        Kind::Number => decode_number(value, ty),
        Kind::String => decode_string(value, ty),
        // Symbols have no native representation; they only pass through
        // opaquely via Any or Dynamic targets.
        Kind::Symbol => Err(BridgeError::invalid_type(Kind::Symbol, ty.name())),
        Kind::Object => {
            if is_array(host, value) {
                decode_array(host, value, ty)
            } else {
                decode_object(host, value, ty)
            }
        }
        Kind::Function => decode_function(value, ty),
        Kind::Undefined | Kind::Null => unreachable!("absence handled above"),
    }
}

/// `undefined` and `null` clear an optional target; every other target
/// refuses them.
fn decode_nothing(value: &Value, ty: &TypeDesc) -> Result<TypedValue> {
    match ty {
        TypeDesc::Optional(_) => Ok(TypedValue::Optional(None)),
        other => Err(BridgeError::invalid_type(value.kind(), other.name())),
    }
}

fn decode_bool(value: &Value, ty: &TypeDesc) -> Result<TypedValue> {
    match (value, ty) {
        (Value::Bool(b), TypeDesc::Bool) => Ok(TypedValue::Bool(*b)),
        _ => Err(BridgeError::invalid_type(Kind::Bool, ty.name())),
    }
}

/// Numbers decode into any integer or float width, truncating and wrapping
/// as needed. There is deliberately no range or precision check; the tests
/// pin this behavior.
fn decode_number(value: &Value, ty: &TypeDesc) -> Result<TypedValue> {
    let n = match value.as_f64() {
        Some(n) => n,
        None => return Err(BridgeError::invalid_type(value.kind(), ty.name())),
    };
    match ty {
        TypeDesc::Int(width) => Ok(TypedValue::Int(narrow_int(n as i64, *width))),
        TypeDesc::Uint(width) => Ok(TypedValue::Uint(narrow_uint(n as u64, *width))),
        TypeDesc::Float(FloatWidth::F32) => Ok(TypedValue::Float(n as f32 as f64)),
        TypeDesc::Float(FloatWidth::F64) => Ok(TypedValue::Float(n)),
        other => Err(BridgeError::invalid_type(Kind::Number, other.name())),
    }
}

fn narrow_int(n: i64, width: IntWidth) -> i64 {
    match width {
        IntWidth::W8 => n as i8 as i64,
        IntWidth::W16 => n as i16 as i64,
        IntWidth::W32 => n as i32 as i64,
        IntWidth::W64 => n,
    }
}

fn narrow_uint(n: u64, width: IntWidth) -> u64 {
    match width {
        IntWidth::W8 => n as u8 as u64,
        IntWidth::W16 => n as u16 as u64,
        IntWidth::W32 => n as u32 as u64,
        IntWidth::W64 => n,
    }
}

fn decode_string(value: &Value, ty: &TypeDesc) -> Result<TypedValue> {
    match (value, ty) {
        (Value::String(s), TypeDesc::Str) => Ok(TypedValue::Str(s.to_string())),
        _ => Err(BridgeError::invalid_type(Kind::String, ty.name())),
    }
}

fn decode_array(host: &dyn Host, value: &Value, ty: &TypeDesc) -> Result<TypedValue> {
    let obj = Object::new(host, value.clone())?;
    let len = obj.length()?;

    let elem_ty = match ty {
        TypeDesc::Array(elem, expected) => {
            if len != *expected {
                return Err(BridgeError::InvalidArrayLength { expected: *expected, actual: len });
            }
            elem
        }
        TypeDesc::Seq(elem) => elem,
        other => return Err(BridgeError::invalid_type(Kind::Object, other.name())),
    };

    let mut elems = Vec::with_capacity(len);
    for i in 0..len {
        let elem =
            decode(host, &obj.index(i), elem_ty).map_err(|e| BridgeError::at_index(i, e))?;
        elems.push(elem);
    }

    match ty {
        TypeDesc::Array(_, _) => Ok(TypedValue::Array(elems)),
        _ => Ok(TypedValue::Seq(elems)),
    }
}

fn decode_object(host: &dyn Host, value: &Value, ty: &TypeDesc) -> Result<TypedValue> {
    match ty {
        TypeDesc::Struct(desc) => {
            let obj = Object::new(host, value.clone())?;
            let mut fields = Vec::with_capacity(desc.fields.len());
            for field in &desc.fields {
                if field.exclude {
                    fields.push(TypedValue::zero(&field.ty));
                    continue;
                }
                let property = obj.get(&[field.property()])?;
                let decoded = decode(host, &property, &field.ty).map_err(|e| {
                    let identity = match &field.rename {
                        Some(rename) => format!("{} (property {})", field.name, rename),
                        None => field.name.clone(),
                    };
                    BridgeError::in_field(identity, e)
                })?;
                fields.push(decoded);
            }
            Ok(TypedValue::Struct(StructValue { desc: Arc::clone(desc), fields }))
        }
        TypeDesc::Map(KeyKind::Str | KeyKind::Any, elem_ty) => {
            let mut entries = HashMap::new();
            for key in own_keys(host, value)? {
                let property = host_get(host, value, &key)?;
                let decoded = decode(host, &property, elem_ty)
                    .map_err(|e| BridgeError::in_field(key.clone(), e))?;
                entries.insert(MapKey::Str(key), decoded);
            }
            Ok(TypedValue::Map(entries))
        }
        TypeDesc::Map(other, _) => Err(BridgeError::InvalidDecodeTarget {
            target: format!("map keyed by {:?} values", other),
        }),
        other => Err(BridgeError::invalid_type(Kind::Object, other.name())),
    }
}

fn decode_function(value: &Value, ty: &TypeDesc) -> Result<TypedValue> {
    let desc = match ty {
        TypeDesc::Func(desc) => desc,
        other => return Err(BridgeError::invalid_type(Kind::Function, other.name())),
    };
    // Misconfigured signatures are a decode-time error, not a call-time one.
    if desc.results.len() > 1 {
        return Err(BridgeError::MultipleReturnValue);
    }
    let func = match value {
        Value::Function(func) => *func,
        _ => return Err(BridgeError::invalid_type(value.kind(), ty.name())),
    };
    Ok(TypedValue::Func(dynamic_callable(func, Arc::clone(desc))))
}

/// Wraps a dynamic function as a typed callable: arguments are encoded,
/// the dynamic function is invoked, and the single return value is decoded
/// against the signature.
///
/// When the signature has no error slot, a return-value decode failure is
/// fatal by policy — there is no channel to report it — so it panics.
fn dynamic_callable(func: Ref, desc: Arc<FuncDesc>) -> FuncValue {
    let call_desc = Arc::clone(&desc);
    FuncValue {
        desc,
        call: Arc::new(move |host, args| {
            let mut encoded: SmallVec<[Value; 8]> = SmallVec::with_capacity(args.len());
            for arg in args {
                encoded.push(crate::convert::encode(host, arg)?);
            }
            let returned = host.call(func, Value::Undefined, &encoded)?;
            let ret_ty = match call_desc.results.first() {
                Some(ret_ty) => ret_ty,
                None => return Ok(Vec::new()),
            };
            match decode(host, &returned, ret_ty) {
                Ok(decoded) => Ok(vec![decoded]),
                Err(err) if call_desc.throws => Err(err),
                Err(err) => panic!("error decoding dynamic return value: {err}"),
            }
        }),
    }
}

/// Open-interface decode: the simplest faithful native shape of whatever
/// dynamic value is present. Nested absence becomes [`TypedValue::Nil`].
fn decode_any(host: &dyn Host, value: &Value) -> Result<TypedValue> {
    match value {
        Value::Undefined | Value::Null => Ok(TypedValue::Nil),
        Value::Bool(b) => Ok(TypedValue::Bool(*b)),
        Value::Number(n) => Ok(TypedValue::Float(*n)),
        Value::String(s) => Ok(TypedValue::Str(s.to_string())),
        // No meaningful native shape; keep the opaque handle.
        Value::Symbol(_) => Ok(TypedValue::Dynamic(value.clone())),
        Value::Object(_) => {
            if is_array(host, value) {
                let obj = Object::new(host, value.clone())?;
                let len = obj.length()?;
                let mut elems = Vec::with_capacity(len);
                for i in 0..len {
                    elems.push(
                        decode_any(host, &obj.index(i)).map_err(|e| BridgeError::at_index(i, e))?,
                    );
                }
                Ok(TypedValue::Seq(elems))
            } else {
                let mut entries = HashMap::new();
                for key in own_keys(host, value)? {
                    let property = host_get(host, value, &key)?;
                    let decoded = decode_any(host, &property)
                        .map_err(|e| BridgeError::in_field(key.clone(), e))?;
                    entries.insert(MapKey::Str(key), decoded);
                }
                Ok(TypedValue::Map(entries))
            }
        }
        Value::Function(func) => {
            let desc = FuncDesc::new(vec![TypeDesc::seq(TypeDesc::Any)], vec![TypeDesc::Any])
                .variadic()
                .throws();
            Ok(TypedValue::Func(dynamic_callable(*func, Arc::new(desc))))
        }
    }
}

/// The host's array-test predicate.
fn is_array(host: &dyn Host, value: &Value) -> bool {
    let test = capability(host, &["Array", "isArray"]);
    match host.call(test, Value::Undefined, &[value.clone()]) {
        Ok(Value::Bool(is_array)) => is_array,
        Ok(other) => panic!("Array.isArray returned a {}", other.kind()),
        Err(err) => panic!("Array.isArray threw: {err}"),
    }
}

/// Enumerates the object's own property names through the host's
/// enumeration capability, in host enumeration order.
fn own_keys(host: &dyn Host, value: &Value) -> Result<Vec<String>> {
    let keys_fn = capability(host, &["Object", "keys"]);
    let keys = match host.call(keys_fn, Value::Undefined, &[value.clone()]) {
        Ok(keys) => keys,
        Err(err) => panic!("Object.keys threw: {err}"),
    };
    let obj = Object::new(host, keys)
        .unwrap_or_else(|err| panic!("Object.keys returned a non-array: {err}"));
    let len = obj
        .length()
        .unwrap_or_else(|err| panic!("Object.keys returned a non-array: {err}"));
    let mut names = Vec::with_capacity(len);
    for i in 0..len {
        match obj.index(i) {
            Value::String(name) => names.push(name.to_string()),
            other => panic!("Object.keys returned a non-string key of kind {}", other.kind()),
        }
    }
    Ok(names)
}

fn host_get(host: &dyn Host, value: &Value, key: &str) -> Result<Value> {
    let obj = Object::new(host, value.clone())?;
    obj.get(&[key])
}
