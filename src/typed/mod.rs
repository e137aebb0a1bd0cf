//! The static side of the bridge: type descriptors and typed values.
//!
//! Shape information that a reflection-based runtime would discover on the
//! fly lives here in a closed descriptor sum type ([`TypeDesc`]) with a
//! matching value representation ([`TypedValue`]). The encoder and decoder
//! are visitors over these variants, with the open-interface ("decode into
//! anything") path an explicit variant rather than a fallback.

use crate::errors::{BridgeError, Result};
use crate::host::Host;
use crate::value::Value;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Width of an integer descriptor. Decoding narrows to the width with no
/// range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Key kinds a mapping descriptor may declare. String and open-interface
/// keyed mappings are decodable destinations (host enumeration always
/// yields string keys); only string and integer keys have a host
/// representation on encode, and boolean keys are representable in the
/// typed model but always fail encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Str,
    Int,
    Bool,
    /// Open-interface keys: decoded entries still carry the enumerated
    /// string keys.
    Any,
}

/// A concrete mapping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl MapKey {
    /// The key's kind name, used in encoding failure messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Bool(_) => "boolean",
        }
    }
}

/// One named field of a record descriptor.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    /// Declared field name.
    pub name: String,
    /// Override name used on both encode and decode.
    pub rename: Option<String>,
    /// Excluded fields are never published and never decoded.
    pub exclude: bool,
    pub ty: TypeDesc,
}

impl FieldDesc {
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self { name: name.into(), rename: None, exclude: false, ty }
    }

    pub fn renamed(mut self, rename: impl Into<String>) -> Self {
        self.rename = Some(rename.into());
        self
    }

    pub fn excluded(mut self) -> Self {
        self.exclude = true;
        self
    }

    /// The property name this field maps to on the dynamic side.
    pub fn property(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }
}

/// A record shape: ordered named fields.
#[derive(Debug, Clone)]
pub struct StructDesc {
    pub name: String,
    pub fields: Vec<FieldDesc>,
}

impl StructDesc {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDesc>) -> Arc<Self> {
        Arc::new(Self { name: name.into(), fields })
    }
}

/// A function signature: ordered parameter descriptors, ordered non-error
/// result descriptors, and a flag for the conventional trailing error.
#[derive(Debug, Clone)]
pub struct FuncDesc {
    pub params: Vec<TypeDesc>,
    /// A variadic signature's last parameter must be a [`TypeDesc::Seq`];
    /// surplus dynamic arguments are decoded against its element type.
    pub variadic: bool,
    pub results: Vec<TypeDesc>,
    /// Whether the signature carries a trailing error return.
    pub throws: bool,
}

impl FuncDesc {
    pub fn new(params: Vec<TypeDesc>, results: Vec<TypeDesc>) -> Self {
        Self { params, variadic: false, results, throws: false }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn throws(mut self) -> Self {
        self.throws = true;
        self
    }

    /// Declared arity, counting the variadic tail as one parameter.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// The descriptor dynamic argument `i` must decode into.
    pub fn param_at(&self, i: usize) -> Option<&TypeDesc> {
        if self.variadic && i + 1 >= self.params.len() {
            match self.params.last() {
                Some(TypeDesc::Seq(elem)) => Some(elem),
                other => other,
            }
        } else {
            self.params.get(i)
        }
    }
}

/// A destination type with a custom decode capability. Checked once before
/// generic dispatch; `make` allocates a fresh value for the hook to fill.
#[derive(Clone)]
pub struct CustomDesc {
    pub name: &'static str,
    pub make: Arc<dyn Fn() -> Box<dyn HostValue> + Send + Sync>,
}

impl fmt::Debug for CustomDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomDesc").field("name", &self.name).finish()
    }
}

/// The shape the decoder must produce or the encoder converts from.
#[derive(Debug, Clone)]
pub enum TypeDesc {
    Bool,
    Int(IntWidth),
    Uint(IntWidth),
    Float(FloatWidth),
    Str,
    /// Complex numbers encode as `{real, imag}` objects; they have no
    /// decodable dynamic form.
    Complex,
    /// Fixed-length array: element descriptor and required length.
    Array(Box<TypeDesc>, usize),
    /// Resizable sequence.
    Seq(Box<TypeDesc>),
    /// Mapping with key kind and element descriptor.
    Map(KeyKind, Box<TypeDesc>),
    Struct(Arc<StructDesc>),
    /// Pointer/optional layer around a pointee.
    Optional(Box<TypeDesc>),
    /// Open interface: no declared shape, decoded into the simplest
    /// faithful native representation.
    Any,
    /// Exactly the dynamic value type; stored unconverted.
    Dynamic,
    Func(Arc<FuncDesc>),
    Custom(CustomDesc),
}

impl TypeDesc {
    pub fn seq(elem: TypeDesc) -> Self {
        Self::Seq(Box::new(elem))
    }

    pub fn array(elem: TypeDesc, len: usize) -> Self {
        Self::Array(Box::new(elem), len)
    }

    pub fn map(key: KeyKind, elem: TypeDesc) -> Self {
        Self::Map(key, Box::new(elem))
    }

    pub fn optional(inner: TypeDesc) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn func(desc: FuncDesc) -> Self {
        Self::Func(Arc::new(desc))
    }

    /// Human-readable name for diagnostics.
    pub fn name(&self) -> String {
        match self {
            Self::Bool => "bool".into(),
            Self::Int(w) => format!("int{}", width_bits(*w)),
            Self::Uint(w) => format!("uint{}", width_bits(*w)),
            Self::Float(FloatWidth::F32) => "float32".into(),
            Self::Float(FloatWidth::F64) => "float64".into(),
            Self::Str => "string".into(),
            Self::Complex => "complex".into(),
            Self::Array(elem, len) => format!("[{}]{}", len, elem.name()),
            Self::Seq(elem) => format!("[]{}", elem.name()),
            Self::Map(key, elem) => format!("map[{:?}]{}", key, elem.name()),
            Self::Struct(desc) => desc.name.clone(),
            Self::Optional(inner) => format!("*{}", inner.name()),
            Self::Any => "any".into(),
            Self::Dynamic => "dynamic".into(),
            Self::Func(_) => "func".into(),
            Self::Custom(custom) => custom.name.into(),
        }
    }
}

fn width_bits(w: IntWidth) -> u8 {
    match w {
        IntWidth::W8 => 8,
        IntWidth::W16 => 16,
        IntWidth::W32 => 32,
        IntWidth::W64 => 64,
    }
}

/// A typed value with a custom dynamic representation. The decode hook
/// takes precedence over every generic dispatch rule; the dynamic form is
/// optional — a value without one fails encoding deterministically.
pub trait HostValue: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Custom decode: receives the raw dynamic value and is fully
    /// responsible for populating `self`.
    fn decode_from(&mut self, host: &dyn Host, value: &Value) -> Result<()>;

    /// The value's dynamic form, when it has one.
    fn to_dynamic(&self, _host: &dyn Host) -> Result<Value> {
        Err(BridgeError::Unencodable { type_name: self.type_name().into() })
    }

    fn boxed_clone(&self) -> Box<dyn HostValue>;
}

impl Clone for Box<dyn HostValue> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// The native callable behind a typed function value. The host reference is
/// supplied at call time so the closure stays `Send + Sync`.
pub type TypedFn =
    Arc<dyn Fn(&dyn Host, &[TypedValue]) -> Result<Vec<TypedValue>> + Send + Sync>;

/// A typed function: its signature plus the callable.
#[derive(Clone)]
pub struct FuncValue {
    pub desc: Arc<FuncDesc>,
    pub call: TypedFn,
}

impl FuncValue {
    pub fn new<F>(desc: FuncDesc, call: F) -> Self
    where
        F: Fn(&dyn Host, &[TypedValue]) -> Result<Vec<TypedValue>> + Send + Sync + 'static,
    {
        Self { desc: Arc::new(desc), call: Arc::new(call) }
    }
}

impl fmt::Debug for FuncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncValue").field("desc", &self.desc).finish()
    }
}

/// A record value: its shape plus one value per declared field.
#[derive(Debug, Clone)]
pub struct StructValue {
    pub desc: Arc<StructDesc>,
    pub fields: Vec<TypedValue>,
}

impl StructValue {
    /// Builds a struct value; `fields` must match the descriptor order.
    pub fn new(desc: Arc<StructDesc>, fields: Vec<TypedValue>) -> Self {
        debug_assert_eq!(desc.fields.len(), fields.len());
        Self { desc, fields }
    }

    /// The value of the field named `name`, if declared.
    pub fn field(&self, name: &str) -> Option<&TypedValue> {
        let i = self.desc.fields.iter().position(|f| f.name == name)?;
        self.fields.get(i)
    }
}

/// A value shaped by the typed model.
#[derive(Debug, Clone)]
pub enum TypedValue {
    /// Untyped absence. Encodes as `null`, unlike an empty [`Self::Optional`]
    /// which encodes as `undefined`.
    Nil,
    Bool(bool),
    /// Signed integer of any width, carried widened.
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Complex { re: f64, im: f64 },
    /// Fixed-length array.
    Array(Vec<TypedValue>),
    /// Resizable sequence.
    Seq(Vec<TypedValue>),
    Map(HashMap<MapKey, TypedValue>),
    Struct(StructValue),
    Optional(Option<Box<TypedValue>>),
    /// A dynamic handle passed through untouched.
    Dynamic(Value),
    Func(FuncValue),
    Custom(Box<dyn HostValue>),
}

impl TypedValue {
    /// The zero value of a descriptor; decode targets start here.
    pub fn zero(ty: &TypeDesc) -> Self {
        match ty {
            TypeDesc::Bool => Self::Bool(false),
            TypeDesc::Int(_) => Self::Int(0),
            TypeDesc::Uint(_) => Self::Uint(0),
            TypeDesc::Float(_) => Self::Float(0.0),
            TypeDesc::Str => Self::Str(String::new()),
            TypeDesc::Complex => Self::Complex { re: 0.0, im: 0.0 },
            TypeDesc::Array(elem, len) => {
                Self::Array((0..*len).map(|_| Self::zero(elem)).collect())
            }
            TypeDesc::Seq(_) => Self::Seq(Vec::new()),
            TypeDesc::Map(_, _) => Self::Map(HashMap::new()),
            TypeDesc::Struct(desc) => Self::Struct(StructValue {
                desc: Arc::clone(desc),
                fields: desc.fields.iter().map(|f| Self::zero(&f.ty)).collect(),
            }),
            TypeDesc::Optional(_) => Self::Optional(None),
            TypeDesc::Any => Self::Nil,
            TypeDesc::Dynamic => Self::Dynamic(Value::Undefined),
            TypeDesc::Func(desc) => Self::Func(FuncValue {
                desc: Arc::clone(desc),
                call: Arc::new(|_, _| Err(BridgeError::user("call of zero function value"))),
            }),
            TypeDesc::Custom(custom) => Self::Custom((custom.make)()),
        }
    }

    /// Human-readable name for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Self::Nil => "nil".into(),
            Self::Bool(_) => "bool".into(),
            Self::Int(_) => "int".into(),
            Self::Uint(_) => "uint".into(),
            Self::Float(_) => "float".into(),
            Self::Str(_) => "string".into(),
            Self::Complex { .. } => "complex".into(),
            Self::Array(_) => "array".into(),
            Self::Seq(_) => "sequence".into(),
            Self::Map(_) => "map".into(),
            Self::Struct(s) => s.desc.name.clone(),
            Self::Optional(_) => "optional".into(),
            Self::Dynamic(_) => "dynamic".into(),
            Self::Func(_) => "func".into(),
            Self::Custom(c) => c.type_name().into(),
        }
    }
}

impl PartialEq for TypedValue {
    /// Structural equality for data; functions compare by callable identity
    /// and custom values never compare equal.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Complex { re: ar, im: ai }, Self::Complex { re: br, im: bi }) => {
                ar == br && ai == bi
            }
            (Self::Array(a), Self::Array(b)) | (Self::Seq(a), Self::Seq(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Struct(a), Self::Struct(b)) => {
                a.desc.name == b.desc.name && a.fields == b.fields
            }
            (Self::Optional(a), Self::Optional(b)) => a == b,
            (Self::Dynamic(a), Self::Dynamic(b)) => a == b,
            (Self::Func(a), Self::Func(b)) => Arc::ptr_eq(&a.call, &b.call),
            _ => false,
        }
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for TypedValue {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
