//! Dynamic value handles.
//!
//! A [`Value`] is an opaque handle into the host's value space. Primitives
//! are carried inline (they are immutable in every dynamic runtime this
//! bridge targets); objects, functions and symbols are reference kinds whose
//! referent is owned by the host and addressed by a [`Ref`]. Handles are
//! cheap to clone and `Send`, so async outcomes can cross threads; only the
//! host may mutate a referent.

pub mod object;

pub use object::Object;

use std::fmt;
use std::sync::Arc;

/// Identifier of a host-owned referent.
pub type Ref = u64;

/// The kind tag of a dynamic value. Immutable for a handle's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Undefined,
    Null,
    Bool,
    Number,
    String,
    Symbol,
    Object,
    Function,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Object => "object",
            Self::Function => "function",
        };
        f.write_str(name)
    }
}

/// A dynamic value handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Symbol(Ref),
    Object(Ref),
    Function(Ref),
}

impl Value {
    /// The kind tag of this handle.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Undefined => Kind::Undefined,
            Self::Null => Kind::Null,
            Self::Bool(_) => Kind::Bool,
            Self::Number(_) => Kind::Number,
            Self::String(_) => Kind::String,
            Self::Symbol(_) => Kind::Symbol,
            Self::Object(_) => Kind::Object,
            Self::Function(_) => Kind::Function,
        }
    }

    /// Builds a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Self::String(Arc::from(s.as_ref()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True when the handle is `undefined` or `null`.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The referent id of an object, function or symbol handle.
    pub fn as_ref_id(&self) -> Option<Ref> {
        match self {
            Self::Symbol(r) | Self::Object(r) | Self::Function(r) => Some(*r),
            _ => None,
        }
    }

    /// Identity equality, equivalent to the host's `===` operator:
    /// primitives compare by value (`NaN` is unequal to itself), reference
    /// kinds compare by referent.
    pub fn equal(&self, other: &Self) -> bool {
        self == other
    }
}
