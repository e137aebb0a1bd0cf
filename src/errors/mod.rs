//! Error taxonomy for the bridge.
//!
//! Encode and decode failures are always reported as [`BridgeError`] values
//! up the Rust call stack; they are only translated into host-visible Error
//! objects at the function-interop and async boundaries. Missing host
//! capabilities are not represented here — they are fatal misconfiguration
//! and panic at first use.

use crate::value::Kind;
use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Everything that can go wrong while marshalling values or bridging calls.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// A dynamic value had the wrong kind for the operation.
    TypeMismatch { expected: Kind, actual: Kind },
    /// The dynamic value's kind disagrees with the decode target shape.
    InvalidType { kind: Kind, target: String },
    /// A fixed-length array target did not match the dynamic array's length.
    InvalidArrayLength { expected: usize, actual: usize },
    /// Arity or shape mismatch on a function call from the host.
    InvalidArgument,
    /// A decode target function signature returns more than one value plus
    /// an optional trailing error.
    MultipleReturnValue,
    /// Decode was called with a descriptor that cannot be a destination,
    /// e.g. a mapping keyed by something other than strings.
    InvalidDecodeTarget { target: String },
    /// A mapping key type that cannot be represented as a host property.
    UnsupportedKey { key: String },
    /// A typed value with no dynamic representation.
    Unencodable { type_name: String },
    /// A decode failure inside a struct field, wrapped with its identity.
    Field { name: String, source: Box<BridgeError> },
    /// A decode failure inside an array element, wrapped with its index.
    Index { index: usize, source: Box<BridgeError> },
    /// An exception raised by the host while calling into it.
    Thrown(String),
    /// An error raised by typed user code itself.
    User(String),
}

impl BridgeError {
    /// Wraps a nested decode error with the struct field it occurred in.
    pub fn in_field(name: impl Into<String>, source: BridgeError) -> Self {
        Self::Field { name: name.into(), source: Box::new(source) }
    }

    /// Wraps a nested decode error with the array index it occurred at.
    pub fn at_index(index: usize, source: BridgeError) -> Self {
        Self::Index { index, source: Box::new(source) }
    }

    pub fn invalid_type(kind: Kind, target: impl Into<String>) -> Self {
        Self::InvalidType { kind, target: target.into() }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, actual } => {
                write!(f, "expected {} kind, got {} kind instead", expected, actual)
            }
            Self::InvalidType { kind, target } => {
                write!(f, "cannot decode {} into {}", kind, target)
            }
            Self::InvalidArrayLength { expected, actual } => {
                write!(
                    f,
                    "expected array of length {} but got dynamic array of length {}",
                    expected, actual
                )
            }
            Self::InvalidArgument => write!(f, "invalid argument passed into typed function"),
            Self::MultipleReturnValue => {
                write!(f, "a dynamic function can only return one value")
            }
            Self::InvalidDecodeTarget { target } => {
                write!(f, "invalid decode target: {}", target)
            }
            Self::UnsupportedKey { key } => {
                write!(f, "cannot encode mapping: key type {} is not a string or an integer", key)
            }
            Self::Unencodable { type_name } => {
                write!(f, "cannot convert {} to a dynamic value", type_name)
            }
            Self::Field { name, source } => write!(f, "in field {}: {}", name, source),
            Self::Index { index, source } => write!(f, "at index {}: {}", index, source),
            Self::Thrown(message) => write!(f, "host exception: {}", message),
            Self::User(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Field { source, .. } | Self::Index { source, .. } => Some(source),
            _ => None,
        }
    }
}
