//! The publishing contract: exposing typed values into the host's global
//! namespace.
//!
//! The host side prepares a well-known object under the global namespace;
//! typed code attaches to it, publishes values and functions under string
//! names, and finally flips a reserved boolean flag to signal that
//! publishing for the session is complete. `ready` consumes the [`Bridge`],
//! so the flag is set exactly once, after every other publish.

use crate::errors::Result;
use crate::host::{global, Host};
use crate::typed::TypedValue;
use crate::value::{Kind, Object};

/// Default name of the well-known global bridge object.
pub const DEFAULT_IDENT: &str = "__dynbridge__";

/// Reserved property signaling that publishing is complete.
pub const READY_FLAG: &str = "__ready__";

/// A handle to the publishing namespace, constructed once during setup and
/// passed by reference — never process-global state.
#[derive(Debug)]
pub struct Bridge<'h> {
    root: Object<'h>,
}

impl<'h> Bridge<'h> {
    /// Attaches to the well-known object named `ident` under the host's
    /// global namespace.
    pub fn attach(host: &'h dyn Host, ident: &str) -> Result<Self> {
        let root = global(host).expect(Kind::Object, &[ident])?;
        Ok(Self { root: Object::new(host, root)? })
    }

    /// Publishes an encoded copy of `value` under `name`.
    pub fn expose(&self, name: &str, value: &TypedValue) -> Result<()> {
        tracing::debug!(name, "exposing value");
        self.root.set(name, value)
    }

    /// Signals that every value and function has been published. Consumes
    /// the bridge: the ready flag can only be set once, last.
    pub fn ready(self) -> Result<()> {
        tracing::debug!("publishing complete");
        self.root.set(READY_FLAG, &TypedValue::Bool(true))
    }

    /// The underlying namespace object.
    pub fn root(&self) -> &Object<'h> {
        &self.root
    }
}
