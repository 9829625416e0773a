//! Dispatch operations and actors.

use serde::{Deserialize, Serialize};

use crate::env::Env;

/// A standard operation: a named dispatch target the machine hands to
/// the object system when it appears as a transmit target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdOprn {
    /// Index into the host's operation table.
    pub id: usize,
    /// Operation name, for diagnostics.
    pub name: String,
}

impl StdOprn {
    /// Build an operation.
    #[must_use]
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// An actor object. Its state lives in an extension frame that indirect
/// lexical transfers read through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The actor's extension frame.
    pub extension: Env,
}

impl Actor {
    /// Build an actor over an extension frame.
    #[must_use]
    pub fn new(extension: Env) -> Self {
        Self { extension }
    }
}
