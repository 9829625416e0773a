//! Machine error taxonomy.

use serde::{Deserialize, Serialize};

/// Outcome signals produced by primitives and the object system.
///
/// These are ordinary values: opcode handlers never raise, they encode
/// outcomes into machine flags, and primitives report failure through
/// this enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RblError {
    /// The current strand terminated; the machine should pick the next.
    DeadThread,
    /// Malformed request.
    Invalid,
    /// The primitive wants the strand parked.
    Suspend,
    /// Environment lookup found no binding.
    Absent,
    /// The object system wants method resolution re-dispatched.
    Upcall,
    /// A primitive rejected its arguments.
    PrimMismatch(String),
    /// A user-visible runtime diagnostic.
    RuntimeError(String),
}

impl std::fmt::Display for RblError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadThread => write!(f, "dead thread"),
            Self::Invalid => write!(f, "invalid"),
            Self::Suspend => write!(f, "suspend"),
            Self::Absent => write!(f, "absent"),
            Self::Upcall => write!(f, "upcall"),
            Self::PrimMismatch(msg) => write!(f, "primitive mismatch: {msg}"),
            Self::RuntimeError(msg) => write!(f, "runtime error: {msg}"),
        }
    }
}
