//! Machine addresses.
//!
//! A `Location` names a place a value can be fetched from or stored to:
//! an argument-vector slot, a context register, a lexical slot, a
//! global-environment entry, or an atom literal. The fetch/store
//! algebra over these addresses lives in the machine crate; this is the
//! pure data type, so addresses can sit in literal pools as values.

use serde::{Deserialize, Serialize};

use crate::ob::Ob;

/// An address within the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// Slot `n` of the current argument vector.
    ArgReg(usize),
    /// Context register `n`.
    CtxtReg(usize),
    /// Lexical slot: walk `level` parent frames, then slot `offset`.
    LexVar {
        /// Parent-walk count.
        level: usize,
        /// Slot offset within the frame.
        offset: usize,
    },
    /// Global-environment entry `g`.
    GlobalVar(usize),
    /// An atom literal; fetch yields the atom, store fails.
    Atom(Ob),
    /// Nowhere. Returns targeting limbo discard their result.
    Limbo,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArgReg(n) => write!(f, "arg[{n}]"),
            Self::CtxtReg(n) => write!(f, "reg[{n}]"),
            Self::LexVar { level, offset } => write!(f, "lex[{level},{offset}]"),
            Self::GlobalVar(g) => write!(f, "global[{g}]"),
            Self::Atom(ob) => write!(f, "atom({ob})"),
            Self::Limbo => write!(f, "limbo"),
        }
    }
}
