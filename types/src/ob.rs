//! The tagged object universe.
//!
//! Every value the machine touches is an `Ob`. Composite objects expose
//! their parts through `slot`; system values carry a `SysCode` the
//! machine interprets as a control signal at the primitive-apply
//! boundary.

use serde::{Deserialize, Serialize};

use crate::env::Env;
use crate::location::Location;
use crate::oprn::{Actor, StdOprn};
use crate::template::Template;
use crate::tuple::Tuple;

/// The canonical true value.
pub const RBLTRUE: Ob = Ob::RblBool(true);

/// The canonical false value.
pub const RBLFALSE: Ob = Ob::RblBool(false);

/// The no-value sentinel.
pub const NIV: Ob = Ob::Niv;

/// System-level control signal carried by a sysval object.
///
/// Primitives and the object system return these to request scheduling
/// actions rather than ordinary values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SysCode {
    /// The object system wants method resolution re-dispatched.
    Upcall,
    /// The current strand should be parked pending an external event.
    Suspend,
    /// External interrupt; fatal at the machine layer.
    Interrupt,
    /// The current strand should move to the sleeper pool.
    Sleep,
    /// Malformed request.
    Invalid,
    /// The current strand is finished; pick the next one.
    DeadThread,
}

impl SysCode {
    /// Numeric code for wire formats and diagnostics.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Upcall => 1,
            Self::Suspend => 2,
            Self::Interrupt => 3,
            Self::Sleep => 4,
            Self::DeadThread => 5,
        }
    }
}

/// A machine value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ob {
    /// Fixed-precision integer.
    Fixnum(i64),
    /// Boolean.
    RblBool(bool),
    /// Interned-by-name symbol; environment keys and tags.
    Symbol(String),
    /// Ordered sequence of values.
    Tuple(Tuple),
    /// Formals pattern for binding actuals into an environment.
    Template(Box<Template>),
    /// Lexical frame chain.
    Env(Box<Env>),
    /// Actor with an extension frame.
    Actor(Box<Actor>),
    /// Standard operation dispatch target.
    StdOprn(StdOprn),
    /// Machine address reified as a value (literal pools).
    Location(Box<Location>),
    /// System value carrying a control signal.
    Sysval(SysCode),
    /// No value.
    Niv,
    /// Missing-binding marker.
    Absent,
}

impl Ob {
    /// Whether this object carries a system control signal.
    #[must_use]
    pub fn is_sysval(&self) -> bool {
        matches!(self, Self::Sysval(_))
    }

    /// The system code, when this is a sysval.
    #[must_use]
    pub fn sysval(&self) -> Option<SysCode> {
        match self {
            Self::Sysval(code) => Some(*code),
            _ => None,
        }
    }

    /// Indexed part access for composite objects.
    #[must_use]
    pub fn slot(&self, i: usize) -> Option<&Ob> {
        match self {
            Self::Tuple(t) => t.elem(i),
            Self::Env(e) => e.slot(i),
            Self::Actor(a) => a.extension.slot(i),
            Self::Template(t) => t.keymeta.elem(i),
            _ => None,
        }
    }

    /// Kind name for instrumentation counters.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixnum(_) => "fixnum",
            Self::RblBool(_) => "bool",
            Self::Symbol(_) => "symbol",
            Self::Tuple(_) => "tuple",
            Self::Template(_) => "template",
            Self::Env(_) => "env",
            Self::Actor(_) => "actor",
            Self::StdOprn(_) => "oprn",
            Self::Location(_) => "location",
            Self::Sysval(_) => "sysval",
            Self::Niv => "niv",
            Self::Absent => "absent",
        }
    }

    /// Build a symbol object.
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// View as an environment frame, when this wraps one.
    #[must_use]
    pub fn as_env(&self) -> Option<&Env> {
        match self {
            Self::Env(e) => Some(e),
            _ => None,
        }
    }

    /// Mutable view as an environment frame.
    pub fn as_env_mut(&mut self) -> Option<&mut Env> {
        match self {
            Self::Env(e) => Some(e),
            _ => None,
        }
    }

    /// View as a tuple, when this wraps one.
    #[must_use]
    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Self::Tuple(t) => Some(t),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixnum(n) => write!(f, "{n}"),
            Self::RblBool(true) => write!(f, "#t"),
            Self::RblBool(false) => write!(f, "#f"),
            Self::Symbol(s) => write!(f, "{s}"),
            Self::Tuple(t) => write!(f, "{t}"),
            Self::Template(_) => write!(f, "#<template>"),
            Self::Env(_) => write!(f, "#<env>"),
            Self::Actor(_) => write!(f, "#<actor>"),
            Self::StdOprn(o) => write!(f, "#<oprn {}>", o.name),
            Self::Location(l) => write!(f, "{l}"),
            Self::Sysval(code) => write!(f, "#<sysval {code:?}>"),
            Self::Niv => write!(f, "#niv"),
            Self::Absent => write!(f, "#absent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysval_predicate_and_code() {
        let ob = Ob::Sysval(SysCode::Sleep);
        assert!(ob.is_sysval());
        assert_eq!(ob.sysval(), Some(SysCode::Sleep));
        assert_eq!(SysCode::Sleep.code(), 4);

        assert!(!Ob::Fixnum(3).is_sysval());
        assert_eq!(Ob::Fixnum(3).sysval(), None);
    }

    #[test]
    fn slot_reads_tuple_elements() {
        let t = Ob::Tuple(Tuple::from_elems(vec![Ob::Fixnum(1), Ob::Fixnum(2)]));
        assert_eq!(t.slot(1), Some(&Ob::Fixnum(2)));
        assert_eq!(t.slot(2), None);
        assert_eq!(Ob::Niv.slot(0), None);
    }

    #[test]
    fn canonical_constants_compare_structurally() {
        assert_eq!(RBLTRUE, Ob::RblBool(true));
        assert_eq!(RBLFALSE, Ob::RblBool(false));
        assert_ne!(RBLTRUE, RBLFALSE);
        assert_eq!(NIV, Ob::Niv);
    }
}
