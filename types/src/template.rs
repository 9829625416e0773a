//! Formals templates.

use serde::{Deserialize, Serialize};

use crate::ob::Ob;
use crate::tuple::Tuple;

/// Shape of a template's formal parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    /// Exactly `arity` positional formals.
    IdVec {
        /// Required argument count.
        arity: usize,
    },
    /// `arity` positional formals plus a rest formal that binds the
    /// remaining actuals as a tuple.
    IdVecRest {
        /// Required leading argument count.
        arity: usize,
    },
}

/// A pattern for binding actuals into a new environment frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// The key set installed into the frame a match produces.
    pub keymeta: Tuple,
    /// The formals shape matched against the argument vector.
    pub pat: Pattern,
}

impl Template {
    /// A fixed-arity template; one key per formal.
    #[must_use]
    pub fn id_vec(keys: Vec<Ob>) -> Self {
        let arity = keys.len();
        Self {
            keymeta: Tuple::from_elems(keys),
            pat: Pattern::IdVec { arity },
        }
    }

    /// A rest template; the final key binds the rest tuple.
    #[must_use]
    pub fn id_vec_rest(keys: Vec<Ob>) -> Self {
        let arity = keys.len().saturating_sub(1);
        Self {
            keymeta: Tuple::from_elems(keys),
            pat: Pattern::IdVecRest { arity },
        }
    }

    /// Match the first `nargs` actuals against this template.
    ///
    /// Returns the actuals tuple to install, or `None` on arity
    /// mismatch.
    #[must_use]
    pub fn match_pattern(&self, argvec: &Tuple, nargs: usize) -> Option<Tuple> {
        if nargs > argvec.len() {
            return None;
        }
        match self.pat {
            Pattern::IdVec { arity } => {
                if nargs == arity {
                    Some(argvec.prefix(nargs))
                } else {
                    None
                }
            }
            Pattern::IdVecRest { arity } => {
                if nargs >= arity {
                    let rest: Tuple = argvec
                        .elems()
                        .iter()
                        .take(nargs)
                        .skip(arity)
                        .cloned()
                        .collect();
                    let mut actuals = argvec.prefix(arity).elems().to_vec();
                    actuals.push(Ob::Tuple(rest));
                    Some(Tuple::from_elems(actuals))
                } else {
                    None
                }
            }
        }
    }
}
