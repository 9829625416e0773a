//! Fetch/store algebra over machine addresses.
//!
//! `Location` values (from `rosette-types`) name places; the functions
//! here read and write them against a context and the global
//! environment. Stores bundle their effect into [`StoreResult`] so the
//! caller commits it: context mutations land in place, global swaps
//! come back as the successor environment.

use rosette_types::{Location, Ob};

use crate::ctxt::Ctxt;
use crate::global::GlobalEnv;

/// Outcome of a store.
#[derive(Debug)]
pub enum StoreResult {
    /// The address does not exist; nothing was written.
    Fail,
    /// The context was updated in place.
    Ctxt,
    /// The store targeted the global environment; the caller installs
    /// the returned successor.
    Global(GlobalEnv),
}

/// Read the value a location names.
///
/// Atom literals fetch as themselves; limbo and dangling addresses
/// fetch as `None`.
#[must_use]
pub fn fetch(loc: &Location, ctxt: &Ctxt, global: &GlobalEnv) -> Option<Ob> {
    match loc {
        Location::ArgReg(n) => ctxt.argvec.elem(*n).cloned(),
        Location::CtxtReg(n) => ctxt.get_reg(*n).cloned(),
        Location::LexVar { level, offset } => ctxt
            .env_frame()?
            .nth_parent(*level)?
            .slot(*offset)
            .cloned(),
        Location::GlobalVar(g) => global.entry(*g).cloned(),
        Location::Atom(ob) => Some(ob.clone()),
        Location::Limbo => None,
    }
}

/// Write `ob` through a location.
pub fn store(loc: &Location, ctxt: &mut Ctxt, global: &GlobalEnv, ob: Ob) -> StoreResult {
    match loc {
        Location::ArgReg(n) => {
            if ctxt.argvec.set_elem(*n, ob) {
                StoreResult::Ctxt
            } else {
                StoreResult::Fail
            }
        }
        Location::CtxtReg(n) => {
            if ctxt.set_reg(*n, ob) {
                StoreResult::Ctxt
            } else {
                StoreResult::Fail
            }
        }
        Location::LexVar { level, offset } => {
            let stored = ctxt
                .env
                .as_env_mut()
                .and_then(|env| env.nth_parent_mut(*level))
                .map(|frame| frame.set_slot(*offset, ob));
            match stored {
                Some(true) => StoreResult::Ctxt,
                _ => StoreResult::Fail,
            }
        }
        Location::GlobalVar(g) => match global.with_entry(*g, ob) {
            Some(env) => StoreResult::Global(env),
            None => StoreResult::Fail,
        },
        Location::Atom(_) | Location::Limbo => StoreResult::Fail,
    }
}
