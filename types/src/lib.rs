//! Core value universe for the Rosette bytecode machine.
//!
//! This crate provides the tagged object types shared by the virtual
//! machine and its embedding hosts: the `Ob` value universe, argument
//! tuples, lexical environment frames, formals templates, dispatch
//! operations, machine addresses, and the machine error taxonomy.
//!
//! The types here are deliberately value-like: objects are shared by
//! cloning and compared structurally. Storage management beyond that is
//! the host's concern.

mod env;
mod error;
mod location;
mod ob;
mod oprn;
mod template;
mod tuple;

pub use env::{Env, EnvMeta};
pub use error::RblError;
pub use location::Location;
pub use ob::{Ob, SysCode, NIV, RBLFALSE, RBLTRUE};
pub use oprn::{Actor, StdOprn};
pub use template::{Pattern, Template};
pub use tuple::{FlattenResult, Tuple};
