//! Lexical environment frames.
//!
//! An `Env` is one frame of a parent-linked chain: a key tuple, a
//! parallel slot vector, an optional actor extension, and the lookup
//! meta that decides how binding resolution behaves for this frame.

use serde::{Deserialize, Serialize};

use crate::error::RblError;
use crate::ob::Ob;
use crate::tuple::Tuple;

/// Lookup discipline for a frame.
///
/// `Standard` frames resolve keys positionally. `Upcall` frames defer
/// resolution to the object system: any lookup that reaches them yields
/// an upcall signal instead of a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvMeta {
    /// Positional key/slot resolution.
    #[default]
    Standard,
    /// Resolution is owned by the object system.
    Upcall,
}

/// One lexical frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    /// Lookup discipline for this frame.
    pub meta: EnvMeta,
    /// Binding keys, parallel to `slots`.
    pub keys: Vec<Ob>,
    /// Bound values.
    pub slots: Vec<Ob>,
    /// Actor extension frame, read by indirect lexical transfers.
    pub extension: Option<Box<Env>>,
    /// Enclosing frame.
    pub parent: Option<Box<Env>>,
}

impl Env {
    /// An empty root frame.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A frame with the given bindings and no parent.
    #[must_use]
    pub fn with_bindings(keys: Vec<Ob>, slots: Vec<Ob>) -> Self {
        Self {
            keys,
            slots,
            ..Self::default()
        }
    }

    /// A frame whose lookups signal an upcall.
    #[must_use]
    pub fn upcall_frame() -> Self {
        Self {
            meta: EnvMeta::Upcall,
            ..Self::default()
        }
    }

    /// The enclosing frame, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Env> {
        self.parent.as_deref()
    }

    /// Walk `n` parent links.
    #[must_use]
    pub fn nth_parent(&self, n: usize) -> Option<&Env> {
        let mut frame = self;
        for _ in 0..n {
            frame = frame.parent.as_deref()?;
        }
        Some(frame)
    }

    /// Walk `n` parent links, mutably.
    pub fn nth_parent_mut(&mut self, n: usize) -> Option<&mut Env> {
        let mut frame = self;
        for _ in 0..n {
            frame = frame.parent.as_deref_mut()?;
        }
        Some(frame)
    }

    /// Slot access on this frame.
    #[must_use]
    pub fn slot(&self, i: usize) -> Option<&Ob> {
        self.slots.get(i)
    }

    /// Replace a slot in place. Returns false when out of range.
    pub fn set_slot(&mut self, i: usize, ob: Ob) -> bool {
        match self.slots.get_mut(i) {
            Some(slot) => {
                *slot = ob;
                true
            }
            None => false,
        }
    }

    /// Slot access through the actor extension of this frame.
    #[must_use]
    pub fn extension_slot(&self, i: usize) -> Option<&Ob> {
        self.extension.as_deref().and_then(|ext| ext.slot(i))
    }

    /// Add a binding to this frame.
    pub fn define(&mut self, key: Ob, value: Ob) {
        self.keys.push(key);
        self.slots.push(value);
    }

    /// A new frame binding `keymeta` to `actuals`, enclosing this one.
    #[must_use]
    pub fn extend_with(&self, keymeta: &Tuple, actuals: Tuple) -> Env {
        Env {
            meta: EnvMeta::Standard,
            keys: keymeta.elems().to_vec(),
            slots: actuals.elems().to_vec(),
            extension: None,
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Resolve a key through the frame chain.
    ///
    /// # Errors
    ///
    /// `RblError::Upcall` when resolution reaches a frame owned by the
    /// object system; `RblError::Absent` when no frame binds the key.
    pub fn lookup_obo(&self, key: &Ob) -> Result<Ob, RblError> {
        let mut frame = Some(self);
        while let Some(env) = frame {
            if env.meta == EnvMeta::Upcall {
                return Err(RblError::Upcall);
            }
            if let Some(i) = env.keys.iter().position(|k| k == key) {
                return Ok(env.slots.get(i).cloned().unwrap_or(Ob::Absent));
            }
            frame = env.parent.as_deref();
        }
        Err(RblError::Absent)
    }
}
