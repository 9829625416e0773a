//! The global environment.

use serde::{Deserialize, Serialize};

use rosette_types::Ob;

/// Indexed global slot vector, addressable by opcode operands.
///
/// Updates follow the machine's whole-value swap discipline: `with_entry`
/// builds the successor environment and the caller installs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalEnv {
    entries: Vec<Ob>,
}

impl GlobalEnv {
    /// An environment over the given entries.
    #[must_use]
    pub fn new(entries: Vec<Ob>) -> Self {
        Self { entries }
    }

    /// Entry access.
    #[must_use]
    pub fn entry(&self, g: usize) -> Option<&Ob> {
        self.entries.get(g)
    }

    /// Append an entry, returning its index.
    pub fn define(&mut self, ob: Ob) -> usize {
        self.entries.push(ob);
        self.entries.len() - 1
    }

    /// The successor environment with entry `g` replaced, or `None`
    /// when `g` is out of range.
    #[must_use]
    pub fn with_entry(&self, g: usize, ob: Ob) -> Option<GlobalEnv> {
        if g >= self.entries.len() {
            return None;
        }
        let mut next = self.clone();
        next.entries[g] = ob;
        Some(next)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the environment has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_entry_swaps_whole_value() {
        let env = GlobalEnv::new(vec![Ob::Fixnum(1), Ob::Fixnum(2)]);
        let next = env.with_entry(1, Ob::Fixnum(9)).unwrap();

        assert_eq!(env.entry(1), Some(&Ob::Fixnum(2)));
        assert_eq!(next.entry(1), Some(&Ob::Fixnum(9)));
        assert!(env.with_entry(2, Ob::Niv).is_none());
    }
}
