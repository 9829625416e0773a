//! Argument vectors.

use serde::{Deserialize, Serialize};

use crate::ob::Ob;

/// An ordered sequence of objects.
///
/// Tuples back argument vectors and actuals. The final element of an
/// argument vector may be a `&rest` value; [`Tuple::flatten_rest`]
/// reports how that tail disposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple {
    elems: Vec<Ob>,
}

/// Disposition of an argument vector's `&rest` tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlattenResult {
    /// The tail was a tuple; leading arguments and tail are concatenated.
    Flattened(Tuple),
    /// No `&rest` value was supplied.
    AbsentRest,
    /// The tail exists but is not a tuple.
    InvalidRest,
}

impl Tuple {
    /// The empty tuple.
    pub const NIL: Tuple = Tuple { elems: Vec::new() };

    /// Build a tuple from elements.
    #[must_use]
    pub fn from_elems(elems: Vec<Ob>) -> Self {
        Self { elems }
    }

    /// A tuple of `n` no-value slots.
    #[must_use]
    pub fn filled(n: usize) -> Self {
        Self {
            elems: vec![Ob::Niv; n],
        }
    }

    /// Element access.
    #[must_use]
    pub fn elem(&self, i: usize) -> Option<&Ob> {
        self.elems.get(i)
    }

    /// Replace an element in place. Returns false when out of range.
    pub fn set_elem(&mut self, i: usize, ob: Ob) -> bool {
        match self.elems.get_mut(i) {
            Some(slot) => {
                *slot = ob;
                true
            }
            None => false,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Whether this is the empty tuple.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Iterate over elements.
    pub fn iter(&self) -> std::slice::Iter<'_, Ob> {
        self.elems.iter()
    }

    /// The elements as a slice.
    #[must_use]
    pub fn elems(&self) -> &[Ob] {
        &self.elems
    }

    /// A tuple of the first `n` elements.
    #[must_use]
    pub fn prefix(&self, n: usize) -> Tuple {
        Self {
            elems: self.elems.iter().take(n).cloned().collect(),
        }
    }

    /// Dispose of the `&rest` tail.
    ///
    /// An empty vector or an `Absent` tail means no rest arguments were
    /// supplied; a tuple tail is spliced onto the leading arguments;
    /// anything else is malformed.
    #[must_use]
    pub fn flatten_rest(&self) -> FlattenResult {
        match self.elems.split_last() {
            None | Some((Ob::Absent, _)) => FlattenResult::AbsentRest,
            Some((Ob::Tuple(rest), lead)) => {
                let mut elems = lead.to_vec();
                elems.extend(rest.elems.iter().cloned());
                FlattenResult::Flattened(Tuple { elems })
            }
            Some(_) => FlattenResult::InvalidRest,
        }
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, ob) in self.elems.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{ob}")?;
        }
        write!(f, "]")
    }
}

impl FromIterator<Ob> for Tuple {
    fn from_iter<I: IntoIterator<Item = Ob>>(iter: I) -> Self {
        Self {
            elems: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_yields_niv_slots() {
        let t = Tuple::filled(3);
        assert_eq!(t.len(), 3);
        assert!(t.iter().all(|ob| *ob == Ob::Niv));
    }

    #[test]
    fn flatten_rest_splices_tuple_tail() {
        let rest = Tuple::from_elems(vec![Ob::Fixnum(3), Ob::Fixnum(4)]);
        let argvec = Tuple::from_elems(vec![Ob::Fixnum(1), Ob::Fixnum(2), Ob::Tuple(rest)]);
        match argvec.flatten_rest() {
            FlattenResult::Flattened(flat) => {
                assert_eq!(
                    flat.elems(),
                    &[Ob::Fixnum(1), Ob::Fixnum(2), Ob::Fixnum(3), Ob::Fixnum(4)]
                );
            }
            other => panic!("expected Flattened, got {other:?}"),
        }
    }

    #[test]
    fn flatten_rest_absent_tail() {
        let argvec = Tuple::from_elems(vec![Ob::Fixnum(1), Ob::Absent]);
        assert_eq!(argvec.flatten_rest(), FlattenResult::AbsentRest);
        assert_eq!(Tuple::NIL.flatten_rest(), FlattenResult::AbsentRest);
    }

    #[test]
    fn flatten_rest_rejects_non_tuple_tail() {
        let argvec = Tuple::from_elems(vec![Ob::Fixnum(1), Ob::Fixnum(2)]);
        assert_eq!(argvec.flatten_rest(), FlattenResult::InvalidRest);
    }
}
