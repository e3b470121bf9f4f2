use std::{fmt::Debug, hash::Hash};

use thiserror::Error;

/// A symbol of an SPA alphabet, which is also the type of the symbols in a word.
/// Anything small, hashable and orderable qualifies; `char` and small enums are
/// the typical choices.
pub trait Symbol: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash {}
impl<S: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash> Symbol for S {}

/// Error raised when constructing an [`SpaAlphabet`] whose roles are not
/// pairwise disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlphabetError {
    #[error("symbol at call position {0} appears in more than one role")]
    AmbiguousCall(usize),
    #[error("symbol at internal position {0} appears in more than one role")]
    AmbiguousInternal(usize),
}

/// An input alphabet partitioned into *call* symbols (each naming one
/// procedure), *internal* symbols and a single *return* symbol. The three
/// roles are pairwise disjoint, which [`SpaAlphabet::new`] validates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaAlphabet<S: Symbol> {
    calls: Vec<S>,
    internals: Vec<S>,
    return_symbol: S,
}

impl<S: Symbol> SpaAlphabet<S> {
    /// Creates a new partitioned alphabet. Fails if any symbol occurs in more
    /// than one role.
    pub fn new(
        calls: impl IntoIterator<Item = S>,
        internals: impl IntoIterator<Item = S>,
        return_symbol: S,
    ) -> Result<Self, AlphabetError> {
        let calls: Vec<S> = calls.into_iter().collect();
        let internals: Vec<S> = internals.into_iter().collect();

        for (i, c) in calls.iter().enumerate() {
            if *c == return_symbol || calls[..i].contains(c) || internals.contains(c) {
                return Err(AlphabetError::AmbiguousCall(i));
            }
        }
        for (i, a) in internals.iter().enumerate() {
            if *a == return_symbol || internals[..i].contains(a) {
                return Err(AlphabetError::AmbiguousInternal(i));
            }
        }

        Ok(Self {
            calls,
            internals,
            return_symbol,
        })
    }

    /// Returns true if `sym` names a procedure.
    pub fn is_call(&self, sym: S) -> bool {
        self.calls.contains(&sym)
    }

    /// Returns true if `sym` is an ordinary transition label.
    pub fn is_internal(&self, sym: S) -> bool {
        self.internals.contains(&sym)
    }

    /// Returns true if `sym` is the return symbol.
    pub fn is_return(&self, sym: S) -> bool {
        sym == self.return_symbol
    }

    pub fn return_symbol(&self) -> S {
        self.return_symbol
    }

    /// Iterates over all call symbols.
    pub fn calls(&self) -> impl Iterator<Item = S> + '_ {
        self.calls.iter().copied()
    }

    /// Iterates over all internal symbols.
    pub fn internals(&self) -> impl Iterator<Item = S> + '_ {
        self.internals.iter().copied()
    }

    /// Iterates over the full alphabet, calls first, return symbol last.
    pub fn universe(&self) -> impl Iterator<Item = S> + '_ {
        self.calls()
            .chain(self.internals())
            .chain(std::iter::once(self.return_symbol))
    }

    pub fn num_calls(&self) -> usize {
        self.calls.len()
    }

    pub fn num_internals(&self) -> usize {
        self.internals.len()
    }

    pub fn size(&self) -> usize {
        self.calls.len() + self.internals.len() + 1
    }

    /// Returns true if the given symbol is present in the alphabet.
    pub fn contains(&self, sym: S) -> bool {
        self.is_call(sym) || self.is_internal(sym) || self.is_return(sym)
    }
}
