//! Membership oracles: the black-box query interface to the target system,
//! concrete oracles over model instances, a query counter for diagnostics and
//! the procedural oracle that lets a per-procedure learner query the global
//! system.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use spa::{
    alphabet::{SpaAlphabet, Symbol},
    dfa::Dfa,
    spa::Spa,
};
use tracing::trace;

use crate::atr::AtrProvider;

/// A minimally adequate teacher for membership: answers whether a word over
/// the full alphabet belongs to the target language. Synchronous, total and
/// deterministic for a fixed target.
pub trait MembershipOracle<S: Symbol> {
    fn answer_query(&self, word: &[S]) -> bool;
}

/// Oracles are shared between the orchestrator and the per-procedure oracles
/// through `Rc`; the learner is single-threaded throughout.
impl<S: Symbol, O: MembershipOracle<S> + ?Sized> MembershipOracle<S> for Rc<O> {
    fn answer_query(&self, word: &[S]) -> bool {
        (**self).answer_query(word)
    }
}

/// An oracle backed by a concrete [`Spa`], used as the black-box target in
/// tests and demos.
#[derive(Debug, Clone)]
pub struct SpaOracle<S: Symbol> {
    target: Spa<S>,
}

impl<S: Symbol> SpaOracle<S> {
    pub fn new(target: Spa<S>) -> Self {
        Self { target }
    }

    pub fn alphabet(&self) -> &SpaAlphabet<S> {
        self.target.alphabet()
    }
}

impl<S: Symbol> MembershipOracle<S> for SpaOracle<S> {
    fn answer_query(&self, word: &[S]) -> bool {
        self.target.accepts(word)
    }
}

/// An oracle backed by a plain [`Dfa`], for learning an ordinary regular
/// language with [`crate::lstar::DfaLstar`] directly.
#[derive(Debug, Clone)]
pub struct DfaOracle<S: Symbol> {
    automaton: Dfa<S>,
}

impl<S: Symbol> DfaOracle<S> {
    pub fn new(automaton: Dfa<S>) -> Self {
        Self { automaton }
    }
}

impl<S: Symbol> MembershipOracle<S> for DfaOracle<S> {
    fn answer_query(&self, word: &[S]) -> bool {
        self.automaton.accepts(word)
    }
}

/// Wraps an oracle and counts queries and queried symbols. Purely diagnostic,
/// the query-answering contract is untouched.
#[derive(Debug, Clone)]
pub struct CountingOracle<O> {
    inner: O,
    queries: Cell<u64>,
    symbols: Cell<u64>,
}

impl<O> CountingOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            queries: Cell::new(0),
            symbols: Cell::new(0),
        }
    }

    /// Number of queries answered so far.
    pub fn queries(&self) -> u64 {
        self.queries.get()
    }

    /// Total number of symbols across all answered queries.
    pub fn symbols(&self) -> u64 {
        self.symbols.get()
    }
}

impl<S: Symbol, O: MembershipOracle<S>> MembershipOracle<S> for CountingOracle<O> {
    fn answer_query(&self, word: &[S]) -> bool {
        self.queries.set(self.queries.get() + 1);
        self.symbols.set(self.symbols.get() + word.len() as u64);
        self.inner.answer_query(word)
    }
}

/// Answers procedure-local queries through the global target system: a local
/// word `w` of procedure `p` is embedded as `access(p) · expand(w) · return(p)`
/// with the current best sequences of the shared [`AtrProvider`], and the
/// resulting global word is put to the underlying oracle.
pub struct ProceduralMembershipOracle<S: Symbol, O> {
    alphabet: SpaAlphabet<S>,
    oracle: Rc<O>,
    procedure: S,
    atr: Rc<RefCell<AtrProvider<S, O>>>,
}

impl<S: Symbol, O> ProceduralMembershipOracle<S, O> {
    pub fn new(
        alphabet: SpaAlphabet<S>,
        oracle: Rc<O>,
        procedure: S,
        atr: Rc<RefCell<AtrProvider<S, O>>>,
    ) -> Self {
        Self {
            alphabet,
            oracle,
            procedure,
            atr,
        }
    }
}

impl<S: Symbol, O: MembershipOracle<S>> MembershipOracle<S> for ProceduralMembershipOracle<S, O> {
    fn answer_query(&self, local_word: &[S]) -> bool {
        let atr = self.atr.borrow();
        let mut word = atr.access_sequence(self.procedure).to_vec();
        word.extend(
            self.alphabet
                .expand(local_word, |c| atr.terminating_sequence(c).to_vec()),
        );
        word.extend_from_slice(atr.return_sequence(self.procedure));

        trace!(
            "local query {local_word:?} for {:?} embedded as {word:?}",
            self.procedure
        );
        self.oracle.answer_query(&word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spa::math;

    fn word(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    /// A one-procedure target with S -> aSa | a | eps.
    fn target() -> Spa<char> {
        let alphabet = SpaAlphabet::new(['S'], ['a'], 'R').unwrap();
        let mut s = Dfa::new();
        s.set_accepting(0, true);
        let s1 = s.add_state(true);
        let s2 = s.add_state(false);
        let s3 = s.add_state(true);
        s.add_transition(0, 'a', s1);
        s.add_transition(s1, 'S', s2);
        s.add_transition(s2, 'a', s3);
        let mut procedures = math::Map::default();
        procedures.insert('S', s);
        Spa::new(alphabet, 'S', procedures)
    }

    #[test]
    fn counting_oracle_counts() {
        let oracle = CountingOracle::new(SpaOracle::new(target()));
        assert!(oracle.answer_query(&word("SaR")));
        assert!(!oracle.answer_query(&word("Sa")));
        assert_eq!(oracle.queries(), 2);
        assert_eq!(oracle.symbols(), 5);
    }

    #[test]
    fn procedural_oracle_embeds_local_queries() {
        let spa = target();
        let alphabet = spa.alphabet().clone();
        let oracle = Rc::new(SpaOracle::new(spa));

        let mut atr = AtrProvider::new(alphabet.clone(), Rc::clone(&oracle));
        atr.scan_positive_counterexample(&word("SaSaRaR")).unwrap();
        let atr = Rc::new(RefCell::new(atr));

        let local = ProceduralMembershipOracle::new(alphabet, Rc::clone(&oracle), 'S', atr);

        // local traces of S, with the nested call abstracted to one letter
        assert!(local.answer_query(&word("")));
        assert!(local.answer_query(&word("a")));
        assert!(local.answer_query(&word("aSa")));
        assert!(!local.answer_query(&word("aa")));
        assert!(!local.answer_query(&word("Sa")));
    }
}
