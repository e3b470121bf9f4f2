use tracing::trace;

use crate::{
    alphabet::{SpaAlphabet, Symbol},
    configuration::Configuration,
    dfa::Dfa,
    math,
};

/// A system of procedural automata: a designated initial procedure together
/// with one acceptor per call symbol. Procedure acceptors read call and
/// internal symbols; a call symbol is a single letter abstracting the whole
/// nested invocation, the return symbol is interpreted by the pushdown
/// semantics of [`Spa::accepts`] instead.
///
/// The model with no procedures is the canonical *empty* SPA of an
/// as-yet-unobserved system; it accepts exactly the empty word.
#[derive(Debug, Clone)]
pub struct Spa<S: Symbol> {
    alphabet: SpaAlphabet<S>,
    initial_call: Option<S>,
    procedures: math::Map<S, Dfa<S>>,
}

impl<S: Symbol> Spa<S> {
    /// The empty model: no procedures are known yet.
    pub fn empty(alphabet: SpaAlphabet<S>) -> Self {
        Self {
            alphabet,
            initial_call: None,
            procedures: math::Map::default(),
        }
    }

    /// Composes procedures into an SPA rooted at `initial_call`.
    pub fn new(
        alphabet: SpaAlphabet<S>,
        initial_call: S,
        procedures: math::Map<S, Dfa<S>>,
    ) -> Self {
        assert!(
            procedures.contains_key(&initial_call),
            "initial procedure {initial_call:?} has no acceptor"
        );
        Self {
            alphabet,
            initial_call: Some(initial_call),
            procedures,
        }
    }

    pub fn alphabet(&self) -> &SpaAlphabet<S> {
        &self.alphabet
    }

    pub fn initial_call(&self) -> Option<S> {
        self.initial_call
    }

    pub fn procedures(&self) -> &math::Map<S, Dfa<S>> {
        &self.procedures
    }

    pub fn procedure(&self, call: S) -> Option<&Dfa<S>> {
        self.procedures.get(&call)
    }

    /// Decides membership of `word` by pushdown simulation. The run must be
    /// rooted (first symbol invokes the initial procedure), calls and returns
    /// must be well-nested, a return may only happen from a locally accepting
    /// state, and every invocation including the outermost must have returned
    /// once the word is consumed.
    pub fn accepts(&self, word: &[S]) -> bool {
        let Some(initial) = self.initial_call else {
            return word.is_empty();
        };

        let mut symbols = word.iter().copied();
        match symbols.next() {
            Some(first) if first == initial => {}
            _ => return false,
        }
        // initial_call is guaranteed a procedure by construction
        let mut cfg = Configuration::new(initial, self.procedures[&initial].initial());
        let mut returned = false;

        for sym in symbols {
            if returned {
                // trailing symbols after the outermost return
                return false;
            }
            if self.alphabet.is_internal(sym) {
                let active = &self.procedures[&cfg.call()];
                match active.successor(cfg.state(), sym) {
                    Some(next) => cfg.set_state(next),
                    None => return false,
                }
            } else if self.alphabet.is_call(sym) {
                let active = &self.procedures[&cfg.call()];
                if active.successor(cfg.state(), sym).is_none() {
                    return false;
                }
                let Some(callee) = self.procedures.get(&sym) else {
                    trace!("call symbol {sym:?} has no procedure, rejecting");
                    return false;
                };
                cfg.enter(sym, callee.initial());
            } else {
                // a return is only legal from an accepting local state
                let active = &self.procedures[&cfg.call()];
                if !active.is_accepting(cfg.state()) {
                    return false;
                }
                match cfg.leave() {
                    Some(exited) => {
                        // the resumed caller consumes the call symbol it suspended on
                        let caller = &self.procedures[&cfg.call()];
                        match caller.successor(cfg.state(), exited) {
                            Some(next) => cfg.set_state(next),
                            None => return false,
                        }
                    }
                    None => returned = true,
                }
            }
        }

        returned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The two-procedure palindrome system over calls {S, T}, internals
    /// {a, b, c} and return R, with S -> aSa | bSb | T | a | b | eps and
    /// T -> cTc | c | S.
    pub(crate) fn palindrome_spa() -> Spa<char> {
        let alphabet = SpaAlphabet::new(['S', 'T'], ['a', 'b', 'c'], 'R').unwrap();

        let mut s = Dfa::new();
        let s1 = s.add_state(true);
        let s2 = s.add_state(true);
        let s3 = s.add_state(false);
        let s4 = s.add_state(false);
        let s5 = s.add_state(true);
        s.set_accepting(0, true);
        s.add_transition(0, 'T', s5);
        s.add_transition(0, 'a', s1);
        s.add_transition(0, 'b', s2);
        s.add_transition(s1, 'S', s3);
        s.add_transition(s2, 'S', s4);
        s.add_transition(s3, 'a', s5);
        s.add_transition(s4, 'b', s5);

        let mut t = Dfa::new();
        let t1 = t.add_state(true);
        let t2 = t.add_state(false);
        let t3 = t.add_state(true);
        t.add_transition(0, 'S', t3);
        t.add_transition(0, 'c', t1);
        t.add_transition(t1, 'T', t2);
        t.add_transition(t2, 'c', t3);

        let mut procedures = math::Map::default();
        procedures.insert('S', s);
        procedures.insert('T', t);
        Spa::new(alphabet, 'S', procedures)
    }

    fn accepts(word: &str) -> bool {
        palindrome_spa().accepts(&word.chars().collect::<Vec<_>>())
    }

    #[test_log::test]
    fn well_matched_palindromes() {
        assert!(accepts("SR"));
        assert!(accepts("SaR"));
        assert!(accepts("SaSRaR"));
        assert!(accepts("SbSTcRRbR"));
    }

    #[test_log::test]
    fn well_matched_but_invalid() {
        assert!(!accepts("SaaR"));
        assert!(!accepts("SaTaRaR"));
        assert!(!accepts(""));
    }

    #[test_log::test]
    fn ill_matched_or_unrooted() {
        // incomplete, returns missing
        assert!(!accepts("SSS"));
        // return before any call
        assert!(!accepts("RS"));
        // not rooted at the initial procedure
        assert!(!accepts("aba"));
        assert!(!accepts("TcR"));
        // trailing symbols after the outermost return
        assert!(!accepts("SaRa"));
        assert!(!accepts("SaRSR"));
        // more returns than open calls
        assert!(!accepts("SaRR"));
    }

    #[test]
    fn empty_spa_convention() {
        let alphabet = SpaAlphabet::new(['S'], ['a'], 'R').unwrap();
        let empty = Spa::empty(alphabet);
        assert_eq!(empty.initial_call(), None);
        assert!(empty.accepts(&[]));
        assert!(!empty.accepts(&['S', 'R']));
        assert!(!empty.accepts(&['a']));
    }
}
