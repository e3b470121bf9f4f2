use std::collections::VecDeque;

use crate::{alphabet::Symbol, math};

/// Index of a local state inside a procedure acceptor.
pub type StateId = usize;

/// A compact, possibly partial deterministic finite acceptor. Procedure
/// hypotheses are built from these; a missing transition is learning-time
/// incompleteness and simply rejects when run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dfa<S: Symbol> {
    accepting: Vec<bool>,
    transitions: Vec<math::Map<S, StateId>>,
    initial: StateId,
}

impl<S: Symbol> Default for Dfa<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Symbol> Dfa<S> {
    /// Creates an acceptor with a single, rejecting initial state.
    pub fn new() -> Self {
        Self {
            accepting: vec![false],
            transitions: vec![math::Map::default()],
            initial: 0,
        }
    }

    pub fn initial(&self) -> StateId {
        self.initial
    }

    /// Number of states.
    pub fn size(&self) -> usize {
        self.accepting.len()
    }

    /// Adds a fresh state and returns its index.
    pub fn add_state(&mut self, accepting: bool) -> StateId {
        self.accepting.push(accepting);
        self.transitions.push(math::Map::default());
        self.accepting.len() - 1
    }

    pub fn set_accepting(&mut self, state: StateId, accepting: bool) {
        self.accepting[state] = accepting;
    }

    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting[state]
    }

    /// Inserts the transition `source --sym--> target`, replacing any previous
    /// transition of `source` on `sym`.
    pub fn add_transition(&mut self, source: StateId, sym: S, target: StateId) {
        debug_assert!(source < self.size() && target < self.size());
        self.transitions[source].insert(sym, target);
    }

    pub fn successor(&self, state: StateId, sym: S) -> Option<StateId> {
        self.transitions[state].get(&sym).copied()
    }

    /// Runs `word` from the initial state, returning the reached state if
    /// every step is defined.
    pub fn run(&self, word: &[S]) -> Option<StateId> {
        word.iter()
            .try_fold(self.initial, |state, &sym| self.successor(state, sym))
    }

    pub fn accepts(&self, word: &[S]) -> bool {
        self.run(word).is_some_and(|q| self.accepting[q])
    }

    /// Breadth-first search for a shortest accepted word that only uses the
    /// given symbols. Returns `None` if no accepting state is reachable over
    /// them.
    pub fn shortest_accepted_word(&self, symbols: &[S]) -> Option<Vec<S>> {
        let mut predecessor: math::Map<StateId, (StateId, S)> = math::Map::default();
        let mut queue = VecDeque::from([self.initial]);
        let mut visited = math::Set::default();
        visited.insert(self.initial);

        while let Some(state) = queue.pop_front() {
            if self.accepting[state] {
                let mut word = Vec::new();
                let mut current = state;
                while let Some(&(prev, sym)) = predecessor.get(&current) {
                    word.push(sym);
                    current = prev;
                }
                word.reverse();
                return Some(word);
            }
            for &sym in symbols {
                if let Some(next) = self.successor(state, sym) {
                    if visited.insert(next) {
                        predecessor.insert(next, (state, sym));
                        queue.push_back(next);
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn even_as() -> Dfa<char> {
        // accepts words with an even number of 'a', any number of 'b'
        let mut dfa = Dfa::new();
        dfa.set_accepting(0, true);
        let odd = dfa.add_state(false);
        dfa.add_transition(0, 'a', odd);
        dfa.add_transition(odd, 'a', 0);
        dfa.add_transition(0, 'b', 0);
        dfa.add_transition(odd, 'b', odd);
        dfa
    }

    #[test]
    fn partial_run_rejects() {
        let mut dfa = Dfa::new();
        let q1 = dfa.add_state(true);
        dfa.add_transition(0, 'a', q1);

        assert!(dfa.accepts(&['a']));
        assert!(!dfa.accepts(&[]));
        // no transition on 'b' anywhere, nor on 'a' from q1
        assert!(!dfa.accepts(&['b']));
        assert!(!dfa.accepts(&['a', 'a']));
        assert_eq!(dfa.run(&['a', 'a']), None);
    }

    #[test]
    fn total_language() {
        let dfa = even_as();
        assert!(dfa.accepts(&[]));
        assert!(dfa.accepts(&['a', 'b', 'a']));
        assert!(!dfa.accepts(&['a', 'b']));
    }

    #[test]
    fn shortest_word_restricted_to_symbols() {
        let mut dfa = Dfa::new();
        let q1 = dfa.add_state(false);
        let q2 = dfa.add_state(true);
        dfa.add_transition(0, 'a', q2);
        dfa.add_transition(0, 'b', q1);
        dfa.add_transition(q1, 'b', q2);

        assert_eq!(dfa.shortest_accepted_word(&['a', 'b']), Some(vec!['a']));
        // without 'a' the only route is via two 'b's
        assert_eq!(
            dfa.shortest_accepted_word(&['b']),
            Some(vec!['b', 'b'])
        );
        assert_eq!(dfa.shortest_accepted_word(&[]), None);

        let empty_ok = even_as();
        assert_eq!(empty_ok.shortest_accepted_word(&['a']), Some(vec![]));
    }
}
