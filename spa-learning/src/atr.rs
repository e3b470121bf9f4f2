//! Access, terminating and return sequence bookkeeping.
//!
//! For every known procedure `p` the provider keeps three witnesses from the
//! target system: the *access* sequence (a word from the system root through
//! the invocation of `p`), the *terminating* sequence (a word that drives an
//! entered `p` to local acceptance) and the *return* sequence (the word from
//! `p`'s matching return that closes all suspended outer invocations). The
//! access and return sequence of a procedure form a coherent pair, so
//! `access(p) · w · return(p)` is a sound global embedding of any local word
//! `w` of `p`.
//!
//! Witnesses only ever shrink. Besides positive counterexamples, refined
//! hypotheses propose shorter witnesses: a terminating candidate from the
//! shortest accepted local word, and an access candidate from the
//! sub-learners' canonical access words. Hypotheses may still be wrong, so a
//! candidate replaces the stored witness only after a single confirming
//! membership query; procedure bodies and invocation contexts are
//! independent under the pushdown semantics, which makes that one accepted
//! word certify the whole embedding.

use std::rc::Rc;

use spa::{
    alphabet::{SpaAlphabet, Symbol},
    dfa::Dfa,
    math,
    transformation::WordError,
};
use tracing::{debug, trace};

use crate::{learner::ProcedureLearner, oracle::MembershipOracle};

#[derive(Debug, Clone)]
struct AtrSequences<S> {
    access: Vec<S>,
    terminating: Vec<S>,
    returning: Vec<S>,
}

/// Maintains the minimal known access/terminating/return sequences per
/// procedure and shrinks them whenever counterexamples or refined hypotheses
/// reveal shorter, system-confirmed witnesses.
pub struct AtrProvider<S: Symbol, O> {
    alphabet: SpaAlphabet<S>,
    oracle: Rc<O>,
    sequences: math::Map<S, AtrSequences<S>>,
}

impl<S: Symbol, O: MembershipOracle<S>> AtrProvider<S, O> {
    pub fn new(alphabet: SpaAlphabet<S>, oracle: Rc<O>) -> Self {
        Self {
            alphabet,
            oracle,
            sequences: math::Map::default(),
        }
    }

    /// Returns true if sequences for `sym` have been recorded.
    pub fn knows(&self, sym: S) -> bool {
        self.sequences.contains_key(&sym)
    }

    /// Scans a word accepted by the target system. Every call symbol in it
    /// belongs to a real, reachable procedure; each occurrence yields an
    /// access/terminating/return witness, of which the shortest are kept.
    /// Reports the call symbols seen for the first time.
    ///
    /// Fails on ill-matched input, before any sequence is updated.
    pub fn scan_positive_counterexample(
        &mut self,
        word: &[S],
    ) -> Result<math::Set<S>, WordError> {
        let mut occurrences = Vec::new();
        for (i, &sym) in word.iter().enumerate() {
            if self.alphabet.is_call(sym) {
                occurrences.push((i, sym, self.alphabet.find_return_index(word, i + 1)?));
            }
        }

        let mut discovered = math::Set::default();
        for (call_idx, sym, return_idx) in occurrences {
            let access = &word[..=call_idx];
            let terminating = &word[call_idx + 1..return_idx];
            let returning = &word[return_idx..];

            match self.sequences.get_mut(&sym) {
                Some(seqs) => {
                    // access and return embed a query into one occurrence's
                    // context, so they are replaced as a pair
                    if access.len() + returning.len() < seqs.access.len() + seqs.returning.len() {
                        seqs.access = access.to_vec();
                        seqs.returning = returning.to_vec();
                    }
                    if terminating.len() < seqs.terminating.len() {
                        debug!(
                            "shorter terminating sequence for {sym:?} found in counterexample: {terminating:?}"
                        );
                        seqs.terminating = terminating.to_vec();
                    }
                }
                None => {
                    debug!("discovered procedure {sym:?}, terminating sequence {terminating:?}");
                    discovered.insert(sym);
                    self.sequences.insert(
                        sym,
                        AtrSequences {
                            access: access.to_vec(),
                            terminating: terminating.to_vec(),
                            returning: returning.to_vec(),
                        },
                    );
                }
            }
        }
        Ok(discovered)
    }

    /// Re-derives sequences after the given hypotheses changed. Terminating
    /// sequences come from the shortest word a refined acceptor accepts over
    /// the active alphabet, expanded with the callees' terminating sequences;
    /// access sequences are canonicalized through the sub-learners in
    /// `transformers`. Every strictly shorter candidate must be confirmed by
    /// the system before it replaces the stored witness.
    pub fn scan_refined_procedures<L: ProcedureLearner<S>>(
        &mut self,
        refined: &math::Map<S, Dfa<S>>,
        transformers: &math::Map<S, L>,
        active_alphabet: &math::Set<S>,
    ) {
        let symbols: Vec<S> = active_alphabet.iter().copied().collect();
        for (&sym, model) in refined {
            if !self.sequences.contains_key(&sym) {
                continue;
            }
            let Some(local) = model.shortest_accepted_word(&symbols) else {
                continue;
            };
            let candidate = self
                .alphabet
                .expand(&local, |c| self.terminating_sequence(c).to_vec());
            let before = self.sequences[&sym].terminating.len();
            if candidate.len() >= before {
                continue;
            }
            let mut witness = self.sequences[&sym].access.clone();
            witness.extend_from_slice(&candidate);
            witness.extend_from_slice(&self.sequences[&sym].returning);
            if !self.oracle.answer_query(&witness) {
                trace!("system refutes candidate terminating sequence {candidate:?} for {sym:?}");
                continue;
            }
            debug!(
                "terminating sequence for {sym:?} shrinks from {before} to {} symbols",
                candidate.len()
            );
            self.sequences
                .get_mut(&sym)
                .expect("checked above")
                .terminating = candidate;
        }

        let procedures: Vec<S> = self.sequences.keys().copied().collect();
        for sym in procedures {
            self.canonicalize_access_sequence(sym, transformers, active_alphabet);
        }
    }

    /// Rewrites the access sequence of `sym` segment by segment: the stretch
    /// inside each enclosing invocation is normalized, replaced by that
    /// learner's canonical access word for the same hypothesis state and
    /// re-expanded with current terminating sequences. The candidate keeps
    /// the invocation chain and the paired return sequence intact, and is
    /// adopted only when strictly shorter and confirmed by the system.
    fn canonicalize_access_sequence<L: ProcedureLearner<S>>(
        &mut self,
        sym: S,
        transformers: &math::Map<S, L>,
        active_alphabet: &math::Set<S>,
    ) {
        let access = self.sequences[&sym].access.clone();
        // segments from the innermost enclosing invocation outwards
        let mut segments: Vec<Vec<S>> = Vec::new();
        let mut idx = access.len() - 1;

        while let Ok(call_idx) = self.alphabet.find_call_index(&access, idx) {
            let Some(transformer) = transformers.get(&access[call_idx]) else {
                return;
            };
            let Ok(local) = self.alphabet.normalize(&access[call_idx + 1..idx], 0) else {
                return;
            };
            // calls that are not yet active are unknown to some tables
            if local
                .iter()
                .any(|&c| self.alphabet.is_call(c) && !active_alphabet.contains(&c))
            {
                return;
            }
            let canonical = transformer.transform_access_sequence(&local);
            let mut segment = self
                .alphabet
                .expand(&canonical, |c| self.terminating_sequence(c).to_vec());
            segment.push(access[idx]);
            segments.push(segment);
            idx = call_idx;
        }

        // idx now sits on the root invocation
        let mut candidate = vec![access[idx]];
        for segment in segments.iter().rev() {
            candidate.extend_from_slice(segment);
        }

        let before = self.sequences[&sym].access.len();
        if candidate.len() >= before {
            return;
        }
        let mut witness = candidate.clone();
        witness.extend_from_slice(&self.sequences[&sym].terminating);
        witness.extend_from_slice(&self.sequences[&sym].returning);
        if !self.oracle.answer_query(&witness) {
            trace!("system refutes candidate access sequence {candidate:?} for {sym:?}");
            return;
        }
        debug!(
            "access sequence for {sym:?} shrinks from {before} to {} symbols",
            candidate.len()
        );
        self.sequences
            .get_mut(&sym)
            .expect("sequences were looked up above")
            .access = candidate;
    }

    /// The current best word from the system root through an invocation of
    /// `sym`; it ends with `sym` itself. Panics if `sym` is unknown.
    pub fn access_sequence(&self, sym: S) -> &[S] {
        &self.lookup(sym).access
    }

    /// The current best word driving an entered `sym` to local acceptance.
    /// Panics if `sym` is unknown.
    pub fn terminating_sequence(&self, sym: S) -> &[S] {
        &self.lookup(sym).terminating
    }

    /// The current best word closing the invocation of `sym` and all
    /// suspended outer invocations; it starts with the return symbol. Panics
    /// if `sym` is unknown.
    pub fn return_sequence(&self, sym: S) -> &[S] {
        &self.lookup(sym).returning
    }

    fn lookup(&self, sym: S) -> &AtrSequences<S> {
        self.sequences
            .get(&sym)
            .unwrap_or_else(|| panic!("no sequences recorded for procedure {sym:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lstar::DfaLstar,
        oracle::{DfaOracle, SpaOracle},
        testing::{palindrome_spa, word},
    };
    use spa::spa::Spa;

    fn provider() -> AtrProvider<char, SpaOracle<char>> {
        let target = palindrome_spa();
        AtrProvider::new(target.alphabet().clone(), Rc::new(SpaOracle::new(target)))
    }

    fn no_transformers() -> math::Map<char, DfaLstar<char, DfaOracle<char>>> {
        math::Map::default()
    }

    #[test]
    fn discovery_from_positive_counterexample() {
        let mut atr = provider();
        let discovered = atr
            .scan_positive_counterexample(&word("SbSTcRRbR"))
            .unwrap();
        assert_eq!(discovered.len(), 2);
        assert!(discovered.contains(&'S') && discovered.contains(&'T'));

        assert_eq!(atr.access_sequence('S'), word("S"));
        assert_eq!(atr.terminating_sequence('S'), word("bSTcRRb"));
        assert_eq!(atr.return_sequence('S'), word("R"));

        assert_eq!(atr.access_sequence('T'), word("SbST"));
        assert_eq!(atr.terminating_sequence('T'), word("c"));
        assert_eq!(atr.return_sequence('T'), word("RbR"));
    }

    #[test]
    fn repeated_scans_only_shrink() {
        let mut atr = provider();
        atr.scan_positive_counterexample(&word("SbSTcRRbR")).unwrap();

        // the nested occurrence of S carries the shorter terminating witness
        let discovered = atr.scan_positive_counterexample(&word("SaSbRaR")).unwrap();
        assert!(discovered.is_empty());
        assert_eq!(atr.terminating_sequence('S'), word("b"));
        assert_eq!(atr.terminating_sequence('T'), word("c"));
        // the shortest access/return pair is unchanged
        assert_eq!(atr.access_sequence('S'), word("S"));
        assert_eq!(atr.return_sequence('S'), word("R"));

        // an equally long witness does not replace the stored one
        atr.scan_positive_counterexample(&word("SaR")).unwrap();
        assert_eq!(atr.terminating_sequence('S'), word("b"));
    }

    #[test]
    fn malformed_word_is_rejected_without_updates() {
        let mut atr = provider();
        assert!(atr.scan_positive_counterexample(&word("SaS")).is_err());
        assert!(!atr.knows('S'));
    }

    #[test]
    fn refined_hypothesis_shrinks_terminating_sequence() {
        let mut atr = provider();
        atr.scan_positive_counterexample(&word("SbSTcRRbR")).unwrap();

        // refined hypothesis for S accepts the empty local word
        let mut model = Dfa::new();
        model.set_accepting(0, true);
        let mut refined = math::Map::default();
        refined.insert('S', model);

        let active: math::Set<char> = word("abcST").into_iter().collect();
        atr.scan_refined_procedures(&refined, &no_transformers(), &active);
        assert_eq!(atr.terminating_sequence('S'), word(""));
        // other procedures are untouched
        assert_eq!(atr.terminating_sequence('T'), word("c"));
    }

    #[test]
    fn terminating_candidate_must_pass_the_system() {
        let mut atr = provider();
        atr.scan_positive_counterexample(&word("SbSTcRRbR")).unwrap();

        // a hypothesis for T that wrongly accepts the empty local word
        let mut model = Dfa::new();
        model.set_accepting(0, true);
        let mut refined = math::Map::default();
        refined.insert('T', model);

        let active: math::Set<char> = word("abcST").into_iter().collect();
        atr.scan_refined_procedures(&refined, &no_transformers(), &active);
        // "SbSTRbR" is rejected by the system, the stored witness survives
        assert_eq!(atr.terminating_sequence('T'), word("c"));
    }

    /// S repeats `a` before calling T, so access witnesses for T can carry
    /// redundant repetitions: local language of S is a+ T, of T just b.
    fn looping_target() -> Spa<char> {
        let alphabet = SpaAlphabet::new(['S', 'T'], ['a', 'b'], 'R').unwrap();
        let mut s = Dfa::new();
        let s1 = s.add_state(false);
        let s2 = s.add_state(true);
        s.add_transition(0, 'a', s1);
        s.add_transition(s1, 'a', s1);
        s.add_transition(s1, 'T', s2);

        let mut t = Dfa::new();
        let t1 = t.add_state(true);
        t.add_transition(0, 'b', t1);

        let mut procedures = math::Map::default();
        procedures.insert('S', s);
        procedures.insert('T', t);
        Spa::new(alphabet, 'S', procedures)
    }

    #[test_log::test]
    fn access_sequences_shrink_through_refined_learners() {
        let target = looping_target();
        let oracle = Rc::new(SpaOracle::new(target.clone()));
        let mut atr = AtrProvider::new(target.alphabet().clone(), Rc::clone(&oracle));

        atr.scan_positive_counterexample(&word("SaaTbRR")).unwrap();
        assert_eq!(atr.access_sequence('T'), word("SaaT"));

        // a learner for S whose table knows the local language a+ T
        let mut s_learner = DfaLstar::new(
            vec!['a', 'b', 'S', 'T'],
            DfaOracle::new(target.procedure('S').unwrap().clone()),
        );
        s_learner.start_learning();
        s_learner.refine(&word("aT"), true);
        assert_eq!(s_learner.transform_access_sequence(&word("aa")), word("a"));

        let mut transformers = math::Map::default();
        transformers.insert('S', s_learner);
        let active: math::Set<char> = word("abST").into_iter().collect();
        atr.scan_refined_procedures(&math::Map::default(), &transformers, &active);

        assert_eq!(atr.access_sequence('T'), word("SaT"));
        // the paired return sequence is untouched
        assert_eq!(atr.return_sequence('T'), word("RR"));
    }

    #[test]
    fn unverified_access_candidates_are_rejected() {
        let target = palindrome_spa();
        let oracle = Rc::new(SpaOracle::new(target.clone()));
        let mut atr = AtrProvider::new(target.alphabet().clone(), Rc::clone(&oracle));
        atr.scan_positive_counterexample(&word("SbSTcRRbR")).unwrap();

        // a freshly initialised learner canonicalizes every row to the empty
        // word, proposing the bogus access "SST" for T
        let mut s_learner =
            DfaLstar::new(vec!['a', 'b', 'c', 'S', 'T'], DfaOracle::new(Dfa::new()));
        s_learner.start_learning();
        let mut transformers = math::Map::default();
        transformers.insert('S', s_learner);
        let active: math::Set<char> = word("abcST").into_iter().collect();

        atr.scan_refined_procedures(&math::Map::default(), &transformers, &active);
        assert_eq!(atr.access_sequence('T'), word("SbST"));
    }
}
