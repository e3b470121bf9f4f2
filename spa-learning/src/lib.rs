//! Active learning for systems of procedural automata (SPAs).
//!
//! The entry point is [`learner::SpaLearner`], which infers one procedure
//! acceptor per call symbol of an [`spa::alphabet::SpaAlphabet`] from
//! membership queries and counterexamples. Each procedure is learned by an
//! off-the-shelf DFA learner behind the [`learner::ProcedureLearner`]
//! capability trait; local queries are embedded into the global target system
//! through [`oracle::ProceduralMembershipOracle`] and the
//! access/terminating/return sequences kept by [`atr::AtrProvider`].

pub mod atr;
pub mod learner;
pub mod lstar;
pub mod oracle;

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::atr::AtrProvider;
    pub use crate::learner::{LearnerError, ProcedureLearner, SpaLearner};
    pub use crate::lstar::DfaLstar;
    pub use crate::oracle::{
        CountingOracle, DfaOracle, MembershipOracle, ProceduralMembershipOracle, SpaOracle,
    };
}

#[cfg(test)]
pub(crate) mod testing {
    use spa::{alphabet::SpaAlphabet, dfa::Dfa, math, spa::Spa};

    pub(crate) fn word(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    /// Well-matched palindromes over {a, b, c}: procedure S generates
    /// aSa | bSb | T | a | b | eps, procedure T generates cTc | S | c.
    pub(crate) fn palindrome_spa() -> Spa<char> {
        let alphabet = SpaAlphabet::new(['S', 'T'], ['a', 'b', 'c'], 'R').unwrap();

        let mut s = Dfa::new();
        s.set_accepting(0, true);
        let s1 = s.add_state(true);
        let s2 = s.add_state(true);
        let s3 = s.add_state(false);
        let s4 = s.add_state(false);
        let s5 = s.add_state(true);
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

    /// All words over `symbols` up to the given length, shortest first.
    pub(crate) fn words_up_to(symbols: &[char], len: usize) -> Vec<Vec<char>> {
        let mut out = vec![vec![]];
        let mut layer = vec![vec![]];
        for _ in 0..len {
            let mut next = vec![];
            for w in &layer {
                for &sym in symbols {
                    let mut x = w.clone();
                    x.push(sym);
                    next.push(x);
                }
            }
            out.extend(next.iter().cloned());
            layer = next;
        }
        out
    }
}
