//! Learns the two-procedure palindrome system back from membership queries
//! and counterexamples, then prints the query statistics.
//!
//! Run with `cargo run --example palindrome`; set `RUST_LOG=debug` or `trace`
//! to watch discovery, localization and sequence shrinking at work.

use spa::{
    alphabet::SpaAlphabet,
    dfa::Dfa,
    math,
    spa::Spa,
};
use spa_learning::prelude::*;
use tracing::info;

/// Well-matched palindromes over {a, b, c}: procedure S generates
/// aSa | bSb | T | a | b | eps, procedure T generates cTc | S | c.
fn palindrome_spa() -> Spa<char> {
    let alphabet = SpaAlphabet::new(['S', 'T'], ['a', 'b', 'c'], 'R')
        .unwrap_or_else(|e| panic!("alphabet roles overlap: {e}"));

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
fn words_up_to(symbols: &[char], len: usize) -> Vec<Vec<char>> {
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

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let target = palindrome_spa();
    for showcase in ["SR", "SaR", "SaSRaR", "SbSTcRRbR", "SaaR", "SaTaRaR", "RS"] {
        let w: Vec<char> = showcase.chars().collect();
        info!("{showcase:?} is {}", if target.accepts(&w) { "accepted" } else { "rejected" });
    }

    let oracle = CountingOracle::new(SpaOracle::new(target.clone()));
    let mut learner = SpaLearner::new(target.alphabet().clone(), oracle, |symbols, oracle| {
        DfaLstar::new(symbols, oracle)
    });
    learner.start_learning();

    // an explicit test-trace set stands in for an equivalence oracle
    let mut samples = words_up_to(&['S', 'T', 'a', 'b', 'c', 'R'], 6);
    for longer in ["SbSTcRRbR", "STcTcRcRR", "SaSTcRRaR", "SbSTcRRaR"] {
        samples.push(longer.chars().collect());
    }

    let mut rounds = 0u32;
    loop {
        let hypothesis = learner.hypothesis();
        let Some(ce) = samples
            .iter()
            .find(|w| hypothesis.accepts(w) != target.accepts(w))
        else {
            break;
        };
        rounds += 1;
        let expected = target.accepts(ce);
        info!("round {rounds}: counterexample {ce:?} (expected {expected})");
        match learner.refine_hypothesis(ce, expected) {
            Ok(changed) => assert!(changed, "a genuine counterexample must refine"),
            Err(e) => panic!("counterexample rejected: {e}"),
        }
    }

    let hypothesis = learner.hypothesis();
    info!(
        "converged after {rounds} rounds on {} procedures",
        hypothesis.procedures().len()
    );
    for (sym, dfa) in hypothesis.procedures() {
        info!("procedure {sym:?} has {} states", dfa.size());
    }
    info!(
        "{} global and {} local refinements, {} symbols in local counterexamples",
        learner.global_refinements(),
        learner.local_refinements(),
        learner.sum_of_local_ce_lengths()
    );
    info!(
        "{} queries ({} symbols) spent on counterexample analysis",
        learner.ce_oracle().queries(),
        learner.ce_oracle().symbols()
    );
}
