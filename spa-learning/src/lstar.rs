//! An observation-table DFA learner over a growable alphabet, used as the
//! per-procedure sub-learner. Rows are access words, columns are experiments,
//! cells hold membership bits from the (procedural) oracle. Counterexamples
//! are absorbed by adding all their suffixes as experiments, so a single
//! closing pass afterwards suffices to classify the counterexample correctly.

use std::cell::RefCell;

use itertools::Itertools;
use spa::{alphabet::Symbol, dfa::Dfa, math};
use tracing::{debug, trace};

use crate::{learner::ProcedureLearner, oracle::MembershipOracle};

pub struct DfaLstar<S: Symbol, O> {
    // the symbols currently learnable; grows as procedures are discovered
    symbols: Vec<S>,
    oracle: O,
    // all queries posed so far, together with their output
    queries: RefCell<math::Map<Vec<S>, bool>>,
    // the access words forming the base states; base[0] is the empty word,
    // signatures of base rows are pairwise distinct
    base: Vec<Vec<S>>,
    // experiments; experiments[0] is the empty word and determines acceptance
    experiments: Vec<Vec<S>>,
    // mapping from row word to its outputs under all experiments
    table: math::Map<Vec<S>, Vec<bool>>,
    refinements: u64,
    ce_lengths: u64,
}

impl<S: Symbol, O: MembershipOracle<S>> DfaLstar<S, O> {
    pub fn new(symbols: Vec<S>, oracle: O) -> Self {
        Self {
            symbols,
            oracle,
            queries: RefCell::new(math::Map::default()),
            base: vec![vec![]],
            experiments: vec![vec![]],
            table: math::Map::default(),
            refinements: 0,
            ce_lengths: 0,
        }
    }

    fn output(&self, w: &Vec<S>) -> bool {
        if let Some(&known) = self.queries.borrow().get(w) {
            return known;
        }
        let answer = self.oracle.answer_query(w);
        self.queries.borrow_mut().insert(w.clone(), answer);
        answer
    }

    fn one_letter_extensions(&self) -> impl Iterator<Item = Vec<S>> + '_ {
        self.base
            .iter()
            .flat_map(|w| {
                std::iter::once(w.clone()).chain(self.symbols.iter().map(|&a| {
                    let mut x = w.clone();
                    x.push(a);
                    x
                }))
            })
            .unique()
    }

    fn update_table(&mut self) {
        let experiment_count = self.experiments.len();
        let mut updates = vec![];

        for row in self.one_letter_extensions() {
            let stored = self.table.get(&row).map(|r| r.len()).unwrap_or(0);
            for i in stored..experiment_count {
                let concat = row
                    .iter()
                    .chain(self.experiments[i].iter())
                    .copied()
                    .collect_vec();
                let output = self.output(&concat);
                trace!("recording that {concat:?} maps to {output}");
                updates.push((row.clone(), output));
            }
        }

        for (row, output) in updates {
            self.table.entry(row).or_default().push(output);
        }
    }

    fn rows_to_promote(&self) -> Vec<Vec<S>> {
        let known: math::Set<&Vec<bool>> = self
            .base
            .iter()
            .map(|b| self.table.get(b).expect("base row must be filled"))
            .collect();
        let mut seen = math::Set::default();
        let mut out = vec![];

        for row in self.one_letter_extensions() {
            let sig = self.table.get(&row).expect("extension row must be filled");
            if !known.contains(sig) && seen.insert(sig) {
                trace!("promoting row {row:?}");
                out.push(row.clone());
            }
        }
        out
    }

    /// Fills the table and promotes rows until it is closed: the signature of
    /// every one-letter extension matches some base row.
    fn close(&mut self) {
        loop {
            self.update_table();
            let todo = self.rows_to_promote();
            if todo.is_empty() {
                return;
            }
            self.base.extend(todo);
        }
    }

    /// Builds the current hypothesis acceptor: one state per base row,
    /// transitions by signature lookup of the extended row.
    pub fn hypothesis(&self) -> Dfa<S> {
        let mut dfa = Dfa::new();
        let mut state_of_sig: math::Map<&Vec<bool>, usize> = math::Map::default();

        for (i, row) in self.base.iter().enumerate() {
            let sig = self.table.get(row).expect("base row must be filled");
            let id = if i == 0 {
                dfa.set_accepting(0, sig[0]);
                0
            } else {
                dfa.add_state(sig[0])
            };
            let fresh = state_of_sig.insert(sig, id).is_none();
            debug_assert!(fresh, "base rows must have pairwise distinct signatures");
        }

        for row in &self.base {
            let source = state_of_sig[self.table.get(row).expect("base row must be filled")];
            for &sym in &self.symbols {
                let mut ext = row.clone();
                ext.push(sym);
                let sig = self.table.get(&ext).expect("table must be closed");
                let target = *state_of_sig
                    .get(sig)
                    .expect("closed table maps every extension to a base row");
                dfa.add_transition(source, sym, target);
            }
        }
        dfa
    }

    /// Absorbs a counterexample by adding all its suffixes as experiments and
    /// re-closing the table. Returns false without mutating anything if the
    /// current hypothesis already classifies the word correctly.
    pub fn refine(&mut self, word: &[S], expected: bool) -> bool {
        if self.hypothesis().accepts(word) == expected {
            trace!("{word:?} is classified correctly, nothing to refine");
            return false;
        }
        debug!("absorbing local counterexample {word:?} (expected {expected})");
        self.refinements += 1;
        self.ce_lengths += word.len() as u64;

        for i in 0..word.len() {
            let suffix = word[i..].to_vec();
            if !self.experiments.contains(&suffix) {
                self.experiments.push(suffix);
            }
        }
        self.close();

        assert!(
            self.hypothesis().accepts(word) == expected,
            "counterexample {word:?} could not be absorbed, oracle answers are inconsistent"
        );
        true
    }
}

impl<S: Symbol, O: MembershipOracle<S>> ProcedureLearner<S> for DfaLstar<S, O> {
    fn start_learning(&mut self) {
        self.close();
    }

    fn refine_hypothesis(&mut self, word: &[S], expected: bool) -> bool {
        self.refine(word, expected)
    }

    fn hypothesis(&self) -> Dfa<S> {
        DfaLstar::hypothesis(self)
    }

    fn add_alphabet_symbol(&mut self, sym: S) {
        if !self.symbols.contains(&sym) {
            debug!("growing alphabet by {sym:?}");
            self.symbols.push(sym);
            self.close();
        }
    }

    fn transform_access_sequence(&self, word: &[S]) -> Vec<S> {
        let mut current = &self.base[0];
        for &sym in word {
            let mut ext = current.clone();
            ext.push(sym);
            let sig = self
                .table
                .get(&ext)
                .unwrap_or_else(|| panic!("no table row for {ext:?}, symbol unknown?"));
            current = self
                .base
                .iter()
                .find(|b| self.table.get(*b) == Some(sig))
                .expect("closed table maps every extension to a base row");
        }
        current.clone()
    }

    fn local_refinements(&self) -> u64 {
        self.refinements
    }

    fn sum_of_local_ce_lengths(&self) -> u64 {
        self.ce_lengths
    }
}

impl<S: Symbol, O> std::fmt::Debug for DfaLstar<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = tabled::builder::Builder::default();
        let mut header = vec!["row".to_string()];
        for e in &self.experiments {
            header.push(format!("{e:?}"));
        }
        builder.push_record(header);

        for row in &self.base {
            let mut record = vec![format!("{row:?}")];
            if let Some(outputs) = self.table.get(row) {
                for output in outputs {
                    record.push(format!("{output:?}"));
                }
            }
            builder.push_record(record);
        }

        write!(f, "{}", builder.build())
    }
}
