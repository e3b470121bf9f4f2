//! The top-level SPA learner: discovers procedures from positive
//! counterexamples, keeps all sub-learners on a synchronously grown alphabet,
//! re-establishes terminating-sequence conformance before every analysis and
//! localizes global counterexamples to the single responsible procedure by
//! binary search over return positions.

use std::{cell::RefCell, rc::Rc};

use itertools::Itertools;
use spa::{
    alphabet::{SpaAlphabet, Symbol},
    dfa::Dfa,
    math,
    spa::Spa,
    transformation::WordError,
};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    atr::AtrProvider,
    oracle::{CountingOracle, MembershipOracle, ProceduralMembershipOracle},
};

/// The capabilities a per-procedure learner must combine: DFA learning from
/// membership queries and counterexamples, alphabet growth without discarding
/// learned structure, access-sequence transformation and refinement counters.
/// One interface, deliberately not four.
pub trait ProcedureLearner<S: Symbol> {
    fn start_learning(&mut self);

    /// Processes a local counterexample, returning true iff the hypothesis
    /// changed.
    fn refine_hypothesis(&mut self, word: &[S], expected: bool) -> bool;

    fn hypothesis(&self) -> Dfa<S>;

    /// Makes `sym` learnable. Must be idempotent and keep all structure
    /// learned so far.
    fn add_alphabet_symbol(&mut self, sym: S);

    /// The canonical access sequence of the hypothesis state reached by
    /// `word`.
    fn transform_access_sequence(&self, word: &[S]) -> Vec<S>;

    fn local_refinements(&self) -> u64;

    fn sum_of_local_ce_lengths(&self) -> u64;
}

/// Error raised by [`SpaLearner::refine_hypothesis`] on malformed input.
/// Violated algorithmic invariants are not errors but panics; see the module
/// documentation of [`crate::learner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LearnerError {
    #[error(transparent)]
    Word(#[from] WordError),
    #[error("counterexample contains no return symbol, cannot localize a procedure")]
    MissingReturn,
}

/// Learns a [`Spa`] from membership queries and counterexamples. One
/// sub-learner per discovered call symbol is created through the supplied
/// constructor; local queries reach the shared oracle through a
/// [`ProceduralMembershipOracle`].
pub struct SpaLearner<S: Symbol, O, L, F> {
    alphabet: SpaAlphabet<S>,
    oracle: Rc<O>,
    learner_constructor: F,
    atr: Rc<RefCell<AtrProvider<S, O>>>,
    sub_learners: math::Map<S, L>,
    // counts the queries spent on counterexample analysis
    ce_oracle: CountingOracle<Rc<O>>,
    active_alphabet: math::Set<S>,
    initial_call: Option<S>,
    global_refinements: u64,
}

impl<S, O, L, F> SpaLearner<S, O, L, F>
where
    S: Symbol,
    O: MembershipOracle<S>,
    L: ProcedureLearner<S>,
    F: Fn(Vec<S>, ProceduralMembershipOracle<S, O>) -> L,
{
    pub fn new(alphabet: SpaAlphabet<S>, oracle: O, learner_constructor: F) -> Self {
        let oracle = Rc::new(oracle);
        Self {
            atr: Rc::new(RefCell::new(AtrProvider::new(
                alphabet.clone(),
                Rc::clone(&oracle),
            ))),
            ce_oracle: CountingOracle::new(Rc::clone(&oracle)),
            active_alphabet: alphabet.internals().collect(),
            alphabet,
            oracle,
            learner_constructor,
            sub_learners: math::Map::default(),
            initial_call: None,
            global_refinements: 0,
        }
    }

    /// Nothing happens up front: learning waits for evidence that some main
    /// procedure actually terminates, i.e. the first positive counterexample.
    pub fn start_learning(&mut self) {}

    /// Processes one counterexample `(word, expected)` against the current
    /// hypothesis. Newly revealed procedures are absorbed first, then the
    /// fixpoint loop of conformance checking and localization runs until the
    /// composed hypothesis no longer contradicts the word. Returns true iff
    /// any hypothesis changed.
    pub fn refine_hypothesis(&mut self, word: &[S], expected: bool) -> Result<bool, LearnerError> {
        let mut changed = self.extract_useful_information(word, expected)?;
        if changed {
            self.global_refinements += 1;
        }

        while self.refine_internal(word, expected)? {
            self.global_refinements += 1;
            changed = true;
        }

        Ok(changed)
    }

    /// The current composed hypothesis: the canonical empty SPA while no
    /// procedure is known.
    pub fn hypothesis(&self) -> Spa<S> {
        if self.sub_learners.is_empty() {
            return Spa::empty(self.alphabet.clone());
        }
        let root = self
            .initial_call
            .expect("the root procedure is recorded with the first discovery");
        Spa::new(self.alphabet.clone(), root, self.sub_models())
    }

    fn refine_internal(&mut self, word: &[S], expected: bool) -> Result<bool, LearnerError> {
        let hypothesis = self.hypothesis();
        if hypothesis.accepts(word) == expected {
            return Ok(false);
        }

        // look for better sequences and ensure terminating-sequence
        // conformance prior to counterexample analysis
        let mut local_refinement = self.update_atr_and_check_ts_conformance(&hypothesis)?;

        let return_idx = if expected {
            let current = self.hypothesis();
            self.detect_rejecting_procedure(|w| current.accepts(w), word)?
        } else {
            self.detect_rejecting_procedure(|w| self.ce_oracle.answer_query(w), word)?
        };

        // extract the local counterexample
        let call_idx = self.alphabet.find_call_index(word, return_idx)?;
        let procedure = word[call_idx];
        let local_trace = self.alphabet.normalize(&word[call_idx + 1..return_idx], 0)?;
        debug!("localized the disagreement to {procedure:?}, local trace {local_trace:?}");

        let learner = self
            .sub_learners
            .get_mut(&procedure)
            .unwrap_or_else(|| panic!("localization picked the unknown procedure {procedure:?}"));
        local_refinement |= learner.refine_hypothesis(&local_trace, expected);

        assert!(
            local_refinement,
            "localization must point at a genuinely inconsistent procedure"
        );
        Ok(true)
    }

    /// Records the root procedure and instantiates learners for call symbols
    /// first seen in an accepted word. Alphabet growth is applied to every
    /// learner before any query can observe the enlarged alphabet, and a
    /// terminating sequence for the new procedure is derived before other
    /// procedures may rely on it.
    fn extract_useful_information(
        &mut self,
        word: &[S],
        expected: bool,
    ) -> Result<bool, LearnerError> {
        if !expected || word.is_empty() {
            return Ok(false);
        }

        // accepted words are rooted runs of the main procedure
        debug_assert!(self.alphabet.is_call(word[0]));
        self.initial_call = Some(word[0]);

        let discovered = self.atr.borrow_mut().scan_positive_counterexample(word)?;

        for &sym in &discovered {
            debug!("instantiating a sub-learner for procedure {sym:?}");
            let procedural = ProceduralMembershipOracle::new(
                self.alphabet.clone(),
                Rc::clone(&self.oracle),
                sym,
                Rc::clone(&self.atr),
            );
            let mut learner =
                (self.learner_constructor)(self.alphabet.internals().collect(), procedural);
            learner.start_learning();
            self.sub_learners.insert(sym, learner);

            // procedures may call each other and themselves
            let known_calls = self.sub_learners.keys().copied().collect_vec();
            let learner = self.sub_learners.get_mut(&sym).expect("just inserted");
            for call in known_calls {
                learner.add_alphabet_symbol(call);
            }

            // try to find a shorter terminating sequence for sym before the
            // procedure is invoked in other hypotheses
            let mut refined = math::Map::default();
            refined.insert(sym, learner.hypothesis());
            self.atr.borrow_mut().scan_refined_procedures(
                &refined,
                &self.sub_learners,
                &self.active_alphabet,
            );
            self.active_alphabet.insert(sym);

            for learner in self.sub_learners.values_mut() {
                learner.add_alphabet_symbol(sym);
            }
        }

        if discovered.is_empty() {
            Ok(false)
        } else {
            let models = self.sub_models();
            self.atr.borrow_mut().scan_refined_procedures(
                &models,
                &self.sub_learners,
                &self.active_alphabet,
            );
            Ok(true)
        }
    }

    fn sub_models(&self) -> math::Map<S, Dfa<S>> {
        self.sub_learners
            .iter()
            .map(|(&sym, learner)| (sym, learner.hypothesis()))
            .collect()
    }

    /// Re-derives sequences and re-checks terminating-sequence conformance
    /// until a full pass produces no local refinement.
    fn update_atr_and_check_ts_conformance(
        &mut self,
        hypothesis: &Spa<S>,
    ) -> Result<bool, LearnerError> {
        let mut refinement = false;
        let mut sub_models = hypothesis.procedures().clone();

        while self.check_and_ensure_ts_conformance(&sub_models)? {
            refinement = true;
            sub_models = self.sub_models();
            self.atr.borrow_mut().scan_refined_procedures(
                &sub_models,
                &self.sub_learners,
                &self.active_alphabet,
            );
        }

        Ok(refinement)
    }

    /// Every procedure's hypothesis must accept its own embedded terminating
    /// sequence `p · terminate(p) · R`; any call occurring inside must accept
    /// its projected run as well.
    fn check_and_ensure_ts_conformance(
        &mut self,
        sub_models: &math::Map<S, Dfa<S>>,
    ) -> Result<bool, LearnerError> {
        let mut refinement = false;

        let procedures = self.sub_learners.keys().copied().collect_vec();
        for procedure in procedures {
            let terminating = self.atr.borrow().terminating_sequence(procedure).to_vec();
            let mut embedded = Vec::with_capacity(terminating.len() + 2);
            embedded.push(procedure);
            embedded.extend(terminating);
            embedded.push(self.alphabet.return_symbol());
            refinement |= self.check_single_terminating_sequence(&embedded, sub_models)?;
        }

        Ok(refinement)
    }

    fn check_single_terminating_sequence(
        &mut self,
        input: &[S],
        sub_models: &math::Map<S, Dfa<S>>,
    ) -> Result<bool, LearnerError> {
        let mut refinement = false;

        for (i, &sym) in input.iter().enumerate() {
            if !self.alphabet.is_call(sym) {
                continue;
            }
            let return_idx = self.alphabet.find_return_index(input, i + 1)?;
            let projected = self.alphabet.normalize(&input[i + 1..return_idx], 0)?;

            if !sub_models[&sym].accepts(&projected) {
                trace!("hypothesis of {sym:?} fails its own terminating sequence {projected:?}");
                refinement = true;
                self.sub_learners
                    .get_mut(&sym)
                    .expect("terminating sequences contain only known procedures")
                    .refine_hypothesis(&projected, true);
            }
        }

        Ok(refinement)
    }

    /// Finds the return position of the single procedure invocation
    /// responsible for the disagreement, by binary search for the lowest
    /// return index whose decomposition `system` accepts. If every
    /// decomposition is rejected the root invocation is at fault.
    fn detect_rejecting_procedure<P: Fn(&[S]) -> bool>(
        &self,
        system: P,
        input: &[S],
    ) -> Result<usize, LearnerError> {
        let return_indices = input
            .iter()
            .positions(|&sym| self.alphabet.is_return(sym))
            .collect_vec();
        if return_indices.is_empty() {
            return Err(LearnerError::MissingReturn);
        }

        // skip the last index, it is known accepting
        let searched = &return_indices[..return_indices.len() - 1];
        let position = self
            .lowest_accepting_return_index(&system, input, searched)?
            .unwrap_or(return_indices.len() - 1);

        Ok(return_indices[position])
    }

    fn lowest_accepting_return_index<P: Fn(&[S]) -> bool>(
        &self,
        system: &P,
        input: &[S],
        return_indices: &[usize],
    ) -> Result<Option<usize>, LearnerError> {
        let mut lower = 0;
        let mut upper = return_indices.len();
        let mut result = None;

        while lower < upper {
            let mid = lower + (upper - lower) / 2;
            if self.accepts_decomposition(system, input, return_indices[mid] + 1)? {
                result = Some(mid);
                upper = mid;
            } else {
                lower = mid + 1;
            }
        }

        Ok(result)
    }

    /// Rebuilds a well-matched word for the prefix ending at `idx_after_return`
    /// by decomposing every enclosing call/return pair and substituting the
    /// enclosing procedures' best known terminating sequences, then asks
    /// `system` about the result.
    fn accepts_decomposition<P: Fn(&[S]) -> bool>(
        &self,
        system: &P,
        input: &[S],
        idx_after_return: usize,
    ) -> Result<bool, LearnerError> {
        let atr = self.atr.borrow();
        // segments from the innermost enclosing block outwards
        let mut segments = Vec::new();
        let mut idx = idx_after_return;

        while idx > 0 {
            let call_idx = self.alphabet.find_call_index(input, idx)?;
            let normalized = self.alphabet.normalize(&input[call_idx + 1..idx], 0)?;
            let mut segment = vec![input[call_idx]];
            segment.extend(
                self.alphabet
                    .expand(&normalized, |c| atr.terminating_sequence(c).to_vec()),
            );
            segments.push(segment);
            idx = call_idx;
        }

        let mut word: Vec<S> = Vec::new();
        for segment in segments.iter().rev() {
            word.extend_from_slice(segment);
        }
        word.extend_from_slice(&input[idx_after_return..]);

        trace!("decomposition of {input:?} at {idx_after_return} is {word:?}");
        Ok(system(&word))
    }

    // diagnostics

    pub fn global_refinements(&self) -> u64 {
        self.global_refinements
    }

    pub fn local_refinements(&self) -> u64 {
        self.sub_learners
            .values()
            .map(ProcedureLearner::local_refinements)
            .sum()
    }

    pub fn sum_of_local_ce_lengths(&self) -> u64 {
        self.sub_learners
            .values()
            .map(ProcedureLearner::sum_of_local_ce_lengths)
            .sum()
    }

    /// The counting wrapper used for counterexample-analysis queries.
    pub fn ce_oracle(&self) -> &CountingOracle<Rc<O>> {
        &self.ce_oracle
    }

    /// Handle to the shared access/terminating/return sequence provider.
    pub fn atr_provider(&self) -> &Rc<RefCell<AtrProvider<S, O>>> {
        &self.atr
    }
}
