//! Models for systems of procedural automata (SPAs).
//!
//! An SPA is a composite acceptor for recursive, procedural control flow: the
//! input alphabet is partitioned into *call* symbols (each naming a
//! procedure), *internal* symbols and a single *return* symbol, and every
//! procedure is itself a finite acceptor over call and internal symbols. A
//! word is accepted by simulating a pushdown run in which each call suspends
//! the active procedure and each return resumes it.
//!
//! This crate contains the model side only: [`alphabet::SpaAlphabet`],
//! partial procedure acceptors ([`dfa::Dfa`]), pushdown
//! [`configuration::Configuration`]s, the composed [`spa::Spa`] model and the
//! word algebra in [`transformation`] that relates global runs to
//! procedure-local traces. The active learner lives in the `spa-learning`
//! crate.

pub mod alphabet;
pub mod configuration;
pub mod dfa;
pub mod math;
pub mod spa;
pub mod transformation;

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::alphabet::{AlphabetError, SpaAlphabet, Symbol};
    pub use crate::configuration::{Configuration, Frame};
    pub use crate::dfa::{Dfa, StateId};
    pub use crate::math;
    pub use crate::spa::Spa;
    pub use crate::transformation::WordError;
}
