//! Word algebra relating global SPA runs to procedure-local traces:
//! balanced call/return matching, normalization of a global subword into the
//! local trace of a single invocation, and the inverse expansion that embeds
//! a local trace back into a globally checkable word.

use thiserror::Error;

use crate::alphabet::{SpaAlphabet, Symbol};

/// Error raised on words that are not well-nested where the algebra requires
/// them to be. Detected as close to the source as possible, before any
/// learner state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WordError {
    #[error("return symbol enclosing position {position} has no matching call")]
    UnmatchedReturn { position: usize },
    #[error("call symbol enclosing position {position} has no matching return")]
    UnmatchedCall { position: usize },
}

impl<S: Symbol> SpaAlphabet<S> {
    /// Index of the call symbol opening the innermost call/return block that
    /// contains position `idx`. Passing the index of a return symbol yields
    /// the call matched by exactly that return; passing the position *after*
    /// a return yields the enclosing call.
    ///
    /// Scans backward with a signed nesting counter, incrementing on returns
    /// and decrementing on calls. Fails if no enclosing call exists, i.e. the
    /// word is not well-nested up to `idx`.
    pub fn find_call_index(&self, word: &[S], idx: usize) -> Result<usize, WordError> {
        let mut balance = 0usize;
        for i in (0..idx.min(word.len())).rev() {
            let sym = word[i];
            if self.is_return(sym) {
                balance += 1;
            } else if self.is_call(sym) {
                if balance == 0 {
                    return Ok(i);
                }
                balance -= 1;
            }
        }
        Err(WordError::UnmatchedReturn { position: idx })
    }

    /// Index of the return symbol closing the innermost call/return block
    /// that contains position `idx`; the symmetric forward counterpart of
    /// [`Self::find_call_index`]. For a call symbol at index `i`, passing
    /// `i + 1` yields its matching return.
    pub fn find_return_index(&self, word: &[S], idx: usize) -> Result<usize, WordError> {
        let mut balance = 0usize;
        for i in idx..word.len() {
            let sym = word[i];
            if self.is_call(sym) {
                balance += 1;
            } else if self.is_return(sym) {
                if balance == 0 {
                    return Ok(i);
                }
                balance -= 1;
            }
        }
        Err(WordError::UnmatchedCall { position: idx })
    }

    /// Canonical local trace of the well-matched subword starting at `idx`:
    /// internal symbols are kept, every nested `c .. R` block is contracted
    /// to the bare call symbol `c`. The result is a standalone input to the
    /// procedure's own acceptor, which reads a call symbol as a single letter
    /// abstracting the whole nested invocation.
    ///
    /// Fails on a return that closes no block opened within the subword, or a
    /// call that is never closed.
    pub fn normalize(&self, word: &[S], idx: usize) -> Result<Vec<S>, WordError> {
        let mut out = Vec::new();
        let mut i = idx;
        while i < word.len() {
            let sym = word[i];
            if self.is_call(sym) {
                out.push(sym);
                i = self.find_return_index(word, i + 1)? + 1;
            } else if self.is_return(sym) {
                return Err(WordError::UnmatchedReturn { position: i });
            } else {
                out.push(sym);
                i += 1;
            }
        }
        Ok(out)
    }

    /// Inverse of [`Self::normalize`]: replaces every call symbol `c` of a
    /// local trace by `c`, the callee's known terminating sequence and the
    /// return symbol. The result is well-matched end-to-end and can be put to
    /// the global system, provided the lookup covers every call symbol in the
    /// trace.
    pub fn expand<F>(&self, local_trace: &[S], terminating_sequence: F) -> Vec<S>
    where
        F: Fn(S) -> Vec<S>,
    {
        let mut out = Vec::with_capacity(local_trace.len());
        for &sym in local_trace {
            debug_assert!(!self.is_return(sym), "local traces contain no returns");
            out.push(sym);
            if self.is_call(sym) {
                out.extend(terminating_sequence(sym));
                out.push(self.return_symbol());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math;

    fn alphabet() -> SpaAlphabet<char> {
        SpaAlphabet::new(['S', 'T'], ['a', 'b', 'c'], 'R').unwrap()
    }

    fn word(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn call_return_matching() {
        let alphabet = alphabet();
        //           0    1    2    3    4    5    6    7    8
        let w = word("SbSTcRRbR");

        assert_eq!(alphabet.find_call_index(&w, 8), Ok(0));
        assert_eq!(alphabet.find_call_index(&w, 6), Ok(2));
        assert_eq!(alphabet.find_call_index(&w, 5), Ok(3));
        // one past the inner return: the enclosing call
        assert_eq!(alphabet.find_call_index(&w, 7), Ok(0));

        assert_eq!(alphabet.find_return_index(&w, 1), Ok(8));
        assert_eq!(alphabet.find_return_index(&w, 3), Ok(6));
        assert_eq!(alphabet.find_return_index(&w, 4), Ok(5));
    }

    #[test]
    fn matching_detects_malformed_words() {
        let alphabet = alphabet();
        assert_eq!(
            alphabet.find_call_index(&word("aR"), 1),
            Err(WordError::UnmatchedReturn { position: 1 })
        );
        assert_eq!(
            alphabet.find_return_index(&word("Sa"), 1),
            Err(WordError::UnmatchedCall { position: 1 })
        );
        // nesting imbalance within the scanned range
        assert_eq!(
            alphabet.find_call_index(&word("SRR"), 2),
            Err(WordError::UnmatchedReturn { position: 2 })
        );
    }

    #[test]
    fn normalize_contracts_nested_invocations() {
        let alphabet = alphabet();
        assert_eq!(alphabet.normalize(&word("aSRa"), 0), Ok(word("aSa")));
        assert_eq!(alphabet.normalize(&word("bSTcRRb"), 0), Ok(word("bSb")));
        assert_eq!(alphabet.normalize(&word("bSTcRRb"), 1), Ok(word("Sb")));
        assert_eq!(alphabet.normalize(&[], 0), Ok(vec![]));
        assert_eq!(
            alphabet.normalize(&word("aRa"), 0),
            Err(WordError::UnmatchedReturn { position: 1 })
        );
        assert_eq!(
            alphabet.normalize(&word("aS"), 0),
            Err(WordError::UnmatchedCall { position: 2 })
        );
    }

    #[test]
    fn expand_roundtrips_with_normalize() {
        let alphabet = alphabet();
        let mut ts: math::Map<char, Vec<char>> = math::Map::default();
        ts.insert('S', word("a"));
        ts.insert('T', word("c"));
        let lookup = |c| ts[&c].clone();

        let local = word("bSbTc");
        let expanded = alphabet.expand(&local, lookup);
        assert_eq!(expanded, word("bSaRbTcRc"));
        assert_eq!(alphabet.normalize(&expanded, 0), Ok(local));

        // terminating sequences may themselves contain calls
        let mut nested_ts: math::Map<char, Vec<char>> = math::Map::default();
        nested_ts.insert('S', word("TcR"));
        nested_ts.insert('T', word("c"));
        let expanded = alphabet.expand(&word("aSa"), |c| nested_ts[&c].clone());
        assert_eq!(expanded, word("aSTcRRa"));
        assert_eq!(alphabet.normalize(&expanded, 0), Ok(word("aSa")));
    }
}
