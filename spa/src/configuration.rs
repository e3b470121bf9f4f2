use crate::{alphabet::Symbol, dfa::StateId};

/// A suspended procedure activation: the call symbol of the procedure and the
/// local state it was in when it invoked a callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame<S: Symbol> {
    pub call: S,
    pub state: StateId,
}

/// A pushdown configuration of an SPA run: the call symbol of the active
/// procedure, its current local state, and the stack of suspended
/// activations. The stack is exclusively owned by its configuration: every
/// step either pushes a fresh frame or pops the top one, frames are never
/// aliased. Equality and hashing are structural and include the entire stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Configuration<S: Symbol> {
    call: S,
    state: StateId,
    stack: Vec<Frame<S>>,
}

impl<S: Symbol> Configuration<S> {
    /// The root configuration of a run of procedure `call`, with empty stack.
    pub fn new(call: S, state: StateId) -> Self {
        Self {
            call,
            state,
            stack: Vec::new(),
        }
    }

    /// Call symbol of the active procedure.
    pub fn call(&self) -> S {
        self.call
    }

    /// Current local state of the active procedure.
    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn set_state(&mut self, state: StateId) {
        self.state = state;
    }

    /// Nesting depth, i.e. the number of suspended activations.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Suspends the active procedure and enters `callee` at `initial`.
    pub fn enter(&mut self, callee: S, initial: StateId) {
        self.stack.push(Frame {
            call: self.call,
            state: self.state,
        });
        self.call = callee;
        self.state = initial;
    }

    /// Returns from the active procedure, resuming the topmost suspended
    /// activation. Yields the call symbol of the exited procedure, or `None`
    /// if the stack is empty (the outermost invocation returned).
    pub fn leave(&mut self) -> Option<S> {
        let frame = self.stack.pop()?;
        let exited = std::mem::replace(&mut self.call, frame.call);
        self.state = frame.state;
        Some(exited)
    }
}
