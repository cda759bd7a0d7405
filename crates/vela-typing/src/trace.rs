//! The inference trace: a diffable record of every step the solver takes.
//!
//! The format is part of the external interface and must stay stable: an
//! indented tree with the headers `fresh:`, `stale:`, and `steps:`, followed
//! by one line per action.

use std::cell::RefCell;
use std::rc::Rc;

use vela_shared::ty::{Type, TypeVar};

use crate::goal::{Goal, GoalId};

/// Activation filter: trace solves whose seed origins touch this line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceFilter {
    pub file: vela_shared::file_id::FileId,
    pub line: u32,
}

#[derive(Debug, Default)]
struct TraceState {
    out: String,
    depth: usize,
}

/// A shared trace buffer. Forked solver states hold clones of the tracer and
/// append to the same buffer, so the emitted tree follows exploration order.
#[derive(Clone, Debug, Default)]
pub struct InferenceTracer {
    inner: Rc<RefCell<TraceState>>,
}

impl InferenceTracer {
    pub fn new() -> InferenceTracer {
        InferenceTracer::default()
    }

    pub fn output(&self) -> String {
        self.inner.borrow().out.clone()
    }

    fn line(&self, text: &str) {
        let mut state = self.inner.borrow_mut();
        let depth = state.depth;
        for _ in 0..depth {
            state.out.push_str("  ");
        }
        state.out.push_str(text);
        state.out.push('\n');
    }

    pub fn headers<'a>(
        &self,
        fresh: impl Iterator<Item = (GoalId, &'a Goal)>,
        stale: impl Iterator<Item = (GoalId, &'a Goal)>,
    ) {
        self.line("fresh:");
        {
            let mut state = self.inner.borrow_mut();
            state.depth += 1;
        }
        for (id, goal) in fresh {
            self.line(&format!("g{}: {}", id, goal));
        }
        {
            let mut state = self.inner.borrow_mut();
            state.depth -= 1;
        }
        self.line("stale:");
        {
            let mut state = self.inner.borrow_mut();
            state.depth += 1;
        }
        for (id, goal) in stale {
            self.line(&format!("g{}: {}", id, goal));
        }
        {
            let mut state = self.inner.borrow_mut();
            state.depth -= 1;
        }
        self.line("steps:");
        self.indent();
    }

    pub fn indent(&self) {
        self.inner.borrow_mut().depth += 1;
    }

    pub fn outdent(&self) {
        let mut state = self.inner.borrow_mut();
        debug_assert!(state.depth > 0);
        state.depth -= 1;
    }

    pub fn schedule(&self, id: GoalId, goal: &Goal) {
        self.line(&format!("schedule g{} {}", id, goal));
    }

    pub fn solve(&self, id: GoalId, goal: &Goal) {
        self.line(&format!("solve g{} {}", id, goal));
    }

    pub fn fork(&self, id: GoalId) {
        self.line(&format!("fork g{}", id));
    }

    pub fn pick(&self, choice: usize) {
        self.line(&format!("pick {}", choice));
    }

    pub fn skip(&self, choice: usize) {
        self.line(&format!("skip {}", choice));
    }

    pub fn assume(&self, var: TypeVar, ty: &Type) {
        self.line(&format!("assume {} = {}", var, ty));
    }

    pub fn refresh(&self, id: GoalId) {
        self.line(&format!("refresh g{}", id));
    }

    pub fn success(&self, id: GoalId) {
        self.line(&format!("success g{}", id));
    }

    pub fn failure(&self, id: GoalId) {
        self.line(&format!("failure g{}", id));
    }

    pub fn break_exploration(&self) {
        self.line("break");
    }

    pub fn defer(&self, id: GoalId) {
        self.line(&format!("defer g{}", id));
    }

    pub fn abort(&self) {
        self.line("abort");
    }
}
