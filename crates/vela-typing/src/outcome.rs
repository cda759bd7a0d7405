//! Outcomes: what the solver decided about each goal.

use std::rc::Rc;

use vela_shared::diag::DiagnosticSink;

use crate::{goal::GoalId, subst::SubstitutionMap};

/// A deferred diagnosis. The closure must be pure and idempotent: it may be
/// re-invoked when a superior solution replaces the one it was first rendered
/// for, and the sink deduplicates whatever it reports.
pub type DiagnoseFn = Rc<dyn Fn(&mut DiagnosticSink, &SubstitutionMap, &Outcomes)>;

/// The decision reached for a goal. Pending goals have no outcome yet.
#[derive(Clone)]
pub enum Outcome {
    Success,
    Failure(DiagnoseFn),
    /// The goal was decomposed into subordinates; it succeeds iff all of
    /// them succeed. The diagnose closure renders the root's message,
    /// consulting subordinate outcomes as needed.
    Product(Vec<GoalId>, DiagnoseFn),
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "Success"),
            Outcome::Failure(_) => write!(f, "Failure(..)"),
            Outcome::Product(subs, _) => write!(f, "Product({:?}, ..)", subs),
        }
    }
}

/// The outcomes of all goals, parallel to the solver's goal list.
#[derive(Clone, Debug, Default)]
pub struct Outcomes {
    entries: Vec<Option<Outcome>>,
}

impl Outcomes {
    pub fn new() -> Outcomes {
        Outcomes::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn push_pending(&mut self) {
        self.entries.push(None);
    }

    pub fn get(&self, goal: GoalId) -> Option<&Outcome> {
        self.entries.get(goal).and_then(|o| o.as_ref())
    }

    pub fn is_pending(&self, goal: GoalId) -> bool {
        self.get(goal).is_none()
    }

    /// One-time assignment of a goal's outcome.
    pub fn set(&mut self, goal: GoalId, outcome: Outcome) {
        debug_assert!(self.entries[goal].is_none(), "outcome set twice for goal {}", goal);
        self.entries[goal] = Some(outcome);
    }

    /// Whether the goal is decisively successful, looking through products.
    pub fn succeeded(&self, goal: GoalId) -> bool {
        match self.get(goal) {
            Some(Outcome::Success) => true,
            Some(Outcome::Failure(_)) => false,
            Some(Outcome::Product(subs, _)) => subs.iter().all(|s| self.succeeded(*s)),
            None => false,
        }
    }

    /// Whether the goal is decisively failed, looking through products.
    pub fn failed(&self, goal: GoalId) -> bool {
        match self.get(goal) {
            Some(Outcome::Success) => false,
            Some(Outcome::Failure(_)) => true,
            Some(Outcome::Product(subs, _)) => subs.iter().any(|s| self.failed(*s)),
            None => false,
        }
    }

    /// The number of failure outcomes recorded so far. This is the error
    /// component of the solver's score and grows monotonically.
    pub fn failure_count(&self) -> u32 {
        self.entries
            .iter()
            .filter(|o| matches!(o, Some(Outcome::Failure(_))))
            .count() as u32
    }

    /// Render the diagnosis of `goal` if it failed.
    pub fn diagnose(&self, goal: GoalId, sink: &mut DiagnosticSink, subst: &SubstitutionMap) {
        match self.get(goal) {
            Some(Outcome::Failure(diagnose)) => diagnose(sink, subst, self),
            Some(Outcome::Product(_, diagnose)) if self.failed(goal) => {
                diagnose(sink, subst, self)
            }
            _ => {}
        }
    }
}

/// A diagnose closure that simply forwards to the failing subordinates.
pub fn delegate_diagnosis(subordinates: Vec<GoalId>) -> DiagnoseFn {
    Rc::new(move |sink, subst, outcomes| {
        for &sub in &subordinates {
            outcomes.diagnose(sub, sink, subst);
        }
    })
}
