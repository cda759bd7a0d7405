//! Solutions: what a solve run produces.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use vela_shared::{decl::DeclRef, diag::DiagnosticSink, node_id::ExprId};

use crate::{goal::Goal, subst::SubstitutionMap};

/// A solution's cost: error count first, then accumulated penalties.
/// Scores compare lexicographically.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Score {
    pub errors: u32,
    pub penalties: u32,
}

impl Score {
    pub const ZERO: Score = Score {
        errors: 0,
        penalties: 0,
    };

    pub const MAX: Score = Score {
        errors: u32::MAX,
        penalties: u32::MAX,
    };

    pub fn new(errors: u32, penalties: u32) -> Score {
        Score { errors, penalties }
    }

    pub fn adding_penalty(self, penalty: u32) -> Score {
        Score {
            errors: self.errors,
            penalties: self.penalties.saturating_add(penalty),
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.errors, self.penalties)
    }
}

/// The result of solving a constraint system.
#[derive(Clone, Debug, Default)]
pub struct Solution {
    substitutions: SubstitutionMap,
    bindings: HashMap<ExprId, DeclRef>,
    score: Score,
    diagnostics: DiagnosticSink,
    stale: Vec<Goal>,
}

impl Solution {
    pub fn new(
        substitutions: SubstitutionMap,
        bindings: HashMap<ExprId, DeclRef>,
        score: Score,
        diagnostics: DiagnosticSink,
        stale: Vec<Goal>,
    ) -> Solution {
        Solution {
            substitutions,
            bindings,
            score,
            diagnostics,
            stale,
        }
    }

    /// The optimized substitution map.
    pub fn substitutions(&self) -> &SubstitutionMap {
        &self.substitutions
    }

    pub fn bindings(&self) -> &HashMap<ExprId, DeclRef> {
        &self.bindings
    }

    pub fn binding(&self, expr: ExprId) -> Option<&DeclRef> {
        self.bindings.get(&expr)
    }

    pub fn score(&self) -> Score {
        self.score
    }

    /// A solution is sound when its error count is zero.
    pub fn is_sound(&self) -> bool {
        self.score.errors == 0
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    /// The goals that could not be decided.
    pub fn stale(&self) -> &[Goal] {
        &self.stale
    }

    /// Fold another equally ranked solution into this one, keeping this
    /// solution's assumptions but accumulating the other's diagnostics.
    pub fn absorb(&mut self, other: Solution) {
        self.diagnostics.extend(other.diagnostics);
        self.stale.extend(other.stale);
    }

    pub fn report(&mut self, diag: vela_shared::diag::Diagnostic) {
        let is_error = diag.severity == vela_shared::diag::Severity::Error;
        if self.diagnostics.report(diag) && is_error {
            self.score.errors += 1;
        }
    }
}
