//! The constraint-based type-inference and overload-resolution engine.
//!
//! A [`ConstraintSystem`] is seeded with goals, a binding map, and a scope,
//! and solved against a [`ProgramQuerier`]. Solving explores disjunctions and
//! overloads by forking the solver state, prunes forks by score, and ranks
//! surviving solutions by specificity.

pub mod error;
pub mod goal;
pub mod infer;
pub mod mocks;
pub mod outcome;
pub mod querier;
pub mod ranking;
pub mod relations;
pub mod solution;
pub mod solver;
pub mod subst;
pub mod trace;
pub mod unify;

pub use error::{TypeError, TypeErrorKind};
pub use goal::{Choice, Goal, GoalId, GoalKind, GoalOrigin, OriginKind, OverloadCandidate};
pub use outcome::{DiagnoseFn, Outcome, Outcomes};
pub use querier::{CandidateSet, NameResolutionCandidate, ProgramQuerier, ResolutionPurpose};
pub use ranking::SolutionOrdering;
pub use relations::TypeRelations;
pub use solution::{Score, Solution};
pub use solver::ConstraintSystem;
pub use subst::{SubstitutionMap, Unresolved};
pub use trace::InferenceTracer;
